//! Node Staking Primitives
//!
//! Pure accounting shared by the node staking pallet and off-chain tooling:
//! the lock/withdraw window schedule, the pool-wide reward accumulator and the
//! per-node ledger. Nothing here touches storage.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod ledger;
pub mod window;

pub use ledger::{LedgerError, Node, NodeIndex, NodeStatus, PoolAccumulator, UserAccount};
pub use window::{time_multiplier, WindowSchedule};

/// Pallet log target.
pub const LOG_TARGET: &str = "runtime::node-staking";

/// Default lock segment of a fresh pool, in blocks.
pub const DEFAULT_LOCKUP_DURATION: u32 = 10;

/// Default withdraw segment of a fresh pool, in blocks.
pub const DEFAULT_WITHDRAW_PERIOD: u32 = 10;
