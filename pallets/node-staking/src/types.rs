use codec::{Decode, Encode, MaxEncodedLen};
use node_staking_primitives::WindowSchedule;
use scale_info::TypeInfo;
use sp_runtime::RuntimeDebug;

/// Economics and access control of the pool. Written by `initialize` and the owner setters.
#[derive(Clone, PartialEq, Eq, Encode, Decode, MaxEncodedLen, TypeInfo, RuntimeDebug)]
pub struct PoolConfig<AccountId, AssetId, Balance, BlockNumber> {
    pub owner: AccountId,
    pub stake_token: AssetId,
    pub reward_token: AssetId,
    /// Stake locked by every node deposited from now on.
    pub require_stake_amount: Balance,
    pub reward_per_block: Balance,
    pub schedule: WindowSchedule<BlockNumber>,
    /// Account the reward payouts are pulled from. It approves the pool account.
    pub reward_distributor: AccountId,
    pub paused: bool,
}
