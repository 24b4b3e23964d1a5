//! # Node Staking Pallet
//!
//! Stake a fixed amount per virtual node, earn a pooled per-block reward while the
//! pool owner keeps the node enabled, and take the principal back during the recurring
//! withdraw window.
//!
//! ## How it works:
//! 1. The pool is created once through `initialize` (stake asset, reward asset, rates, schedule)
//! 2. A user calls `deposit(count)`; `count * require_stake_amount` moves to the pool account and
//!    `count` dormant nodes are appended to the user's node list
//! 3. The owner calls `enable_address` for a node; from that block it owns one share of
//!    `reward_per_block`, split equally among all running nodes
//! 4. `claim_reward` pays the owed share from the reward distributor at any time
//! 5. `withdraw` returns the principal, only while the schedule is in a withdraw segment
//!
//! ## Accounting:
//! - One pool-wide accumulator (`acc_reward_per_node`), synced before every change to the
//!   running-node count and before every payout
//! - A node's share is `acc_reward_per_node - reward_debt` while running, plus `settled_reward`
//! - An empty pool accrues nothing; idle blocks are skipped, not banked
//!
//! Every dispatchable is transactional: a failed call leaves the accumulator, the nodes and the
//! token balances untouched.

#![cfg_attr(not(feature = "std"), no_std)]

pub use pallet::*;

mod types;
pub use types::PoolConfig;

#[cfg(test)]
mod mock;

#[frame_support::pallet]
pub mod pallet {
    use super::*;
    use frame_support::{
        pallet_prelude::*,
        traits::{
            fungibles::{self, approvals, Inspect, Mutate},
            tokens::{self, Fortitude, Preservation},
        },
        storage::with_storage_layer,
        PalletId,
    };
    use frame_system::pallet_prelude::*;
    use node_staking_primitives::{
        LedgerError, Node, NodeIndex, PoolAccumulator, UserAccount, WindowSchedule, LOG_TARGET,
    };
    use sp_runtime::{
        traits::{AccountIdConversion, CheckedMul, TrailingZeroInput, Zero},
        ArithmeticError, DispatchError,
    };
    use sp_std::vec::Vec;

    pub type PoolConfigOf<T> = PoolConfig<
        <T as frame_system::Config>::AccountId,
        <T as Config>::AssetId,
        <T as Config>::Balance,
        BlockNumberFor<T>,
    >;
    pub type NodeOf<T> = Node<<T as Config>::Balance, BlockNumberFor<T>>;
    pub type AccumulatorOf<T> = PoolAccumulator<<T as Config>::Balance, BlockNumberFor<T>>;

    #[pallet::config]
    pub trait Config: frame_system::Config {
        /// The overarching event type
        type RuntimeEvent: From<Event<Self>>
            + IsType<<Self as frame_system::Config>::RuntimeEvent>;

        /// Identifier of the stake and reward assets
        type AssetId: Member + Parameter + MaxEncodedLen;

        type Balance: tokens::Balance;

        /// Asset backend. The pool pulls rewards from the distributor through an approval
        /// granted to the pool account.
        type Assets: fungibles::Inspect<
                Self::AccountId,
                AssetId = Self::AssetId,
                Balance = Self::Balance,
            > + fungibles::Mutate<Self::AccountId>
            + approvals::Inspect<Self::AccountId>
            + approvals::Mutate<Self::AccountId>;

        /// Origin allowed to create the pool
        type InitializeOrigin: EnsureOrigin<Self::RuntimeOrigin>;

        /// Derives the keyless account that holds deposited stake
        #[pallet::constant]
        type PalletId: Get<PalletId>;

        /// Max nodes created by a single deposit
        #[pallet::constant]
        type MaxNodesPerDeposit: Get<u32>;

        /// Max length of the pool name and symbol
        #[pallet::constant]
        type StringLimit: Get<u32>;
    }

    #[pallet::pallet]
    pub struct Pallet<T>(_);

    /// Pool configuration. `None` until `initialize`.
    #[pallet::storage]
    pub type Pool<T: Config> = StorageValue<_, PoolConfigOf<T>, OptionQuery>;

    #[pallet::storage]
    pub type PoolName<T: Config> = StorageValue<_, BoundedVec<u8, T::StringLimit>, ValueQuery>;

    #[pallet::storage]
    pub type PoolSymbol<T: Config> = StorageValue<_, BoundedVec<u8, T::StringLimit>, ValueQuery>;

    /// Shared reward accumulator
    #[pallet::storage]
    pub type Accumulator<T: Config> = StorageValue<_, AccumulatorOf<T>, ValueQuery>;

    /// Node arena: (owner, index) -> node. Entries are never removed.
    #[pallet::storage]
    pub type Nodes<T: Config> = StorageDoubleMap<
        _,
        Blake2_128Concat,
        T::AccountId,
        Twox64Concat,
        NodeIndex,
        NodeOf<T>,
        OptionQuery,
    >;

    #[pallet::storage]
    pub type UserAccounts<T: Config> =
        StorageMap<_, Blake2_128Concat, T::AccountId, UserAccount, ValueQuery>;

    #[pallet::event]
    #[pallet::generate_deposit(pub(super) fn deposit_event)]
    pub enum Event<T: Config> {
        /// The pool was created
        PoolInitialized {
            owner: T::AccountId,
            stake_token: T::AssetId,
            reward_token: T::AssetId,
            start_block: BlockNumberFor<T>,
        },
        /// Stake deposited, `count` dormant nodes created from `first_node_id`
        Deposit {
            user: T::AccountId,
            amount_per_node: T::Balance,
            first_node_id: NodeIndex,
            count: u32,
        },
        EnableAddress { user: T::AccountId, node_id: NodeIndex },
        DisableAddress { user: T::AccountId, node_id: NodeIndex },
        /// Reward paid out. `amount` may be zero.
        RewardsHarvested { user: T::AccountId, amount: T::Balance, node_id: NodeIndex },
        /// Principal returned
        Withdraw { user: T::AccountId, amount: T::Balance, node_id: NodeIndex },
        SetRequireStakeAmount { amount: T::Balance },
        SetRewardPerBlock { amount: T::Balance },
        SetRewardDistributor { distributor: T::AccountId },
        SetPoolInfor {
            reward_per_block: T::Balance,
            lockup_duration: BlockNumberFor<T>,
            withdraw_period: BlockNumberFor<T>,
            reward_distributor: T::AccountId,
        },
        Paused { account: T::AccountId },
        Unpaused { account: T::AccountId },
        OwnershipTransferred { previous_owner: T::AccountId, new_owner: T::AccountId },
    }

    #[pallet::error]
    pub enum Error<T> {
        /// Pool already created
        AlreadyInitialized,
        /// Pool not created yet
        NotInitialized,
        /// Caller is not the pool owner
        NotOwner,
        /// Pool is paused
        PoolPaused,
        /// Pool is not paused
        NotPaused,
        /// Node count must be at least one
        InvalidAmount,
        /// Deposit creates more nodes than `MaxNodesPerDeposit`
        TooManyNodes,
        /// No such node for this account
        InvalidNodeId,
        /// Stake per node must be positive
        InvalidRequireStakeAmount,
        /// Lock segment must be at least one block
        InvalidLockupDuration,
        /// Withdraw segment must be at least one block
        InvalidWithdrawPeriod,
        /// Reward distributor must not be the zero account
        InvalidRewardDistributor,
        /// Owner must not be the zero account
        InvalidOwner,
        /// Node is already running
        AlreadyEnabled,
        /// Node is not running
        AlreadyDisabled,
        /// Disabled nodes stay disabled
        CannotReenable,
        /// Node principal was already returned
        NodeWithdrawn,
        /// Node holds no principal
        NothingToWithdraw,
        /// Current block is in a lock segment
        NotInWithdrawWindow,
        /// Distributor balance or allowance does not cover the payout
        InsufficientRewardSupply,
    }

    #[pallet::hooks]
    impl<T: Config> Hooks<BlockNumberFor<T>> for Pallet<T> {
        fn integrity_test() {
            assert!(T::MaxNodesPerDeposit::get() > 0, "MaxNodesPerDeposit must allow one node");
        }
    }

    #[pallet::call]
    impl<T: Config> Pallet<T> {
        /// Create the pool. Callable once.
        ///
        /// The owner starts out as the reward distributor.
        #[pallet::call_index(0)]
        #[pallet::weight(
            Weight::from_parts(20_000_000, 0).saturating_add(T::DbWeight::get().reads_writes(1, 4))
        )]
        #[allow(clippy::too_many_arguments)]
        pub fn initialize(
            origin: OriginFor<T>,
            name: BoundedVec<u8, T::StringLimit>,
            symbol: BoundedVec<u8, T::StringLimit>,
            reward_token: T::AssetId,
            reward_per_block: T::Balance,
            require_stake_amount: T::Balance,
            start_block: BlockNumberFor<T>,
            stake_token: T::AssetId,
            lockup_duration: BlockNumberFor<T>,
            withdraw_period: BlockNumberFor<T>,
            owner: T::AccountId,
        ) -> DispatchResult {
            T::InitializeOrigin::ensure_origin(origin)?;
            ensure!(!Pool::<T>::exists(), Error::<T>::AlreadyInitialized);
            ensure!(!require_stake_amount.is_zero(), Error::<T>::InvalidRequireStakeAmount);
            ensure!(!lockup_duration.is_zero(), Error::<T>::InvalidLockupDuration);
            ensure!(!withdraw_period.is_zero(), Error::<T>::InvalidWithdrawPeriod);
            ensure!(!Self::is_zero_account(&owner), Error::<T>::InvalidOwner);

            Pool::<T>::put(PoolConfig {
                owner: owner.clone(),
                stake_token: stake_token.clone(),
                reward_token: reward_token.clone(),
                require_stake_amount,
                reward_per_block,
                schedule: WindowSchedule::new(start_block, lockup_duration, withdraw_period),
                reward_distributor: owner.clone(),
                paused: false,
            });
            PoolName::<T>::put(name);
            PoolSymbol::<T>::put(symbol);
            Accumulator::<T>::put(AccumulatorOf::<T>::new(start_block));

            log::info!(
                target: LOG_TARGET,
                "pool initialized: owner {:?}, start {:?}, cycle {:?}+{:?}",
                owner,
                start_block,
                lockup_duration,
                withdraw_period,
            );

            Self::deposit_event(Event::PoolInitialized {
                owner,
                stake_token,
                reward_token,
                start_block,
            });
            Ok(())
        }

        /// Lock `count` stake units, one per new dormant node.
        #[pallet::call_index(1)]
        #[pallet::weight(
            Weight::from_parts(40_000_000, 0)
                .saturating_add(T::DbWeight::get().reads_writes(4, 3))
                .saturating_add(T::DbWeight::get().writes((*count).into()))
        )]
        pub fn deposit(origin: OriginFor<T>, count: u32) -> DispatchResult {
            let who = ensure_signed(origin)?;
            let pool = Self::pool_config()?;
            ensure!(!pool.paused, Error::<T>::PoolPaused);
            ensure!(count > 0, Error::<T>::InvalidAmount);
            ensure!(count <= T::MaxNodesPerDeposit::get(), Error::<T>::TooManyNodes);

            let total = pool
                .require_stake_amount
                .checked_mul(&T::Balance::from(count))
                .ok_or(ArithmeticError::Overflow)?;
            T::Assets::transfer(
                pool.stake_token.clone(),
                &who,
                &Self::pool_account(),
                total,
                Preservation::Expendable,
            )?;

            let first_node_id = Self::append_nodes(&who, count, pool.require_stake_amount)?;

            Self::deposit_event(Event::Deposit {
                user: who,
                amount_per_node: pool.require_stake_amount,
                first_node_id,
                count,
            });
            Ok(())
        }

        /// Start reward accrual for a deposited node. Owner only.
        #[pallet::call_index(2)]
        #[pallet::weight(
            Weight::from_parts(30_000_000, 0).saturating_add(T::DbWeight::get().reads_writes(4, 3))
        )]
        pub fn enable_address(
            origin: OriginFor<T>,
            user: T::AccountId,
            node_id: NodeIndex,
        ) -> DispatchResult {
            let (_, pool) = Self::ensure_owner(origin)?;
            ensure!(!pool.paused, Error::<T>::PoolPaused);
            let mut node = Self::node(&user, node_id)?;

            let now = frame_system::Pallet::<T>::block_number();
            let mut acc = Self::synced_accumulator(&pool, now);
            node.enable(now, acc.acc_reward_per_node).map_err(Self::ledger_error)?;
            acc.node_started().map_err(Self::ledger_error)?;

            UserAccounts::<T>::mutate(&user, |account| {
                account.running_node_count = account.running_node_count.saturating_add(1)
            });
            Nodes::<T>::insert(&user, node_id, node);
            Accumulator::<T>::put(acc);

            log::info!(
                target: LOG_TARGET,
                "node {} of {:?} enabled at {:?}, {} running",
                node_id,
                user,
                now,
                acc.total_running_node,
            );

            Self::deposit_event(Event::EnableAddress { user, node_id });
            Ok(())
        }

        /// Stop reward accrual for a node, keeping what it earned so far. Owner only.
        #[pallet::call_index(3)]
        #[pallet::weight(
            Weight::from_parts(30_000_000, 0).saturating_add(T::DbWeight::get().reads_writes(4, 3))
        )]
        pub fn disable_address(
            origin: OriginFor<T>,
            user: T::AccountId,
            node_id: NodeIndex,
        ) -> DispatchResult {
            let (_, pool) = Self::ensure_owner(origin)?;
            let mut node = Self::node(&user, node_id)?;

            let now = frame_system::Pallet::<T>::block_number();
            let mut acc = Self::synced_accumulator(&pool, now);
            node.disable(acc.acc_reward_per_node).map_err(Self::ledger_error)?;
            acc.node_stopped();

            UserAccounts::<T>::mutate(&user, |account| {
                account.running_node_count = account.running_node_count.saturating_sub(1)
            });
            Nodes::<T>::insert(&user, node_id, node);
            Accumulator::<T>::put(acc);

            log::info!(
                target: LOG_TARGET,
                "node {} of {:?} disabled at {:?}, settled {:?}",
                node_id,
                user,
                now,
                node.settled_reward,
            );

            Self::deposit_event(Event::DisableAddress { user, node_id });
            Ok(())
        }

        /// Pay out everything the caller's node has earned.
        ///
        /// An unknown `node_id` is not an error: a zero harvest is reported instead.
        #[pallet::call_index(4)]
        #[pallet::weight(
            Weight::from_parts(50_000_000, 0).saturating_add(T::DbWeight::get().reads_writes(6, 5))
        )]
        pub fn claim_reward(origin: OriginFor<T>, node_id: NodeIndex) -> DispatchResult {
            let who = ensure_signed(origin)?;
            let pool = Self::pool_config()?;

            let Some(mut node) = Nodes::<T>::get(&who, node_id) else {
                Self::deposit_event(Event::RewardsHarvested {
                    user: who,
                    amount: Zero::zero(),
                    node_id,
                });
                return Ok(());
            };

            let now = frame_system::Pallet::<T>::block_number();
            let acc = Self::synced_accumulator(&pool, now);
            Self::harvest(&pool, &who, node_id, &mut node, &acc)?;

            Nodes::<T>::insert(&who, node_id, node);
            Accumulator::<T>::put(acc);
            Ok(())
        }

        /// Return a node's principal, claiming its reward first. Only inside a withdraw segment.
        ///
        /// A reward the distributor cannot cover stays on the node for a later `claim_reward`;
        /// the principal is returned regardless.
        #[pallet::call_index(5)]
        #[pallet::weight(
            Weight::from_parts(60_000_000, 0).saturating_add(T::DbWeight::get().reads_writes(7, 7))
        )]
        pub fn withdraw(origin: OriginFor<T>, node_id: NodeIndex) -> DispatchResult {
            let who = ensure_signed(origin)?;
            let pool = Self::pool_config()?;

            let now = frame_system::Pallet::<T>::block_number();
            ensure!(pool.schedule.is_in_withdraw_time(now), Error::<T>::NotInWithdrawWindow);
            let mut node = Self::node(&who, node_id)?;
            ensure!(!node.amount.is_zero(), Error::<T>::NothingToWithdraw);

            let mut acc = Self::synced_accumulator(&pool, now);
            Self::harvest_or_defer(&pool, &who, node_id, &mut node, &acc);

            let (amount, was_running) = node.take_principal().map_err(Self::ledger_error)?;
            if was_running {
                acc.node_stopped();
                UserAccounts::<T>::mutate(&who, |account| {
                    account.running_node_count = account.running_node_count.saturating_sub(1)
                });
            }

            T::Assets::transfer(
                pool.stake_token.clone(),
                &Self::pool_account(),
                &who,
                amount,
                Preservation::Expendable,
            )?;

            Nodes::<T>::insert(&who, node_id, node);
            Accumulator::<T>::put(acc);

            log::info!(target: LOG_TARGET, "node {} of {:?} withdrew {:?}", node_id, who, amount);

            Self::deposit_event(Event::Withdraw { user: who, amount, node_id });
            Ok(())
        }

        /// Stake per node for future deposits. Existing nodes keep their amount.
        #[pallet::call_index(6)]
        #[pallet::weight(
            Weight::from_parts(10_000_000, 0).saturating_add(T::DbWeight::get().reads_writes(1, 1))
        )]
        pub fn set_require_stake_amount(
            origin: OriginFor<T>,
            amount: T::Balance,
        ) -> DispatchResult {
            let (_, mut pool) = Self::ensure_owner(origin)?;
            ensure!(!amount.is_zero(), Error::<T>::InvalidRequireStakeAmount);

            pool.require_stake_amount = amount;
            Pool::<T>::put(pool);

            Self::deposit_event(Event::SetRequireStakeAmount { amount });
            Ok(())
        }

        /// Change the emission rate. Blocks before this one are paid at the old rate.
        #[pallet::call_index(7)]
        #[pallet::weight(
            Weight::from_parts(15_000_000, 0).saturating_add(T::DbWeight::get().reads_writes(2, 2))
        )]
        pub fn set_reward_per_block(origin: OriginFor<T>, amount: T::Balance) -> DispatchResult {
            let (_, mut pool) = Self::ensure_owner(origin)?;

            let acc = Self::synced_accumulator(&pool, frame_system::Pallet::<T>::block_number());
            Accumulator::<T>::put(acc);

            pool.reward_per_block = amount;
            Pool::<T>::put(pool);

            Self::deposit_event(Event::SetRewardPerBlock { amount });
            Ok(())
        }

        #[pallet::call_index(8)]
        #[pallet::weight(
            Weight::from_parts(10_000_000, 0).saturating_add(T::DbWeight::get().reads_writes(1, 1))
        )]
        pub fn set_reward_distributor(
            origin: OriginFor<T>,
            distributor: T::AccountId,
        ) -> DispatchResult {
            let (_, mut pool) = Self::ensure_owner(origin)?;
            ensure!(!Self::is_zero_account(&distributor), Error::<T>::InvalidRewardDistributor);

            pool.reward_distributor = distributor.clone();
            Pool::<T>::put(pool);

            Self::deposit_event(Event::SetRewardDistributor { distributor });
            Ok(())
        }

        /// Replace rate, schedule durations and distributor at once. The start block is fixed.
        #[pallet::call_index(9)]
        #[pallet::weight(
            Weight::from_parts(15_000_000, 0).saturating_add(T::DbWeight::get().reads_writes(2, 2))
        )]
        pub fn set_pool_infor(
            origin: OriginFor<T>,
            reward_per_block: T::Balance,
            lockup_duration: BlockNumberFor<T>,
            withdraw_period: BlockNumberFor<T>,
            reward_distributor: T::AccountId,
        ) -> DispatchResult {
            let (_, mut pool) = Self::ensure_owner(origin)?;
            ensure!(!lockup_duration.is_zero(), Error::<T>::InvalidLockupDuration);
            ensure!(!withdraw_period.is_zero(), Error::<T>::InvalidWithdrawPeriod);
            ensure!(
                !Self::is_zero_account(&reward_distributor),
                Error::<T>::InvalidRewardDistributor
            );

            let acc = Self::synced_accumulator(&pool, frame_system::Pallet::<T>::block_number());
            Accumulator::<T>::put(acc);

            pool.reward_per_block = reward_per_block;
            pool.schedule.lockup_duration = lockup_duration;
            pool.schedule.withdraw_period = withdraw_period;
            pool.reward_distributor = reward_distributor.clone();
            Pool::<T>::put(pool);

            Self::deposit_event(Event::SetPoolInfor {
                reward_per_block,
                lockup_duration,
                withdraw_period,
                reward_distributor,
            });
            Ok(())
        }

        /// Block deposits and node enabling. Claims and withdrawals stay open.
        #[pallet::call_index(10)]
        #[pallet::weight(
            Weight::from_parts(10_000_000, 0).saturating_add(T::DbWeight::get().reads_writes(1, 1))
        )]
        pub fn pause(origin: OriginFor<T>) -> DispatchResult {
            let (who, mut pool) = Self::ensure_owner(origin)?;
            ensure!(!pool.paused, Error::<T>::PoolPaused);

            pool.paused = true;
            Pool::<T>::put(pool);

            Self::deposit_event(Event::Paused { account: who });
            Ok(())
        }

        #[pallet::call_index(11)]
        #[pallet::weight(
            Weight::from_parts(10_000_000, 0).saturating_add(T::DbWeight::get().reads_writes(1, 1))
        )]
        pub fn unpause(origin: OriginFor<T>) -> DispatchResult {
            let (who, mut pool) = Self::ensure_owner(origin)?;
            ensure!(pool.paused, Error::<T>::NotPaused);

            pool.paused = false;
            Pool::<T>::put(pool);

            Self::deposit_event(Event::Unpaused { account: who });
            Ok(())
        }

        #[pallet::call_index(12)]
        #[pallet::weight(
            Weight::from_parts(10_000_000, 0).saturating_add(T::DbWeight::get().reads_writes(1, 1))
        )]
        pub fn transfer_ownership(origin: OriginFor<T>, new_owner: T::AccountId) -> DispatchResult {
            let (previous_owner, mut pool) = Self::ensure_owner(origin)?;
            ensure!(!Self::is_zero_account(&new_owner), Error::<T>::InvalidOwner);

            pool.owner = new_owner.clone();
            Pool::<T>::put(pool);

            Self::deposit_event(Event::OwnershipTransferred { previous_owner, new_owner });
            Ok(())
        }
    }

    impl<T: Config> Pallet<T> {
        /// Keyless account holding every deposited stake unit
        pub fn pool_account() -> T::AccountId {
            T::PalletId::get().into_account_truncating()
        }

        fn pool_config() -> Result<PoolConfigOf<T>, DispatchError> {
            Pool::<T>::get().ok_or_else(|| Error::<T>::NotInitialized.into())
        }

        fn ensure_owner(
            origin: OriginFor<T>,
        ) -> Result<(T::AccountId, PoolConfigOf<T>), DispatchError> {
            let who = ensure_signed(origin)?;
            let pool = Self::pool_config()?;
            ensure!(pool.owner == who, Error::<T>::NotOwner);
            Ok((who, pool))
        }

        fn is_zero_account(who: &T::AccountId) -> bool {
            T::AccountId::decode(&mut TrailingZeroInput::zeroes())
                .map_or(false, |zero| &zero == who)
        }

        fn node(user: &T::AccountId, node_id: NodeIndex) -> Result<NodeOf<T>, DispatchError> {
            Nodes::<T>::get(user, node_id).ok_or_else(|| Error::<T>::InvalidNodeId.into())
        }

        /// Append `count` dormant nodes, returning the index of the first one.
        fn append_nodes(
            who: &T::AccountId,
            count: u32,
            amount: T::Balance,
        ) -> Result<NodeIndex, DispatchError> {
            ensure!(count > 0, Error::<T>::InvalidAmount);
            UserAccounts::<T>::try_mutate(who, |account| -> Result<NodeIndex, DispatchError> {
                let first = account.node_count;
                let end = first.checked_add(count).ok_or(ArithmeticError::Overflow)?;
                for index in first..end {
                    Nodes::<T>::insert(who, index, NodeOf::<T>::dormant(amount));
                }
                account.node_count = end;
                Ok(first)
            })
        }

        /// Accumulator brought up to `now`. The caller persists it.
        fn synced_accumulator(pool: &PoolConfigOf<T>, now: BlockNumberFor<T>) -> AccumulatorOf<T> {
            let mut acc = Accumulator::<T>::get();
            acc.sync(pool.reward_per_block, now);
            log::debug!(
                target: LOG_TARGET,
                "accumulator synced at {:?}: {:?} per node, {} running",
                now,
                acc.acc_reward_per_node,
                acc.total_running_node,
            );
            acc
        }

        /// Settle the node against `acc`, pay the owed amount and report the harvest.
        fn harvest(
            pool: &PoolConfigOf<T>,
            who: &T::AccountId,
            node_id: NodeIndex,
            node: &mut NodeOf<T>,
            acc: &AccumulatorOf<T>,
        ) -> Result<T::Balance, DispatchError> {
            let owed = node.settle_and_clear(acc.acc_reward_per_node);
            if !owed.is_zero() {
                Self::pay_reward(pool, who, owed)?;
            }
            log::debug!(target: LOG_TARGET, "node {} of {:?} harvested {:?}", node_id, who, owed);

            Self::deposit_event(Event::RewardsHarvested {
                user: who.clone(),
                amount: owed,
                node_id,
            });
            Ok(owed)
        }

        /// `harvest`, except that a failed payout keeps the owed amount in `settled_reward`
        /// instead of failing the caller.
        fn harvest_or_defer(
            pool: &PoolConfigOf<T>,
            who: &T::AccountId,
            node_id: NodeIndex,
            node: &mut NodeOf<T>,
            acc: &AccumulatorOf<T>,
        ) {
            let owed = node.total_owed(acc.acc_reward_per_node);
            let paid = with_storage_layer::<_, DispatchError, _>(|| {
                Self::harvest(pool, who, node_id, node, acc)
            });
            if let Err(e) = paid {
                node.settled_reward = owed;
                log::warn!(
                    target: LOG_TARGET,
                    "node {} of {:?}: payout of {:?} deferred: {:?}",
                    node_id,
                    who,
                    owed,
                    e,
                );
            }
        }

        /// Pull `amount` of the reward asset from the distributor to `who`.
        fn pay_reward(
            pool: &PoolConfigOf<T>,
            who: &T::AccountId,
            amount: T::Balance,
        ) -> DispatchResult {
            let pool_account = Self::pool_account();
            let allowance = <T::Assets as approvals::Inspect<T::AccountId>>::allowance(
                pool.reward_token.clone(),
                &pool.reward_distributor,
                &pool_account,
            );
            let available = T::Assets::reducible_balance(
                pool.reward_token.clone(),
                &pool.reward_distributor,
                Preservation::Expendable,
                Fortitude::Polite,
            );
            if allowance < amount || available < amount {
                log::warn!(
                    target: LOG_TARGET,
                    "distributor {:?} cannot cover {:?}: allowance {:?}, balance {:?}",
                    pool.reward_distributor,
                    amount,
                    allowance,
                    available,
                );
                return Err(Error::<T>::InsufficientRewardSupply.into());
            }

            <T::Assets as approvals::Mutate<T::AccountId>>::transfer_from(
                pool.reward_token.clone(),
                &pool.reward_distributor,
                &pool_account,
                who,
                amount,
            )
        }

        fn ledger_error(e: LedgerError) -> DispatchError {
            match e {
                LedgerError::AlreadyEnabled => Error::<T>::AlreadyEnabled.into(),
                LedgerError::AlreadyDisabled => Error::<T>::AlreadyDisabled.into(),
                LedgerError::CannotReenable => Error::<T>::CannotReenable.into(),
                LedgerError::NodeWithdrawn => Error::<T>::NodeWithdrawn.into(),
                LedgerError::NothingToWithdraw => Error::<T>::NothingToWithdraw.into(),
                LedgerError::Overflow => ArithmeticError::Overflow.into(),
            }
        }

        /// Everything `node_id` of `user` could claim right now. Nothing is persisted.
        ///
        /// Saturates at `Balance::max_value()`.
        pub fn pending_reward(user: &T::AccountId, node_id: NodeIndex) -> T::Balance {
            let (Some(pool), Some(node)) = (Pool::<T>::get(), Nodes::<T>::get(user, node_id)) else {
                return Zero::zero();
            };
            let now = frame_system::Pallet::<T>::block_number();
            node.total_owed(Accumulator::<T>::get().projected(pool.reward_per_block, now))
        }

        pub fn total_reward(user: &T::AccountId, node_id: NodeIndex) -> T::Balance {
            Self::pending_reward(user, node_id)
        }

        pub fn get_pending_reward(user: &T::AccountId, node_id: NodeIndex) -> T::Balance {
            Self::pending_reward(user, node_id)
        }

        pub fn user_node_count(user: &T::AccountId) -> u32 {
            UserAccounts::<T>::get(user).node_count
        }

        pub fn user_running_node(user: &T::AccountId) -> u32 {
            UserAccounts::<T>::get(user).running_node_count
        }

        pub fn total_running_node() -> u32 {
            Accumulator::<T>::get().total_running_node
        }

        pub fn get_user_node_info(user: &T::AccountId, node_id: NodeIndex) -> Option<NodeOf<T>> {
            Nodes::<T>::get(user, node_id)
        }

        pub fn pool_name() -> Vec<u8> {
            PoolName::<T>::get().into_inner()
        }

        pub fn pool_symbol() -> Vec<u8> {
            PoolSymbol::<T>::get().into_inner()
        }

        pub fn owner() -> Option<T::AccountId> {
            Pool::<T>::get().map(|pool| pool.owner)
        }

        pub fn stake_token() -> Option<T::AssetId> {
            Pool::<T>::get().map(|pool| pool.stake_token)
        }

        pub fn reward_token() -> Option<T::AssetId> {
            Pool::<T>::get().map(|pool| pool.reward_token)
        }

        pub fn require_stake_amount() -> Option<T::Balance> {
            Pool::<T>::get().map(|pool| pool.require_stake_amount)
        }

        pub fn reward_per_block() -> Option<T::Balance> {
            Pool::<T>::get().map(|pool| pool.reward_per_block)
        }

        pub fn lockup_duration() -> Option<BlockNumberFor<T>> {
            Pool::<T>::get().map(|pool| pool.schedule.lockup_duration)
        }

        pub fn withdraw_period() -> Option<BlockNumberFor<T>> {
            Pool::<T>::get().map(|pool| pool.schedule.withdraw_period)
        }

        pub fn reward_distributor() -> Option<T::AccountId> {
            Pool::<T>::get().map(|pool| pool.reward_distributor)
        }

        pub fn paused() -> bool {
            Pool::<T>::get().map_or(false, |pool| pool.paused)
        }

        pub fn is_in_withdraw_time() -> bool {
            let now = frame_system::Pallet::<T>::block_number();
            Pool::<T>::get().map_or(false, |pool| pool.schedule.is_in_withdraw_time(now))
        }

        pub fn get_next_start_locking_time() -> Option<BlockNumberFor<T>> {
            let now = frame_system::Pallet::<T>::block_number();
            Pool::<T>::get().map(|pool| pool.schedule.next_start_locking_time(now, now))
        }

        pub fn get_last_end_locking_time() -> Option<BlockNumberFor<T>> {
            let now = frame_system::Pallet::<T>::block_number();
            Pool::<T>::get().map(|pool| pool.schedule.last_end_locking_time(now))
        }
    }
}
