use crate as pallet_node_staking;
use frame_support::{
    derive_impl, parameter_types,
    traits::{AsEnsureOriginWithArg, ConstU32},
    PalletId,
};
use frame_system::{EnsureRoot, EnsureSigned};
use sp_runtime::{traits::IdentityLookup, BuildStorage};

type Block = frame_system::mocking::MockBlock<Test>;

frame_support::construct_runtime!(
    pub enum Test {
        System: frame_system,
        Balances: pallet_balances,
        Assets: pallet_assets,
        NodeStaking: pallet_node_staking,
    }
);

#[derive_impl(frame_system::config_preludes::TestDefaultConfig)]
impl frame_system::Config for Test {
    type Block = Block;
    type AccountId = u64;
    type Lookup = IdentityLookup<Self::AccountId>;
    type AccountData = pallet_balances::AccountData<u64>;
}

#[derive_impl(pallet_balances::config_preludes::TestDefaultConfig)]
impl pallet_balances::Config for Test {
    type AccountStore = System;
}

#[derive_impl(pallet_assets::config_preludes::TestDefaultConfig)]
impl pallet_assets::Config for Test {
    type Currency = Balances;
    type CreateOrigin = AsEnsureOriginWithArg<EnsureSigned<u64>>;
    type ForceOrigin = EnsureRoot<u64>;
    type Freezer = ();
}

parameter_types! {
    pub const NodeStakingPalletId: PalletId = PalletId(*b"py/nodst");
}

impl pallet_node_staking::Config for Test {
    type RuntimeEvent = RuntimeEvent;
    type AssetId = u32;
    type Balance = u64;
    type Assets = Assets;
    type InitializeOrigin = EnsureRoot<u64>;
    type PalletId = NodeStakingPalletId;
    type MaxNodesPerDeposit = ConstU32<50>;
    type StringLimit = ConstU32<32>;
}

pub const OWNER: u64 = 1;
pub const ALICE: u64 = 2;
pub const BOB: u64 = 3;
pub const DISTRIBUTOR: u64 = 4;
pub const CHARLIE: u64 = 5;

pub const STAKE_ASSET: u32 = 1;
pub const REWARD_ASSET: u32 = 2;

pub const REQUIRE_STAKE: u64 = 100;
pub const REWARD_PER_BLOCK: u64 = 1_000;
pub const INITIAL_STAKE_BALANCE: u64 = 10_000;
pub const INITIAL_REWARD_SUPPLY: u64 = 1_000_000_000;

pub struct ExtBuilder {
    initialize: bool,
    start_block: u64,
    lockup_duration: u64,
    withdraw_period: u64,
    reward_per_block: u64,
}

impl Default for ExtBuilder {
    fn default() -> Self {
        Self {
            initialize: true,
            start_block: 1,
            lockup_duration: 10,
            withdraw_period: 10,
            reward_per_block: REWARD_PER_BLOCK,
        }
    }
}

impl ExtBuilder {
    pub fn uninitialized() -> Self {
        Self { initialize: false, ..Default::default() }
    }

    pub fn start_block(mut self, start_block: u64) -> Self {
        self.start_block = start_block;
        self
    }

    pub fn schedule(mut self, lockup_duration: u64, withdraw_period: u64) -> Self {
        self.lockup_duration = lockup_duration;
        self.withdraw_period = withdraw_period;
        self
    }

    pub fn reward_per_block(mut self, reward_per_block: u64) -> Self {
        self.reward_per_block = reward_per_block;
        self
    }

    pub fn build(self) -> sp_io::TestExternalities {
        let mut t = frame_system::GenesisConfig::<Test>::default().build_storage().unwrap();

        pallet_balances::GenesisConfig::<Test> {
            balances: vec![
                (OWNER, 1_000),
                (ALICE, 1_000),
                (BOB, 1_000),
                (DISTRIBUTOR, 1_000),
                (CHARLIE, 1_000),
            ],
            ..Default::default()
        }
        .assimilate_storage(&mut t)
        .unwrap();

        pallet_assets::GenesisConfig::<Test> {
            assets: vec![(STAKE_ASSET, OWNER, true, 1), (REWARD_ASSET, OWNER, true, 1)],
            accounts: vec![
                (STAKE_ASSET, ALICE, INITIAL_STAKE_BALANCE),
                (STAKE_ASSET, BOB, INITIAL_STAKE_BALANCE),
                (STAKE_ASSET, CHARLIE, INITIAL_STAKE_BALANCE),
                (REWARD_ASSET, OWNER, INITIAL_REWARD_SUPPLY),
                (REWARD_ASSET, DISTRIBUTOR, INITIAL_REWARD_SUPPLY),
            ],
            ..Default::default()
        }
        .assimilate_storage(&mut t)
        .unwrap();

        let mut ext: sp_io::TestExternalities = t.into();
        ext.execute_with(|| {
            System::set_block_number(1);
            if self.initialize {
                initialize_pool(
                    self.start_block,
                    self.lockup_duration,
                    self.withdraw_period,
                    self.reward_per_block,
                );
                approve_rewards(OWNER, INITIAL_REWARD_SUPPLY);
            }
        });
        ext
    }
}

pub fn initialize_pool(
    start_block: u64,
    lockup_duration: u64,
    withdraw_period: u64,
    reward_per_block: u64,
) {
    NodeStaking::initialize(
        RuntimeOrigin::root(),
        b"Node Pool".to_vec().try_into().unwrap(),
        b"NODE".to_vec().try_into().unwrap(),
        REWARD_ASSET,
        reward_per_block,
        REQUIRE_STAKE,
        start_block,
        STAKE_ASSET,
        lockup_duration,
        withdraw_period,
        OWNER,
    )
    .unwrap();
}

/// `distributor` lets the pool account pull up to `amount` reward tokens.
pub fn approve_rewards(distributor: u64, amount: u64) {
    Assets::approve_transfer(
        RuntimeOrigin::signed(distributor),
        REWARD_ASSET,
        NodeStaking::pool_account(),
        amount,
    )
    .unwrap();
}

pub fn run_to_block(n: u64) {
    System::set_block_number(n);
}

pub fn stake_balance(who: u64) -> u64 {
    Assets::balance(STAKE_ASSET, who)
}

pub fn reward_balance(who: u64) -> u64 {
    Assets::balance(REWARD_ASSET, who)
}
