//! Reward accumulator and per-node bookkeeping.

use codec::{Decode, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use sp_runtime::{
    helpers_128bit::multiply_by_rational_with_rounding,
    traits::{AtLeast32BitUnsigned, SaturatedConversion},
    Rounding, RuntimeDebug,
};

use crate::window::time_multiplier;

/// Index of a node inside one user's node list.
pub type NodeIndex = u32;

#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode, TypeInfo, RuntimeDebug)]
pub enum LedgerError {
    AlreadyEnabled,
    AlreadyDisabled,
    /// A disabled node never returns to the active set.
    CannotReenable,
    NodeWithdrawn,
    NothingToWithdraw,
    Overflow,
}

/// Pool-wide reward per active node, synced lazily.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, Encode, Decode, MaxEncodedLen, TypeInfo, RuntimeDebug,
)]
pub struct PoolAccumulator<Balance, BlockNumber> {
    pub total_running_node: u32,
    pub acc_reward_per_node: Balance,
    pub last_reward_block: BlockNumber,
}

impl<B, N> PoolAccumulator<B, N>
where
    B: AtLeast32BitUnsigned + Copy,
    N: AtLeast32BitUnsigned + Copy,
{
    pub fn new(start_block: N) -> Self {
        Self {
            total_running_node: 0,
            acc_reward_per_node: B::zero(),
            last_reward_block: start_block,
        }
    }

    /// Value of `acc_reward_per_node` as of `now`, without committing it.
    ///
    /// The per-node increment is `reward_per_block * elapsed / total_running_node`, computed in
    /// 128 bits. Results beyond `Balance::max_value()` saturate.
    pub fn projected(&self, reward_per_block: B, now: N) -> B {
        let elapsed = time_multiplier(self.last_reward_block, now, now);
        if elapsed.is_zero() || self.total_running_node == 0 {
            return self.acc_reward_per_node;
        }
        let increment = multiply_by_rational_with_rounding(
            reward_per_block.saturated_into::<u128>(),
            elapsed.saturated_into::<u128>(),
            u128::from(self.total_running_node),
            Rounding::Down,
        )
        .unwrap_or(u128::MAX);
        self.acc_reward_per_node.saturating_add(increment.saturated_into())
    }

    /// Bring the accumulator up to `now`. Must run before the running-node count changes.
    ///
    /// An empty pool still moves `last_reward_block` forward, so idle blocks are never paid out
    /// later.
    pub fn sync(&mut self, reward_per_block: B, now: N) {
        if now <= self.last_reward_block {
            return;
        }
        self.acc_reward_per_node = self.projected(reward_per_block, now);
        self.last_reward_block = now;
    }

    pub fn node_started(&mut self) -> Result<(), LedgerError> {
        self.total_running_node =
            self.total_running_node.checked_add(1).ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    pub fn node_stopped(&mut self) {
        self.total_running_node = self.total_running_node.saturating_sub(1);
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode, MaxEncodedLen, TypeInfo, RuntimeDebug)]
pub enum NodeStatus<BlockNumber> {
    /// Deposited, waiting for the pool owner.
    Dormant,
    Active { since: BlockNumber },
    Disabled,
    /// Principal returned. Terminal.
    Withdrawn,
}

#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode, MaxEncodedLen, TypeInfo, RuntimeDebug)]
pub struct Node<Balance, BlockNumber> {
    pub amount: Balance,
    pub status: NodeStatus<BlockNumber>,
    pub reward_debt: Balance,
    pub settled_reward: Balance,
}

impl<B, N> Node<B, N>
where
    B: AtLeast32BitUnsigned + Copy,
    N: AtLeast32BitUnsigned + Copy,
{
    pub fn dormant(amount: B) -> Self {
        Self {
            amount,
            status: NodeStatus::Dormant,
            reward_debt: B::zero(),
            settled_reward: B::zero(),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, NodeStatus::Active { .. })
    }

    /// Block the node was enabled at, zero when it is not running.
    pub fn enable_block(&self) -> N {
        match self.status {
            NodeStatus::Active { since } => since,
            _ => N::zero(),
        }
    }

    pub fn enable(&mut self, now: N, acc: B) -> Result<(), LedgerError> {
        match self.status {
            NodeStatus::Dormant => {
                self.status = NodeStatus::Active { since: now };
                self.reward_debt = acc;
                Ok(())
            },
            NodeStatus::Active { .. } => Err(LedgerError::AlreadyEnabled),
            NodeStatus::Disabled => Err(LedgerError::CannotReenable),
            NodeStatus::Withdrawn => Err(LedgerError::NodeWithdrawn),
        }
    }

    pub fn disable(&mut self, acc: B) -> Result<(), LedgerError> {
        if !self.is_active() {
            return Err(LedgerError::AlreadyDisabled);
        }
        self.settled_reward = self.total_owed(acc);
        self.status = NodeStatus::Disabled;
        Ok(())
    }

    /// Share earned since the last snapshot. Inactive nodes already folded theirs into
    /// `settled_reward`.
    pub fn unrealized(&self, acc: B) -> B {
        if self.is_active() {
            acc.saturating_sub(self.reward_debt)
        } else {
            B::zero()
        }
    }

    pub fn total_owed(&self, acc: B) -> B {
        self.settled_reward.saturating_add(self.unrealized(acc))
    }

    /// Realize everything owed so far and hand it to the caller for payout.
    pub fn settle_and_clear(&mut self, acc: B) -> B {
        let owed = self.total_owed(acc);
        self.settled_reward = B::zero();
        if self.is_active() {
            self.reward_debt = acc;
        }
        owed
    }

    /// Take the principal out of the node, leaving an inert record.
    ///
    /// Returns the principal and whether the node was still running. Reward must be settled
    /// beforehand.
    pub fn take_principal(&mut self) -> Result<(B, bool), LedgerError> {
        if self.amount.is_zero() {
            return Err(LedgerError::NothingToWithdraw);
        }
        let was_active = self.is_active();
        let amount = self.amount;
        self.amount = B::zero();
        self.status = NodeStatus::Withdrawn;
        Ok((amount, was_active))
    }
}

#[derive(
    Clone, Copy, Default, PartialEq, Eq, Encode, Decode, MaxEncodedLen, TypeInfo, RuntimeDebug,
)]
pub struct UserAccount {
    /// Nodes ever deposited. Also the next free `NodeIndex`.
    pub node_count: NodeIndex,
    pub running_node_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    type Acc = PoolAccumulator<u128, u64>;
    type TestNode = Node<u128, u64>;

    const RPB: u128 = 1_000;

    #[test]
    fn empty_pool_accrues_nothing_but_advances() {
        let mut acc = Acc::new(1);
        acc.sync(RPB, 50);
        assert_eq!(acc.acc_reward_per_node, 0);
        assert_eq!(acc.last_reward_block, 50);
    }

    #[test]
    fn sync_before_start_keeps_start() {
        let mut acc = Acc::new(100);
        acc.node_started().unwrap();
        acc.sync(RPB, 40);
        assert_eq!(acc.last_reward_block, 100);
        acc.sync(RPB, 110);
        assert_eq!(acc.acc_reward_per_node, 10 * RPB);
    }

    #[test]
    fn projection_does_not_commit() {
        let mut acc = Acc::new(0);
        acc.node_started().unwrap();
        assert_eq!(acc.projected(RPB, 10), 10 * RPB);
        assert_eq!(acc.acc_reward_per_node, 0);
        assert_eq!(acc.last_reward_block, 0);
    }

    #[test]
    fn reward_splits_across_running_nodes() {
        let mut acc = Acc::new(0);
        let mut a = TestNode::dormant(100);
        let mut b = TestNode::dormant(100);

        acc.sync(RPB, 10);
        acc.node_started().unwrap();
        a.enable(10, acc.acc_reward_per_node).unwrap();

        acc.sync(RPB, 20);
        acc.node_started().unwrap();
        b.enable(20, acc.acc_reward_per_node).unwrap();

        let now = acc.projected(RPB, 30);
        assert_eq!(a.total_owed(now), RPB * 10 + RPB * 10 / 2);
        assert_eq!(b.total_owed(now), RPB * 10 / 2);
    }

    #[test]
    fn disable_folds_share_into_settled() {
        let mut acc = Acc::new(0);
        let mut node = TestNode::dormant(100);
        acc.node_started().unwrap();
        node.enable(0, 0).unwrap();

        acc.sync(RPB, 7);
        node.disable(acc.acc_reward_per_node).unwrap();
        acc.node_stopped();

        assert_eq!(node.settled_reward, 7 * RPB);
        assert_eq!(node.enable_block(), 0);
        // nothing more accrues once disabled
        assert_eq!(node.total_owed(acc.projected(RPB, 100)), 7 * RPB);
    }

    #[test]
    fn lifecycle_errors() {
        let mut node = TestNode::dormant(100);
        assert_eq!(node.disable(0), Err(LedgerError::AlreadyDisabled));
        node.enable(3, 0).unwrap();
        assert_eq!(node.enable_block(), 3);
        assert_eq!(node.enable(4, 0), Err(LedgerError::AlreadyEnabled));
        node.disable(0).unwrap();
        assert_eq!(node.disable(0), Err(LedgerError::AlreadyDisabled));
        assert_eq!(node.enable(5, 0), Err(LedgerError::CannotReenable));
        node.take_principal().unwrap();
        assert_eq!(node.enable(6, 0), Err(LedgerError::NodeWithdrawn));
        assert_eq!(node.take_principal(), Err(LedgerError::NothingToWithdraw));
    }

    #[test]
    fn settle_then_owed_is_zero() {
        let mut node = TestNode::dormant(100);
        node.enable(0, 0).unwrap();
        assert_eq!(node.settle_and_clear(4_000), 4_000);
        assert_eq!(node.total_owed(4_000), 0);
        assert_eq!(node.total_owed(4_500), 500);
    }

    #[test]
    fn take_principal_reports_running_state() {
        let mut node = TestNode::dormant(100);
        node.enable(1, 0).unwrap();
        assert_eq!(node.take_principal(), Ok((100, true)));
        assert_eq!(node.amount, 0);
        assert_eq!(node.status, NodeStatus::Withdrawn);

        let mut dormant = TestNode::dormant(100);
        assert_eq!(dormant.take_principal(), Ok((100, false)));
    }

    #[test]
    fn large_rate_divides_before_truncating() {
        // rate * elapsed exceeds u64, the per-node share does not
        let mut acc = PoolAccumulator::<u64, u64>::new(0);
        for _ in 0..4 {
            acc.node_started().unwrap();
        }
        let rate = 1_000_000_000_000_000_000u64;
        acc.sync(rate, 30);
        assert_eq!(acc.acc_reward_per_node, 7_500_000_000_000_000_000);
    }

    #[test]
    fn accumulator_saturates_instead_of_failing() {
        let mut acc = PoolAccumulator::<u64, u64>::new(0);
        acc.node_started().unwrap();
        acc.sync(u64::MAX / 2, 10);
        assert_eq!(acc.acc_reward_per_node, u64::MAX);
        assert_eq!(acc.last_reward_block, 10);

        acc.sync(u64::MAX / 2, 20);
        assert_eq!(acc.acc_reward_per_node, u64::MAX);
        let node = Node::<u64, u64> { settled_reward: 5, ..Node::dormant(1) };
        assert_eq!(node.total_owed(acc.acc_reward_per_node), 5);
    }
}
