//! Off-chain replay of node enable / disable / claim / withdraw steps through the same
//! accumulator and ledger the pallet uses.

use std::collections::BTreeMap;

use node_staking_primitives::{
    LedgerError, Node, NodeStatus, PoolAccumulator, WindowSchedule, DEFAULT_LOCKUP_DURATION,
    DEFAULT_WITHDRAW_PERIOD,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("failed to read scenario: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid scenario: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("step {index}: block {block} comes before block {previous}")]
    OutOfOrder { index: usize, block: u64, previous: u64 },
    #[error("step {index}: node {node}: {reason:?}")]
    Ledger { index: usize, node: String, reason: LedgerError },
    #[error("step {index}: block {block} is not in a withdraw window")]
    NotInWithdrawWindow { index: usize, block: u64 },
    #[error("end block {end} comes before the last step at {last}")]
    EndBeforeLastStep { end: u64, last: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Enable,
    Disable,
    Claim,
    Withdraw,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    pub block: u64,
    /// Free-form label, a node is created dormant the first time it is named.
    pub node: String,
    pub action: Action,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub start_block: u64,
    pub reward_per_block: u128,
    #[serde(default = "default_lockup_duration")]
    pub lockup_duration: u64,
    #[serde(default = "default_withdraw_period")]
    pub withdraw_period: u64,
    #[serde(default = "default_stake_per_node")]
    pub stake_per_node: u128,
    /// Block the report is taken at. Defaults to the last step.
    #[serde(default)]
    pub end_block: Option<u64>,
    pub steps: Vec<Step>,
}

fn default_lockup_duration() -> u64 {
    DEFAULT_LOCKUP_DURATION.into()
}

fn default_withdraw_period() -> u64 {
    DEFAULT_WITHDRAW_PERIOD.into()
}

fn default_stake_per_node() -> u128 {
    1
}

impl Scenario {
    pub fn from_json(raw: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn schedule(&self) -> WindowSchedule<u64> {
        WindowSchedule::new(self.start_block, self.lockup_duration, self.withdraw_period)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeReport {
    pub node: String,
    pub status: String,
    /// Paid out by claim and withdraw steps.
    pub claimed: u128,
    /// Still claimable at the report block.
    pub owed: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub block: u64,
    pub running_nodes: u32,
    pub acc_reward_per_node: u128,
    pub nodes: Vec<NodeReport>,
}

impl Report {
    pub fn node(&self, label: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| n.node == label)
    }
}

struct Tracked {
    node: Node<u128, u64>,
    claimed: u128,
}

pub fn replay(scenario: &Scenario) -> Result<Report, ScenarioError> {
    let schedule = scenario.schedule();
    let rate = scenario.reward_per_block;
    let mut acc = PoolAccumulator::<u128, u64>::new(scenario.start_block);
    let mut nodes: BTreeMap<String, Tracked> = BTreeMap::new();
    let mut last = 0u64;

    for (index, step) in scenario.steps.iter().enumerate() {
        if step.block < last {
            return Err(ScenarioError::OutOfOrder { index, block: step.block, previous: last });
        }
        last = step.block;

        let ledger = |reason| ScenarioError::Ledger { index, node: step.node.clone(), reason };
        acc.sync(rate, step.block);

        let tracked = nodes
            .entry(step.node.clone())
            .or_insert_with(|| Tracked {
                node: Node::dormant(scenario.stake_per_node),
                claimed: 0,
            });

        match step.action {
            Action::Enable => {
                tracked.node.enable(step.block, acc.acc_reward_per_node).map_err(ledger)?;
                acc.node_started().map_err(ledger)?;
            },
            Action::Disable => {
                tracked.node.disable(acc.acc_reward_per_node).map_err(ledger)?;
                acc.node_stopped();
            },
            Action::Claim => {
                let owed = tracked.node.settle_and_clear(acc.acc_reward_per_node);
                tracked.claimed = tracked.claimed.saturating_add(owed);
            },
            Action::Withdraw => {
                if !schedule.is_in_withdraw_time(step.block) {
                    return Err(ScenarioError::NotInWithdrawWindow { index, block: step.block });
                }
                let owed = tracked.node.settle_and_clear(acc.acc_reward_per_node);
                tracked.claimed = tracked.claimed.saturating_add(owed);
                let (_, was_running) = tracked.node.take_principal().map_err(ledger)?;
                if was_running {
                    acc.node_stopped();
                }
            },
        }
    }

    let end = scenario.end_block.unwrap_or(last);
    if end < last {
        return Err(ScenarioError::EndBeforeLastStep { end, last });
    }
    let projected = acc.projected(rate, end);

    let nodes = nodes
        .into_iter()
        .map(|(label, tracked)| NodeReport {
            status: status_label(&tracked.node.status),
            claimed: tracked.claimed,
            owed: tracked.node.total_owed(projected),
            node: label,
        })
        .collect();

    Ok(Report {
        block: end,
        running_nodes: acc.total_running_node,
        acc_reward_per_node: projected,
        nodes,
    })
}

fn status_label(status: &NodeStatus<u64>) -> String {
    match status {
        NodeStatus::Dormant => "dormant".into(),
        NodeStatus::Active { since } => format!("active since {since}"),
        NodeStatus::Disabled => "disabled".into(),
        NodeStatus::Withdrawn => "withdrawn".into(),
    }
}
