//! # Node Staking CLI
//!
//! Off-chain companion for the node staking pool:
//! - Inspect where a block falls in the lock / withdraw cycle
//! - Replay a scenario of node steps and print what every node is owed
//!
//! ## Usage
//!
//! ```bash
//! # Is block 485 withdrawable for a pool started at 15 with a 10/10 cycle?
//! node-staking window --block 485 --start 15
//!
//! # Replay a scenario file
//! node-staking simulate scenarios/pro_rata.json
//! ```

mod scenario;

use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{Parser, Subcommand};
use node_staking_primitives::{WindowSchedule, DEFAULT_LOCKUP_DURATION, DEFAULT_WITHDRAW_PERIOD};

use crate::scenario::{replay, Report, Scenario, ScenarioError};

#[derive(Parser)]
#[command(name = "node-staking")]
#[command(about = "Node staking pool tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the cycle position of a block
    Window {
        /// Block to inspect
        #[arg(short, long)]
        block: u64,

        /// Pool start block
        #[arg(short, long, default_value_t = 0)]
        start: u64,

        /// Lock segment length in blocks
        #[arg(short, long, default_value_t = u64::from(DEFAULT_LOCKUP_DURATION))]
        lockup: u64,

        /// Withdraw segment length in blocks
        #[arg(short, long, default_value_t = u64::from(DEFAULT_WITHDRAW_PERIOD))]
        withdraw: u64,
    },

    /// Replay a JSON scenario and report rewards per node
    Simulate {
        /// Scenario file
        scenario: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn print_window(schedule: &WindowSchedule<u64>, block: u64) {
    let in_withdraw = schedule.is_in_withdraw_time(block);
    println!("block          {block}");
    println!("cycle          {} + {}", schedule.lockup_duration, schedule.withdraw_period);
    println!("phase          {} / {}", schedule.phase(block), schedule.cycle_length());
    println!("segment        {}", if in_withdraw { "withdraw" } else { "lock" });
    println!("next lock      {}", schedule.next_start_locking_time(block, block));
    println!("last lock end  {}", schedule.last_end_locking_time(block));
}

fn print_report(report: &Report) {
    println!(
        "block {}, {} running, {} per node",
        report.block, report.running_nodes, report.acc_reward_per_node
    );
    println!();
    println!("{:<16} {:<20} {:>14} {:>14}", "node", "status", "claimed", "owed");
    for node in &report.nodes {
        println!("{:<16} {:<20} {:>14} {:>14}", node.node, node.status, node.claimed, node.owed);
    }
}

fn simulate(path: &Path, json: bool) -> Result<(), ScenarioError> {
    let raw = fs::read_to_string(path)?;
    let report = replay(&Scenario::from_json(&raw)?)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Window { block, start, lockup, withdraw } => {
            print_window(&WindowSchedule::new(start, lockup, withdraw), block);
            Ok(())
        },
        Commands::Simulate { scenario, json } => simulate(&scenario, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        },
    }
}
