//! Lock / withdraw cycle arithmetic.
//!
//! A pool alternates between a lock segment of `lockup_duration` blocks and a withdraw segment
//! of `withdraw_period` blocks, starting at `start_block`. Everything here is a pure function of
//! the schedule and the block numbers passed in.

use codec::{Decode, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use sp_runtime::{traits::AtLeast32BitUnsigned, RuntimeDebug};

#[derive(
    Clone, Copy, Default, PartialEq, Eq, Encode, Decode, MaxEncodedLen, TypeInfo, RuntimeDebug,
)]
pub struct WindowSchedule<BlockNumber> {
    /// First block of the first lock segment. Fixed at pool creation.
    pub start_block: BlockNumber,
    pub lockup_duration: BlockNumber,
    pub withdraw_period: BlockNumber,
}

impl<N: AtLeast32BitUnsigned + Copy> WindowSchedule<N> {
    pub fn new(start_block: N, lockup_duration: N, withdraw_period: N) -> Self {
        Self { start_block, lockup_duration, withdraw_period }
    }

    pub fn cycle_length(&self) -> N {
        self.lockup_duration.saturating_add(self.withdraw_period)
    }

    /// Offset of `block` inside its cycle. Zero at or before the pool start.
    pub fn phase(&self, block: N) -> N {
        let cycle = self.cycle_length();
        if block <= self.start_block || cycle.is_zero() {
            return N::zero();
        }
        (block - self.start_block) % cycle
    }

    pub fn is_in_withdraw_time(&self, block: N) -> bool {
        block > self.start_block && self.phase(block) >= self.lockup_duration
    }

    /// First block of the next lock segment that has not begun yet.
    ///
    /// Before the pool starts there is nothing to wait for and `now` is returned.
    pub fn next_start_locking_time(&self, block: N, now: N) -> N {
        if block <= self.start_block {
            return now;
        }
        let cycle_start = block - self.phase(block);
        cycle_start.saturating_add(self.cycle_length())
    }

    /// Most recent block at which a lock segment ended (a withdraw segment started).
    ///
    /// Returns `block` itself while the pool has not started or is still inside its very first
    /// lock segment.
    pub fn last_end_locking_time(&self, block: N) -> N {
        if block <= self.start_block {
            return block;
        }
        let phase = self.phase(block);
        let cycle_start = block - phase;
        if phase >= self.lockup_duration {
            return cycle_start + self.lockup_duration;
        }
        if cycle_start >= self.start_block.saturating_add(self.cycle_length()) {
            cycle_start - self.withdraw_period
        } else {
            block
        }
    }
}

/// Blocks of accrual between `from` and `to`, never counting past `now`.
pub fn time_multiplier<N: AtLeast32BitUnsigned + Copy>(from: N, to: N, now: N) -> N {
    to.min(now).saturating_sub(from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ten_ten(start: u64) -> WindowSchedule<u64> {
        WindowSchedule::new(start, 10, 10)
    }

    #[test]
    fn withdraw_time_matches_deployment_fixture() {
        // The reference pool was created at block 15 with a 10/10 cycle.
        let s = ten_ten(15);
        assert!(!s.is_in_withdraw_time(480));
        assert!(s.is_in_withdraw_time(485));
        assert!(s.is_in_withdraw_time(490));
        assert!(!s.is_in_withdraw_time(495));
    }

    #[test]
    fn withdraw_time_is_periodic() {
        let s = ten_ten(15);
        for block in 16..200u64 {
            assert_eq!(s.is_in_withdraw_time(block), s.is_in_withdraw_time(block + 20));
        }
    }

    #[test]
    fn nothing_is_withdrawable_before_start() {
        let s = ten_ten(100);
        assert!(!s.is_in_withdraw_time(0));
        assert!(!s.is_in_withdraw_time(100));
        assert_eq!(s.phase(50), 0);
    }

    #[test]
    fn segment_boundaries() {
        let s = ten_ten(0);
        assert!(!s.is_in_withdraw_time(9));
        assert!(s.is_in_withdraw_time(10));
        assert!(s.is_in_withdraw_time(19));
        assert!(!s.is_in_withdraw_time(20));
    }

    #[test]
    fn next_start_locking_regression_vectors() {
        assert_eq!(ten_ten(0).next_start_locking_time(700, 700), 720);
        assert_eq!(ten_ten(10).next_start_locking_time(690, 690), 710);
    }

    #[test]
    fn next_start_locking_inside_cycle() {
        let s = ten_ten(15);
        // cycle [695, 715): lock 695..704, withdraw 705..714
        assert_eq!(s.next_start_locking_time(700, 700), 715);
        assert_eq!(s.next_start_locking_time(710, 710), 715);
        assert_eq!(s.next_start_locking_time(715, 715), 735);
    }

    #[test]
    fn next_start_locking_before_start_returns_now() {
        let s = ten_ten(100);
        assert_eq!(s.next_start_locking_time(40, 42), 42);
    }

    #[test]
    fn last_end_locking() {
        let s = ten_ten(0);
        // first lock segment: nothing has ended yet
        assert_eq!(s.last_end_locking_time(5), 5);
        // inside the first withdraw segment
        assert_eq!(s.last_end_locking_time(13), 10);
        // lock segment of the second cycle looks back at the first withdraw start
        assert_eq!(s.last_end_locking_time(25), 10);
        assert_eq!(s.last_end_locking_time(30), 30);
        assert_eq!(s.last_end_locking_time(47), 30);
    }

    #[test]
    fn multiplier_is_clamped_to_now() {
        assert_eq!(time_multiplier(10u64, 20, 30), 10);
        assert_eq!(time_multiplier(10u64, 40, 30), 20);
        assert_eq!(time_multiplier(10u64, 5, 30), 0);
        assert_eq!(time_multiplier(10u64, 20, 8), 0);
    }
}
