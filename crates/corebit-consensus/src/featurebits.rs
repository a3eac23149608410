//! A BIP9-style deployment state machine (§6 supplemented deployment
//! shape): deployments move DEFINED → STARTED → LOCKED_IN → ACTIVE, or
//! STARTED → FAILED if they time out before locking in. State transitions
//! only happen at `DEPLOYMENT_WINDOW` retarget-period boundaries.

use crate::constants::{DEPLOYMENT_THRESHOLD, DEPLOYMENT_WINDOW};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeploymentState {
    Defined,
    Started,
    LockedIn,
    Active,
    Failed,
}

#[derive(Clone, Debug)]
pub struct Deployment {
    pub name: &'static str,
    pub bit: u8,
    pub start_time: u32,
    pub timeout_time: u32,
}

/// Computes the state a deployment is in at `height`, given the number of
/// version-bit signals observed in each prior `DEPLOYMENT_WINDOW`-sized
/// period (index 0 is the oldest period) and that period's median time.
///
/// `period_signal_counts` and `period_median_times` must have the same
/// length, one entry per fully-elapsed period strictly before `height`'s
/// own period.
pub fn deployment_state_at_height(
    d: &Deployment,
    height: u64,
    period_signal_counts: &[u32],
    period_median_times: &[u32],
) -> DeploymentState {
    debug_assert_eq!(period_signal_counts.len(), period_median_times.len());

    let current_period = height / DEPLOYMENT_WINDOW;
    let mut state = DeploymentState::Defined;

    for period in 0..current_period {
        let idx = period as usize;
        let Some(&median) = period_median_times.get(idx) else {
            break;
        };
        let signals = period_signal_counts.get(idx).copied().unwrap_or(0);
        state = next_state(state, d, median, signals);
    }
    state
}

fn next_state(prev: DeploymentState, d: &Deployment, period_median: u32, signals: u32) -> DeploymentState {
    match prev {
        DeploymentState::Defined => {
            if period_median >= d.timeout_time {
                DeploymentState::Failed
            } else if period_median >= d.start_time {
                DeploymentState::Started
            } else {
                DeploymentState::Defined
            }
        }
        DeploymentState::Started => {
            if signals >= DEPLOYMENT_THRESHOLD {
                DeploymentState::LockedIn
            } else if period_median >= d.timeout_time {
                DeploymentState::Failed
            } else {
                DeploymentState::Started
            }
        }
        DeploymentState::LockedIn => DeploymentState::Active,
        DeploymentState::Active => DeploymentState::Active,
        DeploymentState::Failed => DeploymentState::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Deployment {
        Deployment {
            name: "test-deploy",
            bit: 1,
            start_time: 1_000,
            timeout_time: 2_000,
        }
    }

    #[test]
    fn stays_defined_before_start_time() {
        let d = sample();
        let state = deployment_state_at_height(&d, DEPLOYMENT_WINDOW, &[0], &[500]);
        assert_eq!(state, DeploymentState::Defined);
    }

    #[test]
    fn locks_in_once_threshold_met() {
        let d = sample();
        let state = deployment_state_at_height(
            &d,
            DEPLOYMENT_WINDOW * 3,
            &[0, DEPLOYMENT_THRESHOLD],
            &[1_100, 1_200],
        );
        assert_eq!(state, DeploymentState::Active);
    }

    #[test]
    fn fails_after_timeout_without_lock_in() {
        let d = sample();
        let state = deployment_state_at_height(
            &d,
            DEPLOYMENT_WINDOW * 3,
            &[0, 0],
            &[1_100, 2_500],
        );
        assert_eq!(state, DeploymentState::Failed);
    }
}
