// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Job lifecycle state machine.
//!
//! One machine is instantiated per job event. Nothing is carried across
//! events; the record in the store is the only persisted state.
//!
//! ```text
//! Start --RUNNING--> PlatformDispatch --fargate--> FargateUpdate --> End
//!                                     \--ec2-----> Ec2Lookup --> Ec2Update --> End
//! Start --SUCCEEDED | FAILED+task--> TerminalUpdate --> End
//! Start --other--> End
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::classifier::Classification;

/// A state of the job lifecycle machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobLifecycleState {
    /// Entry state.
    Start,
    /// Choose the platform branch of a running job.
    PlatformDispatch,
    /// Write Fargate running fields.
    FargateUpdate,
    /// Read the linked container instance record.
    Ec2Lookup,
    /// Write EC2 running fields.
    Ec2Update,
    /// Write terminal status fields.
    TerminalUpdate,
    /// Exit state for every path, no-op paths included.
    End,
}

/// What a transition may branch on.
#[derive(Debug, Clone, Copy)]
pub struct JobTransitionInput<'a> {
    /// Classification of the event driving the machine.
    pub classification: &'a Classification,
    /// Whether the job's platform capabilities include Fargate.
    pub is_fargate: bool,
}

impl JobLifecycleState {
    /// Next state. `End` is absorbing.
    pub fn transition(self, input: &JobTransitionInput<'_>) -> Self {
        match self {
            Self::Start => match input.classification {
                Classification::JobRunning => Self::PlatformDispatch,
                c if c.is_terminal() => Self::TerminalUpdate,
                _ => Self::End,
            },
            Self::PlatformDispatch if input.is_fargate => Self::FargateUpdate,
            Self::PlatformDispatch => Self::Ec2Lookup,
            Self::Ec2Lookup => Self::Ec2Update,
            Self::FargateUpdate | Self::Ec2Update | Self::TerminalUpdate | Self::End => Self::End,
        }
    }

    /// Whether this is the exit state.
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }

    /// Every state visited from `Start` to `End`, both included.
    pub fn path(input: &JobTransitionInput<'_>) -> Vec<Self> {
        let mut state = Self::Start;
        let mut visited = vec![state];
        while !state.is_end() {
            state = state.transition(input);
            visited.push(state);
        }
        visited
    }
}

impl fmt::Display for JobLifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "START",
            Self::PlatformDispatch => "PLATFORM_DISPATCH",
            Self::FargateUpdate => "FARGATE_UPDATE",
            Self::Ec2Lookup => "EC2_LOOKUP",
            Self::Ec2Update => "EC2_UPDATE",
            Self::TerminalUpdate => "TERMINAL_UPDATE",
            Self::End => "END",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use JobLifecycleState::*;

    fn input(classification: &Classification, is_fargate: bool) -> JobTransitionInput<'_> {
        JobTransitionInput {
            classification,
            is_fargate,
        }
    }

    #[test]
    fn test_running_fargate_path() {
        let running = Classification::JobRunning;
        assert_eq!(
            JobLifecycleState::path(&input(&running, true)),
            vec![Start, PlatformDispatch, FargateUpdate, End]
        );
    }

    #[test]
    fn test_running_ec2_path() {
        let running = Classification::JobRunning;
        assert_eq!(
            JobLifecycleState::path(&input(&running, false)),
            vec![Start, PlatformDispatch, Ec2Lookup, Ec2Update, End]
        );
    }

    #[test]
    fn test_terminal_path_ignores_platform() {
        for classification in [Classification::JobSucceeded, Classification::JobFailed] {
            for is_fargate in [true, false] {
                assert_eq!(
                    JobLifecycleState::path(&input(&classification, is_fargate)),
                    vec![Start, TerminalUpdate, End]
                );
            }
        }
    }

    #[test]
    fn test_other_statuses_end_immediately() {
        let other = Classification::JobOther {
            status: Some("RUNNABLE".to_string()),
        };
        assert_eq!(JobLifecycleState::path(&input(&other, false)), vec![Start, End]);

        let registered = Classification::InstanceRegistered;
        assert_eq!(
            JobLifecycleState::path(&input(&registered, true)),
            vec![Start, End]
        );
    }

    #[test]
    fn test_end_is_absorbing() {
        let running = Classification::JobRunning;
        assert_eq!(End.transition(&input(&running, true)), End);
        assert_eq!(End.transition(&input(&running, false)), End);
    }

    #[test]
    fn test_display_and_serde_agree() {
        for state in [
            Start,
            PlatformDispatch,
            FargateUpdate,
            Ec2Lookup,
            Ec2Update,
            TerminalUpdate,
            End,
        ] {
            let json = serde_json::to_value(state).unwrap();
            assert_eq!(json.as_str(), Some(state.to_string().as_str()));
        }
    }
}
