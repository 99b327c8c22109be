use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

impl SchedulerState {
    pub const ALL: [SchedulerState; 4] = [
        SchedulerState::Idle,
        SchedulerState::Running,
        SchedulerState::Stopping,
        SchedulerState::Stopped,
    ];

    pub fn can_transition_to(self, target: SchedulerState) -> bool {
        matches!(
            (self, target),
            (SchedulerState::Idle, SchedulerState::Running)
                | (SchedulerState::Running, SchedulerState::Stopping)
                | (SchedulerState::Stopping, SchedulerState::Stopped)
                | (SchedulerState::Stopped, SchedulerState::Running)
        )
    }
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}
