use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GuardState {
    #[default]
    Idle,
    Active,
    Finalizing,
}

/// Why a session is being finalized.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeTrigger {
    /// The running countdown reached zero.
    Expired,
    /// A missed deadline (or an interrupted finalize) was found on resume or launch.
    Recovered,
    /// The lecturer ended the session.
    Manual,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success { attempts: u32 },
    Failed { attempts: u32 },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Outcome::Success { attempts } | Outcome::Failed { attempts } => *attempts,
        }
    }
}
