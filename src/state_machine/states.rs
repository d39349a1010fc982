use serde::{Deserialize, Serialize};
use std::fmt;

/// Anomaly tracking states for a monitored business record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyStatus {
    /// No anomaly is being tracked for this record
    Normal,
    /// Newly anomalous, eligible for automated retry
    WaitAuto,
    /// Escalated, awaiting a human operator
    WaitManual,
    /// Self-healed through automated retry
    AutoSuccess,
    /// Resolved by a human operator
    ManualSuccess,
}

impl AnomalyStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AutoSuccess | Self::ManualSuccess)
    }

    /// Check if the record is still an unresolved anomaly
    pub fn is_open(&self) -> bool {
        matches!(self, Self::WaitAuto | Self::WaitManual)
    }

    /// Check if a transition to `target` is legal.
    ///
    /// `WaitAuto -> WaitAuto` is allowed so that repeated failures of the
    /// same record can re-mark it without violating monotonicity; no state
    /// ever transitions back to `Normal`.
    pub fn can_transition_to(&self, target: AnomalyStatus) -> bool {
        match self {
            Self::Normal => matches!(target, Self::WaitAuto),
            Self::WaitAuto => matches!(
                target,
                Self::WaitAuto | Self::AutoSuccess | Self::WaitManual
            ),
            Self::WaitManual => matches!(target, Self::ManualSuccess),
            Self::AutoSuccess | Self::ManualSuccess => false,
        }
    }
}

impl fmt::Display for AnomalyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::WaitAuto => write!(f, "wait_auto"),
            Self::WaitManual => write!(f, "wait_manual"),
            Self::AutoSuccess => write!(f, "auto_success"),
            Self::ManualSuccess => write!(f, "manual_success"),
        }
    }
}

impl std::str::FromStr for AnomalyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "wait_auto" => Ok(Self::WaitAuto),
            "wait_manual" => Ok(Self::WaitManual),
            "auto_success" => Ok(Self::AutoSuccess),
            "manual_success" => Ok(Self::ManualSuccess),
            _ => Err(format!("Invalid anomaly status: {s}")),
        }
    }
}

/// Escalation delivery states, tracked separately from resolution.
///
/// Records whether the human alert for an escalated record was delivered;
/// a failed delivery does not stop the remind cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualSubmitStatus {
    /// Alert was handed to the notification transport successfully
    Submitted,
    /// Alert delivery attempt failed; will be retried at the next remind time
    SubmitFailed,
    /// A human has resolved the record
    ManualSuccess,
}

impl ManualSubmitStatus {
    /// Check if the record has been resolved by a human
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::ManualSuccess)
    }
}

impl fmt::Display for ManualSubmitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submitted => write!(f, "submitted"),
            Self::SubmitFailed => write!(f, "submit_failed"),
            Self::ManualSuccess => write!(f, "manual_success"),
        }
    }
}

impl std::str::FromStr for ManualSubmitStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(Self::Submitted),
            "submit_failed" => Ok(Self::SubmitFailed),
            "manual_success" => Ok(Self::ManualSuccess),
            _ => Err(format!("Invalid manual submit status: {s}")),
        }
    }
}
