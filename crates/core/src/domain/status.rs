use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::CoreError;

/// Lifecycle of a session.
///
/// `Completed` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema, Hash)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Pending,
    Active,
    Paused,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    fn allowed_transitions(&self) -> &'static [SessionStatus] {
        match self {
            Self::Pending => &[Self::Active],
            Self::Active => &[Self::Paused, Self::Completed],
            Self::Paused => &[Self::Active, Self::Completed],
            Self::Completed => &[],
        }
    }

    pub fn can_transition(&self, to: SessionStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Lifecycle of one phase within a session.
///
/// Phases can be forced straight from `Pending` to `Completed` when the whole
/// session is completed early.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema, Hash)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    #[default]
    Pending,
    Active,
    Paused,
    Completed,
}

impl PhaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    fn allowed_transitions(&self) -> &'static [PhaseStatus] {
        match self {
            Self::Pending => &[Self::Active, Self::Completed],
            Self::Active => &[Self::Paused, Self::Completed],
            Self::Paused => &[Self::Active, Self::Completed],
            Self::Completed => &[],
        }
    }

    pub fn can_transition(&self, to: PhaseStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

pub(crate) fn check_transition(
    allowed: bool,
    from: &'static str,
    to: &'static str,
) -> Result<(), CoreError> {
    if allowed {
        Ok(())
    } else {
        Err(CoreError::InvalidStatusTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_transitions() {
        assert!(SessionStatus::Pending.can_transition(SessionStatus::Active));
        assert!(SessionStatus::Active.can_transition(SessionStatus::Paused));
        assert!(SessionStatus::Paused.can_transition(SessionStatus::Active));
        assert!(SessionStatus::Paused.can_transition(SessionStatus::Completed));

        assert!(!SessionStatus::Pending.can_transition(SessionStatus::Paused));
        assert!(!SessionStatus::Pending.can_transition(SessionStatus::Completed));
        assert!(!SessionStatus::Completed.can_transition(SessionStatus::Active));
    }

    #[test]
    fn test_phase_can_be_forced_complete_from_pending() {
        assert!(PhaseStatus::Pending.can_transition(PhaseStatus::Completed));
        assert!(!PhaseStatus::Pending.can_transition(PhaseStatus::Paused));
        assert!(!PhaseStatus::Completed.can_transition(PhaseStatus::Active));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(SessionStatus::parse("paused"), Some(SessionStatus::Paused));
        assert_eq!(PhaseStatus::parse("completed"), Some(PhaseStatus::Completed));
        assert_eq!(SessionStatus::parse("running"), None);
        assert_eq!(SessionStatus::Active.as_str(), "active");
    }

    #[test]
    fn test_terminal() {
        assert!(SessionStatus::Completed.is_terminal());
        assert!(!PhaseStatus::Paused.is_terminal());
    }
}
