use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One phase of a game format, as supplied by the format catalogue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct PhaseTemplate {
    pub game_format_id: i64,
    pub phase_id: i64,
    pub position: i32,
    pub name: String,
    pub budget_seconds: i64,
}

impl PhaseTemplate {
    pub fn new(
        game_format_id: i64,
        phase_id: i64,
        position: i32,
        name: impl Into<String>,
        budget_seconds: i64,
    ) -> Self {
        Self {
            game_format_id,
            phase_id,
            position,
            name: name.into(),
            budget_seconds,
        }
    }
}
