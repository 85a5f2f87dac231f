use tempo_core::PhaseTemplate;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PhaseTemplateRow {
    pub game_format_id: i64,
    pub phase_id: i64,
    pub position: i32,
    pub name: String,
    pub budget_seconds: i64,
}

impl PhaseTemplateRow {
    pub fn into_domain(self) -> PhaseTemplate {
        PhaseTemplate {
            game_format_id: self.game_format_id,
            phase_id: self.phase_id,
            position: self.position,
            name: self.name,
            budget_seconds: self.budget_seconds,
        }
    }
}
