//! Where phase templates come from when a session is created.

use async_trait::async_trait;
use db::PhaseTemplateRepository;
use std::collections::HashMap;
use tempo_core::PhaseTemplate;

use crate::error::Result;

/// Ordered phase templates of a game format. An unknown format yields an
/// empty list.
#[async_trait]
pub trait PhaseTemplateProvider: Send + Sync {
    async fn phase_templates(&self, game_format_id: i64) -> Result<Vec<PhaseTemplate>>;
}

#[async_trait]
impl PhaseTemplateProvider for PhaseTemplateRepository {
    async fn phase_templates(&self, game_format_id: i64) -> Result<Vec<PhaseTemplate>> {
        Ok(self.find_by_game_format(game_format_id).await?)
    }
}

/// Fixed in-memory catalogue.
#[derive(Debug, Clone, Default)]
pub struct StaticTemplates {
    formats: HashMap<i64, Vec<PhaseTemplate>>,
}

impl StaticTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a format whose phases run in the given order with the given
    /// budgets in seconds.
    pub fn with_format(mut self, game_format_id: i64, budgets: &[i64]) -> Self {
        let templates = budgets
            .iter()
            .enumerate()
            .map(|(i, budget)| {
                let position = i as i32 + 1;
                PhaseTemplate::new(
                    game_format_id,
                    position as i64,
                    position,
                    format!("Phase {}", position),
                    *budget,
                )
            })
            .collect();
        self.formats.insert(game_format_id, templates);
        self
    }

    pub fn insert(&mut self, template: PhaseTemplate) {
        let templates = self.formats.entry(template.game_format_id).or_default();
        templates.push(template);
        templates.sort_by_key(|t| t.position);
    }
}

#[async_trait]
impl PhaseTemplateProvider for StaticTemplates {
    async fn phase_templates(&self, game_format_id: i64) -> Result<Vec<PhaseTemplate>> {
        Ok(self.formats.get(&game_format_id).cloned().unwrap_or_default())
    }
}
