use crate::error::DbError;
use crate::models::PhaseTemplateRow;
use sqlx::SqlitePool;
use tempo_core::PhaseTemplate;

/// Catalogue of phase templates per game format.
#[derive(Clone)]
pub struct PhaseTemplateRepository {
    pool: SqlitePool,
}

impl PhaseTemplateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Templates of one format in position order; empty if the format is unknown.
    pub async fn find_by_game_format(&self, game_format_id: i64) -> Result<Vec<PhaseTemplate>, DbError> {
        let rows: Vec<PhaseTemplateRow> = sqlx::query_as(
            r#"
            SELECT game_format_id, phase_id, position, name, budget_seconds
            FROM phase_templates
            WHERE game_format_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(game_format_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    /// Replaces every template of a format in one transaction.
    pub async fn replace_format(
        &self,
        game_format_id: i64,
        templates: &[PhaseTemplate],
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM phase_templates WHERE game_format_id = ?")
            .bind(game_format_id)
            .execute(&mut *tx)
            .await?;

        for template in templates {
            sqlx::query(
                r#"
                INSERT INTO phase_templates (game_format_id, phase_id, position, name, budget_seconds)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(game_format_id)
            .bind(template.phase_id)
            .bind(template.position)
            .bind(&template.name)
            .bind(template.budget_seconds)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!(game_format_id, count = templates.len(), "Replaced phase templates");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::setup_test_db;

    #[tokio::test]
    async fn test_find_by_game_format_orders_by_position() {
        let pool = setup_test_db().await;
        let repo = PhaseTemplateRepository::new(pool);

        repo.replace_format(
            7,
            &[
                PhaseTemplate::new(7, 2, 2, "Vote", 30),
                PhaseTemplate::new(7, 1, 1, "Discuss", 120),
            ],
        )
        .await
        .unwrap();
        repo.replace_format(8, &[PhaseTemplate::new(8, 1, 1, "Other", 10)])
            .await
            .unwrap();

        let templates = repo.find_by_game_format(7).await.unwrap();
        let names: Vec<&str> = templates.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Discuss", "Vote"]);

        assert!(repo.find_by_game_format(99).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_format_drops_stale_phases() {
        let pool = setup_test_db().await;
        let repo = PhaseTemplateRepository::new(pool);

        repo.replace_format(1, &[PhaseTemplate::new(1, 1, 1, "Old", 30)])
            .await
            .unwrap();
        repo.replace_format(
            1,
            &[
                PhaseTemplate::new(1, 5, 1, "New A", 10),
                PhaseTemplate::new(1, 6, 2, "New B", 20),
            ],
        )
        .await
        .unwrap();

        let templates = repo.find_by_game_format(1).await.unwrap();
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0].phase_id, 5);
        assert_eq!(templates[1].budget_seconds, 20);
    }

    #[tokio::test]
    async fn test_shared_position_is_rejected() {
        let pool = setup_test_db().await;
        let repo = PhaseTemplateRepository::new(pool);

        let result = repo
            .replace_format(
                3,
                &[
                    PhaseTemplate::new(3, 1, 1, "First", 10),
                    PhaseTemplate::new(3, 2, 1, "Second", 10),
                ],
            )
            .await;

        assert!(result.is_err());
        assert!(repo.find_by_game_format(3).await.unwrap().is_empty());
    }
}
