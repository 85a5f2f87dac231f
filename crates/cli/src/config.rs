//! `.tempo/config.toml`: server port, database location and the game
//! formats whose phase templates are seeded on startup.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tempo_core::PhaseTemplate;

pub const TEMPO_DIR: &str = ".tempo";
pub const CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_DB_NAME: &str = "tempo.db";
pub const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub game_formats: Vec<GameFormatConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Relative paths are resolved against the directory holding `.tempo/`.
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameFormatConfig {
    pub id: i64,
    pub phases: Vec<PhaseConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseConfig {
    pub phase_id: i64,
    pub name: String,
    pub budget_seconds: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: Path::new(TEMPO_DIR).join(DEFAULT_DB_NAME),
        }
    }
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            game_formats: vec![GameFormatConfig {
                id: 1,
                phases: vec![
                    PhaseConfig {
                        phase_id: 1,
                        name: "Setup".to_string(),
                        budget_seconds: 300,
                    },
                    PhaseConfig {
                        phase_id: 2,
                        name: "Play".to_string(),
                        budget_seconds: 1800,
                    },
                    PhaseConfig {
                        phase_id: 3,
                        name: "Scoring".to_string(),
                        budget_seconds: 300,
                    },
                ],
            }],
        }
    }
}

impl TempoConfig {
    pub fn default_path(root: &Path) -> PathBuf {
        root.join(TEMPO_DIR).join(CONFIG_FILE)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if it exists, defaults otherwise.
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if tokio::fs::try_exists(path).await? {
            Self::load(path).await
        } else {
            tracing::debug!(path = %path.display(), "Config file does not exist, using defaults");
            Ok(Self::default())
        }
    }

    pub async fn write(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(path, toml::to_string_pretty(self)?).await?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for format in &self.game_formats {
            if !seen.insert(format.id) {
                bail!("game format {} is defined twice", format.id);
            }
            if format.phases.is_empty() {
                bail!("game format {} has no phases", format.id);
            }
            if let Some(phase) = format.phases.iter().find(|p| p.budget_seconds <= 0) {
                bail!(
                    "phase {} of game format {} needs a positive budget_seconds",
                    phase.phase_id,
                    format.id
                );
            }
        }
        Ok(())
    }

    /// Database file, resolved against `root`.
    pub fn database_path(&self, root: &Path) -> PathBuf {
        if self.database.path.is_absolute() {
            self.database.path.clone()
        } else {
            root.join(&self.database.path)
        }
    }
}

impl GameFormatConfig {
    /// Templates in configured order, positions starting at 1.
    pub fn templates(&self) -> Vec<PhaseTemplate> {
        self.phases
            .iter()
            .enumerate()
            .map(|(i, p)| {
                PhaseTemplate::new(self.id, p.phase_id, i as i32 + 1, p.name.clone(), p.budget_seconds)
            })
            .collect()
    }
}
