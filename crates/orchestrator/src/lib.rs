//! Session/phase timing orchestration.
//!
//! [`SessionOrchestrator`] owns the nested session and phase state machines,
//! serializes every mutation of a session through a per-session lane, and
//! drives automatic phase advancement from one-shot deadlines.

pub mod clock;
pub mod error;
pub mod join_code;
pub mod lane;
mod orchestrator;
mod registry;
pub mod scheduler;
pub mod state_machine;
pub mod templates;

pub use clock::{Clock, SystemClock};
pub use error::{OrchestratorError, Result};
pub use join_code::{JoinCodeSource, RandomJoinCodes};
pub use orchestrator::{RecoveryReport, SessionOrchestrator, SessionOrchestratorBuilder};
pub use registry::JoinResult;
pub use scheduler::{DeadlineKey, DeadlineKind, FiredDeadline, PhaseScheduler};
pub use templates::{PhaseTemplateProvider, StaticTemplates};
