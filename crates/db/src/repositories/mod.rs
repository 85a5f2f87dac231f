mod membership_repository;
mod phase_session_repository;
mod phase_template_repository;
mod session_repository;

pub use membership_repository::*;
pub use phase_session_repository::*;
pub use phase_template_repository::*;
pub use session_repository::*;
