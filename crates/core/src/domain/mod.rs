mod membership;
mod phase_session;
mod session;
mod status;
mod template;
mod view;

pub use membership::PlayerMembership;
pub use phase_session::PhaseSession;
pub use session::Session;
pub use status::{PhaseStatus, SessionStatus};
pub use template::PhaseTemplate;
pub use view::{PhaseView, SessionView};
