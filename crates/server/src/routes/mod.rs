mod health;
mod players;
mod sessions;
pub mod sse;
mod ws;

pub use health::*;
pub use players::*;
pub use sessions::*;
pub use ws::*;
