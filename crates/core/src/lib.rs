//! Domain model for Tempo sessions.
//!
//! Sessions and their ordered phase sessions are plain records with pure
//! transition methods. Nothing in this crate performs I/O or reads a clock;
//! every operation that depends on time takes `now` explicitly.

pub mod domain;
mod error;
pub mod timing;

pub use domain::*;
pub use error::CoreError;
pub use timing::Timed;
