//! Eventos de etapa y su forma en el wire.

pub mod topics;
pub mod types;

pub use topics::Topic;
pub use types::{ForwardedWork, StageEventKind, StageMessage};
