//! Errores del core.
//!
//! Política de propagación: los fallos al alcanzar el almacén o el canal se
//! loguean y suben como `Err` al llamador inmediato; nunca se reintenta con
//! bucles in-process. La redelivery at-least-once del canal es la única vía
//! de reintento.

use thiserror::Error;

/// Fallo al alcanzar el almacén compartido. Para el llamador significa
/// "estado desconocido": no debe asumir que la escritura ocurrió.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("conflicting concurrent write: {0}")]
    Conflict(String),
    #[error("stored data could not be decoded: {0}")]
    Corrupted(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Buffer local de salida lleno: se reporta al llamador, nunca se
    /// bloquea indefinidamente.
    #[error("local producer queue is full ({pending} messages awaiting delivery)")]
    QueueFull { pending: usize },
    #[error("channel closed: {0}")]
    Closed(String),
    #[error("undecodable message payload: {0}")]
    Decode(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error("unknown request identifier: {0}")]
    UnknownRequest(String),
    #[error("internal: {0}")]
    Internal(String),
}
