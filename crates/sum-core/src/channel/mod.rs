//! Contratos del canal de mensajería.
//!
//! El transporte real (broker externo) queda fuera del core; aquí se fija el
//! contrato que el core asume de él: entrega at-least-once y orden por clave
//! dentro de una partición. La implementación in-memory sirve como doble de
//! pruebas y para la demo, y reproduce la semántica de buffer acotado del
//! productor: si el buffer local está lleno, `produce` falla con
//! `QueueFull` en lugar de bloquear.

pub mod memory;

use std::time::Duration;

use crate::errors::ChannelError;
use crate::event::Topic;

/// Mensaje entrante: clave (identificador actual de la petición) + payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub key: String,
    pub value: String,
}

/// Productor hacia los topics de etapa.
pub trait MessageSink {
    /// Publica un mensaje. Fire-and-forget con buffer local acotado: un
    /// buffer lleno se reporta con `ChannelError::QueueFull`.
    fn produce(&self, topic: Topic, key: &str, value: &str) -> Result<(), ChannelError>;
}

/// Consumidor del topic de entrada del dispatcher.
pub trait MessageSource {
    /// Espera hasta `timeout` por el siguiente mensaje. `Ok(None)` si no
    /// llegó nada dentro del timeout. Un `Err` es irrecuperable a nivel de
    /// canal y termina el worker.
    fn poll(&mut self, timeout: Duration) -> Result<Option<InboundMessage>, ChannelError>;
}

pub use memory::InMemoryBroker;
