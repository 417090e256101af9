//! Bucle consumidor del topic del dispatcher.
//!
//! Un worker parable que alterna consumo de eventos con el barrido
//! periódico de la caché. Los mensajes indescifrables se loguean y se
//! saltan; un error del coordinador se loguea y el bucle continúa (la
//! redelivery at-least-once converge); un error del canal termina el worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{error, info, warn};

use crate::channel::{MessageSink, MessageSource};
use crate::constants::{CACHE_CLEANUP_INTERVAL_SECONDS, POLL_TIMEOUT_MILLIS};
use crate::coordinator::LifecycleCoordinator;
use crate::errors::ChannelError;
use crate::event::StageMessage;
use crate::store::SummaryStore;

/// Señal de parada compartible con el hilo que corre el bucle.
#[derive(Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

pub struct ConsumerLoop<S: SummaryStore, K: MessageSink, M: MessageSource> {
    coordinator: LifecycleCoordinator<S, K>,
    source: M,
    stop: StopHandle,
    cleanup_interval: Duration,
    last_cleanup: Instant,
}

impl<S: SummaryStore, K: MessageSink, M: MessageSource> ConsumerLoop<S, K, M> {
    pub fn new(coordinator: LifecycleCoordinator<S, K>, source: M, stop: StopHandle) -> Self {
        Self { coordinator,
               source,
               stop,
               cleanup_interval: Duration::from_secs(CACHE_CLEANUP_INTERVAL_SECONDS),
               last_cleanup: Instant::now() }
    }

    pub fn coordinator(&self) -> &LifecycleCoordinator<S, K> {
        &self.coordinator
    }

    /// Corre hasta que la señal de parada se active o el canal falle.
    pub fn run(&mut self) -> Result<(), ChannelError> {
        info!("dispatcher consumer loop started");
        while !self.stop.is_stopped() {
            self.step()?;
        }
        info!("dispatcher consumer loop stopped");
        Ok(())
    }

    /// Una iteración del bucle: barrido periódico + como mucho un mensaje.
    /// Expuesto para poder dirigir el bucle paso a paso en tests y demos.
    pub fn step(&mut self) -> Result<(), ChannelError> {
        if self.last_cleanup.elapsed() >= self.cleanup_interval {
            self.coordinator.policy().cleanup_logged();
            self.last_cleanup = Instant::now();
        }

        let message = match self.source.poll(Duration::from_millis(POLL_TIMEOUT_MILLIS))? {
            Some(message) => message,
            None => return Ok(()),
        };

        let kind = match StageMessage::decode(&message.value).and_then(StageMessage::into_kind) {
            Ok(kind) => kind,
            Err(e) => {
                // Mensaje malformado: reintentar no lo arreglaría.
                warn!("skipping undecodable message for key {}: {e}", message.key);
                return Ok(());
            }
        };

        if let Err(e) = self.coordinator.handle(&message.key, kind) {
            // El estado queda como estaba; la redelivery reaplica el evento.
            error!("event for {} not applied: {e}", message.key);
        }
        Ok(())
    }
}
