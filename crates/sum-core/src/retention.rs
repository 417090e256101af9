//! Política de retención de la caché de resúmenes.
//!
//! El flag de caché vive en el binding, no en el resumen: varios
//! solicitantes pueden compartir un mismo artifact con decisiones de caché
//! distintas. La regla es sticky: una vez `true`, nunca vuelve a `false`.
//! Los bindings no cacheados expiran por inactividad y el barrido periódico
//! borra después los artifacts que quedaron sin referencias.

use std::sync::Arc;

use chrono::Duration;
use log::{debug, info, warn};

use crate::constants::DEFAULT_RETENTION_SECONDS;
use crate::errors::StoreError;
use crate::store::{CleanupStats, StoreResult, SummaryStore};

pub struct CacheRetentionPolicy<S: SummaryStore> {
    store: Arc<S>,
    retention: Duration,
}

impl<S: SummaryStore> CacheRetentionPolicy<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_retention(store, Duration::seconds(DEFAULT_RETENTION_SECONDS))
    }

    pub fn with_retention(store: Arc<S>, retention: Duration) -> Self {
        Self { store, retention }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Hook de finalización: deja rastro de si el artifact recién
    /// completado es candidato a expirar o quedó retenido.
    pub fn on_completed(&self, raw_id: &str) -> StoreResult<()> {
        match self.store.binding(raw_id)? {
            Some(b) if b.cache => {
                debug!("binding {raw_id} retained (cache=true)");
            }
            Some(_) => {
                debug!("binding {raw_id} eligible for expiry after {}s idle",
                       self.retention.num_seconds());
            }
            None => warn!("completed summary {raw_id} has no binding"),
        }
        Ok(())
    }

    /// Promociona el binding (y el self-binding de su canónico) a retenido.
    pub fn retain(&self, id: &str) -> StoreResult<()> {
        self.store.update_cache_true(id)
    }

    /// Borrado explícito respetando la regla sticky: el binding sólo cae si
    /// no está cacheado, y el artifact compartido sólo sobrevive mientras
    /// alguna referencia restante lo retenga con `cache=true`.
    pub fn delete_if_not_cache(&self, raw_id: &str) -> StoreResult<bool> {
        let Some(canonical) = self.store.delete_binding(raw_id)? else {
            return Ok(false);
        };
        let remaining = self.store.bindings_to(&canonical)?;
        if remaining.iter().any(|b| b.cache) {
            debug!("summary {canonical} kept: still retained by another binding");
            return Ok(true);
        }
        // Ninguno de los bindings restantes (si los hay) retiene el
        // artifact: cae ahora, sin esperar al barrido periódico.
        self.store.delete(&canonical, true)?;
        debug!("summary {canonical} deleted: no remaining binding retains it");
        Ok(true)
    }

    /// Barrido periódico de bindings expirados y artifacts huérfanos.
    pub fn cleanup(&self) -> StoreResult<CleanupStats> {
        let stats = self.store.sweep_expired(self.retention)?;
        if stats != CleanupStats::default() {
            info!("cache cleanup: {} bindings, {} summaries, {} sources removed",
                  stats.bindings_deleted, stats.summaries_deleted, stats.sources_deleted);
        }
        Ok(stats)
    }

    /// Variante del cleanup que no interrumpe al llamador: un fallo del
    /// almacén se registra y el barrido se reintenta en el siguiente ciclo.
    pub fn cleanup_logged(&self) {
        if let Err(e) = self.cleanup() {
            log_store_error("cache cleanup", &e);
        }
    }
}

fn log_store_error(context: &str, err: &StoreError) {
    warn!("{context} failed, state unknown until next pass: {err}");
}
