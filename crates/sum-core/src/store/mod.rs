//! Abstracción de persistencia sobre resúmenes, contenido fuente y
//! bindings de identificadores.
//!
//! Una única interfaz de capacidades con una implementación concreta por
//! tecnología de almacenamiento: `InMemorySummaryStore` aquí (referencia y
//! doble de tests) y la implementación Postgres en `sum-persistence`. Los
//! llamadores dependen sólo del trait.
//!
//! Contrato de concurrencia: cada operación debe ejecutarse dentro de una
//! transacción del almacén (o un único round-trip con aislamiento
//! equivalente). No se usan locks in-process para la corrección entre
//! workers; toda sincronización cruzada vive en el almacén compartido.
//! Las operaciones son idempotentes/convergentes bajo replay: re-aplicar
//! `insert`/`update`/`rebind` con los mismos argumentos no corrompe estado.

pub mod memory;

use chrono::Duration;
use sum_domain::{IdentifierBinding, Summary, SummaryPatch};

use crate::errors::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;

/// Resultado de un `rebind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebindOutcome {
    /// Ya existía un artifact completado bajo el identificador nuevo: el
    /// binding se repuntó a él y el trabajo en vuelo queda cortocircuitado.
    Reused { canonical_id: String },
    /// El artifact en vuelo se migró (renombró) al identificador nuevo; el
    /// cómputo debe continuar aguas abajo con la clave nueva.
    Migrated { canonical_id: String },
    /// No hay binding para el identificador dado.
    NotFound,
}

/// Contadores del barrido de expiración.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub bindings_deleted: usize,
    pub summaries_deleted: usize,
    pub sources_deleted: usize,
}

pub trait SummaryStore: Send + Sync {
    /// Resuelve `raw_id` a su identificador canónico vía binding y devuelve
    /// el resumen. Actualiza `last_accessed` del binding como efecto lateral
    /// (envejecimiento para la expiración).
    fn get(&self, raw_id: &str) -> StoreResult<Option<Summary>>;

    /// Crea el resumen con un self-binding (raw == canónico) y el flag de
    /// caché dado. Si el identificador ya existe la inserción de contenido
    /// es un no-op, pero el binding del solicitante se establece igualmente
    /// y `request_count` se incrementa.
    fn insert(&self, summary: &Summary, cache: bool) -> StoreResult<()>;

    /// Actualización parcial: sólo cambian los campos presentes en el
    /// patch; los warnings se mezclan por acumulación, nunca se reemplazan.
    /// Devuelve el resumen actualizado, o `None` si no hay binding.
    fn update(&self, raw_id: &str, patch: SummaryPatch) -> StoreResult<Option<Summary>>;

    /// Una etapa transformadora reveló que la identidad canónica real del
    /// contenido es `new_canonical_id`. Si ya existe un artifact completado
    /// bajo ese identificador, el binding se repunta (el flag de caché se
    /// propaga con regla OR) y el artifact en vuelo huérfano se borra. Si
    /// no existe, el artifact en vuelo se migra al identificador nuevo con
    /// su contenido fuente nuevo y un self-binding fresco.
    fn rebind(&self, raw_id: &str, new_canonical_id: &str, new_source: &str)
              -> StoreResult<RebindOutcome>;

    /// `true` si el identificador aparece como raw o como canónico.
    fn exists(&self, id: &str) -> StoreResult<bool>;

    /// `true` si el contenido fuente (por hash) ya está almacenado.
    fn source_exists(&self, source: &str) -> StoreResult<bool>;

    /// Incremento atómico; devuelve el contador nuevo. Sólo observabilidad.
    fn increment_request_count(&self, raw_id: &str) -> StoreResult<Option<i64>>;

    /// Borra el resumen (y opcionalmente su fuente). Los bindings que
    /// apuntaban a él caen en cascada.
    fn delete(&self, id: &str, delete_source: bool) -> StoreResult<()>;

    fn binding(&self, raw_id: &str) -> StoreResult<Option<IdentifierBinding>>;

    /// Todos los bindings cuyo canónico es `canonical_id`.
    fn bindings_to(&self, canonical_id: &str) -> StoreResult<Vec<IdentifierBinding>>;

    /// Marca caché a `true` sobre el binding dado y el self-binding de su
    /// canónico. Sólo transiciona false -> true; nunca al revés.
    fn update_cache_true(&self, id: &str) -> StoreResult<()>;

    /// Borra el binding sólo si su flag de caché es `false`; devuelve el
    /// canónico al que apuntaba. `None` si no existía o estaba cacheado.
    fn delete_binding(&self, raw_id: &str) -> StoreResult<Option<String>>;

    /// Barrido en dos fases: primero borra bindings con `cache == false`,
    /// resumen `completed` y `last_accessed` más viejo que el umbral;
    /// después borra resúmenes y fuentes que quedaron sin bindings. El
    /// orden importa: varios bindings pueden compartir un artifact.
    fn sweep_expired(&self, older_than: Duration) -> StoreResult<CleanupStats>;
}

pub use memory::InMemorySummaryStore;
