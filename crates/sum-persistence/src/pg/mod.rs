//! Implementación Postgres (Diesel) del `SummaryStore` del core.
//!
//! Objetivo del módulo:
//! - Proveer una capa de persistencia durable con paridad 1:1 respecto al
//!   backend en memoria: mismas reglas de deduplicación, cascadas y
//!   propagación del flag de caché.
//! - Aislar completamente el mapeo dominio ↔ filas de DB del `sum-core`.
//!
//! Notas de concurrencia:
//! - Cada operación del trait corre dentro de UNA transacción
//!   `read_write`; la corrección entre réplicas del dispatcher recae en el
//!   aislamiento de Postgres, nunca en locks in-process.
//! - Errores transitorios (deadlock, pool, desconexión) se reintentan con
//!   backoff acotado; cualquier otro error sube como `StoreError`.

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use diesel::result::Error as DieselError;
use log::{debug, warn};
use serde_json::Value;

use sum_core::keys::source_key;
use sum_core::{CleanupStats, RebindOutcome, StoreError, StoreResult, SummaryStore};
use sum_domain::{merge_warnings, IdentifierBinding, SourceKind, Summary, SummaryPatch,
                 SummaryStatus, Warnings};

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;
use crate::schema::{identifier_binding, source_content, summary};

/// Alias de tipo para el pool r2d2 de conexiones Postgres.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Permite inyectar un pool real (producción/tests de integración) o
/// factorear en tests unitarios sin acoplar a r2d2. Debe devolver una
/// conexión válida o `PersistenceError::TransientIo` en caso de error.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError>;
}

/// Implementación concreta de `ConnectionProvider` respaldada por un `PgPool`.
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Determina si un error es transitorio (recomendado reintentar con backoff).
fn is_retryable(e: &PersistenceError) -> bool {
    match e {
        PersistenceError::SerializationConflict => true,
        PersistenceError::TransientIo(_) => true,
        // Algunos mensajes llegan como Unknown con texto; best-effort sin
        // acoplar a SQLSTATE.
        PersistenceError::Unknown(msg) => {
            let m = msg.to_lowercase();
            m.contains("deadlock detected")
            || m.contains("could not serialize access due to concurrent update")
            || m.contains("connection closed")
            || m.contains("connection refused")
            || m.contains("timeout")
        }
        _ => false,
    }
}

/// Retry simple con backoff exponencial muy pequeño (hasta 3 intentos).
/// No altera semántica de negocio; sólo repite la unidad de trabajo de `f`.
fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms",
                      attempts + 1,
                      e,
                      delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

/// Fila mapeada de `summary` para lecturas (orden de columnas = schema).
#[derive(Queryable, Debug)]
struct SummaryRow {
    summary_id: String,
    source_id: String,
    output: Option<String>,
    #[allow(dead_code)]
    output_length: Option<i32>,
    model: String,
    params: Value,
    status: String,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    language: String,
    warnings: Value,
    request_count: i64,
    source_type: String,
    file_type: Option<String>,
    start_page: Option<i32>,
    end_page: Option<i32>,
}

#[derive(Queryable, Debug)]
struct BindingRow {
    raw_id: String,
    canonical_id: String,
    cache: bool,
    last_accessed: DateTime<Utc>,
}

impl From<BindingRow> for IdentifierBinding {
    fn from(row: BindingRow) -> Self {
        Self { raw_id: row.raw_id,
               canonical_id: row.canonical_id,
               cache: row.cache,
               last_accessed: row.last_accessed }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = source_content)]
struct NewSourceRow<'a> {
    content_id: &'a str,
    content: &'a str,
    content_length: i32,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = summary)]
struct NewSummaryRow<'a> {
    summary_id: &'a str,
    source_id: &'a str,
    output: Option<&'a str>,
    output_length: Option<i32>,
    model: &'a str,
    params: &'a Value,
    status: &'a str,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    language: &'a str,
    warnings: &'a Value,
    request_count: i64,
    source_type: &'a str,
    file_type: Option<&'a str>,
    start_page: Option<i32>,
    end_page: Option<i32>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = identifier_binding)]
struct NewBindingRow<'a> {
    raw_id: &'a str,
    canonical_id: &'a str,
    cache: bool,
    last_accessed: DateTime<Utc>,
}

/// Reconstruye el `Summary` de dominio desde su fila y el contenido fuente.
fn to_summary(row: SummaryRow, content: String) -> Result<Summary, PersistenceError> {
    let status = SummaryStatus::from_str(&row.status)
        .map_err(|e| PersistenceError::Corrupted(e.to_string()))?;
    let warnings: Warnings = serde_json::from_value(row.warnings)
        .map_err(|e| PersistenceError::Corrupted(format!("warnings: {e}")))?;
    let source_kind = match row.source_type.as_str() {
        "text" => SourceKind::Text,
        "document" => {
            let (Some(file_type), Some(start_page), Some(end_page)) =
                (row.file_type, row.start_page, row.end_page)
            else {
                return Err(PersistenceError::Corrupted("document row without page range".into()));
            };
            SourceKind::Document { file_type, start_page, end_page }
        }
        other => return Err(PersistenceError::Corrupted(format!("source_type '{other}'"))),
    };
    Ok(Summary { id: row.summary_id,
                 source: content,
                 output: row.output,
                 model: row.model,
                 params: row.params,
                 status,
                 started_at: row.started_at,
                 ended_at: row.ended_at,
                 language: row.language,
                 warnings,
                 request_count: row.request_count,
                 source_kind })
}

/// Implementación Postgres de `SummaryStore`.
pub struct PgSummaryStore<P: ConnectionProvider> {
    provider: P,
}

impl<P: ConnectionProvider> PgSummaryStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

/// Toca `last_accessed` del binding y devuelve su canónico, todo en la
/// transacción del llamador.
fn touch_binding(tx: &mut PgConnection, raw_id: &str) -> Result<Option<String>, DieselError> {
    diesel::update(identifier_binding::table.find(raw_id))
        .set(identifier_binding::last_accessed.eq(Utc::now()))
        .returning(identifier_binding::canonical_id)
        .get_result(tx)
        .optional()
}

fn load_row(tx: &mut PgConnection, canonical_id: &str)
            -> Result<Option<(SummaryRow, String)>, DieselError> {
    let row: Option<SummaryRow> = summary::table.find(canonical_id).first(tx).optional()?;
    let Some(row) = row else { return Ok(None) };
    let content: String = source_content::table.find(&row.source_id)
                                               .select(source_content::content)
                                               .first(tx)
                                               .optional()?
                                               .unwrap_or_default();
    Ok(Some((row, content)))
}

fn delete_source_if_orphaned(tx: &mut PgConnection, source_id: &str) -> Result<(), DieselError> {
    let refs: i64 = summary::table.filter(summary::source_id.eq(source_id))
                                  .count()
                                  .get_result(tx)?;
    if refs == 0 {
        diesel::delete(source_content::table.find(source_id)).execute(tx)?;
    }
    Ok(())
}

impl<P: ConnectionProvider> SummaryStore for PgSummaryStore<P> {
    fn get(&self, raw_id: &str) -> StoreResult<Option<Summary>> {
        let loaded = with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction()
                .read_write()
                .run(|tx| {
                    let Some(canonical) = touch_binding(tx, raw_id)? else {
                        return Ok::<_, DieselError>(None);
                    };
                    load_row(tx, &canonical)
                })
                .map_err(PersistenceError::from)
        }).map_err(StoreError::from)?;
        match loaded {
            Some((row, content)) => Ok(Some(to_summary(row, content).map_err(StoreError::from)?)),
            None => Ok(None),
        }
    }

    fn insert(&self, record: &Summary, cache: bool) -> StoreResult<()> {
        let source_id = source_key(&record.source);
        let warnings_json = serde_json::to_value(&record.warnings)
            .map_err(|e| StoreError::Corrupted(format!("warnings: {e}")))?;
        let (source_type, file_type, start_page, end_page) = match &record.source_kind {
            SourceKind::Text => ("text", None, None, None),
            SourceKind::Document { file_type, start_page, end_page } => {
                ("document", Some(file_type.as_str()), Some(*start_page), Some(*end_page))
            }
        };
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction()
                .read_write()
                .run(|tx| {
                    diesel::insert_into(source_content::table)
                        .values(NewSourceRow { content_id: &source_id,
                                               content: &record.source,
                                               content_length: record.source.len() as i32 })
                        .on_conflict_do_nothing()
                        .execute(tx)?;

                    let already: i64 = summary::table.find(&record.id).count().get_result(tx)?;
                    if already > 0 {
                        // Re-petición del mismo identificador: no se relanza
                        // nada, pero el binding del solicitante se asienta y
                        // el contador sube.
                        diesel::insert_into(identifier_binding::table)
                            .values(NewBindingRow { raw_id: &record.id,
                                                    canonical_id: &record.id,
                                                    cache,
                                                    last_accessed: Utc::now() })
                            .on_conflict(identifier_binding::raw_id)
                            .do_update()
                            .set((identifier_binding::last_accessed.eq(Utc::now()),
                                  identifier_binding::cache.eq(identifier_binding::cache.or::<bool, diesel::sql_types::Bool>(cache))))
                            .execute(tx)?;
                        diesel::update(summary::table.find(&record.id))
                            .set(summary::request_count.eq(summary::request_count + 1))
                            .execute(tx)?;
                        return Ok::<_, DieselError>(());
                    }

                    diesel::insert_into(summary::table)
                        .values(NewSummaryRow { summary_id: &record.id,
                                                source_id: &source_id,
                                                output: record.output.as_deref(),
                                                output_length: record.output
                                                                     .as_ref()
                                                                     .map(|o| o.len() as i32),
                                                model: &record.model,
                                                params: &record.params,
                                                status: record.status.as_str(),
                                                started_at: record.started_at,
                                                ended_at: record.ended_at,
                                                language: &record.language,
                                                warnings: &warnings_json,
                                                request_count: record.request_count,
                                                source_type,
                                                file_type,
                                                start_page,
                                                end_page })
                        .execute(tx)?;
                    diesel::insert_into(identifier_binding::table)
                        .values(NewBindingRow { raw_id: &record.id,
                                                canonical_id: &record.id,
                                                cache,
                                                last_accessed: Utc::now() })
                        .on_conflict_do_nothing()
                        .execute(tx)?;
                    Ok(())
                })
                .map_err(PersistenceError::from)
        }).map_err(StoreError::from)
    }

    fn update(&self, raw_id: &str, patch: SummaryPatch) -> StoreResult<Option<Summary>> {
        let loaded = with_retry(|| {
            let patch = patch.clone();
            let mut conn = self.provider.connection()?;
            conn.build_transaction()
                .read_write()
                .run(|tx| {
                    let Some(canonical) = touch_binding(tx, raw_id)? else {
                        return Ok::<_, DieselError>(None);
                    };
                    // Mezcla de warnings en el lado Rust, dentro de la misma
                    // transacción: acumular, nunca reemplazar.
                    let current: Value = summary::table.find(&canonical)
                                                       .select(summary::warnings)
                                                       .first(tx)?;
                    let current: Warnings = serde_json::from_value(current)
                        .map_err(|e| DieselError::DeserializationError(Box::new(e)))?;
                    let merged = match &patch.warnings {
                        Some(new) => merge_warnings(&current, new),
                        None => current,
                    };
                    let merged_json = serde_json::to_value(&merged)
                        .map_err(|e| DieselError::SerializationError(Box::new(e)))?;

                    diesel::update(summary::table.find(&canonical))
                        .set((summary::warnings.eq(merged_json),
                              patch.status.map(|s| summary::status.eq(s.as_str().to_string())),
                              patch.output.as_ref().map(|o| {
                                  (summary::output.eq(o.clone()),
                                   summary::output_length.eq(o.len() as i32))
                              }),
                              patch.params.map(|p| summary::params.eq(p)),
                              patch.ended_at.map(|t| summary::ended_at.eq(t))))
                        .execute(tx)?;
                    load_row(tx, &canonical)
                })
                .map_err(PersistenceError::from)
        }).map_err(StoreError::from)?;
        match loaded {
            Some((row, content)) => Ok(Some(to_summary(row, content).map_err(StoreError::from)?)),
            None => Ok(None),
        }
    }

    fn rebind(&self, raw_id: &str, new_canonical_id: &str, new_source: &str)
              -> StoreResult<RebindOutcome> {
        let new_source_id = source_key(new_source);
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction()
                .read_write()
                .run(|tx| {
                    let binding: Option<BindingRow> =
                        identifier_binding::table.find(raw_id).first(tx).optional()?;
                    let Some(binding) = binding else {
                        return Ok::<_, DieselError>(RebindOutcome::NotFound);
                    };
                    let old_canonical = binding.canonical_id;
                    let raw_cache = binding.cache;

                    let target_status: Option<String> =
                        summary::table.find(new_canonical_id)
                                      .select(summary::status)
                                      .first(tx)
                                      .optional()?;
                    let target_completed =
                        target_status.as_deref() == Some(SummaryStatus::Completed.as_str());

                    if old_canonical == new_canonical_id {
                        // Replay: ya apunta al canónico nuevo; convergente.
                        let outcome = if target_completed {
                            RebindOutcome::Reused { canonical_id: new_canonical_id.to_string() }
                        } else {
                            RebindOutcome::Migrated { canonical_id: new_canonical_id.to_string() }
                        };
                        return Ok(outcome);
                    }

                    if target_completed {
                        // Cortocircuito: repuntar, propagar caché (OR) y
                        // borrar el artifact en vuelo huérfano.
                        diesel::update(identifier_binding::table.find(raw_id))
                            .set((identifier_binding::canonical_id.eq(new_canonical_id),
                                  identifier_binding::last_accessed.eq(Utc::now())))
                            .execute(tx)?;
                        if raw_cache {
                            diesel::update(identifier_binding::table.find(new_canonical_id)
                                                                    .filter(identifier_binding::cache.eq(false)))
                                .set((identifier_binding::cache.eq(true),
                                      identifier_binding::last_accessed.eq(Utc::now())))
                                .execute(tx)?;
                        }
                        let refs: i64 =
                            identifier_binding::table.filter(identifier_binding::canonical_id.eq(&old_canonical))
                                                     .count()
                                                     .get_result(tx)?;
                        if refs == 0 {
                            let orphan_source: Option<String> =
                                summary::table.find(&old_canonical)
                                              .select(summary::source_id)
                                              .first(tx)
                                              .optional()?;
                            diesel::delete(summary::table.find(&old_canonical)).execute(tx)?;
                            if let Some(source_id) = orphan_source {
                                delete_source_if_orphaned(tx, &source_id)?;
                            }
                        }
                        return Ok(RebindOutcome::Reused { canonical_id:
                                                              new_canonical_id.to_string() });
                    }

                    // Migración: renombrar el artifact en vuelo. El ON UPDATE
                    // CASCADE del FK arrastra todos los bindings que
                    // apuntaban al canónico viejo.
                    diesel::insert_into(source_content::table)
                        .values(NewSourceRow { content_id: &new_source_id,
                                               content: new_source,
                                               content_length: new_source.len() as i32 })
                        .on_conflict_do_nothing()
                        .execute(tx)?;
                    let old_source: Option<String> = summary::table.find(&old_canonical)
                                                                   .select(summary::source_id)
                                                                   .first(tx)
                                                                   .optional()?;
                    diesel::update(summary::table.find(&old_canonical))
                        .set((summary::summary_id.eq(new_canonical_id),
                              summary::source_id.eq(&new_source_id)))
                        .execute(tx)?;
                    diesel::update(identifier_binding::table.find(raw_id))
                        .set(identifier_binding::last_accessed.eq(Utc::now()))
                        .execute(tx)?;
                    // Self-binding del canónico nuevo, heredando el flag del
                    // raw que provocó la migración.
                    diesel::insert_into(identifier_binding::table)
                        .values(NewBindingRow { raw_id: new_canonical_id,
                                                canonical_id: new_canonical_id,
                                                cache: raw_cache,
                                                last_accessed: Utc::now() })
                        .on_conflict_do_nothing()
                        .execute(tx)?;
                    if let Some(source_id) = old_source {
                        if source_id != new_source_id {
                            delete_source_if_orphaned(tx, &source_id)?;
                        }
                    }
                    Ok(RebindOutcome::Migrated { canonical_id: new_canonical_id.to_string() })
                })
                .map_err(PersistenceError::from)
        }).map_err(StoreError::from)
    }

    fn exists(&self, id: &str) -> StoreResult<bool> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction()
                .read_write()
                .run(|tx| {
                    let touched = touch_binding(tx, id)?;
                    if touched.is_some() {
                        return Ok::<_, DieselError>(true);
                    }
                    let referenced: i64 =
                        identifier_binding::table.filter(identifier_binding::canonical_id.eq(id))
                                                 .count()
                                                 .get_result(tx)?;
                    Ok(referenced > 0)
                })
                .map_err(PersistenceError::from)
        }).map_err(StoreError::from)
    }

    fn source_exists(&self, source: &str) -> StoreResult<bool> {
        let content_id = source_key(source);
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            let found: i64 = source_content::table.find(&content_id)
                                                  .count()
                                                  .get_result(&mut conn)
                                                  .map_err(PersistenceError::from)?;
            Ok(found > 0)
        }).map_err(StoreError::from)
    }

    fn increment_request_count(&self, raw_id: &str) -> StoreResult<Option<i64>> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction()
                .read_write()
                .run(|tx| {
                    let Some(canonical) = touch_binding(tx, raw_id)? else {
                        return Ok::<_, DieselError>(None);
                    };
                    diesel::update(summary::table.find(&canonical))
                        .set(summary::request_count.eq(summary::request_count + 1))
                        .returning(summary::request_count)
                        .get_result(tx)
                        .optional()
                })
                .map_err(PersistenceError::from)
        }).map_err(StoreError::from)
    }

    fn delete(&self, id: &str, delete_source: bool) -> StoreResult<()> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction()
                .read_write()
                .run(|tx| {
                    let canonical: String =
                        identifier_binding::table.find(id)
                                                 .select(identifier_binding::canonical_id)
                                                 .first(tx)
                                                 .optional()?
                                                 .unwrap_or_else(|| id.to_string());
                    let source_id: Option<String> = summary::table.find(&canonical)
                                                                  .select(summary::source_id)
                                                                  .first(tx)
                                                                  .optional()?;
                    // Bindings caen por ON DELETE CASCADE.
                    diesel::delete(summary::table.find(&canonical)).execute(tx)?;
                    if delete_source {
                        if let Some(source_id) = source_id {
                            delete_source_if_orphaned(tx, &source_id)?;
                        }
                    }
                    Ok::<_, DieselError>(())
                })
                .map_err(PersistenceError::from)
        }).map_err(StoreError::from)
    }

    fn binding(&self, raw_id: &str) -> StoreResult<Option<IdentifierBinding>> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            let row: Option<BindingRow> = identifier_binding::table.find(raw_id)
                                                                   .first(&mut conn)
                                                                   .optional()
                                                                   .map_err(PersistenceError::from)?;
            Ok(row.map(IdentifierBinding::from))
        }).map_err(StoreError::from)
    }

    fn bindings_to(&self, canonical_id: &str) -> StoreResult<Vec<IdentifierBinding>> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            let rows: Vec<BindingRow> =
                identifier_binding::table.filter(identifier_binding::canonical_id.eq(canonical_id))
                                         .load(&mut conn)
                                         .map_err(PersistenceError::from)?;
            Ok(rows.into_iter().map(IdentifierBinding::from).collect())
        }).map_err(StoreError::from)
    }

    fn update_cache_true(&self, id: &str) -> StoreResult<()> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction()
                .read_write()
                .run(|tx| {
                    let Some(canonical) = identifier_binding::table
                        .find(id)
                        .select(identifier_binding::canonical_id)
                        .first::<String>(tx)
                        .optional()?
                    else {
                        return Ok::<_, DieselError>(());
                    };
                    // Sólo false -> true (regla sticky), sobre el binding
                    // pedido y el self-binding de su canónico.
                    diesel::update(identifier_binding::table
                                       .filter(identifier_binding::raw_id.eq_any([id, canonical.as_str()]))
                                       .filter(identifier_binding::cache.eq(false)))
                        .set((identifier_binding::cache.eq(true),
                              identifier_binding::last_accessed.eq(Utc::now())))
                        .execute(tx)?;
                    Ok(())
                })
                .map_err(PersistenceError::from)
        }).map_err(StoreError::from)
    }

    fn delete_binding(&self, raw_id: &str) -> StoreResult<Option<String>> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::delete(identifier_binding::table.find(raw_id)
                                                    .filter(identifier_binding::cache.eq(false)))
                .returning(identifier_binding::canonical_id)
                .get_result(&mut conn)
                .optional()
                .map_err(PersistenceError::from)
        }).map_err(StoreError::from)
    }

    fn sweep_expired(&self, older_than: Duration) -> StoreResult<CleanupStats> {
        let cutoff = Utc::now() - older_than;
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction()
                .read_write()
                .run(|tx| {
                    // Fase 1: bindings no cacheados de resúmenes completados
                    // sin accesos recientes.
                    let bindings_deleted = diesel::sql_query(
                        "DELETE FROM identifier_binding b \
                         USING summary s \
                         WHERE b.canonical_id = s.summary_id \
                           AND NOT b.cache \
                           AND s.status = 'completed' \
                           AND b.last_accessed < $1")
                        .bind::<diesel::sql_types::Timestamptz, _>(cutoff)
                        .execute(tx)?;
                    // Fase 2: resúmenes que quedaron sin ningún binding.
                    let summaries_deleted = diesel::sql_query(
                        "DELETE FROM summary \
                         WHERE summary_id NOT IN \
                           (SELECT canonical_id FROM identifier_binding)")
                        .execute(tx)?;
                    // Fase 3: fuentes que ya no respaldan ningún resumen.
                    let sources_deleted = diesel::sql_query(
                        "DELETE FROM source_content \
                         WHERE content_id NOT IN (SELECT source_id FROM summary)")
                        .execute(tx)?;
                    Ok::<_, DieselError>(CleanupStats { bindings_deleted,
                                                        summaries_deleted,
                                                        sources_deleted })
                })
                .map_err(PersistenceError::from)
        }).map_err(StoreError::from)
        .map(|stats| {
            debug!("sweep: {} bindings, {} summaries, {} sources",
                   stats.bindings_deleted, stats.summaries_deleted, stats.sources_deleted);
            stats
        })
    }
}

/// Construye un pool Postgres r2d2 a partir de URL.
///
/// Valida y ajusta tamaños (si `min_size > max_size`, usa `min = max`) y
/// ejecuta las migraciones pendientes tras el primer checkout.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_min = if min_size == 0 { 1 } else { min_size };
    let validated_max = if max_size == 0 { 1 } else { max_size };
    if validated_min > validated_max {
        warn!("min_size > max_size ({validated_min} > {validated_max}), ajustando min=max");
    }
    let final_min = validated_min.min(validated_max);
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(final_min))
                                    .max_size(validated_max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}

/// Helper de desarrollo: carga `.env`, lee configuración (DATABASE_URL,
/// tamaños) y construye un pool ya migrado.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    crate::config::init_dotenv();
    let cfg = crate::config::DbConfig::from_env();
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}

/// Atajo: store Postgres listo a partir de un pool.
pub fn store_from_pool(pool: PgPool) -> PgSummaryStore<PoolProvider> {
    PgSummaryStore::new(PoolProvider { pool })
}
