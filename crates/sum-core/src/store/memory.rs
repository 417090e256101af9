//! Implementación in-memory del `SummaryStore`.
//!
//! Paridad semántica 1:1 con el backend Postgres: mismas reglas de
//! deduplicación de fuentes, cascada de borrados y propagación del flag de
//! caché. El `Mutex` interior sólo protege los mapas de este proceso; la
//! corrección multi-worker del sistema real recae en el almacén
//! transaccional compartido.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use sum_domain::{merge_warnings, IdentifierBinding, SourceKind, Summary, SummaryPatch,
                 SummaryStatus, Warnings};

use crate::keys::source_key;

use super::{CleanupStats, RebindOutcome, StoreResult, SummaryStore};

#[derive(Debug, Clone)]
struct SourceRow {
    content: String,
}

#[derive(Debug, Clone)]
struct SummaryRow {
    source_id: String,
    output: Option<String>,
    model: String,
    params: Value,
    status: SummaryStatus,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    language: String,
    warnings: Warnings,
    request_count: i64,
    source_kind: SourceKind,
}

#[derive(Debug, Clone)]
struct BindingRow {
    canonical_id: String,
    cache: bool,
    last_accessed: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    sources: HashMap<String, SourceRow>,
    summaries: HashMap<String, SummaryRow>,
    bindings: HashMap<String, BindingRow>,
}

impl Inner {
    fn assemble(&self, canonical_id: &str) -> Option<Summary> {
        let row = self.summaries.get(canonical_id)?;
        let source = self.sources
                         .get(&row.source_id)
                         .map(|s| s.content.clone())
                         .unwrap_or_default();
        Some(Summary { id: canonical_id.to_string(),
                       source,
                       output: row.output.clone(),
                       model: row.model.clone(),
                       params: row.params.clone(),
                       status: row.status,
                       started_at: row.started_at,
                       ended_at: row.ended_at,
                       language: row.language.clone(),
                       warnings: row.warnings.clone(),
                       request_count: row.request_count,
                       source_kind: row.source_kind.clone() })
    }

    fn drop_summary(&mut self, canonical_id: &str, delete_source: bool) {
        if let Some(row) = self.summaries.remove(canonical_id) {
            // Cascada: bindings que apuntaban al resumen borrado.
            self.bindings.retain(|_, b| b.canonical_id != canonical_id);
            if delete_source && !self.source_in_use(&row.source_id) {
                self.sources.remove(&row.source_id);
            }
        }
    }

    fn source_in_use(&self, source_id: &str) -> bool {
        self.summaries.values().any(|s| s.source_id == source_id)
    }

    fn referenced(&self, canonical_id: &str) -> bool {
        self.bindings.values().any(|b| b.canonical_id == canonical_id)
    }
}

#[derive(Default)]
pub struct InMemorySummaryStore {
    inner: Mutex<Inner>,
}

impl InMemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SummaryStore for InMemorySummaryStore {
    fn get(&self, raw_id: &str) -> StoreResult<Option<Summary>> {
        let mut inner = self.inner.lock().expect("store lock");
        let canonical = match inner.bindings.get_mut(raw_id) {
            Some(binding) => {
                binding.last_accessed = Utc::now();
                binding.canonical_id.clone()
            }
            None => return Ok(None),
        };
        Ok(inner.assemble(&canonical))
    }

    fn insert(&self, summary: &Summary, cache: bool) -> StoreResult<()> {
        let mut inner = self.inner.lock().expect("store lock");
        let source_id = source_key(&summary.source);
        inner.sources
             .entry(source_id.clone())
             .or_insert_with(|| SourceRow { content: summary.source.clone() });

        if inner.summaries.contains_key(&summary.id) {
            // Re-petición del mismo identificador: el contenido ya existe,
            // pero el binding del solicitante se establece igualmente.
            match inner.bindings.get_mut(&summary.id) {
                Some(binding) => {
                    binding.last_accessed = Utc::now();
                    if cache && !binding.cache {
                        binding.cache = true;
                    }
                }
                None => {
                    inner.bindings.insert(summary.id.clone(),
                                          BindingRow { canonical_id: summary.id.clone(),
                                                       cache,
                                                       last_accessed: Utc::now() });
                }
            }
            if let Some(row) = inner.summaries.get_mut(&summary.id) {
                row.request_count += 1;
            }
            return Ok(());
        }

        inner.summaries.insert(summary.id.clone(),
                               SummaryRow { source_id,
                                            output: summary.output.clone(),
                                            model: summary.model.clone(),
                                            params: summary.params.clone(),
                                            status: summary.status,
                                            started_at: summary.started_at,
                                            ended_at: summary.ended_at,
                                            language: summary.language.clone(),
                                            warnings: summary.warnings.clone(),
                                            request_count: summary.request_count,
                                            source_kind: summary.source_kind.clone() });
        inner.bindings.insert(summary.id.clone(),
                              BindingRow { canonical_id: summary.id.clone(),
                                           cache,
                                           last_accessed: Utc::now() });
        Ok(())
    }

    fn update(&self, raw_id: &str, patch: SummaryPatch) -> StoreResult<Option<Summary>> {
        let mut inner = self.inner.lock().expect("store lock");
        let canonical = match inner.bindings.get_mut(raw_id) {
            Some(binding) => {
                binding.last_accessed = Utc::now();
                binding.canonical_id.clone()
            }
            None => return Ok(None),
        };
        let Some(row) = inner.summaries.get_mut(&canonical) else {
            return Ok(None);
        };
        if let Some(status) = patch.status {
            row.status = status;
        }
        if let Some(output) = patch.output {
            row.output = Some(output);
        }
        if let Some(params) = patch.params {
            row.params = params;
        }
        if let Some(ended_at) = patch.ended_at {
            row.ended_at = Some(ended_at);
        }
        if let Some(new_warnings) = patch.warnings {
            row.warnings = merge_warnings(&row.warnings, &new_warnings);
        }
        Ok(inner.assemble(&canonical))
    }

    fn rebind(&self, raw_id: &str, new_canonical_id: &str, new_source: &str)
              -> StoreResult<RebindOutcome> {
        let mut inner = self.inner.lock().expect("store lock");
        let Some(binding) = inner.bindings.get(raw_id) else {
            return Ok(RebindOutcome::NotFound);
        };
        let old_canonical = binding.canonical_id.clone();
        let raw_cache = binding.cache;

        let target_completed = inner.summaries
                                    .get(new_canonical_id)
                                    .map(|s| s.status == SummaryStatus::Completed)
                                    .unwrap_or(false);

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
            // Cortocircuito: repuntar, propagar caché (OR) y borrar el
            // artifact en vuelo huérfano si nadie más lo referencia.
            if let Some(b) = inner.bindings.get_mut(raw_id) {
                b.canonical_id = new_canonical_id.to_string();
                b.last_accessed = Utc::now();
            }
            if raw_cache {
                if let Some(b) = inner.bindings.get_mut(new_canonical_id) {
                    if !b.cache {
                        b.cache = true;
                        b.last_accessed = Utc::now();
                    }
                }
            }
            if !inner.referenced(&old_canonical) {
                inner.drop_summary(&old_canonical, true);
            }
            return Ok(RebindOutcome::Reused { canonical_id: new_canonical_id.to_string() });
        }

        // Migración: renombrar el artifact en vuelo al identificador nuevo
        // con su contenido normalizado.
        if let Some(mut row) = inner.summaries.remove(&old_canonical) {
            let old_source_id = row.source_id.clone();
            let new_source_id = source_key(new_source);
            inner.sources
                 .entry(new_source_id.clone())
                 .or_insert_with(|| SourceRow { content: new_source.to_string() });
            row.source_id = new_source_id;
            inner.summaries.insert(new_canonical_id.to_string(), row);
            if !inner.source_in_use(&old_source_id) {
                inner.sources.remove(&old_source_id);
            }
        }
        // Todos los bindings que apuntaban al canónico viejo siguen el
        // renombrado (equivalente al ON UPDATE CASCADE del backend SQL).
        for b in inner.bindings.values_mut() {
            if b.canonical_id == old_canonical {
                b.canonical_id = new_canonical_id.to_string();
            }
        }
        if let Some(b) = inner.bindings.get_mut(raw_id) {
            b.canonical_id = new_canonical_id.to_string();
            b.last_accessed = Utc::now();
        }
        // Self-binding del canónico nuevo, heredando el flag del raw, para
        // que el resumen sea recuperable también por su id normalizado.
        if !inner.bindings.contains_key(new_canonical_id) {
            inner.bindings.insert(new_canonical_id.to_string(),
                                  BindingRow { canonical_id: new_canonical_id.to_string(),
                                               cache: raw_cache,
                                               last_accessed: Utc::now() });
        }
        Ok(RebindOutcome::Migrated { canonical_id: new_canonical_id.to_string() })
    }

    fn exists(&self, id: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock().expect("store lock");
        if let Some(binding) = inner.bindings.get_mut(id) {
            binding.last_accessed = Utc::now();
            return Ok(true);
        }
        Ok(inner.bindings.values().any(|b| b.canonical_id == id))
    }

    fn source_exists(&self, source: &str) -> StoreResult<bool> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner.sources.contains_key(&source_key(source)))
    }

    fn increment_request_count(&self, raw_id: &str) -> StoreResult<Option<i64>> {
        let mut inner = self.inner.lock().expect("store lock");
        let Some(canonical) = inner.bindings.get(raw_id).map(|b| b.canonical_id.clone()) else {
            return Ok(None);
        };
        Ok(inner.summaries.get_mut(&canonical).map(|row| {
                                                  row.request_count += 1;
                                                  row.request_count
                                              }))
    }

    fn delete(&self, id: &str, delete_source: bool) -> StoreResult<()> {
        let mut inner = self.inner.lock().expect("store lock");
        let canonical = inner.bindings
                             .get(id)
                             .map(|b| b.canonical_id.clone())
                             .unwrap_or_else(|| id.to_string());
        inner.drop_summary(&canonical, delete_source);
        Ok(())
    }

    fn binding(&self, raw_id: &str) -> StoreResult<Option<IdentifierBinding>> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner.bindings.get(raw_id).map(|b| IdentifierBinding {
                                             raw_id: raw_id.to_string(),
                                             canonical_id: b.canonical_id.clone(),
                                             cache: b.cache,
                                             last_accessed: b.last_accessed,
                                         }))
    }

    fn bindings_to(&self, canonical_id: &str) -> StoreResult<Vec<IdentifierBinding>> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner.bindings
                .iter()
                .filter(|(_, b)| b.canonical_id == canonical_id)
                .map(|(raw, b)| IdentifierBinding { raw_id: raw.clone(),
                                                    canonical_id: b.canonical_id.clone(),
                                                    cache: b.cache,
                                                    last_accessed: b.last_accessed })
                .collect())
    }

    fn update_cache_true(&self, id: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().expect("store lock");
        let Some(canonical) = inner.bindings.get(id).map(|b| b.canonical_id.clone()) else {
            return Ok(());
        };
        // El binding pedido y el self-binding de su canónico; sólo
        // false -> true (regla sticky).
        for key in [id, canonical.as_str()] {
            if let Some(b) = inner.bindings.get_mut(key) {
                if !b.cache {
                    b.cache = true;
                    b.last_accessed = Utc::now();
                }
            }
        }
        Ok(())
    }

    fn delete_binding(&self, raw_id: &str) -> StoreResult<Option<String>> {
        let mut inner = self.inner.lock().expect("store lock");
        let cached = inner.bindings.get(raw_id).map(|b| b.cache);
        match cached {
            Some(false) => Ok(inner.bindings.remove(raw_id).map(|b| b.canonical_id)),
            _ => Ok(None),
        }
    }

    fn sweep_expired(&self, older_than: Duration) -> StoreResult<CleanupStats> {
        let mut inner = self.inner.lock().expect("store lock");
        let cutoff = Utc::now() - older_than;
        let mut stats = CleanupStats::default();

        // Fase 1: bindings no cacheados de resúmenes completados, sin
        // accesos recientes.
        let expired: Vec<String> =
            inner.bindings
                 .iter()
                 .filter(|(_, b)| {
                     !b.cache
                     && b.last_accessed < cutoff
                     && inner.summaries
                             .get(&b.canonical_id)
                             .map(|s| s.status == SummaryStatus::Completed)
                             .unwrap_or(false)
                 })
                 .map(|(raw, _)| raw.clone())
                 .collect();
        for raw in &expired {
            inner.bindings.remove(raw);
        }
        stats.bindings_deleted = expired.len();

        // Fase 2: resúmenes que quedaron sin ningún binding.
        let orphaned: Vec<String> = inner.summaries
                                         .keys()
                                         .filter(|id| !inner.referenced(id))
                                         .cloned()
                                         .collect();
        for id in &orphaned {
            inner.summaries.remove(id);
        }
        stats.summaries_deleted = orphaned.len();

        // Fase 3: fuentes que ya no respaldan ningún resumen.
        let dead_sources: Vec<String> = inner.sources
                                             .keys()
                                             .filter(|id| !inner.source_in_use(id))
                                             .cloned()
                                             .collect();
        for id in &dead_sources {
            inner.sources.remove(id);
        }
        stats.sources_deleted = dead_sources.len();

        Ok(stats)
    }
}
