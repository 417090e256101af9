//! Coordinador del ciclo de vida de las peticiones de resumen.
//!
//! Orquesta la máquina de estados de cada petición: alta con identificador
//! raw, re-anclaje al identificador canónico cuando una etapa transforma el
//! contenido, progreso por etapas, finalización y fallo. Toda decisión de
//! deduplicación pasa por el almacén; el coordinador no mantiene estado
//! propio y puede correr replicado detrás del mismo topic.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, warn};
use serde_json::{Map, Value};

use sum_domain::{validate_params, merge_warnings, NormalizedRequest, SummaryPatch,
                 SummaryStatus, Summary, Warnings};

use crate::channel::MessageSink;
use crate::errors::CoreError;
use crate::event::{ForwardedWork, StageEventKind, Topic};
use crate::keys::{document_key, text_key};
use crate::retention::CacheRetentionPolicy;
use crate::store::{RebindOutcome, SummaryStore};

pub struct LifecycleCoordinator<S: SummaryStore, K: MessageSink> {
    store: Arc<S>,
    sink: K,
    policy: CacheRetentionPolicy<S>,
}

impl<S: SummaryStore, K: MessageSink> LifecycleCoordinator<S, K> {
    pub fn new(store: Arc<S>, sink: K, policy: CacheRetentionPolicy<S>) -> Self {
        Self { store, sink, policy }
    }

    pub fn policy(&self) -> &CacheRetentionPolicy<S> {
        &self.policy
    }

    /// Alta de una petición de texto ya normalizada. Devuelve el
    /// identificador raw con el que el cliente consultará el estado.
    ///
    /// Si el identificador ya existe (misma tripleta texto/modelo/params
    /// crudos) no se relanza el pipeline: se incrementa el contador de
    /// peticiones y, si el cliente pidió caché, el binding se promociona.
    pub fn submit_text(&self, request: &NormalizedRequest, warnings: &Warnings)
                       -> Result<String, CoreError> {
        let raw_params = Value::Object(request.params.clone());
        let raw_id = text_key(&request.source, &request.model, &raw_params);
        if self.store.exists(&raw_id)? {
            self.store.increment_request_count(&raw_id)?;
            if request.cache {
                self.policy.retain(&raw_id)?;
            }
            debug!("request {raw_id} already known; pipeline not restarted");
            return Ok(raw_id);
        }

        let summary = Summary::new_text_request(raw_id.clone(),
                                                request.source.clone(),
                                                request.model.clone(),
                                                raw_params.clone(),
                                                request.language.clone(),
                                                warnings.clone());
        self.store.insert(&summary, request.cache)?;

        let work = ForwardedWork { text: request.source.clone(),
                                   model: request.model.clone(),
                                   params: raw_params };
        self.sink.produce(Topic::TextPreprocessing, &raw_id, &work.encode())?;
        Ok(raw_id)
    }

    /// Alta de una petición de documento. El identificador raw se deriva de
    /// los bytes y el rango de páginas; el texto fuente lo aportará la
    /// etapa de extracción (que consume el fichero fuera de este canal) con
    /// su evento `TextExtracted`, momento en el que la petición se re-ancla
    /// a su identidad textual canónica.
    pub fn submit_document(&self,
                           file_bytes: &[u8],
                           file_type: &str,
                           start_page: i32,
                           end_page: i32,
                           request: &NormalizedRequest,
                           warnings: &Warnings)
                           -> Result<String, CoreError> {
        let raw_id = document_key(file_bytes, start_page, end_page);
        if self.store.exists(&raw_id)? {
            self.store.increment_request_count(&raw_id)?;
            if request.cache {
                self.policy.retain(&raw_id)?;
            }
            debug!("document request {raw_id} already known; extraction not restarted");
            return Ok(raw_id);
        }

        let summary = Summary::new_document_request(raw_id.clone(),
                                                    file_type.to_string(),
                                                    start_page,
                                                    end_page,
                                                    request.model.clone(),
                                                    Value::Object(request.params.clone()),
                                                    request.language.clone(),
                                                    warnings.clone());
        self.store.insert(&summary, request.cache)?;
        Ok(raw_id)
    }

    /// Consulta de estado por identificador raw.
    pub fn fetch(&self, raw_id: &str) -> Result<Option<Summary>, CoreError> {
        Ok(self.store.get(raw_id)?)
    }

    /// Aplica un evento de etapa a la petición `raw_id`.
    ///
    /// Convergente bajo redelivery: re-aplicar el mismo evento deja el
    /// estado idéntico y no reenvía trabajo duplicado aguas abajo.
    pub fn handle(&self, raw_id: &str, event: StageEventKind) -> Result<(), CoreError> {
        match event {
            StageEventKind::TextExtracted { text, model, params, warnings } => {
                self.content_transformed(raw_id, &text, &model, params, warnings,
                                         SummaryStatus::Preprocessing,
                                         Topic::TextPreprocessing)
            }
            StageEventKind::Preprocessed { text, model, params, warnings } => {
                self.content_transformed(raw_id, &text, &model, params, warnings,
                                         SummaryStatus::Encoding, Topic::TextEncoding)
            }
            StageEventKind::Progress { status, warnings } => {
                self.advance(raw_id, status, SummaryPatch { status: Some(status),
                                                            warnings: Some(warnings),
                                                            ..Default::default() })
            }
            StageEventKind::Completed { output, params, warnings } => {
                let patch = SummaryPatch { status: Some(SummaryStatus::Completed),
                                           output: Some(output),
                                           params: Some(params),
                                           ended_at: Some(Utc::now()),
                                           warnings: Some(warnings) };
                self.advance(raw_id, SummaryStatus::Completed, patch)?;
                self.policy.on_completed(raw_id)?;
                Ok(())
            }
            StageEventKind::Failed { error } => {
                warn!("request {raw_id} failed in stage: {error}");
                let mut warnings = Warnings::new();
                warnings.insert("error".to_string(), vec![error]);
                self.advance(raw_id, SummaryStatus::Failed,
                             SummaryPatch { status: Some(SummaryStatus::Failed),
                                            ended_at: Some(Utc::now()),
                                            warnings: Some(warnings),
                                            ..Default::default() })
            }
        }
    }

    /// Una etapa transformó el contenido: el identificador canónico real se
    /// conoce ahora. Valida los params, re-ancla el binding y, si el trabajo
    /// sigue en vuelo, lo reenvía a la etapa siguiente con la clave nueva.
    fn content_transformed(&self,
                           raw_id: &str,
                           text: &str,
                           model: &str,
                           params: Value,
                           stage_warnings: Warnings,
                           next_status: SummaryStatus,
                           next_topic: Topic)
                           -> Result<(), CoreError> {
        let raw_params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let (canonical_params, param_warnings) = validate_params(&raw_params);
        let warnings = merge_warnings(&stage_warnings, &param_warnings);
        let canonical_params = Value::Object(canonical_params);
        let new_id = text_key(text, model, &canonical_params);

        match self.store.rebind(raw_id, &new_id, text)? {
            RebindOutcome::NotFound => Err(CoreError::UnknownRequest(raw_id.to_string())),
            RebindOutcome::Reused { canonical_id } => {
                // Ya hay un resumen completado para este contenido: el
                // cliente lo ve al instante y no se reenvía nada.
                self.store.increment_request_count(raw_id)?;
                debug!("request {raw_id} reuses completed summary {canonical_id}");
                Ok(())
            }
            RebindOutcome::Migrated { canonical_id } => {
                let current = self.store.get(raw_id)?
                                  .ok_or_else(|| CoreError::UnknownRequest(raw_id.to_string()))?;
                if !current.status.can_transition_to(next_status) {
                    // Redelivery de un evento viejo; el estado ya avanzó.
                    debug!("request {raw_id}: stale transition {} -> {next_status} ignored",
                           current.status);
                    return Ok(());
                }
                self.store.update(raw_id,
                                  SummaryPatch { status: Some(next_status),
                                                 params: Some(canonical_params.clone()),
                                                 warnings: Some(warnings),
                                                 ..Default::default() })?;
                let work = ForwardedWork { text: text.to_string(),
                                           model: model.to_string(),
                                           params: canonical_params };
                self.sink.produce(next_topic, &canonical_id, &work.encode())?;
                Ok(())
            }
        }
    }

    /// Avance de estado con guardia de transición hacia delante.
    fn advance(&self, raw_id: &str, target: SummaryStatus, patch: SummaryPatch)
               -> Result<(), CoreError> {
        let current = self.store.get(raw_id)?
                          .ok_or_else(|| CoreError::UnknownRequest(raw_id.to_string()))?;
        if current.status == target || !current.status.can_transition_to(target) {
            debug!("request {raw_id}: transition {} -> {target} ignored", current.status);
            return Ok(());
        }
        self.store.update(raw_id, patch)?;
        Ok(())
    }
}
