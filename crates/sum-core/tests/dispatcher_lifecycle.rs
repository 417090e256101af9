//! Tests de integración del ciclo de vida del dispatcher con el almacén y
//! el broker in-memory: deduplicación por re-anclaje, convergencia bajo
//! redelivery y retención sticky de la caché.

use std::sync::Arc;

use serde_json::{json, Value};

use sum_core::{CacheRetentionPolicy, ConsumerLoop, ForwardedWork, InMemoryBroker,
               InMemorySummaryStore, LifecycleCoordinator, StageEventKind, StageMessage,
               StopHandle, SummaryStore, Topic};
use sum_domain::{SummaryRequest, SummaryStatus};

fn build(broker: &InMemoryBroker)
         -> (Arc<InMemorySummaryStore>,
             LifecycleCoordinator<InMemorySummaryStore, InMemoryBroker>) {
    let store = Arc::new(InMemorySummaryStore::new());
    let policy = CacheRetentionPolicy::new(Arc::clone(&store));
    let coordinator = LifecycleCoordinator::new(Arc::clone(&store), broker.clone(), policy);
    (store, coordinator)
}

fn submit(coordinator: &LifecycleCoordinator<InMemorySummaryStore, InMemoryBroker>,
          source: &str,
          params: Value,
          cache: bool)
          -> String {
    let request = SummaryRequest { source: source.to_string(),
                                   model: None,
                                   params: Some(params),
                                   language: None,
                                   cache: Some(cache) };
    let (normalized, warnings) = request.normalize();
    coordinator.submit_text(&normalized, &warnings).unwrap()
}

fn preprocessed(text: &str, params: Value) -> StageEventKind {
    StageEventKind::Preprocessed { text: text.to_string(),
                                   model: "t5-large".to_string(),
                                   params,
                                   warnings: Default::default() }
}

/// Conduce una petición recién dada de alta hasta `completed`, simulando los
/// workers de etapa. Devuelve el identificador canónico.
fn drive_to_completion(broker: &InMemoryBroker,
                       coordinator: &LifecycleCoordinator<InMemorySummaryStore, InMemoryBroker>,
                       raw_id: &str,
                       clean_text: &str)
                       -> String {
    let inbound = broker.drain(Topic::TextPreprocessing);
    assert_eq!(inbound.len(), 1);
    assert_eq!(inbound[0].key, raw_id);
    let work = ForwardedWork::decode(&inbound[0].value).unwrap();

    coordinator.handle(raw_id, preprocessed(clean_text, work.params)).unwrap();

    let forwarded = broker.drain(Topic::TextEncoding);
    assert_eq!(forwarded.len(), 1);
    let canonical_id = forwarded[0].key.clone();
    let work = ForwardedWork::decode(&forwarded[0].value).unwrap();

    coordinator.handle(&canonical_id,
                       StageEventKind::Progress { status: SummaryStatus::Summarizing,
                                                  warnings: Default::default() })
               .unwrap();
    coordinator.handle(&canonical_id,
                       StageEventKind::Completed { output: format!("resumen de: {clean_text}"),
                                                   params: work.params,
                                                   warnings: Default::default() })
               .unwrap();
    canonical_id
}

#[test]
fn text_request_reaches_completed_through_all_stages() {
    let broker = InMemoryBroker::default();
    let (store, coordinator) = build(&broker);

    let raw_id = submit(&coordinator, "  Hola  mundo  ", json!({"top_k": 10}), true);
    let initial = store.get(&raw_id).unwrap().unwrap();
    assert_eq!(initial.status, SummaryStatus::Preprocessing);
    assert!(initial.output.is_none());

    let canonical_id = drive_to_completion(&broker, &coordinator, &raw_id, "Hola mundo");
    assert_ne!(raw_id, canonical_id);

    // El cliente sigue consultando por su identificador raw.
    let done = store.get(&raw_id).unwrap().unwrap();
    assert_eq!(done.status, SummaryStatus::Completed);
    assert!(done.ended_at.is_some());
    assert_eq!(done.output.as_deref(), Some("resumen de: Hola mundo"));
    // Los params del resumen final son los canónicos: el esquema completo.
    assert_eq!(done.params.as_object().unwrap().len(), 11);
}

#[test]
fn second_request_with_same_canonical_content_reuses_completed_summary() {
    let broker = InMemoryBroker::default();
    let (store, coordinator) = build(&broker);

    let raw_a = submit(&coordinator, "  Hola  mundo  ", json!({}), false);
    drive_to_completion(&broker, &coordinator, &raw_a, "Hola mundo");

    // Petición distinta en crudo (param desconocido, que el validador
    // descarta) pero idéntica tras normalizar: mismo canónico.
    let raw_b = submit(&coordinator, "Hola   mundo ", json!({"bogus": 1}), true);
    assert_ne!(raw_a, raw_b);
    broker.drain(Topic::TextPreprocessing);

    coordinator.handle(&raw_b, preprocessed("Hola mundo", json!({"bogus": 1})))
               .unwrap();

    // Cortocircuito: nada viaja a encoding y el resultado es inmediato.
    assert!(broker.is_empty(Topic::TextEncoding));
    let reused = store.get(&raw_b).unwrap().unwrap();
    assert_eq!(reused.status, SummaryStatus::Completed);
    assert_eq!(reused.output.as_deref(), Some("resumen de: Hola mundo"));
    assert!(reused.request_count >= 1);

    // El artifact en vuelo de B quedó huérfano y fue eliminado.
    let binding_b = store.binding(&raw_b).unwrap().unwrap();
    let binding_a = store.binding(&raw_a).unwrap().unwrap();
    assert_eq!(binding_b.canonical_id, binding_a.canonical_id);
}

#[test]
fn replayed_events_leave_state_unchanged() {
    let broker = InMemoryBroker::default();
    let (store, coordinator) = build(&broker);

    let raw_id = submit(&coordinator, "texto estable", json!({"top_k": 3}), true);
    let canonical_id = drive_to_completion(&broker, &coordinator, &raw_id, "texto estable");
    let first = store.get(&raw_id).unwrap().unwrap();

    // Redelivery at-least-once: los mismos eventos llegan otra vez.
    coordinator.handle(&raw_id, preprocessed("texto estable", json!({"top_k": 3})))
               .unwrap();
    coordinator.handle(&canonical_id,
                       StageEventKind::Completed { output: first.output.clone().unwrap(),
                                                   params: first.params.clone(),
                                                   warnings: first.warnings.clone() })
               .unwrap();

    let second = store.get(&raw_id).unwrap().unwrap();
    assert_eq!(second.status, first.status);
    assert_eq!(second.output, first.output);
    assert_eq!(second.warnings, first.warnings);
    // El replay del evento de transformación no reenvía trabajo duplicado.
    assert!(broker.is_empty(Topic::TextEncoding));
}

#[test]
fn cache_flag_is_sticky_across_shared_bindings() {
    let broker = InMemoryBroker::default();
    let (store, coordinator) = build(&broker);

    let raw_a = submit(&coordinator, "contenido compartido", json!({}), false);
    drive_to_completion(&broker, &coordinator, &raw_a, "contenido compartido");

    // Segundo solicitante con cache=true sobre el mismo contenido canónico.
    let raw_b = submit(&coordinator, " contenido  compartido ", json!({}), true);
    broker.drain(Topic::TextPreprocessing);
    coordinator.handle(&raw_b, preprocessed("contenido compartido", json!({})))
               .unwrap();

    let canonical = store.binding(&raw_b).unwrap().unwrap().canonical_id;
    // El self-binding del canónico quedó retenido por la regla OR.
    let self_binding = store.binding(&canonical).unwrap().unwrap();
    assert!(self_binding.cache);

    // El barrido expira el binding no cacheado de A, pero el resumen
    // sobrevive mientras alguna referencia lo retenga.
    let stats = store.sweep_expired(chrono::Duration::seconds(0)).unwrap();
    assert_eq!(stats.summaries_deleted, 0);
    assert!(store.get(&raw_b).unwrap().is_some());
    assert_eq!(store.get(&raw_b).unwrap().unwrap().status, SummaryStatus::Completed);
}

#[test]
fn repeated_submission_of_identical_request_does_not_restart_pipeline() {
    let broker = InMemoryBroker::default();
    let (store, coordinator) = build(&broker);

    let raw_1 = submit(&coordinator, "mismo texto", json!({"top_k": 7}), true);
    let raw_2 = submit(&coordinator, "mismo texto", json!({"top_k": 7}), true);
    assert_eq!(raw_1, raw_2);

    // Sólo el primer alta publica trabajo de preprocesado; el contador
    // refleja las dos peticiones.
    assert_eq!(broker.len(Topic::TextPreprocessing), 1);
    assert_eq!(store.get(&raw_1).unwrap().unwrap().request_count, 2);
}

#[test]
fn consumer_loop_applies_events_and_skips_garbage() {
    let broker = InMemoryBroker::default();
    let (store, coordinator) = build(&broker);

    let raw_id = submit(&coordinator, "texto por lotes", json!({}), true);
    broker.drain(Topic::TextPreprocessing);

    let event = StageMessage { summary_status: "preprocessing".into(),
                               text_preprocessed: Some("texto por lotes".into()),
                               text_extracted: None,
                               model: Some("t5-large".into()),
                               params: Some(json!({})),
                               output: None,
                               warnings: None,
                               error: None };
    broker.push(Topic::Dispatcher, "llave-desconocida", "{no es json").unwrap();
    broker.push(Topic::Dispatcher, &raw_id, &event.encode()).unwrap();

    let stop = StopHandle::new();
    let source = broker.source(Topic::Dispatcher);
    let mut consumer = ConsumerLoop::new(coordinator, source, stop);
    consumer.step().unwrap(); // mensaje basura: se salta
    consumer.step().unwrap(); // evento real: se aplica

    assert_eq!(store.get(&raw_id).unwrap().unwrap().status, SummaryStatus::Encoding);
    assert_eq!(broker.len(Topic::TextEncoding), 1);
}

#[test]
fn document_request_joins_the_text_lifecycle_after_extraction() {
    let broker = InMemoryBroker::default();
    let (store, coordinator) = build(&broker);

    let request = SummaryRequest { source: String::new(),
                                   model: None,
                                   params: None,
                                   language: None,
                                   cache: Some(true) };
    let (normalized, warnings) = request.normalize();
    let raw_id = coordinator.submit_document(b"%PDF-1.4 fake bytes", "pdf", 0, 3,
                                             &normalized, &warnings)
                            .unwrap();

    let pending = store.get(&raw_id).unwrap().unwrap();
    assert_eq!(pending.status, SummaryStatus::PendingExtraction);

    // La etapa de extracción publica el texto del documento.
    coordinator.handle(&raw_id,
                       StageEventKind::TextExtracted { text: "texto extraído del pdf".into(),
                                                       model: "t5-large".into(),
                                                       params: json!({}),
                                                       warnings: Default::default() })
               .unwrap();

    // Desde aquí la petición es indistinguible de una de texto.
    let migrated = store.get(&raw_id).unwrap().unwrap();
    assert_eq!(migrated.status, SummaryStatus::Preprocessing);
    assert_eq!(migrated.source, "texto extraído del pdf");
    assert_eq!(broker.len(Topic::TextPreprocessing), 1);
}

#[test]
fn failed_stage_is_terminal_and_keeps_the_error() {
    let broker = InMemoryBroker::default();
    let (store, coordinator) = build(&broker);

    let raw_id = submit(&coordinator, "texto que falla", json!({}), true);
    coordinator.handle(&raw_id,
                       StageEventKind::Failed { error: "model runner crashed".into() })
               .unwrap();

    let failed = store.get(&raw_id).unwrap().unwrap();
    assert_eq!(failed.status, SummaryStatus::Failed);
    assert!(failed.ended_at.is_some());
    assert_eq!(failed.warnings["error"], vec!["model runner crashed".to_string()]);

    // Terminal: un evento de progreso posterior no lo resucita.
    coordinator.handle(&raw_id,
                       StageEventKind::Progress { status: SummaryStatus::Summarizing,
                                                  warnings: Default::default() })
               .unwrap();
    assert_eq!(store.get(&raw_id).unwrap().unwrap().status, SummaryStatus::Failed);
}
