//! Recorrido extremo a extremo de una petición de resumen: alta normalizada,
//! estados intermedios visibles para el cliente y finalización con los
//! params canónicos completos.

use std::sync::Arc;

use serde_json::json;

use sum_core::{CacheRetentionPolicy, ConsumerLoop, ForwardedWork, InMemoryBroker,
               InMemorySummaryStore, LifecycleCoordinator, StageMessage, StopHandle,
               SummaryStore, Topic};
use sum_domain::{SummaryRequest, SummaryResponse, SummaryStatus};

/// Simula el worker de preprocesado: colapsa espacios y devuelve el evento.
fn preprocess_round(broker: &InMemoryBroker) {
    for msg in broker.drain(Topic::TextPreprocessing) {
        let work = ForwardedWork::decode(&msg.value).unwrap();
        let clean = work.text.split_whitespace().collect::<Vec<_>>().join(" ");
        let event = StageMessage { summary_status: "preprocessing".into(),
                                   text_preprocessed: Some(clean),
                                   text_extracted: None,
                                   model: Some(work.model),
                                   params: Some(work.params),
                                   output: None,
                                   warnings: None,
                                   error: None };
        broker.push(Topic::Dispatcher, &msg.key, &event.encode()).unwrap();
    }
}

/// Simula encoding + resumen + postprocesado en un solo worker.
fn summarize_round(broker: &InMemoryBroker) {
    for msg in broker.drain(Topic::TextEncoding) {
        let work = ForwardedWork::decode(&msg.value).unwrap();
        let done = StageMessage { summary_status: "completed".into(),
                                  text_preprocessed: None,
                                  text_extracted: None,
                                  model: None,
                                  params: Some(work.params),
                                  output: Some(format!("[resumen] {}", work.text)),
                                  warnings: None,
                                  error: None };
        broker.push(Topic::Dispatcher, &msg.key, &done.encode()).unwrap();
    }
}

#[test]
fn summary_request_end_to_end() {
    let broker = InMemoryBroker::default();
    let store = Arc::new(InMemorySummaryStore::new());
    let policy = CacheRetentionPolicy::new(Arc::clone(&store));
    let coordinator = LifecycleCoordinator::new(Arc::clone(&store), broker.clone(), policy);

    // Petición con modelo no soportado y un param fuera de rango: ambos se
    // sustituyen con warning, nunca con error.
    let request = SummaryRequest { source: "  Un  texto  de  entrada  con  ruido  ".into(),
                                   model: Some("bloom-petabyte".into()),
                                   params: Some(json!({"relative_max_length": 7.5})),
                                   language: None,
                                   cache: Some(true) };
    let (normalized, warnings) = request.normalize();
    assert!(warnings.contains_key("model"));

    let raw_id = coordinator.submit_text(&normalized, &warnings).unwrap();

    // Antes de que los workers corran, el cliente ve un estado en curso.
    let pending = store.get(&raw_id).unwrap().unwrap();
    assert_ne!(pending.status, SummaryStatus::Completed);
    assert!(pending.output.is_none());

    let stop = StopHandle::new();
    let source = broker.source(Topic::Dispatcher);
    let mut consumer = ConsumerLoop::new(coordinator, source, stop);

    while !broker.is_empty(Topic::TextPreprocessing)
          || !broker.is_empty(Topic::TextEncoding)
          || !broker.is_empty(Topic::Dispatcher)
    {
        preprocess_round(&broker);
        summarize_round(&broker);
        while !broker.is_empty(Topic::Dispatcher) {
            consumer.step().unwrap();
        }
    }

    let done = store.get(&raw_id).unwrap().unwrap();
    let response = SummaryResponse::from_summary(&raw_id, &done);
    assert_eq!(response.status, SummaryStatus::Completed);
    assert!(response.ended_at.is_some());
    let output = response.output.expect("output presente");
    assert!(!output.is_empty());
    assert_eq!(output, "[resumen] Un texto de entrada con ruido");

    // Params canónicos: el esquema completo, con el fuera-de-rango en su
    // default y el warning correspondiente acumulado.
    let params = response.params.as_object().unwrap();
    assert_eq!(params.len(), 11);
    assert_eq!(params["relative_max_length"], json!(0.4));
    assert!(response.warnings.contains_key("model"));
    assert!(response.warnings.contains_key("relative_max_length"));
}
