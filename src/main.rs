//! Demo ejecutable del dispatcher de resúmenes sobre el backend in-memory.
//!
//! Simula los workers de etapa drenando sus topics y publicando los eventos
//! de vuelta al topic del dispatcher, igual que harían los servicios reales
//! detrás del broker.

use std::sync::Arc;

use serde_json::{json, to_string_pretty};

use sum_core::{CacheRetentionPolicy, ConsumerLoop, ForwardedWork, InMemoryBroker,
               InMemorySummaryStore, LifecycleCoordinator, StageMessage, StopHandle,
               SummaryStore, Topic};
use sum_domain::{SummaryRequest, SummaryResponse, SummaryStatus};

fn main() {
    // Cargar variables de entorno desde .env si existe.
    let _ = dotenvy::dotenv();
    env_logger::init();

    run_pipeline_demo();
    run_cache_demo();
    run_persistence_demo();
}

/// Contra Postgres real sólo si hay `DATABASE_URL`; si no, se omite.
fn run_persistence_demo() {
    if std::env::var("DATABASE_URL").is_err() {
        println!("\n(sin DATABASE_URL: demo de persistencia Postgres omitida)");
        return;
    }
    println!("\n== demo: store Postgres ==");
    match sum_persistence::build_dev_pool_from_env() {
        Ok(pool) => {
            let store = sum_persistence::store_from_pool(pool);
            let text = format!("demo persistente {}", chrono::Utc::now().timestamp_micros());
            let params = json!({});
            let id = sum_core::keys::text_key(&text, "t5-large", &params);
            let summary = sum_domain::Summary::new_text_request(id.clone(),
                                                                text,
                                                                "t5-large".to_string(),
                                                                params,
                                                                "en".to_string(),
                                                                Default::default());
            store.insert(&summary, true).expect("insert");
            let loaded = store.get(&id).expect("get").expect("row");
            println!("resumen persistido y recuperado: {} ({})", loaded.id, loaded.status);
        }
        Err(e) => println!("pool no disponible: {e}"),
    }
}

/// Worker de preprocesado simulado: normaliza espacios del texto.
fn fake_preprocess(broker: &InMemoryBroker) {
    for msg in broker.drain(Topic::TextPreprocessing) {
        let work = ForwardedWork::decode(&msg.value).expect("work payload");
        let clean = work.text.split_whitespace().collect::<Vec<_>>().join(" ");
        let event = StageMessage { summary_status: "preprocessing".into(),
                                   text_preprocessed: Some(clean),
                                   text_extracted: None,
                                   model: Some(work.model),
                                   params: Some(work.params),
                                   output: None,
                                   warnings: None,
                                   error: None };
        broker.push(Topic::Dispatcher, &msg.key, &event.encode()).expect("dispatcher queue");
    }
}

/// Workers de encoding+resumen simulados: progreso y finalización.
fn fake_summarize(broker: &InMemoryBroker) {
    for msg in broker.drain(Topic::TextEncoding) {
        let work = ForwardedWork::decode(&msg.value).expect("work payload");
        let progress = StageMessage { summary_status: "summarizing".into(),
                                      text_preprocessed: None,
                                      text_extracted: None,
                                      model: None,
                                      params: None,
                                      output: None,
                                      warnings: None,
                                      error: None };
        broker.push(Topic::Dispatcher, &msg.key, &progress.encode()).expect("dispatcher queue");

        let head: String = work.text.split(' ').take(5).collect::<Vec<_>>().join(" ");
        let done = StageMessage { summary_status: "completed".into(),
                                  text_preprocessed: None,
                                  text_extracted: None,
                                  model: None,
                                  params: Some(work.params),
                                  output: Some(format!("{head}…")),
                                  warnings: None,
                                  error: None };
        broker.push(Topic::Dispatcher, &msg.key, &done.encode()).expect("dispatcher queue");
    }
}

fn run_pipeline_demo() {
    println!("== demo: pipeline de texto hasta completed ==");
    let broker = InMemoryBroker::default();
    let store = Arc::new(InMemorySummaryStore::new());
    let policy = CacheRetentionPolicy::new(Arc::clone(&store));
    let coordinator = LifecycleCoordinator::new(Arc::clone(&store), broker.clone(), policy);

    let request = SummaryRequest { source: "  La  inteligencia artificial  avanza  más \
                                            rápido de lo que sus reguladores alcanzan  "
                                                .to_string(),
                                   model: None,
                                   params: Some(json!({"relative_max_length": 0.5})),
                                   language: None,
                                   cache: Some(true) };
    let (normalized, warnings) = request.normalize();
    let raw_id = coordinator.submit_text(&normalized, &warnings).expect("submit");
    println!("request_id: {raw_id}");

    let stop = StopHandle::new();
    let source = broker.source(Topic::Dispatcher);
    let mut consumer = ConsumerLoop::new(coordinator, source, stop);

    // Rondas worker -> dispatcher hasta vaciar el sistema.
    while !broker.is_empty(Topic::TextPreprocessing)
          || !broker.is_empty(Topic::TextEncoding)
          || !broker.is_empty(Topic::Dispatcher)
    {
        fake_preprocess(&broker);
        fake_summarize(&broker);
        while !broker.is_empty(Topic::Dispatcher) {
            consumer.step().expect("consumer step");
        }
    }

    let summary = store.get(&raw_id).expect("store").expect("summary");
    assert_eq!(summary.status, SummaryStatus::Completed);
    let response = SummaryResponse::from_summary(&raw_id, &summary);
    println!("{}", to_string_pretty(&response).expect("serialize response"));
}

fn run_cache_demo() {
    println!("\n== demo: deduplicación y expiración de caché ==");
    let broker = InMemoryBroker::default();
    let store = Arc::new(InMemorySummaryStore::new());
    let policy = CacheRetentionPolicy::with_retention(Arc::clone(&store),
                                                      chrono::Duration::seconds(0));
    let coordinator = LifecycleCoordinator::new(Arc::clone(&store), broker.clone(), policy);

    let first = SummaryRequest { source: "el mismo contenido  para dos clientes".to_string(),
                                 model: None,
                                 params: None,
                                 language: None,
                                 cache: Some(false) };
    let (normalized, warnings) = first.normalize();
    let raw_a = coordinator.submit_text(&normalized, &warnings).expect("submit");

    let stop = StopHandle::new();
    let source = broker.source(Topic::Dispatcher);
    let mut consumer = ConsumerLoop::new(coordinator, source, stop);
    fake_preprocess(&broker);
    while !broker.is_empty(Topic::Dispatcher) || !broker.is_empty(Topic::TextEncoding) {
        while !broker.is_empty(Topic::Dispatcher) {
            consumer.step().expect("consumer step");
        }
        fake_summarize(&broker);
    }
    println!("primer cliente completado: {raw_a}");

    // Segundo cliente, espaciado distinto: mismo contenido canónico.
    let second = SummaryRequest { source: "el  mismo  contenido para dos  clientes".to_string(),
                                  model: None,
                                  params: None,
                                  language: None,
                                  cache: Some(true) };
    let (normalized, warnings) = second.normalize();
    let raw_b = consumer.coordinator().submit_text(&normalized, &warnings).expect("submit");
    fake_preprocess(&broker);
    while !broker.is_empty(Topic::Dispatcher) {
        consumer.step().expect("consumer step");
    }
    let reused = store.get(&raw_b).expect("store").expect("summary");
    println!("segundo cliente reutiliza sin recomputar: status={} count={}",
             reused.status, reused.request_count);
    assert_eq!(reused.status, SummaryStatus::Completed);
    assert!(broker.is_empty(Topic::TextEncoding));

    // Barrido: el binding no cacheado de A expira; el resumen sobrevive
    // porque B lo retiene.
    let stats = store.sweep_expired(chrono::Duration::seconds(0)).expect("sweep");
    println!("sweep: bindings={} summaries={} sources={}",
             stats.bindings_deleted, stats.summaries_deleted, stats.sources_deleted);
    assert!(store.get(&raw_b).expect("store").is_some());
    println!("el resumen retenido sigue disponible para el cliente con cache=true");
}
