//! Contrato del `SummaryStore` contra Postgres real.
//!
//! Se salta si no hay `DATABASE_URL` definido. Cada test usa contenido
//! único (timestamp en el texto) para no pisarse con ejecuciones previas
//! sobre la misma base.


use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;
use sum_core::keys::text_key;
use sum_core::{RebindOutcome, SummaryStore};
use sum_domain::{Summary, SummaryPatch, SummaryStatus, Warnings};
use sum_persistence::pg::store_from_pool;
use test_support::with_pool;

fn unique_text(label: &str) -> String {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    format!("{label} {nanos}")
}

fn new_summary(text: &str) -> Summary {
    let params = json!({"top_k": 10});
    let id = text_key(text, "t5-large", &params);
    Summary::new_text_request(id,
                              text.to_string(),
                              "t5-large".to_string(),
                              params,
                              "en".to_string(),
                              Warnings::new())
}

#[test]
fn insert_and_get_roundtrip() {
    let Some(pool) = with_pool(|p| p.clone()) else {
        eprintln!("skip (no DATABASE_URL)");
        return;
    };
    let store = store_from_pool(pool);
    let text = unique_text("roundtrip");
    let summary = new_summary(&text);
    store.insert(&summary, true).unwrap();

    let loaded = store.get(&summary.id).unwrap().expect("summary stored");
    assert_eq!(loaded.id, summary.id);
    assert_eq!(loaded.source, text);
    assert_eq!(loaded.status, SummaryStatus::Preprocessing);
    assert_eq!(loaded.request_count, 1);
    assert!(store.source_exists(&text).unwrap());
}

#[test]
fn duplicate_insert_bumps_count_and_keeps_cache_sticky() {
    let Some(pool) = with_pool(|p| p.clone()) else {
        eprintln!("skip (no DATABASE_URL)");
        return;
    };
    let store = store_from_pool(pool);
    let text = unique_text("duplicado");
    let summary = new_summary(&text);
    store.insert(&summary, true).unwrap();
    // Segunda petición idéntica con cache=false: el flag no retrocede.
    store.insert(&summary, false).unwrap();

    let loaded = store.get(&summary.id).unwrap().unwrap();
    assert_eq!(loaded.request_count, 2);
    assert!(store.binding(&summary.id).unwrap().unwrap().cache);
}

#[test]
fn update_merges_warnings_instead_of_replacing() {
    let Some(pool) = with_pool(|p| p.clone()) else {
        eprintln!("skip (no DATABASE_URL)");
        return;
    };
    let store = store_from_pool(pool);
    let text = unique_text("warnings");
    let summary = new_summary(&text);
    store.insert(&summary, true).unwrap();

    let mut first = Warnings::new();
    first.insert("params".into(), vec!["aviso uno".into()]);
    store.update(&summary.id,
                 SummaryPatch { warnings: Some(first), ..Default::default() })
         .unwrap();

    let mut second = Warnings::new();
    second.insert("params".into(), vec!["aviso dos".into()]);
    let updated = store.update(&summary.id,
                               SummaryPatch { warnings: Some(second), ..Default::default() })
                       .unwrap()
                       .unwrap();
    assert_eq!(updated.warnings["params"],
               vec!["aviso uno".to_string(), "aviso dos".to_string()]);
}

#[test]
fn rebind_migrates_then_reuses() {
    let Some(pool) = with_pool(|p| p.clone()) else {
        eprintln!("skip (no DATABASE_URL)");
        return;
    };
    let store = store_from_pool(pool);
    let raw_text = unique_text("  texto  sucio  ");
    let clean_text = format!("limpio {raw_text}");
    let summary = new_summary(&raw_text);
    store.insert(&summary, true).unwrap();

    let canonical_id = text_key(&clean_text, "t5-large", &json!({"top_k": 10}));
    let outcome = store.rebind(&summary.id, &canonical_id, &clean_text).unwrap();
    assert_eq!(outcome, RebindOutcome::Migrated { canonical_id: canonical_id.clone() });

    // El cliente sigue viendo su resumen por el id raw y por el canónico.
    assert!(store.get(&summary.id).unwrap().is_some());
    assert!(store.get(&canonical_id).unwrap().is_some());

    store.update(&canonical_id,
                 SummaryPatch { status: Some(SummaryStatus::Completed),
                                output: Some("un resumen".into()),
                                ..Default::default() })
         .unwrap();

    // Otra petición raw distinta que converge al mismo canónico.
    let other = new_summary(&unique_text("otra peticion"));
    store.insert(&other, true).unwrap();
    let outcome = store.rebind(&other.id, &canonical_id, &clean_text).unwrap();
    assert_eq!(outcome, RebindOutcome::Reused { canonical_id: canonical_id.clone() });
    let reused = store.get(&other.id).unwrap().unwrap();
    assert_eq!(reused.status, SummaryStatus::Completed);
    assert_eq!(reused.output.as_deref(), Some("un resumen"));
}

#[test]
fn delete_binding_respects_cache_flag() {
    let Some(pool) = with_pool(|p| p.clone()) else {
        eprintln!("skip (no DATABASE_URL)");
        return;
    };
    let store = store_from_pool(pool);

    let cached = new_summary(&unique_text("retenido"));
    store.insert(&cached, true).unwrap();
    assert_eq!(store.delete_binding(&cached.id).unwrap(), None);

    let ephemeral = new_summary(&unique_text("efimero"));
    store.insert(&ephemeral, false).unwrap();
    assert_eq!(store.delete_binding(&ephemeral.id).unwrap(),
               Some(ephemeral.id.clone()));
    // Limpieza del resumen huérfano que dejó el binding borrado.
    store.delete(&ephemeral.id, true).unwrap();
    assert!(store.get(&ephemeral.id).unwrap().is_none());
}

#[test]
fn sweep_removes_expired_uncached_and_their_orphans() {
    let Some(pool) = with_pool(|p| p.clone()) else {
        eprintln!("skip (no DATABASE_URL)");
        return;
    };
    let store = store_from_pool(pool);
    let ephemeral = new_summary(&unique_text("caduco"));
    store.insert(&ephemeral, false).unwrap();
    store.update(&ephemeral.id, SummaryPatch::status(SummaryStatus::Completed))
         .unwrap();

    let stats = store.sweep_expired(chrono::Duration::seconds(0)).unwrap();
    assert!(stats.bindings_deleted >= 1);
    assert!(store.get(&ephemeral.id).unwrap().is_none());
    assert!(!store.source_exists(&ephemeral.source).unwrap());
}
