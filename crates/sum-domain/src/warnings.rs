//! Warnings acumulados por petición.
//!
//! El contrato es acumular por clave mediante concatenación, nunca
//! sobreescribir: los warnings que una etapa posterior aporta para una clave
//! se añaden a los ya existentes, y las claves que la etapa nueva no toca se
//! conservan. Un string literalmente idéntico para la misma clave no se
//! vuelve a añadir, de modo que re-aplicar el mismo evento (redelivery
//! at-least-once) converge al mismo estado.

use std::collections::BTreeMap;

/// Mapa campo -> lista ordenada de mensajes legibles.
pub type Warnings = BTreeMap<String, Vec<String>>;

/// Mezcla `new` sobre `old` siguiendo la regla de acumulación.
pub fn merge_warnings(old: &Warnings, new: &Warnings) -> Warnings {
    if new.is_empty() {
        return old.clone();
    }
    let mut merged = old.clone();
    for (key, messages) in new {
        let entry = merged.entry(key.clone()).or_default();
        for msg in messages {
            if !entry.contains(msg) {
                entry.push(msg.clone());
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(pairs: &[(&str, &[&str])]) -> Warnings {
        pairs.iter()
             .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
             .collect()
    }

    #[test]
    fn concatenates_common_keys_and_keeps_others() {
        let old = w(&[("top_k", &["a", "b"]), ("model", &["m"])]);
        let new = w(&[("top_k", &["c"]), ("language", &["l"])]);
        let merged = merge_warnings(&old, &new);
        assert_eq!(merged["top_k"], vec!["a", "b", "c"]);
        assert_eq!(merged["model"], vec!["m"]);
        assert_eq!(merged["language"], vec!["l"]);
    }

    #[test]
    fn merging_twice_is_idempotent() {
        let old = w(&[("top_k", &["a"])]);
        let new = w(&[("top_k", &["b"])]);
        let once = merge_warnings(&old, &new);
        let twice = merge_warnings(&once, &new);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_new_returns_old_unchanged() {
        let old = w(&[("x", &["1"])]);
        assert_eq!(merge_warnings(&old, &Warnings::new()), old);
    }
}
