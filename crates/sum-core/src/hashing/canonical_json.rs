//! Canonical JSON minimal: claves ordenadas, formato numérico estable.
//! Dos mapas lógicamente iguales serializan byte a byte idéntico, condición
//! que exige el contrato de estabilidad de identificadores.

use serde_json::Value;
use std::collections::BTreeMap;

pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => serde_json::to_string(s).unwrap(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let mut tree = BTreeMap::new();
            for (k, v) in map {
                tree.insert(k, to_canonical_json(v));
            }
            let items: Vec<String> = tree
                .into_iter()
                .map(|(k, v)| format!("{}:{}", serde_json::to_string(&k).unwrap(), v))
                .collect();
            format!("{{{}}}", items.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_change_output() {
        let a = json!({"b": 1, "a": {"y": 2, "x": 3}});
        let b = json!({"a": {"x": 3, "y": 2}, "b": 1});
        assert_eq!(to_canonical_json(&a), to_canonical_json(&b));
    }

    #[test]
    fn numbers_keep_stable_formatting() {
        assert_eq!(to_canonical_json(&json!({"t": 1.0})), r#"{"t":1.0}"#);
        assert_eq!(to_canonical_json(&json!({"t": 1})), r#"{"t":1}"#);
    }
}
