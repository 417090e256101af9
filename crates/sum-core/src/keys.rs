//! Derivación de identificadores de contenido.
//!
//! Funciones puras y deterministas: el mismo contenido lógico produce
//! siempre el mismo identificador. El identificador raw de una petición de
//! texto hashea los params crudos tal y como los envió el cliente; el
//! identificador canónico, aguas abajo, hashea los params ya validados. Los
//! dos se puentean mediante el binding raw -> canónico, nunca parcheando un
//! identificador existente.

use serde_json::Value;

use crate::hashing::{hash_parts, to_canonical_json};

/// Identificador para una petición de texto: `(texto, modelo, params)`.
/// `params` se serializa en JSON canónico antes de hashear.
pub fn text_key(source: &str, model: &str, params: &Value) -> String {
    let params_repr = to_canonical_json(params);
    hash_parts([source.as_bytes(), model.as_bytes(), params_repr.as_bytes()])
}

/// Identificador para una petición de documento: `(bytes, rango de páginas)`.
pub fn document_key(file_bytes: &[u8], start_page: i32, end_page: i32) -> String {
    let start = start_page.to_be_bytes();
    let end = end_page.to_be_bytes();
    hash_parts([file_bytes, start.as_slice(), end.as_slice()])
}

/// Identificador del contenido fuente en sí (deduplicación de `source_content`).
pub fn source_key(text: &str) -> String {
    hash_parts([text.as_bytes()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equal_triples_produce_equal_keys() {
        let p1 = json!({"top_k": 10, "top_p": 0.9});
        let p2 = json!({"top_p": 0.9, "top_k": 10}); // distinto orden de claves
        assert_eq!(text_key("hola", "t5-large", &p1), text_key("hola", "t5-large", &p2));
    }

    #[test]
    fn any_differing_field_changes_the_key() {
        let p = json!({"top_k": 10});
        let base = text_key("hola", "t5-large", &p);
        assert_ne!(base, text_key("hola!", "t5-large", &p));
        assert_ne!(base, text_key("hola", "t5-small", &p));
        assert_ne!(base, text_key("hola", "t5-large", &json!({"top_k": 11})));
    }

    #[test]
    fn document_keys_account_for_page_range() {
        let bytes = b"fake pdf bytes";
        assert_eq!(document_key(bytes, 0, 3), document_key(bytes, 0, 3));
        assert_ne!(document_key(bytes, 0, 3), document_key(bytes, 1, 3));
        assert_ne!(document_key(bytes, 0, 3), document_key(bytes, 0, 4));
    }

    #[test]
    fn keys_are_64_hex_chars() {
        let k = source_key("x");
        assert_eq!(k.len(), crate::constants::CONTENT_ID_HEX_LEN);
        assert!(k.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
