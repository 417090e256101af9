//! Tipos de evento de etapa.
//!
//! Cada worker de etapa publica al topic del dispatcher un mensaje keyed por
//! el identificador actual de la petición. `StageMessage` es la forma plana
//! del wire (campos opcionales según la etapa); `StageEventKind` es la vista
//! tipada con la que trabaja el coordinador.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use sum_domain::{SummaryStatus, Warnings};

use crate::errors::ChannelError;

/// Tag de wire para el evento de extracción terminada (no es un estado del
/// resumen: marca que el contenido acaba de transformarse de bytes a texto).
pub const EXTRACTED_TAG: &str = "extracted";

/// Mensaje consumido/producido en el wire, en JSON plano.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageMessage {
    pub summary_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_preprocessed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_extracted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Warnings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Vista tipada de un evento de etapa.
#[derive(Debug, Clone, PartialEq)]
pub enum StageEventKind {
    /// La extracción convirtió un documento en texto: el contenido acaba de
    /// transformarse y el identificador canónico puede cambiar.
    TextExtracted {
        text: String,
        model: String,
        params: Value,
        warnings: Warnings,
    },
    /// El preprocesado terminó y expone el texto normalizado. Igual que la
    /// extracción, es un evento de transformación de contenido.
    Preprocessed {
        text: String,
        model: String,
        params: Value,
        warnings: Warnings,
    },
    /// Actualización de progreso sin decisión de forwarding: la etapa
    /// anterior ya produjo directamente a la siguiente.
    Progress { status: SummaryStatus, warnings: Warnings },
    /// Finalización terminal con el output y los params validados finales.
    Completed {
        output: String,
        params: Value,
        warnings: Warnings,
    },
    /// Fallo terminal. No se reenvía ni se reintenta automáticamente.
    Failed { error: String },
}

impl StageMessage {
    pub fn decode(payload: &str) -> Result<Self, ChannelError> {
        serde_json::from_str(payload).map_err(|e| ChannelError::Decode(e.to_string()))
    }

    pub fn encode(&self) -> String {
        // La serialización de un struct plano con serde_json no falla.
        serde_json::to_string(self).expect("serialize StageMessage")
    }

    /// Interpreta el mensaje plano como evento tipado.
    pub fn into_kind(self) -> Result<StageEventKind, ChannelError> {
        let warnings = self.warnings.unwrap_or_default();
        match self.summary_status.as_str() {
            EXTRACTED_TAG => {
                let text = self.text_extracted
                               .ok_or_else(|| missing("text_extracted"))?;
                Ok(StageEventKind::TextExtracted { text,
                                                   model: self.model.ok_or_else(|| missing("model"))?,
                                                   params: self.params.unwrap_or_else(empty_object),
                                                   warnings })
            }
            "preprocessing" => {
                let text = self.text_preprocessed
                               .ok_or_else(|| missing("text_preprocessed"))?;
                Ok(StageEventKind::Preprocessed { text,
                                                  model: self.model.ok_or_else(|| missing("model"))?,
                                                  params: self.params.unwrap_or_else(empty_object),
                                                  warnings })
            }
            "completed" => {
                let output = self.output.ok_or_else(|| missing("output"))?;
                Ok(StageEventKind::Completed { output,
                                               params: self.params.unwrap_or_else(empty_object),
                                               warnings })
            }
            "failed" => Ok(StageEventKind::Failed { error: self.error
                                                              .unwrap_or_else(|| "unspecified stage failure".to_string()) }),
            other => {
                let status = SummaryStatus::from_str(other)
                    .map_err(|e| ChannelError::Decode(e.to_string()))?;
                Ok(StageEventKind::Progress { status, warnings })
            }
        }
    }
}

fn missing(field: &str) -> ChannelError {
    ChannelError::Decode(format!("missing field '{field}'"))
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Carga que el coordinador reenvía a la siguiente etapa tras una
/// transformación de contenido, keyed por el identificador canónico nuevo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForwardedWork {
    pub text: String,
    pub model: String,
    pub params: Value,
}

impl ForwardedWork {
    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("serialize ForwardedWork")
    }

    pub fn decode(payload: &str) -> Result<Self, ChannelError> {
        serde_json::from_str(payload).map_err(|e| ChannelError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn preprocessed_message_roundtrip() {
        let msg = StageMessage { summary_status: "preprocessing".into(),
                                 text_preprocessed: Some("texto limpio".into()),
                                 text_extracted: None,
                                 model: Some("t5-large".into()),
                                 params: Some(json!({"top_k": 10})),
                                 output: None,
                                 warnings: None,
                                 error: None };
        let decoded = StageMessage::decode(&msg.encode()).unwrap();
        match decoded.into_kind().unwrap() {
            StageEventKind::Preprocessed { text, model, params, .. } => {
                assert_eq!(text, "texto limpio");
                assert_eq!(model, "t5-large");
                assert_eq!(params, json!({"top_k": 10}));
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn progress_tags_map_to_status() {
        let msg = StageMessage { summary_status: "summarizing".into(),
                                 text_preprocessed: None,
                                 text_extracted: None,
                                 model: None,
                                 params: None,
                                 output: None,
                                 warnings: None,
                                 error: None };
        assert_eq!(msg.into_kind().unwrap(),
                   StageEventKind::Progress { status: SummaryStatus::Summarizing,
                                              warnings: Warnings::new() });
    }

    #[test]
    fn unknown_tag_fails_to_decode() {
        let msg = StageMessage { summary_status: "reticulating".into(),
                                 text_preprocessed: None,
                                 text_extracted: None,
                                 model: None,
                                 params: None,
                                 output: None,
                                 warnings: None,
                                 error: None };
        assert!(msg.into_kind().is_err());
    }

    #[test]
    fn preprocessing_without_text_is_invalid() {
        let msg = StageMessage { summary_status: "preprocessing".into(),
                                 text_preprocessed: None,
                                 text_extracted: None,
                                 model: Some("t5-large".into()),
                                 params: None,
                                 output: None,
                                 warnings: None,
                                 error: None };
        assert!(msg.into_kind().is_err());
    }
}
