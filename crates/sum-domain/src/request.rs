//! Contrato de petición/respuesta de cara al cliente.
//!
//! La capa HTTP queda fuera de este core; aquí se define la forma que esa
//! capa debe poblar: normalización de la petición (defaults + warnings por
//! sustitución) y proyección de un `Summary` a respuesta.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::registry::{SupportedLanguage, SupportedModel};
use crate::status::SummaryStatus;
use crate::summary::Summary;
use crate::warnings::Warnings;

const WARN_UNSUPPORTED_MODEL: &str = "The specified model is not supported. \
                                      Defaulting to 't5-large'.";
const WARN_UNSUPPORTED_LANGUAGE: &str = "The specified language is not supported. \
                                         Defaulting to 'en'.";

/// Petición de resumen tal y como llega del cliente. Todos los campos menos
/// `source` son opcionales.
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryRequest {
    pub source: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub cache: Option<bool>,
}

/// Petición con defaults ya sustituidos. Los `params` siguen siendo los
/// crudos del cliente: la validación de parámetros ocurre aguas abajo y su
/// resultado alimenta el identificador canónico, no el raw.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRequest {
    pub source: String,
    pub model: String,
    pub params: Map<String, Value>,
    pub language: String,
    pub cache: bool,
}

impl SummaryRequest {
    /// Sustituye defaults para los campos ausentes o no soportados y
    /// registra un warning por cada sustitución.
    pub fn normalize(self) -> (NormalizedRequest, Warnings) {
        let mut warnings = Warnings::new();

        let model = match self.model {
            Some(ref m) if SupportedModel::is_supported(m) => m.clone(),
            Some(_) => {
                warnings.entry("model".to_string())
                        .or_default()
                        .push(WARN_UNSUPPORTED_MODEL.to_string());
                SupportedModel::DEFAULT.as_str().to_string()
            }
            None => SupportedModel::DEFAULT.as_str().to_string(),
        };

        let language = match self.language {
            Some(ref l) if SupportedLanguage::is_supported(l) => l.clone(),
            Some(_) => {
                warnings.entry("language".to_string())
                        .or_default()
                        .push(WARN_UNSUPPORTED_LANGUAGE.to_string());
                SupportedLanguage::DEFAULT.as_str().to_string()
            }
            None => SupportedLanguage::DEFAULT.as_str().to_string(),
        };

        // Params no-objeto se tratan como ausentes (mapa vacío); el
        // validador de parámetros emitirá sus propios warnings después.
        let params = match self.params {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        let normalized = NormalizedRequest { source: self.source,
                                             model,
                                             params,
                                             language,
                                             cache: self.cache.unwrap_or(true) };
        (normalized, warnings)
    }
}

/// Respuesta al cliente; puede ser parcial antes de la finalización
/// (`output` y `ended_at` nulos hasta `completed`).
#[derive(Debug, Clone, Serialize)]
pub struct SummaryResponse {
    pub request_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: SummaryStatus,
    pub output: Option<String>,
    pub model: String,
    pub params: Value,
    pub language: String,
    pub warnings: Warnings,
}

impl SummaryResponse {
    /// Proyecta un `Summary` sobre la forma de respuesta, exponiendo el
    /// identificador con el que el cliente conoce la petición.
    pub fn from_summary(request_id: &str, summary: &Summary) -> Self {
        Self { request_id: request_id.to_string(),
               started_at: summary.started_at,
               ended_at: summary.ended_at,
               status: summary.status,
               output: summary.output.clone(),
               model: summary.model.clone(),
               params: summary.params.clone(),
               language: summary.language.clone(),
               warnings: summary.warnings.clone() }
    }
}
