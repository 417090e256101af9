//! Registro de un resumen (artifact) y su binding de identificadores.
//!
//! Un `Summary` es propiedad exclusiva del almacén: se crea en la primera
//! petición de un identificador nuevo, lo muta únicamente el coordinador a
//! través del almacén, y lo borra el barrido de expiración o la limpieza
//! explícita de no-cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::status::SummaryStatus;
use crate::warnings::Warnings;

/// Metadatos específicos de la fuente de la petición.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// Texto plano enviado directamente por el cliente.
    Text,
    /// Documento del que se extrajo texto, con su rango de páginas.
    Document { file_type: String, start_page: i32, end_page: i32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    /// Identificador canónico (derivado del contenido).
    pub id: String,
    /// Contenido fuente actual (crudo o ya normalizado por una etapa).
    pub source: String,
    /// Output, nulo hasta que la última etapa termina.
    pub output: Option<String>,
    pub model: String,
    /// Parámetros tal y como se conocen en este punto del pipeline (crudos
    /// al insertar, canónicos al completar).
    pub params: Value,
    pub status: SummaryStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub language: String,
    pub warnings: Warnings,
    /// Veces que algún cliente ha pedido exactamente este identificador.
    pub request_count: i64,
    pub source_kind: SourceKind,
}

impl Summary {
    /// Registro inicial para una petición de texto recién llegada.
    pub fn new_text_request(id: String,
                            source: String,
                            model: String,
                            params: Value,
                            language: String,
                            warnings: Warnings)
                            -> Self {
        Self { id,
               source,
               output: None,
               model,
               params,
               status: SummaryStatus::Preprocessing,
               started_at: Utc::now(),
               ended_at: None,
               language,
               warnings,
               // La petición que crea el registro cuenta como la primera.
               request_count: 1,
               source_kind: SourceKind::Text }
    }

    /// Registro inicial para una petición de documento: el texto fuente aún
    /// no existe (lo producirá la etapa de extracción), así que el registro
    /// arranca vacío y a la espera de extracción.
    pub fn new_document_request(id: String,
                                file_type: String,
                                start_page: i32,
                                end_page: i32,
                                model: String,
                                params: Value,
                                language: String,
                                warnings: Warnings)
                                -> Self {
        Self { id,
               source: String::new(),
               output: None,
               model,
               params,
               status: SummaryStatus::PendingExtraction,
               started_at: Utc::now(),
               ended_at: None,
               language,
               warnings,
               request_count: 1,
               source_kind: SourceKind::Document { file_type, start_page, end_page } }
    }
}

/// Actualización parcial de un `Summary`: sólo los campos presentes cambian.
/// `warnings` se mezcla según la regla de acumulación, nunca se reemplaza.
#[derive(Debug, Clone, Default)]
pub struct SummaryPatch {
    pub status: Option<SummaryStatus>,
    pub output: Option<String>,
    pub params: Option<Value>,
    pub ended_at: Option<DateTime<Utc>>,
    pub warnings: Option<Warnings>,
}

impl SummaryPatch {
    pub fn status(status: SummaryStatus) -> Self {
        Self { status: Some(status),
               ..Default::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
        && self.output.is_none()
        && self.params.is_none()
        && self.ended_at.is_none()
        && self.warnings.is_none()
    }
}

/// Mapeo raw -> canónico. Varios raw pueden apuntar al mismo canónico
/// (deduplicación); cada raw apunta como mucho a un canónico.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierBinding {
    pub raw_id: String,
    pub canonical_id: String,
    pub cache: bool,
    pub last_accessed: DateTime<Utc>,
}
