//! Estado de un resumen a lo largo del pipeline.
//!
//! Las transiciones válidas son estrictamente hacia adelante:
//! `PendingExtraction` -> `Preprocessing` -> `Encoding` -> `Summarizing`
//! -> `Postprocessing` -> `Completed`, con `Failed` alcanzable desde
//! cualquier estado no terminal. No se permiten reversiones; un `Failed`
//! sólo se supera re-enviando la petición (lo que crea un artifact nuevo).

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatus {
    /// Fuentes no textuales: a la espera de extracción de texto.
    PendingExtraction,
    Preprocessing,
    Encoding,
    Summarizing,
    Postprocessing,
    /// Estado terminal con output disponible.
    Completed,
    /// Estado terminal de error. No se reintenta automáticamente.
    Failed,
}

impl SummaryStatus {
    /// Representación estable en el wire y en la base de datos.
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryStatus::PendingExtraction => "pending_extraction",
            SummaryStatus::Preprocessing => "preprocessing",
            SummaryStatus::Encoding => "encoding",
            SummaryStatus::Summarizing => "summarizing",
            SummaryStatus::Postprocessing => "postprocessing",
            SummaryStatus::Completed => "completed",
            SummaryStatus::Failed => "failed",
        }
    }

    pub fn from_str(tag: &str) -> Result<Self, DomainError> {
        match tag {
            "pending_extraction" => Ok(SummaryStatus::PendingExtraction),
            "preprocessing" => Ok(SummaryStatus::Preprocessing),
            "encoding" => Ok(SummaryStatus::Encoding),
            "summarizing" => Ok(SummaryStatus::Summarizing),
            "postprocessing" => Ok(SummaryStatus::Postprocessing),
            "completed" => Ok(SummaryStatus::Completed),
            "failed" => Ok(SummaryStatus::Failed),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SummaryStatus::Completed | SummaryStatus::Failed)
    }

    /// Posición dentro del pipeline (para la regla de monotonicidad).
    fn ordinal(&self) -> u8 {
        match self {
            SummaryStatus::PendingExtraction => 0,
            SummaryStatus::Preprocessing => 1,
            SummaryStatus::Encoding => 2,
            SummaryStatus::Summarizing => 3,
            SummaryStatus::Postprocessing => 4,
            SummaryStatus::Completed => 5,
            SummaryStatus::Failed => 6,
        }
    }

    /// Sólo se admite avanzar: un estado igual o anterior no es una
    /// transición válida. `Failed` es alcanzable desde cualquier estado no
    /// terminal.
    pub fn can_transition_to(&self, next: SummaryStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == SummaryStatus::Failed {
            return true;
        }
        next.ordinal() > self.ordinal()
    }
}

impl std::fmt::Display for SummaryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_tags_roundtrip() {
        for s in [SummaryStatus::PendingExtraction,
                  SummaryStatus::Preprocessing,
                  SummaryStatus::Encoding,
                  SummaryStatus::Summarizing,
                  SummaryStatus::Postprocessing,
                  SummaryStatus::Completed,
                  SummaryStatus::Failed]
        {
            assert_eq!(SummaryStatus::from_str(s.as_str()).unwrap(), s);
        }
        assert!(SummaryStatus::from_str("encoding ").is_err());
    }

    #[test]
    fn transitions_are_forward_only() {
        assert!(SummaryStatus::Preprocessing.can_transition_to(SummaryStatus::Encoding));
        assert!(SummaryStatus::Preprocessing.can_transition_to(SummaryStatus::Completed));
        assert!(!SummaryStatus::Encoding.can_transition_to(SummaryStatus::Preprocessing));
        assert!(!SummaryStatus::Encoding.can_transition_to(SummaryStatus::Encoding));
        assert!(SummaryStatus::Encoding.can_transition_to(SummaryStatus::Failed));
        assert!(!SummaryStatus::Completed.can_transition_to(SummaryStatus::Failed));
        assert!(!SummaryStatus::Failed.can_transition_to(SummaryStatus::Preprocessing));
    }
}
