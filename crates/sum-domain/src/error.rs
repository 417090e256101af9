//! Errores del vocabulario de dominio (simples por ahora).

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DomainError {
    #[error("unknown summary status: {0}")]
    UnknownStatus(String),
    #[error("unsupported model: {0}")]
    UnsupportedModel(String),
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
}
