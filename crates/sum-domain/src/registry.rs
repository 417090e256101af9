//! Tablas inmutables de modelos, idiomas y tipos de fichero soportados.
//!
//! Se construyen una sola vez al arrancar el proceso y son de sólo lectura:
//! ninguna ruta de código las muta en runtime. Los valores por defecto que
//! se sustituyen durante la validación de peticiones salen de aquí.

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedModel {
    T5Large,
}

impl SupportedModel {
    pub const DEFAULT: SupportedModel = SupportedModel::T5Large;

    pub fn as_str(&self) -> &'static str {
        match self {
            SupportedModel::T5Large => "t5-large",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, DomainError> {
        match tag {
            "t5-large" => Ok(SupportedModel::T5Large),
            other => Err(DomainError::UnsupportedModel(other.to_string())),
        }
    }

    pub fn is_supported(tag: &str) -> bool {
        Self::from_tag(tag).is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedLanguage {
    English,
    Spanish,
}

impl SupportedLanguage {
    pub const DEFAULT: SupportedLanguage = SupportedLanguage::English;

    pub fn as_str(&self) -> &'static str {
        match self {
            SupportedLanguage::English => "en",
            SupportedLanguage::Spanish => "es",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, DomainError> {
        match tag {
            "en" => Ok(SupportedLanguage::English),
            "es" => Ok(SupportedLanguage::Spanish),
            other => Err(DomainError::UnsupportedLanguage(other.to_string())),
        }
    }

    pub fn is_supported(tag: &str) -> bool {
        Self::from_tag(tag).is_ok()
    }
}

/// Tipos de documento admitidos por la etapa de extracción de texto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedFileType {
    Pdf,
    PlainText,
}

impl SupportedFileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupportedFileType::Pdf => "pdf",
            SupportedFileType::PlainText => "txt",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, DomainError> {
        match tag {
            "pdf" => Ok(SupportedFileType::Pdf),
            "txt" => Ok(SupportedFileType::PlainText),
            other => Err(DomainError::UnsupportedFileType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_supported() {
        assert!(SupportedModel::is_supported(SupportedModel::DEFAULT.as_str()));
        assert!(SupportedLanguage::is_supported(SupportedLanguage::DEFAULT.as_str()));
    }

    #[test]
    fn unknown_tags_are_rejected() {
        assert!(SupportedModel::from_tag("gpt-99").is_err());
        assert!(SupportedLanguage::from_tag("fr").is_err());
        assert!(SupportedFileType::from_tag("docx").is_err());
    }
}
