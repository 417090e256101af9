//! Errores de persistencia.
//! Mapea errores de Diesel / conexión a variantes semánticas, y éstas al
//! `StoreError` que consume el coordinador.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

use sum_core::StoreError;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("unique violation: {0}")]
    UniqueViolation(String),
    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),
    #[error("not found")]
    NotFound,
    #[error("serialization conflict (retryable)")]
    SerializationConflict,
    #[error("transient IO / connection pool error: {0}")]
    TransientIo(String),
    #[error("stored row could not be decoded: {0}")]
    Corrupted(String),
    #[error("unknown database error: {0}")]
    Unknown(String),
}

impl From<DieselError> for PersistenceError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Self::NotFound,
            DieselError::DatabaseError(kind, info) => match kind {
                DatabaseErrorKind::UniqueViolation => Self::UniqueViolation(info.message().to_string()),
                DatabaseErrorKind::ForeignKeyViolation => Self::ForeignKeyViolation(info.message().to_string()),
                DatabaseErrorKind::SerializationFailure => Self::SerializationConflict,
                other => Self::Unknown(format!("db error kind {:?}: {}", other, info.message())),
            },
            DieselError::DeserializationError(e) => Self::Corrupted(format!("deser: {e}")),
            DieselError::SerializationError(e) => Self::Unknown(format!("ser: {e}")),
            DieselError::BrokenTransactionManager => Self::TransientIo("broken transaction manager".into()),
            other => Self::Unknown(format!("unhandled diesel error: {other:?}")),
        }
    }
}

// El coordinador no distingue tecnologías: todo error de esta capa se
// proyecta sobre el `StoreError` del core.
impl From<PersistenceError> for StoreError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::UniqueViolation(m) | PersistenceError::ForeignKeyViolation(m) => {
                StoreError::Conflict(m)
            }
            PersistenceError::SerializationConflict => {
                StoreError::Conflict("serialization conflict".into())
            }
            PersistenceError::Corrupted(m) => StoreError::Corrupted(m),
            PersistenceError::NotFound => StoreError::Unavailable("row vanished mid-operation".into()),
            PersistenceError::TransientIo(m) | PersistenceError::Unknown(m) => {
                StoreError::Unavailable(m)
            }
        }
    }
}
