//! sum-persistence
//!
//! Implementación Postgres (Diesel) del `SummaryStore` de `sum-core`, más
//! utilidades de conexión y migraciones. Paridad 1:1 con el backend en
//! memoria: los tests de integración corren el mismo contrato contra ambos.
//!
//! Módulos:
//! - `pg`: store sobre Postgres (tablas source_content / summary /
//!   identifier_binding).
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: carga de configuración desde .env.
//! - `schema`: tablas Diesel declaradas para compilar queries.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::init_dotenv;
pub use error::PersistenceError;
pub use pg::{build_dev_pool_from_env, build_pool, store_from_pool, ConnectionProvider,
             PgPool, PgSummaryStore, PoolProvider};
