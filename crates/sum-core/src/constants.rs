//! Constantes del core del dispatcher.

/// Longitud en hex de un identificador de contenido (SHA-256).
pub const CONTENT_ID_HEX_LEN: usize = 64;

/// Intervalo entre barridos de limpieza de caché dentro del consumer loop.
pub const CACHE_CLEANUP_INTERVAL_SECONDS: u64 = 60;

/// Un resumen completado con `cache = false` y sin accesos más antiguos que
/// este umbral es candidato a borrado en el barrido.
pub const DEFAULT_RETENTION_SECONDS: i64 = 240;

/// Timeout de cada poll del canal de entrada.
pub const POLL_TIMEOUT_MILLIS: u64 = 1_000;
