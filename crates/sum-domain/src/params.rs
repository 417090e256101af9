//! Validación de parámetros de generación.
//!
//! El esquema de parámetros soportados es una tabla inmutable construida una
//! vez al inicio del proceso. `validate_params` produce siempre el conjunto
//! completo de parámetros (nunca un mapa parcial): los valores inválidos se
//! descartan con un warning y se sustituyen por su valor por defecto. La
//! salida es determinista byte a byte para una misma entrada lógica (orden
//! de claves estable), condición necesaria porque los parámetros canónicos
//! alimentan el identificador de contenido.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use serde_json::{Map, Value};

use crate::warnings::Warnings;

pub const RELATIVE_MIN_LENGTH: &str = "relative_min_length";
pub const RELATIVE_MAX_LENGTH: &str = "relative_max_length";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Int,
    Float,
    Bool,
}

/// Requisitos de validación de un parámetro: tipo, cotas (inclusivas,
/// opcionales) y valor por defecto.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub kind: ParamKind,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    pub default: Value,
}

impl ParamSpec {
    fn new(kind: ParamKind, lower: Option<f64>, upper: Option<f64>, default: Value) -> Self {
        Self { kind,
               lower_bound: lower,
               upper_bound: upper,
               default }
    }
}

/// Tabla de requisitos, de sólo lectura tras la construcción.
static PARAM_SCHEMA: Lazy<BTreeMap<&'static str, ParamSpec>> = Lazy::new(|| {
    use ParamKind::*;
    let mut m = BTreeMap::new();
    m.insert(RELATIVE_MAX_LENGTH, ParamSpec::new(Float, Some(0.1), Some(1.0), Value::from(0.4)));
    m.insert(RELATIVE_MIN_LENGTH, ParamSpec::new(Float, Some(0.1), Some(1.0), Value::from(0.1)));
    m.insert("do_sample", ParamSpec::new(Bool, None, None, Value::from(true)));
    m.insert("early_stopping", ParamSpec::new(Bool, None, None, Value::from(true)));
    m.insert("num_beams", ParamSpec::new(Int, Some(0.0), None, Value::from(4)));
    m.insert("temperature", ParamSpec::new(Float, None, None, Value::from(1.0)));
    m.insert("top_k", ParamSpec::new(Int, None, None, Value::from(50)));
    m.insert("top_p", ParamSpec::new(Float, None, None, Value::from(1.0)));
    m.insert("repetition_penalty", ParamSpec::new(Float, None, None, Value::from(1.0)));
    m.insert("length_penalty", ParamSpec::new(Float, None, None, Value::from(1.0)));
    m.insert("no_repeat_ngram_size", ParamSpec::new(Int, Some(0.0), None, Value::from(4)));
    m
});

// Mensajes de warning para parámetros incorrectos.
const WARN_INT: &str = "The specified value must be an int. Using default value instead.";
const WARN_FLOAT: &str = "The specified value must be a float. Using default value instead.";
const WARN_BOOL: &str = "The specified value must be a bool. Using default value instead.";
const WARN_UNSUPPORTED: &str = "Parameter not supported. It will be ignored.";
const WARN_MIN_LENGTH: &str = "This parameter must be smaller than 'relative_max_length'. \
                               Using default value instead.";
const WARN_MAX_LENGTH: &str = "This parameter must be greater than 'relative_min_length'. \
                               Using default value instead.";

fn warn_lower_bounded(lower: f64) -> String {
    format!("The specified value must be greater or equal to {lower}. Using default value instead.")
}

fn warn_bounded(lower: f64, upper: f64) -> String {
    format!("The specified value must be in the range [{lower}, {upper}]. Using default values instead.")
}

fn warn_min_length_default(default_max: f64) -> String {
    format!("This parameter must be smaller than the default 'relative_max_length' ({default_max}). \
             Using default value instead.")
}

fn warn_max_length_default(default_min: f64) -> String {
    format!("This parameter must be greater than the default 'relative_min_length' ({default_min}). \
             Using default value instead.")
}

/// Parámetros por defecto, con el esquema completo.
pub fn default_params() -> Map<String, Value> {
    let mut out = Map::new();
    for (name, spec) in PARAM_SCHEMA.iter() {
        out.insert((*name).to_string(), spec.default.clone());
    }
    out
}

/// Valida un mapa de parámetros libre contra el esquema soportado.
///
/// Devuelve el mapa canónico (todas las claves soportadas, sólo ellas, cada
/// valor dentro de sus cotas) y el mapa de warnings generado. Las claves
/// desconocidas se descartan; los valores de tipo incorrecto o fuera de
/// cotas se sustituyen por el valor por defecto.
pub fn validate_params(raw: &Map<String, Value>) -> (Map<String, Value>, Warnings) {
    let mut warnings = Warnings::new();
    let mut invalid: BTreeSet<String> = BTreeSet::new();

    for (key, value) in raw {
        match PARAM_SCHEMA.get(key.as_str()) {
            None => {
                warnings.entry(key.clone()).or_default().push(WARN_UNSUPPORTED.to_string());
                invalid.insert(key.clone());
            }
            Some(spec) => {
                if let Some(msg) = check_value(spec, value) {
                    warnings.entry(key.clone()).or_default().push(msg);
                    invalid.insert(key.clone());
                }
            }
        }
    }

    // Conjunto de trabajo sobre el que se evalúa la regla cruzada min/max.
    // Los valores min/max descartados por tipo o cotas se sustituyen por su
    // valor por defecto ANTES de la comprobación, igual que el resto de la
    // tubería verá tras la sustitución.
    let mut working: Map<String, Value> = raw.clone();
    let default_min = PARAM_SCHEMA[RELATIVE_MIN_LENGTH].default.as_f64().unwrap();
    let default_max = PARAM_SCHEMA[RELATIVE_MAX_LENGTH].default.as_f64().unwrap();
    if invalid.contains(RELATIVE_MIN_LENGTH) {
        working.insert(RELATIVE_MIN_LENGTH.to_string(), Value::from(default_min));
    }
    if invalid.contains(RELATIVE_MAX_LENGTH) {
        working.insert(RELATIVE_MAX_LENGTH.to_string(), Value::from(default_max));
    }

    // Regla cruzada: min < max. El orden de los checks importa para la
    // atribución de warnings: primero "ambos presentes y en conflicto",
    // después "uno presente en conflicto con el defecto del otro".
    let min_v = working.get(RELATIVE_MIN_LENGTH).and_then(Value::as_f64);
    let max_v = working.get(RELATIVE_MAX_LENGTH).and_then(Value::as_f64);
    match (min_v, max_v) {
        (Some(min), Some(max)) if min >= max => {
            warnings.entry(RELATIVE_MIN_LENGTH.to_string())
                    .or_default()
                    .push(WARN_MIN_LENGTH.to_string());
            warnings.entry(RELATIVE_MAX_LENGTH.to_string())
                    .or_default()
                    .push(WARN_MAX_LENGTH.to_string());
            invalid.insert(RELATIVE_MIN_LENGTH.to_string());
            invalid.insert(RELATIVE_MAX_LENGTH.to_string());
        }
        (Some(min), None) if min >= default_max => {
            warnings.entry(RELATIVE_MIN_LENGTH.to_string())
                    .or_default()
                    .push(warn_min_length_default(default_max));
            invalid.insert(RELATIVE_MIN_LENGTH.to_string());
        }
        (None, Some(max)) if max <= default_min => {
            warnings.entry(RELATIVE_MAX_LENGTH.to_string())
                    .or_default()
                    .push(warn_max_length_default(default_min));
            invalid.insert(RELATIVE_MAX_LENGTH.to_string());
        }
        _ => {}
    }

    // Salida canónica: iterar el esquema (orden estable) y tomar el valor
    // del cliente si sobrevivió, o el defecto en caso contrario.
    let mut canonical = Map::new();
    for (name, spec) in PARAM_SCHEMA.iter() {
        let value = match raw.get(*name) {
            Some(v) if !invalid.contains(*name) => v.clone(),
            _ => spec.default.clone(),
        };
        canonical.insert((*name).to_string(), value);
    }

    (canonical, warnings)
}

/// Comprueba tipo y cotas de un valor. Devuelve el mensaje de warning si el
/// valor es inválido.
fn check_value(spec: &ParamSpec, value: &Value) -> Option<String> {
    match spec.kind {
        ParamKind::Int => {
            if !value.is_i64() && !value.is_u64() {
                return Some(WARN_INT.to_string());
            }
            check_bounds(spec, value.as_f64()?)
        }
        ParamKind::Float => {
            // Un entero JSON no es un float válido (tipado estricto).
            if !value.is_number() || value.is_i64() || value.is_u64() {
                return Some(WARN_FLOAT.to_string());
            }
            check_bounds(spec, value.as_f64()?)
        }
        ParamKind::Bool => {
            if !value.is_boolean() {
                return Some(WARN_BOOL.to_string());
            }
            None
        }
    }
}

fn check_bounds(spec: &ParamSpec, v: f64) -> Option<String> {
    let below = spec.lower_bound.map(|lb| v < lb).unwrap_or(false);
    let above = spec.upper_bound.map(|ub| v > ub).unwrap_or(false);
    if !below && !above {
        return None;
    }
    match (spec.lower_bound, spec.upper_bound) {
        (Some(lb), Some(ub)) => Some(warn_bounded(lb, ub)),
        (Some(lb), None) => Some(warn_lower_bounded(lb)),
        // No hay parámetros con sólo cota superior en el esquema actual.
        _ => Some(warn_bounded(f64::NEG_INFINITY, spec.upper_bound.unwrap_or(f64::INFINITY))),
    }
}
