//! Stable cache keys for algorithm executions

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use sha2::{Digest, Sha256};
use sigrun_core::AlgorithmInput;

use crate::errors::CacheResult;

/// Decimal places kept for floats before hashing, so that noise below this
/// precision maps to the same key.
const FLOAT_PRECISION: i32 = 6;

/// Lowercase hex SHA-256 of a canonical execution request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the cache key for running `algorithm_id` over `input` with the
/// the effective `config` (defaults merged with the caller's overrides).
pub fn fingerprint(
    algorithm_id: &str,
    input: &AlgorithmInput,
    config: &JsonValue,
) -> CacheResult<Fingerprint> {
    let request = json!({
        "algorithmId": algorithm_id,
        "input": serde_json::to_value(input)?,
        "config": config,
    });

    let mut canonical = String::new();
    write_canonical(&request, &mut canonical)?;

    let digest = Sha256::digest(canonical.as_bytes());
    Ok(Fingerprint(format!("{digest:x}")))
}

/// Serialise `value` with object keys sorted and floats rounded.
fn write_canonical(value: &JsonValue, out: &mut String) -> CacheResult<()> {
    match value {
        JsonValue::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(&map[key.as_str()], out)?;
            }
            out.push('}');
        }
        JsonValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        JsonValue::Number(n) if n.is_f64() => {
            let rounded = n.as_f64().map(round_float).unwrap_or_default();
            out.push_str(&serde_json::to_string(&rounded)?);
        }
        other => out.push_str(&serde_json::to_string(other)?),
    }
    Ok(())
}

fn round_float(value: f64) -> f64 {
    let scale = 10f64.powi(FLOAT_PRECISION);
    let rounded = (value * scale).round() / scale;
    // -0.0 and 0.0 must hash alike
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}
