//! Typed algorithm configuration merging

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::{CoreError, Result};

/// Overlay caller-supplied keys on an algorithm's defaults.
///
/// The caller wins per key. Keys that do not exist in the defaults are
/// rejected so typos never silently fall back to a default value. A `null`
/// override means "use the defaults as they are".
pub fn merge_config(defaults: &JsonValue, overrides: &JsonValue) -> Result<JsonValue> {
    let base = match defaults {
        JsonValue::Object(map) => map,
        JsonValue::Null => return merge_config(&JsonValue::Object(Default::default()), overrides),
        _ => return Err(CoreError::ConfigNotObject("defaults")),
    };

    let caller = match overrides {
        JsonValue::Null => return Ok(defaults.clone()),
        JsonValue::Object(map) => map,
        _ => return Err(CoreError::ConfigNotObject("overrides")),
    };

    let mut unknown: Vec<String> = caller
        .keys()
        .filter(|key| !base.contains_key(*key))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        unknown.sort();
        return Err(CoreError::UnknownConfigKeys(unknown));
    }

    let mut merged = base.clone();
    for (key, value) in caller {
        merged.insert(key.clone(), value.clone());
    }
    Ok(JsonValue::Object(merged))
}

/// Merge and deserialize into the algorithm's typed config struct
pub fn typed_config<T: DeserializeOwned>(defaults: &JsonValue, overrides: &JsonValue) -> Result<T> {
    let merged = merge_config(defaults, overrides)?;
    serde_json::from_value(merged).map_err(|e| CoreError::InvalidConfig(e.to_string()))
}
