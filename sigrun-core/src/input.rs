//! Algorithm input model

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Sample data handed to an algorithm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalData {
    /// A single channel of samples
    Series(Vec<f64>),
    /// Named channels (e.g. "x", "y", "z" accelerometer axes)
    Channels(BTreeMap<String, Vec<f64>>),
    /// Row-major samples, one row per observation
    Matrix(Vec<Vec<f64>>),
}

impl SignalData {
    /// Total number of samples across every channel/row
    pub fn data_points(&self) -> usize {
        match self {
            SignalData::Series(values) => values.len(),
            SignalData::Channels(channels) => channels.values().map(Vec::len).sum(),
            SignalData::Matrix(rows) => rows.iter().map(Vec::len).sum(),
        }
    }

    /// The primary channel: the series itself, the first named channel,
    /// or the flattened matrix
    pub fn primary(&self) -> Vec<f64> {
        match self {
            SignalData::Series(values) => values.clone(),
            SignalData::Channels(channels) => {
                channels.values().next().cloned().unwrap_or_default()
            }
            SignalData::Matrix(rows) => rows.iter().flatten().copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data_points() == 0
    }
}

impl Default for SignalData {
    fn default() -> Self {
        SignalData::Series(Vec::new())
    }
}

/// Running parameters of the equipment a signal was captured on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquipmentContext {
    pub equipment_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rated_speed_rpm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_speed_rpm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, JsonValue>,
}

/// Input of a single algorithm execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgorithmInput {
    pub data: SignalData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment: Option<EquipmentContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_condition: Option<JsonValue>,
}

impl AlgorithmInput {
    /// Single-channel input sampled at `sample_rate` Hz
    pub fn series(values: Vec<f64>, sample_rate: f64) -> Self {
        Self {
            data: SignalData::Series(values),
            sample_rate: Some(sample_rate),
            ..Default::default()
        }
    }

    pub fn with_equipment(mut self, equipment: EquipmentContext) -> Self {
        self.equipment = Some(equipment);
        self
    }

    /// Approximate payload size used for routing decisions
    pub fn data_points(&self) -> usize {
        self.data.data_points()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_data_points() {
        assert_eq!(SignalData::Series(vec![1.0; 8]).data_points(), 8);

        let mut channels = BTreeMap::new();
        channels.insert("x".to_string(), vec![0.0; 3]);
        channels.insert("y".to_string(), vec![0.0; 4]);
        assert_eq!(SignalData::Channels(channels).data_points(), 7);

        let matrix = SignalData::Matrix(vec![vec![1.0, 2.0], vec![3.0]]);
        assert_eq!(matrix.data_points(), 3);
        assert_eq!(matrix.primary(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_untagged_deserialization() {
        let input: AlgorithmInput = serde_json::from_value(json!({
            "data": {"x": [1.0, 2.0], "y": [3.0]},
            "sampleRate": 1000.0
        }))
        .unwrap();

        assert!(matches!(input.data, SignalData::Channels(_)));
        assert_eq!(input.sample_rate, Some(1000.0));
        assert_eq!(input.data_points(), 3);

        let input: AlgorithmInput =
            serde_json::from_value(json!({"data": [0.5, 1.5, 2.5]})).unwrap();
        assert_eq!(input.data, SignalData::Series(vec![0.5, 1.5, 2.5]));
    }
}
