//! Point-in-time printer status record.
//!
//! Every field is optional: reports arriving before the full-state answer
//! carry only a handful of keys. Numeric fields decode from either JSON
//! numbers or numeric strings, because the firmware sends some counters
//! (fan speeds, line numbers) as strings. Values that do not parse become
//! absent instead of failing the whole snapshot.

#![allow(missing_docs)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::errors::{BpError, Result};

/// One named light and its reported mode (e.g. `chamber_light on`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Light {
    pub node: String,
    pub mode: String,
}

/// Immutable telemetry reading. Field names follow the device report keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(default, deserialize_with = "lenient::text")]
    pub sequence_id: Option<String>,
    #[serde(rename = "gcode_state", default, deserialize_with = "lenient::text")]
    pub job_state: Option<String>,
    #[serde(rename = "print_type", default, deserialize_with = "lenient::text")]
    pub job_type: Option<String>,
    #[serde(rename = "gcode_file", default, deserialize_with = "lenient::text")]
    pub job_file_name: Option<String>,
    #[serde(rename = "subtask_name", default, deserialize_with = "lenient::text")]
    pub job_task_name: Option<String>,
    #[serde(rename = "mc_percent", default, deserialize_with = "lenient::uint")]
    pub progress_percent: Option<u32>,
    #[serde(rename = "mc_remaining_time", default, deserialize_with = "lenient::uint")]
    pub remaining_minutes: Option<u32>,
    #[serde(rename = "layer_num", default, deserialize_with = "lenient::uint")]
    pub current_layer: Option<u32>,
    #[serde(rename = "total_layer_num", default, deserialize_with = "lenient::uint")]
    pub total_layers: Option<u32>,
    #[serde(rename = "mc_print_line_number", default, deserialize_with = "lenient::ulong")]
    pub current_line_number: Option<u64>,
    #[serde(rename = "nozzle_temper", default, deserialize_with = "lenient::float")]
    pub nozzle_temp: Option<f64>,
    #[serde(rename = "nozzle_target_temper", default, deserialize_with = "lenient::float")]
    pub nozzle_target_temp: Option<f64>,
    #[serde(rename = "bed_temper", default, deserialize_with = "lenient::float")]
    pub bed_temp: Option<f64>,
    #[serde(rename = "bed_target_temper", default, deserialize_with = "lenient::float")]
    pub bed_target_temp: Option<f64>,
    #[serde(rename = "heatbreak_fan_speed", default, deserialize_with = "lenient::uint")]
    pub nozzle_fan_speed: Option<u32>,
    #[serde(default, deserialize_with = "lenient::uint")]
    pub cooling_fan_speed: Option<u32>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub wifi_signal: Option<String>,
    #[serde(rename = "lights_report", default, deserialize_with = "lenient::lights")]
    pub lights: Vec<Light>,
}

impl StatusSnapshot {
    /// Decode a snapshot from an accumulated `print` object.
    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self> {
        Self::deserialize(Value::Object(fields.clone())).map_err(|error| BpError::ReportParse {
            details: error.to_string(),
        })
    }

    /// A snapshot is safe to present once the job state is known.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.job_state.is_some()
    }

    #[must_use]
    pub fn job_state(&self) -> Option<&str> {
        self.job_state.as_deref()
    }

    #[must_use]
    pub fn task_name(&self) -> &str {
        self.job_task_name.as_deref().unwrap_or_default()
    }
}

mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::Light;

    fn as_u64(value: &Value) -> Option<u64> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        }
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        })
    }

    pub fn uint<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        Ok(Option::<Value>::deserialize(d)?
            .as_ref()
            .and_then(as_u64)
            .and_then(|v| u32::try_from(v).ok()))
    }

    pub fn ulong<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        Ok(Option::<Value>::deserialize(d)?.as_ref().and_then(as_u64))
    }

    pub fn float<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|f| f.is_finite()))
    }

    pub fn lights<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Light>, D::Error> {
        let Some(Value::Array(items)) = Option::<Value>::deserialize(d)? else {
            return Ok(Vec::new());
        };
        Ok(items
            .iter()
            .filter_map(|item| {
                let node = item.get("node")?.as_str()?;
                let mode = item.get("mode")?.as_str()?;
                Some(Light {
                    node: node.to_string(),
                    mode: mode.to_string(),
                })
            })
            .collect())
    }
}
