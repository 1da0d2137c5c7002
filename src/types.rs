use serde::{Deserialize, Serialize};

use crate::error::PredictError;

/// One sensor reading as posted to `/predict`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Telemetry {
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
}

/// Model input row. Order is fixed by the trained artifact:
/// temperature, humidity, soil moisture. The artifact takes f32 inputs.
pub type FeatureRow = [f32; 3];

impl Telemetry {
    /// Narrows the reading to the model's f32 input. Values that would
    /// overflow to infinity are rejected rather than sent to the model.
    pub fn feature_row(&self) -> Result<FeatureRow, PredictError> {
        Ok([
            narrow("temperature", self.temperature)?,
            narrow("humidity", self.humidity)?,
            narrow("soilMoisture", self.soil_moisture)?,
        ])
    }
}

fn narrow(field: &str, value: f64) -> Result<f32, PredictError> {
    let v = value as f32;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(PredictError::Validation(format!(
            "{} {} is outside the model's input range",
            field, value
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorStatus {
    On,
    Off,
    Unknown,
}

impl ActuatorStatus {
    pub fn from_flag(on: bool) -> Self {
        if on {
            ActuatorStatus::On
        } else {
            ActuatorStatus::Off
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActuatorDecision {
    pub fan_status: ActuatorStatus,
    pub pump_status: ActuatorStatus,
}

impl ActuatorDecision {
    pub const UNKNOWN: ActuatorDecision = ActuatorDecision {
        fan_status: ActuatorStatus::Unknown,
        pump_status: ActuatorStatus::Unknown,
    };

    pub fn new(fan_on: bool, pump_on: bool) -> Self {
        Self {
            fan_status: ActuatorStatus::from_flag(fan_on),
            pump_status: ActuatorStatus::from_flag(pump_on),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn telemetry_uses_camel_case_field_names() {
        let t: Telemetry = serde_json::from_value(json!({
            "temperature": 24.5,
            "humidity": 61.0,
            "soilMoisture": 33.2
        }))
        .unwrap();
        assert_eq!(t.soil_moisture, 33.2);
    }

    #[test]
    fn feature_row_keeps_artifact_order() {
        let t = Telemetry {
            temperature: 1.0,
            humidity: 2.0,
            soil_moisture: 3.0,
        };
        assert_eq!(t.feature_row().unwrap(), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn out_of_range_reading_is_rejected() {
        let t = Telemetry {
            temperature: 21.0,
            humidity: 1e300,
            soil_moisture: 3.0,
        };
        match t.feature_row() {
            Err(PredictError::Validation(msg)) => assert!(msg.contains("humidity")),
            other => panic!("expected validation error, got {:?}", other),
        }

        let t = Telemetry {
            temperature: f64::from(f32::MAX),
            humidity: -f64::from(f32::MAX),
            soil_moisture: 0.0,
        };
        assert!(t.feature_row().is_ok());
    }

    #[test]
    fn decision_serializes_to_wire_shape() {
        let v = serde_json::to_value(ActuatorDecision::new(true, false)).unwrap();
        assert_eq!(v, json!({ "fanStatus": "on", "pumpStatus": "off" }));
        let v = serde_json::to_value(ActuatorDecision::UNKNOWN).unwrap();
        assert_eq!(v, json!({ "fanStatus": "unknown", "pumpStatus": "unknown" }));
    }
}
