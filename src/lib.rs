//! Greenhouse actuator predictor: loads a TorchScript classifier once at
//! startup and maps sensor telemetry to fan and pump states over HTTP.

pub mod config;
pub mod error;
pub mod model;
pub mod prediction;
pub mod routes;
pub mod service;
pub mod types;

pub use config::ServiceConfig;
pub use error::{ConfigError, PredictError};
pub use model::{ModelLoader, ModelState, Predictor, TorchPredictor};
pub use prediction::{Indicator, RawPrediction};
pub use routes::build_router;
pub use service::PredictionService;
pub use types::{ActuatorDecision, ActuatorStatus, FeatureRow, HealthResponse, Telemetry};
