use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::PredictError;
use crate::model::{ModelState, Predictor};
use crate::prediction::RawPrediction;
use crate::types::{ActuatorDecision, HealthResponse, Telemetry};

/// Owns the model state for the lifetime of the process and answers
/// prediction and health requests. Built once in `main` and handed to the
/// router.
pub struct PredictionService {
    state: ModelState,
    log_predictions: bool,
}

impl PredictionService {
    pub fn new(state: ModelState) -> Self {
        Self {
            state,
            log_predictions: false,
        }
    }

    pub fn with_predictor(predictor: Arc<dyn Predictor>) -> Self {
        Self::new(ModelState::Ready {
            predictor,
            source: "<in-memory>".into(),
        })
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::new(ModelState::Unavailable {
            reason: reason.into(),
        })
    }

    /// Emit per-request diagnostics at info instead of debug.
    pub fn log_predictions(mut self, enabled: bool) -> Self {
        self.log_predictions = enabled;
        self
    }

    pub fn is_model_loaded(&self) -> bool {
        self.state.is_ready()
    }

    pub fn health(&self) -> HealthResponse {
        let status = if self.is_model_loaded() { "ok" } else { "degraded" };
        HealthResponse {
            status: status.to_string(),
            model_loaded: self.is_model_loaded(),
        }
    }

    pub fn predict(&self, telemetry: &Telemetry) -> Result<ActuatorDecision, PredictError> {
        let predictor = match &self.state {
            ModelState::Ready { predictor, .. } => predictor,
            ModelState::Unavailable { reason } => {
                return Err(PredictError::Unavailable(reason.clone()));
            }
        };

        let row = telemetry.feature_row()?;
        let raw = predictor
            .predict(&[row])
            .map_err(|e| {
                warn!(
                    input = ?telemetry,
                    features = ?row,
                    error = %format!("{:#}", e),
                    "inference failed"
                );
                PredictError::Computation(format!("{:#}", e))
            })?
            .into_iter()
            .next()
            .ok_or_else(|| PredictError::Computation("model returned an empty batch".into()))?;

        let decision = ActuatorDecision::from_raw(&raw);
        self.trace(telemetry, &row, &raw, &decision);
        Ok(decision)
    }

    fn trace(
        &self,
        telemetry: &Telemetry,
        row: &[f32; 3],
        raw: &RawPrediction,
        decision: &ActuatorDecision,
    ) {
        if matches!(raw, RawPrediction::Unrecognized(_)) {
            warn!(output = %raw, "unrecognized model output, reporting unknown");
        }
        if self.log_predictions {
            info!(
                input = ?telemetry,
                features = ?row,
                output = %raw,
                fan = ?decision.fan_status,
                pump = ?decision.pump_status,
                "prediction"
            );
        } else {
            debug!(
                input = ?telemetry,
                features = ?row,
                output = %raw,
                fan = ?decision.fan_status,
                pump = ?decision.pump_status,
                "prediction"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::Indicator;
    use crate::types::{ActuatorStatus, FeatureRow};
    use anyhow::{anyhow, Result};
    use parking_lot::Mutex;

    /// Returns a fixed output and records every row it was asked about.
    struct Recording {
        output: Vec<RawPrediction>,
        seen: Mutex<Vec<FeatureRow>>,
    }

    impl Recording {
        fn new(output: Vec<RawPrediction>) -> Arc<Self> {
            Arc::new(Self {
                output,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl Predictor for Recording {
        fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<RawPrediction>> {
            self.seen.lock().extend_from_slice(rows);
            Ok(self.output.clone())
        }
    }

    struct Failing;

    impl Predictor for Failing {
        fn predict(&self, _rows: &[FeatureRow]) -> Result<Vec<RawPrediction>> {
            Err(anyhow!("expected 3 features, got 4"))
        }
    }

    fn telemetry() -> Telemetry {
        Telemetry {
            temperature: 31.5,
            humidity: 40.0,
            soil_moisture: 12.25,
        }
    }

    #[test]
    fn sends_one_row_in_artifact_order() {
        let fake = Recording::new(vec![RawPrediction::TextLabel("idle".into())]);
        let svc = PredictionService::with_predictor(fake.clone());
        svc.predict(&telemetry()).unwrap();
        assert_eq!(*fake.seen.lock(), vec![[31.5f32, 40.0, 12.25]]);
    }

    #[test]
    fn unavailable_model_short_circuits() {
        let svc = PredictionService::unavailable("no artifact");
        let err = svc.predict(&telemetry()).unwrap_err();
        assert!(matches!(err, PredictError::Unavailable(ref r) if r == "no artifact"));
    }

    #[test]
    fn inference_failure_is_computation_error_with_cause() {
        let svc = PredictionService::with_predictor(Arc::new(Failing));
        let err = svc.predict(&telemetry()).unwrap_err();
        match err {
            PredictError::Computation(msg) => assert!(msg.contains("expected 3 features")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn inference_failure_logs_input_and_features() {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let svc = PredictionService::with_predictor(Arc::new(Failing));
        tracing::subscriber::with_default(subscriber, || {
            let _ = svc.predict(&telemetry());
        });

        let logged = String::from_utf8(capture.0.lock().clone()).unwrap();
        assert!(logged.contains("inference failed"), "{logged}");
        assert!(logged.contains("soil_moisture: 12.25"), "{logged}");
        assert!(logged.contains("features=[31.5, 40.0, 12.25]"), "{logged}");
    }

    #[test]
    fn oversized_reading_is_rejected_before_inference() {
        let fake = Recording::new(vec![RawPrediction::TextLabel("idle".into())]);
        let svc = PredictionService::with_predictor(fake.clone());
        let reading = Telemetry {
            soil_moisture: 1e300,
            ..telemetry()
        };
        assert!(matches!(
            svc.predict(&reading),
            Err(PredictError::Validation(_))
        ));
        assert!(fake.seen.lock().is_empty());
    }

    #[test]
    fn empty_batch_is_computation_error() {
        let svc = PredictionService::with_predictor(Recording::new(vec![]));
        assert!(matches!(
            svc.predict(&telemetry()),
            Err(PredictError::Computation(_))
        ));
    }

    #[test]
    fn takes_first_result_only() {
        let fake = Recording::new(vec![
            RawPrediction::IndicatorPair([Indicator::Int(1), Indicator::Int(1)]),
            RawPrediction::TextLabel("idle".into()),
        ]);
        let svc = PredictionService::with_predictor(fake);
        let d = svc.predict(&telemetry()).unwrap();
        assert_eq!(d, ActuatorDecision::new(true, true));
    }

    #[test]
    fn health_reflects_model_state() {
        let ready = PredictionService::with_predictor(Recording::new(vec![]));
        assert_eq!(
            ready.health(),
            HealthResponse {
                status: "ok".into(),
                model_loaded: true
            }
        );
        let down = PredictionService::unavailable("missing");
        assert_eq!(
            down.health(),
            HealthResponse {
                status: "degraded".into(),
                model_loaded: false
            }
        );
    }

    #[test]
    fn repeated_calls_are_identical() {
        let fake = Recording::new(vec![RawPrediction::TextLabel("fan_on_pump_off".into())]);
        let svc = PredictionService::with_predictor(fake).log_predictions(true);
        let first = svc.predict(&telemetry()).unwrap();
        for _ in 0..5 {
            assert_eq!(svc.predict(&telemetry()).unwrap(), first);
        }
        assert_eq!(first.fan_status, ActuatorStatus::On);
        assert_eq!(first.pump_status, ActuatorStatus::Off);
    }
}
