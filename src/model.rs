use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tch::{CModule, Device, IValue, Kind, Tensor};
use tracing::{debug, error, info, warn};

use crate::prediction::{Indicator, RawPrediction};
use crate::types::FeatureRow;

pub const FEATURE_COUNT: i64 = 3;

/// Inference seam. Implementations are shared across requests and may be
/// invoked concurrently.
pub trait Predictor: Send + Sync {
    /// Runs inference on a batch of rows, returning one decoded output per row.
    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<RawPrediction>>;
}

/// TorchScript classifier on CPU.
///
/// Calls into the module are serialised; concurrent `forward` on a single
/// libtorch module is not assumed to be safe.
pub struct TorchPredictor {
    module: Mutex<CModule>,
    device: Device,
}

impl TorchPredictor {
    pub fn load(path: &Path) -> Result<Self> {
        let device = Device::Cpu;
        let mut module = CModule::load_on_device(path, device)
            .with_context(|| format!("failed to load TorchScript {}", path.display()))?;
        module.set_eval();
        Ok(Self {
            module: Mutex::new(module),
            device,
        })
    }
}

impl Predictor for TorchPredictor {
    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<RawPrediction>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        let input = Tensor::from_slice(&flat)
            .reshape([rows.len() as i64, FEATURE_COUNT])
            .to_device(self.device);

        let output = {
            let module = self.module.lock();
            tch::no_grad(|| module.forward_is(&[IValue::Tensor(input)]))
        }
        .context("forward pass failed")?;

        decode_batch(output)
    }
}

// ---------- Output decoding ----------

/// Splits a TorchScript result into per-row outputs.
pub(crate) fn decode_batch(value: IValue) -> Result<Vec<RawPrediction>> {
    let rows = match value {
        // models that ignore batching and return a bare label
        IValue::String(s) => vec![RawPrediction::TextLabel(s)],
        IValue::StringList(v) => v.into_iter().map(RawPrediction::TextLabel).collect(),
        IValue::Tuple(v) | IValue::GenericList(v) => v.into_iter().map(decode_row).collect(),
        IValue::TensorList(v) => v.iter().map(decode_tensor_row).collect(),
        IValue::IntList(v) => v
            .into_iter()
            .map(|x| RawPrediction::Unrecognized(format!("scalar {}", x)))
            .collect(),
        IValue::DoubleList(v) => v
            .into_iter()
            .map(|x| RawPrediction::Unrecognized(format!("scalar {}", x)))
            .collect(),
        IValue::BoolList(v) => v
            .into_iter()
            .map(|x| RawPrediction::Unrecognized(format!("scalar {}", x)))
            .collect(),
        IValue::Tensor(t) => {
            let size = t.size();
            if size.is_empty() {
                bail!("model returned a 0-d tensor; expected a batch dimension");
            }
            (0..size[0]).map(|i| decode_tensor_row(&t.get(i))).collect()
        }
        other => bail!("unsupported model output: {}", describe(&other)),
    };
    Ok(rows)
}

fn decode_row(value: IValue) -> RawPrediction {
    match value {
        IValue::String(s) => RawPrediction::TextLabel(s),
        IValue::Tensor(t) => decode_tensor_row(&t),
        IValue::IntList(v) => {
            pair_or_unrecognized(v.into_iter().map(Indicator::Int).collect(), "int list")
        }
        IValue::DoubleList(v) => {
            pair_or_unrecognized(v.into_iter().map(Indicator::Float).collect(), "float list")
        }
        IValue::BoolList(v) => {
            pair_or_unrecognized(v.into_iter().map(Indicator::Bool).collect(), "bool list")
        }
        IValue::Tuple(v) | IValue::GenericList(v) => {
            pair_or_unrecognized(v.iter().map(indicator_of).collect(), "sequence")
        }
        other => RawPrediction::Unrecognized(describe(&other)),
    }
}

fn decode_tensor_row(t: &Tensor) -> RawPrediction {
    let size = t.size();
    match size.as_slice() {
        [] => RawPrediction::Unrecognized(match tensor_scalar(t) {
            Indicator::Int(v) => format!("scalar {}", v),
            Indicator::Float(v) => format!("scalar {}", v),
            Indicator::Bool(v) => format!("scalar {}", v),
            Indicator::Other => format!("scalar tensor of kind {:?}", t.kind()),
        }),
        [2] => {
            let first = tensor_scalar(&t.get(0));
            let second = tensor_scalar(&t.get(1));
            RawPrediction::IndicatorPair([first, second])
        }
        _ => RawPrediction::Unrecognized(format!("tensor of shape {:?}", size)),
    }
}

fn pair_or_unrecognized(items: Vec<Indicator>, what: &str) -> RawPrediction {
    match items.as_slice() {
        [a, b] => RawPrediction::IndicatorPair([*a, *b]),
        _ => RawPrediction::Unrecognized(format!("{} of length {}", what, items.len())),
    }
}

fn indicator_of(value: &IValue) -> Indicator {
    match value {
        IValue::Int(v) => Indicator::Int(*v),
        IValue::Double(v) => Indicator::Float(*v),
        IValue::Bool(v) => Indicator::Bool(*v),
        IValue::Tensor(t) if t.dim() == 0 => tensor_scalar(t),
        _ => Indicator::Other,
    }
}

fn tensor_scalar(t: &Tensor) -> Indicator {
    match t.kind() {
        Kind::Bool => t
            .f_int64_value(&[])
            .map(|v| Indicator::Bool(v != 0))
            .unwrap_or(Indicator::Other),
        Kind::Uint8 | Kind::Int8 | Kind::Int16 | Kind::Int | Kind::Int64 => t
            .f_int64_value(&[])
            .map(Indicator::Int)
            .unwrap_or(Indicator::Other),
        Kind::Half | Kind::BFloat16 | Kind::Float | Kind::Double => t
            .f_double_value(&[])
            .map(Indicator::Float)
            .unwrap_or(Indicator::Other),
        _ => Indicator::Other,
    }
}

fn describe(value: &IValue) -> String {
    match value {
        IValue::None => "none".to_string(),
        IValue::Int(v) => format!("scalar {}", v),
        IValue::Double(v) => format!("scalar {}", v),
        IValue::Bool(v) => format!("scalar {}", v),
        IValue::Tensor(t) => format!("tensor of shape {:?}", t.size()),
        IValue::GenericDict(_) => "dict".to_string(),
        _ => "nested value".to_string(),
    }
}

// ---------- Loading ----------

/// Outcome of the one-shot startup load.
#[derive(Clone)]
pub enum ModelState {
    Ready {
        predictor: Arc<dyn Predictor>,
        source: PathBuf,
    },
    Unavailable {
        reason: String,
    },
}

impl ModelState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ModelState::Ready { .. })
    }
}

impl std::fmt::Debug for ModelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelState::Ready { source, .. } => {
                f.debug_struct("Ready").field("source", source).finish()
            }
            ModelState::Unavailable { reason } => {
                f.debug_struct("Unavailable").field("reason", reason).finish()
            }
        }
    }
}

type Opener = Box<dyn Fn(&Path) -> Result<Arc<dyn Predictor>> + Send + Sync>;

pub struct ModelLoader {
    open: Opener,
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelLoader {
    /// Loads TorchScript artifacts.
    pub fn new() -> Self {
        Self::with_opener(|path| {
            let p: Arc<dyn Predictor> = Arc::new(TorchPredictor::load(path)?);
            Ok(p)
        })
    }

    pub fn with_opener<F>(open: F) -> Self
    where
        F: Fn(&Path) -> Result<Arc<dyn Predictor>> + Send + Sync + 'static,
    {
        Self {
            open: Box::new(open),
        }
    }

    /// Tries each candidate in order and keeps the first that loads and
    /// survives a warm-up forward. Never fails: a total miss yields
    /// [`ModelState::Unavailable`].
    pub fn load(&self, candidates: &[PathBuf]) -> ModelState {
        let mut tried = Vec::with_capacity(candidates.len());

        for path in candidates {
            if !path.exists() {
                debug!(path = %path.display(), "model candidate not found");
                tried.push(format!("{} (not found)", path.display()));
                continue;
            }

            info!(path = %path.display(), "loading model");
            match self.open_and_warm_up(path) {
                Ok(predictor) => {
                    info!(path = %path.display(), "model loaded");
                    return ModelState::Ready {
                        predictor,
                        source: path.clone(),
                    };
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %format!("{:#}", e), "failed to load model");
                    tried.push(format!("{}: {:#}", path.display(), e));
                }
            }
        }

        let reason = if tried.is_empty() {
            "no model candidates configured".to_string()
        } else {
            format!("no usable model artifact; tried {}", tried.join("; "))
        };
        error!(%reason, "model unavailable, serving health only");
        ModelState::Unavailable { reason }
    }

    fn open_and_warm_up(&self, path: &Path) -> Result<Arc<dyn Predictor>> {
        let predictor = (self.open)(path)?;
        let out = predictor
            .predict(&[[0.0; 3]])
            .context("warm-up forward failed")?;
        match out.first() {
            Some(raw) => info!(output = %raw, "warmup forward ok"),
            None => bail!("warm-up forward returned no rows"),
        }
        Ok(predictor)
    }
}
