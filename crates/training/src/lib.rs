#![recursion_limit = "256"]

pub mod fit;
pub mod metrics;
pub mod util;

pub use fit::{fit_single, fit_twin, pair_targets, LossKind, TrainConfig};
pub use metrics::{should_checkpoint, TrainingMetrics};
pub use util::{
    load_single_classifier_from_checkpoint, load_twin_from_checkpoint, run_eval, run_train,
    EvalArgs, ModelKind, TrainArgs, TwinMode,
};

/// Backend alias for training/eval.
pub type TrainBackend = burn_ndarray::NdArray<f32>;
