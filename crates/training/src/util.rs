use burn::backend::Autodiff;
use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings, RecorderError};
use burn::tensor::activation::sigmoid;
use clap::{Parser, ValueEnum};
use dataset::{BatchContainer, IndexSplit};
use models::{
    SingleClassifier, SingleClassifierConfig, TwinNetwork, TwinNetworkConfig, TwinTrainMode,
};
use std::fs;
use std::path::{Path, PathBuf};

use crate::fit::{fit_single, fit_twin, pair_targets, LossKind, TrainConfig};
use crate::TrainBackend;

pub fn load_single_classifier_from_checkpoint<P: AsRef<Path>>(
    path: P,
    cfg: SingleClassifierConfig,
    device: &<TrainBackend as burn::tensor::backend::Backend>::Device,
) -> Result<SingleClassifier<TrainBackend>, RecorderError> {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    SingleClassifier::<TrainBackend>::new(cfg, device).load_file(path.as_ref(), &recorder, device)
}

pub fn load_twin_from_checkpoint<P: AsRef<Path>>(
    path: P,
    cfg: TwinNetworkConfig,
    device: &<TrainBackend as burn::tensor::backend::Backend>::Device,
) -> Result<TwinNetwork<TrainBackend>, RecorderError> {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    TwinNetwork::<TrainBackend>::new(cfg, device).load_file(path.as_ref(), &recorder, device)
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ModelKind {
    Single,
    Twin,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum TwinMode {
    Transfer,
    Full,
}

impl From<TwinMode> for TwinTrainMode {
    fn from(mode: TwinMode) -> Self {
        match mode {
            TwinMode::Transfer => TwinTrainMode::Transfer,
            TwinMode::Full => TwinTrainMode::Full,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "train", about = "Train the single-path or twin image classifier")]
pub struct TrainArgs {
    /// Model to train.
    #[arg(long, value_enum, default_value_t = ModelKind::Single)]
    pub model: ModelKind,
    /// CSV manifest with filename and label columns.
    #[arg(long, default_value = "assets/manifests/train.csv")]
    pub manifest: String,
    /// Directory the manifest filenames are relative to.
    #[arg(long, default_value = "assets/images")]
    pub image_dir: String,
    /// Manifest for the twin's second input source (defaults to --manifest).
    #[arg(long)]
    pub twin_manifest: Option<String>,
    /// Base directory for the second manifest (defaults to --image-dir).
    #[arg(long)]
    pub twin_image_dir: Option<String>,
    /// Number of epochs.
    #[arg(long, default_value_t = 10)]
    pub epochs: usize,
    /// Batch size.
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,
    /// Learning rate.
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,
    /// Fraction of samples assigned to the train split; the rest validate.
    #[arg(long, default_value_t = 0.7)]
    pub train_fraction: f32,
    /// Seed for the split and the per-epoch shuffles.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    /// Training-phase loss.
    #[arg(long, value_enum, default_value_t = LossKind::Bce)]
    pub loss: LossKind,
    /// Parameter selection for the twin network.
    #[arg(long, value_enum, default_value_t = TwinMode::Full)]
    pub twin_mode: TwinMode,
    /// Image height the model is sized for (dataset images must match).
    #[arg(long, default_value_t = 64)]
    pub image_height: usize,
    /// Image width the model is sized for.
    #[arg(long, default_value_t = 64)]
    pub image_width: usize,
    /// Directory checkpoints and metrics are written to.
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,
    /// Checkpoint name; weights go to <dir>/<name>.bin on each improvement.
    #[arg(long, default_value = "classifier")]
    pub checkpoint_name: String,
}

type ADBackend = Autodiff<TrainBackend>;

pub fn run_train(args: TrainArgs) -> anyhow::Result<()> {
    let device = <ADBackend as burn::tensor::backend::Backend>::Device::default();

    let manifest_path = Path::new(&args.manifest);
    let data = BatchContainer::from_csv(manifest_path, Path::new(&args.image_dir)).map_err(
        |e| anyhow::anyhow!("failed to load manifest at {}: {e}", manifest_path.display()),
    )?;
    if data.is_empty() {
        anyhow::bail!("manifest {} contains no samples", manifest_path.display());
    }
    let split = IndexSplit::split(data.len(), args.train_fraction, args.seed);

    let cfg = TrainConfig {
        epochs: args.epochs,
        batch_size: args.batch_size,
        learning_rate: args.lr,
        seed: args.seed,
        loss: args.loss,
        checkpoint_dir: PathBuf::from(&args.checkpoint_dir),
        checkpoint_name: args.checkpoint_name.clone(),
    };

    let metrics = match args.model {
        ModelKind::Single => {
            let model = SingleClassifier::<ADBackend>::new(
                SingleClassifierConfig {
                    image_height: args.image_height,
                    image_width: args.image_width,
                    ..Default::default()
                },
                &device,
            );
            let (_model, metrics) = fit_single(model, &data, &split, &cfg, &device)?;
            metrics
        }
        ModelKind::Twin => {
            let twin_manifest = args
                .twin_manifest
                .clone()
                .unwrap_or_else(|| args.manifest.clone());
            let twin_dir = args
                .twin_image_dir
                .clone()
                .unwrap_or_else(|| args.image_dir.clone());
            let data_b = BatchContainer::from_csv(Path::new(&twin_manifest), Path::new(&twin_dir))
                .map_err(|e| anyhow::anyhow!("failed to load manifest at {twin_manifest}: {e}"))?;
            if data_b.is_empty() {
                anyhow::bail!("manifest {twin_manifest} contains no samples");
            }
            // The two sources shuffle independently; offset the second seed.
            let split_b =
                IndexSplit::split(data_b.len(), args.train_fraction, args.seed.wrapping_add(1));
            let model = TwinNetwork::<ADBackend>::new(
                TwinNetworkConfig {
                    image_height: args.image_height,
                    image_width: args.image_width,
                    mode: args.twin_mode.into(),
                    ..Default::default()
                },
                &device,
            );
            let (_model, metrics) =
                fit_twin(model, &data, &data_b, &split, &split_b, &cfg, &device)?;
            metrics
        }
    };

    let metrics_path = cfg
        .checkpoint_dir
        .join(format!("{}_metrics.json", cfg.checkpoint_name));
    fs::write(&metrics_path, serde_json::to_vec_pretty(&metrics)?)?;
    println!("Saved checkpoint to {}", cfg.checkpoint_path().display());
    println!("Saved metrics to {}", metrics_path.display());
    Ok(())
}

#[derive(Parser, Debug)]
#[command(name = "eval", about = "Evaluate a checkpoint against a manifest")]
pub struct EvalArgs {
    #[arg(long, value_enum, default_value_t = ModelKind::Single)]
    pub model: ModelKind,
    /// CSV manifest with filename and label columns.
    #[arg(long)]
    pub manifest: String,
    /// Directory the manifest filenames are relative to.
    #[arg(long)]
    pub image_dir: String,
    /// Manifest for the twin's second input source (defaults to --manifest).
    #[arg(long)]
    pub twin_manifest: Option<String>,
    /// Base directory for the second manifest (defaults to --image-dir).
    #[arg(long)]
    pub twin_image_dir: Option<String>,
    /// Checkpoint file written by the train binary.
    #[arg(long)]
    pub checkpoint: String,
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,
    #[arg(long, value_enum, default_value_t = TwinMode::Full)]
    pub twin_mode: TwinMode,
    #[arg(long, default_value_t = 64)]
    pub image_height: usize,
    #[arg(long, default_value_t = 64)]
    pub image_width: usize,
}

pub fn run_eval(args: EvalArgs) -> anyhow::Result<()> {
    let device = <TrainBackend as burn::tensor::backend::Backend>::Device::default();
    let data = BatchContainer::from_csv(Path::new(&args.manifest), Path::new(&args.image_dir))
        .map_err(|e| anyhow::anyhow!("failed to load manifest at {}: {e}", args.manifest))?;
    if data.is_empty() {
        anyhow::bail!("manifest {} contains no samples", args.manifest);
    }
    let batch_size = args.batch_size.max(1);
    let indices: Vec<usize> = (0..data.len()).collect();
    let mut correct = 0usize;
    let mut total = 0usize;

    match args.model {
        ModelKind::Single => {
            let model = load_single_classifier_from_checkpoint(
                &args.checkpoint,
                SingleClassifierConfig {
                    image_height: args.image_height,
                    image_width: args.image_width,
                    ..Default::default()
                },
                &device,
            )
            .map_err(|e| anyhow::anyhow!("failed to load checkpoint {}: {e}", args.checkpoint))?;
            for chunk in indices.chunks(batch_size) {
                let batch = data.get::<TrainBackend>(chunk, &device)?;
                let probs: Vec<f32> = sigmoid(model.forward(batch.images_nchw()))
                    .into_data()
                    .to_vec::<f32>()
                    .unwrap_or_default();
                let truth = data.labels(chunk);
                correct += probs
                    .iter()
                    .zip(&truth)
                    .filter(|(p, t)| (**p > 0.5) == (**t > 0.5))
                    .count();
                total += chunk.len();
            }
        }
        ModelKind::Twin => {
            let twin_manifest = args
                .twin_manifest
                .clone()
                .unwrap_or_else(|| args.manifest.clone());
            let twin_dir = args
                .twin_image_dir
                .clone()
                .unwrap_or_else(|| args.image_dir.clone());
            let data_b = BatchContainer::from_csv(Path::new(&twin_manifest), Path::new(&twin_dir))
                .map_err(|e| anyhow::anyhow!("failed to load manifest at {twin_manifest}: {e}"))?;
            let model = load_twin_from_checkpoint(
                &args.checkpoint,
                TwinNetworkConfig {
                    image_height: args.image_height,
                    image_width: args.image_width,
                    mode: args.twin_mode.into(),
                    ..Default::default()
                },
                &device,
            )
            .map_err(|e| anyhow::anyhow!("failed to load checkpoint {}: {e}", args.checkpoint))?;
            let indices_b: Vec<usize> = (0..data_b.len()).collect();
            for (chunk_a, chunk_b) in indices.chunks(batch_size).zip(indices_b.chunks(batch_size))
            {
                let n = chunk_a.len().min(chunk_b.len());
                let (chunk_a, chunk_b) = (&chunk_a[..n], &chunk_b[..n]);
                let batch_a = data.get::<TrainBackend>(chunk_a, &device)?;
                let batch_b = data_b.get::<TrainBackend>(chunk_b, &device)?;
                let probs: Vec<f32> =
                    sigmoid(model.forward_pair(batch_a.images_nchw(), batch_b.images_nchw()))
                        .into_data()
                        .to_vec::<f32>()
                        .unwrap_or_default();
                let truth = pair_targets(&data.labels(chunk_a), &data_b.labels(chunk_b));
                correct += probs
                    .iter()
                    .zip(&truth)
                    .filter(|(p, t)| (**p > 0.5) == (**t > 0.5))
                    .count();
                total += n;
            }
        }
    }

    println!(
        "accuracy {:.4} over {total} samples",
        correct as f32 / total.max(1) as f32
    );
    Ok(())
}
