//! Epoch-based optimization with validation, metric accumulation, and
//! best-checkpoint persistence.

use crate::metrics::{should_checkpoint, TrainingMetrics};
use burn::module::Module;
use burn::nn::loss::{MseLoss, Reduction};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::activation::sigmoid;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::Tensor;
use clap::ValueEnum;
use dataset::{BatchContainer, IndexSplit};
use models::{SingleClassifier, TwinNetwork};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fs;
use std::path::{Path, PathBuf};

/// Training-phase loss, selected by task kind.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossKind {
    /// Binary cross-entropy on logits (classification).
    Bce,
    /// Mean squared error on logits (regression / image-to-image targets).
    Mse,
}

/// Hyperparameters for one run, passed explicitly into the loop.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub seed: u64,
    pub loss: LossKind,
    pub checkpoint_dir: PathBuf,
    pub checkpoint_name: String,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 10,
            batch_size: 32,
            learning_rate: 1e-3,
            seed: 42,
            loss: LossKind::Bce,
            checkpoint_dir: PathBuf::from("checkpoints"),
            checkpoint_name: "classifier".to_string(),
        }
    }
}

impl TrainConfig {
    pub fn checkpoint_path(&self) -> PathBuf {
        self.checkpoint_dir
            .join(format!("{}.bin", self.checkpoint_name))
    }
}

/// Effective twin-training target: 1.0 where the two underlying labels
/// match, else 0.0. The twin is trained as a same/different discriminator,
/// not to predict the original labels.
pub fn pair_targets(labels_a: &[f32], labels_b: &[f32]) -> Vec<f32> {
    labels_a
        .iter()
        .zip(labels_b)
        .map(|(a, b)| if a == b { 1.0 } else { 0.0 })
        .collect()
}

fn batch_loss<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 2>,
    kind: LossKind,
) -> Tensor<B, 1> {
    match kind {
        LossKind::Bce => {
            let eps = 1e-6;
            let probs = sigmoid(logits).clamp(eps, 1.0 - eps);
            let ones = Tensor::<B, 2>::ones(probs.dims(), &probs.device());
            (-(targets.clone() * probs.clone().log()
                + (ones.clone() - targets) * (ones - probs).log()))
            .mean()
        }
        LossKind::Mse => MseLoss::new().forward(logits, targets, Reduction::Mean),
    }
}

/// Reduce a scalar tensor to a host value before accumulating, so no device
/// memory is retained across the epoch.
fn scalar<B: Backend>(t: Tensor<B, 1>) -> f32 {
    t.into_data()
        .to_vec::<f32>()
        .unwrap_or_default()
        .into_iter()
        .next()
        .unwrap_or(0.0)
}

fn save_checkpoint<B: Backend, M: Module<B> + Clone>(model: &M, path: &Path) {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    if let Err(e) = model.clone().save_file(path, &recorder) {
        eprintln!(
            "Warning: failed to write checkpoint {}: {e}; continuing",
            path.display()
        );
    }
}

/// Train the single-path classifier for `cfg.epochs` epochs.
///
/// Each epoch re-shuffles the train indices (the split itself is fixed for
/// the run), takes one optimizer step per minibatch, then validates without
/// parameter updates. The model is checkpointed whenever validation accuracy
/// reaches a new run-best; ties win, starting from a best of 0.
pub fn fit_single<B: AutodiffBackend>(
    mut model: SingleClassifier<B>,
    data: &BatchContainer,
    split: &IndexSplit,
    cfg: &TrainConfig,
    device: &B::Device,
) -> anyhow::Result<(SingleClassifier<B>, TrainingMetrics)> {
    fs::create_dir_all(&cfg.checkpoint_dir)?;
    let mut optim = AdamConfig::new().init();
    let mut metrics = TrainingMetrics::new(cfg.epochs);
    let mut best_accuracy = 0.0f32;
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let batch_size = cfg.batch_size.max(1);
    // Fixed for the run; compute the denominator once.
    let train_batches = split.train.len().div_ceil(batch_size);

    for epoch in 0..cfg.epochs {
        let mut order = split.train.clone();
        order.shuffle(&mut rng);
        for chunk in order.chunks(batch_size) {
            let batch = data.get::<B>(chunk, device)?;
            let n = batch.batch_size();
            let targets = batch.labels.clone().reshape([n, 1]);
            let logits = model.forward(batch.images_nchw());
            let loss = batch_loss(logits, targets, cfg.loss);
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(cfg.learning_rate, model, grads);
        }

        let (accuracy, loss) = validate_single(&model, data, &split.val, cfg, device)?;
        metrics.record(epoch, accuracy, loss);
        println!(
            "epoch {}/{}: {train_batches} train batches, val_acc {accuracy:.4}, val_loss {loss:.4}",
            epoch + 1,
            cfg.epochs
        );
        if should_checkpoint(accuracy, best_accuracy) {
            best_accuracy = accuracy;
            save_checkpoint(&model, &cfg.checkpoint_path());
        }
    }

    Ok((model, metrics))
}

fn validate_single<B: AutodiffBackend>(
    model: &SingleClassifier<B>,
    data: &BatchContainer,
    val: &[usize],
    cfg: &TrainConfig,
    device: &B::Device,
) -> anyhow::Result<(f32, f32)> {
    let batch_size = cfg.batch_size.max(1);
    let mut correct = 0usize;
    let mut loss_sum = 0.0f32;
    let mut total = 0usize;

    for chunk in val.chunks(batch_size) {
        let batch = data.get::<B>(chunk, device)?;
        let n = batch.batch_size();
        let targets = batch.labels.clone().reshape([n, 1]);
        let logits = model.forward(batch.images_nchw());
        loss_sum += scalar(batch_loss(logits.clone(), targets, cfg.loss).detach()) * n as f32;

        let probs: Vec<f32> = sigmoid(logits.detach())
            .into_data()
            .to_vec::<f32>()
            .unwrap_or_default();
        let truth = data.labels(chunk);
        correct += probs
            .iter()
            .zip(&truth)
            .filter(|(p, t)| (**p > 0.5) == (**t > 0.5))
            .count();
        total += n;
    }

    if total == 0 {
        return Ok((0.0, 0.0));
    }
    Ok((correct as f32 / total as f32, loss_sum / total as f32))
}

/// Train the twin network for `cfg.epochs` epochs.
///
/// Minibatches are pairs drawn in lockstep from two independently-shuffled
/// index orders; the target per pair is derived from label equality. Epoch,
/// validation, and checkpoint structure match the single-path loop.
pub fn fit_twin<B: AutodiffBackend>(
    mut model: TwinNetwork<B>,
    data_a: &BatchContainer,
    data_b: &BatchContainer,
    split_a: &IndexSplit,
    split_b: &IndexSplit,
    cfg: &TrainConfig,
    device: &B::Device,
) -> anyhow::Result<(TwinNetwork<B>, TrainingMetrics)> {
    fs::create_dir_all(&cfg.checkpoint_dir)?;
    let mut optim = AdamConfig::new().init();
    let mut metrics = TrainingMetrics::new(cfg.epochs);
    let mut best_accuracy = 0.0f32;
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let batch_size = cfg.batch_size.max(1);
    let train_batches = split_a
        .train
        .len()
        .min(split_b.train.len())
        .div_ceil(batch_size);

    for epoch in 0..cfg.epochs {
        let mut order_a = split_a.train.clone();
        let mut order_b = split_b.train.clone();
        order_a.shuffle(&mut rng);
        order_b.shuffle(&mut rng);

        for (chunk_a, chunk_b) in order_a.chunks(batch_size).zip(order_b.chunks(batch_size)) {
            let n = chunk_a.len().min(chunk_b.len());
            let (chunk_a, chunk_b) = (&chunk_a[..n], &chunk_b[..n]);
            let batch_a = data_a.get::<B>(chunk_a, device)?;
            let batch_b = data_b.get::<B>(chunk_b, device)?;
            let targets = pair_targets(&data_a.labels(chunk_a), &data_b.labels(chunk_b));
            let targets =
                Tensor::<B, 1>::from_floats(targets.as_slice(), device).reshape([n, 1]);
            let logits = model.forward_pair(batch_a.images_nchw(), batch_b.images_nchw());
            let loss = batch_loss(logits, targets, cfg.loss);
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(cfg.learning_rate, model, grads);
        }

        let (accuracy, loss) =
            validate_twin(&model, data_a, data_b, &split_a.val, &split_b.val, cfg, device)?;
        metrics.record(epoch, accuracy, loss);
        println!(
            "epoch {}/{}: {train_batches} train batches, val_acc {accuracy:.4}, val_loss {loss:.4}",
            epoch + 1,
            cfg.epochs
        );
        if should_checkpoint(accuracy, best_accuracy) {
            best_accuracy = accuracy;
            save_checkpoint(&model, &cfg.checkpoint_path());
        }
    }

    Ok((model, metrics))
}

fn validate_twin<B: AutodiffBackend>(
    model: &TwinNetwork<B>,
    data_a: &BatchContainer,
    data_b: &BatchContainer,
    val_a: &[usize],
    val_b: &[usize],
    cfg: &TrainConfig,
    device: &B::Device,
) -> anyhow::Result<(f32, f32)> {
    let batch_size = cfg.batch_size.max(1);
    let mut correct = 0usize;
    let mut loss_sum = 0.0f32;
    let mut total = 0usize;

    for (chunk_a, chunk_b) in val_a.chunks(batch_size).zip(val_b.chunks(batch_size)) {
        let n = chunk_a.len().min(chunk_b.len());
        let (chunk_a, chunk_b) = (&chunk_a[..n], &chunk_b[..n]);
        let batch_a = data_a.get::<B>(chunk_a, device)?;
        let batch_b = data_b.get::<B>(chunk_b, device)?;
        let truth = pair_targets(&data_a.labels(chunk_a), &data_b.labels(chunk_b));
        let targets =
            Tensor::<B, 1>::from_floats(truth.as_slice(), device).reshape([n, 1]);
        let logits = model.forward_pair(batch_a.images_nchw(), batch_b.images_nchw());
        loss_sum += scalar(batch_loss(logits.clone(), targets, cfg.loss).detach()) * n as f32;

        let probs: Vec<f32> = sigmoid(logits.detach())
            .into_data()
            .to_vec::<f32>()
            .unwrap_or_default();
        correct += probs
            .iter()
            .zip(&truth)
            .filter(|(p, t)| (**p > 0.5) == (**t > 0.5))
            .count();
        total += n;
    }

    if total == 0 {
        return Ok((0.0, 0.0));
    }
    Ok((correct as f32 / total as f32, loss_sum / total as f32))
}
