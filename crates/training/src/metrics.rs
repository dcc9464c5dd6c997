//! Per-run metric bookkeeping.

use serde::Serialize;

/// Validation metrics for a whole run, one slot per epoch.
///
/// Slots are pre-allocated and zeroed at loop start; each completed epoch
/// writes exactly one slot.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingMetrics {
    val_accuracy: Vec<f32>,
    val_loss: Vec<f32>,
}

impl TrainingMetrics {
    pub fn new(epochs: usize) -> Self {
        Self {
            val_accuracy: vec![0.0; epochs],
            val_loss: vec![0.0; epochs],
        }
    }

    pub fn record(&mut self, epoch: usize, accuracy: f32, loss: f32) {
        self.val_accuracy[epoch] = accuracy;
        self.val_loss[epoch] = loss;
    }

    pub fn epochs(&self) -> usize {
        self.val_accuracy.len()
    }

    pub fn val_accuracy(&self) -> &[f32] {
        &self.val_accuracy
    }

    pub fn val_loss(&self) -> &[f32] {
        &self.val_loss
    }
}

/// Ties count as an improvement, so the last tying epoch's weights persist.
pub fn should_checkpoint(accuracy: f32, best: f32) -> bool {
    accuracy >= best
}
