//! Burn modules for the image-classification training harness.
//!
//! Two architectures are defined:
//! - `SingleClassifier`: a small convolutional binary classifier.
//! - `TwinNetwork`: a siamese pair sharing one `EmbeddingPath`, whose
//!   combined embeddings are scored as a same/different-label discriminator.
//!
//! These are pure Burn modules; the `training` crate drives them through the
//! epoch loop and owns loss/metric semantics.

use burn::module::Module;
use burn::nn;
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::PaddingConfig2d;
use burn::tensor::activation::relu;
use burn::tensor::{backend::Backend, Tensor};

/// Spatial size after the two stride-2 pooling stages.
fn pooled(dim: usize) -> usize {
    (dim / 2) / 2
}

#[derive(Debug, Clone)]
pub struct SingleClassifierConfig {
    pub image_height: usize,
    pub image_width: usize,
    pub hidden: usize,
}

impl Default for SingleClassifierConfig {
    fn default() -> Self {
        Self {
            image_height: 64,
            image_width: 64,
            hidden: 128,
        }
    }
}

/// Single-path convolutional classifier emitting one logit per sample.
#[derive(Debug, Module)]
pub struct SingleClassifier<B: Backend> {
    conv1: nn::conv::Conv2d<B>,
    conv2: nn::conv::Conv2d<B>,
    pool: MaxPool2d,
    fc1: nn::Linear<B>,
    fc2: nn::Linear<B>,
}

impl<B: Backend> SingleClassifier<B> {
    pub fn new(cfg: SingleClassifierConfig, device: &B::Device) -> Self {
        let conv1 = nn::conv::Conv2dConfig::new([3, 16], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let conv2 = nn::conv::Conv2dConfig::new([16, 32], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        let flat = 32 * pooled(cfg.image_height) * pooled(cfg.image_width);
        let fc1 = nn::LinearConfig::new(flat, cfg.hidden).init(device);
        let fc2 = nn::LinearConfig::new(cfg.hidden, 1).init(device);
        Self {
            conv1,
            conv2,
            pool,
            fc1,
            fc2,
        }
    }

    /// Input is `[count, 3, height, width]`; output is `[count, 1]` logits.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.pool.forward(relu(self.conv1.forward(images)));
        let x = self.pool.forward(relu(self.conv2.forward(x)));
        let x = x.flatten::<2>(1, 3);
        let x = relu(self.fc1.forward(x));
        self.fc2.forward(x)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwinTrainMode {
    /// Freeze the shared convolutional stem; train the projection and combinator.
    Transfer,
    /// Train every parameter in the shared path and the combinator.
    Full,
}

#[derive(Debug, Clone)]
pub struct TwinNetworkConfig {
    pub image_height: usize,
    pub image_width: usize,
    pub embedding: usize,
    pub hidden: usize,
    pub mode: TwinTrainMode,
}

impl Default for TwinNetworkConfig {
    fn default() -> Self {
        Self {
            image_height: 64,
            image_width: 64,
            embedding: 64,
            hidden: 64,
            mode: TwinTrainMode::Full,
        }
    }
}

/// The sub-network shared by both twin inputs: conv stem plus a projection
/// to a fixed-size embedding.
#[derive(Debug, Module)]
pub struct EmbeddingPath<B: Backend> {
    conv1: nn::conv::Conv2d<B>,
    conv2: nn::conv::Conv2d<B>,
    pool: MaxPool2d,
    proj: nn::Linear<B>,
}

impl<B: Backend> EmbeddingPath<B> {
    pub fn new(cfg: &TwinNetworkConfig, device: &B::Device) -> Self {
        let conv1 = nn::conv::Conv2dConfig::new([3, 16], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let conv2 = nn::conv::Conv2dConfig::new([16, 32], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        let flat = 32 * pooled(cfg.image_height) * pooled(cfg.image_width);
        let proj = nn::LinearConfig::new(flat, cfg.embedding).init(device);
        Self {
            conv1,
            conv2,
            pool,
            proj,
        }
    }

    /// Detach the conv stem from gradient tracking (transfer-learning mode).
    fn freeze_stem(self) -> Self {
        Self {
            conv1: self.conv1.no_grad(),
            conv2: self.conv2.no_grad(),
            ..self
        }
    }

    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.pool.forward(relu(self.conv1.forward(images)));
        let x = self.pool.forward(relu(self.conv2.forward(x)));
        let x = x.flatten::<2>(1, 3);
        self.proj.forward(x)
    }
}

/// Siamese network: one shared path applied to both inputs, embeddings
/// combined through a learned scorer to a single same/different logit.
#[derive(Debug, Module)]
pub struct TwinNetwork<B: Backend> {
    path: EmbeddingPath<B>,
    combine1: nn::Linear<B>,
    combine2: nn::Linear<B>,
}

impl<B: Backend> TwinNetwork<B> {
    pub fn new(cfg: TwinNetworkConfig, device: &B::Device) -> Self {
        let path = EmbeddingPath::new(&cfg, device);
        let path = match cfg.mode {
            TwinTrainMode::Transfer => path.freeze_stem(),
            TwinTrainMode::Full => path,
        };
        let combine1 = nn::LinearConfig::new(cfg.embedding, cfg.hidden).init(device);
        let combine2 = nn::LinearConfig::new(cfg.hidden, 1).init(device);
        Self {
            path,
            combine1,
            combine2,
        }
    }

    /// Both inputs are `[count, 3, height, width]`; output is `[count, 1]` logits.
    pub fn forward_pair(&self, a: Tensor<B, 4>, b: Tensor<B, 4>) -> Tensor<B, 2> {
        let ea = self.path.forward(a);
        let eb = self.path.forward(b);
        let d = (ea - eb).abs();
        let x = relu(self.combine1.forward(d));
        self.combine2.forward(x)
    }
}

pub mod prelude {
    pub use super::{
        EmbeddingPath, SingleClassifier, SingleClassifierConfig, TwinNetwork, TwinNetworkConfig,
        TwinTrainMode,
    };
}
