// ============================================================
// Layer 5 — Classifier Architectures
// ============================================================
// Both classifiers share one shape:
//
//   images [N, 3, S, S]
//     → backbone  (strided 3×3 conv blocks + ReLU, global avg pool)
//     → features  [N, C]
//     → head      (final classification layer)
//     → logits    [N, num_classes]
//
// The split into `backbone` and `head` is what staged
// fine-tuning works on: stage 1 freezes the backbone and trains
// only the head, stage 2 trains everything.
//
//   TeacherNet — three conv blocks (w, 2w, 4w), dropout before the head
//   StudentNet — two conv blocks   (w, 2w), bare linear head
//
// Freezing uses Module::no_grad on the backbone, so its tensors
// never enter the autodiff graph and never get gradients.
// Unfreezing rebuilds the module with trainable parameters and
// loads the current weights into it; load_record keeps the
// require_grad setting of the module it loads into.

use burn::{
    module::AutodiffModule,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Dropout, DropoutConfig,
        Linear, LinearConfig,
        PaddingConfig2d,
    },
    prelude::*,
    tensor::{activation::relu, backend::AutodiffBackend},
};

use crate::infra::checkpoint::model_type_name;

// ─── Traits ───────────────────────────────────────────────────────────────────

/// Anything that maps an image batch to class logits.
pub trait Classifier<B: Backend>: Module<B> {
    /// images: [N, 3, S, S] → logits: [N, num_classes]
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2>;

    fn num_classes(&self) -> usize;
}

/// Per-stage trainability control used by the staged fine-tuner.
pub trait FineTune<B: AutodiffBackend>: Classifier<B> + AutodiffModule<B> {
    /// Stop gradients for every backbone parameter. The head stays trainable.
    fn freeze_backbone(self) -> Self;

    /// Make every parameter trainable again, keeping current weights.
    fn unfreeze_all(self, device: &B::Device) -> Self;

    /// Short architecture name, used for default file names.
    fn type_name() -> &'static str
    where
        Self: Sized,
    {
        model_type_name::<Self>()
    }
}

// ─── Shared Backbone ──────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
}

impl<B: Backend> ConvBlock<B> {
    fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        Self { conv }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        relu(self.conv.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct ConvBackbone<B: Backend> {
    pub blocks: Vec<ConvBlock<B>>,
    pub pool:   AdaptiveAvgPool2d,
}

impl<B: Backend> ConvBackbone<B> {
    /// `channels` lists the output width of each block; the input is RGB.
    pub fn new(channels: &[usize], device: &B::Device) -> Self {
        let mut blocks = Vec::with_capacity(channels.len());
        let mut in_channels = 3;
        for &out_channels in channels {
            blocks.push(ConvBlock::new(in_channels, out_channels, device));
            in_channels = out_channels;
        }
        let pool = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        Self { blocks, pool }
    }

    /// [N, 3, S, S] → [N, C]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = images;
        for block in &self.blocks {
            x = block.forward(x);
        }
        let x = self.pool.forward(x); // [N, C, 1, 1]
        let [n, c, _, _] = x.dims();
        x.reshape([n, c])
    }
}

// ─── TeacherNet ───────────────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct TeacherNetConfig {
    pub num_classes: usize,
    #[config(default = 32)]
    pub width: usize,
    #[config(default = 0.2)]
    pub dropout: f64,
}

impl TeacherNetConfig {
    pub fn channels(&self) -> Vec<usize> {
        vec![self.width, 2 * self.width, 4 * self.width]
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> TeacherNet<B> {
        let channels = self.channels();
        let features = channels[channels.len() - 1];
        TeacherNet {
            backbone:    ConvBackbone::new(&channels, device),
            dropout:     DropoutConfig::new(self.dropout).init(),
            head:        LinearConfig::new(features, self.num_classes).init(device),
            num_classes: self.num_classes,
            width:       self.width,
        }
    }
}

#[derive(Module, Debug)]
pub struct TeacherNet<B: Backend> {
    pub backbone:    ConvBackbone<B>,
    pub dropout:     Dropout,
    pub head:        Linear<B>,
    pub num_classes: usize,
    pub width:       usize,
}

impl<B: Backend> TeacherNet<B> {
    /// Architecture this module was built from.
    pub fn config(&self) -> TeacherNetConfig {
        TeacherNetConfig::new(self.num_classes)
            .with_width(self.width)
            .with_dropout(self.dropout.prob)
    }
}

impl<B: Backend> Classifier<B> for TeacherNet<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let features = self.backbone.forward(images);
        self.head.forward(self.dropout.forward(features))
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }
}

impl<B: AutodiffBackend> FineTune<B> for TeacherNet<B> {
    fn freeze_backbone(mut self) -> Self {
        self.backbone = self.backbone.no_grad();
        self
    }

    fn unfreeze_all(self, device: &B::Device) -> Self {
        self.config().init(device).load_record(self.into_record())
    }
}

// ─── StudentNet ───────────────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct StudentNetConfig {
    pub num_classes: usize,
    #[config(default = 16)]
    pub width: usize,
}

impl StudentNetConfig {
    pub fn channels(&self) -> Vec<usize> {
        vec![self.width, 2 * self.width]
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> StudentNet<B> {
        let channels = self.channels();
        let features = channels[channels.len() - 1];
        StudentNet {
            backbone:    ConvBackbone::new(&channels, device),
            head:        LinearConfig::new(features, self.num_classes).init(device),
            num_classes: self.num_classes,
            width:       self.width,
        }
    }
}

#[derive(Module, Debug)]
pub struct StudentNet<B: Backend> {
    pub backbone:    ConvBackbone<B>,
    pub head:        Linear<B>,
    pub num_classes: usize,
    pub width:       usize,
}

impl<B: Backend> StudentNet<B> {
    pub fn config(&self) -> StudentNetConfig {
        StudentNetConfig::new(self.num_classes).with_width(self.width)
    }
}

impl<B: Backend> Classifier<B> for StudentNet<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.head.forward(self.backbone.forward(images))
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }
}

impl<B: AutodiffBackend> FineTune<B> for StudentNet<B> {
    fn freeze_backbone(mut self) -> Self {
        self.backbone = self.backbone.no_grad();
        self
    }

    fn unfreeze_all(self, device: &B::Device) -> Self {
        self.config().init(device).load_record(self.into_record())
    }
}
