// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `evaluate`, and
// their flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};

use crate::application::train_use_case::{default_width, FineTuneConfig};
use crate::domain::role::Role;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fine-tune a classifier in two stages (head only, then everything)
    Train(TrainArgs),

    /// Report validation loss and accuracy of saved weights
    Evaluate(EvaluateArgs),
}

/// Which routine to run. Mirrors the domain Role so the
/// application layer never sees clap types.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum RoleArg {
    Teacher,
    Student,
}

impl From<RoleArg> for Role {
    fn from(r: RoleArg) -> Self {
        match r {
            RoleArg::Teacher => Role::Teacher,
            RoleArg::Student => Role::Student,
        }
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[arg(long, value_enum)]
    pub role: RoleArg,

    /// Folder with train/<class>/ and optionally val/<class>/ images
    #[arg(long)]
    pub data_dir: String,

    /// Where weights, run config and metrics.csv are written
    #[arg(long, default_value = "Weights")]
    pub weights_dir: String,

    /// Weight file to write instead of <weights-dir>/<Model>.mpk
    #[arg(long)]
    pub weights_path: Option<String>,

    /// Epochs with the backbone frozen
    #[arg(long, default_value_t = 10)]
    pub epochs_freeze: usize,

    /// Epochs with every layer trainable
    /// (teacher: 10, student: same as --epochs-freeze)
    #[arg(long)]
    pub epochs_unfreeze: Option<usize>,

    #[arg(long, default_value_t = 32, value_parser = parse_positive)]
    pub batch_size: usize,

    /// Images are resized to this many pixels per side
    #[arg(long, default_value_t = 64, value_parser = parse_positive)]
    pub image_size: usize,

    /// Fail unless the data has exactly this many class folders
    #[arg(long)]
    pub num_classes: Option<usize>,

    /// Base channel width of the backbone (teacher: 32, student: 16)
    #[arg(long)]
    pub width: Option<usize>,

    /// Fraction held out for validation when there is no val/ folder
    #[arg(long, default_value_t = 0.2)]
    pub val_fraction: f64,

    /// Seeds weight init, shuffling and the train/val split
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Convert CLI TrainArgs into the application-layer FineTuneConfig.
impl From<TrainArgs> for FineTuneConfig {
    fn from(a: TrainArgs) -> Self {
        let role = Role::from(a.role);
        let mut cfg = FineTuneConfig::for_role(role, a.epochs_freeze, a.epochs_unfreeze);
        cfg.data_dir     = a.data_dir;
        cfg.weights_dir  = a.weights_dir;
        cfg.weights_path = a.weights_path;
        cfg.batch_size   = a.batch_size;
        cfg.image_size   = a.image_size;
        cfg.num_classes  = a.num_classes;
        cfg.width        = a.width.unwrap_or_else(|| default_width(role));
        cfg.val_fraction = a.val_fraction;
        cfg.seed         = a.seed;
        cfg
    }
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[arg(long, value_enum)]
    pub role: RoleArg,

    /// Weight file written by `train`; its .json config must sit next to it
    #[arg(long)]
    pub weights_path: String,

    /// Same layout as for `train`
    #[arg(long)]
    pub data_dir: String,

    #[arg(long, default_value_t = 32, value_parser = parse_positive)]
    pub batch_size: usize,
}

/// A count that must be at least 1.
fn parse_positive(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0)  => Err("must be at least 1".to_string()),
        Ok(n)  => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}
