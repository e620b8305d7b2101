// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses command line arguments with `clap` and hands off to
// Layer 2 (application).
//
//   1. `train`    — staged fine-tuning of a teacher or student
//   2. `evaluate` — validation loss / accuracy of saved weights
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use commands::{Commands, EvaluateArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "distiller",
    version = "0.1.0",
    about = "Staged fine-tuning of teacher and student image classifiers."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting {:?} fine-tuning on images in: {}", args.role, args.data_dir);

    let report = TrainUseCase::new(args.into()).execute()?;

    println!();
    println!("{:>5} {:>5} {:>10} {:>10} {:>10} {:>10}", "Stage", "Epoch", "Train loss", "Train acc", "Val acc", "lr");
    for (stage, e) in &report.history {
        println!(
            "{:>5} {:>5} {:>10.4} {:>10.3} {:>10.3} {:>10.1e}{}",
            stage.number(),
            e.epoch,
            e.train.loss,
            e.train.accuracy_percent(),
            e.valid.accuracy_percent(),
            e.lr,
            if e.improved { " *" } else { "" },
        );
    }

    println!(
        "Training complete. Best val accuracy {:.3}% ({}). Weights: {}",
        100.0 * report.best_accuracy,
        report.best_origin,
        report.weights_path.display(),
    );
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let use_case = EvaluateUseCase::new(
        args.role.into(),
        PathBuf::from(args.weights_path),
        PathBuf::from(args.data_dir),
        args.batch_size,
    );
    let report = use_case.execute()?;

    println!(
        "Val - loss = {:.6}, accuracy = {:.3} ({} images)",
        report.outcome.loss,
        report.outcome.accuracy_percent(),
        report.examples,
    );
    Ok(())
}
