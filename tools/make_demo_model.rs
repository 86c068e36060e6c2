//! Demo Model Generator
//!
//! Writes a small linear iris classifier (sepal length, sepal width) so the
//! server can be started without a training pipeline.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use synapse_inference::models::Estimator;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "make-demo-model", about = "Write a demo iris classifier")]
struct Args {
    /// Output path; `.json` or `.bincode`
    #[arg(short, long, default_value = "models/iris.json")]
    output: PathBuf,

    /// Print the model as JSON instead of writing it
    #[arg(long)]
    dry_run: bool,
}

/// One decision function per species over (sepal length, sepal width)
fn iris_classifier() -> Estimator {
    Estimator::LinearClassifier {
        coefficients: vec![vec![-1.0, 2.0], vec![0.5, -0.5], vec![1.5, -1.5]],
        intercepts: vec![0.0, 0.0, -2.0],
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?),
        )
        .init();

    let args = Args::parse();
    let model = iris_classifier();

    if args.dry_run {
        info!("Running in dry-run mode (nothing written)");
        println!("{}", serde_json::to_string_pretty(&model)?);
        return Ok(());
    }

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    model
        .save(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    info!(
        path = %args.output.display(),
        family = model.family(),
        features = model.n_features(),
        "Demo model written"
    );

    Ok(())
}
