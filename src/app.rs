//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - reads CSVs and runs training / evaluation
//! - loads bundles for prediction and serving
//! - prints reports and writes optional exports

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use crate::cli::{Command, EvaluateArgs, PredictArgs, ServeArgs, SynthArgs, TrainArgs};
use crate::confidence::BootstrapConfig;
use crate::domain::TrainConfig;
use crate::error::AppError;
use crate::service::{PredictRequest, SalaryService};

pub mod pipeline;

/// Entry point for the `salary` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Train(args) => handle_train(args),
        Command::Evaluate(args) => handle_evaluate(args),
        Command::Predict(args) => handle_predict(args),
        Command::Serve(args) => handle_serve(args),
        Command::Synth(args) => handle_synth(args),
    }
}

fn handle_train(args: TrainArgs) -> Result<(), AppError> {
    let config = TrainConfig::from(&args);
    let ingest = crate::io::load_dataset(&args.data)?;
    println!("{}", crate::report::format_ingest_summary(&ingest));

    let run = pipeline::run_training(&ingest.records, &config, &args.pipeline_options(), args.embed_dim)?;

    println!(
        "{}",
        crate::report::format_search_summary(&run.trials, &run.best, args.top)
    );
    println!("Held-out comparison (train={}, test={}):", run.n_train, run.n_test);
    println!("{}", crate::report::format_comparison(&run.comparison));

    let manifest = crate::io::save_bundle(&run.bundle, &args.out)?;
    println!(
        "Saved bundle to {} ({} features: {} tabular + {} text)",
        args.out.display(),
        manifest.tabular_width + manifest.text_width,
        manifest.tabular_width,
        manifest.text_width
    );
    Ok(())
}

fn handle_evaluate(args: EvaluateArgs) -> Result<(), AppError> {
    let bundle = crate::io::load_bundle(&args.artifacts)?;
    let ingest = crate::io::load_dataset(&args.data)?;
    println!("{}", crate::report::format_ingest_summary(&ingest));

    let eval = pipeline::run_evaluation(&bundle, &ingest.records, &BootstrapConfig::from(&args))?;
    println!("{}", crate::report::format_bootstrap("Model", &eval.report));

    if let Some(path) = &args.export {
        crate::io::write_predictions_csv(path, &eval.rows)?;
        println!("Wrote {} predictions to {}", eval.rows.len(), path.display());
    }
    Ok(())
}

fn handle_predict(args: PredictArgs) -> Result<(), AppError> {
    let bundle = crate::io::load_bundle(&args.artifacts)?;
    let service = SalaryService::new(Arc::new(bundle));
    let response = service.predict(&PredictRequest::from(&args))?;
    let json = serde_json::to_string_pretty(&response)
        .map_err(|e| AppError::io(format!("Failed to encode response: {e}")))?;
    println!("{json}");
    Ok(())
}

fn handle_serve(args: ServeArgs) -> Result<(), AppError> {
    // Load before binding: a bad bundle must stop startup, not degrade requests.
    let bundle = crate::io::load_bundle(&args.artifacts)?;
    let service = Arc::new(SalaryService::new(Arc::new(bundle)));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::io(format!("Failed to start async runtime: {e}")))?;
    runtime.block_on(crate::service::serve(service, &args.bind))
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let records = crate::data::generate_synthetic(args.rows, args.seed)?;
    crate::io::write_dataset_csv(&args.out, &records)?;
    info!(rows = records.len(), path = %args.out.display(), "wrote synthetic dataset");
    println!("Wrote {} rows to {}", records.len(), args.out.display());
    Ok(())
}
