//! MailMask — PII masking and email category classification service.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

mod batch;
mod routes;
mod state;
mod train;

use state::AppState;

fn resolve_data_dir() -> PathBuf {
    std::env::var("MAILMASK_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

/// Positional argument `idx`, or `default`.
fn arg_path(args: &[String], idx: usize, default: &std::path::Path) -> PathBuf {
    args.get(idx)
        .map(PathBuf::from)
        .unwrap_or_else(|| default.to_path_buf())
}

fn print_help() {
    println!("MailMask — PII masking and email classification");
    println!();
    println!("Usage: mailmask [command]");
    println!();
    println!("Commands:");
    println!("  serve                    Start the server (default)");
    println!("  mask [input] [output]    Mask the email column of a CSV export");
    println!("  train [input] [model]    Train the category classifier");
    println!("  help                     Show this help message");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let data_dir = resolve_data_dir();
    let config = mailmask_core::MailMaskConfig::from_env(&data_dir);

    if args.len() > 1 {
        match args[1].as_str() {
            "serve" => {}
            "mask" => {
                let input = arg_path(&args, 2, &config.data_paths.raw_emails);
                let output = arg_path(&args, 3, &config.data_paths.masked_emails);
                let (ner_dir, required) = config.recognizer_source();
                let recognizer = mailmask_pii::create_recognizer(ner_dir, required)
                    .map_err(|e| anyhow::anyhow!("Failed to load recognizer: {}", e))?;
                let masker = mailmask_pii::Masker::new(recognizer);
                batch::mask_csv(&masker, &input, &output)?;
                return Ok(());
            }
            "train" => {
                let input = arg_path(&args, 2, &config.data_paths.masked_emails);
                let model = arg_path(&args, 3, &config.data_paths.classifier_file);
                let report = train::train_from_csv(&input, &model)?;
                info!(
                    "Trained on {} emails: {} (cv={:.4}, test={:.4})",
                    report.samples, report.best_params, report.cv_accuracy, report.test_accuracy
                );
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'mailmask help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    info!("Data directory: {}", data_dir.display());

    let state = Arc::new(AppState::load(config)?);
    let addr = format!("0.0.0.0:{}", state.config.port);
    let app = routes::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("MailMask server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
