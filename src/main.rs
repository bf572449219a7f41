use std::process::ExitCode;
use std::sync::Arc;

use inquiry_relay::channels::notifier_from_config;
use inquiry_relay::config::SpreadsheetRef;
use inquiry_relay::error::StartupError;
use inquiry_relay::llm::create_provider;
use inquiry_relay::pipeline::{InquiryProcessor, Summarizer};
use inquiry_relay::startup::{load_config_from_env, open_store};
use inquiry_relay::store::SheetsEndpoints;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Install rustls crypto provider before any TLS usage
    let _ = rustls::crypto::ring::default_provider().install_default();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    eprintln!("📬 Inquiry Relay v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_config_from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(e.exit_code());
        }
    };

    match &config.store.spreadsheet {
        SpreadsheetRef::Id(id) => eprintln!("   Spreadsheet: {id}"),
        SpreadsheetRef::Name(name) => eprintln!("   Spreadsheet: '{name}' (by name)"),
    }
    let channels = config.enabled_channels();
    eprintln!(
        "   Channels: {}",
        if channels.is_empty() {
            "none (rows will be marked without delivery)".to_string()
        } else {
            channels.join(", ")
        }
    );
    eprintln!("   Mark policy: {}", config.mark_policy.label());

    // ── Store ────────────────────────────────────────────────────────
    let store = match open_store(&config.store, SheetsEndpoints::default()).await {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {e}");
            if let StartupError::Store(_) = e {
                eprintln!("   Share the spreadsheet with the service account (Editor) and check the ID.");
            }
            return ExitCode::from(e.exit_code());
        }
    };

    // ── Summarizer ───────────────────────────────────────────────────
    let llm = match config.llm.as_ref().map(create_provider) {
        Some(Ok(provider)) => {
            eprintln!("   Summarizer: {}", provider.model_name());
            Some(provider)
        }
        Some(Err(e)) => {
            tracing::warn!(error = %e, "LLM init failed, proceeding without summaries");
            eprintln!("   Summarizer: disabled ({e})");
            None
        }
        None => {
            eprintln!("   Summarizer: disabled (no API key)");
            None
        }
    };
    eprintln!();

    let processor = InquiryProcessor::new(
        Arc::new(store),
        Summarizer::new(llm),
        notifier_from_config(&config),
        config.mark_policy,
    );

    let report = processor.run().await;
    if report.is_aborted() {
        eprintln!(
            "❌ Run aborted: {}",
            report.error.as_deref().unwrap_or("fetch failed")
        );
    } else {
        eprintln!(
            "✅ Done. Rows fetched: {}, marked: {}, delivery failures: {}",
            report.fetched, report.marked, report.delivery_failures
        );
    }

    ExitCode::from(report.exit_code())
}
