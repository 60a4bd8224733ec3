/// Docflow: resumable document-processing workflow orchestrator
///
/// Main entry point for the docflow server. Loads configuration from the
/// environment and starts the HTTP server.

use docflow::{config::Config, server::start_server};

/// Application entry point
///
/// The server provides:
/// - Case workflow API at /api/cases/{case_id}/*
/// - Stage registry at /api/stages
/// - Health check at /healthz
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (defaults to 0.0.0.0:3004 and data/workflows.db)
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
