use anyhow::Result;
use clap::{Parser, Subcommand};
use common::llm::{CohereClient, GenerationClient};
use common::session::SessionStore;
use common::tracing::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "tabchat")]
#[command(about = "chat with an uploaded table", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Host address to bind to
        #[arg(long, env = "TABCHAT_HOST", default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, env = "TABCHAT_PORT", default_value = "8080")]
        port: u16,

        /// Cohere API key; without it uploads still work but chat reports
        /// the generator as unconfigured
        #[arg(long, env = "COHERE_API_KEY")]
        cohere_api_key: Option<String>,

        /// Generation model name
        #[arg(long, env = "TABCHAT_MODEL")]
        model: Option<String>,

        /// Timeout for one generation call, in seconds
        #[arg(long, env = "TABCHAT_GENERATION_TIMEOUT_SECS", default_value = "30")]
        generation_timeout_secs: u64,

        /// Maximum upload size in megabytes
        #[arg(long, env = "TABCHAT_UPLOAD_LIMIT_MB", default_value = "50")]
        upload_limit_mb: usize,
    },
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Serve {
                host,
                port,
                cohere_api_key,
                model,
                generation_timeout_secs,
                upload_limit_mb,
            } => {
                serve(
                    host,
                    port,
                    cohere_api_key,
                    model,
                    generation_timeout_secs,
                    upload_limit_mb,
                )
                .await
            }
        }
    }
}

async fn serve(
    host: String,
    port: u16,
    cohere_api_key: Option<String>,
    model: Option<String>,
    generation_timeout_secs: u64,
    upload_limit_mb: usize,
) -> Result<()> {
    let _guard = init_tracing("tabchat")?;

    let client: Option<Arc<dyn GenerationClient>> = match cohere_api_key {
        Some(key) if !key.is_empty() => {
            let timeout = Duration::from_secs(generation_timeout_secs);
            let mut cohere = CohereClient::new(key, timeout)?;
            if let Some(model) = model {
                cohere = cohere.with_model(model);
            }
            tracing::info!(
                timeout_secs = generation_timeout_secs,
                "generation client configured"
            );
            Some(Arc::new(cohere))
        }
        _ => {
            tracing::warn!("no api key configured; chat will report the generator as unavailable");
            None
        }
    };

    let upload_limit_bytes = upload_limit_mb * 1024 * 1024;
    let state = crate::http::AppState {
        store: Arc::new(SessionStore::new()),
        client,
    };

    let app = crate::http::build_router(state, upload_limit_bytes);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!(%addr, upload_limit_mb, "starting tabchat server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
