use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hypha::config::AppConfig;
use hypha::server::{create_router, AppState};
use hypha::shutdown::{graceful_shutdown, wait_for_shutdown};
use hypha::workflow::issue::{IssueRequest, IssueResolver};
use hypha::workflow::state::{IssueComment, ResponseMode};

#[derive(Parser)]
#[command(name = "hypha", version, about = "Answers and fixes issues against a local checkout")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve,
    /// Resolve one issue and print the response and patch.
    Resolve {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        body: String,
        /// Prior discussion, as `user:text`. Repeatable.
        #[arg(long = "comment", value_parser = parse_comment)]
        comments: Vec<IssueComment>,
        #[arg(long, value_enum, default_value_t = Mode::AnswerAndFix)]
        mode: Mode,
        #[arg(long)]
        run_build: bool,
        #[arg(long)]
        run_test: bool,
        /// Resume or replay an existing thread.
        #[arg(long)]
        thread_id: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    OnlyAnswer,
    AnswerAndFix,
}

impl From<Mode> for ResponseMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::OnlyAnswer => ResponseMode::OnlyAnswer,
            Mode::AnswerAndFix => ResponseMode::AnswerAndFix,
        }
    }
}

fn parse_comment(raw: &str) -> Result<IssueComment, String> {
    let (username, comment) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected user:text, got `{raw}`"))?;
    Ok(IssueComment {
        username: username.trim().to_string(),
        comment: comment.trim().to_string(),
    })
}

fn init_tracing(json: bool) {
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    init_tracing(config.logging.json);

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Resolve {
            title,
            body,
            comments,
            mode,
            run_build,
            run_test,
            thread_id,
        } => {
            let request = IssueRequest {
                title,
                body,
                comments,
                response_mode: mode.into(),
                run_build,
                run_test,
            };
            resolve(config, request, thread_id).await
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        project = %config.project.path.display(),
        "Starting Hypha server"
    );

    let state = Arc::new(AppState::new(config.clone()).await?);
    let app = create_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        config.server.host, config.server.port
    ))
    .await?;

    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    graceful_shutdown(&state).await;

    Ok(())
}

async fn resolve(
    config: AppConfig,
    request: IssueRequest,
    thread_id: Option<String>,
) -> anyhow::Result<()> {
    let resolver = IssueResolver::from_config(&config).await?;
    let resolution = resolver
        .resolve_issue(request, thread_id)
        .await
        .context("issue resolution failed")?;

    tracing::info!(thread_id = %resolution.thread_id, "Issue resolved");

    println!("{}", resolution.response);
    if !resolution.patch.is_empty() {
        println!("\n{}", resolution.patch);
    }

    Ok(())
}
