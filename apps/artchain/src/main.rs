use std::{path::PathBuf, process::ExitCode};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use client_core::ClientError;
use shared::{
    domain::MediaType,
    protocol::{DEFAULT_GALLERY_LIMIT, DEFAULT_GALLERY_PAGE},
};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use config::CommitMode;

#[derive(Parser, Debug)]
#[command(name = "artchain", about = "Verify and save media to ArtChain")]
struct Cli {
    /// ArtChain API base url.
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[arg(long, global = true)]
    database_url: Option<String>,
    #[arg(long, global = true, value_enum)]
    commit_mode: Option<CommitMode>,
    /// Check credentials against the local user directory instead of the API.
    #[arg(long, global = true)]
    local_auth: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Signup {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Defaults to --password.
        #[arg(long)]
        confirm_password: Option<String>,
    },
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    Whoami,
    /// Check a draft for duplicates without saving it.
    Verify(DraftArgs),
    /// Verify a draft and save it when no duplicate blocks it.
    Upload(DraftArgs),
    Gallery(GalleryArgs),
    /// List the signed-in user's uploads.
    Uploads,
    Stats,
}

#[derive(Args, Debug, Clone)]
pub struct DraftArgs {
    #[arg(long = "type", default_value_t = MediaType::Photo)]
    pub media_type: MediaType,
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Journal text.
    #[arg(long)]
    pub content: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct GalleryArgs {
    #[arg(long, default_value_t = DEFAULT_GALLERY_PAGE)]
    pub page: u32,
    #[arg(long, default_value_t = DEFAULT_GALLERY_LIMIT)]
    pub limit: u32,
    #[arg(long = "type")]
    pub media_type: Option<MediaType>,
    #[arg(long)]
    pub search: Option<String>,
    #[arg(long)]
    pub uploader: Option<String>,
    #[arg(long)]
    pub date_from: Option<String>,
    #[arg(long)]
    pub date_to: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<ClientError>() {
                Some(client_err) if client_err.requires_login() => {
                    eprintln!("Login required: {client_err}. Run `artchain login` first.");
                }
                Some(client_err) if client_err.is_validation() => {
                    eprintln!("Not saved: {client_err}");
                }
                Some(client_err) => eprintln!("Error: {}", client_err.user_message()),
                None => eprintln!("Error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut settings = config::load_settings()?;
    if let Some(url) = cli.api_url {
        settings.api_base_url = url;
    }
    if let Some(url) = cli.database_url {
        settings.database_url = config::normalize_database_url(&url);
    }
    if let Some(mode) = cli.commit_mode {
        settings.commit_mode = mode;
    }

    let mut app = commands::App::connect(&settings, cli.local_auth).await?;
    let outcome = match cli.command {
        Command::Signup {
            username,
            email,
            confirm_password,
            password,
        } => {
            let confirm_password = confirm_password.unwrap_or_else(|| password.clone());
            app.signup(username, email, password, confirm_password).await
        }
        Command::Login { email, password } => app.login(email, password).await,
        Command::Logout => app.logout().await,
        Command::Whoami => app.whoami().await,
        Command::Verify(draft) => app.verify(&draft).await,
        Command::Upload(draft) => app.upload(&draft).await,
        Command::Gallery(args) => app.gallery(&args).await,
        Command::Uploads => app.uploads().await,
        Command::Stats => app.stats().await,
    };
    if app.session_expired() {
        eprintln!("The server rejected the stored session; it has been cleared.");
    }
    outcome
}
