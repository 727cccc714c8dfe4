//! clients/cli/src/main.rs
//!
//! `healthlens`: sends images to the HealthLens API and keeps a local history
//! of the results.

mod client;
mod file_store;
mod render;
mod thumbnail;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::{Parser, Subcommand};
use client::{AnalyzePayload, ApiClient};
use file_store::FileStore;
use healthlens_core::domain::{AnalysisType, HealthProfile};
use healthlens_core::HistoryCache;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "healthlens", version, about = "Analyze medication labels, food packaging and menus")]
struct Cli {
    /// Base URL of the HealthLens API.
    #[arg(long, global = true, env = "HEALTHLENS_API_URL", default_value = "http://localhost:3001")]
    server: String,

    /// Directory holding the local analysis history.
    #[arg(long, global = true, env = "HEALTHLENS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze an image.
    Analyze {
        image: PathBuf,
        /// medication, food, interaction or allergen.
        #[arg(long = "type", short = 't')]
        analysis_type: AnalysisType,
        /// JSON file with the user's health profile.
        #[arg(long)]
        profile: Option<PathBuf>,
        /// Extra free-text context for the model.
        #[arg(long)]
        context: Option<String>,
        /// Do not record the result in the local history.
        #[arg(long)]
        no_history: bool,
    },
    /// Inspect or manage past analyses.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Show the server's configuration status.
    Status,
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    List,
    Show { id: String },
    Delete { id: String },
    Clear,
    /// Write the whole history to a JSON file.
    Export {
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = cli.data_dir.clone().unwrap_or_else(FileStore::default_dir);
    let store = FileStore::new(data_dir);
    debug!(dir = %store.dir().display(), "Using history store.");

    match cli.command {
        Command::Analyze {
            image,
            analysis_type,
            profile,
            context,
            no_history,
        } => {
            let client = ApiClient::new(&cli.server)?;
            let history = (!no_history).then(|| HistoryCache::new(Arc::new(store)));
            analyze(&client, history.as_ref(), &image, analysis_type, profile.as_deref(), context).await
        }
        Command::History { action } => run_history(HistoryCache::new(Arc::new(store)), action),
        Command::Status => {
            let status = ApiClient::new(&cli.server)?.status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
    }
}

fn load_profile(path: &Path) -> Result<HealthProfile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile {}", path.display()))?;
    let profile: HealthProfile = serde_json::from_str(&raw)
        .with_context(|| format!("profile {} is not valid JSON", path.display()))?;
    Ok(profile)
}

async fn analyze(
    client: &ApiClient,
    history: Option<&HistoryCache>,
    image: &Path,
    analysis_type: AnalysisType,
    profile: Option<&Path>,
    context: Option<String>,
) -> Result<()> {
    let bytes = std::fs::read(image)
        .with_context(|| format!("failed to read image {}", image.display()))?;
    let user_profile = profile.map(load_profile).transpose()?;

    let payload = AnalyzePayload {
        image_base64: BASE64.encode(&bytes),
        analysis_type,
        user_profile,
        additional_context: context.filter(|c| !c.trim().is_empty()),
    };

    let result = client.analyze(&payload).await?;
    print!("{}", render::render_result(&result));

    if !result.success {
        bail!("analysis did not complete");
    }

    if let Some(history) = history {
        let thumb = thumbnail::make_thumbnail(&bytes);
        if let Some(item) = history.save(analysis_type.as_str(), &result, thumb) {
            info!(id = %item.id, "Recorded analysis in history.");
            println!("\nSaved to history as {}", item.id);
        }
    }
    Ok(())
}

fn run_history(history: HistoryCache, action: HistoryAction) -> Result<()> {
    match action {
        HistoryAction::List => {
            let items = history.get_all();
            if items.is_empty() {
                println!("No analyses in history.");
            } else {
                print!("{}", render::render_history_list(&items));
            }
        }
        HistoryAction::Show { id } => match history.get_by_id(&id) {
            Some(item) => print!("{}", render::render_history_item(&item)),
            None => bail!("no history entry with id {}", id),
        },
        HistoryAction::Delete { id } => {
            history.delete_by_id(&id);
            println!("Deleted {}", id);
        }
        HistoryAction::Clear => {
            history.clear();
            println!("History cleared.");
        }
        HistoryAction::Export { out } => {
            let export = history.export()?;
            std::fs::create_dir_all(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            let path = out.join(&export.file_name);
            std::fs::write(&path, export.contents)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Exported history to {}", path.display());
        }
    }
    Ok(())
}
