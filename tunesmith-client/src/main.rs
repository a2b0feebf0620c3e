//! tunesmith - command-line client for music and lyrics generation
//!
//! Stores an API key, submits prompts, polls the resulting tasks and keeps a
//! local task history in the root folder.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tunesmith_client::api::{
    GenerateLyricsRequest, GenerateMusicRequest, MusicModel, TaskResult, TaskStatusReport,
};
use tunesmith_client::{ClientConfig, PollOutcome, Studio, TaskKind, TaskRegistry, TaskStatus};
use tunesmith_common::config::{
    config_file_path, load_toml_config, RootFolderInitializer, RootFolderResolver, TomlConfig,
};
use tunesmith_common::{ApiProvider, FileKeyValueStore};

/// Command-line arguments for tunesmith
#[derive(Parser, Debug)]
#[command(name = "tunesmith")]
#[command(about = "Generate music and lyrics from text prompts")]
#[command(version)]
struct Args {
    /// Folder holding the stored API key and task history
    #[arg(short, long, global = true)]
    root_folder: Option<PathBuf>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Upstream dialect: default or acedata
    #[arg(long, global = true)]
    provider: Option<ApiProvider>,

    /// Upstream base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Delay between status queries
    #[arg(long, global = true)]
    poll_interval_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store an API key
    Login { key: String },

    /// Forget the stored API key
    Logout,

    /// Show the active provider and whether a key is stored
    Whoami,

    /// Generate music from a prompt
    Music {
        prompt: String,
        #[arg(long)]
        style: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        instrumental: bool,
        /// Use style/title as given instead of letting the model choose
        #[arg(long)]
        custom: bool,
        /// V4, V4_5, V4_5PLUS, V4_5ALL or V5
        #[arg(long)]
        model: Option<MusicModel>,
        #[arg(long)]
        callback_url: Option<String>,
        /// Submit and exit without polling
        #[arg(long)]
        no_wait: bool,
    },

    /// Generate lyrics from a prompt
    Lyrics {
        prompt: String,
        #[arg(long)]
        callback_url: Option<String>,
        /// Submit and exit without polling
        #[arg(long)]
        no_wait: bool,
    },

    /// Query a task once
    Status { task_id: String },

    /// Poll a task until it finishes
    Watch { task_id: String },

    /// Show remaining credits
    Credits {
        /// Ignore the cached value
        #[arg(long)]
        force: bool,
    },

    /// Inspect or edit the local task history
    Tasks {
        #[command(subcommand)]
        action: TasksCommand,
    },
}

#[derive(Subcommand, Debug)]
enum TasksCommand {
    /// List tasks, newest first
    List {
        #[arg(long)]
        kind: Option<TaskKind>,
        #[arg(long)]
        status: Option<TaskStatus>,
    },
    /// Remove one task from the history
    Remove { id: String },
    /// Remove every task from the history
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before tracing exists; problems are logged right after init
    let config_path = args.config.clone().or_else(config_file_path);
    let loaded = config_path.as_deref().map(load_toml_config);
    let mut toml_config = match &loaded {
        Some(Ok(config)) => config.clone(),
        _ => TomlConfig::default(),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&toml_config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    debug!(
        "tunesmith v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    if let (Some(path), Some(Err(e))) = (&config_path, &loaded) {
        warn!("Ignoring config file {}: {}. Using defaults.", path.display(), e);
    }

    toml_config
        .apply_env_overrides()
        .context("Invalid environment configuration")?;
    apply_cli_overrides(&mut toml_config, &args)?;

    let root_folder = RootFolderResolver::new("tunesmith")
        .with_toml_config(&toml_config)
        .with_cli_arg(args.root_folder.clone())
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;
    debug!("Root folder: {}", initializer.root_folder().display());

    let tasks_path = initializer.tasks_path();
    let history =
        TaskRegistry::load_or_set_aside(&tasks_path).context("Failed to read task history")?;

    let storage = Arc::new(FileKeyValueStore::new(initializer.credentials_path()));
    let studio = Studio::new(ClientConfig::from_toml(&toml_config), storage)
        .context("Failed to initialize API client")?
        .with_registry(history);

    let result = run(&studio, args.command).await;
    save_history(&studio, &tasks_path);
    result
}

fn apply_cli_overrides(config: &mut TomlConfig, args: &Args) -> Result<()> {
    if let Some(provider) = args.provider {
        config.api.provider = provider;
    }
    if let Some(base_url) = &args.base_url {
        config.api.base_url = Some(base_url.clone());
    }
    if let Some(interval) = args.poll_interval_ms {
        if interval == 0 {
            bail!("--poll-interval-ms must be greater than zero");
        }
        config.polling.interval_ms = interval;
    }
    Ok(())
}

async fn run(studio: &Studio, command: Command) -> Result<()> {
    match command {
        Command::Login { key } => {
            if !studio.auth().login(&key).context("Failed to store API key")? {
                bail!("API key must not be empty");
            }
            println!("API key saved.");
        }
        Command::Logout => {
            studio.auth().logout().context("Failed to clear API key")?;
            println!("API key cleared.");
        }
        Command::Whoami => {
            println!("Provider: {}", studio.provider());
            println!("Base URL: {}", studio.config().base_url);
            match studio.auth().api_key() {
                Some(key) => println!("API key:  {}", mask_key(&key)),
                None => println!("API key:  not set (run `tunesmith login <key>`)"),
            }
        }
        Command::Music {
            prompt,
            style,
            title,
            instrumental,
            custom,
            model,
            callback_url,
            no_wait,
        } => {
            let request = GenerateMusicRequest {
                custom_mode: custom.then_some(true),
                style,
                title,
                instrumental: instrumental.then_some(true),
                model,
                callback_url,
                ..GenerateMusicRequest::new(prompt)
            };
            let task_id = studio
                .submit_music(&request)
                .await
                .context("Music generation request failed")?;
            println!("Submitted music task {}", task_id);
            if !no_wait {
                wait_for(studio, &task_id).await?;
            }
        }
        Command::Lyrics {
            prompt,
            callback_url,
            no_wait,
        } => {
            let request = GenerateLyricsRequest {
                callback_url,
                ..GenerateLyricsRequest::new(prompt)
            };
            let task_id = studio
                .submit_lyrics(&request)
                .await
                .context("Lyrics generation request failed")?;
            println!("Submitted lyrics task {}", task_id);
            if !no_wait {
                wait_for(studio, &task_id).await?;
            }
        }
        Command::Status { task_id } => {
            let report = studio
                .check_status(&task_id)
                .await
                .context("Status query failed")?;
            print_report(&task_id, &report);
        }
        Command::Watch { task_id } => {
            wait_for(studio, &task_id).await?;
        }
        Command::Credits { force } => match studio.credits(force).await {
            Some(credits) => println!("Remaining credits: {}", credits),
            None => match studio.credits_error().await {
                Some(e) => bail!("Credits lookup failed: {}", e),
                None => bail!("Not authenticated: run `tunesmith login <key>` first"),
            },
        },
        Command::Tasks { action } => run_tasks(studio, action),
    }
    Ok(())
}

fn run_tasks(studio: &Studio, action: TasksCommand) {
    match action {
        TasksCommand::List { kind, status } => {
            let tasks: Vec<_> = studio
                .tasks()
                .into_iter()
                .filter(|t| kind.map_or(true, |k| t.kind == k))
                .filter(|t| status.map_or(true, |s| t.status == s))
                .collect();

            if tasks.is_empty() {
                println!("No tasks.");
            }
            for task in tasks {
                println!(
                    "{}  {:<6}  {:<7}  {}  {}",
                    task.id,
                    task.kind,
                    task.status,
                    task.created_at.format("%Y-%m-%d %H:%M"),
                    truncate(&task.prompt, 48)
                );
                if let Some(error) = &task.error {
                    println!("    error: {}", error);
                }
            }
        }
        TasksCommand::Remove { id } => {
            if studio.remove_task(&id) {
                println!("Removed {}", id);
            } else {
                println!("No task {}", id);
            }
        }
        TasksCommand::Clear => {
            studio.clear_tasks();
            println!("Task history cleared.");
        }
    }
}

/// Poll until the task finishes or the user interrupts
async fn wait_for(studio: &Studio, task_id: &str) -> Result<()> {
    let Some(outcome_rx) = studio.track(task_id) else {
        bail!("Another task is already being polled");
    };

    println!(
        "Waiting for {} (checking every {}s, Ctrl+C to stop)...",
        task_id,
        studio.config().poll_interval.as_secs_f32()
    );

    tokio::select! {
        outcome = outcome_rx => {
            let outcome = outcome.context("Polling ended without an outcome")?;
            print_outcome(task_id, &outcome);
            if outcome.status == TaskStatus::Failed {
                bail!("Task {} failed", task_id);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            studio.stop_polling();
            info!(task_id, "Polling interrupted");
            println!("Stopped watching. Resume with `tunesmith watch {}`.", task_id);
        }
    }
    Ok(())
}

fn print_outcome(task_id: &str, outcome: &PollOutcome) {
    println!("Task {}: {}", task_id, outcome.status);
    if let Some(error) = &outcome.error {
        println!("  error: {}", error);
    }
    if let Some(result) = &outcome.result {
        print_result(result);
    }
}

fn print_report(task_id: &str, report: &TaskStatusReport) {
    match report.status {
        Some(status) => println!("Task {}: {}", task_id, status),
        None => println!("Task {}: status unavailable", task_id),
    }
    if let Some(error) = &report.error {
        println!("  error: {}", error);
    }
    if let Some(result) = &report.result {
        print_result(result);
    }
}

fn print_result(result: &TaskResult) {
    match result {
        TaskResult::Audio(tracks) => {
            for track in tracks {
                println!(
                    "  - {} ({}) {}",
                    if track.title.is_empty() { "untitled" } else { track.title.as_str() },
                    format_duration(track.duration),
                    track.audio_url
                );
                if let Some(tags) = &track.tags {
                    println!("    tags: {}", tags);
                }
            }
        }
        TaskResult::Lyrics(sheets) => {
            for sheet in sheets {
                if let Some(title) = &sheet.title {
                    println!("  == {} ==", title);
                }
                for line in sheet.text.lines() {
                    println!("  {}", line);
                }
                println!();
            }
        }
    }
}

fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.round() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

fn mask_key(key: &str) -> String {
    let visible: String = key.chars().take(4).collect();
    format!("{}****", visible)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", head)
}

fn save_history(studio: &Studio, path: &Path) {
    let registry = studio.registry();
    let snapshot = tunesmith_client::studio::lock_registry(&registry).clone();
    if let Err(e) = snapshot.save(path) {
        warn!("Could not save task history to {}: {}", path.display(), e);
    }
}
