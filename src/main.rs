use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;

use authoring::config::Config;
use authoring::fetch::{FetchStatus, PageView, RetryConfig, StatusTransition};
use authoring::flags::WaffleFlag;
use authoring::session::AuthoringSession;

mod cli;

use cli::Cli;
use cli::commands::Commands;

fn setup_logging(default_level: &str) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("authoring")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("authoring.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, session: &AuthoringSession) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
        watch_transitions(session);
    }

    match &cli.command {
        Commands::Course { id, no_retry } => handle_course_command(session, id, *no_retry).await,
        Commands::Flags { course, json } => handle_flags_command(session, course.as_deref(), *json).await,
        Commands::Apps { id } => handle_apps_command(session, id).await,
        Commands::AppToggle { course, app, enable, .. } => handle_app_toggle_command(session, course, app, *enable).await,
    }
}

/// Print every status transition while the command runs
fn watch_transitions(session: &AuthoringSession) {
    let mut events = session.subscribe();
    tokio::spawn(async move {
        while let Some(line) = transition_line(events.recv().await) {
            println!("  {} {}", "status".dimmed(), line);
        }
    });
}

/// Render one received transition; `None` once the board is gone.
/// A lagging watcher reports the gap and keeps going.
fn transition_line(received: std::result::Result<StatusTransition, RecvError>) -> Option<String> {
    match received {
        Ok(event) => Some(format!("{} {}: {} -> {}", event.kind, event.key, event.from, event.to)),
        Err(RecvError::Lagged(skipped)) => {
            log::warn!("Status watcher lagged, skipped {} transitions", skipped);
            Some(format!("skipped {} transitions", skipped))
        }
        Err(RecvError::Closed) => None,
    }
}

fn status_label(status: FetchStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        FetchStatus::Successful => label.green(),
        FetchStatus::InProgress | FetchStatus::Pending => label.cyan(),
        FetchStatus::NotFound | FetchStatus::Denied => label.yellow(),
        FetchStatus::Failed => label.red(),
    }
}

async fn handle_course_command(session: &AuthoringSession, id: &str, no_retry: bool) -> Result<()> {
    info!("Fetching course detail: {} (no_retry: {})", id, no_retry);
    println!("{} {}", "Fetching course:".green(), id);

    let status = if no_retry {
        session.fetch_course_detail_with(id, &RetryConfig::disabled()).await
    } else {
        session.fetch_course_detail(id).await
    }
    .context(format!("Failed to fetch course {}", id))?;

    println!("  Status: {}", status_label(status));
    match status.page_view() {
        PageView::NotFound => println!("  {}", "Course not found".yellow()),
        PageView::PermissionDenied => println!("  {}", "Permission denied".yellow()),
        PageView::Loading => {}
        PageView::Content => {
            if let Some(entry) = session.course(id) {
                println!("  Name: {}", entry.course.name.bold());
                if let Some(start) = entry.course.start {
                    println!("  Start: {}", start);
                }
                if let Some(pacing) = &entry.course.pacing {
                    println!("  Pacing: {}", pacing);
                }
                println!("  Can change providers: {}", entry.can_change_providers);
            }
        }
    }
    Ok(())
}

async fn handle_flags_command(session: &AuthoringSession, course: Option<&str>, json: bool) -> Result<()> {
    info!("Resolving waffle flags: {:?}", course);

    let resolution = session.load_flags(course).await;

    if json {
        let output = serde_json::to_string_pretty(&resolution.flags).context("Failed to serialize flags")?;
        println!("{}", output);
        return Ok(());
    }

    println!("{} {}", "Waffle flags:".green(), course.unwrap_or("global"));
    if resolution.is_error {
        println!("  {}", "Flag request failed, showing defaults".yellow());
    }
    for flag in WaffleFlag::ALL {
        let value = if resolution.is_enabled(*flag) {
            "on".green()
        } else {
            "off".dimmed()
        };
        println!("  {:<48} {}", flag.name(), value);
    }
    Ok(())
}

async fn handle_apps_command(session: &AuthoringSession, id: &str) -> Result<()> {
    info!("Listing course apps: {}", id);
    println!("{} {}", "Course apps:".green(), id);

    let status = session
        .fetch_course_apps(id)
        .await
        .context(format!("Failed to fetch apps for {}", id))?;

    if status != FetchStatus::Successful {
        println!("  Status: {}", status_label(status));
        return Ok(());
    }

    let apps = session.store().course_apps(id).unwrap_or_default();
    if apps.is_empty() {
        println!("  (no apps)");
    }
    for app in apps.iter() {
        let state = if app.enabled { "enabled".green() } else { "disabled".dimmed() };
        let lock = if app.can_toggle() { "" } else { " (locked)" };
        println!("  {:<24} {}{}", app.id, state, lock);
    }
    Ok(())
}

async fn handle_app_toggle_command(session: &AuthoringSession, course: &str, app: &str, enable: bool) -> Result<()> {
    info!("Updating course app {} in {}: enabled={}", app, course, enable);
    let verb = if enable { "Enabling:".green() } else { "Disabling:".yellow() };
    println!("{} {} ({})", verb, app, course);

    let status = session
        .update_course_app(course, app, enable)
        .await
        .context(format!("Failed to update app {} for {}", app, course))?;

    println!("  Status: {}", status_label(status));
    if status == FetchStatus::Successful {
        if let Some(updated) = session.store().course_app(course, app) {
            println!("  Enabled: {}", updated.enabled);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    let level = if cli.is_verbose() {
        "debug".to_string()
    } else {
        config.log_level.clone().unwrap_or_else(|| "info".to_string())
    };
    setup_logging(&level).context("Failed to setup logging")?;
    info!("Starting with config from: {:?}", cli.config);

    let session = AuthoringSession::new(&config).context("Failed to create session")?;

    // Run the main application logic
    run_application(&cli, &session).await.context("Application failed")?;

    Ok(())
}
