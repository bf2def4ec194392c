//! Bus Stop Occupancy Dashboard
//!
//! Terminal front-end over the refresh scheduler: renders every published
//! snapshot and turns stdin lines into interval changes and reloads.

use std::error::Error;
use std::io::Write;

use occupancy_fetcher::BackendClient;
use refresh_scheduler::{DashboardHandle, RefreshInterval};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod settings;
pub mod render;

pub use settings::{ConfigError, DashboardConfig, LoggingConfig};

const CLEAR_SCREEN: &str = "\x1B[2J\x1B[H";

/// A line typed by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    SelectInterval(RefreshInterval),
    Reload,
    Quit,
}

/// Parse one stdin line
pub fn parse_command(line: &str) -> Option<UserCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "r" | "reload" => Some(UserCommand::Reload),
        "q" | "quit" | "exit" => Some(UserCommand::Quit),
        other => other.parse().ok().map(UserCommand::SelectInterval),
    }
}

/// Initialize logging
///
/// Logs go to stderr so they do not interleave with the rendered screen.
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn Error>> {
    let level: Level = config.level.parse()?;

    if config.json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .with_writer(std::io::stderr)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

/// Run the dashboard until the user quits, stdin closes or Ctrl-C
pub async fn run(config: DashboardConfig) -> Result<(), Box<dyn Error>> {
    let client = BackendClient::new(config.backend.clone())?;
    let handle = refresh_scheduler::spawn(client, config.driver_config());
    info!("Dashboard started against table {}", config.backend.table);

    let result = event_loop(&handle).await;
    handle.shutdown().await?;
    result
}

async fn event_loop(handle: &DashboardHandle) -> Result<(), Box<dyn Error>> {
    let mut snapshots = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    draw(&render::render(&snapshots.borrow_and_update()))?;

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    warn!("Refresh driver stopped unexpectedly");
                    break;
                }
                let screen = render::render(&snapshots.borrow_and_update());
                draw(&screen)?;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("Input closed, exiting");
                    break;
                };
                match parse_command(&line) {
                    Some(UserCommand::SelectInterval(interval)) => handle.select_interval(interval).await?,
                    Some(UserCommand::Reload) => {
                        if !handle.reload().await? {
                            info!("Reload ignored, a fetch is already running");
                        }
                    }
                    Some(UserCommand::Quit) => break,
                    None => warn!("Unknown command: {:?}", line.trim()),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, exiting");
                break;
            }
        }
    }

    Ok(())
}

fn draw(screen: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}{}", CLEAR_SCREEN, screen)?;
    stdout.flush()
}
