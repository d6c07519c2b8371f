//! timekeeper - countdown timer, stopwatch and Pomodoro cycle
//!
//! A background daemon keeps time while no terminal is open:
//! - `timer`: counts down and notifies when it reaches zero
//! - `stopwatch`: counts up across pauses
//! - `pomodoro`: 25 minutes of work, 5 minutes of break, a long break after 4

use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser};

use timekeeper::cli::{
    Cli, Commands, Display, DisplayPoller, IpcClient, PomodoroAction, StopwatchAction,
    TimerAction,
};
use timekeeper::daemon::{self, Clock, SystemClock};
use timekeeper::notification::{DesktopNotifier, Notifier};
use timekeeper::Config;

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_tracing(cli.verbose, matches!(cli.command, Some(Commands::Daemon { .. })));

    // Execute command
    if let Err(e) = execute(cli).await {
        Display::show_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber for logging.
///
/// `RUST_LOG` wins; otherwise `debug` with `--verbose`, `info` for the
/// daemon and `warn` for everything else.
fn init_tracing(verbose: bool, daemon: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose {
        "debug"
    } else if daemon {
        "info"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    let config = Config::resolve(cli.data_dir.clone())?;
    tracing::debug!("data dir: {:?}", config.data_dir());

    let now = || SystemClock.now_ms();

    match cli.command {
        Some(Commands::Timer { action }) => {
            let client = IpcClient::new(&config);
            let response = match action {
                TimerAction::Start { seconds } => client.start_timer(seconds).await?,
                TimerAction::Pause => client.pause_timer().await?,
                TimerAction::Reset => client.reset_timer().await?,
            };
            Display::show_timer(&response, now());
        }
        Some(Commands::Stopwatch { action }) => {
            let client = IpcClient::new(&config);
            let response = match action {
                StopwatchAction::Start => client.start_stopwatch().await?,
                StopwatchAction::Pause => client.pause_stopwatch().await?,
                StopwatchAction::Reset => client.reset_stopwatch().await?,
            };
            Display::show_stopwatch(&response, now());
        }
        Some(Commands::Pomodoro { action }) => {
            let client = IpcClient::new(&config);
            match action {
                PomodoroAction::Start => {
                    Display::show_pomodoro(&client.start_pomodoro().await?, now());
                }
                PomodoroAction::Pause => {
                    Display::show_pomodoro(&client.pause_pomodoro().await?, now());
                }
                PomodoroAction::Reset => {
                    Display::show_pomodoro(&client.reset_pomodoro().await?, now());
                }
                PomodoroAction::Settings(args) => {
                    let current = client.status().await?;
                    if args.is_empty() {
                        Display::show_settings(&current);
                    } else {
                        let base = current.data.unwrap_or_default().pomodoro_settings;
                        let response = client.update_pomodoro_settings(args.merge(base)).await?;
                        Display::show_settings(&response);
                    }
                }
            }
        }
        Some(Commands::Status) => {
            let client = IpcClient::new(&config);
            let response = client.status().await?;
            Display::show_status(&response, now());
        }
        Some(Commands::Watch(args)) => {
            let poller = DisplayPoller::new(&config, args.mode);
            let mut stdout = std::io::stdout();
            if args.once {
                poller.print_once(&mut stdout)?;
            } else {
                poller.run(&mut stdout).await?;
            }
        }
        Some(Commands::Pin { mode }) => {
            let client = IpcClient::new(&config);
            Display::show_pinned(&client.set_pinned_mode(mode).await?);
        }
        Some(Commands::Events) => {
            let client = IpcClient::new(&config);
            let mut events = client.subscribe().await?;
            while let Some(event) = events.next_event().await? {
                Display::show_event(&event);
            }
        }
        Some(Commands::Daemon { no_notify }) => {
            let notifier: Arc<dyn Notifier> = if no_notify {
                Arc::new(DesktopNotifier::disabled())
            } else {
                Arc::new(DesktopNotifier::new())
            };
            daemon::run(&config, notifier).await?;
        }
        Some(Commands::Completions { shell }) => {
            generate_completions(shell);
        }
        None => {
            // No command provided, show help
            Cli::command().print_help()?;
        }
    }

    Ok(())
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}
