mod action;
mod app;
mod auth;
mod config;
mod error;
mod event;
mod fetcher;
mod notify;
mod poller;
mod tui;
mod types;
mod ui;
mod zadig;

use std::fs::File;
use std::panic;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::action::Action;
use crate::app::App;
use crate::config::{Config, Overrides};
use crate::event::Event;
use crate::fetcher::ListScope;
use crate::tui::EventHandler;
use crate::zadig::Zadig;

#[derive(Parser, Debug)]
#[command(name = "ztask", version)]
#[command(about = "Watch, launch, and clone Zadig workflow tasks from the terminal")]
struct Cli {
    /// Zadig project key
    #[arg(short, long)]
    project: Option<String>,

    /// Custom workflow key
    #[arg(short, long)]
    workflow: Option<String>,

    /// Zadig server URL, e.g. https://zadig.example.com
    #[arg(long, env = "ZADIG_URL")]
    base_url: Option<String>,

    /// Tasks per page
    #[arg(long)]
    page_size: Option<u32>,

    /// Auto-refresh interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Start with auto-refresh turned off
    #[arg(long, default_value_t = false)]
    no_auto_refresh: bool,

    /// Config file (defaults to <config dir>/ztask/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "ztask=trace"; overrides RUST_LOG
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            base_url: self.base_url.clone(),
            project: self.project.clone(),
            workflow: self.workflow.clone(),
            page_size: self.page_size,
            interval_ms: self.interval_ms,
            no_auto_refresh: self.no_auto_refresh,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    let mut config = Config::load(cli.config.as_deref());
    config.apply(cli.overrides());
    config.validate()?;

    let token = auth::load_token(&config.server)?;
    let zadig = Arc::new(Zadig::new(&config.server.base_url, token)?);

    let scope = ListScope::new(&config.dashboard.project, &config.dashboard.workflow);
    if !scope.is_complete() {
        tracing::warn!(%scope, "project or workflow not set, nothing will be loaded");
    }

    // Set up panic hook to restore terminal
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = tui::restore();
        original_hook(panic_info);
    }));

    let result = run(zadig, scope, config).await;

    tui::restore()?;

    result
}

fn init_logging(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    let file_layer = match &cli.log_file {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(File::create(path)?)),
        ),
        None => None,
    };
    let stderr_layer = file_layer
        .is_none()
        .then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(())
}

async fn run(
    zadig: Arc<Zadig>,
    scope: ListScope,
    config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut terminal = tui::init()?;

    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<Action>();

    let mut app = App::new(zadig, scope, &config.dashboard, action_tx.clone());

    let tick_rate = Duration::from_millis(250);
    let render_rate = Duration::from_millis(16); // ~60fps
    let mut events = EventHandler::new(tick_rate, render_rate);

    loop {
        tokio::select! {
            Some(event) = events.next() => {
                if event.is_quit() {
                    app.tasks.destroy();
                    break;
                }

                match event {
                    Event::Render => {
                        terminal.draw(|frame| ui::render(frame, &app))?;
                    }
                    _ => {
                        let action = app.handle_event(event);
                        if !matches!(action, Action::None) {
                            action_tx.send(action)?;
                        }
                    }
                }
            }
            Some(action) = action_rx.recv() => {
                app.update(action);
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
