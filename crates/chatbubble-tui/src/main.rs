use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chatbubble_core::render::{render_entry, stylesheet};
use chatbubble_core::{ChatWidget, EntryKind, HttpChatClient, WidgetConfig, WidgetState};
use clap::{Parser, Subcommand};
use log::{error, info};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;

const TICK_RATE: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "chatbubble")]
#[command(about = "Floating chat assistant backed by a chat endpoint", version)]
struct Cli {
    /// Chat server base URL (overrides config file and CHATBUBBLE_SERVER)
    #[arg(short, long, global = true)]
    server: Option<String>,

    /// Path to a config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Where the terminal widget writes its log
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the HTML snippet that mounts the widget into a page
    Markup,
    /// Send one message and print the resulting entries as HTML
    Ask {
        /// Your question
        message: String,
    },
    /// Write the effective configuration to the config file
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        None => run_terminal(&cli).await,
        Some(command) => {
            init_stderr_logging();
            match command {
                Commands::Markup => print_markup(&cli),
                Commands::Ask { message } => ask(&cli, message).await,
                Commands::InitConfig => init_config(&cli),
            }
        }
    }
}

fn logger() -> env_logger::Builder {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    builder
}

fn init_stderr_logging() {
    logger().init();
}

/// The terminal owns stderr while the widget is up, so log to a file instead
fn init_file_logging(path: Option<&Path>) {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| dirs::cache_dir().map(|dir| dir.join("chatbubble").join("chatbubble.log")));

    let file = path.and_then(|path| {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok()?;
        }
        OpenOptions::new().create(true).append(true).open(path).ok()
    });

    let mut builder = logger();
    match file {
        Some(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        None => {
            builder.filter_level(log::LevelFilter::Off);
        }
    }
    builder.init();
}

/// Config file (or defaults), then the environment, then `--server`
fn load_config(cli: &Cli) -> Result<WidgetConfig> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => WidgetConfig::config_path()?,
    };
    let mut config = WidgetConfig::load_from(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    config.apply_env_overrides();
    if let Some(server) = &cli.server {
        config.server = server.clone();
    }
    Ok(config)
}

async fn run_terminal(cli: &Cli) -> Result<()> {
    init_file_logging(cli.log_file.as_deref());
    info!("Chat widget: initializing...");

    // A widget that can't be built just doesn't appear
    let mut app = match load_config(cli).and_then(|config| Ok(App::new(config)?)) {
        Ok(app) => app,
        Err(e) => {
            error!("Chat widget startup error: {:#}", e);
            return Ok(());
        }
    };

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new(TICK_RATE);
    info!("Chat widget: loaded successfully");

    let result = run_loop(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn run_loop(terminal: &mut tui::Tui, app: &mut App, events: &mut tui::EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        if let Some(event) = events.next().await {
            handler::handle_event(app, event).await?;
        }
    }
    Ok(())
}

fn print_markup(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let state = WidgetState::new(&config.greeting);
    let mount = chatbubble_core::Mount::new("body", &config, &state)?;
    println!("<style>{}</style>", stylesheet());
    println!("{}", mount.to_html());
    Ok(())
}

async fn ask(cli: &Cli, message: &str) -> Result<()> {
    let config = load_config(cli)?;
    let transport = Arc::new(HttpChatClient::new(&config));
    let mut widget = ChatWidget::mount("stdout", config, transport)?;

    widget.open();
    widget.set_input(message);
    if !widget.submit().await {
        anyhow::bail!("Nothing to send: message is empty");
    }

    for entry in widget.state().transcript.entries() {
        if entry.kind != EntryKind::Greeting {
            println!("{}", render_entry(widget.config(), entry).to_html());
        }
    }
    Ok(())
}

fn init_config(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => WidgetConfig::config_path()?,
    };
    config.save_to(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
