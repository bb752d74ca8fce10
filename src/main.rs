use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use researchai_client::account::{self, LoginForm, SignupForm};
use researchai_client::config::{self, AppConfig};
use researchai_client::terminal::{
    edit_secret, parse_command, Command, SecretKey, TerminalSurface, HELP_TEXT,
};
use researchai_client::wallet::{
    self, Confirmation, HttpWalletProvider, PaymentRequest, SystemOpener, WalletClient,
};
use researchai_client::{ChatSync, ResearchClient};

const LOG_ENV: &str = "RESEARCHAI_LOG";

// --- Command Line ---

/// Terminal client for the ResearchAI chat server.
#[derive(Debug, Parser)]
#[command(name = "researchai", version)]
struct Cli {
    /// Settings file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Server base URL, wins over the settings file and environment
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Chat with the assistant (default)
    Chat {
        /// Go straight to the chat without the login prompt
        #[arg(long)]
        skip_login: bool,
    },
    /// Create an account
    Signup,
    /// Show and open the settings file
    Config,
}

// --- Logging ---

/// Logs go to a daily file so they never interleave with the transcript.
fn setup_logging() -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = config::get_app_data_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create {}", log_dir.display()))?;

    let appender = tracing_appender::rolling::daily(&log_dir, "researchai.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true),
        )
        .init();
    Ok(guard)
}

// --- Prompting ---

/// Shared stdin reader for commands, credentials and payment prompts.
struct Prompt {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl Prompt {
    fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    /// `None` once stdin is closed.
    async fn ask(&self, label: &str) -> Result<Option<String>> {
        print!("{label}");
        std::io::stdout().flush()?;
        Ok(self.lines.lock().await.next_line().await?)
    }

    /// Like [`ask`](Self::ask) but without echo when stdin is a terminal.
    async fn ask_secret(&self, label: &str) -> Result<Option<String>> {
        if !std::io::stdin().is_terminal() {
            return self.ask(label).await;
        }
        let _lines = self.lines.lock().await;
        let label = label.to_string();
        tokio::task::spawn_blocking(move || read_masked(&label)).await?
    }
}

/// Reads keys in raw mode, echoing `*` per character.
fn read_masked(label: &str) -> Result<Option<String>> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{label}")?;
    stdout.flush()?;

    crossterm::terminal::enable_raw_mode()?;
    let mut secret = String::new();
    let outcome = loop {
        let event = match crossterm::event::read() {
            Ok(event) => event,
            Err(e) => break Err(e.into()),
        };
        let crossterm::event::Event::Key(key) = event else {
            continue;
        };
        let echo = match edit_secret(&mut secret, &key) {
            SecretKey::Submit => break Ok(Some(std::mem::take(&mut secret))),
            SecretKey::Cancel => break Ok(None),
            SecretKey::Pushed => "*",
            SecretKey::Popped => "\x08 \x08",
            SecretKey::Ignored => continue,
        };
        if let Err(e) = write!(stdout, "{echo}").and_then(|_| stdout.flush()) {
            break Err(e.into());
        }
    };
    crossterm::terminal::disable_raw_mode()?;
    writeln!(stdout)?;
    outcome
}

#[async_trait]
impl Confirmation for Prompt {
    async fn request_confirmation(&self, request: &PaymentRequest) -> bool {
        let price = request.price.as_deref().unwrap_or("the verification fee");
        let question = format!(
            "Verifying this response costs {price} on {}. Pay with your wallet? [y/N] ",
            request.chain_name
        );
        match self.ask(&question).await {
            Ok(Some(answer)) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Could not read confirmation");
                false
            }
        }
    }
}

// --- Commands ---

async fn login_prompt(client: &ResearchClient, prompt: &Prompt) -> Result<bool> {
    println!("Log in to {}", client.base_url());
    loop {
        let Some(username) = prompt.ask("Username: ").await? else {
            return Ok(false);
        };
        let Some(password) = prompt.ask_secret("Password: ").await? else {
            return Ok(false);
        };
        let outcome = account::login(client, &LoginForm::new(&username, &password)).await;
        println!("{}", outcome.message());
        if outcome.is_accepted() {
            return Ok(true);
        }
    }
}

async fn run_signup(config: &AppConfig) -> Result<()> {
    let client = ResearchClient::new(&config.server)?;
    let prompt = Prompt::new();
    println!("Create an account on {}", client.base_url());
    loop {
        let Some(username) = prompt.ask("Username: ").await? else {
            return Ok(());
        };
        let Some(password) = prompt.ask_secret("Password: ").await? else {
            return Ok(());
        };
        let Some(confirm) = prompt.ask_secret("Confirm password: ").await? else {
            return Ok(());
        };
        let form = SignupForm::new(&username, &password, &confirm);
        let outcome = account::create_account(&client, &form).await;
        println!("{}", outcome.message());
        if outcome.is_accepted() {
            println!("Run `researchai chat` to log in.");
            return Ok(());
        }
    }
}

async fn run_chat(config: AppConfig, skip_login: bool) -> Result<()> {
    let client = ResearchClient::new(&config.server)?;
    match client.ping().await {
        Ok(true) => info!(server = %client.base_url(), "Server is up"),
        Ok(false) => warn!(server = %client.base_url(), "Unexpected ping answer"),
        Err(e) => {
            warn!(error = %e, "Ping failed");
            println!("Server at {} is not answering: {e}", client.base_url());
        }
    }

    let prompt = Prompt::new();
    if !skip_login && !login_prompt(&client, &prompt).await? {
        return Ok(());
    }

    let surface = TerminalSurface::new(std::io::stdout());
    let mut sync = ChatSync::new(client, surface, config.gateway.clone())
        .with_model(config.server.default_model.clone());
    let provider = HttpWalletProvider::new(config.wallet.provider_url.clone());
    let mut wallet = WalletClient::new(provider, config.wallet.clone());

    sync.activate().await;
    sync.surface_mut().line("\nType /help for commands.");

    loop {
        if sync.surface().write_failed() {
            warn!("Terminal output is gone, leaving chat");
            break;
        }
        let label = match sync.surface().status() {
            Some(status) => format!("\n{status}\n> "),
            None => "\n> ".to_string(),
        };
        let Some(line) = prompt.ask(&label).await? else {
            break;
        };
        match parse_command(&line) {
            Command::Empty => {}
            Command::Send(text) => {
                sync.send(&text).await;
            }
            Command::NewSession => {
                sync.new_session().await;
            }
            Command::Sessions => sync.list_sessions().await,
            Command::Open(position) => {
                if !sync.load_selected(position).await {
                    sync.surface_mut()
                        .line(&format!("No session #{position}. Use /sessions to list them."));
                }
            }
            Command::Verify(position) => {
                let Some(handle) = sync.transcript().verify_handle(position).map(str::to_string)
                else {
                    sync.surface_mut()
                        .line(&format!("Message #{position} has no verified copy."));
                    continue;
                };
                let outcome = wallet::verify(
                    &mut wallet,
                    &handle,
                    &config.gateway,
                    &prompt,
                    &SystemOpener,
                    sync.surface_mut(),
                )
                .await;
                info!(?outcome, "Verify finished");
            }
            Command::Model(model) => {
                sync.set_model(model);
                let text = format!("Model: {}", sync.model());
                sync.surface_mut().line(&text);
            }
            Command::Help => sync.surface_mut().line(HELP_TEXT),
            Command::Quit => break,
            Command::Unknown(input) => sync
                .surface_mut()
                .line(&format!("Unknown command '{input}'. Type /help for commands.")),
        }
    }

    wallet.disconnect();
    Ok(())
}

fn show_config(path: &Path) -> Result<()> {
    config::load_or_initialize_config(path)?;
    println!("{}", path.display());
    opener::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _guard = match setup_logging() {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Logging disabled: {e:#}");
            None
        }
    };

    let config_path = match cli.config {
        Some(path) => path,
        None => config::get_app_config_path()?,
    };
    let mut app_config = config::load_or_initialize_config(&config_path)?;
    app_config.apply_env();
    if let Some(server) = cli.server {
        app_config.server.base_url = server;
    }
    info!(path = %config_path.display(), server = %app_config.server.base_url, "Configuration loaded");

    match cli.command.unwrap_or(Commands::Chat { skip_login: false }) {
        Commands::Chat { skip_login } => run_chat(app_config, skip_login).await,
        Commands::Signup => run_signup(&app_config).await,
        Commands::Config => show_config(&config_path),
    }
}
