use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use kisan_saathi::config::Config;
use kisan_saathi::dialogue::{DialogueCoordinator, DialoguePhase};
use kisan_saathi::render;
use kisan_saathi::{Language, SaathiError, build_coordinator};

#[derive(Parser)]
#[command(name = "kisan-saathi")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML config file
    #[arg(short, long, env = "KISAN_CONFIG_PATH", default_value = "kisan.yaml")]
    config: String,

    /// Display language code (hi, te, ta, en, ur)
    #[arg(short, long)]
    language: Option<String>,

    /// Device latitude for local prices
    #[arg(long, allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Device longitude for local prices
    #[arg(long, allow_hyphen_values = true)]
    lng: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so the chat on stdout stays readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load_from(&cli.config);
    config.apply_flag_overrides(cli.language, cli.lat, cli.lng);
    if config.gemini.api_key.trim().is_empty() {
        anyhow::bail!("GEMINI_API_KEY is not set (environment, .env or config file)");
    }

    let mut dialogue = build_coordinator(&config).context("Failed to start the assistant")?;
    render::print_banner(dialogue.language());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if let Some(command) = line.strip_prefix('/') {
            if !handle_command(&mut dialogue, command) {
                break;
            }
            continue;
        }

        let before = dialogue.transcript().len();
        let typing = spawn_typing_indicator(&dialogue);
        let result = dialogue.submit(line).await;
        typing.abort();

        match result {
            Ok(outcome) => {
                tracing::debug!(?outcome, "Turn finished");
                dialogue
                    .transcript()
                    .since(before)
                    .iter()
                    .filter(|turn| turn.is_bot)
                    .for_each(render::print_turn);
            }
            Err(SaathiError::EmptyInput) => {}
            Err(e) => eprintln!("{e}"),
        }
    }

    tracing::info!("Session ended");
    Ok(())
}

/// Returns `false` when the session should end.
fn handle_command(dialogue: &mut DialogueCoordinator, command: &str) -> bool {
    let mut parts = command.split_whitespace();
    match parts.next().unwrap_or_default() {
        "quit" | "exit" => return false,
        "help" => render::print_help(),
        "lang" => match parts.next().map(str::parse::<Language>) {
            Some(Ok(language)) => {
                dialogue.set_language(language);
                println!("Language: {language}");
            }
            Some(Err(e)) => println!("{e}"),
            None => println!("Language: {}", dialogue.language()),
        },
        "location" => {
            dialogue.request_location();
            render::print_status(dialogue.language(), &dialogue.geolocation().snapshot());
        }
        "clear" => {
            dialogue.clear_location();
            render::print_status(dialogue.language(), &dialogue.geolocation().snapshot());
        }
        "status" => render::print_status(dialogue.language(), &dialogue.geolocation().snapshot()),
        other => println!("Unknown command '/{other}'. Type /help for commands."),
    }
    true
}

/// Prints a typing notice if the turn is still in flight after a moment.
fn spawn_typing_indicator(dialogue: &DialogueCoordinator) -> tokio::task::JoinHandle<()> {
    let mut phase = dialogue.subscribe_phase();
    tokio::spawn(async move {
        let started = phase
            .wait_for(|p| *p == DialoguePhase::Sending)
            .await
            .is_ok();
        if !started {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(400)).await;
        if *phase.borrow() == DialoguePhase::Sending {
            render::print_typing();
        }
    })
}
