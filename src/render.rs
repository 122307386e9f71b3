//! Terminal rendering of the transcript and location status.
use colored::*;
use regex::Regex;
use std::sync::LazyLock;

use crate::geolocation::{LocationSnapshot, LocationState};
use crate::models::{Language, Turn, TurnKind};

static LIST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s*").expect("list numbering pattern is valid"));

pub const HINT: &str = r#"Try: "Tomato prices near me" or "Best crops for my region""#;

/// Display lines for a turn. Price answers get a 🌱 bullet per line with any
/// list numbering removed.
pub fn turn_lines(turn: &Turn) -> Vec<String> {
    if turn.is_price {
        turn.text
            .split('\n')
            .map(|line| format!("🌱 {}", LIST_NUMBER.replace(line, "")))
            .collect()
    } else {
        turn.text.split('\n').map(str::to_string).collect()
    }
}

/// Label for the location control.
pub fn location_badge(state: LocationState) -> &'static str {
    match state {
        LocationState::Granted => "📍 Location Enabled",
        LocationState::Denied => "Retry Location Access",
        _ => "Enable Local Prices",
    }
}

pub fn print_banner(language: Language) {
    println!("{}", "🌾 Kisan Saathi".bright_green().bold());
    let hint = format!("Language: {language} (/lang to change, /help for commands)");
    println!("{}", hint.as_str().dimmed());
    println!("{}", HINT.dimmed());
}

pub fn print_help() {
    println!("{}", "Commands:".bold());
    println!("  /lang <code>   switch language ({})", language_codes());
    println!("  /location      enable or retry location access");
    println!("  /clear         clear the stored location");
    println!("  /status        show language and location status");
    println!("  /quit          leave");
}

pub fn print_status(language: Language, snapshot: &LocationSnapshot) {
    let badge = location_badge(snapshot.state());
    let badge = match snapshot.state() {
        LocationState::Granted => badge.green(),
        LocationState::Denied => badge.yellow(),
        _ => badge.normal(),
    };
    println!("Language: {}  |  {} ({})", language.display_name().cyan(), badge, snapshot.state());
    if let Some(c) = snapshot.coordinates() {
        let coords = format!("Coordinates: {c}");
        println!("{}", coords.as_str().dimmed());
    }
}

pub fn print_turn(turn: &Turn) {
    let lines = turn_lines(turn);
    match turn.kind {
        TurnKind::User => {
            for line in lines {
                println!("{} {}", "You:".blue().bold(), line);
            }
        }
        TurnKind::Answer => {
            println!("{}", "Saathi:".green().bold());
            for line in lines {
                if turn.is_price {
                    println!("  {}", line.as_str().green());
                } else {
                    println!("  {line}");
                }
            }
            if turn.used_location {
                println!("  {}", "(using your location)".dimmed());
            }
        }
        TurnKind::Notice => {
            for line in lines {
                println!("{} {}", "Saathi:".green().bold(), line.as_str().yellow());
            }
        }
        TurnKind::Error => {
            for line in lines {
                println!("{} {}", "Saathi:".green().bold(), line.as_str().red());
            }
        }
    }
}

pub fn print_typing() {
    println!("{}", "Saathi is typing …".dimmed());
}

fn language_codes() -> String {
    Language::ALL
        .iter()
        .map(|l| format!("{}={}", l.code(), l.display_name()))
        .collect::<Vec<_>>()
        .join(", ")
}
