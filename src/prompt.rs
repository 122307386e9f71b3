//! Prompt composition.
//!
//! Everything here is pure. Deciding that a location request is needed is
//! separate from performing it, which is the dialogue coordinator's job.

use crate::geolocation::LocationState;
use crate::intent::Intent;
use crate::models::{Coordinates, Language};

pub const LOCATION_GRANTED_REPLY: &str =
    "I am using your location to provide accurate local prices 🌍";
pub const LOCATION_DENIED_REPLY: &str = "Location access denied. Showing general market prices 🔒";
pub const LOCATION_UNSUPPORTED_REPLY: &str = "Browser does not support location services 🌐";
pub const LOCATION_UNREQUESTED_REPLY: &str =
    "Location not requested yet. Prices are national averages 📊";
pub const ENABLE_LOCATION_REPLY: &str = "📍 Enable location access for accurate local prices";

const NATIONAL_AVERAGE_DIRECTIVE: &str = "No location available. Provide national average prices. ";

/// What a turn should do after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    /// Answer locally with a canned reply; no remote call.
    Local(&'static str),
    /// Ask the user to enable location; no remote call this turn.
    NeedsLocation,
    /// Send this instruction to the model.
    Remote(String),
}

/// Canned reply for a "where am I" question, keyed on the location state.
pub fn location_reply(state: LocationState) -> &'static str {
    match state {
        LocationState::Granted => LOCATION_GRANTED_REPLY,
        LocationState::Denied => LOCATION_DENIED_REPLY,
        LocationState::Unsupported => LOCATION_UNSUPPORTED_REPLY,
        LocationState::Unrequested | LocationState::Requesting => LOCATION_UNREQUESTED_REPLY,
    }
}

/// A price question without coordinates prompts for location unless the
/// user has already refused.
pub fn needs_location_prompt(state: LocationState, coordinates: Option<Coordinates>) -> bool {
    coordinates.is_none() && state != LocationState::Denied
}

pub fn build_price_prompt(
    user_text: &str,
    language: Language,
    coordinates: Option<Coordinates>,
) -> String {
    let location_context = match coordinates {
        Some(c) => format!("User Coordinates: {},{}. ", c.lat, c.lng),
        None => NATIONAL_AVERAGE_DIRECTIVE.to_string(),
    };
    format!(
        "{location_context}Provide current market prices in {language} for: \"{user_text}\". \
         Include exact numbers, sources, market context, and price trends."
    )
}

pub fn build_general_prompt(user_text: &str, language: Language) -> String {
    format!(
        "Act as agricultural expert in {language}. Respond to: \"{user_text}\". \
         Include practical, safety-aware, location-aware solutions."
    )
}

pub fn build_prompt(
    intent: Intent,
    user_text: &str,
    language: Language,
    state: LocationState,
    coordinates: Option<Coordinates>,
) -> Prompt {
    match intent {
        Intent::Location => Prompt::Local(location_reply(state)),
        Intent::Price if needs_location_prompt(state, coordinates) => Prompt::NeedsLocation,
        Intent::Price => Prompt::Remote(build_price_prompt(user_text, language, coordinates)),
        Intent::General => Prompt::Remote(build_general_prompt(user_text, language)),
    }
}
