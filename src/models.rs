use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Display languages offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "hi")]
    Hindi,
    #[serde(rename = "te")]
    Telugu,
    #[serde(rename = "ta")]
    Tamil,
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "ur")]
    Urdu,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::Hindi,
        Language::Telugu,
        Language::Tamil,
        Language::English,
        Language::Urdu,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Language::Hindi => "hi",
            Language::Telugu => "te",
            Language::Tamil => "ta",
            Language::English => "en",
            Language::Urdu => "ur",
        }
    }

    /// Name used inside prompts and the language picker.
    pub fn display_name(self) -> &'static str {
        match self {
            Language::Hindi => "Hindi",
            Language::Telugu => "Telugu",
            Language::Tamil => "Tamil",
            Language::English => "English",
            Language::Urdu => "Urdu",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Language::ALL
            .into_iter()
            .find(|l| l.code() == wanted || l.display_name().to_lowercase() == wanted)
            .ok_or_else(|| {
                let valid: Vec<&str> = Language::ALL.iter().map(|l| l.code()).collect();
                format!("Unknown language '{s}'. Valid codes: {}", valid.join(", "))
            })
    }
}

/// Device position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    User,
    /// Text returned by the remote model.
    Answer,
    /// Locally produced informational reply.
    Notice,
    Error,
}

/// One message in the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub text: String,
    pub is_bot: bool,
    pub is_price: bool,
    pub used_location: bool,
    pub kind: TurnKind,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(text.into(), TurnKind::User)
    }

    pub fn notice(text: impl Into<String>) -> Self {
        Self::new(text.into(), TurnKind::Notice)
    }

    pub fn answer(text: impl Into<String>, is_price: bool, used_location: bool) -> Self {
        Self {
            is_price,
            used_location,
            ..Self::new(text.into(), TurnKind::Answer)
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(text.into(), TurnKind::Error)
    }

    fn new(text: String, kind: TurnKind) -> Self {
        Self {
            text,
            is_bot: kind != TurnKind::User,
            is_price: false,
            used_location: false,
            kind,
            timestamp: Utc::now(),
        }
    }
}

/// Append-only, in-memory record of a session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Turns appended at or after `index`.
    pub fn since(&self, index: usize) -> &[Turn] {
        self.turns.get(index..).unwrap_or(&[])
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

// Gemini generateContent request format
#[derive(Debug, Serialize, Clone)]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
}

impl GenerateRequest {
    pub fn from_prompt(prompt: &str) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize, Clone)]
pub struct Part {
    pub text: String,
}

// Gemini generateContent response format; every level is optional so a
// partial payload still deserializes.
#[derive(Debug, Deserialize, Default)]
pub struct GenerateResponse {
    pub candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    pub parts: Option<Vec<CandidatePart>>,
}

#[derive(Debug, Deserialize)]
pub struct CandidatePart {
    pub text: Option<String>,
}

impl GenerateResponse {
    /// `candidates[0].content.parts[0].text`, if present.
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .as_ref()?
            .first()?
            .content
            .as_ref()?
            .parts
            .as_ref()?
            .first()?
            .text
            .as_deref()
    }
}
