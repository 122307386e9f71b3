pub mod config;
pub mod dialogue;
pub mod error;
pub mod geolocation;
pub mod intent;
pub mod models;
pub mod prompt;
pub mod render;
pub mod transport;

use std::sync::Arc;

use crate::config::{Config, GeoProviderKind};
use crate::dialogue::DialogueCoordinator;
use crate::error::Result;
use crate::geolocation::{GeoProvider, GeolocationCoordinator, StaticGeoProvider, UnsupportedGeoProvider};
use crate::intent::IntentClassifier;
use crate::transport::{GeminiClient, InferenceClient};

pub use crate::dialogue::{DialoguePhase, TurnOutcome, TurnStatus};
pub use crate::error::SaathiError;
pub use crate::intent::Intent;
pub use crate::models::{Coordinates, Language, Transcript, Turn};

/// Build a coordinator wired to the Gemini API from configuration.
pub fn build_coordinator(cfg: &Config) -> Result<DialogueCoordinator> {
    let client = GeminiClient::with_base_url(
        cfg.gemini.api_key.clone(),
        cfg.gemini.model.clone(),
        cfg.request_timeout(),
        &cfg.gemini.base_url,
    )?;
    build_coordinator_with_client(cfg, Arc::new(client))
}

/// Same as [`build_coordinator`] with a caller-supplied inference client.
pub fn build_coordinator_with_client(
    cfg: &Config,
    client: Arc<dyn InferenceClient>,
) -> Result<DialogueCoordinator> {
    let classifier = match &cfg.dialogue.intents_path {
        Some(path) => {
            tracing::info!("Loading intent table from {}", path);
            IntentClassifier::from_path(path)?
        }
        None => IntentClassifier::builtin()?,
    };

    let provider: Arc<dyn GeoProvider> = match cfg.geolocation.provider {
        GeoProviderKind::Static => Arc::new(StaticGeoProvider::new(cfg.coordinates())),
        GeoProviderKind::None => Arc::new(UnsupportedGeoProvider),
    };
    let geo = GeolocationCoordinator::new(provider, cfg.geo_timeout());

    Ok(
        DialogueCoordinator::new(classifier, client, geo, cfg.language())
            .with_await_pending(cfg.geo_await_pending()),
    )
}
