//! Per-turn control flow.
//!
//! `Idle -> Sending -> (Resolved | Errored) -> Idle`. A turn is classified,
//! answered locally when it can be, and otherwise sent to the model. Failures
//! become bot turns; only blank input is reported to the caller as an error.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::error::{Result, SaathiError};
use crate::geolocation::{GeolocationCoordinator, LocationState};
use crate::intent::{Intent, IntentClassifier};
use crate::models::{Language, Transcript, Turn};
use crate::prompt::{self, ENABLE_LOCATION_REPLY, Prompt};
use crate::transport::InferenceClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialoguePhase {
    #[default]
    Idle,
    Sending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    Resolved,
    Errored,
}

/// Summary of one processed turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnOutcome {
    pub intent: Intent,
    pub status: TurnStatus,
    pub remote_call: bool,
    pub location_requested: bool,
}

/// Puts the phase back to `Idle` however the turn ends.
struct SendingGuard(Arc<watch::Sender<DialoguePhase>>);

impl SendingGuard {
    fn enter(phase: &Arc<watch::Sender<DialoguePhase>>) -> Self {
        phase.send_replace(DialoguePhase::Sending);
        Self(Arc::clone(phase))
    }
}

impl Drop for SendingGuard {
    fn drop(&mut self) {
        self.0.send_replace(DialoguePhase::Idle);
    }
}

pub struct DialogueCoordinator {
    classifier: IntentClassifier,
    client: Arc<dyn InferenceClient>,
    geo: GeolocationCoordinator,
    language: Language,
    transcript: Transcript,
    phase: Arc<watch::Sender<DialoguePhase>>,
    await_pending: Option<Duration>,
}

impl DialogueCoordinator {
    pub fn new(
        classifier: IntentClassifier,
        client: Arc<dyn InferenceClient>,
        geo: GeolocationCoordinator,
        language: Language,
    ) -> Self {
        let (phase, _rx) = watch::channel(DialoguePhase::Idle);
        Self {
            classifier,
            client,
            geo,
            language,
            transcript: Transcript::new(),
            phase: Arc::new(phase),
            await_pending: None,
        }
    }

    /// Let price turns wait up to `wait` for a location request that is
    /// still in flight.
    pub fn with_await_pending(mut self, wait: Option<Duration>) -> Self {
        self.await_pending = wait;
        self
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn set_language(&mut self, language: Language) {
        tracing::info!("Display language set to {}", language);
        self.language = language;
    }

    pub fn geolocation(&self) -> &GeolocationCoordinator {
        &self.geo
    }

    pub fn request_location(&self) -> bool {
        self.geo.request_location()
    }

    pub fn clear_location(&self) {
        self.geo.clear_location();
    }

    pub fn phase(&self) -> DialoguePhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<DialoguePhase> {
        self.phase.subscribe()
    }

    /// Process one user submission.
    ///
    /// Blank input is rejected with [`SaathiError::EmptyInput`] and leaves the
    /// transcript untouched. Anything else appends the user turn followed by
    /// exactly one bot turn.
    pub async fn submit(&mut self, input: &str) -> Result<TurnOutcome> {
        if input.trim().is_empty() {
            tracing::debug!("Ignoring empty input");
            return Err(SaathiError::EmptyInput);
        }

        self.transcript.push(Turn::user(input));
        let _sending = SendingGuard::enter(&self.phase);
        Ok(self.run_turn(input).await)
    }

    async fn run_turn(&mut self, input: &str) -> TurnOutcome {
        let intent = self.classifier.classify(input);
        tracing::info!(%intent, language = %self.language, "Processing turn");

        let mut snapshot = self.geo.snapshot();
        if intent == Intent::Price && snapshot.state() == LocationState::Requesting {
            if let Some(wait) = self.await_pending {
                snapshot = self.geo.wait_settled(wait).await;
            }
        }

        let mut outcome = TurnOutcome {
            intent,
            status: TurnStatus::Resolved,
            remote_call: false,
            location_requested: false,
        };

        let plan = prompt::build_prompt(
            intent,
            input,
            self.language,
            snapshot.state(),
            snapshot.coordinates(),
        );
        match plan {
            Prompt::Local(reply) => {
                tracing::debug!(state = %snapshot.state(), "Answering location query locally");
                self.transcript.push(Turn::notice(reply));
            }
            Prompt::NeedsLocation => {
                outcome.location_requested = self.geo.request_location();
                self.transcript.push(Turn::notice(ENABLE_LOCATION_REPLY));
            }
            Prompt::Remote(prompt) => {
                outcome.remote_call = true;
                let is_price = intent == Intent::Price;
                let used_location = is_price && snapshot.coordinates().is_some();
                match self.client.infer(&prompt).await {
                    Ok(text) => {
                        self.transcript
                            .push(Turn::answer(text, is_price, used_location));
                    }
                    Err(e) => {
                        tracing::error!("Inference failed: {}", e);
                        self.transcript.push(Turn::error(format!("Error: {e}")));
                        outcome.status = TurnStatus::Errored;
                    }
                }
            }
        }

        outcome
    }
}
