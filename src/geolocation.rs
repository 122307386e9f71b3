//! Device location: platform providers and the request state machine.
//!
//! `unrequested -> requesting -> granted | denied | unsupported`. A request
//! runs as its own tokio task and never blocks the turn that started it;
//! callers observe the outcome through snapshots or [`GeolocationCoordinator::wait_settled`].

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[cfg(test)]
use mockall::automock;

use crate::error::GeoError;
use crate::models::Coordinates;

pub const DEFAULT_GEO_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationState {
    #[default]
    Unrequested,
    Requesting,
    Granted,
    Denied,
    Unsupported,
}

impl fmt::Display for LocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LocationState::Unrequested => "unrequested",
            LocationState::Requesting => "requesting",
            LocationState::Granted => "granted",
            LocationState::Denied => "denied",
            LocationState::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

/// State plus coordinates. Coordinates are present iff the state is `Granted`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LocationSnapshot {
    state: LocationState,
    coordinates: Option<Coordinates>,
}

impl LocationSnapshot {
    pub fn granted(coordinates: Coordinates) -> Self {
        Self {
            state: LocationState::Granted,
            coordinates: Some(coordinates),
        }
    }

    /// Snapshot for any state other than `Granted`.
    pub fn without_coordinates(state: LocationState) -> Self {
        debug_assert!(state != LocationState::Granted);
        Self {
            state,
            coordinates: None,
        }
    }

    pub fn state(&self) -> LocationState {
        self.state
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        self.coordinates
    }
}

/// Platform capability for reading the device position.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GeoProvider: Send + Sync {
    fn is_supported(&self) -> bool;
    async fn current_position(&self) -> Result<Coordinates, GeoError>;
}

/// Provider backed by fixed coordinates (config file, env or CLI flags).
/// With no coordinates configured every request is refused.
#[derive(Debug, Clone, Default)]
pub struct StaticGeoProvider {
    coordinates: Option<Coordinates>,
}

impl StaticGeoProvider {
    pub fn new(coordinates: Option<Coordinates>) -> Self {
        Self { coordinates }
    }
}

#[async_trait]
impl GeoProvider for StaticGeoProvider {
    fn is_supported(&self) -> bool {
        true
    }

    async fn current_position(&self) -> Result<Coordinates, GeoError> {
        self.coordinates.ok_or_else(|| {
            GeoError::PermissionDenied("no coordinates configured for this device".to_string())
        })
    }
}

/// Provider for platforms without any location capability.
#[derive(Debug, Clone, Default)]
pub struct UnsupportedGeoProvider;

#[async_trait]
impl GeoProvider for UnsupportedGeoProvider {
    fn is_supported(&self) -> bool {
        false
    }

    async fn current_position(&self) -> Result<Coordinates, GeoError> {
        Err(GeoError::Unsupported)
    }
}

pub struct GeolocationCoordinator {
    provider: Arc<dyn GeoProvider>,
    timeout: Duration,
    tx: Arc<watch::Sender<LocationSnapshot>>,
    /// Bumped by every request and every clear. A finished request only
    /// lands if its ticket is still current.
    generation: Arc<AtomicU64>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

/// Store the outcome of request `ticket` unless a later request or a clear
/// has superseded it. Returns whether the snapshot changed.
fn settle(
    tx: &watch::Sender<LocationSnapshot>,
    generation: &AtomicU64,
    ticket: u64,
    next: LocationSnapshot,
) -> bool {
    tx.send_if_modified(|snap| {
        if snap.state != LocationState::Requesting
            || generation.load(Ordering::SeqCst) != ticket
        {
            return false;
        }
        *snap = next;
        true
    })
}

impl GeolocationCoordinator {
    pub fn new(provider: Arc<dyn GeoProvider>, timeout: Duration) -> Self {
        let (tx, _rx) = watch::channel(LocationSnapshot::default());
        Self {
            provider,
            timeout,
            tx: Arc::new(tx),
            generation: Arc::new(AtomicU64::new(0)),
            pending: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> LocationSnapshot {
        *self.tx.borrow()
    }

    pub fn current_state(&self) -> LocationState {
        self.snapshot().state()
    }

    pub fn current_coordinates(&self) -> Option<Coordinates> {
        self.snapshot().coordinates()
    }

    /// Receiver that sees every state change, for renderers.
    pub fn subscribe(&self) -> watch::Receiver<LocationSnapshot> {
        self.tx.subscribe()
    }

    /// Start a location request in the background.
    ///
    /// Returns `true` when a new request was issued. A request already in
    /// flight is left alone. Must be called from within a tokio runtime.
    pub fn request_location(&self) -> bool {
        if !self.provider.is_supported() {
            tracing::warn!("Geolocation requested but the platform has no support");
            self.tx
                .send_replace(LocationSnapshot::without_coordinates(LocationState::Unsupported));
            return false;
        }

        let mut ticket = 0;
        let started = self.tx.send_if_modified(|snap| {
            if snap.state == LocationState::Requesting {
                return false;
            }
            ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *snap = LocationSnapshot::without_coordinates(LocationState::Requesting);
            true
        });
        if !started {
            tracing::debug!("Geolocation request already in flight");
            return false;
        }

        let provider = Arc::clone(&self.provider);
        let tx = Arc::clone(&self.tx);
        let generation = Arc::clone(&self.generation);
        let timeout = self.timeout;
        let handle = tokio::spawn(async move {
            let outcome = match tokio::time::timeout(timeout, provider.current_position()).await {
                Ok(result) => result,
                Err(_) => Err(GeoError::Timeout(timeout)),
            };
            let next = match outcome {
                Ok(coords) => {
                    tracing::info!("Geolocation granted");
                    LocationSnapshot::granted(coords)
                }
                Err(e) => {
                    tracing::warn!("Geolocation error: {}", e);
                    LocationSnapshot::without_coordinates(LocationState::Denied)
                }
            };
            if !settle(&tx, &generation, ticket, next) {
                tracing::debug!("Discarding outcome of superseded location request");
            }
        });

        if let Ok(mut pending) = self.pending.lock() {
            if let Some(previous) = pending.replace(handle) {
                previous.abort();
            }
        }
        true
    }

    /// Drop stored coordinates and go back to `Unrequested`, cancelling any
    /// request in flight.
    pub fn clear_location(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(handle) = pending.take() {
                handle.abort();
            }
        }
        self.tx
            .send_replace(LocationSnapshot::without_coordinates(LocationState::Unrequested));
        tracing::info!("Location cleared");
    }

    /// Wait up to `within` for an in-flight request to finish and return the
    /// snapshot current at that point.
    pub async fn wait_settled(&self, within: Duration) -> LocationSnapshot {
        let mut rx = self.tx.subscribe();
        let settled = tokio::time::timeout(within, async {
            let _ = rx
                .wait_for(|snap| snap.state != LocationState::Requesting)
                .await;
        })
        .await;
        if settled.is_err() {
            tracing::debug!("Geolocation still pending after {:?}", within);
        }
        self.snapshot()
    }
}

impl Drop for GeolocationCoordinator {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(handle) = pending.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FARM: Coordinates = Coordinates {
        lat: 17.385,
        lng: 78.4867,
    };

    struct SlowProvider {
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GeoProvider for SlowProvider {
        fn is_supported(&self) -> bool {
            true
        }

        async fn current_position(&self) -> Result<Coordinates, GeoError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(FARM)
        }
    }

    fn slow(delay_ms: u64) -> Arc<SlowProvider> {
        Arc::new(SlowProvider {
            delay: Duration::from_millis(delay_ms),
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_initial_state_is_unrequested() {
        let geo = GeolocationCoordinator::new(Arc::new(StaticGeoProvider::default()), DEFAULT_GEO_TIMEOUT);
        assert_eq!(geo.current_state(), LocationState::Unrequested);
        assert_eq!(geo.current_coordinates(), None);
    }

    #[tokio::test]
    async fn test_unsupported_platform() {
        let mut provider = MockGeoProvider::new();
        provider.expect_is_supported().return_const(false);
        provider.expect_current_position().never();
        let geo = GeolocationCoordinator::new(Arc::new(provider), DEFAULT_GEO_TIMEOUT);

        assert!(!geo.request_location());
        assert_eq!(geo.current_state(), LocationState::Unsupported);
        assert_eq!(geo.current_coordinates(), None);
    }

    #[tokio::test]
    async fn test_granted_stores_coordinates() {
        let mut provider = MockGeoProvider::new();
        provider.expect_is_supported().return_const(true);
        provider
            .expect_current_position()
            .times(1)
            .returning(|| Ok(FARM));
        let geo = GeolocationCoordinator::new(Arc::new(provider), DEFAULT_GEO_TIMEOUT);

        assert!(geo.request_location());
        assert_eq!(geo.current_state(), LocationState::Requesting);
        let snap = geo.wait_settled(Duration::from_secs(1)).await;
        assert_eq!(snap.state(), LocationState::Granted);
        assert_eq!(snap.coordinates(), Some(FARM));
    }

    #[tokio::test]
    async fn test_provider_error_means_denied() {
        let mut provider = MockGeoProvider::new();
        provider.expect_is_supported().return_const(true);
        provider
            .expect_current_position()
            .returning(|| Err(GeoError::PermissionDenied("user said no".to_string())));
        let geo = GeolocationCoordinator::new(Arc::new(provider), DEFAULT_GEO_TIMEOUT);

        geo.request_location();
        let snap = geo.wait_settled(Duration::from_secs(1)).await;
        assert_eq!(snap.state(), LocationState::Denied);
        assert_eq!(snap.coordinates(), None);
    }

    #[tokio::test]
    async fn test_timeout_means_denied() {
        let geo = GeolocationCoordinator::new(slow(500), Duration::from_millis(20));
        geo.request_location();
        let snap = geo.wait_settled(Duration::from_secs(2)).await;
        assert_eq!(snap.state(), LocationState::Denied);
    }

    #[tokio::test]
    async fn test_second_request_while_in_flight_is_ignored() {
        let provider = slow(50);
        let geo = GeolocationCoordinator::new(provider.clone(), DEFAULT_GEO_TIMEOUT);

        assert!(geo.request_location());
        assert!(!geo.request_location());
        geo.wait_settled(Duration::from_secs(1)).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(geo.current_state(), LocationState::Granted);
    }

    #[tokio::test]
    async fn test_clear_resets_to_unrequested() {
        let geo = GeolocationCoordinator::new(
            Arc::new(StaticGeoProvider::new(Some(FARM))),
            DEFAULT_GEO_TIMEOUT,
        );
        geo.request_location();
        assert_eq!(
            geo.wait_settled(Duration::from_secs(1)).await.state(),
            LocationState::Granted
        );

        geo.clear_location();
        assert_eq!(geo.current_state(), LocationState::Unrequested);
        assert_eq!(geo.current_coordinates(), None);
    }

    #[tokio::test]
    async fn test_clear_cancels_in_flight_request() {
        let geo = GeolocationCoordinator::new(slow(100), DEFAULT_GEO_TIMEOUT);
        geo.request_location();
        geo.clear_location();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(geo.current_state(), LocationState::Unrequested);
    }

    #[tokio::test]
    async fn test_wait_settled_is_bounded() {
        let geo = GeolocationCoordinator::new(slow(500), DEFAULT_GEO_TIMEOUT);
        geo.request_location();
        let snap = geo.wait_settled(Duration::from_millis(10)).await;
        assert_eq!(snap.state(), LocationState::Requesting);
    }

    #[tokio::test]
    async fn test_static_provider_without_coordinates_is_denied() {
        let geo = GeolocationCoordinator::new(Arc::new(StaticGeoProvider::default()), DEFAULT_GEO_TIMEOUT);
        geo.request_location();
        let snap = geo.wait_settled(Duration::from_secs(1)).await;
        assert_eq!(snap.state(), LocationState::Denied);
    }

    #[tokio::test]
    async fn test_superseded_outcome_is_discarded() {
        let geo = GeolocationCoordinator::new(slow(500), DEFAULT_GEO_TIMEOUT);
        assert!(geo.request_location());
        let first = geo.generation.load(Ordering::SeqCst);

        // Clear and request again; the first request's result arrives late.
        geo.clear_location();
        assert!(geo.request_location());
        assert!(!settle(&geo.tx, &geo.generation, first, LocationSnapshot::granted(FARM)));
        assert_eq!(geo.current_state(), LocationState::Requesting);
        assert_eq!(geo.current_coordinates(), None);

        let current = geo.generation.load(Ordering::SeqCst);
        assert!(settle(&geo.tx, &geo.generation, current, LocationSnapshot::granted(FARM)));
        assert_eq!(geo.current_coordinates(), Some(FARM));
    }

    #[tokio::test]
    async fn test_denied_can_be_retried() {
        let provider = Arc::new(SlowProvider {
            delay: Duration::from_millis(0),
            calls: AtomicUsize::new(0),
        });
        let geo = GeolocationCoordinator::new(provider.clone(), DEFAULT_GEO_TIMEOUT);
        geo.tx
            .send_replace(LocationSnapshot::without_coordinates(LocationState::Denied));

        assert!(geo.request_location());
        let snap = geo.wait_settled(Duration::from_secs(1)).await;
        assert_eq!(snap.state(), LocationState::Granted);
    }
}
