//! View state machine sequencing location, receptacle fetch, marker reconciliation, and overlays.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, warn};

use crate::model::{MapHandle, MarkerHandle, Position, ReceptacleId, ReceptacleRecord, ViewState, Viewer};
use crate::overlay::{OverlayHost, OverlaySession};
use crate::ports::{LocationPort, MapPort, OverlaySurface, ReceptaclePort};
use crate::reconcile::{MarkerClick, MarkerReconciler, ReconcileReport};

/// Container the map is bound to.
pub const MAP_CONTAINER: &str = "map";

/// Message of the prompt shown when the location cannot be acquired.
pub const LOCATION_PROMPT: &str = "Your current location is unavailable while GPS is turned off. \
     Turn GPS on and try again in a moment.";

/// Ports the map view is wired to.
pub struct MapPorts {
    /// Platform geolocation.
    pub location: Arc<dyn LocationPort>,
    /// Receptacle service.
    pub receptacles: Arc<dyn ReceptaclePort>,
    /// Map provider.
    pub map: Box<dyn MapPort>,
    /// Rendering host for overlays.
    pub overlay: Arc<dyn OverlaySurface>,
}

#[derive(Debug, Clone)]
/// Tunables of the map view.
pub struct ViewOptions {
    /// Container id the map is bound to.
    pub container: String,
    /// Only show receptacles within this many metres of the user, when set.
    pub radius_m: Option<f64>,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            container: MAP_CONTAINER.to_owned(),
            radius_m: None,
        }
    }
}

/// Drives the map view from mount to a populated map.
///
/// Every operation takes `&mut self`, so a reconciliation can never start while
/// another one is in progress. Dropping an in-flight [`Self::mount`] or
/// [`Self::refresh`] future cancels it at its pending await; [`Self::unmount`]
/// then discards whatever it had already applied.
pub struct MapViewController {
    location: Arc<dyn LocationPort>,
    receptacles: Arc<dyn ReceptaclePort>,
    map_port: Box<dyn MapPort>,
    options: ViewOptions,
    viewer: Viewer,
    state: ViewState,
    position: Option<Position>,
    map: Option<MapHandle>,
    reconciler: MarkerReconciler,
    overlay: OverlayHost,
    clicks: UnboundedReceiver<MarkerClick>,
    fetch_error: Option<String>,
}

impl MapViewController {
    /// Wire a controller to its ports. Nothing happens until [`Self::mount`].
    #[must_use]
    pub fn new(ports: MapPorts, options: ViewOptions, viewer: Viewer) -> Self {
        let (sender, clicks) = mpsc::unbounded_channel();
        Self {
            location: ports.location,
            receptacles: ports.receptacles,
            map_port: ports.map,
            options,
            viewer,
            state: ViewState::Loading,
            position: None,
            map: None,
            reconciler: MarkerReconciler::new(sender),
            overlay: OverlayHost::new(ports.overlay),
            clicks,
            fetch_error: None,
        }
    }

    /// Current view state.
    #[must_use]
    pub fn state(&self) -> ViewState {
        self.state
    }

    /// Position acquired for this mount.
    #[must_use]
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    /// Handle of the instantiated map.
    #[must_use]
    pub fn map(&self) -> Option<MapHandle> {
        self.map
    }

    /// The prompt to show, when in [`ViewState::LocationError`].
    #[must_use]
    pub fn location_prompt(&self) -> Option<&'static str> {
        (self.state == ViewState::LocationError).then_some(LOCATION_PROMPT)
    }

    /// Error of the last receptacle fetch, kept for a non-blocking notice.
    #[must_use]
    pub fn fetch_error(&self) -> Option<&str> {
        self.fetch_error.as_deref()
    }

    /// Number of receptacle markers on the map.
    #[must_use]
    pub fn marker_count(&self) -> usize {
        self.reconciler.len()
    }

    /// Handle of the marker shown for `id`.
    #[must_use]
    pub fn marker(&self, id: ReceptacleId) -> Option<MarkerHandle> {
        self.reconciler.handle(id)
    }

    /// The open overlay.
    #[must_use]
    pub fn overlay(&self) -> Option<&OverlaySession> {
        self.overlay.session()
    }

    /// Identity used to decide overlay affordances.
    #[must_use]
    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    /// Enter [`ViewState::Loading`] and run acquisition, fetch, and reconciliation.
    pub async fn mount(&mut self) {
        info!("map view mounted");
        self.acquire_and_load().await;
    }

    /// Dismiss the GPS prompt and retry acquisition once.
    ///
    /// Returns `false` without doing anything when no prompt is shown.
    pub async fn dismiss_location_prompt(&mut self) -> bool {
        if self.state != ViewState::LocationError {
            return false;
        }
        debug!("location prompt dismissed; retrying");
        self.acquire_and_load().await;
        true
    }

    /// Fetch the receptacle list again and reconcile the markers.
    ///
    /// Returns `None` when the view is not [`ViewState::Ready`] or no map could be created.
    pub async fn refresh(&mut self) -> Option<ReconcileReport> {
        if self.state != ViewState::Ready {
            return None;
        }
        let position = self.position?;
        self.load_receptacles(position).await
    }

    /// Open overlays for clicks queued by the map since the last call.
    ///
    /// Returns the number of clicks handled. Clicks never change the view state.
    pub fn dispatch_clicks(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(click) = self.clicks.try_recv() {
            handled += 1;
            if self.state != ViewState::Ready {
                continue;
            }
            let id = click.record.id;
            if let Err(err) = self.overlay.open(click.record, &self.viewer) {
                warn!(receptacle = %id, error = %err, "could not open receptacle overlay");
            }
        }
        handled
    }

    /// Close the overlay. Returns whether one was open.
    pub fn close_overlay(&mut self) -> bool {
        self.overlay.close()
    }

    /// Tear the view down: close the overlay and take every marker, the user's
    /// included, off the map.
    ///
    /// Markers the map refuses to remove stay tracked and the map is kept, so the
    /// next mount retries their removal.
    pub fn unmount(&mut self) {
        self.overlay.close();
        if let Err(err) = self.map_port.hide_user_position() {
            warn!(error = %err, "failed to remove user marker");
        }
        if let Some(map) = self.map {
            let removed = self.reconciler.clear(self.map_port.as_mut(), map);
            debug!(removed, "receptacle markers cleared");
            if self.reconciler.is_empty() {
                self.map = None;
            } else {
                warn!(left = self.reconciler.len(), "markers left on the map");
            }
        }
        while self.clicks.try_recv().is_ok() {}
        self.position = None;
        self.fetch_error = None;
        self.state = ViewState::Loading;
        info!("map view unmounted");
    }

    async fn acquire_and_load(&mut self) {
        self.state = ViewState::Loading;

        let position = match self.location.acquire().await {
            Ok(position) => position,
            Err(err) => {
                warn!(error = %err, "location unavailable");
                self.state = ViewState::LocationError;
                return;
            }
        };
        info!(%position, "location acquired");
        self.position = Some(position);

        self.show_map(position).await;
        self.load_receptacles(position).await;
        self.state = ViewState::Ready;
        info!(markers = self.reconciler.len(), "map view ready");
    }

    async fn show_map(&mut self, position: Position) {
        let map = match self.map {
            Some(map) => {
                if let Err(err) = self.map_port.center_on(map, position) {
                    warn!(error = %err, "failed to recenter map");
                }
                map
            }
            None => match self.map_port.initialize(&self.options.container, position).await {
                Ok(map) => {
                    self.map = Some(map);
                    map
                }
                Err(err) => {
                    warn!(error = %err, "map initialization failed; continuing without a map");
                    return;
                }
            },
        };

        if let Err(err) = self.map_port.show_user_position(map, position) {
            warn!(error = %err, "failed to draw user marker");
        }
    }

    async fn load_receptacles(&mut self, position: Position) -> Option<ReconcileReport> {
        let records = match self.receptacles.near(position).await {
            Ok(records) => {
                self.fetch_error = None;
                records
            }
            Err(err) => {
                warn!(error = %err, "receptacle fetch failed; continuing with no receptacles");
                self.fetch_error = Some(err.to_string());
                Vec::new()
            }
        };
        let records = within_radius(records, position, self.options.radius_m);

        let Some(map) = self.map else {
            debug!("no map to reconcile against");
            return None;
        };
        let report = self
            .reconciler
            .reconcile(self.map_port.as_mut(), map, &records);
        info!(
            placed = report.placed.len(),
            removed = report.removed.len(),
            retained = report.retained,
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "markers reconciled"
        );
        Some(report)
    }
}

/// Keep records within `radius_m` of `origin`. Records without a usable
/// position pass so reconciliation can report them.
fn within_radius(
    records: Vec<ReceptacleRecord>,
    origin: Position,
    radius_m: Option<f64>,
) -> Vec<ReceptacleRecord> {
    let Some(radius_m) = radius_m else {
        return records;
    };
    records
        .into_iter()
        .filter(|record| {
            record
                .position()
                .map_or(true, |position| origin.distance_m(&position) <= radius_m)
        })
        .collect()
}
