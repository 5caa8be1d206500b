//! Marker bookkeeping that keeps live map markers in step with the latest receptacle list.
//!
//! Reconciliation is split in two steps. [`plan`] is a pure function of the
//! current id→handle mapping and the new record list; [`MarkerReconciler::reconcile`]
//! applies a plan against a [`MapPort`] and is the only writer of the mapping.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::adapter::MarkerStyle;
use crate::model::{InvalidRecord, MapHandle, MarkerHandle, Position, ReceptacleId, ReceptacleRecord};
use crate::ports::{ClickCallback, MapPort};

#[derive(Debug, Clone)]
/// Emitted when a receptacle marker is clicked.
pub struct MarkerClick {
    /// The record the marker was placed for.
    pub record: Arc<ReceptacleRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Why a record was left off the map.
pub enum SkipReason {
    /// The record has no usable position.
    Invalid(InvalidRecord),
    /// An earlier record in the same list already used this id.
    DuplicateId,
}

#[derive(Debug, Default)]
/// Operations needed to bring the markers in line with a record list.
pub struct ReconcilePlan {
    /// Records to place, with their validated positions.
    pub place: Vec<(Arc<ReceptacleRecord>, Position)>,
    /// Ids whose markers must go.
    pub remove: Vec<ReceptacleId>,
    /// Records that will not be shown.
    pub skipped: Vec<(ReceptacleId, SkipReason)>,
}

impl ReconcilePlan {
    /// Whether applying the plan would touch the map.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.place.is_empty() && self.remove.is_empty()
    }
}

/// Compute the marker operations turning `previous` into the placeable ids of `records`.
///
/// Ids present on both sides are left alone; a record is never moved or restyled in place.
#[must_use]
pub fn plan(
    previous: &HashMap<ReceptacleId, MarkerHandle>,
    records: &[ReceptacleRecord],
) -> ReconcilePlan {
    let mut result = ReconcilePlan::default();
    let mut seen = HashSet::with_capacity(records.len());
    let mut keep = HashSet::with_capacity(records.len());

    for record in records {
        if !seen.insert(record.id) {
            result.skipped.push((record.id, SkipReason::DuplicateId));
            continue;
        }
        match record.position() {
            Ok(position) => {
                keep.insert(record.id);
                if !previous.contains_key(&record.id) {
                    result.place.push((Arc::new(record.clone()), position));
                }
            }
            Err(reason) => result.skipped.push((record.id, SkipReason::Invalid(reason))),
        }
    }

    result.remove = previous
        .keys()
        .filter(|id| !keep.contains(id))
        .copied()
        .collect();
    result.remove.sort_unstable();
    result
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
/// Outcome of one reconciliation pass.
pub struct ReconcileReport {
    /// Ids that received a new marker.
    pub placed: Vec<ReceptacleId>,
    /// Ids whose marker was removed.
    pub removed: Vec<ReceptacleId>,
    /// Number of markers already on the map that stay there, including failed removals.
    pub retained: usize,
    /// Records left off the map.
    pub skipped: Vec<(ReceptacleId, SkipReason)>,
    /// Ids whose placement or removal failed; retried on the next pass.
    pub failed: Vec<ReceptacleId>,
}

/// Owner of the id→handle mapping of receptacle markers.
pub struct MarkerReconciler {
    markers: HashMap<ReceptacleId, MarkerHandle>,
    clicks: UnboundedSender<MarkerClick>,
}

impl MarkerReconciler {
    /// Create an empty reconciler whose markers report clicks on `clicks`.
    #[must_use]
    pub fn new(clicks: UnboundedSender<MarkerClick>) -> Self {
        Self {
            markers: HashMap::new(),
            clicks,
        }
    }

    /// Number of live receptacle markers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Whether no receptacle marker is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Handle of the marker shown for `id`.
    #[must_use]
    pub fn handle(&self, id: ReceptacleId) -> Option<MarkerHandle> {
        self.markers.get(&id).copied()
    }

    /// Current id→handle mapping.
    #[must_use]
    pub fn markers(&self) -> &HashMap<ReceptacleId, MarkerHandle> {
        &self.markers
    }

    /// Bring the markers on `map` in line with `records`.
    ///
    /// Failures of single markers are logged and reported; they never abort the pass.
    pub fn reconcile(
        &mut self,
        port: &mut dyn MapPort,
        map: MapHandle,
        records: &[ReceptacleRecord],
    ) -> ReconcileReport {
        let plan = plan(&self.markers, records);
        let mut report = ReconcileReport {
            skipped: plan.skipped,
            ..ReconcileReport::default()
        };

        for (id, reason) in &report.skipped {
            match reason {
                SkipReason::Invalid(invalid) => {
                    warn!(receptacle = %id, reason = %invalid, "skipping receptacle without a usable position");
                }
                SkipReason::DuplicateId => {
                    warn!(receptacle = %id, "skipping duplicate receptacle id");
                }
            }
        }

        for id in plan.remove {
            let Some(handle) = self.markers.get(&id).copied() else {
                continue;
            };
            // A marker that could not be removed stays mapped, so the next
            // pass retries the removal instead of orphaning it.
            if let Err(err) = port.remove_marker(map, handle) {
                warn!(receptacle = %id, error = %err, "failed to remove marker; retrying on next reconciliation");
                report.failed.push(id);
                continue;
            }
            self.markers.remove(&id);
            debug!(receptacle = %id, "marker removed");
            report.removed.push(id);
        }

        for (record, position) in plan.place {
            let id = record.id;
            match self.place(port, map, record, position) {
                Some(handle) => {
                    self.markers.insert(id, handle);
                    debug!(receptacle = %id, "marker placed");
                    report.placed.push(id);
                }
                None => report.failed.push(id),
            }
        }

        report.retained = self.markers.len() - report.placed.len();
        report
    }

    /// Remove every receptacle marker from `map`, returning how many were removed.
    ///
    /// Markers the port fails to remove stay mapped so a later call can retry.
    pub fn clear(&mut self, port: &mut dyn MapPort, map: MapHandle) -> usize {
        let before = self.markers.len();
        self.markers.retain(|id, handle| match port.remove_marker(map, *handle) {
            Ok(()) => false,
            Err(err) => {
                warn!(receptacle = %id, error = %err, "failed to remove marker");
                true
            }
        });
        before - self.markers.len()
    }

    fn place(
        &self,
        port: &mut dyn MapPort,
        map: MapHandle,
        record: Arc<ReceptacleRecord>,
        position: Position,
    ) -> Option<MarkerHandle> {
        let id = record.id;
        let handle = match port.place_marker(map, position, MarkerStyle::from(record.can_type)) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(receptacle = %id, error = %err, "marker placement failed; retrying on next reconciliation");
                return None;
            }
        };

        let clicks = self.clicks.clone();
        let callback: ClickCallback = Box::new(move || {
            let click = MarkerClick {
                record: Arc::clone(&record),
            };
            if clicks.send(click).is_err() {
                debug!(receptacle = %id, "marker clicked after the view went away");
            }
        });

        if let Err(err) = port.on_marker_click(handle, callback) {
            warn!(receptacle = %id, error = %err, "click registration failed; retrying on next reconciliation");
            if let Err(remove_err) = port.remove_marker(map, handle) {
                warn!(receptacle = %id, error = %remove_err, "failed to remove unclickable marker");
            }
            return None;
        }
        Some(handle)
    }
}
