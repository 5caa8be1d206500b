//! Receptacle detail overlay mounted on its own attachment point, outside the map tree.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::model::{ReceptacleRecord, Viewer};
use crate::ports::{OverlaySurface, PortError};

/// Attachment point reserved for overlays.
pub const MODAL_ROOT: &str = "modal-root";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Identifier of a subtree mounted by an [`OverlaySurface`].
pub struct SubtreeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// What the viewer may do from the overlay.
pub enum OverlayAccess {
    /// Inspect only.
    ReadOnly,
    /// The viewer reported this receptacle and may edit or delete it.
    Owner,
}

impl OverlayAccess {
    /// Access granted to `viewer` for `record`.
    #[must_use]
    pub fn for_viewer(viewer: &Viewer, record: &ReceptacleRecord) -> Self {
        if viewer.owns(record) {
            Self::Owner
        } else {
            Self::ReadOnly
        }
    }

    /// Whether the edit affordance is shown.
    #[must_use]
    pub const fn can_edit(self) -> bool {
        matches!(self, Self::Owner)
    }

    /// Whether the delete affordance is shown.
    #[must_use]
    pub const fn can_delete(self) -> bool {
        matches!(self, Self::Owner)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Everything the rendering host needs to draw the overlay.
pub struct OverlayView {
    /// The clicked receptacle.
    pub record: Arc<ReceptacleRecord>,
    /// Affordances offered to the viewer.
    pub access: OverlayAccess,
}

/// A mounted overlay. Dropping the session unmounts its subtree.
pub struct OverlaySession {
    surface: Arc<dyn OverlaySurface>,
    subtree: SubtreeId,
    view: OverlayView,
}

impl OverlaySession {
    /// The record shown in the overlay.
    #[must_use]
    pub fn record(&self) -> &ReceptacleRecord {
        &self.view.record
    }

    /// The mounted view.
    #[must_use]
    pub fn view(&self) -> &OverlayView {
        &self.view
    }

    /// Id of the mounted subtree.
    #[must_use]
    pub fn subtree(&self) -> SubtreeId {
        self.subtree
    }
}

impl fmt::Debug for OverlaySession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("OverlaySession")
            .field("subtree", &self.subtree)
            .field("view", &self.view)
            .finish_non_exhaustive()
    }
}

impl Drop for OverlaySession {
    fn drop(&mut self) {
        self.surface.unmount(self.subtree);
        debug!(receptacle = %self.view.record.id, "overlay closed");
    }
}

/// Holds at most one [`OverlaySession`] at a time.
pub struct OverlayHost {
    surface: Arc<dyn OverlaySurface>,
    attachment: String,
    session: Option<OverlaySession>,
}

impl OverlayHost {
    /// Host overlays on the [`MODAL_ROOT`] attachment point of `surface`.
    #[must_use]
    pub fn new(surface: Arc<dyn OverlaySurface>) -> Self {
        Self {
            surface,
            attachment: MODAL_ROOT.to_owned(),
            session: None,
        }
    }

    /// Use a different attachment point.
    #[must_use]
    pub fn with_attachment<A: Into<String>>(mut self, attachment: A) -> Self {
        self.attachment = attachment.into();
        self
    }

    /// Close the current overlay, if any, and show `record`.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Surface`] when the rendering host cannot mount the overlay.
    /// No overlay is open afterwards in that case.
    pub fn open(
        &mut self,
        record: Arc<ReceptacleRecord>,
        viewer: &Viewer,
    ) -> Result<&OverlaySession, PortError> {
        self.close();

        let view = OverlayView {
            access: OverlayAccess::for_viewer(viewer, &record),
            record,
        };
        let subtree = self.surface.mount(&self.attachment, view.clone())?;
        debug!(receptacle = %view.record.id, access = ?view.access, "overlay opened");

        Ok(self.session.insert(OverlaySession {
            surface: Arc::clone(&self.surface),
            subtree,
            view,
        }))
    }

    /// Close the current overlay. Returns whether one was open.
    pub fn close(&mut self) -> bool {
        self.session.take().is_some()
    }

    /// The open overlay.
    #[must_use]
    pub fn session(&self) -> Option<&OverlaySession> {
        self.session.as_ref()
    }

    /// Whether an overlay is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }
}
