use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use binmap_core::{
    overlay::{MODAL_ROOT, OverlayView, SubtreeId},
    ports::{OverlaySurface, PortError},
};

#[derive(Default)]
struct Subtrees {
    next_id: u64,
    mounted: BTreeMap<SubtreeId, OverlayView>,
}

/// The `#modal-root` attachment point, drawn on top of the map.
#[derive(Clone, Default)]
pub(crate) struct ModalRoot {
    subtrees: Arc<Mutex<Subtrees>>,
}

impl ModalRoot {
    fn subtrees(&self) -> MutexGuard<'_, Subtrees> {
        self.subtrees.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The most recently mounted overlay.
    pub(crate) fn current(&self) -> Option<OverlayView> {
        self.subtrees().mounted.values().next_back().cloned()
    }
}

impl OverlaySurface for ModalRoot {
    fn mount(&self, attachment: &str, view: OverlayView) -> Result<SubtreeId, PortError> {
        if attachment != MODAL_ROOT {
            return Err(PortError::Surface(format!(
                "no attachment point #{attachment}"
            )));
        }
        let mut subtrees = self.subtrees();
        subtrees.next_id += 1;
        let id = SubtreeId(subtrees.next_id);
        subtrees.mounted.insert(id, view);
        Ok(id)
    }

    fn unmount(&self, subtree: SubtreeId) {
        self.subtrees().mounted.remove(&subtree);
    }
}

#[cfg(test)]
mod tests {
    use binmap_core::{
        model::{CanType, ReceptacleRecord},
        overlay::OverlayAccess,
    };

    use super::*;

    fn view(id: u64) -> OverlayView {
        OverlayView {
            record: Arc::new(ReceptacleRecord::new(id, CanType::General, 37.5, 127.03)),
            access: OverlayAccess::ReadOnly,
        }
    }

    #[test]
    fn shows_latest_mounted_overlay() {
        let root = ModalRoot::default();
        assert!(root.current().is_none());

        let first = root.mount(MODAL_ROOT, view(1)).expect("first");
        root.mount(MODAL_ROOT, view(2)).expect("second");
        assert_eq!(root.current().map(|shown| shown.record.id.0), Some(2));

        root.unmount(first);
        assert_eq!(root.current().map(|shown| shown.record.id.0), Some(2));
    }

    #[test]
    fn rejects_other_attachment_points() {
        let root = ModalRoot::default();
        let mounted = root.mount("map", view(1));
        assert!(matches!(mounted, Err(PortError::Surface(_))));
        assert!(root.current().is_none());
    }
}
