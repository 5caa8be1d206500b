//! Recording fakes of the map SDK and rendering host shared by the unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::model::{MapHandle, MarkerHandle, Position};
use crate::overlay::{OverlayView, SubtreeId};
use crate::ports::{ClickCallback, MapSdk, MarkerImage, OverlaySurface, PortError};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FakeMarker {
    pub handle: MarkerHandle,
    pub map: MapHandle,
    pub position: Position,
    pub image: &'static str,
    pub clickable: bool,
}

#[derive(Default)]
struct Scene {
    loads: usize,
    fail_load: bool,
    fail_additions: bool,
    fail_listeners: bool,
    fail_removals: bool,
    next_id: u64,
    maps: Vec<(String, Position, u8)>,
    markers: BTreeMap<MarkerHandle, FakeMarker>,
    listeners: HashMap<MarkerHandle, Arc<dyn Fn() + Send + Sync>>,
    additions: usize,
    removals: usize,
}

/// Map SDK that keeps everything in memory and counts calls. Clones share state.
#[derive(Clone, Default)]
pub(crate) struct FakeSdk {
    scene: Arc<Mutex<Scene>>,
}

impl FakeSdk {
    fn scene(&self) -> MutexGuard<'_, Scene> {
        self.scene.lock().expect("fake scene lock")
    }

    pub(crate) fn fail_load(&self, fail: bool) {
        self.scene().fail_load = fail;
    }

    pub(crate) fn fail_additions(&self, fail: bool) {
        self.scene().fail_additions = fail;
    }

    pub(crate) fn fail_listeners(&self, fail: bool) {
        self.scene().fail_listeners = fail;
    }

    pub(crate) fn fail_removals(&self, fail: bool) {
        self.scene().fail_removals = fail;
    }

    pub(crate) fn loads(&self) -> usize {
        self.scene().loads
    }

    pub(crate) fn maps(&self) -> Vec<(String, Position, u8)> {
        self.scene().maps.clone()
    }

    pub(crate) fn markers(&self) -> Vec<FakeMarker> {
        self.scene().markers.values().cloned().collect()
    }

    pub(crate) fn additions(&self) -> usize {
        self.scene().additions
    }

    pub(crate) fn removals(&self) -> usize {
        self.scene().removals
    }

    /// Fire the click listener of `marker`, returning whether one was registered.
    pub(crate) fn click(&self, marker: MarkerHandle) -> bool {
        let listener = self.scene().listeners.get(&marker).map(Arc::clone);
        match listener {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl MapSdk for FakeSdk {
    async fn load(&self) -> Result<(), PortError> {
        let mut scene = self.scene();
        scene.loads += 1;
        if scene.fail_load {
            return Err(PortError::SdkLoad("script blocked".to_owned()));
        }
        Ok(())
    }

    fn create_map(
        &mut self,
        container: &str,
        center: Position,
        level: u8,
    ) -> Result<MapHandle, PortError> {
        let mut scene = self.scene();
        scene.next_id += 1;
        let handle = MapHandle(scene.next_id);
        scene.maps.push((container.to_owned(), center, level));
        Ok(handle)
    }

    fn set_center(&mut self, _map: MapHandle, _center: Position) -> Result<(), PortError> {
        Ok(())
    }

    fn add_marker(
        &mut self,
        map: MapHandle,
        position: Position,
        image: &MarkerImage,
        clickable: bool,
    ) -> Result<MarkerHandle, PortError> {
        let mut scene = self.scene();
        scene.additions += 1;
        if scene.fail_additions && clickable {
            return Err(PortError::MarkerOperation("marker rejected".to_owned()));
        }
        scene.next_id += 1;
        let handle = MarkerHandle(scene.next_id);
        scene.markers.insert(
            handle,
            FakeMarker {
                handle,
                map,
                position,
                image: image.src,
                clickable,
            },
        );
        Ok(handle)
    }

    fn remove_marker(&mut self, _map: MapHandle, marker: MarkerHandle) -> Result<(), PortError> {
        let mut scene = self.scene();
        if scene.fail_removals {
            return Err(PortError::MarkerOperation("removal rejected".to_owned()));
        }
        scene.removals += 1;
        scene.markers.remove(&marker);
        scene.listeners.remove(&marker);
        Ok(())
    }

    fn add_click_listener(
        &mut self,
        marker: MarkerHandle,
        callback: ClickCallback,
    ) -> Result<(), PortError> {
        let mut scene = self.scene();
        if scene.fail_listeners {
            return Err(PortError::MarkerOperation("listener rejected".to_owned()));
        }
        scene.listeners.insert(marker, Arc::from(callback));
        Ok(())
    }
}

#[derive(Default)]
struct Mounted {
    next_id: u64,
    subtrees: BTreeMap<SubtreeId, (String, OverlayView)>,
    mounts: usize,
    unmounts: usize,
}

/// Rendering host that records mounted subtrees.
#[derive(Clone, Default)]
pub(crate) struct FakeSurface {
    mounted: Arc<Mutex<Mounted>>,
}

impl FakeSurface {
    fn mounted(&self) -> MutexGuard<'_, Mounted> {
        self.mounted.lock().expect("fake surface lock")
    }

    pub(crate) fn active(&self) -> Vec<(String, OverlayView)> {
        self.mounted().subtrees.values().cloned().collect()
    }

    pub(crate) fn mounts(&self) -> usize {
        self.mounted().mounts
    }

    pub(crate) fn unmounts(&self) -> usize {
        self.mounted().unmounts
    }
}

impl OverlaySurface for FakeSurface {
    fn mount(&self, attachment: &str, view: OverlayView) -> Result<SubtreeId, PortError> {
        let mut mounted = self.mounted();
        if attachment != crate::overlay::MODAL_ROOT {
            return Err(PortError::Surface(format!("no attachment point #{attachment}")));
        }
        mounted.next_id += 1;
        mounted.mounts += 1;
        let subtree = SubtreeId(mounted.next_id);
        mounted.subtrees.insert(subtree, (attachment.to_owned(), view));
        Ok(subtree)
    }

    fn unmount(&self, subtree: SubtreeId) {
        let mut mounted = self.mounted();
        if mounted.subtrees.remove(&subtree).is_some() {
            mounted.unmounts += 1;
        }
    }
}
