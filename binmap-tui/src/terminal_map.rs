use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use binmap_core::{
    adapter::{MarkerStyle, USER_MARKER_IMAGE},
    model::{MapHandle, MarkerHandle, Position},
    ports::{ClickCallback, MapSdk, MarkerImage, PortError},
};
use tracing::{debug, warn};

/// How a marker is drawn on the terminal canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Glyph {
    User,
    General,
    Recyclable,
}

impl Glyph {
    fn for_image(image: &MarkerImage) -> Self {
        if image.src == USER_MARKER_IMAGE.src {
            Self::User
        } else if image.src == MarkerStyle::Recyclable.image().src {
            Self::Recyclable
        } else {
            Self::General
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct MapView {
    pub handle: MapHandle,
    pub center: Position,
    pub level: u8,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SceneMarker {
    pub handle: MarkerHandle,
    pub position: Position,
    pub glyph: Glyph,
    pub clickable: bool,
}

#[derive(Default)]
struct Scene {
    loaded: bool,
    next_id: u64,
    view: Option<MapView>,
    markers: BTreeMap<MarkerHandle, SceneMarker>,
    listeners: HashMap<MarkerHandle, Listener>,
}

type Listener = Arc<dyn Fn() + Send + Sync>;

/// What the UI needs to draw one frame of the map.
#[derive(Debug, Clone, Default)]
pub(crate) struct MapSnapshot {
    pub view: Option<MapView>,
    pub markers: Vec<SceneMarker>,
}

/// Map SDK drawing onto a ratatui canvas. Clones share the same scene, so the
/// UI keeps one while the adapter owns another.
#[derive(Clone, Default)]
pub(crate) struct TerminalMap {
    scene: Arc<Mutex<Scene>>,
}

impl TerminalMap {
    fn scene(&self) -> MutexGuard<'_, Scene> {
        self.scene.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn snapshot(&self) -> MapSnapshot {
        let scene = self.scene();
        MapSnapshot {
            view: scene.view,
            markers: scene.markers.values().copied().collect(),
        }
    }

    /// Clickable markers ordered west to east, the order the selection cycles through.
    pub(crate) fn clickable(&self) -> Vec<MarkerHandle> {
        let scene = self.scene();
        let mut markers: Vec<&SceneMarker> = scene
            .markers
            .values()
            .filter(|marker| marker.clickable && scene.listeners.contains_key(&marker.handle))
            .collect();
        markers.sort_by(|left, right| {
            left.position
                .longitude
                .total_cmp(&right.position.longitude)
                .then(left.handle.cmp(&right.handle))
        });
        markers.into_iter().map(|marker| marker.handle).collect()
    }

    /// Dispatch a click on `marker` the way a pointer click would.
    ///
    /// The listener runs after the scene lock is released, so it may call back into the map.
    pub(crate) fn click(&self, marker: MarkerHandle) -> bool {
        let listener = self.scene().listeners.get(&marker).map(Arc::clone);
        let Some(listener) = listener else {
            return false;
        };
        listener();
        true
    }

    fn check_map(scene: &Scene, map: MapHandle) -> Result<(), PortError> {
        match scene.view {
            Some(view) if view.handle == map => Ok(()),
            _ => Err(PortError::MarkerOperation(format!("unknown map {}", map.0))),
        }
    }
}

#[async_trait]
impl MapSdk for TerminalMap {
    async fn load(&self) -> Result<(), PortError> {
        let mut scene = self.scene();
        if scene.loaded {
            warn!("terminal map loaded twice");
        }
        scene.loaded = true;
        debug!("terminal map ready");
        Ok(())
    }

    fn create_map(
        &mut self,
        container: &str,
        center: Position,
        level: u8,
    ) -> Result<MapHandle, PortError> {
        let mut scene = self.scene();
        if !scene.loaded {
            return Err(PortError::SdkLoad("terminal map is not loaded".to_owned()));
        }
        scene.next_id += 1;
        let handle = MapHandle(scene.next_id);
        // A terminal has a single viewport; a new map replaces the old one.
        scene.markers.clear();
        scene.listeners.clear();
        scene.view = Some(MapView {
            handle,
            center,
            level,
        });
        debug!(container, map = handle.0, "terminal map created");
        Ok(handle)
    }

    fn set_center(&mut self, map: MapHandle, center: Position) -> Result<(), PortError> {
        let mut scene = self.scene();
        Self::check_map(&scene, map)?;
        if let Some(view) = scene.view.as_mut() {
            view.center = center;
        }
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
        Self::check_map(&scene, map)?;
        scene.next_id += 1;
        let handle = MarkerHandle(scene.next_id);
        scene.markers.insert(
            handle,
            SceneMarker {
                handle,
                position,
                glyph: Glyph::for_image(image),
                clickable,
            },
        );
        Ok(handle)
    }

    fn remove_marker(&mut self, _map: MapHandle, marker: MarkerHandle) -> Result<(), PortError> {
        let mut scene = self.scene();
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
        match scene.markers.get(&marker).map(|found| found.clickable) {
            Some(true) => {
                scene.listeners.insert(marker, Listener::from(callback));
                Ok(())
            }
            Some(false) => Err(PortError::MarkerOperation(format!(
                "marker {} is not clickable",
                marker.0
            ))),
            None => Err(PortError::MarkerOperation(format!(
                "unknown marker {}",
                marker.0
            ))),
        }
    }
}
