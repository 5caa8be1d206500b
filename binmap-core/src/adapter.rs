//! Map provider adapter narrowing a vendor map SDK to the operations the view needs.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::model::{CanType, MapHandle, MarkerHandle, Position};
use crate::ports::{ClickCallback, MapPort, MapSdk, MarkerImage, PortError};

/// Zoom level used for every new map.
pub const DEFAULT_LEVEL: u8 = 3;

const MARKER_SIZE: u32 = 30;
const MARKER_OFFSET: (i32, i32) = (12, 35);

/// Icon of the user's own position.
pub const USER_MARKER_IMAGE: MarkerImage = MarkerImage {
    src: "assets/myLocationIcon.png",
    size: MARKER_SIZE,
    offset: MARKER_OFFSET,
};

const GENERAL_MARKER_IMAGE: MarkerImage = MarkerImage {
    src: "assets/TrashCanIcon.png",
    size: MARKER_SIZE,
    offset: MARKER_OFFSET,
};

const RECYCLABLE_MARKER_IMAGE: MarkerImage = MarkerImage {
    src: "assets/RecycleIcon.png",
    size: MARKER_SIZE,
    offset: MARKER_OFFSET,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Visual variant of a receptacle marker.
pub enum MarkerStyle {
    /// General waste bin.
    General,
    /// Recycling bin.
    Recyclable,
}

impl MarkerStyle {
    /// Icon drawn for this style.
    #[must_use]
    pub const fn image(self) -> &'static MarkerImage {
        match self {
            Self::General => &GENERAL_MARKER_IMAGE,
            Self::Recyclable => &RECYCLABLE_MARKER_IMAGE,
        }
    }
}

impl From<CanType> for MarkerStyle {
    fn from(can_type: CanType) -> Self {
        match can_type {
            CanType::General => Self::General,
            CanType::Recyclable => Self::Recyclable,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct UserMarker {
    map: MapHandle,
    handle: MarkerHandle,
    position: Position,
}

/// [`MapPort`] implementation on top of a [`MapSdk`].
///
/// The SDK is loaded at most once for the lifetime of the adapter, so a
/// process should build exactly one adapter and share it between mounts.
pub struct MapProviderAdapter<S> {
    sdk: S,
    loaded: OnceCell<()>,
    level: u8,
    live: HashSet<MarkerHandle>,
    listening: HashSet<MarkerHandle>,
    user_marker: Option<UserMarker>,
}

impl<S: MapSdk> MapProviderAdapter<S> {
    /// Wrap an SDK that has not been loaded yet.
    #[must_use]
    pub fn new(sdk: S) -> Self {
        Self {
            sdk,
            loaded: OnceCell::new(),
            level: DEFAULT_LEVEL,
            live: HashSet::new(),
            listening: HashSet::new(),
            user_marker: None,
        }
    }

    /// Override the zoom level used for new maps.
    #[must_use]
    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    /// The wrapped SDK.
    #[must_use]
    pub fn sdk(&self) -> &S {
        &self.sdk
    }

    /// Whether the SDK has finished loading.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }
}

#[async_trait]
impl<S: MapSdk> MapPort for MapProviderAdapter<S> {
    async fn initialize(
        &mut self,
        container: &str,
        center: Position,
    ) -> Result<MapHandle, PortError> {
        let sdk = &self.sdk;
        self.loaded.get_or_try_init(|| sdk.load()).await?;

        let map = self.sdk.create_map(container, center, self.level)?;
        debug!(container, %center, level = self.level, "map created");
        Ok(map)
    }

    fn place_marker(
        &mut self,
        map: MapHandle,
        position: Position,
        style: MarkerStyle,
    ) -> Result<MarkerHandle, PortError> {
        let handle = self.sdk.add_marker(map, position, style.image(), true)?;
        self.live.insert(handle);
        Ok(handle)
    }

    fn remove_marker(&mut self, map: MapHandle, marker: MarkerHandle) -> Result<(), PortError> {
        if !self.live.contains(&marker) {
            return Ok(());
        }
        self.sdk.remove_marker(map, marker)?;
        self.live.remove(&marker);
        self.listening.remove(&marker);
        Ok(())
    }

    fn center_on(&mut self, map: MapHandle, position: Position) -> Result<(), PortError> {
        self.sdk.set_center(map, position)
    }

    fn on_marker_click(
        &mut self,
        marker: MarkerHandle,
        callback: ClickCallback,
    ) -> Result<(), PortError> {
        if !self.live.contains(&marker) {
            return Err(PortError::MarkerOperation(format!(
                "marker {} is not on the map",
                marker.0
            )));
        }
        if !self.listening.insert(marker) {
            return Err(PortError::MarkerOperation(format!(
                "marker {} already has a click listener",
                marker.0
            )));
        }
        let registered = self.sdk.add_click_listener(marker, callback);
        if registered.is_err() {
            self.listening.remove(&marker);
        }
        registered
    }

    fn show_user_position(&mut self, map: MapHandle, position: Position) -> Result<(), PortError> {
        if let Some(current) = self.user_marker
            && current.map == map
            && current.position == position
        {
            return Ok(());
        }

        self.hide_user_position()?;

        let handle = self.sdk.add_marker(map, position, &USER_MARKER_IMAGE, false)?;
        self.user_marker = Some(UserMarker {
            map,
            handle,
            position,
        });
        debug!(%position, "user marker drawn");
        Ok(())
    }

    fn hide_user_position(&mut self) -> Result<(), PortError> {
        let Some(current) = self.user_marker else {
            return Ok(());
        };
        self.sdk.remove_marker(current.map, current.handle)?;
        self.user_marker = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeSdk;

    const GANGNAM: Position = Position::new(37.50, 127.03);

    #[tokio::test]
    async fn loads_sdk_once_across_initializations() {
        let sdk = FakeSdk::default();
        let mut adapter = MapProviderAdapter::new(sdk.clone());
        assert!(!adapter.is_loaded());

        let first = adapter.initialize("map", GANGNAM).await.expect("first map");
        let second = adapter.initialize("map", GANGNAM).await.expect("second map");

        assert!(adapter.is_loaded());
        assert_ne!(first, second);
        assert_eq!(sdk.loads(), 1);
        assert_eq!(sdk.maps(), vec![("map".to_owned(), GANGNAM, DEFAULT_LEVEL); 2]);
    }

    #[tokio::test]
    async fn failed_load_is_retried_on_next_initialization() {
        let sdk = FakeSdk::default();
        sdk.fail_load(true);
        let mut adapter = MapProviderAdapter::new(sdk.clone());

        let err = adapter.initialize("map", GANGNAM).await;
        assert!(matches!(err, Err(PortError::SdkLoad(_))));
        assert!(!adapter.is_loaded());

        sdk.fail_load(false);
        adapter.initialize("map", GANGNAM).await.expect("map after reload");
        assert_eq!(sdk.loads(), 2);
    }

    #[tokio::test]
    async fn removal_is_idempotent() {
        let sdk = FakeSdk::default();
        let mut adapter = MapProviderAdapter::new(sdk.clone());
        let map = adapter.initialize("map", GANGNAM).await.expect("map");

        let marker = adapter
            .place_marker(map, GANGNAM, MarkerStyle::General)
            .expect("marker");
        adapter.remove_marker(map, marker).expect("first removal");
        adapter.remove_marker(map, marker).expect("second removal");

        assert_eq!(sdk.removals(), 1);
        assert!(sdk.markers().is_empty());
    }

    #[tokio::test]
    async fn one_click_listener_per_marker() {
        let sdk = FakeSdk::default();
        let mut adapter = MapProviderAdapter::new(sdk.clone());
        let map = adapter.initialize("map", GANGNAM).await.expect("map");
        let marker = adapter
            .place_marker(map, GANGNAM, MarkerStyle::Recyclable)
            .expect("marker");

        adapter
            .on_marker_click(marker, Box::new(|| {}))
            .expect("first listener");
        let second = adapter.on_marker_click(marker, Box::new(|| {}));
        assert!(matches!(second, Err(PortError::MarkerOperation(_))));

        let unknown = adapter.on_marker_click(MarkerHandle(999), Box::new(|| {}));
        assert!(matches!(unknown, Err(PortError::MarkerOperation(_))));
    }

    #[tokio::test]
    async fn user_marker_redrawn_only_on_change() {
        let sdk = FakeSdk::default();
        let mut adapter = MapProviderAdapter::new(sdk.clone());
        let map = adapter.initialize("map", GANGNAM).await.expect("map");

        adapter.show_user_position(map, GANGNAM).expect("user marker");
        adapter.show_user_position(map, GANGNAM).expect("same position");
        assert_eq!(sdk.additions(), 1);

        let moved = Position::new(37.51, 127.04);
        adapter.show_user_position(map, moved).expect("moved");
        assert_eq!(sdk.additions(), 2);
        assert_eq!(sdk.removals(), 1);

        let markers = sdk.markers();
        assert_eq!(markers.len(), 1);
        let user = markers.first().expect("user marker");
        assert_eq!(user.position, moved);
        assert_eq!(user.image, USER_MARKER_IMAGE.src);
        assert!(!user.clickable);
    }

    #[tokio::test]
    async fn failed_removal_keeps_the_marker_live() {
        let sdk = FakeSdk::default();
        let mut adapter = MapProviderAdapter::new(sdk.clone());
        let map = adapter.initialize("map", GANGNAM).await.expect("map");
        let marker = adapter
            .place_marker(map, GANGNAM, MarkerStyle::General)
            .expect("marker");

        sdk.fail_removals(true);
        let removed = adapter.remove_marker(map, marker);
        assert!(matches!(removed, Err(PortError::MarkerOperation(_))));

        sdk.fail_removals(false);
        adapter.remove_marker(map, marker).expect("retried removal");
        assert!(sdk.markers().is_empty());
        assert_eq!(sdk.removals(), 1);
    }

    #[tokio::test]
    async fn user_marker_survives_failed_redraw() {
        let sdk = FakeSdk::default();
        let mut adapter = MapProviderAdapter::new(sdk.clone());
        let map = adapter.initialize("map", GANGNAM).await.expect("map");
        adapter.show_user_position(map, GANGNAM).expect("user marker");

        sdk.fail_removals(true);
        let moved = Position::new(37.51, 127.04);
        assert!(adapter.show_user_position(map, moved).is_err());
        assert!(adapter.hide_user_position().is_err());

        sdk.fail_removals(false);
        adapter.show_user_position(map, moved).expect("redrawn");
        let markers = sdk.markers();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers.first().map(|marker| marker.position), Some(moved));
    }

    #[tokio::test]
    async fn hiding_the_user_marker_clears_it() {
        let sdk = FakeSdk::default();
        let mut adapter = MapProviderAdapter::new(sdk.clone());
        let map = adapter.initialize("map", GANGNAM).await.expect("map");

        adapter.hide_user_position().expect("nothing to hide");
        adapter.show_user_position(map, GANGNAM).expect("user marker");
        adapter.hide_user_position().expect("hidden");
        adapter.hide_user_position().expect("hidden twice");

        assert!(sdk.markers().is_empty());
        assert_eq!(sdk.removals(), 1);

        adapter.show_user_position(map, GANGNAM).expect("shown again");
        assert_eq!(sdk.markers().len(), 1);
    }

    #[test]
    fn style_follows_can_type() {
        assert_eq!(MarkerStyle::from(CanType::General), MarkerStyle::General);
        assert_eq!(MarkerStyle::from(CanType::Recyclable), MarkerStyle::Recyclable);
        assert_eq!(MarkerStyle::Recyclable.image().src, "assets/RecycleIcon.png");
        assert_eq!(MarkerStyle::General.image().src, "assets/TrashCanIcon.png");
    }
}
