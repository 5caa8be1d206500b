//! Traits describing the external collaborators of the map view and shared error types.

use async_trait::async_trait;
use reqwest::Error as ReqwestError;

use crate::adapter::MarkerStyle;
use crate::model::{MapHandle, MarkerHandle, Position, ReceptacleRecord};
use crate::overlay::{OverlayView, SubtreeId};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to the platform, the map SDK, or the receptacle service.
pub enum PortError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// The current position could not be determined.
    #[error("Location unavailable: {0}")]
    LocationUnavailable(LocationFailure),
    /// The map SDK could not be loaded.
    #[error("Map SDK failed to load: {0}")]
    SdkLoad(String),
    /// The map SDK rejected a marker operation.
    #[error("Marker operation failed: {0}")]
    MarkerOperation(String),
    /// The rendering host could not mount or unmount a subtree.
    #[error("Rendering surface error: {0}")]
    Surface(String),
    /// Internal provider error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Why the platform could not produce a position.
pub enum LocationFailure {
    /// The user or platform refused location access.
    #[error("permission denied")]
    PermissionDenied,
    /// No fix arrived in time.
    #[error("timed out waiting for a fix")]
    Timeout,
    /// The device has no location source.
    #[error("no location hardware")]
    NoHardware,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
/// Single-shot access to the platform's geolocation.
pub trait LocationPort: Send + Sync {
    /// Request the current position once.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::LocationUnavailable`] when no position can be produced.
    async fn acquire(&self) -> Result<Position, PortError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
/// Remote source of receptacle records.
pub trait ReceptaclePort: Send + Sync {
    /// Fetch the receptacles near `position`. Each call returns the full current list.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the service cannot be reached or answers with garbage.
    async fn near(&self, position: Position) -> Result<Vec<ReceptacleRecord>, PortError>;
}

/// Callback fired by the map SDK when a marker is clicked.
pub type ClickCallback = Box<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Image used to draw a marker.
pub struct MarkerImage {
    /// Asset path of the icon.
    pub src: &'static str,
    /// Edge length in pixels.
    pub size: u32,
    /// Anchor offset of the icon tip relative to its top-left corner.
    pub offset: (i32, i32),
}

#[async_trait]
/// Vendor map SDK primitives. Only [`crate::adapter::MapProviderAdapter`] talks to an SDK.
pub trait MapSdk: Send + Sync {
    /// Load the SDK script. Callers guarantee this runs at most once.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::SdkLoad`] when the SDK is unavailable.
    async fn load(&self) -> Result<(), PortError>;

    /// Instantiate a map inside `container`.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the container does not exist or the SDK refuses.
    fn create_map(
        &mut self,
        container: &str,
        center: Position,
        level: u8,
    ) -> Result<MapHandle, PortError>;

    /// Move the camera of `map`.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the map is unknown to the SDK.
    fn set_center(&mut self, map: MapHandle, center: Position) -> Result<(), PortError>;

    /// Draw a marker on `map`.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::MarkerOperation`] when the SDK cannot place the marker.
    fn add_marker(
        &mut self,
        map: MapHandle,
        position: Position,
        image: &MarkerImage,
        clickable: bool,
    ) -> Result<MarkerHandle, PortError>;

    /// Take a marker off `map`, dropping its listeners.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::MarkerOperation`] when the SDK fails to remove the marker.
    fn remove_marker(&mut self, map: MapHandle, marker: MarkerHandle) -> Result<(), PortError>;

    /// Attach a click listener to a marker.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::MarkerOperation`] when the marker cannot take listeners.
    fn add_click_listener(
        &mut self,
        marker: MarkerHandle,
        callback: ClickCallback,
    ) -> Result<(), PortError>;
}

#[async_trait]
/// Narrow map capability used by the view: one map, receptacle markers, and the user's marker.
pub trait MapPort: Send + Sync {
    /// Load the SDK if needed and create a map centered at `center`.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the SDK cannot be loaded or the map cannot be created.
    async fn initialize(&mut self, container: &str, center: Position)
    -> Result<MapHandle, PortError>;

    /// Place a clickable receptacle marker.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::MarkerOperation`] when placement fails.
    fn place_marker(
        &mut self,
        map: MapHandle,
        position: Position,
        style: MarkerStyle,
    ) -> Result<MarkerHandle, PortError>;

    /// Remove a marker. Removing an unknown or already removed marker does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::MarkerOperation`] when the SDK fails to remove a live marker.
    /// The marker is still live afterwards and removal may be retried.
    fn remove_marker(&mut self, map: MapHandle, marker: MarkerHandle) -> Result<(), PortError>;

    /// Move the camera.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the SDK rejects the map.
    fn center_on(&mut self, map: MapHandle, position: Position) -> Result<(), PortError>;

    /// Register the single click callback of a marker.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::MarkerOperation`] when the marker is unknown or already has a callback.
    fn on_marker_click(
        &mut self,
        marker: MarkerHandle,
        callback: ClickCallback,
    ) -> Result<(), PortError>;

    /// Draw the non-clickable user marker at `position`, replacing a previous one.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::MarkerOperation`] when the SDK cannot draw the marker.
    fn show_user_position(&mut self, map: MapHandle, position: Position) -> Result<(), PortError>;

    /// Take the user marker off the map. Does nothing when none is shown.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::MarkerOperation`] when the SDK fails to remove the marker;
    /// the marker stays tracked so a later call can retry.
    fn hide_user_position(&mut self) -> Result<(), PortError>;
}

/// Rendering host able to mount detached subtrees on a named attachment point.
pub trait OverlaySurface: Send + Sync {
    /// Mount `view` under `attachment`, returning the id of the new subtree.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Surface`] when the attachment point is missing.
    fn mount(&self, attachment: &str, view: OverlayView) -> Result<SubtreeId, PortError>;

    /// Unmount a subtree. Unknown ids are ignored.
    fn unmount(&self, subtree: SubtreeId);
}
