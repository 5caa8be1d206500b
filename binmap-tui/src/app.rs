use binmap_core::{
    controller::MapViewController,
    model::{MarkerHandle, ViewState},
    overlay::OverlayView,
};

use crate::modal::ModalRoot;
use crate::terminal_map::{MapSnapshot, TerminalMap};

pub(crate) struct App {
    pub controller: MapViewController,
    pub map: TerminalMap,
    pub modal: ModalRoot,

    /// Index into the clickable markers, west to east.
    pub selected: usize,

    pub busy: bool,
    pub status: Option<String>,
}

impl App {
    pub(crate) fn new(controller: MapViewController, map: TerminalMap, modal: ModalRoot) -> Self {
        Self {
            controller,
            map,
            modal,
            selected: 0,
            busy: false,
            status: None,
        }
    }

    pub(crate) fn state(&self) -> ViewState {
        self.controller.state()
    }

    pub(crate) fn snapshot(&self) -> MapSnapshot {
        self.map.snapshot()
    }

    pub(crate) fn overlay(&self) -> Option<OverlayView> {
        self.modal.current()
    }

    pub(crate) fn selected_marker(&self) -> Option<MarkerHandle> {
        self.map.clickable().get(self.selected).copied()
    }

    pub(crate) fn select_next(&mut self) {
        let count = self.map.clickable().len();
        if count > 0 {
            self.selected = (self.selected + 1) % count;
        }
    }

    pub(crate) fn select_prev(&mut self) {
        let count = self.map.clickable().len();
        if count > 0 {
            self.selected = (self.selected + count - 1) % count;
        }
    }

    /// Keep the selection on a marker after the marker set changed.
    pub(crate) fn clamp_selection(&mut self) {
        let count = self.map.clickable().len();
        if self.selected >= count {
            self.selected = count.saturating_sub(1);
        }
    }

    /// Click the selected marker and let the controller open its overlay.
    pub(crate) fn click_selected(&mut self) -> bool {
        let Some(marker) = self.selected_marker() else {
            self.status = Some("No bin selected".into());
            return false;
        };
        if !self.map.click(marker) {
            return false;
        }
        self.controller.dispatch_clicks() > 0
    }

    pub(crate) fn close_overlay(&mut self) -> bool {
        self.controller.close_overlay()
    }
}
