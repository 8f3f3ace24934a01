//! The url path being shown and the bottom dock that changes it

use std::fmt::Debug;
use tracing::{error, info, warn};
use trainer_shared::const_config::{
    client::{CLIENT_DOCK_MAX_ITEMS, CLIENT_DOCK_MIN_ITEMS},
    route::{ROUTE_AUTH, ROUTE_HOME, ROUTE_ROOT, ROUTE_SETTINGS, ROUTE_TRAINING},
};

/// Screens reachable by url
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Root,
    Home,
    Training,
    Settings,
    Auth,
    /// Shows whatever top level screen suits the session
    NotFound,
}

/// First segment of `path` without any query or fragment, e.g. `training`
/// for `/training/today?x=1`
fn first_segment(path: &str) -> &str {
    path.trim_start_matches('/')
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
}

impl Route {
    /// Only the first segment counts so nested paths stay on their screen
    pub fn from_path(path: &str) -> Self {
        match format!("/{}", first_segment(path)).as_str() {
            ROUTE_ROOT => Self::Root,
            ROUTE_HOME => Self::Home,
            ROUTE_TRAINING => Self::Training,
            ROUTE_SETTINGS => Self::Settings,
            ROUTE_AUTH => Self::Auth,
            _ => Self::NotFound,
        }
    }
}

/// Current url path. On the web it is kept in sync with the browser's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    path: String,
}

impl Default for Location {
    fn default() -> Self {
        Self::new(ROUTE_ROOT)
    }
}

impl Location {
    pub fn new<S: Into<String>>(path: S) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn route(&self) -> Route {
        Route::from_path(&self.path)
    }

    pub fn navigate(&mut self, path: &str) {
        if self.path == path {
            return;
        }
        info!(from = %self.path, to = path, "navigating");
        self.path = path.to_string();
        #[cfg(target_arch = "wasm32")]
        browser::push_path(path);
    }

    /// Picks up changes made by the browser (back/forward buttons)
    #[cfg(target_arch = "wasm32")]
    pub fn sync_from_browser(&mut self) {
        if let Some(path) = browser::current_path() {
            if path != self.path {
                info!(from = %self.path, to = %path, "browser changed location");
                self.path = path;
            }
        }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn from_browser() -> Self {
        Self::new(browser::current_path().unwrap_or_else(|| ROUTE_ROOT.to_string()))
    }
}

#[cfg(target_arch = "wasm32")]
pub mod browser {
    use tracing::warn;
    use trainer_shared::log_err_as_warn;

    pub fn current_path() -> Option<String> {
        web_sys::window()?.location().pathname().ok()
    }

    pub fn push_path(path: &str) {
        let Some(history) = web_sys::window().and_then(|w| w.history().ok()) else {
            warn!("no browser history available");
            return;
        };
        log_err_as_warn!(history.push_state_with_url(
            &eframe::wasm_bindgen::JsValue::NULL,
            "",
            Some(path)
        ));
    }

    /// Returns the full url if the OAuth provider just redirected back with
    /// tokens and removes them from the address bar
    pub fn take_oauth_callback() -> Option<String> {
        let window = web_sys::window()?;
        let location = window.location();
        let href = location.href().ok()?;
        let hash = location.hash().ok().unwrap_or_default();
        let search = location.search().ok().unwrap_or_default();
        if !super::is_oauth_callback(&hash, &search) {
            return None;
        }
        let path = location.pathname().ok()?;
        if let Ok(history) = window.history() {
            if let Err(e) =
                history.replace_state_with_url(&eframe::wasm_bindgen::JsValue::NULL, "", Some(&path))
            {
                warn!(?e, "failed to remove tokens from the url");
            }
        }
        Some(href)
    }
}

/// The provider either hands back tokens in the fragment or reports an error in
/// the query string or the fragment
#[cfg(any(test, target_arch = "wasm32"))]
fn is_oauth_callback(hash: &str, search: &str) -> bool {
    let has_param = |params: &str, name: &str| {
        params
            .trim_start_matches(['#', '?'])
            .split('&')
            .any(|pair| pair.split('=').next() == Some(name))
    };
    has_param(hash, "access_token") || has_param(hash, "error") || has_param(search, "error")
}

pub struct DockItem {
    label: String,
    icon: String,
    on_select: Option<Box<dyn FnMut()>>,
}

impl Debug for DockItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockItem")
            .field("label", &self.label)
            .field("icon", &self.icon)
            .field("has_on_select", &self.on_select.is_some())
            .finish()
    }
}

impl DockItem {
    pub fn new<S: Into<String>>(label: S, icon: S) -> Self {
        Self {
            label: label.into(),
            icon: icon.into(),
            on_select: None,
        }
    }

    /// Called after navigating when this item is selected
    #[must_use]
    pub fn on_select<F: FnMut() + 'static>(mut self, callback: F) -> Self {
        self.on_select = Some(Box::new(callback));
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The path segment this item navigates to
    pub fn segment(&self) -> String {
        self.label.to_lowercase()
    }
}

/// Destinations shown in the bottom dock
///
/// Only between [`CLIENT_DOCK_MIN_ITEMS`] and [`CLIENT_DOCK_MAX_ITEMS`] items
/// are shown. Any other number is logged and nothing is rendered.
#[derive(Debug, Default)]
pub struct DockItems {
    items: Vec<DockItem>,
}

impl DockItems {
    pub fn new(items: Vec<DockItem>) -> Self {
        let count = items.len();
        if !(CLIENT_DOCK_MIN_ITEMS..=CLIENT_DOCK_MAX_ITEMS).contains(&count) {
            error!(
                count,
                min = CLIENT_DOCK_MIN_ITEMS,
                max = CLIENT_DOCK_MAX_ITEMS,
                "invalid number of dock items, dock will not be shown"
            );
            return Self::default();
        }
        Self { items }
    }

    pub fn is_renderable(&self) -> bool {
        !self.items.is_empty()
    }

    /// The item matching the first segment of `path`, defaults to the first
    pub fn active_index(&self, path: &str) -> usize {
        let segment = first_segment(path);
        self.items
            .iter()
            .position(|item| item.segment() == segment)
            .unwrap_or(0)
    }

    pub fn select(&mut self, index: usize, location: &mut Location) {
        let Some(item) = self.items.get_mut(index) else {
            warn!(index, count = self.items.len(), "selected dock item does not exist");
            return;
        };
        location.navigate(&format!("/{}", item.segment()));
        if let Some(on_select) = item.on_select.as_mut() {
            on_select();
        }
    }

    pub fn show(&mut self, ui: &mut egui::Ui, location: &mut Location) {
        if !self.is_renderable() {
            return;
        }
        let active = self.active_index(location.path());
        let mut clicked = None;
        ui.columns(self.items.len(), |columns| {
            for (i, (column, item)) in columns.iter_mut().zip(self.items.iter()).enumerate() {
                column.vertical_centered(|ui| {
                    let text = format!("{}\n{}", item.icon, item.label);
                    if ui.selectable_label(i == active, text).clicked() {
                        clicked = Some(i);
                    }
                });
            }
        });
        if let Some(index) = clicked {
            self.select(index, location);
        }
    }
}
