use futures::channel::oneshot;
use std::sync::Arc;
use tracing::{info, warn};
use trainer_client_core::{Client, PageFlow, UiCallBack};
use trainer_shared::{
    const_config::route::{ROUTE_AUTH, ROUTE_HOME},
    internal_error,
    session::Session,
};

use crate::{
    mobile_guard::MobileGuard,
    navigation::{DockItem, DockItems, Location, Route},
    pages::{data_state::DataState, home, settings, training, UiAuth, UiOnboarding},
    ui_helpers::ui_loading,
};

/// Returns a callback that asks egui to draw another frame
pub fn wake_fn(ctx: egui::Context) -> impl UiCallBack {
    move || ctx.request_repaint()
}

/// What gets saved between runs
#[derive(Debug, Default, serde::Deserialize, serde::Serialize)]
#[serde(default)] // if we add new fields, give them default values when deserializing old state
pub struct PersistedState {
    pub last_email: String,
}

pub struct TrainerApp {
    persisted: PersistedState,
    data_shared: DataShared,
    guard: MobileGuard,
    dock: DockItems,
    auth_page: Option<UiAuth>,
    onboarding_page: Option<UiOnboarding>,
    oauth_callback: DataState<Arc<Session>>,
}

/// State the pages share
#[derive(Debug)]
pub struct DataShared {
    pub client: Client,
    pub location: Location,
    logout: Option<oneshot::Receiver<&'static str>>,
}

impl DataShared {
    pub fn new(client: Client, location: Location) -> Self {
        Self {
            client,
            location,
            logout: None,
        }
    }

    pub fn is_logging_out(&self) -> bool {
        self.logout.is_some()
    }

    pub fn start_logout(&mut self, ctx: &egui::Context) {
        if self.is_logging_out() {
            warn!("logout already in progress");
            return;
        }
        self.logout = Some(self.client.logout(wake_fn(ctx.clone())));
    }

    /// Navigates to where logout says to go once it finishes
    fn poll_logout(&mut self) {
        let Some(rx) = self.logout.as_mut() else {
            return;
        };
        match rx.try_recv() {
            Ok(Some(path)) => {
                self.location.navigate(path);
                self.logout = None;
            }
            Ok(None) => {}
            Err(e) => {
                internal_error!(format!("logout result channel closed: {e:?}"));
                self.logout = None;
            }
        }
    }
}

impl eframe::App for TrainerApp {
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        info!("Saving with key: {}", eframe::APP_KEY);
        eframe::set_value(storage, eframe::APP_KEY, &self.persisted);
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        #[cfg(target_arch = "wasm32")]
        self.data_shared.location.sync_from_browser();
        self.data_shared.poll_logout();

        egui::CentralPanel::default().show(ctx, |ui| {
            let guard = self.guard;
            guard.show(ui, |ui| self.show_flow(ui));
        });
    }
}

impl TrainerApp {
    /// Called once before the first frame.
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        client: Client,
        location: Location,
        guard: MobileGuard,
    ) -> Self {
        let persisted = match cc.storage {
            Some(storage) => {
                info!("Storage found. Loading...");
                eframe::get_value(storage, eframe::APP_KEY).unwrap_or_else(|| {
                    warn!("Load failed");
                    PersistedState::default()
                })
            }
            None => {
                info!("No storage found");
                PersistedState::default()
            }
        };

        let ctx = cc.egui_ctx.clone();
        client.wake_on_change(move || ctx.request_repaint());

        #[allow(unused_mut)]
        let mut oauth_callback = DataState::default();
        #[cfg(target_arch = "wasm32")]
        if let Some(callback_url) = crate::navigation::browser::take_oauth_callback() {
            info!("completing OAuth sign in");
            oauth_callback.start(
                client.complete_oauth_callback(callback_url, wake_fn(cc.egui_ctx.clone())),
            );
        }

        Self {
            persisted,
            data_shared: DataShared::new(client, location),
            guard,
            dock: tabs(),
            auth_page: None,
            onboarding_page: None,
            oauth_callback,
        }
    }

    fn show_flow(&mut self, ui: &mut egui::Ui) {
        match self.data_shared.client.page_flow() {
            PageFlow::ResolvingSession => ui_loading(ui, "Loading..."),
            PageFlow::CheckingOrganization => ui_loading(ui, "Checking your organization..."),
            PageFlow::Unauthenticated => {
                self.onboarding_page = None;
                if self.data_shared.location.route() != Route::Auth {
                    self.data_shared.location.navigate(ROUTE_AUTH);
                }
                self.oauth_callback.poll(Some(ui));
                let last_email = &self.persisted.last_email;
                let page = self
                    .auth_page
                    .get_or_insert_with(|| UiAuth::new(last_email.clone()));
                page.show(ui, &mut self.data_shared);
                if page.email() != self.persisted.last_email {
                    self.persisted.last_email = page.email().to_string();
                }
            }
            PageFlow::Onboarding => {
                self.auth_page = None;
                self.onboarding_page
                    .get_or_insert_with(Default::default)
                    .show(ui, &mut self.data_shared);
            }
            PageFlow::Routed => {
                self.auth_page = None;
                self.onboarding_page = None;
                self.show_tabs(ui);
            }
        }
    }

    fn show_tabs(&mut self, ui: &mut egui::Ui) {
        let Some(session) = self.data_shared.client.session().session else {
            warn!("routed without a session");
            return;
        };
        let route = self.data_shared.location.route();
        if matches!(route, Route::Root | Route::Auth) {
            self.data_shared.location.navigate(ROUTE_HOME);
        }

        let data_shared = &mut self.data_shared;
        let dock = &mut self.dock;
        ui.with_layout(egui::Layout::bottom_up(egui::Align::Center), |ui| {
            ui.add_space(8.0);
            dock.show(ui, &mut data_shared.location);
            ui.separator();
            ui.with_layout(egui::Layout::top_down(egui::Align::LEFT), |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| match route {
                    Route::Training => training::show(ui),
                    Route::Settings => settings::show(ui, data_shared, &session),
                    Route::Root | Route::Home | Route::Auth | Route::NotFound => {
                        home::show(ui, data_shared, &session)
                    }
                });
            });
        });
    }
}

fn tabs() -> DockItems {
    DockItems::new(vec![
        DockItem::new("Home", "🏠"),
        DockItem::new("Training", "🏋"),
        DockItem::new("Settings", "⚙"),
    ])
}
