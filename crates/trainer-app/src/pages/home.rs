use super::training::PLACEHOLDER_SESSIONS;
use crate::{ui_helpers::ui_avatar, DataShared};
use trainer_shared::session::Session;

pub fn show(ui: &mut egui::Ui, data_shared: &DataShared, session: &Session) {
    let user = &session.user;
    ui.horizontal(|ui| {
        ui_avatar(ui, &user.initials(), 48.0);
        ui.vertical(|ui| {
            ui.heading(format!("Hi, {}", user.display_name()));
            if let Some(org) = data_shared
                .client
                .current_organization()
                .and_then(|state| state.organization)
            {
                ui.label(egui::RichText::new(org.organization.name).weak());
            }
        });
    });
    ui.separator();

    ui.label(egui::RichText::new("Up next").strong());
    match PLACEHOLDER_SESSIONS.first() {
        Some(next) => {
            ui.label(format!("{} on {} at {}", next.title, next.day, next.time));
        }
        None => {
            ui.label("Nothing scheduled");
        }
    }
}
