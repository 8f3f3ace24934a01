use crate::{
    ui_helpers::{ui_avatar, ui_field},
    DataShared,
};
use trainer_shared::session::Session;

pub fn show(ui: &mut egui::Ui, data_shared: &mut DataShared, session: &Session) {
    let user = &session.user;
    ui.heading("Settings");
    ui.add_space(8.0);

    ui.label(egui::RichText::new("Profile").strong());
    ui.horizontal(|ui| {
        ui_avatar(ui, &user.initials(), 32.0);
        ui.label(user.display_name());
    });
    ui_field(ui, "Email", user.email().unwrap_or("-"));
    ui_field(
        ui,
        "Session expires",
        session.expires_at.display_as_locale_datetime(),
    );
    ui.separator();

    ui.label(egui::RichText::new("Organization").strong());
    match data_shared.client.current_organization() {
        Some(state) if state.is_loading => {
            ui.spinner();
        }
        Some(state) => match state.organization {
            Some(org) => {
                ui_field(ui, "Name", org.organization.name);
                ui_field(ui, "Role", org.member.role.to_string());
                ui_field(
                    ui,
                    "Joined",
                    org.member.joined_at.format("%Y-%m-%d").to_string(),
                );
            }
            None => {
                ui.label("No organization found");
            }
        },
        None => {
            ui.label("Not signed in");
        }
    }
    ui.separator();

    ui.label(egui::RichText::new("Appearance").strong());
    egui::widgets::global_theme_preference_buttons(ui);
    ui.separator();

    let is_logging_out = data_shared.is_logging_out();
    if ui
        .add_enabled(!is_logging_out, egui::Button::new("Sign out"))
        .clicked()
    {
        data_shared.start_logout(ui.ctx());
    }
    if is_logging_out {
        ui.spinner();
    }
}
