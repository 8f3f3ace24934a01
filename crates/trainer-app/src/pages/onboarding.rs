use super::data_state::DataState;
use crate::{app::wake_fn, DataShared};
use trainer_shared::organization::Organization;

/// Shown to signed in users who do not belong to an organization yet
#[derive(Debug, Default)]
pub struct UiOnboarding {
    org_name: String,
    invitee_emails: Vec<String>,
    data_state: DataState<Organization>,
}

impl UiOnboarding {
    pub fn show(&mut self, ui: &mut egui::Ui, data_shared: &mut DataShared) {
        ui.vertical_centered(|ui| {
            ui.add_space(24.0);
            ui.heading("Create your organization");
            ui.label("Your squad trains together in an organization. Invite your teammates now or later.");
        });
        ui.add_space(12.0);

        ui.add(egui::TextEdit::singleline(&mut self.org_name).hint_text("Organization name"));

        ui.add_space(8.0);
        ui.label("Invite teammates");
        self.ui_invitees(ui);

        ui.add_space(12.0);
        let can_send = !self.data_state.is_awaiting() && !self.org_name.trim().is_empty();
        if ui
            .add_enabled(can_send, egui::Button::new("Create organization"))
            .clicked()
        {
            let rx = data_shared.client.create_organization(
                self.org_name.clone(),
                self.invitee_emails.clone(),
                wake_fn(ui.ctx().clone()),
            );
            self.data_state.start(rx);
        }

        self.data_state.poll(Some(ui));
        if let Some(organization) = self.data_state.present() {
            ui.label(format!("{} is ready", organization.name));
        }

        ui.add_space(24.0);
        if ui.link("Sign out").clicked() {
            data_shared.start_logout(ui.ctx());
        }
    }

    fn ui_invitees(&mut self, ui: &mut egui::Ui) {
        let mut to_remove = None;
        for (i, email) in self.invitee_emails.iter_mut().enumerate() {
            ui.horizontal(|ui| {
                ui.add(egui::TextEdit::singleline(email).hint_text("teammate@example.com"));
                if ui.small_button("✖").on_hover_text("Remove").clicked() {
                    to_remove = Some(i);
                }
            });
        }
        if let Some(i) = to_remove {
            self.remove_invitee(i);
        }
        if ui.button("➕ Add teammate").clicked() {
            self.add_invitee();
        }
    }

    fn add_invitee(&mut self) {
        self.invitee_emails.push(String::new());
    }

    fn remove_invitee(&mut self, index: usize) {
        if index < self.invitee_emails.len() {
            self.invitee_emails.remove(index);
        }
    }
}
