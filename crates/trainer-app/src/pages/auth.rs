use super::data_state::DataState;
use crate::{
    app::wake_fn,
    ui_helpers::{is_secret_empty, ui_password_edit},
    DataShared,
};
use secrecy::SecretString;
use std::sync::Arc;
use strum::IntoEnumIterator as _;
use tracing::info;
use trainer_client_core::{SignUpOutcome, Url};
use trainer_shared::{
    req_args::{OAuthProvider, SignUpReqArgs},
    session::Session,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIter)]
pub enum AuthMode {
    #[default]
    #[strum(to_string = "Password")]
    Password,
    #[strum(to_string = "Email Link")]
    EmailLink,
    #[strum(to_string = "Register")]
    Register,
}

/// Sign in and registration screen shown whenever nobody is signed in
#[derive(Debug, Default)]
pub struct UiAuth {
    mode: AuthMode,
    email: String,
    password: SecretString,
    password_confirmation: SecretString,
    first_name: String,
    last_name: String,
    create_user_with_link: bool,
    login_status: DataState<Arc<Session>>,
    link_status: DataState<()>,
    register_status: DataState<SignUpOutcome>,
    oauth_status: DataState<Url>,
}

impl UiAuth {
    pub fn new(last_email: String) -> Self {
        Self {
            email: last_email,
            ..Default::default()
        }
    }

    /// The email as last typed, kept between runs
    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn show(&mut self, ui: &mut egui::Ui, data_shared: &mut DataShared) {
        ui.vertical_centered(|ui| {
            ui.add_space(24.0);
            ui.heading("Squad Trainer");
            ui.add_space(12.0);
            self.ui_mode_selector(ui);
            ui.separator();
        });

        ui.add(egui::TextEdit::singleline(&mut self.email).hint_text("Email"));
        match self.mode {
            AuthMode::Password => self.ui_password(ui, data_shared),
            AuthMode::EmailLink => self.ui_email_link(ui, data_shared),
            AuthMode::Register => self.ui_register(ui, data_shared),
        }

        ui.add_space(12.0);
        ui.separator();
        self.ui_oauth(ui, data_shared);
    }

    fn ui_mode_selector(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            for mode in AuthMode::iter() {
                ui.selectable_value(&mut self.mode, mode, mode.to_string());
            }
        });
    }

    fn is_busy(&self) -> bool {
        self.login_status.is_awaiting()
            || self.link_status.is_awaiting()
            || self.register_status.is_awaiting()
            || self.oauth_status.is_awaiting()
    }

    fn ui_password(&mut self, ui: &mut egui::Ui, data_shared: &mut DataShared) {
        let lost_focus = ui_password_edit(ui, &mut self.password, "Password").lost_focus();
        let can_send =
            !self.is_busy() && !self.email.trim().is_empty() && !is_secret_empty(&self.password);

        let clicked = ui
            .add_enabled(can_send, egui::Button::new("Login"))
            .clicked();
        let pressed_enter = lost_focus && ui.input(|i| i.key_pressed(egui::Key::Enter));
        if clicked || (can_send && pressed_enter) {
            let rx = data_shared.client.login_password(
                self.email.clone(),
                self.password.clone(),
                wake_fn(ui.ctx().clone()),
            );
            self.login_status.start(rx);
        }

        // Once the session arrives the flow moves off this screen on its own
        self.login_status.poll(Some(ui));
    }

    fn ui_email_link(&mut self, ui: &mut egui::Ui, data_shared: &mut DataShared) {
        ui.checkbox(
            &mut self.create_user_with_link,
            "Create an account if I don't have one",
        );
        let can_send = !self.is_busy() && !self.email.trim().is_empty();
        if ui
            .add_enabled(can_send, egui::Button::new("Email me a sign in link"))
            .clicked()
        {
            let rx = data_shared.client.login_otp(
                self.email.clone(),
                self.create_user_with_link,
                wake_fn(ui.ctx().clone()),
            );
            self.link_status.start(rx);
        }

        self.link_status.poll(Some(ui));
        if self.link_status.is_present() {
            ui.label("Check your email for a link to sign in.");
        }
    }

    fn ui_register(&mut self, ui: &mut egui::Ui, data_shared: &mut DataShared) {
        ui.add(egui::TextEdit::singleline(&mut self.first_name).hint_text("First name"));
        ui.add(egui::TextEdit::singleline(&mut self.last_name).hint_text("Last name"));
        ui_password_edit(ui, &mut self.password, "Password");
        ui_password_edit(ui, &mut self.password_confirmation, "Confirm password");

        if ui
            .add_enabled(!self.is_busy(), egui::Button::new("Create account"))
            .clicked()
        {
            self.send_registration(ui, data_shared);
        }

        self.register_status.poll(Some(ui));
        if let Some(SignUpOutcome::ConfirmationRequired) = self.register_status.present() {
            ui.label("Check your email to confirm your account, then sign in.");
        }
    }

    fn send_registration(&mut self, ui: &mut egui::Ui, data_shared: &mut DataShared) {
        let args = match SignUpReqArgs::from_form(
            &self.email,
            self.password.clone(),
            &self.password_confirmation,
            &self.first_name,
            &self.last_name,
        ) {
            Ok(args) => args,
            Err(e) => {
                info!(?e, "registration form rejected");
                self.register_status = DataState::Failed(e.to_string());
                return;
            }
        };
        let rx = data_shared
            .client
            .register(args, wake_fn(ui.ctx().clone()));
        self.register_status.start(rx);
    }

    fn ui_oauth(&mut self, ui: &mut egui::Ui, data_shared: &mut DataShared) {
        ui.vertical_centered_justified(|ui| {
            for provider in OAuthProvider::iter() {
                if ui
                    .add_enabled(
                        !self.is_busy(),
                        egui::Button::new(format!("Continue with {}", provider_label(provider))),
                    )
                    .clicked()
                {
                    let rx = data_shared
                        .client
                        .login_oauth(provider, wake_fn(ui.ctx().clone()));
                    self.oauth_status.start(rx);
                }
            }
        });

        self.oauth_status.poll(Some(ui));
        if let DataState::Present(url) = &self.oauth_status {
            info!(%url, "handing over to the OAuth provider");
            ui.ctx().open_url(egui::OpenUrl::same_tab(url.as_str()));
            self.oauth_status = DataState::None;
        }
    }
}

fn provider_label(provider: OAuthProvider) -> &'static str {
    match provider {
        OAuthProvider::Google => "Google",
        OAuthProvider::Github => "GitHub",
        OAuthProvider::Apple => "Apple",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remembers_last_email() {
        let page = UiAuth::new("coach@example.com".to_string());
        assert_eq!(page.email(), "coach@example.com");
        assert_eq!(page.mode, AuthMode::Password);
        assert!(!page.is_busy());
    }

    #[test]
    fn every_provider_has_a_label() {
        let labels: Vec<_> = OAuthProvider::iter().map(provider_label).collect();
        assert_eq!(labels, ["Google", "GitHub", "Apple"]);
    }
}
