use secrecy::{ExposeSecret as _, SecretString};

pub fn ui_password_edit(
    ui: &mut egui::Ui,
    password: &mut SecretString,
    hint_text: &str,
) -> egui::Response {
    let mut temp = password.expose_secret().to_owned();
    let result = ui.add(
        egui::TextEdit::singleline(&mut temp)
            .password(true)
            .hint_text(hint_text),
    );
    *password = SecretString::from(temp);
    result
}

pub fn is_secret_empty(secret: &SecretString) -> bool {
    secret.expose_secret().is_empty()
}

/// Round badge with the user's initials
pub fn ui_avatar(ui: &mut egui::Ui, initials: &str, diameter: f32) -> egui::Response {
    let (rect, response) =
        ui.allocate_exact_size(egui::vec2(diameter, diameter), egui::Sense::hover());
    if ui.is_rect_visible(rect) {
        let painter = ui.painter();
        painter.circle_filled(rect.center(), diameter / 2.0, ui.visuals().selection.bg_fill);
        painter.text(
            rect.center(),
            egui::Align2::CENTER_CENTER,
            initials,
            egui::FontId::proportional(diameter * 0.4),
            ui.visuals().strong_text_color(),
        );
    }
    response
}

/// Spinner with a caption, used while a gate is waiting on the backend
pub fn ui_loading(ui: &mut egui::Ui, caption: &str) {
    ui.vertical_centered(|ui| {
        ui.add_space(ui.available_height() / 3.0);
        ui.spinner();
        ui.label(caption);
    });
}

/// Label/value pair laid out on one row
pub fn ui_field(ui: &mut egui::Ui, label: &str, value: impl Into<egui::WidgetText>) {
    ui.horizontal(|ui| {
        ui.label(egui::RichText::new(label).weak());
        ui.label(value);
    });
}
