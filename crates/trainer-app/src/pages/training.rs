#[derive(Debug)]
pub struct TrainingSession {
    pub title: &'static str,
    pub day: &'static str,
    pub time: &'static str,
    pub focus: &'static str,
}

// TODO 3: Replace with sessions loaded for the user's organization once the
//          backend has a schedule table
pub const PLACEHOLDER_SESSIONS: &[TrainingSession] = &[
    TrainingSession {
        title: "Conditioning",
        day: "Monday",
        time: "18:00",
        focus: "Endurance",
    },
    TrainingSession {
        title: "Skills",
        day: "Wednesday",
        time: "18:30",
        focus: "Passing and receiving",
    },
    TrainingSession {
        title: "Match prep",
        day: "Friday",
        time: "17:00",
        focus: "Set pieces",
    },
];

pub fn show(ui: &mut egui::Ui) {
    ui.heading("Training");
    ui.add_space(8.0);
    for session in PLACEHOLDER_SESSIONS {
        egui::Frame::group(ui.style()).show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.label(egui::RichText::new(session.title).strong());
            ui.label(format!("{} {}", session.day, session.time));
            ui.label(egui::RichText::new(session.focus).weak());
        });
        ui.add_space(4.0);
    }
}
