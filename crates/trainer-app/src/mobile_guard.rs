use trainer_shared::const_config::client::{CLIENT_DEFAULT_EDGE_SPACING, CLIENT_MOBILE_MAX_WIDTH};

/// Keeps content to a phone sized column and refuses to show anything on
/// wider screens
#[derive(Debug, Clone, Copy)]
pub struct MobileGuard {
    max_width: f32,
    edge_spacing: f32,
}

impl Default for MobileGuard {
    fn default() -> Self {
        Self {
            max_width: CLIENT_MOBILE_MAX_WIDTH,
            edge_spacing: CLIENT_DEFAULT_EDGE_SPACING,
        }
    }
}

impl MobileGuard {
    #[must_use]
    pub fn with_edge_spacing(mut self, edge_spacing: f32) -> Self {
        self.edge_spacing = edge_spacing.max(0.0);
        self
    }

    /// `screen_width` is the whole viewport, not what is left inside a panel
    pub fn is_too_wide(&self, screen_width: f32) -> bool {
        screen_width > self.max_width
    }

    /// Width left for content once the spacing on each side is removed
    pub fn content_width(&self, available_width: f32) -> f32 {
        (available_width.min(self.max_width) - 2.0 * self.edge_spacing).max(0.0)
    }

    /// Returns `None` if the screen was too wide and the notice was shown
    pub fn show<R>(
        &self,
        ui: &mut egui::Ui,
        add_contents: impl FnOnce(&mut egui::Ui) -> R,
    ) -> Option<R> {
        if self.is_too_wide(ui.ctx().screen_rect().width()) {
            ui.vertical_centered(|ui| {
                ui.add_space(ui.available_height() / 3.0);
                ui.heading("Mobile Only");
                ui.label(format!(
                    "This app is designed for phones. Make the window narrower than {} points to continue.",
                    self.max_width
                ));
            });
            return None;
        }
        let width = self.content_width(ui.available_width());
        let result = ui
            .horizontal_top(|ui| {
                ui.add_space(self.edge_spacing);
                ui.vertical(|ui| {
                    ui.set_width(width);
                    add_contents(ui)
                })
                .inner
            })
            .inner;
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::phone(390.0, false)]
    #[case::at_limit(430.0, false)]
    #[case::tablet(431.0, true)]
    #[case::desktop(1280.0, true)]
    fn too_wide(#[case] width: f32, #[case] expected: bool) {
        assert_eq!(MobileGuard::default().is_too_wide(width), expected);
    }

    #[rstest]
    #[case::default_spacing(MobileGuard::default(), 390.0, 350.0)]
    #[case::at_limit(MobileGuard::default(), 430.0, 390.0)]
    #[case::no_spacing(MobileGuard::default().with_edge_spacing(0.0), 300.0, 300.0)]
    #[case::tiny_screen(MobileGuard::default(), 30.0, 0.0)]
    fn content_width(#[case] guard: MobileGuard, #[case] available: f32, #[case] expected: f32) {
        assert_eq!(guard.content_width(available), expected);
    }

    /// Runs one frame at `screen_width` and reports if the content was shown
    fn shows_content_at(screen_width: f32) -> bool {
        let ctx = egui::Context::default();
        let input = egui::RawInput {
            screen_rect: Some(egui::Rect::from_min_size(
                egui::Pos2::ZERO,
                egui::vec2(screen_width, 800.0),
            )),
            ..Default::default()
        };
        let mut shown = false;
        let _ = ctx.run(input, |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| {
                shown = MobileGuard::default().show(ui, |_| ()).is_some();
            });
        });
        shown
    }

    #[rstest]
    #[case::phone(390.0, true)]
    #[case::at_limit(430.0, true)]
    // Panel margins leave less than the limit inside the panel
    #[case::just_over(440.0, false)]
    #[case::desktop(1280.0, false)]
    fn guard_uses_screen_width(#[case] screen_width: f32, #[case] expected: bool) {
        assert_eq!(shows_content_at(screen_width), expected);
    }
}
