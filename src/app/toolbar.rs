//! Toolbar rendering for `WisdomApp`.
//!
//! Draws the back/forward buttons, the location bar, the reader font
//! selector, the theme toggle and the map switch.

use eframe::egui;

use wisdom_browser::prefs::{ReaderFont, Theme};

use super::WisdomApp;

impl WisdomApp {
    /// Render the top toolbar strip.
    pub fn draw_toolbar(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.horizontal(|ui| {
            ui.add_space(4.0);

            // Back / Forward
            let (can_back, can_fwd) = self
                .context()
                .map(|w| (w.nav.history().can_go_back(), w.nav.history().can_go_forward()))
                .unwrap_or((false, false));
            if ui
                .add_enabled(
                    can_back,
                    egui::Button::new("\u{25C0}").min_size(egui::vec2(28.0, 24.0)),
                )
                .clicked()
            {
                self.go_back();
            }
            if ui
                .add_enabled(
                    can_fwd,
                    egui::Button::new("\u{25B6}").min_size(egui::vec2(28.0, 24.0)),
                )
                .clicked()
            {
                self.go_forward();
            }

            // Location bar
            let response = ui.add_sized(
                [(ui.available_width() - 260.0).max(120.0), 24.0],
                egui::TextEdit::singleline(&mut self.location_input)
                    .hint_text("?type=book&content=...")
                    .font(egui::TextStyle::Monospace),
            );
            if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                self.open_location();
            }
            if ui.button("Go").clicked() {
                self.open_location();
            }

            // Reader font
            egui::ComboBox::from_id_salt("reader_font")
                .selected_text(self.prefs.font.as_str())
                .show_ui(ui, |ui| {
                    for font in ReaderFont::ALL {
                        ui.selectable_value(&mut self.prefs.font, font, font.as_str());
                    }
                });

            // Theme toggle
            let theme_label = match self.prefs.theme {
                Theme::Dark => "\u{263E}",
                Theme::Light => "\u{2600}",
            };
            if ui.button(theme_label).on_hover_text("Toggle theme").clicked() {
                self.prefs.theme = self.prefs.theme.toggled();
                self.apply_theme(ctx);
            }

            ui.separator();
            ui.toggle_value(&mut self.show_map, "Map");
        });
    }
}
