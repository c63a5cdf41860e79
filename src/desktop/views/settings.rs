//! Settings window: model management, memory, and data controls.

use eframe::egui;

use super::super::state::{UiMessage, UiState};

pub struct SettingsView;

impl SettingsView {
    /// Render the settings window. Returns a command for the worker, if any.
    pub fn show(ctx: &egui::Context, state: &mut UiState) -> Option<UiMessage> {
        let mut msg = None;
        let mut open = state.show_settings;

        egui::Window::new("Preferences")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .default_width(380.0)
            .show(ctx, |ui| {
                ui.heading("Active model");
                ui.horizontal(|ui| {
                    let mut selected = state.model.clone();
                    egui::ComboBox::from_id_salt("model_selector")
                        .selected_text(&selected)
                        .show_ui(ui, |ui| {
                            for model in &state.models {
                                ui.selectable_value(&mut selected, model.clone(), model);
                            }
                        });
                    if selected != state.model {
                        state.model = selected.clone();
                        msg = Some(UiMessage::SetModel(selected));
                    }

                    if ui.small_button("Refresh").clicked() {
                        msg = Some(UiMessage::RefreshModels);
                    }
                });
                ui.weak(format!("Server: {}", state.endpoint));
                ui.add_space(10.0);

                ui.heading("Download model");
                ui.horizontal(|ui| {
                    ui.add(
                        egui::TextEdit::singleline(&mut state.pull_input)
                            .hint_text("e.g., llama3.2, mistral"),
                    );
                    let can_pull = !state.pulling && !state.pull_input.trim().is_empty();
                    if ui
                        .add_enabled(can_pull, egui::Button::new("Download"))
                        .clicked()
                    {
                        state.pulling = true;
                        state.pull_status = Some("Starting download...".to_string());
                        msg = Some(UiMessage::PullModel(state.pull_input.trim().to_string()));
                    }
                });
                if let Some(ref status) = state.pull_status {
                    ui.horizontal(|ui| {
                        if state.pulling {
                            ui.spinner();
                        }
                        ui.weak(status);
                    });
                }
                ui.add_space(10.0);

                ui.heading("Data & privacy");
                ui.label(format!("Stored memories: {}", state.memory_count));
                if ui.button("Wipe vector memory").clicked() {
                    msg = Some(UiMessage::WipeMemory);
                }
                if ui.button("Delete current chat").clicked()
                    && let Some(id) = state.current_session.clone()
                {
                    msg = Some(UiMessage::DeleteSession(id));
                }
            });

        state.show_settings = open;
        msg
    }
}
