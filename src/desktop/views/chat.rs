//! Chat transcript and input row.

use eframe::egui;

use super::super::state::{MessageRole, UiMessage, UiState};
use crate::engine::Mode;

pub struct ChatView;

impl ChatView {
    pub fn show(ui: &mut egui::Ui, state: &mut UiState) -> Option<UiMessage> {
        let mut msg = None;

        // Input row pinned to the bottom
        egui::TopBottomPanel::bottom("input_row")
            .show_separator_line(true)
            .show_inside(ui, |ui| {
                ui.add_space(6.0);
                msg = Self::show_input_row(ui, state);
                ui.add_space(6.0);
            });

        egui::CentralPanel::default().show_inside(ui, |ui| {
            Self::show_transcript(ui, state);
        });

        msg
    }

    fn show_transcript(ui: &mut egui::Ui, state: &mut UiState) {
        let scroll = egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .stick_to_bottom(state.scroll_to_bottom);

        scroll.show(ui, |ui| {
            for message in &state.messages {
                Self::show_message(ui, message.role, &message.content);
            }

            // Reply still streaming in
            if !state.streaming_content.is_empty() {
                Self::show_message(ui, MessageRole::Assistant, &state.streaming_content);
            }

            if let Some(ref progress) = state.progress {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.weak(progress);
                });
            } else if state.is_loading && state.streaming_content.is_empty() {
                ui.spinner();
            }

            if let Some(error) = state.error.clone() {
                ui.colored_label(egui::Color32::from_rgb(220, 50, 50), error);
                if ui.small_button("Dismiss").clicked() {
                    state.clear_error();
                }
            }
        });

        state.scroll_to_bottom = false;
    }

    fn show_message(ui: &mut egui::Ui, role: MessageRole, content: &str) {
        let (label, color) = match role {
            MessageRole::User => ("You", egui::Color32::from_rgb(70, 130, 220)),
            MessageRole::Assistant => ("Ferret", egui::Color32::from_rgb(100, 180, 120)),
            MessageRole::System => ("System", egui::Color32::GRAY),
        };

        ui.add_space(6.0);
        ui.label(egui::RichText::new(label).strong().color(color));
        ui.label(content);
    }

    fn show_input_row(ui: &mut egui::Ui, state: &mut UiState) -> Option<UiMessage> {
        let mut msg = None;

        ui.horizontal(|ui| {
            // Mode selector
            let previous_mode = state.mode;
            egui::ComboBox::from_id_salt("mode_selector")
                .selected_text(state.mode.as_str())
                .show_ui(ui, |ui| {
                    for mode in Mode::ALL {
                        ui.selectable_value(&mut state.mode, mode, mode.as_str())
                            .on_hover_text(mode.description());
                    }
                });
            if state.mode != previous_mode {
                msg = Some(UiMessage::SetMode(state.mode));
            }

            let (send_clicked, input_response) = ui
                .with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let send = ui
                        .add_enabled(!state.is_loading, egui::Button::new("Send"))
                        .clicked();
                    let input = ui.add_sized(
                        ui.available_size(),
                        egui::TextEdit::singleline(&mut state.input)
                            .hint_text("Ask anything...")
                            .interactive(!state.is_loading),
                    );
                    (send, input)
                })
                .inner;

            let submitted = input_response.lost_focus()
                && ui.input(|i| i.key_pressed(egui::Key::Enter));

            if (send_clicked || submitted) && !state.input.trim().is_empty() {
                let text = std::mem::take(&mut state.input);
                state.add_user_message(text.clone());
                state.is_loading = true;
                msg = Some(UiMessage::Chat(text));
                input_response.request_focus();
            }
        });

        msg
    }
}
