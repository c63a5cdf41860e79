//! Session sidebar: new chat, session list, settings toggle.

use eframe::egui;

use super::super::state::{UiMessage, UiState};

pub struct SidebarView;

impl SidebarView {
    pub fn show(ui: &mut egui::Ui, state: &mut UiState) -> Option<UiMessage> {
        let mut msg = None;

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            if ui.button("+ New Chat").clicked() {
                msg = Some(UiMessage::NewSession);
            }
            if ui.button("Settings").clicked() {
                state.show_settings = !state.show_settings;
            }
        });
        ui.separator();

        egui::ScrollArea::vertical().show(ui, |ui| {
            let sessions = state.sessions.clone();
            for session in &sessions {
                let selected = state.current_session.as_deref() == Some(session.id.as_str());

                ui.horizontal(|ui| {
                    let label = ui.selectable_label(selected, &session.title);
                    if label.clicked() && !selected {
                        msg = Some(UiMessage::LoadSession(session.id.clone()));
                    }

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.small_button("x").clicked() {
                            msg = Some(UiMessage::DeleteSession(session.id.clone()));
                        }
                    });
                });
            }

            if sessions.is_empty() {
                ui.weak("No saved chats yet");
            }
        });

        msg
    }
}
