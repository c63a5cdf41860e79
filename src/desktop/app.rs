//! Main eframe application

use eframe::egui;

use super::state::UiState;
use super::views::{ChatView, SettingsView, SidebarView};
use super::worker::WorkerHandle;

/// The main desktop application
pub struct DesktopApp {
    state: UiState,
    worker: WorkerHandle,
}

impl DesktopApp {
    /// Create a new desktop app
    pub fn new(cc: &eframe::CreationContext<'_>, model_override: Option<String>) -> Self {
        Self::configure_style(&cc.egui_ctx);

        // Start the background worker
        let worker = WorkerHandle::start(model_override);

        Self {
            state: UiState::new(),
            worker,
        }
    }

    fn configure_style(ctx: &egui::Context) {
        let mut style = (*ctx.style()).clone();

        // Use slightly larger text
        style.text_styles.insert(
            egui::TextStyle::Body,
            egui::FontId::new(14.0, egui::FontFamily::Proportional),
        );
        style.text_styles.insert(
            egui::TextStyle::Button,
            egui::FontId::new(14.0, egui::FontFamily::Proportional),
        );
        style.text_styles.insert(
            egui::TextStyle::Heading,
            egui::FontId::new(18.0, egui::FontFamily::Proportional),
        );

        // Rounded corners
        style.visuals.window_corner_radius = egui::CornerRadius::same(8);
        style.visuals.widgets.noninteractive.corner_radius = egui::CornerRadius::same(4);
        style.visuals.widgets.inactive.corner_radius = egui::CornerRadius::same(4);
        style.visuals.widgets.hovered.corner_radius = egui::CornerRadius::same(4);
        style.visuals.widgets.active.corner_radius = egui::CornerRadius::same(4);

        ctx.set_style(style);
    }

    /// Process all pending worker messages
    fn process_worker_messages(&mut self) {
        while let Some(msg) = self.worker.try_recv() {
            self.state.handle_worker_message(msg);
        }
    }

    fn dispatch(&mut self, msg: Option<super::state::UiMessage>) {
        if let Some(msg) = msg
            && let Err(e) = self.worker.send(msg)
        {
            self.state.error = Some(format!("Failed to send to worker: {}", e));
        }
    }
}

impl eframe::App for DesktopApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_worker_messages();

        // Request repaint while loading or streaming
        if self.state.is_loading || !self.state.streaming_content.is_empty() || self.state.pulling {
            ctx.request_repaint();
        }

        let sidebar_msg = egui::SidePanel::left("sessions_sidebar")
            .default_width(220.0)
            .show(ctx, |ui| SidebarView::show(ui, &mut self.state))
            .inner;
        self.dispatch(sidebar_msg);

        let settings_msg = if self.state.show_settings {
            SettingsView::show(ctx, &mut self.state)
        } else {
            None
        };
        self.dispatch(settings_msg);

        let chat_msg = egui::CentralPanel::default()
            .show(ctx, |ui| ChatView::show(ui, &mut self.state))
            .inner;
        self.dispatch(chat_msg);
    }
}
