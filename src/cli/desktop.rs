//! Desktop GUI launch command

use anyhow::Result;
use clap::Args;

#[derive(Args)]
pub struct DesktopArgs {
    /// Model to use (overrides config)
    #[arg(short, long)]
    pub model: Option<String>,
}

pub fn run(args: DesktopArgs) -> Result<()> {
    use crate::desktop::DesktopApp;

    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([1000.0, 700.0])
            .with_min_inner_size([500.0, 400.0])
            .with_title("Ferret"),
        ..Default::default()
    };

    eframe::run_native(
        "Ferret",
        native_options,
        Box::new(move |cc| Ok(Box::new(DesktopApp::new(cc, args.model.clone())))),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run desktop app: {}", e))
}
