// GUI-subsystem binary: no console window is ever allocated by Windows in
// GUI mode; CLI mode (--input/-i flag present) runs headless on the calling
// terminal.
#![windows_subsystem = "windows"]

use std::process::ExitCode;

use eframe::egui;
use stickerfe::app::StickerFEApp;
use stickerfe::{cli, logger};

fn main() -> ExitCode {
    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        return cli::run(args);
    }

    // -- GUI mode ---------------------------------------------------------

    // Initialize session log (overwrites previous session log)
    logger::init();

    // Define the native window options
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_title("StickerFE"),
        ..Default::default()
    };

    // Run the application
    match eframe::run_native(
        "StickerFE",
        options,
        Box::new(|cc| Box::new(StickerFEApp::new(cc))),
    ) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: failed to start the UI: {}", e);
            ExitCode::FAILURE
        }
    }
}
