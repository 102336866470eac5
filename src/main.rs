mod app;
mod ui;

use eframe::egui;

use wisdom_browser::config::WisdomConfig;

use app::WisdomApp;

fn main() -> eframe::Result<()> {
    env_logger::init();

    let config = match WisdomConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Configuration error: {}", e);
            eprintln!("wisdom: {}", e);
            std::process::exit(2);
        }
    };
    log::info!(
        "Index sheet: {}, start location: {}",
        config.index_url,
        config.start_location
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([360.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Wisdom",
        options,
        Box::new(|cc| Ok(Box::new(WisdomApp::new(cc, config)))),
    )
}
