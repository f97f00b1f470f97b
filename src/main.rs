// src/main.rs
use eframe::egui;
use pose_overlay::app;

fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // List available cameras before the session starts; a misbehaving
    // camera stack is easier to diagnose from this log than from the UI.
    match nokhwa::query(nokhwa::utils::ApiBackend::Auto) {
        Ok(cameras) => {
            tracing::info!("found {} camera(s)", cameras.len());
            for (i, camera) in cameras.iter().enumerate() {
                tracing::info!("  [{}] {}", i, camera.human_name());
            }
        }
        Err(e) => {
            tracing::warn!("failed to query cameras: {e}");
        }
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1000.0, 760.0])
            .with_min_inner_size([640.0, 480.0]),
        centered: true,
        ..Default::default()
    };

    let result = eframe::run_native(
        "Pose Overlay",
        options,
        Box::new(|cc| Box::new(app::PoseOverlayApp::new(cc))),
    );

    if let Err(e) = result {
        eprintln!("Error running application: {:?}", e);
    }
}
