use pose_overlay::camera::open_camera;
use pose_overlay::config::PipelineConfig;

fn main() {
    println!("Testing camera access...\n");

    let config = PipelineConfig::load_or_default("pose_overlay.json");
    println!(
        "Requesting camera {} at {}x{} @ {} fps",
        config.camera_index, config.frame_width, config.frame_height, config.fps
    );

    // Same open path as the capture loop, so a failure here prints the
    // exact status line the app would show.
    match open_camera(&config) {
        Ok(mut camera) => {
            println!("✓ Camera opened and stream started");
            match camera.frame() {
                Ok(frame) => println!(
                    "✓ Frame captured: {}x{}",
                    frame.resolution().width(),
                    frame.resolution().height()
                ),
                Err(e) => println!("✗ Failed to capture frame: {}", e),
            }
        }
        Err(e) => {
            println!("✗ {}", e);
            println!("\nPossible causes:");
            println!("1. Camera is being used by another app");
            println!("2. Camera permissions not granted");
            println!("3. No camera connected");
        }
    }
}
