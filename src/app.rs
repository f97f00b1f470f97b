// src/app.rs - egui shell: preview, overlay and status line
use crate::camera::{Frame, NokhwaSource};
use crate::config::PipelineConfig;
use crate::orientation::{self, CameraPosition, DisplayOrientation};
use crate::overlay::{OverlayRenderer, SkeletonOverlay};
use crate::pipeline::{Pipeline, ViewState};
use crate::pose::StubPoseDetector;
use crate::project::{FillTransform, ProjectedSkeleton, ViewRect, ViewportGeometry};
use eframe::egui;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

const CONFIG_PATH: &str = "pose_overlay.json";

pub struct PoseOverlayApp {
    pipeline: Pipeline,
    config: PipelineConfig,
    view: Arc<ViewState>,
    results: Option<Receiver<ProjectedSkeleton>>,
    overlay: SkeletonOverlay,

    // Preview state
    preview_texture: Option<egui::TextureHandle>,
    last_frame_at: Option<Instant>,

    // UI state
    status: String,
    orientation_choice: DisplayOrientation,
    position_choice: CameraPosition,
}

impl PoseOverlayApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let config = PipelineConfig::load_or_default(CONFIG_PATH);

        let view = Arc::new(ViewState::new(config.camera_position));
        // Desktop webcams deliver an already-upright buffer, which is the
        // landscape-left case of the orientation table.
        let orientation_choice = DisplayOrientation::LandscapeLeft;
        view.orientation.set(orientation_choice);

        let source = NokhwaSource::new(&config, view.orientation.clone());
        let detector =
            StubPoseDetector::new(Duration::from_millis(config.detector_latency_ms));
        let mut pipeline =
            Pipeline::new(Box::new(source), Box::new(detector), Arc::clone(&view));

        let (results, status) = match pipeline.start() {
            Ok(rx) => (Some(rx), String::new()),
            Err(err) => {
                tracing::error!("camera session failed to start: {err}");
                (None, format!("Camera error: {err}"))
            }
        };

        Self {
            pipeline,
            config,
            position_choice: view.camera_position(),
            view,
            results,
            overlay: SkeletonOverlay::new(),
            preview_texture: None,
            last_frame_at: None,
            status,
            orientation_choice,
        }
    }

    /// Pulls the freshest projected skeleton off the pipeline channel. The
    /// overlay is replaced wholesale here, on the UI context, and nowhere
    /// else.
    fn drain_results(&mut self) {
        let Some(results) = &self.results else { return };
        let mut latest = None;
        for skeleton in results.try_iter() {
            latest = Some(skeleton);
        }
        if let Some(skeleton) = latest {
            self.overlay.set_skeleton(skeleton);
        }
    }

    fn refresh_preview(&mut self, ctx: &egui::Context) -> Option<Frame> {
        let frame = self.pipeline.latest_frame()?;
        if self.last_frame_at != Some(frame.timestamp()) {
            self.last_frame_at = Some(frame.timestamp());
            let rgba = frame.image().to_rgba8();
            let size = [rgba.width() as usize, rgba.height() as usize];
            let color_image = egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());
            match &mut self.preview_texture {
                Some(texture) => texture.set(color_image, Default::default()),
                None => {
                    self.preview_texture =
                        Some(ctx.load_texture("preview", color_image, Default::default()))
                }
            }
        }
        Some(frame)
    }

    fn render_controls(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                ui.heading("Pose Overlay");
                ui.separator();

                egui::ComboBox::from_label("Orientation")
                    .selected_text(self.orientation_choice.label())
                    .show_ui(ui, |ui| {
                        for option in DisplayOrientation::ALL {
                            ui.selectable_value(
                                &mut self.orientation_choice,
                                option,
                                option.label(),
                            );
                        }
                    });

                egui::ComboBox::from_label("Camera")
                    .selected_text(match self.position_choice {
                        CameraPosition::Front => "Front",
                        CameraPosition::Back => "Back",
                    })
                    .show_ui(ui, |ui| {
                        ui.selectable_value(
                            &mut self.position_choice,
                            CameraPosition::Front,
                            "Front",
                        );
                        ui.selectable_value(
                            &mut self.position_choice,
                            CameraPosition::Back,
                            "Back",
                        );
                    });

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let gate = self.pipeline.gate_snapshot();
                    let stats = self.pipeline.stats_snapshot();
                    ui.label(format!(
                        "frames {} | detected {} | dropped {} | last pass {} ms",
                        gate.seen, gate.admitted, gate.dropped, stats.last_detect_ms
                    ));
                });
            });
            ui.add_space(6.0);
        });

        // Takes effect at the next frame's resolve call.
        self.view.orientation.set(self.orientation_choice);
        self.view.set_camera_position(self.position_choice);
    }

    fn render_preview(&mut self, ctx: &egui::Context) {
        let frame = self.refresh_preview(ctx);

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(egui::Color32::BLACK))
            .show(ctx, |ui| {
                let (rect, _) =
                    ui.allocate_exact_size(ui.available_size(), egui::Sense::hover());
                let view_rect =
                    ViewRect::new(rect.min.x, rect.min.y, rect.width(), rect.height());
                // The projector reads this rect for its next cycle.
                self.view.set_view_rect(view_rect);

                let painter = ui.painter_at(rect);

                if let (Some(texture), Some(frame)) = (&self.preview_texture, &frame) {
                    let resolved = orientation::resolve(
                        Some(self.orientation_choice),
                        self.position_choice,
                    );
                    let (mut cw, mut ch) = (frame.width() as f32, frame.height() as f32);
                    if resolved.tag.swaps_dimensions() {
                        std::mem::swap(&mut cw, &mut ch);
                    }
                    let geometry = ViewportGeometry {
                        view: view_rect,
                        capture_width: cw,
                        capture_height: ch,
                    };
                    // Same aspect-fill mapping the projector uses, so the
                    // overlay stays glued to the preview.
                    if let Some(fill) = FillTransform::new(&geometry) {
                        let dest = fill.dest_rect();
                        let dest = egui::Rect::from_min_size(
                            egui::pos2(dest.x, dest.y),
                            egui::vec2(dest.width, dest.height),
                        );
                        let uv = if resolved.mirrored {
                            egui::Rect::from_min_max(egui::pos2(1.0, 0.0), egui::pos2(0.0, 1.0))
                        } else {
                            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0))
                        };
                        painter.image(texture.id(), dest, uv, egui::Color32::WHITE);
                    }
                } else if self.status.is_empty() {
                    painter.text(
                        rect.center(),
                        egui::Align2::CENTER_CENTER,
                        "Starting camera…",
                        egui::FontId::proportional(16.0),
                        egui::Color32::GRAY,
                    );
                }

                self.overlay.paint(&painter);

                if !self.status.is_empty() {
                    painter.text(
                        rect.center_top() + egui::vec2(0.0, 24.0),
                        egui::Align2::CENTER_CENTER,
                        &self.status,
                        egui::FontId::proportional(14.0),
                        egui::Color32::from_rgb(244, 67, 54),
                    );
                }
            });
    }
}

impl eframe::App for PoseOverlayApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_results();
        self.render_controls(ctx);
        self.render_preview(ctx);
        // Live feed: keep repainting at display rate.
        ctx.request_repaint();
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.pipeline.stop();
        // Persist the camera position picked in this session.
        self.config.camera_position = self.position_choice;
        if let Err(err) = self.config.save(CONFIG_PATH) {
            tracing::warn!("could not persist config: {err:#}");
        }
    }
}
