// src/camera.rs - frame source seam and the nokhwa-backed capture loop
use crate::config::PipelineConfig;
use crate::orientation::{DisplayOrientation, OrientationCell};
use image::DynamicImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat,
                    RequestedFormatType, Resolution};
use nokhwa::Camera;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// One captured image. Pixel data sits behind an `Arc` so the frame can be
/// handed through the pipeline without copying.
#[derive(Clone)]
pub struct Frame {
    image: Arc<DynamicImage>,
    timestamp: Instant,
}

impl Frame {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image),
            timestamp: Instant::now(),
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Session-level capture failures. These are fatal to starting the pipeline
/// and surface as a one-line status message; the messages are the user-facing
/// text.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("Permission denied. Enable camera access in Settings.")]
    PermissionDenied,
    #[error("Camera restricted on this device.")]
    Restricted,
    #[error("No camera available.")]
    NoCamera,
    #[error("Could not configure camera: {0}")]
    ConfigurationFailed(String),
}

/// Invoked once per delivered frame, on the capture thread, together with
/// the display orientation observed at frame-arrival time.
pub type FrameHandler = Box<dyn FnMut(Frame, Option<DisplayOrientation>) + Send + 'static>;

/// Delivers frames at the camera's native rate until stopped. Registration
/// is one-directional: the source holds the handler, nothing holds the
/// source back.
pub trait FrameSource {
    fn start(&mut self, handler: FrameHandler) -> Result<(), CameraError>;
    fn stop(&mut self);
}

/// Camera-backed frame source. The capture loop runs on its own thread and
/// samples the shared orientation cell for every frame it delivers.
pub struct NokhwaSource {
    config: PipelineConfig,
    orientation: OrientationCell,
    stop: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl NokhwaSource {
    pub fn new(config: &PipelineConfig, orientation: OrientationCell) -> Self {
        Self {
            config: config.clone(),
            orientation,
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }
}

impl FrameSource for NokhwaSource {
    fn start(&mut self, mut handler: FrameHandler) -> Result<(), CameraError> {
        if self.worker.is_some() {
            return Err(CameraError::ConfigurationFailed(
                "capture already running".into(),
            ));
        }

        let cameras = nokhwa::query(ApiBackend::Auto)
            .map_err(|e| CameraError::ConfigurationFailed(e.to_string()))?;
        if cameras.is_empty() {
            return Err(CameraError::NoCamera);
        }

        self.stop.store(false, Ordering::Release);
        let stop = Arc::clone(&self.stop);
        let orientation = self.orientation.clone();
        let config = self.config.clone();

        // The camera is opened on the capture thread; startup errors come
        // back over a one-shot channel so start() stays synchronous.
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), CameraError>>(1);

        let worker = thread::spawn(move || {
            let mut camera = match open_camera(&config) {
                Ok(camera) => {
                    let _ = ready_tx.send(Ok(()));
                    camera
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };

            while !stop.load(Ordering::Acquire) {
                match camera.frame() {
                    Ok(buffer) => match buffer.decode_image::<RgbFormat>() {
                        Ok(decoded) => {
                            let frame = Frame::new(DynamicImage::ImageRgb8(decoded));
                            handler(frame, orientation.get());
                        }
                        Err(err) => tracing::debug!("frame decode failed: {err}"),
                    },
                    Err(err) => {
                        tracing::debug!("frame capture failed: {err}");
                        thread::sleep(Duration::from_millis(5));
                    }
                }
            }

            if let Err(err) = camera.stop_stream() {
                tracing::debug!("camera stream shutdown: {err}");
            }
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                tracing::info!("camera {} capture started", self.config.camera_index);
                self.worker = Some(worker);
                Ok(())
            }
            Ok(Err(err)) => {
                let _ = worker.join();
                Err(err)
            }
            Err(_) => {
                let _ = worker.join();
                Err(CameraError::ConfigurationFailed(
                    "capture thread exited during startup".into(),
                ))
            }
        }
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
            tracing::info!("camera capture stopped");
        }
    }
}

impl Drop for NokhwaSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Opens the configured camera and starts its stream. Shared by the capture
/// loop and the `camera_test` probe so both report failures through the same
/// session error taxonomy.
pub fn open_camera(config: &PipelineConfig) -> Result<Camera, CameraError> {
    let format = CameraFormat::new(
        Resolution::new(config.frame_width, config.frame_height),
        FrameFormat::MJPEG,
        config.fps,
    );
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));

    let mut camera = Camera::new(CameraIndex::Index(config.camera_index), requested)
        .map_err(|e| classify_nokhwa_error(e.to_string()))?;
    camera
        .open_stream()
        .map_err(|e| classify_nokhwa_error(e.to_string()))?;
    Ok(camera)
}

// nokhwa reports backend failures as strings; sort them into the session
// error taxonomy so the UI shows the right one-liner.
fn classify_nokhwa_error(text: String) -> CameraError {
    let lower = text.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") {
        CameraError::PermissionDenied
    } else if lower.contains("restrict") {
        CameraError::Restricted
    } else if lower.contains("not found") || lower.contains("no device") {
        CameraError::NoCamera
    } else {
        CameraError::ConfigurationFailed(text)
    }
}
