// src/pipeline.rs - wires frame source, gate, detector and projector
use crate::camera::{CameraError, Frame, FrameHandler, FrameSource};
use crate::gate::{DetectionGate, GateSnapshot};
use crate::orientation::{self, CameraPosition, OrientationCell, ResolvedOrientation};
use crate::pose::PoseDetector;
use crate::project::{self, ProjectedSkeleton, ViewRect, ViewportGeometry};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

/// View-side state the pipeline reads fresh for every frame and projection:
/// the display orientation, which camera is in use, and where the preview
/// sits on screen. The UI context writes, the capture and worker threads
/// read; a one-frame-stale observation is acceptable.
pub struct ViewState {
    pub orientation: OrientationCell,
    position: AtomicU8,
    view_rect: Mutex<ViewRect>,
}

impl ViewState {
    pub fn new(position: CameraPosition) -> Self {
        Self {
            orientation: OrientationCell::new(),
            position: AtomicU8::new(encode_position(position)),
            view_rect: Mutex::new(ViewRect::default()),
        }
    }

    pub fn set_camera_position(&self, position: CameraPosition) {
        self.position.store(encode_position(position), Ordering::Release);
    }

    pub fn camera_position(&self) -> CameraPosition {
        decode_position(self.position.load(Ordering::Acquire))
    }

    pub fn set_view_rect(&self, rect: ViewRect) {
        *self.view_rect.lock().unwrap() = rect;
    }

    pub fn view_rect(&self) -> ViewRect {
        *self.view_rect.lock().unwrap()
    }
}

fn encode_position(position: CameraPosition) -> u8 {
    match position {
        CameraPosition::Front => 0,
        CameraPosition::Back => 1,
    }
}

fn decode_position(value: u8) -> CameraPosition {
    if value == 0 {
        CameraPosition::Front
    } else {
        CameraPosition::Back
    }
}

/// Worker-side timing, displayed in the app's counters panel.
#[derive(Debug, Default)]
pub struct PipelineStats {
    cycles: AtomicU64,
    last_detect_ms: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StatsSnapshot {
    pub cycles: u64,
    pub last_detect_ms: u64,
}

impl PipelineStats {
    fn record(&self, elapsed_ms: u64) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.last_detect_ms.store(elapsed_ms, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            last_detect_ms: self.last_detect_ms.load(Ordering::Relaxed),
        }
    }
}

struct DetectionJob {
    frame: Frame,
    resolved: ResolvedOrientation,
}

/// The frame-to-overlay pipeline. `start` registers a handler with the frame
/// source and spawns the detection worker; projected skeletons arrive on the
/// returned channel and are consumed on the UI context.
pub struct Pipeline {
    source: Box<dyn FrameSource>,
    detector: Option<Box<dyn PoseDetector>>,
    gate: Arc<DetectionGate>,
    view: Arc<ViewState>,
    stats: Arc<PipelineStats>,
    latest_frame: Arc<Mutex<Option<Frame>>>,
    work_tx: Option<SyncSender<DetectionJob>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Pipeline {
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Box<dyn PoseDetector>,
        view: Arc<ViewState>,
    ) -> Self {
        Self {
            source,
            detector: Some(detector),
            gate: Arc::new(DetectionGate::new()),
            view,
            stats: Arc::new(PipelineStats::default()),
            latest_frame: Arc::new(Mutex::new(None)),
            work_tx: None,
            worker: None,
        }
    }

    pub fn start(&mut self) -> Result<Receiver<ProjectedSkeleton>, CameraError> {
        let mut detector = self.detector.take().ok_or_else(|| {
            CameraError::ConfigurationFailed("pipeline already started".into())
        })?;

        // Capacity 1 is enough: the gate admits at most one frame between
        // worker receives, so the channel never backs up.
        let (work_tx, work_rx) = mpsc::sync_channel::<DetectionJob>(1);
        let (result_tx, result_rx) = mpsc::channel::<ProjectedSkeleton>();

        let gate = Arc::clone(&self.gate);
        let view = Arc::clone(&self.view);
        let stats = Arc::clone(&self.stats);
        let worker = thread::spawn(move || {
            while let Ok(job) = work_rx.recv() {
                run_cycle(detector.as_mut(), &gate, &view, &stats, job, &result_tx);
            }
            tracing::debug!("detection worker stopped");
        });

        let gate = Arc::clone(&self.gate);
        let view = Arc::clone(&self.view);
        let latest = Arc::clone(&self.latest_frame);
        let tx = work_tx.clone();
        let handler: FrameHandler = Box::new(move |frame, display| {
            *latest.lock().unwrap() = Some(frame.clone());
            // Constant-time admission on the frame-delivery thread; a busy
            // gate means this frame is dropped, never queued.
            if !gate.try_admit() {
                return;
            }
            let resolved = orientation::resolve(display, view.camera_position());
            if tx.try_send(DetectionJob { frame, resolved }).is_err() {
                gate.release();
            }
        });

        self.source.start(handler)?;
        self.work_tx = Some(work_tx);
        self.worker = Some(worker);
        Ok(result_rx)
    }

    /// Tears the pipeline down: stops frame delivery, lets the worker drain
    /// and exit. Safe to call more than once.
    pub fn stop(&mut self) {
        self.source.stop();
        self.work_tx = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    pub fn latest_frame(&self) -> Option<Frame> {
        self.latest_frame.lock().unwrap().clone()
    }

    pub fn gate_snapshot(&self) -> GateSnapshot {
        self.gate.snapshot()
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One detection cycle on the worker. The gate is released as soon as the
/// detector returns, before projection and publishing, so only the detector
/// call itself keeps frames from being admitted.
fn run_cycle(
    detector: &mut dyn PoseDetector,
    gate: &DetectionGate,
    view: &ViewState,
    stats: &PipelineStats,
    job: DetectionJob,
    results: &Sender<ProjectedSkeleton>,
) {
    let started = Instant::now();
    let outcome = detector.detect(&job.frame, job.resolved.tag);
    gate.release();
    stats.record(started.elapsed().as_millis() as u64);

    match outcome {
        Ok(Some(observation)) => {
            let (mut cw, mut ch) = (job.frame.width() as f32, job.frame.height() as f32);
            if job.resolved.tag.swaps_dimensions() {
                std::mem::swap(&mut cw, &mut ch);
            }
            let geometry = ViewportGeometry {
                view: view.view_rect(),
                capture_width: cw,
                capture_height: ch,
            };
            let skeleton = project::project(&observation, &geometry, job.resolved.mirrored);
            let _ = results.send(skeleton);
        }
        Ok(None) => {}
        Err(err) => {
            // Per-frame failure: log and move on, the next frame is already
            // on its way.
            tracing::debug!("pose detection failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraError;
    use crate::orientation::{DisplayOrientation, ImageOrientation};
    use crate::pose::{DetectionError, JointName, JointObservation, PoseDetector};
    use image::DynamicImage;
    use nalgebra::Point2;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;

    /// Delivers a fixed number of synthetic frames from its own thread,
    /// faster than the slow test detector can keep up with.
    struct FakeSource {
        frames: usize,
        interval: Duration,
        handle: Option<thread::JoinHandle<()>>,
    }

    impl FakeSource {
        fn new(frames: usize, interval: Duration) -> Self {
            Self {
                frames,
                interval,
                handle: None,
            }
        }
    }

    impl FrameSource for FakeSource {
        fn start(&mut self, mut handler: FrameHandler) -> Result<(), CameraError> {
            let frames = self.frames;
            let interval = self.interval;
            self.handle = Some(thread::spawn(move || {
                for _ in 0..frames {
                    let frame = Frame::new(DynamicImage::new_rgb8(64, 48));
                    handler(frame, Some(DisplayOrientation::Portrait));
                    thread::sleep(interval);
                }
            }));
            Ok(())
        }

        fn stop(&mut self) {
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }

    /// Sleeps per call and records how many calls overlap.
    struct SlowDetector {
        latency: Duration,
        inside: Arc<AtomicUsize>,
        overlapped: Arc<AtomicBool>,
    }

    impl PoseDetector for SlowDetector {
        fn detect(
            &mut self,
            _frame: &Frame,
            _orientation: ImageOrientation,
        ) -> Result<Option<JointObservation>, DetectionError> {
            if self.inside.fetch_add(1, Ordering::SeqCst) != 0 {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            thread::sleep(self.latency);
            self.inside.fetch_sub(1, Ordering::SeqCst);
            Ok(Some(JointObservation::from_points([(
                JointName::Root,
                Point2::new(0.5, 0.5),
            )])))
        }
    }

    struct FailingDetector;

    impl PoseDetector for FailingDetector {
        fn detect(
            &mut self,
            _frame: &Frame,
            _orientation: ImageOrientation,
        ) -> Result<Option<JointObservation>, DetectionError> {
            Err(DetectionError("model refused the frame".into()))
        }
    }

    fn test_view() -> Arc<ViewState> {
        let view = Arc::new(ViewState::new(CameraPosition::Front));
        view.set_view_rect(ViewRect::new(0.0, 0.0, 390.0, 844.0));
        view
    }

    #[test]
    fn slow_detector_drops_frames_instead_of_queuing() {
        let inside = Arc::new(AtomicUsize::new(0));
        let overlapped = Arc::new(AtomicBool::new(false));
        let detector = SlowDetector {
            latency: Duration::from_millis(15),
            inside: Arc::clone(&inside),
            overlapped: Arc::clone(&overlapped),
        };

        let mut pipeline = Pipeline::new(
            Box::new(FakeSource::new(60, Duration::from_millis(2))),
            Box::new(detector),
            test_view(),
        );
        let results = pipeline.start().unwrap();
        // FakeSource::stop joins the delivery thread, so all 60 frames have
        // been offered once this returns.
        pipeline.stop();

        assert!(!overlapped.load(Ordering::SeqCst), "detection overlapped");
        assert_eq!(inside.load(Ordering::SeqCst), 0);

        let snapshot = pipeline.gate_snapshot();
        assert_eq!(snapshot.seen, 60);
        assert_eq!(snapshot.seen, snapshot.admitted + snapshot.dropped);
        assert!(snapshot.dropped > 0, "expected drops: {:?}", snapshot);

        let published = results.try_iter().count() as u64;
        assert!(published >= 1);
        assert!(published <= snapshot.admitted);
    }

    #[test]
    fn detector_errors_do_not_stop_the_pipeline() {
        let mut pipeline = Pipeline::new(
            Box::new(FakeSource::new(20, Duration::from_millis(1))),
            Box::new(FailingDetector),
            test_view(),
        );
        let results = pipeline.start().unwrap();
        pipeline.stop();

        let snapshot = pipeline.gate_snapshot();
        assert_eq!(snapshot.seen, 20);
        // Every admitted frame completed its cycle and freed the gate again.
        assert!(snapshot.admitted > 1);
        assert_eq!(results.try_iter().count(), 0);
    }

    #[test]
    fn gate_is_idle_before_and_after_a_run() {
        let mut pipeline = Pipeline::new(
            Box::new(FakeSource::new(5, Duration::from_millis(1))),
            Box::new(FailingDetector),
            test_view(),
        );
        assert!(!pipeline.gate.is_busy());
        assert_eq!(pipeline.gate_snapshot().seen, 0);
        let _results = pipeline.start().unwrap();
        pipeline.stop();
        assert!(!pipeline.gate.is_busy());
    }

    #[test]
    fn cycle_publishes_empty_skeleton_for_empty_observation() {
        struct EmptyDetector;
        impl PoseDetector for EmptyDetector {
            fn detect(
                &mut self,
                _frame: &Frame,
                _orientation: ImageOrientation,
            ) -> Result<Option<JointObservation>, DetectionError> {
                Ok(Some(JointObservation::new()))
            }
        }

        let gate = DetectionGate::new();
        assert!(gate.try_admit());
        let view = test_view();
        let stats = PipelineStats::default();
        let (tx, rx) = mpsc::channel();
        let job = DetectionJob {
            frame: Frame::new(DynamicImage::new_rgb8(64, 48)),
            resolved: orientation::resolve(None, CameraPosition::Front),
        };

        run_cycle(&mut EmptyDetector, &gate, &view, &stats, job, &tx);

        assert!(!gate.is_busy());
        let skeleton = rx.try_recv().unwrap();
        assert!(skeleton.is_empty());
    }

    #[test]
    fn cycle_before_layout_projects_nothing() {
        struct OneJointDetector;
        impl PoseDetector for OneJointDetector {
            fn detect(
                &mut self,
                _frame: &Frame,
                _orientation: ImageOrientation,
            ) -> Result<Option<JointObservation>, DetectionError> {
                Ok(Some(JointObservation::from_points([(
                    JointName::Root,
                    Point2::new(0.5, 0.5),
                )])))
            }
        }

        let gate = DetectionGate::new();
        assert!(gate.try_admit());
        // View rect never laid out: stays zero-sized.
        let view = Arc::new(ViewState::new(CameraPosition::Front));
        let stats = PipelineStats::default();
        let (tx, rx) = mpsc::channel();
        let job = DetectionJob {
            frame: Frame::new(DynamicImage::new_rgb8(64, 48)),
            resolved: orientation::resolve(None, CameraPosition::Front),
        };

        run_cycle(&mut OneJointDetector, &gate, &view, &stats, job, &tx);

        let skeleton = rx.try_recv().unwrap();
        assert!(skeleton.is_empty());
    }

    #[test]
    fn view_state_round_trips_position_and_rect() {
        let view = ViewState::new(CameraPosition::Back);
        assert_eq!(view.camera_position(), CameraPosition::Back);
        view.set_camera_position(CameraPosition::Front);
        assert_eq!(view.camera_position(), CameraPosition::Front);

        let rect = ViewRect::new(1.0, 2.0, 3.0, 4.0);
        view.set_view_rect(rect);
        assert_eq!(view.view_rect(), rect);
    }
}
