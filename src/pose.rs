// src/pose.rs - joint vocabulary, detector seam and the stub backend
use crate::camera::Frame;
use crate::orientation::ImageOrientation;
use nalgebra::Point2;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Named anatomical landmarks tracked by the detector. The set is closed;
/// it mirrors the vocabulary of the body-pose backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointName {
    Root,
    Spine,
    CenterHead,
    TopHead,
    LeftShoulder,
    LeftElbow,
    LeftWrist,
    LeftHip,
    LeftKnee,
    LeftAnkle,
    RightShoulder,
    RightElbow,
    RightWrist,
    RightHip,
    RightKnee,
    RightAnkle,
}

impl JointName {
    pub const ALL: [JointName; 16] = [
        JointName::Root,
        JointName::Spine,
        JointName::CenterHead,
        JointName::TopHead,
        JointName::LeftShoulder,
        JointName::LeftElbow,
        JointName::LeftWrist,
        JointName::LeftHip,
        JointName::LeftKnee,
        JointName::LeftAnkle,
        JointName::RightShoulder,
        JointName::RightElbow,
        JointName::RightWrist,
        JointName::RightHip,
        JointName::RightKnee,
        JointName::RightAnkle,
    ];
}

/// A single detected joint: a normalized position plus the backend's
/// confidence in it, when the backend reports one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservedJoint {
    pub point: Point2<f32>,
    pub confidence: Option<f32>,
}

/// One successful detection: normalized joint positions in unit image space,
/// bottom-left origin, x and y in [0, 1]. Joints the detector could not
/// resolve are simply absent.
#[derive(Debug, Clone, Default)]
pub struct JointObservation {
    joints: HashMap<JointName, ObservedJoint>,
}

impl JointObservation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: impl IntoIterator<Item = (JointName, Point2<f32>)>) -> Self {
        Self {
            joints: points
                .into_iter()
                .map(|(name, point)| {
                    (
                        name,
                        ObservedJoint {
                            point,
                            confidence: None,
                        },
                    )
                })
                .collect(),
        }
    }

    pub fn insert(&mut self, name: JointName, point: Point2<f32>) {
        self.joints.insert(
            name,
            ObservedJoint {
                point,
                confidence: None,
            },
        );
    }

    pub fn insert_with_confidence(&mut self, name: JointName, point: Point2<f32>, confidence: f32) {
        self.joints.insert(
            name,
            ObservedJoint {
                point,
                confidence: Some(confidence),
            },
        );
    }

    pub fn get(&self, name: JointName) -> Option<Point2<f32>> {
        self.joints.get(&name).map(|j| j.point)
    }

    pub fn confidence(&self, name: JointName) -> Option<f32> {
        self.joints.get(&name).and_then(|j| j.confidence)
    }

    pub fn contains(&self, name: JointName) -> bool {
        self.joints.contains_key(&name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&JointName, &ObservedJoint)> {
        self.joints.iter()
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }
}

/// Opaque per-frame detector failure. Logged by the pipeline, never shown
/// in the UI.
#[derive(Debug, Error)]
#[error("pose backend error: {0}")]
pub struct DetectionError(pub String);

/// The body-pose backend. One frame and the orientation needed to read it
/// upright go in; zero or one observation comes out.
pub trait PoseDetector: Send {
    fn detect(
        &mut self,
        frame: &Frame,
        orientation: ImageOrientation,
    ) -> Result<Option<JointObservation>, DetectionError>;
}

// Canonical standing figure used by the stub backend, bottom-left origin.
static STUB_POSE: Lazy<Vec<(JointName, Point2<f32>)>> = Lazy::new(|| {
    vec![
        (JointName::Root, Point2::new(0.50, 0.30)),
        (JointName::Spine, Point2::new(0.50, 0.45)),
        (JointName::CenterHead, Point2::new(0.50, 0.62)),
        (JointName::TopHead, Point2::new(0.50, 0.70)),
        (JointName::LeftShoulder, Point2::new(0.38, 0.55)),
        (JointName::LeftElbow, Point2::new(0.32, 0.44)),
        (JointName::LeftWrist, Point2::new(0.30, 0.33)),
        (JointName::LeftHip, Point2::new(0.43, 0.30)),
        (JointName::LeftKnee, Point2::new(0.42, 0.17)),
        (JointName::LeftAnkle, Point2::new(0.42, 0.05)),
        (JointName::RightShoulder, Point2::new(0.62, 0.55)),
        (JointName::RightElbow, Point2::new(0.68, 0.44)),
        (JointName::RightWrist, Point2::new(0.70, 0.33)),
        (JointName::RightHip, Point2::new(0.57, 0.30)),
        (JointName::RightKnee, Point2::new(0.58, 0.17)),
        (JointName::RightAnkle, Point2::new(0.58, 0.05)),
    ]
});

/// Stand-in for the real pose backend. Returns a slowly swaying synthetic
/// figure and can simulate a slow model via `latency`, which is what makes
/// the gate's frame dropping visible in the demo app.
pub struct StubPoseDetector {
    latency: Duration,
    phase: f32,
}

impl StubPoseDetector {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            phase: 0.0,
        }
    }
}

impl PoseDetector for StubPoseDetector {
    fn detect(
        &mut self,
        _frame: &Frame,
        _orientation: ImageOrientation,
    ) -> Result<Option<JointObservation>, DetectionError> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        self.phase += 0.08;
        let sway = self.phase.sin() * 0.02;
        let mut observation = JointObservation::new();
        for (name, p) in STUB_POSE.iter() {
            observation.insert_with_confidence(
                *name,
                Point2::new((p.x + sway).clamp(0.0, 1.0), p.y),
                0.95,
            );
        }
        Ok(Some(observation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;
    use std::time::Duration;

    #[test]
    fn joint_vocabulary_is_closed_at_sixteen() {
        assert_eq!(JointName::ALL.len(), 16);
    }

    #[test]
    fn observation_tracks_inserted_joints_only() {
        let mut observation = JointObservation::new();
        assert!(observation.is_empty());

        observation.insert(JointName::LeftWrist, Point2::new(0.25, 0.75));
        assert_eq!(observation.len(), 1);
        assert!(observation.contains(JointName::LeftWrist));
        assert!(!observation.contains(JointName::RightWrist));
        assert_eq!(
            observation.get(JointName::LeftWrist),
            Some(Point2::new(0.25, 0.75))
        );
    }

    #[test]
    fn confidence_is_optional_per_joint() {
        let mut observation = JointObservation::new();
        observation.insert(JointName::Root, Point2::new(0.5, 0.5));
        observation.insert_with_confidence(JointName::Spine, Point2::new(0.5, 0.6), 0.8);

        assert_eq!(observation.confidence(JointName::Root), None);
        assert_eq!(observation.confidence(JointName::Spine), Some(0.8));
        assert_eq!(observation.get(JointName::Spine), Some(Point2::new(0.5, 0.6)));
        // Absent joints report neither a point nor a confidence.
        assert_eq!(observation.get(JointName::TopHead), None);
        assert_eq!(observation.confidence(JointName::TopHead), None);
    }

    #[test]
    fn stub_detector_emits_full_normalized_pose() {
        let mut detector = StubPoseDetector::new(Duration::ZERO);
        let frame = Frame::new(DynamicImage::new_rgb8(64, 48));

        let observation = detector
            .detect(&frame, ImageOrientation::Up)
            .unwrap()
            .expect("stub always detects");

        assert_eq!(observation.len(), JointName::ALL.len());
        for (name, joint) in observation.iter() {
            assert!(
                (0.0..=1.0).contains(&joint.point.x) && (0.0..=1.0).contains(&joint.point.y),
                "{:?} out of unit space: {:?}",
                name,
                joint.point
            );
            assert_eq!(joint.confidence, Some(0.95));
        }
    }
}
