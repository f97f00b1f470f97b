// src/overlay.rs - bone topology and the skeleton overlay renderer
use crate::pose::JointName;
use crate::project::ProjectedSkeleton;
use egui::{Color32, Pos2, Stroke};
use nalgebra::Point2;

/// Which joints are connected by a drawn line segment. Static configuration,
/// not derived from detection.
pub const BONES: [(JointName, JointName); 11] = [
    // Torso
    (JointName::Spine, JointName::Root),
    (JointName::LeftShoulder, JointName::RightShoulder),
    (JointName::LeftHip, JointName::RightHip),
    // Arms
    (JointName::LeftShoulder, JointName::LeftElbow),
    (JointName::LeftElbow, JointName::LeftWrist),
    (JointName::RightShoulder, JointName::RightElbow),
    (JointName::RightElbow, JointName::RightWrist),
    // Legs
    (JointName::LeftHip, JointName::LeftKnee),
    (JointName::LeftKnee, JointName::LeftAnkle),
    (JointName::RightHip, JointName::RightKnee),
    (JointName::RightKnee, JointName::RightAnkle),
];

const BONE_WIDTH: f32 = 3.0;
const JOINT_RADIUS: f32 = 4.0;

/// Line segments to draw for a skeleton: one per bone whose endpoints are
/// both present.
pub fn bone_segments(skeleton: &ProjectedSkeleton) -> Vec<(Point2<f32>, Point2<f32>)> {
    BONES
        .iter()
        .filter_map(|(a, b)| Some((*skeleton.get(a)?, *skeleton.get(b)?)))
        .collect()
}

/// Consumes projected skeletons and draws them. Mutated only from the UI
/// context; the pipeline marshals results there through a channel.
pub trait OverlayRenderer {
    fn set_skeleton(&mut self, skeleton: ProjectedSkeleton);
}

/// egui-backed overlay: bones as line segments, a filled marker at every
/// present joint. An empty skeleton draws nothing, which clears the overlay
/// on the next repaint.
#[derive(Default)]
pub struct SkeletonOverlay {
    skeleton: ProjectedSkeleton,
}

impl SkeletonOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skeleton(&self) -> &ProjectedSkeleton {
        &self.skeleton
    }

    pub fn paint(&self, painter: &egui::Painter) {
        if self.skeleton.is_empty() {
            return;
        }
        let stroke = Stroke::new(BONE_WIDTH, Color32::WHITE);
        for (a, b) in bone_segments(&self.skeleton) {
            painter.line_segment([to_pos2(a), to_pos2(b)], stroke);
        }
        for point in self.skeleton.values() {
            painter.circle_filled(to_pos2(*point), JOINT_RADIUS, Color32::WHITE);
        }
    }
}

impl OverlayRenderer for SkeletonOverlay {
    fn set_skeleton(&mut self, skeleton: ProjectedSkeleton) {
        // Atomic replacement; the renderer never sees a partial update.
        self.skeleton = skeleton;
    }
}

fn to_pos2(point: Point2<f32>) -> Pos2 {
    Pos2::new(point.x, point.y)
}
