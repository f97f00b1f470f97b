// src/project.rs - detector space to overlay space
use crate::pose::{JointName, JointObservation};
use nalgebra::{Point2, Vector2};
use std::collections::HashMap;

/// Joint name to overlay pixel point, top-left origin. Replaced wholesale
/// on every projection, never merged with a previous one.
pub type ProjectedSkeleton = HashMap<JointName, Point2<f32>>;

/// Rectangle of the preview surface, in overlay pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }
}

/// Everything the projector needs about the preview: where it sits on
/// screen and the upright dimensions of the capture feeding it. Queried
/// fresh per projection.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportGeometry {
    pub view: ViewRect,
    pub capture_width: f32,
    pub capture_height: f32,
}

/// Aspect-fill mapping of the unit capture square onto the view rectangle:
/// scale by the larger of the two axis ratios and center, cropping overflow.
/// This reproduces the scale/crop the live preview applies, so projected
/// joints land on the body in frame.
#[derive(Debug, Clone, Copy)]
pub struct FillTransform {
    origin: Point2<f32>,
    scaled: Vector2<f32>,
}

impl FillTransform {
    /// None when the geometry is degenerate (zero-sized view or capture, or
    /// non-finite values); callers emit an empty projection in that case.
    pub fn new(geometry: &ViewportGeometry) -> Option<Self> {
        let view = geometry.view;
        let (cw, ch) = (geometry.capture_width, geometry.capture_height);
        let all_finite =
            [view.x, view.y, view.width, view.height, cw, ch].iter().all(|v| v.is_finite());
        if !all_finite || view.width <= 0.0 || view.height <= 0.0 || cw <= 0.0 || ch <= 0.0 {
            return None;
        }

        let scale = (view.width / cw).max(view.height / ch);
        let scaled = Vector2::new(cw * scale, ch * scale);
        let origin = Point2::new(
            view.x + (view.width - scaled.x) / 2.0,
            view.y + (view.height - scaled.y) / 2.0,
        );
        Some(Self { origin, scaled })
    }

    /// Maps a normalized top-left-origin point into overlay pixels.
    pub fn apply(&self, nx: f32, ny: f32) -> Point2<f32> {
        Point2::new(
            self.origin.x + nx * self.scaled.x,
            self.origin.y + ny * self.scaled.y,
        )
    }

    /// The on-screen rectangle the scaled capture occupies. Extends past the
    /// view rect on the cropped axis; the preview clips it.
    pub fn dest_rect(&self) -> ViewRect {
        ViewRect::new(self.origin.x, self.origin.y, self.scaled.x, self.scaled.y)
    }
}

/// Reflects an x coordinate about the view rectangle's vertical center.
/// Applying it twice returns the original coordinate.
pub fn mirror_x(x: f32, view: &ViewRect) -> f32 {
    2.0 * view.center_x() - x
}

/// Projects one observation into overlay space: vertical flip out of the
/// detector's bottom-left convention, aspect-fill onto the view rectangle,
/// then horizontal mirroring when the camera presents mirrored. Joints
/// absent from the observation are absent from the output; degenerate
/// geometry yields an empty skeleton.
pub fn project(
    observation: &JointObservation,
    geometry: &ViewportGeometry,
    mirrored: bool,
) -> ProjectedSkeleton {
    let Some(fill) = FillTransform::new(geometry) else {
        return ProjectedSkeleton::new();
    };

    let mut skeleton = ProjectedSkeleton::new();
    for (name, joint) in observation.iter() {
        let mut screen = fill.apply(joint.point.x, 1.0 - joint.point.y);
        if mirrored {
            screen.x = mirror_x(screen.x, &geometry.view);
        }
        skeleton.insert(*name, screen);
    }
    skeleton
}
