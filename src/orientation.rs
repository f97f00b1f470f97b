// src/orientation.rs - display orientation to detector orientation mapping
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Orientation of the display/UI at the moment a frame arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayOrientation {
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

impl DisplayOrientation {
    pub const ALL: [DisplayOrientation; 4] = [
        DisplayOrientation::Portrait,
        DisplayOrientation::PortraitUpsideDown,
        DisplayOrientation::LandscapeLeft,
        DisplayOrientation::LandscapeRight,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DisplayOrientation::Portrait => "Portrait",
            DisplayOrientation::PortraitUpsideDown => "Portrait (upside down)",
            DisplayOrientation::LandscapeLeft => "Landscape left",
            DisplayOrientation::LandscapeRight => "Landscape right",
        }
    }

    fn to_index(self) -> u8 {
        match self {
            DisplayOrientation::Portrait => 0,
            DisplayOrientation::PortraitUpsideDown => 1,
            DisplayOrientation::LandscapeLeft => 2,
            DisplayOrientation::LandscapeRight => 3,
        }
    }

    fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(DisplayOrientation::Portrait),
            1 => Some(DisplayOrientation::PortraitUpsideDown),
            2 => Some(DisplayOrientation::LandscapeLeft),
            3 => Some(DisplayOrientation::LandscapeRight),
            _ => None,
        }
    }
}

/// Which side of the device the camera faces. Front cameras are presented
/// mirrored, back cameras are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraPosition {
    Front,
    Back,
}

/// Rotation tag handed to the pose detector so it reads the sensor buffer
/// right-side-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOrientation {
    /// Buffer is already upright.
    Up,
    /// Buffer is upside down (rotate 180 degrees).
    Down,
    /// Rotate 90 degrees counter-clockwise.
    Left,
    /// Rotate 90 degrees clockwise.
    Right,
}

impl ImageOrientation {
    /// True when rotating the buffer upright swaps its width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(self, ImageOrientation::Left | ImageOrientation::Right)
    }
}

/// Result of resolving the current display orientation for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedOrientation {
    pub tag: ImageOrientation,
    pub mirrored: bool,
}

/// Maps the display orientation and camera position to the detector
/// orientation tag and the mirroring requirement.
///
/// Total over every input: an undetermined orientation (`None`) uses the
/// portrait mapping. Call this per frame, never cache across frames.
pub fn resolve(
    display: Option<DisplayOrientation>,
    position: CameraPosition,
) -> ResolvedOrientation {
    let display = display.unwrap_or(DisplayOrientation::Portrait);
    let tag = match display {
        DisplayOrientation::Portrait => ImageOrientation::Right,
        DisplayOrientation::PortraitUpsideDown => ImageOrientation::Left,
        DisplayOrientation::LandscapeLeft => ImageOrientation::Up,
        DisplayOrientation::LandscapeRight => ImageOrientation::Down,
    };
    ResolvedOrientation {
        tag,
        mirrored: position == CameraPosition::Front,
    }
}

/// Shared cell holding the orientation observed by the UI, sampled by the
/// frame source at frame-arrival time. Lock-free; a reader may observe an
/// orientation change one frame late, which is acceptable.
#[derive(Clone)]
pub struct OrientationCell(Arc<AtomicU8>);

const ORIENTATION_UNSET: u8 = u8::MAX;

impl OrientationCell {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(ORIENTATION_UNSET)))
    }

    pub fn set(&self, orientation: DisplayOrientation) {
        self.0.store(orientation.to_index(), Ordering::Release);
    }

    pub fn get(&self) -> Option<DisplayOrientation> {
        DisplayOrientation::from_index(self.0.load(Ordering::Acquire))
    }
}

impl Default for OrientationCell {
    fn default() -> Self {
        Self::new()
    }
}
