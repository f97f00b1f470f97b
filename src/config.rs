// src/config.rs
use crate::orientation::CameraPosition;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Pipeline settings: which camera to open, the requested capture format,
/// and the stub detector's simulated latency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub camera_index: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    pub fps: u32,
    pub camera_position: CameraPosition,
    /// Simulated model latency in milliseconds. Non-zero values make the
    /// gate's frame dropping visible in the counters panel.
    pub detector_latency_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            frame_width: 640,
            frame_height: 480,
            fps: 30,
            camera_position: CameraPosition::Front,
            detector_latency_ms: 35,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)
            .with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }

    /// Loads `path` if it exists, otherwise falls back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("ignoring unreadable config {}: {err:#}", path.display());
                Self::default()
            }
        }
    }
}
