pub mod app;
pub mod camera;
pub mod config;
pub mod gate;
pub mod orientation;
pub mod overlay;
pub mod pipeline;
pub mod pose;
pub mod project;
