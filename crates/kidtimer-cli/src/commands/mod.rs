pub mod config;
pub mod presets;
pub mod timer;
