//! Library exports for reuse in tests.
/// Backend HTTP endpoints.
pub mod api;
/// Per-user application directories.
pub mod app_dirs;
/// Persisted application settings.
pub mod config;
/// Shared egui UI modules.
pub mod egui_app;
/// Shared blocking HTTP client.
pub mod http_client;
/// File and stdout logging setup.
pub mod logging;
/// Prediction result domain model.
pub mod records;
