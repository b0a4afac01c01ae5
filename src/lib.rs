// Library surface for the binary and for headless/integration tests.
pub mod app;
pub mod app_dirs;
pub mod config;
pub mod error;
pub mod feedback;
pub mod grammar;
pub mod input;
pub mod logging;
pub mod questions;
pub mod report;
pub mod runtime;
pub mod session;
pub mod speech;
pub mod ui;

pub use app::App;
