//! Pieces shared by the VOSChat binaries: the settings file and logging setup.

pub mod logging;
pub mod settings;

pub use logging::init_tracing;
pub use settings::Settings;
