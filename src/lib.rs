//! TelePanel - Telegram panel server with a versioned, isolated module system

pub mod config;
pub mod error;
pub mod modules;

pub use config::PanelConfig;
pub use error::{PanelError, Result};
