//! GUI components for the Attune player

pub mod app;
pub mod handlers;
pub mod message;
pub mod theme;

pub use app::AttuneApp;
