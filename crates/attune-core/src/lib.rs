//! Attune Core - Shared library for the emotion-driven music player

pub mod backend;
pub mod config;
pub mod detection;
pub mod emotion;
pub mod library;
pub mod matching;
pub mod player;
pub mod session;
pub mod sidecar;
pub mod speech;
pub mod store;
pub mod streaming;
pub mod vision;
pub mod voice;

pub use emotion::Emotion;
