//! Message handlers for AttuneApp
//!
//! Each handler module is responsible for a specific category of
//! messages. Handlers receive `&mut AttuneApp` and return
//! `Task<Message>`.

pub mod detection;
pub mod playback;
pub mod settings;
pub mod streaming;
pub mod tick;
pub mod voice;

use iced::Task;

use attune_core::session::MusicMode;
use attune_core::Emotion;

use super::app::AttuneApp;
use super::message::Message;

/// Route a decided emotion to the playback selector for the current mode
pub fn dispatch_selection(app: &mut AttuneApp, emotion: Emotion) -> Task<Message> {
    match app.session.mode() {
        MusicMode::Local => playback::enter_local(app, emotion),
        MusicMode::Streaming => streaming::suggest(app, emotion),
    }
}
