//! Voice event application
//!
//! Status events just repaint the voice line; action events route to the
//! same handlers the buttons use. Transport commands only drive the
//! local player, so a stray "pause" never fights the playback monitor
//! over the remote device.

use iced::Task;

use attune_core::matching::VoiceCommand;
use attune_core::session::{MusicMode, SessionEvent};
use attune_core::voice::VoiceEvent;

use crate::ui::app::AttuneApp;
use crate::ui::message::Message;

use super::{detection, dispatch_selection, playback, settings};

pub fn apply(app: &mut AttuneApp, event: VoiceEvent) -> Task<Message> {
    match event {
        VoiceEvent::Ready => set_voice_status(app, "Voice Command: Ready"),
        VoiceEvent::Listening => set_voice_status(app, "Voice Command: Listening..."),
        VoiceEvent::DidntCatch => set_voice_status(app, "Voice Command: Didn't catch that"),
        VoiceEvent::ServiceError => set_voice_status(app, "Voice Command: API Error"),
        VoiceEvent::MicError => set_voice_status(app, "Voice Command: Mic Error"),
        VoiceEvent::WaitingForReply => set_voice_status(app, "Voice Command: Waiting for reply..."),
        VoiceEvent::Heard(text) => {
            app.voice_status = format!("Heard: '{}'", text);
            Task::none()
        }
        VoiceEvent::Unrecognized(text) => {
            app.voice_status = format!("Voice Command: Unrecognized ({})", text);
            Task::none()
        }
        VoiceEvent::SetLanguage(language) => {
            app.voice_status = format!("Action: {} songs", language);
            settings::set_language(app, language)
        }
        VoiceEvent::Action { command, phrase } => {
            app.voice_status = format!("Action: {}", phrase);
            dispatch_command(app, command)
        }
        VoiceEvent::InquiryReply { reply, phrase } => {
            app.voice_status = format!("Action: {}", phrase);
            let Some(SessionEvent::SelectPlayback { emotion }) = app.session.resolve_inquiry(reply)
            else {
                return Task::none();
            };
            app.speaker.say("Okay");
            if let Some(service) = &app.voice {
                service.set_inquiry_pending(false);
            }
            app.playing_for = format!("Playing For: {}", emotion.title());
            dispatch_selection(app, emotion)
        }
    }
}

fn set_voice_status(app: &mut AttuneApp, text: &str) -> Task<Message> {
    app.voice_status = text.to_string();
    Task::none()
}

fn dispatch_command(app: &mut AttuneApp, command: VoiceCommand) -> Task<Message> {
    match command {
        VoiceCommand::CameraOn => {
            app.session.set_detection_paused(false);
            return detection::start(app);
        }
        VoiceCommand::VolumeUp => adjust_volume(app, 0.1),
        VoiceCommand::VolumeDown => adjust_volume(app, -0.1),
        VoiceCommand::WhatSong => {
            // the song label is already on screen
        }
        VoiceCommand::Pause => {
            if app.session.mode() == MusicMode::Local {
                match app.player.pause() {
                    Ok(()) => app.paused = true,
                    Err(e) => log::warn!("voice pause: {}", e),
                }
            }
        }
        VoiceCommand::Resume => {
            if app.session.mode() == MusicMode::Local {
                match app.player.resume() {
                    Ok(()) => app.paused = false,
                    Err(e) => log::warn!("voice resume: {}", e),
                }
            }
        }
        VoiceCommand::Next => {
            if app.session.mode() == MusicMode::Local {
                return playback::next_song(app);
            }
        }
        VoiceCommand::Previous => {
            if app.session.mode() == MusicMode::Local {
                return playback::previous_song(app);
            }
        }
    }
    Task::none()
}

fn adjust_volume(app: &mut AttuneApp, delta: f64) {
    if let Err(e) = app.player.adjust_volume(delta) {
        log::warn!("adjust_volume: {}", e);
    }
}
