//! Message types for the Attune GUI

use attune_core::session::MusicMode;
use attune_core::streaming::client::StreamingError;
use attune_core::streaming::{PlaybackSnapshot, PlaylistCandidate};
use attune_core::Emotion;

/// Outcome of trying to start remote playback on an active device
#[derive(Debug, Clone)]
pub enum StreamStartOutcome {
    /// Playback is rolling on this device
    Started { device_id: String },
    /// No active device was found to play on
    NoDevice,
    /// The start request itself failed
    Failed(StreamingError),
}

/// All messages that can be sent in the application
#[derive(Debug, Clone)]
pub enum Message {
    /// Periodic tick, drains worker channels and advances the session
    Tick,
    /// Switch between local library and streaming playback
    SetMode(MusicMode),
    /// Language picked from the dropdown
    SetLanguage(String),
    /// Restart emotion detection from the toolbar
    RestartDetection,
    /// Cycle to the next probed camera
    SwitchCamera,
    /// Toggle local pause/resume
    PlayPause,
    /// Skip forward in the local track list
    NextSong,
    /// Skip backward in the local track list
    PreviousSong,
    /// Open the suggested playlist in the system browser
    OpenPlaylistLink,
    /// Streaming credential check finished
    AuthChecked(Result<(), StreamingError>),
    /// Playlist search finished
    PlaylistPicked {
        emotion: Emotion,
        result: Result<Option<PlaylistCandidate>, StreamingError>,
    },
    /// Remote playback start attempt finished
    StreamStarted {
        playlist: PlaylistCandidate,
        outcome: StreamStartOutcome,
    },
    /// Monitor delay elapsed, time to poll remote playback
    MonitorTick { generation: u64 },
    /// Remote playback state came back from the monitor poll
    MonitorPolled {
        generation: u64,
        result: Result<Option<PlaybackSnapshot>, StreamingError>,
    },
    /// Resume point write to the companion server finished
    ResumeLogged(bool),
    /// Fire-and-forget remote transport call finished, outcome ignored
    RemoteTransportDone,
}
