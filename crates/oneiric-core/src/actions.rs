use super::elements::CodexCategory;
use super::state::AppView;
use super::state::DreamAnalysis;

#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    User(UserAction),
    Runtime(RuntimeAction),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    ToggleMenu,
    /// Top-left control: closes the innermost codex overlay, otherwise toggles the menu.
    HeaderControl,
    Navigate(AppView),
    Back,
    ScrollCollection(f32),
    SetCollectionScroll(f32),
    SelectDream {
        id: String,
    },
    DeleteDream {
        id: String,
    },

    StartRecording,
    StopRecording,
    CancelRecording,

    TriggerVideo {
        id: String,
    },
    OpenDeepAnalysis,
    CloseAnalysis,
    ShareDream {
        id: String,
    },
    ShareAnalysis,
    TogglePlayback {
        id: String,
    },

    OpenCodexCategory(CodexCategory),
    OpenElement {
        name: String,
    },

    OpenGalaxyTarget {
        star_id: String,
    },
    DismissGalaxyTarget,
    SendResonance,
    ToggleResonanceNotice,

    TogglePro,
    DismissNotice {
        seq: u64,
    },
}

/// Results reported back by the host. Failures carry the backend's reason text.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeAction {
    AudioInputDenied {
        attempt_id: u64,
        reason: String,
    },
    /// The input ran out or failed; ends the recording like a user stop.
    AudioInputEnded {
        attempt_id: u64,
    },
    AudioCaptured {
        attempt_id: u64,
        chunk: Vec<u8>,
    },
    RecordingTick {
        attempt_id: u64,
    },
    AnalysisFinished {
        attempt_id: u64,
        result: Result<DreamAnalysis, String>,
    },
    ImageFinished {
        attempt_id: u64,
        result: Result<String, String>,
    },
    VideoFinished {
        dream_id: String,
        result: Result<String, String>,
    },
    DeepAnalysisFinished {
        dream_id: String,
        result: Result<String, String>,
    },
    SymbolAnalysisFinished {
        name: String,
        result: Result<String, String>,
    },
    PlaybackEnded {
        playback_id: u64,
    },
    ShareFinished(ShareOutcome),
    Scheduled(ScheduledAction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledAction {
    ResonanceDelivered,
    ResonanceDismissed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareOutcome {
    Shared,
    Copied,
    Failed(String),
}
