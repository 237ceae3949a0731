use chrono::TimeZone;
use chrono::Utc;

pub(super) use super::normalize_analysis;
pub(super) use super::reduce;
pub(super) use super::FALLBACK_COLOR;
pub(super) use super::FALLBACK_TITLE;
pub(super) use crate::actions::AppAction;
pub(super) use crate::actions::RuntimeAction;
pub(super) use crate::actions::ScheduledAction;
pub(super) use crate::actions::ShareOutcome;
pub(super) use crate::actions::UserAction;
pub(super) use crate::elements::CodexCategory;
pub(super) use crate::galaxy::ResonanceState;
pub(super) use crate::reducer::OneiricEffect;
pub(super) use crate::reducer::SharePayload;
pub(super) use crate::state::AppState;
pub(super) use crate::state::AppView;
pub(super) use crate::state::CaptureResult;
pub(super) use crate::state::CaptureStage;
pub(super) use crate::state::Dream;
pub(super) use crate::state::DreamAnalysis;
pub(super) use crate::state::FailureKind;
pub(super) use crate::state::NoticeLevel;
pub(super) use crate::state::User;
pub(super) use crate::state::VideoStatus;
pub(super) use crate::store::DreamStore;
pub(super) use crate::store::MemoryKeyValueStore;
pub(super) use crate::store::ProfileStore;
pub(super) use crate::store::DREAMS_KEY;

mod capture_pipeline;
mod deep_analysis;
mod playback_share;

struct Harness {
    state: AppState,
    backend: MemoryKeyValueStore,
}

fn harness_with(dreams: Vec<Dream>, is_pro: bool) -> Harness {
    crate::logging::init_test();
    let encoded = serde_json::to_string(&dreams).expect("encode seed dreams");
    let backend = MemoryKeyValueStore::new().with_document(DREAMS_KEY, &encoded);
    let store = DreamStore::load(Box::new(backend.clone())).expect("load dreams");
    let user = User {
        is_pro,
        ..User::default()
    };
    let profile = ProfileStore::load(Box::new(backend.clone()), user).expect("load profile");
    Harness {
        state: AppState::new(store, profile),
        backend,
    }
}

fn harness() -> Harness {
    harness_with(Vec::new(), false)
}

fn run_user(state: &mut AppState, action: UserAction) -> Vec<OneiricEffect> {
    reduce(state, AppAction::User(action))
}

fn run_runtime(state: &mut AppState, action: RuntimeAction) -> Vec<OneiricEffect> {
    reduce(state, AppAction::Runtime(action))
}

fn persisted(backend: &MemoryKeyValueStore) -> Vec<Dream> {
    backend
        .document(DREAMS_KEY)
        .map(|doc| serde_json::from_str(&doc).expect("parse persisted dreams"))
        .unwrap_or_default()
}

fn dream(id: &str, day: u32, elements: &[&str], mood: &str) -> Dream {
    Dream {
        id: id.to_string(),
        date: Utc.with_ymd_and_hms(2024, 6, day, 6, 0, 0).unwrap(),
        audio_url: format!("audio/{id}.webm"),
        image_url: Some(format!("https://images.example/{id}.jpg")),
        video_url: None,
        video_status: VideoStatus::Pending,
        video_prompt: format!("slow drift through {id}"),
        title: format!("梦 {id}"),
        key_points: vec!["漂浮".to_string()],
        interpretation: "一段关于放下的梦".to_string(),
        mood: Some(mood.to_string()).filter(|mood| !mood.is_empty()),
        color: "#1e3a8a".to_string(),
        elements: elements.iter().map(|e| e.to_string()).collect(),
        detailed_analysis: None,
    }
}

fn analysis() -> DreamAnalysis {
    DreamAnalysis {
        title: "深海的低语".to_string(),
        key_points: vec!["潜水".to_string(), "无法呼吸".to_string()],
        interpretation: "你近期承受着压力".to_string(),
        mood: "焦虑".to_string(),
        color: "#1e3a8a".to_string(),
        image_prompt: "underwater city, blue light".to_string(),
        video_prompt: "camera sinking slowly".to_string(),
        elements: vec!["水".to_string(), "鱼".to_string()],
    }
}

/// Drives a capture through to the analyzing stage and returns its attempt id.
fn record_and_stop(state: &mut AppState) -> u64 {
    run_user(state, UserAction::StartRecording);
    let attempt_id = state.capture.stage.attempt_id().expect("recording attempt");
    run_runtime(
        state,
        RuntimeAction::AudioCaptured {
            attempt_id,
            chunk: vec![1, 2, 3, 4],
        },
    );
    run_user(state, UserAction::StopRecording);
    attempt_id
}

fn count_matching(effects: &[OneiricEffect], pred: impl Fn(&OneiricEffect) -> bool) -> usize {
    effects.iter().filter(|effect| pred(effect)).count()
}
