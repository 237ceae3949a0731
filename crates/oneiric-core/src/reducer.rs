use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use uuid::Uuid;

use super::actions::AppAction;
use super::actions::RuntimeAction;
use super::actions::ScheduledAction;
use super::actions::ShareOutcome;
use super::actions::UserAction;
use super::elements::aggregate;
use super::galaxy::star;
use super::galaxy::ResonanceState;
use super::galaxy::RESONANCE_STEP_MS;
use super::state::AppState;
use super::state::AppView;
use super::state::AudioBlob;
use super::state::CaptureOutcome;
use super::state::CaptureResult;
use super::state::CaptureStage;
use super::state::Dream;
use super::state::DreamAnalysis;
use super::state::ElementSelection;
use super::state::FailureKind;
use super::state::GalaxyTarget;
use super::state::Notice;
use super::state::Playback;
use super::state::VideoStatus;
use super::state::SHARE_HASHTAG;

pub const FALLBACK_TITLE: &str = "无题之梦";
pub const FALLBACK_COLOR: &str = "#6366f1";
pub const SYMBOL_SILENCE: &str = "这个符号保持沉默。";

const MSG_PERMISSION_DENIED: &str = "需要麦克风权限才能记录梦境。";
const MSG_PROCESSING_FAILED: &str = "梦境处理失败，请重试。";
const MSG_DEEP_ANALYSIS_FAILED: &str = "解读失败，请检查网络连接";
const MSG_COPIED: &str = "内容已复制到剪贴板";
const MSG_COPY_FAILED: &str = "复制失败";
const MSG_SAVE_FAILED: &str = "保存失败，更改仅保留在本次会话中";

/// Instructions for the host. The reducer never performs I/O beyond the store itself.
#[derive(Debug, Clone, PartialEq)]
pub enum OneiricEffect {
    RequestFrame,
    AcquireAudioInput {
        attempt_id: u64,
    },
    ReleaseAudioInput {
        attempt_id: u64,
    },
    Analyze {
        attempt_id: u64,
        audio: AudioBlob,
    },
    GenerateImage {
        attempt_id: u64,
        prompt: String,
    },
    /// Persist the sealed recording under the reference stored in `Dream::audio_url`.
    StoreAudio {
        reference: String,
        audio: AudioBlob,
    },
    ReleaseAudio {
        reference: String,
    },
    GenerateVideo {
        dream_id: String,
        prompt: String,
    },
    AnalyzeDepth {
        dream: Box<Dream>,
    },
    AnalyzeSymbol {
        name: String,
        count: usize,
    },
    StartPlayback {
        playback_id: u64,
        dream_id: String,
        audio_url: String,
    },
    StopPlayback,
    Share(SharePayload),
    Schedule {
        after_ms: u64,
        action: ScheduledAction,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePayload {
    pub title: String,
    pub text: String,
    pub media: Option<String>,
}

pub fn reduce(state: &mut AppState, action: AppAction) -> Vec<OneiricEffect> {
    match action {
        AppAction::User(user) => reduce_user(state, user),
        AppAction::Runtime(runtime) => reduce_runtime(state, runtime),
    }
}

fn reduce_user(state: &mut AppState, action: UserAction) -> Vec<OneiricEffect> {
    match action {
        UserAction::ToggleMenu => {
            // The menu never opens over a codex overlay; those unwind first.
            if !state.routing.menu_open && state.overlays.innermost().is_some() {
                return Vec::new();
            }
            state.routing.menu_open = !state.routing.menu_open;
            vec![OneiricEffect::RequestFrame]
        }
        UserAction::HeaderControl => {
            match state.overlays.innermost() {
                Some(kind) => state.overlays.close(kind),
                None => state.routing.menu_open = !state.routing.menu_open,
            }
            vec![OneiricEffect::RequestFrame]
        }
        UserAction::Navigate(view) => {
            if view == AppView::Detail && state.selected_dream().is_none() {
                return Vec::new();
            }
            let mut effects = set_view(state, view);
            effects.push(OneiricEffect::RequestFrame);
            effects
        }
        UserAction::Back => {
            let mut effects = back(state);
            effects.push(OneiricEffect::RequestFrame);
            effects
        }
        UserAction::ScrollCollection(delta) => {
            let target = state.selection.collection_scroll + delta;
            scroll_to(state, target)
        }
        UserAction::SetCollectionScroll(offset) => scroll_to(state, offset),
        UserAction::SelectDream { id } => {
            if !state.dreams.contains(&id) {
                return Vec::new();
            }
            state.selection.selected_dream = Some(id);
            state.overlays.analysis_modal_open = false;
            let mut effects = set_view(state, AppView::Detail);
            effects.push(OneiricEffect::RequestFrame);
            effects
        }
        UserAction::DeleteDream { id } => delete_dream(state, &id),

        UserAction::StartRecording => start_recording(state),
        UserAction::StopRecording => stop_recording(state),
        UserAction::CancelRecording => {
            let mut effects = cancel_recording(state);
            effects.push(OneiricEffect::RequestFrame);
            effects
        }

        UserAction::TriggerVideo { id } => trigger_video(state, &id),
        UserAction::OpenDeepAnalysis => open_deep_analysis(state),
        UserAction::CloseAnalysis => {
            state.overlays.analysis_modal_open = false;
            vec![OneiricEffect::RequestFrame]
        }
        UserAction::ShareDream { id } => {
            let Some(dream) = state.dreams.get(&id) else {
                return Vec::new();
            };
            vec![OneiricEffect::Share(SharePayload {
                title: dream.title.clone(),
                text: dream.share_text(),
                media: dream.image_url.clone(),
            })]
        }
        UserAction::ShareAnalysis => {
            let Some(dream) = state.selected_dream() else {
                return Vec::new();
            };
            let Some(analysis) = dream.detailed_analysis.as_deref() else {
                return Vec::new();
            };
            let title = if dream.title.trim().is_empty() {
                "梦境解读".to_string()
            } else {
                dream.title.clone()
            };
            vec![OneiricEffect::Share(SharePayload {
                title,
                text: format!("{analysis}\n\n{SHARE_HASHTAG}"),
                media: None,
            })]
        }
        UserAction::TogglePlayback { id } => toggle_playback(state, &id),

        UserAction::OpenCodexCategory(category) => {
            state.overlays.codex_category = Some(category);
            vec![OneiricEffect::RequestFrame]
        }
        UserAction::OpenElement { name } => open_element(state, name),

        UserAction::OpenGalaxyTarget { star_id } => {
            let Some(star) = star(&star_id) else {
                return Vec::new();
            };
            state.overlays.galaxy_target = Some(GalaxyTarget {
                star_id: star.id,
                resonance: ResonanceState::Idle,
            });
            vec![OneiricEffect::RequestFrame]
        }
        UserAction::DismissGalaxyTarget => {
            let idle = matches!(
                &state.overlays.galaxy_target,
                Some(target) if target.resonance == ResonanceState::Idle
            );
            if !idle {
                return Vec::new();
            }
            state.overlays.galaxy_target = None;
            vec![OneiricEffect::RequestFrame]
        }
        UserAction::SendResonance => {
            let Some(target) = state.overlays.galaxy_target.as_mut() else {
                return Vec::new();
            };
            if target.resonance != ResonanceState::Idle {
                return Vec::new();
            }
            target.resonance = ResonanceState::Sending;
            vec![
                OneiricEffect::Schedule {
                    after_ms: RESONANCE_STEP_MS,
                    action: ScheduledAction::ResonanceDelivered,
                },
                OneiricEffect::RequestFrame,
            ]
        }
        UserAction::ToggleResonanceNotice => {
            state.resonance_notice_visible = !state.resonance_notice_visible;
            vec![OneiricEffect::RequestFrame]
        }

        UserAction::TogglePro => {
            match state.profile.toggle_pro() {
                Ok(true) => {
                    state.notices.push(Notice::success("已升级为专业会员"));
                }
                Ok(false) => {
                    state.notices.push(Notice::info("已切换为免费账户"));
                }
                Err(err) => {
                    tracing::error!(error = %err, "failed to save profile");
                    state
                        .notices
                        .push(Notice::failure(FailureKind::StoreWriteFailed, MSG_SAVE_FAILED));
                }
            }
            vec![OneiricEffect::RequestFrame]
        }
        UserAction::DismissNotice { seq } => {
            if state.notices.dismiss(seq) {
                vec![OneiricEffect::RequestFrame]
            } else {
                Vec::new()
            }
        }
    }
}

fn reduce_runtime(state: &mut AppState, action: RuntimeAction) -> Vec<OneiricEffect> {
    match action {
        RuntimeAction::AudioInputDenied { attempt_id, reason } => {
            if !matches!(
                &state.capture.stage,
                CaptureStage::Recording { attempt_id: current, .. } if *current == attempt_id
            ) {
                tracing::debug!(attempt_id, "ignoring stale audio denial");
                return Vec::new();
            }
            tracing::warn!(attempt_id, %reason, "audio input unavailable");
            finish_attempt(
                state,
                attempt_id,
                CaptureResult::Failed(FailureKind::PermissionDenied),
            );
            state.notices.push(Notice::failure(
                FailureKind::PermissionDenied,
                MSG_PERMISSION_DENIED,
            ));
            vec![OneiricEffect::RequestFrame]
        }
        RuntimeAction::AudioInputEnded { attempt_id } => {
            if !matches!(
                &state.capture.stage,
                CaptureStage::Recording { attempt_id: current, .. } if *current == attempt_id
            ) {
                tracing::debug!(attempt_id, "ignoring stale end of audio input");
                return Vec::new();
            }
            stop_recording(state)
        }
        RuntimeAction::AudioCaptured { attempt_id, chunk } => {
            if let CaptureStage::Recording {
                attempt_id: current,
                buffer,
                ..
            } = &mut state.capture.stage
            {
                if *current == attempt_id {
                    buffer.extend_from_slice(&chunk);
                }
            }
            Vec::new()
        }
        RuntimeAction::RecordingTick { attempt_id } => {
            if let CaptureStage::Recording {
                attempt_id: current,
                elapsed_secs,
                ..
            } = &mut state.capture.stage
            {
                if *current == attempt_id {
                    *elapsed_secs += 1;
                    return vec![OneiricEffect::RequestFrame];
                }
            }
            Vec::new()
        }
        RuntimeAction::AnalysisFinished { attempt_id, result } => {
            analysis_finished(state, attempt_id, result)
        }
        RuntimeAction::ImageFinished { attempt_id, result } => {
            image_finished(state, attempt_id, result)
        }
        RuntimeAction::VideoFinished { dream_id, result } => {
            video_finished(state, &dream_id, result)
        }
        RuntimeAction::DeepAnalysisFinished { dream_id, result } => {
            deep_analysis_finished(state, &dream_id, result)
        }
        RuntimeAction::SymbolAnalysisFinished { name, result } => {
            let Some(selection) = state.overlays.selected_element.as_mut() else {
                return Vec::new();
            };
            if selection.name != name || !selection.loading {
                tracing::debug!(%name, "ignoring stale symbol analysis");
                return Vec::new();
            }
            selection.loading = false;
            match result {
                Ok(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        selection.analysis = Some(text.to_string());
                    }
                }
                Err(reason) => {
                    tracing::warn!(%name, %reason, "symbol analysis failed");
                    state.notices.push(Notice::failure(
                        FailureKind::SymbolAnalysisFailed,
                        "符号解读失败",
                    ));
                }
            }
            vec![OneiricEffect::RequestFrame]
        }
        RuntimeAction::PlaybackEnded { playback_id } => {
            if state
                .playback
                .as_ref()
                .is_some_and(|playback| playback.playback_id == playback_id)
            {
                state.playback = None;
                return vec![OneiricEffect::RequestFrame];
            }
            tracing::debug!(playback_id, "ignoring end of a replaced playback");
            Vec::new()
        }
        RuntimeAction::ShareFinished(outcome) => {
            match outcome {
                ShareOutcome::Shared => {}
                ShareOutcome::Copied => {
                    state.notices.push(Notice::success(MSG_COPIED));
                }
                ShareOutcome::Failed(reason) => {
                    tracing::warn!(%reason, "share failed");
                    state
                        .notices
                        .push(Notice::failure(FailureKind::ShareFailed, MSG_COPY_FAILED));
                }
            }
            vec![OneiricEffect::RequestFrame]
        }
        RuntimeAction::Scheduled(ScheduledAction::ResonanceDelivered) => {
            let Some(target) = state.overlays.galaxy_target.as_mut() else {
                return Vec::new();
            };
            if target.resonance != ResonanceState::Sending {
                return Vec::new();
            }
            target.resonance = ResonanceState::Sent;
            vec![
                OneiricEffect::Schedule {
                    after_ms: RESONANCE_STEP_MS,
                    action: ScheduledAction::ResonanceDismissed,
                },
                OneiricEffect::RequestFrame,
            ]
        }
        RuntimeAction::Scheduled(ScheduledAction::ResonanceDismissed) => {
            let sent = matches!(
                &state.overlays.galaxy_target,
                Some(target) if target.resonance == ResonanceState::Sent
            );
            if !sent {
                return Vec::new();
            }
            state.overlays.galaxy_target = None;
            vec![OneiricEffect::RequestFrame]
        }
    }
}

fn set_view(state: &mut AppState, view: AppView) -> Vec<OneiricEffect> {
    let mut effects = Vec::new();
    let previous = state.routing.view;
    if previous == AppView::Galaxy && view != AppView::Galaxy {
        state.overlays.galaxy_target = None;
    }
    if previous == AppView::Codex && view != AppView::Codex {
        state.overlays.selected_element = None;
        state.overlays.codex_category = None;
    }
    if previous == AppView::Add && view != AppView::Add {
        effects.extend(cancel_recording(state));
    }
    if view != AppView::Detail {
        state.overlays.analysis_modal_open = false;
    }
    state.routing.view = view;
    state.routing.menu_open = false;
    effects
}

fn back(state: &mut AppState) -> Vec<OneiricEffect> {
    if let Some(kind) = state.overlays.innermost() {
        state.overlays.close(kind);
        return Vec::new();
    }
    if state.routing.view.is_menu_page() {
        return set_view(state, AppView::List);
    }
    let mut effects = set_view(state, AppView::List);
    state.selection.selected_dream = None;
    if state.playback.take().is_some() {
        effects.push(OneiricEffect::StopPlayback);
    }
    effects
}

fn scroll_to(state: &mut AppState, offset: f32) -> Vec<OneiricEffect> {
    let clamped = state
        .selection
        .layout
        .clamp_scroll(offset, state.dreams.len());
    if clamped == state.selection.collection_scroll {
        return Vec::new();
    }
    state.selection.collection_scroll = clamped;
    vec![OneiricEffect::RequestFrame]
}

fn delete_dream(state: &mut AppState, id: &str) -> Vec<OneiricEffect> {
    let (removed, saved) = state.dreams.remove_by_id(id);
    let Some(removed) = removed else {
        return Vec::new();
    };
    // The record is gone from the session either way, so its audio goes with it.
    let mut effects = vec![OneiricEffect::ReleaseAudio {
        reference: removed.audio_url,
    }];
    match saved {
        Ok(()) => tracing::info!(dream_id = %id, "dream deleted"),
        Err(err) => {
            tracing::error!(dream_id = %id, error = %err, "failed to save after delete");
            state
                .notices
                .push(Notice::failure(FailureKind::StoreWriteFailed, MSG_SAVE_FAILED));
        }
    }
    state.enrichment.deep_analysis_in_flight.remove(id);
    if state
        .playback
        .as_ref()
        .is_some_and(|playback| playback.dream_id == id)
    {
        state.playback = None;
        effects.push(OneiricEffect::StopPlayback);
    }
    effects.extend(back(state));
    if state.selection.selected_dream.as_deref() == Some(id) {
        state.selection.selected_dream = None;
    }
    let scroll = state.selection.collection_scroll;
    state.selection.collection_scroll = state
        .selection
        .layout
        .clamp_scroll(scroll, state.dreams.len());
    effects.push(OneiricEffect::RequestFrame);
    effects
}

fn start_recording(state: &mut AppState) -> Vec<OneiricEffect> {
    if !state.capture.stage.is_idle() {
        tracing::debug!(stage = state.capture.stage.label(), "capture already in progress");
        state
            .notices
            .push(Notice::info("上一个梦境仍在处理中，请稍候"));
        return vec![OneiricEffect::RequestFrame];
    }
    let attempt_id = state.capture.next_attempt_id;
    state.capture.next_attempt_id += 1;
    state.capture.stage = CaptureStage::Recording {
        attempt_id,
        buffer: Vec::new(),
        elapsed_secs: 0,
    };
    tracing::info!(attempt_id, "recording started");
    let mut effects = set_view(state, AppView::Add);
    effects.push(OneiricEffect::AcquireAudioInput { attempt_id });
    effects.push(OneiricEffect::RequestFrame);
    effects
}

fn stop_recording(state: &mut AppState) -> Vec<OneiricEffect> {
    let CaptureStage::Recording {
        attempt_id, buffer, ..
    } = &mut state.capture.stage
    else {
        return Vec::new();
    };
    let attempt_id = *attempt_id;
    let buffer = std::mem::take(buffer);

    if buffer.is_empty() {
        finish_attempt(state, attempt_id, CaptureResult::Cancelled);
        state.notices.push(Notice::info("没有录到任何声音"));
        return vec![
            OneiricEffect::ReleaseAudioInput { attempt_id },
            OneiricEffect::RequestFrame,
        ];
    }

    let audio = AudioBlob::seal(buffer);
    tracing::info!(attempt_id, bytes = audio.len(), "recording sealed, analyzing");
    state.capture.stage = CaptureStage::Analyzing {
        attempt_id,
        audio: audio.clone(),
    };
    vec![
        OneiricEffect::ReleaseAudioInput { attempt_id },
        OneiricEffect::Analyze { attempt_id, audio },
        OneiricEffect::RequestFrame,
    ]
}

fn cancel_recording(state: &mut AppState) -> Vec<OneiricEffect> {
    let CaptureStage::Recording { attempt_id, .. } = state.capture.stage else {
        return Vec::new();
    };
    tracing::info!(attempt_id, "recording cancelled");
    finish_attempt(state, attempt_id, CaptureResult::Cancelled);
    vec![OneiricEffect::ReleaseAudioInput { attempt_id }]
}

fn finish_attempt(state: &mut AppState, attempt_id: u64, result: CaptureResult) {
    state.capture.stage = CaptureStage::Idle;
    state.capture.last_outcome = Some(CaptureOutcome { attempt_id, result });
}

fn analysis_finished(
    state: &mut AppState,
    attempt_id: u64,
    result: Result<DreamAnalysis, String>,
) -> Vec<OneiricEffect> {
    let audio = match &state.capture.stage {
        CaptureStage::Analyzing {
            attempt_id: current,
            audio,
        } if *current == attempt_id => audio.clone(),
        _ => {
            tracing::debug!(attempt_id, "ignoring stale analysis result");
            return Vec::new();
        }
    };

    match result {
        Ok(analysis) => {
            let analysis = normalize_analysis(analysis);
            let prompt = analysis.image_prompt.clone();
            tracing::info!(attempt_id, title = %analysis.title, "analysis complete, painting");
            state.capture.stage = CaptureStage::Painting {
                attempt_id,
                audio,
                analysis,
            };
            vec![
                OneiricEffect::GenerateImage { attempt_id, prompt },
                OneiricEffect::RequestFrame,
            ]
        }
        Err(reason) => {
            tracing::warn!(attempt_id, %reason, "analysis failed");
            finish_attempt(
                state,
                attempt_id,
                CaptureResult::Failed(FailureKind::AnalysisFailed),
            );
            state.notices.push(Notice::failure(
                FailureKind::AnalysisFailed,
                MSG_PROCESSING_FAILED,
            ));
            vec![OneiricEffect::RequestFrame]
        }
    }
}

fn image_finished(
    state: &mut AppState,
    attempt_id: u64,
    result: Result<String, String>,
) -> Vec<OneiricEffect> {
    let stage = std::mem::replace(&mut state.capture.stage, CaptureStage::Idle);
    let (audio, analysis) = match stage {
        CaptureStage::Painting {
            attempt_id: current,
            audio,
            analysis,
        } if current == attempt_id => (audio, analysis),
        other => {
            state.capture.stage = other;
            tracing::debug!(attempt_id, "ignoring stale image result");
            return Vec::new();
        }
    };

    let image_url = match result {
        Ok(url) if !url.trim().is_empty() => url.trim().to_string(),
        other => {
            let reason = other.err().unwrap_or_else(|| "empty image reference".to_string());
            tracing::warn!(attempt_id, %reason, "image generation failed");
            finish_attempt(
                state,
                attempt_id,
                CaptureResult::Failed(FailureKind::ImageGenFailed),
            );
            state.notices.push(Notice::failure(
                FailureKind::ImageGenFailed,
                MSG_PROCESSING_FAILED,
            ));
            return vec![OneiricEffect::RequestFrame];
        }
    };

    let dream = assemble_dream(analysis, image_url);
    let dream_id = dream.id.clone();
    let reference = dream.audio_url.clone();

    if let Err(err) = state.dreams.append(dream) {
        tracing::error!(dream_id = %dream_id, error = %err, "failed to save new dream");
        state
            .notices
            .push(Notice::failure(FailureKind::StoreWriteFailed, MSG_SAVE_FAILED));
    } else {
        state.notices.push(Notice::success("梦境已记录"));
    }
    tracing::info!(attempt_id, dream_id = %dream_id, "dream captured");

    finish_attempt(
        state,
        attempt_id,
        CaptureResult::Succeeded {
            dream_id: dream_id.clone(),
        },
    );
    state.selection.selected_dream = Some(dream_id);
    state.selection.collection_scroll = 0.0;
    state.overlays.analysis_modal_open = false;

    let mut effects = vec![OneiricEffect::StoreAudio { reference, audio }];
    effects.extend(set_view(state, AppView::Detail));
    effects.push(OneiricEffect::RequestFrame);
    effects
}

fn assemble_dream(analysis: DreamAnalysis, image_url: String) -> Dream {
    let id = Uuid::new_v4().to_string();
    let mood = Some(analysis.mood).filter(|mood| !mood.is_empty());
    Dream {
        audio_url: format!("audio/{id}.webm"),
        id,
        date: Utc::now(),
        image_url: Some(image_url),
        video_url: None,
        video_status: VideoStatus::Pending,
        video_prompt: analysis.video_prompt,
        title: analysis.title,
        key_points: analysis.key_points,
        interpretation: analysis.interpretation,
        mood,
        color: analysis.color,
        elements: analysis.elements,
        detailed_analysis: None,
    }
}

/// Trims every field, drops blank list entries and replaces an unusable title or colour.
pub fn normalize_analysis(analysis: DreamAnalysis) -> DreamAnalysis {
    let title = analysis.title.trim();
    let color = analysis.color.trim();
    DreamAnalysis {
        title: if title.is_empty() {
            FALLBACK_TITLE.to_string()
        } else {
            title.to_string()
        },
        key_points: trimmed_entries(analysis.key_points),
        interpretation: analysis.interpretation.trim().to_string(),
        mood: analysis.mood.trim().to_string(),
        color: if is_hex_color(color) {
            color.to_string()
        } else {
            FALLBACK_COLOR.to_string()
        },
        image_prompt: analysis.image_prompt.trim().to_string(),
        video_prompt: analysis.video_prompt.trim().to_string(),
        elements: trimmed_entries(analysis.elements),
    }
}

fn trimmed_entries(entries: Vec<String>) -> Vec<String> {
    entries
        .into_iter()
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}

static HEX_COLOR: OnceLock<Option<Regex>> = OnceLock::new();

pub fn is_hex_color(value: &str) -> bool {
    HEX_COLOR
        .get_or_init(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(value))
}

fn trigger_video(state: &mut AppState, id: &str) -> Vec<OneiricEffect> {
    let Some(dream) = state.dreams.get(id) else {
        return Vec::new();
    };
    if !state.user().is_pro {
        state.notices.push(Notice::failure(
            FailureKind::EntitlementRequired,
            "视频生成仅对专业会员开放",
        ));
        return vec![OneiricEffect::RequestFrame];
    }
    if !dream.video_status.can_start() {
        tracing::debug!(dream_id = %id, status = dream.video_status.label(), "video already underway");
        return Vec::new();
    }
    let prompt = dream.video_prompt.clone();

    let saved = state.dreams.update_by_id(id, |dream| {
        dream.video_status = VideoStatus::Processing;
        dream.video_url = None;
    });
    if let Err(err) = saved {
        tracing::error!(dream_id = %id, error = %err, "failed to save video status");
        state
            .notices
            .push(Notice::failure(FailureKind::StoreWriteFailed, MSG_SAVE_FAILED));
    }
    tracing::info!(dream_id = %id, "video generation requested");
    vec![
        OneiricEffect::GenerateVideo {
            dream_id: id.to_string(),
            prompt,
        },
        OneiricEffect::RequestFrame,
    ]
}

fn video_finished(
    state: &mut AppState,
    dream_id: &str,
    result: Result<String, String>,
) -> Vec<OneiricEffect> {
    let processing = state
        .dreams
        .get(dream_id)
        .is_some_and(|dream| dream.video_status == VideoStatus::Processing);
    if !processing {
        tracing::debug!(%dream_id, "dropping video result for missing or settled dream");
        return Vec::new();
    }

    let saved = match result {
        Ok(url) => {
            tracing::info!(%dream_id, "video ready");
            state.dreams.update_by_id(dream_id, |dream| {
                dream.video_status = VideoStatus::Completed;
                dream.video_url = Some(url);
            })
        }
        Err(reason) => {
            tracing::warn!(%dream_id, %reason, "video generation failed");
            state.notices.push(Notice::failure(
                FailureKind::VideoGenFailed,
                "视频生成失败，可以重试",
            ));
            state.dreams.update_by_id(dream_id, |dream| {
                dream.video_status = VideoStatus::Failed;
                dream.video_url = None;
            })
        }
    };
    if let Err(err) = saved {
        tracing::error!(%dream_id, error = %err, "failed to save video result");
        state
            .notices
            .push(Notice::failure(FailureKind::StoreWriteFailed, MSG_SAVE_FAILED));
    }
    vec![OneiricEffect::RequestFrame]
}

fn open_deep_analysis(state: &mut AppState) -> Vec<OneiricEffect> {
    let Some(dream) = state.selected_dream() else {
        return Vec::new();
    };
    if dream.detailed_analysis.is_some() {
        state.overlays.analysis_modal_open = true;
        return vec![OneiricEffect::RequestFrame];
    }
    if state.enrichment.deep_analysis_in_flight.contains(&dream.id) {
        return Vec::new();
    }
    let dream = Box::new(dream.clone());
    state
        .enrichment
        .deep_analysis_in_flight
        .insert(dream.id.clone());
    tracing::info!(dream_id = %dream.id, "deep analysis requested");
    vec![
        OneiricEffect::AnalyzeDepth { dream },
        OneiricEffect::RequestFrame,
    ]
}

fn deep_analysis_finished(
    state: &mut AppState,
    dream_id: &str,
    result: Result<String, String>,
) -> Vec<OneiricEffect> {
    if !state.enrichment.deep_analysis_in_flight.remove(dream_id) {
        tracing::debug!(%dream_id, "ignoring unexpected deep analysis result");
        return Vec::new();
    }
    let text = match result {
        Ok(text) => text,
        Err(reason) => {
            tracing::warn!(%dream_id, %reason, "deep analysis failed");
            state.notices.push(Notice::failure(
                FailureKind::DeepAnalysisFailed,
                MSG_DEEP_ANALYSIS_FAILED,
            ));
            return vec![OneiricEffect::RequestFrame];
        }
    };

    let saved = state.dreams.update_by_id(dream_id, |dream| {
        if dream.detailed_analysis.is_none() {
            dream.detailed_analysis = Some(text);
        }
    });
    match saved {
        Ok(false) => {
            tracing::debug!(%dream_id, "dropping deep analysis for deleted dream");
            return vec![OneiricEffect::RequestFrame];
        }
        Ok(true) => {}
        Err(err) => {
            tracing::error!(%dream_id, error = %err, "failed to save deep analysis");
            state
                .notices
                .push(Notice::failure(FailureKind::StoreWriteFailed, MSG_SAVE_FAILED));
        }
    }
    if state.selection.selected_dream.as_deref() == Some(dream_id)
        && state.routing.view == AppView::Detail
    {
        state.overlays.analysis_modal_open = true;
    }
    vec![OneiricEffect::RequestFrame]
}

fn toggle_playback(state: &mut AppState, id: &str) -> Vec<OneiricEffect> {
    if state
        .playback
        .as_ref()
        .is_some_and(|playback| playback.dream_id == id)
    {
        state.playback = None;
        return vec![OneiricEffect::StopPlayback, OneiricEffect::RequestFrame];
    }
    let Some(dream) = state.dreams.get(id) else {
        return Vec::new();
    };
    let audio_url = dream.audio_url.clone();

    let mut effects = Vec::new();
    if state.playback.take().is_some() {
        effects.push(OneiricEffect::StopPlayback);
    }
    let playback_id = state.next_playback_id;
    state.next_playback_id += 1;
    state.playback = Some(Playback {
        playback_id,
        dream_id: id.to_string(),
    });
    effects.push(OneiricEffect::StartPlayback {
        playback_id,
        dream_id: id.to_string(),
        audio_url,
    });
    effects.push(OneiricEffect::RequestFrame);
    effects
}

fn open_element(state: &mut AppState, name: String) -> Vec<OneiricEffect> {
    let index = aggregate(state.dreams.dreams());
    let Some(entry) = index.get(&name) else {
        return Vec::new();
    };
    let count = entry.count;
    state.overlays.selected_element = Some(ElementSelection {
        name: name.clone(),
        count,
        first_seen: entry.first_seen,
        image_url: entry.latest_image_url.clone(),
        analysis: None,
        loading: true,
    });
    vec![
        OneiricEffect::AnalyzeSymbol { name, count },
        OneiricEffect::RequestFrame,
    ]
}

#[cfg(test)]
mod tests;
