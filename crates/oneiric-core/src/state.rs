use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::collection::CollectionLayout;
use crate::elements::CodexCategory;
use crate::galaxy::ResonanceState;
use crate::store::DreamStore;
use crate::store::ProfileStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl VideoStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether a user trigger may start (or restart) generation from this status.
    pub fn can_start(self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dream {
    pub id: String,
    pub date: DateTime<Utc>,
    pub audio_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default)]
    pub video_status: VideoStatus,
    #[serde(default)]
    pub video_prompt: String,
    pub title: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    pub interpretation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    pub color: String,
    #[serde(default)]
    pub elements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_analysis: Option<String>,
}

impl Dream {
    /// Text handed to the share boundary for this record.
    pub fn share_text(&self) -> String {
        format!(
            "【{}】\n\n{}\n\n{}",
            self.title, self.interpretation, SHARE_HASHTAG
        )
    }
}

pub const SHARE_HASHTAG: &str = "#Oneiric梦境日志";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub is_pro: bool,
}

impl User {
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            id: "user_01".to_string(),
            name: name.into(),
            is_pro: false,
        }
    }
}

impl Default for User {
    fn default() -> Self {
        Self::with_name("造梦者")
    }
}

/// Structured output of the analysis stage. All fields arrive together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DreamAnalysis {
    pub title: String,
    pub key_points: Vec<String>,
    pub interpretation: String,
    pub mood: String,
    pub color: String,
    pub image_prompt: String,
    pub video_prompt: String,
    pub elements: Vec<String>,
}

/// Sealed recording. Cheap to clone; the bytes never change after sealing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBlob {
    pub bytes: Arc<[u8]>,
    pub mime: &'static str,
}

impl AudioBlob {
    pub fn seal(buffer: Vec<u8>) -> Self {
        Self {
            bytes: buffer.into(),
            mime: "audio/webm",
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppView {
    List,
    Add,
    Detail,
    Profile,
    Codex,
    Galaxy,
    About,
}

impl AppView {
    pub fn label(self) -> &'static str {
        match self {
            Self::List => "梦境列表",
            Self::Add => "记录梦境",
            Self::Detail => "梦境详情",
            Self::Profile => "个人档案",
            Self::Codex => "梦境图鉴",
            Self::Galaxy => "共鸣星海",
            Self::About => "关于应用",
        }
    }

    /// Views reachable from the menu; back from any of them lands on the list.
    pub fn is_menu_page(self) -> bool {
        matches!(self, Self::Profile | Self::Codex | Self::Galaxy | Self::About)
    }
}

pub const MENU_VIEWS: [AppView; 4] = [
    AppView::Profile,
    AppView::Codex,
    AppView::Galaxy,
    AppView::About,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    SelectedElement,
    CodexCategory,
}

/// Innermost first. Back navigation and the header control close the first open entry.
pub const OVERLAY_UNWIND_ORDER: [OverlayKind; 2] =
    [OverlayKind::SelectedElement, OverlayKind::CodexCategory];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSelection {
    pub name: String,
    pub count: usize,
    pub first_seen: DateTime<Utc>,
    pub image_url: Option<String>,
    /// Only ever held here; never written back to a dream.
    pub analysis: Option<String>,
    pub loading: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalaxyTarget {
    pub star_id: &'static str,
    pub resonance: ResonanceState,
}

#[derive(Debug, Clone, Default)]
pub struct Overlays {
    pub codex_category: Option<CodexCategory>,
    pub selected_element: Option<ElementSelection>,
    pub galaxy_target: Option<GalaxyTarget>,
    pub analysis_modal_open: bool,
}

impl Overlays {
    pub fn is_open(&self, kind: OverlayKind) -> bool {
        match kind {
            OverlayKind::SelectedElement => self.selected_element.is_some(),
            OverlayKind::CodexCategory => self.codex_category.is_some(),
        }
    }

    pub fn innermost(&self) -> Option<OverlayKind> {
        OVERLAY_UNWIND_ORDER
            .iter()
            .copied()
            .find(|kind| self.is_open(*kind))
    }

    pub fn close(&mut self, kind: OverlayKind) {
        match kind {
            OverlayKind::SelectedElement => self.selected_element = None,
            OverlayKind::CodexCategory => self.codex_category = None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Routing {
    pub view: AppView,
    pub menu_open: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub selected_dream: Option<String>,
    pub collection_scroll: f32,
    pub layout: CollectionLayout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureStage {
    Idle,
    Recording {
        attempt_id: u64,
        buffer: Vec<u8>,
        elapsed_secs: u64,
    },
    Analyzing {
        attempt_id: u64,
        audio: AudioBlob,
    },
    Painting {
        attempt_id: u64,
        audio: AudioBlob,
        analysis: DreamAnalysis,
    },
}

impl CaptureStage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording { .. } => "recording",
            Self::Analyzing { .. } => "analyzing",
            Self::Painting { .. } => "painting",
        }
    }

    pub fn attempt_id(&self) -> Option<u64> {
        match self {
            Self::Idle => None,
            Self::Recording { attempt_id, .. }
            | Self::Analyzing { attempt_id, .. }
            | Self::Painting { attempt_id, .. } => Some(*attempt_id),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureResult {
    Succeeded { dream_id: String },
    Failed(FailureKind),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOutcome {
    pub attempt_id: u64,
    pub result: CaptureResult,
}

#[derive(Debug, Clone)]
pub struct CaptureState {
    pub stage: CaptureStage,
    pub next_attempt_id: u64,
    pub last_outcome: Option<CaptureOutcome>,
}

impl Default for CaptureState {
    fn default() -> Self {
        Self {
            stage: CaptureStage::Idle,
            next_attempt_id: 1,
            last_outcome: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnrichmentState {
    pub deep_analysis_in_flight: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    PermissionDenied,
    AnalysisFailed,
    ImageGenFailed,
    VideoGenFailed,
    DeepAnalysisFailed,
    SymbolAnalysisFailed,
    StoreWriteFailed,
    ShareFailed,
    EntitlementRequired,
}

impl FailureKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission-denied",
            Self::AnalysisFailed => "analysis-failed",
            Self::ImageGenFailed => "image-gen-failed",
            Self::VideoGenFailed => "video-gen-failed",
            Self::DeepAnalysisFailed => "deep-analysis-failed",
            Self::SymbolAnalysisFailed => "symbol-analysis-failed",
            Self::StoreWriteFailed => "store-write-failed",
            Self::ShareFailed => "share-failed",
            Self::EntitlementRequired => "entitlement-required",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub seq: u64,
    pub level: NoticeLevel,
    pub failure: Option<FailureKind>,
    pub message: Arc<str>,
}

impl Notice {
    pub fn info(message: impl Into<Arc<str>>) -> Self {
        Self {
            seq: 0,
            level: NoticeLevel::Info,
            failure: None,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<Arc<str>>) -> Self {
        Self {
            seq: 0,
            level: NoticeLevel::Success,
            failure: None,
            message: message.into(),
        }
    }

    pub fn failure(kind: FailureKind, message: impl Into<Arc<str>>) -> Self {
        Self {
            seq: 0,
            level: NoticeLevel::Error,
            failure: Some(kind),
            message: message.into(),
        }
    }
}

pub const NOTICE_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct NoticeBuffer {
    cap: usize,
    next_seq: u64,
    buf: VecDeque<Notice>,
}

impl NoticeBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            next_seq: 1,
            buf: VecDeque::with_capacity(cap),
        }
    }

    pub fn push(&mut self, mut notice: Notice) -> u64 {
        notice.seq = self.next_seq;
        self.next_seq += 1;

        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        let seq = notice.seq;
        self.buf.push_back(notice);
        seq
    }

    pub fn dismiss(&mut self, seq: u64) -> bool {
        let before = self.buf.len();
        self.buf.retain(|notice| notice.seq != seq);
        before != self.buf.len()
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.buf.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.buf.iter()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl Default for NoticeBuffer {
    fn default() -> Self {
        Self::new(NOTICE_CAPACITY)
    }
}

/// Dream whose audio is currently playing. At most one at a time.
///
/// `playback_id` is fresh for every start, so an end report from a player that was
/// already replaced never clears its successor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playback {
    pub playback_id: u64,
    pub dream_id: String,
}

#[derive(Debug)]
pub struct AppState {
    pub dreams: DreamStore,
    pub profile: ProfileStore,
    pub routing: Routing,
    pub overlays: Overlays,
    pub selection: Selection,
    pub capture: CaptureState,
    pub enrichment: EnrichmentState,
    pub playback: Option<Playback>,
    pub next_playback_id: u64,
    pub notices: NoticeBuffer,
    pub resonance_notice_visible: bool,
}

impl AppState {
    pub fn new(dreams: DreamStore, profile: ProfileStore) -> Self {
        Self {
            dreams,
            profile,
            routing: Routing {
                view: AppView::List,
                menu_open: false,
            },
            overlays: Overlays::default(),
            selection: Selection::default(),
            capture: CaptureState::default(),
            enrichment: EnrichmentState::default(),
            playback: None,
            next_playback_id: 1,
            notices: NoticeBuffer::default(),
            resonance_notice_visible: false,
        }
    }

    pub fn selected_dream(&self) -> Option<&Dream> {
        self.selection
            .selected_dream
            .as_deref()
            .and_then(|id| self.dreams.get(id))
    }

    pub fn user(&self) -> &User {
        self.profile.user()
    }
}

/// `m:ss`, as shown while recording.
pub fn format_elapsed(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
