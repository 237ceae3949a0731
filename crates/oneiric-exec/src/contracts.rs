use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Language hint sent with every analysis request.
pub const ANALYSIS_LANG: &str = "zh-CN";

/// Structured reply of the `analyze` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPayload {
    pub title: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    pub interpretation: String,
    #[serde(default)]
    pub mood: String,
    #[serde(default)]
    pub color: String,
    pub image_prompt: String,
    #[serde(default)]
    pub video_prompt: String,
    #[serde(default)]
    pub elements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub audio_path: String,
    pub mime: String,
    pub lang: String,
}

/// The parts of a dream record the depth analysis reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthRequest {
    pub id: String,
    pub title: String,
    pub key_points: Vec<String>,
    pub interpretation: String,
    pub mood: Option<String>,
    pub elements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRequest {
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolRequest {
    pub name: String,
    pub count: usize,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("audio input unavailable: {0}")]
    PermissionDenied(String),

    #[error("analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("image generation failed: {0}")]
    ImageGenFailed(String),

    #[error("video generation failed: {0}")]
    VideoGenFailed(String),

    #[error("deep analysis failed: {0}")]
    DeepAnalysisFailed(String),

    #[error("symbol analysis failed: {0}")]
    SymbolAnalysisFailed(String),
}

impl CapabilityError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => "permission-denied",
            Self::AnalysisFailed(_) => "analysis-failed",
            Self::ImageGenFailed(_) => "image-gen-failed",
            Self::VideoGenFailed(_) => "video-gen-failed",
            Self::DeepAnalysisFailed(_) => "deep-analysis-failed",
            Self::SymbolAnalysisFailed(_) => "symbol-analysis-failed",
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::PermissionDenied(reason)
            | Self::AnalysisFailed(reason)
            | Self::ImageGenFailed(reason)
            | Self::VideoGenFailed(reason)
            | Self::DeepAnalysisFailed(reason)
            | Self::SymbolAnalysisFailed(reason) => reason,
        }
    }
}

pub type CapabilityResult<T> = std::result::Result<T, CapabilityError>;
