use crate::contracts::AnalysisPayload;
use crate::contracts::CapabilityResult;
use crate::contracts::DepthRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Analyze,
    GenerateImage,
    GenerateVideo,
    AnalyzeDepth,
    AnalyzeSymbol,
}

impl Operation {
    pub fn label(self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::GenerateImage => "generate-image",
            Self::GenerateVideo => "generate-video",
            Self::AnalyzeDepth => "analyze-depth",
            Self::AnalyzeSymbol => "analyze-symbol",
        }
    }
}

/// The generative backend. Every call may be slow and may fail; none retries on its own.
pub trait DreamCapability: Send + Sync {
    fn name(&self) -> &'static str;

    fn analyze(&self, audio: &[u8], mime: &str) -> CapabilityResult<AnalysisPayload>;

    /// Returns an image reference (URL or path).
    fn generate_image(&self, prompt: &str) -> CapabilityResult<String>;

    fn generate_video(&self, prompt: &str) -> CapabilityResult<String>;

    fn analyze_depth(&self, request: &DepthRequest) -> CapabilityResult<String>;

    fn analyze_symbol(&self, name: &str, count: usize) -> CapabilityResult<String>;
}
