use std::thread;
use std::time::Duration;

use crate::capability::DreamCapability;
use crate::capability::Operation;
use crate::contracts::AnalysisPayload;
use crate::contracts::CapabilityError;
use crate::contracts::CapabilityResult;
use crate::contracts::DepthRequest;

pub const WATER_IMAGE_URL: &str =
    "https://images.unsplash.com/photo-1518020382113-a7e8fc38eac9?q=80&w=800&auto=format&fit=crop";
pub const SKY_IMAGE_URL: &str =
    "https://images.unsplash.com/photo-1502481851512-e9e2529bfbf9?q=80&w=800&auto=format&fit=crop";
pub const SAMPLE_VIDEO_URL: &str =
    "https://videos.pexels.com/video-files/3129957/3129957-sd_640_360_25fps.mp4";

const DEPTH_TEXT: &str = "【深度心理画像】\n\n梦境中的意象显示出你近期潜意识中存在着一种未被满足的表达欲。场景的转换代表了内心的动荡...\n\n(此为模拟数据，请接入真实的解读服务以获取完整分析)";

/// Offline backend with canned answers.
///
/// Every answer is a pure function of the input, so a given recording always yields the
/// same dream. Each call sleeps for the configured latency first.
#[derive(Debug, Clone, Default)]
pub struct SimulatedCapability {
    latency: Duration,
}

impl SimulatedCapability {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    fn pause(&self, operation: Operation) {
        tracing::debug!(operation = operation.label(), "simulated call");
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
    }
}

impl DreamCapability for SimulatedCapability {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn analyze(&self, audio: &[u8], _mime: &str) -> CapabilityResult<AnalysisPayload> {
        self.pause(Operation::Analyze);
        if audio.is_empty() {
            return Err(CapabilityError::AnalysisFailed(
                "recording is empty".to_string(),
            ));
        }
        Ok(if audio.len() % 2 == 0 {
            deep_sea()
        } else {
            cloud_walk()
        })
    }

    fn generate_image(&self, prompt: &str) -> CapabilityResult<String> {
        self.pause(Operation::GenerateImage);
        if prompt.trim().is_empty() {
            return Err(CapabilityError::ImageGenFailed("empty prompt".to_string()));
        }
        let watery = prompt.contains("underwater") || prompt.contains("blue");
        Ok(if watery { WATER_IMAGE_URL } else { SKY_IMAGE_URL }.to_string())
    }

    fn generate_video(&self, prompt: &str) -> CapabilityResult<String> {
        self.pause(Operation::GenerateVideo);
        tracing::debug!(%prompt, "simulated video");
        Ok(SAMPLE_VIDEO_URL.to_string())
    }

    fn analyze_depth(&self, _request: &DepthRequest) -> CapabilityResult<String> {
        self.pause(Operation::AnalyzeDepth);
        Ok(DEPTH_TEXT.to_string())
    }

    fn analyze_symbol(&self, name: &str, count: usize) -> CapabilityResult<String> {
        self.pause(Operation::AnalyzeSymbol);
        Ok(format!(
            "“{name}”在你梦中出现了 {count} 次。在荣格心理学中，它通常象征着某种生命力的回归..."
        ))
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

fn deep_sea() -> AnalysisPayload {
    AnalysisPayload {
        title: "深海的低语".to_string(),
        key_points: strings(&["潜水", "无法呼吸", "发光的鱼"]),
        interpretation: "这可能象征着你近期在工作上感受到的压力，潜意识在寻找出口。".to_string(),
        mood: "焦虑".to_string(),
        color: "#1e3a8a".to_string(),
        image_prompt: "surreal underwater scene, glowing bioluminescent fish, dark blue abyss, cinematic lighting".to_string(),
        video_prompt: "Slow motion underwater camera movement, bubbles rising, dark blue atmosphere".to_string(),
        elements: strings(&["水", "鱼", "海"]),
    }
}

fn cloud_walk() -> AnalysisPayload {
    AnalysisPayload {
        title: "云端漫步".to_string(),
        key_points: strings(&["飞行", "棉花糖", "坠落"]),
        interpretation: "飞翔通常代表对自由的渴望，最后的坠落可能暗示着不安全感。".to_string(),
        mood: "喜悦".to_string(),
        color: "#f0f9ff".to_string(),
        image_prompt: "surreal sky city, clouds made of cotton candy, golden sunlight, ethereal atmosphere".to_string(),
        video_prompt: "Flying through clouds, golden hour, cinematic wide shot, dreamy bloom effect".to_string(),
        elements: strings(&["风", "太阳", "飞翔"]),
    }
}
