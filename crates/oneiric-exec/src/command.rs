use std::io::Read;
use std::io::Write;
use std::path::PathBuf;
use std::process::Child;
use std::process::Command;
use std::process::Stdio;
use std::thread;
use std::thread::JoinHandle;

use serde::Serialize;
use uuid::Uuid;

use crate::capability::DreamCapability;
use crate::capability::Operation;
use crate::contracts::AnalysisPayload;
use crate::contracts::AnalyzeRequest;
use crate::contracts::CapabilityError;
use crate::contracts::CapabilityResult;
use crate::contracts::DepthRequest;
use crate::contracts::PromptRequest;
use crate::contracts::SymbolRequest;
use crate::contracts::ANALYSIS_LANG;

/// Delegates every operation to an external program.
///
/// The program is invoked as `<program> <args..> <operation>` with a JSON request on stdin.
/// `analyze` must print an [`AnalysisPayload`] as JSON; the other operations print plain text.
#[derive(Debug, Clone)]
pub struct CommandCapability {
    program: String,
    args: Vec<String>,
    scratch_dir: PathBuf,
}

impl CommandCapability {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            scratch_dir: std::env::temp_dir(),
        }
    }

    /// Directory for the temporary audio file handed to `analyze`.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    fn invoke<T: Serialize>(&self, operation: Operation, request: &T) -> Result<String, String> {
        let body = serde_json::to_vec(request).map_err(|err| err.to_string())?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(operation.label())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|err| format!("failed to start {}: {err}", self.program))?;

        // Drain stderr on its own thread so a chatty backend cannot stall on a full pipe.
        let stderr_handle = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            })
        });

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(err) = stdin.write_all(&body) {
                drop(stdin);
                abandon(&mut child, stderr_handle);
                return Err(format!("failed to write request: {err}"));
            }
        }

        let mut stdout_text = String::new();
        if let Some(mut stdout) = child.stdout.take() {
            if let Err(err) = stdout.read_to_string(&mut stdout_text) {
                drop(stdout);
                abandon(&mut child, stderr_handle);
                return Err(format!("failed to read reply: {err}"));
            }
        }

        let status = child
            .wait()
            .map_err(|err| format!("failed to wait for {}: {err}", self.program))?;
        let stderr_text = stderr_handle
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            let stderr_text = stderr_text.trim();
            return Err(if stderr_text.is_empty() {
                format!("{} exited with {status}", self.program)
            } else {
                format!("{} exited with {status}: {stderr_text}", self.program)
            });
        }
        tracing::debug!(
            operation = operation.label(),
            bytes = stdout_text.len(),
            "capability command finished"
        );
        Ok(stdout_text)
    }

    fn invoke_text<T: Serialize>(&self, operation: Operation, request: &T) -> Result<String, String> {
        let text = self.invoke(operation, request)?;
        let text = text.trim();
        if text.is_empty() {
            return Err("empty reply".to_string());
        }
        Ok(text.to_string())
    }
}

/// Kills and reaps a backend whose exchange broke off, so it neither lingers nor turns zombie.
fn abandon(child: &mut Child, stderr_handle: Option<JoinHandle<String>>) {
    if let Err(err) = child.kill() {
        tracing::debug!(error = %err, "backend already exited");
    }
    if let Err(err) = child.wait() {
        tracing::warn!(error = %err, "failed to reap backend");
    }
    if let Some(handle) = stderr_handle {
        let _ = handle.join();
    }
}

impl DreamCapability for CommandCapability {
    fn name(&self) -> &'static str {
        "command"
    }

    fn analyze(&self, audio: &[u8], mime: &str) -> CapabilityResult<AnalysisPayload> {
        let audio_path = self
            .scratch_dir
            .join(format!("oneiric-{}.webm", Uuid::new_v4()));
        std::fs::write(&audio_path, audio).map_err(|err| {
            CapabilityError::AnalysisFailed(format!("failed to stage audio: {err}"))
        })?;

        let request = AnalyzeRequest {
            audio_path: audio_path.display().to_string(),
            mime: mime.to_string(),
            lang: ANALYSIS_LANG.to_string(),
        };
        let reply = self.invoke(Operation::Analyze, &request);
        if let Err(err) = std::fs::remove_file(&audio_path) {
            tracing::warn!(path = %audio_path.display(), error = %err, "failed to remove staged audio");
        }

        let reply = reply.map_err(CapabilityError::AnalysisFailed)?;
        serde_json::from_str(reply.trim())
            .map_err(|err| CapabilityError::AnalysisFailed(format!("malformed reply: {err}")))
    }

    fn generate_image(&self, prompt: &str) -> CapabilityResult<String> {
        let request = PromptRequest {
            prompt: prompt.to_string(),
        };
        self.invoke_text(Operation::GenerateImage, &request)
            .map_err(CapabilityError::ImageGenFailed)
    }

    fn generate_video(&self, prompt: &str) -> CapabilityResult<String> {
        let request = PromptRequest {
            prompt: prompt.to_string(),
        };
        self.invoke_text(Operation::GenerateVideo, &request)
            .map_err(CapabilityError::VideoGenFailed)
    }

    fn analyze_depth(&self, request: &DepthRequest) -> CapabilityResult<String> {
        self.invoke_text(Operation::AnalyzeDepth, request)
            .map_err(CapabilityError::DeepAnalysisFailed)
    }

    fn analyze_symbol(&self, name: &str, count: usize) -> CapabilityResult<String> {
        let request = SymbolRequest {
            name: name.to_string(),
            count,
        };
        self.invoke_text(Operation::AnalyzeSymbol, &request)
            .map_err(CapabilityError::SymbolAnalysisFailed)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    fn sh(script: &str) -> CommandCapability {
        CommandCapability::new("sh", vec!["-c".to_string(), script.to_string(), "backend".to_string()])
    }

    #[test]
    fn operation_name_is_passed_as_argument() {
        let capability = sh(r#"cat >/dev/null; echo "image for $1""#);
        assert_eq!(
            capability.generate_image("blue").expect("image"),
            "image for generate-image"
        );
    }

    #[test]
    fn analyze_parses_json_and_removes_staged_audio() {
        let scratch = tempdir().expect("tmpdir");
        let script = r#"cat >/dev/null; printf '{"title":"云端漫步","interpretation":"自由","imagePrompt":"sky","elements":["风"]}'"#;
        let capability = sh(script).with_scratch_dir(scratch.path());

        let payload = capability.analyze(b"RIFF", "audio/webm").expect("analyze");
        assert_eq!(payload.title, "云端漫步");
        assert_eq!(payload.elements, vec!["风".to_string()]);
        assert_eq!(std::fs::read_dir(scratch.path()).expect("read dir").count(), 0);
    }

    #[test]
    fn request_body_reaches_stdin() {
        let capability = sh("cat");
        let text = capability.analyze_symbol("海", 2).expect("symbol");
        let echoed: SymbolRequest = serde_json::from_str(&text).expect("json");
        assert_eq!(echoed.name, "海");
        assert_eq!(echoed.count, 2);
    }

    #[test]
    fn failures_map_to_operation_kind() {
        let failing = sh("cat >/dev/null; echo nope >&2; exit 3");
        let err = failing.generate_video("x").expect_err("exit status");
        assert_eq!(err.kind(), "video-gen-failed");
        assert!(err.reason().contains("nope"));

        let silent = sh("cat >/dev/null");
        assert_eq!(
            silent.generate_image("x").expect_err("empty").kind(),
            "image-gen-failed"
        );

        let garbage = sh("cat >/dev/null; echo not-json");
        assert_eq!(
            garbage.analyze(b"x", "audio/webm").expect_err("json").kind(),
            "analysis-failed"
        );

        let missing = CommandCapability::new("/nonexistent/oneiric-backend", Vec::new());
        assert_eq!(
            missing.analyze_symbol("猫", 1).expect_err("spawn").kind(),
            "symbol-analysis-failed"
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn backend_that_stops_reading_is_killed_and_reaped() {
        let scratch = tempdir().expect("tmpdir");
        let pid_file = scratch.path().join("backend.pid");
        // Records its pid, closes stdin, then hangs around far longer than the test.
        let script = format!("echo $$ > '{}'; exec 0<&-; exec sleep 60", pid_file.display());
        let capability = sh(&script);

        // Larger than a pipe buffer, so the write is still pending when stdin closes.
        let name = "海".repeat(1 << 20);
        let err = capability.analyze_symbol(&name, 1).expect_err("broken pipe");
        assert_eq!(err.kind(), "symbol-analysis-failed");
        assert!(err.reason().contains("failed to write request"));

        let pid = std::fs::read_to_string(&pid_file).expect("pid file");
        let proc_entry = PathBuf::from(format!("/proc/{}", pid.trim()));
        assert!(!proc_entry.exists(), "backend {} still present", pid.trim());
    }
}
