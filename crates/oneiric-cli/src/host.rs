//! Runs reducer effects against the real world and feeds the results back as actions.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use oneiric_core::reduce;
use oneiric_core::AppAction;
use oneiric_core::AppState;
use oneiric_core::Dream;
use oneiric_core::DreamAnalysis;
use oneiric_core::OneiricEffect;
use oneiric_core::RuntimeAction;
use oneiric_core::ShareOutcome;
use oneiric_core::SharePayload;
use oneiric_core::UserAction;
use oneiric_exec::AnalysisPayload;
use oneiric_exec::AudioSource;
use oneiric_exec::AudioVault;
use oneiric_exec::DepthRequest;
use oneiric_exec::DreamCapability;
use oneiric_exec::PlaybackHandle;
use oneiric_exec::Player;
use oneiric_exec::ShareRequest;
use oneiric_exec::ShareStatus;
use oneiric_exec::ShareTarget;

const TICK: Duration = Duration::from_secs(1);
const PLAYBACK_POLL: Duration = Duration::from_millis(200);

pub struct Host {
    capability: Arc<dyn DreamCapability>,
    audio_source: Arc<dyn AudioSource>,
    vault: AudioVault,
    player: Player,
    share: Box<dyn ShareTarget>,
    tx: mpsc::Sender<AppAction>,
    rx: mpsc::Receiver<AppAction>,
    recordings: HashMap<u64, Arc<AtomicBool>>,
    playback: Option<PlaybackHandle>,
}

impl Host {
    pub fn new(
        capability: Arc<dyn DreamCapability>,
        audio_source: Arc<dyn AudioSource>,
        vault: AudioVault,
        player: Player,
        share: Box<dyn ShareTarget>,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            capability,
            audio_source,
            vault,
            player,
            share,
            tx,
            rx,
            recordings: HashMap::new(),
            playback: None,
        }
    }

    #[cfg(test)]
    pub fn vault(&self) -> &AudioVault {
        &self.vault
    }

    /// Reduces `action` and runs the resulting effects. Returns whether a redraw was asked for.
    pub fn dispatch(&mut self, state: &mut AppState, action: AppAction) -> bool {
        let effects = reduce(state, action);
        self.run_effects(effects)
    }

    pub fn user(&mut self, state: &mut AppState, action: UserAction) -> bool {
        self.dispatch(state, AppAction::User(action))
    }

    /// Applies every action the workers have reported so far.
    pub fn pump(&mut self, state: &mut AppState) -> bool {
        let mut redraw = false;
        while let Ok(action) = self.rx.try_recv() {
            redraw |= self.dispatch(state, action);
        }
        redraw
    }

    /// Blocks until `done` holds or `timeout` elapses. Returns whether `done` was reached.
    pub fn settle<F>(&mut self, state: &mut AppState, timeout: Duration, done: F) -> bool
    where
        F: Fn(&AppState) -> bool,
    {
        let deadline = Instant::now() + timeout;
        while !done(state) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.rx.recv_timeout(remaining) {
                Ok(action) => {
                    self.dispatch(state, action);
                }
                Err(mpsc::RecvTimeoutError::Timeout) => return done(state),
                Err(mpsc::RecvTimeoutError::Disconnected) => return done(state),
            }
        }
        true
    }

    pub fn shutdown(&mut self) {
        for flag in self.recordings.values() {
            flag.store(true, Ordering::Relaxed);
        }
        self.recordings.clear();
        if let Some(handle) = self.playback.take() {
            handle.stop();
        }
    }

    fn run_effects(&mut self, effects: Vec<OneiricEffect>) -> bool {
        let mut redraw = false;
        for effect in effects {
            match effect {
                OneiricEffect::RequestFrame => redraw = true,
                other => self.execute(other),
            }
        }
        redraw
    }

    fn execute(&mut self, effect: OneiricEffect) {
        match effect {
            OneiricEffect::RequestFrame => {}
            OneiricEffect::AcquireAudioInput { attempt_id } => self.start_recorder(attempt_id),
            OneiricEffect::ReleaseAudioInput { attempt_id } => {
                if let Some(flag) = self.recordings.remove(&attempt_id) {
                    flag.store(true, Ordering::Relaxed);
                }
            }
            OneiricEffect::Analyze { attempt_id, audio } => {
                let capability = Arc::clone(&self.capability);
                self.spawn_worker(move || {
                    let result = capability
                        .analyze(&audio.bytes, audio.mime)
                        .map(analysis_from_payload)
                        .map_err(|err| err.to_string());
                    RuntimeAction::AnalysisFinished { attempt_id, result }
                });
            }
            OneiricEffect::GenerateImage { attempt_id, prompt } => {
                let capability = Arc::clone(&self.capability);
                self.spawn_worker(move || {
                    let result = capability
                        .generate_image(&prompt)
                        .map_err(|err| err.to_string());
                    RuntimeAction::ImageFinished { attempt_id, result }
                });
            }
            OneiricEffect::StoreAudio { reference, audio } => {
                match self.vault.store(&reference, &audio.bytes) {
                    Ok(path) => tracing::info!(path = %path.display(), "recording stored"),
                    Err(err) => {
                        tracing::error!(%reference, error = %err, "failed to store recording")
                    }
                }
            }
            OneiricEffect::ReleaseAudio { reference } => {
                if let Err(err) = self.vault.release(&reference) {
                    tracing::warn!(%reference, error = %err, "failed to release recording");
                }
            }
            OneiricEffect::GenerateVideo { dream_id, prompt } => {
                let capability = Arc::clone(&self.capability);
                self.spawn_worker(move || {
                    let result = capability
                        .generate_video(&prompt)
                        .map_err(|err| err.to_string());
                    RuntimeAction::VideoFinished { dream_id, result }
                });
            }
            OneiricEffect::AnalyzeDepth { dream } => {
                let capability = Arc::clone(&self.capability);
                self.spawn_worker(move || {
                    let request = depth_request(&dream);
                    let result = capability
                        .analyze_depth(&request)
                        .map_err(|err| err.to_string());
                    RuntimeAction::DeepAnalysisFinished {
                        dream_id: dream.id,
                        result,
                    }
                });
            }
            OneiricEffect::AnalyzeSymbol { name, count } => {
                let capability = Arc::clone(&self.capability);
                self.spawn_worker(move || {
                    let result = capability
                        .analyze_symbol(&name, count)
                        .map_err(|err| err.to_string());
                    RuntimeAction::SymbolAnalysisFinished { name, result }
                });
            }
            OneiricEffect::StartPlayback {
                playback_id,
                dream_id,
                audio_url,
            } => self.start_playback(playback_id, &dream_id, &audio_url),
            OneiricEffect::StopPlayback => {
                if let Some(handle) = self.playback.take() {
                    handle.stop();
                }
            }
            OneiricEffect::Share(payload) => {
                let status = self.share.share(&share_request(payload));
                let _ = self
                    .tx
                    .send(AppAction::Runtime(RuntimeAction::ShareFinished(
                        share_outcome(status),
                    )));
            }
            OneiricEffect::Schedule { after_ms, action } => {
                self.spawn_worker(move || {
                    thread::sleep(Duration::from_millis(after_ms));
                    RuntimeAction::Scheduled(action)
                });
            }
        }
    }

    fn spawn_worker<F>(&self, work: F)
    where
        F: FnOnce() -> RuntimeAction + Send + 'static,
    {
        let tx = self.tx.clone();
        thread::spawn(move || {
            let _ = tx.send(AppAction::Runtime(work()));
        });
    }

    fn start_recorder(&mut self, attempt_id: u64) {
        let stopped = Arc::new(AtomicBool::new(false));
        self.recordings.insert(attempt_id, Arc::clone(&stopped));

        let source = Arc::clone(&self.audio_source);
        let tx = self.tx.clone();
        let reader_stopped = Arc::clone(&stopped);
        thread::spawn(move || {
            let mut stream = match source.open() {
                Ok(stream) => stream,
                Err(err) => {
                    let _ = tx.send(AppAction::Runtime(RuntimeAction::AudioInputDenied {
                        attempt_id,
                        reason: err.to_string(),
                    }));
                    return;
                }
            };
            while !reader_stopped.load(Ordering::Relaxed) {
                match stream.read_chunk() {
                    Ok(Some(chunk)) => {
                        let _ = tx.send(AppAction::Runtime(RuntimeAction::AudioCaptured {
                            attempt_id,
                            chunk,
                        }));
                    }
                    Ok(None) => {
                        tracing::info!(attempt_id, "audio input ended");
                        if !reader_stopped.load(Ordering::Relaxed) {
                            let _ = tx.send(AppAction::Runtime(RuntimeAction::AudioInputEnded {
                                attempt_id,
                            }));
                        }
                        break;
                    }
                    Err(err) => {
                        tracing::warn!(attempt_id, error = %err, "audio input failed");
                        if !reader_stopped.load(Ordering::Relaxed) {
                            let _ = tx.send(AppAction::Runtime(RuntimeAction::AudioInputEnded {
                                attempt_id,
                            }));
                        }
                        break;
                    }
                }
            }
            stream.stop();
        });

        let tx = self.tx.clone();
        thread::spawn(move || loop {
            thread::sleep(TICK);
            if stopped.load(Ordering::Relaxed) {
                break;
            }
            if tx
                .send(AppAction::Runtime(RuntimeAction::RecordingTick { attempt_id }))
                .is_err()
            {
                break;
            }
        });
    }

    fn start_playback(&mut self, playback_id: u64, dream_id: &str, audio_url: &str) {
        if let Some(previous) = self.playback.take() {
            previous.stop();
        }
        let started = self
            .vault
            .path_for(audio_url)
            .and_then(|path| self.player.play(&path));
        let handle = match started {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(%dream_id, error = %err, "playback failed to start");
                let _ = self
                    .tx
                    .send(AppAction::Runtime(RuntimeAction::PlaybackEnded { playback_id }));
                return;
            }
        };
        self.playback = Some(handle.clone());

        let tx = self.tx.clone();
        thread::spawn(move || {
            while !handle.is_finished() {
                thread::sleep(PLAYBACK_POLL);
            }
            let _ = tx.send(AppAction::Runtime(RuntimeAction::PlaybackEnded { playback_id }));
        });
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn analysis_from_payload(payload: AnalysisPayload) -> DreamAnalysis {
    DreamAnalysis {
        title: payload.title,
        key_points: payload.key_points,
        interpretation: payload.interpretation,
        mood: payload.mood,
        color: payload.color,
        image_prompt: payload.image_prompt,
        video_prompt: payload.video_prompt,
        elements: payload.elements,
    }
}

pub fn depth_request(dream: &Dream) -> DepthRequest {
    DepthRequest {
        id: dream.id.clone(),
        title: dream.title.clone(),
        key_points: dream.key_points.clone(),
        interpretation: dream.interpretation.clone(),
        mood: dream.mood.clone(),
        elements: dream.elements.clone(),
    }
}

fn share_request(payload: SharePayload) -> ShareRequest {
    ShareRequest {
        title: payload.title,
        text: payload.text,
        media: payload.media,
    }
}

fn share_outcome(status: ShareStatus) -> ShareOutcome {
    match status {
        ShareStatus::Shared => ShareOutcome::Shared,
        ShareStatus::Copied => ShareOutcome::Copied,
        ShareStatus::Failed(reason) => ShareOutcome::Failed(reason),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use oneiric_core::store::DreamStore;
    use oneiric_core::store::MemoryKeyValueStore;
    use oneiric_core::store::ProfileStore;
    use oneiric_core::AppView;
    use oneiric_core::User;
    use oneiric_core::VideoStatus;
    use oneiric_exec::FileAudioSource;
    use oneiric_exec::RecordingShare;
    use oneiric_exec::SimulatedCapability;

    use super::*;

    fn fixture(audio: &[u8]) -> (Host, AppState, tempfile::TempDir) {
        let dir = tempdir().expect("tmpdir");
        let recording = dir.path().join("dream.wav");
        std::fs::write(&recording, audio).expect("write recording");

        let backend = MemoryKeyValueStore::new();
        let dreams = DreamStore::load(Box::new(backend.clone())).expect("dreams");
        let user = User {
            is_pro: true,
            ..User::default()
        };
        let profile = ProfileStore::load(Box::new(backend), user).expect("profile");

        let host = Host::new(
            Arc::new(SimulatedCapability::default()),
            Arc::new(FileAudioSource::new(recording)),
            AudioVault::new(dir.path().join("data")),
            Player::new("true", Vec::new()),
            Box::new(RecordingShare::default()),
        );
        (host, AppState::new(dreams, profile), dir)
    }

    #[test]
    fn file_capture_runs_to_a_stored_dream() {
        let (mut host, mut state, _dir) = fixture(&[1, 2, 3, 4]);
        host.user(&mut state, UserAction::StartRecording);

        let settled = host.settle(&mut state, Duration::from_secs(5), |state| {
            state.capture.stage.is_idle() && state.capture.last_outcome.is_some()
        });

        assert!(settled);
        assert_eq!(state.dreams.len(), 1);
        let dream = &state.dreams.dreams()[0];
        assert_eq!(dream.title, "深海的低语");
        assert_eq!(state.routing.view, AppView::Detail);
        let stored = host.vault().path_for(&dream.audio_url).expect("path");
        assert_eq!(std::fs::read(stored).expect("stored audio"), vec![1, 2, 3, 4]);
    }

    #[test]
    fn video_request_completes_through_the_worker() {
        let (mut host, mut state, _dir) = fixture(&[1, 2, 3]);
        host.user(&mut state, UserAction::StartRecording);
        host.settle(&mut state, Duration::from_secs(5), |state| {
            !state.dreams.is_empty()
        });
        let id = state.dreams.dreams()[0].id.clone();

        host.user(&mut state, UserAction::TriggerVideo { id: id.clone() });
        let done = host.settle(&mut state, Duration::from_secs(5), |state| {
            state
                .dreams
                .get(&id)
                .is_some_and(|dream| dream.video_status == VideoStatus::Completed)
        });
        assert!(done);
    }

    #[test]
    fn payload_conversion_keeps_every_field() {
        let payload = AnalysisPayload {
            title: "t".to_string(),
            key_points: vec!["k".to_string()],
            interpretation: "i".to_string(),
            mood: "m".to_string(),
            color: "#fff".to_string(),
            image_prompt: "ip".to_string(),
            video_prompt: "vp".to_string(),
            elements: vec!["e".to_string()],
        };
        let analysis = analysis_from_payload(payload);
        assert_eq!(analysis.image_prompt, "ip");
        assert_eq!(analysis.video_prompt, "vp");
        assert_eq!(analysis.elements, vec!["e".to_string()]);
    }
}
