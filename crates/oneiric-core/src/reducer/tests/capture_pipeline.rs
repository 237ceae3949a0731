use super::*;
use pretty_assertions::assert_eq;

#[test]
fn completed_capture_persists_pending_dream_and_opens_detail() {
    let Harness { mut state, backend } = harness();
    let attempt_id = record_and_stop(&mut state);

    let effects = run_runtime(
        &mut state,
        RuntimeAction::AnalysisFinished {
            attempt_id,
            result: Ok(analysis()),
        },
    );
    assert!(effects.contains(&OneiricEffect::GenerateImage {
        attempt_id,
        prompt: "underwater city, blue light".to_string(),
    }));
    assert_eq!(state.capture.stage.label(), "painting");
    assert!(state.dreams.is_empty());

    let effects = run_runtime(
        &mut state,
        RuntimeAction::ImageFinished {
            attempt_id,
            result: Ok("https://images.example/sea.jpg".to_string()),
        },
    );

    assert!(state.capture.stage.is_idle());
    assert_eq!(state.dreams.len(), 1);
    let created = state.dreams.dreams()[0].clone();
    assert_eq!(created.title, "深海的低语");
    assert_eq!(created.video_status, VideoStatus::Pending);
    assert_eq!(created.video_prompt, "camera sinking slowly");
    assert_eq!(created.mood.as_deref(), Some("焦虑"));
    assert_eq!(created.audio_url, format!("audio/{}.webm", created.id));
    assert!(!created.interpretation.is_empty());
    assert!(created.image_url.is_some());

    assert_eq!(persisted(&backend), vec![created.clone()]);
    assert_eq!(state.routing.view, AppView::Detail);
    assert_eq!(state.selection.selected_dream.as_deref(), Some(created.id.as_str()));
    assert_eq!(
        state.capture.last_outcome.as_ref().map(|o| o.result.clone()),
        Some(CaptureResult::Succeeded {
            dream_id: created.id.clone()
        })
    );
    assert_eq!(
        count_matching(&effects, |e| matches!(
            e,
            OneiricEffect::StoreAudio { reference, audio }
                if *reference == created.audio_url && audio.len() == 4
        )),
        1
    );
}

#[test]
fn new_dreams_go_to_the_front() {
    let Harness { mut state, .. } = harness_with(vec![dream("old", 1, &[], "")], false);
    let attempt_id = record_and_stop(&mut state);
    run_runtime(
        &mut state,
        RuntimeAction::AnalysisFinished {
            attempt_id,
            result: Ok(analysis()),
        },
    );
    run_runtime(
        &mut state,
        RuntimeAction::ImageFinished {
            attempt_id,
            result: Ok("https://img".to_string()),
        },
    );
    assert_eq!(state.dreams.len(), 2);
    assert_eq!(state.dreams.dreams()[1].id, "old");
}

#[test]
fn cancel_discards_buffer_without_backend_call() {
    let Harness { mut state, backend } = harness();
    let effects = run_user(&mut state, UserAction::StartRecording);
    let attempt_id = state.capture.stage.attempt_id().expect("attempt");
    assert!(effects.contains(&OneiricEffect::AcquireAudioInput { attempt_id }));
    assert_eq!(state.routing.view, AppView::Add);

    run_runtime(
        &mut state,
        RuntimeAction::AudioCaptured {
            attempt_id,
            chunk: vec![9; 32],
        },
    );
    let effects = run_user(&mut state, UserAction::CancelRecording);

    assert!(state.capture.stage.is_idle());
    assert!(effects.contains(&OneiricEffect::ReleaseAudioInput { attempt_id }));
    assert_eq!(
        count_matching(&effects, |e| matches!(e, OneiricEffect::Analyze { .. })),
        0
    );
    assert!(state.dreams.is_empty());
    assert_eq!(backend.document(DREAMS_KEY), Some("[]".to_string()));
    assert_eq!(
        state.capture.last_outcome.as_ref().map(|o| o.result.clone()),
        Some(CaptureResult::Cancelled)
    );
}

#[test]
fn stopping_an_empty_recording_cancels_with_info_notice() {
    let Harness { mut state, .. } = harness();
    run_user(&mut state, UserAction::StartRecording);
    let effects = run_user(&mut state, UserAction::StopRecording);

    assert!(state.capture.stage.is_idle());
    assert_eq!(
        count_matching(&effects, |e| matches!(e, OneiricEffect::Analyze { .. })),
        0
    );
    assert_eq!(
        state.notices.latest().map(|n| n.level),
        Some(NoticeLevel::Info)
    );
}

#[test]
fn analysis_failure_leaves_store_unchanged() {
    let seed = vec![dream("a", 2, &["猫"], "")];
    let Harness { mut state, backend } = harness_with(seed.clone(), false);
    let before = backend.document(DREAMS_KEY);
    let attempt_id = record_and_stop(&mut state);

    run_runtime(
        &mut state,
        RuntimeAction::AnalysisFinished {
            attempt_id,
            result: Err("backend unavailable".to_string()),
        },
    );

    assert!(state.capture.stage.is_idle());
    assert_eq!(state.dreams.dreams(), seed.as_slice());
    assert_eq!(backend.document(DREAMS_KEY), before);
    let notice = state.notices.latest().expect("notice");
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.failure, Some(FailureKind::AnalysisFailed));
}

#[test]
fn image_failure_creates_no_record() {
    let Harness { mut state, .. } = harness();
    let attempt_id = record_and_stop(&mut state);
    run_runtime(
        &mut state,
        RuntimeAction::AnalysisFinished {
            attempt_id,
            result: Ok(analysis()),
        },
    );
    run_runtime(
        &mut state,
        RuntimeAction::ImageFinished {
            attempt_id,
            result: Err("quota".to_string()),
        },
    );

    assert!(state.dreams.is_empty());
    assert!(state.capture.stage.is_idle());
    assert_eq!(
        state.capture.last_outcome.as_ref().map(|o| o.result.clone()),
        Some(CaptureResult::Failed(FailureKind::ImageGenFailed))
    );
}

#[test]
fn permission_denied_returns_to_idle_with_notice() {
    let Harness { mut state, .. } = harness();
    run_user(&mut state, UserAction::StartRecording);
    let attempt_id = state.capture.stage.attempt_id().expect("attempt");

    run_runtime(
        &mut state,
        RuntimeAction::AudioInputDenied {
            attempt_id,
            reason: "no device".to_string(),
        },
    );

    assert!(state.capture.stage.is_idle());
    assert_eq!(
        state.notices.latest().and_then(|n| n.failure),
        Some(FailureKind::PermissionDenied)
    );
}

#[test]
fn start_while_busy_is_rejected() {
    let Harness { mut state, .. } = harness();
    let attempt_id = record_and_stop(&mut state);
    let effects = run_user(&mut state, UserAction::StartRecording);

    assert_eq!(effects, vec![OneiricEffect::RequestFrame]);
    assert_eq!(state.capture.stage.attempt_id(), Some(attempt_id));
    assert_eq!(state.capture.stage.label(), "analyzing");
    assert_eq!(
        state.notices.latest().map(|n| n.level),
        Some(NoticeLevel::Info)
    );
}

#[test]
fn stale_attempt_results_are_ignored() {
    let Harness { mut state, .. } = harness();
    run_user(&mut state, UserAction::StartRecording);
    let first = state.capture.stage.attempt_id().expect("attempt");
    run_user(&mut state, UserAction::CancelRecording);

    let second = record_and_stop(&mut state);
    assert!(second > first);

    let effects = run_runtime(
        &mut state,
        RuntimeAction::AnalysisFinished {
            attempt_id: first,
            result: Ok(analysis()),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.capture.stage.label(), "analyzing");
    assert_eq!(state.capture.stage.attempt_id(), Some(second));
}

#[test]
fn recording_ticks_advance_elapsed_time() {
    let Harness { mut state, .. } = harness();
    run_user(&mut state, UserAction::StartRecording);
    let attempt_id = state.capture.stage.attempt_id().expect("attempt");
    for _ in 0..3 {
        run_runtime(&mut state, RuntimeAction::RecordingTick { attempt_id });
    }
    run_runtime(
        &mut state,
        RuntimeAction::RecordingTick {
            attempt_id: attempt_id + 1,
        },
    );
    match &state.capture.stage {
        CaptureStage::Recording { elapsed_secs, .. } => assert_eq!(*elapsed_secs, 3),
        other => panic!("unexpected stage {other:?}"),
    }
}

#[test]
fn normalization_repairs_title_colour_and_lists() {
    let raw = DreamAnalysis {
        title: "   ".to_string(),
        key_points: vec![" 飞行 ".to_string(), "".to_string()],
        color: "blue".to_string(),
        elements: vec!["  风".to_string(), "  ".to_string()],
        ..analysis()
    };
    let fixed = normalize_analysis(raw);
    assert_eq!(fixed.title, FALLBACK_TITLE);
    assert_eq!(fixed.color, FALLBACK_COLOR);
    assert_eq!(fixed.key_points, vec!["飞行".to_string()]);
    assert_eq!(fixed.elements, vec!["风".to_string()]);

    let short = normalize_analysis(DreamAnalysis {
        color: "#FfF".to_string(),
        ..analysis()
    });
    assert_eq!(short.color, "#FfF");
}

#[test]
fn save_failure_keeps_record_and_raises_notice() {
    let Harness { mut state, backend } = harness();
    let attempt_id = record_and_stop(&mut state);
    run_runtime(
        &mut state,
        RuntimeAction::AnalysisFinished {
            attempt_id,
            result: Ok(analysis()),
        },
    );
    backend.set_fail_writes(true);
    run_runtime(
        &mut state,
        RuntimeAction::ImageFinished {
            attempt_id,
            result: Ok("https://img".to_string()),
        },
    );

    assert_eq!(state.dreams.len(), 1);
    assert!(persisted(&backend).is_empty());
    assert!(state
        .notices
        .iter()
        .any(|n| n.failure == Some(FailureKind::StoreWriteFailed)));
}

#[test]
fn end_of_input_stops_only_its_own_attempt() {
    let Harness { mut state, .. } = harness();
    run_user(&mut state, UserAction::StartRecording);
    let first = state.capture.stage.attempt_id().expect("first attempt");
    run_user(&mut state, UserAction::CancelRecording);

    run_user(&mut state, UserAction::StartRecording);
    let second = state.capture.stage.attempt_id().expect("second attempt");
    run_runtime(
        &mut state,
        RuntimeAction::AudioCaptured {
            attempt_id: second,
            chunk: vec![9, 9],
        },
    );

    let effects = run_runtime(&mut state, RuntimeAction::AudioInputEnded { attempt_id: first });
    assert!(effects.is_empty());
    assert!(matches!(
        state.capture.stage,
        CaptureStage::Recording { attempt_id, .. } if attempt_id == second
    ));

    let effects = run_runtime(&mut state, RuntimeAction::AudioInputEnded { attempt_id: second });
    assert!(matches!(
        state.capture.stage,
        CaptureStage::Analyzing { attempt_id, .. } if attempt_id == second
    ));
    assert_eq!(
        count_matching(&effects, |e| matches!(e, OneiricEffect::Analyze { .. })),
        1
    );
}
