use super::*;
use pretty_assertions::assert_eq;

#[test]
fn playback_is_a_singleton() {
    let seed = vec![dream("a", 1, &[], ""), dream("b", 2, &[], "")];
    let Harness { mut state, .. } = harness_with(seed, false);

    let first = run_user(&mut state, UserAction::TogglePlayback { id: "a".to_string() });
    assert!(!first.contains(&OneiricEffect::StopPlayback));

    let second = run_user(&mut state, UserAction::TogglePlayback { id: "b".to_string() });
    let stop = second
        .iter()
        .position(|e| *e == OneiricEffect::StopPlayback)
        .expect("stop first");
    let start = second
        .iter()
        .position(|e| matches!(e, OneiricEffect::StartPlayback { dream_id, .. } if dream_id == "b"))
        .expect("start b");
    assert!(stop < start);
    assert_eq!(state.playback.as_ref().map(|p| p.dream_id.as_str()), Some("b"));

    let third = run_user(&mut state, UserAction::TogglePlayback { id: "b".to_string() });
    assert_eq!(
        third,
        vec![OneiricEffect::StopPlayback, OneiricEffect::RequestFrame]
    );
    assert!(state.playback.is_none());
}

#[test]
fn playback_end_clears_only_the_current_playback() {
    let Harness { mut state, .. } = harness_with(vec![dream("a", 1, &[], "")], false);
    run_user(&mut state, UserAction::TogglePlayback { id: "a".to_string() });
    let current = state.playback.as_ref().map(|p| p.playback_id).expect("playing");

    run_runtime(
        &mut state,
        RuntimeAction::PlaybackEnded {
            playback_id: current + 100,
        },
    );
    assert!(state.playback.is_some());

    run_runtime(&mut state, RuntimeAction::PlaybackEnded { playback_id: current });
    assert!(state.playback.is_none());
}

#[test]
fn late_end_of_stopped_playback_keeps_restarted_one() {
    let Harness { mut state, .. } = harness_with(vec![dream("a", 1, &[], "")], false);
    run_user(&mut state, UserAction::TogglePlayback { id: "a".to_string() });
    let stopped = state.playback.as_ref().map(|p| p.playback_id).expect("playing");
    run_user(&mut state, UserAction::TogglePlayback { id: "a".to_string() });
    assert!(state.playback.is_none());

    let restart = run_user(&mut state, UserAction::TogglePlayback { id: "a".to_string() });
    let restarted = state.playback.as_ref().map(|p| p.playback_id).expect("playing again");
    assert_ne!(stopped, restarted);
    assert!(restart.contains(&OneiricEffect::StartPlayback {
        playback_id: restarted,
        dream_id: "a".to_string(),
        audio_url: "audio/a.webm".to_string(),
    }));

    let effects = run_runtime(&mut state, RuntimeAction::PlaybackEnded { playback_id: stopped });
    assert!(effects.is_empty());
    assert_eq!(
        state.playback.as_ref().map(|p| p.dream_id.as_str()),
        Some("a")
    );
}

#[test]
fn share_dream_builds_hashtagged_payload() {
    let Harness { mut state, .. } = harness_with(vec![dream("a", 1, &[], "")], false);

    let effects = run_user(&mut state, UserAction::ShareDream { id: "a".to_string() });

    assert_eq!(
        effects,
        vec![OneiricEffect::Share(SharePayload {
            title: "梦 a".to_string(),
            text: "【梦 a】\n\n一段关于放下的梦\n\n#Oneiric梦境日志".to_string(),
            media: Some("https://images.example/a.jpg".to_string()),
        })]
    );
}

#[test]
fn share_analysis_requires_cached_text() {
    let mut cached = dream("a", 1, &[], "");
    cached.detailed_analysis = Some("深度解读".to_string());
    let Harness { mut state, .. } = harness_with(vec![cached, dream("b", 2, &[], "")], false);

    run_user(&mut state, UserAction::SelectDream { id: "b".to_string() });
    assert!(run_user(&mut state, UserAction::ShareAnalysis).is_empty());

    run_user(&mut state, UserAction::SelectDream { id: "a".to_string() });
    let effects = run_user(&mut state, UserAction::ShareAnalysis);
    assert_eq!(
        effects,
        vec![OneiricEffect::Share(SharePayload {
            title: "梦 a".to_string(),
            text: "深度解读\n\n#Oneiric梦境日志".to_string(),
            media: None,
        })]
    );
}

#[test]
fn share_outcomes_surface_as_notices() {
    let Harness { mut state, .. } = harness();

    run_runtime(&mut state, RuntimeAction::ShareFinished(ShareOutcome::Shared));
    assert!(state.notices.is_empty());

    run_runtime(&mut state, RuntimeAction::ShareFinished(ShareOutcome::Copied));
    assert_eq!(
        state.notices.latest().map(|n| n.level),
        Some(NoticeLevel::Success)
    );

    run_runtime(
        &mut state,
        RuntimeAction::ShareFinished(ShareOutcome::Failed("no clipboard".to_string())),
    );
    let notice = state.notices.latest().expect("notice");
    assert_eq!(notice.failure, Some(FailureKind::ShareFailed));
    assert_eq!(notice.message.as_ref(), "复制失败");
}
