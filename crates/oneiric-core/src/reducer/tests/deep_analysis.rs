use super::*;
use pretty_assertions::assert_eq;

fn depth_requests(effects: &[OneiricEffect]) -> usize {
    count_matching(effects, |e| matches!(e, OneiricEffect::AnalyzeDepth { .. }))
}

fn selected(id: &str, seed: Vec<Dream>) -> Harness {
    let mut harness = harness_with(seed, false);
    run_user(
        &mut harness.state,
        UserAction::SelectDream { id: id.to_string() },
    );
    harness
}

#[test]
fn cached_analysis_opens_without_backend_call() {
    let mut cached = dream("a", 1, &[], "");
    cached.detailed_analysis = Some("早已写好的解读".to_string());
    let Harness { mut state, .. } = selected("a", vec![cached]);

    let effects = run_user(&mut state, UserAction::OpenDeepAnalysis);

    assert_eq!(depth_requests(&effects), 0);
    assert!(state.overlays.analysis_modal_open);
}

#[test]
fn first_request_stores_text_and_opens_modal() {
    let Harness { mut state, backend } = selected("a", vec![dream("a", 1, &[], "")]);

    let effects = run_user(&mut state, UserAction::OpenDeepAnalysis);
    assert_eq!(depth_requests(&effects), 1);
    assert!(!state.overlays.analysis_modal_open);

    run_runtime(
        &mut state,
        RuntimeAction::DeepAnalysisFinished {
            dream_id: "a".to_string(),
            result: Ok("【深度心理画像】".to_string()),
        },
    );

    assert!(state.overlays.analysis_modal_open);
    assert_eq!(
        persisted(&backend)[0].detailed_analysis.as_deref(),
        Some("【深度心理画像】")
    );

    run_user(&mut state, UserAction::CloseAnalysis);
    let again = run_user(&mut state, UserAction::OpenDeepAnalysis);
    assert_eq!(depth_requests(&again), 0);
}

#[test]
fn in_flight_request_is_not_duplicated() {
    let Harness { mut state, .. } = selected("a", vec![dream("a", 1, &[], "")]);

    let first = run_user(&mut state, UserAction::OpenDeepAnalysis);
    let second = run_user(&mut state, UserAction::OpenDeepAnalysis);

    assert_eq!(depth_requests(&first) + depth_requests(&second), 1);
}

#[test]
fn stored_analysis_is_never_overwritten() {
    let Harness { mut state, .. } = selected("a", vec![dream("a", 1, &[], "")]);
    run_user(&mut state, UserAction::OpenDeepAnalysis);
    run_runtime(
        &mut state,
        RuntimeAction::DeepAnalysisFinished {
            dream_id: "a".to_string(),
            result: Ok("first".to_string()),
        },
    );
    // A late duplicate result without a matching request.
    run_runtime(
        &mut state,
        RuntimeAction::DeepAnalysisFinished {
            dream_id: "a".to_string(),
            result: Ok("second".to_string()),
        },
    );

    assert_eq!(
        state.dreams.get("a").and_then(|d| d.detailed_analysis.clone()),
        Some("first".to_string())
    );
}

#[test]
fn failure_mutates_nothing_and_raises_notice() {
    let Harness { mut state, backend } = selected("a", vec![dream("a", 1, &[], "")]);
    let before = backend.document(DREAMS_KEY);
    run_user(&mut state, UserAction::OpenDeepAnalysis);

    run_runtime(
        &mut state,
        RuntimeAction::DeepAnalysisFinished {
            dream_id: "a".to_string(),
            result: Err("offline".to_string()),
        },
    );

    assert_eq!(backend.document(DREAMS_KEY), before);
    assert!(!state.overlays.analysis_modal_open);
    let notice = state.notices.latest().expect("notice");
    assert_eq!(notice.failure, Some(FailureKind::DeepAnalysisFailed));
    assert_eq!(notice.message.as_ref(), "解读失败，请检查网络连接");

    let retry = run_user(&mut state, UserAction::OpenDeepAnalysis);
    assert_eq!(depth_requests(&retry), 1);
}

#[test]
fn result_after_leaving_detail_is_stored_without_opening_modal() {
    let seed = vec![dream("a", 1, &[], ""), dream("b", 2, &[], "")];
    let Harness { mut state, .. } = selected("a", seed);
    run_user(&mut state, UserAction::OpenDeepAnalysis);
    run_user(&mut state, UserAction::Back);

    run_runtime(
        &mut state,
        RuntimeAction::DeepAnalysisFinished {
            dream_id: "a".to_string(),
            result: Ok("text".to_string()),
        },
    );

    assert!(!state.overlays.analysis_modal_open);
    assert_eq!(
        state.dreams.get("a").and_then(|d| d.detailed_analysis.clone()),
        Some("text".to_string())
    );
}
