use std::sync::Arc;
use std::time::Duration;

use analysis::{AnalysisController, AnalysisOptions, AnalysisSessionState};
use engine::mock::ScriptedLauncher;
use tokio::sync::watch;

const FEN_A: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
const FEN_B: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";

fn output_a() -> Vec<String> {
    vec![
        "info depth 10 multipv 1 score cp 30 pv e2e4 e7e5".to_string(),
        "info depth 10 multipv 2 score cp 20 pv d2d4 d7d5".to_string(),
    ]
}

fn output_b() -> Vec<String> {
    vec![
        "info depth 10 multipv 2 score cp -25 pv e7e5 g1f3".to_string(),
        "info depth 10 multipv 1 score cp -20 pv c7c5 g1f3".to_string(),
    ]
}

fn options() -> AnalysisOptions {
    AnalysisOptions {
        depth: 10,
        multipv: 2,
        ..AnalysisOptions::default()
    }
}

async fn wait_for<F>(rx: &mut watch::Receiver<AnalysisSessionState>, pred: F) -> AnalysisSessionState
where
    F: FnMut(&AnalysisSessionState) -> bool,
{
    tokio::time::timeout(Duration::from_secs(30), rx.wait_for(pred))
        .await
        .expect("timed out waiting for analysis state")
        .expect("controller exited")
        .clone()
}

fn count_prefix(sent: &[String], prefix: &str) -> usize {
    sent.iter().filter(|c| c.starts_with(prefix)).count()
}

#[tokio::test(start_paused = true)]
async fn test_rapid_changes_issue_one_analysis_for_last_position() {
    let launcher = ScriptedLauncher::new()
        .with_search_output_for(FEN_A, output_a())
        .with_search_output_for(FEN_B, output_b());
    let controller = AnalysisController::spawn(Arc::new(launcher.clone()), options());
    let mut rx = controller.watch();

    controller.set_position(Some(FEN_A.to_string()));
    tokio::time::sleep(Duration::from_millis(100)).await;
    controller.set_position(Some(FEN_B.to_string()));

    let state = wait_for(&mut rx, |s| s.lines.len() == 2 && !s.analyzing).await;

    let sent = launcher.sent();
    assert_eq!(count_prefix(&sent, "go "), 1);
    assert_eq!(count_prefix(&sent, "position fen "), 1);
    assert!(sent.contains(&format!("position fen {FEN_B}")));

    let indices: Vec<u32> = state.lines.iter().map(|l| l.multipv).collect();
    assert_eq!(indices, vec![1, 2]);
    assert_eq!(state.lines[0].san, vec!["c5", "Nf3"]);
    assert_eq!(state.lines[1].display_score(), "-0.25");
    assert!(state.ready);
    assert_eq!(state.status_text(), "Ready");

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_no_analysis_before_debounce_elapses() {
    let launcher = ScriptedLauncher::new();
    let controller = AnalysisController::spawn(Arc::new(launcher.clone()), options());

    controller.set_position(Some(FEN_A.to_string()));
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(count_prefix(&launcher.sent(), "go "), 0);
    assert!(!controller.state().analyzing);

    let mut rx = controller.watch();
    wait_for(&mut rx, |s| s.ready).await;
    assert_eq!(count_prefix(&launcher.sent(), "go "), 1);

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_output_for_superseded_position_is_discarded() {
    let launcher = ScriptedLauncher::new()
        .hold_searches()
        .with_search_output_for(FEN_A, output_a())
        .with_search_output_for(FEN_B, output_b());
    let controller = AnalysisController::spawn(Arc::new(launcher.clone()), options());
    let mut rx = controller.watch();

    controller.set_position(Some(FEN_A.to_string()));
    let state = wait_for(&mut rx, |s| s.lines.len() == 2).await;
    assert!(state.analyzing);
    assert_eq!(state.lines[0].pv[0], "e2e4");

    controller.set_position(Some(FEN_B.to_string()));
    let cleared = controller.state();
    assert!(cleared.lines.is_empty() || cleared.lines[0].pv[0] == "e2e4");

    let state = wait_for(&mut rx, |s| s.lines.len() == 2 && s.lines[0].pv[0] == "c7c5").await;
    for line in &state.lines {
        assert!(line.pv[0] == "c7c5" || line.pv[0] == "e7e5");
    }
    assert!(state.analyzing);

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_clearing_position_stops_and_empties_lines() {
    let launcher = ScriptedLauncher::new()
        .hold_searches()
        .with_search_output(output_a());
    let controller = AnalysisController::spawn(Arc::new(launcher.clone()), options());
    let mut rx = controller.watch();

    controller.set_position(Some(FEN_A.to_string()));
    wait_for(&mut rx, |s| s.lines.len() == 2).await;

    controller.set_position(None);
    let state = wait_for(&mut rx, |s| s.lines.is_empty() && !s.analyzing).await;
    assert!(state.error.is_none());

    // Settle, then make sure nothing was merged back in
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(controller.state().lines.is_empty());
    assert_eq!(launcher.sent().last().map(String::as_str), Some("stop"));

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_engine_failure_surfaces_error() {
    let launcher = ScriptedLauncher::new().fail_launch();
    let controller = AnalysisController::spawn(Arc::new(launcher.clone()), options());
    let mut rx = controller.watch();

    controller.set_position(Some(FEN_A.to_string()));
    let state = wait_for(&mut rx, |s| s.error.is_some()).await;
    assert!(!state.analyzing);
    assert_eq!(state.status_text(), "Engine error");

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_restart_replaces_crashed_engine() {
    let launcher = ScriptedLauncher::new()
        .hold_searches()
        .with_search_output(output_a());
    let controller = AnalysisController::spawn(Arc::new(launcher.clone()), options());
    let mut rx = controller.watch();

    controller.set_position(Some(FEN_A.to_string()));
    wait_for(&mut rx, |s| s.lines.len() == 2).await;

    launcher.crash();
    let state = wait_for(&mut rx, |s| s.error.is_some()).await;
    assert!(!state.analyzing);

    controller.restart();
    let state = wait_for(&mut rx, |s| s.error.is_none() && s.lines.len() == 2).await;
    assert!(state.analyzing);
    assert_eq!(launcher.launches(), 2);

    controller.shutdown().await;
    assert_eq!(launcher.terminated(), 2);
}
