use std::sync::Arc;
use std::time::Duration;

use jobs::mock::{MockCall, MockJobApi};
use jobs::{
    JobController, JobError, JobOptions, JobPhase, JobRequest, JobState, StartJobResponse,
    DEFAULT_POLL_INTERVAL,
};

fn start(api: &MockJobApi) -> JobController {
    JobController::start(
        Arc::new(api.clone()),
        JobRequest::new("magnus"),
        JobOptions::default(),
    )
}

#[tokio::test(start_paused = true)]
async fn test_missing_job_id_short_circuits_to_complete() {
    let api = MockJobApi::new().with_start_response(Ok(StartJobResponse {
        username: Some("magnus".to_string()),
        count: Some(0),
        ..StartJobResponse::default()
    }));
    let controller = start(&api);

    let progress = controller.finished().await;
    assert_eq!(progress.phase, JobPhase::Completed);
    assert_eq!(progress.percent, 100.0);
    assert_eq!(progress.status_text(), "Analysis complete!");

    tokio::time::sleep(DEFAULT_POLL_INTERVAL * 3).await;
    assert_eq!(api.status_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_zero_batches_short_circuits_to_complete() {
    let api = MockJobApi::new().with_started_job("j1", 0);
    let controller = start(&api);

    let progress = controller.finished().await;
    assert_eq!(progress.phase, JobPhase::Completed);
    assert_eq!(progress.percent, 100.0);
    assert_eq!(api.status_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_first_poll_waits_one_interval() {
    let api = MockJobApi::new()
        .with_started_job("j1", 4)
        .with_progress(JobState::Running, 0, 4);
    let controller = start(&api);

    tokio::time::sleep(DEFAULT_POLL_INTERVAL - Duration::from_millis(100)).await;
    assert_eq!(api.status_calls(), 0);
    assert_eq!(controller.progress().phase, JobPhase::Running);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(api.status_calls(), 1);
    assert_eq!(api.calls()[1], MockCall::JobStatus("j1".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_runs_to_completion() {
    let api = MockJobApi::new()
        .with_started_job("j1", 4)
        .with_progress(JobState::Running, 1, 4)
        .with_progress(JobState::Running, 2, 4)
        .with_progress(JobState::Running, 3, 4)
        .with_progress(JobState::Completed, 4, 4);
    let controller = start(&api);
    let mut rx = controller.watch();

    let mut last = 0.0;
    loop {
        if rx.changed().await.is_err() {
            break;
        }
        let progress = rx.borrow_and_update().clone();
        assert!(progress.percent >= last, "progress moved backward");
        if progress.phase != JobPhase::Completed {
            assert!(progress.percent < 100.0);
        }
        last = progress.percent;
        if progress.phase.is_terminal() {
            break;
        }
    }

    let progress = controller.progress();
    assert_eq!(progress.phase, JobPhase::Completed);
    assert_eq!(progress.percent, 100.0);
    assert_eq!(api.status_calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_counter_reaching_total_completes_without_status_flag() {
    let api = MockJobApi::new()
        .with_started_job("j1", 2)
        .with_progress(JobState::Running, 2, 2);
    let controller = start(&api);

    let progress = controller.finished().await;
    assert_eq!(progress.phase, JobPhase::Completed);
    assert_eq!(progress.percent, 100.0);
}

#[tokio::test(start_paused = true)]
async fn test_progress_stays_within_second_batch() {
    let api = MockJobApi::new()
        .with_started_job("j1", 4)
        .with_progress(JobState::Running, 1, 4);
    let controller = start(&api);

    tokio::time::sleep(Duration::from_secs(60)).await;
    let progress = controller.progress();
    assert_eq!(progress.phase, JobPhase::Running);
    assert!(progress.percent >= 25.0);
    assert!(progress.percent <= 50.0);
    assert!(progress.status_text().starts_with("Analyzing games ("));
}

#[tokio::test(start_paused = true)]
async fn test_final_batch_is_held_below_hundred() {
    let api = MockJobApi::new()
        .with_started_job("j1", 4)
        .with_progress(JobState::Running, 3, 4);
    let controller = start(&api);

    tokio::time::sleep(Duration::from_secs(120)).await;
    let progress = controller.progress();
    assert_eq!(progress.phase, JobPhase::Running);
    assert!(progress.percent >= 75.0);
    assert!(progress.percent < 100.0);
}

#[tokio::test(start_paused = true)]
async fn test_out_of_order_poll_does_not_regress() {
    let api = MockJobApi::new()
        .with_started_job("j1", 4)
        .with_progress(JobState::Running, 2, 4)
        .with_progress(JobState::Running, 1, 4);
    let controller = start(&api);

    tokio::time::sleep(DEFAULT_POLL_INTERVAL + Duration::from_millis(50)).await;
    let after_first = controller.progress();
    assert!(after_first.percent >= 50.0);

    tokio::time::sleep(DEFAULT_POLL_INTERVAL * 4).await;
    let later = controller.progress();
    assert!(later.percent >= after_first.percent);
    assert_eq!(later.completed, 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_status_stops_polling_without_completing() {
    let api = MockJobApi::new()
        .with_started_job("j1", 5)
        .with_progress(JobState::Failed, 2, 5);
    let controller = start(&api);

    let progress = controller.finished().await;
    assert_eq!(progress.phase, JobPhase::Failed);
    assert!(progress.percent < 100.0);
    assert!(progress.percent >= 40.0);
    assert_eq!(progress.error.as_deref(), Some("Analysis failed"));
    assert_eq!(progress.status_text(), "Analysis failed.");

    tokio::time::sleep(DEFAULT_POLL_INTERVAL * 5).await;
    assert_eq!(api.status_calls(), 1);
    assert!(controller.is_finished());
}

#[tokio::test(start_paused = true)]
async fn test_poll_error_is_fatal() {
    let api = MockJobApi::new()
        .with_started_job("j1", 3)
        .with_status(Err(JobError::PollStatus(503)));
    let controller = start(&api);

    let progress = controller.finished().await;
    assert_eq!(progress.phase, JobPhase::Failed);
    assert_eq!(progress.error.as_deref(), Some("Status request failed (503)"));

    tokio::time::sleep(DEFAULT_POLL_INTERVAL * 5).await;
    assert_eq!(api.status_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_quota_rejection_surfaces_server_message() {
    let api = MockJobApi::new().with_start_response(Err(JobError::Quota {
        status: 429,
        message: Some("Free users can analyze up to 100 games per week.".to_string()),
    }));
    let controller = start(&api);

    let progress = controller.finished().await;
    assert_eq!(progress.phase, JobPhase::Failed);
    assert_eq!(
        progress.error.as_deref(),
        Some("Free users can analyze up to 100 games per week.")
    );
    assert_eq!(progress.percent, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_controller_stops_polling() {
    let api = MockJobApi::new()
        .with_started_job("j1", 10)
        .with_progress(JobState::Running, 1, 10);
    let controller = start(&api);
    let mut rx = controller.watch();

    tokio::time::sleep(DEFAULT_POLL_INTERVAL * 2 + Duration::from_millis(50)).await;
    let polls = api.status_calls();
    assert_eq!(polls, 2);

    drop(controller);
    tokio::time::sleep(DEFAULT_POLL_INTERVAL * 4).await;
    assert_eq!(api.status_calls(), polls);

    // The smoother stops once the driver is gone
    loop {
        if rx.changed().await.is_err() {
            break;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_request_is_clamped_before_sending() {
    let api = MockJobApi::new();
    let request = JobRequest {
        limit: 10_000,
        ..JobRequest::new(" magnus ")
    };
    let controller = JobController::start(Arc::new(api.clone()), request, JobOptions::default());
    controller.finished().await;

    match &api.calls()[0] {
        MockCall::StartJob(sent) => {
            assert_eq!(sent.username, "magnus");
            assert_eq!(sent.limit, 500);
        }
        other => panic!("unexpected call {other:?}"),
    }
}
