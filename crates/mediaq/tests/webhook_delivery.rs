use mediaq::{FnTask, JobService, JobStatus, JobsConfig, TaskArgs, TaskError, WebhookNotifier};
use mockito::Matcher;
use std::time::Duration;

fn fast_notifier(max_retries: u32) -> WebhookNotifier {
    // Millisecond backoff base keeps the 2^attempt schedule testable.
    WebhookNotifier::new(max_retries).with_backoff_base(Duration::from_millis(5))
}

#[tokio::test]
async fn delivery_succeeds_on_2xx() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .match_header("content-type", "application/json")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(serde_json::json!({
                "job_id": "j1",
                "status": "completed",
                "result": "http://host/out.mp4",
            })),
            Matcher::Regex(r#""timestamp""#.to_string()),
        ]))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let delivered = fast_notifier(3)
        .notify(
            "j1",
            &format!("{}/hook", server.url()),
            JobStatus::Completed,
            Some(serde_json::json!("http://host/out.mp4")),
            None,
        )
        .await;

    assert!(delivered);
    mock.assert_async().await;
}

#[tokio::test]
async fn persistent_500_exhausts_exactly_max_retries_attempts() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .with_status(500)
        .expect(3)
        .create_async()
        .await;

    let delivered = fast_notifier(3)
        .notify(
            "j1",
            &format!("{}/hook", server.url()),
            JobStatus::Failed,
            None,
            Some("boom".to_string()),
        )
        .await;

    assert!(!delivered);
    mock.assert_async().await;
}

#[tokio::test]
async fn unreachable_endpoint_returns_false_without_raising() {
    // Nothing listens here; every attempt is a transport error.
    let delivered = fast_notifier(2)
        .notify(
            "j1",
            "http://127.0.0.1:1/hook",
            JobStatus::Completed,
            None,
            None,
        )
        .await;
    assert!(!delivered);
}

#[tokio::test]
async fn failed_job_sends_failed_notification_once() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/cb")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "status": "failed",
            "error": "no audio stream",
        })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let service = JobService::in_memory(JobsConfig::new().workers(1))
        .with_notifier(fast_notifier(3));
    service.registry().register(
        "extract_audio",
        FnTask::new(|_ctx, _args: TaskArgs| async move {
            Err(TaskError::new("no audio stream"))
        }),
    );
    service.start();

    let mut args = TaskArgs::new();
    args.insert(
        "webhook_url".into(),
        serde_json::json!(format!("{}/cb", server.url())),
    );
    let record = service.submit("extract_audio", None, args).await.unwrap();

    // Drain, then give the (single) notification time to land.
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    loop {
        let current = service.status(&record.job_id).await.unwrap().unwrap();
        if current.status.is_terminal() {
            break;
        }
        assert!(std::time::Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    service.stop().await;

    mock.assert_async().await;
}

#[tokio::test]
async fn completed_job_without_webhook_url_sends_nothing() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/cb")
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let service = JobService::in_memory(JobsConfig::new().workers(1))
        .with_notifier(fast_notifier(3));
    service.registry().register(
        "echo",
        FnTask::new(|_ctx, args: TaskArgs| async move { Ok(serde_json::Value::Object(args)) }),
    );
    service.start();

    let record = service.submit("echo", None, TaskArgs::new()).await.unwrap();
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    loop {
        let current = service.status(&record.job_id).await.unwrap().unwrap();
        if current.status.is_terminal() {
            break;
        }
        assert!(std::time::Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    service.stop().await;

    mock.assert_async().await;
}
