use super::*;
use crate::components::tools::Tool;
use crate::session::EditorSession;
use serde_json::{Value, json};
use std::sync::Mutex;

const ORIGINAL: &str = "data:image/png;base64,b3JpZ2luYWw=";
const EDITED: &str = "data:image/png;base64,ZWRpdGVk";
const MASK: &str = "data:image/png;base64,bWFzaw==";

fn image(uri: &str) -> EncodedImage {
    EncodedImage::parse(uri).unwrap()
}

fn loaded_session(tool: Tool) -> SharedSession {
    let mut session = EditorSession::new();
    session.set_image(image(ORIGINAL), 512, 512);
    session.set_active_tool(Some(tool));
    session.into_shared()
}

fn enhance_request() -> EditRequest {
    EditRequest {
        endpoint: "/api/enhance".to_string(),
        payload: json!({ "image": ORIGINAL }),
        label: "Enhanced".to_string(),
        processing_message: "Enhancing image...".to_string(),
    }
}

// ============================================================================
// Mocks
// ============================================================================

/// Replays canned results in order and records every call.
struct MockBackend {
    responses: Mutex<Vec<Result<EncodedImage, AiError>>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockBackend {
    fn new(responses: Vec<Result<EncodedImage, AiError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl EditBackend for MockBackend {
    async fn submit(&self, endpoint: &str, payload: &Value) -> Result<EncodedImage, AiError> {
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.to_string(), payload.clone()));
        let mut responses = self.responses.lock().unwrap();
        assert!(!responses.is_empty(), "unexpected call to {endpoint}");
        responses.remove(0)
    }
}

/// Runs `hook` against the session while the request is "in flight".
struct HookBackend<F> {
    session: SharedSession,
    hook: F,
    result: Result<EncodedImage, AiError>,
}

#[async_trait::async_trait]
impl<F> EditBackend for HookBackend<F>
where
    F: Fn(&mut EditorSession) + Send + Sync,
{
    async fn submit(&self, _endpoint: &str, _payload: &Value) -> Result<EncodedImage, AiError> {
        (self.hook)(&mut lock_session(&self.session));
        self.result.clone()
    }
}

/// Never answers.
struct PendingBackend;

#[async_trait::async_trait]
impl EditBackend for PendingBackend {
    async fn submit(&self, _endpoint: &str, _payload: &Value) -> Result<EncodedImage, AiError> {
        std::future::pending().await
    }
}

#[derive(Default)]
struct CollectingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl CollectingNotifier {
    fn seen(&self) -> Vec<Notification> {
        self.seen.lock().unwrap().clone()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().unwrap().push(notification);
    }
}

fn executor(backend: Arc<dyn EditBackend>) -> (AiExecutor, Arc<CollectingNotifier>) {
    let notifier = Arc::new(CollectingNotifier::default());
    let executor = AiExecutor::new(backend).with_notifier(notifier.clone());
    (executor, notifier)
}

// ============================================================================
// parse_response
// ============================================================================

#[test]
fn success_with_data_uri() {
    let body = format!(r#"{{"image":"{EDITED}"}}"#);
    assert_eq!(parse_response(200, None, &body).unwrap(), image(EDITED));
}

#[test]
fn success_with_bare_payload_gets_png_prefix() {
    let result = parse_response(200, None, r#"{"image":"ZWRpdGVk"}"#).unwrap();
    assert_eq!(result.as_data_uri(), EDITED);
}

#[test]
fn success_without_image_is_upstream_failure() {
    let err = parse_response(200, None, "{}").unwrap_err();
    assert!(matches!(err, AiError::Upstream { status: Some(200), .. }));

    let err = parse_response(200, None, "<html>").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamFailure);

    let err = parse_response(200, None, r#"{"image":"not base64!"}"#).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamFailure);
}

#[test]
fn rate_limit_prefers_header() {
    let body = r#"{"error":"Rate limit exceeded. Try again in 12 seconds.","code":"RATE_LIMIT_EXCEEDED"}"#;
    let err = parse_response(429, Some(30), body).unwrap_err();
    assert_eq!(
        err,
        AiError::RateLimited {
            message: "Rate limit exceeded. Try again in 12 seconds.".to_string(),
            retry_after: Some(Duration::from_secs(30)),
        }
    );
}

#[test]
fn rate_limit_falls_back_to_message_hint() {
    let body = r#"{"error":"Rate limit exceeded. Try again in 12 seconds."}"#;
    match parse_response(429, None, body).unwrap_err() {
        AiError::RateLimited { retry_after, .. } => {
            assert_eq!(retry_after, Some(Duration::from_secs(12)));
        }
        other => panic!("expected rate limit, got {other:?}"),
    }

    match parse_response(429, None, "").unwrap_err() {
        AiError::RateLimited { message, retry_after } => {
            assert_eq!(message, "Request failed: 429");
            assert_eq!(retry_after, None);
        }
        other => panic!("expected rate limit, got {other:?}"),
    }
}

#[test]
fn rate_limit_code_wins_over_status() {
    let body = r#"{"error":"slow down","code":"RATE_LIMIT_EXCEEDED"}"#;
    assert_eq!(parse_response(503, None, body).unwrap_err().kind(), ErrorKind::RateLimited);
}

#[test]
fn validation_from_status_or_code() {
    let err = parse_response(400, None, r#"{"error":"Prompt is required"}"#).unwrap_err();
    assert_eq!(err, AiError::Validation("Prompt is required".to_string()));

    let body = r#"{"error":"Mask is empty","code":"VALIDATION_ERROR"}"#;
    let err = parse_response(422, None, body).unwrap_err();
    assert_eq!(err, AiError::Validation("Mask is empty".to_string()));
}

#[test]
fn other_statuses_are_upstream() {
    assert_eq!(
        parse_response(500, None, "").unwrap_err(),
        AiError::Upstream {
            status: Some(500),
            message: "Request failed: 500".to_string(),
        }
    );
    assert_eq!(
        parse_response(502, None, r#"{"error":"Model unavailable"}"#)
            .unwrap_err()
            .to_string(),
        "Model unavailable"
    );
}

#[test]
fn only_rate_limit_and_network_are_retryable() {
    let rate = AiError::RateLimited { message: String::new(), retry_after: None };
    assert!(rate.retryable());
    assert!(AiError::Network("reset".into()).retryable());
    assert!(!AiError::Validation("bad".into()).retryable());
    assert!(!AiError::Upstream { status: Some(500), message: String::new() }.retryable());
}

#[test]
fn validation_errors_convert_with_their_message() {
    let err = AiError::from(ValidationError::MissingMask);
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    assert_eq!(err.to_string(), ValidationError::MissingMask.to_string());
}

// ============================================================================
// execute
// ============================================================================

#[tokio::test]
async fn success_commits_exactly_one_entry() {
    let session = loaded_session(Tool::Enhance);
    lock_session(&session).set_mask_data(Some(image(MASK)));
    let backend = MockBackend::new(vec![Ok(image(EDITED))]);
    let (executor, notifier) = executor(backend.clone());

    let outcome = executor.execute(&session, enhance_request()).await;
    assert_eq!(outcome, OperationOutcome::Committed { label: "Enhanced".to_string() });

    let state = lock_session(&session);
    assert_eq!(state.history().len(), 2);
    assert_eq!(state.history_index(), Some(1));
    assert_eq!(state.current_image(), Some(&image(EDITED)));
    assert_eq!(state.history().labels(), vec!["Original", "Enhanced"]);
    assert!(state.mask_data().is_none());
    assert!(!state.is_processing());
    assert_eq!(state.processing_message(), "");

    assert_eq!(backend.calls(), vec![("/api/enhance".to_string(), json!({ "image": ORIGINAL }))]);
    assert_eq!(notifier.seen(), vec![Notification::success("Enhanced complete!")]);
}

#[tokio::test]
async fn failure_leaves_the_session_untouched() {
    let session = loaded_session(Tool::GenerativeFill);
    {
        let mut state = lock_session(&session);
        state.set_mask_data(Some(image(MASK)));
        state.set_prompt("a red balloon");
    }
    let before = lock_session(&session).clone();
    let backend = MockBackend::new(vec![Err(AiError::Upstream {
        status: Some(500),
        message: "Model unavailable".to_string(),
    })]);
    let (executor, notifier) = executor(backend);

    let outcome = executor.run_active_tool(&session).await;
    assert!(matches!(outcome, OperationOutcome::Failed(AiError::Upstream { .. })));
    assert_eq!(*lock_session(&session), before);
    assert_eq!(notifier.seen(), vec![Notification::error("Model unavailable")]);
}

#[tokio::test]
async fn failed_request_can_be_retried() {
    let session = loaded_session(Tool::Enhance);
    let backend = MockBackend::new(vec![
        Err(AiError::Network("connection reset".to_string())),
        Ok(image(EDITED)),
    ]);
    let (executor, _) = executor(backend.clone());

    assert!(!executor.run_active_tool(&session).await.is_committed());
    assert!(executor.run_active_tool(&session).await.is_committed());
    assert_eq!(backend.calls().len(), 2);
    assert_eq!(lock_session(&session).history().len(), 2);
}

#[tokio::test]
async fn busy_session_sends_nothing() {
    let session = loaded_session(Tool::Enhance);
    lock_session(&session).set_processing(true, Some("Working..."));
    let backend = MockBackend::new(Vec::new());
    let (executor, notifier) = executor(backend.clone());

    assert_eq!(executor.execute(&session, enhance_request()).await, OperationOutcome::Busy);
    assert_eq!(executor.run_active_tool(&session).await, OperationOutcome::Busy);
    assert!(backend.calls().is_empty());
    assert!(notifier.seen().is_empty());

    let state = lock_session(&session);
    assert!(state.is_processing());
    assert_eq!(state.processing_message(), "Working...");
}

#[tokio::test]
async fn flag_is_raised_while_in_flight() {
    let session = loaded_session(Tool::Enhance);
    let observed = Arc::new(Mutex::new(None));
    let seen = observed.clone();
    let backend = Arc::new(HookBackend {
        session: session.clone(),
        hook: move |state: &mut EditorSession| {
            *seen.lock().unwrap() =
                Some((state.is_processing(), state.processing_message().to_string()));
        },
        result: Ok(image(EDITED)),
    });
    let (executor, _) = executor(backend);

    executor.execute(&session, enhance_request()).await;
    assert_eq!(
        *observed.lock().unwrap(),
        Some((true, "Enhancing image...".to_string()))
    );
    assert!(!lock_session(&session).is_processing());
}

#[tokio::test]
async fn result_for_replaced_image_is_dropped() {
    let session = loaded_session(Tool::Enhance);
    let backend = Arc::new(HookBackend {
        session: session.clone(),
        hook: |state: &mut EditorSession| {
            state.set_image(image("data:image/png;base64,bmV3"), 64, 64);
        },
        result: Ok(image(EDITED)),
    });
    let (executor, notifier) = executor(backend);

    let outcome = executor.execute(&session, enhance_request()).await;
    assert_eq!(outcome, OperationOutcome::Superseded);

    let state = lock_session(&session);
    assert_eq!(state.history().len(), 1);
    assert_eq!(state.current_image().map(|i| i.as_data_uri()), Some("data:image/png;base64,bmV3"));
    assert!(!state.is_processing());
    assert!(notifier.seen().is_empty());
}

#[tokio::test]
async fn result_after_reset_is_dropped() {
    let session = loaded_session(Tool::Enhance);
    let backend = Arc::new(HookBackend {
        session: session.clone(),
        hook: |state: &mut EditorSession| state.reset(),
        result: Ok(image(EDITED)),
    });
    let (executor, _) = executor(backend);

    assert_eq!(
        executor.execute(&session, enhance_request()).await,
        OperationOutcome::Superseded
    );
    let state = lock_session(&session);
    assert!(!state.has_image());
    assert!(state.history().is_empty());
    assert!(!state.is_processing());
}

#[tokio::test]
async fn stale_cycle_does_not_release_a_newer_flag() {
    let session = loaded_session(Tool::Enhance);
    let backend = Arc::new(HookBackend {
        session: session.clone(),
        hook: |state: &mut EditorSession| {
            state.reset();
            state.set_image(image(ORIGINAL), 32, 32);
            assert!(state.begin_processing("Removing background...").is_some());
        },
        result: Ok(image(EDITED)),
    });
    let (executor, _) = executor(backend);

    assert_eq!(
        executor.execute(&session, enhance_request()).await,
        OperationOutcome::Superseded
    );
    let state = lock_session(&session);
    assert!(state.is_processing());
    assert_eq!(state.processing_message(), "Removing background...");
}

#[tokio::test]
async fn cancelled_request_releases_the_flag() {
    let session = loaded_session(Tool::Enhance);
    let (executor, _) = executor(Arc::new(PendingBackend));

    let timed_out = tokio::time::timeout(
        Duration::from_millis(20),
        executor.execute(&session, enhance_request()),
    )
    .await;
    assert!(timed_out.is_err());

    let state = lock_session(&session);
    assert!(!state.is_processing());
    assert_eq!(state.history().len(), 1);
}

// ============================================================================
// run_active_tool
// ============================================================================

#[tokio::test]
async fn planning_failure_never_raises_the_flag() {
    let session = loaded_session(Tool::RemoveObject);
    let backend = MockBackend::new(Vec::new());
    let (executor, notifier) = executor(backend.clone());

    let outcome = executor.run_active_tool(&session).await;
    assert_eq!(
        outcome,
        OperationOutcome::Failed(AiError::from(ValidationError::MissingMask))
    );
    assert!(!lock_session(&session).is_processing());
    assert!(backend.calls().is_empty());
    assert_eq!(
        notifier.seen(),
        vec![Notification::error(ValidationError::MissingMask.to_string())]
    );
}

#[tokio::test]
async fn run_active_tool_sends_the_planned_payload() {
    let session = loaded_session(Tool::RemoveObject);
    lock_session(&session).set_mask_data(Some(image(MASK)));
    let backend = MockBackend::new(vec![Ok(image(EDITED))]);
    let (executor, _) = executor(backend.clone());

    let outcome = executor.run_active_tool(&session).await;
    assert_eq!(outcome, OperationOutcome::Committed { label: "Object Removed".to_string() });
    assert_eq!(
        backend.calls(),
        vec![(
            "/api/remove-object".to_string(),
            json!({ "image": ORIGINAL, "mask": MASK })
        )]
    );
    let state = lock_session(&session);
    assert!(state.mask_data().is_none());
    assert_eq!(state.active_tool(), Some(Tool::RemoveObject));
}

// ============================================================================
// HttpBackend
// ============================================================================

/// Accept one connection, answer it with `status_line`, `headers` and `body`,
/// and hand back the raw request that was received.
async fn serve_once(
    status_line: &'static str,
    headers: &'static [(&'static str, &'static str)],
    body: &'static str,
) -> (String, tokio::task::JoinHandle<String>) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let content_length = text[..head_end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= head_end + 4 + content_length {
                    break;
                }
            }
        }

        let mut response = format!("HTTP/1.1 {status_line}\r\n");
        for (name, value) in headers {
            response.push_str(&format!("{name}: {value}\r\n"));
        }
        response.push_str(&format!(
            "Content-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ));
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&request).into_owned()
    });

    (base_url, handle)
}

fn http_backend(base_url: &str) -> HttpBackend {
    HttpBackend::new(base_url, Duration::from_secs(5), Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn http_backend_posts_json_and_returns_the_image() {
    let (base_url, server) = serve_once("200 OK", &[], r#"{"image":"ZWRpdGVk"}"#).await;

    let result = http_backend(&base_url)
        .submit("/api/enhance", &json!({ "image": ORIGINAL }))
        .await
        .unwrap();
    assert_eq!(result, image(EDITED));

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /api/enhance HTTP/1.1"), "{request}");
    assert!(request.contains(ORIGINAL), "{request}");
}

#[tokio::test]
async fn http_backend_reads_retry_after_header() {
    let (base_url, server) = serve_once(
        "429 Too Many Requests",
        &[("Retry-After", "7")],
        r#"{"error":"Rate limit exceeded. Try again in 60 seconds.","code":"RATE_LIMIT_EXCEEDED"}"#,
    )
    .await;

    let err = http_backend(&base_url)
        .submit("/api/remove-background", &json!({ "image": ORIGINAL }))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AiError::RateLimited {
            message: "Rate limit exceeded. Try again in 60 seconds.".to_string(),
            retry_after: Some(Duration::from_secs(7)),
        }
    );
    server.await.unwrap();
}

#[tokio::test]
async fn http_backend_connection_refused_is_network_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = http_backend(&base_url)
        .submit("/api/enhance", &json!({ "image": ORIGINAL }))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NetworkFailure);
    assert!(err.retryable());
}

#[test]
fn http_backend_trims_trailing_slash() {
    let backend = HttpBackend::new(
        "http://localhost:3000/",
        Duration::from_secs(5),
        Duration::from_secs(1),
    )
    .unwrap();
    assert_eq!(backend.base_url(), "http://localhost:3000");
}
