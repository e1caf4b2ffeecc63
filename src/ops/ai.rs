// ============================================================================
// AI OPERATIONS - single-flight edit execution against the model service
// ============================================================================
//
// One `execute` call is one request/response cycle: raise the processing
// flag, submit the payload to an `EditBackend`, commit the returned image as a
// new history entry on success, and always lower the flag again. Failures
// never touch the image, history, tool, mask or prompt, so the user can retry
// the same action immediately.

use std::sync::Arc;
use std::time::Duration;

use crate::io::EncodedImage;
use crate::ops::edit_ops::plan_active_tool;
use crate::session::{ProcessingTicket, SharedSession, lock_session};
use crate::settings::EditorSettings;
use crate::validation::ValidationError;

const RATE_LIMIT_CODE: &str = "RATE_LIMIT_EXCEEDED";
const VALIDATION_CODE: &str = "VALIDATION_ERROR";
const RETRY_HINT: &str = "Try again in ";

// =============================================================================
// ERRORS
// =============================================================================

/// Failure categories the editor reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ValidationFailure,
    RateLimited,
    UpstreamFailure,
    NetworkFailure,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AiError {
    /// Malformed or out-of-policy input, rejected locally or by the service.
    #[error("{0}")]
    Validation(String),

    /// The service refused the request because of its quota.
    #[error("{message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Non-success status or an unexpected response shape.
    #[error("{message}")]
    Upstream { status: Option<u16>, message: String },

    /// The request could not complete.
    #[error("network error: {0}")]
    Network(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl AiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::ValidationFailure,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Upstream { .. } => ErrorKind::UpstreamFailure,
            Self::Network(_) | Self::HttpClientBuild(_) => ErrorKind::NetworkFailure,
        }
    }

    /// Whether a manual retry is worth suggesting. Nothing retries automatically.
    pub fn retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::RateLimited | ErrorKind::NetworkFailure)
    }
}

impl From<ValidationError> for AiError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

// =============================================================================
// REQUEST & BACKEND
// =============================================================================

/// A fully planned edit: where to send it, what to send, and how to label
/// the committed result.
#[derive(Debug, Clone, PartialEq)]
pub struct EditRequest {
    pub endpoint: String,
    pub payload: serde_json::Value,
    pub label: String,
    pub processing_message: String,
}

/// External edit service. Returns the edited image or a classified failure.
#[async_trait::async_trait]
pub trait EditBackend: Send + Sync {
    async fn submit(&self, endpoint: &str, payload: &serde_json::Value) -> Result<EncodedImage, AiError>;
}

/// JSON-over-HTTP backend (`POST <base_url><endpoint>`).
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, AiError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| AiError::HttpClientBuild(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    pub fn from_settings(settings: &EditorSettings) -> Result<Self, AiError> {
        Self::new(
            settings.api_base_url.clone(),
            Duration::from_secs(settings.request_timeout_secs),
            Duration::from_secs(settings.connect_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait::async_trait]
impl EditBackend for HttpBackend {
    async fn submit(&self, endpoint: &str, payload: &serde_json::Value) -> Result<EncodedImage, AiError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let text = response
            .text()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;

        tracing::debug!(%url, status, "ai: response received");
        parse_response(status, retry_after, &text)
    }
}

// =============================================================================
// PARSING
// =============================================================================

#[derive(serde::Deserialize)]
struct SuccessBody {
    image: Option<String>,
}

#[derive(serde::Deserialize, Default)]
struct ErrorBody {
    error: Option<String>,
    code: Option<String>,
}

/// Classify a service response. `retry_after` is the `Retry-After` header in
/// seconds, when present.
pub fn parse_response(status: u16, retry_after: Option<u64>, body: &str) -> Result<EncodedImage, AiError> {
    if (200..300).contains(&status) {
        let parsed: SuccessBody = serde_json::from_str(body).map_err(|e| AiError::Upstream {
            status: Some(status),
            message: format!("malformed response: {e}"),
        })?;
        let image = parsed.image.filter(|s| !s.is_empty()).ok_or_else(|| AiError::Upstream {
            status: Some(status),
            message: "response did not contain an image".to_string(),
        })?;
        return EncodedImage::parse(&image).map_err(|e| AiError::Upstream {
            status: Some(status),
            message: format!("invalid image in response: {e}"),
        });
    }

    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .error
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("Request failed: {status}"));
    let code = parsed.code.as_deref();

    if status == 429 || code == Some(RATE_LIMIT_CODE) {
        let retry_after = retry_after
            .or_else(|| parse_retry_hint(&message))
            .map(Duration::from_secs);
        return Err(AiError::RateLimited { message, retry_after });
    }
    if status == 400 || code == Some(VALIDATION_CODE) {
        return Err(AiError::Validation(message));
    }
    Err(AiError::Upstream {
        status: Some(status),
        message,
    })
}

/// Seconds from a "... Try again in N seconds." message.
fn parse_retry_hint(message: &str) -> Option<u64> {
    let (_, rest) = message.split_once(RETRY_HINT)?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NotificationLevel::Success, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NotificationLevel::Error, message: message.into() }
    }
}

/// Receives user-facing toasts.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Default notifier: writes toasts to the session log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => tracing::info!(message = %notification.message, "toast"),
            NotificationLevel::Error => tracing::warn!(message = %notification.message, "toast"),
        }
    }
}

// =============================================================================
// EXECUTOR
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    /// The result was committed to history under `label`.
    Committed { label: String },
    /// Nothing changed except the processing flag.
    Failed(AiError),
    /// The session moved on (new image or reset) before the result arrived.
    Superseded,
    /// Another operation was already in flight; nothing was sent.
    Busy,
}

impl OperationOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

/// Lowers the processing flag on drop unless released explicitly, so a
/// cancelled `execute` future cannot leave the editor stuck.
struct ProcessingGuard<'a> {
    session: &'a SharedSession,
    ticket: Option<ProcessingTicket>,
}

impl ProcessingGuard<'_> {
    fn disarm(&mut self) {
        self.ticket = None;
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            lock_session(self.session).finish_processing(ticket);
        }
    }
}

pub struct AiExecutor {
    backend: Arc<dyn EditBackend>,
    notifier: Arc<dyn Notifier>,
}

impl AiExecutor {
    pub fn new(backend: Arc<dyn EditBackend>) -> Self {
        Self {
            backend,
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Run one edit cycle against `session`.
    ///
    /// Returns `Busy` without side effects if the session is already
    /// processing. The session lock is never held across the backend call.
    pub async fn execute(&self, session: &SharedSession, request: EditRequest) -> OperationOutcome {
        let ticket = {
            let mut state = lock_session(session);
            match state.begin_processing(&request.processing_message) {
                Some(ticket) => ticket,
                None => {
                    tracing::debug!(endpoint = %request.endpoint, "ai: rejected, operation already in flight");
                    return OperationOutcome::Busy;
                }
            }
        };
        let mut guard = ProcessingGuard {
            session,
            ticket: Some(ticket),
        };

        tracing::info!(
            session_id = %ticket.session_id,
            endpoint = %request.endpoint,
            label = %request.label,
            "ai: request started"
        );
        let result = self.backend.submit(&request.endpoint, &request.payload).await;

        let outcome = {
            let mut state = lock_session(session);
            let outcome = if !state.accepts(ticket) {
                tracing::info!(
                    session_id = %ticket.session_id,
                    endpoint = %request.endpoint,
                    "ai: result dropped, session superseded"
                );
                OperationOutcome::Superseded
            } else {
                match result {
                    Ok(image) => {
                        state.set_current_image(image, request.label.as_str());
                        OperationOutcome::Committed {
                            label: request.label.clone(),
                        }
                    }
                    Err(err) => OperationOutcome::Failed(err),
                }
            };
            state.finish_processing(ticket);
            outcome
        };
        guard.disarm();

        match &outcome {
            OperationOutcome::Committed { label } => {
                tracing::info!(session_id = %ticket.session_id, label = %label, "ai: edit committed");
                self.notifier
                    .notify(Notification::success(format!("{label} complete!")));
            }
            OperationOutcome::Failed(err) => {
                tracing::warn!(
                    session_id = %ticket.session_id,
                    endpoint = %request.endpoint,
                    kind = ?err.kind(),
                    error = %err,
                    "ai: request failed"
                );
                self.notifier.notify(Notification::error(err.to_string()));
            }
            OperationOutcome::Superseded | OperationOutcome::Busy => {}
        }
        outcome
    }

    /// Plan the request for the session's active tool and execute it.
    /// Planning failures are reported without raising the processing flag.
    pub async fn run_active_tool(&self, session: &SharedSession) -> OperationOutcome {
        let planned = {
            let state = lock_session(session);
            if state.is_processing() {
                return OperationOutcome::Busy;
            }
            plan_active_tool(&state)
        };
        match planned {
            Ok(request) => self.execute(session, request).await,
            Err(err) => {
                let err = AiError::from(err);
                tracing::debug!(error = %err, "ai: request not planned");
                self.notifier.notify(Notification::error(err.to_string()));
                OperationOutcome::Failed(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "ai_test.rs"]
mod tests;
