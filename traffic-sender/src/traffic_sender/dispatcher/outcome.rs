use http::StatusCode;
use sender_metrics::{STATUS_TIMEOUT, STATUS_TRANSPORT_ERROR};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::time::Duration;

pub type DispatchOutcome = Result<Reply, DispatchError>;

/// What was extracted from a 2xx response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Value(String),
    /// The response is a json object without an answer
    Missing,
    /// Not a json object; the round trip still counts as a success
    Unexpected(String),
}

impl Display for Answer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Value(answer) => write!(f, "{}", answer),
            Answer::Missing => write!(f, "N/A"),
            Answer::Unexpected(payload) => write!(f, "{}", payload),
        }
    }
}

#[derive(Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub answer: Answer,
    pub latency: Duration,
    /// Calculation time reported by the worker in `time_ms`
    pub reported: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The worker couldn't be reached, or didn't answer in time
    Transport,
    /// The worker answered with a non-success status
    Application,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to build request: {0}")]
    Request(#[from] http::Error),
    #[error("failed to connect to worker: {0}")]
    Transport(#[from] hyper::Error),
    #[error("worker didn't respond within {0:?}")]
    Timeout(Duration),
    #[error("worker responded with {status} - {body}")]
    Status { status: StatusCode, body: String },
}

impl DispatchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            DispatchError::Status { .. } => FailureKind::Application,
            _ => FailureKind::Transport,
        }
    }

    /// Value of the `status` label
    pub fn status_label(&self) -> Cow<'static, str> {
        match self {
            DispatchError::Status { status, .. } => Cow::Owned(status.as_str().to_string()),
            DispatchError::Timeout(_) => Cow::Borrowed(STATUS_TIMEOUT),
            _ => Cow::Borrowed(STATUS_TRANSPORT_ERROR),
        }
    }
}

/// Pull `answer` and `time_ms` out of a success body. Any shape is tolerated.
pub(crate) fn parse_body(body: &[u8]) -> (Answer, Option<Duration>) {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => {
            let answer = match map.get("answer") {
                None | Some(Value::Null) => Answer::Missing,
                Some(Value::String(answer)) => Answer::Value(answer.clone()),
                Some(other) => Answer::Value(other.to_string()),
            };
            let reported = map
                .get("time_ms")
                .and_then(Value::as_f64)
                .filter(|ms| ms.is_finite() && *ms >= 0f64)
                .and_then(|ms| Duration::try_from_secs_f64(ms / 1_000f64).ok());
            (answer, reported)
        }
        Ok(other) => (Answer::Unexpected(other.to_string()), None),
        Err(_) => (
            Answer::Unexpected(String::from_utf8_lossy(body).into_owned()),
            None,
        ),
    }
}
