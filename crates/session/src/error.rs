use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the media-provider seam.
#[derive(Debug, Clone, Error)]
pub enum MediaError {
    #[error("camera/microphone unavailable: {0}")]
    DevicesUnavailable(String),
    #[error("failed to join media session: {0}")]
    JoinFailed(String),
    #[error("live captioning could not be started: {0}")]
    CaptioningFailed(String),
    #[error("media provider error: {0}")]
    Provider(String),
}

/// Errors from the agent-invitation call.
///
/// `Clone` so a single failed attempt can be fanned out to every caller
/// coalesced onto it by the invite registry.
#[derive(Debug, Clone, Error)]
pub enum InviteError {
    /// Network failure or non-2xx response from the agent service.
    #[error("agent service unavailable: {0}")]
    ServiceUnavailable(String),
    /// The service answered 2xx but the body did not parse.
    #[error("agent service returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Typed cause stored in [`Lifecycle::Error`](crate::Lifecycle), suitable
/// for direct display to the candidate. Distinct from `Ended`: an errored
/// session may be retried after `reset()`, an ended one may not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum SessionFailure {
    #[error("the interviewer service is unavailable: {0}")]
    AgentServiceUnavailable(String),
    #[error("could not join the interview call: {0}")]
    MediaSessionJoinFailure(String),
}

/// Errors returned by [`InterviewEngine`](crate::InterviewEngine) entry
/// points.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// Camera/microphone preflight failed; the session never left `Idle`.
    #[error("camera or microphone permission denied: {0}")]
    PermissionDenied(String),
    #[error(transparent)]
    Failed(#[from] SessionFailure),
}

impl From<InviteError> for SessionFailure {
    fn from(err: InviteError) -> Self {
        SessionFailure::AgentServiceUnavailable(err.to_string())
    }
}
