pub mod agent;
pub mod classify;
pub mod engine;
pub mod error;
pub mod invite;
pub mod media;
pub mod progress;
pub mod transcript;

pub use agent::{AgentFeatures, AgentInviter, AgentServiceClient, JoinInterviewRequest};
pub use engine::{EngineUpdate, InterviewEngine, Lifecycle};
pub use error::{InviteError, MediaError, SessionError, SessionFailure};
pub use invite::{AgentInvitation, AgentInviteRegistry};
pub use media::{AgentMessage, CaptionEvent, MediaEvent, MediaSession, Participant};
pub use transcript::{TranscriptLog, TranscriptMessage};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a piece of transcript text.
///
/// The wire name for the candidate is `"human"` (the agent service labels
/// speech it did not produce itself as human speech).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpeakerRole {
    #[serde(rename = "agent")]
    Agent,
    #[serde(rename = "human")]
    Candidate,
}

/// Interview stage a question belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageCategory {
    Screening,
    Technical,
    Behavioral,
    Experience,
    Closing,
}

impl std::fmt::Display for StageCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StageCategory::Screening => "screening",
            StageCategory::Technical => "technical",
            StageCategory::Behavioral => "behavioral",
            StageCategory::Experience => "experience",
            StageCategory::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// One planned interview question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub category: StageCategory,
}

/// Immutable descriptor of one interview attempt.
///
/// Created when the candidate initiates a join and handed to the
/// [`InterviewEngine`]; all mutable session state lives in the engine and
/// is discarded on reset. Nothing here is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewPlan {
    /// Media-provider call identifier; also the invitation dedup key.
    pub session_id: String,
    pub candidate_id: String,
    pub candidate_name: String,
    pub job_title: String,
    /// Ordered question list; list index is the progress index.
    pub questions: Vec<Question>,
}

/// Snapshot of a finished interview, in the shape the completion webhook
/// (out of scope here) expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewSummary {
    pub session_id: String,
    pub candidate_name: String,
    pub job_title: String,
    pub duration_seconds: u64,
    pub transcript: Vec<TranscriptMessage>,
    pub completed_at: DateTime<Utc>,
}
