use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::SpeakerRole;
use crate::error::MediaError;

/// A participant visible in the media session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: String,
    pub display_name: String,
    /// Whether this is the local (candidate-side) participant.
    pub is_local: bool,
}

/// One closed-caption delivery from the media provider.
///
/// The same logical utterance may be redelivered several times with growing
/// or corrected `text` under the same `turn_marker`, and deliveries are not
/// ordered across speakers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionEvent {
    pub speaker_id: String,
    pub speaker_name: String,
    /// Opaque provider token identifying one utterance of this speaker.
    pub turn_marker: String,
    /// Cumulative/refined text for the utterance so far.
    pub text: String,
}

/// Events delivered by the media provider for the lifetime of a joined
/// session.
#[derive(Debug, Clone)]
pub enum MediaEvent {
    ParticipantJoined(Participant),
    ParticipantLeft(Participant),
    Caption(CaptionEvent),
    /// Arbitrary app-level message broadcast into the session; the agent's
    /// structured speech and progress events arrive here.
    Custom(serde_json::Value),
    CallEnded,
}

/// Structured messages the interviewer agent publishes on the session's
/// custom-message channel. Anything that does not parse into one of these
/// is dropped by the engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AgentMessage {
    /// Pre-segmented, finalized speech fragment (the structured channel).
    Transcript {
        speaker: SpeakerRole,
        text: String,
    },
    /// The agent moved to a new question.
    #[serde(rename_all = "camelCase")]
    Progress {
        question_index: usize,
        #[serde(default)]
        category: Option<String>,
    },
}

impl AgentMessage {
    /// Parses a custom-message payload, returning `None` for unknown or
    /// malformed messages (they must never crash the event loop).
    pub fn parse(payload: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(payload.clone()).ok()
    }
}

/// Capability surface of the real-time media/session provider.
///
/// The provider owns audio/video transport, room membership, and caption
/// generation; the engine only drives it through this seam, which keeps the
/// whole lifecycle testable against a scripted fake.
#[async_trait]
pub trait MediaSession: Send + Sync + 'static {
    /// Synchronous snapshot of camera/microphone availability, checked
    /// before the lifecycle leaves `Idle`.
    fn input_devices_ready(&self) -> Result<(), MediaError>;

    /// Joins the session and returns its event stream. Dropping the
    /// receiver does NOT leave the session; callers must pair every
    /// successful `join` with a `leave`.
    async fn join(&self, session_id: &str) -> Result<mpsc::Receiver<MediaEvent>, MediaError>;

    /// Leaves the session. Safe to call when not joined.
    async fn leave(&self);

    async fn toggle_microphone(&self, enabled: bool) -> Result<(), MediaError>;

    async fn toggle_camera(&self, enabled: bool) -> Result<(), MediaError>;

    /// Starts provider-side closed captioning for the given language.
    async fn start_live_captioning(&self, language: &str) -> Result<(), MediaError>;
}
