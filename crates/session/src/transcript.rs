use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::SpeakerRole;
use crate::media::CaptionEvent;

/// One speaker turn in the reconciled transcript.
///
/// `text` grows monotonically, except that a refinement of the still-open
/// caption turn may replace it with an equal-or-longer revision.
/// `created_at` is presentational; ordering is log order only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub id: String,
    pub speaker_id: String,
    pub role: SpeakerRole,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Last-seen caption state for one speaker. At most one open segment per
/// speaker; superseded whenever a new turn marker arrives.
#[derive(Debug, Clone)]
struct CaptionSegment {
    turn_marker: String,
    last_text: String,
}

/// Merges the two independently-delivered speech streams into one ordered,
/// speaker-turn-aware transcript.
///
/// Inputs arrive in arbitrary interleaving and may be redelivered:
///
/// - the structured channel: discrete finalized fragments tagged with a
///   [`SpeakerRole`], delivered once per fragment and authoritative for
///   that role;
/// - the caption stream: per-speaker cumulative/refined text keyed by a
///   provider turn marker, redeliverable and unordered across speakers.
///
/// A role sourced by the structured channel never also takes captions: the
/// agent role is structured from construction (the agent service always
/// publishes its own speech there), and any further role observed on the
/// structured channel joins the set. All merge decisions use arrival order
/// plus the speaker-adjacency/turn-marker signals — never timestamps.
#[derive(Debug)]
pub struct TranscriptLog {
    messages: Vec<TranscriptMessage>,
    segments: HashMap<String, CaptionSegment>,
    structured_roles: HashSet<SpeakerRole>,
}

impl TranscriptLog {
    pub fn new() -> Self {
        let mut structured_roles = HashSet::new();
        structured_roles.insert(SpeakerRole::Agent);
        Self {
            messages: Vec::new(),
            segments: HashMap::new(),
            structured_roles,
        }
    }

    /// The reconciled transcript, in speaker-turn order.
    pub fn messages(&self) -> &[TranscriptMessage] {
        &self.messages
    }

    /// Drops all messages and caption bookkeeping.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Applies one caption delivery. Returns `true` if the transcript
    /// changed.
    pub fn apply_caption(&mut self, event: &CaptionEvent, role: SpeakerRole) -> bool {
        let text = event.text.trim();
        if text.is_empty() {
            return false;
        }

        if self.structured_roles.contains(&role) {
            debug!(
                speaker = %event.speaker_id,
                ?role,
                "Caption for structured-channel role discarded"
            );
            return false;
        }

        let segment = self.segments.get(&event.speaker_id);

        // Exact redelivery of the last caption for this speaker.
        if let Some(seg) = segment
            && seg.last_text == text
        {
            return false;
        }

        let is_new_turn = match segment {
            Some(seg) => seg.turn_marker != event.turn_marker,
            None => true,
        };

        let last_is_same_speaker = self
            .messages
            .last()
            .is_some_and(|m| m.speaker_id == event.speaker_id);

        let mut changed = false;
        if last_is_same_speaker {
            if let Some(last) = self.messages.last_mut() {
                if is_new_turn {
                    // Same speaker continuing across utterances: keep one
                    // message per ongoing turn.
                    last.text.push(' ');
                    last.text.push_str(text);
                    changed = true;
                } else if text.len() >= last.text.len() {
                    // Refinement of the open turn, longer (or equal) wins.
                    last.text = text.to_string();
                    changed = true;
                }
                // Otherwise: a shorter revision of the open turn is stale.
            }
        } else {
            self.messages.push(TranscriptMessage {
                id: nanoid::nanoid!(),
                speaker_id: event.speaker_id.clone(),
                role,
                text: text.to_string(),
                created_at: Utc::now(),
            });
            changed = true;
        }

        self.segments.insert(
            event.speaker_id.clone(),
            CaptionSegment {
                turn_marker: event.turn_marker.clone(),
                last_text: text.to_string(),
            },
        );

        changed
    }

    /// Applies one structured-channel fragment. Returns `true` if the
    /// transcript changed.
    pub fn apply_structured(&mut self, role: SpeakerRole, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }

        // From now on this role is authoritatively structured; captions for
        // it would duplicate or conflict with these fragments.
        self.structured_roles.insert(role);

        let last_has_role = self.messages.last().is_some_and(|m| m.role == role);
        if last_has_role {
            if let Some(last) = self.messages.last_mut() {
                last.text.push(' ');
                last.text.push_str(text);
            }
        } else {
            self.messages.push(TranscriptMessage {
                id: nanoid::nanoid!(),
                speaker_id: structured_speaker_id(role).to_string(),
                role,
                text: text.to_string(),
                created_at: Utc::now(),
            });
        }
        true
    }
}

impl Default for TranscriptLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable pseudo speaker id for structured fragments, which carry a role
/// but no media-session user id.
fn structured_speaker_id(role: SpeakerRole) -> &'static str {
    match role {
        SpeakerRole::Agent => "agent",
        SpeakerRole::Candidate => "candidate",
    }
}
