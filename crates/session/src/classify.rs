use crate::SpeakerRole;

/// Identifier prefix the agent service uses when registering its media-
/// session user.
const AGENT_ID_PREFIX: &str = "ai-";

/// Classifies a media-session participant as the interviewer agent or the
/// candidate.
///
/// This is a name/id heuristic inherited from the provider contract: the
/// agent joins as a user whose id carries a known prefix or whose display
/// name advertises it as the interviewer. Kept as the single classification
/// point so an explicit role flag from the provider can replace it without
/// touching the reconciliation or lifecycle code.
pub fn participant_role(user_id: &str, display_name: &str) -> SpeakerRole {
    if user_id.starts_with(AGENT_ID_PREFIX) {
        return SpeakerRole::Agent;
    }
    let name = display_name.to_lowercase();
    if name.contains("interviewer") || name.split_whitespace().any(|w| w == "ai") {
        return SpeakerRole::Agent;
    }
    SpeakerRole::Candidate
}
