use intervox_session::StageCategory;
use intervox_session::engine::Lifecycle;

use crate::fixtures::test_rig::TestRig;
use crate::fixtures::wait_for;

async fn active_rig() -> TestRig {
    let rig = TestRig::spawn().await;
    rig.engine.start().await.unwrap();
    rig.media.emit_agent_joined().await;
    rig
}

fn transcript_texts(rig: &TestRig) -> Vec<String> {
    rig.engine
        .transcript()
        .into_iter()
        .map(|m| m.text)
        .collect()
}

#[tokio::test]
async fn caption_redelivery_does_not_change_the_transcript() {
    let rig = active_rig().await;

    rig.media.emit_caption("cand-7", "t1", "hello").await;
    rig.media.emit_caption("cand-7", "t1", "hello").await;
    rig.media.emit_caption("cand-7", "t1", "hello").await;

    let engine = rig.engine.clone();
    wait_for("caption to land", 1_000, || !engine.transcript().is_empty()).await;
    assert_eq!(transcript_texts(&rig), vec!["hello"]);
}

#[tokio::test]
async fn caption_refinement_grows_the_open_turn() {
    let rig = active_rig().await;

    rig.media.emit_caption("cand-7", "t1", "hello").await;
    rig.media.emit_caption("cand-7", "t1", "hello there").await;

    let engine = rig.engine.clone();
    wait_for("refinement to land", 1_000, || {
        engine.transcript().first().is_some_and(|m| m.text == "hello there")
    })
    .await;
    assert_eq!(transcript_texts(&rig).len(), 1);
}

#[tokio::test]
async fn new_turns_of_the_same_speaker_merge_into_one_message() {
    let rig = active_rig().await;

    rig.media.emit_caption("cand-7", "t1", "hello").await;
    rig.media.emit_caption("cand-7", "t2", "how are you").await;

    let engine = rig.engine.clone();
    wait_for("turns to merge", 1_000, || {
        engine
            .transcript()
            .first()
            .is_some_and(|m| m.text == "hello how are you")
    })
    .await;
    assert_eq!(transcript_texts(&rig).len(), 1);
}

#[tokio::test]
async fn agent_captions_never_enter_the_transcript() {
    let rig = active_rig().await;

    // Captions attributed to the agent participant are covered by the
    // structured channel and must be dropped.
    rig.media
        .emit_caption("ai-interviewer", "t1", "first question")
        .await;
    rig.media.emit_caption("cand-7", "t1", "my answer").await;

    let engine = rig.engine.clone();
    wait_for("candidate caption", 1_000, || !engine.transcript().is_empty()).await;
    assert_eq!(transcript_texts(&rig), vec!["my answer"]);
}

#[tokio::test]
async fn structured_fragments_and_captions_interleave_by_speaker_turn() {
    let rig = active_rig().await;

    rig.media
        .emit_custom(serde_json::json!({
            "type": "transcript", "speaker": "agent", "text": "Welcome, Sam."
        }))
        .await;
    rig.media
        .emit_custom(serde_json::json!({
            "type": "transcript", "speaker": "agent", "text": "Tell me about yourself."
        }))
        .await;
    rig.media.emit_caption("cand-7", "t1", "sure, so").await;
    rig.media
        .emit_caption("cand-7", "t2", "I build media servers")
        .await;
    rig.media
        .emit_custom(serde_json::json!({
            "type": "transcript", "speaker": "agent", "text": "Great, next question."
        }))
        .await;

    let engine = rig.engine.clone();
    wait_for("full exchange", 1_000, || engine.transcript().len() == 3).await;

    assert_eq!(
        transcript_texts(&rig),
        vec![
            "Welcome, Sam. Tell me about yourself.",
            "sure, so I build media servers",
            "Great, next question.",
        ]
    );

    // Adjacent messages always alternate speaker roles.
    let roles: Vec<_> = rig.engine.transcript().iter().map(|m| m.role).collect();
    for pair in roles.windows(2) {
        assert_ne!(pair[0], pair[1]);
    }
}

#[tokio::test]
async fn progress_events_drive_completed_stages() {
    let rig = active_rig().await;

    rig.media
        .emit_custom(serde_json::json!({
            "type": "progress", "questionIndex": 2, "category": "behavioral"
        }))
        .await;

    let engine = rig.engine.clone();
    wait_for("progress to land", 1_000, || {
        engine.current_question_index() == 2
    })
    .await;

    let stages = rig.engine.completed_stages();
    assert_eq!(stages.len(), 2);
    assert!(stages.contains(&StageCategory::Screening));
    assert!(stages.contains(&StageCategory::Technical));
}

#[tokio::test]
async fn malformed_custom_messages_are_dropped_silently() {
    let rig = active_rig().await;

    rig.media.emit_custom(serde_json::json!("not an object")).await;
    rig.media.emit_custom(serde_json::json!({ "type": "mystery" })).await;
    rig.media
        .emit_custom(serde_json::json!({ "type": "progress", "questionIndex": "NaN" }))
        .await;
    rig.media
        .emit_custom(serde_json::json!({ "type": "transcript", "speaker": "agent", "text": "still alive" }))
        .await;

    // The pump survived the junk and processed the valid message after it.
    let engine = rig.engine.clone();
    wait_for("valid message after junk", 1_000, || {
        !engine.transcript().is_empty()
    })
    .await;
    assert_eq!(transcript_texts(&rig), vec!["still alive"]);
    assert_eq!(rig.engine.current_question_index(), 0);
    assert_eq!(rig.engine.lifecycle(), Lifecycle::Active);
}
