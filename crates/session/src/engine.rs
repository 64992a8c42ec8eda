use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use intervox_config::Settings;

use crate::agent::{AgentFeatures, JoinInterviewRequest};
use crate::classify;
use crate::error::{SessionError, SessionFailure};
use crate::invite::AgentInviteRegistry;
use crate::media::{AgentMessage, CaptionEvent, MediaEvent, MediaSession, Participant};
use crate::progress::ProgressTracker;
use crate::transcript::{TranscriptLog, TranscriptMessage};
use crate::{InterviewPlan, InterviewSummary, StageCategory};

/// Session lifecycle. `Ended` and `Error` are terminal until `reset()`;
/// only `Ended` is graceful (no retry offered).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Idle,
    Connecting,
    Active,
    Ended,
    Error(SessionFailure),
}

/// Notifications published for the UI layer; the UI re-reads engine
/// accessors on receipt.
#[derive(Debug, Clone)]
pub enum EngineUpdate {
    LifecycleChanged(Lifecycle),
    TranscriptUpdated,
    ProgressUpdated(usize),
    ElapsedTick(u64),
}

/// Guard that aborts a spawned task when dropped.
///
/// `tokio::spawn` returns a `JoinHandle` whose `Drop` impl detaches (does
/// NOT abort) the task, so every task the engine owns is held through this
/// wrapper.
struct AbortOnDrop(Option<tokio::task::JoinHandle<()>>);

impl AbortOnDrop {
    fn new(handle: tokio::task::JoinHandle<()>) -> Self {
        Self(Some(handle))
    }

    /// Detaches the task instead of aborting it. Used when the guarded task
    /// is the one tearing the session down: aborting it here would cancel
    /// the teardown at its next await point.
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

/// Orchestrates one live interview session.
///
/// Owns the lifecycle state machine, the transcript reconciliation log, the
/// progress tracker, and the timers; drives the media provider and the
/// invite registry. Shared as `Arc` between the UI layer and the engine's
/// own event-pump task.
///
/// All mutation happens either inside `start()`/`reset()` or inside the
/// single event-pump task; locks are synchronous and never held across an
/// `await`, so effects of one media event are fully applied before the
/// next is processed.
pub struct InterviewEngine {
    media: Arc<dyn MediaSession>,
    registry: Arc<AgentInviteRegistry>,
    plan: InterviewPlan,
    settings: Settings,
    /// Single authoritative lifecycle flag; the `Idle → Connecting`
    /// transition under this lock is the `start()` re-entrancy guard.
    lifecycle: Mutex<Lifecycle>,
    /// Bumped by `reset()`; in-flight `start()` steps and timer tasks
    /// compare against their captured value to detect cancellation.
    epoch: AtomicU64,
    transcript: Mutex<TranscriptLog>,
    progress: Mutex<ProgressTracker>,
    /// Remote participants currently in the session, by user id.
    participants: DashMap<String, Participant>,
    agent_features: Mutex<Option<AgentFeatures>>,
    elapsed_secs: AtomicU64,
    /// Invalidates a pending debounced end when a participant returns.
    departure_gen: AtomicU64,
    pump: Mutex<Option<AbortOnDrop>>,
    ticker: Mutex<Option<AbortOnDrop>>,
    pending_end: Mutex<Option<AbortOnDrop>>,
    update_tx: broadcast::Sender<EngineUpdate>,
}

impl InterviewEngine {
    /// Creates an engine for one interview attempt.
    ///
    /// Returns `(engine, update_receiver)`.
    pub fn new(
        media: Arc<dyn MediaSession>,
        registry: Arc<AgentInviteRegistry>,
        plan: InterviewPlan,
        settings: Settings,
    ) -> (Arc<Self>, broadcast::Receiver<EngineUpdate>) {
        let (update_tx, update_rx) = broadcast::channel(256);
        let questions = plan.questions.clone();
        let engine = Arc::new(Self {
            media,
            registry,
            plan,
            settings,
            lifecycle: Mutex::new(Lifecycle::Idle),
            epoch: AtomicU64::new(0),
            transcript: Mutex::new(TranscriptLog::new()),
            progress: Mutex::new(ProgressTracker::new(questions)),
            participants: DashMap::new(),
            agent_features: Mutex::new(None),
            elapsed_secs: AtomicU64::new(0),
            departure_gen: AtomicU64::new(0),
            pump: Mutex::new(None),
            ticker: Mutex::new(None),
            pending_end: Mutex::new(None),
            update_tx,
        });
        (engine, update_rx)
    }

    /// Starts the session: invite the agent, join the media session, enable
    /// devices and captions, go `Active`.
    ///
    /// Idempotent: a second call while the session is `Connecting` or later
    /// is a no-op, guarded synchronously before the first suspension point,
    /// so duplicate UI triggers can never produce two joins or two
    /// invitation requests.
    pub async fn start(self: &Arc<Self>) -> Result<(), SessionError> {
        let epoch = {
            let mut lifecycle = self.lifecycle.lock();
            if *lifecycle != Lifecycle::Idle {
                debug!(state = ?*lifecycle, "start() ignored, session already underway");
                return Ok(());
            }
            // Device preflight blocks start() while still Idle.
            if let Err(e) = self.media.input_devices_ready() {
                return Err(SessionError::PermissionDenied(e.to_string()));
            }
            *lifecycle = Lifecycle::Connecting;
            self.epoch.load(Ordering::SeqCst)
        };
        self.publish_lifecycle();
        info!(session_id = %self.plan.session_id, "Connecting interview session");

        let request = JoinInterviewRequest {
            call_id: self.plan.session_id.clone(),
            questions: self.plan.questions.clone(),
            candidate_name: self.plan.candidate_name.clone(),
            job_title: self.plan.job_title.clone(),
        };
        let invitation = match self
            .registry
            .ensure_invited(&self.plan.session_id, request)
            .await
        {
            Ok(invitation) => invitation,
            Err(e) => {
                let failure = SessionFailure::from(e);
                self.fail(epoch, failure.clone());
                return Err(failure.into());
            }
        };
        if self.cancelled(epoch) {
            return Ok(());
        }
        *self.agent_features.lock() = Some(invitation.features);

        let events = match self.media.join(&self.plan.session_id).await {
            Ok(events) => events,
            Err(e) => {
                let failure = SessionFailure::MediaSessionJoinFailure(e.to_string());
                self.fail(epoch, failure.clone());
                return Err(failure.into());
            }
        };
        if self.cancelled(epoch) {
            // reset() won the race while join was suspended; the resolved
            // session must not be left dangling.
            info!("Join resolved after reset, leaving media session");
            self.media.leave().await;
            return Ok(());
        }

        // Best-effort: the session is usable without any of these.
        if let Err(e) = self.media.toggle_microphone(true).await {
            warn!(%e, "Could not enable microphone");
        }
        if let Err(e) = self.media.toggle_camera(true).await {
            warn!(%e, "Could not enable camera");
        }
        if let Err(e) = self
            .media
            .start_live_captioning(&self.settings.captions.language)
            .await
        {
            warn!(%e, "Live captioning unavailable, transcript will rely on the structured channel");
        }

        let became_active = {
            let mut lifecycle = self.lifecycle.lock();
            if self.cancelled(epoch) || *lifecycle != Lifecycle::Connecting {
                false
            } else {
                *lifecycle = Lifecycle::Active;
                true
            }
        };
        if !became_active {
            self.media.leave().await;
            return Ok(());
        }

        self.spawn_event_pump(events, epoch);
        self.start_ticker(epoch);
        self.publish_lifecycle();
        info!(session_id = %self.plan.session_id, "Interview session active");
        Ok(())
    }

    /// Clears all session-local state and returns to `Idle`.
    ///
    /// The invite registry entry for this call is intentionally kept: the
    /// at-most-once invitation guarantee is call-scoped, not
    /// controller-scoped.
    pub async fn reset(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let was_joined = {
            let mut lifecycle = self.lifecycle.lock();
            let joined = *lifecycle == Lifecycle::Active;
            *lifecycle = Lifecycle::Idle;
            joined
        };
        *self.pump.lock() = None;
        *self.ticker.lock() = None;
        *self.pending_end.lock() = None;
        if was_joined {
            self.media.leave().await;
        }
        self.transcript.lock().clear();
        self.progress.lock().reset();
        self.participants.clear();
        *self.agent_features.lock() = None;
        self.elapsed_secs.store(0, Ordering::SeqCst);
        self.publish_lifecycle();
        info!(session_id = %self.plan.session_id, "Session reset to idle");
    }

    // ---- accessors for the UI layer ----

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.lock().clone()
    }

    pub fn transcript(&self) -> Vec<TranscriptMessage> {
        self.transcript.lock().messages().to_vec()
    }

    pub fn current_question_index(&self) -> usize {
        self.progress.lock().current_question_index()
    }

    pub fn completed_stages(&self) -> BTreeSet<StageCategory> {
        self.progress.lock().completed_stages()
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_secs.load(Ordering::SeqCst)
    }

    /// Features reported by the invited agent, available once `Connecting`
    /// has completed the invitation step.
    pub fn agent_features(&self) -> Option<AgentFeatures> {
        self.agent_features.lock().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineUpdate> {
        self.update_tx.subscribe()
    }

    /// Completion snapshot, in the shape the completion webhook consumes.
    /// `None` unless the session ended gracefully.
    pub fn summary(&self) -> Option<InterviewSummary> {
        if *self.lifecycle.lock() != Lifecycle::Ended {
            return None;
        }
        Some(InterviewSummary {
            session_id: self.plan.session_id.clone(),
            candidate_name: self.plan.candidate_name.clone(),
            job_title: self.plan.job_title.clone(),
            duration_seconds: self.elapsed_seconds(),
            transcript: self.transcript(),
            completed_at: Utc::now(),
        })
    }

    // ---- event handling ----

    async fn handle_event(self: &Arc<Self>, event: MediaEvent) {
        match event {
            MediaEvent::ParticipantJoined(p) => self.on_participant_joined(p),
            MediaEvent::ParticipantLeft(p) => self.on_participant_left(p),
            MediaEvent::Caption(c) => self.on_caption(c),
            MediaEvent::Custom(payload) => self.on_custom(&payload),
            MediaEvent::CallEnded => self.finish("call ended by the provider").await,
        }
    }

    fn on_participant_joined(&self, participant: Participant) {
        if participant.is_local {
            return;
        }
        debug!(user_id = %participant.user_id, name = %participant.display_name, "Participant joined");
        self.participants
            .insert(participant.user_id.clone(), participant);
        // A return within the debounce window keeps the session alive.
        self.departure_gen.fetch_add(1, Ordering::SeqCst);
        *self.pending_end.lock() = None;
    }

    fn on_participant_left(self: &Arc<Self>, participant: Participant) {
        if participant.is_local {
            return;
        }
        debug!(user_id = %participant.user_id, "Participant left");
        self.participants.remove(&participant.user_id);
        if self.participants.is_empty() && self.is_active() {
            self.schedule_debounced_end();
        }
    }

    fn on_caption(&self, caption: CaptionEvent) {
        let role = classify::participant_role(&caption.speaker_id, &caption.speaker_name);
        let changed = self.transcript.lock().apply_caption(&caption, role);
        if changed {
            let _ = self.update_tx.send(EngineUpdate::TranscriptUpdated);
        }
    }

    fn on_custom(&self, payload: &serde_json::Value) {
        match AgentMessage::parse(payload) {
            Some(AgentMessage::Transcript { speaker, text }) => {
                let changed = self.transcript.lock().apply_structured(speaker, &text);
                if changed {
                    let _ = self.update_tx.send(EngineUpdate::TranscriptUpdated);
                }
            }
            Some(AgentMessage::Progress { question_index, .. }) => {
                self.progress.lock().apply(question_index);
                let _ = self
                    .update_tx
                    .send(EngineUpdate::ProgressUpdated(question_index));
            }
            None => {
                debug!("Dropping unknown custom message");
            }
        }
    }

    /// Ends the session after the sole remote participant has stayed away
    /// for the debounce window, absorbing transient reconnects.
    fn schedule_debounced_end(self: &Arc<Self>) {
        let generation = self.departure_gen.fetch_add(1, Ordering::SeqCst) + 1;
        let epoch = self.epoch.load(Ordering::SeqCst);
        let debounce = Duration::from_millis(self.settings.session.leave_debounce_ms);
        debug!(debounce_ms = debounce.as_millis() as u64, "Sole remote participant left, arming end timer");

        let engine = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if engine.cancelled(epoch)
                || engine.departure_gen.load(Ordering::SeqCst) != generation
            {
                return;
            }
            if engine.participants.is_empty() {
                engine.finish("sole remote participant left").await;
            }
        });
        *self.pending_end.lock() = Some(AbortOnDrop::new(handle));
    }

    /// Graceful transition to `Ended`; distinct from `Error`.
    async fn finish(&self, reason: &str) {
        {
            let mut lifecycle = self.lifecycle.lock();
            if *lifecycle != Lifecycle::Active {
                return;
            }
            *lifecycle = Lifecycle::Ended;
        }
        info!(session_id = %self.plan.session_id, reason, "Interview session ended");
        // The pump is not aborted here (finish may run on it); it exits on
        // its own once the lifecycle is no longer Active. Likewise the
        // debounce task may be the caller, so it is disarmed, not aborted.
        *self.ticker.lock() = None;
        if let Some(pending) = self.pending_end.lock().take() {
            pending.disarm();
        }
        self.media.leave().await;
        self.publish_lifecycle();
    }

    fn fail(&self, epoch: u64, failure: SessionFailure) {
        if self.cancelled(epoch) {
            // reset() already returned the session to Idle.
            return;
        }
        warn!(session_id = %self.plan.session_id, %failure, "Session failed");
        *self.lifecycle.lock() = Lifecycle::Error(failure);
        self.publish_lifecycle();
    }

    fn spawn_event_pump(self: &Arc<Self>, mut events: mpsc::Receiver<MediaEvent>, epoch: u64) {
        let engine = Arc::clone(self);
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if engine.cancelled(epoch) || !engine.is_active() {
                    break;
                }
                engine.handle_event(event).await;
            }
            debug!("Media event stream closed");
        });
        *self.pump.lock() = Some(AbortOnDrop::new(handle));
    }

    fn start_ticker(self: &Arc<Self>, epoch: u64) {
        let engine = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // The first tick of a tokio interval fires immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                if engine.cancelled(epoch) || !engine.is_active() {
                    break;
                }
                let elapsed = engine.elapsed_secs.fetch_add(1, Ordering::SeqCst) + 1;
                let _ = engine.update_tx.send(EngineUpdate::ElapsedTick(elapsed));
            }
        });
        *self.ticker.lock() = Some(AbortOnDrop::new(handle));
    }

    fn is_active(&self) -> bool {
        *self.lifecycle.lock() == Lifecycle::Active
    }

    fn cancelled(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) != epoch
    }

    fn publish_lifecycle(&self) {
        let state = self.lifecycle.lock().clone();
        let _ = self.update_tx.send(EngineUpdate::LifecycleChanged(state));
    }
}
