use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::agent::{AgentFeatures, AgentInviter, JoinInterviewRequest};
use crate::error::InviteError;

/// Outcome of [`AgentInviteRegistry::ensure_invited`].
#[derive(Debug, Clone)]
pub struct AgentInvitation {
    pub invited: bool,
    pub features: AgentFeatures,
}

type InviteFuture = Shared<BoxFuture<'static, Result<AgentFeatures, InviteError>>>;

enum Slot {
    /// An invitation request is in flight; concurrent callers attach here.
    InFlight { attempt: u64, future: InviteFuture },
    /// The agent has been invited into this call; cached for the process
    /// lifetime.
    Ready(AgentInvitation),
}

/// At-most-once agent invitation per call, with request coalescing.
///
/// For a given call id at most one outbound invitation request is ever in
/// flight or has ever succeeded. Successes are cached forever (process
/// lifetime, no eviction — the dedup guarantee is in-memory and does not
/// span processes or instances). Failures are never cached: every waiter of
/// the failed attempt sees the error, and the next caller issues a fresh
/// request.
pub struct AgentInviteRegistry {
    inviter: Arc<dyn AgentInviter>,
    slots: Mutex<HashMap<String, Slot>>,
    attempts: AtomicU64,
}

impl AgentInviteRegistry {
    pub fn new(inviter: Arc<dyn AgentInviter>) -> Self {
        Self {
            inviter,
            slots: Mutex::new(HashMap::new()),
            attempts: AtomicU64::new(0),
        }
    }

    /// Ensures the agent has been invited into `call_id`, issuing at most
    /// one outbound request across all concurrent callers.
    pub async fn ensure_invited(
        &self,
        call_id: &str,
        request: JoinInterviewRequest,
    ) -> Result<AgentInvitation, InviteError> {
        // Claim or attach under the lock, before the request future is
        // first polled, so a second caller can never start a second
        // request.
        let (attempt, future) = {
            let mut slots = self.slots.lock();
            match slots.get(call_id) {
                Some(Slot::Ready(invitation)) => {
                    debug!(%call_id, "Agent already invited, returning cached result");
                    return Ok(invitation.clone());
                }
                Some(Slot::InFlight { attempt, future }) => {
                    debug!(%call_id, attempt, "Attaching to in-flight invitation");
                    (*attempt, future.clone())
                }
                None => {
                    let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
                    let inviter = Arc::clone(&self.inviter);
                    let future: InviteFuture =
                        async move { inviter.join_interview(&request).await }
                            .boxed()
                            .shared();
                    slots.insert(
                        call_id.to_string(),
                        Slot::InFlight {
                            attempt,
                            future: future.clone(),
                        },
                    );
                    info!(%call_id, attempt, "Issuing agent invitation request");
                    (attempt, future)
                }
            }
        };

        let result = future.await;

        let mut slots = self.slots.lock();
        match result {
            Ok(features) => {
                let invitation = AgentInvitation {
                    invited: true,
                    features,
                };
                slots.insert(call_id.to_string(), Slot::Ready(invitation.clone()));
                Ok(invitation)
            }
            Err(err) => {
                // Free the slot for a retry, but only if it still belongs
                // to this attempt; a newer attempt must not be evicted by a
                // stale waiter.
                if matches!(
                    slots.get(call_id),
                    Some(Slot::InFlight { attempt: a, .. }) if *a == attempt
                ) {
                    slots.remove(call_id);
                }
                warn!(%call_id, attempt, %err, "Agent invitation failed");
                Err(err)
            }
        }
    }

    /// Whether a successful invitation is cached for this call.
    pub fn is_invited(&self, call_id: &str) -> bool {
        matches!(self.slots.lock().get(call_id), Some(Slot::Ready(_)))
    }
}
