use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use intervox_config::AgentServiceSettings;

use crate::Question;
use crate::error::InviteError;

/// Body of `POST /join-interview` on the agent service.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinInterviewRequest {
    pub call_id: String,
    pub questions: Vec<Question>,
    pub candidate_name: String,
    pub job_title: String,
}

/// Capabilities the invited agent reports for this call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentFeatures {
    /// Whether the agent publishes a video avatar track (so the call view
    /// can reserve a tile for it).
    #[serde(default)]
    pub video_avatar_enabled: bool,
}

/// Issues the invitation that brings the interviewer agent into a call.
///
/// A trait seam so the registry and engine are testable without the hosted
/// service.
#[async_trait]
pub trait AgentInviter: Send + Sync + 'static {
    async fn join_interview(
        &self,
        request: &JoinInterviewRequest,
    ) -> Result<AgentFeatures, InviteError>;
}

/// HTTP client for the hosted agent service.
pub struct AgentServiceClient {
    settings: AgentServiceSettings,
    client: reqwest::Client,
}

impl AgentServiceClient {
    pub fn new(settings: AgentServiceSettings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .unwrap_or_default();
        Self { settings, client }
    }
}

#[async_trait]
impl AgentInviter for AgentServiceClient {
    async fn join_interview(
        &self,
        request: &JoinInterviewRequest,
    ) -> Result<AgentFeatures, InviteError> {
        let url = format!("{}/join-interview", self.settings.base_url);
        debug!(%url, call_id = %request.call_id, "Requesting agent invitation");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| InviteError::ServiceUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InviteError::ServiceUnavailable(format!(
                "agent service answered {status}"
            )));
        }

        let features: AgentFeatures = response
            .json()
            .await
            .map_err(|e| InviteError::InvalidResponse(e.to_string()))?;

        info!(
            call_id = %request.call_id,
            video_avatar = features.video_avatar_enabled,
            "Agent invited into call"
        );
        Ok(features)
    }
}
