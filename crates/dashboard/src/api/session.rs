use async_trait::async_trait;
use tracing::{info, warn};
use vkpanel_common::StatusSnapshot;

use super::{PanelClient, StatusSource};
use crate::error::ApiError;

/// A client that remembers the admin credentials and logs in again when the
/// panel's session cookie has expired.
#[derive(Clone)]
pub struct PanelSession {
    client: PanelClient,
    credentials: Option<(String, String)>,
}

impl std::fmt::Debug for PanelSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanelSession")
            .field("base_url", &self.client.base_url().as_str())
            .field("username", &self.credentials.as_ref().map(|(user, _)| user))
            .finish_non_exhaustive()
    }
}

impl PanelSession {
    pub fn new(client: PanelClient, credentials: Option<(&str, &str)>) -> Self {
        Self {
            client,
            credentials: credentials.map(|(user, pass)| (user.to_string(), pass.to_string())),
        }
    }

    pub fn client(&self) -> &PanelClient {
        &self.client
    }

    /// Logs in with the stored credentials. Returns `false` when there are none.
    pub async fn login(&self) -> Result<bool, ApiError> {
        let Some((username, password)) = &self.credentials else {
            return Ok(false);
        };
        self.client.login(username, password).await?;
        Ok(true)
    }
}

#[async_trait]
impl StatusSource for PanelSession {
    async fn fetch_status(&self) -> Result<StatusSnapshot, ApiError> {
        match self.client.status().await {
            Err(ApiError::Unauthorized) if self.credentials.is_some() => {
                warn!("Panel session expired, logging in again.");
                self.login().await?;
                info!("Logged in to panel again.");
                self.client.status().await
            }
            other => other,
        }
    }
}
