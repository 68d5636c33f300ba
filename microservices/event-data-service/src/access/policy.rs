//! Website visibility policy

use async_trait::async_trait;
use pulse_core::WebsiteId;
use std::sync::Arc;

use super::directory::WebsiteDirectory;
use super::identity::Identity;
use crate::query::StoreError;

/// Answers `can_view(identity, website)`. Must not have side effects.
#[async_trait]
pub trait AuthorizationService: Send + Sync {
    async fn can_view(&self, identity: &Identity, website_id: WebsiteId) -> Result<bool, StoreError>;
}

/// Admins see everything; owners and owning-team members see their websites;
/// a share token sees exactly the website it was issued for.
#[derive(Clone)]
pub struct WebsiteAccessPolicy {
    directory: Arc<dyn WebsiteDirectory>,
}

impl WebsiteAccessPolicy {
    pub fn new(directory: Arc<dyn WebsiteDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl AuthorizationService for WebsiteAccessPolicy {
    async fn can_view(&self, identity: &Identity, website_id: WebsiteId) -> Result<bool, StoreError> {
        if identity.share == Some(website_id) {
            return Ok(true);
        }

        let Some(user) = identity.user else {
            return Ok(false);
        };

        if user.is_admin {
            return Ok(true);
        }

        let Some(ownership) = self.directory.ownership(website_id).await? else {
            return Ok(false);
        };

        if ownership.user_id == Some(user.user_id) {
            return Ok(true);
        }

        match ownership.team_id {
            Some(team_id) => self.directory.is_team_member(team_id, user.user_id).await,
            None => Ok(false),
        }
    }
}
