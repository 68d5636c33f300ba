//! Website ownership lookups used by the access policy

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use pulse_core::{TeamId, UserId, WebsiteId};
use pulse_db::{DbError, DbPool};
use uuid::Uuid;

use crate::query::StoreError;

/// Who owns a website: a user, a team, or both
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebsiteOwnership {
    pub user_id: Option<UserId>,
    pub team_id: Option<TeamId>,
}

#[async_trait]
pub trait WebsiteDirectory: Send + Sync {
    /// `None` when the website does not exist or was deleted
    async fn ownership(&self, website_id: WebsiteId) -> Result<Option<WebsiteOwnership>, StoreError>;

    async fn is_team_member(&self, team_id: TeamId, user_id: UserId) -> Result<bool, StoreError>;
}

#[derive(Default)]
pub struct InMemoryWebsiteDirectory {
    websites: DashMap<WebsiteId, WebsiteOwnership>,
    memberships: DashSet<(TeamId, UserId)>,
}

impl InMemoryWebsiteDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user_website(&self, website_id: WebsiteId, owner: UserId) {
        self.websites.insert(
            website_id,
            WebsiteOwnership {
                user_id: Some(owner),
                team_id: None,
            },
        );
    }

    pub fn add_team_website(&self, website_id: WebsiteId, team_id: TeamId) {
        self.websites.insert(
            website_id,
            WebsiteOwnership {
                user_id: None,
                team_id: Some(team_id),
            },
        );
    }

    pub fn add_team_member(&self, team_id: TeamId, user_id: UserId) {
        self.memberships.insert((team_id, user_id));
    }
}

#[async_trait]
impl WebsiteDirectory for InMemoryWebsiteDirectory {
    async fn ownership(&self, website_id: WebsiteId) -> Result<Option<WebsiteOwnership>, StoreError> {
        Ok(self.websites.get(&website_id).map(|entry| *entry.value()))
    }

    async fn is_team_member(&self, team_id: TeamId, user_id: UserId) -> Result<bool, StoreError> {
        Ok(self.memberships.contains(&(team_id, user_id)))
    }
}

pub struct PgWebsiteDirectory {
    db: DbPool,
}

impl PgWebsiteDirectory {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl WebsiteDirectory for PgWebsiteDirectory {
    async fn ownership(&self, website_id: WebsiteId) -> Result<Option<WebsiteOwnership>, StoreError> {
        let rows = self
            .db
            .query(
                "SELECT user_id, team_id FROM website WHERE website_id = $1 AND deleted_at IS NULL",
                &[&website_id.0],
            )
            .await?;

        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let user_id: Option<Uuid> = row.try_get("user_id").map_err(DbError::from)?;
        let team_id: Option<Uuid> = row.try_get("team_id").map_err(DbError::from)?;

        Ok(Some(WebsiteOwnership {
            user_id: user_id.map(UserId),
            team_id: team_id.map(TeamId),
        }))
    }

    async fn is_team_member(&self, team_id: TeamId, user_id: UserId) -> Result<bool, StoreError> {
        let rows = self
            .db
            .query(
                "SELECT 1 FROM team_user WHERE team_id = $1 AND user_id = $2",
                &[&team_id.0, &user_id.0],
            )
            .await?;

        Ok(!rows.is_empty())
    }
}
