//! Access Control Gate
//!
//! Resolves the caller and decides whether it may read a website's event data.

mod directory;
mod identity;
mod policy;

pub use directory::{InMemoryWebsiteDirectory, PgWebsiteDirectory, WebsiteDirectory, WebsiteOwnership};
pub use identity::{AuthenticatedUser, Identity, IdentityResolver, SHARE_TOKEN_HEADER};
pub use policy::{AuthorizationService, WebsiteAccessPolicy};
