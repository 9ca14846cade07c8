//! Authorization resolution for winner-subsystem operations
//!
//! Engines never query membership or curator tables themselves; they
//! consume a resolved [`Capability`] produced here from two read-only
//! lookups: organization role by membership, and the per-bounty curator
//! grant.

use tracing::debug;

use crate::error::ApiError;
use crate::models::{Bounty, BountyStatus, OrgRole};
use crate::storage::MarketStore;

/// The caller's resolved standing with respect to one bounty.
#[derive(Debug, Clone, Copy)]
pub struct Capability {
    pub role: Option<OrgRole>,
    pub curator: bool,
}

impl Capability {
    /// Owners and admins manage winners on any bounty in their
    /// organization. A curator holds the same winner-management rights for
    /// the bounty they curate, except that financial fields of a CLOSED
    /// bounty are off-limits to curators.
    pub fn can_manage_winners(&self, bounty_status: BountyStatus) -> bool {
        match self.role {
            Some(OrgRole::Owner) | Some(OrgRole::Admin) => true,
            _ => self.curator && bounty_status != BountyStatus::Closed,
        }
    }
}

/// Resolve the caller's capability for a bounty. A caller with neither a
/// membership in the owning organization nor a curator grant is treated as
/// unauthenticated toward it.
pub fn resolve(
    store: &MarketStore,
    user_id: &str,
    bounty: &Bounty,
) -> Result<Capability, ApiError> {
    let role = store.membership_role(user_id, &bounty.org_id)?;
    let curator = store.is_curator(user_id, &bounty.id)?;

    if role.is_none() && !curator {
        debug!(
            "User {} has no membership in org {} and no curator grant for bounty {}",
            user_id, bounty.org_id, bounty.id
        );
        return Err(ApiError::Unauthenticated);
    }

    Ok(Capability { role, curator })
}

/// Resolve and gate in one step; the common path for all three endpoints.
pub fn require_winner_access(
    store: &MarketStore,
    user_id: &str,
    bounty: &Bounty,
) -> Result<Capability, ApiError> {
    let capability = resolve(store, user_id, bounty)?;
    if !capability.can_manage_winners(bounty.status) {
        return Err(ApiError::Forbidden(
            "Insufficient permissions to manage winners for this bounty".to_string(),
        ));
    }
    Ok(capability)
}
