//! Domain service for identity and authorization.
//!
//! Admin eligibility has a single source of truth: the `is_admin` flag on the
//! user row, gated by `works_here`. An admin who leaves the company loses
//! admin rights implicitly.

use serde::Serialize;

use crate::error::Result;

/// A (display name, user id) pair from a name lookup. Names are not unique;
/// callers must handle multiple matches explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameMatch {
    pub name: String,
    pub id: i64,
}

#[async_trait::async_trait]
pub trait IdentityService: Send + Sync {
    /// Creates a user and returns the freshly allocated id.
    async fn register_user(&self, name: &str) -> Result<i64>;

    /// Pairs a service account (external chat identity) to an internal user.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if the user does not exist and
    /// [`crate::Error::IntegrityViolation`] if the (service, id) pair is
    /// already linked.
    async fn link_service_account(
        &self,
        user_id: i64,
        username: &str,
        service_id: &str,
    ) -> Result<()>;

    /// Pairs a service account to whoever currently owns the given VM.
    async fn link_account_by_vm(
        &self,
        vm_id: i64,
        username: &str,
        service_id: &str,
    ) -> Result<()>;

    /// Exact resolution of an external service id to an internal user id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if no link exists, and
    /// [`crate::Error::IntegrityViolation`] if the pair resolves to more
    /// than one user.
    async fn resolve_user(&self, service_id: &str) -> Result<i64>;

    /// Exact case-insensitive name match; may return multiple rows.
    async fn find_by_name(&self, name: &str) -> Result<Vec<NameMatch>>;

    /// Substring match. An empty result signals "need a more specific hint".
    async fn fuzzy_find_by_name(&self, fragment: &str) -> Result<Vec<NameMatch>>;

    /// Active employees ordered by name.
    async fn list_users(&self) -> Result<Vec<NameMatch>>;

    /// True iff the user exists, works here, and carries the admin flag.
    async fn is_admin(&self, user_id: i64) -> Result<bool>;

    /// Resolves the service id first, then delegates to [`Self::is_admin`].
    /// An unlinked service id is simply not an admin.
    async fn is_admin_by_service_identity(&self, service_id: &str) -> Result<bool>;

    /// True iff a VM with that id exists and is owned by the user. False for
    /// any other combination, nonexistent ids included.
    async fn owns_vm(&self, user_id: i64, vm_id: i64) -> Result<bool>;

    /// Escalates the target to admin. Succeeds only if the acting user
    /// passes the admin gate; otherwise returns false without mutating
    /// anything. There is no revocation path through this API.
    async fn grant_admin(&self, acting_user: i64, target_user: i64) -> Result<bool>;

    /// Marks the target as no longer working here. Admin gated; does not
    /// cascade into VM deactivation.
    async fn deactivate_user(&self, acting_user: i64, target_user: i64) -> Result<bool>;

    /// Admin-gated inverse of [`Self::deactivate_user`].
    async fn reactivate_user(&self, acting_user: i64, target_user: i64) -> Result<bool>;
}
