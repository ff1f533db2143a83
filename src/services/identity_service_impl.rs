//! `SeaORM` implementation of the `IdentityService` trait.

use async_trait::async_trait;
use std::sync::Arc;

use crate::audit::AuditLog;
use crate::db::Store;
use crate::error::{Error, Result};
use crate::services::identity_service::{IdentityService, NameMatch};

pub struct SeaOrmIdentityService {
    store: Store,
    audit: Arc<AuditLog>,
    /// Name of the chat service this deployment is bound to (e.g. "slack").
    service: String,
}

impl SeaOrmIdentityService {
    #[must_use]
    pub const fn new(store: Store, audit: Arc<AuditLog>, service: String) -> Self {
        Self {
            store,
            audit,
            service,
        }
    }

    /// The admin gate shared by every privileged mutation. Denials are a
    /// plain `false`, never an error, so callers can render a uniform
    /// "not authorized" message.
    async fn passes_admin_gate(&self, acting_user: i64) -> Result<bool> {
        self.is_admin(acting_user).await
    }
}

#[async_trait]
impl IdentityService for SeaOrmIdentityService {
    async fn register_user(&self, name: &str) -> Result<i64> {
        self.audit
            .record_call("register_user", &format!("name={name}"))
            .await;

        let user = self.store.create_user(name).await?;
        Ok(user.id)
    }

    async fn link_service_account(
        &self,
        user_id: i64,
        username: &str,
        service_id: &str,
    ) -> Result<()> {
        self.audit
            .record_call(
                "link_service_account",
                &format!("user={user_id} service_id={service_id}"),
            )
            .await;

        if self.store.get_user(user_id).await?.is_none() {
            return Err(Error::not_found("user", user_id));
        }

        let existing = self
            .store
            .find_service_links(&self.service, service_id)
            .await?;
        if !existing.is_empty() {
            return Err(Error::IntegrityViolation(format!(
                "{} account {service_id} is already linked",
                self.service
            )));
        }

        self.store
            .link_service_account(user_id, username, service_id, &self.service)
            .await?;
        Ok(())
    }

    async fn link_account_by_vm(
        &self,
        vm_id: i64,
        username: &str,
        service_id: &str,
    ) -> Result<()> {
        self.audit
            .record_call(
                "link_account_by_vm",
                &format!("vm={vm_id} service_id={service_id}"),
            )
            .await;

        let vm = self
            .store
            .get_vm(vm_id)
            .await?
            .ok_or_else(|| Error::not_found("VM", vm_id))?;

        self.link_service_account(vm.owner_id, username, service_id)
            .await
    }

    async fn resolve_user(&self, service_id: &str) -> Result<i64> {
        let links = self
            .store
            .find_service_links(&self.service, service_id)
            .await?;

        match links.as_slice() {
            [] => Err(Error::not_found(
                &format!("{} account", self.service),
                service_id,
            )),
            [link] => Ok(link.user_id),
            _ => Err(Error::IntegrityViolation(format!(
                "{} account {service_id} resolves to multiple users",
                self.service
            ))),
        }
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<NameMatch>> {
        let users = self.store.find_users_by_name(name).await?;
        Ok(users
            .into_iter()
            .map(|user| NameMatch {
                name: user.name,
                id: user.id,
            })
            .collect())
    }

    async fn fuzzy_find_by_name(&self, fragment: &str) -> Result<Vec<NameMatch>> {
        let users = self.store.find_users_by_name_fragment(fragment).await?;
        Ok(users
            .into_iter()
            .map(|user| NameMatch {
                name: user.name,
                id: user.id,
            })
            .collect())
    }

    async fn list_users(&self) -> Result<Vec<NameMatch>> {
        let users = self.store.list_active_users().await?;
        Ok(users
            .into_iter()
            .map(|user| NameMatch {
                name: user.name,
                id: user.id,
            })
            .collect())
    }

    async fn is_admin(&self, user_id: i64) -> Result<bool> {
        let user = self.store.get_user(user_id).await?;
        Ok(user.is_some_and(|u| u.works_here && u.is_admin))
    }

    async fn is_admin_by_service_identity(&self, service_id: &str) -> Result<bool> {
        match self.resolve_user(service_id).await {
            Ok(user_id) => self.is_admin(user_id).await,
            Err(Error::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn owns_vm(&self, user_id: i64, vm_id: i64) -> Result<bool> {
        let vm = self.store.get_vm(vm_id).await?;
        Ok(vm.is_some_and(|vm| vm.owner_id == user_id))
    }

    async fn grant_admin(&self, acting_user: i64, target_user: i64) -> Result<bool> {
        self.audit
            .record_call(
                "grant_admin",
                &format!("acting={acting_user} target={target_user}"),
            )
            .await;

        if !self.passes_admin_gate(acting_user).await? {
            return Ok(false);
        }

        let touched = self.store.set_user_admin(target_user, true).await?;
        if touched == 0 {
            return Err(Error::not_found("user", target_user));
        }
        Ok(true)
    }

    async fn deactivate_user(&self, acting_user: i64, target_user: i64) -> Result<bool> {
        self.audit
            .record_call(
                "deactivate_user",
                &format!("acting={acting_user} target={target_user}"),
            )
            .await;

        if !self.passes_admin_gate(acting_user).await? {
            return Ok(false);
        }

        let touched = self.store.set_user_works_here(target_user, false).await?;
        if touched == 0 {
            return Err(Error::not_found("user", target_user));
        }
        Ok(true)
    }

    async fn reactivate_user(&self, acting_user: i64, target_user: i64) -> Result<bool> {
        self.audit
            .record_call(
                "reactivate_user",
                &format!("acting={acting_user} target={target_user}"),
            )
            .await;

        if !self.passes_admin_gate(acting_user).await? {
            return Ok(false);
        }

        let touched = self.store.set_user_works_here(target_user, true).await?;
        if touched == 0 {
            return Err(Error::not_found("user", target_user));
        }
        Ok(true)
    }
}
