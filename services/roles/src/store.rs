// Copyright 2024 WOPR Fleet (wopr.network).
//
// This file is part of the WOPR fleet platform.
// WOPR Fleet is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version (see http://www.gnu.org/licenses).
// WOPR Fleet is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

use dashmap::DashMap;
use fleet_primitives::{TenantId, PLATFORM_TENANT};
use fleet_types::PlatformError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	Member,
	Admin,
	/// Only meaningful on the reserved platform tenant.
	PlatformAdmin,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleGrant {
	pub tenant: TenantId,
	pub user_id: String,
	pub role: Role,
}

#[derive(Default)]
pub struct RoleStore {
	grants: DashMap<(TenantId, String), Role>,
}

impl RoleStore {
	pub fn new() -> Self {
		Self::default()
	}

	fn platform_tenant() -> TenantId {
		TenantId::from(PLATFORM_TENANT)
	}

	pub fn role_of(&self, tenant: &TenantId, user_id: &str) -> Option<Role> {
		self.grants.get(&(tenant.clone(), user_id.to_owned())).map(|r| *r)
	}

	pub fn is_platform_admin(&self, user_id: &str) -> bool {
		self.role_of(&Self::platform_tenant(), user_id) == Some(Role::PlatformAdmin)
	}

	pub fn list(&self, tenant: &TenantId) -> Vec<RoleGrant> {
		let mut grants: Vec<RoleGrant> = self
			.grants
			.iter()
			.filter(|entry| &entry.key().0 == tenant)
			.map(|entry| RoleGrant {
				tenant: entry.key().0.clone(),
				user_id: entry.key().1.clone(),
				role: *entry.value(),
			})
			.collect();
		grants.sort_by(|a, b| a.user_id.cmp(&b.user_id));
		grants
	}

	pub fn platform_admins(&self) -> Vec<String> {
		self.list(&Self::platform_tenant())
			.into_iter()
			.filter(|g| g.role == Role::PlatformAdmin)
			.map(|g| g.user_id)
			.collect()
	}

	/// Grant a role. `granted_by` must be a platform admin for any
	/// `platform_admin` grant; tenant-level roles are open to the
	/// tenant's own admins, which the handler has already checked.
	pub fn grant(
		&self,
		tenant: &TenantId,
		user_id: &str,
		role: Role,
		granted_by: &str,
	) -> Result<(), PlatformError> {
		if role == Role::PlatformAdmin {
			if !tenant.is_platform() {
				return Err(PlatformError::InvalidRequest(
					"platform_admin only exists on the platform tenant".into(),
				));
			}
			if !self.is_platform_admin(granted_by) && !self.platform_admins().is_empty() {
				return Err(PlatformError::Forbidden(
					"only a platform admin may grant platform_admin".into(),
				));
			}
		}
		self.grants.insert((tenant.clone(), user_id.to_owned()), role);
		Ok(())
	}

	/// Revoke a grant. Removing the last platform admin would lock
	/// everyone out and is a conflict.
	pub fn revoke(&self, tenant: &TenantId, user_id: &str) -> Result<(), PlatformError> {
		let key = (tenant.clone(), user_id.to_owned());
		let role = self
			.grants
			.get(&key)
			.map(|r| *r)
			.ok_or_else(|| PlatformError::NotFound("role grant".into()))?;

		if role == Role::PlatformAdmin && self.platform_admins().len() <= 1 {
			return Err(PlatformError::Conflict(
				"cannot remove the last platform admin".into(),
			));
		}

		self.grants.remove(&key);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn first_platform_admin_can_bootstrap() {
		let store = RoleStore::new();
		let platform = TenantId::from(PLATFORM_TENANT);

		// No admins yet: bootstrap is allowed.
		store.grant(&platform, "root", Role::PlatformAdmin, "root").unwrap();
		assert!(store.is_platform_admin("root"));

		// From now on only platform admins may grant it.
		let err = store
			.grant(&platform, "mallory", Role::PlatformAdmin, "mallory")
			.unwrap_err();
		assert!(matches!(err, PlatformError::Forbidden(_)));

		store.grant(&platform, "alice", Role::PlatformAdmin, "root").unwrap();
		assert_eq!(store.platform_admins().len(), 2);
	}

	#[test]
	fn last_platform_admin_cannot_be_removed() {
		let store = RoleStore::new();
		let platform = TenantId::from(PLATFORM_TENANT);
		store.grant(&platform, "root", Role::PlatformAdmin, "root").unwrap();

		let err = store.revoke(&platform, "root").unwrap_err();
		assert!(matches!(err, PlatformError::Conflict(_)));

		store.grant(&platform, "alice", Role::PlatformAdmin, "root").unwrap();
		store.revoke(&platform, "root").unwrap();
		assert_eq!(store.platform_admins(), vec!["alice".to_owned()]);
	}

	#[test]
	fn platform_admin_is_platform_tenant_only() {
		let store = RoleStore::new();
		let err = store
			.grant(&TenantId::from("acme"), "bob", Role::PlatformAdmin, "root")
			.unwrap_err();
		assert!(matches!(err, PlatformError::InvalidRequest(_)));
	}

	#[test]
	fn tenant_roles_are_scoped() {
		let store = RoleStore::new();
		let acme = TenantId::from("acme");
		store.grant(&acme, "bob", Role::Admin, "bob").unwrap();
		store.grant(&acme, "carol", Role::Member, "bob").unwrap();

		assert_eq!(store.list(&acme).len(), 2);
		assert_eq!(store.role_of(&acme, "bob"), Some(Role::Admin));
		assert_eq!(store.role_of(&TenantId::from("globex"), "bob"), None);

		store.revoke(&acme, "carol").unwrap();
		assert_eq!(store.list(&acme).len(), 1);
	}
}
