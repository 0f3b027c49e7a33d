//! Role based permissions.
//!
//! The table is configured at startup and read-only afterwards; the API
//! consults it to gate admin routes.

use saaskit_core::constants::{ROLE_ADMIN, ROLE_GUEST, ROLE_USER};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "user:read")]
    UserRead,
    #[serde(rename = "user:write")]
    UserWrite,
    #[serde(rename = "user:delete")]
    UserDelete,
    #[serde(rename = "admin:access")]
    AdminAccess,
    #[serde(rename = "subscription:manage")]
    SubscriptionManage,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::UserRead => "user:read",
            Permission::UserWrite => "user:write",
            Permission::UserDelete => "user:delete",
            Permission::AdminAccess => "admin:access",
            Permission::SubscriptionManage => "subscription:manage",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct PermissionsService {
    permissions: HashMap<String, Vec<Permission>>,
}

impl Default for PermissionsService {
    fn default() -> Self {
        use Permission::*;

        let mut permissions = HashMap::new();
        permissions.insert(
            ROLE_ADMIN.to_string(),
            vec![UserRead, UserWrite, UserDelete, AdminAccess, SubscriptionManage],
        );
        permissions.insert(ROLE_USER.to_string(), vec![UserRead, SubscriptionManage]);
        permissions.insert(ROLE_GUEST.to_string(), vec![UserRead]);
        Self { permissions }
    }
}

impl PermissionsService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the default table entirely
    pub fn with_permissions(permissions: HashMap<String, Vec<Permission>>) -> Self {
        Self { permissions }
    }

    /// Unknown roles have no permissions
    pub fn has_permission(&self, role: &str, permission: Permission) -> bool {
        self.permissions
            .get(role)
            .is_some_and(|granted| granted.contains(&permission))
    }

    pub fn role_permissions(&self, role: &str) -> &[Permission] {
        self.permissions
            .get(role)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn add_permission(&mut self, role: &str, permission: Permission) {
        let granted = self.permissions.entry(role.to_string()).or_default();
        if !granted.contains(&permission) {
            granted.push(permission);
        }
    }

    pub fn remove_permission(&mut self, role: &str, permission: Permission) {
        if let Some(granted) = self.permissions.get_mut(role) {
            granted.retain(|p| *p != permission);
        }
    }
}
