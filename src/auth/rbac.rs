/*!
 * # Role-Based Access Control
 *
 * Static table of what each role may do. Branch scoping is applied on top
 * of this table by [`RoleAuthorizer`](super::RoleAuthorizer).
 */

use lazy_static::lazy_static;
use std::collections::HashMap;
use tracing::warn;

use super::permissions::{check_permission, Permission};

/// Role definition with associated permissions
#[derive(Debug, Clone)]
pub struct RoleDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub permissions: Vec<&'static str>,
}

pub const GLOBAL_ADMIN: &str = "global_admin";
pub const BRANCH_OPERATOR: &str = "branch_operator";

lazy_static! {
    pub static ref ROLES: HashMap<&'static str, RoleDefinition> = {
        let mut roles = HashMap::new();

        roles.insert(
            GLOBAL_ADMIN,
            RoleDefinition {
                name: GLOBAL_ADMIN,
                description: "Administrator with access to every branch",
                permissions: vec!["*"],
            },
        );

        // Operators run the till and the stock room of their own branch.
        // Supplier finance and forecast runs stay with administrators.
        roles.insert(
            BRANCH_OPERATOR,
            RoleDefinition {
                name: BRANCH_OPERATOR,
                description: "Branch operator limited to one branch",
                permissions: vec![
                    "sales:create",
                    "inventory:read",
                    "inventory:adjust",
                    "inventory:transfer",
                    "inventory:ingest",
                    "customers:payments",
                    "reports:read",
                    "shifts:close",
                ],
            },
        );

        roles
    };
}

/// Whether `role_name` is granted `permission`.
pub fn role_allows(role_name: &str, permission: Permission) -> bool {
    match ROLES.get(role_name) {
        Some(role) => role
            .permissions
            .iter()
            .any(|granted| check_permission(granted, permission.as_str())),
        None => {
            warn!("Role not found: {}", role_name);
            false
        }
    }
}
