/*!
 * # Authorization
 *
 * The ledger services never look at who is calling. Front ends resolve a
 * [`Principal`] into a [`BranchScope`] through an [`Authorizer`] and hand
 * only the scope to the core.
 */

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::errors::ServiceError;

mod permissions;
mod rbac;

pub use permissions::*;
pub use rbac::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Operator assigned to one branch; `None` means not yet assigned.
    BranchOperator { branch_id: Option<Uuid> },
    GlobalAdmin,
}

impl Role {
    pub fn table_name(&self) -> &'static str {
        match self {
            Role::BranchOperator { .. } => BRANCH_OPERATOR,
            Role::GlobalAdmin => GLOBAL_ADMIN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user: String,
    pub role: Role,
}

impl Principal {
    pub fn operator(user: impl Into<String>, branch_id: Uuid) -> Self {
        Self {
            user: user.into(),
            role: Role::BranchOperator {
                branch_id: Some(branch_id),
            },
        }
    }

    pub fn admin(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            role: Role::GlobalAdmin,
        }
    }
}

/// Branches an operation may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchScope {
    Branch(Uuid),
    All,
}

impl BranchScope {
    /// The one branch a mutating operation must target.
    pub fn single(&self) -> Result<Uuid, ServiceError> {
        match self {
            BranchScope::Branch(id) => Ok(*id),
            BranchScope::All => Err(ServiceError::InvalidInput(
                "this operation needs a specific branch".to_string(),
            )),
        }
    }

    pub fn branch_id(&self) -> Option<Uuid> {
        match self {
            BranchScope::Branch(id) => Some(*id),
            BranchScope::All => None,
        }
    }

    pub fn includes(&self, branch_id: Uuid) -> bool {
        match self {
            BranchScope::Branch(id) => *id == branch_id,
            BranchScope::All => true,
        }
    }
}

pub trait Authorizer: Send + Sync {
    /// Checks `permission` for `principal` and resolves the branch scope the
    /// operation runs under. `requested_branch` is the branch the caller
    /// asked for, if any.
    fn authorize(
        &self,
        principal: &Principal,
        permission: Permission,
        requested_branch: Option<Uuid>,
    ) -> Result<BranchScope, ServiceError>;
}

/// [`Authorizer`] backed by the static role table.
#[derive(Debug, Clone, Default)]
pub struct RoleAuthorizer;

impl RoleAuthorizer {
    pub fn new() -> Self {
        Self
    }
}

impl Authorizer for RoleAuthorizer {
    fn authorize(
        &self,
        principal: &Principal,
        permission: Permission,
        requested_branch: Option<Uuid>,
    ) -> Result<BranchScope, ServiceError> {
        if !role_allows(principal.role.table_name(), permission) {
            warn!(user = %principal.user, permission = %permission, "Permission denied");
            return Err(ServiceError::Forbidden(format!(
                "{} may not {}",
                principal.user, permission
            )));
        }

        match &principal.role {
            Role::GlobalAdmin => Ok(requested_branch
                .map(BranchScope::Branch)
                .unwrap_or(BranchScope::All)),
            Role::BranchOperator { branch_id: None } => {
                warn!(user = %principal.user, "Operator has no branch assigned");
                Err(ServiceError::Forbidden(format!(
                    "{} has no branch assigned",
                    principal.user
                )))
            }
            Role::BranchOperator {
                branch_id: Some(own),
            } => match requested_branch {
                Some(requested) if requested != *own => {
                    warn!(user = %principal.user, branch_id = %requested, "Cross-branch access denied");
                    Err(ServiceError::Forbidden(format!(
                        "{} may only act on branch {}",
                        principal.user, own
                    )))
                }
                _ => Ok(BranchScope::Branch(*own)),
            },
        }
    }
}
