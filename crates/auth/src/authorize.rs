use std::collections::HashSet;

use thiserror::Error;

use stockledger_core::TenantId;

use crate::{Permission, PrincipalId, TenantMembership};

/// A fully resolved principal for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub principal_id: PrincipalId,
    pub active_tenant_id: TenantId,
    pub membership: TenantMembership,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Implemented by requests that need permissions; checked before they reach the ledger.
pub trait CommandAuthorization {
    fn required_permissions(&self) -> &[Permission];
}

/// Authorize a principal within its active tenant context. Pure policy check.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.active_tenant_id != principal.membership.tenant_id {
        return Err(AuthzError::TenantMismatch);
    }

    let perms: HashSet<&str> = principal
        .membership
        .permissions
        .iter()
        .map(|p| p.as_str())
        .collect();

    if perms.contains("*") || perms.contains(required.as_str()) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Role, permissions_for_roles};

    fn principal(tenant: TenantId, active: TenantId, role: &'static str) -> Principal {
        let roles = vec![Role::new(role)];
        Principal {
            principal_id: PrincipalId::new(),
            active_tenant_id: active,
            membership: TenantMembership {
                tenant_id: tenant,
                permissions: permissions_for_roles(&roles),
                roles,
            },
        }
    }

    #[test]
    fn warehouse_role_may_transfer_but_not_invoice() {
        let t = TenantId::new();
        let p = principal(t, t, "warehouse");
        assert_eq!(authorize(&p, &Permission::STOCK_TRANSFER), Ok(()));
        assert_eq!(
            authorize(&p, &Permission::INVOICES_CREATE),
            Err(AuthzError::Forbidden("invoices.create".to_string()))
        );
    }

    #[test]
    fn wildcard_still_respects_tenant_boundary() {
        let p = principal(TenantId::new(), TenantId::new(), "admin");
        assert_eq!(
            authorize(&p, &Permission::STOCK_ADJUST),
            Err(AuthzError::TenantMismatch)
        );
    }
}
