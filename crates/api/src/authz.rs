//! API-side authorization guard for ledger requests.
//!
//! Enforced at the request boundary, before anything reaches the ledger, so the
//! ledger and storage layers stay auth-agnostic.

use stockledger_auth::{
    AuthzError, CommandAuthorization, Permission, Principal, TenantMembership, authorize,
    permissions_for_roles,
};

use crate::context::{PrincipalContext, TenantContext};

/// Check authorization for a request in the current context.
pub fn authorize_command<C: CommandAuthorization>(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    let membership = TenantMembership {
        tenant_id: tenant.tenant_id(),
        roles: principal.roles().to_vec(),
        permissions: permissions_for_roles(principal.roles()),
    };

    let principal = Principal {
        principal_id: principal.principal_id(),
        active_tenant_id: tenant.tenant_id(),
        membership,
    };

    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }

    Ok(())
}

/// A request that needs exactly one permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requires(pub Permission);

impl CommandAuthorization for Requires {
    fn required_permissions(&self) -> &[Permission] {
        std::slice::from_ref(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_auth::{PrincipalId, Role};
    use stockledger_core::TenantId;

    fn principal(role: &'static str) -> PrincipalContext {
        PrincipalContext::new(PrincipalId::new(), vec![Role::new(role)])
    }

    #[test]
    fn admin_passes_every_check() {
        let tenant = TenantContext::new(TenantId::new());
        let cmd = Requires(Permission::WAREHOUSES_MANAGE);
        assert!(authorize_command(&tenant, &principal("admin"), &cmd).is_ok());
    }

    #[test]
    fn viewer_is_forbidden() {
        let tenant = TenantContext::new(TenantId::new());
        let cmd = Requires(Permission::STOCK_ADJUST);
        assert_eq!(
            authorize_command(&tenant, &principal("viewer"), &cmd),
            Err(AuthzError::Forbidden("stock.adjust".to_string()))
        );
    }
}
