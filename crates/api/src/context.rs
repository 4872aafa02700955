use stockledger_auth::{PrincipalId, Role};
use stockledger_core::TenantId;
use stockledger_infra::LedgerContext;

/// Tenant context for a request.
///
/// This is immutable and must be present for all ledger routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Principal context for a request (authenticated identity + roles).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: PrincipalId,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(principal_id: PrincipalId, roles: Vec<Role>) -> Self {
        Self { principal_id, roles }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}

/// The ledger's view of a request: the tenant, with the principal as acting user.
pub fn ledger_context(tenant: &TenantContext, principal: &PrincipalContext) -> LedgerContext {
    LedgerContext::new(tenant.tenant_id(), Some(principal.principal_id().into()))
}
