/// Request-scoped caller identity, passed explicitly into every controller
/// operation. The engine never reads ambient/global state.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Owning organization; every storage read is scoped to it.
    pub tenant_id: String,
    /// User triggering the transition; recorded on history rows.
    pub user_id: String,
}

impl RequestContext {
    pub fn new(tenant_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
        }
    }
}
