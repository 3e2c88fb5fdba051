//! Capability checks performed at every service entry point

use shared::{Actor, Capability};

use crate::error::{AppError, AppResult};

/// Decides whether an actor may exercise a capability.
///
/// A denial surfaces as [`AppError::Forbidden`] and is passed to the caller
/// unchanged.
pub trait CapabilityCheck: Send + Sync {
    fn check(&self, actor: &Actor, capability: Capability) -> AppResult<()>;
}

/// Static role table from [`Capability::required_roles`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleCapabilities;

impl CapabilityCheck for RoleCapabilities {
    fn check(&self, actor: &Actor, capability: Capability) -> AppResult<()> {
        if capability.required_roles().contains(&actor.role) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = actor.user_id,
                role = %actor.role,
                ?capability,
                "Capability denied"
            );
            Err(AppError::Forbidden(format!(
                "Role {} is not allowed to perform {:?}",
                actor.role, capability
            )))
        }
    }
}
