//! API-side authorization guard for commands.
//!
//! This enforces authorization at the command boundary (before dispatch),
//! while keeping domain aggregates and infra auth-agnostic.

use tradebinder_auth::{authorize, AuthzError, CommandAuthorization, Permission, Principal, Role};

use crate::context::ActorContext;

/// Check authorization for a command in the current request context.
///
/// This is intended to be called **before** dispatching a command.
pub fn authorize_command<C: CommandAuthorization>(
    actor: &ActorContext,
    command: &C,
) -> Result<(), AuthzError> {
    let principal = Principal {
        user_id: actor.user_id(),
        roles: actor.roles().to_vec(),
        permissions: permissions_from_roles(actor.roles()),
    };

    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }

    Ok(())
}

/// Role → permission policy.
///
/// Convention: "admin" grants everything; "trader" grants the self-service
/// marketplace surface. Permissions an admin-only route requires (account
/// suspension, sale transitions, ledger reads) are simply absent from the
/// trader set.
fn permissions_from_roles(roles: &[Role]) -> Vec<Permission> {
    if roles.iter().any(|r| r.is_admin()) {
        return vec![Permission::new("*")];
    }

    if roles.iter().any(|r| r.as_str() == "trader") {
        return vec![
            Permission::new("collection.write"),
            Permission::new("listings.write"),
            Permission::new("sales.purchase"),
            Permission::new("sales.rate"),
        ];
    }

    Vec::new()
}
