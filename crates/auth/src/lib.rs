//! `tradebinder-auth` — authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage. It owns
//! token claims and validation, the RBAC vocabulary, the pure `authorize`
//! policy check, and the event-sourced `Account` aggregate used for
//! marketplace oversight (suspension/reinstatement).

pub mod account;
pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod roles;

pub use account::{
    Account, AccountCommand, AccountEvent, AccountStatus, RegisterAccount, ReinstateAccount,
    SuspendAccount,
};
pub use authorize::{AuthzError, CommandAuthorization, Principal, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator, mint_hs256};
pub use permissions::Permission;
pub use roles::Role;
