//! Account aggregate for marketplace oversight (event-sourced).
//!
//! Accounts exist so admins can suspend and reinstate traders. Suspension is
//! enforced at the application layer: a suspended account can browse but
//! cannot list, purchase, or rate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tradebinder_core::{Aggregate, AggregateRoot, DomainError, UserId};
use tradebinder_events::Event;

use crate::Role;

/// Account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AccountStatus {
    /// Account can transact.
    #[default]
    Active,
    /// Account is suspended and cannot list, purchase, or rate.
    Suspended,
}

impl core::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AccountStatus::Active => write!(f, "Active"),
            AccountStatus::Suspended => write!(f, "Suspended"),
        }
    }
}

/// Marketplace account aggregate.
///
/// # Invariants
/// - Suspending an already-suspended account is rejected, as is reinstating
///   an active one.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: UserId,
    pub display_name: String,
    pub roles: Vec<Role>,
    pub status: AccountStatus,
    pub suspension_reason: Option<String>,
    pub version: u64,
    pub created: bool,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            id: UserId::new(),
            display_name: String::new(),
            roles: Vec::new(),
            status: AccountStatus::Active,
            suspension_reason: None,
            version: 0,
            created: false,
        }
    }
}

impl Account {
    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.status == AccountStatus::Suspended
    }
}

impl AggregateRoot for Account {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Command to register a new account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAccount {
    pub account_id: UserId,
    pub display_name: String,
    pub roles: Vec<Role>,
    pub occurred_at: DateTime<Utc>,
}

/// Command to suspend an account (admin only; enforced at the API boundary).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspendAccount {
    pub account_id: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command to reinstate a suspended account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReinstateAccount {
    pub account_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// All account commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AccountCommand {
    Register(RegisterAccount),
    Suspend(SuspendAccount),
    Reinstate(ReinstateAccount),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRegistered {
    pub account_id: UserId,
    pub display_name: String,
    pub roles: Vec<Role>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSuspended {
    pub account_id: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountReinstated {
    pub account_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// All account events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AccountEvent {
    Registered(AccountRegistered),
    Suspended(AccountSuspended),
    Reinstated(AccountReinstated),
}

impl Event for AccountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AccountEvent::Registered(_) => "auth.account.registered",
            AccountEvent::Suspended(_) => "auth.account.suspended",
            AccountEvent::Reinstated(_) => "auth.account.reinstated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AccountEvent::Registered(e) => e.occurred_at,
            AccountEvent::Suspended(e) => e.occurred_at,
            AccountEvent::Reinstated(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for Account {
    type Command = AccountCommand;
    type Event = AccountEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AccountEvent::Registered(e) => self.apply_registered(e),
            AccountEvent::Suspended(e) => self.apply_suspended(e),
            AccountEvent::Reinstated(e) => self.apply_reinstated(e),
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AccountCommand::Register(cmd) => self.handle_register(cmd),
            AccountCommand::Suspend(cmd) => self.handle_suspend(cmd),
            AccountCommand::Reinstate(cmd) => self.handle_reinstate(cmd),
        }
    }
}

impl Account {
    fn handle_register(&self, cmd: &RegisterAccount) -> Result<Vec<AccountEvent>, DomainError> {
        if self.created {
            return Err(DomainError::invariant("account already exists"));
        }
        if cmd.display_name.trim().is_empty() {
            return Err(DomainError::validation("display name cannot be empty"));
        }

        Ok(vec![AccountEvent::Registered(AccountRegistered {
            account_id: cmd.account_id,
            display_name: cmd.display_name.trim().to_string(),
            roles: cmd.roles.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_suspend(&self, cmd: &SuspendAccount) -> Result<Vec<AccountEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }
        if self.status == AccountStatus::Suspended {
            return Err(DomainError::invariant("account already suspended"));
        }

        Ok(vec![AccountEvent::Suspended(AccountSuspended {
            account_id: cmd.account_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reinstate(&self, cmd: &ReinstateAccount) -> Result<Vec<AccountEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }
        if self.status == AccountStatus::Active {
            return Err(DomainError::invariant("account is not suspended"));
        }

        Ok(vec![AccountEvent::Reinstated(AccountReinstated {
            account_id: cmd.account_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn apply_registered(&mut self, e: &AccountRegistered) {
        self.id = e.account_id;
        self.display_name = e.display_name.clone();
        self.roles = e.roles.clone();
        self.status = AccountStatus::Active;
        self.suspension_reason = None;
        self.created = true;
    }

    fn apply_suspended(&mut self, e: &AccountSuspended) {
        self.status = AccountStatus::Suspended;
        self.suspension_reason = Some(e.reason.clone());
    }

    fn apply_reinstated(&mut self, _e: &AccountReinstated) {
        self.status = AccountStatus::Active;
        self.suspension_reason = None;
    }
}
