use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tradebinder_catalog::{CardId, Grade};
use tradebinder_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId};
use tradebinder_events::Event;

/// Collection entry identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub AggregateId);

impl EntryId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for EntryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: CollectionEntry.
///
/// Logical identity is `(owner, card_id, grade)`; the read model keeps that
/// index over these uuid-identified aggregates. Depletion (quantity 0) is
/// terminal for the aggregate: restored units go to a fresh entry instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionEntry {
    id: EntryId,
    owner: Option<UserId>,
    card_id: Option<CardId>,
    grade: Option<Grade>,
    quantity: i64,
    notes: String,
    version: u64,
    created: bool,
    depleted: bool,
}

impl CollectionEntry {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: EntryId) -> Self {
        Self {
            id,
            owner: None,
            card_id: None,
            grade: None,
            quantity: 0,
            notes: String::new(),
            version: 0,
            created: false,
            depleted: false,
        }
    }

    pub fn id_typed(&self) -> EntryId {
        self.id
    }

    pub fn owner(&self) -> Option<UserId> {
        self.owner
    }

    pub fn card_id(&self) -> Option<&CardId> {
        self.card_id.as_ref()
    }

    pub fn grade(&self) -> Option<Grade> {
        self.grade
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn is_depleted(&self) -> bool {
        self.depleted
    }
}

impl AggregateRoot for CollectionEntry {
    type Id = EntryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: AddEntry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddEntry {
    pub entry_id: EntryId,
    pub owner: UserId,
    pub card_id: CardId,
    pub grade: Grade,
    pub quantity: i64,
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateEntry. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEntry {
    pub entry_id: EntryId,
    pub quantity: Option<i64>,
    pub grade: Option<Grade>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReserveUnits (listing creation takes units out of the entry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveUnits {
    pub entry_id: EntryId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RestoreUnits (listing withdrawal hands units back).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreUnits {
    pub entry_id: EntryId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionCommand {
    AddEntry(AddEntry),
    UpdateEntry(UpdateEntry),
    ReserveUnits(ReserveUnits),
    RestoreUnits(RestoreUnits),
}

/// Event: EntryAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryAdded {
    pub entry_id: EntryId,
    pub owner: UserId,
    pub card_id: CardId,
    pub grade: Grade,
    pub quantity: i64,
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EntryUpdated. Carries only the fields that changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryUpdated {
    pub entry_id: EntryId,
    pub quantity: Option<i64>,
    pub grade: Option<Grade>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UnitsReserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitsReserved {
    pub entry_id: EntryId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UnitsRestored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitsRestored {
    pub entry_id: EntryId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EntryDepleted. Emitted alongside the event that drove quantity to 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDepleted {
    pub entry_id: EntryId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionEvent {
    EntryAdded(EntryAdded),
    EntryUpdated(EntryUpdated),
    UnitsReserved(UnitsReserved),
    UnitsRestored(UnitsRestored),
    EntryDepleted(EntryDepleted),
}

impl Event for CollectionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CollectionEvent::EntryAdded(_) => "collection.entry.added",
            CollectionEvent::EntryUpdated(_) => "collection.entry.updated",
            CollectionEvent::UnitsReserved(_) => "collection.entry.units_reserved",
            CollectionEvent::UnitsRestored(_) => "collection.entry.units_restored",
            CollectionEvent::EntryDepleted(_) => "collection.entry.depleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CollectionEvent::EntryAdded(e) => e.occurred_at,
            CollectionEvent::EntryUpdated(e) => e.occurred_at,
            CollectionEvent::UnitsReserved(e) => e.occurred_at,
            CollectionEvent::UnitsRestored(e) => e.occurred_at,
            CollectionEvent::EntryDepleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for CollectionEntry {
    type Command = CollectionCommand;
    type Event = CollectionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CollectionEvent::EntryAdded(e) => {
                self.id = e.entry_id;
                self.owner = Some(e.owner);
                self.card_id = Some(e.card_id.clone());
                self.grade = Some(e.grade);
                self.quantity = e.quantity;
                self.notes = e.notes.clone();
                self.created = true;
                self.depleted = false;
            }
            CollectionEvent::EntryUpdated(e) => {
                if let Some(quantity) = e.quantity {
                    self.quantity = quantity;
                }
                if let Some(grade) = e.grade {
                    self.grade = Some(grade);
                }
                if let Some(notes) = &e.notes {
                    self.notes = notes.clone();
                }
            }
            CollectionEvent::UnitsReserved(e) => {
                self.quantity -= e.quantity;
            }
            CollectionEvent::UnitsRestored(e) => {
                self.quantity += e.quantity;
            }
            CollectionEvent::EntryDepleted(_) => {
                self.depleted = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CollectionCommand::AddEntry(cmd) => self.handle_add(cmd),
            CollectionCommand::UpdateEntry(cmd) => self.handle_update(cmd),
            CollectionCommand::ReserveUnits(cmd) => self.handle_reserve(cmd),
            CollectionCommand::RestoreUnits(cmd) => self.handle_restore(cmd),
        }
    }
}

impl CollectionEntry {
    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.created || self.depleted {
            return Err(DomainError::NotFound);
        }
        Ok(())
    }

    fn handle_add(&self, cmd: &AddEntry) -> Result<Vec<CollectionEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("entry already exists"));
        }
        if cmd.quantity < 1 {
            return Err(DomainError::validation("quantity must be at least 1"));
        }

        Ok(vec![CollectionEvent::EntryAdded(EntryAdded {
            entry_id: cmd.entry_id,
            owner: cmd.owner,
            card_id: cmd.card_id.clone(),
            grade: cmd.grade,
            quantity: cmd.quantity,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateEntry) -> Result<Vec<CollectionEvent>, DomainError> {
        self.ensure_live()?;

        if let Some(quantity) = cmd.quantity {
            if quantity < 0 {
                return Err(DomainError::validation("quantity cannot be negative"));
            }
        }
        if cmd.quantity.is_none() && cmd.grade.is_none() && cmd.notes.is_none() {
            // Nothing to change: accepted no-op.
            return Ok(vec![]);
        }

        let mut events = vec![CollectionEvent::EntryUpdated(EntryUpdated {
            entry_id: cmd.entry_id,
            quantity: cmd.quantity,
            grade: cmd.grade,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })];

        // Editing quantity down to zero deletes the entry.
        if cmd.quantity == Some(0) {
            events.push(CollectionEvent::EntryDepleted(EntryDepleted {
                entry_id: cmd.entry_id,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_reserve(&self, cmd: &ReserveUnits) -> Result<Vec<CollectionEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }
        if cmd.quantity < 1 {
            return Err(DomainError::validation("quantity must be at least 1"));
        }

        let available = if self.depleted { 0 } else { self.quantity };
        if cmd.quantity > available {
            return Err(DomainError::insufficient_inventory(cmd.quantity, available));
        }

        let mut events = vec![CollectionEvent::UnitsReserved(UnitsReserved {
            entry_id: cmd.entry_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })];

        if cmd.quantity == available {
            events.push(CollectionEvent::EntryDepleted(EntryDepleted {
                entry_id: cmd.entry_id,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_restore(&self, cmd: &RestoreUnits) -> Result<Vec<CollectionEvent>, DomainError> {
        self.ensure_live()?;

        if cmd.quantity < 1 {
            return Err(DomainError::validation("quantity must be at least 1"));
        }

        Ok(vec![CollectionEvent::UnitsRestored(UnitsRestored {
            entry_id: cmd.entry_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }
}
