//! Row types for the six normalized tables.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The normalized tables, in the order sinks receive them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Account,
    Identity,
    Session,
    Event,
    Resource,
    EventResource,
}

impl Table {
    pub const ALL: [Table; 6] = [
        Table::Account,
        Table::Identity,
        Table::Session,
        Table::Event,
        Table::Resource,
        Table::EventResource,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::Account => "Account",
            Table::Identity => "Identity",
            Table::Session => "Session",
            Table::Event => "Event",
            Table::Resource => "Resource",
            Table::EventResource => "EventResource",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One row per distinct account id. Alias, email and phone are synthesized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRow {
    pub account_id: String,
    pub account_alias: String,
    pub email: String,
    pub phone: String,
}

/// One row per distinct caller ARN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRow {
    pub identity_id: String,
    #[serde(rename = "type")]
    pub identity_type: String,
    pub principal_id: String,
    pub arn: String,
    pub user_name: String,
    pub account_id: String,
}

/// One row per distinct `identity_id + "_" + creation_date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRow {
    pub session_id: String,
    pub creation_date: String,
    pub mfa_authenticated: bool,
    /// JSON text of the session issuer and web identity federation data.
    pub additional_info: String,
    pub identity_id: String,
}

/// One row per input record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub event_id: String,
    pub event_time: String,
    pub event_source: String,
    pub event_name: String,
    pub source_ip: String,
    pub user_agent: String,
    pub request_params: String,
    pub response_params: String,
    pub identity_id: String,
    /// Empty when the record carries no session context.
    pub session_id: String,
    pub account_id: String,
}

/// One row per distinct natural resource name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRow {
    pub resource_id: String,
    pub resource_name: String,
    pub resource_type: String,
    pub additional_metadata: String,
}

/// Links an event to a resource. States are only set for EC2 state changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventResourceRow {
    pub event_id: String,
    pub resource_id: String,
    pub pre_state: String,
    pub post_state: String,
}

/// Rows produced by normalizing a single record.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub account: Option<AccountRow>,
    pub identity: Option<IdentityRow>,
    pub session: Option<SessionRow>,
    pub event: EventRow,
    pub resources: Vec<ResourceRow>,
    pub event_resources: Vec<EventResourceRow>,
}

/// Append-only accumulation of all six row-sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tables {
    pub accounts: Vec<AccountRow>,
    pub identities: Vec<IdentityRow>,
    pub sessions: Vec<SessionRow>,
    pub events: Vec<EventRow>,
    pub resources: Vec<ResourceRow>,
    pub event_resources: Vec<EventResourceRow>,
}

impl Tables {
    pub fn absorb(&mut self, rows: Normalized) {
        self.accounts.extend(rows.account);
        self.identities.extend(rows.identity);
        self.sessions.extend(rows.session);
        self.events.push(rows.event);
        self.resources.extend(rows.resources);
        self.event_resources.extend(rows.event_resources);
    }

    pub fn counts(&self) -> TableCounts {
        TableCounts {
            accounts: self.accounts.len(),
            identities: self.identities.len(),
            sessions: self.sessions.len(),
            events: self.events.len(),
            resources: self.resources.len(),
            event_resources: self.event_resources.len(),
        }
    }

    /// Borrowed view of one table's rows.
    pub fn batch(&self, table: Table) -> TableBatch<'_> {
        match table {
            Table::Account => TableBatch::Account(&self.accounts),
            Table::Identity => TableBatch::Identity(&self.identities),
            Table::Session => TableBatch::Session(&self.sessions),
            Table::Event => TableBatch::Event(&self.events),
            Table::Resource => TableBatch::Resource(&self.resources),
            Table::EventResource => TableBatch::EventResource(&self.event_resources),
        }
    }
}

/// Row counts per table, used for progress logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub accounts: usize,
    pub identities: usize,
    pub sessions: usize,
    pub events: usize,
    pub resources: usize,
    pub event_resources: usize,
}

impl TableCounts {
    /// Rows added since `earlier`.
    pub fn since(&self, earlier: &TableCounts) -> TableCounts {
        TableCounts {
            accounts: self.accounts.saturating_sub(earlier.accounts),
            identities: self.identities.saturating_sub(earlier.identities),
            sessions: self.sessions.saturating_sub(earlier.sessions),
            events: self.events.saturating_sub(earlier.events),
            resources: self.resources.saturating_sub(earlier.resources),
            event_resources: self.event_resources.saturating_sub(earlier.event_resources),
        }
    }
}

/// Rows of a single table handed to a sink.
#[derive(Debug, Clone, Copy)]
pub enum TableBatch<'a> {
    Account(&'a [AccountRow]),
    Identity(&'a [IdentityRow]),
    Session(&'a [SessionRow]),
    Event(&'a [EventRow]),
    Resource(&'a [ResourceRow]),
    EventResource(&'a [EventResourceRow]),
}

impl<'a> TableBatch<'a> {
    pub fn table(&self) -> Table {
        match self {
            TableBatch::Account(_) => Table::Account,
            TableBatch::Identity(_) => Table::Identity,
            TableBatch::Session(_) => Table::Session,
            TableBatch::Event(_) => Table::Event,
            TableBatch::Resource(_) => Table::Resource,
            TableBatch::EventResource(_) => Table::EventResource,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TableBatch::Account(rows) => rows.len(),
            TableBatch::Identity(rows) => rows.len(),
            TableBatch::Session(rows) => rows.len(),
            TableBatch::Event(rows) => rows.len(),
            TableBatch::Resource(rows) => rows.len(),
            TableBatch::EventResource(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows `start..end` of the same table.
    pub fn slice(&self, start: usize, end: usize) -> TableBatch<'a> {
        match *self {
            TableBatch::Account(rows) => TableBatch::Account(&rows[start..end]),
            TableBatch::Identity(rows) => TableBatch::Identity(&rows[start..end]),
            TableBatch::Session(rows) => TableBatch::Session(&rows[start..end]),
            TableBatch::Event(rows) => TableBatch::Event(&rows[start..end]),
            TableBatch::Resource(rows) => TableBatch::Resource(&rows[start..end]),
            TableBatch::EventResource(rows) => TableBatch::EventResource(&rows[start..end]),
        }
    }
}
