use serde::{Deserialize, Serialize};
use std::fmt;

use crate::order::Order;

/// Kind of delta carried by a change record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Removed => "removed",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single delta attached to a snapshot event.
///
/// `id` and `status` are the values of the affected record after the
/// change. Either may be missing when the remote record lacks the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "estado")]
    pub status: Option<String>,
}

impl ChangeRecord {
    pub fn new(kind: ChangeKind, id: Option<String>, status: Option<String>) -> Self {
        Self { kind, id, status }
    }

    /// Change record describing `order` after a change of `kind`
    pub fn for_order(kind: ChangeKind, order: &Order) -> Self {
        Self {
            kind,
            id: Some(order.id.clone()),
            status: Some(order.status.as_str().to_string()),
        }
    }

    /// Order id carried by the record, treating an empty id as missing
    pub fn order_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Full state of the collection at one point in time, plus the changes
/// since the previous snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEvent {
    pub records: Vec<Order>,
    pub changes: Vec<ChangeRecord>,
}

impl SnapshotEvent {
    pub fn new(records: Vec<Order>, changes: Vec<ChangeRecord>) -> Self {
        Self { records, changes }
    }
}
