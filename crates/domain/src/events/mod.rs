pub mod snapshot_events;

pub use snapshot_events::{ChangeKind, ChangeRecord, SnapshotEvent};
