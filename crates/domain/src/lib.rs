pub mod errors;
pub mod events;
pub mod order;

pub use errors::DomainError;
pub use events::{ChangeKind, ChangeRecord, SnapshotEvent};
pub use order::{Order, OrderStatus};
