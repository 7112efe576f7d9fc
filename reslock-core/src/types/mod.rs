mod holder;
mod primitives;

pub use holder::{Holder, SweepReport};
pub use primitives::{ResourceType, Timestamp};
pub(crate) use primitives::identifier;
