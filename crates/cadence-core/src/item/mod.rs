//! Item module - Study items and their scheduling state
//!
//! - [`StudyItem`]: persisted record with a typed, optional [`MemoryState`](crate::MemoryState)
//! - [`NewItem`]: creation input
//! - [`legacy`]: import of the older answer-bag format

mod card;
pub mod legacy;

pub use card::{NewItem, StudyItem};
pub use legacy::{LegacyStateError, LegacyTerm, LEGACY_STATE_KEY};
