//! Database module
//!
//! Persistence for accounts, the promo registry and saved content. The
//! Postgres backend lives in `operations`; `memory` gives the same atomicity
//! guarantees in-process.

pub mod memory;
pub mod models;
pub mod operations;
pub mod store;

pub use memory::MemoryStore;
pub use models::{Account, PromoCode, Redemption, SavedContentItem, SubscriptionTier};
pub use operations::DbOperations;
pub use store::{AccountStore, ContentStore, PromoStore, Storage};
