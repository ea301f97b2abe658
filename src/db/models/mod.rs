//! Data model records for the rollup engine.
//!
//! Plain records with public fields and `new()` constructors, except
//! [`PairVolumeSnapshot`] whose counters are private to protect the
//! monotonic-increase invariant.

mod checkpoint;
mod event;
mod pair;
mod pair_volume_snapshot;
mod token;
mod token_price_snapshot;
mod transaction;

// ============================================
// Re-exports
// ============================================

pub use checkpoint::SyncCheckpoint;
pub use event::{EventId, EventKind, EventPayload, PairEvent, WirePairEvent};
pub use pair::Pair;
pub use pair_volume_snapshot::{PairVolumeSnapshot, SnapshotInterval};
pub use token::Token;
pub use token_price_snapshot::{PriceChanges, TokenPriceSnapshot};
pub use transaction::Transaction;
