//! Storage providers for indexer state.
//!
//! Every provider wraps a borrowed [`rusqlite::Connection`]. An open
//! [`rusqlite::Transaction`] dereferences to a connection, so the same provider
//! serves both read views and atomic updates:
//! - L2 blocks and orphan bookkeeping (via [`BlockProvider`])
//! - The finalization status ledger
//! - Tracked and dropped transactions
//! - Height cursors and the validator set
mod block_provider;
pub(crate) use block_provider::BlockProvider;

mod finalization_provider;
pub(crate) use finalization_provider::FinalizationProvider;

mod pending_tx_provider;
pub(crate) use pending_tx_provider::PendingTxProvider;

mod cursor_provider;
pub(crate) use cursor_provider::CursorProvider;

mod validator_provider;
pub(crate) use validator_provider::ValidatorProvider;
