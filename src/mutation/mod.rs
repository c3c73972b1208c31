//! Optimistic writes: patch cached views before the store answers, then
//! confirm with the server row or roll back.

pub mod patch;
pub mod reconciler;
pub mod transaction;

pub use patch::{CacheTarget, MutationIntent, Patch};
pub use reconciler::Reconciler;
pub use transaction::{MutationTransaction, TransactionState};
