//! Caller-side and engine-side bookkeeping for in-flight scrapes
//!
//! The [`RequestCorrelator`] is the only coupling between a waiting caller
//! and the page work that eventually completes its request; the
//! [`ResultStore`] keeps the written result until the caller evicts it.

pub mod correlator;
pub mod result_store;

pub use correlator::{CompletionHandle, RequestCorrelator};
pub use result_store::ResultStore;
