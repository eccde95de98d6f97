//! Record store access for Quanta.
//!
//! Wraps the hosted PocketBase collections behind the [`RecordStore`] trait and
//! provides the filter-expression language used to scope every query.

pub mod error;
pub mod filter;
pub mod memory;
pub mod pocketbase;
pub mod record;
pub mod traits;

pub use error::StoreError;
pub use filter::{quote, Expr, FilterError};
pub use memory::{MemoryStore, StoreCall, StoreOp};
pub use pocketbase::PocketBaseStore;
pub use record::{ListPage, ListQuery, Record};
pub use traits::{AuthToken, RecordStore};
