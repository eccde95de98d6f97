use crate::error::StoreError;
use crate::record::{ListPage, ListQuery, Record};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;

/// Opaque bearer credential forwarded to the store on every call.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// Remote collection store interface.
///
/// Every operation takes the request credential explicitly so a shared store
/// handle never carries one user's session into another user's request.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a single page of records.
    async fn list(
        &self,
        collection: &str,
        query: &ListQuery,
        auth: Option<&AuthToken>,
    ) -> Result<ListPage, StoreError>;

    /// Fetch every record matching `filter`, paging internally.
    async fn full_list(
        &self,
        collection: &str,
        filter: Option<&str>,
        sort: Option<&str>,
        auth: Option<&AuthToken>,
    ) -> Result<Vec<Record>, StoreError>;

    /// Fetch one record by id.
    async fn get_one(
        &self,
        collection: &str,
        id: &str,
        auth: Option<&AuthToken>,
    ) -> Result<Record, StoreError>;

    /// Insert a record and return it as stored.
    async fn create(
        &self,
        collection: &str,
        data: &Map<String, Value>,
        auth: Option<&AuthToken>,
    ) -> Result<Record, StoreError>;

    /// Patch a record and return it as stored.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        data: &Map<String, Value>,
        auth: Option<&AuthToken>,
    ) -> Result<Record, StoreError>;

    /// Remove a record.
    async fn delete(
        &self,
        collection: &str,
        id: &str,
        auth: Option<&AuthToken>,
    ) -> Result<(), StoreError>;
}
