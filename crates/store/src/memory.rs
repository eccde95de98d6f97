//! In-process record store.
//!
//! Evaluates the same filter language and sort specs as the hosted store and
//! records every call it receives, which makes it the backing store for tests
//! and offline development.

use crate::error::StoreError;
use crate::filter::{self, compare_values};
use crate::record::{ListPage, ListQuery, Record};
use crate::traits::{AuthToken, RecordStore};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use tracing::debug;

/// Operation received by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    List(ListQuery),
    FullList {
        filter: Option<String>,
        sort: Option<String>,
    },
    GetOne(String),
    Create(Map<String, Value>),
    Update(String, Map<String, Value>),
    Delete(String),
}

/// A recorded store call.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreCall {
    pub collection: String,
    pub op: StoreOp,
    /// Credential the call carried, if any.
    pub auth: Option<String>,
}

impl StoreCall {
    pub fn is_write(&self) -> bool {
        matches!(
            self.op,
            StoreOp::Create(_) | StoreOp::Update(..) | StoreOp::Delete(_)
        )
    }

    /// Filter string the call was made with, for read operations.
    pub fn filter(&self) -> Option<&str> {
        match &self.op {
            StoreOp::List(query) => query.filter.as_deref(),
            StoreOp::FullList { filter, .. } => filter.as_deref(),
            _ => None,
        }
    }
}

pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Record>>>,
    calls: Mutex<Vec<StoreCall>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Seed a record without recording a call.
    pub fn insert(&self, collection: &str, record: Record) -> &Self {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(record);
        self
    }

    /// Snapshot of a collection's records in insertion order.
    pub fn records(&self, collection: &str) -> Vec<Record> {
        self.collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record_call(&self, collection: &str, op: StoreOp, auth: Option<&AuthToken>) {
        debug!(collection, ?op, "memory store call");
        self.calls.lock().push(StoreCall {
            collection: collection.to_string(),
            op,
            auth: auth.map(|token| token.as_str().to_string()),
        });
    }

    fn select(
        &self,
        collection: &str,
        filter: Option<&str>,
        sort: Option<&str>,
    ) -> Result<Vec<Record>, StoreError> {
        let expr = match filter.map(str::trim).filter(|f| !f.is_empty()) {
            Some(source) => Some(filter::parse(source)?),
            None => None,
        };
        let sort_keys = parse_sort(sort);

        let mut records: Vec<Record> = self
            .collections
            .read()
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| {
                        expr.as_ref()
                            .map_or(true, |expr| expr.matches(&record.to_value()))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if !sort_keys.is_empty() {
            records.sort_by(|a, b| compare_records(a, b, &sort_keys));
        }
        Ok(records)
    }

    fn generate_id(&self) -> String {
        let n = self.next_id.fetch_add(1, AtomicOrdering::SeqCst);
        format!("mem{:012}", n)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_sort(sort: Option<&str>) -> Vec<(String, bool)> {
    sort.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(|key| match key.strip_prefix('-') {
            Some(field) => (field.to_string(), true),
            None => (key.trim_start_matches('+').to_string(), false),
        })
        .collect()
}

fn compare_records(a: &Record, b: &Record, keys: &[(String, bool)]) -> Ordering {
    let (a, b) = (a.to_value(), b.to_value());
    for (field, descending) in keys {
        let left = a.get(field).unwrap_or(&Value::Null);
        let right = b.get(field).unwrap_or(&Value::Null);
        let ordering = compare_values(left, right).unwrap_or(Ordering::Equal);
        let ordering = if *descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%d %H:%M:%S%.3fZ")
        .to_string()
}

fn not_found(collection: &str, id: &str) -> StoreError {
    StoreError::NotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list(
        &self,
        collection: &str,
        query: &ListQuery,
        auth: Option<&AuthToken>,
    ) -> Result<ListPage, StoreError> {
        self.record_call(collection, StoreOp::List(query.clone()), auth);

        if query.page == 0 || query.per_page == 0 {
            return Err(StoreError::InvalidRequest(
                "page and perPage must be positive".to_string(),
            ));
        }

        let records = self.select(collection, query.filter.as_deref(), query.sort.as_deref())?;
        let total = records.len();
        let per_page = query.per_page as usize;
        let items = records
            .into_iter()
            .skip((query.page as usize - 1) * per_page)
            .take(per_page)
            .collect();

        Ok(ListPage {
            page: query.page,
            per_page: query.per_page,
            total_items: total as i64,
            total_pages: total.div_ceil(per_page) as i64,
            items,
        })
    }

    async fn full_list(
        &self,
        collection: &str,
        filter: Option<&str>,
        sort: Option<&str>,
        auth: Option<&AuthToken>,
    ) -> Result<Vec<Record>, StoreError> {
        self.record_call(
            collection,
            StoreOp::FullList {
                filter: filter.map(str::to_string),
                sort: sort.map(str::to_string),
            },
            auth,
        );
        self.select(collection, filter, sort)
    }

    async fn get_one(
        &self,
        collection: &str,
        id: &str,
        auth: Option<&AuthToken>,
    ) -> Result<Record, StoreError> {
        self.record_call(collection, StoreOp::GetOne(id.to_string()), auth);
        self.collections
            .read()
            .get(collection)
            .and_then(|records| records.iter().find(|record| record.id == id))
            .cloned()
            .ok_or_else(|| not_found(collection, id))
    }

    async fn create(
        &self,
        collection: &str,
        data: &Map<String, Value>,
        auth: Option<&AuthToken>,
    ) -> Result<Record, StoreError> {
        self.record_call(collection, StoreOp::Create(data.clone()), auth);

        let mut fields = data.clone();
        let id = match fields.remove("id") {
            Some(Value::String(id)) if !id.is_empty() => id,
            _ => self.generate_id(),
        };
        let now = timestamp();
        fields.insert("created".to_string(), Value::String(now.clone()));
        fields.insert("updated".to_string(), Value::String(now));

        let mut collections = self.collections.write();
        let records = collections.entry(collection.to_string()).or_default();
        if records.iter().any(|record| record.id == id) {
            return Err(StoreError::Api {
                status: 400,
                message: format!("Record id {} already exists", id),
            });
        }
        let record = Record::new(id, fields);
        records.push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        data: &Map<String, Value>,
        auth: Option<&AuthToken>,
    ) -> Result<Record, StoreError> {
        self.record_call(
            collection,
            StoreOp::Update(id.to_string(), data.clone()),
            auth,
        );

        let mut collections = self.collections.write();
        let record = collections
            .get_mut(collection)
            .and_then(|records| records.iter_mut().find(|record| record.id == id))
            .ok_or_else(|| not_found(collection, id))?;

        for (key, value) in data {
            if key != "id" {
                record.fields.insert(key.clone(), value.clone());
            }
        }
        record
            .fields
            .insert("updated".to_string(), Value::String(timestamp()));
        Ok(record.clone())
    }

    async fn delete(
        &self,
        collection: &str,
        id: &str,
        auth: Option<&AuthToken>,
    ) -> Result<(), StoreError> {
        self.record_call(collection, StoreOp::Delete(id.to_string()), auth);

        let mut collections = self.collections.write();
        let records = collections
            .get_mut(collection)
            .ok_or_else(|| not_found(collection, id))?;
        let index = records
            .iter()
            .position(|record| record.id == id)
            .ok_or_else(|| not_found(collection, id))?;
        records.remove(index);
        Ok(())
    }
}
