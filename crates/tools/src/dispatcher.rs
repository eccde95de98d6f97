//! Tool dispatcher.
//!
//! Every call is checked in a fixed order: a bound user, a known tool name,
//! then well-typed arguments. Only then is the store touched, and every store
//! read or write goes through the user filter of the bound context.

use crate::context::{SecurityContext, OWNER_FIELD};
use crate::error::{DispatchError, ToolError};
use crate::registry::{list_tools, ToolDescriptor, ToolName};
use crate::request::{AmountFilter, DateRange, ListRecords, MonthRange, ToolCall, ToolRequest};
use crate::response::McpResponse;
use crate::transaction::{
    category_breakdown, Analytics, AverageSpending, MonthlySummary, TransactionType,
};
use chrono::{NaiveDate, Utc};
use quanta_store::{quote, ListQuery, Record, RecordStore};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Transactions returned alongside a monthly summary.
pub const MONTHLY_RECENT: usize = 10;

/// Newest first.
const RECENT_SORT: &str = "-date";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherOptions {
    pub transactions_collection: String,
    pub users_collection: String,
    /// Collections reachable through the generic record tools.
    pub allowed_collections: Vec<String>,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            transactions_collection: "transactions".to_string(),
            users_collection: "users".to_string(),
            allowed_collections: vec!["transactions".to_string()],
        }
    }
}

pub struct ToolDispatcher {
    store: Arc<dyn RecordStore>,
    context: Option<SecurityContext>,
    options: DispatcherOptions,
    today: fn() -> NaiveDate,
}

impl ToolDispatcher {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            context: None,
            options: DispatcherOptions::default(),
            today: utc_today,
        }
    }

    pub fn with_options(mut self, options: DispatcherOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the clock used for month defaults.
    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Bind the user all later calls act for. A rejected id leaves the
    /// dispatcher unbound.
    pub fn set_current_user(
        &mut self,
        user_id: &str,
        auth_token: Option<&str>,
    ) -> Result<(), DispatchError> {
        self.context = None;
        let context = SecurityContext::new(user_id, auth_token)?;
        debug!(user_id = context.user_id(), "bound security context");
        self.context = Some(context);
        Ok(())
    }

    pub fn current_user(&self) -> Option<&str> {
        self.context.as_ref().map(SecurityContext::user_id)
    }

    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        list_tools()
    }

    pub fn build_user_filter(&self, extra: Option<&str>) -> Result<String, DispatchError> {
        Ok(self.context()?.user_filter(extra)?)
    }

    fn context(&self) -> Result<&SecurityContext, ToolError> {
        self.context.as_ref().ok_or(ToolError::Unauthenticated)
    }

    pub async fn execute_tool(&self, call: &ToolCall) -> Result<McpResponse, DispatchError> {
        let result = self.dispatch(call).await;
        if let Err(e) = &result {
            warn!(tool = %call.name, error = %e, "tool call failed");
        }
        result.map_err(DispatchError::from)
    }

    async fn dispatch(&self, call: &ToolCall) -> Result<McpResponse, ToolError> {
        let ctx = self.context()?;
        let tool = ToolName::from_name(&call.name)
            .ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;
        let request = ToolRequest::parse(tool, &call.arguments, (self.today)())?;

        info!(%tool, user_id = ctx.user_id(), "executing tool");

        match request {
            ToolRequest::GetUserProfile => self.user_profile(ctx).await,
            ToolRequest::GetUserAnalytics => {
                let records = self.transactions(ctx, Vec::new()).await?;
                Ok(McpResponse::json(&Analytics::from_records(&records)))
            }
            ToolRequest::CalculateSpendingByCategory(range) => {
                let records = self.expenses(ctx, range).await?;
                Ok(McpResponse::json(&category_breakdown(&records)))
            }
            ToolRequest::GetMonthlySummary(month) => self.monthly_summary(ctx, month).await,
            ToolRequest::FindTransactionsByAmount(amount) => {
                let records = self.transactions(ctx, amount_clauses(amount)).await?;
                Ok(McpResponse::json(&records))
            }
            ToolRequest::GetRecentTransactions { limit } => {
                let query = ListQuery::new(1, limit)
                    .with_filter(ctx.user_filter(None)?)
                    .with_sort(RECENT_SORT);
                let page = self
                    .store
                    .list(&self.options.transactions_collection, &query, ctx.auth_token())
                    .await?;
                Ok(McpResponse::json(&page))
            }
            ToolRequest::CalculateAverageSpending(range) => {
                let records = self.expenses(ctx, range).await?;
                Ok(McpResponse::json(&AverageSpending::from_records(
                    &records,
                    range.label(),
                )))
            }
            ToolRequest::ListUserRecords(list) => self.list_records(ctx, list).await,
            ToolRequest::CreateUserRecord { collection, data } => {
                self.create_record(ctx, &collection, data).await
            }
            ToolRequest::UpdateUserRecord {
                collection,
                id,
                data,
            } => self.update_record(ctx, &collection, &id, data).await,
            ToolRequest::DeleteUserRecord { collection, id } => {
                self.delete_record(ctx, &collection, &id).await
            }
        }
    }

    async fn user_profile(&self, ctx: &SecurityContext) -> Result<McpResponse, ToolError> {
        let user = self
            .store
            .get_one(&self.options.users_collection, ctx.user_id(), ctx.auth_token())
            .await?;
        let username = user.get("username").cloned().unwrap_or(Value::Null);
        Ok(McpResponse::json(&json!({ "username": username })))
    }

    async fn monthly_summary(
        &self,
        ctx: &SecurityContext,
        month: MonthRange,
    ) -> Result<McpResponse, ToolError> {
        let records = self.transactions(ctx, month.clauses()).await?;
        Ok(McpResponse::json(&MonthlySummary::from_records(
            month.year,
            month.month,
            records,
            MONTHLY_RECENT,
        )))
    }

    /// User transactions matching `clauses`, newest first.
    async fn transactions(
        &self,
        ctx: &SecurityContext,
        clauses: Vec<String>,
    ) -> Result<Vec<Record>, ToolError> {
        let extra = (!clauses.is_empty()).then(|| clauses.join(" && "));
        let filter = ctx.user_filter(extra.as_deref())?;
        let records = self
            .store
            .full_list(
                &self.options.transactions_collection,
                Some(&filter),
                Some(RECENT_SORT),
                ctx.auth_token(),
            )
            .await?;
        debug!(count = records.len(), "fetched transactions");
        Ok(records)
    }

    async fn expenses(
        &self,
        ctx: &SecurityContext,
        range: DateRange,
    ) -> Result<Vec<Record>, ToolError> {
        let mut clauses = range.clauses();
        if let Some(clause) = TransactionType::Paid.filter_clause() {
            clauses.push(clause.to_string());
        }
        self.transactions(ctx, clauses).await
    }

    fn check_collection(&self, collection: &str) -> Result<(), ToolError> {
        if self
            .options
            .allowed_collections
            .iter()
            .any(|allowed| allowed == collection)
        {
            Ok(())
        } else {
            Err(ToolError::Validation(format!(
                "collection '{}' is not available",
                collection
            )))
        }
    }

    async fn list_records(
        &self,
        ctx: &SecurityContext,
        list: ListRecords,
    ) -> Result<McpResponse, ToolError> {
        self.check_collection(&list.collection)?;
        let mut query = ListQuery::new(list.page, list.per_page)
            .with_filter(ctx.user_filter(list.filter.as_deref())?);
        if let Some(sort) = list.sort {
            query = query.with_sort(sort);
        }
        let page = self
            .store
            .list(&list.collection, &query, ctx.auth_token())
            .await?;
        Ok(McpResponse::json(&page))
    }

    async fn create_record(
        &self,
        ctx: &SecurityContext,
        collection: &str,
        mut data: Map<String, Value>,
    ) -> Result<McpResponse, ToolError> {
        self.check_collection(collection)?;
        data.insert(OWNER_FIELD.to_string(), json!(ctx.user_id()));
        let record = self.store.create(collection, &data, ctx.auth_token()).await?;
        info!(collection, id = %record.id, "created record");
        Ok(McpResponse::json(&record))
    }

    async fn update_record(
        &self,
        ctx: &SecurityContext,
        collection: &str,
        id: &str,
        mut data: Map<String, Value>,
    ) -> Result<McpResponse, ToolError> {
        self.check_collection(collection)?;
        self.ensure_owned(ctx, collection, id).await?;
        data.remove("id");
        data.insert(OWNER_FIELD.to_string(), json!(ctx.user_id()));
        let record = self
            .store
            .update(collection, id, &data, ctx.auth_token())
            .await?;
        info!(collection, id, "updated record");
        Ok(McpResponse::json(&record))
    }

    async fn delete_record(
        &self,
        ctx: &SecurityContext,
        collection: &str,
        id: &str,
    ) -> Result<McpResponse, ToolError> {
        self.check_collection(collection)?;
        self.ensure_owned(ctx, collection, id).await?;
        self.store.delete(collection, id, ctx.auth_token()).await?;
        info!(collection, id, "deleted record");
        Ok(McpResponse::json(&json!({ "success": true, "id": id })))
    }

    /// Re-fetch `id` through the user filter; absent means missing or owned
    /// by someone else, and the two are not distinguished.
    async fn ensure_owned(
        &self,
        ctx: &SecurityContext,
        collection: &str,
        id: &str,
    ) -> Result<(), ToolError> {
        let by_id = format!("id = {}", quote(id));
        let query = ListQuery::new(1, 1).with_filter(ctx.user_filter(Some(&by_id))?);
        let page = self.store.list(collection, &query, ctx.auth_token()).await?;
        if page.items.is_empty() {
            warn!(collection, id, user_id = ctx.user_id(), "record not owned by user");
            return Err(ToolError::NotFoundOrForbidden {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

fn amount_clauses(amount: AmountFilter) -> Vec<String> {
    amount.clause().into_iter().collect()
}

fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use quanta_store::MemoryStore;

    #[test]
    fn test_build_user_filter_requires_context() {
        let dispatcher = ToolDispatcher::new(Arc::new(MemoryStore::new()));
        let err = dispatcher.build_user_filter(None).unwrap_err();
        assert!(matches!(err.kind(), ToolError::Unauthenticated));
    }

    #[test]
    fn test_rejected_user_unbinds() {
        let mut dispatcher = ToolDispatcher::new(Arc::new(MemoryStore::new()));
        dispatcher.set_current_user("u1", None).unwrap();
        assert_eq!(dispatcher.current_user(), Some("u1"));
        assert!(dispatcher.set_current_user("bad id", None).is_err());
        assert_eq!(dispatcher.current_user(), None);
    }

    #[test]
    fn test_default_options() {
        let options = DispatcherOptions::default();
        assert_eq!(options.transactions_collection, "transactions");
        assert_eq!(options.allowed_collections, vec!["transactions".to_string()]);
    }
}
