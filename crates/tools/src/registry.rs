//! Fixed tool catalog.
//!
//! Tool names, their descriptions and their argument specs all hang off
//! [`ToolName`], so the descriptors handed to the model and the keys the
//! dispatcher validates come from one table.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Number,
    Integer,
    Object,
}

impl ParamKind {
    pub fn json_type(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Number => "number",
            ParamKind::Integer => "integer",
            ParamKind::Object => "object",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: &'static str,
    pub required: bool,
}

impl ParamSpec {
    const fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            required: false,
        }
    }

    const fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            required: true,
        }
    }
}

const DATE_RANGE: &[ParamSpec] = &[
    ParamSpec::optional("startDate", ParamKind::String, "Start date (YYYY-MM-DD)"),
    ParamSpec::optional("endDate", ParamKind::String, "End date (YYYY-MM-DD)"),
];

const MONTH: &[ParamSpec] = &[
    ParamSpec::optional("year", ParamKind::Integer, "Year (default: current year)"),
    ParamSpec::optional("month", ParamKind::Integer, "Month 1-12 (default: current month)"),
];

const AMOUNT: &[ParamSpec] = &[
    ParamSpec::optional("minAmount", ParamKind::Number, "Minimum amount"),
    ParamSpec::optional("maxAmount", ParamKind::Number, "Maximum amount"),
    ParamSpec::optional("exactAmount", ParamKind::Number, "Exact amount"),
];

const RECENT: &[ParamSpec] = &[ParamSpec::optional(
    "limit",
    ParamKind::Integer,
    "Number of transactions to return (default: 10)",
)];

const LIST_RECORDS: &[ParamSpec] = &[
    ParamSpec::required("collection", ParamKind::String, "Collection name, e.g. transactions"),
    ParamSpec::optional("filter", ParamKind::String, "Additional filter expression, e.g. amount > 100"),
    ParamSpec::optional("sort", ParamKind::String, "Sort fields, e.g. -date,amount"),
    ParamSpec::optional("page", ParamKind::Integer, "Page number (default: 1)"),
    ParamSpec::optional("perPage", ParamKind::Integer, "Page size (default: 30)"),
];

const CREATE_RECORD: &[ParamSpec] = &[
    ParamSpec::required("collection", ParamKind::String, "Collection name, e.g. transactions"),
    ParamSpec::required("data", ParamKind::Object, "Field values for the new record"),
];

const UPDATE_RECORD: &[ParamSpec] = &[
    ParamSpec::required("collection", ParamKind::String, "Collection name, e.g. transactions"),
    ParamSpec::required("id", ParamKind::String, "Record id"),
    ParamSpec::required("data", ParamKind::Object, "Fields to change"),
];

const DELETE_RECORD: &[ParamSpec] = &[
    ParamSpec::required("collection", ParamKind::String, "Collection name, e.g. transactions"),
    ParamSpec::required("id", ParamKind::String, "Record id"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    GetUserProfile,
    GetUserAnalytics,
    CalculateSpendingByCategory,
    GetMonthlySummary,
    FindTransactionsByAmount,
    GetRecentTransactions,
    CalculateAverageSpending,
    ListUserRecords,
    CreateUserRecord,
    UpdateUserRecord,
    DeleteUserRecord,
}

impl ToolName {
    /// Every tool, in catalog order.
    pub const ALL: [ToolName; 11] = [
        ToolName::GetUserProfile,
        ToolName::GetUserAnalytics,
        ToolName::CalculateSpendingByCategory,
        ToolName::GetMonthlySummary,
        ToolName::FindTransactionsByAmount,
        ToolName::GetRecentTransactions,
        ToolName::CalculateAverageSpending,
        ToolName::ListUserRecords,
        ToolName::CreateUserRecord,
        ToolName::UpdateUserRecord,
        ToolName::DeleteUserRecord,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::GetUserProfile => "get_user_profile",
            ToolName::GetUserAnalytics => "get_user_analytics",
            ToolName::CalculateSpendingByCategory => "calculate_spending_by_category",
            ToolName::GetMonthlySummary => "get_monthly_summary",
            ToolName::FindTransactionsByAmount => "find_transactions_by_amount",
            ToolName::GetRecentTransactions => "get_recent_transactions",
            ToolName::CalculateAverageSpending => "calculate_average_spending",
            ToolName::ListUserRecords => "list_user_records",
            ToolName::CreateUserRecord => "create_user_record",
            ToolName::UpdateUserRecord => "update_user_record",
            ToolName::DeleteUserRecord => "delete_user_record",
        }
    }

    /// Exact, case-sensitive lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolName::GetUserProfile => "Get the current user profile information",
            ToolName::GetUserAnalytics => {
                "Get comprehensive financial analytics for the current user, including total income, \
                 total expenses, net balance (i.e., total balance or overall financial status), and \
                 category breakdowns."
            }
            ToolName::CalculateSpendingByCategory => {
                "Calculate spending breakdown by category for the current user"
            }
            ToolName::GetMonthlySummary => "Get monthly financial summary for the current user",
            ToolName::FindTransactionsByAmount => "Find transactions by amount range",
            ToolName::GetRecentTransactions => "Get recent transactions for the current user",
            ToolName::CalculateAverageSpending => "Calculate average spending for the current user",
            ToolName::ListUserRecords => {
                "List the current user's records in a collection, optionally filtered and sorted"
            }
            ToolName::CreateUserRecord => "Create a record owned by the current user",
            ToolName::UpdateUserRecord => "Update one of the current user's records",
            ToolName::DeleteUserRecord => "Delete one of the current user's records",
        }
    }

    pub fn params(self) -> &'static [ParamSpec] {
        match self {
            ToolName::GetUserProfile | ToolName::GetUserAnalytics => &[],
            ToolName::CalculateSpendingByCategory | ToolName::CalculateAverageSpending => {
                DATE_RANGE
            }
            ToolName::GetMonthlySummary => MONTH,
            ToolName::FindTransactionsByAmount => AMOUNT,
            ToolName::GetRecentTransactions => RECENT,
            ToolName::ListUserRecords => LIST_RECORDS,
            ToolName::CreateUserRecord => CREATE_RECORD,
            ToolName::UpdateUserRecord => UPDATE_RECORD,
            ToolName::DeleteUserRecord => DELETE_RECORD,
        }
    }

    pub fn descriptor(self) -> ToolDescriptor {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in self.params() {
            properties.insert(
                param.name.to_string(),
                json!({
                    "type": param.kind.json_type(),
                    "description": param.description,
                }),
            );
            if param.required {
                required.push(param.name);
            }
        }

        let mut input_schema = json!({
            "type": "object",
            "properties": properties,
        });
        if !required.is_empty() {
            input_schema["required"] = json!(required);
        }

        ToolDescriptor {
            name: self.as_str(),
            description: self.description(),
            input_schema,
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Self-describing tool entry handed to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// The full catalog in declaration order.
pub fn list_tools() -> Vec<ToolDescriptor> {
    ToolName::ALL.into_iter().map(ToolName::descriptor).collect()
}
