//! Untrusted tool calls and their validated, typed form.

use crate::args::Args;
use crate::context::validate_identifier;
use crate::error::ToolError;
use crate::registry::ToolName;
use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_RECENT_LIMIT: u32 = 10;
pub const DEFAULT_PAGE_SIZE: u32 = 30;
/// Largest page the store serves in one request.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Field the date bounds apply to.
pub const DATE_FIELD: &str = "date";

/// Tool call as emitted by the model. Nothing in it is trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Optional closed interval over the transaction date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    fn from_args(args: &Args<'_>) -> Result<Self, ToolError> {
        let start = args
            .string("startDate")?
            .map(|s| parse_date("startDate", &s))
            .transpose()?;
        let end = args
            .string("endDate")?
            .map(|s| parse_date("endDate", &s))
            .transpose()?;

        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(ToolError::Validation(format!(
                    "startDate {} is after endDate {}",
                    start, end
                )));
            }
        }
        Ok(Self { start, end })
    }

    /// Filter clauses for the bounds; the end bound covers the whole end day.
    pub fn clauses(&self) -> Vec<String> {
        let mut clauses = Vec::new();
        if let Some(start) = self.start {
            clauses.push(format!("{} >= \"{}\"", DATE_FIELD, start.format("%Y-%m-%d")));
        }
        if let Some(end) = self.end {
            clauses.push(end_of_day_clause(&end.format("%Y-%m-%d").to_string()));
        }
        clauses
    }

    pub fn label(&self) -> String {
        match (self.start, self.end) {
            (Some(start), Some(end)) => format!("{} to {}", start, end),
            (Some(start), None) => format!("From {}", start),
            (None, Some(end)) => format!("Until {}", end),
            (None, None) => "All time".to_string(),
        }
    }
}

fn end_of_day_clause(day: &str) -> String {
    format!("{} <= \"{} 23:59:59.999Z\"", DATE_FIELD, day)
}

fn parse_date(key: &str, value: &str) -> Result<NaiveDate, ToolError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.date_naive()))
        .map_err(|_| ToolError::Validation(format!("'{}' must be a date (YYYY-MM-DD)", key)))
}

/// Calendar month selected for a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthRange {
    pub year: i32,
    pub month: u32,
}

impl MonthRange {
    /// Bounds run from the 1st to the 31st regardless of month length; the
    /// upper bound may not be a real date but compares above every day of
    /// the month.
    pub fn clauses(&self) -> Vec<String> {
        let prefix = format!("{:04}-{:02}", self.year, self.month);
        vec![
            format!("{} >= \"{}-01\"", DATE_FIELD, prefix),
            end_of_day_clause(&format!("{}-31", prefix)),
        ]
    }
}

/// Amount constraint; exactly one branch applies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AmountFilter {
    Range { min: f64, max: f64 },
    AtLeast(f64),
    AtMost(f64),
    Exactly(f64),
    Any,
}

impl AmountFilter {
    /// Range first, then one-sided bounds, then equality.
    pub fn resolve(min: Option<f64>, max: Option<f64>, exact: Option<f64>) -> Self {
        match (min, max, exact) {
            (Some(min), Some(max), _) => AmountFilter::Range { min, max },
            (Some(min), None, _) => AmountFilter::AtLeast(min),
            (None, Some(max), _) => AmountFilter::AtMost(max),
            (None, None, Some(exact)) => AmountFilter::Exactly(exact),
            (None, None, None) => AmountFilter::Any,
        }
    }

    pub fn clause(&self) -> Option<String> {
        match self {
            AmountFilter::Range { min, max } => {
                Some(format!("amount >= {} && amount <= {}", min, max))
            }
            AmountFilter::AtLeast(min) => Some(format!("amount >= {}", min)),
            AmountFilter::AtMost(max) => Some(format!("amount <= {}", max)),
            AmountFilter::Exactly(exact) => Some(format!("amount = {}", exact)),
            AmountFilter::Any => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListRecords {
    pub collection: String,
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

/// A validated tool call, one variant per catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolRequest {
    GetUserProfile,
    GetUserAnalytics,
    CalculateSpendingByCategory(DateRange),
    GetMonthlySummary(MonthRange),
    FindTransactionsByAmount(AmountFilter),
    GetRecentTransactions { limit: u32 },
    CalculateAverageSpending(DateRange),
    ListUserRecords(ListRecords),
    CreateUserRecord {
        collection: String,
        data: Map<String, Value>,
    },
    UpdateUserRecord {
        collection: String,
        id: String,
        data: Map<String, Value>,
    },
    DeleteUserRecord {
        collection: String,
        id: String,
    },
}

impl ToolRequest {
    /// Validate `arguments` for `tool`. `today` supplies month defaults.
    pub fn parse(
        tool: ToolName,
        arguments: &Map<String, Value>,
        today: NaiveDate,
    ) -> Result<Self, ToolError> {
        let args = Args::new(tool, arguments)?;

        let request = match tool {
            ToolName::GetUserProfile => ToolRequest::GetUserProfile,
            ToolName::GetUserAnalytics => ToolRequest::GetUserAnalytics,
            ToolName::CalculateSpendingByCategory => {
                ToolRequest::CalculateSpendingByCategory(DateRange::from_args(&args)?)
            }
            ToolName::CalculateAverageSpending => {
                ToolRequest::CalculateAverageSpending(DateRange::from_args(&args)?)
            }
            ToolName::GetMonthlySummary => {
                let year = match args.integer("year")? {
                    Some(year) if (1..=9999).contains(&year) => year as i32,
                    Some(_) => return Err(invalid(tool, "'year' must be between 1 and 9999")),
                    None => today.year(),
                };
                let month = match args.integer("month")? {
                    Some(month) if (1..=12).contains(&month) => month as u32,
                    Some(_) => return Err(invalid(tool, "'month' must be between 1 and 12")),
                    None => today.month(),
                };
                ToolRequest::GetMonthlySummary(MonthRange { year, month })
            }
            ToolName::FindTransactionsByAmount => {
                ToolRequest::FindTransactionsByAmount(AmountFilter::resolve(
                    args.number("minAmount")?,
                    args.number("maxAmount")?,
                    args.number("exactAmount")?,
                ))
            }
            ToolName::GetRecentTransactions => ToolRequest::GetRecentTransactions {
                limit: page_size(tool, "limit", args.integer("limit")?, DEFAULT_RECENT_LIMIT)?,
            },
            ToolName::ListUserRecords => {
                let collection = collection_arg(&args)?;
                let sort = args.string("sort")?;
                if let Some(sort) = &sort {
                    validate_sort(sort)?;
                }
                let page = match args.integer("page")? {
                    Some(page) if (1..=i64::from(u32::MAX)).contains(&page) => page as u32,
                    Some(_) => return Err(invalid(tool, "'page' must be at least 1")),
                    None => 1,
                };
                ToolRequest::ListUserRecords(ListRecords {
                    collection,
                    filter: args.string("filter")?,
                    sort,
                    page,
                    per_page: page_size(tool, "perPage", args.integer("perPage")?, DEFAULT_PAGE_SIZE)?,
                })
            }
            ToolName::CreateUserRecord => ToolRequest::CreateUserRecord {
                collection: collection_arg(&args)?,
                data: args.required_object("data")?,
            },
            ToolName::UpdateUserRecord => ToolRequest::UpdateUserRecord {
                collection: collection_arg(&args)?,
                id: id_arg(&args)?,
                data: args.required_object("data")?,
            },
            ToolName::DeleteUserRecord => ToolRequest::DeleteUserRecord {
                collection: collection_arg(&args)?,
                id: id_arg(&args)?,
            },
        };
        Ok(request)
    }
}

fn invalid(tool: ToolName, problem: &str) -> ToolError {
    ToolError::Validation(format!("{}: {}", tool, problem))
}

fn page_size(tool: ToolName, key: &str, value: Option<i64>, default: u32) -> Result<u32, ToolError> {
    match value {
        None => Ok(default),
        Some(n) if (1..=i64::from(MAX_PAGE_SIZE)).contains(&n) => Ok(n as u32),
        Some(_) => Err(invalid(
            tool,
            &format!("'{}' must be between 1 and {}", key, MAX_PAGE_SIZE),
        )),
    }
}

fn collection_arg(args: &Args<'_>) -> Result<String, ToolError> {
    let collection = args.required_string("collection")?;
    validate_identifier("collection", &collection)?;
    Ok(collection)
}

fn id_arg(args: &Args<'_>) -> Result<String, ToolError> {
    let id = args.required_string("id")?;
    validate_identifier("record id", &id)?;
    Ok(id)
}

fn validate_sort(sort: &str) -> Result<(), ToolError> {
    let valid = sort.split(',').all(|key| {
        let field = key.trim().trim_start_matches(['-', '+']);
        !field.is_empty()
            && field
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '@')
    });
    if valid {
        Ok(())
    } else {
        Err(ToolError::Validation(format!("invalid sort: {:?}", sort)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn parse(tool: ToolName, args: Value) -> Result<ToolRequest, ToolError> {
        let call = ToolCall::new(tool.as_str(), args);
        ToolRequest::parse(tool, &call.arguments, today())
    }

    #[test]
    fn test_amount_priority() {
        assert_eq!(
            AmountFilter::resolve(Some(10.0), Some(50.0), Some(999.0)),
            AmountFilter::Range { min: 10.0, max: 50.0 }
        );
        assert_eq!(AmountFilter::resolve(Some(10.0), None, Some(999.0)), AmountFilter::AtLeast(10.0));
        assert_eq!(AmountFilter::resolve(None, Some(50.0), Some(999.0)), AmountFilter::AtMost(50.0));
        assert_eq!(AmountFilter::resolve(None, None, Some(999.0)), AmountFilter::Exactly(999.0));
        assert_eq!(AmountFilter::resolve(None, None, None), AmountFilter::Any);
        assert_eq!(
            AmountFilter::Range { min: 10.0, max: 50.5 }.clause().unwrap(),
            "amount >= 10 && amount <= 50.5"
        );
    }

    #[test]
    fn test_month_defaults_to_today() {
        let request = parse(ToolName::GetMonthlySummary, json!({})).unwrap();
        assert_eq!(request, ToolRequest::GetMonthlySummary(MonthRange { year: 2025, month: 6 }));

        let request = parse(ToolName::GetMonthlySummary, json!({"year": "2024", "month": 2})).unwrap();
        assert_eq!(request, ToolRequest::GetMonthlySummary(MonthRange { year: 2024, month: 2 }));
    }

    #[test]
    fn test_month_bounds_over_include() {
        let clauses = MonthRange { year: 2024, month: 2 }.clauses();
        assert_eq!(clauses[0], r#"date >= "2024-02-01""#);
        assert_eq!(clauses[1], r#"date <= "2024-02-31 23:59:59.999Z""#);
    }

    #[test]
    fn test_month_out_of_range() {
        assert!(parse(ToolName::GetMonthlySummary, json!({"month": 13})).is_err());
        assert!(parse(ToolName::GetMonthlySummary, json!({"month": 0})).is_err());
    }

    #[test]
    fn test_recent_limit_default_and_bounds() {
        assert_eq!(
            parse(ToolName::GetRecentTransactions, json!({})).unwrap(),
            ToolRequest::GetRecentTransactions { limit: 10 }
        );
        assert_eq!(
            parse(ToolName::GetRecentTransactions, json!({"limit": "25"})).unwrap(),
            ToolRequest::GetRecentTransactions { limit: 25 }
        );
        assert!(parse(ToolName::GetRecentTransactions, json!({"limit": 0})).is_err());
        assert!(parse(ToolName::GetRecentTransactions, json!({"limit": 501})).is_err());
    }

    #[test]
    fn test_date_range_parsing() {
        let request = parse(
            ToolName::CalculateAverageSpending,
            json!({"startDate": "2024-01-01", "endDate": "2024-01-31T10:00:00Z"}),
        )
        .unwrap();
        let ToolRequest::CalculateAverageSpending(range) = request else {
            panic!("unexpected request");
        };
        assert_eq!(range.label(), "2024-01-01 to 2024-01-31");
        assert_eq!(
            range.clauses(),
            vec![
                r#"date >= "2024-01-01""#.to_string(),
                r#"date <= "2024-01-31 23:59:59.999Z""#.to_string()
            ]
        );
        assert_eq!(DateRange::default().label(), "All time");
    }

    #[test]
    fn test_date_range_rejects_garbage_and_inversion() {
        assert!(parse(
            ToolName::CalculateSpendingByCategory,
            json!({"startDate": "2024-01-01\" || user != \""})
        )
        .is_err());
        assert!(parse(
            ToolName::CalculateSpendingByCategory,
            json!({"startDate": "2024-02-01", "endDate": "2024-01-01"})
        )
        .is_err());
    }

    #[test]
    fn test_list_records_validation() {
        let request = parse(
            ToolName::ListUserRecords,
            json!({"collection": "transactions", "filter": "amount > 5", "sort": "-date,amount"}),
        )
        .unwrap();
        assert_eq!(
            request,
            ToolRequest::ListUserRecords(ListRecords {
                collection: "transactions".into(),
                filter: Some("amount > 5".into()),
                sort: Some("-date,amount".into()),
                page: 1,
                per_page: DEFAULT_PAGE_SIZE,
            })
        );

        assert!(parse(ToolName::ListUserRecords, json!({"collection": "a/b"})).is_err());
        assert!(parse(ToolName::ListUserRecords, json!({"collection": "t", "sort": "date; drop"})).is_err());
        assert!(parse(ToolName::ListUserRecords, json!({})).is_err());
    }

    #[test]
    fn test_tool_call_deserializes_without_arguments() {
        let call: ToolCall = serde_json::from_value(json!({"name": "get_user_profile"})).unwrap();
        assert!(call.arguments.is_empty());
    }
}
