//! Transaction records and the aggregates computed over them.

use quanta_store::Record;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

pub const DEFAULT_CATEGORY: &str = "Uncategorized";

/// Income/expense discriminant stored in the `type` field.
///
/// `Received` and `Paid` are what the application writes; `income` and
/// `expense` are read as aliases for older records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    Received,
    Paid,
    Other,
}

impl TransactionType {
    pub fn of(record: &Record) -> Self {
        match record.str_field("type") {
            Some("Received") | Some("income") => TransactionType::Received,
            Some("Paid") | Some("expense") => TransactionType::Paid,
            _ => TransactionType::Other,
        }
    }

    /// Filter clause matching this type, aliases included.
    pub fn filter_clause(self) -> Option<&'static str> {
        match self {
            TransactionType::Received => Some(r#"(type = "Received" || type = "income")"#),
            TransactionType::Paid => Some(r#"(type = "Paid" || type = "expense")"#),
            TransactionType::Other => None,
        }
    }
}

/// Monetary amount. Integral values serialize as JSON integers.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Amount(pub f64);

impl Amount {
    pub const ZERO: Amount = Amount(0.0);

    /// Amount field of a record; missing or unparseable amounts are zero.
    pub fn of(record: &Record) -> Self {
        let value = match record.get("amount") {
            Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0.0),
            _ => 0.0,
        };
        if value.is_finite() {
            Amount(value)
        } else {
            Amount::ZERO
        }
    }

    pub fn mean(self, count: usize) -> Amount {
        if count == 0 {
            Amount::ZERO
        } else {
            Amount(self.0 / count as f64)
        }
    }
}

impl Add for Amount {
    type Output = Amount;
    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl Sub for Amount {
    type Output = Amount;
    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
        if self.0.fract() == 0.0 && self.0.abs() < MAX_EXACT {
            serializer.serialize_i64(self.0 as i64)
        } else {
            serializer.serialize_f64(self.0)
        }
    }
}

pub fn category_of(record: &Record) -> String {
    record
        .str_field("category")
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CATEGORY)
        .to_string()
}

pub fn total_of(records: &[Record], kind: TransactionType) -> Amount {
    records
        .iter()
        .filter(|record| TransactionType::of(record) == kind)
        .map(Amount::of)
        .sum()
}

pub fn category_breakdown<'a>(records: impl IntoIterator<Item = &'a Record>) -> BTreeMap<String, Amount> {
    let mut breakdown = BTreeMap::new();
    for record in records {
        *breakdown.entry(category_of(record)).or_insert(Amount::ZERO) += Amount::of(record);
    }
    breakdown
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub total_transactions: usize,
    pub total_income: Amount,
    pub total_expenses: Amount,
    pub net_balance: Amount,
    pub category_breakdown: BTreeMap<String, Amount>,
    pub average_transaction_amount: Amount,
}

impl Analytics {
    pub fn from_records(records: &[Record]) -> Self {
        let total_income = total_of(records, TransactionType::Received);
        let total_expenses = total_of(records, TransactionType::Paid);
        let total: Amount = records.iter().map(Amount::of).sum();

        Self {
            total_transactions: records.len(),
            total_income,
            total_expenses,
            net_balance: total_income - total_expenses,
            category_breakdown: category_breakdown(records),
            average_transaction_amount: total.mean(records.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    pub year: i32,
    pub month: u32,
    pub total_transactions: usize,
    pub total_income: Amount,
    pub total_expenses: Amount,
    pub net_savings: Amount,
    pub transactions: Vec<Record>,
}

impl MonthlySummary {
    /// Summarize `records`, which must already be sorted newest first.
    pub fn from_records(year: i32, month: u32, records: Vec<Record>, recent: usize) -> Self {
        let total_income = total_of(&records, TransactionType::Received);
        let total_expenses = total_of(&records, TransactionType::Paid);
        let total_transactions = records.len();
        let transactions = records.into_iter().take(recent).collect();

        Self {
            year,
            month,
            total_transactions,
            total_income,
            total_expenses,
            net_savings: total_income - total_expenses,
            transactions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageSpending {
    pub total_transactions: usize,
    pub total_spending: Amount,
    pub average_spending: Amount,
    pub period: String,
}

impl AverageSpending {
    pub fn from_records(records: &[Record], period: String) -> Self {
        let total_spending: Amount = records.iter().map(Amount::of).sum();
        Self {
            total_transactions: records.len(),
            total_spending,
            average_spending: total_spending.mean(records.len()),
            period,
        }
    }
}
