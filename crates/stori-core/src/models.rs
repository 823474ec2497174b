use std::fmt::Display;

use prettytable::{row, Table};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

/// Scale of every money column in the store.
pub const MONEY_SCALE: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    pub date: Date,
    pub amount: Decimal,
}

impl Transaction {
    pub fn new(date: Date, amount: Decimal) -> Self {
        Self { date, amount }
    }

    pub fn is_debit(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    pub fn is_credit(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Summary {
    pub total_balance: Decimal,
    pub total_transactions: i32,
    pub avg_debit: Decimal,
    pub avg_credit: Decimal,
}

impl Summary {
    /// Aggregates a parsed batch. Debits are negative amounts, credits
    /// positive ones; zero amounts count towards the total only. Sums
    /// saturate at the `Decimal` range so out-of-range input is left for the
    /// store to reject.
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let mut total_balance = Decimal::ZERO;
        let (mut debit_sum, mut debit_count) = (Decimal::ZERO, 0u32);
        let (mut credit_sum, mut credit_count) = (Decimal::ZERO, 0u32);

        for txn in transactions {
            total_balance = total_balance.saturating_add(txn.amount);
            if txn.is_debit() {
                debit_sum = debit_sum.saturating_add(txn.amount);
                debit_count += 1;
            } else if txn.is_credit() {
                credit_sum = credit_sum.saturating_add(txn.amount);
                credit_count += 1;
            }
        }

        Self {
            total_balance,
            total_transactions: i32::try_from(transactions.len()).unwrap_or(i32::MAX),
            avg_debit: average(debit_sum, debit_count),
            avg_credit: average(credit_sum, credit_count),
        }
    }
}

fn average(sum: Decimal, count: u32) -> Decimal {
    if count == 0 {
        return Decimal::ZERO;
    }
    (sum / Decimal::from(count))
        .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

impl Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut table = Table::new();
        table.add_row(row!["Total balance", "Transactions", "Average debit", "Average credit"]);
        table.add_empty_row();
        table.add_row(row![
            self.total_balance,
            self.total_transactions,
            self.avg_debit,
            self.avg_credit
        ]);

        write!(f, "\n{}\n", table)
    }
}

/// A stored summary row together with its server-assigned identity.
///
/// `created_at` is defaulted by the store; it is only absent for rows
/// written with an explicit NULL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRecord {
    pub id: i32,
    pub summary: Summary,
    #[serde(with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}
