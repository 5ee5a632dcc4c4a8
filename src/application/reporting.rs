//! Reporting over an in-memory snapshot of ledger records.
//!
//! Every function here is pure: it reads the slice it is given, never mutates
//! it and never touches the store. Labels (month names, the unassigned-student
//! label) are not produced here; callers render them from [`MonthKey`] and
//! `Option<String>` student keys.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Cents, LedgerRecordWithStudent, MonthKey, RecordKind, TrailingWindow};

/// Default size of the trailing window, in calendar months.
pub const DEFAULT_WINDOW_MONTHS: u32 = 12;

/// Student grouping key: the resolved display name, or `None` for records
/// whose student could not be resolved.
pub type StudentKey = Option<String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTotals {
    pub month: MonthKey,
    pub income: Cents,
    pub expense: Cents,
}

impl MonthlyTotals {
    fn zero(month: MonthKey) -> Self {
        Self {
            month,
            income: 0,
            expense: 0,
        }
    }

    fn add(&mut self, kind: RecordKind, amount: Cents) {
        match kind {
            RecordKind::Income => self.income = self.income.saturating_add(amount),
            RecordKind::Expense => self.expense = self.expense.saturating_add(amount),
        }
    }

    pub fn net(&self) -> Cents {
        self.income.saturating_sub(self.expense)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentTotal {
    pub student: StudentKey,
    pub total: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentSummary {
    pub student: StudentKey,
    pub income: Cents,
    pub expense: Cents,
    pub balance: Cents,
}

/// A ranked entry of a per-student leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedStudent {
    pub rank: usize,
    pub student: StudentKey,
    pub total: Cents,
    /// Share of the sum over all students, 0-100.
    pub share_of_total: f64,
    /// Size relative to the first-ranked student, 0-100.
    pub relative_to_leader: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedgerOverview {
    pub total_income: Cents,
    pub total_expense: Cents,
    pub balance: Cents,
    pub record_count: usize,
}

/// Monthly income and expense over the trailing window ending at `now`.
///
/// One entry per calendar month of the window, oldest first, including
/// months without records.
pub fn trailing_monthly_totals(
    records: &[LedgerRecordWithStudent],
    now: DateTime<Utc>,
    window_months: u32,
) -> Vec<MonthlyTotals> {
    let window = TrailingWindow::new(now, window_months);
    let mut months: Vec<MonthlyTotals> = window
        .month_keys()
        .into_iter()
        .map(MonthlyTotals::zero)
        .collect();
    let index: HashMap<MonthKey, usize> = months
        .iter()
        .enumerate()
        .map(|(i, m)| (m.month, i))
        .collect();

    for entry in records {
        let record = &entry.record;
        if !window.contains(record.created_at) {
            continue;
        }
        if let Some(&i) = index.get(&MonthKey::of(record.created_at)) {
            months[i].add(record.kind, record.amount_cents);
        }
    }

    months
}

/// Monthly income and expense over every month that has at least one record,
/// in chronological order. Months without records are not listed.
pub fn monthly_history(records: &[LedgerRecordWithStudent]) -> Vec<MonthlyTotals> {
    let mut months: BTreeMap<MonthKey, MonthlyTotals> = BTreeMap::new();

    for entry in records {
        let record = &entry.record;
        let key = MonthKey::of(record.created_at);
        months
            .entry(key)
            .or_insert_with(|| MonthlyTotals::zero(key))
            .add(record.kind, record.amount_cents);
    }

    months.into_values().collect()
}

/// Income per student, highest first. Ties keep first-seen order.
pub fn student_income_totals(records: &[LedgerRecordWithStudent]) -> Vec<StudentTotal> {
    totals_for_kind(records, RecordKind::Income)
}

/// Expense per student, highest first. Ties keep first-seen order.
pub fn student_expense_totals(records: &[LedgerRecordWithStudent]) -> Vec<StudentTotal> {
    totals_for_kind(records, RecordKind::Expense)
}

fn totals_for_kind(records: &[LedgerRecordWithStudent], kind: RecordKind) -> Vec<StudentTotal> {
    let mut totals: Vec<StudentTotal> = Vec::new();
    let mut index: HashMap<StudentKey, usize> = HashMap::new();

    for entry in records.iter().filter(|e| e.record.kind == kind) {
        let key = entry.student_name.clone();
        let i = *index.entry(key.clone()).or_insert_with(|| {
            totals.push(StudentTotal {
                student: key,
                total: 0,
            });
            totals.len() - 1
        });
        totals[i].total = totals[i].total.saturating_add(entry.record.amount_cents);
    }

    // sort_by is stable, so equal totals stay in encounter order
    totals.sort_by(|a, b| b.total.cmp(&a.total));
    totals
}

/// Income, expense and balance per student, sorted by income (highest first).
pub fn student_summaries(records: &[LedgerRecordWithStudent]) -> Vec<StudentSummary> {
    let mut summaries: Vec<StudentSummary> = Vec::new();
    let mut index: HashMap<StudentKey, usize> = HashMap::new();

    for entry in records {
        let key = entry.student_name.clone();
        let i = *index.entry(key.clone()).or_insert_with(|| {
            summaries.push(StudentSummary {
                student: key,
                income: 0,
                expense: 0,
                balance: 0,
            });
            summaries.len() - 1
        });

        let summary = &mut summaries[i];
        let amount = entry.record.amount_cents;
        match entry.record.kind {
            RecordKind::Income => summary.income = summary.income.saturating_add(amount),
            RecordKind::Expense => summary.expense = summary.expense.saturating_add(amount),
        }
        summary.balance = summary.income.saturating_sub(summary.expense);
    }

    summaries.sort_by(|a, b| b.income.cmp(&a.income));
    summaries
}

/// Top `limit` entries of an already sorted per-student total list, with
/// each entry's share of the overall sum and its size relative to the leader.
pub fn rank_students(totals: &[StudentTotal], limit: usize) -> Vec<RankedStudent> {
    let overall = saturating_sum(totals.iter().map(|t| t.total));
    let leader = totals.iter().map(|t| t.total).max().unwrap_or(0);

    totals
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, t)| RankedStudent {
            rank: i + 1,
            student: t.student.clone(),
            total: t.total,
            share_of_total: percentage(t.total, overall),
            relative_to_leader: percentage(t.total, leader),
        })
        .collect()
}

/// Totals over the whole ledger.
pub fn overview(records: &[LedgerRecordWithStudent]) -> LedgerOverview {
    let mut overview = LedgerOverview {
        record_count: records.len(),
        ..Default::default()
    };
    for entry in records {
        let amount = entry.record.amount_cents;
        match entry.record.kind {
            RecordKind::Income => {
                overview.total_income = overview.total_income.saturating_add(amount)
            }
            RecordKind::Expense => {
                overview.total_expense = overview.total_expense.saturating_add(amount)
            }
        }
    }
    overview.balance = overview.total_income.saturating_sub(overview.total_expense);
    overview
}

/// Sum that clamps at `Cents::MAX` instead of overflowing.
pub fn saturating_sum(values: impl IntoIterator<Item = Cents>) -> Cents {
    values.into_iter().fold(0, Cents::saturating_add)
}

/// `value / total * 100`, or 0 when `total` is not positive.
pub fn percentage(value: Cents, total: Cents) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    value as f64 / total as f64 * 100.0
}

/// Income broken down by month and student.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MonthStudentMatrix {
    /// Column order, as requested by the caller.
    pub months: Vec<MonthKey>,
    /// Row order: students with income in any of the months, first seen first.
    pub students: Vec<StudentKey>,
    cells: BTreeMap<MonthKey, HashMap<StudentKey, Cents>>,
}

impl MonthStudentMatrix {
    pub fn cell(&self, month: MonthKey, student: &StudentKey) -> Cents {
        self.cells
            .get(&month)
            .and_then(|row| row.get(student))
            .copied()
            .unwrap_or(0)
    }

    pub fn month_total(&self, month: MonthKey) -> Cents {
        self.cells
            .get(&month)
            .map(|row| saturating_sum(row.values().copied()))
            .unwrap_or(0)
    }

    pub fn student_total(&self, student: &StudentKey) -> Cents {
        saturating_sum(self.months.iter().map(|&m| self.cell(m, student)))
    }

    pub fn grand_total(&self) -> Cents {
        saturating_sum(self.months.iter().map(|&m| self.month_total(m)))
    }

    /// Share of the month's income contributed by `student`, 0-100.
    /// A month with no income yields 0 for every student.
    pub fn cell_percentage(&self, month: MonthKey, student: &StudentKey) -> f64 {
        percentage(self.cell(month, student), self.month_total(month))
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty() || self.students.is_empty()
    }
}

/// Income per `(month, student)` for the given months. Records in other
/// months are ignored.
pub fn month_student_matrix(
    records: &[LedgerRecordWithStudent],
    months: &[MonthKey],
) -> MonthStudentMatrix {
    let mut matrix = MonthStudentMatrix {
        months: months.to_vec(),
        students: Vec::new(),
        cells: months.iter().map(|&m| (m, HashMap::new())).collect(),
    };

    for entry in records.iter().filter(|e| e.record.is_income()) {
        let key = MonthKey::of(entry.record.created_at);
        let Some(row) = matrix.cells.get_mut(&key) else {
            continue;
        };
        let cell = row.entry(entry.student_name.clone()).or_insert(0);
        *cell = cell.saturating_add(entry.record.amount_cents);
        if !matrix.students.contains(&entry.student_name) {
            matrix.students.push(entry.student_name.clone());
        }
    }

    matrix
}

/// The month × student income matrix over the trailing window ending at `now`.
pub fn trailing_month_student_matrix(
    records: &[LedgerRecordWithStudent],
    now: DateTime<Utc>,
    window_months: u32,
) -> MonthStudentMatrix {
    let window = TrailingWindow::new(now, window_months);
    let in_window: Vec<LedgerRecordWithStudent> = records
        .iter()
        .filter(|e| window.contains(e.record.created_at))
        .cloned()
        .collect();
    month_student_matrix(&in_window, &window.month_keys())
}

/// The month × student income matrix over every month with income.
pub fn history_month_student_matrix(records: &[LedgerRecordWithStudent]) -> MonthStudentMatrix {
    let mut months: Vec<MonthKey> = records
        .iter()
        .filter(|e| e.record.is_income())
        .map(|e| MonthKey::of(e.record.created_at))
        .collect();
    months.sort();
    months.dedup();
    month_student_matrix(records, &months)
}
