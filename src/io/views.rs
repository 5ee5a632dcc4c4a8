//! Presentation views of report results: month keys become localized labels
//! and unresolved students get the locale's placeholder name.

use serde::{Deserialize, Serialize};

use crate::application::reporting::{
    MonthStudentMatrix, MonthlyTotals, RankedStudent, StudentKey, StudentSummary,
};
use crate::domain::{Cents, Locale, MonthKey};

/// A report payload plus an explicit flag for the "no data" state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportView<T> {
    pub has_data: bool,
    pub data: T,
}

impl<T> ReportView<T> {
    pub fn new(has_data: bool, data: T) -> Self {
        Self { has_data, data }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTotalsView {
    pub label: String,
    pub year: i32,
    pub month: u32,
    pub income: Cents,
    pub expense: Cents,
    pub net: Cents,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedStudentView {
    pub rank: usize,
    pub student: String,
    pub total: Cents,
    pub share_of_total: f64,
    pub relative_to_leader: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentSummaryView {
    pub student: String,
    pub income: Cents,
    pub expense: Cents,
    pub balance: Cents,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixColumn {
    pub label: String,
    pub year: i32,
    pub month: u32,
    pub total: Cents,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixCell {
    pub amount: Cents,
    /// Share of the column's month total, 0-100.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixRow {
    pub student: String,
    pub total: Cents,
    /// One cell per column, in column order.
    pub cells: Vec<MatrixCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixView {
    pub columns: Vec<MatrixColumn>,
    pub rows: Vec<MatrixRow>,
    pub grand_total: Cents,
}

pub fn student_label(student: &StudentKey, locale: Locale) -> String {
    student
        .clone()
        .unwrap_or_else(|| locale.unassigned_label().to_string())
}

pub fn monthly_view(months: &[MonthlyTotals], locale: Locale) -> Vec<MonthlyTotalsView> {
    months
        .iter()
        .map(|m| MonthlyTotalsView {
            label: locale.month_label(m.month),
            year: m.month.year,
            month: m.month.month,
            income: m.income,
            expense: m.expense,
            net: m.net(),
        })
        .collect()
}

pub fn ranked_view(ranked: &[RankedStudent], locale: Locale) -> Vec<RankedStudentView> {
    ranked
        .iter()
        .map(|r| RankedStudentView {
            rank: r.rank,
            student: student_label(&r.student, locale),
            total: r.total,
            share_of_total: r.share_of_total,
            relative_to_leader: r.relative_to_leader,
        })
        .collect()
}

pub fn summary_view(summaries: &[StudentSummary], locale: Locale) -> Vec<StudentSummaryView> {
    summaries
        .iter()
        .map(|s| StudentSummaryView {
            student: student_label(&s.student, locale),
            income: s.income,
            expense: s.expense,
            balance: s.balance,
        })
        .collect()
}

pub fn matrix_view(matrix: &MonthStudentMatrix, locale: Locale) -> MatrixView {
    let columns = matrix
        .months
        .iter()
        .map(|&month: &MonthKey| MatrixColumn {
            label: locale.month_label(month),
            year: month.year,
            month: month.month,
            total: matrix.month_total(month),
        })
        .collect();

    let rows = matrix
        .students
        .iter()
        .map(|student| MatrixRow {
            student: student_label(student, locale),
            total: matrix.student_total(student),
            cells: matrix
                .months
                .iter()
                .map(|&month| MatrixCell {
                    amount: matrix.cell(month, student),
                    percentage: matrix.cell_percentage(month, student),
                })
                .collect(),
        })
        .collect();

    MatrixView {
        columns,
        rows,
        grand_total: matrix.grand_total(),
    }
}
