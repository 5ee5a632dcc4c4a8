use std::io::Write;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::application::SchoolService;
use crate::application::reporting::{self, DEFAULT_WINDOW_MONTHS};
use crate::config::{self, DEFAULT_BIND, ServerConfig};
use crate::domain::{Cents, Locale, format_cents};
use crate::io::views::{
    MatrixView, MonthlyTotalsView, RankedStudentView, StudentSummaryView, matrix_view,
    monthly_view, ranked_view, summary_view,
};
use crate::io::rest::report_apis::window_months;
use crate::io::{AppState, create_router};

/// Bursar - School Finance Administration
#[derive(Parser)]
#[command(name = "bursar")]
#[command(about = "Students, income/expense records and reports for a small school")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, global = true, env = "BURSAR_DATABASE", default_value = config::DEFAULT_DATABASE)]
    pub database: String,

    /// Log filter (overridden by RUST_LOG)
    #[arg(long, global = true, env = "BURSAR_LOG", default_value = config::DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    /// Language for month names and the unassigned-student label (es, en)
    #[arg(long, global = true, env = "BURSAR_LOCALE", default_value = "es", value_parser = config::parse_locale)]
    pub locale: Locale,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Serve the HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, env = "BURSAR_BIND", default_value = DEFAULT_BIND)]
        bind: String,

        /// Origin allowed to call the API from a browser (enables CORS)
        #[arg(long, env = "BURSAR_ALLOW_ORIGIN")]
        allow_origin: Option<String>,
    },

    /// Reporting commands
    #[command(subcommand)]
    Report(ReportCommands),

    /// Export data to CSV
    Export {
        /// What to export: records, students
        #[arg(value_name = "TYPE")]
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Income and expense per month over the trailing window
    Monthly {
        /// Number of months, including the current one
        #[arg(short, long, default_value_t = DEFAULT_WINDOW_MONTHS)]
        window: u32,

        /// Output format: table, json, csv
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Income and expense for every month with records
    History {
        /// Output format: table, json, csv
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Per-student totals
    Students {
        /// income, expense or combined
        #[arg(short, long, default_value = "income")]
        kind: String,

        /// Show only the first N students
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format: table, json, csv
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Income by month and student
    Matrix {
        /// Use every month with records instead of the trailing window
        #[arg(long)]
        history: bool,

        /// Number of months, including the current one
        #[arg(short, long, default_value_t = DEFAULT_WINDOW_MONTHS)]
        window: u32,

        /// Output format: table, json, csv
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        config::init_tracing(&self.log_level);

        match self.command {
            Commands::Init => {
                SchoolService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Serve { bind, allow_origin } => {
                let config = ServerConfig {
                    database: self.database,
                    bind,
                    allow_origin,
                    locale: self.locale,
                };
                serve(config).await?;
            }

            Commands::Report(report_cmd) => {
                let service = SchoolService::connect(&self.database).await?;
                let mut out = std::io::stdout().lock();
                run_report_command(&service, report_cmd, self.locale, &mut out).await?;
            }

            Commands::Export {
                export_type,
                output,
            } => {
                let service = SchoolService::connect(&self.database).await?;
                run_export_command(&service, &export_type, output.as_deref(), self.locale)
                    .await?;
            }
        }

        Ok(())
    }
}

/// Run the HTTP API until Ctrl-C.
pub async fn serve(config: ServerConfig) -> Result<()> {
    let addr = config.bind_addr()?;
    let service = SchoolService::init(&config.database).await?;
    let router = create_router(
        AppState::new(service, config.locale),
        config.allow_origin_header()?,
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, database = %config.database, locale = %config.locale, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn run_export_command(
    service: &SchoolService,
    export_type: &str,
    output: Option<&str>,
    locale: Locale,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::stdout;

    let exporter = Exporter::new(service, locale);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "records" => {
            let count = exporter.export_records_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} records", count);
            }
        }
        "students" => {
            let count = exporter.export_students_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} students", count);
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: records, students",
                export_type
            );
        }
    }

    Ok(())
}

pub async fn run_report_command<W: Write>(
    service: &SchoolService,
    cmd: ReportCommands,
    locale: Locale,
    out: &mut W,
) -> Result<()> {
    let records = service.report_snapshot().await?;
    let now = Utc::now();

    match cmd {
        ReportCommands::Monthly { window, format } => {
            let window = window_months(Some(window))?;
            let totals = reporting::trailing_monthly_totals(&records, now, window);
            let has_data = totals.iter().any(|m| m.income != 0 || m.expense != 0);
            let title = format!("Monthly Report (last {} months)", window);
            write_monthly(out, &title, has_data, &monthly_view(&totals, locale), &format)?;
        }

        ReportCommands::History { format } => {
            let history = reporting::monthly_history(&records);
            write_monthly(
                out,
                "Monthly History",
                !history.is_empty(),
                &monthly_view(&history, locale),
                &format,
            )?;
        }

        ReportCommands::Students {
            kind,
            limit,
            format,
        } => {
            let limit = limit.unwrap_or(usize::MAX);
            match kind.as_str() {
                "income" | "expense" => {
                    let totals = if kind == "income" {
                        reporting::student_income_totals(&records)
                    } else {
                        reporting::student_expense_totals(&records)
                    };
                    let ranked = reporting::rank_students(&totals, limit);
                    write_ranking(out, &kind, &ranked_view(&ranked, locale), &format)?;
                }
                "combined" => {
                    let mut summaries = reporting::student_summaries(&records);
                    summaries.truncate(limit);
                    write_summaries(out, &summary_view(&summaries, locale), &format)?;
                }
                _ => {
                    anyhow::bail!(
                        "Invalid kind '{}'. Valid kinds: income, expense, combined",
                        kind
                    );
                }
            }
        }

        ReportCommands::Matrix {
            history,
            window,
            format,
        } => {
            let matrix = if history {
                reporting::history_month_student_matrix(&records)
            } else {
                let window = window_months(Some(window))?;
                reporting::trailing_month_student_matrix(&records, now, window)
            };
            write_matrix(out, !matrix.is_empty(), &matrix_view(&matrix, locale), &format)?;
        }
    }

    Ok(())
}

const NO_DATA: &str = "No data available";

fn write_monthly<W: Write>(
    out: &mut W,
    title: &str,
    has_data: bool,
    months: &[MonthlyTotalsView],
    format: &str,
) -> Result<()> {
    match format {
        "json" => {
            writeln!(out, "{}", serde_json::to_string_pretty(months)?)?;
        }
        "csv" => {
            let mut writer = csv::Writer::from_writer(&mut *out);
            writer.write_record(["month", "year", "income", "expense", "net"])?;
            for m in months {
                writer.write_record([
                    m.month.to_string(),
                    m.year.to_string(),
                    m.income.to_string(),
                    m.expense.to_string(),
                    m.net.to_string(),
                ])?;
            }
            writer.flush()?;
        }
        _ => {
            writeln!(out, "{}", title)?;
            writeln!(out)?;
            if !has_data {
                writeln!(out, "{}", NO_DATA)?;
                return Ok(());
            }
            writeln!(
                out,
                "{:<12} {:>12} {:>12} {:>12}",
                "MONTH", "INCOME", "EXPENSE", "NET"
            )?;
            writeln!(out, "{}", "-".repeat(51))?;

            let (mut income, mut expense): (Cents, Cents) = (0, 0);
            for m in months {
                writeln!(
                    out,
                    "{:<12} {:>12} {:>12} {:>12}",
                    m.label,
                    format_cents(m.income),
                    format_cents(m.expense),
                    format_cents(m.net)
                )?;
                income = Cents::saturating_add(income, m.income);
                expense = Cents::saturating_add(expense, m.expense);
            }

            writeln!(out, "{}", "-".repeat(51))?;
            writeln!(
                out,
                "{:<12} {:>12} {:>12} {:>12}",
                "TOTAL",
                format_cents(income),
                format_cents(expense),
                format_cents(income.saturating_sub(expense))
            )?;
        }
    }
    Ok(())
}

fn write_ranking<W: Write>(
    out: &mut W,
    kind: &str,
    ranked: &[RankedStudentView],
    format: &str,
) -> Result<()> {
    match format {
        "json" => {
            writeln!(out, "{}", serde_json::to_string_pretty(ranked)?)?;
        }
        "csv" => {
            let mut writer = csv::Writer::from_writer(&mut *out);
            writer.write_record(["rank", "student", "total", "share_of_total", "relative_to_leader"])?;
            for r in ranked {
                writer.write_record([
                    r.rank.to_string(),
                    r.student.clone(),
                    r.total.to_string(),
                    format!("{:.2}", r.share_of_total),
                    format!("{:.2}", r.relative_to_leader),
                ])?;
            }
            writer.flush()?;
        }
        _ => {
            writeln!(out, "Student {} Ranking", capitalize(kind))?;
            writeln!(out)?;
            if ranked.is_empty() {
                writeln!(out, "{}", NO_DATA)?;
                return Ok(());
            }
            writeln!(
                out,
                "{:>4} {:<25} {:>12} {:>8}",
                "#", "STUDENT", "TOTAL", "SHARE"
            )?;
            writeln!(out, "{}", "-".repeat(52))?;
            for r in ranked {
                writeln!(
                    out,
                    "{:>4} {:<25} {:>12} {:>7.1}%",
                    r.rank,
                    truncate(&r.student, 25),
                    format_cents(r.total),
                    r.share_of_total
                )?;
            }
        }
    }
    Ok(())
}

fn write_summaries<W: Write>(
    out: &mut W,
    summaries: &[StudentSummaryView],
    format: &str,
) -> Result<()> {
    match format {
        "json" => {
            writeln!(out, "{}", serde_json::to_string_pretty(summaries)?)?;
        }
        "csv" => {
            let mut writer = csv::Writer::from_writer(&mut *out);
            writer.write_record(["student", "income", "expense", "balance"])?;
            for s in summaries {
                writer.write_record([
                    s.student.clone(),
                    s.income.to_string(),
                    s.expense.to_string(),
                    s.balance.to_string(),
                ])?;
            }
            writer.flush()?;
        }
        _ => {
            writeln!(out, "Student Balances")?;
            writeln!(out)?;
            if summaries.is_empty() {
                writeln!(out, "{}", NO_DATA)?;
                return Ok(());
            }
            writeln!(
                out,
                "{:<25} {:>12} {:>12} {:>12}",
                "STUDENT", "INCOME", "EXPENSE", "BALANCE"
            )?;
            writeln!(out, "{}", "-".repeat(64))?;
            for s in summaries {
                writeln!(
                    out,
                    "{:<25} {:>12} {:>12} {:>12}",
                    truncate(&s.student, 25),
                    format_cents(s.income),
                    format_cents(s.expense),
                    format_cents(s.balance)
                )?;
            }
        }
    }
    Ok(())
}

fn write_matrix<W: Write>(
    out: &mut W,
    has_data: bool,
    matrix: &MatrixView,
    format: &str,
) -> Result<()> {
    match format {
        "json" => {
            writeln!(out, "{}", serde_json::to_string_pretty(matrix)?)?;
        }
        "csv" => {
            let mut writer = csv::Writer::from_writer(&mut *out);
            let mut header = vec!["student".to_string()];
            header.extend(matrix.columns.iter().map(|c| c.label.clone()));
            header.push("total".to_string());
            writer.write_record(&header)?;
            for row in &matrix.rows {
                let mut fields = vec![row.student.clone()];
                fields.extend(row.cells.iter().map(|c| c.amount.to_string()));
                fields.push(row.total.to_string());
                writer.write_record(&fields)?;
            }
            writer.flush()?;
        }
        _ => {
            writeln!(out, "Income by Month and Student")?;
            writeln!(out)?;
            if !has_data {
                writeln!(out, "{}", NO_DATA)?;
                return Ok(());
            }

            write!(out, "{:<20}", "STUDENT")?;
            for column in &matrix.columns {
                write!(out, " {:>10}", column.label)?;
            }
            writeln!(out, " {:>12}", "TOTAL")?;
            let width = 20 + matrix.columns.len() * 11 + 13;
            writeln!(out, "{}", "-".repeat(width))?;

            for row in &matrix.rows {
                write!(out, "{:<20}", truncate(&row.student, 20))?;
                for cell in &row.cells {
                    write!(out, " {:>10}", format_cents(cell.amount))?;
                }
                writeln!(out, " {:>12}", format_cents(row.total))?;
            }

            writeln!(out, "{}", "-".repeat(width))?;
            write!(out, "{:<20}", "TOTAL")?;
            for column in &matrix.columns {
                write!(out, " {:>10}", format_cents(column.total))?;
            }
            writeln!(out, " {:>12}", format_cents(matrix.grand_total))?;
        }
    }
    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
