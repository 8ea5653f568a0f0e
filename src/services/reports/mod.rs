pub(crate) mod xlsx;

use std::collections::{BTreeMap, HashSet};

use sqlx::SqlitePool;
use thiserror::Error;
use time::macros::date;
use time::Date;

use crate::core::time::{days_before, format_iso_date};
use crate::db::types::{AttendanceStatus, UNMARKED_LABEL};
use crate::repositories;
use crate::repositories::attendance::ReportRow;
use crate::services::stats::{attendance_percent, round1};
use xlsx::{Cell, Sheet, Workbook};

const ALL_TIME_START: Date = date!(2000 - 01 - 01);
pub(crate) const QUICK_SUMMARY_DAYS: i64 = 30;

const SHEET_DETAIL: &str = "Детальная посещаемость";
const SHEET_STUDENTS: &str = "Статистика по студентам";
const SHEET_SUBJECTS: &str = "Статистика по предметам";
const SHEET_SUMMARY: &str = "Общая сводка";

#[derive(Debug, Error)]
pub(crate) enum ReportError {
    #[error("group {0} not found")]
    GroupNotFound(i64),
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
    #[error("failed to build spreadsheet: {0}")]
    Spreadsheet(#[from] zip::result::ZipError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PeriodPreset {
    Week,
    Month,
    AllTime,
}

impl PeriodPreset {
    pub(crate) fn range(self, today: Date) -> DateRange {
        let start = match self {
            Self::Week => days_before(today, 7),
            Self::Month => days_before(today, 30),
            Self::AllTime => ALL_TIME_START,
        };
        DateRange { start, end: today }
    }
}

/// Inclusive range of lesson dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DateRange {
    pub(crate) start: Date,
    pub(crate) end: Date,
}

impl DateRange {
    pub(crate) fn new(start: Date, end: Date) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub(crate) fn label(&self) -> String {
        format!("{} - {}", format_iso_date(self.start), format_iso_date(self.end))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DetailRow {
    pub(crate) student_name: String,
    pub(crate) subject_name: String,
    pub(crate) lesson_date: Date,
    pub(crate) status: Option<AttendanceStatus>,
}

/// Status counts for one student or subject over the report window.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PivotRow {
    pub(crate) key: String,
    pub(crate) present: i64,
    pub(crate) absent: i64,
    pub(crate) late: i64,
    pub(crate) unmarked: i64,
}

impl PivotRow {
    fn record(&mut self, status: Option<AttendanceStatus>) {
        match status {
            Some(AttendanceStatus::Present) => self.present += 1,
            Some(AttendanceStatus::Absent) => self.absent += 1,
            Some(AttendanceStatus::Late) => self.late += 1,
            None => self.unmarked += 1,
        }
    }

    /// Lessons with a recorded status.
    pub(crate) fn total(&self) -> i64 {
        self.present + self.absent + self.late
    }

    pub(crate) fn percent(&self) -> Option<f64> {
        attendance_percent(self.present, self.late, self.total())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ReportSummary {
    pub(crate) lesson_count: usize,
    pub(crate) student_count: usize,
    pub(crate) mean_percent: Option<f64>,
}

#[derive(Debug, Clone)]
pub(crate) struct AttendanceReport {
    pub(crate) group_name: String,
    pub(crate) range: DateRange,
    pub(crate) detail: Vec<DetailRow>,
    pub(crate) by_student: Vec<PivotRow>,
    pub(crate) by_subject: Vec<PivotRow>,
    pub(crate) summary: ReportSummary,
}

impl AttendanceReport {
    /// Aggregates rows already ordered by student and date. Returns `None` for
    /// an empty window so callers can say "no data" instead of sending an
    /// empty file.
    pub(crate) fn from_rows(
        group_name: String,
        range: DateRange,
        rows: Vec<ReportRow>,
    ) -> Option<Self> {
        if rows.is_empty() {
            return None;
        }

        let mut students: Vec<PivotRow> = Vec::new();
        let mut student_index: BTreeMap<i64, usize> = BTreeMap::new();
        let mut subjects: BTreeMap<String, PivotRow> = BTreeMap::new();
        let mut lessons = HashSet::new();
        let mut detail = Vec::with_capacity(rows.len());

        for row in rows {
            lessons.insert(row.lesson_id);

            let slot = *student_index.entry(row.student_id).or_insert_with(|| {
                students.push(PivotRow { key: row.student_name.clone(), ..PivotRow::default() });
                students.len() - 1
            });
            students[slot].record(row.status);

            subjects
                .entry(row.subject_name.clone())
                .or_insert_with(|| PivotRow {
                    key: row.subject_name.clone(),
                    ..PivotRow::default()
                })
                .record(row.status);

            detail.push(DetailRow {
                student_name: row.student_name,
                subject_name: row.subject_name,
                lesson_date: row.lesson_date,
                status: row.status,
            });
        }

        let percents: Vec<f64> = students.iter().filter_map(PivotRow::percent).collect();
        let mean_percent = if percents.is_empty() {
            None
        } else {
            Some(round1(percents.iter().sum::<f64>() / percents.len() as f64))
        };

        let summary = ReportSummary {
            lesson_count: lessons.len(),
            student_count: students.len(),
            mean_percent,
        };

        Some(Self {
            group_name,
            range,
            detail,
            by_student: students,
            by_subject: subjects.into_values().collect(),
            summary,
        })
    }

    pub(crate) fn filename(&self) -> String {
        format!(
            "report_{}_{}_{}.xlsx",
            sanitize_filename(&self.group_name),
            format_iso_date(self.range.start),
            format_iso_date(self.range.end)
        )
    }

    pub(crate) fn caption(&self) -> String {
        format!(
            "📊 Отчет по посещаемости\nГруппа: {}\nПериод: {}",
            self.group_name,
            self.range.label()
        )
    }

    pub(crate) fn workbook(&self) -> Workbook {
        let mut workbook = Workbook::new();

        let mut detail = Sheet::new(SHEET_DETAIL);
        detail.push_row(["Группа", "Студент", "Предмет", "Дата", "Статус", "Балл"]);
        for row in &self.detail {
            detail.push_row([
                Cell::from(self.group_name.as_str()),
                Cell::from(row.student_name.as_str()),
                Cell::from(row.subject_name.as_str()),
                Cell::from(format_iso_date(row.lesson_date)),
                Cell::from(status_label(row.status)),
                Cell::from(row.status.map(AttendanceStatus::score)),
            ]);
        }
        workbook.add_sheet(detail);

        workbook.add_sheet(pivot_sheet(SHEET_STUDENTS, "Студент", &self.by_student));
        workbook.add_sheet(pivot_sheet(SHEET_SUBJECTS, "Предмет", &self.by_subject));

        let mut summary = Sheet::new(SHEET_SUMMARY);
        summary.push_row(["Параметр", "Значение"]);
        summary.push_row([Cell::from("Группа"), Cell::from(self.group_name.as_str())]);
        summary.push_row([Cell::from("Период отчета"), Cell::from(self.range.label())]);
        summary.push_row([
            Cell::from("Всего занятий"),
            Cell::from(self.summary.lesson_count as i64),
        ]);
        summary.push_row([
            Cell::from("Всего студентов"),
            Cell::from(self.summary.student_count as i64),
        ]);
        summary.push_row([
            Cell::from("Средняя посещаемость"),
            Cell::from(format_percent(self.summary.mean_percent)),
        ]);
        workbook.add_sheet(summary);

        workbook
    }

    pub(crate) fn to_xlsx(&self) -> Result<Vec<u8>, ReportError> {
        Ok(self.workbook().to_bytes()?)
    }
}

fn pivot_sheet(name: &str, key_header: &str, rows: &[PivotRow]) -> Sheet {
    let mut sheet = Sheet::new(name);
    sheet.push_row([
        key_header,
        AttendanceStatus::Present.label(),
        AttendanceStatus::Absent.label(),
        AttendanceStatus::Late.label(),
        UNMARKED_LABEL,
        "Всего занятий",
        "Процент посещаемости",
    ]);
    for row in rows {
        sheet.push_row([
            Cell::from(row.key.as_str()),
            Cell::from(row.present),
            Cell::from(row.absent),
            Cell::from(row.late),
            Cell::from(row.unmarked),
            Cell::from(row.total()),
            Cell::from(row.percent()),
        ]);
    }
    sheet
}

pub(crate) fn status_label(status: Option<AttendanceStatus>) -> &'static str {
    status.map(AttendanceStatus::label).unwrap_or(UNMARKED_LABEL)
}

pub(crate) fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{value:.1}%"),
        None => "—".to_string(),
    }
}

/// Keeps letters (Cyrillic included), digits, `-` and `_`.
fn sanitize_filename(value: &str) -> String {
    value
        .chars()
        .map(|ch| if ch.is_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}

/// Loads and aggregates the report for `group_id`. `Ok(None)` means the
/// window holds no lessons for the group's students.
pub(crate) async fn generate(
    pool: &SqlitePool,
    group_id: i64,
    range: DateRange,
) -> Result<Option<AttendanceReport>, ReportError> {
    let group = repositories::groups::find_by_id(pool, group_id)
        .await?
        .ok_or(ReportError::GroupNotFound(group_id))?;

    let rows = repositories::attendance::report_rows(pool, group_id, range.start, range.end).await?;
    let report = AttendanceReport::from_rows(group.name, range, rows);

    if let Some(report) = &report {
        metrics::counter!(crate::core::metrics::REPORTS_GENERATED_TOTAL).increment(1);
        tracing::info!(
            group_id,
            period = %report.range.label(),
            rows = report.detail.len(),
            "Attendance report generated"
        );
    }

    Ok(report)
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QuickSummaryRow {
    pub(crate) group_name: String,
    pub(crate) lesson_count: i64,
    pub(crate) student_count: i64,
    pub(crate) percent: Option<f64>,
}

/// One row per group over the last thirty days; the percentage is taken over
/// recorded marks only.
pub(crate) async fn quick_summary(
    pool: &SqlitePool,
    today: Date,
) -> Result<Vec<QuickSummaryRow>, sqlx::Error> {
    let start = days_before(today, QUICK_SUMMARY_DAYS);
    let activity = repositories::attendance::activity_by_group(pool, start, today).await?;

    Ok(activity
        .into_iter()
        .map(|row| QuickSummaryRow {
            percent: attendance_percent(row.present, row.late, row.recorded),
            group_name: row.group_name,
            lesson_count: row.lesson_count,
            student_count: row.student_count,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::primitive_now_utc;
    use crate::repositories::{attendance, lessons};
    use crate::test_support::{seed_group, seed_student, seed_subject, test_pool};

    fn row(
        student_id: i64,
        student: &str,
        subject: &str,
        lesson_id: i64,
        day: Date,
        status: Option<AttendanceStatus>,
    ) -> ReportRow {
        ReportRow {
            group_name: "CS-101".to_string(),
            student_id,
            student_name: student.to_string(),
            subject_name: subject.to_string(),
            lesson_id,
            lesson_date: day,
            status,
        }
    }

    #[test]
    fn presets_resolve_against_today() {
        let today = date!(2024 - 03 - 31);
        assert_eq!(
            PeriodPreset::Week.range(today),
            DateRange { start: date!(2024 - 03 - 24), end: today }
        );
        assert_eq!(
            PeriodPreset::Month.range(today),
            DateRange { start: date!(2024 - 03 - 01), end: today }
        );
        assert_eq!(PeriodPreset::AllTime.range(today).start, date!(2000 - 01 - 01));
    }

    #[test]
    fn reversed_range_is_rejected() {
        assert!(DateRange::new(date!(2024 - 02 - 01), date!(2024 - 01 - 01)).is_none());
        assert!(DateRange::new(date!(2024 - 01 - 01), date!(2024 - 01 - 01)).is_some());
    }

    #[test]
    fn empty_window_yields_no_report() {
        let range = PeriodPreset::Week.range(date!(2024 - 01 - 15));
        assert!(AttendanceReport::from_rows("CS-101".to_string(), range, Vec::new()).is_none());
    }

    #[test]
    fn pivot_percentages_follow_half_weight_rule() {
        let day = date!(2024 - 01 - 15);
        let range = DateRange { start: day, end: day };
        let rows = vec![
            row(1, "Alice", "Algebra", 10, day, Some(AttendanceStatus::Present)),
            row(1, "Alice", "Physics", 11, day, Some(AttendanceStatus::Late)),
            row(1, "Alice", "History", 12, day, Some(AttendanceStatus::Absent)),
            row(2, "Bob", "Algebra", 10, day, None),
            row(2, "Bob", "Physics", 11, day, None),
            row(2, "Bob", "History", 12, day, None),
        ];

        let report =
            AttendanceReport::from_rows("CS-101".to_string(), range, rows).expect("report");

        assert_eq!(report.by_student[0].key, "Alice");
        assert_eq!(report.by_student[0].total(), 3);
        assert_eq!(report.by_student[0].percent(), Some(50.0));
        assert_eq!(report.by_student[1].unmarked, 3);
        assert_eq!(report.by_student[1].percent(), None);
        assert_eq!(report.summary.mean_percent, Some(50.0));
        assert_eq!(report.summary.lesson_count, 3);
        assert_eq!(report.summary.student_count, 2);
        assert_eq!(
            report.by_subject.iter().map(|row| row.key.as_str()).collect::<Vec<_>>(),
            vec!["Algebra", "History", "Physics"]
        );
    }

    #[test]
    fn filename_encodes_group_and_range() {
        let range = DateRange { start: date!(2024 - 01 - 01), end: date!(2024 - 01 - 31) };
        let report = AttendanceReport::from_rows(
            "ИВТ 1/2".to_string(),
            range,
            vec![row(1, "Alice", "Algebra", 1, date!(2024 - 01 - 15), None)],
        )
        .expect("report");

        assert_eq!(report.filename(), "report_ИВТ_1_2_2024-01-01_2024-01-31.xlsx");
        assert_eq!(
            report.workbook().sheet_names(),
            vec![SHEET_DETAIL, SHEET_STUDENTS, SHEET_SUBJECTS, SHEET_SUMMARY]
        );
    }

    #[tokio::test]
    async fn single_day_scenario() -> anyhow::Result<()> {
        let pool = test_pool().await?;
        let group = seed_group(&pool, "CS-101").await?;
        let alice = seed_student(&pool, "Alice", group.id, None).await?;
        let bob = seed_student(&pool, "Bob", group.id, None).await?;
        let link = seed_subject(&pool, group.id, "Algebra").await?;
        let day = date!(2024 - 01 - 15);
        let now = primitive_now_utc();
        let lesson = lessons::find_or_create(&pool, link, day, now).await?;
        attendance::upsert(&pool, alice.id, lesson.id, AttendanceStatus::Present, now).await?;
        attendance::upsert(&pool, bob.id, lesson.id, AttendanceStatus::Late, now).await?;

        let range = DateRange::new(day, day).expect("range");
        let report = generate(&pool, group.id, range).await?.expect("report");

        assert_eq!(
            report.detail,
            vec![
                DetailRow {
                    student_name: "Alice".to_string(),
                    subject_name: "Algebra".to_string(),
                    lesson_date: day,
                    status: Some(AttendanceStatus::Present),
                },
                DetailRow {
                    student_name: "Bob".to_string(),
                    subject_name: "Algebra".to_string(),
                    lesson_date: day,
                    status: Some(AttendanceStatus::Late),
                },
            ]
        );
        assert_eq!(report.by_student[0].percent(), Some(100.0));
        assert_eq!(report.by_student[1].percent(), Some(50.0));
        assert_eq!(report.summary.lesson_count, 1);
        assert_eq!(report.summary.student_count, 2);
        assert!(!report.to_xlsx()?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn missing_group_is_an_error() -> anyhow::Result<()> {
        let pool = test_pool().await?;
        let range = PeriodPreset::AllTime.range(date!(2024 - 01 - 01));
        let err = generate(&pool, 404, range).await.unwrap_err();
        assert!(matches!(err, ReportError::GroupNotFound(404)));
        Ok(())
    }

    #[tokio::test]
    async fn quick_summary_uses_recorded_marks() -> anyhow::Result<()> {
        let pool = test_pool().await?;
        let group = seed_group(&pool, "CS-101").await?;
        let alice = seed_student(&pool, "Alice", group.id, None).await?;
        seed_student(&pool, "Bob", group.id, None).await?;
        let link = seed_subject(&pool, group.id, "Algebra").await?;
        let today = date!(2024 - 01 - 31);
        let now = primitive_now_utc();
        let lesson = lessons::find_or_create(&pool, link, date!(2024 - 01 - 20), now).await?;
        lessons::find_or_create(&pool, link, date!(2023 - 11 - 01), now).await?;
        attendance::upsert(&pool, alice.id, lesson.id, AttendanceStatus::Late, now).await?;
        seed_group(&pool, "Empty").await?;

        let rows = quick_summary(&pool, today).await?;

        assert_eq!(
            rows,
            vec![
                QuickSummaryRow {
                    group_name: "CS-101".to_string(),
                    lesson_count: 1,
                    student_count: 2,
                    percent: Some(50.0),
                },
                QuickSummaryRow {
                    group_name: "Empty".to_string(),
                    lesson_count: 0,
                    student_count: 0,
                    percent: None,
                },
            ]
        );
        Ok(())
    }
}
