//! Excel export of the status pivot.
//!
//! Layout of the single `Status` sheet:
//!
//! ```text
//! | Team  | User | Question  | 7 May 2025 (Wed) | 6 May 2025 (Tue) | ...
//! |-------|------|-----------|------------------|------------------|
//! | Alpha | Bob  | Yesterday | shipped api      | —                |
//! |       |      | Today     | review           | N/A (On Leave)   |
//! ```
//!
//! Team and user cells are merged vertically over their row spans.

use std::path::Path;

use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use tracing::info;

use crate::error::StatusError;
use crate::pivot::PivotTable;
use crate::report::EMPTY_CELL;

const SHEET_NAME: &str = "Status";
const FIXED_COLUMNS: u16 = 3;
/// Column limit of an xlsx worksheet.
const MAX_COLUMNS: usize = 16_384;

pub fn write_workbook(table: &PivotTable, path: &Path) -> anyhow::Result<()> {
    let max_days = MAX_COLUMNS - FIXED_COLUMNS as usize;
    if table.dates.len() > max_days {
        return Err(StatusError::Validation(format!(
            "date range covers {} days; a worksheet holds at most {}, narrow the export window",
            table.dates.len(),
            max_days
        ))
        .into());
    }

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let header = Format::new()
        .set_bold()
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Center)
        .set_background_color(Color::RGB(0xF3F4F6));
    let label = Format::new()
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_text_wrap();
    let cell = Format::new().set_border(FormatBorder::Thin).set_text_wrap();

    worksheet.write_string_with_format(0, 0, "Team", &header)?;
    worksheet.write_string_with_format(0, 1, "User", &header)?;
    worksheet.write_string_with_format(0, 2, "Question", &header)?;
    worksheet.set_column_width(0, 20)?;
    worksheet.set_column_width(1, 20)?;
    worksheet.set_column_width(2, 36)?;
    for (offset, date) in table.dates.iter().enumerate() {
        let col = FIXED_COLUMNS + offset as u16;
        let title = date.format("%-d %b %Y (%a)").to_string();
        worksheet.write_string_with_format(0, col, &title, &header)?;
        worksheet.set_column_width(col, 24)?;
    }
    worksheet.set_freeze_panes(1, FIXED_COLUMNS)?;

    let mut row: u32 = 1;
    for team in &table.teams {
        let team_span = team.row_span() as u32;
        if team_span == 0 {
            continue;
        }
        write_block(worksheet, row, 0, team_span, &team.name, &label)?;

        let mut user_row = row;
        for user in &team.users {
            let user_span = user.row_span() as u32;
            if user_span == 0 {
                continue;
            }
            write_block(worksheet, user_row, 1, user_span, &user.name, &label)?;

            for (offset, question) in user.questions.iter().enumerate() {
                let question_row = user_row + offset as u32;
                worksheet.write_string_with_format(question_row, 2, &question.text, &label)?;
                for (date_offset, date) in table.dates.iter().enumerate() {
                    let answer = question.answer(*date).unwrap_or(EMPTY_CELL);
                    worksheet.write_string_with_format(
                        question_row,
                        FIXED_COLUMNS + date_offset as u16,
                        answer,
                        &cell,
                    )?;
                }
            }
            user_row += user_span;
        }
        row += team_span;
    }

    workbook.save(path)?;
    info!(path = %path.display(), rows = row - 1, "wrote status workbook");
    Ok(())
}

/// Writes `text` over `span` rows of one column, merging when needed.
fn write_block(
    worksheet: &mut Worksheet,
    first_row: u32,
    col: u16,
    span: u32,
    text: &str,
    format: &Format,
) -> anyhow::Result<()> {
    if span > 1 {
        worksheet.merge_range(first_row, col, first_row + span - 1, col, text, format)?;
    } else {
        worksheet.write_string_with_format(first_row, col, text, format)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QuestionRef, ResponseRecord, StatusRecord, TeamRef, UserRef};
    use crate::pivot::{collect_questions, LEAVE_PLACEHOLDER};
    use calamine::{open_workbook_auto, Data, Reader};
    use chrono::NaiveDate;

    fn status(id: &str, user: &str, day: u32, leave: bool) -> StatusRecord {
        let response = |qid: &str, text: &str, answer: &str| ResponseRecord {
            question: Some(QuestionRef::Object {
                id: qid.to_string(),
                text: text.to_string(),
            }),
            answer: answer.to_string(),
        };
        StatusRecord {
            id: Some(id.to_string()),
            user: Some(UserRef {
                id: format!("u-{user}"),
                name: user.to_string(),
            }),
            team: Some(TeamRef {
                id: "t1".to_string(),
                name: "Alpha".to_string(),
            }),
            date: NaiveDate::from_ymd_opt(2025, 5, day).unwrap(),
            is_leave: leave,
            leave_reason: None,
            responses: if leave {
                vec![]
            } else {
                vec![response("q1", "Yesterday", "api"), response("q2", "Today", "ui")]
            },
        }
    }

    #[test]
    fn workbook_round_trips_through_reader() {
        let records = vec![status("s1", "Bob", 6, false), status("s2", "Cara", 5, true)];
        let questions = collect_questions(&records);
        let table = PivotTable::build(&records, &questions);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.xlsx");
        write_workbook(&table, &path).unwrap();

        let mut workbook = open_workbook_auto(&path).unwrap();
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();
        let text = |row: u32, col: u32| match range.get_value((row, col)) {
            Some(Data::String(s)) => s.clone(),
            _ => String::new(),
        };

        assert_eq!(text(0, 0), "Team");
        assert_eq!(text(0, 3), "6 May 2025 (Tue)");
        assert_eq!(text(0, 4), "5 May 2025 (Mon)");
        assert_eq!(text(1, 0), "Alpha");
        assert_eq!(text(1, 1), "Bob");
        assert_eq!(text(1, 2), "Yesterday");
        assert_eq!(text(1, 3), "api");
        assert_eq!(text(2, 3), "ui");
        assert_eq!(text(3, 1), "Cara");
        assert_eq!(text(3, 4), LEAVE_PLACEHOLDER);
        assert_eq!(text(3, 3), EMPTY_CELL);
    }

    #[test]
    fn oversized_date_range_is_rejected() {
        let mut old = status("s1", "Bob", 5, false);
        old.date = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        let records = vec![old, status("s2", "Bob", 6, false)];
        let table = PivotTable::build(&records, &collect_questions(&records));
        assert!(table.dates.len() > MAX_COLUMNS);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.xlsx");
        let err = write_workbook(&table, &path).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<StatusError>(),
            Some(StatusError::Validation(_))
        ));
        assert!(!path.exists());
    }
}
