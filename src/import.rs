use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::models::{GroupedStatus, QuestionAnswer};
use crate::sheet::SheetRow;

pub const TEAM_COLUMN: &str = "Team";
pub const EMPLOYEE_COLUMN: &str = "Employee";
pub const QUESTION_COLUMN: &str = "Question";

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// A single non-blank answer cell, attributed to its effective team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatAnswer {
    pub team_name: String,
    pub user_name: String,
    pub question: String,
    pub date_label: String,
    pub answer: String,
}

/// Left-to-right accumulator for the sheet walk: the most recent non-blank
/// team plus everything emitted so far.
#[derive(Debug, Default)]
struct TeamCarry {
    current_team: Option<String>,
    answers: Vec<FlatAnswer>,
}

impl TeamCarry {
    fn absorb(mut self, row: &SheetRow) -> Self {
        if let Some(team) = non_blank(row.get(TEAM_COLUMN)) {
            self.current_team = Some(team.to_string());
        }

        let user = non_blank(row.get(EMPLOYEE_COLUMN));
        let question = non_blank(row.get(QUESTION_COLUMN));
        let (Some(team), Some(user), Some(question)) = (&self.current_team, user, question) else {
            return self;
        };

        for (header, value) in row.cells() {
            if is_reserved(header) {
                continue;
            }
            let Some(answer) = non_blank(Some(value)) else {
                continue;
            };
            self.answers.push(FlatAnswer {
                team_name: team.clone(),
                user_name: user.to_string(),
                question: question.to_string(),
                date_label: header.trim().to_string(),
                answer: answer.to_string(),
            });
        }
        self
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn is_reserved(header: &str) -> bool {
    let header = header.trim();
    [TEAM_COLUMN, EMPLOYEE_COLUMN, QUESTION_COLUMN]
        .iter()
        .any(|reserved| header.eq_ignore_ascii_case(reserved))
}

/// Flattens sheet rows into one tuple per answered date cell. A blank team
/// cell inherits the nearest non-blank team above it.
pub fn flatten_rows(rows: &[SheetRow]) -> Vec<FlatAnswer> {
    rows.iter()
        .fold(TeamCarry::default(), TeamCarry::absorb)
        .answers
}

pub fn is_leave_marker(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("leave") || answer.eq_ignore_ascii_case("absent")
}

/// Groups flattened answers into one entry per (team, employee, date label),
/// in first-seen order. A leave marker anywhere in a group turns the entry
/// into a leave day: its responses are discarded and later non-leave answers
/// are ignored.
pub fn group_answers(answers: &[FlatAnswer]) -> Vec<GroupedStatus> {
    let mut grouped: Vec<GroupedStatus> = Vec::new();
    let mut index: HashMap<(&str, &str, &str), usize> = HashMap::new();

    for item in answers {
        let key = (
            item.team_name.as_str(),
            item.user_name.as_str(),
            item.date_label.as_str(),
        );
        let slot = *index.entry(key).or_insert_with(|| {
            grouped.push(GroupedStatus {
                team_name: item.team_name.clone(),
                user_name: item.user_name.clone(),
                date: item.date_label.clone(),
                responses: Vec::new(),
                is_leave: false,
                leave_reason: None,
            });
            grouped.len() - 1
        });
        let entry = &mut grouped[slot];

        if is_leave_marker(&item.answer) {
            entry.is_leave = true;
            entry.leave_reason = Some(item.answer.trim().to_string());
            entry.responses.clear();
        } else if !entry.is_leave {
            entry.responses.push(QuestionAnswer {
                question: item.question.clone(),
                answer: item.answer.clone(),
            });
        }
    }

    grouped
}

pub fn process_rows(rows: &[SheetRow]) -> Vec<GroupedStatus> {
    let answers = flatten_rows(rows);
    let grouped = group_answers(&answers);
    debug!(
        rows = rows.len(),
        answers = answers.len(),
        entries = grouped.len(),
        "grouped import rows"
    );
    grouped
}

/// Resolves a sheet date header such as `5-May`, `5 Sept 2025` or
/// `5-May-25` (or an ISO date) to a calendar day. Labels without a year are
/// placed in `year`; two-digit years are taken as 20xx.
pub fn parse_date_label(label: &str, year: i32) -> Option<NaiveDate> {
    let label = label.trim();
    if let Ok(date) = NaiveDate::parse_from_str(label, "%Y-%m-%d") {
        return Some(date);
    }

    let mut parts = label.split(['-', ' ']).filter(|part| !part.is_empty());
    let day: u32 = parts.next()?.parse().ok()?;
    let month = month_number(parts.next()?)?;
    let year = match parts.next() {
        None => year,
        Some(part) if part.len() == 4 => part.parse().ok()?,
        Some(part) if part.len() == 2 => 2000 + part.parse::<i32>().ok()?,
        Some(_) => return None,
    };
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Full month name, its three-letter abbreviation, or `sept`.
fn month_number(token: &str) -> Option<u32> {
    let token = token.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|name| {
            token == *name || token == name[..3] || (token == "sept" && *name == "september")
        })
        .map(|index| index as u32 + 1)
}

pub fn current_year() -> i32 {
    chrono::Local::now().year()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(team: &str, employee: &str, question: &str, dates: &[(&str, &str)]) -> SheetRow {
        let mut cells = vec![
            (TEAM_COLUMN.to_string(), team.to_string()),
            (EMPLOYEE_COLUMN.to_string(), employee.to_string()),
            (QUESTION_COLUMN.to_string(), question.to_string()),
        ];
        cells.extend(dates.iter().map(|(h, v)| (h.to_string(), v.to_string())));
        SheetRow::new(cells)
    }

    #[test]
    fn blank_team_inherits_previous_team() {
        let rows = vec![
            row("Alpha", "Bob", "Q1", &[("5-May", "done")]),
            row("", "Cara", "Q1", &[("5-May", "wip")]),
            row("  ", "Dev", "Q1", &[("5-May", "blocked")]),
            row("Beta", "Eve", "Q1", &[("5-May", "ok")]),
            row("", "Finn", "Q1", &[("5-May", "ok")]),
        ];
        let teams: Vec<String> = flatten_rows(&rows)
            .into_iter()
            .map(|answer| answer.team_name)
            .collect();
        assert_eq!(teams, vec!["Alpha", "Alpha", "Alpha", "Beta", "Beta"]);
    }

    #[test]
    fn team_only_row_updates_context_without_emitting() {
        let rows = vec![
            row("Alpha", "", "", &[("5-May", "ignored")]),
            row("", "Bob", "Q1", &[("5-May", "done")]),
        ];
        let answers = flatten_rows(&rows);
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].team_name, "Alpha");
    }

    #[test]
    fn rows_before_any_team_are_skipped() {
        let rows = vec![row("", "Bob", "Q1", &[("5-May", "done")])];
        assert!(flatten_rows(&rows).is_empty());
    }

    #[test]
    fn blank_and_whitespace_cells_are_skipped() {
        let rows = vec![row(
            "Alpha",
            "Bob",
            "Q1",
            &[("5-May", "  "), ("6-May", ""), ("7-May", " shipped ")],
        )];
        let answers = flatten_rows(&rows);
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].date_label, "7-May");
        assert_eq!(answers[0].answer, "shipped");
    }

    #[test]
    fn leave_row_collapses_group() {
        let rows = vec![
            row("Alpha", "Bob", "Q1", &[("5-May", "On track")]),
            row("", "Bob", "Q2", &[("5-May", "Leave")]),
        ];
        let grouped = process_rows(&rows);
        assert_eq!(grouped.len(), 1);
        let entry = &grouped[0];
        assert_eq!(entry.team_name, "Alpha");
        assert_eq!(entry.user_name, "Bob");
        assert_eq!(entry.date, "5-May");
        assert!(entry.is_leave);
        assert_eq!(entry.leave_reason.as_deref(), Some("Leave"));
        assert!(entry.responses.is_empty());
    }

    #[test]
    fn leave_flag_is_never_unset() {
        let rows = vec![
            row("Alpha", "Bob", "Q1", &[("5-May", "ABSENT")]),
            row("", "Bob", "Q2", &[("5-May", "worked anyway")]),
        ];
        let grouped = process_rows(&rows);
        assert_eq!(grouped.len(), 1);
        assert!(grouped[0].is_leave);
        assert_eq!(grouped[0].leave_reason.as_deref(), Some("ABSENT"));
        assert!(grouped[0].responses.is_empty());
    }

    #[test]
    fn leave_markers_match_exactly() {
        assert!(is_leave_marker(" leave "));
        assert!(is_leave_marker("Absent"));
        assert!(!is_leave_marker("on leave"));
        assert!(!is_leave_marker("leaves"));
    }

    #[test]
    fn responses_keep_encounter_order_per_date() {
        let rows = vec![
            row("Alpha", "Bob", "Q1", &[("5-May", "a1"), ("6-May", "b1")]),
            row("", "Bob", "Q2", &[("5-May", "a2"), ("6-May", "b2")]),
        ];
        let grouped = process_rows(&rows);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].date, "5-May");
        let questions: Vec<&str> = grouped[0]
            .responses
            .iter()
            .map(|r| r.question.as_str())
            .collect();
        assert_eq!(questions, vec!["Q1", "Q2"]);
        assert_eq!(grouped[1].responses[1].answer, "b2");
    }

    #[test]
    fn grouping_is_repeatable() {
        let rows = vec![
            row("Alpha", "Bob", "Q1", &[("5-May", "a"), ("6-May", "Leave")]),
            row("", "Cara", "Q1", &[("5-May", "b")]),
            row("Beta", "Bob", "Q1", &[("5-May", "c")]),
        ];
        let answers = flatten_rows(&rows);
        assert_eq!(group_answers(&answers), group_answers(&answers));
        assert_eq!(group_answers(&answers).len(), 4);
    }

    #[test]
    fn date_labels_resolve_in_year() {
        assert_eq!(
            parse_date_label("5-May", 2025),
            NaiveDate::from_ymd_opt(2025, 5, 5)
        );
        assert_eq!(
            parse_date_label("12-sept", 2024),
            NaiveDate::from_ymd_opt(2024, 9, 12)
        );
        assert_eq!(
            parse_date_label("2023-01-31", 2025),
            NaiveDate::from_ymd_opt(2023, 1, 31)
        );
        assert_eq!(parse_date_label("31-Feb", 2025), None);
        assert_eq!(parse_date_label("Notes", 2025), None);
    }

    #[test]
    fn date_labels_carry_their_own_year() {
        assert_eq!(
            parse_date_label("5-May-2025", 2024),
            NaiveDate::from_ymd_opt(2025, 5, 5)
        );
        assert_eq!(
            parse_date_label("5-May-25", 2024),
            NaiveDate::from_ymd_opt(2025, 5, 5)
        );
        assert_eq!(
            parse_date_label("5 September", 2025),
            NaiveDate::from_ymd_opt(2025, 9, 5)
        );
        assert_eq!(parse_date_label("5-Mayday", 2025), None);
        assert_eq!(parse_date_label("5-Ma", 2025), None);
        assert_eq!(parse_date_label("5-May-2025-x", 2025), None);
        assert_eq!(parse_date_label("5-May-202", 2025), None);
    }
}
