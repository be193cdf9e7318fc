use std::fmt::Write;

use crate::models::GroupedStatus;
use crate::pivot::PivotTable;

pub const EMPTY_CELL: &str = "—";
const IMPORT_PREVIEW_LIMIT: usize = 10;

fn escape(cell: &str) -> String {
    cell.replace('|', "\\|").replace('\n', " ")
}

/// Markdown rendition of the pivot. Team and user names appear only on the
/// first row of their block, mirroring merged header cells.
pub fn build_preview(table: &PivotTable, question_count: usize, title: &str) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# {}", title);
    let _ = writeln!(output);

    if table.is_empty() {
        let _ = writeln!(output, "No status updates found for these filters.");
    } else {
        let _ = write!(output, "| Team | User | Question |");
        for date in &table.dates {
            let _ = write!(output, " {} |", date.format("%-d %b %Y (%a)"));
        }
        let _ = writeln!(output);
        let _ = writeln!(output, "|---|---|---|{}", "---|".repeat(table.dates.len()));

        for team in &table.teams {
            let mut first_team_row = true;
            for user in &team.users {
                let mut first_user_row = true;
                for question in &user.questions {
                    let team_cell = if first_team_row { team.name.as_str() } else { "" };
                    let user_cell = if first_user_row { user.name.as_str() } else { "" };
                    let _ = write!(
                        output,
                        "| {} | {} | {} |",
                        escape(team_cell),
                        escape(user_cell),
                        escape(&question.text)
                    );
                    for date in &table.dates {
                        let answer = question.answer(*date).unwrap_or(EMPTY_CELL);
                        let _ = write!(output, " {} |", escape(answer));
                    }
                    let _ = writeln!(output);
                    first_team_row = false;
                    first_user_row = false;
                }
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "Total: {} teams, {} users, {} questions",
        table.team_count(),
        table.user_count(),
        question_count
    );
    match (table.dates.last(), table.dates.first()) {
        (Some(oldest), Some(newest)) => {
            let _ = writeln!(
                output,
                "History: {} days ({} → {})",
                table.dates.len(),
                oldest,
                newest
            );
        }
        _ => {
            let _ = writeln!(output, "No data available");
        }
    }

    output
}

/// Short listing of grouped import entries, one line each.
pub fn summarize_import(entries: &[GroupedStatus]) -> String {
    let mut output = String::new();

    if entries.is_empty() {
        let _ = writeln!(output, "No valid data found in the import file.");
        return output;
    }

    let _ = writeln!(
        output,
        "Processed {} status entries (one per employee per date):",
        entries.len()
    );
    for entry in entries.iter().take(IMPORT_PREVIEW_LIMIT) {
        let detail = if entry.is_leave {
            entry.leave_reason.clone().unwrap_or_else(|| "Leave".to_string())
        } else {
            entry
                .responses
                .iter()
                .map(|r| format!("{}: {}", r.question, r.answer))
                .collect::<Vec<_>>()
                .join("; ")
        };
        let _ = writeln!(
            output,
            "- {} / {} on {} [{}] {}",
            entry.team_name,
            entry.user_name,
            entry.date,
            if entry.is_leave { "leave" } else { "present" },
            detail
        );
    }
    if entries.len() > IMPORT_PREVIEW_LIMIT {
        let _ = writeln!(
            output,
            "Showing first {} of {} status entries",
            IMPORT_PREVIEW_LIMIT,
            entries.len()
        );
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QuestionAnswer, QuestionRef, ResponseRecord, StatusRecord, TeamRef, UserRef};
    use crate::pivot::{collect_questions, LEAVE_PLACEHOLDER};
    use chrono::NaiveDate;

    fn status(id: &str, user: &str, day: u32, leave: bool, answer: &str) -> StatusRecord {
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
            leave_reason: leave.then(|| "Leave".to_string()),
            responses: if leave {
                vec![]
            } else {
                vec![ResponseRecord {
                    question: Some(QuestionRef::Object {
                        id: "q1".to_string(),
                        text: "Yesterday".to_string(),
                    }),
                    answer: answer.to_string(),
                }]
            },
        }
    }

    #[test]
    fn preview_merges_names_and_marks_gaps() {
        let records = vec![
            status("s1", "Bob", 5, false, "a|b"),
            status("s2", "Cara", 3, true, ""),
        ];
        let questions = collect_questions(&records);
        let table = PivotTable::build(&records, &questions);
        let report = build_preview(&table, questions.len(), "Status Preview");

        assert!(report.contains("| Team | User | Question | 5 May 2025 (Mon) | 4 May 2025 (Sun) | 3 May 2025 (Sat) |"));
        assert!(report.contains("| Alpha | Bob | Yesterday | a\\|b | — | — |"));
        assert!(report.contains(&format!("|  | Cara | Yesterday | — | — | {LEAVE_PLACEHOLDER} |")));
        assert!(report.contains("Total: 1 teams, 2 users, 1 questions"));
        assert!(report.contains("History: 3 days (2025-05-03 → 2025-05-05)"));
    }

    #[test]
    fn footer_counts_match_rendered_rows() {
        let records = vec![status("s1", "Bob", 5, false, "done"), {
            let mut dev = status("s2", "Dev", 4, true, "");
            dev.team = Some(TeamRef {
                id: "t2".to_string(),
                name: "Beta".to_string(),
            });
            dev
        }];
        // only leave days and no question in scope for Dev
        let table = PivotTable::build(&records, &[]);
        let report = build_preview(&table, 0, "Status Preview");

        assert!(report.contains("| Alpha | Bob | Yesterday | done | — |"));
        assert!(!report.contains("Dev"));
        assert!(report.contains("Total: 1 teams, 1 users, 0 questions"));
    }

    #[test]
    fn empty_preview_says_so() {
        let report = build_preview(&PivotTable::default(), 0, "Status Preview");
        assert!(report.contains("No status updates found"));
        assert!(report.contains("No data available"));
    }

    #[test]
    fn import_summary_truncates() {
        let entries: Vec<GroupedStatus> = (1..=12)
            .map(|day| GroupedStatus {
                team_name: "Alpha".to_string(),
                user_name: "Bob".to_string(),
                date: format!("{day}-May"),
                responses: vec![QuestionAnswer {
                    question: "Q1".to_string(),
                    answer: "done".to_string(),
                }],
                is_leave: false,
                leave_reason: None,
            })
            .collect();
        let summary = summarize_import(&entries);
        assert!(summary.starts_with("Processed 12 status entries"));
        assert!(summary.contains("- Alpha / Bob on 1-May [present] Q1: done"));
        assert!(!summary.contains("on 11-May"));
        assert!(summary.contains("Showing first 10 of 12 status entries"));
    }
}
