use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::models::{Question, QuestionRef, StatusRecord};

pub const LEAVE_PLACEHOLDER: &str = "N/A (On Leave)";
pub const UNKNOWN_TEAM: &str = "Unknown Team";
pub const UNKNOWN_USER: &str = "Unknown User";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotQuestion {
    pub id: String,
    pub text: String,
    pub answers: BTreeMap<NaiveDate, String>,
}

impl PivotQuestion {
    fn new(id: &str, text: &str) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
            answers: BTreeMap::new(),
        }
    }

    /// `None` means nothing was recorded for that day.
    pub fn answer(&self, date: NaiveDate) -> Option<&str> {
        self.answers.get(&date).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotUser {
    pub name: String,
    pub user_id: Option<String>,
    pub questions: Vec<PivotQuestion>,
}

impl PivotUser {
    pub fn row_span(&self) -> usize {
        self.questions.len()
    }

    fn question_mut(&mut self, id: &str, text: &str) -> &mut PivotQuestion {
        let slot = match self.questions.iter().position(|q| q.id == id) {
            Some(slot) => slot,
            None => {
                self.questions.push(PivotQuestion::new(id, text));
                self.questions.len() - 1
            }
        };
        &mut self.questions[slot]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotTeam {
    pub name: String,
    pub users: Vec<PivotUser>,
}

impl PivotTeam {
    pub fn row_span(&self) -> usize {
        self.users.iter().map(PivotUser::row_span).sum()
    }

    fn user_mut(&mut self, name: &str, user_id: Option<&str>) -> &mut PivotUser {
        let slot = match self.users.iter().position(|u| u.name == name) {
            Some(slot) => slot,
            None => {
                self.users.push(PivotUser {
                    name: name.to_string(),
                    user_id: user_id.map(str::to_string),
                    questions: Vec::new(),
                });
                self.users.len() - 1
            }
        };
        let user = &mut self.users[slot];
        if user.user_id.is_none() {
            user.user_id = user_id.map(str::to_string);
        }
        user
    }
}

/// Team → user → question × date grid for review and export.
///
/// Teams and users are grouped by display name, so two teams sharing a name
/// collapse into one block. Dates run newest first over the full calendar
/// span of the input, including days nobody reported on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PivotTable {
    pub dates: Vec<NaiveDate>,
    pub teams: Vec<PivotTeam>,
    status_index: HashMap<(String, NaiveDate), String>,
}

impl PivotTable {
    pub fn build(records: &[StatusRecord], questions: &[Question]) -> Self {
        let mut table = PivotTable {
            dates: date_axis(records),
            ..Default::default()
        };

        for record in records {
            let team_name = record
                .team
                .as_ref()
                .map(|team| team.name.as_str())
                .unwrap_or(UNKNOWN_TEAM);
            let user_name = record
                .user
                .as_ref()
                .map(|user| user.name.as_str())
                .unwrap_or(UNKNOWN_USER);
            let user_id = record.user.as_ref().map(|user| user.id.as_str());

            if let (Some(user_id), Some(record_id)) = (user_id, record.id.as_ref()) {
                table
                    .status_index
                    .insert((user_id.to_string(), record.date), record_id.clone());
            }

            let user = table.team_mut(team_name).user_mut(user_name, user_id);

            if record.is_leave {
                for question in questions {
                    user.question_mut(&question.id, &question.text)
                        .answers
                        .insert(record.date, LEAVE_PLACEHOLDER.to_string());
                }
                continue;
            }

            for response in &record.responses {
                let Some(question) = response.question.as_ref() else {
                    continue;
                };
                let text = question_text(question, questions);
                user.question_mut(question.id(), text)
                    .answers
                    .insert(record.date, response.answer.clone());
            }
            for question in questions {
                user.question_mut(&question.id, &question.text);
            }
        }

        table
    }

    fn team_mut(&mut self, name: &str) -> &mut PivotTeam {
        let slot = match self.teams.iter().position(|t| t.name == name) {
            Some(slot) => slot,
            None => {
                self.teams.push(PivotTeam {
                    name: name.to_string(),
                    users: Vec::new(),
                });
                self.teams.len() - 1
            }
        };
        &mut self.teams[slot]
    }

    /// Id of the record behind a user's cell on `date`, for editing.
    pub fn record_id(&self, user_id: &str, date: NaiveDate) -> Option<&str> {
        self.status_index
            .get(&(user_id.to_string(), date))
            .map(String::as_str)
    }

    /// Teams that own at least one grid row.
    pub fn team_count(&self) -> usize {
        self.teams.iter().filter(|team| team.row_span() > 0).count()
    }

    /// Users that own at least one grid row. A user seen only on leave days
    /// while no question is known has nothing to render.
    pub fn user_count(&self) -> usize {
        self.teams
            .iter()
            .flat_map(|team| team.users.iter())
            .filter(|user| user.row_span() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.team_count() == 0
    }
}

fn question_text<'a>(question: &'a QuestionRef, known: &'a [Question]) -> &'a str {
    match question {
        QuestionRef::Object { text, .. } => text,
        QuestionRef::Id(id) => known
            .iter()
            .find(|q| &q.id == id)
            .map(|q| q.text.as_str())
            .unwrap_or(id),
    }
}

/// Every calendar day from the earliest to the latest record date, newest
/// first.
pub fn date_axis(records: &[StatusRecord]) -> Vec<NaiveDate> {
    let earliest = records.iter().map(|record| record.date).min();
    let latest = records.iter().map(|record| record.date).max();
    let (Some(earliest), Some(latest)) = (earliest, latest) else {
        return Vec::new();
    };

    let mut dates: Vec<NaiveDate> = earliest
        .iter_days()
        .take_while(|day| *day <= latest)
        .collect();
    dates.reverse();
    dates
}

/// Distinct questions referenced by the records, in first-seen order.
/// Questions only ever seen as a bare id use the id as their text.
pub fn collect_questions(records: &[StatusRecord]) -> Vec<Question> {
    let mut questions: Vec<Question> = Vec::new();
    for question in records
        .iter()
        .flat_map(|record| record.responses.iter())
        .filter_map(|response| response.question.as_ref())
    {
        let text = match question {
            QuestionRef::Object { text, .. } => text,
            QuestionRef::Id(id) => id,
        };
        match questions.iter().position(|q| q.id == question.id()) {
            // upgrade a bare-id placeholder once the full question shows up
            Some(slot) if questions[slot].text == questions[slot].id => {
                questions[slot].text = text.clone();
            }
            Some(_) => {}
            None => questions.push(Question {
                id: question.id().to_string(),
                text: text.clone(),
            }),
        }
    }
    questions
}

/// Distinct team names in first-seen order.
pub fn team_names(records: &[StatusRecord]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for record in records {
        let name = record
            .team
            .as_ref()
            .map(|team| team.name.as_str())
            .unwrap_or(UNKNOWN_TEAM);
        if !names.iter().any(|known| known == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Records belonging to the teams on a 1-based page of team names.
pub fn page_of_teams(records: &[StatusRecord], page: usize, per_page: usize) -> Vec<StatusRecord> {
    let Some(skip) = page.checked_sub(1).and_then(|p| p.checked_mul(per_page)) else {
        return Vec::new();
    };
    if per_page == 0 {
        return Vec::new();
    }
    let names = team_names(records);
    let page_names: Vec<&String> = names.iter().skip(skip).take(per_page).collect();

    records
        .iter()
        .filter(|record| {
            let name = record
                .team
                .as_ref()
                .map(|team| team.name.as_str())
                .unwrap_or(UNKNOWN_TEAM);
            page_names.iter().any(|known| known.as_str() == name)
        })
        .cloned()
        .collect()
}

pub fn page_count(records: &[StatusRecord], per_page: usize) -> usize {
    if per_page == 0 {
        return 0;
    }
    team_names(records).len().div_ceil(per_page)
}
