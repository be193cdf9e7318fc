use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TeamRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

/// A response's question as the API returns it: usually the populated
/// object, occasionally just the id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum QuestionRef {
    Object {
        #[serde(rename = "_id")]
        id: String,
        text: String,
    },
    Id(String),
}

impl QuestionRef {
    pub fn id(&self) -> &str {
        match self {
            QuestionRef::Object { id, .. } => id,
            QuestionRef::Id(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResponseRecord {
    #[serde(default)]
    pub question: Option<QuestionRef>,
    #[serde(default)]
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub user: Option<UserRef>,
    #[serde(default)]
    pub team: Option<TeamRef>,
    #[serde(deserialize_with = "calendar_day")]
    pub date: NaiveDate,
    #[serde(default)]
    pub is_leave: bool,
    #[serde(default)]
    pub leave_reason: Option<String>,
    #[serde(default)]
    pub responses: Vec<ResponseRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionAnswer {
    pub question: String,
    pub answer: String,
}

/// One employee's day as read from an import sheet, ready for bulk upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedStatus {
    pub team_name: String,
    pub user_name: String,
    pub date: String,
    pub responses: Vec<QuestionAnswer>,
    pub is_leave: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leave_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportPayload<'a> {
    pub data: &'a [GroupedStatus],
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub status_entries: usize,
    pub inserted_count: usize,
    pub modified_count: usize,
    pub skipped_count: usize,
    pub responses_written: usize,
    pub teams_processed: Vec<String>,
    pub users_processed: Vec<String>,
    pub questions_processed: Vec<String>,
}

/// Reduces an ISO date or RFC 3339 timestamp to its UTC calendar day.
pub fn parse_calendar_day(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(value) {
        return Some(stamp.with_timezone(&Utc).date_naive());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|stamp| stamp.date())
}

fn calendar_day<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_calendar_day(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid status date: {raw}")))
}
