use std::collections::BTreeSet;

use chrono::NaiveDate;
use sqlx::{PgConnection, Postgres, QueryBuilder, Row};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Session;
use crate::error::StatusError;
use crate::filters::{DateWindow, ExportFilters};
use crate::import::parse_date_label;
use crate::models::{
    GroupedStatus, QuestionRef, ResponseRecord, StatusRecord, TeamRef, UploadSummary, UserRef,
};

pub async fn init_db(session: &Session) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(&session.pool).await?;
    Ok(())
}

/// Inserts or replaces one status per grouped entry. Entries whose date
/// label cannot be resolved in `year` are skipped and counted.
pub async fn upsert_statuses(
    session: &Session,
    entries: &[GroupedStatus],
    year: i32,
) -> Result<UploadSummary, StatusError> {
    let mut summary = UploadSummary {
        status_entries: entries.len(),
        ..Default::default()
    };
    let mut teams = BTreeSet::new();
    let mut users = BTreeSet::new();
    let mut questions = BTreeSet::new();

    let mut tx = session.pool.begin().await?;

    for entry in entries {
        let Some(status_date) = parse_date_label(&entry.date, year) else {
            warn!(label = %entry.date, user = %entry.user_name, "skipping unrecognised date label");
            summary.skipped_count += 1;
            continue;
        };

        let team_id = upsert_team(&mut tx, &entry.team_name).await?;
        let user_id = upsert_user(&mut tx, &entry.user_name).await?;
        teams.insert(entry.team_name.clone());
        users.insert(entry.user_name.clone());

        let row = sqlx::query(
            r#"
            INSERT INTO status_matrix.statuses
            (id, user_id, team_id, status_date, is_leave, leave_reason, imported_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id, team_id, status_date) DO UPDATE
            SET is_leave = EXCLUDED.is_leave,
                leave_reason = EXCLUDED.leave_reason,
                imported_by = EXCLUDED.imported_by,
                updated_at = NOW()
            RETURNING id, (xmax = 0) AS inserted
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(team_id)
        .bind(status_date)
        .bind(entry.is_leave)
        .bind(entry.leave_reason.as_deref())
        .bind(&session.actor)
        .fetch_one(&mut *tx)
        .await?;

        let status_id: Uuid = row.try_get("id")?;
        if row.try_get::<bool, _>("inserted")? {
            summary.inserted_count += 1;
        } else {
            summary.modified_count += 1;
        }

        sqlx::query("DELETE FROM status_matrix.responses WHERE status_id = $1")
            .bind(status_id)
            .execute(&mut *tx)
            .await?;

        for (position, response) in entry.responses.iter().enumerate() {
            let question_id = upsert_question(&mut tx, &response.question).await?;
            questions.insert(response.question.clone());

            sqlx::query(
                r#"
                INSERT INTO status_matrix.responses (status_id, question_id, position, answer)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(status_id)
            .bind(question_id)
            .bind(position as i32)
            .bind(&response.answer)
            .execute(&mut *tx)
            .await?;
            summary.responses_written += 1;
        }
    }

    tx.commit().await?;

    summary.teams_processed = teams.into_iter().collect();
    summary.users_processed = users.into_iter().collect();
    summary.questions_processed = questions.into_iter().collect();
    info!(
        inserted = summary.inserted_count,
        modified = summary.modified_count,
        skipped = summary.skipped_count,
        "stored status entries"
    );
    Ok(summary)
}

async fn upsert_team(conn: &mut PgConnection, name: &str) -> Result<Uuid, StatusError> {
    let id = sqlx::query(
        r#"
        INSERT INTO status_matrix.teams (id, name)
        VALUES ($1, $2)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .fetch_one(conn)
    .await?
    .try_get("id")?;
    Ok(id)
}

async fn upsert_user(conn: &mut PgConnection, name: &str) -> Result<Uuid, StatusError> {
    let id = sqlx::query(
        r#"
        INSERT INTO status_matrix.users (id, name)
        VALUES ($1, $2)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .fetch_one(conn)
    .await?
    .try_get("id")?;
    Ok(id)
}

async fn upsert_question(conn: &mut PgConnection, text: &str) -> Result<Uuid, StatusError> {
    let id = sqlx::query(
        r#"
        INSERT INTO status_matrix.questions (id, text)
        VALUES ($1, $2)
        ON CONFLICT (text) DO UPDATE SET text = EXCLUDED.text
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(text)
    .fetch_one(conn)
    .await?
    .try_get("id")?;
    Ok(id)
}

/// One joined row per response (or one bare row for a status with none).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StatusRow {
    pub status_id: Uuid,
    pub status_date: NaiveDate,
    pub is_leave: bool,
    pub leave_reason: Option<String>,
    pub team_id: Uuid,
    pub team_name: String,
    pub user_id: Uuid,
    pub user_name: String,
    pub question_id: Option<Uuid>,
    pub question_text: Option<String>,
    pub answer: Option<String>,
}

pub async fn fetch_statuses(
    session: &Session,
    filters: &ExportFilters,
    window: &DateWindow,
) -> Result<Vec<StatusRecord>, StatusError> {
    let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT s.id AS status_id, s.status_date, s.is_leave, s.leave_reason, \
         t.id AS team_id, t.name AS team_name, u.id AS user_id, u.name AS user_name, \
         q.id AS question_id, q.text AS question_text, r.answer \
         FROM status_matrix.statuses s \
         JOIN status_matrix.teams t ON t.id = s.team_id \
         JOIN status_matrix.users u ON u.id = s.user_id \
         LEFT JOIN status_matrix.responses r ON r.status_id = s.id \
         LEFT JOIN status_matrix.questions q ON q.id = r.question_id \
         WHERE TRUE",
    );

    if let Some(team) = filters.team.as_deref() {
        query.push(" AND t.name = ").push_bind(team.to_string());
    }
    if let Some(user) = filters.user.as_deref() {
        query.push(" AND u.name = ").push_bind(user.to_string());
    }
    if let Some(start) = window.start {
        query.push(" AND s.status_date >= ").push_bind(start);
    }
    if let Some(end) = window.end {
        query.push(" AND s.status_date <= ").push_bind(end);
    }
    query.push(" ORDER BY s.status_date, t.name, u.name, s.id, r.position");

    let rows: Vec<StatusRow> = query.build_query_as().fetch_all(&session.pool).await?;
    let records = assemble_records(rows);
    info!(statuses = records.len(), "fetched status records");
    Ok(records)
}

/// Folds consecutive rows of the same status into one record.
pub fn assemble_records(rows: Vec<StatusRow>) -> Vec<StatusRecord> {
    let mut records: Vec<StatusRecord> = Vec::new();
    let mut current: Option<Uuid> = None;

    for row in rows {
        if current != Some(row.status_id) {
            current = Some(row.status_id);
            records.push(StatusRecord {
                id: Some(row.status_id.to_string()),
                user: Some(UserRef {
                    id: row.user_id.to_string(),
                    name: row.user_name.clone(),
                }),
                team: Some(TeamRef {
                    id: row.team_id.to_string(),
                    name: row.team_name.clone(),
                }),
                date: row.status_date,
                is_leave: row.is_leave,
                leave_reason: row.leave_reason.clone(),
                responses: Vec::new(),
            });
        }

        let (Some(question_id), Some(answer)) = (row.question_id, row.answer) else {
            continue;
        };
        if let Some(record) = records.last_mut() {
            record.responses.push(ResponseRecord {
                question: Some(match row.question_text {
                    Some(text) => QuestionRef::Object {
                        id: question_id.to_string(),
                        text,
                    },
                    None => QuestionRef::Id(question_id.to_string()),
                }),
                answer,
            });
        }
    }

    records
}
