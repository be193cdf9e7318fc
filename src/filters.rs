use chrono::{Datelike, Months, NaiveDate};

use crate::error::StatusError;
use crate::models::StatusRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportFilters {
    pub team: Option<String>,
    pub user: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// `YYYY-MM`; takes precedence over the explicit range.
    pub month: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |start| date >= start) && self.end.map_or(true, |end| date <= end)
    }

    pub fn is_open(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

impl ExportFilters {
    pub fn date_window(&self) -> Result<DateWindow, StatusError> {
        if let Some(month) = self.month.as_deref() {
            let (start, end) = month_window(month)?;
            return Ok(DateWindow {
                start: Some(start),
                end: Some(end),
            });
        }

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(StatusError::Validation(format!(
                    "start date {start} is after end date {end}"
                )));
            }
        }

        Ok(DateWindow {
            start: self.start_date,
            end: self.end_date,
        })
    }

    /// Like [`date_window`](Self::date_window), but an unfiltered export
    /// covers the month containing `today`.
    pub fn export_window(&self, today: NaiveDate) -> Result<DateWindow, StatusError> {
        let window = self.date_window()?;
        if !window.is_open() {
            return Ok(window);
        }
        let (start, end) = month_bounds(today.year(), today.month())?;
        Ok(DateWindow {
            start: Some(start),
            end: Some(end),
        })
    }

    pub fn matches(&self, record: &StatusRecord, window: &DateWindow) -> bool {
        let team_ok = self.team.as_deref().map_or(true, |team| {
            record.team.as_ref().is_some_and(|t| t.name == team)
        });
        let user_ok = self.user.as_deref().map_or(true, |user| {
            record.user.as_ref().is_some_and(|u| u.name == user)
        });
        team_ok && user_ok && window.contains(record.date)
    }

    pub fn export_file_name(&self, today: NaiveDate) -> String {
        let mut name = String::from("status-report");

        match self.team.as_deref() {
            Some(team) => {
                name.push('-');
                name.push_str(&slug(team));
            }
            None => name.push_str("-all-teams"),
        }
        match self.user.as_deref() {
            Some(user) => {
                name.push('-');
                name.push_str(&slug(user));
            }
            None => name.push_str("-all-users"),
        }

        match (self.month.as_deref(), self.start_date, self.end_date) {
            (Some(month), _, _) => name.push_str(&format!("-{month}")),
            (None, Some(start), Some(end)) => name.push_str(&format!("-{start}-to-{end}")),
            _ => name.push_str(&format!("-{}", today.format("%Y-%m"))),
        }

        name.push_str(".xlsx");
        name
    }
}

/// First and last day of a `YYYY-MM` month.
pub fn month_window(month: &str) -> Result<(NaiveDate, NaiveDate), StatusError> {
    let invalid = || StatusError::Validation(format!("month must be YYYY-MM, got '{month}'"));
    let (year, month_number) = month.trim().split_once('-').ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month_number: u32 = month_number.parse().map_err(|_| invalid())?;
    month_bounds(year, month_number)
}

fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), StatusError> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| StatusError::Validation(format!("invalid month {year}-{month:02}")))?;
    let end = start
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or_else(|| StatusError::Validation(format!("invalid month {year}-{month:02}")))?;
    Ok((start, end))
}

fn slug(value: &str) -> String {
    value
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}
