use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, Utc};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::JiraConfig;

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";
const REQUEST_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status code {status} from {url}")]
    Status { status: StatusCode, url: String },
    #[error("you are not allowed to delete this entry")]
    Forbidden,
    #[error("invalid input")]
    InvalidInput,
    #[error("failed to parse worklog start {raw:?}: {source}")]
    Timestamp {
        raw: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// External issue tracker receiving the day's bookings as worklogs.
pub trait WorklogTracker {
    fn add_worklog(
        &self,
        task_code: &str,
        start: DateTime<Utc>,
        duration: Duration,
    ) -> Result<(), TrackerError>;
    fn remove_logs_for_date(&self, day: NaiveDate) -> Result<(), TrackerError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorklogCreation {
    started: String,
    time_spent_seconds: i64,
    comment: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    #[serde(default)]
    total: i64,
    #[serde(default)]
    max_results: i64,
    #[serde(default)]
    issues: Vec<SearchResultIssue>,
}

#[derive(Debug, Deserialize)]
struct SearchResultIssue {
    key: String,
}

#[derive(Debug, Deserialize)]
struct WorklogResult {
    #[serde(default)]
    worklogs: Vec<WorklogItem>,
}

#[derive(Debug, Deserialize)]
struct WorklogItem {
    author: WorklogAuthor,
    started: String,
    #[serde(rename = "self")]
    self_url: String,
}

#[derive(Debug, Deserialize)]
struct WorklogAuthor {
    #[serde(default)]
    name: String,
}

pub struct JiraClient {
    base_url: String,
    username: String,
    password: String,
    http: Client,
}

impl JiraClient {
    pub fn new(config: &JiraConfig) -> Result<Self, TrackerError> {
        let http = Client::builder()
            .timeout(StdDuration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            http,
        })
    }

    fn search_issues(&self, jql: &str) -> Result<Vec<SearchResultIssue>, TrackerError> {
        let url = format!("{}/rest/api/2/search", self.base_url);
        let mut issues = Vec::new();
        let mut offset = 0i64;

        loop {
            let page: SearchResult = self
                .http
                .get(&url)
                .basic_auth(&self.username, Some(&self.password))
                .query(&[
                    ("jql", jql.to_string()),
                    ("fields", "key,id".to_string()),
                    ("startAt", offset.to_string()),
                ])
                .send()?
                .error_for_status()?
                .json()?;

            let received = page.issues.len();
            issues.extend(page.issues);
            if received == 0 || page.total <= issues.len() as i64 {
                break;
            }
            offset += page.max_results.max(received as i64);
        }

        Ok(issues)
    }

    fn issue_worklogs(&self, issue_key: &str) -> Result<Vec<WorklogItem>, TrackerError> {
        let url = format!("{}/rest/api/2/issue/{issue_key}/worklog", self.base_url);
        let result: WorklogResult = self
            .http
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()?
            .error_for_status()?
            .json()?;
        Ok(result.worklogs)
    }

    fn remove_worklog_item(&self, item_url: &str) -> Result<(), TrackerError> {
        info!(url = item_url, "removing worklog item");
        let response = self
            .http
            .delete(item_url)
            .basic_auth(&self.username, Some(&self.password))
            .send()?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            StatusCode::FORBIDDEN => Err(TrackerError::Forbidden),
            StatusCode::BAD_REQUEST => Err(TrackerError::InvalidInput),
            status => Err(TrackerError::Status {
                status,
                url: item_url.to_string(),
            }),
        }
    }
}

impl WorklogTracker for JiraClient {
    fn add_worklog(
        &self,
        task_code: &str,
        start: DateTime<Utc>,
        duration: Duration,
    ) -> Result<(), TrackerError> {
        let url = format!("{}/rest/api/2/issue/{task_code}/worklog", self.base_url);
        let body = worklog_creation(task_code, start, duration);
        info!(code = task_code, seconds = body.time_spent_seconds, "adding worklog");

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()?;

        if response.status() != StatusCode::CREATED {
            let status = response.status();
            warn!(code = task_code, %status, "failed to create worklog");
            return Err(TrackerError::Status { status, url });
        }
        Ok(())
    }

    fn remove_logs_for_date(&self, day: NaiveDate) -> Result<(), TrackerError> {
        let jql = format!(
            "worklogAuthor = {} and worklogDate = {}",
            self.username,
            day.format("%Y-%m-%d")
        );

        let mut items = Vec::new();
        for issue in self.search_issues(&jql)? {
            for worklog in self.issue_worklogs(&issue.key)? {
                if worklog.author.name != self.username {
                    continue;
                }
                if parse_started(&worklog.started)?.with_timezone(&Local).date_naive() != day {
                    continue;
                }
                items.push(worklog.self_url);
            }
        }

        for item in items {
            self.remove_worklog_item(&item)?;
        }
        Ok(())
    }
}

fn worklog_creation(task_code: &str, start: DateTime<Utc>, duration: Duration) -> WorklogCreation {
    WorklogCreation {
        started: start.format(DATETIME_FORMAT).to_string(),
        time_spent_seconds: (duration.num_milliseconds() + 500) / 1000,
        comment: format!("Working on {task_code}"),
    }
}

fn parse_started(raw: &str) -> Result<DateTime<FixedOffset>, TrackerError> {
    DateTime::parse_from_str(raw, DATETIME_FORMAT).map_err(|source| TrackerError::Timestamp {
        raw: raw.to_string(),
        source,
    })
}
