use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

/// Number of repositories listed in a weekly digest.
pub const TOP_REPOS: usize = 25;

pub const DEFAULT_LINK: &str = "https://cps-github-stats.mybluemix.net/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoStatRow {
    pub repo_id: i64,
    pub org_name: String,
    pub repo_name: String,
    pub view_count: u64,
    pub unique_viewers: u64,
    pub clone_count: u64,
    pub unique_cloners: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoEntry {
    pub repo_id: i64,
    pub org_name: String,
    pub repo_name: String,
}

/// Traffic of one repository on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStat {
    pub repo_id: i64,
    pub org_name: String,
    pub repo_name: String,
    pub date: NaiveDate,
    pub view_count: u64,
    pub unique_viewers: u64,
    pub clone_count: u64,
    pub unique_cloners: u64,
}

/// Traffic of one repository summed over an ISO work week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyStat {
    pub repo_id: i64,
    pub org_name: String,
    pub repo_name: String,
    pub week: String,
    pub view_count: u64,
    pub unique_viewers: u64,
    pub clone_count: u64,
    pub unique_cloners: u64,
}

/// Everything read from the store for one digest.
#[derive(Debug, Clone)]
pub struct WeeklyReport {
    pub rows: Vec<RepoStatRow>,
    pub repo_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestMessage {
    pub summary_line: String,
    pub attachment_title: String,
    pub attachment_body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub text: String,
    pub channel: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub fallback: String,
    pub title: String,
    pub mrkdwn_in: Vec<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Posted,
    Failed { reason: String },
}

impl DeliveryOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            DeliveryOutcome::Posted => "ok, message posted",
            DeliveryOutcome::Failed { .. } => "failed to post",
        }
    }
}

/// What the `digest` command prints: `{"message": ...}` or `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobOutput {
    Message(String),
    Error(String),
}

/// One day of GitHub traffic as returned by the traffic API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficDay {
    pub timestamp: String,
    pub count: u64,
    pub uniques: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewTraffic {
    #[serde(default)]
    pub views: Vec<TrafficDay>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloneTraffic {
    #[serde(default)]
    pub clones: Vec<TrafficDay>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficKind {
    Views,
    Clones,
}
