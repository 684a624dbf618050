use crate::model::{Attachment, DigestMessage, RepoStatRow, ReportWindow, WebhookPayload, WeeklyReport};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::fmt::Write;

const FENCE: &str = "```";
const FALLBACK: &str = "Weekly top 25 repositories";

pub fn summary_line(repo_count: u64, link: &str) -> String {
    format!("Total repositories: {repo_count}\nSee more at {link}")
}

/// Bytes that would break the table layout, plus `/` so org and name stay separable.
const TABLE: &AsciiSet = &CONTROLS.add(b',').add(b'%').add(b'`').add(b'/');

pub fn escape_field(value: &str) -> String {
    utf8_percent_encode(value, TABLE).to_string()
}

/// Fenced block with one `org/repo,views,uniques,clones,cuniques` line per row.
pub fn table_body(rows: &[RepoStatRow]) -> String {
    let mut body = String::from(FENCE);
    body.push('\n');
    for row in rows {
        // Writing into a String cannot fail.
        let _ = writeln!(
            body,
            "{}/{},{},{},{},{}",
            escape_field(&row.org_name),
            escape_field(&row.repo_name),
            row.view_count,
            row.unique_viewers,
            row.clone_count,
            row.unique_cloners
        );
    }
    body.push_str(FENCE);
    body
}

pub fn compose(report: &WeeklyReport, window: &ReportWindow, link: &str) -> DigestMessage {
    DigestMessage {
        summary_line: summary_line(report.repo_count, link),
        attachment_title: format!("Top 25 repositories by unique views ({})", window.label()),
        attachment_body: table_body(&report.rows),
    }
}

impl WebhookPayload {
    pub fn new(message: &DigestMessage, channel: &str) -> Self {
        Self {
            text: message.summary_line.clone(),
            channel: channel.to_string(),
            attachments: vec![Attachment {
                fallback: FALLBACK.to_string(),
                title: message.attachment_title.clone(),
                mrkdwn_in: vec!["text".to_string()],
                text: message.attachment_body.clone(),
            }],
        }
    }
}
