use crate::error::{DigestError, Result};
use crate::model::ReportWindow;
use chrono::{Datelike, Duration, NaiveDate};

/// ISO year-week label, e.g. `2024-33`.
pub fn week_key(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-{:02}", week.year(), week.week())
}

impl ReportWindow {
    /// The Monday..Sunday week containing `today - 7 days`.
    pub fn preceding(today: NaiveDate) -> Self {
        let reference = today - Duration::days(7);
        let start = reference - Duration::days(reference.weekday().num_days_from_monday() as i64);
        Self {
            start,
            end: start + Duration::days(6),
        }
    }

    pub fn label(&self) -> String {
        week_key(self.start)
    }
}

/// Splits `org/name` into its two parts.
pub fn split_repo_name(input: &str) -> Result<(&str, &str)> {
    match input.split_once('/') {
        Some((org, name)) if !org.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((org, name))
        }
        _ => Err(DigestError::InvalidRepoName(input.to_string())),
    }
}

pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|e| DigestError::InvalidDate(format!("'{input}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn window_is_previous_iso_week_for_every_weekday() {
        // 2024-08-19 is a Monday; the whole week should report week 33.
        for offset in 0..7 {
            let today = date("2024-08-19") + Duration::days(offset);
            let window = ReportWindow::preceding(today);
            assert_eq!(window.start, date("2024-08-12"));
            assert_eq!(window.end, date("2024-08-18"));
            assert_eq!(window.label(), "2024-33");
        }
    }

    #[test]
    fn label_uses_iso_year_at_year_boundary() {
        // 2021-01-10 minus 7 days is 2021-01-03, which belongs to 2020-W53.
        let window = ReportWindow::preceding(date("2021-01-10"));
        assert_eq!(window.label(), "2020-53");
        assert_eq!(window.start, date("2020-12-28"));
    }

    #[test]
    fn repo_name_must_have_org_and_name() {
        assert_eq!(split_repo_name("acme/widgets").unwrap(), ("acme", "widgets"));
        assert!(split_repo_name("widgets").is_err());
        assert!(split_repo_name("/widgets").is_err());
        assert!(split_repo_name("a/b/c").is_err());
    }
}
