use crate::model::{DailyStat, WeeklyStat};
use crate::store::StatsStore;
use crate::util::week_key;
use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Prints the account's traffic per repository and day, or per ISO work week
/// when `weekly` is set. CSV with a header row unless `json`.
pub fn exec(
    dsn: &str,
    email: &str,
    since: Option<NaiveDate>,
    until: Option<NaiveDate>,
    weekly: bool,
    json: bool,
) -> anyhow::Result<()> {
    let store = StatsStore::open(dsn).context("Failed to open statistics store")?;
    let daily = store
        .daily_stats(email, since, until)
        .with_context(|| format!("Failed to read statistics of {email}"))?;
    drop(store);
    info!(%email, days = daily.len(), weekly, "exporting statistics");

    if weekly {
        write_rows(&aggregate_weeks(&daily), json)
    } else {
        write_rows(&daily, json)
    }
}

/// Sums daily rows per repository and ISO week, keeping the input's repository
/// order and listing weeks in ascending order.
pub fn aggregate_weeks(daily: &[DailyStat]) -> Vec<WeeklyStat> {
    let mut order: Vec<i64> = Vec::new();
    let mut weeks: BTreeMap<(i64, String), WeeklyStat> = BTreeMap::new();
    for day in daily {
        if !order.contains(&day.repo_id) {
            order.push(day.repo_id);
        }
        let week = week_key(day.date);
        let entry = weeks
            .entry((day.repo_id, week.clone()))
            .or_insert_with(|| WeeklyStat {
                repo_id: day.repo_id,
                org_name: day.org_name.clone(),
                repo_name: day.repo_name.clone(),
                week,
                view_count: 0,
                unique_viewers: 0,
                clone_count: 0,
                unique_cloners: 0,
            });
        entry.view_count += day.view_count;
        entry.unique_viewers += day.unique_viewers;
        entry.clone_count += day.clone_count;
        entry.unique_cloners += day.unique_cloners;
    }

    order
        .into_iter()
        .flat_map(|rid| {
            weeks
                .range((rid, String::new())..)
                .take_while(move |((id, _), _)| *id == rid)
                .map(|(_, stat)| stat.clone())
                .collect::<Vec<_>>()
        })
        .collect()
}

fn write_rows<T: Serialize>(rows: &[T], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(rows)?);
        return Ok(());
    }
    let mut writer = csv::Writer::from_writer(std::io::stdout());
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn day(repo_id: i64, name: &str, date: &str, views: u64, uniques: u64) -> DailyStat {
        DailyStat {
            repo_id,
            org_name: "acme".to_string(),
            repo_name: name.to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            view_count: views,
            unique_viewers: uniques,
            clone_count: 1,
            unique_cloners: 1,
        }
    }

    #[test]
    fn days_are_summed_per_repo_and_iso_week() {
        let daily = vec![
            day(2, "rocket", "2024-08-18", 6, 3),
            day(2, "rocket", "2024-08-19", 5, 5),
            day(2, "rocket", "2024-08-12", 4, 2),
            day(1, "anvil", "2021-01-03", 1, 1),
            day(1, "anvil", "2021-01-04", 2, 2),
        ];
        let weekly = aggregate_weeks(&daily);
        let summary: Vec<(&str, &str, u64, u64, u64)> = weekly
            .iter()
            .map(|w| {
                (
                    w.repo_name.as_str(),
                    w.week.as_str(),
                    w.view_count,
                    w.unique_viewers,
                    w.clone_count,
                )
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                ("rocket", "2024-33", 10, 5, 2),
                ("rocket", "2024-34", 5, 5, 1),
                ("anvil", "2020-53", 1, 1, 1),
                ("anvil", "2021-01", 2, 2, 1),
            ]
        );
    }

    #[test]
    fn no_days_means_no_weeks() {
        assert!(aggregate_weeks(&[]).is_empty());
    }
}
