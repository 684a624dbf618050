use crate::error::{DigestError, Result};
use crate::model::{
    DailyStat, RepoEntry, RepoStatRow, ReportWindow, TrafficDay, TrafficKind, WeeklyReport, SCHEMA_VERSION,
    TOP_REPOS,
};
use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, ToSql};
use tracing::debug;

const WEEKLY_STATS_SQL: &str = "
    SELECT r.rid, r.orgname, r.reponame,
           SUM(r.viewcount) AS viewcount, SUM(r.vuniques) AS vuniques,
           SUM(r.clonecount) AS clonecount, SUM(r.cuniques) AS cuniques
    FROM v_repostats r
    JOIN v_adminuserrepos v ON r.rid = v.rid
    WHERE r.tdate BETWEEN ?2 AND ?3
      AND v.email = ?1
    GROUP BY r.rid, r.orgname, r.reponame
    ORDER BY vuniques DESC, r.rid ASC
    LIMIT ?4";

const REPO_COUNT_SQL: &str = "SELECT COUNT(rid) FROM v_adminuserrepos WHERE email = ?1";

pub struct StatsStore {
    conn: Connection,
}

impl StatsStore {
    /// Opens an existing store read-only. `dsn` is a path or a `file:` URI.
    pub fn open(dsn: &str) -> Result<Self> {
        let conn = Connection::open_with_flags(
            dsn,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let store = Self { conn };
        match store.schema_version()? {
            v if v == SCHEMA_VERSION => Ok(store),
            found => Err(DigestError::SchemaMismatch {
                expected: SCHEMA_VERSION,
                found,
            }),
        }
    }

    /// Opens the store for writing, creating the file and schema if needed.
    pub fn create(dsn: &str) -> Result<Self> {
        let conn = Connection::open_with_flags(
            dsn,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let store = Self { conn };
        store.conn.pragma_update(None, "foreign_keys", true)?;
        match store.schema_version()? {
            0 => store.initialize()?,
            v if v == SCHEMA_VERSION => {}
            found => {
                return Err(DigestError::SchemaMismatch {
                    expected: SCHEMA_VERSION,
                    found,
                })
            }
        }
        Ok(store)
    }

    fn schema_version(&self) -> Result<u32> {
        let version = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        Ok(version)
    }

    /// Creates the schema in an unversioned store and stamps it.
    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS accounts (
                aid INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS orgs (
                oid INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS repos (
                rid INTEGER PRIMARY KEY,
                oid INTEGER NOT NULL REFERENCES orgs(oid),
                rname TEXT NOT NULL,
                UNIQUE (oid, rname)
            );
            CREATE TABLE IF NOT EXISTS account_repos (
                aid INTEGER NOT NULL REFERENCES accounts(aid) ON DELETE CASCADE,
                rid INTEGER NOT NULL REFERENCES repos(rid) ON DELETE CASCADE,
                PRIMARY KEY (aid, rid)
            );
            CREATE TABLE IF NOT EXISTS repotraffic (
                rid INTEGER NOT NULL REFERENCES repos(rid) ON DELETE CASCADE,
                tdate TEXT NOT NULL,
                viewcount INTEGER NOT NULL DEFAULT 0,
                vuniques INTEGER NOT NULL DEFAULT 0,
                clonecount INTEGER NOT NULL DEFAULT 0,
                cuniques INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (rid, tdate)
            );
            CREATE INDEX IF NOT EXISTS idx_repotraffic_tdate ON repotraffic(tdate);
            CREATE VIEW IF NOT EXISTS v_repostats AS
                SELECT r.rid, o.username AS orgname, r.rname AS reponame, t.tdate,
                       t.viewcount, t.vuniques, t.clonecount, t.cuniques
                FROM repotraffic t
                JOIN repos r ON r.rid = t.rid
                JOIN orgs o ON o.oid = r.oid;
            CREATE VIEW IF NOT EXISTS v_adminuserrepos AS
                SELECT a.email, r.rid, o.username AS orgname, r.rname AS reponame
                FROM account_repos ar
                JOIN accounts a ON a.aid = ar.aid
                JOIN repos r ON r.rid = ar.rid
                JOIN orgs o ON o.oid = r.oid;
            ",
        )?;
        self.conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
    }

    pub fn account_exists(&self, email: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM accounts WHERE email = ?1", params![email], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// Top repositories by unique viewers within `window`, at most [`TOP_REPOS`].
    pub fn weekly_top_repos(&self, email: &str, window: &ReportWindow) -> Result<Vec<RepoStatRow>> {
        debug!(%email, start = %window.start, end = %window.end, "querying weekly stats");
        let mut stmt = self.conn.prepare(WEEKLY_STATS_SQL)?;
        let rows = stmt.query_map(
            params![email, window.start, window.end, TOP_REPOS as i64],
            |row| {
                Ok(RepoStatRow {
                    repo_id: row.get(0)?,
                    org_name: row.get(1)?,
                    repo_name: row.get(2)?,
                    view_count: row.get(3)?,
                    unique_viewers: row.get(4)?,
                    clone_count: row.get(5)?,
                    unique_cloners: row.get(6)?,
                })
            },
        )?;
        let stats = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(stats)
    }

    pub fn repo_count(&self, email: &str) -> Result<u64> {
        Ok(self
            .conn
            .query_row(REPO_COUNT_SQL, params![email], |row| row.get(0))?)
    }

    /// Reads everything a digest needs for one account.
    pub fn weekly_report(&self, email: &str, window: &ReportWindow) -> Result<WeeklyReport> {
        if !self.account_exists(email)? {
            return Err(DigestError::UnknownAccount(email.to_string()));
        }
        let rows = self.weekly_top_repos(email, window)?;
        let repo_count = self.repo_count(email)?;
        Ok(WeeklyReport { rows, repo_count })
    }

    /// Per-day traffic of the account's repositories, optionally bounded by
    /// `since`/`until` (inclusive), ordered by org, repository and day.
    pub fn daily_stats(
        &self,
        email: &str,
        since: Option<NaiveDate>,
        until: Option<NaiveDate>,
    ) -> Result<Vec<DailyStat>> {
        self.account_id(email)?;
        let mut query = String::from(
            "SELECT r.rid, r.orgname, r.reponame, r.tdate,
                    r.viewcount, r.vuniques, r.clonecount, r.cuniques
             FROM v_repostats r
             JOIN v_adminuserrepos v ON r.rid = v.rid
             WHERE v.email = ?",
        );
        let mut to_bind: Vec<Box<dyn ToSql>> = vec![Box::new(email.to_string())];
        if let Some(since) = since {
            query.push_str(" AND r.tdate >= ?");
            to_bind.push(Box::new(since));
        }
        if let Some(until) = until {
            query.push_str(" AND r.tdate <= ?");
            to_bind.push(Box::new(until));
        }
        query.push_str(" ORDER BY r.orgname, r.reponame, r.tdate");

        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(params_from_iter(to_bind.iter()), |row| {
            Ok(DailyStat {
                repo_id: row.get(0)?,
                org_name: row.get(1)?,
                repo_name: row.get(2)?,
                date: row.get(3)?,
                view_count: row.get(4)?,
                unique_viewers: row.get(5)?,
                clone_count: row.get(6)?,
                unique_cloners: row.get(7)?,
            })
        })?;
        let stats = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(stats)
    }

    /// Returns true when the account was newly created.
    pub fn add_account(&self, email: &str) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT INTO accounts (email) VALUES (?1) ON CONFLICT(email) DO NOTHING",
            params![email],
        )?;
        Ok(inserted > 0)
    }

    fn account_id(&self, email: &str) -> Result<i64> {
        self.conn
            .query_row("SELECT aid FROM accounts WHERE email = ?1", params![email], |row| {
                row.get(0)
            })
            .optional()?
            .ok_or_else(|| DigestError::UnknownAccount(email.to_string()))
    }

    fn repo_id(&self, org: &str, name: &str) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT r.rid FROM repos r JOIN orgs o ON o.oid = r.oid
                 WHERE o.username = ?1 AND r.rname = ?2",
                params![org, name],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Creates the org and repository rows if missing and links them to `email`.
    pub fn add_repo(&mut self, email: &str, org: &str, name: &str) -> Result<i64> {
        let aid = self.account_id(email)?;
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO orgs (username) VALUES (?1) ON CONFLICT(username) DO NOTHING",
            params![org],
        )?;
        let oid: i64 = tx.query_row(
            "SELECT oid FROM orgs WHERE username = ?1",
            params![org],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO repos (oid, rname) VALUES (?1, ?2) ON CONFLICT(oid, rname) DO NOTHING",
            params![oid, name],
        )?;
        let rid: i64 = tx.query_row(
            "SELECT rid FROM repos WHERE oid = ?1 AND rname = ?2",
            params![oid, name],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT OR IGNORE INTO account_repos (aid, rid) VALUES (?1, ?2)",
            params![aid, rid],
        )?;

        tx.commit()?;
        Ok(rid)
    }

    /// Unlinks the repository from `email`; drops it with its traffic once unreferenced.
    pub fn remove_repo(&mut self, email: &str, org: &str, name: &str) -> Result<()> {
        let aid = self.account_id(email)?;
        let not_linked = || DigestError::RepoNotLinked {
            email: email.to_string(),
            repo: format!("{org}/{name}"),
        };
        let rid = self.repo_id(org, name)?.ok_or_else(not_linked)?;

        let tx = self.conn.transaction()?;
        let unlinked = tx.execute(
            "DELETE FROM account_repos WHERE aid = ?1 AND rid = ?2",
            params![aid, rid],
        )?;
        if unlinked == 0 {
            return Err(not_linked());
        }
        tx.execute(
            "DELETE FROM repos WHERE rid = ?1
             AND NOT EXISTS (SELECT 1 FROM account_repos WHERE rid = ?1)",
            params![rid],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn list_repos(&self, email: &str) -> Result<Vec<RepoEntry>> {
        self.account_id(email)?;
        let mut stmt = self.conn.prepare(
            "SELECT rid, orgname, reponame FROM v_adminuserrepos
             WHERE email = ?1 ORDER BY orgname, reponame",
        )?;
        let rows = stmt.query_map(params![email], |row| {
            Ok(RepoEntry {
                repo_id: row.get(0)?,
                org_name: row.get(1)?,
                repo_name: row.get(2)?,
            })
        })?;
        let repos = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(repos)
    }

    /// Merges daily traffic for one repository. An existing day is only
    /// overwritten when the incoming count is greater.
    pub fn merge_traffic(
        &mut self,
        org: &str,
        name: &str,
        kind: TrafficKind,
        days: &[TrafficDay],
    ) -> Result<usize> {
        let rid = self
            .repo_id(org, name)?
            .ok_or_else(|| DigestError::Store(format!("Unknown repository {org}/{name}")))?;

        let sql = match kind {
            TrafficKind::Views => {
                "INSERT INTO repotraffic (rid, tdate, viewcount, vuniques) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(rid, tdate) DO UPDATE
                 SET viewcount = excluded.viewcount, vuniques = excluded.vuniques
                 WHERE excluded.viewcount > repotraffic.viewcount"
            }
            TrafficKind::Clones => {
                "INSERT INTO repotraffic (rid, tdate, clonecount, cuniques) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(rid, tdate) DO UPDATE
                 SET clonecount = excluded.clonecount, cuniques = excluded.cuniques
                 WHERE excluded.clonecount > repotraffic.clonecount"
            }
        };

        let tx = self.conn.transaction()?;
        let mut merged = 0;
        {
            let mut stmt = tx.prepare(sql)?;
            for day in days {
                let date = day
                    .timestamp
                    .get(..10)
                    .ok_or_else(|| DigestError::InvalidDate(day.timestamp.clone()))?;
                let date = crate::util::parse_date(date)?;
                merged += stmt.execute(params![rid, date, day.count, day.uniques])?;
            }
        }
        tx.commit()?;
        Ok(merged)
    }
}
