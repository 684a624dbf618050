use crate::error::DigestError;
use crate::model::{CloneTraffic, RepoEntry, TrafficKind, ViewTraffic};
use crate::store::StatsStore;
use crate::util::split_repo_name;
use anyhow::Context;
use console::style;
use std::path::Path;
use tracing::info;

pub fn init(dsn: &str) -> anyhow::Result<()> {
    StatsStore::create(dsn).context("Failed to initialize statistics store")?;
    info!(%dsn, "statistics store ready");
    println!("Initialized statistics store at {}", style(dsn).cyan());
    Ok(())
}

pub fn add_account(dsn: &str, email: &str) -> anyhow::Result<()> {
    if email.trim().is_empty() {
        anyhow::bail!("account email must not be empty");
    }
    let store = StatsStore::create(dsn).context("Failed to open statistics store")?;
    if store.add_account(email)? {
        info!(%email, "account created");
        println!("Added account {}", style(email).cyan());
    } else {
        println!("Account {} already exists", style(email).cyan());
    }
    Ok(())
}

pub fn add_repo(dsn: &str, email: &str, repo: &str) -> anyhow::Result<()> {
    let (org, name) = split_repo_name(repo)?;
    let mut store = StatsStore::create(dsn).context("Failed to open statistics store")?;
    let rid = store
        .add_repo(email, org, name)
        .with_context(|| format!("Failed to add {repo}"))?;
    info!(%email, %repo, rid, "repository linked");
    println!("Added {} (id {})", style(repo).cyan(), rid);
    Ok(())
}

pub fn remove_repo(dsn: &str, email: &str, repo: &str) -> anyhow::Result<()> {
    let (org, name) = split_repo_name(repo)?;
    let mut store = StatsStore::create(dsn).context("Failed to open statistics store")?;
    store
        .remove_repo(email, org, name)
        .with_context(|| format!("Failed to remove {repo}"))?;
    info!(%email, %repo, "repository unlinked");
    println!("Removed {}", style(repo).cyan());
    Ok(())
}

pub fn list_repos(dsn: &str, email: &str, json: bool) -> anyhow::Result<()> {
    let store = StatsStore::open(dsn).context("Failed to open statistics store")?;
    let repos = store.list_repos(email)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&repos)?);
    } else {
        output_repo_table(email, &repos);
    }
    Ok(())
}

fn output_repo_table(email: &str, repos: &[RepoEntry]) {
    println!("{}", style(format!("Repositories of {email}")).bold());
    println!("{}", "─".repeat(50));
    if repos.is_empty() {
        println!("No repositories");
        return;
    }
    for repo in repos {
        println!(
            "{:>6}  {}/{}",
            style(repo.repo_id).dim(),
            repo.org_name,
            style(&repo.repo_name).cyan()
        );
    }
    println!("\nTotal repositories: {}", style(repos.len()).yellow());
}

pub fn import_traffic(
    dsn: &str,
    repo: &str,
    views: Option<&Path>,
    clones: Option<&Path>,
) -> anyhow::Result<()> {
    if views.is_none() && clones.is_none() {
        anyhow::bail!("nothing to import, pass --views and/or --clones");
    }
    let (org, name) = split_repo_name(repo)?;
    let mut store = StatsStore::create(dsn).context("Failed to open statistics store")?;

    if let Some(path) = views {
        let traffic: ViewTraffic = read_json(path)?;
        let merged = store.merge_traffic(org, name, TrafficKind::Views, &traffic.views)?;
        info!(%repo, days = traffic.views.len(), merged, "view traffic merged");
        println!("Views: merged {} of {} days", style(merged).green(), traffic.views.len());
    }
    if let Some(path) = clones {
        let traffic: CloneTraffic = read_json(path)?;
        let merged = store.merge_traffic(org, name, TrafficKind::Clones, &traffic.clones)?;
        info!(%repo, days = traffic.clones.len(), merged, "clone traffic merged");
        println!("Clones: merged {} of {} days", style(merged).green(), traffic.clones.len());
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .map_err(DigestError::from)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let parsed = serde_json::from_str(&raw)
        .map_err(DigestError::from)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(parsed)
}
