use crate::config::{Credentials, TriggerConfig};
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ghdigest")]
#[command(about = "Weekly GitHub traffic digest for chat webhooks")]
#[command(version)]
pub struct Cli {
    #[clap(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone)]
pub struct CommonArgs {
    #[arg(long, global = true, help = "Statistics store (SQLite path or file: URI) [env: GHDIGEST_DSN]")]
    pub dsn: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the statistics store
    Init,
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },
    Repo {
        #[command(subcommand)]
        command: RepoCommands,
    },
    Traffic {
        #[command(subcommand)]
        command: TrafficCommands,
    },
    /// Export daily or per-work-week traffic of an account
    Stats(StatsArgs),
    /// Post the weekly top repositories of an account to a webhook
    Digest(DigestArgs),
}

#[derive(Subcommand)]
pub enum AccountCommands {
    Add {
        #[arg(help = "Account email")]
        email: String,
    },
}

#[derive(Subcommand)]
pub enum RepoCommands {
    Add {
        #[arg(long, help = "Owning account email")]
        email: String,

        #[arg(help = "Repository as org/name")]
        repo: String,
    },
    Remove {
        #[arg(long, help = "Owning account email")]
        email: String,

        #[arg(help = "Repository as org/name")]
        repo: String,
    },
    List {
        #[arg(long, help = "Owning account email")]
        email: String,

        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum TrafficCommands {
    /// Merge GitHub traffic API responses into the store
    Import {
        #[arg(help = "Repository as org/name")]
        repo: String,

        #[arg(long, help = "File with a traffic/views response")]
        views: Option<PathBuf>,

        #[arg(long, help = "File with a traffic/clones response")]
        clones: Option<PathBuf>,
    },
}

#[derive(Args, Clone)]
pub struct StatsArgs {
    #[arg(long, help = "Owning account email")]
    pub email: String,

    #[arg(long, help = "Aggregate per ISO work week instead of per day")]
    pub weekly: bool,

    #[arg(long, help = "First day to include (YYYY-MM-DD)")]
    pub since: Option<String>,

    #[arg(long, help = "Last day to include (YYYY-MM-DD)")]
    pub until: Option<String>,

    #[arg(long, help = "Output as JSON instead of CSV")]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct DigestArgs {
    #[arg(long, env = "GHDIGEST_CONFIG", help = "Trigger configuration file (TOML)")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Trigger record as JSON: {emailid, webhook, channel, credentials: {dsn}}")]
    pub params: Option<String>,

    #[arg(long, help = "Account email")]
    pub email: Option<String>,

    #[arg(long, help = "Webhook URL")]
    pub webhook: Option<String>,

    #[arg(long, help = "Channel to post into")]
    pub channel: Option<String>,

    #[arg(long, help = "Link shown below the repository count")]
    pub link: Option<String>,

    #[arg(long, help = "Webhook request timeout (e.g. 10s)")]
    pub timeout: Option<String>,

    #[arg(long, help = "Report as of this date (YYYY-MM-DD) instead of today")]
    pub date: Option<String>,

    #[arg(long, help = "Print the payload instead of posting it")]
    pub dry_run: bool,
}

impl DigestArgs {
    fn overrides(&self, dsn: Option<String>) -> TriggerConfig {
        TriggerConfig {
            emailid: self.email.clone(),
            webhook: self.webhook.clone(),
            channel: self.channel.clone(),
            credentials: dsn.map(|dsn| Credentials { dsn: Some(dsn) }),
            link: self.link.clone(),
            timeout: self.timeout.clone(),
        }
    }
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn execute(self) -> Result<()> {
        let dsn = self.common.dsn;
        match self.command {
            Commands::Digest(args) => {
                let today = args
                    .date
                    .as_deref()
                    .map(crate::util::parse_date)
                    .transpose()?;
                crate::job::exec(
                    args.config.as_deref(),
                    args.params.as_deref(),
                    args.overrides(dsn),
                    today,
                    args.dry_run,
                )
            }
            Commands::Stats(args) => {
                let since = args.since.as_deref().map(crate::util::parse_date).transpose()?;
                let until = args.until.as_deref().map(crate::util::parse_date).transpose()?;
                crate::stats::exec(
                    &require_dsn(dsn)?,
                    &args.email,
                    since,
                    until,
                    args.weekly,
                    args.json,
                )
            }
            Commands::Init => crate::admin::init(&require_dsn(dsn)?),
            Commands::Account { command } => match command {
                AccountCommands::Add { email } => crate::admin::add_account(&require_dsn(dsn)?, &email),
            },
            Commands::Repo { command } => match command {
                RepoCommands::Add { email, repo } => {
                    crate::admin::add_repo(&require_dsn(dsn)?, &email, &repo)
                }
                RepoCommands::Remove { email, repo } => {
                    crate::admin::remove_repo(&require_dsn(dsn)?, &email, &repo)
                }
                RepoCommands::List { email, json } => {
                    crate::admin::list_repos(&require_dsn(dsn)?, &email, json)
                }
            },
            Commands::Traffic { command } => match command {
                TrafficCommands::Import { repo, views, clones } => crate::admin::import_traffic(
                    &require_dsn(dsn)?,
                    &repo,
                    views.as_deref(),
                    clones.as_deref(),
                ),
            },
        }
    }
}

/// Admin commands take the store from `--dsn` or `GHDIGEST_DSN`. `digest`
/// reads `GHDIGEST_DSN` through its config layers instead.
fn require_dsn(dsn: Option<String>) -> Result<String> {
    dsn.or_else(|| std::env::var("GHDIGEST_DSN").ok())
        .ok_or_else(|| anyhow::anyhow!("--dsn (or GHDIGEST_DSN) is required"))
}
