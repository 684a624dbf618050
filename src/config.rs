use crate::error::{DigestError, Result};
use crate::model::DEFAULT_LINK;
use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "ghdigest.toml";
pub const ENV_PREFIX: &str = "GHDIGEST_";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dsn: Option<String>,
}

/// The trigger record: `{ emailid, webhook, channel, credentials: { dsn } }`
/// plus the optional `link` and `timeout` knobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emailid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Webhook request timeout, humantime syntax (`10s`, `1m`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

/// Inputs of one weekly digest run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobParams {
    pub dsn: String,
    pub email: String,
    pub channel: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub job: JobParams,
    pub webhook: Option<String>,
    pub timeout: Option<Duration>,
}

impl TriggerConfig {
    /// Layers, lowest first: TOML file, `GHDIGEST_*` env, JSON trigger record, `overrides`.
    ///
    /// An explicit `config_path` must exist; the default file is optional.
    /// `GHDIGEST_DSN` is read as `credentials.dsn`.
    pub fn load(
        config_path: Option<&Path>,
        params_json: Option<&str>,
        overrides: TriggerConfig,
    ) -> Result<Self> {
        let file = match config_path {
            Some(path) => {
                if !path.is_file() {
                    return Err(DigestError::Config(format!(
                        "config file {} not found",
                        path.display()
                    )));
                }
                Toml::file_exact(path)
            }
            None => Toml::file(DEFAULT_CONFIG_FILE),
        };
        let env = Env::prefixed(ENV_PREFIX).split("_").map(|key| {
            if key.as_str().eq_ignore_ascii_case("dsn") {
                "credentials.dsn".into()
            } else {
                key.as_str().to_string().into()
            }
        });
        let mut figment = Figment::new().merge(file).merge(env);
        if let Some(json) = params_json {
            figment = figment.merge(Json::string(json));
        }
        let config = figment.merge(Serialized::defaults(overrides)).extract()?;
        Ok(config)
    }

    pub fn resolve(self) -> Result<Trigger> {
        let dsn = self
            .credentials
            .and_then(|c| c.dsn)
            .ok_or_else(|| missing("credentials.dsn"))?;
        let email = self.emailid.ok_or_else(|| missing("emailid"))?;
        let channel = self.channel.ok_or_else(|| missing("channel"))?;
        let timeout = self
            .timeout
            .map(|t| {
                humantime::parse_duration(&t)
                    .map_err(|e| DigestError::Config(format!("invalid timeout '{t}': {e}")))
            })
            .transpose()?;

        Ok(Trigger {
            job: JobParams {
                dsn,
                email,
                channel,
                link: self.link.unwrap_or_else(|| DEFAULT_LINK.to_string()),
            },
            webhook: self.webhook,
            timeout,
        })
    }
}

fn missing(field: &str) -> DigestError {
    DigestError::Config(format!("missing required setting '{field}'"))
}
