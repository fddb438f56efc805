use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::aggregate::AggregateOptions;
use crate::error::ConfigError;
use crate::github::{ClientConfig, GITHUB_GRAPHQL_URL, GraphqlErrorPolicy, RetryPolicy};
use crate::query::DateRange;
use crate::roster::DEFAULT_TEAM;

#[derive(Parser, Debug, Default)]
#[command(name = "team-stats")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fetch GitHub contribution stats for every member of a team", long_about = None)]
pub struct Cli {
    /// GitHub token used as the bearer credential
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// First day of the contribution window (YYYY-MM-DD)
    #[arg(long, env = "FROM_DATE")]
    pub from: Option<String>,

    /// Last day of the contribution window (YYYY-MM-DD)
    #[arg(long, env = "TO_DATE")]
    pub to: Option<String>,

    /// Team whose roster is loaded
    #[arg(long, env = "TEAM", default_value = DEFAULT_TEAM)]
    pub team: String,

    /// Directory holding one `<team>/members.yml` per team
    #[arg(long, env = "TEAMS_DIR", default_value = "teams")]
    pub teams_dir: PathBuf,

    /// GraphQL endpoint
    #[arg(long, env = "GITHUB_GRAPHQL_URL", default_value = GITHUB_GRAPHQL_URL)]
    pub endpoint: String,

    /// Members fetched at the same time
    #[arg(long, env = "STATS_CONCURRENCY", default_value_t = 4)]
    pub concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long, env = "STATS_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Retries on network errors and 5xx responses
    #[arg(long, env = "STATS_MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Abort the whole team on the first failed member
    #[arg(long)]
    pub fail_fast: bool,

    /// Treat a GraphQL `errors` array in a 200 response as a failure
    #[arg(long)]
    pub reject_graphql_errors: bool,

    /// Write the team result here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    pub json: bool,
}

/// Validated settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub token: String,
    pub range: DateRange,
    pub team: String,
    pub teams_dir: PathBuf,
    pub client: ClientConfig,
    pub aggregate: AggregateOptions,
    pub output: Option<PathBuf>,
}

impl Cli {
    /// Check required values and build [`Settings`]. Nothing here touches
    /// the network.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        let token = required("GITHUB_TOKEN", self.token.as_deref())?;
        let from = required("FROM_DATE", self.from.as_deref())?;
        let to = required("TO_DATE", self.to.as_deref())?;
        let range = DateRange::parse(from, to)?;

        if self.concurrency == 0 {
            return Err(ConfigError::Zero {
                name: "STATS_CONCURRENCY",
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Zero {
                name: "STATS_TIMEOUT_SECS",
            });
        }

        let graphql_errors = if self.reject_graphql_errors {
            GraphqlErrorPolicy::Reject
        } else {
            GraphqlErrorPolicy::Accept
        };

        Ok(Settings {
            token: token.to_string(),
            range,
            team: self.team.clone(),
            teams_dir: self.teams_dir.clone(),
            client: ClientConfig {
                endpoint: self.endpoint.clone(),
                timeout: Duration::from_secs(self.timeout_secs),
                retry: RetryPolicy {
                    max_retries: self.max_retries,
                    ..RetryPolicy::default()
                },
                graphql_errors,
            },
            aggregate: AggregateOptions {
                concurrency: self.concurrency,
                fail_fast: self.fail_fast,
            },
            output: self.output.clone(),
        })
    }
}

fn required<'a>(name: &'static str, value: Option<&'a str>) -> Result<&'a str, ConfigError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::Missing { name }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn complete() -> Cli {
        Cli {
            token: Some("ghp_example".into()),
            from: Some("2024-01-01".into()),
            to: Some("2024-01-31".into()),
            team: DEFAULT_TEAM.into(),
            teams_dir: PathBuf::from("teams"),
            endpoint: GITHUB_GRAPHQL_URL.into(),
            concurrency: 4,
            timeout_secs: 30,
            max_retries: 3,
            ..Cli::default()
        }
    }

    fn missing_name(cli: Cli) -> &'static str {
        match cli.settings().unwrap_err() {
            ConfigError::Missing { name } => name,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn complete_config_resolves() {
        let settings = complete().settings().unwrap();
        assert_eq!(settings.token, "ghp_example");
        assert_eq!(settings.range.from_timestamp(), "2024-01-01T00:00:00Z");
        assert_eq!(settings.client.timeout, Duration::from_secs(30));
        assert_eq!(settings.client.retry.max_retries, 3);
        assert_eq!(settings.client.graphql_errors, GraphqlErrorPolicy::Accept);
        assert!(!settings.aggregate.fail_fast);
    }

    #[test]
    fn each_missing_value_is_named() {
        let mut cli = complete();
        cli.token = None;
        assert_eq!(missing_name(cli), "GITHUB_TOKEN");

        let mut cli = complete();
        cli.from = None;
        assert_eq!(missing_name(cli), "FROM_DATE");

        let mut cli = complete();
        cli.to = None;
        assert_eq!(missing_name(cli), "TO_DATE");
    }

    #[test]
    fn blank_values_count_as_missing() {
        let mut cli = complete();
        cli.token = Some("   ".into());
        assert_eq!(missing_name(cli), "GITHUB_TOKEN");

        let mut cli = complete();
        cli.to = Some(String::new());
        assert_eq!(missing_name(cli), "TO_DATE");
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut cli = complete();
        cli.concurrency = 0;
        assert!(matches!(
            cli.settings().unwrap_err(),
            ConfigError::Zero { name: "STATS_CONCURRENCY" }
        ));
    }

    #[test]
    fn flags_select_strict_policies() {
        let mut cli = complete();
        cli.fail_fast = true;
        cli.reject_graphql_errors = true;
        let settings = cli.settings().unwrap();
        assert!(settings.aggregate.fail_fast);
        assert_eq!(settings.client.graphql_errors, GraphqlErrorPolicy::Reject);
    }
}
