mod aggregate;
mod config;
mod error;
mod github;
mod output;
mod query;
mod roster;
mod stats;
mod telemetry;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{Level, error, info, warn};

use aggregate::{TeamResult, aggregate};
use config::{Cli, Settings};
use error::{AppError, EXIT_PARTIAL};
use github::{ContributionSource, GithubClient};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    telemetry::init_tracing(cli.json, level);

    ExitCode::from(exit_status(&run(&cli).await))
}

/// Process exit status for the outcome of a run.
fn exit_status(outcome: &Result<TeamResult, AppError>) -> u8 {
    match outcome {
        Ok(team) if team.failed_members().is_empty() => 0,
        Ok(team) => {
            warn!(failed = ?team.failed_members(), "some members could not be fetched");
            EXIT_PARTIAL
        }
        Err(e) => {
            error!("{e}");
            e.exit_status()
        }
    }
}

async fn run(cli: &Cli) -> Result<TeamResult, AppError> {
    let settings = cli.settings()?;
    let client = GithubClient::new(settings.token.clone(), settings.client.clone())
        .map_err(AppError::Client)?;
    run_with(&settings, Arc::new(client)).await
}

/// Load the roster, fetch every member from `source` and write the result.
async fn run_with(
    settings: &Settings,
    source: Arc<dyn ContributionSource>,
) -> Result<TeamResult, AppError> {
    let roster = roster::load_roster(&settings.teams_dir, Some(&settings.team))?;

    info!(
        team = %roster.team,
        from = %settings.range.from_timestamp(),
        to = %settings.range.to_timestamp(),
        "fetching contribution stats"
    );
    let team = aggregate(source, &roster, &settings.range, &settings.aggregate).await?;
    if team.is_empty() {
        warn!(team = %roster.team, "roster has no members, writing an empty result");
    }

    output::write_team_result(&team, settings.output.as_deref())?;

    Ok(team)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EXIT_CONFIG, EXIT_REMOTE, EXIT_ROSTER, RemoteCallError};
    use crate::query::QueryRequest;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::fs;
    use std::path::Path;
    use tempfile::{TempDir, tempdir};

    /// Answers 200 for every login except `failing`, which gets a 403.
    struct OneFailing {
        failing: &'static str,
    }

    #[async_trait]
    impl ContributionSource for OneFailing {
        async fn execute(&self, request: &QueryRequest) -> Result<Value, RemoteCallError> {
            let login = &request.variables.login;
            if login == self.failing {
                return Err(RemoteCallError::Status {
                    status: 403,
                    body: "Forbidden".into(),
                });
            }
            Ok(json!({ "data": { "user": { "login": login } } }))
        }
    }

    fn cli_for(root: &Path, fail_fast: bool) -> Cli {
        Cli {
            token: Some("ghp_example".into()),
            from: Some("2024-01-01".into()),
            to: Some("2024-01-31".into()),
            team: "k8s_team".into(),
            teams_dir: root.join("teams"),
            endpoint: github::GITHUB_GRAPHQL_URL.into(),
            concurrency: 2,
            timeout_secs: 30,
            max_retries: 0,
            fail_fast,
            output: Some(root.join("stats.json")),
            ..Cli::default()
        }
    }

    fn team_dir(members: &str) -> TempDir {
        let root = tempdir().unwrap();
        let team = root.path().join("teams").join("k8s_team");
        fs::create_dir_all(&team).unwrap();
        fs::write(team.join("members.yml"), members).unwrap();
        root
    }

    #[tokio::test]
    async fn full_success_exits_zero_and_writes_every_member() {
        let root = team_dir("members: [alice, bob]\n");
        let settings = cli_for(root.path(), false).settings().unwrap();

        let outcome = run_with(&settings, Arc::new(OneFailing { failing: "nobody" })).await;
        assert_eq!(exit_status(&outcome), 0);

        let written: Value =
            serde_json::from_str(&fs::read_to_string(root.path().join("stats.json")).unwrap())
                .unwrap();
        assert_eq!(written["alice"]["outcome"], "fetched");
        assert_eq!(written["bob"]["result"]["data"]["user"]["login"], "bob");
    }

    #[tokio::test]
    async fn isolated_failure_writes_result_and_exits_partial() {
        let root = team_dir("members: [alice, bob]\n");
        let settings = cli_for(root.path(), false).settings().unwrap();

        let outcome = run_with(&settings, Arc::new(OneFailing { failing: "bob" })).await;
        assert_eq!(exit_status(&outcome), EXIT_PARTIAL);

        let written: Value =
            serde_json::from_str(&fs::read_to_string(root.path().join("stats.json")).unwrap())
                .unwrap();
        assert_eq!(written["alice"]["outcome"], "fetched");
        assert_eq!(written["bob"]["outcome"], "failed");
        assert_eq!(written["bob"]["status"], 403);
    }

    #[tokio::test]
    async fn fail_fast_writes_nothing_and_exits_remote() {
        let root = team_dir("members: [alice, bob]\n");
        let settings = cli_for(root.path(), true).settings().unwrap();

        let outcome = run_with(&settings, Arc::new(OneFailing { failing: "bob" })).await;
        assert!(matches!(outcome, Err(AppError::Remote(_))));
        assert_eq!(exit_status(&outcome), EXIT_REMOTE);
        assert!(!root.path().join("stats.json").exists());
    }

    #[tokio::test]
    async fn missing_roster_exits_roster() {
        let root = tempdir().unwrap();
        let settings = cli_for(root.path(), false).settings().unwrap();

        let outcome = run_with(&settings, Arc::new(OneFailing { failing: "nobody" })).await;
        assert_eq!(exit_status(&outcome), EXIT_ROSTER);
    }

    #[tokio::test]
    async fn missing_token_exits_config_before_any_request() {
        let root = team_dir("members: [alice]\n");
        let mut cli = cli_for(root.path(), false);
        cli.token = None;

        let outcome = run(&cli).await;
        assert_eq!(exit_status(&outcome), EXIT_CONFIG);
        assert!(!root.path().join("stats.json").exists());
    }
}
