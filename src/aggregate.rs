//! Team aggregation.
//!
//! [`aggregate`] fans one contributions query per roster member out to a
//! [`ContributionSource`] and collects the answers into a [`TeamResult`].
//! Members are fetched concurrently up to [`AggregateOptions::concurrency`];
//! each task owns its outcome until it is merged after `join_next`.
//!
//! By default a failing member is recorded in place and the rest of the
//! team still completes. With [`AggregateOptions::fail_fast`] the first
//! failure aborts the batch and no result is produced.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{AggregateError, RemoteCallError};
use crate::github::{ContributionSource, graphql_error_messages};
use crate::query::{DateRange, QueryRequest};
use crate::roster::Roster;
use crate::stats::Stats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateOptions {
    pub concurrency: usize,
    pub fail_fast: bool,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            fail_fast: false,
        }
    }
}

/// What happened when fetching one member.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MemberOutcome {
    Fetched {
        result: Value,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
    Failed {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
    },
}

impl MemberOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, MemberOutcome::Failed { .. })
    }
}

/// Member login -> outcome. Serialized with members sorted by login.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct TeamResult {
    pub members: BTreeMap<String, MemberOutcome>,
}

impl TeamResult {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn failed_members(&self) -> Vec<&str> {
        self.members
            .iter()
            .filter(|(_, outcome)| outcome.is_failed())
            .map(|(login, _)| login.as_str())
            .collect()
    }
}

/// Fetch contribution stats for every member of `roster` over `range`.
pub async fn aggregate(
    source: Arc<dyn ContributionSource>,
    roster: &Roster,
    range: &DateRange,
    options: &AggregateOptions,
) -> Result<TeamResult, AggregateError> {
    let sem = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let mut join_set = JoinSet::new();
    let mut seen = HashSet::new();

    for login in &roster.members {
        if !seen.insert(login.as_str()) {
            warn!(team = %roster.team, login = %login, "duplicate roster entry, fetching once");
            continue;
        }
        let source = Arc::clone(&source);
        let sem = Arc::clone(&sem);
        let request = QueryRequest::contributions(login, range);
        join_set.spawn(async move {
            let _permit = sem.acquire_owned().await.ok();
            let result = source.execute(&request).await;
            (request.variables.login, result)
        });
    }

    let mut team = TeamResult::default();
    while let Some(joined) = join_set.join_next().await {
        let (login, result) = joined?;
        match result {
            Ok(json) => {
                debug!(member = %login, result = %json, "member result");
                let warnings = review_result(&login, &json);
                team.members.insert(
                    login,
                    MemberOutcome::Fetched {
                        result: json,
                        warnings,
                    },
                );
            }
            Err(source) if options.fail_fast => {
                join_set.abort_all();
                return Err(AggregateError::Member { login, source });
            }
            Err(err) => {
                warn!(member = %login, error = %err, "fetch failed, recording and continuing");
                team.members.insert(login, failed(&err));
            }
        }
    }

    info!(
        team = %roster.team,
        members = team.len(),
        failed = team.failed_members().len(),
        "team aggregation finished"
    );
    Ok(team)
}

fn failed(err: &RemoteCallError) -> MemberOutcome {
    MemberOutcome::Failed {
        error: err.to_string(),
        status: err.status(),
    }
}

/// Log a summary of one member's result and collect anything a reader of
/// the output should know about it.
fn review_result(login: &str, json: &Value) -> Vec<String> {
    let mut warnings: Vec<String> = graphql_error_messages(json)
        .into_iter()
        .map(|m| format!("GraphQL error: {m}"))
        .collect();

    match Stats::from_response(json) {
        Ok(Some(stats)) => {
            info!(
                member = %login,
                commits = stats.commits.total,
                pull_requests = stats.pull_requests.total,
                reviews = stats.reviews.total,
                top_repository = stats.commits.top_repository().unwrap_or("-"),
                "member stats fetched"
            );
            for breakdown in stats.truncated_breakdowns() {
                warn!(member = %login, breakdown, "per-repository breakdown truncated by the API");
                warnings.push(format!("{breakdown} truncated by the API"));
            }
        }
        Ok(None) => {
            warn!(member = %login, "response carries no contributions for this member");
            warnings.push("no contributions collection in response".to_string());
        }
        Err(e) => {
            let detail = format!("{e:#}");
            warn!(member = %login, error = %detail, "unexpected response shape");
            warnings.push(format!("unexpected response shape: {detail}"));
        }
    }

    warnings
}
