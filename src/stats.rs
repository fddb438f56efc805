use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
struct CountObj {
    #[serde(rename = "totalCount")]
    total_count: u64,
}

#[derive(Deserialize)]
struct RepoName {
    name: String,
}

#[derive(Deserialize)]
struct RepoContributions {
    repository: RepoName,
    contributions: CountObj,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContributionsCollection {
    total_commit_contributions: u64,
    total_pull_request_contributions: u64,
    total_pull_request_review_contributions: u64,
    total_repositories_with_contributed_commits: u64,
    total_repositories_with_contributed_pull_requests: u64,
    total_repositories_with_contributed_pull_request_reviews: u64,
    #[serde(default)]
    commit_contributions_by_repository: Vec<RepoContributions>,
    #[serde(default)]
    pull_request_contributions_by_repository: Vec<RepoContributions>,
    #[serde(default)]
    pull_request_review_contributions_by_repository: Vec<RepoContributions>,
}

#[derive(Deserialize)]
struct StatsResponse {
    data: Option<StatsData>,
}

#[derive(Deserialize)]
struct StatsData {
    user: Option<StatsUser>,
}

#[derive(Deserialize)]
struct StatsUser {
    #[serde(rename = "contributionsCollection")]
    contributions_collection: Option<ContributionsCollection>,
}

/// Contribution count for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCount {
    pub repository: String,
    pub count: u64,
}

/// One kind of contribution: its total, how many distinct repositories it
/// touched, and the per-repository breakdown the API returned.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Breakdown {
    pub total: u64,
    pub repositories: u64,
    pub by_repository: Vec<RepoCount>,
}

impl Breakdown {
    fn new(total: u64, repositories: u64, rows: Vec<RepoContributions>) -> Self {
        Self {
            total,
            repositories,
            by_repository: rows
                .into_iter()
                .map(|r| RepoCount {
                    repository: r.repository.name,
                    count: r.contributions.total_count,
                })
                .collect(),
        }
    }

    /// Repository with the most contributions of this kind.
    pub fn top_repository(&self) -> Option<&str> {
        self.by_repository
            .iter()
            .max_by_key(|r| r.count)
            .map(|r| r.repository.as_str())
    }

    /// The API returned fewer breakdown rows than distinct repositories.
    pub fn is_truncated(&self) -> bool {
        (self.by_repository.len() as u64) < self.repositories
    }
}

/// Typed view over a member's raw contributions response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Stats {
    pub commits: Breakdown,
    pub pull_requests: Breakdown,
    pub reviews: Breakdown,
}

impl Stats {
    /// Read the contributions collection out of a raw response.
    ///
    /// Returns `Ok(None)` when the response carries no user (unknown login,
    /// or a GraphQL error that nulled `data`).
    pub fn from_response(json: &Value) -> Result<Option<Self>> {
        let parsed: StatsResponse = serde_json::from_value(json.clone())
            .context("Failed to deserialize contributions response")?;

        let Some(collection) = parsed
            .data
            .and_then(|d| d.user)
            .and_then(|u| u.contributions_collection)
        else {
            return Ok(None);
        };

        Ok(Some(Self {
            commits: Breakdown::new(
                collection.total_commit_contributions,
                collection.total_repositories_with_contributed_commits,
                collection.commit_contributions_by_repository,
            ),
            pull_requests: Breakdown::new(
                collection.total_pull_request_contributions,
                collection.total_repositories_with_contributed_pull_requests,
                collection.pull_request_contributions_by_repository,
            ),
            reviews: Breakdown::new(
                collection.total_pull_request_review_contributions,
                collection.total_repositories_with_contributed_pull_request_reviews,
                collection.pull_request_review_contributions_by_repository,
            ),
        }))
    }

    /// Names of the breakdowns the API cut short.
    pub fn truncated_breakdowns(&self) -> Vec<&'static str> {
        [
            ("commitContributionsByRepository", &self.commits),
            ("pullRequestContributionsByRepository", &self.pull_requests),
            (
                "pullRequestReviewContributionsByRepository",
                &self.reviews,
            ),
        ]
        .into_iter()
        .filter(|(_, b)| b.is_truncated())
        .map(|(name, _)| name)
        .collect()
    }
}
