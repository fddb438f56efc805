use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

use crate::error::ConfigError;

/// Largest per-repository breakdown GitHub will return for a
/// contributions collection.
pub const MAX_REPOSITORIES: u32 = 100;

/// Contribution totals and per-repository breakdowns for one user over one
/// time window.
pub const CONTRIBUTIONS_QUERY: &str = r#"
    query user($login: String!, $from: DateTime!, $to: DateTime!, $maxRepositories: Int!) {
      user(login: $login) {
        contributionsCollection(from: $from, to: $to) {
          totalCommitContributions
          totalPullRequestContributions
          totalPullRequestReviewContributions
          totalRepositoriesWithContributedCommits
          totalRepositoriesWithContributedPullRequests
          totalRepositoriesWithContributedPullRequestReviews
          commitContributionsByRepository(maxRepositories: $maxRepositories) { repository { name } contributions { totalCount } }
          pullRequestContributionsByRepository(maxRepositories: $maxRepositories) { repository { name } contributions { totalCount } }
          pullRequestReviewContributionsByRepository(maxRepositories: $maxRepositories) { repository { name } contributions { totalCount } }
        }
      }
    }
"#;

/// The contribution window, as calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    /// Parse `YYYY-MM-DD` bounds. `from` may equal `to` but not follow it.
    pub fn parse(from: &str, to: &str) -> Result<Self, ConfigError> {
        let from_date = parse_date("FROM_DATE", from)?;
        let to_date = parse_date("TO_DATE", to)?;
        if from_date > to_date {
            return Err(ConfigError::InvertedRange {
                from: from.trim().to_string(),
                to: to.trim().to_string(),
            });
        }
        Ok(Self {
            from: from_date,
            to: to_date,
        })
    }

    pub fn from_timestamp(&self) -> String {
        utc_midnight(self.from)
    }

    pub fn to_timestamp(&self) -> String {
        utc_midnight(self.to)
    }
}

fn parse_date(name: &'static str, value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| ConfigError::InvalidDate {
        name,
        value: value.to_string(),
    })
}

fn utc_midnight(date: NaiveDate) -> String {
    date.and_time(NaiveTime::MIN)
        .and_utc()
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryVariables {
    pub login: String,
    pub from: String,
    pub to: String,
    #[serde(rename = "maxRepositories")]
    pub max_repositories: u32,
}

/// One GraphQL request body: `{"query": ..., "variables": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryRequest {
    pub query: &'static str,
    pub variables: QueryVariables,
}

impl QueryRequest {
    /// Contributions of `login` over `range`. The login is sent as given.
    pub fn contributions(login: &str, range: &DateRange) -> Self {
        Self {
            query: CONTRIBUTIONS_QUERY,
            variables: QueryVariables {
                login: login.to_string(),
                from: range.from_timestamp(),
                to: range.to_timestamp(),
                max_repositories: MAX_REPOSITORIES,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dates_become_utc_midnight() {
        let range = DateRange::parse("2024-01-01", "2024-01-31").unwrap();
        assert_eq!(range.from_timestamp(), "2024-01-01T00:00:00Z");
        assert_eq!(range.to_timestamp(), "2024-01-31T00:00:00Z");
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        let range = DateRange::parse(" 2024-02-28 ", "2024-02-29\n").unwrap();
        assert_eq!(range.to_timestamp(), "2024-02-29T00:00:00Z");
    }

    #[test]
    fn same_day_range_is_allowed() {
        assert!(DateRange::parse("2024-05-05", "2024-05-05").is_ok());
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = DateRange::parse("2024-02-01", "2024-01-01").unwrap_err();
        assert!(matches!(err, ConfigError::InvertedRange { .. }));
    }

    #[test]
    fn malformed_dates_name_their_variable() {
        match DateRange::parse("2024-01-01", "31/01/2024").unwrap_err() {
            ConfigError::InvalidDate { name, value } => {
                assert_eq!(name, "TO_DATE");
                assert_eq!(value, "31/01/2024");
            }
            other => panic!("unexpected error: {other}"),
        }
        match DateRange::parse("2023-02-29", "2024-01-01").unwrap_err() {
            ConfigError::InvalidDate { name, .. } => assert_eq!(name, "FROM_DATE"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn request_serializes_to_graphql_body() {
        let range = DateRange::parse("2024-01-01", "2024-01-31").unwrap();
        let body = serde_json::to_value(QueryRequest::contributions("alice", &range)).unwrap();

        assert_eq!(body["query"], json!(CONTRIBUTIONS_QUERY));
        assert_eq!(
            body["variables"],
            json!({
                "login": "alice",
                "from": "2024-01-01T00:00:00Z",
                "to": "2024-01-31T00:00:00Z",
                "maxRepositories": MAX_REPOSITORIES,
            })
        );
    }

    #[test]
    fn login_is_forwarded_verbatim() {
        let range = DateRange::parse("2024-01-01", "2024-01-02").unwrap();
        let request = QueryRequest::contributions("not a valid login!", &range);
        assert_eq!(request.variables.login, "not a valid login!");
    }
}
