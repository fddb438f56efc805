use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::aggregate::TeamResult;
use crate::error::OutputError;

/// Write `team` as pretty JSON to `path`, or to stdout when `path` is `None`.
pub fn write_team_result(team: &TeamResult, path: Option<&Path>) -> Result<(), OutputError> {
    let mut rendered = serde_json::to_string_pretty(team)?;
    rendered.push('\n');

    match path {
        Some(path) => {
            fs::write(path, rendered).map_err(|source| OutputError::Write {
                path: path.to_path_buf(),
                source,
            })?;
            info!(path = %path.display(), members = team.len(), "team result written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(rendered.as_bytes())
                .and_then(|()| stdout.flush())
                .map_err(OutputError::Stdout)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::MemberOutcome;
    use serde_json::{Value, json};
    use tempfile::tempdir;

    #[test]
    fn writes_pretty_json_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.json");

        let mut team = TeamResult::default();
        team.members.insert(
            "alice".into(),
            MemberOutcome::Fetched {
                result: json!({ "data": { "user": null } }),
                warnings: vec![],
            },
        );
        write_team_result(&team, Some(&path)).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.ends_with('\n'));
        let parsed: Value = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed["alice"]["result"], json!({ "data": { "user": null } }));
    }

    #[test]
    fn unwritable_path_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("stats.json");

        let err = write_team_result(&TeamResult::default(), Some(&path)).unwrap_err();
        assert!(matches!(err, OutputError::Write { .. }));
    }
}
