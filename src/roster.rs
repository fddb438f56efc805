//! Team roster loading.
//!
//! A team lives in its own directory under the teams root and lists its
//! members in `members.yml`:
//!
//! ```yaml
//! members:
//!   - alice
//!   - bob
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::error::RosterError;

pub const DEFAULT_TEAM: &str = "k8s_team";
const MEMBERS_FILE: &str = "members.yml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    pub team: String,
    pub members: Vec<String>,
}

#[derive(Deserialize)]
struct MembersFile {
    members: Option<Vec<String>>,
}

/// Path of the members file for `team` under `teams_dir`.
pub fn members_path(teams_dir: &Path, team: &str) -> PathBuf {
    teams_dir.join(team).join(MEMBERS_FILE)
}

/// Load the roster of `team` (or [`DEFAULT_TEAM`]) from `teams_dir`.
pub fn load_roster(teams_dir: &Path, team: Option<&str>) -> Result<Roster, RosterError> {
    let team = team.unwrap_or(DEFAULT_TEAM);
    let path = members_path(teams_dir, team);

    let raw = fs::read_to_string(&path).map_err(|source| RosterError::Read {
        path: path.clone(),
        source,
    })?;
    let members = parse_members(&raw, &path)?;

    info!(team, members = ?members, "{team} members loaded");

    Ok(Roster {
        team: team.to_string(),
        members,
    })
}

fn parse_members(raw: &str, path: &Path) -> Result<Vec<String>, RosterError> {
    let file: MembersFile = serde_yaml::from_str(raw).map_err(|source| RosterError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    file.members.ok_or_else(|| RosterError::MissingMembers {
        path: path.to_path_buf(),
    })
}
