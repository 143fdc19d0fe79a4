use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Collaboration role held by an identity on a single resource (campaign).
///
/// Roles are scoped per resource: the same identity may be a manager on one
/// campaign, a viewer on another and absent from a third.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamRole {
    Manager,
    Editor,
    Viewer,
}

impl TeamRole {
    pub const ALL: [TeamRole; 3] = [TeamRole::Manager, TeamRole::Editor, TeamRole::Viewer];

    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Manager => "manager",
            TeamRole::Editor => "editor",
            TeamRole::Viewer => "viewer",
        }
    }

    /// Managers and editors may change a campaign's content; viewers only read it.
    pub fn can_edit(&self) -> bool {
        matches!(self, TeamRole::Manager | TeamRole::Editor)
    }
}

impl core::fmt::Display for TeamRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown team role '{0}'")]
pub struct UnknownTeamRole(pub String);

impl FromStr for TeamRole {
    type Err = UnknownTeamRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manager" => Ok(TeamRole::Manager),
            "editor" => Ok(TeamRole::Editor),
            "viewer" => Ok(TeamRole::Viewer),
            other => Err(UnknownTeamRole(other.to_string())),
        }
    }
}
