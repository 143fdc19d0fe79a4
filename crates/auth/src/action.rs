use serde::{Deserialize, Serialize};

/// Named operation subject to the fixed policy table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionAction {
    CreateCampaign,
    TrackItems,
    ViewReports,
    ManageTeam,
}

impl PermissionAction {
    pub const ALL: [PermissionAction; 4] = [
        PermissionAction::CreateCampaign,
        PermissionAction::TrackItems,
        PermissionAction::ViewReports,
        PermissionAction::ManageTeam,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionAction::CreateCampaign => "create_campaign",
            PermissionAction::TrackItems => "track_items",
            PermissionAction::ViewReports => "view_reports",
            PermissionAction::ManageTeam => "manage_team",
        }
    }

    /// Actions whose decision depends on the caller's team role when a
    /// resource is named.
    pub fn is_team_scoped(&self) -> bool {
        matches!(self, PermissionAction::ManageTeam | PermissionAction::ViewReports)
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == name)
    }
}

impl core::fmt::Display for PermissionAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action name as received from a caller.
///
/// Unrecognized names are preserved instead of rejected at parse time so the
/// policy can deny them with a normal decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionName {
    Known(PermissionAction),
    Unknown(String),
}

impl ActionName {
    pub fn known(&self) -> Option<PermissionAction> {
        match self {
            ActionName::Known(action) => Some(*action),
            ActionName::Unknown(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActionName::Known(action) => action.as_str(),
            ActionName::Unknown(name) => name,
        }
    }
}

impl From<PermissionAction> for ActionName {
    fn from(value: PermissionAction) -> Self {
        ActionName::Known(value)
    }
}

impl From<String> for ActionName {
    fn from(value: String) -> Self {
        match PermissionAction::parse(&value) {
            Some(action) => ActionName::Known(action),
            None => ActionName::Unknown(value),
        }
    }
}

impl From<&str> for ActionName {
    fn from(value: &str) -> Self {
        ActionName::from(value.to_string())
    }
}

impl From<ActionName> for String {
    fn from(value: ActionName) -> Self {
        match value {
            ActionName::Known(action) => action.as_str().to_string(),
            ActionName::Unknown(name) => name,
        }
    }
}

impl core::fmt::Display for ActionName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
