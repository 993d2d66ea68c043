use serde::{Deserialize, Serialize};

/// A post-update script to run once reconciliation succeeds, relative to a
/// named project's path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hook {
    /// Name of this hook, used together with `project` as its composite key.
    #[serde(rename = "@name")]
    pub name: String,

    /// Script path, relative to the project's working tree.
    #[serde(rename = "@action")]
    pub action: String,

    /// Name of the project this hook's action is relative to. Must resolve
    /// to a project in the consolidated manifest.
    #[serde(rename = "@project")]
    pub project: String,
}

impl Hook {
    pub fn key(&self) -> (String, String) {
        (self.name.clone(), self.project.clone())
    }
}
