//! Trello board label cached locally

use super::Module;
use serde::{Deserialize, Serialize};

/// A board label, optionally assigned to a module
///
/// Rows are created by `labels sync`; the module is set by an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: i64,

    /// Trello label id, unique per row
    pub trello_label_id: String,

    pub name: String,

    pub color: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<Module>,
}
