use serde::Serialize;
use sqlgrant_domain::ResourceModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Created,
    Updated,
    /// Dropped and recreated because an attribute that cannot change in place differed.
    Replaced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub kind: &'static str,
    pub action: Action,
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replaced_fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub changes: Vec<Change>,
    /// Final state of every resource, including partial state of failed ones.
    pub states: Vec<ResourceModel>,
    pub errors: Vec<String>,
}

impl ApplyReport {
    pub fn new() -> Self {
        Self {
            changes: Vec::new(),
            states: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Default for ApplyReport {
    fn default() -> Self {
        Self::new()
    }
}
