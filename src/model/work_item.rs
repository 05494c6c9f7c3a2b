use serde::{Deserialize, Serialize};

/// Work item id as assigned by the tracker.
pub type WorkItemId = u64;

/// Separator placed between the existing field value and an appended entry.
pub const APPEND_SEPARATOR: &str = "<br>==========<br>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Operation {
    /// Overwrite the field with the new value
    Replace,
    /// Append the new value to whatever the field already holds
    Add,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Replace => "replace",
            Operation::Add => "add",
        }
    }
}

/// A single field update requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPatch {
    pub field_name: String,
    pub operation: Operation,
    pub value: String,
}

impl FieldPatch {
    pub fn new(field_name: impl Into<String>, operation: Operation, value: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            operation,
            value: value.into(),
        }
    }

    /// Build the JSON-patch document for this update. `existing` is the
    /// current field value and is only consulted when appending.
    pub fn to_document(&self, existing: Option<&str>) -> PatchDocument {
        let value = match self.operation {
            Operation::Replace => self.value.clone(),
            Operation::Add => compose_append(existing.unwrap_or_default(), &self.value),
        };
        let op = match self.operation {
            Operation::Replace => PatchOp::Replace,
            Operation::Add => PatchOp::Add,
        };
        vec![PatchOperation {
            op,
            path: field_path(&self.field_name),
            value,
        }]
    }
}

pub fn compose_append(existing: &str, value: &str) -> String {
    format!("{existing}{APPEND_SEPARATOR}{value}")
}

pub fn field_path(field_name: &str) -> String {
    format!("/fields/{field_name}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
    Test,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    pub value: String,
}

pub type PatchDocument = Vec<PatchOperation>;

/// Metadata field plus the text fragment it must contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    pub field: String,
    pub fragment: String,
}

impl SearchFilter {
    pub fn new(field: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            fragment: fragment.into(),
        }
    }

    pub fn to_wiql(&self) -> String {
        format!(
            "Select [System.Id] From WorkItems Where [{}] Contains '{}'",
            self.field, self.fragment
        )
    }
}
