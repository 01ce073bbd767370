use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::TaskdeckError;

// =============================================================================
// Records
// =============================================================================

/// A single to-do record as owned by the record store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: i64,
    pub text: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a record. `text` is already trimmed and non-empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTodo {
    pub text: String,
    pub completed: bool,
}

impl NewTodo {
    /// Build a new record, trimming `text` and rejecting blank input.
    pub fn new(text: &str, completed: bool) -> Result<Self, TaskdeckError> {
        Ok(Self {
            text: normalize_text(text)?,
            completed,
        })
    }
}

/// Trim record text and enforce the non-empty invariant.
pub fn normalize_text(text: &str) -> Result<String, TaskdeckError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(TaskdeckError::validation("text", "must not be empty"));
    }
    Ok(trimmed.to_string())
}

// =============================================================================
// Partial updates
// =============================================================================

/// One updatable attribute in a change set.
///
/// A field missing from the request body deserializes to `Unchanged` via
/// `#[serde(default)]`. An explicit `null` is rejected rather than being
/// conflated with "not provided".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    #[default]
    Unchanged,
    Set(T),
}

impl<T> FieldUpdate<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, FieldUpdate::Set(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            FieldUpdate::Set(v) => Some(v),
            FieldUpdate::Unchanged => None,
        }
    }
}

impl<'de, T> Deserialize<'de> for FieldUpdate<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<T>::deserialize(deserializer)? {
            Some(value) => Ok(FieldUpdate::Set(value)),
            None => Err(serde::de::Error::custom("null is not a valid value")),
        }
    }
}

/// Validated change set applied by the store in one step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TodoChanges {
    pub text: FieldUpdate<String>,
    pub completed: FieldUpdate<bool>,
}

impl TodoChanges {
    /// Full replacement: both attributes must be supplied.
    pub fn replace(
        text: FieldUpdate<String>,
        completed: FieldUpdate<bool>,
    ) -> Result<Self, TaskdeckError> {
        let mut missing = Vec::new();
        if !text.is_set() {
            missing.push("text");
        }
        if !completed.is_set() {
            missing.push("completed");
        }
        if !missing.is_empty() {
            return Err(TaskdeckError::validation(
                missing.join(", "),
                "full update requires both text and completed",
            ));
        }
        Self::patch(text, completed)
    }

    /// Partial update: only supplied attributes change.
    pub fn patch(
        text: FieldUpdate<String>,
        completed: FieldUpdate<bool>,
    ) -> Result<Self, TaskdeckError> {
        let text = match text {
            FieldUpdate::Set(t) => FieldUpdate::Set(normalize_text(&t)?),
            FieldUpdate::Unchanged => FieldUpdate::Unchanged,
        };
        Ok(Self { text, completed })
    }

    pub fn is_empty(&self) -> bool {
        !self.text.is_set() && !self.completed.is_set()
    }
}

// =============================================================================
// Listing plan
// =============================================================================

/// Sortable record attribute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SortField {
    Id,
    CreatedAt,
    #[default]
    UpdatedAt,
    Text,
    Completed,
}

impl SortField {
    /// Wire names accepted in the `sortBy` query parameter.
    pub const ALLOWED: [&'static str; 5] = ["id", "createdAt", "updatedAt", "text", "completed"];

    pub fn as_str(self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::CreatedAt => "createdAt",
            SortField::UpdatedAt => "updatedAt",
            SortField::Text => "text",
            SortField::Completed => "completed",
        }
    }
}

impl FromStr for SortField {
    type Err = TaskdeckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(SortField::Id),
            "createdAt" => Ok(SortField::CreatedAt),
            "updatedAt" => Ok(SortField::UpdatedAt),
            "text" => Ok(SortField::Text),
            "completed" => Ok(SortField::Completed),
            other => Err(TaskdeckError::InvalidSortField {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub const ALLOWED: [&'static str; 2] = ["asc", "desc"];

    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = TaskdeckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(TaskdeckError::InvalidSortOrder {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primary sort key. Ties are always broken by ascending id.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

/// Record filter shared by counts and page queries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TodoFilter {
    /// Case-insensitive substring of `text`. `None` matches everything.
    pub search: Option<String>,
    pub completed: Option<bool>,
}

impl TodoFilter {
    pub fn with_completed(&self, completed: bool) -> Self {
        Self {
            search: self.search.clone(),
            completed: Some(completed),
        }
    }

    /// In-memory evaluation of the filter, mirroring the store's semantics.
    pub fn matches(&self, todo: &Todo) -> bool {
        if let Some(c) = self.completed {
            if todo.completed != c {
                return false;
            }
        }
        match &self.search {
            Some(needle) => todo.text.to_lowercase().contains(&needle.to_lowercase()),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct PatchBody {
        #[serde(default)]
        text: FieldUpdate<String>,
        #[serde(default)]
        completed: FieldUpdate<bool>,
    }

    #[test]
    fn test_todo_serializes_camel_case() {
        let now = Utc::now();
        let todo = Todo {
            id: 1,
            text: "Buy milk".into(),
            completed: false,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&todo).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_some());
        assert!(json.get("created_at").is_none());
    }

    #[test]
    fn test_new_todo_trims_text() {
        let new = NewTodo::new("  wash car  ", false).unwrap();
        assert_eq!(new.text, "wash car");
    }

    #[test]
    fn test_new_todo_rejects_blank() {
        assert!(matches!(
            NewTodo::new("   ", false),
            Err(TaskdeckError::Validation { .. })
        ));
    }

    #[test]
    fn test_field_update_absent_is_unchanged() {
        let body: PatchBody = serde_json::from_str(r#"{"completed": true}"#).unwrap();
        assert_eq!(body.text, FieldUpdate::Unchanged);
        assert_eq!(body.completed, FieldUpdate::Set(true));
    }

    #[test]
    fn test_field_update_empty_string_is_set() {
        let body: PatchBody = serde_json::from_str(r#"{"text": ""}"#).unwrap();
        assert_eq!(body.text, FieldUpdate::Set(String::new()));
    }

    #[test]
    fn test_field_update_null_is_rejected() {
        let result: Result<PatchBody, _> = serde_json::from_str(r#"{"text": null}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_replace_requires_both_fields() {
        let err = TodoChanges::replace(FieldUpdate::Set("x".into()), FieldUpdate::Unchanged)
            .unwrap_err();
        match err {
            TaskdeckError::Validation { field, .. } => assert_eq!(field, "completed"),
            other => panic!("unexpected error: {other:?}"),
        }

        let err =
            TodoChanges::replace(FieldUpdate::Unchanged, FieldUpdate::Unchanged).unwrap_err();
        match err {
            TaskdeckError::Validation { field, .. } => assert_eq!(field, "text, completed"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_patch_trims_and_validates_text() {
        let changes =
            TodoChanges::patch(FieldUpdate::Set("  tidy  ".into()), FieldUpdate::Unchanged)
                .unwrap();
        assert_eq!(changes.text, FieldUpdate::Set("tidy".into()));

        assert!(TodoChanges::patch(FieldUpdate::Set(" ".into()), FieldUpdate::Unchanged).is_err());
    }

    #[test]
    fn test_patch_with_nothing_is_empty() {
        let changes = TodoChanges::patch(FieldUpdate::Unchanged, FieldUpdate::Unchanged).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn test_sort_field_parse() {
        assert_eq!("createdAt".parse::<SortField>().unwrap(), SortField::CreatedAt);
        assert_eq!("id".parse::<SortField>().unwrap(), SortField::Id);
        assert!("created_at".parse::<SortField>().is_err());
        for name in SortField::ALLOWED {
            assert_eq!(name.parse::<SortField>().unwrap().as_str(), name);
        }
    }

    #[test]
    fn test_sort_order_parse() {
        assert_eq!("asc".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert!("ASC".parse::<SortOrder>().is_err());
        assert_eq!(SortOrder::default(), SortOrder::Desc);
    }

    #[test]
    fn test_filter_matches_case_insensitive() {
        let now = Utc::now();
        let todo = Todo {
            id: 3,
            text: "MILK run".into(),
            completed: true,
            created_at: now,
            updated_at: now,
        };
        let filter = TodoFilter {
            search: Some("milk".into()),
            completed: None,
        };
        assert!(filter.matches(&todo));
        assert!(filter.with_completed(true).matches(&todo));
        assert!(!filter.with_completed(false).matches(&todo));
    }
}
