use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifiers arrive as JSON strings from snapshots and as numbers from
/// older bootstrap files that used millisecond timestamps directly.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(text) => text,
            RawId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawId", into = "String")]
pub struct WidgetId(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawId", into = "String")]
pub struct CategoryId(String);

impl From<RawId> for WidgetId {
    fn from(raw: RawId) -> Self {
        Self(raw.into())
    }
}

impl From<RawId> for CategoryId {
    fn from(raw: RawId) -> Self {
        Self(raw.into())
    }
}

impl From<WidgetId> for String {
    fn from(id: WidgetId) -> Self {
        id.0
    }
}

impl From<CategoryId> for String {
    fn from(id: CategoryId) -> Self {
        id.0
    }
}

impl From<&str> for WidgetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for WidgetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CategoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CategoryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl WidgetId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl CategoryId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A content card owned by exactly one category.
///
/// `status` is the visibility flag: a widget shows on the dashboard when it
/// is `true` and the owning category references the widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    pub id: WidgetId,
    pub name: String,
    pub content: String,
    pub category_id: CategoryId,
    pub status: bool,
}

impl Widget {
    pub fn new(
        id: impl Into<WidgetId>,
        name: impl Into<String>,
        content: impl Into<String>,
        category_id: impl Into<CategoryId>,
        status: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            content: content.into(),
            category_id: category_id.into(),
            status,
        }
    }

    /// Case-insensitive substring match on the widget name.
    pub fn matches(&self, query: &str) -> bool {
        self.name.to_lowercase().contains(&query.to_lowercase())
    }
}

/// A dashboard section. Widget fields live in the store's catalog; the
/// category only keeps the ordered references shown on its card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub widget_ids: Vec<WidgetId>,
}

impl Category {
    pub fn new(id: impl Into<CategoryId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            widget_ids: vec![],
        }
    }

    pub fn references(&self, widget_id: &WidgetId) -> bool {
        self.widget_ids.iter().any(|id| id == widget_id)
    }
}

#[cfg(test)]
mod tests {
    use super::{Widget, WidgetId};

    #[test]
    fn numeric_ids_deserialize_as_strings() {
        let widget: Widget = serde_json::from_str(
            r#"{"id":1726000000000,"name":"n","content":"c","categoryId":2,"status":true}"#,
        )
        .expect("parse widget");
        assert_eq!(widget.id, WidgetId::from("1726000000000"));
        assert_eq!(widget.category_id.as_str(), "2");

        let out = serde_json::to_value(&widget).expect("serialize widget");
        assert_eq!(out["id"], "1726000000000");
        assert_eq!(out["categoryId"], "2");
    }

    #[test]
    fn name_match_ignores_case() {
        let widget = Widget::new("1", "Threat Detection", "", "2", true);
        assert!(widget.matches("threat"));
        assert!(widget.matches("DETECT"));
        assert!(widget.matches(""));
        assert!(!widget.matches("policy"));
    }
}
