use anyhow::Context;
use hashlink::LinkedHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::{Category, CategoryId, Widget, WidgetId};

/// Widget as it appears in bootstrap files and stored snapshots. Inline
/// category widgets usually omit `categoryId`, and `status` may be missing
/// or `null`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWidget {
    pub id: WidgetId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub status: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCategory {
    pub id: CategoryId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub widgets: Vec<RawWidget>,
}

/// The bootstrap document: `{ categories, widgets }`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BootstrapData {
    #[serde(default)]
    pub categories: Vec<RawCategory>,
    #[serde(default)]
    pub widgets: Vec<RawWidget>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PersistedState {
    // Tried first: every field of `Current` is optional, so it would also
    // accept a reducer document and drop its contents.
    Reducer {
        widgets: BootstrapData,
    },
    Current {
        #[serde(default)]
        categories: Vec<RawCategory>,
        #[serde(default, rename = "allWidgets")]
        all_widgets: Vec<RawWidget>,
    },
}

/// What gets written to storage after every mutation. Categories carry
/// full copies of the widgets they reference so the document keeps the
/// denormalized `{ categories, allWidgets }` layout on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub categories: Vec<SnapshotCategory>,
    pub all_widgets: Vec<Widget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotCategory {
    pub id: CategoryId,
    pub name: String,
    pub widgets: Vec<Widget>,
}

/// Normalized store contents: ordered categories plus the catalog keyed by
/// widget id in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub categories: Vec<Category>,
    pub widgets: LinkedHashMap<WidgetId, Widget>,
}

impl Catalog {
    /// Collapses the denormalized `categories[].widgets` / `widgets` pair
    /// into one catalog.
    ///
    /// Catalog entries come from the flat list first. Inline category
    /// widgets missing from it are added under the owning category, and an
    /// inline `status` overrides the flat one since the inline copy is what
    /// the dashboard rendered.
    #[tracing::instrument(skip_all, fields(categories = categories.len(), widgets = widgets.len()))]
    pub fn from_raw(categories: Vec<RawCategory>, widgets: Vec<RawWidget>) -> Self {
        let mut catalog: LinkedHashMap<WidgetId, Widget> = LinkedHashMap::new();

        for raw in widgets {
            let owner = raw.category_id.clone().or_else(|| {
                categories
                    .iter()
                    .find(|cat| cat.widgets.iter().any(|w| w.id == raw.id))
                    .map(|cat| cat.id.clone())
            });
            let Some(category_id) = owner else {
                warn!(widget = %raw.id, "widget has no category; skipping");
                continue;
            };
            if catalog.contains_key(&raw.id) {
                warn!(widget = %raw.id, "duplicate widget id; keeping first");
                continue;
            }
            let widget = into_widget(raw, category_id);
            catalog.insert(widget.id.clone(), widget);
        }

        let mut out = Vec::with_capacity(categories.len());
        for raw_cat in categories {
            let mut category = Category::new(raw_cat.id, raw_cat.name);
            for inline in raw_cat.widgets {
                let id = inline.id.clone();
                match catalog.get_mut(&id) {
                    Some(existing) if existing.category_id != category.id => {
                        warn!(
                            widget = %id,
                            category = %category.id,
                            owner = %existing.category_id,
                            "inline widget belongs to another category; skipping"
                        );
                        continue;
                    }
                    Some(existing) => {
                        if let Some(status) = inline.status {
                            existing.status = status;
                        }
                    }
                    None => {
                        let mut widget = into_widget(inline, category.id.clone());
                        widget.category_id = category.id.clone();
                        catalog.insert(id.clone(), widget);
                    }
                }
                if !category.references(&id) {
                    category.widget_ids.push(id);
                }
            }
            out.push(category);
        }

        debug!(categories = out.len(), widgets = catalog.len(), "normalized catalog");
        Self {
            categories: out,
            widgets: catalog,
        }
    }

    /// Parses a stored document in either the current
    /// `{ categories, allWidgets }` layout or the older reducer layout
    /// `{ widgets: { categories, widgets } }`.
    pub fn from_persisted(raw: &str) -> anyhow::Result<Self> {
        let state: PersistedState =
            serde_json::from_str(raw).context("failed parsing persisted widget store")?;
        Ok(match state {
            PersistedState::Current {
                categories,
                all_widgets,
            } => Self::from_raw(categories, all_widgets),
            PersistedState::Reducer { widgets } => {
                debug!("loading reducer-shaped snapshot");
                Self::from_raw(widgets.categories, widgets.widgets)
            }
        })
    }

    pub fn to_snapshot(&self) -> Snapshot {
        let categories = self
            .categories
            .iter()
            .map(|cat| SnapshotCategory {
                id: cat.id.clone(),
                name: cat.name.clone(),
                widgets: cat
                    .widget_ids
                    .iter()
                    .filter_map(|id| self.widgets.get(id).cloned())
                    .collect(),
            })
            .collect();

        Snapshot {
            categories,
            all_widgets: self.widgets.values().cloned().collect(),
        }
    }
}

impl From<BootstrapData> for Catalog {
    fn from(data: BootstrapData) -> Self {
        Self::from_raw(data.categories, data.widgets)
    }
}

fn into_widget(raw: RawWidget, category_id: CategoryId) -> Widget {
    Widget {
        id: raw.id,
        name: raw.name,
        content: raw.content,
        category_id: raw.category_id.unwrap_or(category_id),
        status: raw.status.unwrap_or(false),
    }
}
