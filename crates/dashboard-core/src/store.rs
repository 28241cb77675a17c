use std::str::FromStr;

use anyhow::anyhow;
use hashlink::LinkedHashMap;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::bootstrap::Bootstrap;
use crate::model::{Category, CategoryId, Widget, WidgetId};
use crate::snapshot::{BootstrapData, Catalog, Snapshot};
use crate::storage::Storage;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("unknown category: {0}")]
    UnknownCategory(CategoryId),
    #[error("unknown widget: {0}")]
    UnknownWidget(WidgetId),
    #[error("widget {widget} belongs to category {owner}, not {category}")]
    WrongCategory {
        widget: WidgetId,
        category: CategoryId,
        owner: CategoryId,
    },
}

/// What removing a widget from its category does to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemoveMode {
    /// Drop the category reference and hide the widget; it stays in the
    /// catalog and can be picked again.
    #[default]
    Unlink,
    /// Drop the reference and the catalog entry.
    Delete,
}

impl FromStr for RemoveMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unlink" => Ok(Self::Unlink),
            "delete" => Ok(Self::Delete),
            other => Err(anyhow!("expected unlink or delete, got {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    pub key: String,
    pub remove_mode: RemoveMode,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            key: "widgetStore".to_string(),
            remove_mode: RemoveMode::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Snapshot,
    Bootstrap,
    Unchanged,
}

/// Categories, the widget catalog, and the picker/search state, mirrored
/// into `S` after every mutation.
#[derive(Debug)]
pub struct WidgetStore<S> {
    storage: S,
    options: StoreOptions,
    categories: Vec<Category>,
    widgets: LinkedHashMap<WidgetId, Widget>,
    selected_category: Option<CategoryId>,
    search_results: Vec<WidgetId>,
}

impl<S: Storage> WidgetStore<S> {
    pub fn new(storage: S, options: StoreOptions) -> Self {
        Self {
            storage,
            options,
            categories: vec![],
            widgets: LinkedHashMap::new(),
            selected_category: None,
            search_results: vec![],
        }
    }

    /// Restores the persisted snapshot, or seeds storage from `bootstrap`
    /// when there is none. Failures are logged and leave the store as it
    /// was.
    #[instrument(skip(self, bootstrap), fields(key = %self.options.key))]
    pub fn load_initial_data(&mut self, bootstrap: &Bootstrap) -> LoadSource {
        match self.storage.get(&self.options.key) {
            Ok(Some(raw)) => match Catalog::from_persisted(&raw) {
                Ok(catalog) => {
                    self.apply(catalog);
                    info!(
                        categories = self.categories.len(),
                        widgets = self.widgets.len(),
                        "restored widget store from storage"
                    );
                    return LoadSource::Snapshot;
                }
                Err(err) => {
                    error!(error = %format!("{err:#}"), "failed to load data");
                    return LoadSource::Unchanged;
                }
            },
            Ok(None) => debug!("no persisted snapshot"),
            Err(err) => {
                error!(error = %format!("{err:#}"), "failed to read storage");
                return LoadSource::Unchanged;
            }
        }

        match bootstrap.fetch() {
            Ok(data) => {
                self.seed(data);
                LoadSource::Bootstrap
            }
            Err(err) => {
                error!(error = %format!("{err:#}"), "failed to load data");
                LoadSource::Unchanged
            }
        }
    }

    /// Replaces the whole state with `data` and persists it.
    #[instrument(skip_all)]
    pub fn seed(&mut self, data: BootstrapData) {
        self.apply(Catalog::from(data));
        info!(
            categories = self.categories.len(),
            widgets = self.widgets.len(),
            "seeded widget store"
        );
        self.persist();
    }

    pub fn set_selected_category(&mut self, category_id: Option<CategoryId>) {
        self.selected_category = category_id;
    }

    /// Adds a new widget to the catalog and to the end of the category.
    /// Returns `Ok(false)` without touching anything when the id is already
    /// in the catalog.
    #[instrument(skip(self, widget), fields(widget = %widget.id))]
    pub fn add_widget(
        &mut self,
        category_id: &CategoryId,
        mut widget: Widget,
    ) -> Result<bool, StoreError> {
        if self.widgets.contains_key(&widget.id) {
            debug!("widget already in catalog; ignoring add");
            return Ok(false);
        }

        let category = self.category_mut(category_id)?;
        category.widget_ids.push(widget.id.clone());
        widget.category_id = category_id.clone();
        self.widgets.insert(widget.id.clone(), widget);

        self.persist();
        Ok(true)
    }

    /// Links a catalog widget back into its category and makes it visible.
    #[instrument(skip(self))]
    pub fn show_widget(
        &mut self,
        category_id: &CategoryId,
        widget_id: &WidgetId,
    ) -> Result<bool, StoreError> {
        self.owned_widget(category_id, widget_id)?;
        let changed = self.link(category_id, widget_id, true);
        if changed {
            self.persist();
        }
        Ok(changed)
    }

    #[instrument(skip(self))]
    pub fn remove_widget(
        &mut self,
        category_id: &CategoryId,
        widget_id: &WidgetId,
    ) -> Result<bool, StoreError> {
        let category = self.category_mut(category_id)?;
        let before = category.widget_ids.len();
        category.widget_ids.retain(|id| id != widget_id);
        let mut changed = category.widget_ids.len() != before;

        let owned = self
            .widgets
            .get(widget_id)
            .is_some_and(|w| &w.category_id == category_id);

        if owned {
            match self.options.remove_mode {
                RemoveMode::Unlink => {
                    if let Some(widget) = self.widgets.get_mut(widget_id)
                        && widget.status
                    {
                        widget.status = false;
                        changed = true;
                    }
                }
                RemoveMode::Delete => {
                    self.widgets.remove(widget_id);
                    self.search_results.retain(|id| id != widget_id);
                    changed = true;
                }
            }
        } else if self.widgets.contains_key(widget_id) {
            warn!("widget belongs to another category; catalog left as is");
        }

        if changed {
            info!(mode = ?self.options.remove_mode, "removed widget");
            self.persist();
        }
        Ok(changed)
    }

    /// Sets the visibility flag of a widget owned by `category_id`.
    /// Making a widget visible also links it into the category.
    #[instrument(skip(self))]
    pub fn update_widget_status(
        &mut self,
        category_id: &CategoryId,
        widget_id: &WidgetId,
        status: bool,
    ) -> Result<bool, StoreError> {
        self.owned_widget(category_id, widget_id)?;
        let changed = if status {
            self.link(category_id, widget_id, true)
        } else {
            self.set_status(widget_id, false)
        };
        if changed {
            self.persist();
        }
        Ok(changed)
    }

    /// Flips a widget's visibility and returns the new value.
    #[instrument(skip(self))]
    pub fn toggle_widget_selection(&mut self, widget_id: &WidgetId) -> Result<bool, StoreError> {
        let widget = self
            .widgets
            .get(widget_id)
            .ok_or_else(|| StoreError::UnknownWidget(widget_id.clone()))?;
        let status = !widget.status;
        let category_id = widget.category_id.clone();

        if status && self.category(&category_id).is_some() {
            self.link(&category_id, widget_id, true);
        } else {
            self.set_status(widget_id, status);
        }

        self.persist();
        Ok(status)
    }

    /// Recomputes the search results over the catalog, keeping catalog
    /// order. Returns the number of matches.
    #[instrument(skip(self))]
    pub fn search_widgets(&mut self, query: &str) -> usize {
        self.search_results = self
            .widgets
            .values()
            .filter(|w| w.matches(query))
            .map(|w| w.id.clone())
            .collect();
        debug!(matches = self.search_results.len(), "searched widgets");
        self.search_results.len()
    }

    /// Every catalog widget of the selected category.
    pub fn available_widgets(&self) -> Vec<&Widget> {
        let Some(selected) = self.selected_category.as_ref() else {
            return vec![];
        };
        self.widgets
            .values()
            .filter(|w| &w.category_id == selected)
            .collect()
    }

    /// Picker rows for the selected category; each widget's status is the
    /// row's initial check state.
    pub fn unchecked_widgets(&self) -> Vec<&Widget> {
        self.available_widgets()
    }

    pub fn checked_widgets(&self) -> Vec<&Widget> {
        self.widgets.values().filter(|w| w.status).collect()
    }

    /// Widgets shown on a category card, in card order.
    pub fn visible_widgets(&self, category_id: &CategoryId) -> Vec<&Widget> {
        let Some(category) = self.category(category_id) else {
            return vec![];
        };
        category
            .widget_ids
            .iter()
            .filter_map(|id| self.widgets.get(id))
            .filter(|w| w.status)
            .collect()
    }

    pub fn is_visible(&self, category_id: &CategoryId, widget_id: &WidgetId) -> bool {
        self.category(category_id)
            .is_some_and(|c| c.references(widget_id))
            && self.widgets.get(widget_id).is_some_and(|w| w.status)
    }

    pub fn search_results(&self) -> Vec<&Widget> {
        self.search_results
            .iter()
            .filter_map(|id| self.widgets.get(id))
            .collect()
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category(&self, category_id: &CategoryId) -> Option<&Category> {
        self.categories.iter().find(|c| &c.id == category_id)
    }

    pub fn widget(&self, widget_id: &WidgetId) -> Option<&Widget> {
        self.widgets.get(widget_id)
    }

    pub fn widgets(&self) -> impl Iterator<Item = &Widget> {
        self.widgets.values()
    }

    pub fn selected_category(&self) -> Option<&CategoryId> {
        self.selected_category.as_ref()
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn snapshot(&self) -> Snapshot {
        Catalog {
            categories: self.categories.clone(),
            widgets: self.widgets.clone(),
        }
        .to_snapshot()
    }

    /// Drops the persisted snapshot and clears memory, so the next
    /// `load_initial_data` seeds from the bootstrap source again.
    #[instrument(skip(self), fields(key = %self.options.key))]
    pub fn reset(&mut self) -> anyhow::Result<()> {
        self.storage.remove(&self.options.key)?;
        self.categories.clear();
        self.widgets.clear();
        self.selected_category = None;
        self.search_results.clear();
        info!("reset widget store");
        Ok(())
    }

    fn apply(&mut self, catalog: Catalog) {
        self.categories = catalog.categories;
        self.widgets = catalog.widgets;
        self.search_results.clear();
    }

    /// Writes the full snapshot. Errors are logged and swallowed: memory
    /// already holds the change, only the next restart can lose it.
    fn persist(&mut self) {
        let payload = match serde_json::to_string(&self.snapshot()) {
            Ok(payload) => payload,
            Err(err) => {
                error!(error = %err, "could not serialize widget store");
                return;
            }
        };

        if let Err(err) = self.storage.set(&self.options.key, &payload) {
            error!(
                key = %self.options.key,
                error = %format!("{err:#}"),
                "could not save state"
            );
        } else {
            debug!(key = %self.options.key, bytes = payload.len(), "persisted widget store");
        }
    }

    fn category_mut(&mut self, category_id: &CategoryId) -> Result<&mut Category, StoreError> {
        self.categories
            .iter_mut()
            .find(|c| &c.id == category_id)
            .ok_or_else(|| StoreError::UnknownCategory(category_id.clone()))
    }

    fn owned_widget(
        &self,
        category_id: &CategoryId,
        widget_id: &WidgetId,
    ) -> Result<&Widget, StoreError> {
        if self.category(category_id).is_none() {
            return Err(StoreError::UnknownCategory(category_id.clone()));
        }
        let widget = self
            .widgets
            .get(widget_id)
            .ok_or_else(|| StoreError::UnknownWidget(widget_id.clone()))?;
        if &widget.category_id != category_id {
            return Err(StoreError::WrongCategory {
                widget: widget_id.clone(),
                category: category_id.clone(),
                owner: widget.category_id.clone(),
            });
        }
        Ok(widget)
    }

    fn link(&mut self, category_id: &CategoryId, widget_id: &WidgetId, status: bool) -> bool {
        let mut changed = false;
        if let Some(category) = self.categories.iter_mut().find(|c| &c.id == category_id)
            && !category.references(widget_id)
        {
            category.widget_ids.push(widget_id.clone());
            changed = true;
        }
        self.set_status(widget_id, status) || changed
    }

    fn set_status(&mut self, widget_id: &WidgetId, status: bool) -> bool {
        match self.widgets.get_mut(widget_id) {
            Some(widget) if widget.status != status => {
                widget.status = status;
                true
            }
            _ => false,
        }
    }
}
