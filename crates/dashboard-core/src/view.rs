use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::model::{CategoryId, Widget, WidgetId};
use crate::storage::Storage;
use crate::store::{StoreError, WidgetStore};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ViewError {
    #[error("select a category first")]
    NoCategorySelected,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Popup {
    #[default]
    Closed,
    WidgetPicker,
    NewWidget,
}

/// One checkbox in the widget picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerRow {
    pub widget: Widget,
    pub checked: bool,
}

/// A category section as drawn on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCard {
    pub id: CategoryId,
    pub name: String,
    pub widgets: Vec<Widget>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WidgetDraft {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfirmSummary {
    pub added: usize,
    pub shown: usize,
    pub removed: usize,
}

/// View state of the dashboard screen: search box, popups, picker rows and
/// the new-widget form. Store operations are passed the store explicitly.
#[derive(Debug, Clone)]
pub struct Dashboard {
    query: String,
    popup: Popup,
    popup_category: Option<CategoryId>,
    rows: Vec<PickerRow>,
    draft: WidgetDraft,
    new_widget_status: bool,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Dashboard {
    /// `new_widget_status` is the visibility given to widgets created
    /// through the form.
    pub fn new(new_widget_status: bool) -> Self {
        Self {
            query: String::new(),
            popup: Popup::Closed,
            popup_category: None,
            rows: vec![],
            draft: WidgetDraft::default(),
            new_widget_status,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn popup(&self) -> Popup {
        self.popup
    }

    pub fn popup_category(&self) -> Option<&CategoryId> {
        self.popup_category.as_ref()
    }

    pub fn rows(&self) -> &[PickerRow] {
        &self.rows
    }

    pub fn draft(&self) -> &WidgetDraft {
        &self.draft
    }

    /// Search box keystroke. Surrounding whitespace is dropped once here so
    /// the cards, the search results and the picker rows share one query.
    #[instrument(skip(self, store))]
    pub fn set_query<S: Storage>(&mut self, store: &mut WidgetStore<S>, text: &str) {
        self.query = text.trim().to_string();
        store.search_widgets(&self.query);
        if self.popup_category.is_some() {
            self.refresh_rows(store);
        }
    }

    /// One card per category with its visible widgets. While a query is
    /// active only matching widgets are kept and empty cards are dropped.
    pub fn cards<S: Storage>(&self, store: &WidgetStore<S>) -> Vec<CategoryCard> {
        let query = self.query.as_str();
        store
            .categories()
            .iter()
            .filter_map(|category| {
                let widgets: Vec<Widget> = store
                    .visible_widgets(&category.id)
                    .into_iter()
                    .filter(|w| query.is_empty() || w.matches(query))
                    .cloned()
                    .collect();
                if !query.is_empty() && widgets.is_empty() {
                    return None;
                }
                Some(CategoryCard {
                    id: category.id.clone(),
                    name: category.name.clone(),
                    widgets,
                })
            })
            .collect()
    }

    pub fn open_widget_picker(&mut self) {
        self.popup = Popup::WidgetPicker;
    }

    pub fn open_new_widget_form(&mut self) {
        self.popup = Popup::NewWidget;
    }

    pub fn close_popups(&mut self) {
        self.popup = Popup::Closed;
    }

    #[instrument(skip(self, store))]
    pub fn select_category<S: Storage>(
        &mut self,
        store: &mut WidgetStore<S>,
        category_id: &CategoryId,
    ) -> Result<(), ViewError> {
        if store.category(category_id).is_none() {
            return Err(StoreError::UnknownCategory(category_id.clone()).into());
        }
        self.popup_category = Some(category_id.clone());
        store.set_selected_category(Some(category_id.clone()));
        if !self.query.is_empty() {
            store.search_widgets(&self.query);
        }
        self.refresh_rows(store);
        Ok(())
    }

    /// Flips a picker checkbox locally; nothing reaches the store until
    /// `confirm`. Returns the new check state, or `None` for an unknown row.
    pub fn toggle_row(&mut self, widget_id: &WidgetId) -> Option<bool> {
        let row = self.rows.iter_mut().find(|r| &r.widget.id == widget_id)?;
        row.checked = !row.checked;
        Some(row.checked)
    }

    pub fn set_row_checked(&mut self, widget_id: &WidgetId, checked: bool) -> bool {
        match self.rows.iter_mut().find(|r| &r.widget.id == widget_id) {
            Some(row) => {
                row.checked = checked;
                true
            }
            None => false,
        }
    }

    /// Commits the picker: checked rows go onto the category card, rows
    /// unchecked while their widget was on the card are removed from it.
    /// Closes the picker either way.
    #[instrument(skip(self, store))]
    pub fn confirm<S: Storage>(
        &mut self,
        store: &mut WidgetStore<S>,
    ) -> Result<ConfirmSummary, ViewError> {
        let mut summary = ConfirmSummary::default();

        if let Some(category_id) = self.popup_category.clone() {
            for row in &self.rows {
                let id = &row.widget.id;
                if row.checked {
                    if store.widget(id).is_some() {
                        if store.show_widget(&category_id, id)? {
                            summary.shown += 1;
                        }
                    } else if store.add_widget(&category_id, row.widget.clone())? {
                        summary.added += 1;
                    }
                } else if store.is_visible(&category_id, id)
                    && store.remove_widget(&category_id, id)?
                {
                    summary.removed += 1;
                }
            }
            info!(
                category = %category_id,
                added = summary.added,
                shown = summary.shown,
                removed = summary.removed,
                "confirmed widget selection"
            );
            self.refresh_rows(store);
        }

        self.popup = Popup::Closed;
        Ok(summary)
    }

    pub fn set_draft_name(&mut self, name: &str) {
        self.draft.name = name.to_string();
    }

    pub fn set_draft_content(&mut self, content: &str) {
        self.draft.content = content.to_string();
    }

    /// Creates a widget from the form in the selected category. Empty name
    /// and content are accepted.
    #[instrument(skip(self, store, now))]
    pub fn submit_new_widget<S: Storage>(
        &mut self,
        store: &mut WidgetStore<S>,
        now: DateTime<Utc>,
    ) -> Result<WidgetId, ViewError> {
        let category_id = self
            .popup_category
            .clone()
            .ok_or(ViewError::NoCategorySelected)?;

        let id = next_widget_id(store, now);
        let widget = Widget::new(
            id.clone(),
            self.draft.name.clone(),
            self.draft.content.clone(),
            category_id.clone(),
            self.new_widget_status,
        );
        store.add_widget(&category_id, widget.clone())?;
        info!(widget = %id, category = %category_id, "created widget");

        self.rows.push(PickerRow {
            checked: widget.status,
            widget,
        });
        self.draft = WidgetDraft::default();
        if self.popup == Popup::NewWidget {
            self.popup = Popup::Closed;
        }
        Ok(id)
    }

    /// The remove button on a dashboard card.
    #[instrument(skip(self, store))]
    pub fn remove<S: Storage>(
        &mut self,
        store: &mut WidgetStore<S>,
        category_id: &CategoryId,
        widget_id: &WidgetId,
    ) -> Result<bool, ViewError> {
        let removed = store.remove_widget(category_id, widget_id)?;
        if self.popup_category.as_ref() == Some(category_id) {
            self.refresh_rows(store);
        }
        Ok(removed)
    }

    fn refresh_rows<S: Storage>(&mut self, store: &WidgetStore<S>) {
        let Some(category_id) = self.popup_category.as_ref() else {
            return;
        };

        let widgets: Vec<&Widget> = if self.query.is_empty() {
            store.unchecked_widgets()
        } else {
            store
                .search_results()
                .into_iter()
                .filter(|w| &w.category_id == category_id)
                .collect()
        };

        self.rows = widgets
            .into_iter()
            .map(|w| PickerRow {
                checked: store.is_visible(category_id, &w.id),
                widget: w.clone(),
            })
            .collect();
        debug!(category = %category_id, rows = self.rows.len(), "refreshed picker rows");
    }
}

/// Millisecond timestamp id, bumped until it is free in the catalog.
pub fn next_widget_id<S: Storage>(store: &WidgetStore<S>, now: DateTime<Utc>) -> WidgetId {
    let mut stamp = now.timestamp_millis();
    loop {
        let id = WidgetId::from(stamp.to_string());
        if store.widget(&id).is_none() {
            return id;
        }
        stamp += 1;
    }
}
