//! TUI application state and logic
//!
//! This module contains TUI-specific state and acts as an adapter between
//! the reconciliation core and the ratatui UI. The visible rows are always
//! a fresh projection of metadata, installed status and the change-set;
//! nothing here patches a row in place.

use color_eyre::Result;
use ratatui::widgets::{ListState, TableState};
use tracing::info;

use appdeck::config::Config;
use appdeck::core::{self, CategoryIndex, ChangeSet};
use appdeck::metadata::{self, MetadataStore};
use appdeck::provider::{DpkgProvider, InstalledStatusProvider};
use appdeck::task::{Task, TaskStatus};
use appdeck::types::*;

/// UI widget state for the main views
pub struct UiState {
    pub cate_state: ListState,
    pub table_state: TableState,
    pub focused_pane: FocusedPane,
}

/// TUI Application - bridges the change-set and projection to UI state
pub struct App {
    pub cfg: Config,
    pub meta: MetadataStore,
    pub categories: CategoryIndex,
    pub changes: ChangeSet,
    pub provider: Box<dyn InstalledStatusProvider>,

    /// Current projection, re-derived after every toggle, filter change,
    /// refresh or commit.
    pub rows: Vec<Row>,
    pub filter: Option<CategoryKey>,

    pub ui: UiState,
    pub state: AppState,
    pub status_message: String,

    /// In-flight metadata refresh, polled from the event tick.
    pub refresh: Option<Task<usize>>,
}

impl App {
    pub fn new(cfg: Config) -> Result<Self> {
        let provider = Box::new(DpkgProvider::new()?);
        let meta = MetadataStore::load(&cfg);
        Ok(Self::with_parts(cfg, meta, provider))
    }

    fn with_parts(
        cfg: Config,
        meta: MetadataStore,
        provider: Box<dyn InstalledStatusProvider>,
    ) -> Self {
        let categories = CategoryIndex::load(&meta);

        let mut cate_state = ListState::default();
        cate_state.select(Some(0));

        let mut app = Self {
            cfg,
            meta,
            categories,
            changes: ChangeSet::new(),
            provider,
            rows: Vec::new(),
            filter: None,
            ui: UiState {
                cate_state,
                table_state: TableState::default(),
                focused_pane: FocusedPane::Applications,
            },
            state: AppState::Listing,
            status_message: String::from("Loading..."),
            refresh: None,
        };

        app.rebuild_rows();
        app.update_status_message();
        app
    }

    /// Re-derive the visible rows, preserving selection by package name.
    pub fn rebuild_rows(&mut self) {
        let selected = self.selected_row().map(|r| r.package.clone());

        let universe = self.meta.universe();
        self.rows = core::project(
            &universe,
            &self.meta,
            self.provider.as_ref(),
            self.filter.as_ref(),
            &self.changes,
        );
        // Display-name ordering is a presentation concern; the projection
        // emits rows in universe order.
        self.rows.sort_by_key(|r| r.display_name.to_lowercase());

        // Update rows have no category; they only appear in the unfiltered
        // view, after the applications.
        if self.filter.is_none() {
            let updates = self.provider.list_updates();
            let update_rows = core::project_updates(&updates, &self.changes);
            self.rows.extend(update_rows);
        }

        let new_idx = selected
            .and_then(|name| self.rows.iter().position(|r| r.package == name))
            .unwrap_or(0);
        self.ui.table_state.select(if self.rows.is_empty() {
            None
        } else {
            Some(new_idx)
        });
    }

    // === Accessors ===

    pub fn selected_row(&self) -> Option<&Row> {
        self.ui.table_state.selected().and_then(|i| self.rows.get(i))
    }

    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    // === Navigation ===

    pub fn move_row_selection(&mut self, delta: i32) {
        if self.rows.is_empty() {
            return;
        }
        let current = self.ui.table_state.selected().unwrap_or(0) as i64;
        let new_idx =
            (current + i64::from(delta)).clamp(0, self.rows.len() as i64 - 1) as usize;
        self.ui.table_state.select(Some(new_idx));
    }

    pub fn move_category_selection(&mut self, delta: i32) {
        if self.categories.is_empty() {
            return;
        }
        let current = self.ui.cate_state.selected().unwrap_or(0) as i32;
        let new_idx = (current + delta).clamp(0, self.categories.len() as i32 - 1) as usize;
        self.ui.cate_state.select(Some(new_idx));
        self.filter = self.categories.select(new_idx);
        self.ui.table_state.select(None);
        self.rebuild_rows();
    }

    pub fn cycle_focus(&mut self) {
        self.ui.focused_pane = match self.ui.focused_pane {
            FocusedPane::Categories => FocusedPane::Applications,
            FocusedPane::Applications => FocusedPane::Categories,
        };
    }

    // === Toggling ===

    pub fn toggle_current(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        let pkg = row.package.clone();
        let kind = row.kind;
        let checked = row.checked;

        match kind {
            RowKind::Application => {
                let installed = self.provider.check_installed(&pkg).unwrap_or(false);
                self.changes.toggle(&pkg, installed);
            }
            RowKind::Update => {
                self.changes.toggle_update(&pkg, checked);
            }
        }

        self.rebuild_rows();
        self.update_status_message();
    }

    // === Apply ===

    /// Apply the change-set. Blocks for the duration of the transaction, so
    /// the caller leaves the alternate screen first.
    pub fn apply(&mut self) {
        let outcome = core::commit(&mut self.changes, self.provider.as_mut());
        self.status_message = if outcome.ok {
            "Update Successful!".to_string()
        } else {
            match outcome.error {
                Some(e) => format!("Update Failed! {e}"),
                None => "Update Failed!".to_string(),
            }
        };
        self.rebuild_rows();
    }

    // === Metadata refresh ===

    pub fn start_refresh(&mut self) {
        if self.refresh.is_some() {
            return;
        }
        info!("starting metadata refresh");
        self.refresh = Some(metadata::spawn_refresh(&self.cfg));
        self.state = AppState::Refreshing;
        self.status_message = "Fetching online data...".to_string();
    }

    pub fn cancel_refresh(&mut self) {
        if let Some(task) = &self.refresh {
            task.cancel();
        }
    }

    /// Drive an in-flight refresh from the event tick. On completion the
    /// metadata store and category index are reloaded wholesale.
    pub fn poll_refresh(&mut self) {
        let Some(task) = self.refresh.as_mut() else {
            return;
        };

        match task.poll() {
            TaskStatus::Pending => {
                self.status_message =
                    format!("Fetching online data... ({} items)", task.items_done());
            }
            TaskStatus::Done(fetched) => {
                self.refresh = None;
                self.state = AppState::Listing;
                self.reload_metadata();
                self.status_message = format!("Fetched {fetched} documents");
            }
            TaskStatus::Failed(e) => {
                self.refresh = None;
                self.state = AppState::Listing;
                self.status_message = e;
            }
        }
    }

    fn reload_metadata(&mut self) {
        self.meta = MetadataStore::load(&self.cfg);
        self.categories = CategoryIndex::load(&self.meta);
        self.ui.cate_state.select(Some(0));
        self.filter = None;
        self.ui.table_state.select(None);
        self.rebuild_rows();
    }

    // === Status message ===

    pub fn update_status_message(&mut self) {
        let count = self.changes.change_count();
        if count > 0 {
            self.status_message =
                format!("{count} pending changes | Press 'a' to apply");
        } else {
            self.status_message = format!("{} applications", self.rows.len());
        }
    }
}
