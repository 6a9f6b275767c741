//! Common types used throughout the application

/// Category identity differs by data source: remote documents key categories
/// by numeric id, the bundled tables only carry names. The two keyings are
/// kept distinct so a filter from one source can never match the other's.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CategoryKey {
    Id(u32),
    Name(String),
}

impl CategoryKey {
    /// Key for packages the data source did not categorize.
    pub const UNCATEGORIZED: CategoryKey = CategoryKey::Id(0);
}

/// A category entry in the left pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub key: CategoryKey,
    pub name: String,
    /// Icon reference (bundled file name or remote URL). An unreachable icon
    /// degrades to [`Category::FALLBACK_ICON`], it never fails a load.
    pub icon: String,
}

impl Category {
    pub const FALLBACK_ICON: &'static str = "category-generic";
}

/// Where a metadata record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Bundled,
    Remote,
}

/// Resolved application metadata. The local and remote representations are
/// collapsed into this at the metadata-store boundary; nothing downstream
/// branches on representation again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppMeta {
    pub display_name: String,
    pub summary: String,
    pub category: CategoryKey,
    pub logo_url: Option<String>,
    pub origin: Origin,
}

/// A package joined with its current installed status. Built transiently per
/// projection pass from metadata plus a status lookup; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub package: String,
    pub display_name: String,
    pub summary: String,
    pub category: CategoryKey,
    pub installed: bool,
}

/// Row kind in the application table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Application,
    /// An available update offered alongside applications. Update rows only
    /// ever toggle membership in the to-add set.
    Update,
}

/// One visible row, fully recomputed on every projection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub package: String,
    pub display_name: String,
    pub summary: String,
    pub category: CategoryKey,
    /// Effective checkbox state: `installed XOR pending`.
    pub checked: bool,
    /// True iff the package sits in the change-set; drives the highlight.
    pub pending: bool,
    pub kind: RowKind,
}

impl Row {
    /// Build an update-kind row. Updates carry no category and start
    /// unchecked until the user opts in.
    pub fn update(package: &str, summary: &str) -> Self {
        Self {
            package: package.to_string(),
            display_name: package.to_string(),
            summary: summary.to_string(),
            category: CategoryKey::UNCATEGORIZED,
            checked: false,
            pending: false,
            kind: RowKind::Update,
        }
    }
}

/// Result of one toggle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toggle {
    pub checked: bool,
    pub pending: bool,
    /// `|to_add| + |to_rm|` after the toggle; drives the apply control.
    pub change_count: usize,
}

/// Result of a commit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub ok: bool,
    pub error: Option<String>,
}

impl CommitOutcome {
    pub fn success() -> Self {
        Self { ok: true, error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { ok: false, error: Some(error.into()) }
    }
}

/// Which pane has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusedPane {
    Categories,
    Applications,
}

/// Application state machine
#[derive(Debug, PartialEq, Eq)]
pub enum AppState {
    Listing,
    ConfirmApply,
    Refreshing,
    ConfirmExit,
}
