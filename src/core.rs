//! Core reconciliation logic
//!
//! The `ChangeSet` is the single source of truth for the user's uncommitted
//! intent: two disjoint sets of package names, "to add" and "to remove".
//! Visible rows are derived from it by `project` on every pass and never
//! patched incrementally, so the list can be rebuilt after any toggle,
//! category change, or commit without drift.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::metadata::MetadataStore;
use crate::provider::InstalledStatusProvider;
use crate::types::{Category, CategoryKey, CommitOutcome, PackageRecord, Row, RowKind, Toggle};

// ============================================================================
// ChangeSet
// ============================================================================

/// Pending, uncommitted user intent.
///
/// Invariant: a package name appears in at most one of the two sets. The
/// toggle protocol preserves this structurally; no runtime check is needed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    to_add: BTreeSet<String>,
    to_rm: BTreeSet<String>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle an application row.
    ///
    /// `currently_installed` is the package's baseline status, not its
    /// displayed checkbox. A toggle against a package that is already
    /// pending (in either direction) takes it out of the pending set, so
    /// toggling twice from a settled state is a no-op on the sets.
    pub fn toggle(&mut self, pkg: &str, currently_installed: bool) -> Toggle {
        let desired_installed = !currently_installed;

        let pending = if desired_installed {
            if self.to_rm.remove(pkg) || self.to_add.remove(pkg) {
                false
            } else {
                self.to_add.insert(pkg.to_string());
                true
            }
        } else if self.to_add.remove(pkg) || self.to_rm.remove(pkg) {
            false
        } else {
            self.to_rm.insert(pkg.to_string());
            true
        };

        Toggle {
            // Settled rows show their baseline, pending rows its inverse.
            checked: currently_installed != pending,
            pending,
            change_count: self.change_count(),
        }
    }

    /// Toggle an update row. Updates have no removal concept; they only ever
    /// enter or leave the to-add set.
    pub fn toggle_update(&mut self, pkg: &str, currently_checked: bool) -> Toggle {
        let checked = !currently_checked;
        if checked {
            self.to_add.insert(pkg.to_string());
        } else {
            self.to_add.remove(pkg);
        }

        Toggle {
            checked,
            pending: checked,
            change_count: self.change_count(),
        }
    }

    /// Whether the package has an uncommitted change.
    pub fn is_pending(&self, pkg: &str) -> bool {
        self.to_add.contains(pkg) || self.to_rm.contains(pkg)
    }

    /// `|to_add| + |to_rm|`; zero means there is nothing to apply.
    pub fn change_count(&self) -> usize {
        self.to_add.len() + self.to_rm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_rm.is_empty()
    }

    pub fn clear(&mut self) {
        self.to_add.clear();
        self.to_rm.clear();
    }

    /// Ordered snapshot of both sets, for handing to the transaction
    /// collaborator.
    pub fn snapshot(&self) -> (Vec<String>, Vec<String>) {
        (
            self.to_add.iter().cloned().collect(),
            self.to_rm.iter().cloned().collect(),
        )
    }

    pub fn to_add(&self) -> &BTreeSet<String> {
        &self.to_add
    }

    pub fn to_rm(&self) -> &BTreeSet<String> {
        &self.to_rm
    }

    /// Restore a persisted change-set (debug CLI state file). Names present
    /// in both lists land in to_add only, keeping the sets disjoint.
    pub fn restore(to_add: Vec<String>, to_rm: Vec<String>) -> Self {
        let to_add: BTreeSet<String> = to_add.into_iter().collect();
        let to_rm = to_rm.into_iter().filter(|p| !to_add.contains(p)).collect();
        Self { to_add, to_rm }
    }
}

// ============================================================================
// CategoryIndex
// ============================================================================

/// Ordered category list: a synthetic "All Categories" entry at index 0,
/// then the data source's categories in document order.
#[derive(Debug, Clone)]
pub struct CategoryIndex {
    entries: Vec<Category>,
}

impl CategoryIndex {
    pub fn load(meta: &MetadataStore) -> Self {
        let mut entries = Vec::with_capacity(meta.categories().len() + 1);
        entries.push(Category {
            key: CategoryKey::UNCATEGORIZED,
            name: "All Categories".to_string(),
            icon: "all".to_string(),
        });
        entries.extend(meta.categories().iter().cloned());
        Self { entries }
    }

    /// Map a selected entry to a projection filter. Index 0 ("All") and
    /// out-of-range selections mean no filtering.
    pub fn select(&self, index: usize) -> Option<CategoryKey> {
        if index == 0 {
            return None;
        }
        self.entries.get(index).map(|c| c.key.clone())
    }

    pub fn entries(&self) -> &[Category] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// AppListProjection
// ============================================================================

/// Derive the visible application rows.
///
/// Pure with respect to its inputs: it never mutates the change-set or the
/// stores, and re-running it with unchanged inputs yields the same rows.
/// Packages that cannot be resolved against the metadata store or the status
/// provider are skipped silently; partial data is normal when the local and
/// remote sources disagree. Rows are emitted in universe order, display-name
/// sorting belongs to the presentation layer.
pub fn project(
    universe: &[String],
    meta: &MetadataStore,
    status: &dyn InstalledStatusProvider,
    active_filter: Option<&CategoryKey>,
    changes: &ChangeSet,
) -> Vec<Row> {
    let mut rows = Vec::new();

    for pkg in universe {
        let Some(record) = resolve_record(pkg, meta, status) else {
            continue;
        };

        if let Some(filter) = active_filter
            && *filter != record.category
        {
            continue;
        }

        let pending = changes.is_pending(&record.package);
        rows.push(Row {
            checked: record.installed != pending,
            pending,
            package: record.package,
            display_name: record.display_name,
            summary: record.summary,
            category: record.category,
            kind: RowKind::Application,
        });
    }

    rows
}

/// Join one package with its metadata and installed status. A failed lookup
/// on either side logs and yields `None`.
fn resolve_record(
    pkg: &str,
    meta: &MetadataStore,
    status: &dyn InstalledStatusProvider,
) -> Option<PackageRecord> {
    let Some(app) = meta.get(pkg) else {
        debug!(package = %pkg, "no metadata for package, skipping row");
        return None;
    };
    let Some(installed) = status.check_installed(pkg) else {
        debug!(package = %pkg, "package unknown to status provider, skipping row");
        return None;
    };

    // The curated metadata name is authoritative; the provider's name only
    // stands in when the data source has none.
    let display_name = if app.display_name.is_empty() {
        status
            .get_display_name(pkg)
            .unwrap_or_else(|| pkg.to_string())
    } else {
        app.display_name.clone()
    };

    Some(PackageRecord {
        package: pkg.to_string(),
        display_name,
        summary: app.summary.clone(),
        category: app.category.clone(),
        installed,
    })
}

/// Derive rows for available updates. Update rows sit outside the category
/// scheme and start unchecked; a checked update row means the package is in
/// the to-add set.
pub fn project_updates(updates: &[(String, String)], changes: &ChangeSet) -> Vec<Row> {
    updates
        .iter()
        .map(|(pkg, summary)| {
            let pending = changes.to_add().contains(pkg);
            let mut row = Row::update(pkg, summary);
            row.checked = pending;
            row.pending = pending;
            row
        })
        .collect()
}

// ============================================================================
// CommitCoordinator
// ============================================================================

/// Apply the change-set through the package-transaction collaborator.
///
/// All-snapshot-or-nothing from this side: the change-set is cleared only
/// when the collaborator reports the whole snapshot as done. On any failure
/// it stays untouched so the user can retry or keep editing.
pub fn commit(
    changes: &mut ChangeSet,
    provider: &mut dyn InstalledStatusProvider,
) -> CommitOutcome {
    let (to_add, to_rm) = changes.snapshot();
    if to_add.is_empty() && to_rm.is_empty() {
        return CommitOutcome::success();
    }

    info!(adds = to_add.len(), removes = to_rm.len(), "applying change-set");

    if let Err(e) = provider.perform_action(&to_add, &to_rm) {
        warn!(error = %e, "package transaction failed to start");
        return CommitOutcome::failure(e.to_string());
    }

    if let Err(e) = provider.refresh_cache(true) {
        // Status below is still authoritative; a stale cache just means a
        // conservative failure report.
        warn!(error = %e, "status cache refresh failed");
    }

    if provider.get_install_status(&to_add, &to_rm) {
        changes.clear();
        info!("change-set applied");
        CommitOutcome::success()
    } else {
        warn!("transaction incomplete, change-set preserved");
        CommitOutcome::failure("not all requested changes were applied")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use color_eyre::Result;

    use super::*;
    use crate::types::{AppMeta, Origin};

    struct FakeProvider {
        installed: HashMap<String, bool>,
        done: bool,
        performed: Vec<(Vec<String>, Vec<String>)>,
        refreshes: usize,
    }

    impl FakeProvider {
        fn new(installed: &[(&str, bool)]) -> Self {
            Self {
                installed: installed
                    .iter()
                    .map(|(p, i)| (p.to_string(), *i))
                    .collect(),
                done: true,
                performed: Vec::new(),
                refreshes: 0,
            }
        }
    }

    impl InstalledStatusProvider for FakeProvider {
        fn check_installed(&self, pkg: &str) -> Option<bool> {
            self.installed.get(pkg).copied()
        }

        fn get_display_name(&self, pkg: &str) -> Option<String> {
            self.installed.contains_key(pkg).then(|| pkg.to_string())
        }

        fn perform_action(&mut self, to_add: &[String], to_rm: &[String]) -> Result<()> {
            self.performed.push((to_add.to_vec(), to_rm.to_vec()));
            Ok(())
        }

        fn refresh_cache(&mut self, _force: bool) -> Result<()> {
            self.refreshes += 1;
            Ok(())
        }

        fn get_install_status(&self, _to_add: &[String], _to_rm: &[String]) -> bool {
            self.done
        }
    }

    fn meta(apps: &[(&str, &str)]) -> MetadataStore {
        let apps = apps
            .iter()
            .map(|(pkg, cate)| {
                (
                    pkg.to_string(),
                    AppMeta {
                        display_name: pkg.to_string(),
                        summary: format!("{pkg} summary"),
                        category: CategoryKey::Name(cate.to_string()),
                        logo_url: None,
                        origin: Origin::Bundled,
                    },
                )
            })
            .collect();
        MetadataStore::from_parts(apps, Vec::new(), false)
    }

    fn names(rows: &[Row]) -> Vec<&str> {
        rows.iter().map(|r| r.package.as_str()).collect()
    }

    #[test]
    fn toggle_twice_returns_to_settled_state() {
        let mut cs = ChangeSet::new();

        let first = cs.toggle("gimp", false);
        assert!(first.checked && first.pending);
        assert_eq!(first.change_count, 1);

        // Baseline unchanged: the second toggle undoes the first.
        let second = cs.toggle("gimp", false);
        assert!(!second.checked && !second.pending);
        assert_eq!(second.change_count, 0);
        assert!(cs.is_empty());
    }

    #[test]
    fn toggle_installed_package_marks_removal_then_settles() {
        let mut cs = ChangeSet::new();

        let first = cs.toggle("vim", true);
        assert!(!first.checked && first.pending);
        assert!(cs.to_rm().contains("vim"));

        let second = cs.toggle("vim", true);
        assert!(second.checked && !second.pending);
        assert!(cs.is_empty());
    }

    #[test]
    fn sets_never_overlap() {
        let mut cs = ChangeSet::new();
        let packages = ["vim", "gimp", "vlc"];
        let baselines = [true, false, true];

        // Arbitrary toggle storm; the invariant must hold after each step.
        for round in 0..5 {
            for (pkg, baseline) in packages.iter().zip(baselines) {
                if (round + pkg.len()) % 2 == 0 {
                    cs.toggle(pkg, baseline);
                }
                for p in &packages {
                    assert!(
                        !(cs.to_add().contains(*p) && cs.to_rm().contains(*p)),
                        "{p} present in both sets"
                    );
                }
            }
        }
    }

    #[test]
    fn toggle_update_only_touches_to_add() {
        let mut cs = ChangeSet::new();

        let on = cs.toggle_update("linux-image", false);
        assert!(on.checked && on.pending);
        assert!(cs.to_add().contains("linux-image"));
        assert!(cs.to_rm().is_empty());

        let off = cs.toggle_update("linux-image", true);
        assert!(!off.checked && !off.pending);
        assert!(cs.is_empty());
    }

    #[test]
    fn restore_keeps_sets_disjoint() {
        let cs = ChangeSet::restore(
            vec!["gimp".into(), "vlc".into()],
            vec!["vlc".into(), "vim".into()],
        );
        assert!(cs.to_add().contains("vlc"));
        assert!(!cs.to_rm().contains("vlc"));
        assert_eq!(cs.change_count(), 3);
    }

    #[test]
    fn projection_is_pure_and_repeatable() {
        let meta = meta(&[("vim", "Editors"), ("gimp", "Graphics")]);
        let status = FakeProvider::new(&[("vim", true), ("gimp", false)]);
        let mut cs = ChangeSet::new();
        cs.toggle("gimp", false);
        let universe = vec!["vim".to_string(), "gimp".to_string()];

        let before = cs.clone();
        let a = project(&universe, &meta, &status, None, &cs);
        let b = project(&universe, &meta, &status, None, &cs);
        assert_eq!(a, b);
        assert_eq!(cs, before, "projection must not mutate the change-set");
    }

    #[test]
    fn filter_selects_exactly_matching_categories() {
        let meta = meta(&[
            ("vim", "Editors"),
            ("gimp", "Graphics"),
            ("inkscape", "Graphics"),
        ]);
        let status =
            FakeProvider::new(&[("vim", true), ("gimp", false), ("inkscape", false)]);
        let cs = ChangeSet::new();
        let universe: Vec<String> =
            ["vim", "gimp", "inkscape"].iter().map(|s| s.to_string()).collect();

        let graphics = CategoryKey::Name("Graphics".to_string());
        let filtered = project(&universe, &meta, &status, Some(&graphics), &cs);
        assert_eq!(names(&filtered), ["gimp", "inkscape"]);

        let all = project(&universe, &meta, &status, None, &cs);
        assert_eq!(names(&all), ["vim", "gimp", "inkscape"]);
    }

    #[test]
    fn missing_metadata_never_projects_a_row() {
        let meta = meta(&[("vim", "Editors")]);
        let status = FakeProvider::new(&[("vim", true), ("ghost", false)]);
        let cs = ChangeSet::new();
        let universe = vec!["vim".to_string(), "ghost".to_string()];

        let rows = project(&universe, &meta, &status, None, &cs);
        assert_eq!(names(&rows), ["vim"]);

        let editors = CategoryKey::Name("Editors".to_string());
        let rows = project(&universe, &meta, &status, Some(&editors), &cs);
        assert_eq!(names(&rows), ["vim"]);
    }

    #[test]
    fn unknown_status_skips_row() {
        // In metadata but not known to the provider: no row, no panic.
        let meta = meta(&[("vim", "Editors"), ("orphan", "Editors")]);
        let status = FakeProvider::new(&[("vim", true)]);
        let cs = ChangeSet::new();
        let universe = vec!["vim".to_string(), "orphan".to_string()];

        let rows = project(&universe, &meta, &status, None, &cs);
        assert_eq!(names(&rows), ["vim"]);
    }

    #[test]
    fn settled_rows_mirror_installed_status() {
        let meta = meta(&[("vim", "Editors"), ("gimp", "Graphics")]);
        let status = FakeProvider::new(&[("vim", true), ("gimp", false)]);
        let cs = ChangeSet::new();
        let universe = vec!["vim".to_string(), "gimp".to_string()];

        let rows = project(&universe, &meta, &status, None, &cs);
        assert_eq!(rows.len(), 2);
        assert!(rows[0].checked && !rows[0].pending);
        assert!(!rows[1].checked && !rows[1].pending);
    }

    #[test]
    fn toggled_row_flips_checked_and_highlights() {
        let meta = meta(&[("gimp", "Graphics")]);
        let status = FakeProvider::new(&[("gimp", false)]);
        let mut cs = ChangeSet::new();
        let universe = vec!["gimp".to_string()];

        cs.toggle("gimp", false);
        assert!(cs.to_add().contains("gimp"));
        let rows = project(&universe, &meta, &status, None, &cs);
        assert!(rows[0].checked && rows[0].pending);

        // Second toggle against the unchanged baseline restores everything.
        cs.toggle("gimp", false);
        assert!(cs.is_empty());
        let rows = project(&universe, &meta, &status, None, &cs);
        assert!(!rows[0].checked && !rows[0].pending);
    }

    #[test]
    fn rows_carry_curated_display_names() {
        let apps = BTreeMap::from([
            (
                "gimp".to_string(),
                AppMeta {
                    display_name: "GIMP".to_string(),
                    summary: "Image editor".to_string(),
                    category: CategoryKey::Name("Graphics".to_string()),
                    logo_url: None,
                    origin: Origin::Bundled,
                },
            ),
            (
                "nameless".to_string(),
                AppMeta {
                    display_name: String::new(),
                    summary: "No curated name".to_string(),
                    category: CategoryKey::Name("Graphics".to_string()),
                    logo_url: None,
                    origin: Origin::Remote,
                },
            ),
        ]);
        let meta = MetadataStore::from_parts(apps, Vec::new(), false);
        let status = FakeProvider::new(&[("gimp", false), ("nameless", true)]);
        let universe = vec!["gimp".to_string(), "nameless".to_string()];

        let rows = project(&universe, &meta, &status, None, &ChangeSet::new());
        assert_eq!(rows[0].display_name, "GIMP");
        // An empty curated name falls back to the provider's name.
        assert_eq!(rows[1].display_name, "nameless");
    }

    #[test]
    fn update_rows_track_to_add_membership() {
        let mut cs = ChangeSet::new();
        let updates = vec![("linux-image".to_string(), "6.1 -> 6.2".to_string())];

        let rows = project_updates(&updates, &cs);
        assert_eq!(rows[0].kind, RowKind::Update);
        assert!(!rows[0].checked && !rows[0].pending);

        cs.toggle_update("linux-image", rows[0].checked);
        let rows = project_updates(&updates, &cs);
        assert!(rows[0].checked && rows[0].pending);
        assert!(cs.to_add().contains("linux-image"));
        assert!(cs.to_rm().is_empty());
    }

    #[test]
    fn select_on_category_index_maps_all_to_none() {
        let store = MetadataStore::from_parts(
            Default::default(),
            vec![
                Category {
                    key: CategoryKey::Id(1),
                    name: "Internet".to_string(),
                    icon: "internet".to_string(),
                },
                Category {
                    key: CategoryKey::Id(2),
                    name: "Graphics".to_string(),
                    icon: "graphics".to_string(),
                },
            ],
            true,
        );
        let index = CategoryIndex::load(&store);

        assert_eq!(index.len(), 3);
        assert_eq!(index.entries()[0].name, "All Categories");
        assert_eq!(index.select(0), None);
        assert_eq!(index.select(1), Some(CategoryKey::Id(1)));
        assert_eq!(index.select(2), Some(CategoryKey::Id(2)));
        assert_eq!(index.select(99), None);
    }

    #[test]
    fn commit_success_clears_change_set() {
        let mut provider = FakeProvider::new(&[("gimp", false)]);
        let mut cs = ChangeSet::new();
        cs.toggle("gimp", false);

        let outcome = commit(&mut cs, &mut provider);
        assert!(outcome.ok);
        assert!(cs.is_empty());
        assert_eq!(provider.performed.len(), 1);
        assert_eq!(provider.performed[0].0, ["gimp"]);
        assert!(provider.performed[0].1.is_empty());
        assert_eq!(provider.refreshes, 1);
    }

    #[test]
    fn commit_failure_preserves_change_set() {
        let mut provider = FakeProvider::new(&[("gimp", false)]);
        provider.done = false;
        let mut cs = ChangeSet::new();
        cs.toggle("gimp", false);
        let before = cs.clone();

        let outcome = commit(&mut cs, &mut provider);
        assert!(!outcome.ok);
        assert!(outcome.error.is_some());
        assert_eq!(cs, before);
    }

    #[test]
    fn commit_of_empty_change_set_skips_provider() {
        let mut provider = FakeProvider::new(&[]);
        let mut cs = ChangeSet::new();

        let outcome = commit(&mut cs, &mut provider);
        assert!(outcome.ok);
        assert!(provider.performed.is_empty());
        assert_eq!(provider.refreshes, 0);
    }
}
