//! Application metadata: bundled tables and remote JSON documents.
//!
//! Two data sources feed the application list: a bundled static table that
//! works offline, and a pair of downloaded JSON documents (`apps.json`,
//! `cates.json`). Both are collapsed into `AppMeta` here, once, so the rest
//! of the crate never branches on where a record came from.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use color_eyre::Result;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::logo::LogoCache;
use crate::task::{Task, TaskContext};
use crate::types::{AppMeta, Category, CategoryKey, Origin};

/// User-visible message for a failed metadata refresh.
pub const NETWORK_ERROR: &str = "Network is error";

// ============================================================================
// Bundled data
// ============================================================================

/// (package, display name, summary, category name)
const LOCAL_APPS: &[(&str, &str, &str, &str)] = &[
    ("firefox", "Firefox", "Web browser", "Internet"),
    ("thunderbird", "Thunderbird", "Mail and news client", "Internet"),
    ("filezilla", "FileZilla", "FTP, FTPS and SFTP client", "Internet"),
    ("pidgin", "Pidgin", "Multi-protocol instant messaging client", "Internet"),
    ("transmission-gtk", "Transmission", "BitTorrent client", "Internet"),
    ("gimp", "GIMP", "Image editor", "Graphics"),
    ("inkscape", "Inkscape", "Vector graphics editor", "Graphics"),
    ("blender", "Blender", "3D modelling and rendering suite", "Graphics"),
    ("vlc", "VLC", "Media player for most formats", "Multimedia"),
    ("audacity", "Audacity", "Audio editor and recorder", "Multimedia"),
    ("libreoffice", "LibreOffice", "Office productivity suite", "Office"),
    ("gnucash", "GnuCash", "Personal and small-business accounting", "Office"),
    ("vim", "Vim", "Modal text editor", "Development"),
    ("codeblocks", "Code::Blocks", "C/C++ IDE", "Development"),
    ("meld", "Meld", "Visual diff and merge tool", "Development"),
    ("wine", "Wine", "Windows application compatibility layer", "System Tools"),
    ("bleachbit", "BleachBit", "Disk space cleaner", "System Tools"),
    ("gparted", "GParted", "Partition editor", "System Tools"),
];

/// (category name, bundled icon name)
const LOCAL_CATES: &[(&str, &str)] = &[
    ("Internet", "internet"),
    ("Graphics", "graphics"),
    ("Multimedia", "multimedia"),
    ("Office", "office"),
    ("Development", "development"),
    ("System Tools", "system"),
];

// ============================================================================
// Remote documents
// ============================================================================

/// One entry of the remote `apps.json` document.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RemoteApp {
    pub package: String,
    pub name: String,
    pub summary: String,
    /// Remote categories are keyed by id; absent means uncategorized.
    #[serde(default)]
    pub category: u32,
    pub logo32: Option<String>,
}

/// One entry of the remote `cates.json` document.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RemoteCategory {
    pub id: u32,
    pub name: String,
    pub logo: Option<String>,
}

pub fn parse_apps(doc: &str) -> Result<Vec<RemoteApp>> {
    Ok(serde_json::from_str(doc)?)
}

pub fn parse_categories(doc: &str) -> Result<Vec<RemoteCategory>> {
    Ok(serde_json::from_str(doc)?)
}

// ============================================================================
// Item resolution
// ============================================================================

/// One metadata record as it arrives from a data source. Resolved into
/// `AppMeta` exactly once, at the store boundary.
#[derive(Debug, Clone)]
pub enum MetadataItem {
    Local {
        package: &'static str,
        name: &'static str,
        summary: &'static str,
        category: &'static str,
    },
    Remote(RemoteApp),
}

impl MetadataItem {
    pub fn resolve(self) -> (String, AppMeta) {
        match self {
            MetadataItem::Local { package, name, summary, category } => (
                package.to_string(),
                AppMeta {
                    display_name: name.to_string(),
                    summary: summary.to_string(),
                    category: CategoryKey::Name(category.to_string()),
                    logo_url: None,
                    origin: Origin::Bundled,
                },
            ),
            MetadataItem::Remote(app) => (
                app.package,
                AppMeta {
                    display_name: app.name,
                    summary: app.summary,
                    category: CategoryKey::Id(app.category),
                    logo_url: app.logo32,
                    origin: Origin::Remote,
                },
            ),
        }
    }
}

// ============================================================================
// MetadataStore
// ============================================================================

/// Resolved application metadata for one session.
pub struct MetadataStore {
    apps: BTreeMap<String, AppMeta>,
    categories: Vec<Category>,
    remote: bool,
}

impl MetadataStore {
    /// Load metadata per configuration: the downloaded documents when remote
    /// data is enabled and both parse, the bundled tables otherwise.
    pub fn load(cfg: &Config) -> Self {
        if cfg.use_remote_data {
            match Self::load_remote(&cfg.app_data_path(), &cfg.cate_data_path()) {
                Ok(store) => {
                    info!(
                        apps = store.apps.len(),
                        categories = store.categories.len(),
                        "loaded remote metadata"
                    );
                    return store;
                }
                Err(e) => {
                    warn!(error = %e, "remote metadata unavailable, using bundled data");
                }
            }
        }
        Self::bundled()
    }

    fn load_remote(app_path: &Path, cate_path: &Path) -> Result<Self> {
        let apps = parse_apps(&fs::read_to_string(app_path)?)?
            .into_iter()
            .map(|a| MetadataItem::Remote(a).resolve())
            .collect();
        let categories = parse_categories(&fs::read_to_string(cate_path)?)?
            .into_iter()
            .map(|c| Category {
                key: CategoryKey::Id(c.id),
                name: c.name,
                icon: c.logo.unwrap_or_else(|| Category::FALLBACK_ICON.to_string()),
            })
            .collect();
        Ok(Self { apps, categories, remote: true })
    }

    pub fn bundled() -> Self {
        let apps = LOCAL_APPS
            .iter()
            .map(|&(package, name, summary, category)| {
                MetadataItem::Local { package, name, summary, category }.resolve()
            })
            .collect();
        let categories = LOCAL_CATES
            .iter()
            .map(|&(name, icon)| Category {
                key: CategoryKey::Name(name.to_string()),
                name: name.to_string(),
                icon: icon.to_string(),
            })
            .collect();
        Self { apps, categories, remote: false }
    }

    /// Assemble a store from already-resolved parts. Used by tests and by
    /// callers that synthesize metadata.
    pub fn from_parts(
        apps: BTreeMap<String, AppMeta>,
        categories: Vec<Category>,
        remote: bool,
    ) -> Self {
        Self { apps, categories, remote }
    }

    pub fn is_remote_available(&self) -> bool {
        self.remote
    }

    pub fn get(&self, pkg: &str) -> Option<&AppMeta> {
        self.apps.get(pkg)
    }

    pub fn list_items(&self) -> impl Iterator<Item = (&str, &AppMeta)> {
        self.apps.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The full set of package names known to this source.
    pub fn universe(&self) -> Vec<String> {
        self.apps.keys().cloned().collect()
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }
}

// ============================================================================
// Refresh
// ============================================================================

/// Download both metadata documents in a background task, then warm the
/// logo cache for the freshly listed applications.
///
/// Each document is fetched fully into memory and then written via a
/// temp-file rename, and the cancellation flag is checked between work
/// items, so a cancelled or failed refresh never leaves a partial document
/// on disk. Yields the number of documents fetched.
pub fn spawn_refresh(cfg: &Config) -> Task<usize> {
    let targets = vec![
        (cfg.app_data_url.clone(), cfg.app_data_path()),
        (cfg.cate_data_url.clone(), cfg.cate_data_path()),
    ];
    let logo_dir = cfg.logo_dir();

    Task::spawn(move |ctx| {
        let client = reqwest::blocking::Client::new();
        let mut fetched = 0;

        for (url, path) in &targets {
            if ctx.is_cancelled() {
                info!(fetched, "metadata refresh cancelled");
                return Ok(fetched);
            }

            let body = client
                .get(url)
                .send()
                .and_then(reqwest::blocking::Response::error_for_status)
                .and_then(reqwest::blocking::Response::bytes)
                .map_err(|e| {
                    warn!(url = %url, error = %e, "metadata download failed");
                    NETWORK_ERROR.to_string()
                })?;
            write_atomic(path, &body).map_err(|e| e.to_string())?;

            info!(url = %url, bytes = body.len(), "metadata document fetched");
            fetched += 1;
            ctx.advance();
        }

        warm_logo_cache(ctx, &targets[0].1, &logo_dir);
        Ok(fetched)
    })
}

/// Best-effort logo prefetch for every app in the freshly written document.
/// Logo failures stay silent; only cancellation stops the walk early.
fn warm_logo_cache(ctx: &TaskContext, app_doc: &Path, logo_dir: &Path) {
    let Ok(cache) = LogoCache::new(logo_dir) else {
        warn!(dir = %logo_dir.display(), "cannot create logo directory");
        return;
    };
    let Ok(doc) = fs::read_to_string(app_doc) else {
        return;
    };
    let Ok(apps) = parse_apps(&doc) else {
        return;
    };

    for app in apps {
        if ctx.is_cancelled() {
            return;
        }
        if let Some(url) = &app.logo32 {
            cache.fetch_and_store(&app.package, url);
        }
        ctx.advance();
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}
