//! Installed-status lookup and the package-transaction collaborator.
//!
//! The core only sees the `InstalledStatusProvider` trait. `DpkgProvider`
//! implements it on top of dpkg's status database and delegates the actual
//! install/remove transaction to apt-get; dependency resolution and the
//! transaction algorithm stay entirely on that side.

use std::collections::{HashMap, HashSet};
use std::process::Command;

use color_eyre::Result;
use color_eyre::eyre::eyre;
use tracing::{info, warn};

/// The package-transaction collaborator boundary.
pub trait InstalledStatusProvider {
    /// Baseline installed status, `None` when the package is unknown.
    fn check_installed(&self, pkg: &str) -> Option<bool>;

    /// Display name for a known package, `None` when unknown.
    fn get_display_name(&self, pkg: &str) -> Option<String>;

    /// Run the install/remove transaction for the snapshot. May block for
    /// the duration of the transaction.
    fn perform_action(&mut self, to_add: &[String], to_rm: &[String]) -> Result<()>;

    /// Reload the installed-status snapshot; `force` also reloads the
    /// availability listing.
    fn refresh_cache(&mut self, force: bool) -> Result<()>;

    /// Whether every package of the snapshot ended up in its requested
    /// state. A single boolean: partial application reads as not done.
    fn get_install_status(&self, to_add: &[String], to_rm: &[String]) -> bool;

    /// Available upgrades as (package, version summary) pairs. Collaborators
    /// without an upgrade listing offer none.
    fn list_updates(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// dpkg/apt-get backed provider.
///
/// Holds a wholesale snapshot of dpkg's status database plus apt's package
/// name listing; `refresh_cache` replaces both.
pub struct DpkgProvider {
    /// Packages dpkg knows about (installed or residual), with their status.
    installed: HashMap<String, bool>,
    /// Packages apt can install.
    available: HashSet<String>,
    /// Pending upgrades per the last apt-get upgrade simulation.
    upgrades: Vec<(String, String)>,
}

impl DpkgProvider {
    pub fn new() -> Result<Self> {
        let mut provider = Self {
            installed: HashMap::new(),
            available: HashSet::new(),
            upgrades: Vec::new(),
        };
        provider.refresh_cache(true)?;
        Ok(provider)
    }

    fn load_dpkg_status() -> Result<HashMap<String, bool>> {
        let output = Command::new("dpkg-query")
            .args(["-W", "-f", "${Package}\t${db:Status-Status}\n"])
            .output()?;
        if !output.status.success() {
            return Err(eyre!(
                "dpkg-query failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(parse_dpkg_status(&String::from_utf8_lossy(&output.stdout)))
    }

    fn load_available() -> Result<HashSet<String>> {
        let output = Command::new("apt-cache").arg("pkgnames").output()?;
        if !output.status.success() {
            return Err(eyre!(
                "apt-cache pkgnames failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .collect())
    }

    /// Dry-run `apt-get upgrade` and collect the packages it would touch.
    /// Best effort; a failed simulation just means no update rows.
    fn load_upgrades() -> Vec<(String, String)> {
        let Ok(output) = Command::new("apt-get").args(["-s", "-q", "upgrade"]).output() else {
            return Vec::new();
        };
        if !output.status.success() {
            warn!("apt-get upgrade simulation failed");
            return Vec::new();
        }
        parse_upgrade_simulation(&String::from_utf8_lossy(&output.stdout))
    }

    fn run_apt_get(&self, action: &str, packages: &[String]) -> Result<()> {
        info!(action, count = packages.len(), "running apt-get");
        let output = Command::new("apt-get")
            .arg(action)
            .arg("-y")
            .args(packages)
            .output()?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(action, error = %stderr.trim(), "apt-get failed");
            Err(eyre!("apt-get {action} failed: {}", stderr.trim()))
        }
    }
}

impl InstalledStatusProvider for DpkgProvider {
    fn check_installed(&self, pkg: &str) -> Option<bool> {
        match self.installed.get(pkg) {
            Some(installed) => Some(*installed),
            None => self.available.contains(pkg).then_some(false),
        }
    }

    fn get_display_name(&self, pkg: &str) -> Option<String> {
        self.check_installed(pkg).map(|_| pkg.to_string())
    }

    fn perform_action(&mut self, to_add: &[String], to_rm: &[String]) -> Result<()> {
        if !to_add.is_empty() {
            self.run_apt_get("install", to_add)?;
        }
        if !to_rm.is_empty() {
            self.run_apt_get("remove", to_rm)?;
        }
        Ok(())
    }

    fn refresh_cache(&mut self, force: bool) -> Result<()> {
        self.installed = Self::load_dpkg_status()?;
        self.upgrades = Self::load_upgrades();
        if force || self.available.is_empty() {
            self.available = Self::load_available()?;
        }
        info!(
            known = self.installed.len(),
            available = self.available.len(),
            upgrades = self.upgrades.len(),
            "status cache refreshed"
        );
        Ok(())
    }

    fn get_install_status(&self, to_add: &[String], to_rm: &[String]) -> bool {
        to_add.iter().all(|p| self.check_installed(p) == Some(true))
            && to_rm.iter().all(|p| self.check_installed(p) != Some(true))
    }

    fn list_updates(&self) -> Vec<(String, String)> {
        self.upgrades.clone()
    }
}

/// Parse the `Inst` lines of an `apt-get -s upgrade` simulation, e.g.
/// `Inst vim [9.0-1] (9.1-1 Debian:stable [amd64])`.
fn parse_upgrade_simulation(out: &str) -> Vec<(String, String)> {
    out.lines()
        .filter_map(|line| {
            let rest = line.strip_prefix("Inst ")?;
            let mut parts = rest.split_whitespace();
            let pkg = parts.next()?;
            let second = parts.next()?;
            let summary = if let Some(old) = second.strip_prefix('[') {
                let old = old.trim_end_matches(']');
                let new = parts.next()?.trim_start_matches('(');
                format!("{old} -> {new}")
            } else {
                // Pulled in as a new package, no current version.
                format!("new {}", second.trim_start_matches('('))
            };
            Some((pkg.to_string(), summary))
        })
        .collect()
}

/// Parse `dpkg-query -W -f '${Package}\t${db:Status-Status}\n'` output.
fn parse_dpkg_status(out: &str) -> HashMap<String, bool> {
    out.lines()
        .filter_map(|line| {
            let (name, status) = line.split_once('\t')?;
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), status.trim() == "installed"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dpkg_status_lines() {
        let out = "vim\tinstalled\nold-tool\tconfig-files\ngimp\tnot-installed\n";
        let map = parse_dpkg_status(out);
        assert_eq!(map.get("vim"), Some(&true));
        assert_eq!(map.get("old-tool"), Some(&false));
        assert_eq!(map.get("gimp"), Some(&false));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn skips_malformed_lines() {
        let out = "noseparator\n\tinstalled\nvim\tinstalled\n";
        let map = parse_dpkg_status(out);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("vim"), Some(&true));
    }

    #[test]
    fn parses_upgrade_simulation_lines() {
        let out = "Reading package lists...\n\
                   Inst vim [9.0-1] (9.1-1 Debian:stable [amd64])\n\
                   Inst vim-common (9.1-1 Debian:stable [all])\n\
                   Conf vim (9.1-1 Debian:stable [amd64])\n";
        let updates = parse_upgrade_simulation(out);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0], ("vim".to_string(), "9.0-1 -> 9.1-1".to_string()));
        assert_eq!(updates[1], ("vim-common".to_string(), "new 9.1-1".to_string()));
    }

    #[test]
    fn install_status_requires_full_snapshot() {
        let provider = DpkgProvider {
            installed: HashMap::from([
                ("vim".to_string(), true),
                ("gimp".to_string(), false),
            ]),
            available: HashSet::from(["inkscape".to_string()]),
            upgrades: Vec::new(),
        };

        // gimp was requested but is not installed: not done.
        assert!(!provider.get_install_status(
            &["vim".to_string(), "gimp".to_string()],
            &[],
        ));
        // vim installed, gimp absent from the removal side: done.
        assert!(provider.get_install_status(
            &["vim".to_string()],
            &["gimp".to_string()],
        ));
        // Never-installed but available packages read as not installed.
        assert_eq!(provider.check_installed("inkscape"), Some(false));
        assert_eq!(provider.check_installed("no-such"), None);
    }
}
