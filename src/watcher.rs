//! Asset Watcher - Reload on Disk Changes
//!
//! Watches an asset root (see [`crate::library`] for the layout), maps each
//! debounced file event to the asset it names, reloads that asset and then
//! rescores the whole matrix. Descriptor files are named `<id>.json`.
//!
//! Registry mutation is not locked. The host drives all changes through one
//! `&mut AssetLibrary`, which serializes them.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::compatibility::RuleSet;
use crate::library::{AssetLibrary, RULES_FILE, TEMPLATES_DIR, THEMES_DIR};
use crate::registry::{is_json_file, load_asset_file, AssetError};
use crate::templates::Template;
use crate::themes::Theme;

/// Default quiet period before a burst of events is delivered.
const DEFAULT_DEBOUNCE_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Failed to watch {path}: {message}")]
    Notify { path: PathBuf, message: String },

    #[error(transparent)]
    Asset(#[from] AssetError),
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

/// The asset a changed file stands for.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum AssetChange {
    Template(String),
    Theme(String),
    Rules,
}

impl AssetChange {
    /// Map a path under `root` to an asset. Files outside the layout map to
    /// nothing.
    pub fn from_path(root: &Path, path: &Path) -> Option<AssetChange> {
        let relative = path.strip_prefix(root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect();

        match parts.as_slice() {
            [file] if *file == RULES_FILE => Some(AssetChange::Rules),
            [dir, _] if is_json_file(relative) => {
                let id = relative.file_stem()?.to_str()?.to_string();
                match *dir {
                    TEMPLATES_DIR => Some(AssetChange::Template(id)),
                    THEMES_DIR => Some(AssetChange::Theme(id)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn path(&self, root: &Path) -> PathBuf {
        match self {
            AssetChange::Template(id) => root.join(TEMPLATES_DIR).join(format!("{}.json", id)),
            AssetChange::Theme(id) => root.join(THEMES_DIR).join(format!("{}.json", id)),
            AssetChange::Rules => root.join(RULES_FILE),
        }
    }
}

/// Reload whatever `change` names, then rescore every pair.
///
/// A file that no longer exists unregisters its asset. A file that cannot
/// be parsed is skipped with a warning and the registry keeps its old value.
pub fn apply_change(library: &mut AssetLibrary, root: &Path, change: &AssetChange) -> Result<(), AssetError> {
    let path = change.path(root);
    let exists = path.exists();

    match change {
        AssetChange::Template(id) if !exists => {
            library.unregister_template(id);
        }
        AssetChange::Theme(id) if !exists => {
            library.unregister_theme(id);
        }
        AssetChange::Template(_) => match load_asset_file::<Template>(&path) {
            Ok(template) => {
                library.register_template(template);
            }
            Err(e) => warn!(error = %e, "Skipping changed template"),
        },
        AssetChange::Theme(_) => match load_asset_file::<Theme>(&path) {
            Ok(theme) => {
                library.register_theme(theme);
            }
            Err(e) => warn!(error = %e, "Skipping changed theme"),
        },
        AssetChange::Rules => match RuleSet::load_from_file(&path) {
            Ok(rules) => library.replace_rules(rules),
            Err(e) => warn!(error = %e, "Skipping changed rules"),
        },
    }

    debug!(change = ?change, "Applied asset change");
    library.recompute_matrix()?;
    Ok(())
}

pub struct AssetWatcher {
    root: PathBuf,
    _debouncer: Debouncer<notify::RecommendedWatcher>,
    event_rx: mpsc::UnboundedReceiver<AssetChange>,
}

impl AssetWatcher {
    pub fn new(root: &Path, config: WatchConfig) -> Result<Self, WatchError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let callback_root = root.clone();

        let mut debouncer = new_debouncer(
            Duration::from_millis(config.debounce_ms),
            move |res: Result<Vec<DebouncedEvent>, notify::Error>| match res {
                Ok(events) => {
                    let changes: BTreeSet<AssetChange> = events
                        .iter()
                        .filter_map(|event| AssetChange::from_path(&callback_root, &event.path))
                        .collect();
                    for change in changes {
                        debug!(change = ?change, "Asset change detected");
                        if event_tx.send(change).is_err() {
                            debug!("Change receiver dropped, stopping watcher");
                            break;
                        }
                    }
                }
                Err(e) => warn!(error = %e, "Asset watch error"),
            },
        )
        .map_err(|e| WatchError::Notify {
            path: root.clone(),
            message: e.to_string(),
        })?;

        debouncer
            .watcher()
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| WatchError::Notify {
                path: root.clone(),
                message: e.to_string(),
            })?;

        info!(path = %root.display(), debounce_ms = config.debounce_ms, "Watching asset directory");

        Ok(Self {
            root,
            _debouncer: debouncer,
            event_rx,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Next change, or `None` once the watcher has stopped.
    pub async fn recv(&mut self) -> Option<AssetChange> {
        self.event_rx.recv().await
    }

    /// Apply changes to `library` until the watcher stops.
    pub async fn run(&mut self, library: &mut AssetLibrary) {
        while let Some(change) = self.recv().await {
            if let Err(e) = apply_change(library, &self.root, &change) {
                warn!(error = %e, change = ?change, "Failed to apply asset change");
            }
        }
    }
}
