use serde_json::{Map, Value};

use crate::profile::ResolvedColors;

/// Every `workbench.colorCustomizations` key this tool may write.
///
/// Applying colors first deletes all of these, then sets the newly resolved
/// ones, so stale keys from earlier passes (or earlier versions with a wider
/// key set) cannot linger. Keys outside this list are never touched.
///
/// Sorted for binary search.
pub const MANAGED_COLOR_KEYS: &[&str] = &[
    "activityBar.background",
    "activityBar.foreground",
    "activityBar.inactiveForeground",
    "activityBarBadge.background",
    "activityBarBadge.foreground",
    "breadcrumb.background",
    "breadcrumb.foreground",
    "commandCenter.background",
    "commandCenter.border",
    "commandCenter.foreground",
    "editorGroupHeader.tabsBackground",
    "editorGroupHeader.tabsBorder",
    "panel.background",
    "panel.border",
    "panelTitle.activeForeground",
    "sideBar.background",
    "sideBar.foreground",
    "sideBarSectionHeader.background",
    "sideBarSectionHeader.foreground",
    "sideBarTitle.foreground",
    "statusBar.background",
    "statusBar.border",
    "statusBar.foreground",
    "statusBarItem.hoverBackground",
    "statusBarItem.remoteBackground",
    "statusBarItem.remoteForeground",
    "tab.activeBackground",
    "tab.activeBorder",
    "tab.activeForeground",
    "tab.hoverBackground",
    "tab.inactiveBackground",
    "tab.inactiveForeground",
    "tab.unfocusedActiveBackground",
    "tab.unfocusedInactiveBackground",
    "titleBar.activeBackground",
    "titleBar.activeForeground",
    "titleBar.border",
    "titleBar.inactiveBackground",
    "titleBar.inactiveForeground",
];

/// Keys that must stay fully opaque: the window manager composites the title
/// bar, and a translucent status bar reads as a rendering glitch.
const OPAQUE_KEYS: &[&str] = &[
    "statusBar.background",
    "titleBar.activeBackground",
    "titleBar.inactiveBackground",
];

pub fn is_managed_key(key: &str) -> bool {
    MANAGED_COLOR_KEYS.binary_search(&key).is_ok()
}

pub fn key_supports_alpha(key: &str) -> bool {
    !OPAQUE_KEYS.contains(&key)
}

/// Result of merging resolved colors into an existing customizations object.
#[derive(Debug)]
pub struct ApplyOutcome {
    pub customizations: Map<String, Value>,
    pub set_count: usize,
    pub removed_count: usize,
    /// False when the merge is a no-op, so callers can skip the disk write.
    pub changed: bool,
}

/// Merge resolved colors into the current `workbench.colorCustomizations`
/// object.
///
/// Managed keys are wiped first and re-set from `colors`; entries resolved to
/// `None` stay deleted. Keys this tool does not manage pass through
/// untouched, whatever their value.
pub fn apply_colors(current: &Map<String, Value>, colors: &ResolvedColors) -> ApplyOutcome {
    let mut customizations = Map::new();
    let mut removed_count: usize = 0;

    for (key, value) in current {
        if is_managed_key(key) {
            removed_count += 1;
        } else {
            customizations.insert(key.clone(), value.clone());
        }
    }

    let mut set_count = 0;
    for (key, value) in colors {
        if let Some(hex) = value {
            if !is_managed_key(key) {
                tracing::debug!(%key, "profile maps a key outside the managed set");
            }
            customizations.insert(key.clone(), Value::String(hex.clone()));
            set_count += 1;
        }
    }

    // Re-set keys are not removals.
    removed_count = removed_count.saturating_sub(
        customizations
            .keys()
            .filter(|k| is_managed_key(k) && current.contains_key(k.as_str()))
            .count(),
    );

    let changed = &customizations != current;
    ApplyOutcome {
        customizations,
        set_count,
        removed_count,
        changed,
    }
}

/// Strip every managed key, leaving foreign customizations alone.
pub fn remove_all_managed_colors(current: &Map<String, Value>) -> (Map<String, Value>, usize) {
    let mut kept = Map::new();
    let mut removed = 0;
    for (key, value) in current {
        if is_managed_key(key) {
            removed += 1;
        } else {
            kept.insert(key.clone(), value.clone());
        }
    }
    (kept, removed)
}
