use std::path::{Path, PathBuf};

use crate::git;
use crate::profile::ProfileCaches;
use crate::rules::MatchContext;
use crate::themed::ThemeKind;

/// Everything a colorize pass knows about the open workspace: its git
/// identity, the active theme, and the memoization caches that live exactly
/// as long as the session.
#[derive(Debug)]
pub struct WorkspaceSession {
    pub folder: PathBuf,
    pub remote_url: Option<String>,
    pub branch: Option<String>,
    pub theme: ThemeKind,
    pub caches: ProfileCaches,
}

impl WorkspaceSession {
    /// Probe the workspace folder for its git identity. A folder without a
    /// repository (or without remotes) still yields a session; local-path
    /// rules can match it.
    pub fn open(folder: &Path, theme: ThemeKind) -> Self {
        if !git::is_repository(folder) {
            tracing::debug!(folder = %folder.display(), "not a git repository");
        }
        let remote_url = git::remote_url(folder);
        let branch = git::current_branch(folder);
        tracing::debug!(
            folder = %folder.display(),
            remote = remote_url.as_deref().unwrap_or("-"),
            branch = branch.as_deref().unwrap_or("-"),
            theme = theme.as_str(),
            "workspace session opened"
        );
        Self {
            folder: folder.to_owned(),
            remote_url,
            branch,
            theme,
            caches: ProfileCaches::default(),
        }
    }

    pub fn match_context(&self) -> MatchContext<'_> {
        MatchContext {
            repo_url: self.remote_url.as_deref(),
            workspace_folder: Some(&self.folder),
            branch: self.branch.as_deref(),
        }
    }

    /// Re-read the current branch; returns true when it changed since the
    /// last probe (including appearing or disappearing).
    pub fn refresh_branch(&mut self) -> bool {
        let fresh = git::current_branch(&self.folder);
        if fresh != self.branch {
            tracing::info!(
                from = self.branch.as_deref().unwrap_or("-"),
                to = fresh.as_deref().unwrap_or("-"),
                "branch changed"
            );
            self.branch = fresh;
            true
        } else {
            false
        }
    }

    /// Drop memoized palettes and simple profiles. Call after any config
    /// edit that could contribute to resolution.
    pub fn clear_caches(&mut self) {
        self.caches.clear();
    }
}
