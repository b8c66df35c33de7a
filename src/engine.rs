//! The colorize pipeline: parse rules once, match the workspace, resolve
//! colors, merge them into `.vscode/settings.json`.

use std::collections::BTreeMap;
use std::time::Duration;

use indexmap::IndexMap;

use crate::config::types::TintConfig;
use crate::profile::{self, ResolvedColors, SimpleScope};
use crate::rules::{
    self, BranchRule, ColorSpec, ParsedBranchRules, ParsedRepoRules, RepoRule,
    parse_branch_rules, parse_repo_rules,
};
use crate::session::WorkspaceSession;
use crate::settings;
use crate::vscode;

/// What a colorize pass did to the settings file.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Applied {
        set_count: usize,
        removed_count: usize,
        /// False when the file already held exactly these colors.
        wrote: bool,
    },
    Cleared {
        removed_count: usize,
        wrote: bool,
    },
    /// No rule matched and clearing is disabled; the file was not touched.
    NoMatch,
}

/// Optional index overrides for previewing a specific rule combination.
#[derive(Debug, Clone, Copy, Default)]
pub struct Preview {
    pub rule: Option<usize>,
    pub branch_rule: Option<usize>,
}

/// Rules parsed once per config; reused across passes in a watch loop.
pub struct Engine<'c> {
    config: &'c TintConfig,
    repo_rules: Vec<RepoRule>,
    branch_tables: IndexMap<String, Vec<BranchRule>>,
}

impl<'c> Engine<'c> {
    pub fn new(config: &'c TintConfig) -> Self {
        let repo_rules = parse_repo_rules(&config.repo_rules, false, &config.profiles).rules;
        let branch_tables = config
            .branch_tables
            .iter()
            .map(|(name, table)| {
                let parsed = parse_branch_rules(table, false, &config.profiles);
                (name.clone(), parsed.rules)
            })
            .collect();
        Self {
            config,
            repo_rules,
            branch_tables,
        }
    }

    /// One full pass: match, resolve, apply.
    ///
    /// Idempotent: running twice against an unchanged workspace writes the
    /// file at most once.
    pub fn colorize(&self, session: &mut WorkspaceSession) -> anyhow::Result<Outcome> {
        self.colorize_with(session, Preview::default())
    }

    /// Like [`Self::colorize`], but preview overrides can pin the repo rule
    /// and branch rule by index, bypassing matching. Resolution and
    /// application are exactly the normal path, so a preview shows what a
    /// real pass would write.
    pub fn colorize_with(
        &self,
        session: &mut WorkspaceSession,
        preview: Preview,
    ) -> anyhow::Result<Outcome> {
        let matched = match preview.rule {
            Some(index) => Some((
                index,
                self.repo_rules
                    .get(index)
                    .ok_or_else(|| anyhow::anyhow!("no repo rule at index {index}"))?,
            )),
            None => rules::find_matching_repo_rule(&self.repo_rules, &session.match_context()),
        };
        let Some((index, rule)) = matched else {
            tracing::debug!("no repo rule matched");
            if self.config.toggles.remove_managed_colors {
                return self.clear(session);
            }
            return Ok(Outcome::NoMatch);
        };
        tracing::info!(index, "applying repo rule");

        let Some(mut colors) = self.resolve_repo_rule(rule, session) else {
            // The rule says "none": explicitly uncolored.
            return self.clear(session);
        };

        let table_name = rule.branch_table.clone();
        let branch_rule = match (preview.branch_rule, &table_name) {
            (Some(branch_index), Some(table)) => {
                let rules = self
                    .branch_tables
                    .get(table)
                    .ok_or_else(|| anyhow::anyhow!("rule references missing branch table \"{table}\""))?;
                let rule = rules.get(branch_index).ok_or_else(|| {
                    anyhow::anyhow!("no branch rule at index {branch_index} in \"{table}\"")
                })?;
                Some(rule)
            }
            (Some(_), None) => {
                anyhow::bail!("matched rule has no branch table to preview against")
            }
            (None, Some(table)) => rules::find_matching_branch_rule(
                &self.branch_tables,
                table,
                session.branch.as_deref(),
            )
            .map(|m| {
                tracing::info!(table = m.table, index = m.index, "applying branch rule");
                m.rule
            }),
            (None, None) => None,
        };

        if let Some(branch_rule) = branch_rule
            && let Some(branch_colors) = self.resolve_branch_rule(branch_rule, session)
        {
            profile::overlay_colors(&mut colors, branch_colors);
        }

        let path = vscode::settings_path(&session.folder);
        let doc = vscode::read_settings(&path)?;
        let current = vscode::color_customizations(&doc);
        let outcome = settings::apply_colors(&current, &colors);
        if outcome.changed {
            vscode::write_settings(&path, doc, outcome.customizations)?;
        }
        Ok(Outcome::Applied {
            set_count: outcome.set_count,
            removed_count: outcome.removed_count,
            wrote: outcome.changed,
        })
    }

    /// Remove every managed color, leaving foreign customizations alone.
    pub fn clear(&self, session: &WorkspaceSession) -> anyhow::Result<Outcome> {
        let path = vscode::settings_path(&session.folder);
        let doc = vscode::read_settings(&path)?;
        let current = vscode::color_customizations(&doc);
        let (kept, removed_count) = settings::remove_all_managed_colors(&current);
        let wrote = removed_count > 0;
        if wrote {
            vscode::write_settings(&path, doc, kept)?;
        }
        Ok(Outcome::Cleared {
            removed_count,
            wrote,
        })
    }

    /// Apply once, then re-apply on every branch change.
    ///
    /// Returns after the initial pass when no branch table is in scope for
    /// the matched rule; there is nothing a branch switch could change then.
    pub fn watch(
        &self,
        session: &mut WorkspaceSession,
        interval: Duration,
    ) -> anyhow::Result<()> {
        self.colorize(session)?;
        if !self.branch_scope_active(session) {
            tracing::info!("no branch rules in scope, nothing to watch");
            return Ok(());
        }
        tracing::info!(interval_ms = interval.as_millis() as u64, "watching for branch changes");
        loop {
            std::thread::sleep(interval);
            if session.refresh_branch() {
                self.colorize(session)?;
            }
        }
    }

    fn branch_scope_active(&self, session: &WorkspaceSession) -> bool {
        rules::find_matching_repo_rule(&self.repo_rules, &session.match_context()).is_some_and(
            |(_, rule)| {
                rule.branch_table.as_ref().is_some_and(|table| {
                    self.branch_tables
                        .get(table)
                        .is_some_and(|rules| !rules.is_empty())
                })
            },
        )
    }

    /// Repo-level resolution: profile if referenced, otherwise simple mode
    /// from the rule's color. `None` means the rule explicitly uncolors.
    fn resolve_repo_rule(
        &self,
        rule: &RepoRule,
        session: &mut WorkspaceSession,
    ) -> Option<ResolvedColors> {
        let seed = rule.color.resolve(session.theme);

        if let Some(name) = rule.profile_ref() {
            let Some(config) = self.config.profiles.get(name) else {
                tracing::warn!(profile = name, "rule references unknown profile");
                return None;
            };
            return Some(profile::resolve_profile(
                config,
                seed,
                session.theme,
                &mut session.caches,
            ));
        }

        match &rule.color {
            ColorSpec::None => None,
            _ => {
                let color = seed?;
                Some(profile::resolve_simple(
                    color,
                    SimpleScope::Repo,
                    session.theme,
                    &self.config.toggles,
                    &mut session.caches,
                ))
            }
        }
    }

    fn resolve_branch_rule(
        &self,
        rule: &BranchRule,
        session: &mut WorkspaceSession,
    ) -> Option<ResolvedColors> {
        let seed = rule.color.resolve(session.theme);

        if let Some(name) = rule.profile_ref() {
            let Some(config) = self.config.profiles.get(name) else {
                tracing::warn!(profile = name, "branch rule references unknown profile");
                return None;
            };
            return Some(profile::resolve_profile(
                config,
                seed,
                session.theme,
                &mut session.caches,
            ));
        }

        match &rule.color {
            ColorSpec::None => None,
            _ => {
                let color = seed?;
                Some(profile::resolve_simple(
                    color,
                    SimpleScope::Branch,
                    session.theme,
                    &self.config.toggles,
                    &mut session.caches,
                ))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Validation report
// ---------------------------------------------------------------------------

/// Per-index errors for every rule set in the config, for the `rules`
/// subcommand.
#[derive(Debug, Default)]
pub struct RulesReport {
    pub repo: ParsedRepoRules,
    pub branch: BTreeMap<String, ParsedBranchRules>,
}

impl RulesReport {
    pub fn is_clean(&self) -> bool {
        self.repo.errors.is_empty() && self.branch.values().all(|p| p.errors.is_empty())
    }
}

pub fn validate_rules(config: &TintConfig) -> RulesReport {
    let mut report = RulesReport {
        repo: parse_repo_rules(&config.repo_rules, true, &config.profiles),
        ..RulesReport::default()
    };
    for (name, table) in &config.branch_tables {
        report
            .branch
            .insert(name.clone(), parse_branch_rules(table, true, &config.profiles));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{
        BranchRuleConfig, BranchTableConfig, ColorValueConfig, RepoRuleConfig, StructuredRepoRule,
    };
    use crate::profile::ProfileCaches;
    use crate::themed::ThemeKind;

    fn session_for(folder: &std::path::Path, url: Option<&str>, branch: Option<&str>) -> WorkspaceSession {
        WorkspaceSession {
            folder: folder.to_owned(),
            remote_url: url.map(str::to_owned),
            branch: branch.map(str::to_owned),
            theme: ThemeKind::Dark,
            caches: ProfileCaches::default(),
        }
    }

    fn config_with_rule(qualifier: &str, color: &str) -> TintConfig {
        TintConfig {
            repo_rules: vec![RepoRuleConfig::Structured(StructuredRepoRule {
                qualifier: Some(qualifier.to_owned()),
                color: Some(ColorValueConfig::Plain(color.to_owned())),
                ..StructuredRepoRule::default()
            })],
            ..TintConfig::default()
        }
    }

    #[test]
    fn colorize_writes_title_bar_colors() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_with_rule("github.com/org/repo", "#3b82f6");
        let engine = Engine::new(&config);
        let mut session =
            session_for(tmp.path(), Some("https://github.com/org/repo.git"), None);

        let outcome = engine.colorize(&mut session).unwrap();
        assert!(matches!(outcome, Outcome::Applied { wrote: true, .. }));

        let doc = vscode::read_settings(&vscode::settings_path(tmp.path())).unwrap();
        let colors = vscode::color_customizations(&doc);
        assert_eq!(
            colors["titleBar.activeBackground"],
            serde_json::json!("#3b82f6")
        );
    }

    #[test]
    fn second_pass_does_not_rewrite() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_with_rule("github.com/org/repo", "#3b82f6");
        let engine = Engine::new(&config);
        let mut session =
            session_for(tmp.path(), Some("https://github.com/org/repo.git"), None);

        engine.colorize(&mut session).unwrap();
        let outcome = engine.colorize(&mut session).unwrap();
        assert!(matches!(outcome, Outcome::Applied { wrote: false, .. }));
    }

    #[test]
    fn none_color_clears_managed_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let colored = config_with_rule("github.com/org/repo", "#3b82f6");
        let mut session =
            session_for(tmp.path(), Some("https://github.com/org/repo.git"), None);
        Engine::new(&colored).colorize(&mut session).unwrap();

        let cleared = config_with_rule("github.com/org/repo", "none");
        let outcome = Engine::new(&cleared).colorize(&mut session).unwrap();
        assert!(matches!(
            outcome,
            Outcome::Cleared { wrote: true, removed_count } if removed_count > 0
        ));
    }

    #[test]
    fn no_match_clears_or_leaves_depending_on_toggle() {
        let tmp = tempfile::tempdir().unwrap();
        let colored = config_with_rule("github.com/org/repo", "#3b82f6");
        let mut session =
            session_for(tmp.path(), Some("https://github.com/org/repo.git"), None);
        Engine::new(&colored).colorize(&mut session).unwrap();

        // Different remote: nothing matches.
        let mut other = session_for(tmp.path(), Some("https://github.com/else/where.git"), None);

        let mut keep = config_with_rule("github.com/org/repo", "#3b82f6");
        keep.toggles.remove_managed_colors = false;
        let outcome = Engine::new(&keep).colorize(&mut other).unwrap();
        assert_eq!(outcome, Outcome::NoMatch);

        let clear = config_with_rule("github.com/org/repo", "#3b82f6");
        let outcome = Engine::new(&clear).colorize(&mut other).unwrap();
        assert!(matches!(outcome, Outcome::Cleared { wrote: true, .. }));
    }

    #[test]
    fn branch_rule_overrides_title_bar_only() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config_with_rule("github.com/org/repo", "#3b82f6");
        config.branch_tables.insert(
            "Default Rules".to_owned(),
            BranchTableConfig {
                rules: vec![BranchRuleConfig {
                    pattern: "^release/".to_owned(),
                    color: Some(ColorValueConfig::Plain("#dc2626".to_owned())),
                    ..BranchRuleConfig::default()
                }],
            },
        );
        let engine = Engine::new(&config);
        let mut session = session_for(
            tmp.path(),
            Some("https://github.com/org/repo.git"),
            Some("release/2.0"),
        );

        engine.colorize(&mut session).unwrap();
        let doc = vscode::read_settings(&vscode::settings_path(tmp.path())).unwrap();
        let colors = vscode::color_customizations(&doc);
        assert_eq!(
            colors["titleBar.activeBackground"],
            serde_json::json!("#dc2626")
        );
        // Repo color still owns the activity bar.
        assert!(colors.contains_key("activityBar.background"));
        assert_ne!(
            colors["activityBar.background"],
            serde_json::json!("#dc2626")
        );
    }

    #[test]
    fn preview_pins_rules_by_index() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config_with_rule("github.com/org/repo", "#3b82f6");
        config.repo_rules.push(RepoRuleConfig::Structured(StructuredRepoRule {
            qualifier: Some("github.com/else/where".to_owned()),
            color: Some(ColorValueConfig::Plain("#dc2626".to_owned())),
            ..StructuredRepoRule::default()
        }));
        let engine = Engine::new(&config);
        let mut session =
            session_for(tmp.path(), Some("https://github.com/org/repo.git"), None);

        // Index 1 would never match this workspace; preview forces it.
        let preview = Preview {
            rule: Some(1),
            branch_rule: None,
        };
        engine.colorize_with(&mut session, preview).unwrap();

        let doc = vscode::read_settings(&vscode::settings_path(tmp.path())).unwrap();
        let colors = vscode::color_customizations(&doc);
        assert_eq!(
            colors["titleBar.activeBackground"],
            serde_json::json!("#dc2626")
        );

        let out_of_range = Preview {
            rule: Some(9),
            branch_rule: None,
        };
        assert!(engine.colorize_with(&mut session, out_of_range).is_err());
    }

    #[test]
    fn validate_reports_errors_per_table() {
        let mut config = config_with_rule("", "#3b82f6");
        config.branch_tables.insert(
            "Default Rules".to_owned(),
            BranchTableConfig {
                rules: vec![BranchRuleConfig {
                    pattern: "(".to_owned(),
                    color: Some(ColorValueConfig::Plain("#dc2626".to_owned())),
                    ..BranchRuleConfig::default()
                }],
            },
        );
        let report = validate_rules(&config);
        assert!(!report.is_clean());
        assert_eq!(report.repo.errors.len(), 1);
        assert_eq!(report.branch["Default Rules"].errors.len(), 1);
    }
}
