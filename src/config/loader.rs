use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::types::{
    BranchRuleConfig, BranchTableConfig, ColorValueConfig, CONFIG_SCHEMA_VERSION,
    DEFAULT_BRANCH_TABLE, RepoRuleConfig, StructuredRepoRule, TintConfig,
};

/// Discover and load the config document.
///
/// Priority:
/// 1. `--config` flag (explicit path)
/// 2. `.repo-tint.toml` in the current Git repository root
/// 3. `$REPO_TINT_CONFIG` environment variable
/// 4. `$XDG_CONFIG_HOME/repo-tint/config.toml`
/// 5. `~/.config/repo-tint/config.toml`
///
/// If both a global and a repo-local config exist, the repo-local rule list
/// replaces the global one when non-empty; branch tables and profiles are
/// merged (local entries win); toggles are taken from the local config.
///
/// Legacy string-encoded rules are migrated to the structured shape here, so
/// the rest of the pipeline never sees the old format.
pub fn load_config(explicit_path: Option<&Path>) -> Result<(TintConfig, Option<PathBuf>)> {
    if let Some(path) = explicit_path {
        let mut config = read_config(path)?;
        migrate(&mut config);
        return Ok((config, Some(path.to_owned())));
    }

    let global_path = find_global_config();
    let local_path = find_repo_local_config();

    let (mut config, source) = match (global_path, local_path) {
        (Some(global), Some(local)) => {
            let merged = merge_configs(read_config(&global)?, read_config(&local)?);
            (merged, Some(local))
        }
        (Some(path), None) | (None, Some(path)) => (read_config(&path)?, Some(path)),
        (None, None) => (TintConfig::default(), None),
    };

    migrate(&mut config);
    Ok((config, source))
}

fn read_config(path: &Path) -> Result<TintConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("parsing TOML from {}", path.display()))
}

/// Serialize the config back to `path`, creating parent directories.
pub fn save_config(config: &TintConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let contents = toml::to_string_pretty(config).context("serializing config")?;
    std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// The path `init` and `import` write to when no config exists yet.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("REPO_TINT_CONFIG") {
        return PathBuf::from(path);
    }
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("repo-tint/config.toml");
    }
    dirs_fallback()
        .map(|home| home.join(".config/repo-tint/config.toml"))
        .unwrap_or_else(|| PathBuf::from("repo-tint.toml"))
}

/// Merge repo-local config on top of global config.
fn merge_configs(global: TintConfig, local: TintConfig) -> TintConfig {
    TintConfig {
        config_schema_version: local.config_schema_version,
        theme: local.theme.or(global.theme),
        repo_rules: if local.repo_rules.is_empty() {
            global.repo_rules
        } else {
            local.repo_rules
        },
        branch_tables: {
            let mut tables = global.branch_tables;
            tables.extend(local.branch_tables);
            tables
        },
        profiles: {
            let mut profiles = global.profiles;
            profiles.extend(local.profiles);
            profiles
        },
        toggles: local.toggles,
    }
}

fn find_repo_local_config() -> Option<PathBuf> {
    // Walk up from CWD looking for `.repo-tint.toml` next to a `.git` directory.
    let mut dir = std::env::current_dir().ok()?;
    loop {
        let candidate = dir.join(".repo-tint.toml");
        if candidate.is_file() {
            return Some(candidate);
        }
        if dir.join(".git").exists() {
            // Reached git root without finding config.
            return None;
        }
        if !dir.pop() {
            return None;
        }
    }
}

fn find_global_config() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("REPO_TINT_CONFIG") {
        let p = PathBuf::from(&path);
        if p.is_file() {
            return Some(p);
        }
    }

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        let p = PathBuf::from(xdg).join("repo-tint/config.toml");
        if p.is_file() {
            return Some(p);
        }
    }

    if let Some(home) = dirs_fallback() {
        let p = home.join(".config/repo-tint/config.toml");
        if p.is_file() {
            return Some(p);
        }
    }

    None
}

fn dirs_fallback() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

// ---------------------------------------------------------------------------
// Schema migration
// ---------------------------------------------------------------------------

/// Normalize legacy string rules into the structured shape.
///
/// The legacy grammar is `qualifier[|branch]:color[|branchColor][:profileName]`.
/// Inline `|branch` fragments become rules in the default branch table,
/// de-duplicated by pattern.
pub fn migrate(config: &mut TintConfig) {
    if config.config_schema_version >= CONFIG_SCHEMA_VERSION
        && !config
            .repo_rules
            .iter()
            .any(|r| matches!(r, RepoRuleConfig::Legacy(_)))
    {
        return;
    }

    let rules = std::mem::take(&mut config.repo_rules);
    for rule in rules {
        let migrated = match rule {
            RepoRuleConfig::Structured(s) => RepoRuleConfig::Structured(s),
            RepoRuleConfig::Legacy(text) => {
                let (structured, branch_rule) = parse_legacy_rule(&text);
                if let Some(branch_rule) = branch_rule {
                    let table = config
                        .branch_tables
                        .entry(DEFAULT_BRANCH_TABLE.to_owned())
                        .or_default();
                    upsert_branch_rule(table, branch_rule);
                }
                RepoRuleConfig::Structured(structured)
            }
        };
        config.repo_rules.push(migrated);
    }
    config.config_schema_version = CONFIG_SCHEMA_VERSION;
}

/// Parse one legacy rule string. Malformed strings come back as a structured
/// rule with the whole text as qualifier and no color, so the validator can
/// report them at their original index instead of silently dropping them.
fn parse_legacy_rule(text: &str) -> (StructuredRepoRule, Option<BranchRuleConfig>) {
    let mut parts = text.splitn(3, ':');
    let qualifier_part = parts.next().unwrap_or_default();
    let Some(color_part) = parts.next() else {
        return (
            StructuredRepoRule {
                qualifier: Some(text.to_owned()),
                ..StructuredRepoRule::default()
            },
            None,
        );
    };
    let profile = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned);

    let (qualifier, branch) = match qualifier_part.split_once('|') {
        Some((q, b)) => (q, Some(b)),
        None => (qualifier_part, None),
    };
    let (color, branch_color) = match color_part.split_once('|') {
        Some((c, bc)) => (c, Some(bc)),
        None => (color_part, None),
    };

    let branch_rule = branch.map(|pattern| BranchRuleConfig {
        pattern: pattern.to_owned(),
        color: Some(ColorValueConfig::Plain(
            branch_color.unwrap_or(color).to_owned(),
        )),
        profile: None,
        enabled: None,
    });

    let structured = StructuredRepoRule {
        qualifier: Some(qualifier.to_owned()),
        color: Some(ColorValueConfig::Plain(color.to_owned())),
        profile,
        enabled: None,
        branch_table: branch.map(|_| DEFAULT_BRANCH_TABLE.to_owned()),
    };
    (structured, branch_rule)
}

fn upsert_branch_rule(table: &mut BranchTableConfig, rule: BranchRuleConfig) {
    if let Some(existing) = table.rules.iter_mut().find(|r| r.pattern == rule.pattern) {
        *existing = rule;
    } else {
        table.rules.push(rule);
    }
}

// ---------------------------------------------------------------------------
// Export / import
// ---------------------------------------------------------------------------

/// JSON export envelope: the config document plus versioning metadata.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportDocument {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    #[serde(flatten)]
    pub config: TintConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    Replace,
    Merge,
}

/// Write the config as a JSON export document.
pub fn export_config(config: &TintConfig, path: &Path) -> Result<()> {
    let doc = ExportDocument {
        version: CONFIG_SCHEMA_VERSION,
        exported_at: Utc::now(),
        config: config.clone(),
    };
    let json = serde_json::to_string_pretty(&doc).context("serializing export document")?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Read an export document and combine it with the current config.
///
/// `Replace` takes the imported config wholesale. `Merge` de-duplicates repo
/// rules by qualifier and branch rules by pattern, last-imported-wins.
pub fn import_config(current: TintConfig, path: &Path, mode: ImportMode) -> Result<TintConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let doc: ExportDocument = serde_json::from_str(&contents)
        .with_context(|| format!("parsing export document {}", path.display()))?;
    let mut imported = doc.config;
    migrate(&mut imported);

    match mode {
        ImportMode::Replace => Ok(imported),
        ImportMode::Merge => Ok(merge_imported(current, imported)),
    }
}

fn merge_imported(mut current: TintConfig, imported: TintConfig) -> TintConfig {
    for rule in imported.repo_rules {
        let qualifier = rule_qualifier(&rule);
        let replaced = current.repo_rules.iter_mut().find(|existing| {
            qualifier.is_some() && rule_qualifier(existing) == qualifier
        });
        match replaced {
            Some(slot) => *slot = rule,
            None => current.repo_rules.push(rule),
        }
    }

    for (name, table) in imported.branch_tables {
        let target = current.branch_tables.entry(name).or_default();
        for rule in table.rules {
            upsert_branch_rule(target, rule);
        }
    }

    current.profiles.extend(imported.profiles);
    current.toggles = imported.toggles;
    current.theme = imported.theme.or(current.theme);
    current
}

fn rule_qualifier(rule: &RepoRuleConfig) -> Option<&str> {
    match rule {
        RepoRuleConfig::Legacy(_) => None,
        RepoRuleConfig::Structured(s) => s.qualifier.as_deref(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_rule_without_branch() {
        let (rule, branch) = parse_legacy_rule("github.com/org/repo:#ff0000");
        assert_eq!(rule.qualifier.as_deref(), Some("github.com/org/repo"));
        assert!(matches!(
            rule.color,
            Some(ColorValueConfig::Plain(ref c)) if c == "#ff0000"
        ));
        assert!(rule.branch_table.is_none());
        assert!(branch.is_none());
    }

    #[test]
    fn legacy_rule_with_branch_and_profile() {
        let (rule, branch) = parse_legacy_rule("org/repo|^main$:#ff0000|#00ff00:Oceanic");
        assert_eq!(rule.qualifier.as_deref(), Some("org/repo"));
        assert_eq!(rule.profile.as_deref(), Some("Oceanic"));
        assert_eq!(rule.branch_table.as_deref(), Some(DEFAULT_BRANCH_TABLE));
        let branch = branch.unwrap();
        assert_eq!(branch.pattern, "^main$");
        assert!(matches!(
            branch.color,
            Some(ColorValueConfig::Plain(ref c)) if c == "#00ff00"
        ));
    }

    #[test]
    fn legacy_rule_missing_color_is_kept_for_validation() {
        let (rule, branch) = parse_legacy_rule("just-a-qualifier");
        assert_eq!(rule.qualifier.as_deref(), Some("just-a-qualifier"));
        assert!(rule.color.is_none());
        assert!(branch.is_none());
    }

    #[test]
    fn migrate_converts_legacy_and_bumps_version() {
        let mut config = TintConfig {
            config_schema_version: 1,
            repo_rules: vec![RepoRuleConfig::Legacy(
                "org/repo|release/.*:#112233|#445566".to_owned(),
            )],
            ..TintConfig::default()
        };
        migrate(&mut config);
        assert_eq!(config.config_schema_version, CONFIG_SCHEMA_VERSION);
        assert!(matches!(
            config.repo_rules[0],
            RepoRuleConfig::Structured(_)
        ));
        let table = config.branch_tables.get(DEFAULT_BRANCH_TABLE).unwrap();
        assert_eq!(table.rules.len(), 1);
        assert_eq!(table.rules[0].pattern, "release/.*");
    }

    #[test]
    fn migrate_is_idempotent() {
        let mut config = TintConfig {
            config_schema_version: 1,
            repo_rules: vec![RepoRuleConfig::Legacy("org/repo:#112233".to_owned())],
            ..TintConfig::default()
        };
        migrate(&mut config);
        let once = toml::to_string(&config).unwrap();
        migrate(&mut config);
        assert_eq!(once, toml::to_string(&config).unwrap());
    }
}
