use std::path::Path;

use globset::GlobBuilder;
use indexmap::IndexMap;

use crate::rules::parse::{BranchRule, RepoRule, RuleQualifier};

/// Workspace identity a colorize pass matches rules against.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchContext<'a> {
    pub repo_url: Option<&'a str>,
    pub workspace_folder: Option<&'a Path>,
    pub branch: Option<&'a str>,
}

/// Select the highest-priority matching repo rule.
///
/// Rules are scanned in config order and the first match wins — array index
/// is the only precedence. Disabled and invalid rules are skipped. Remote
/// qualifiers match by substring containment in the remote URL (so a short
/// qualifier like `org/repo` matches any scheme/host variant); `!`-prefixed
/// qualifiers match the workspace folder path as a case-insensitive glob.
pub fn find_matching_repo_rule<'r>(
    rules: &'r [RepoRule],
    ctx: &MatchContext<'_>,
) -> Option<(usize, &'r RepoRule)> {
    rules.iter().enumerate().find(|(index, rule)| {
        if !rule.enabled || !rule.valid {
            return false;
        }
        let matched = match &rule.qualifier {
            RuleQualifier::Remote(substr) => {
                !substr.is_empty() && ctx.repo_url.is_some_and(|url| url.contains(substr))
            }
            RuleQualifier::LocalPath(pattern) => ctx
                .workspace_folder
                .is_some_and(|folder| folder_matches(pattern, folder)),
        };
        if matched {
            tracing::debug!(index, "repo rule matched");
        }
        matched
    })
}

fn folder_matches(pattern: &str, folder: &Path) -> bool {
    let expanded = expand_path_pattern(pattern);
    let glob = match GlobBuilder::new(&expanded)
        .case_insensitive(true)
        .literal_separator(false)
        .build()
    {
        Ok(glob) => glob.compile_matcher(),
        Err(e) => {
            tracing::debug!(pattern = %expanded, error = %e, "bad folder glob");
            return false;
        }
    };
    glob.is_match(normalize_path(folder))
}

/// Normalize a folder path for matching: forward slashes only.
fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Expand `~`, `$VAR` and `%VAR%` in a folder pattern. Unknown variables
/// expand to the empty string.
pub(crate) fn expand_path_pattern(pattern: &str) -> String {
    let mut text = pattern.to_owned();

    if let Some(rest) = text.strip_prefix("~")
        && let Ok(home) = std::env::var("HOME")
    {
        text = format!("{home}{rest}");
    }

    // %VAR% (Windows style) first, so leftover `%` cannot pair up with the
    // `$VAR` pass below.
    while let Some(start) = text.find('%') {
        let Some(len) = text[start + 1..].find('%') else {
            break;
        };
        let name = text[start + 1..start + 1 + len].to_owned();
        let value = std::env::var(&name).unwrap_or_default();
        text.replace_range(start..start + len + 2, &value);
    }

    // $VAR (POSIX style).
    while let Some(start) = text.find('$') {
        let tail = &text[start + 1..];
        let len = tail
            .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .unwrap_or(tail.len());
        if len == 0 {
            break;
        }
        let name = tail[..len].to_owned();
        let value = std::env::var(&name).unwrap_or_default();
        text.replace_range(start..start + 1 + len, &value);
    }

    text.replace('\\', "/")
}

// ---------------------------------------------------------------------------
// Branch rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct BranchMatch<'r> {
    pub index: usize,
    pub rule: &'r BranchRule,
    pub table: &'r str,
}

/// Select the first matching branch rule from the named table.
///
/// No match when the branch is unknown or empty, the table is missing, or no
/// enabled rule's pattern matches. Branch rules are only consulted after a
/// repo rule matched — a branch pattern alone never applies colors.
pub fn find_matching_branch_rule<'r>(
    tables: &'r IndexMap<String, Vec<BranchRule>>,
    table_name: &str,
    branch: Option<&str>,
) -> Option<BranchMatch<'r>> {
    let branch = branch.filter(|b| !b.is_empty())?;
    let (table, rules) = tables.get_key_value(table_name)?;

    rules
        .iter()
        .enumerate()
        .find(|(_, rule)| {
            rule.enabled
                && rule.valid
                && !rule.pattern.is_empty()
                && rule.regex.as_ref().is_some_and(|re| re.is_match(branch))
        })
        .map(|(index, rule)| BranchMatch { index, rule, table })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::parse::ColorSpec;
    use crate::themed::{ThemeKind, ThemedColor};

    fn remote_rule(qualifier: &str) -> RepoRule {
        RepoRule {
            qualifier: RuleQualifier::Remote(qualifier.to_owned()),
            color: ColorSpec::Themed(ThemedColor::create("#3b82f6", ThemeKind::Dark)),
            profile: None,
            enabled: true,
            branch_table: None,
            valid: true,
        }
    }

    fn local_rule(pattern: &str) -> RepoRule {
        RepoRule {
            qualifier: RuleQualifier::LocalPath(pattern.to_owned()),
            ..remote_rule("")
        }
    }

    #[test]
    fn first_match_wins_over_longer_qualifier() {
        let rules = vec![remote_rule("org"), remote_rule("org/repo")];
        let ctx = MatchContext {
            repo_url: Some("https://github.com/org/repo.git"),
            ..MatchContext::default()
        };
        let (index, _) = find_matching_repo_rule(&rules, &ctx).unwrap();
        assert_eq!(index, 0);
    }

    #[test]
    fn disabled_and_invalid_rules_are_skipped() {
        let mut disabled = remote_rule("org/repo");
        disabled.enabled = false;
        let mut invalid = remote_rule("org/repo");
        invalid.valid = false;
        let rules = vec![disabled, invalid, remote_rule("org/repo")];
        let ctx = MatchContext {
            repo_url: Some("https://github.com/org/repo.git"),
            ..MatchContext::default()
        };
        let (index, _) = find_matching_repo_rule(&rules, &ctx).unwrap();
        assert_eq!(index, 2);
    }

    #[test]
    fn substring_matches_any_remote_scheme() {
        let rules = vec![remote_rule("github.com/org/repo")];
        for url in [
            "https://github.com/org/repo.git",
            "ssh://git@github.com/org/repo.git",
        ] {
            let ctx = MatchContext {
                repo_url: Some(url),
                ..MatchContext::default()
            };
            assert!(find_matching_repo_rule(&rules, &ctx).is_some(), "{url}");
        }
    }

    #[test]
    fn local_rule_matches_folder_not_url() {
        let rules = vec![local_rule("/home/user/projects/local-repo")];
        let ctx = MatchContext {
            repo_url: None,
            workspace_folder: Some(Path::new("/home/user/projects/local-repo")),
            branch: None,
        };
        assert!(find_matching_repo_rule(&rules, &ctx).is_some());

        // Same rule with only a URL context does not match.
        let ctx = MatchContext {
            repo_url: Some("https://github.com/org/local-repo.git"),
            ..MatchContext::default()
        };
        assert!(find_matching_repo_rule(&rules, &ctx).is_none());
    }

    #[test]
    fn local_glob_is_case_insensitive() {
        let rules = vec![local_rule("/home/User/Projects/*")];
        let ctx = MatchContext {
            workspace_folder: Some(Path::new("/home/user/projects/anything")),
            ..MatchContext::default()
        };
        assert!(find_matching_repo_rule(&rules, &ctx).is_some());
    }

    #[test]
    fn expand_posix_variable() {
        // SAFETY: test-local env mutation; tests touching the environment
        // run in one process but never read this variable elsewhere.
        unsafe { std::env::set_var("REPO_TINT_TEST_DIR", "/srv/code") };
        assert_eq!(
            expand_path_pattern("$REPO_TINT_TEST_DIR/app"),
            "/srv/code/app"
        );
        assert_eq!(
            expand_path_pattern("%REPO_TINT_TEST_DIR%/app"),
            "/srv/code/app"
        );
    }

    #[test]
    fn branch_match_requires_branch_and_table() {
        use crate::rules::parse::BranchRule;
        use regex::Regex;

        let rules = vec![BranchRule {
            pattern: "^feature/".to_owned(),
            regex: Some(Regex::new("^feature/").unwrap()),
            color: ColorSpec::None,
            profile: None,
            enabled: true,
            valid: true,
        }];
        let mut tables = IndexMap::new();
        tables.insert("Default Rules".to_owned(), rules);

        assert!(find_matching_branch_rule(&tables, "Default Rules", None).is_none());
        assert!(find_matching_branch_rule(&tables, "Default Rules", Some("")).is_none());
        assert!(find_matching_branch_rule(&tables, "Missing", Some("feature/x")).is_none());
        let m = find_matching_branch_rule(&tables, "Default Rules", Some("feature/x")).unwrap();
        assert_eq!(m.index, 0);
        assert_eq!(m.table, "Default Rules");
    }
}
