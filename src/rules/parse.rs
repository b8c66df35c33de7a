use std::collections::BTreeMap;

use indexmap::IndexMap;
use regex::Regex;

use crate::color::Color;
use crate::config::types::{
    BRANCH_TABLE_NONE, BranchTableConfig, COLOR_NONE, ColorValueConfig, DEFAULT_BRANCH_TABLE,
    ProfileConfig, RepoRuleConfig, StructuredRepoRule,
};
use crate::themed::{ThemeKind, ThemedColor};

/// A color field after parsing: the "color or profile-name or none" string
/// union resolved once, here, into a tag the rest of the pipeline matches on.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSpec {
    /// `"none"` — explicitly unset, do not color.
    None,
    /// A concrete color. Plain strings are promoted to a [`ThemedColor`]
    /// with the dark variant explicit, so every literal can be rendered for
    /// any theme.
    Themed(ThemedColor),
    /// Reference to a named profile. Only reachable when the string is not a
    /// CSS named color: named colors shadow same-named profiles.
    Profile(String),
}

impl ColorSpec {
    /// Resolve to a concrete color for the active theme.
    ///
    /// `None` and profile references yield no color here; profiles are
    /// expanded by the profile resolver.
    pub fn resolve(&self, theme: ThemeKind) -> Option<Color> {
        match self {
            ColorSpec::None | ColorSpec::Profile(_) => None,
            ColorSpec::Themed(tc) => tc.resolve(theme).and_then(Color::try_parse),
        }
    }
}

/// How a repo rule identifies its workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleQualifier {
    /// Substring matched against the remote fetch URL.
    Remote(String),
    /// Glob pattern (the config value minus its `!` prefix) matched against
    /// the local workspace folder path.
    LocalPath(String),
}

/// A typed, validated repo rule. Invalid config entries still produce a rule
/// (with `valid: false`) so indices stay aligned with the config document.
#[derive(Debug, Clone)]
pub struct RepoRule {
    pub qualifier: RuleQualifier,
    pub color: ColorSpec,
    pub profile: Option<String>,
    pub enabled: bool,
    /// `None` disables branch matching for this rule.
    pub branch_table: Option<String>,
    pub valid: bool,
}

impl RepoRule {
    /// The profile this rule ultimately references: the explicit `profile`
    /// field wins over a color field that names a profile.
    pub fn profile_ref(&self) -> Option<&str> {
        self.profile.as_deref().or(match &self.color {
            ColorSpec::Profile(name) => Some(name),
            _ => None,
        })
    }
}

/// A typed branch rule. The pattern is compiled once; an invalid regex keeps
/// the rule (with an error at its index) but it can never match.
#[derive(Debug, Clone)]
pub struct BranchRule {
    pub pattern: String,
    pub regex: Option<Regex>,
    pub color: ColorSpec,
    pub profile: Option<String>,
    pub enabled: bool,
    pub valid: bool,
}

impl BranchRule {
    pub fn profile_ref(&self) -> Option<&str> {
        self.profile.as_deref().or(match &self.color {
            ColorSpec::Profile(name) => Some(name),
            _ => None,
        })
    }
}

/// Output of a parse pass: every input index is represented in `rules`;
/// `errors` maps the indices of invalid entries to one message each.
#[derive(Debug, Default)]
pub struct ParsedRepoRules {
    pub rules: Vec<RepoRule>,
    pub errors: BTreeMap<usize, String>,
}

#[derive(Debug, Default)]
pub struct ParsedBranchRules {
    pub rules: Vec<BranchRule>,
    pub errors: BTreeMap<usize, String>,
}

// ---------------------------------------------------------------------------
// Repo rules
// ---------------------------------------------------------------------------

/// Convert raw config rules into typed rules.
///
/// Invalid entries are not dropped: they are kept (marked invalid, skipped by
/// the matcher) and recorded in the error map so the caller can surface one
/// message per bad rule while still operating on the rest of the set. With
/// `validate == false` the messages are skipped for non-interactive passes;
/// validity itself is always computed.
pub fn parse_repo_rules(
    raw: &[RepoRuleConfig],
    validate: bool,
    profiles: &IndexMap<String, ProfileConfig>,
) -> ParsedRepoRules {
    let mut out = ParsedRepoRules::default();

    for (index, entry) in raw.iter().enumerate() {
        let structured = match entry {
            RepoRuleConfig::Structured(s) => s.clone(),
            // Loading migrates legacy strings; reaching one here means the
            // caller skipped migration. Treat it as unparsed.
            RepoRuleConfig::Legacy(text) => StructuredRepoRule {
                qualifier: Some(text.clone()),
                ..StructuredRepoRule::default()
            },
        };

        let (rule, error) = parse_repo_rule(&structured, profiles);
        if let Some(message) = error {
            tracing::debug!(index, %message, "invalid repo rule");
            if validate {
                out.errors.insert(index, message);
            }
        }
        out.rules.push(rule);
    }

    out
}

fn parse_repo_rule(
    raw: &StructuredRepoRule,
    profiles: &IndexMap<String, ProfileConfig>,
) -> (RepoRule, Option<String>) {
    let mut error = None;

    let qualifier_text = raw.qualifier.clone().unwrap_or_default();
    if qualifier_text.is_empty() {
        error = Some("missing repository qualifier".to_owned());
    }
    let qualifier = match qualifier_text.strip_prefix('!') {
        Some(path) => RuleQualifier::LocalPath(path.to_owned()),
        None => RuleQualifier::Remote(qualifier_text),
    };

    let color = match parse_color_value(raw.color.as_ref(), profiles) {
        Ok(spec) => spec,
        Err(message) => {
            error.get_or_insert(message);
            ColorSpec::None
        }
    };

    if let Some(profile) = &raw.profile
        && !profiles.contains_key(profile)
    {
        error.get_or_insert(format!("unknown profile \"{profile}\""));
    }

    // Local-folder matches have no git branch concept.
    let branch_table = match (&qualifier, raw.branch_table.as_deref()) {
        (RuleQualifier::LocalPath(_), None | Some(BRANCH_TABLE_NONE)) => None,
        (RuleQualifier::LocalPath(_), Some(other)) => {
            error.get_or_insert(format!(
                "local-folder rule cannot use branch table \"{other}\""
            ));
            None
        }
        (RuleQualifier::Remote(_), Some(BRANCH_TABLE_NONE)) => None,
        (RuleQualifier::Remote(_), Some(name)) => Some(name.to_owned()),
        (RuleQualifier::Remote(_), None) => Some(DEFAULT_BRANCH_TABLE.to_owned()),
    };

    let rule = RepoRule {
        qualifier,
        color,
        profile: raw.profile.clone(),
        enabled: raw.is_enabled(),
        branch_table,
        valid: error.is_none(),
    };
    (rule, error)
}

// ---------------------------------------------------------------------------
// Branch rules
// ---------------------------------------------------------------------------

pub fn parse_branch_rules(
    raw: &BranchTableConfig,
    validate: bool,
    profiles: &IndexMap<String, ProfileConfig>,
) -> ParsedBranchRules {
    let mut out = ParsedBranchRules::default();

    for (index, entry) in raw.rules.iter().enumerate() {
        let mut error = None;

        if entry.pattern.is_empty() {
            error = Some("empty branch pattern".to_owned());
        }
        let regex = match Regex::new(&entry.pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                error.get_or_insert(format!("invalid branch pattern: {e}"));
                None
            }
        };

        let color = match parse_color_value(entry.color.as_ref(), profiles) {
            Ok(spec) => spec,
            Err(message) => {
                error.get_or_insert(message);
                ColorSpec::None
            }
        };

        if let Some(profile) = &entry.profile
            && !profiles.contains_key(profile)
        {
            error.get_or_insert(format!("unknown profile \"{profile}\""));
        }

        if let Some(message) = error.clone() {
            tracing::debug!(index, %message, "invalid branch rule");
            if validate {
                out.errors.insert(index, message);
            }
        }
        out.rules.push(BranchRule {
            pattern: entry.pattern.clone(),
            regex,
            color,
            profile: entry.profile.clone(),
            enabled: entry.is_enabled(),
            valid: error.is_none(),
        });
    }

    out
}

// ---------------------------------------------------------------------------
// Color fields
// ---------------------------------------------------------------------------

/// Resolve a raw color field into a tagged [`ColorSpec`].
///
/// A plain string is, in precedence order: the `"none"` sentinel, a
/// parseable color (hex or CSS named — named colors deliberately shadow
/// same-named profiles), or a profile reference. Anything else is an error.
fn parse_color_value(
    raw: Option<&ColorValueConfig>,
    profiles: &IndexMap<String, ProfileConfig>,
) -> Result<ColorSpec, String> {
    match raw {
        None => Err("missing color".to_owned()),
        Some(ColorValueConfig::Plain(s)) => {
            let s = s.trim();
            if s.is_empty() {
                Err("missing color".to_owned())
            } else if s == COLOR_NONE {
                Ok(ColorSpec::None)
            } else if Color::try_parse(s).is_some() {
                Ok(ColorSpec::Themed(ThemedColor::create(s, ThemeKind::Dark)))
            } else if profiles.contains_key(s) {
                Ok(ColorSpec::Profile(s.to_owned()))
            } else {
                Err(format!("\"{s}\" is neither a color nor a known profile"))
            }
        }
        Some(ColorValueConfig::Themed(tc)) => {
            if tc.has_any_color() {
                Ok(ColorSpec::Themed(tc.clone()))
            } else {
                Err("themed color has no parseable variant".to_owned())
            }
        }
    }
}
