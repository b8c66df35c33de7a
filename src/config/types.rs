use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::themed::{ThemeKind, ThemedColor};

/// Current config document schema. Version 1 stored repo rules as
/// colon-delimited strings; loading migrates them to the structured shape.
pub const CONFIG_SCHEMA_VERSION: u32 = 2;

/// Branch table used when a structured rule names none.
pub const DEFAULT_BRANCH_TABLE: &str = "Default Rules";

/// Sentinel table name disabling branch matching for a rule.
pub const BRANCH_TABLE_NONE: &str = "__none__";

/// Color value meaning "explicitly unset, do not color".
pub const COLOR_NONE: &str = "none";

/// Slot name triggering algorithmic palette generation inside a profile.
pub const PALETTE_SLOT: &str = "__palette__";

// ---------------------------------------------------------------------------
// Top-level config document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TintConfig {
    pub config_schema_version: u32,
    /// Active theme kind; `None` means detect from the terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeKind>,
    pub repo_rules: Vec<RepoRuleConfig>,
    pub branch_tables: IndexMap<String, BranchTableConfig>,
    pub profiles: IndexMap<String, ProfileConfig>,
    pub toggles: Toggles,
}

impl Default for TintConfig {
    fn default() -> Self {
        Self {
            config_schema_version: CONFIG_SCHEMA_VERSION,
            theme: None,
            repo_rules: Vec::new(),
            branch_tables: IndexMap::new(),
            profiles: IndexMap::new(),
            toggles: Toggles::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// A repo rule as written in the config file.
///
/// The legacy form is a single string,
/// `qualifier[|branch]:color[|branchColor][:profileName]`, kept parseable for
/// pre-v2 configs and normalized to the structured shape on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepoRuleConfig {
    Legacy(String),
    Structured(StructuredRepoRule),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredRepoRule {
    /// Substring to match against the remote fetch URL, or (with a leading
    /// `!`) a glob pattern for the local workspace folder path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorValueConfig>,
    /// Explicit profile reference; a color field naming a profile works too,
    /// unless a CSS named color shadows the profile name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(skip_serializing_if = "is_true")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_table: Option<String>,
}

impl StructuredRepoRule {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

fn is_true(v: &Option<bool>) -> bool {
    v.unwrap_or(true)
}

/// A color field: either a plain string (hex, CSS name, profile name or
/// `"none"`) or a per-theme table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorValueConfig {
    Plain(String),
    Themed(ThemedColor),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchTableConfig {
    pub rules: Vec<BranchRuleConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchRuleConfig {
    /// Regular expression matched against the current branch name.
    pub pattern: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorValueConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(skip_serializing_if = "is_true")]
    pub enabled: Option<bool>,
}

impl BranchRuleConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// A named palette (color slots) plus a mapping from UI color keys to slots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub slots: IndexMap<String, SlotConfig>,
    /// `workbench.colorCustomizations` key → slot reference.
    pub mappings: IndexMap<String, SlotRefConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorValueConfig>,
    /// Fraction toward white, applied before `darken` and `opacity`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lighten: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub darken: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f32>,
    /// Palette algorithm name; only meaningful on the `__palette__` slot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
}

/// Reference from a UI key to a slot, optionally overriding opacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotRefConfig {
    Name(String),
    Full {
        slot: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        opacity: Option<f32>,
    },
}

impl SlotRefConfig {
    pub fn slot(&self) -> &str {
        match self {
            SlotRefConfig::Name(s) => s,
            SlotRefConfig::Full { slot, .. } => slot,
        }
    }

    pub fn opacity(&self) -> Option<f32> {
        match self {
            SlotRefConfig::Name(_) => None,
            SlotRefConfig::Full { opacity, .. } => *opacity,
        }
    }
}

// ---------------------------------------------------------------------------
// Toggles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Toggles {
    pub color_inactive_titlebar: bool,
    pub color_editor_tabs: bool,
    pub color_status_bar: bool,
    /// 0–10; rescaled by ÷10 into a lightness shift for the activity bar.
    pub activity_bar_color_knob: u8,
    /// Widen branch simple-mode coloring from the title bar to tabs and the
    /// status bar.
    pub apply_branch_color_to_tabs_and_status_bar: bool,
    /// Clear managed colors when no rule matches (instead of leaving stale
    /// colors in place).
    pub remove_managed_colors: bool,
    pub show_status_icon_when_no_rule_matches: bool,
    pub ask_to_colorize_repo_when_opened: bool,
}

impl Default for Toggles {
    fn default() -> Self {
        Self {
            color_inactive_titlebar: true,
            color_editor_tabs: false,
            color_status_bar: false,
            activity_bar_color_knob: 3,
            apply_branch_color_to_tabs_and_status_bar: false,
            remove_managed_colors: true,
            show_status_icon_when_no_rule_matches: true,
            ask_to_colorize_repo_when_opened: false,
        }
    }
}
