use std::fs;
use std::path::Path;

use repo_tint::color::{Color, contrast_ratio};
use repo_tint::config::types::TintConfig;
use repo_tint::engine::{Engine, Outcome};
use repo_tint::profile::ProfileCaches;
use repo_tint::session::WorkspaceSession;
use repo_tint::themed::ThemeKind;
use repo_tint::vscode;

fn session(folder: &Path, url: &str, branch: Option<&str>, theme: ThemeKind) -> WorkspaceSession {
    WorkspaceSession {
        folder: folder.to_owned(),
        remote_url: Some(url.to_owned()),
        branch: branch.map(str::to_owned),
        theme,
        caches: ProfileCaches::default(),
    }
}

fn customizations(folder: &Path) -> serde_json::Map<String, serde_json::Value> {
    let doc = vscode::read_settings(&vscode::settings_path(folder)).unwrap();
    vscode::color_customizations(&doc)
}

#[test]
fn simple_rule_colors_title_and_activity_bar() {
    let tmp = tempfile::tempdir().unwrap();
    let config: TintConfig = toml::from_str(
        r##"
repo_rules = [
    { qualifier = "github.com/org/repo", color = "#3b82f6" },
]
"##,
    )
    .unwrap();

    let mut s = session(
        tmp.path(),
        "git@github.com:org/repo.git",
        None,
        ThemeKind::Dark,
    );
    let outcome = Engine::new(&config).colorize(&mut s).unwrap();
    assert!(matches!(outcome, Outcome::Applied { wrote: true, .. }));

    let colors = customizations(tmp.path());
    assert_eq!(colors["titleBar.activeBackground"], "#3b82f6");
    assert!(colors.contains_key("titleBar.activeForeground"));
    assert!(colors.contains_key("titleBar.inactiveBackground"));
    assert!(colors.contains_key("activityBar.background"));

    let bg = Color::try_parse(colors["titleBar.activeBackground"].as_str().unwrap()).unwrap();
    let fg = Color::try_parse(colors["titleBar.activeForeground"].as_str().unwrap()).unwrap();
    assert!(contrast_ratio(bg, fg) >= 3.0);
}

#[test]
fn pass_is_idempotent_on_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let config: TintConfig = toml::from_str(
        r##"
repo_rules = [
    { qualifier = "github.com/org/repo", color = "#3b82f6" },
]
"##,
    )
    .unwrap();
    let engine = Engine::new(&config);
    let mut s = session(
        tmp.path(),
        "https://github.com/org/repo.git",
        None,
        ThemeKind::Dark,
    );

    engine.colorize(&mut s).unwrap();
    let path = vscode::settings_path(tmp.path());
    let first = fs::read_to_string(&path).unwrap();
    let mtime = fs::metadata(&path).unwrap().modified().unwrap();

    let outcome = engine.colorize(&mut s).unwrap();
    assert!(matches!(outcome, Outcome::Applied { wrote: false, .. }));
    assert_eq!(first, fs::read_to_string(&path).unwrap());
    assert_eq!(mtime, fs::metadata(&path).unwrap().modified().unwrap());
}

#[test]
fn foreign_settings_and_colors_survive() {
    let tmp = tempfile::tempdir().unwrap();
    let vscode_dir = tmp.path().join(".vscode");
    fs::create_dir_all(&vscode_dir).unwrap();
    fs::write(
        vscode_dir.join("settings.json"),
        r##"{
  "editor.fontSize": 14,
  "workbench.colorCustomizations": {
    "editor.background": "#101010",
    "titleBar.activeBackground": "#stale0"
  }
}"##,
    )
    .unwrap();

    let config: TintConfig = toml::from_str(
        r##"
repo_rules = [
    { qualifier = "github.com/org/repo", color = "#3b82f6" },
]
"##,
    )
    .unwrap();
    let mut s = session(
        tmp.path(),
        "https://github.com/org/repo.git",
        None,
        ThemeKind::Dark,
    );
    Engine::new(&config).colorize(&mut s).unwrap();

    let doc = vscode::read_settings(&vscode::settings_path(tmp.path())).unwrap();
    assert_eq!(doc["editor.fontSize"], 14);
    let colors = vscode::color_customizations(&doc);
    assert_eq!(colors["editor.background"], "#101010");
    assert_eq!(colors["titleBar.activeBackground"], "#3b82f6");
}

#[test]
fn decolorize_removes_only_managed_keys() {
    let tmp = tempfile::tempdir().unwrap();
    let config: TintConfig = toml::from_str(
        r##"
repo_rules = [
    { qualifier = "github.com/org/repo", color = "#3b82f6" },
]
"##,
    )
    .unwrap();
    let engine = Engine::new(&config);
    let mut s = session(
        tmp.path(),
        "https://github.com/org/repo.git",
        None,
        ThemeKind::Dark,
    );
    engine.colorize(&mut s).unwrap();

    // A foreign customization added after colorizing.
    let path = vscode::settings_path(tmp.path());
    let doc = vscode::read_settings(&path).unwrap();
    let mut colors = vscode::color_customizations(&doc);
    colors.insert("editor.background".to_owned(), "#101010".into());
    vscode::write_settings(&path, doc, colors).unwrap();

    let outcome = engine.clear(&s).unwrap();
    assert!(matches!(outcome, Outcome::Cleared { wrote: true, .. }));
    let colors = customizations(tmp.path());
    assert_eq!(colors.len(), 1);
    assert_eq!(colors["editor.background"], "#101010");
}

#[test]
fn branch_rule_overrides_repo_rule_per_key() {
    let tmp = tempfile::tempdir().unwrap();
    let config: TintConfig = toml::from_str(
        r##"
repo_rules = [
    { qualifier = "github.com/org/repo", color = "#3b82f6" },
]

[branch_tables."Default Rules"]
rules = [
    { pattern = "^release/", color = "#dc2626" },
    { pattern = ".*", color = "#16a34a" },
]
"##,
    )
    .unwrap();
    let engine = Engine::new(&config);

    // First pattern wins over the catch-all.
    let mut s = session(
        tmp.path(),
        "https://github.com/org/repo.git",
        Some("release/2.0"),
        ThemeKind::Dark,
    );
    engine.colorize(&mut s).unwrap();
    let colors = customizations(tmp.path());
    assert_eq!(colors["titleBar.activeBackground"], "#dc2626");
    // Keys the branch scope does not cover keep the repo color.
    assert_ne!(colors["activityBar.background"], "#dc2626");

    // No branch: repo color owns the title bar again.
    let mut s = session(
        tmp.path(),
        "https://github.com/org/repo.git",
        None,
        ThemeKind::Dark,
    );
    engine.colorize(&mut s).unwrap();
    let colors = customizations(tmp.path());
    assert_eq!(colors["titleBar.activeBackground"], "#3b82f6");
}

#[test]
fn profile_with_palette_maps_slots_to_keys() {
    let tmp = tempfile::tempdir().unwrap();
    let config: TintConfig = toml::from_str(
        r##"
repo_rules = [
    { qualifier = "github.com/org/repo", color = "Oceanic" },
]

[profiles.Oceanic.slots.__palette__]
color = "#0e7490"
algorithm = "triadic"

[profiles.Oceanic.slots.accent]
color = "#f59e0b"
darken = 0.2

[profiles.Oceanic.mappings]
"titleBar.activeBackground" = "primaryActiveBg"
"titleBar.activeForeground" = "primaryActiveFg"
"statusBar.background" = "secondaryActiveBg"
"activityBar.background" = "accent"
"tab.activeBackground" = { slot = "tertiaryActiveBg", opacity = 0.9 }
"##,
    )
    .unwrap();
    let mut s = session(
        tmp.path(),
        "https://github.com/org/repo.git",
        None,
        ThemeKind::Dark,
    );
    Engine::new(&config).colorize(&mut s).unwrap();

    let colors = customizations(tmp.path());
    // Primary active background is the seed, untouched.
    assert_eq!(colors["titleBar.activeBackground"], "#0e7490");
    // Opacity reference renders 8-digit hex on an alpha-capable key.
    let tab = colors["tab.activeBackground"].as_str().unwrap();
    assert_eq!(tab.len(), 9, "{tab}");
    // The opaque status bar never carries alpha.
    let status = colors["statusBar.background"].as_str().unwrap();
    assert_eq!(status.len(), 7, "{status}");
    // Modifier slot resolved and mapped.
    assert!(colors.contains_key("activityBar.background"));
}

#[test]
fn dark_and_light_themes_render_distinct_colors() {
    let config: TintConfig = toml::from_str(
        r##"
repo_rules = [
    { qualifier = "github.com/org/repo", color = "#1e3a8a" },
]
"##,
    )
    .unwrap();
    let engine = Engine::new(&config);

    let dark_tmp = tempfile::tempdir().unwrap();
    let mut dark = session(
        dark_tmp.path(),
        "https://github.com/org/repo.git",
        None,
        ThemeKind::Dark,
    );
    engine.colorize(&mut dark).unwrap();

    let light_tmp = tempfile::tempdir().unwrap();
    let mut light = session(
        light_tmp.path(),
        "https://github.com/org/repo.git",
        None,
        ThemeKind::Light,
    );
    engine.colorize(&mut light).unwrap();

    let dark_colors = customizations(dark_tmp.path());
    let light_colors = customizations(light_tmp.path());
    assert_eq!(dark_colors["titleBar.activeBackground"], "#1e3a8a");
    assert_ne!(
        dark_colors["titleBar.activeBackground"],
        light_colors["titleBar.activeBackground"]
    );
}

#[test]
fn branch_rules_never_apply_without_a_repo_match() {
    let tmp = tempfile::tempdir().unwrap();
    let config: TintConfig = toml::from_str(
        r##"
repo_rules = [
    { qualifier = "github.com/org/repo", color = "#3b82f6" },
]

[branch_tables."Default Rules"]
rules = [
    { pattern = ".*", color = "#dc2626" },
]
"##,
    )
    .unwrap();

    // The catch-all branch pattern matches the current branch, but no repo
    // rule matches this remote; the branch table must stay inert.
    let mut s = session(
        tmp.path(),
        "https://github.com/else/where.git",
        Some("feature/x"),
        ThemeKind::Dark,
    );
    let outcome = Engine::new(&config).colorize(&mut s).unwrap();
    assert!(matches!(outcome, Outcome::Cleared { wrote: false, .. }));
    assert!(customizations(tmp.path()).is_empty());

    // Same with clearing disabled: no-match, file untouched.
    let mut keep = config.clone();
    keep.toggles.remove_managed_colors = false;
    let mut s = session(
        tmp.path(),
        "https://github.com/else/where.git",
        Some("feature/x"),
        ThemeKind::Dark,
    );
    let outcome = Engine::new(&keep).colorize(&mut s).unwrap();
    assert_eq!(outcome, Outcome::NoMatch);
    assert!(customizations(tmp.path()).is_empty());
}

#[test]
fn disabled_rule_falls_through_to_next() {
    let tmp = tempfile::tempdir().unwrap();
    let config: TintConfig = toml::from_str(
        r##"
repo_rules = [
    { qualifier = "github.com/org/repo", color = "#ff0000", enabled = false },
    { qualifier = "github.com/org", color = "#3b82f6" },
]
"##,
    )
    .unwrap();
    let mut s = session(
        tmp.path(),
        "https://github.com/org/repo.git",
        None,
        ThemeKind::Dark,
    );
    Engine::new(&config).colorize(&mut s).unwrap();
    let colors = customizations(tmp.path());
    assert_eq!(colors["titleBar.activeBackground"], "#3b82f6");
}

#[test]
fn invalid_rule_is_skipped_not_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let config: TintConfig = toml::from_str(
        r##"
repo_rules = [
    { qualifier = "github.com/org/repo", color = "not-a-color-or-profile" },
    { qualifier = "github.com/org/repo", color = "#3b82f6" },
]
"##,
    )
    .unwrap();
    let mut s = session(
        tmp.path(),
        "https://github.com/org/repo.git",
        None,
        ThemeKind::Dark,
    );
    let outcome = Engine::new(&config).colorize(&mut s).unwrap();
    assert!(matches!(outcome, Outcome::Applied { .. }));
    let colors = customizations(tmp.path());
    assert_eq!(colors["titleBar.activeBackground"], "#3b82f6");
}
