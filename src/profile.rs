use std::collections::HashMap;

use indexmap::IndexMap;

use crate::color::{Color, contrast_ratio};
use crate::config::types::{
    ColorValueConfig, PALETTE_SLOT, ProfileConfig, SlotConfig, SlotRefConfig, Toggles,
};
use crate::settings;
use crate::themed::{ThemeKind, ThemedColor};

/// Final output of profile resolution: UI color key → hex string, with
/// `None` meaning "explicitly remove this key".
pub type ResolvedColors = IndexMap<String, Option<String>>;

// ---------------------------------------------------------------------------
// Palette algorithms
// ---------------------------------------------------------------------------

/// Hue-rotation policy for algorithmic palette generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaletteAlgorithm {
    Balanced,
    Monochromatic,
    BoldContrast,
    Analogous,
    AnalogousMinorPlus,
    AnalogousMinorMinus,
    SplitComplementary,
    Triadic,
    Square,
}

impl PaletteAlgorithm {
    pub const ALL: [PaletteAlgorithm; 9] = [
        PaletteAlgorithm::Balanced,
        PaletteAlgorithm::Monochromatic,
        PaletteAlgorithm::BoldContrast,
        PaletteAlgorithm::Analogous,
        PaletteAlgorithm::AnalogousMinorPlus,
        PaletteAlgorithm::AnalogousMinorMinus,
        PaletteAlgorithm::SplitComplementary,
        PaletteAlgorithm::Triadic,
        PaletteAlgorithm::Square,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PaletteAlgorithm::Balanced => "balanced",
            PaletteAlgorithm::Monochromatic => "monochromatic",
            PaletteAlgorithm::BoldContrast => "bold-contrast",
            PaletteAlgorithm::Analogous => "analogous",
            PaletteAlgorithm::AnalogousMinorPlus => "analogous-minor-plus",
            PaletteAlgorithm::AnalogousMinorMinus => "analogous-minor-minus",
            PaletteAlgorithm::SplitComplementary => "split-complementary",
            PaletteAlgorithm::Triadic => "triadic",
            PaletteAlgorithm::Square => "square",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == s)
    }
}

/// Slot names synthesized by `__palette__`, in family-major order.
pub const PALETTE_SLOT_NAMES: [&str; 16] = [
    "primaryActiveBg",
    "primaryActiveFg",
    "primaryInactiveBg",
    "primaryInactiveFg",
    "secondaryActiveBg",
    "secondaryActiveFg",
    "secondaryInactiveBg",
    "secondaryInactiveFg",
    "tertiaryActiveBg",
    "tertiaryActiveFg",
    "tertiaryInactiveBg",
    "tertiaryInactiveFg",
    "quaternaryActiveBg",
    "quaternaryActiveFg",
    "quaternaryInactiveBg",
    "quaternaryInactiveFg",
];

/// Generate the 16 palette slots from a seed color.
///
/// Pure and deterministic: the same seed and algorithm always yield
/// byte-identical output. The primary active background is the seed itself,
/// untouched. Every background/foreground pair keeps a WCAG contrast of at
/// least 3:1 (see [`contrasting_text_color`]).
pub fn generate_palette(
    seed: Color,
    algorithm: PaletteAlgorithm,
) -> IndexMap<&'static str, Color> {
    let seed_hsl = seed.to_hsl();
    let mut palette = IndexMap::with_capacity(16);

    for family in 0..4 {
        let active_bg = if family == 0 {
            seed
        } else {
            Color::from_hsl(family_hsl(seed_hsl, family, algorithm), None)
        };
        let inactive_bg = dimmed(active_bg);
        let base = family * 4;
        palette.insert(PALETTE_SLOT_NAMES[base], active_bg);
        palette.insert(PALETTE_SLOT_NAMES[base + 1], contrasting_text_color(active_bg));
        palette.insert(PALETTE_SLOT_NAMES[base + 2], inactive_bg);
        palette.insert(
            PALETTE_SLOT_NAMES[base + 3],
            contrasting_text_color(inactive_bg),
        );
    }
    palette
}

/// Hue/saturation/lightness transform for secondary..quaternary families.
fn family_hsl(seed: crate::color::Hsl, family: usize, algorithm: PaletteAlgorithm) -> crate::color::Hsl {
    use PaletteAlgorithm::*;
    let step = family as f32;
    match algorithm {
        Balanced => seed
            .rotate_hue(90.0 * step)
            .with_saturation(seed.s * (1.0 - 0.1 * step)),
        Monochromatic => seed
            .with_lightness((seed.l + 0.12 * step).min(0.9))
            .with_saturation(seed.s * (1.0 - 0.15 * step)),
        BoldContrast => {
            let offsets = [0.0, 120.0, 180.0, 240.0];
            seed.rotate_hue(offsets[family])
                .with_saturation((seed.s * 1.25).min(1.0))
        }
        Analogous => {
            let offsets = [0.0, 30.0, -30.0, 60.0];
            seed.rotate_hue(offsets[family])
        }
        AnalogousMinorPlus => seed.rotate_hue(10.0 * step),
        AnalogousMinorMinus => seed.rotate_hue(-10.0 * step),
        SplitComplementary => {
            let offsets = [0.0, 150.0, 180.0, 210.0];
            seed.rotate_hue(offsets[family])
        }
        Triadic => {
            let offsets = [0.0, 120.0, 240.0, 60.0];
            seed.rotate_hue(offsets[family])
        }
        Square => seed.rotate_hue(90.0 * step),
    }
}

/// The inactive rendition of a background: washed out toward mid-lightness.
fn dimmed(color: Color) -> Color {
    let hsl = color.to_hsl();
    Color::from_hsl(
        hsl.with_saturation(hsl.s * 0.55)
            .with_lightness(hsl.l + (0.5 - hsl.l) * 0.3),
        None,
    )
}

/// Black or white text for the given background.
///
/// Perceptual brightness `(r*299 + g*587 + b*114) / 1000` with threshold 155
/// decides the candidate; if that candidate's WCAG contrast against the
/// background falls under 3.0 (saturated mid-brightness colors can defeat
/// the heuristic), the better of black/white is used instead, which is
/// always at least 4.5:1.
pub fn contrasting_text_color(bg: Color) -> Color {
    let pick = if bg.brightness() > 155.0 {
        Color::BLACK
    } else {
        Color::WHITE
    };
    if contrast_ratio(pick, bg) >= 3.0 {
        return pick;
    }
    if contrast_ratio(Color::BLACK, bg) > contrast_ratio(Color::WHITE, bg) {
        Color::BLACK
    } else {
        Color::WHITE
    }
}

// ---------------------------------------------------------------------------
// Caches
// ---------------------------------------------------------------------------

/// Memoization for palette generation and simple-mode profiles.
///
/// Lives inside the workspace session (not module state) and is cleared when
/// any contributing setting changes.
#[derive(Debug, Default)]
pub struct ProfileCaches {
    palette: HashMap<(String, PaletteAlgorithm), IndexMap<&'static str, Color>>,
    simple: HashMap<SimpleKey, ResolvedColors>,
}

impl ProfileCaches {
    pub fn clear(&mut self) {
        self.palette.clear();
        self.simple.clear();
    }

    fn palette_for(
        &mut self,
        seed: Color,
        algorithm: PaletteAlgorithm,
    ) -> &IndexMap<&'static str, Color> {
        self.palette
            .entry((seed.to_hex(), algorithm))
            .or_insert_with(|| generate_palette(seed, algorithm))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SimpleKey {
    scope: SimpleScope,
    color: String,
    theme: ThemeKind,
    inactive_titlebar: bool,
    editor_tabs: bool,
    status_bar: bool,
    knob: u8,
    branch_wide: bool,
}

// ---------------------------------------------------------------------------
// Profile resolution
// ---------------------------------------------------------------------------

/// Expand a profile into a flat UI-key → hex map for the active theme.
///
/// Literal slots resolve their color through the themed-color fallback order,
/// then apply modifiers in the fixed order lighten, darken, opacity. Palette
/// slot references are served from the memoized `__palette__` expansion,
/// seeded by the palette slot's own color, else `seed_fallback`, else black.
/// Unresolvable slots are logged and skipped; the pipeline never fails here.
pub fn resolve_profile(
    profile: &ProfileConfig,
    seed_fallback: Option<Color>,
    theme: ThemeKind,
    caches: &mut ProfileCaches,
) -> ResolvedColors {
    let mut out = ResolvedColors::new();

    for (ui_key, slot_ref) in &profile.mappings {
        let slot_name = slot_ref.slot();

        let resolved = if let Some(slot) = profile.slots.get(slot_name) {
            resolve_literal_slot(slot, theme)
        } else if PALETTE_SLOT_NAMES.contains(&slot_name) {
            resolve_palette_slot(profile, slot_name, seed_fallback, theme, caches)
        } else {
            tracing::warn!(%ui_key, slot_name, "mapping references unknown slot; skipped");
            continue;
        };

        match resolved {
            SlotValue::Unset => {
                // "none": explicit removal of this key.
                out.insert(ui_key.clone(), None);
            }
            SlotValue::Color(color) => {
                let color = apply_ref_opacity(color, slot_ref);
                out.insert(ui_key.clone(), Some(render_for_key(ui_key, color)));
            }
            SlotValue::Invalid => {
                tracing::warn!(%ui_key, slot_name, "slot has no resolvable color; skipped");
            }
        }
    }

    out
}

enum SlotValue {
    Color(Color),
    /// The `"none"` sentinel: remove the key rather than color it.
    Unset,
    /// Unparsable or missing; the key is skipped entirely.
    Invalid,
}

fn resolve_literal_slot(slot: &SlotConfig, theme: ThemeKind) -> SlotValue {
    let mut color = match resolve_color_value(slot.color.as_ref(), theme) {
        SlotValue::Color(c) => c,
        other => return other,
    };

    if let Some(amount) = slot.lighten {
        color = color.lighten(amount);
    }
    if let Some(amount) = slot.darken {
        color = color.darken(amount);
    }
    if let Some(opacity) = slot.opacity {
        color = color.with_opacity(opacity);
    }
    SlotValue::Color(color)
}

fn resolve_palette_slot(
    profile: &ProfileConfig,
    slot_name: &str,
    seed_fallback: Option<Color>,
    theme: ThemeKind,
    caches: &mut ProfileCaches,
) -> SlotValue {
    let Some(palette_slot) = profile.slots.get(PALETTE_SLOT) else {
        tracing::warn!(slot_name, "palette slot referenced but __palette__ missing");
        return SlotValue::Invalid;
    };

    let seed = match resolve_color_value(palette_slot.color.as_ref(), theme) {
        SlotValue::Color(c) => c,
        _ => seed_fallback.unwrap_or_else(|| {
            // Last-resort seed; better a black palette than a failed pass.
            tracing::warn!("palette seed unresolvable, falling back to #000000");
            Color::BLACK
        }),
    };

    let algorithm = palette_slot
        .algorithm
        .as_deref()
        .and_then(PaletteAlgorithm::parse)
        .unwrap_or_else(|| {
            if let Some(name) = &palette_slot.algorithm {
                tracing::warn!(%name, "unknown palette algorithm, using balanced");
            }
            PaletteAlgorithm::Balanced
        });

    match caches.palette_for(seed, algorithm).get(slot_name) {
        Some(color) => SlotValue::Color(*color),
        None => SlotValue::Invalid,
    }
}

fn resolve_color_value(raw: Option<&ColorValueConfig>, theme: ThemeKind) -> SlotValue {
    match raw {
        None => SlotValue::Invalid,
        Some(ColorValueConfig::Plain(s)) if s == crate::config::types::COLOR_NONE => {
            SlotValue::Unset
        }
        Some(ColorValueConfig::Plain(s)) => {
            // Plain strings render for any theme by promotion: the written
            // value is the dark-theme rendition, others derive from it.
            let themed = ThemedColor::create(s, ThemeKind::Dark);
            match themed.resolve(theme).and_then(Color::try_parse) {
                Some(c) => SlotValue::Color(c),
                None => SlotValue::Invalid,
            }
        }
        Some(ColorValueConfig::Themed(tc)) => match tc.resolve(theme) {
            Some(s) if s == crate::config::types::COLOR_NONE => SlotValue::Unset,
            Some(s) => match Color::try_parse(s) {
                Some(c) => SlotValue::Color(c),
                None => SlotValue::Invalid,
            },
            None => SlotValue::Invalid,
        },
    }
}

fn apply_ref_opacity(color: Color, slot_ref: &SlotRefConfig) -> Color {
    match slot_ref.opacity() {
        Some(opacity) => color.with_opacity(opacity),
        None => color,
    }
}

/// Render a color for a UI key, stripping alpha on keys that must stay opaque.
fn render_for_key(ui_key: &str, color: Color) -> String {
    if settings::key_supports_alpha(ui_key) {
        color.to_hex()
    } else {
        color.to_hex_opaque()
    }
}

/// Overlay branch-profile output onto repo-profile output.
///
/// Only keys the overlay defines with a concrete value replace the base;
/// keys absent (or explicitly removed) in the overlay keep the base value.
pub fn overlay_colors(base: &mut ResolvedColors, overlay: ResolvedColors) {
    for (key, value) in overlay {
        if value.is_some() {
            base.insert(key, value);
        }
    }
}

// ---------------------------------------------------------------------------
// Simple mode
// ---------------------------------------------------------------------------

/// What a synthesized simple-mode profile covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimpleScope {
    Repo,
    Branch,
}

/// Resolve simple mode (a raw color, no named profile) by synthesizing a
/// temporary profile and funneling it through [`resolve_profile`] — simple
/// mode and profile mode share one resolution path by construction.
///
/// Results are cached per (scope, color, theme, contributing toggles).
pub fn resolve_simple(
    color: Color,
    scope: SimpleScope,
    theme: ThemeKind,
    toggles: &Toggles,
    caches: &mut ProfileCaches,
) -> ResolvedColors {
    let key = SimpleKey {
        scope,
        color: color.to_hex(),
        theme,
        inactive_titlebar: toggles.color_inactive_titlebar,
        editor_tabs: toggles.color_editor_tabs,
        status_bar: toggles.color_status_bar,
        knob: toggles.activity_bar_color_knob,
        branch_wide: toggles.apply_branch_color_to_tabs_and_status_bar,
    };
    if let Some(cached) = caches.simple.get(&key) {
        return cached.clone();
    }

    let profile = build_simple_profile(color, scope, toggles);
    // Slot colors are already resolved for the active theme; resolving as
    // dark makes the plain-string promotion a no-op instead of deriving a
    // second time.
    let resolved = resolve_profile(&profile, Some(color), ThemeKind::Dark, caches);
    caches.simple.insert(key, resolved.clone());
    resolved
}

fn build_simple_profile(color: Color, scope: SimpleScope, toggles: &Toggles) -> ProfileConfig {
    let mut profile = ProfileConfig::default();

    let base_fg = contrasting_text_color(color);
    let inactive = dimmed(color);
    let inactive_fg = contrasting_text_color(inactive);

    add_slot(&mut profile, "base", color);
    add_slot(&mut profile, "baseFg", base_fg);
    add_slot(&mut profile, "inactive", inactive);
    add_slot(&mut profile, "inactiveFg", inactive_fg);

    add_mapping(&mut profile, "titleBar.activeBackground", "base");
    add_mapping(&mut profile, "titleBar.activeForeground", "baseFg");
    if toggles.color_inactive_titlebar {
        add_mapping(&mut profile, "titleBar.inactiveBackground", "inactive");
        add_mapping(&mut profile, "titleBar.inactiveForeground", "inactiveFg");
    }

    match scope {
        SimpleScope::Repo => {
            // Knob 0-10 rescaled into a lightness shift away from the base,
            // lightening dark bases and darkening light ones.
            let amount = f32::from(toggles.activity_bar_color_knob) / 10.0 * 0.3;
            let activity = if color.to_hsl().l < 0.5 {
                color.lighten(amount)
            } else {
                color.darken(amount)
            };
            add_slot(&mut profile, "activity", activity);
            add_slot(&mut profile, "activityFg", contrasting_text_color(activity));
            add_mapping(&mut profile, "activityBar.background", "activity");
            add_mapping(&mut profile, "activityBar.foreground", "activityFg");

            if toggles.color_editor_tabs {
                add_mapping(&mut profile, "tab.activeBackground", "base");
                add_mapping(&mut profile, "tab.activeForeground", "baseFg");
                add_mapping(&mut profile, "tab.inactiveBackground", "inactive");
                add_mapping(&mut profile, "tab.inactiveForeground", "inactiveFg");
                add_mapping(&mut profile, "editorGroupHeader.tabsBackground", "inactive");
            }
            if toggles.color_status_bar {
                add_mapping(&mut profile, "statusBar.background", "base");
                add_mapping(&mut profile, "statusBar.foreground", "baseFg");
            }
        }
        SimpleScope::Branch => {
            if toggles.apply_branch_color_to_tabs_and_status_bar {
                add_mapping(&mut profile, "tab.activeBackground", "base");
                add_mapping(&mut profile, "tab.activeForeground", "baseFg");
                add_mapping(&mut profile, "statusBar.background", "base");
                add_mapping(&mut profile, "statusBar.foreground", "baseFg");
            }
        }
    }

    profile
}

fn add_slot(profile: &mut ProfileConfig, name: &str, color: Color) {
    profile.slots.insert(
        name.to_owned(),
        SlotConfig {
            color: Some(ColorValueConfig::Plain(color.to_hex())),
            ..SlotConfig::default()
        },
    );
}

fn add_mapping(profile: &mut ProfileConfig, ui_key: &str, slot: &str) {
    profile
        .mappings
        .insert(ui_key.to_owned(), SlotRefConfig::Name(slot.to_owned()));
}
