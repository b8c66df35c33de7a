use serde::{Deserialize, Serialize};

use crate::color::Color;

/// The active UI theme family the colors are computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum ThemeKind {
    #[default]
    Dark,
    Light,
    HighContrast,
}

impl ThemeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ThemeKind::Dark => "dark",
            ThemeKind::Light => "light",
            ThemeKind::HighContrast => "high_contrast",
        }
    }

    /// Detect whether the terminal has a dark or light background.
    ///
    /// Heuristic: check `COLORFGBG` (format "fg;bg"), fall back to dark.
    /// High contrast is never detected, only selected explicitly.
    pub fn detect() -> Self {
        if let Ok(val) = std::env::var("COLORFGBG")
            && let Some(bg) = val.rsplit(';').next()
            && let Ok(n) = bg.parse::<u8>()
        {
            // ANSI colors 0-6 and 8 are typically dark backgrounds.
            if n > 6 && n != 8 {
                return ThemeKind::Light;
            }
        }
        ThemeKind::Dark
    }
}

// ---------------------------------------------------------------------------
// Themed color model
// ---------------------------------------------------------------------------

/// One theme's slot in a [`ThemedColor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeVariant {
    pub value: Option<String>,
    /// `true` while the value is derived; explicit user-set values are
    /// "pinned" (`auto: false`) and survive later edits to other themes.
    pub auto: bool,
}

impl ThemeVariant {
    fn derived(value: String) -> Self {
        Self {
            value: Some(value),
            auto: true,
        }
    }

    fn explicit(value: String) -> Self {
        Self {
            value: Some(value),
            auto: false,
        }
    }
}

impl Default for ThemeVariant {
    fn default() -> Self {
        Self {
            value: None,
            auto: true,
        }
    }
}

/// A color carrying independent dark / light / high-contrast variants.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "ThemedColorRepr", into = "ThemedColorRepr")]
pub struct ThemedColor {
    pub dark: ThemeVariant,
    pub light: ThemeVariant,
    pub high_contrast: ThemeVariant,
}

impl ThemedColor {
    /// Build all three variants from a single color: `current` becomes
    /// explicit, the other two are derived and marked `auto`.
    pub fn create(color: &str, current: ThemeKind) -> Self {
        let mut tc = Self::default();
        for kind in [ThemeKind::Dark, ThemeKind::Light, ThemeKind::HighContrast] {
            *tc.variant_mut(kind) = if kind == current {
                ThemeVariant::explicit(color.to_owned())
            } else {
                ThemeVariant::derived(derive_theme_variant(color, current, kind))
            };
        }
        tc
    }

    /// Set `theme` explicitly to `color` and re-derive only the variants
    /// still marked `auto`. Variants the user pinned earlier are untouched.
    pub fn update(&mut self, color: &str, theme: ThemeKind) {
        *self.variant_mut(theme) = ThemeVariant::explicit(color.to_owned());
        for kind in [ThemeKind::Dark, ThemeKind::Light, ThemeKind::HighContrast] {
            if kind != theme && self.variant(kind).auto {
                *self.variant_mut(kind) =
                    ThemeVariant::derived(derive_theme_variant(color, theme, kind));
            }
        }
    }

    /// Value for `current`, falling back to the first defined variant in the
    /// fixed scan order dark, light, high-contrast.
    pub fn resolve(&self, current: ThemeKind) -> Option<&str> {
        self.variant(current)
            .value
            .as_deref()
            .or(self.dark.value.as_deref())
            .or(self.light.value.as_deref())
            .or(self.high_contrast.value.as_deref())
    }

    /// True if at least one variant holds a parseable color string.
    pub fn has_any_color(&self) -> bool {
        [&self.dark, &self.light, &self.high_contrast]
            .into_iter()
            .any(|v| v.value.as_deref().is_some_and(|s| Color::try_parse(s).is_some()))
    }

    pub fn variant(&self, kind: ThemeKind) -> &ThemeVariant {
        match kind {
            ThemeKind::Dark => &self.dark,
            ThemeKind::Light => &self.light,
            ThemeKind::HighContrast => &self.high_contrast,
        }
    }

    pub fn variant_mut(&mut self, kind: ThemeKind) -> &mut ThemeVariant {
        match kind {
            ThemeKind::Dark => &mut self.dark,
            ThemeKind::Light => &mut self.light,
            ThemeKind::HighContrast => &mut self.high_contrast,
        }
    }
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Compute the `to`-theme rendition of a color set for the `from` theme.
///
/// The policy inverts lightness with compression bands so that very dark
/// sources stay visible on light backgrounds and very light sources do not
/// collapse to near-black. Hue and saturation are preserved exactly, and the
/// result's lightness is clamped to `[0.10, 0.90]`.
///
/// Unparsable input is returned unchanged; derivation never fails.
pub fn derive_theme_variant(base: &str, from: ThemeKind, to: ThemeKind) -> String {
    if from == to {
        return base.to_owned();
    }
    let Some(color) = Color::try_parse(base) else {
        return base.to_owned();
    };

    let hsl = color.to_hsl();
    let l = hsl.l;
    let target = match (from, to) {
        (ThemeKind::Dark | ThemeKind::HighContrast, ThemeKind::Light) => {
            let t = 1.0 - l;
            if t > 0.85 { 0.35 + (t - 0.85) * 0.5 } else { t }
        }
        (ThemeKind::Light, ThemeKind::Dark) => {
            let t = 1.0 - l;
            if t > 0.75 { 0.6 + (t - 0.75) * 0.3 } else { t }
        }
        (ThemeKind::Light, ThemeKind::HighContrast) => 1.0 - l,
        (ThemeKind::Dark, ThemeKind::HighContrast) => (l + 0.1).min(0.7),
        _ => l,
    };

    Color::from_hsl(hsl.with_lightness(target.clamp(0.10, 0.90)), color.a).to_hex()
}

// ---------------------------------------------------------------------------
// Serde representation
// ---------------------------------------------------------------------------

/// Wire shape: each variant is either a shorthand color string (explicit) or
/// a `{ value, auto }` table; missing variants mean "derive later".
#[derive(Serialize, Deserialize, Default)]
#[serde(default, rename_all = "snake_case")]
struct ThemedColorRepr {
    #[serde(skip_serializing_if = "Option::is_none")]
    dark: Option<VariantRepr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    light: Option<VariantRepr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    high_contrast: Option<VariantRepr>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum VariantRepr {
    Shorthand(String),
    Full {
        value: Option<String>,
        #[serde(default)]
        auto: bool,
    },
}

impl From<ThemedColorRepr> for ThemedColor {
    fn from(repr: ThemedColorRepr) -> Self {
        let variant = |r: Option<VariantRepr>| match r {
            None => ThemeVariant::default(),
            Some(VariantRepr::Shorthand(s)) => ThemeVariant::explicit(s),
            Some(VariantRepr::Full { value, auto }) => ThemeVariant { value, auto },
        };
        Self {
            dark: variant(repr.dark),
            light: variant(repr.light),
            high_contrast: variant(repr.high_contrast),
        }
    }
}

impl From<ThemedColor> for ThemedColorRepr {
    fn from(tc: ThemedColor) -> Self {
        let repr = |v: ThemeVariant| match (v.value, v.auto) {
            (None, true) => None,
            (Some(s), false) => Some(VariantRepr::Shorthand(s)),
            (value, auto) => Some(VariantRepr::Full { value, auto }),
        };
        Self {
            dark: repr(tc.dark),
            light: repr(tc.light),
            high_contrast: repr(tc.high_contrast),
        }
    }
}
