use std::fs;

use ratatui::style::Color;
use serde::{Deserialize, Serialize};

const BUILTIN_THEMES: [&str; 2] = ["clinic-dark", "clinic-light"];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Theme {
    pub name: String,
    pub colors: ThemeColors,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeColors {
    pub bg: String,
    pub fg: String,
    pub text_muted: String,
    pub user_message: String,
    pub patient_message: String,
    pub strong: String,
    pub accent: String,
    pub accent_dim: String,
    pub border: String,
    pub border_focused: String,
    pub header_bg: String,
    pub header_fg: String,
    pub heat_empty: String,
    pub heat_played: String,
    pub heat_today: String,
    pub error: String,
    pub warning: String,
    pub success: String,
}

impl Theme {
    /// User themes in `<config>/dxdaily/themes/<name>.toml` shadow the
    /// built-in palettes of the same name.
    pub fn load(name: &str) -> Option<Self> {
        if let Some(config_dir) = dirs::config_dir() {
            let user_theme_path = config_dir
                .join("dxdaily")
                .join("themes")
                .join(format!("{name}.toml"));
            if let Ok(content) = fs::read_to_string(&user_theme_path) {
                match toml::from_str::<Theme>(&content) {
                    Ok(theme) => return Some(theme),
                    Err(e) => tracing::warn!(theme = name, error = %e, "unreadable theme file"),
                }
            }
        }
        Self::builtin(name)
    }

    pub fn builtin(name: &str) -> Option<Self> {
        let colors = match name {
            "clinic-dark" => ThemeColors::default(),
            "clinic-light" => ThemeColors::light(),
            _ => return None,
        };
        Some(Self {
            name: name.to_string(),
            colors,
        })
    }

    pub fn available_themes() -> Vec<String> {
        let mut names: Vec<String> = BUILTIN_THEMES.iter().map(|n| n.to_string()).collect();
        let user_dir = dirs::config_dir().map(|d| d.join("dxdaily").join("themes"));
        if let Some(entries) = user_dir.and_then(|d| fs::read_dir(d).ok()) {
            for entry in entries.flatten() {
                let file_name = entry.file_name().to_string_lossy().to_string();
                if let Some(name) = file_name.strip_suffix(".toml")
                    && !names.iter().any(|n| n == name)
                {
                    names.push(name.to_string());
                }
            }
        }
        names
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            name: BUILTIN_THEMES[0].to_string(),
            colors: ThemeColors::default(),
        }
    }
}

impl Default for ThemeColors {
    fn default() -> Self {
        Self {
            bg: "#1e1e2e".to_string(),
            fg: "#cdd6f4".to_string(),
            text_muted: "#6c7086".to_string(),
            user_message: "#89dceb".to_string(),
            patient_message: "#cdd6f4".to_string(),
            strong: "#f9e2af".to_string(),
            accent: "#89b4fa".to_string(),
            accent_dim: "#45475a".to_string(),
            border: "#45475a".to_string(),
            border_focused: "#89b4fa".to_string(),
            header_bg: "#313244".to_string(),
            header_fg: "#cdd6f4".to_string(),
            heat_empty: "#313244".to_string(),
            heat_played: "#40a02b".to_string(),
            heat_today: "#f9e2af".to_string(),
            error: "#f38ba8".to_string(),
            warning: "#f9e2af".to_string(),
            success: "#a6e3a1".to_string(),
        }
    }
}

impl ThemeColors {
    fn light() -> Self {
        Self {
            bg: "#eff1f5".to_string(),
            fg: "#4c4f69".to_string(),
            text_muted: "#8c8fa1".to_string(),
            user_message: "#1e66f5".to_string(),
            patient_message: "#4c4f69".to_string(),
            strong: "#d20f39".to_string(),
            accent: "#1e66f5".to_string(),
            accent_dim: "#bcc0cc".to_string(),
            border: "#bcc0cc".to_string(),
            border_focused: "#1e66f5".to_string(),
            header_bg: "#dce0e8".to_string(),
            header_fg: "#4c4f69".to_string(),
            heat_empty: "#dce0e8".to_string(),
            heat_played: "#40a02b".to_string(),
            heat_today: "#df8e1d".to_string(),
            error: "#d20f39".to_string(),
            warning: "#df8e1d".to_string(),
            success: "#40a02b".to_string(),
        }
    }

    pub fn parse_color(hex: &str) -> Color {
        let hex = hex.trim_start_matches('#');
        if hex.len() == 6
            && let (Ok(r), Ok(g), Ok(b)) = (
                u8::from_str_radix(&hex[0..2], 16),
                u8::from_str_radix(&hex[2..4], 16),
                u8::from_str_radix(&hex[4..6], 16),
            )
        {
            return Color::Rgb(r, g, b);
        }
        Color::White
    }

    pub fn bg(&self) -> Color { Self::parse_color(&self.bg) }
    pub fn fg(&self) -> Color { Self::parse_color(&self.fg) }
    pub fn text_muted(&self) -> Color { Self::parse_color(&self.text_muted) }
    pub fn user_message(&self) -> Color { Self::parse_color(&self.user_message) }
    pub fn patient_message(&self) -> Color { Self::parse_color(&self.patient_message) }
    pub fn strong(&self) -> Color { Self::parse_color(&self.strong) }
    pub fn accent(&self) -> Color { Self::parse_color(&self.accent) }
    pub fn accent_dim(&self) -> Color { Self::parse_color(&self.accent_dim) }
    pub fn border(&self) -> Color { Self::parse_color(&self.border) }
    pub fn border_focused(&self) -> Color { Self::parse_color(&self.border_focused) }
    pub fn header_bg(&self) -> Color { Self::parse_color(&self.header_bg) }
    pub fn header_fg(&self) -> Color { Self::parse_color(&self.header_fg) }
    pub fn heat_empty(&self) -> Color { Self::parse_color(&self.heat_empty) }
    pub fn heat_played(&self) -> Color { Self::parse_color(&self.heat_played) }
    pub fn heat_today(&self) -> Color { Self::parse_color(&self.heat_today) }
    pub fn error(&self) -> Color { Self::parse_color(&self.error) }
    pub fn warning(&self) -> Color { Self::parse_color(&self.warning) }
    pub fn success(&self) -> Color { Self::parse_color(&self.success) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color() {
        assert_eq!(ThemeColors::parse_color("#1e66f5"), Color::Rgb(0x1e, 0x66, 0xf5));
        assert_eq!(ThemeColors::parse_color("nope"), Color::White);
    }

    #[test]
    fn test_partial_theme_file_fills_defaults() {
        let theme: Theme = toml::from_str(
            r##"
name = "mine"
[colors]
accent = "#ff0000"
"##,
        )
        .unwrap();
        assert_eq!(theme.colors.accent(), Color::Rgb(255, 0, 0));
        assert_eq!(theme.colors.bg, ThemeColors::default().bg);
    }

    #[test]
    fn test_builtins_are_listed() {
        let names = Theme::available_themes();
        for builtin in BUILTIN_THEMES {
            assert!(Theme::builtin(builtin).is_some());
            assert!(names.iter().any(|n| n == builtin));
        }
        assert!(Theme::builtin("solarized").is_none());
    }
}
