use serde::{Deserialize, Serialize};

/// Semantic tag attached to overlay objects carrying rich text
pub const DEFAULT_MARK_TAG: &str = "RichText";
/// Mark key holding the HTML payload
pub const DEFAULT_HTML_KEY: &str = "HTML";
/// Mark key holding the layout width payload
pub const DEFAULT_WIDTH_KEY: &str = "Width";

/// Rasterization configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Composite annotations on top of page content
    #[serde(default = "default_true")]
    pub annotations: bool,

    /// Byte every fresh render buffer is filled with (0xff = opaque white)
    #[serde(default = "default_background")]
    pub background: u8,

    /// Write pixels as RGBA (`false` gives BGRA)
    #[serde(default = "default_true")]
    pub rgba_byte_order: bool,
}

const fn default_true() -> bool {
    true
}

const fn default_background() -> u8 {
    0xff
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            annotations: true,
            background: default_background(),
            rgba_byte_order: true,
        }
    }
}

/// Keys used for the mark attached to rich-text overlays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayConfig {
    #[serde(default = "default_mark_tag")]
    pub mark_tag: String,

    #[serde(default = "default_html_key")]
    pub html_key: String,

    #[serde(default = "default_width_key")]
    pub width_key: String,
}

fn default_mark_tag() -> String {
    DEFAULT_MARK_TAG.to_string()
}

fn default_html_key() -> String {
    DEFAULT_HTML_KEY.to_string()
}

fn default_width_key() -> String {
    DEFAULT_WIDTH_KEY.to_string()
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            mark_tag: default_mark_tag(),
            html_key: default_html_key(),
            width_key: default_width_key(),
        }
    }
}

/// Serialization configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveConfig {
    /// Strip encryption and permission restrictions
    #[serde(default = "default_true")]
    pub remove_security: bool,

    /// Regenerate content of cached pages with pending object edits before saving
    #[serde(default = "default_true")]
    pub flush_pending_edits: bool,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            remove_security: true,
            flush_pending_edits: true,
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub overlay: OverlayConfig,

    #[serde(default)]
    pub save: SaveConfig,
}

impl SessionConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, crate::error::Error> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            crate::error::Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        toml::from_str(&content).map_err(|e| {
            crate::error::Error::ConfigLoad(format!("Failed to parse config: {e}"))
        })
    }

    /// Load from default locations (~/.config/pdf-overlay/config.toml, ./pdf-overlay.toml)
    pub fn load() -> Self {
        // Try user config
        if let Some(config_dir) = crate::util::config_dir() {
            let user_config = config_dir.join("pdf-overlay").join("config.toml");
            if user_config.exists() {
                match Self::from_file(&user_config) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {}", user_config.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // Try local config
        let local_config = std::path::PathBuf::from("pdf-overlay.toml");
        if local_config.exists() {
            match Self::from_file(&local_config) {
                Ok(config) => {
                    tracing::debug!("Loaded config from ./pdf-overlay.toml");
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load ./pdf-overlay.toml: {}", e);
                }
            }
        }

        // Return defaults
        tracing::debug!("No config file found, using defaults");
        Self::default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert!(config.render.annotations);
        assert_eq!(config.render.background, 0xff);
        assert!(config.render.rgba_byte_order);
        assert_eq!(config.overlay.mark_tag, "RichText");
        assert!(config.save.remove_security);
        assert!(config.save.flush_pending_edits);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[overlay]\nmark_tag = \"Note\"\n\n[save]\nflush_pending_edits = false\n",
        )
        .unwrap();

        let config = SessionConfig::from_file(&path).unwrap();
        assert_eq!(config.overlay.mark_tag, "Note");
        assert_eq!(config.overlay.html_key, DEFAULT_HTML_KEY);
        assert!(!config.save.flush_pending_edits);
        assert!(config.save.remove_security);
        assert_eq!(config.render, RenderConfig::default());
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "render = 3").unwrap();

        let result = SessionConfig::from_file(&path);
        assert!(matches!(result, Err(crate::error::Error::ConfigLoad(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = SessionConfig::from_file("/nonexistent/pdf-overlay.toml");
        assert!(result.is_err());
    }
}
