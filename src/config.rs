//! Service-wide and per-surface configuration.

use crate::viewbox::DEFAULT_VIEWBOX;
use crate::{Alignment, Fit};

/// Folder identifiers are resolved against when none is configured.
pub const DEFAULT_FOLDER: &str = "assets/rive";
/// Content delivery base used for the engine binary.
pub const DEFAULT_CDN_BASE: &str = "https://unpkg.com";
/// Package the engine binary ships in.
pub const ENGINE_PACKAGE: &str = "@rive-app/canvas-advanced";
/// File name of the engine binary inside the package.
pub const ENGINE_BINARY: &str = "rive.wasm";

/// Configuration shared by every surface of one service.
///
/// All fields are optional for forward/backward compatibility.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RiveConfig {
    /// Folder bundles are fetched from (`assets/rive` when unset).
    pub folder: Option<String>,
    /// Engine package version (`latest` when unset).
    pub version: Option<String>,
    /// Full address of the engine binary, overriding the CDN template.
    pub wasm_path: Option<String>,
    /// CDN base (`https://unpkg.com` when unset).
    pub cdn_base: Option<String>,
}

impl RiveConfig {
    /// Parse a TOML document into `RiveConfig`.
    #[cfg(feature = "toml")]
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn folder(&self) -> &str {
        self.folder.as_deref().unwrap_or(DEFAULT_FOLDER)
    }

    /// Address of the engine binary.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use riv_core_view::RiveConfig;
    ///
    /// let config = RiveConfig { version: Some("2.7.0".into()), ..Default::default() };
    /// assert_eq!(
    ///     config.wasm_url(),
    ///     "https://unpkg.com/@rive-app/canvas-advanced@2.7.0/rive.wasm"
    /// );
    /// ```
    pub fn wasm_url(&self) -> String {
        if let Some(path) = &self.wasm_path {
            return path.clone();
        }
        let base = self.cdn_base.as_deref().unwrap_or(DEFAULT_CDN_BASE).trim_end_matches('/');
        let version = self.version.as_deref().unwrap_or("latest");
        format!("{base}/{ENGINE_PACKAGE}@{version}/{ENGINE_BINARY}")
    }
}

/// Per-surface drawing options.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CanvasOptions {
    pub viewbox: String,
    pub fit: Fit,
    pub alignment: Alignment,
    /// Defer loading until the surface is first visible.
    pub lazy: bool,
}

impl Default for CanvasOptions {
    fn default() -> Self {
        Self {
            viewbox: DEFAULT_VIEWBOX.to_string(),
            fit: Fit::default(),
            alignment: Alignment::default(),
            lazy: false,
        }
    }
}

impl CanvasOptions {
    #[cfg(feature = "toml")]
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}

/// Interpret a `lazy` attribute: present-but-empty and `"true"` mean lazy.
pub fn parse_lazy(attr: &str) -> bool {
    matches!(attr.trim(), "" | "true")
}

/// Parse a width/height attribute like `parseInt` does (`"300px"` is 300).
///
/// Returns `None` when the attribute does not start with a non-negative
/// integer, in which case the surface keeps its current size.
pub fn parse_dimension(attr: &str) -> Option<u32> {
    let attr = attr.trim_start();
    let attr = attr.strip_prefix('+').unwrap_or(attr);
    let digits_end = attr.find(|c: char| !c.is_ascii_digit()).unwrap_or(attr.len());
    attr[..digits_end].parse().ok()
}
