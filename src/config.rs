//! Configuration for catalog access, file locations and card layout
//!
//! Every knob lives in [`Config`], loaded from a TOML file. Missing sections
//! and fields fall back to the defaults below, so an empty file is valid.

use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::error::{Error, Result};
use crate::layout::{CardGrid, PageDimensions};

/// File looked up in the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "qr-cards.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub shortener: ShortenerConfig,
    pub paths: PathConfig,
    pub layout: LayoutConfig,
}

/// Remote product catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Base URL; the product ID is appended verbatim
    pub api_url: String,
    /// Webservice key, sent as the basic-auth user name
    pub api_key: Option<String>,
    /// Storefront root used to build product links
    pub storefront_url: String,
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_url: "https://tienda.anywayinsumos.com.ar/api/products/".to_string(),
            api_key: None,
            storefront_url: "https://tienda.anywayinsumos.com.ar".to_string(),
            timeout_secs: 10,
        }
    }
}

/// URL shortening service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortenerConfig {
    /// Endpoint prefix; the target URL is appended as the query value
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self {
            url: "http://tinyurl.com/api-create.php?url=".to_string(),
            timeout_secs: 10,
        }
    }
}

/// File system locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Persisted product ID list (JSON array)
    pub ids_file: PathBuf,
    /// Where QR images and their sidecars are written
    pub qr_dir: PathBuf,
    /// Where page PDFs and the merged document are written
    pub output_dir: PathBuf,
    /// TrueType font for card text. `None` uses the built-in Helvetica.
    pub font_path: Option<PathBuf>,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            ids_file: PathBuf::from("data/products.json"),
            qr_dir: PathBuf::from("qrcodes-manuales"),
            output_dir: PathBuf::from("output_pdfs"),
            font_path: None,
        }
    }
}

/// Card and page geometry, in pixels at `dpi`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub dpi: u32,
    pub card_width: u32,
    pub card_height: u32,
    pub margin: u32,
    pub spacing: u32,
    pub columns: u32,
    pub max_rows_per_page: u32,
    /// Gap between the QR height and the card height
    pub qr_inset: u32,
    pub font_size: f32,
    pub cta_font_size: f32,
    pub price_font_size: f32,
    /// Caption wrap width in characters
    pub wrap_width: usize,
    /// Names longer than this are shortened with an ellipsis
    pub max_name_chars: usize,
    pub cta_text: String,
    pub currency_prefix: String,
    pub page_color: String,
    pub card_color: String,
    pub text_color: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        let dpi = 300;
        Self {
            dpi,
            card_width: 780,
            card_height: 340,
            margin: dpi / 100,
            spacing: dpi / 50,
            columns: 3,
            max_rows_per_page: 10,
            qr_inset: dpi / 10 + 2,
            font_size: 30.0,
            cta_font_size: 22.0,
            price_font_size: 60.0,
            wrap_width: 25,
            max_name_chars: 100,
            cta_text: "Ver más info".to_string(),
            currency_prefix: "AR $".to_string(),
            page_color: "#D4C3C3".to_string(),
            card_color: "#FFFFFF".to_string(),
            text_color: "#000000".to_string(),
        }
    }
}

impl LayoutConfig {
    /// Page size, always A4
    pub fn page(&self) -> PageDimensions {
        PageDimensions::a4()
    }

    /// Grid parameters for pagination
    pub fn grid(&self) -> CardGrid {
        CardGrid {
            card_width: self.card_width,
            card_height: self.card_height,
            margin: self.margin,
            spacing: self.spacing,
            columns: self.columns,
            max_rows_per_page: self.max_rows_per_page,
        }
    }

    /// Target QR height inside a card
    pub fn qr_height(&self) -> u32 {
        self.card_height.saturating_sub(self.qr_inset)
    }

    /// Reject geometry that cannot be laid out on the page
    pub fn validate(&self) -> Result<()> {
        if self.dpi == 0 {
            return Err(Error::InvalidConfig("dpi must be positive".to_string()));
        }
        if self.columns == 0 || self.max_rows_per_page == 0 {
            return Err(Error::InvalidConfig(
                "columns and max_rows_per_page must be positive".to_string(),
            ));
        }
        if self.card_width == 0 || self.qr_height() == 0 {
            return Err(Error::InvalidConfig("card is too small".to_string()));
        }
        if self.wrap_width == 0 {
            return Err(Error::InvalidConfig("wrap_width must be positive".to_string()));
        }

        let (page_w, page_h) = self.page().to_pixels(self.dpi);
        let (grid_w, grid_h) = self.grid().extent();
        if grid_w > page_w || grid_h > page_h {
            return Err(Error::InvalidConfig(format!(
                "a {}x{} grid of {}x{} cards needs {}x{} px but the page is {}x{} px",
                self.columns, self.max_rows_per_page,
                self.card_width, self.card_height,
                grid_w, grid_h, page_w, page_h
            )));
        }

        for color in [&self.page_color, &self.card_color, &self.text_color] {
            parse_color(color)?;
        }

        Ok(())
    }
}

impl Config {
    /// Load configuration
    ///
    /// An explicit path must exist. Without one, `qr-cards.toml` in the
    /// working directory is used when present, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::FileNotFound(path.to_path_buf()));
                }
                Self::from_file(path)
            }
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::from_file(fallback)
                } else {
                    debug!("No config file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.layout.validate()?;
        Ok(config)
    }
}

/// RGB color with components in 0.0..=1.0
pub type Rgb = (f32, f32, f32);

/// Parse `#RGB`, `#RGBA`, `#RRGGBB` or `#RRGGBBAA`; alpha is ignored
pub fn parse_color(value: &str) -> Result<Rgb> {
    let invalid = || Error::InvalidConfig(format!("invalid color: {}", value));
    let hex = value.trim().strip_prefix('#').ok_or_else(invalid)?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let channel = |s: &str| -> Result<f32> {
        u8::from_str_radix(s, 16)
            .map(|v| v as f32 / 255.0)
            .map_err(|_| invalid())
    };

    match hex.len() {
        3 | 4 => {
            let short: Vec<String> = hex.chars().take(3).map(|c| format!("{c}{c}")).collect();
            Ok((channel(&short[0])?, channel(&short[1])?, channel(&short[2])?))
        }
        6 | 8 => Ok((channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
        _ => Err(invalid()),
    }
}
