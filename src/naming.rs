//! QR artifact naming and product labels
//!
//! Each QR image is named `{name}_{reference}_Precio ${price}.png` and may be
//! accompanied by a `{stem}.json` sidecar holding the same attributes. The
//! sidecar is authoritative; the file name is parsed only when no usable
//! sidecar exists.

use std::fs;
use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;
use crate::catalog::ProductRecord;
use crate::error::Result;

/// Longest cleaned product name kept in a file name
pub const MAX_NAME_CHARS: usize = 100;

static ILLEGAL_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static FILE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>.*)_(?P<reference>[^_]*)_Precio \$(?P<price>\d+)$").unwrap()
});

/// Make a product name safe for use in a file name
///
/// Filesystem-illegal characters are dropped, whitespace runs become a
/// single underscore and the result is cut to 100 characters.
pub fn clean_filename(name: &str) -> String {
    let stripped = ILLEGAL_CHARS.replace_all(name, "");
    let joined = WHITESPACE.replace_all(stripped.trim(), "_");
    joined.chars().take(MAX_NAME_CHARS).collect()
}

/// File stem (no extension) of a product's QR image
pub fn qr_file_stem(record: &ProductRecord) -> String {
    format!(
        "{}_{}_Precio ${}",
        clean_filename(&record.name),
        record.reference,
        record.price
    )
}

/// Round up to the next multiple of ten and format with `.` thousands separators
///
/// Returns `None` when the rounded price does not fit in a `u64`.
///
/// ```
/// use qr_cards::naming::format_price;
/// assert_eq!(format_price(1234, "AR $").as_deref(), Some("AR $1.240"));
/// ```
pub fn format_price(price: u64, prefix: &str) -> Option<String> {
    let rounded = price.div_ceil(10).checked_mul(10)?;
    let digits = rounded.to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    Some(format!("{}{}", prefix, grouped))
}

/// Product attributes shown on a card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductLabel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub reference: String,
    /// Tax-adjusted price; `None` when it could not be recovered
    #[serde(default)]
    pub price: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

impl ProductLabel {
    /// Label for a freshly emitted QR code
    pub fn from_record(record: &ProductRecord, url: &str, short_url: &str) -> Self {
        Self {
            id: Some(record.id.clone()),
            name: record.name.clone(),
            reference: record.reference.clone(),
            price: record.price.parse().ok(),
            url: Some(url.to_string()),
            short_url: Some(short_url.to_string()),
            generated_at: Some(Utc::now()),
        }
    }
}

/// Recover a label from a QR file stem
///
/// Underscores in the name part become spaces. A stem that does not match
/// the naming pattern yields the whole stem as name with no reference and
/// no price.
pub fn parse_file_label(stem: &str) -> ProductLabel {
    let (name, reference, price) = match FILE_LABEL.captures(stem) {
        Some(caps) => (
            caps["name"].to_string(),
            caps["reference"].to_string(),
            parse_price(stem, &caps["price"]),
        ),
        None => (stem.to_string(), String::new(), None),
    };

    ProductLabel {
        id: None,
        name: name.replace('_', " ").trim().to_string(),
        reference,
        price,
        url: None,
        short_url: None,
        generated_at: None,
    }
}

fn parse_price(stem: &str, digits: &str) -> Option<u64> {
    match digits.parse() {
        Ok(price) => Some(price),
        Err(_) => {
            warn!("Price in \"{}\" is out of range, showing no price", stem);
            None
        }
    }
}

/// Sidecar path for a QR image
pub fn sidecar_path(image_path: &Path) -> PathBuf {
    image_path.with_extension("json")
}

/// Write the sidecar next to a QR image
pub fn write_sidecar(image_path: &Path, label: &ProductLabel) -> Result<()> {
    let json = serde_json::to_string_pretty(label)?;
    fs::write(sidecar_path(image_path), json)?;
    Ok(())
}

/// Label for a QR image: sidecar when readable, file name otherwise
pub fn read_label(image_path: &Path) -> ProductLabel {
    let sidecar = sidecar_path(image_path);
    if sidecar.exists() {
        match fs::read_to_string(&sidecar)
            .map_err(crate::Error::from)
            .and_then(|text| serde_json::from_str(&text).map_err(crate::Error::from))
        {
            Ok(label) => return label,
            Err(e) => warn!("Ignoring unreadable sidecar {}: {}", sidecar.display(), e),
        }
    }

    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    parse_file_label(&stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TaxClass;
    use tempfile::TempDir;

    fn widget() -> ProductRecord {
        ProductRecord {
            id: "10".to_string(),
            name: "Widget".to_string(),
            slug: "widget".to_string(),
            reference: "R1".to_string(),
            price: "121".to_string(),
            tax_class: TaxClass::Standard,
        }
    }

    #[test]
    fn test_clean_filename_strips_illegal() {
        assert_eq!(clean_filename(r#"a<b>c:d"e/f\g|h?i*j"#), "abcdefghij");
    }

    #[test]
    fn test_clean_filename_whitespace() {
        assert_eq!(clean_filename("  Cinta  doble\tfaz \n 3M "), "Cinta_doble_faz_3M");
    }

    #[test]
    fn test_clean_filename_length() {
        let long = "palabra ".repeat(40);
        let cleaned = clean_filename(&long);
        assert_eq!(cleaned.chars().count(), MAX_NAME_CHARS);
        assert!(!cleaned.chars().any(char::is_whitespace));
    }

    #[test]
    fn test_clean_filename_counts_characters() {
        let cleaned = clean_filename(&"ñ".repeat(150));
        assert_eq!(cleaned.chars().count(), MAX_NAME_CHARS);
    }

    #[test]
    fn test_qr_file_stem() {
        assert_eq!(qr_file_stem(&widget()), "Widget_R1_Precio $121");
    }

    #[test]
    fn test_format_price() {
        let price = |p| format_price(p, "AR $");
        assert_eq!(price(1234).as_deref(), Some("AR $1.240"));
        assert_eq!(price(121).as_deref(), Some("AR $130"));
        assert_eq!(price(130).as_deref(), Some("AR $130"));
        assert_eq!(price(0).as_deref(), Some("AR $0"));
        assert_eq!(price(999_995).as_deref(), Some("AR $1.000.000"));
    }

    #[test]
    fn test_format_price_twenty_digits() {
        assert_eq!(format_price(u64::MAX, "AR $"), None);
        assert_eq!(
            format_price(18_446_744_073_709_551_610, "AR $").as_deref(),
            Some("AR $18.446.744.073.709.551.610")
        );
    }

    #[test]
    fn test_parse_file_label_price_out_of_range() {
        let label = parse_file_label("Widget_R1_Precio $18446744073709551615");
        assert_eq!(label.price, Some(u64::MAX));

        let label = parse_file_label("Widget_R1_Precio $123456789012345678901234");
        assert_eq!(label.name, "Widget");
        assert_eq!(label.price, None);
    }

    #[test]
    fn test_parse_file_label() {
        let label = parse_file_label("Cinta_doble_faz_R-55_Precio $4500");
        assert_eq!(label.name, "Cinta doble faz");
        assert_eq!(label.reference, "R-55");
        assert_eq!(label.price, Some(4500));
    }

    #[test]
    fn test_parse_file_label_keeps_hyphens() {
        let label = parse_file_label("Cinta_doble-faz_R1_Precio $10");
        assert_eq!(label.name, "Cinta doble-faz");
    }

    #[test]
    fn test_parse_file_label_empty_reference() {
        let label = parse_file_label("Widget__Precio $121");
        assert_eq!(label.name, "Widget");
        assert_eq!(label.reference, "");
        assert_eq!(label.price, Some(121));
    }

    #[test]
    fn test_parse_file_label_no_match() {
        let label = parse_file_label("foto_de_producto");
        assert_eq!(label.name, "foto de producto");
        assert_eq!(label.reference, "");
        assert_eq!(label.price, None);
    }

    #[test]
    fn test_stem_round_trip() {
        let label = parse_file_label(&qr_file_stem(&widget()));
        assert_eq!(label.name, "Widget");
        assert_eq!(label.reference, "R1");
        assert_eq!(label.price, Some(121));
    }

    #[test]
    fn test_sidecar_preferred_over_file_name() {
        let temp_dir = TempDir::new().unwrap();
        let image = temp_dir.path().join("Widget_R1_Precio $121.png");

        let mut label = ProductLabel::from_record(&widget(), "https://shop/w", "https://t/x");
        label.name = "Widget 2000 (edición limitada)".to_string();
        write_sidecar(&image, &label).unwrap();

        let read = read_label(&image);
        assert_eq!(read.name, "Widget 2000 (edición limitada)");
        assert_eq!(read.id.as_deref(), Some("10"));
    }

    #[test]
    fn test_bad_sidecar_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        let image = temp_dir.path().join("Widget_R1_Precio $121.png");
        fs::write(sidecar_path(&image), "{not json").unwrap();

        let read = read_label(&image);
        assert_eq!(read.name, "Widget");
        assert_eq!(read.price, Some(121));
    }
}
