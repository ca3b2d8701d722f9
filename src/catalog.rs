//! Product catalog access
//!
//! The catalog webservice answers `GET {api_url}{id}` with an XML product
//! document. Only five elements are read; the first match in document order
//! wins, so nested associations never shadow the product's own fields.

use std::fmt;
use std::time::Duration;
use roxmltree::Document;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::config::CatalogConfig;
use crate::error::{Error, Result};

/// Tax rules group of a product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaxClass {
    /// Group "1": 21% VAT
    Standard,
    /// Group "2": 10.5% VAT
    Reduced,
    /// Any other group; price is used as-is
    Other(String),
}

impl TaxClass {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "1" => TaxClass::Standard,
            "2" => TaxClass::Reduced,
            other => TaxClass::Other(other.to_string()),
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            TaxClass::Standard => 1.21,
            TaxClass::Reduced => 1.105,
            TaxClass::Other(_) => 1.0,
        }
    }
}

impl fmt::Display for TaxClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaxClass::Standard => write!(f, "1"),
            TaxClass::Reduced => write!(f, "2"),
            TaxClass::Other(code) => write!(f, "{}", code),
        }
    }
}

/// Flat product data needed to emit a QR code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: String,
    pub name: String,
    /// `link_rewrite` slug used in storefront URLs
    pub slug: String,
    pub reference: String,
    /// Tax-adjusted price, truncated to whole units
    pub price: String,
    pub tax_class: TaxClass,
}

/// Apply the tax multiplier and truncate to an integer string
///
/// Unparseable prices become "0".
pub fn normalize_price(price: &str, tax_class: &str) -> String {
    match price.trim().parse::<f64>() {
        Ok(base) if base.is_finite() => {
            let adjusted = base * TaxClass::from_code(tax_class).multiplier();
            format!("{}", adjusted.trunc() as i64)
        }
        _ => "0".to_string(),
    }
}

/// Something that can look up products by ID
pub trait ProductSource {
    fn fetch(&self, id: &str) -> Result<ProductRecord>;
}

/// Blocking HTTP client for the catalog webservice
pub struct HttpCatalog {
    client: reqwest::blocking::Client,
    api_url: String,
    api_key: String,
}

impl HttpCatalog {
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            Error::InvalidConfig("catalog api_key is not set".to_string())
        })?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key,
        })
    }
}

impl ProductSource for HttpCatalog {
    fn fetch(&self, id: &str) -> Result<ProductRecord> {
        let url = format!("{}{}", self.api_url, id);
        debug!("Fetching product {} from {}", id, url);

        let body = self
            .client
            .get(&url)
            .basic_auth(&self.api_key, Some(""))
            .send()?
            .error_for_status()?
            .text()?;

        parse_product_xml(id, &body)
    }
}

/// Build a product record from a catalog XML document
pub fn parse_product_xml(id: &str, xml: &str) -> Result<ProductRecord> {
    let doc = Document::parse(xml)?;

    let name = find_text(&doc, id, ".//name/language", &["name", "language"])?;
    let slug = find_text(&doc, id, ".//link_rewrite/language", &["link_rewrite", "language"])?;
    let reference = find_text(&doc, id, ".//reference", &["reference"])?;
    let price = find_text(&doc, id, ".//price", &["price"])?;
    let tax_code = find_text(&doc, id, ".//id_tax_rules_group", &["id_tax_rules_group"])?;

    Ok(ProductRecord {
        id: id.to_string(),
        name,
        slug,
        reference,
        price: normalize_price(&price, &tax_code),
        tax_class: TaxClass::from_code(&tax_code),
    })
}

/// Text of the first element matching a descendant-then-child path
fn find_text(doc: &Document, id: &str, path: &'static str, steps: &[&str]) -> Result<String> {
    let (first, rest) = steps.split_first().ok_or_else(|| Error::MissingField {
        id: id.to_string(),
        path,
    })?;

    let node = doc
        .descendants()
        .filter(|n| n.has_tag_name(*first))
        .find_map(|start| {
            rest.iter().try_fold(start, |node, step| {
                node.children().find(|c| c.has_tag_name(*step))
            })
        })
        .ok_or_else(|| Error::MissingField {
            id: id.to_string(),
            path,
        })?;

    Ok(node.text().unwrap_or("").trim().to_string())
}
