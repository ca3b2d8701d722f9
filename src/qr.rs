//! QR code emission
//!
//! For every product the storefront URL is shortened, encoded as a QR code
//! and saved as `{stem}.png` with a `{stem}.json` sidecar. An existing image
//! with the same name is left untouched, which makes re-runs idempotent per
//! file name.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use image::{GrayImage, ImageFormat, Luma};
use qrcode::QrCode;
use tracing::{debug, info, warn};
use crate::catalog::{ProductRecord, ProductSource};
use crate::config::{Config, ShortenerConfig};
use crate::error::{Error, Result};
use crate::naming::{qr_file_stem, sidecar_path, write_sidecar, ProductLabel};

/// Pixels per QR module
const MODULE_PIXELS: u32 = 10;

/// Canonical storefront URL of a product
pub fn product_url(storefront: &str, record: &ProductRecord) -> String {
    format!(
        "{}/{}/{}-{}.html",
        storefront.trim_end_matches('/'),
        record.slug,
        record.id,
        record.slug
    )
}

/// A URL shortening service
pub trait UrlShortener {
    fn shorten(&self, url: &str) -> Result<String>;
}

/// TinyURL-style service: the target is appended to the endpoint and the
/// response body is the short URL
pub struct TinyUrl {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl TinyUrl {
    pub fn new(config: &ShortenerConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.url.clone(),
        })
    }
}

impl UrlShortener for TinyUrl {
    fn shorten(&self, url: &str) -> Result<String> {
        let body = self
            .client
            .get(format!("{}{}", self.endpoint, url))
            .send()?
            .error_for_status()?
            .text()?;

        let short = body.trim();
        if short.is_empty() {
            return Err(Error::General(format!("Empty short URL for {}", url)));
        }
        Ok(short.to_string())
    }
}

/// Encodes text as a QR image
pub trait QrEncoder {
    fn encode(&self, text: &str) -> Result<GrayImage>;
}

/// QR encoder backed by the `qrcode` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct QrCodeEncoder;

impl QrEncoder for QrCodeEncoder {
    fn encode(&self, text: &str) -> Result<GrayImage> {
        let code = QrCode::new(text.as_bytes()).map_err(|e| Error::Qr(e.to_string()))?;
        Ok(code
            .render::<Luma<u8>>()
            .module_dimensions(MODULE_PIXELS, MODULE_PIXELS)
            .build())
    }
}

/// What happened to one product ID
#[derive(Debug, Clone, PartialEq)]
pub enum ItemStatus {
    /// A new QR image was written
    Generated(PathBuf),
    /// An image with the same name already existed; nothing was written
    AlreadyExists(PathBuf),
    /// Fetching or emitting failed; the batch went on
    Skipped { reason: String },
}

/// Outcome for one product ID
#[derive(Debug, Clone, PartialEq)]
pub struct ItemReport {
    pub id: String,
    pub status: ItemStatus,
}

/// Outcomes of a QR generation run, in input order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub items: Vec<ItemReport>,
}

impl BatchReport {
    pub fn generated(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Generated(_)))
    }

    pub fn existing(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::AlreadyExists(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Skipped { .. }))
    }

    fn count(&self, pred: impl Fn(&ItemStatus) -> bool) -> usize {
        self.items.iter().filter(|item| pred(&item.status)).count()
    }
}

/// Writes QR images for product records
pub struct QrEmitter<'a> {
    pub output_dir: PathBuf,
    pub storefront_url: String,
    pub shortener: &'a dyn UrlShortener,
    pub encoder: &'a dyn QrEncoder,
}

impl<'a> QrEmitter<'a> {
    pub fn new(
        config: &Config,
        shortener: &'a dyn UrlShortener,
        encoder: &'a dyn QrEncoder,
    ) -> Self {
        Self {
            output_dir: config.paths.qr_dir.clone(),
            storefront_url: config.catalog.storefront_url.clone(),
            shortener,
            encoder,
        }
    }

    /// Image path a record would be written to
    pub fn image_path(&self, record: &ProductRecord) -> PathBuf {
        self.output_dir.join(format!("{}.png", qr_file_stem(record)))
    }

    /// Emit the QR image for one record
    ///
    /// The existence check runs first, so an already emitted product costs
    /// no network call.
    pub fn emit(&self, record: &ProductRecord) -> Result<ItemStatus> {
        fs::create_dir_all(&self.output_dir)?;

        let path = self.image_path(record);
        if path.exists() {
            info!("{} already exists, skipping", path.display());
            return Ok(ItemStatus::AlreadyExists(path));
        }

        let url = product_url(&self.storefront_url, record);
        let short_url = self.shortener.shorten(&url)?;
        debug!("{} -> {}", url, short_url);

        let image = self.encoder.encode(&short_url)?;

        // The image is written last; its presence marks the product as done
        write_sidecar(&path, &ProductLabel::from_record(record, &url, &short_url))?;
        if let Err(e) = save_png(&image, &path) {
            let _ = fs::remove_file(sidecar_path(&path));
            return Err(e);
        }

        info!("QR code written: {}", path.display());
        Ok(ItemStatus::Generated(path))
    }
}

fn save_png(image: &GrayImage, path: &Path) -> Result<()> {
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Fetch and emit every ID in order
///
/// An empty list is rejected without touching anything. Failures for one
/// ID are logged and recorded; the remaining IDs are still processed.
pub fn generate_qr_codes(
    ids: &[String],
    source: &dyn ProductSource,
    emitter: &QrEmitter<'_>,
) -> Result<BatchReport> {
    if ids.is_empty() {
        return Err(Error::NoProductIds);
    }

    let mut report = BatchReport::default();
    for id in ids {
        let status = match source.fetch(id).and_then(|record| emitter.emit(&record)) {
            Ok(status) => status,
            Err(e) => {
                warn!("Skipping product {}: {}", id, e);
                ItemStatus::Skipped {
                    reason: e.to_string(),
                }
            }
        };
        report.items.push(ItemReport {
            id: id.clone(),
            status,
        });
    }

    Ok(report)
}
