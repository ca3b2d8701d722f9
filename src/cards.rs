//! Card composition and the card document pipeline
//!
//! A card is a fixed-size rectangle holding one product's QR code on the
//! right, a call-to-action under the code, the product name centered in the
//! remaining space and, when known, the price in a large font near the top.
//! [`generate_cards`] scans the QR directory, paginates the cards, renders one
//! PDF per page and merges the pages into a single document.

use std::fs;
use std::path::{Path, PathBuf};
use glob::{glob, Pattern};
use textwrap::{wrap, Options, WrapAlgorithm};
use tracing::{debug, info, warn};
use crate::config::{Config, LayoutConfig};
use crate::error::{Error, Result};
use crate::layout::{paginate, PagePlan};
use crate::naming::{format_price, read_label, ProductLabel};
use crate::pdf::font::CardFont;
use crate::pdf::page::{render_page, PlacedCard};
use crate::pdf::{merge_pdfs, MergeOptions};

/// Per-page file name prefix inside the output directory
pub const PAGE_FILE_PREFIX: &str = "tarjetas_qr_pagina_";

/// Merged document name inside the output directory
pub const MERGED_FILE_NAME: &str = "tarjetas_productos_completo.pdf";

/// Title stored in the merged document's Info dictionary
pub const DOCUMENT_TITLE: &str = "Tarjetas de productos";

/// Extra gap between caption lines, in pixels
const LINE_SPACING: f32 = 4.0;

/// CTA top sits this far above the bottom of the QR image
const CTA_RISE: f32 = 25.0;

/// Placeholder appended to shortened names
const ELLIPSIS: &str = "...";

/// Rectangle in card pixels, origin at the card's top-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One line of text; `top` is the top of the line box
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub size: f32,
    pub x: f32,
    pub top: f32,
}

/// Positioned content of one card
#[derive(Debug, Clone, PartialEq)]
pub struct CardLayout {
    pub qr: Rect,
    pub cta: TextRun,
    pub caption: Vec<TextRun>,
    pub price: Option<TextRun>,
}

/// Shorten to at most `width` characters on a word boundary
///
/// Whitespace is collapsed first. When words must be dropped the ellipsis is
/// appended and counted against `width`.
pub fn shorten(text: &str, width: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let collapsed = words.join(" ");
    if collapsed.chars().count() <= width {
        return collapsed;
    }

    let budget = width.saturating_sub(ELLIPSIS.chars().count());
    let mut kept = String::new();
    for word in words {
        let extra = if kept.is_empty() { 0 } else { 1 };
        if kept.chars().count() + extra + word.chars().count() > budget {
            break;
        }
        if extra == 1 {
            kept.push(' ');
        }
        kept.push_str(word);
    }

    kept.push_str(ELLIPSIS);
    kept
}

/// Caption lines for a card: shortened name, reference, wrapped
pub fn caption_lines(label: &ProductLabel, style: &LayoutConfig) -> Vec<String> {
    let mut text = if label.name.chars().count() > style.max_name_chars {
        shorten(&label.name, style.max_name_chars)
    } else {
        label.name.clone()
    };

    if !label.reference.is_empty() {
        text.push_str(&format!(" (Ref: {})", label.reference));
    }

    let options = Options::new(style.wrap_width).wrap_algorithm(WrapAlgorithm::FirstFit);
    wrap(&text, options)
        .into_iter()
        .map(|line| line.into_owned())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Lay out one card
///
/// `qr_size` is the pixel size of the QR image; it is scaled to the
/// configured height keeping its aspect ratio.
pub fn compose_card(
    label: &ProductLabel,
    qr_size: (u32, u32),
    font: &CardFont,
    style: &LayoutConfig,
) -> CardLayout {
    let card_width = style.card_width as f32;
    let card_height = style.card_height as f32;
    let margin = style.margin as f32;

    let qr_height = style.qr_height() as f32;
    let qr_width = if qr_size.1 == 0 {
        qr_height
    } else {
        (qr_size.0 as f32 * qr_height / qr_size.1 as f32).floor()
    };
    let qr = Rect {
        x: card_width - qr_width - margin,
        y: ((card_height - qr_height) / 2.0).floor(),
        width: qr_width,
        height: qr_height,
    };

    let cta_width = font.text_width(&style.cta_text, style.cta_font_size);
    let cta = TextRun {
        text: style.cta_text.clone(),
        size: style.cta_font_size,
        x: qr.x + ((qr.width - cta_width) / 2.0).floor(),
        top: qr.y + qr.height - CTA_RISE,
    };

    // Caption block, centered in the area left of the QR code
    let size = style.font_size;
    let lines = caption_lines(label, style);
    let text_max_width = card_width - qr_width - margin * 3.0;
    let area_x = ((card_width - qr_width - text_max_width) / 2.0).floor() + 15.0;
    let pitch = font.ascent(size) + font.descent(size) + LINE_SPACING;

    let widths: Vec<f32> = lines.iter().map(|l| font.text_width(l, size)).collect();
    let block_width = widths.iter().cloned().fold(0.0, f32::max);
    let block_height = (lines.len() as f32 * pitch - LINE_SPACING).max(0.0);
    let block_x = area_x + ((text_max_width - block_width) / 2.0).floor();
    let block_y = ((card_height - block_height) / 2.0).floor() + 20.0;

    let caption = lines
        .into_iter()
        .zip(widths)
        .enumerate()
        .map(|(i, (text, width))| TextRun {
            text,
            size,
            x: block_x + (block_width - width) / 2.0,
            top: block_y + i as f32 * pitch,
        })
        .collect();

    let price = label.price.and_then(|value| {
        let Some(text) = format_price(value, &style.currency_prefix) else {
            warn!("Price {} of \"{}\" is too large to round, showing no price", value, label.name);
            return None;
        };
        let width = font.text_width(&text, style.price_font_size);
        Some(TextRun {
            x: ((card_width - width) / 2.0).floor() - 130.0,
            top: margin + 30.0,
            size: style.price_font_size,
            text,
        })
    });

    CardLayout { qr, cta, caption, price }
}

/// A QR image and the label shown with it
#[derive(Debug, Clone, PartialEq)]
pub struct CardEntry {
    pub image_path: PathBuf,
    pub label: ProductLabel,
}

/// All QR images in `qr_dir`, sorted by file name
pub fn collect_cards(qr_dir: &Path) -> Result<Vec<CardEntry>> {
    if !qr_dir.is_dir() {
        return Err(Error::DirectoryNotFound(qr_dir.to_path_buf()));
    }

    let pattern = format!("{}/*.png", Pattern::escape(&qr_dir.to_string_lossy()));
    let mut paths = Vec::new();
    for entry in glob(&pattern).map_err(|e| Error::General(e.to_string()))? {
        match entry {
            Ok(path) => paths.push(path),
            Err(e) => warn!("Skipping unreadable entry: {}", e),
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    Ok(paths
        .into_iter()
        .map(|image_path| {
            let label = read_label(&image_path);
            CardEntry { image_path, label }
        })
        .collect())
}

/// Options for building the card document
#[derive(Debug, Clone)]
pub struct CardsOptions {
    pub qr_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Merged document path; defaults to `output_dir/tarjetas_productos_completo.pdf`
    pub output_path: Option<PathBuf>,
    pub font_path: Option<PathBuf>,
    pub layout: LayoutConfig,
}

impl CardsOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            qr_dir: config.paths.qr_dir.clone(),
            output_dir: config.paths.output_dir.clone(),
            output_path: None,
            font_path: config.paths.font_path.clone(),
            layout: config.layout.clone(),
        }
    }
}

/// Result of a card document run
#[derive(Debug, Clone)]
pub struct CardsOutput {
    /// Cards in placement order
    pub cards: Vec<CardEntry>,
    pub plans: Vec<PagePlan>,
    /// Single-page PDFs in page order
    pub page_files: Vec<PathBuf>,
    /// `None` when there were no cards
    pub merged: Option<PathBuf>,
}

/// Build the card document from the QR directory
///
/// A missing QR directory or font file aborts before anything is written.
/// An empty directory produces no pages and no merged document.
pub fn generate_cards(options: &CardsOptions) -> Result<CardsOutput> {
    let style = &options.layout;
    style.validate()?;

    if !options.qr_dir.is_dir() {
        return Err(Error::DirectoryNotFound(options.qr_dir.clone()));
    }
    let font = CardFont::load(options.font_path.as_deref())?;
    fs::create_dir_all(&options.output_dir)?;

    let cards = collect_cards(&options.qr_dir)?;
    let plans = paginate(cards.len(), &style.grid());
    debug!("{} cards on {} pages", cards.len(), plans.len());

    let mut page_files = Vec::with_capacity(plans.len());
    for plan in &plans {
        let mut placed = Vec::with_capacity(plan.slots.len());
        for slot in &plan.slots {
            let entry = &cards[slot.index];
            let qr = image::open(&entry.image_path)?.into_luma8();
            let layout = compose_card(&entry.label, qr.dimensions(), &font, style);
            placed.push(PlacedCard {
                x: slot.x,
                y: slot.y,
                layout,
                qr,
            });
        }

        let path = options
            .output_dir
            .join(format!("{}{}.pdf", PAGE_FILE_PREFIX, plan.number));
        render_page(&path, &placed, &font, style)?;
        info!("Page {} written to {}", plan.number, path.display());
        page_files.push(path);
    }

    if page_files.is_empty() {
        info!("No QR images in {}, nothing to merge", options.qr_dir.display());
        return Ok(CardsOutput {
            cards,
            plans,
            page_files,
            merged: None,
        });
    }

    let merged_path = options
        .output_path
        .clone()
        .unwrap_or_else(|| options.output_dir.join(MERGED_FILE_NAME));
    merge_pdfs(&MergeOptions {
        input_paths: page_files.clone(),
        output_path: merged_path.clone(),
        title: Some(DOCUMENT_TITLE.to_string()),
    })?;
    info!("Merged {} pages into {}", page_files.len(), merged_path.display());

    Ok(CardsOutput {
        cards,
        plans,
        page_files,
        merged: Some(merged_path),
    })
}
