//! Single-page card sheets using lopdf
//!
//! Layout is computed in pixels with a top-left origin. Here every
//! coordinate is scaled to points (`72 / dpi`) and flipped to the PDF
//! bottom-left origin.

use std::path::Path;
use image::GrayImage;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use crate::cards::{CardLayout, TextRun};
use crate::config::{parse_color, LayoutConfig, Rgb};
use crate::error::Result;
use crate::pdf::font::{encode_win_ansi, CardFont};

/// A card ready to be drawn at a page position
#[derive(Debug, Clone)]
pub struct PlacedCard {
    /// Top-left corner in page pixels
    pub x: u32,
    pub y: u32,
    pub layout: CardLayout,
    pub qr: GrayImage,
}

/// Pixel to point conversion for one page
struct Canvas {
    scale: f32,
    height_pt: f32,
}

impl Canvas {
    fn x(&self, px: f32) -> f32 {
        px * self.scale
    }

    /// Flip a top-origin pixel y to a bottom-origin point y
    fn y(&self, px: f32) -> f32 {
        self.height_pt - px * self.scale
    }

    fn len(&self, px: f32) -> f32 {
        px * self.scale
    }
}

/// Render cards onto one page and save it as a single-page PDF
pub fn render_page(
    output: &Path,
    cards: &[PlacedCard],
    font: &CardFont,
    style: &LayoutConfig,
) -> Result<()> {
    let page = style.page();
    let width_pt = page.width.pt() as f32;
    let height_pt = page.height.pt() as f32;
    let canvas = Canvas {
        scale: 72.0 / style.dpi as f32,
        height_pt,
    };

    let page_color = parse_color(&style.page_color)?;
    let card_color = parse_color(&style.card_color)?;
    let text_color = parse_color(&style.text_color)?;

    let mut doc = Document::with_version("1.5");
    let font_id = font.embed(&mut doc)?;

    let mut content = String::new();
    content.push_str(&fill_color(page_color));
    content.push_str(&format!("0 0 {:.2} {:.2} re f\n", width_pt, height_pt));

    let mut xobjects = Dictionary::new();
    for (i, card) in cards.iter().enumerate() {
        let name = format!("Qr{}", i + 1);
        let image_id = add_gray_image(&mut doc, &card.qr);
        xobjects.set(name.clone(), Object::Reference(image_id));

        let left = card.x as f32;
        let top = card.y as f32;

        // Card background
        content.push_str(&fill_color(card_color));
        content.push_str(&format!(
            "{:.2} {:.2} {:.2} {:.2} re f\n",
            canvas.x(left),
            canvas.y(top + style.card_height as f32),
            canvas.len(style.card_width as f32),
            canvas.len(style.card_height as f32),
        ));

        // QR image, scaled through the CTM
        let qr = &card.layout.qr;
        content.push_str(&format!(
            "q\n{:.2} 0 0 {:.2} {:.2} {:.2} cm\n/{} Do\nQ\n",
            canvas.len(qr.width),
            canvas.len(qr.height),
            canvas.x(left + qr.x),
            canvas.y(top + qr.y + qr.height),
            name,
        ));

        content.push_str(&fill_color(text_color));
        let runs = std::iter::once(&card.layout.cta)
            .chain(card.layout.caption.iter())
            .chain(card.layout.price.iter());
        for run in runs {
            content.push_str(&text_run(&canvas, font, run, left, top));
        }
    }

    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

    let mut fonts = Dictionary::new();
    fonts.set("F1", Object::Reference(font_id));
    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(fonts));
    resources.set("XObject", Object::Dictionary(xobjects));

    let pages_id = doc.new_object_id();

    // Resources and MediaBox live on the page itself so they survive merging
    let mut page_dict = Dictionary::new();
    page_dict.set("Type", Object::Name(b"Page".to_vec()));
    page_dict.set("Parent", Object::Reference(pages_id));
    page_dict.set(
        "MediaBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(width_pt),
            Object::Real(height_pt),
        ]),
    );
    page_dict.set("Resources", Object::Dictionary(resources));
    page_dict.set("Contents", Object::Reference(content_id));
    let page_id = doc.add_object(Object::Dictionary(page_dict));

    let mut pages_object = Dictionary::new();
    pages_object.set("Type", Object::Name(b"Pages".to_vec()));
    pages_object.set("Count", Object::Integer(1));
    pages_object.set("Kids", Object::Array(vec![Object::Reference(page_id)]));
    doc.objects.insert(pages_id, Object::Dictionary(pages_object));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(Object::Dictionary(catalog));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    doc.compress();
    doc.save(output)?;

    Ok(())
}

/// `rg` operator for a fill color
fn fill_color((r, g, b): Rgb) -> String {
    format!("{:.3} {:.3} {:.3} rg\n", r, g, b)
}

/// Text object for one run, positioned relative to its card
fn text_run(canvas: &Canvas, font: &CardFont, run: &TextRun, left: f32, top: f32) -> String {
    if run.text.is_empty() {
        return String::new();
    }

    let baseline = top + run.top + font.ascent(run.size);
    let hex: String = encode_win_ansi(&run.text)
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect();

    format!(
        "BT\n/F1 {:.2} Tf\n1 0 0 1 {:.2} {:.2} Tm\n<{}> Tj\nET\n",
        canvas.len(run.size),
        canvas.x(left + run.x),
        canvas.y(baseline),
        hex,
    )
}

/// Add an 8-bit grayscale image XObject
fn add_gray_image(doc: &mut Document, image: &GrayImage) -> ObjectId {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(image.width() as i64));
    dict.set("Height", Object::Integer(image.height() as i64));
    dict.set("ColorSpace", Object::Name(b"DeviceGray".to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));

    doc.add_object(Stream::new(dict, image.as_raw().clone()))
}
