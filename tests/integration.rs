//! Integration tests for the QR cards library

use image::{GrayImage, Luma};
use qr_cards::cards::{generate_cards, CardsOptions, MERGED_FILE_NAME, DOCUMENT_TITLE};
use qr_cards::catalog::{ProductRecord, ProductSource, TaxClass};
use qr_cards::config::{Config, LayoutConfig};
use qr_cards::ingest::{load_product_ids, read_product_ids, save_product_ids};
use qr_cards::naming::read_label;
use qr_cards::pdf::{count_pages, extract_metadata, merge_pdfs, MergeOptions};
use qr_cards::qr::{generate_qr_codes, ItemStatus, QrCodeEncoder, QrEmitter, UrlShortener};
use qr_cards::{Error, Result};
use std::cell::Cell;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Catalog stand-in holding a single product
struct FakeCatalog;

impl ProductSource for FakeCatalog {
    fn fetch(&self, id: &str) -> Result<ProductRecord> {
        match id {
            "10" => Ok(ProductRecord {
                id: "10".to_string(),
                name: "Widget".to_string(),
                slug: "widget".to_string(),
                reference: "R1".to_string(),
                price: "121".to_string(),
                tax_class: TaxClass::Standard,
            }),
            other => Err(Error::MissingField {
                id: other.to_string(),
                path: ".//name/language",
            }),
        }
    }
}

/// Shortener stand-in counting its calls
#[derive(Default)]
struct FakeShortener {
    calls: Cell<usize>,
}

impl UrlShortener for FakeShortener {
    fn shorten(&self, _url: &str) -> Result<String> {
        self.calls.set(self.calls.get() + 1);
        Ok(format!("https://tinyurl.com/test{}", self.calls.get()))
    }
}

fn config_in(dir: &Path) -> Config {
    let mut config = Config::default();
    config.paths.ids_file = dir.join("data").join("products.json");
    config.paths.qr_dir = dir.join("qrcodes");
    config.paths.output_dir = dir.join("output");
    config
}

fn cards_options(qr_dir: &Path, output_dir: &Path) -> CardsOptions {
    CardsOptions {
        qr_dir: qr_dir.to_path_buf(),
        output_dir: output_dir.to_path_buf(),
        output_path: None,
        font_path: None,
        layout: LayoutConfig::default(),
    }
}

/// Text as it appears in a content stream: uppercase WinAnsi hex
fn pdf_hex(text: &str) -> String {
    format!("<{}>", text.bytes().map(|b| format!("{:02X}", b)).collect::<String>())
}

/// Decoded content of every page, in page order
fn page_contents(path: &Path) -> Vec<String> {
    let doc = lopdf::Document::load(path).expect("Failed to load PDF");
    doc.get_pages()
        .values()
        .map(|&id| {
            let content = doc.get_page_content(id).expect("Failed to read page content");
            String::from_utf8_lossy(&content).into_owned()
        })
        .collect()
}

fn write_png(dir: &Path, stem: &str) -> PathBuf {
    let path = dir.join(format!("{}.png", stem));
    GrayImage::from_pixel(29, 29, Luma([255u8]))
        .save(&path)
        .expect("Failed to write PNG");
    path
}

#[test]
fn test_upload_generate_and_build_cards() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config = config_in(temp_dir.path());

    // Upload
    let upload = "Product ID;Name\n10;Widget\n";
    let ids = read_product_ids(upload.as_bytes(), "export.csv").expect("Failed to read upload");
    save_product_ids(&config.paths.ids_file, &ids).expect("Failed to store IDs");
    let ids = load_product_ids(&config.paths.ids_file).expect("Failed to load IDs");
    assert_eq!(ids, vec!["10"]);

    // QR generation
    let shortener = FakeShortener::default();
    let encoder = QrCodeEncoder;
    let emitter = QrEmitter::new(&config, &shortener, &encoder);
    let report = generate_qr_codes(&ids, &FakeCatalog, &emitter).expect("Failed to generate");

    let image_path = config.paths.qr_dir.join("Widget_R1_Precio $121.png");
    assert_eq!(report.items[0].status, ItemStatus::Generated(image_path.clone()));
    assert!(image_path.exists(), "QR image was not created");

    let label = read_label(&image_path);
    assert_eq!(label.name, "Widget");
    assert_eq!(label.reference, "R1");
    assert_eq!(label.price, Some(121));
    assert_eq!(label.short_url.as_deref(), Some("https://tinyurl.com/test1"));

    // Card document
    let output = generate_cards(&CardsOptions::from_config(&config)).expect("Failed to build cards");
    assert_eq!(output.cards.len(), 1);
    assert_eq!(output.page_files.len(), 1);

    let merged = output.merged.expect("Merged document missing");
    assert_eq!(merged, config.paths.output_dir.join(MERGED_FILE_NAME));
    assert_eq!(count_pages(&merged).expect("Failed to count pages"), 1);

    let metadata = extract_metadata(&merged).expect("Failed to read metadata");
    assert_eq!(metadata.title.as_deref(), Some(DOCUMENT_TITLE));
    assert!(metadata.producer.is_some());

    // Rounded, taxed price on the card
    let pages = page_contents(&merged);
    assert!(pages[0].contains(&pdf_hex("AR $130")), "Price missing from page 1");
    assert!(pages[0].contains(&pdf_hex("Widget (Ref: R1)")));
    assert_eq!(pages[0].matches(" Do").count(), 1);
}

#[test]
fn test_rerun_does_not_overwrite() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config = config_in(temp_dir.path());
    let ids = vec!["10".to_string()];

    let shortener = FakeShortener::default();
    let encoder = QrCodeEncoder;
    let emitter = QrEmitter::new(&config, &shortener, &encoder);

    generate_qr_codes(&ids, &FakeCatalog, &emitter).expect("First run failed");
    let image_path = config.paths.qr_dir.join("Widget_R1_Precio $121.png");
    let first_write = std::fs::metadata(&image_path).unwrap().modified().unwrap();

    let report = generate_qr_codes(&ids, &FakeCatalog, &emitter).expect("Second run failed");
    assert_eq!(report.existing(), 1);
    assert_eq!(report.generated(), 0);

    // No network call for a product that already has an image
    assert_eq!(shortener.calls.get(), 1);
    let second_write = std::fs::metadata(&image_path).unwrap().modified().unwrap();
    assert_eq!(first_write, second_write);
}

#[test]
fn test_failed_product_does_not_stop_batch() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config = config_in(temp_dir.path());
    let ids = vec!["999".to_string(), "10".to_string()];

    let shortener = FakeShortener::default();
    let encoder = QrCodeEncoder;
    let emitter = QrEmitter::new(&config, &shortener, &encoder);

    let report = generate_qr_codes(&ids, &FakeCatalog, &emitter).expect("Batch failed");
    assert_eq!(report.items.len(), 2);
    assert_eq!(report.items[0].id, "999");
    assert!(matches!(report.items[0].status, ItemStatus::Skipped { .. }));
    assert!(matches!(report.items[1].status, ItemStatus::Generated(_)));
}

#[test]
fn test_generate_with_no_ids() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config = config_in(temp_dir.path());

    let shortener = FakeShortener::default();
    let encoder = QrCodeEncoder;
    let emitter = QrEmitter::new(&config, &shortener, &encoder);

    let result = generate_qr_codes(&[], &FakeCatalog, &emitter);
    assert!(matches!(result, Err(Error::NoProductIds)));
    assert!(!config.paths.qr_dir.exists(), "Nothing should be written");
}

#[test]
fn test_cards_paginate_in_file_name_order() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let qr_dir = temp_dir.path().join("qrcodes");
    let output_dir = temp_dir.path().join("output");
    std::fs::create_dir_all(&qr_dir).unwrap();

    // 31 cards, 30 per page
    for i in (1..=31).rev() {
        write_png(&qr_dir, &format!("Producto_{:02}_R{}_Precio ${}", i, i, i * 100));
    }

    let output = generate_cards(&cards_options(&qr_dir, &output_dir)).expect("Failed to build cards");
    assert_eq!(output.cards.len(), 31);
    assert_eq!(output.plans.len(), 2);
    assert_eq!(output.plans[0].slots.len(), 30);
    assert_eq!(output.plans[1].slots.len(), 1);
    assert_eq!(output.cards[0].label.name, "Producto 01");
    assert_eq!(output.cards[30].label.name, "Producto 31");

    assert_eq!(
        output.page_files,
        vec![
            output_dir.join("tarjetas_qr_pagina_1.pdf"),
            output_dir.join("tarjetas_qr_pagina_2.pdf"),
        ]
    );
    for page in &output.page_files {
        assert_eq!(count_pages(page).expect("Failed to count pages"), 1);
    }

    let merged = output.merged.expect("Merged document missing");
    assert_eq!(count_pages(&merged).expect("Failed to count pages"), 2);

    // Every card drawn exactly once, in file name order
    let pages = page_contents(&merged);
    let drawn: usize = pages.iter().map(|p| p.matches(" Do").count()).sum();
    assert_eq!(drawn, 31);
    assert_eq!(pages[0].matches(" Do").count(), 30);
    assert!(pages[0].contains(&pdf_hex("Producto 01 (Ref: R1)")));
    assert!(pages[1].contains(&pdf_hex("Producto 31 (Ref: R31)")));
    assert!(!pages[0].contains(&pdf_hex("Producto 31 (Ref: R31)")));
}

#[test]
fn test_cards_custom_output_path() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let qr_dir = temp_dir.path().join("qrcodes");
    std::fs::create_dir_all(&qr_dir).unwrap();
    write_png(&qr_dir, "Widget_R1_Precio $121");

    let mut options = cards_options(&qr_dir, &temp_dir.path().join("output"));
    options.output_path = Some(temp_dir.path().join("cards.pdf"));

    let output = generate_cards(&options).expect("Failed to build cards");
    assert_eq!(output.merged, Some(temp_dir.path().join("cards.pdf")));
    assert!(temp_dir.path().join("cards.pdf").exists());
}

#[test]
fn test_cards_empty_directory() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let qr_dir = temp_dir.path().join("qrcodes");
    let output_dir = temp_dir.path().join("output");
    std::fs::create_dir_all(&qr_dir).unwrap();

    let output = generate_cards(&cards_options(&qr_dir, &output_dir)).expect("Empty run failed");
    assert!(output.cards.is_empty());
    assert!(output.page_files.is_empty());
    assert_eq!(output.merged, None);
    assert!(!output_dir.join(MERGED_FILE_NAME).exists());
}

#[test]
fn test_cards_missing_qr_directory() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let options = cards_options(&temp_dir.path().join("missing"), &temp_dir.path().join("output"));

    let result = generate_cards(&options);
    assert!(matches!(result, Err(Error::DirectoryNotFound(_))));
}

#[test]
fn test_cards_missing_font() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let qr_dir = temp_dir.path().join("qrcodes");
    std::fs::create_dir_all(&qr_dir).unwrap();

    let mut options = cards_options(&qr_dir, &temp_dir.path().join("output"));
    options.font_path = Some(temp_dir.path().join("missing.ttf"));

    let result = generate_cards(&options);
    assert!(matches!(result, Err(Error::FontNotFound(_))));
}

#[test]
fn test_merge_empty_input_list() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let output_path = temp_dir.path().join("empty.pdf");

    let options = MergeOptions {
        input_paths: vec![],
        output_path: output_path.clone(),
        title: None,
    };

    let result = merge_pdfs(&options);
    assert!(result.is_err(), "Should fail with empty input list");

    if let Err(e) = result {
        assert!(
            e.to_string().contains("No input files"),
            "Error message should mention no input files"
        );
    }
}

#[test]
fn test_merge_nonexistent_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let output_path = temp_dir.path().join("output.pdf");

    let options = MergeOptions {
        input_paths: vec![PathBuf::from("nonexistent.pdf")],
        output_path: output_path.clone(),
        title: None,
    };

    let result = merge_pdfs(&options);
    assert!(result.is_err(), "Should fail with nonexistent file");

    if let Err(e) = result {
        assert!(
            e.to_string().contains("not found") || e.to_string().contains("nonexistent"),
            "Error should mention file not found: {}",
            e
        );
    }
}
