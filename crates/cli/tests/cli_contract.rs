use assert_cmd::cargo::cargo_bin_cmd;
use lopdf::{dictionary, Object, StringFormat};
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// A document with one page per MediaBox.
fn build_doc(media_boxes: &[[f32; 4]]) -> lopdf::Document {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = media_boxes
        .iter()
        .map(|b| {
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => b.iter().map(|v| Object::Real(*v)).collect::<Vec<_>>(),
            });
            Object::Reference(page_id)
        })
        .collect();
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

fn save_pdf(dir: &Path, name: &str, mut doc: lopdf::Document) -> PathBuf {
    let path = dir.join(name);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture should serialize");
    std::fs::write(&path, bytes).expect("fixture should be written");
    path
}

/// Write a PDF with one page per MediaBox into `dir`.
fn write_pdf(dir: &Path, name: &str, media_boxes: &[[f32; 4]]) -> PathBuf {
    save_pdf(dir, name, build_doc(media_boxes))
}

/// Write a PDF whose user password is not empty.
fn write_locked_pdf(dir: &Path, name: &str) -> PathBuf {
    let mut doc = build_doc(&small_pages(1));
    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 1,
        "R" => 2,
        "O" => Object::String(vec![0x11; 32], StringFormat::Hexadecimal),
        "U" => Object::String(vec![0xAA; 32], StringFormat::Hexadecimal),
        "P" => -4,
    });
    doc.trailer.set("Encrypt", encrypt_id);
    let file_id = Object::String(vec![0x42; 16], StringFormat::Hexadecimal);
    doc.trailer.set("ID", vec![file_id.clone(), file_id]);
    save_pdf(dir, name, doc)
}

fn small_pages(count: usize) -> Vec<[f32; 4]> {
    vec![[0.0, 0.0, 72.0, 72.0]; count]
}

fn json_stdout(assert: assert_cmd::assert::Assert) -> Value {
    let output = assert.get_output().stdout.clone();
    serde_json::from_slice(&output).expect("stdout should contain valid json")
}

#[test]
fn info_emits_stable_json_contract() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_pdf(temp.path(), "two.pdf", &[[0.0, 0.0, 144.0, 72.0], [0.0, 0.0, 72.0, 72.0]]);

    let value = json_stdout(cargo_bin_cmd!("pageview-cli").arg("info").arg(&pdf).assert().success());

    assert_eq!(value["page_count"], 2);
    assert_eq!(value["first_page_size_pt"]["width"], 144.0);
    assert_eq!(value["first_page_size_pt"]["height"], 72.0);
    assert_eq!(value["path"], pdf.display().to_string());
}

#[test]
fn info_rejects_missing_file() {
    cargo_bin_cmd!("pageview-cli")
        .arg("info")
        .arg("does-not-exist.pdf")
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn info_reports_locked_document() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_locked_pdf(temp.path(), "locked.pdf");

    cargo_bin_cmd!("pageview-cli")
        .arg("info")
        .arg(&pdf)
        .assert()
        .failure()
        .stderr(predicate::str::contains("password protected"));
}

#[test]
fn sweep_reports_eviction_under_small_capacity() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_pdf(temp.path(), "five.pdf", &small_pages(5));

    let value = json_stdout(
        cargo_bin_cmd!("pageview-cli")
            .args(["sweep", "--capacity", "2", "--dpi", "72"])
            .arg(&pdf)
            .env_remove("PAGEVIEW_MAX_TEXTURES")
            .env_remove("PAGEVIEW_RASTER_DPI")
            .env_remove("PAGEVIEW_BACKGROUND")
            .assert()
            .success(),
    );

    assert_eq!(value["page_count"], 5);
    assert_eq!(value["rasterized"], 5);
    assert_eq!(value["failed"], 0);
    assert_eq!(value["sweep_complete"], true);
    assert_eq!(value["pages_drawn"], 5);
    assert_eq!(value["capacity"], 2);
    assert_eq!(value["live_textures"], 2);
    assert_eq!(value["evictions"], 3);
    assert_eq!(value["raster_dpi"], 72.0);
}

#[test]
fn sweep_counts_failed_pages() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_pdf(
        temp.path(),
        "broken.pdf",
        &[[0.0, 0.0, 72.0, 72.0], [0.0, 0.0, 0.0, 0.0], [0.0, 0.0, 72.0, 72.0]],
    );

    let value = json_stdout(
        cargo_bin_cmd!("pageview-cli")
            .args(["sweep", "--dpi", "72"])
            .arg(&pdf)
            .assert()
            .success(),
    );

    assert_eq!(value["rasterized"], 2);
    assert_eq!(value["failed"], 1);
    assert_eq!(value["pages_drawn"], 2);
}

#[test]
fn sweep_fails_oversized_page_only() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_pdf(
        temp.path(),
        "poster.pdf",
        &[[0.0, 0.0, 72.0, 72.0], [0.0, 0.0, 14_400.0, 14_400.0]],
    );

    let value = json_stdout(
        cargo_bin_cmd!("pageview-cli")
            .args(["sweep", "--dpi", "220"])
            .arg(&pdf)
            .assert()
            .success(),
    );

    assert_eq!(value["rasterized"], 1);
    assert_eq!(value["failed"], 1);
    assert_eq!(value["pages_drawn"], 1);
}

#[test]
fn sweep_reads_config_file_and_flags_override_it() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_pdf(temp.path(), "three.pdf", &small_pages(3));
    let config = temp.path().join("pageview.toml");
    std::fs::write(&config, "max_live_textures = 1\nraster_dpi = 36.0\n").unwrap();

    let value = json_stdout(
        cargo_bin_cmd!("pageview-cli")
            .args(["sweep", "--dpi", "72", "--config"])
            .arg(&config)
            .arg(&pdf)
            .env_remove("PAGEVIEW_MAX_TEXTURES")
            .env_remove("PAGEVIEW_RASTER_DPI")
            .env_remove("PAGEVIEW_BACKGROUND")
            .assert()
            .success(),
    );

    assert_eq!(value["capacity"], 1);
    assert_eq!(value["live_textures"], 1);
    assert_eq!(value["raster_dpi"], 72.0);
}

#[test]
fn sweep_rejects_invalid_config() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_pdf(temp.path(), "one.pdf", &small_pages(1));

    cargo_bin_cmd!("pageview-cli")
        .args(["sweep", "--dpi", "5000"])
        .arg(&pdf)
        .assert()
        .failure()
        .stderr(predicate::str::contains("raster_dpi"));
}

#[test]
fn sweep_rejects_page_out_of_range() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_pdf(temp.path(), "two.pdf", &small_pages(2));

    cargo_bin_cmd!("pageview-cli")
        .args(["sweep", "--page", "7"])
        .arg(&pdf)
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn version_prints_package_version() {
    cargo_bin_cmd!("pageview-cli")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
