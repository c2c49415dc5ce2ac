mod common;

use std::fs;

use common::{fixture::ImageFixture, write_fixture};
use modinit::{read, write, Image};

/// Names, signatures and decoded bodies of every method, in table order.
fn shape(image: &Image) -> Vec<(String, String, Vec<String>)> {
    image
        .types()
        .iter()
        .flat_map(|ty| {
            image.methods_of(ty).map(move |method| {
                let body = method
                    .instructions
                    .iter()
                    .map(|instruction| format!("{} {:?}", instruction.mnemonic, instruction.operand))
                    .collect();
                (
                    format!("{}::{}", ty.full_name(), method.name),
                    format!("{:?} {}", method.params, method.return_type),
                    body,
                )
            })
        })
        .collect()
}

fn assert_round_trip(fixture: &ImageFixture) {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), "Library", fixture);

    let before = read(&path).unwrap();
    let expected = shape(&before);
    let types = before.types().len();
    write(&before, &path, None).unwrap();
    drop(before);

    let after = read(&path).unwrap();
    assert_eq!(after.types().len(), types);
    assert_eq!(shape(&after), expected);
}

#[test]
fn standard_image() {
    assert_round_trip(&ImageFixture::new());
}

#[test]
fn with_custom_attributes() {
    assert_round_trip(&ImageFixture::new().with_custom_attributes());
}

#[test]
fn with_entry_point() {
    assert_round_trip(&ImageFixture::new().with_entry_point("Go"));
}

#[test]
fn with_grown_headers() {
    assert_round_trip(&ImageFixture::new().with_padding_sections(2));
}

#[test]
fn with_symbols() {
    assert_round_trip(&ImageFixture::new().with_pdb([3; 16]).with_pdb_checksum());
}

#[test]
fn rewriting_twice_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), "Library", &ImageFixture::new());

    let image = read(&path).unwrap();
    write(&image, &path, None).unwrap();
    drop(image);
    let first = fs::read(&path).unwrap();

    let image = read(&path).unwrap();
    let expected = shape(&image);
    write(&image, &path, None).unwrap();
    drop(image);

    let image = read(&path).unwrap();
    assert_eq!(shape(&image), expected);
    // Every rewrite appends one more section
    assert!(fs::read(&path).unwrap().len() > first.len());
}

#[test]
fn overlay_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = ImageFixture::new().with_overlay(&[0xCC; 64]);
    let path = write_fixture(dir.path(), "Library", &fixture);

    let image = read(&path).unwrap();
    write(&image, &path, None).unwrap();
    drop(image);

    let data = fs::read(&path).unwrap();
    assert!(!data.ends_with(&[0xCC; 64]));
    assert_eq!(read(&path).unwrap().methods().len(), 10);
}
