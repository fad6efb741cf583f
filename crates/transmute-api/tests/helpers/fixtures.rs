//! Test fixtures: synthesized PNG images and marker-tagged PDFs.

#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::Cursor;

/// Solid-color PNG of the given dimensions
pub fn png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba(color));
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("Failed to encode PNG");
    buf
}

pub fn image_dimensions(data: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(data).expect("Failed to decode image");
    (img.width(), img.height())
}

pub fn image_format(data: &[u8]) -> ImageFormat {
    image::guess_format(data).expect("Failed to detect image format")
}

/// PDF with one page per `(marker, initial rotation)`
pub fn pdf_with_rotations(pages: &[(i64, i64)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = pages
        .iter()
        .map(|(marker, rotate)| {
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                format!("BT /F1 18 Tf 100 700 Td (marker {}) Tj ET", marker).into_bytes(),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ],
                "Contents" => content_id,
                "Rotate" => *rotate,
                "Marker" => *marker,
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

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("Failed to save PDF");
    buf
}

/// PDF with one unrotated page per marker
pub fn pdf(markers: &[i64]) -> Vec<u8> {
    let pages: Vec<(i64, i64)> = markers.iter().map(|m| (*m, 0)).collect();
    pdf_with_rotations(&pages)
}

fn page_values(data: &[u8], key: &[u8]) -> Vec<i64> {
    let doc = Document::load_mem(data).expect("Failed to load PDF");
    doc.get_pages()
        .values()
        .map(|id| {
            doc.get_dictionary(*id)
                .expect("Page is not a dictionary")
                .get(key)
                .and_then(Object::as_i64)
                .unwrap_or(0)
        })
        .collect()
}

/// Page markers in page order
pub fn markers(data: &[u8]) -> Vec<i64> {
    page_values(data, b"Marker")
}

/// Page `/Rotate` values in page order
pub fn rotations(data: &[u8]) -> Vec<i64> {
    page_values(data, b"Rotate")
}
