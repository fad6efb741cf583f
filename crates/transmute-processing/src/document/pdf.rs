//! In-memory PDF operations
//!
//! Synchronous; callers run these on the blocking pool.

use crate::document::pages::parse_page_ranges;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;
use transmute_core::AppError;

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];
const MAX_TREE_DEPTH: usize = 64;

fn load(data: &[u8], label: &str) -> Result<Document, AppError> {
    let doc = Document::load_mem(data)
        .map_err(|e| AppError::TransformFailure(format!("{} is not a readable PDF: {}", label, e)))?;
    if doc.is_encrypted() {
        return Err(AppError::TransformFailure(format!("{} is encrypted", label)));
    }
    Ok(doc)
}

fn save(mut doc: Document) -> Result<Vec<u8>, AppError> {
    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| AppError::TransformFailure(format!("Failed to write PDF: {}", e)))?;
    Ok(buf)
}

/// Look `key` up on the page, then up the page tree
fn inherited(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return match value {
                Object::Reference(id) => doc.get_object(*id).ok().cloned(),
                other => Some(other.clone()),
            };
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Copy of the page dictionary with inherited attributes made explicit
fn flattened_page(doc: &Document, page_id: ObjectId) -> Result<Dictionary, AppError> {
    let mut page = doc
        .get_dictionary(page_id)
        .map_err(|e| AppError::TransformFailure(format!("Broken page object: {}", e)))?
        .clone();
    for key in INHERITABLE {
        if !page.has(key) {
            if let Some(value) = inherited(doc, page_id, key) {
                page.set(key.to_vec(), value);
            }
        }
    }
    Ok(page)
}

pub fn page_count(data: &[u8]) -> Result<usize, AppError> {
    Ok(load(data, "Input")?.get_pages().len())
}

/// Concatenate the pages of every input, in input order. Any unreadable or encrypted input
/// aborts the whole merge.
pub fn merge(inputs: &[&[u8]]) -> Result<Vec<u8>, AppError> {
    let mut max_id = 1;
    let mut pages: Vec<(ObjectId, Dictionary)> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for (index, data) in inputs.iter().enumerate() {
        let mut doc = load(data, &format!("Input {}", index + 1))?;
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        for page_id in doc.get_pages().into_values() {
            pages.push((page_id, flattened_page(&doc, page_id)?));
        }
        objects.extend(doc.objects);
    }

    let mut merged = Document::with_version("1.5");
    for (id, object) in objects {
        match object.type_name().unwrap_or("") {
            "Catalog" | "Pages" | "Page" | "Outlines" | "Outline" => {}
            _ => {
                merged.objects.insert(id, object);
            }
        }
    }

    let pages_id: ObjectId = (max_id, 0);
    let catalog_id: ObjectId = (max_id + 1, 0);
    let kids: Vec<Object> = pages.iter().map(|(id, _)| Object::Reference(*id)).collect();
    let count = pages.len() as i64;

    for (id, mut page) in pages {
        page.set("Parent", pages_id);
        merged.objects.insert(id, Object::Dictionary(page));
    }
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    merged.objects.insert(
        catalog_id,
        Object::Dictionary(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        }),
    );
    merged.trailer.set("Root", catalog_id);
    merged.max_id = catalog_id.0;

    merged.renumber_objects();
    merged.compress();
    save(merged)
}

/// Keep only the pages selected by `selection`, in original order. The document must have
/// at least 2 pages and the selection must leave at least one page out.
pub fn split(data: &[u8], selection: &str) -> Result<Vec<u8>, AppError> {
    let mut doc = load(data, "Input")?;
    let page_count = doc.get_pages().len() as u32;

    if page_count < 2 {
        return Err(AppError::ValidationFailure(format!(
            "Cannot split a document with {} page(s); at least 2 are required",
            page_count
        )));
    }

    let selected = parse_page_ranges(selection, page_count)?;
    if selected.len() as u32 == page_count {
        return Err(AppError::ValidationFailure(format!(
            "Selection '{}' keeps all {} pages; select a strict subset",
            selection, page_count
        )));
    }

    // Inherited attributes must survive even if the node carrying them loses all its kids
    let kept: Vec<ObjectId> = doc
        .get_pages()
        .into_iter()
        .filter(|(number, _)| selected.contains(number))
        .map(|(_, id)| id)
        .collect();
    for page_id in kept {
        let page = flattened_page(&doc, page_id)?;
        doc.objects.insert(page_id, Object::Dictionary(page));
    }

    let removed: Vec<u32> = (1..=page_count).filter(|n| !selected.contains(n)).collect();
    doc.delete_pages(&removed);
    doc.prune_objects();
    doc.renumber_objects();
    doc.compress();
    save(doc)
}

/// Rotate every page by `angle` degrees relative to its current orientation
pub fn rotate(data: &[u8], angle: i64) -> Result<Vec<u8>, AppError> {
    let mut doc = load(data, "Input")?;
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();

    for page_id in page_ids {
        let current = inherited(&doc, page_id, b"Rotate")
            .and_then(|value| value.as_i64().ok())
            .unwrap_or(0);
        let page = doc
            .get_dictionary_mut(page_id)
            .map_err(|e| AppError::TransformFailure(format!("Broken page object: {}", e)))?;
        page.set("Rotate", (current + angle).rem_euclid(360));
    }

    save(doc)
}


#[cfg(test)]
mod tests {
    use super::fixtures::{markers, pdf, rotations};
    use super::*;

    #[test]
    fn test_merge_preserves_input_and_page_order() {
        let a = pdf(&[1, 2]);
        let b = pdf(&[3]);
        let c = pdf(&[4, 5, 6]);
        let merged = merge(&[&a, &b, &c]).unwrap();
        assert_eq!(markers(&merged), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_merge_drops_input_page_trees() {
        let merged = merge(&[&pdf(&[1, 2]), &pdf(&[3])]).unwrap();
        let doc = Document::load_mem(&merged).unwrap();
        let count = |kind: &str| {
            doc.objects
                .values()
                .filter(|object| object.type_name().ok() == Some(kind))
                .count()
        };
        assert_eq!(count("Catalog"), 1);
        assert_eq!(count("Pages"), 1);
        assert_eq!(count("Page"), 3);
    }

    #[test]
    fn test_merge_keeps_inherited_media_box() {
        let merged = merge(&[&pdf(&[1]), &pdf(&[2])]).unwrap();
        let doc = Document::load_mem(&merged).unwrap();
        for id in doc.get_pages().values() {
            assert!(doc.get_dictionary(*id).unwrap().has(b"MediaBox"));
        }
    }

    #[test]
    fn test_merge_aborts_on_corrupt_input() {
        let good = pdf(&[1]);
        let err = merge(&[&good, b"%PDF-1.5 garbage"]).unwrap_err();
        assert!(matches!(err, AppError::TransformFailure(msg) if msg.contains("Input 2")));
    }

    #[test]
    fn test_split_single_page_rejected() {
        let err = split(&pdf(&[1]), "1").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_split_keeps_selected_pages_in_order() {
        let out = split(&pdf(&[10, 20, 30, 40, 50]), "4,1-2").unwrap();
        assert_eq!(markers(&out), vec![10, 20, 40]);
    }

    #[test]
    fn test_split_requires_strict_subset() {
        let err = split(&pdf(&[1, 2]), "1-2").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_rotate_is_uniform_and_cumulative() {
        let once = rotate(&pdf(&[1, 2, 3]), 90).unwrap();
        assert_eq!(rotations(&once), vec![90, 90, 90]);
        assert_eq!(page_count(&once).unwrap(), 3);

        let twice = rotate(&once, 270).unwrap();
        assert_eq!(rotations(&twice), vec![0, 0, 0]);
    }
}
