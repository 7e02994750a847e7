//! PDF metadata and page geometry extraction

use std::path::Path;
use lopdf::{Document, Object, ObjectId};
use tracing::warn;
use crate::error::{Error, Result};
use crate::layout::PageGeometry;

/// Maximum depth followed when walking a page's `Parent` chain
const MAX_TREE_DEPTH: usize = 64;

/// PDF metadata
#[derive(Debug, Clone)]
pub struct PdfMetadata {
    /// Number of pages in the PDF
    pub page_count: usize,
    /// Size of every page, in page order
    pub page_sizes: Vec<PageGeometry>,
    /// Document title (if present)
    pub title: Option<String>,
    /// Document author (if present)
    pub author: Option<String>,
}

/// Resolve a reference to the object it points to
fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Look up a page attribute, following the `Parent` chain for inheritable
/// keys such as `MediaBox` and `Resources`
pub(crate) fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node_id = page_id;

    for _ in 0..MAX_TREE_DEPTH {
        let dict = doc.get_dictionary(node_id).ok()?;

        if let Ok(value) = dict.get(key) {
            return resolve(doc, value).cloned();
        }

        node_id = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
    }

    None
}

/// Read a page's size from its (possibly inherited) MediaBox
///
/// Pages without a usable MediaBox are treated as US Letter.
pub fn page_geometry(doc: &Document, page_id: ObjectId) -> PageGeometry {
    let media_box = inherited_attribute(doc, page_id, b"MediaBox");

    let coords: Option<Vec<f64>> = media_box.as_ref().and_then(|obj| {
        let array = obj.as_array().ok()?;
        array
            .iter()
            .map(|v| resolve(doc, v).and_then(|v| v.as_float().ok()).map(f64::from))
            .collect()
    });

    match coords.as_deref() {
        Some([x0, y0, x1, y1]) => {
            let geometry = PageGeometry::new((x1 - x0).abs(), (y1 - y0).abs());
            if geometry.width > 0.0 && geometry.height > 0.0 {
                return geometry;
            }
            warn!("Page {:?} has an empty MediaBox, assuming US Letter", page_id);
        }
        _ => warn!("Page {:?} has no readable MediaBox, assuming US Letter", page_id),
    }

    PageGeometry::letter()
}

/// Size of every page in page order, paired with the page object ID
pub fn page_geometries(doc: &Document) -> Vec<(ObjectId, PageGeometry)> {
    doc.get_pages()
        .into_values()
        .map(|id| (id, page_geometry(doc, id)))
        .collect()
}

/// Read a text entry from the Info dictionary
fn info_string(doc: &Document, key: &[u8]) -> Option<String> {
    let info = doc.trailer.get(b"Info").ok()?;
    let info_dict = resolve(doc, info)?.as_dict().ok()?;
    let bytes = resolve(doc, info_dict.get(key).ok()?)?.as_str().ok()?;
    String::from_utf8(bytes.to_vec()).ok()
}

/// Extract metadata from a PDF file
pub fn extract_metadata(path: &Path) -> Result<PdfMetadata> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let doc = Document::load(path)?;
    let page_sizes: Vec<PageGeometry> = page_geometries(&doc)
        .into_iter()
        .map(|(_, geometry)| geometry)
        .collect();

    if page_sizes.is_empty() {
        return Err(Error::EmptyPdf(path.to_path_buf()));
    }

    Ok(PdfMetadata {
        page_count: page_sizes.len(),
        page_sizes,
        title: info_string(&doc, b"Title"),
        author: info_string(&doc, b"Author"),
    })
}

/// Count the number of pages in a PDF file
pub fn count_pages(path: &Path) -> Result<usize> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let doc = Document::load(path)?;
    let page_count = doc.get_pages().len();

    if page_count == 0 {
        return Err(Error::EmptyPdf(path.to_path_buf()));
    }

    Ok(page_count)
}
