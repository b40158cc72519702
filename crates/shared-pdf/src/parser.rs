//! PDF parsing using lopdf

use lopdf::{Dictionary, Document, Object, ObjectId};
use shared_types::PageBox;

use crate::error::PdfError;

/// Inheritance chains deeper than this are treated as malformed
const MAX_TREE_DEPTH: usize = 32;

/// An immutable source document: the raw bytes plus the parsed object graph
#[derive(Debug, Clone)]
pub struct PdfDocument {
    doc: Document,
    bytes: Vec<u8>,
    page_ids: Vec<ObjectId>,
}

impl PdfDocument {
    /// Load a PDF from raw bytes.
    ///
    /// Rejects empty input, unparseable bytes, encrypted documents and
    /// documents without pages.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, PdfError> {
        if bytes.is_empty() {
            return Err(PdfError::ParseError("Empty input".to_string()));
        }

        let doc = Document::load_mem(&bytes).map_err(|e| PdfError::ParseError(e.to_string()))?;

        if doc.trailer.get(b"Encrypt").is_ok() {
            return Err(PdfError::Encrypted);
        }

        let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();
        if page_ids.is_empty() {
            return Err(PdfError::ParseError("Document has no pages".to_string()));
        }

        Ok(Self {
            doc,
            bytes,
            page_ids,
        })
    }

    /// Get the raw bytes exactly as received
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Borrow the parsed document
    pub fn doc(&self) -> &Document {
        &self.doc
    }

    /// Get the number of pages
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Page object ids in page order
    pub fn page_ids(&self) -> &[ObjectId] {
        &self.page_ids
    }

    /// Get page object ID for a given page index (0-indexed)
    pub fn page_id(&self, index: usize) -> Option<ObjectId> {
        self.page_ids.get(index).copied()
    }

    /// MediaBox of the page at `index` (0-indexed)
    pub fn page_box(&self, index: usize) -> Result<PageBox, PdfError> {
        let page_id = self
            .page_id(index)
            .ok_or(PdfError::PageNotFound(index as u32 + 1))?;
        page_box(&self.doc, page_id)
    }
}

/// Read a page's MediaBox, traversing parents for inherited values.
/// Pages with no MediaBox anywhere in the chain default to US Letter.
pub fn page_box(doc: &Document, page_id: ObjectId) -> Result<PageBox, PdfError> {
    let mut dict = doc
        .get_dictionary(page_id)
        .map_err(|e| PdfError::Structure(format!("Failed to get page object: {}", e)))?;

    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(media_box) = dict.get(b"MediaBox") {
            return parse_rect(doc, media_box);
        }

        match dict.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent_id) => {
                dict = doc
                    .get_dictionary(parent_id)
                    .map_err(|e| PdfError::Structure(format!("Broken parent link: {}", e)))?;
            }
            Err(_) => return Ok(PageBox::letter()),
        }
    }

    Err(PdfError::Structure("Page tree too deep".to_string()))
}

/// Look up an inheritable page attribute (Resources, MediaBox, ...) on the page
/// or the nearest ancestor that defines it
pub(crate) fn inherited<'a>(
    doc: &'a Document,
    page: &'a Dictionary,
    key: &[u8],
) -> Result<Option<&'a Object>, PdfError> {
    let mut dict = page;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = dict.get(key) {
            return Ok(Some(value));
        }
        match dict.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent_id) => dict = doc.get_dictionary(parent_id)?,
            Err(_) => return Ok(None),
        }
    }
    Err(PdfError::Structure("Page tree too deep".to_string()))
}

/// Follow a reference to its target; direct objects are returned as-is
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object, PdfError> {
    match obj {
        Object::Reference(id) => doc
            .get_object(*id)
            .map_err(|e| PdfError::Structure(format!("Failed to resolve reference: {}", e))),
        other => Ok(other),
    }
}

/// Parse a PDF rectangle array into a normalized box
fn parse_rect(doc: &Document, obj: &Object) -> Result<PageBox, PdfError> {
    let arr = resolve(doc, obj)?
        .as_array()
        .map_err(|_| PdfError::Structure("MediaBox is not an array".to_string()))?;

    if arr.len() != 4 {
        return Err(PdfError::Structure(format!(
            "MediaBox has {} elements, expected 4",
            arr.len()
        )));
    }

    let mut values = [0.0f64; 4];
    for (i, item) in arr.iter().enumerate() {
        values[i] = number(resolve(doc, item)?)
            .ok_or_else(|| PdfError::Structure("Expected number in rectangle".to_string()))?;
    }

    let width = (values[2] - values[0]).abs();
    let height = (values[3] - values[1]).abs();
    if width == 0.0 || height == 0.0 {
        return Err(PdfError::Structure("MediaBox has zero area".to_string()));
    }

    Ok(PageBox {
        x: values[0].min(values[2]),
        y: values[1].min(values[3]),
        width,
        height,
    })
}

/// Extract a number from a PDF object
pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Serialize a document to bytes
pub fn save_to_bytes(doc: &mut Document) -> Result<Vec<u8>, PdfError> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfError::WriteError(e.to_string()))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use crate::test_support::*;
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_from_bytes_reads_pages_and_sizes() {
        let pdf = build_pdf(&[((612.0, 792.0), vec![]), ((595.0, 842.0), vec![])]);
        let doc = PdfDocument::from_bytes(pdf.clone()).unwrap();

        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.bytes(), pdf.as_slice());
        assert_eq!(doc.page_box(0).unwrap(), PageBox::sized(612.0, 792.0));
        assert_eq!(doc.page_box(1).unwrap(), PageBox::sized(595.0, 842.0));
        assert!(matches!(doc.page_box(2), Err(PdfError::PageNotFound(3))));
    }

    #[test]
    fn test_rejects_empty_and_garbage() {
        assert!(matches!(
            PdfDocument::from_bytes(vec![]),
            Err(PdfError::ParseError(_))
        ));
        assert!(matches!(
            PdfDocument::from_bytes(b"definitely not a pdf".to_vec()),
            Err(PdfError::ParseError(_))
        ));
    }

    #[test]
    fn test_inherited_media_box() {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
                "MediaBox" => vec![
                    Object::Integer(10),
                    Object::Integer(20),
                    Object::Integer(310),
                    Object::Integer(420),
                ],
            }),
        );

        let page = page_box(&doc, page_id).unwrap();
        assert_eq!(
            page,
            PageBox {
                x: 10.0,
                y: 20.0,
                width: 300.0,
                height: 400.0
            }
        );
    }

    #[test]
    fn test_missing_media_box_defaults_to_letter() {
        let mut doc = Document::with_version("1.7");
        let page_id = doc.add_object(dictionary! { "Type" => "Page" });
        assert_eq!(page_box(&doc, page_id).unwrap(), PageBox::letter());
    }
}
