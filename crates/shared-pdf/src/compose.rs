//! Page composition: painting overlay pages onto existing pages

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use shared_types::PageBox;

use crate::canvas::OverlayPage;
use crate::error::PdfError;
use crate::parser::{inherited, page_box, resolve, save_to_bytes};

/// Paint `overlays` over the page in order, on top of its original content.
///
/// The original content is isolated in a `q`/`Q` pair, each overlay becomes
/// its own content stream translated by the page box origin, overlay
/// resources are merged into the page's (flattened) resource dictionary and
/// link regions become `Link` annotations after any existing ones. Every
/// lookup happens before the page is touched, so on error the page is
/// unchanged.
pub fn merge_overlays(
    doc: &mut Document,
    page_id: ObjectId,
    overlays: &[&OverlayPage],
) -> Result<(), PdfError> {
    let media_box = page_box(doc, page_id)?;
    let mut page = doc.get_dictionary(page_id)?.clone();

    let mut resources = match inherited(doc, &page, b"Resources")? {
        Some(obj) => resolve(doc, obj)?
            .as_dict()
            .map_err(|_| PdfError::Structure("Resources is not a dictionary".to_string()))?
            .clone(),
        None => Dictionary::new(),
    };
    let mut fonts = sub_dictionary(doc, &resources, b"Font")?;
    let mut xobjects = sub_dictionary(doc, &resources, b"XObject")?;
    let mut contents = content_references(doc, &page)?;
    let mut annots = annotation_references(doc, &page)?;

    let mut overlay_streams = Vec::with_capacity(overlays.len());
    for overlay in overlays {
        for (name, _) in &overlay.fonts {
            if fonts.has(name.as_bytes()) {
                return Err(PdfError::Structure(format!("Font resource {} already exists", name)));
            }
        }
        for (name, _) in &overlay.images {
            if xobjects.has(name.as_bytes()) {
                return Err(PdfError::Structure(format!(
                    "XObject resource {} already exists",
                    name
                )));
            }
        }
        overlay_streams.push(translated_content(overlay, &media_box)?);
    }

    // Lookups done; from here on only new objects are added
    for overlay in overlays {
        for (name, font) in &overlay.fonts {
            let font_id = doc.add_object(font.dictionary());
            fonts.set(name.as_bytes(), Object::Reference(font_id));
        }
        for (name, image) in &overlay.images {
            let image_id = image.add_to(doc);
            xobjects.set(name.as_bytes(), Object::Reference(image_id));
        }
        for link in &overlay.links {
            let [x1, y1, x2, y2] = link.rect;
            let annot_id = doc.add_object(dictionary! {
                "Type" => "Annot",
                "Subtype" => "Link",
                "Rect" => vec![
                    Object::Real((x1 + media_box.x) as f32),
                    Object::Real((y1 + media_box.y) as f32),
                    Object::Real((x2 + media_box.x) as f32),
                    Object::Real((y2 + media_box.y) as f32),
                ],
                "Border" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)],
                "A" => dictionary! {
                    "S" => "URI",
                    "URI" => Object::String(link.uri.as_bytes().to_vec(), StringFormat::Literal),
                },
            });
            annots.push(Object::Reference(annot_id));
        }
    }

    if !overlay_streams.is_empty() {
        let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let restore_id = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
        contents.insert(0, Object::Reference(save_id));
        contents.push(Object::Reference(restore_id));
        for content in overlay_streams {
            let stream_id = doc.add_object(Stream::new(Dictionary::new(), content));
            contents.push(Object::Reference(stream_id));
        }
    }

    if !fonts.is_empty() {
        resources.set("Font", Object::Dictionary(fonts));
    }
    if !xobjects.is_empty() {
        resources.set("XObject", Object::Dictionary(xobjects));
    }
    page.set("Resources", Object::Dictionary(resources));
    page.set("Contents", Object::Array(contents));
    if !annots.is_empty() {
        page.set("Annots", Object::Array(annots));
    }
    doc.objects.insert(page_id, Object::Dictionary(page));

    Ok(())
}

/// Append an empty page with the given box at the end of the root page tree
pub fn append_blank_page(doc: &mut Document, media_box: PageBox) -> Result<ObjectId, PdfError> {
    let pages_id = doc
        .catalog()
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|e| PdfError::Structure(format!("Missing page tree root: {}", e)))?;

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => rect_object(&media_box),
        "Resources" => Dictionary::new(),
    });

    let pages = doc
        .get_object_mut(pages_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| PdfError::Structure(format!("Invalid page tree root: {}", e)))?;
    match pages.get_mut(b"Kids") {
        Ok(Object::Array(kids)) => kids.push(Object::Reference(page_id)),
        _ => return Err(PdfError::Structure("Page tree root has no Kids array".to_string())),
    }
    let count = pages.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
    pages.set("Count", count + 1);

    Ok(page_id)
}

/// Render a single overlay as a one-page PDF
pub fn render_standalone(overlay: &OverlayPage) -> Result<Vec<u8>, PdfError> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => Vec::<Object>::new(),
        "Count" => 0,
    });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let page_id = append_blank_page(&mut doc, overlay.page)?;
    merge_overlays(&mut doc, page_id, &[overlay])?;
    doc.compress();
    save_to_bytes(&mut doc)
}

fn rect_object(media_box: &PageBox) -> Object {
    Object::Array(vec![
        Object::Real(media_box.x as f32),
        Object::Real(media_box.y as f32),
        Object::Real((media_box.x + media_box.width) as f32),
        Object::Real((media_box.y + media_box.height) as f32),
    ])
}

fn translated_content(overlay: &OverlayPage, media_box: &PageBox) -> Result<Vec<u8>, PdfError> {
    let body = overlay.content_bytes()?;
    if !media_box.has_origin_offset() {
        return Ok(body);
    }
    let mut content = format!("q 1 0 0 1 {} {} cm\n", media_box.x, media_box.y).into_bytes();
    content.extend_from_slice(&body);
    content.extend_from_slice(b"\nQ\n");
    Ok(content)
}

fn sub_dictionary(doc: &Document, resources: &Dictionary, key: &[u8]) -> Result<Dictionary, PdfError> {
    match resources.get(key) {
        Ok(obj) => resolve(doc, obj)?.as_dict().cloned().map_err(|_| {
            PdfError::Structure(format!(
                "{} resource is not a dictionary",
                String::from_utf8_lossy(key)
            ))
        }),
        Err(_) => Ok(Dictionary::new()),
    }
}

/// The page's content streams as a list of references
fn content_references(doc: &Document, page: &Dictionary) -> Result<Vec<Object>, PdfError> {
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id)? {
            Object::Array(items) => Ok(items.clone()),
            Object::Stream(_) => Ok(vec![Object::Reference(*id)]),
            _ => Err(PdfError::Structure("Contents is not a stream".to_string())),
        },
        Ok(Object::Array(items)) => Ok(items.clone()),
        Ok(_) => Err(PdfError::Structure("Contents must be indirect".to_string())),
        Err(_) => Ok(Vec::new()),
    }
}

fn annotation_references(doc: &Document, page: &Dictionary) -> Result<Vec<Object>, PdfError> {
    match page.get(b"Annots") {
        Ok(obj) => resolve(doc, obj)?
            .as_array()
            .cloned()
            .map_err(|_| PdfError::Structure("Annots is not an array".to_string())),
        Err(_) => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Color, OverlayCanvas};
    use crate::fonts::StandardFont;
    use crate::test_support::{build_pdf, text_at};
    use crate::parser::PdfDocument;
    use crate::text::extract_fragments;
    use lopdf::content::Content;
    use pretty_assertions::assert_eq;
    use shared_types::Point;

    fn overlay(layer: &str, label: &str) -> OverlayPage {
        let mut canvas = OverlayCanvas::new(layer, 612.0, 792.0);
        canvas.draw_text(
            StandardFont::Helvetica,
            8.0,
            Point::new(55.0, 28.0),
            label,
            Color::BLACK,
        );
        canvas.link([55.0, 6.0, 90.0, 12.0], "https://localhost:8000/validar?hash=ab");
        canvas.finish()
    }

    fn page_operators(doc: &Document, page_id: ObjectId) -> Vec<String> {
        let data = doc.get_page_content(page_id).unwrap();
        Content::decode(&data)
            .unwrap()
            .operations
            .into_iter()
            .map(|op| op.operator)
            .collect()
    }

    #[test]
    fn test_merge_paints_original_then_overlays() {
        let pdf = build_pdf(&[((612.0, 792.0), text_at("original", 72.0, 700.0))]);
        let mut doc = Document::load_mem(&pdf).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();

        let stamp = overlay("Stamp", "stamp");
        let sig = overlay("Sig", "signature");
        merge_overlays(&mut doc, page_id, &[&stamp, &sig]).unwrap();

        let texts: Vec<String> = extract_fragments(&doc, page_id)
            .unwrap()
            .into_iter()
            .map(|f| f.text)
            .collect();
        assert_eq!(texts, vec!["original", "stamp", "signature"]);

        let operators = page_operators(&doc, page_id);
        assert_eq!(operators.first().map(String::as_str), Some("q"));
        let restore = operators.iter().position(|op| op == "Q").unwrap();
        assert!(operators[..restore].iter().any(|op| op == "Tj"));

        let page = doc.get_dictionary(page_id).unwrap();
        let fonts = page
            .get(b"Resources")
            .unwrap()
            .as_dict()
            .unwrap()
            .get(b"Font")
            .unwrap()
            .as_dict()
            .unwrap();
        assert!(fonts.has(b"F1"));
        assert!(fonts.has(b"StampF1"));
        assert!(fonts.has(b"SigF1"));
        assert_eq!(page.get(b"Annots").unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_link_annotation_carries_uri() {
        let pdf = build_pdf(&[((612.0, 792.0), vec![])]);
        let mut doc = Document::load_mem(&pdf).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();

        merge_overlays(&mut doc, page_id, &[&overlay("Stamp", "x")]).unwrap();

        let annots = doc
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Annots")
            .unwrap()
            .as_array()
            .unwrap()
            .clone();
        let annot = doc
            .get_dictionary(annots[0].as_reference().unwrap())
            .unwrap();
        assert_eq!(annot.get(b"Subtype").unwrap().as_name().unwrap(), b"Link");
        let action = annot.get(b"A").unwrap().as_dict().unwrap();
        assert_eq!(
            action.get(b"URI").unwrap().as_str().unwrap(),
            b"https://localhost:8000/validar?hash=ab"
        );
    }

    #[test]
    fn test_resource_collision_leaves_page_untouched() {
        let pdf = build_pdf(&[((612.0, 792.0), text_at("original", 72.0, 700.0))]);
        let mut doc = Document::load_mem(&pdf).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let objects_before = doc.objects.len();

        // A layer named "" allocates "F1", which the page already uses
        let clashing = overlay("", "clash");
        let result = merge_overlays(&mut doc, page_id, &[&clashing]);

        assert!(matches!(result, Err(PdfError::Structure(_))));
        let page = doc.get_dictionary(page_id).unwrap();
        assert!(page.get(b"Contents").unwrap().as_reference().is_ok());
        assert!(page.get(b"Annots").is_err());
        assert_eq!(doc.objects.len(), objects_before);
        let texts: Vec<String> = extract_fragments(&doc, page_id)
            .unwrap()
            .into_iter()
            .map(|f| f.text)
            .collect();
        assert_eq!(texts, vec!["original"]);
    }

    #[test]
    fn test_offset_media_box_translates_overlay() {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        });
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        let media_box = PageBox {
            x: 100.0,
            y: 50.0,
            width: 400.0,
            height: 600.0,
        };
        let page_id = append_blank_page(&mut doc, media_box).unwrap();

        merge_overlays(&mut doc, page_id, &[&overlay("Stamp", "x")]).unwrap();

        let operators = page_operators(&doc, page_id);
        assert!(operators.contains(&"cm".to_string()));
        let annots = doc
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Annots")
            .unwrap()
            .as_array()
            .unwrap()
            .clone();
        let rect = doc
            .get_dictionary(annots[0].as_reference().unwrap())
            .unwrap()
            .get(b"Rect")
            .unwrap()
            .as_array()
            .unwrap()
            .clone();
        assert_eq!(rect[0].as_float().unwrap(), 155.0);
        assert_eq!(rect[1].as_float().unwrap(), 56.0);
    }

    #[test]
    fn test_append_blank_page() {
        let pdf = build_pdf(&[((612.0, 792.0), vec![]), ((595.0, 842.0), vec![])]);
        let mut doc = Document::load_mem(&pdf).unwrap();

        let page_id = append_blank_page(&mut doc, PageBox::sized(595.0, 842.0)).unwrap();

        let pages = doc.get_pages();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages.get(&3), Some(&page_id));
        assert_eq!(page_box(&doc, page_id).unwrap(), PageBox::sized(595.0, 842.0));

        let bytes = save_to_bytes(&mut doc).unwrap();
        assert_eq!(PdfDocument::from_bytes(bytes).unwrap().page_count(), 3);
    }

    #[test]
    fn test_render_standalone() {
        let bytes = render_standalone(&overlay("Sig", "PÁGINA DE ASSINATURAS")).unwrap();
        let doc = PdfDocument::from_bytes(bytes).unwrap();

        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.page_box(0).unwrap(), PageBox::letter());
        let fragments = extract_fragments(doc.doc(), doc.page_id(0).unwrap()).unwrap();
        assert_eq!(fragments[0].text, "PÁGINA DE ASSINATURAS");
        assert_eq!((fragments[0].x, fragments[0].y), (55.0, 28.0));
    }
}
