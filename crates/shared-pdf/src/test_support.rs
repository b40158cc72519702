//! PDF fixtures for tests
//!
//! Pages carry a Helvetica font resource named `F1`, which [`text_at`] uses.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

/// Build an in-memory document whose pages carry the given sizes and content
/// operations. Returns the document and its page ids in order.
pub fn build_document(pages: &[((f64, f64), Vec<Operation>)]) -> (Document, Vec<ObjectId>) {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut page_ids = Vec::new();
    for ((width, height), operations) in pages {
        let content_id = doc.add_object(content_stream(operations.clone()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(*width as f32),
                Object::Real(*height as f32),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        page_ids.push(page_id);
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| Object::Reference(*id)).collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_ids.len() as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    (doc, page_ids)
}

/// Serialized form of [`build_document`]
pub fn build_pdf(pages: &[((f64, f64), Vec<Operation>)]) -> Vec<u8> {
    let (mut doc, _) = build_document(pages);
    save(&mut doc)
}

/// Letter-sized pages with no content
pub fn blank_pdf(pages: usize) -> Vec<u8> {
    let pages: Vec<_> = (0..pages).map(|_| ((612.0, 792.0), vec![])).collect();
    build_pdf(&pages)
}

/// One letter page that paints the Form XObject `Fm0` through `page_ops`.
/// The form draws `form_ops` with its own `F1` font and the given `/Matrix`.
pub fn build_form_pdf(page_ops: Vec<Operation>, form_ops: Vec<Operation>, matrix: [f64; 6]) -> Vec<u8> {
    let (mut doc, page_ids) = build_document(&[((612.0, 792.0), page_ops)]);

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let mut form = content_stream(form_ops);
    form.dict.set("Type", "XObject");
    form.dict.set("Subtype", "Form");
    form.dict.set(
        "BBox",
        vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(612),
            Object::Integer(792),
        ],
    );
    form.dict.set(
        "Matrix",
        matrix.iter().map(|v| Object::Real(*v as f32)).collect::<Vec<_>>(),
    );
    form.dict.set(
        "Resources",
        dictionary! { "Font" => dictionary! { "F1" => font_id } },
    );
    let form_id = doc.add_object(form);

    let page = doc
        .get_object_mut(page_ids[0])
        .and_then(Object::as_dict_mut)
        .unwrap();
    let resources = page.get_mut(b"Resources").and_then(Object::as_dict_mut).unwrap();
    resources.set("XObject", dictionary! { "Fm0" => form_id });

    save(&mut doc)
}

/// Text showing operations for one string at an absolute position
pub fn text_at(text: &str, x: f64, y: f64) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
        Operation::new("Td", vec![Object::Real(x as f32), Object::Real(y as f32)]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}

fn content_stream(operations: Vec<Operation>) -> Stream {
    let content = Content { operations };
    Stream::new(Dictionary::new(), content.encode().unwrap())
}

fn save(doc: &mut Document) -> Vec<u8> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}
