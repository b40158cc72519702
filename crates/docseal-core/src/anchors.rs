//! Signature anchor detection
//!
//! Anchors are found by scanning positioned text for the role labels
//! ("CONTRATANTE", "CONTRATADA") and for underscore runs that mark a
//! signature line. Classification and resolution are pure functions over
//! extracted fragments; only [`detect_anchors`] touches the document.

use lopdf::{Document, ObjectId};
use shared_pdf::{extract_fragments, PdfDocument, TextFragment};
use shared_types::{Point, SignatoryRole};

/// Shortest underscore run treated as a signature line
const MIN_UNDERLINE_RUN: usize = 3;

/// Only the trailing pages are searched for anchors
const SEARCH_WINDOW: usize = 3;

/// Names sit just above an underline, offset from its start
const UNDERLINE_OFFSET: (f64, f64) = (50.0, 10.0);

/// Names sit below a role label
const LABEL_OFFSET: (f64, f64) = (40.0, -50.0);

/// Anchor candidates found on one page, in absolute page space
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnchorSet {
    pub contratante: Option<Point>,
    pub contratada: Option<Point>,
    /// Underline runs in encounter order
    pub underlines: Vec<Point>,
}

impl AnchorSet {
    pub fn is_empty(&self) -> bool {
        self.contratante.is_none() && self.contratada.is_none() && self.underlines.is_empty()
    }

    pub fn label(&self, role: SignatoryRole) -> Option<Point> {
        match role {
            SignatoryRole::Contratante => self.contratante,
            SignatoryRole::Contratada => self.contratada,
        }
    }
}

/// Outcome of searching the document for a page with anchors
#[derive(Debug, Clone, PartialEq)]
pub enum AnchorSearch {
    Found { page_index: usize, anchors: AnchorSet },
    NotFound,
}

/// Where each role's artifact goes, in the same space as the input anchors
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResolvedAnchors {
    pub contratante: Option<Point>,
    pub contratada: Option<Point>,
}

impl ResolvedAnchors {
    pub fn get(&self, role: SignatoryRole) -> Option<Point> {
        match role {
            SignatoryRole::Contratante => self.contratante,
            SignatoryRole::Contratada => self.contratada,
        }
    }

    fn set(&mut self, role: SignatoryRole, point: Point) {
        match role {
            SignatoryRole::Contratante => self.contratante = Some(point),
            SignatoryRole::Contratada => self.contratada = Some(point),
        }
    }
}

/// Classify positioned fragments into label and underline anchors
pub fn classify_fragments(fragments: &[TextFragment]) -> AnchorSet {
    let mut anchors = AnchorSet::default();

    for fragment in fragments {
        if fragment.text.trim().is_empty() {
            continue;
        }

        let normalized: String = fragment
            .text
            .to_uppercase()
            .chars()
            .filter(|c| *c != '.' && *c != ':')
            .collect();
        let position = Point::new(fragment.x, fragment.y);

        if normalized.contains("CONTRATANTE") {
            anchors.contratante.get_or_insert(position);
        } else if normalized.contains("CONTRATADA") {
            anchors.contratada.get_or_insert(position);
        }

        if has_underline_run(&fragment.text) {
            anchors.underlines.push(position);
        }
    }

    anchors
}

fn has_underline_run(text: &str) -> bool {
    let mut run = 0;
    for c in text.chars() {
        if c == '_' {
            run += 1;
            if run >= MIN_UNDERLINE_RUN {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

/// Anchors on one page. Extraction failures yield an empty set.
pub fn detect_anchors(doc: &Document, page_id: ObjectId) -> AnchorSet {
    match extract_fragments(doc, page_id) {
        Ok(fragments) => classify_fragments(&fragments),
        Err(e) => {
            tracing::debug!("Anchor scan skipped page {:?}: {}", page_id, e);
            AnchorSet::default()
        }
    }
}

/// Scan the last pages, newest first, stopping at the first page with anchors
pub fn search_anchors(source: &PdfDocument) -> AnchorSearch {
    let page_count = source.page_count();
    let first = page_count.saturating_sub(SEARCH_WINDOW);

    for page_index in (first..page_count).rev() {
        let Some(page_id) = source.page_id(page_index) else {
            continue;
        };
        let anchors = detect_anchors(source.doc(), page_id);
        if !anchors.is_empty() {
            tracing::debug!(
                "Found anchors on page {}: {} underline(s), contratante label {}, contratada label {}",
                page_index + 1,
                anchors.underlines.len(),
                anchors.contratante.is_some(),
                anchors.contratada.is_some()
            );
            return AnchorSearch::Found {
                page_index,
                anchors,
            };
        }
    }

    AnchorSearch::NotFound
}

/// Pair anchors with roles.
///
/// Underlines are taken top to bottom: the first goes to the contratante, the
/// second to the contratada. Roles left without an underline fall back to
/// their label, if any.
pub fn resolve_placement(anchors: &AnchorSet) -> ResolvedAnchors {
    let mut resolved = ResolvedAnchors::default();

    let mut lines = anchors.underlines.clone();
    lines.sort_by(|a, b| b.y.total_cmp(&a.y));
    for (role, line) in SignatoryRole::ALL.into_iter().zip(lines) {
        resolved.set(role, line.offset(UNDERLINE_OFFSET.0, UNDERLINE_OFFSET.1));
    }

    for role in SignatoryRole::ALL {
        if resolved.get(role).is_some() {
            continue;
        }
        if let Some(label) = anchors.label(role) {
            resolved.set(role, label.offset(LABEL_OFFSET.0, LABEL_OFFSET.1));
        }
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::Object;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use shared_pdf::parser::save_to_bytes;
    use shared_pdf::test_support::{build_document, build_form_pdf, build_pdf, text_at};

    fn letter(operations: Vec<Operation>) -> ((f64, f64), Vec<Operation>) {
        ((612.0, 792.0), operations)
    }

    fn signature_block(label: &str) -> Vec<Operation> {
        let mut ops = text_at(label, 72.0, 200.0);
        ops.extend(text_at("______________________", 72.0, 150.0));
        ops
    }

    fn found_page(search: &AnchorSearch) -> Option<usize> {
        match search {
            AnchorSearch::Found { page_index, .. } => Some(*page_index),
            AnchorSearch::NotFound => None,
        }
    }

    fn fragment(text: &str, x: f64, y: f64) -> TextFragment {
        TextFragment {
            text: text.to_string(),
            x,
            y,
        }
    }

    #[test]
    fn test_labels_are_normalized() {
        let anchors = classify_fragments(&[
            fragment("Contratante:", 72.0, 200.0),
            fragment("c.o.n.t.r.a.t.a.d.a", 320.0, 200.0),
        ]);
        assert_eq!(anchors.contratante, Some(Point::new(72.0, 200.0)));
        assert_eq!(anchors.contratada, Some(Point::new(320.0, 200.0)));
        assert!(anchors.underlines.is_empty());
    }

    #[test]
    fn test_first_label_wins() {
        let anchors = classify_fragments(&[
            fragment("CONTRATANTE", 72.0, 500.0),
            fragment("CONTRATANTE", 72.0, 200.0),
        ]);
        assert_eq!(anchors.contratante, Some(Point::new(72.0, 500.0)));
    }

    #[test]
    fn test_fragment_with_both_labels_counts_as_contratante() {
        let anchors = classify_fragments(&[fragment("CONTRATANTE e CONTRATADA", 72.0, 400.0)]);
        assert_eq!(anchors.contratante, Some(Point::new(72.0, 400.0)));
        assert_eq!(anchors.contratada, None);
    }

    #[test]
    fn test_underline_runs() {
        let anchors = classify_fragments(&[
            fragment("__", 10.0, 10.0),
            fragment("Assinatura: ______", 100.0, 300.0),
            fragment("   ", 0.0, 0.0),
            fragment("_ _ _", 10.0, 10.0),
            fragment("___", 100.0, 200.0),
        ]);
        assert_eq!(
            anchors.underlines,
            vec![Point::new(100.0, 300.0), Point::new(100.0, 200.0)]
        );
    }

    #[test]
    fn test_label_policy_offsets() {
        let anchors = AnchorSet {
            contratante: Some(Point::new(72.0, 200.0)),
            contratada: Some(Point::new(320.0, 200.0)),
            underlines: vec![],
        };
        let resolved = resolve_placement(&anchors);
        assert_eq!(resolved.contratante, Some(Point::new(112.0, 150.0)));
        assert_eq!(resolved.contratada, Some(Point::new(360.0, 150.0)));
    }

    #[test]
    fn test_single_underline_leaves_contratada_to_its_label() {
        let anchors = AnchorSet {
            contratante: Some(Point::new(72.0, 400.0)),
            contratada: Some(Point::new(320.0, 400.0)),
            underlines: vec![Point::new(100.0, 300.0)],
        };
        let resolved = resolve_placement(&anchors);
        assert_eq!(resolved.contratante, Some(Point::new(150.0, 310.0)));
        assert_eq!(resolved.contratada, Some(Point::new(360.0, 350.0)));
    }

    #[test]
    fn test_empty_anchor_set_resolves_nothing() {
        assert_eq!(
            resolve_placement(&AnchorSet::default()),
            ResolvedAnchors::default()
        );
        assert!(AnchorSet::default().is_empty());
    }

    proptest! {
        #[test]
        fn underlines_pair_top_down(
            x1 in 0.0f64..600.0,
            x2 in 0.0f64..600.0,
            low in 0.0f64..400.0,
            gap in 1.0f64..400.0,
            reversed in any::<bool>(),
        ) {
            let high = low + gap;
            let upper = Point::new(x1, high);
            let lower = Point::new(x2, low);
            let underlines = if reversed { vec![lower, upper] } else { vec![upper, lower] };

            let resolved = resolve_placement(&AnchorSet {
                contratante: Some(Point::new(1.0, 1.0)),
                contratada: None,
                underlines,
            });

            prop_assert_eq!(resolved.contratante, Some(Point::new(x1 + 50.0, high + 10.0)));
            prop_assert_eq!(resolved.contratada, Some(Point::new(x2 + 50.0, low + 10.0)));
        }

        #[test]
        fn label_policy_is_fixed_offset(x in -1000.0f64..1000.0, y in -1000.0f64..1000.0) {
            let resolved = resolve_placement(&AnchorSet {
                contratante: Some(Point::new(x, y)),
                contratada: None,
                underlines: vec![],
            });
            prop_assert_eq!(resolved.contratante, Some(Point::new(x + 40.0, y - 50.0)));
            prop_assert_eq!(resolved.contratada, None);
        }
    }

    #[test]
    fn test_anchors_before_search_window_are_ignored() {
        let mut pages = vec![letter(signature_block("CONTRATANTE"))];
        pages.extend((0..4).map(|_| letter(text_at("Clausula", 72.0, 700.0))));
        let source = PdfDocument::from_bytes(build_pdf(&pages)).unwrap();

        assert_eq!(search_anchors(&source), AnchorSearch::NotFound);
    }

    #[test]
    fn test_short_document_searches_every_page() {
        let pages = vec![
            letter(signature_block("CONTRATADA")),
            letter(text_at("Clausula", 72.0, 700.0)),
        ];
        let source = PdfDocument::from_bytes(build_pdf(&pages)).unwrap();

        assert_eq!(found_page(&search_anchors(&source)), Some(0));
    }

    #[test]
    fn test_last_page_with_anchors_wins() {
        let pages = vec![
            letter(vec![]),
            letter(vec![]),
            letter(vec![]),
            letter(signature_block("CONTRATANTE")),
            letter(signature_block("CONTRATADA")),
        ];
        let source = PdfDocument::from_bytes(build_pdf(&pages)).unwrap();

        match search_anchors(&source) {
            AnchorSearch::Found {
                page_index,
                anchors,
            } => {
                assert_eq!(page_index, 4);
                assert!(anchors.contratante.is_none());
                assert_eq!(anchors.contratada, Some(Point::new(72.0, 200.0)));
            }
            AnchorSearch::NotFound => panic!("expected anchors on the last page"),
        }
    }

    #[test]
    fn test_unreadable_page_is_skipped() {
        let (mut doc, page_ids) = build_document(&[
            letter(signature_block("CONTRATANTE")),
            letter(signature_block("CONTRATADA")),
        ]);
        // Resources can no longer be resolved through the page tree
        let broken = doc
            .get_object_mut(page_ids[1])
            .and_then(Object::as_dict_mut)
            .unwrap();
        broken.remove(b"Resources");
        broken.set("Parent", Object::Reference((999, 0)));
        let source = PdfDocument::from_bytes(save_to_bytes(&mut doc).unwrap()).unwrap();

        assert!(detect_anchors(source.doc(), source.page_id(1).unwrap()).is_empty());
        assert_eq!(found_page(&search_anchors(&source)), Some(0));
    }

    #[test]
    fn test_anchors_inside_form_xobject() {
        let pdf = build_form_pdf(
            vec![Operation::new("Do", vec![Object::Name(b"Fm0".to_vec())])],
            text_at("CONTRATANTE: ______________", 100.0, 300.0),
            [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
        );
        let source = PdfDocument::from_bytes(pdf).unwrap();

        match search_anchors(&source) {
            AnchorSearch::Found {
                page_index,
                anchors,
            } => {
                assert_eq!(page_index, 0);
                assert_eq!(anchors.contratante, Some(Point::new(100.0, 300.0)));
                assert_eq!(anchors.underlines, vec![Point::new(100.0, 300.0)]);
            }
            AnchorSearch::NotFound => panic!("expected anchors inside the form"),
        }
    }
}
