//! Full-stack extraction tests over synthesized PDFs

use lopdf::{content::Content, content::Operation, Dictionary, Document, Object, Stream};
use shared_pdf::{BlockExtractor, LopdfBackend};

/// Build a minimal PDF where each page shows the given lines of text,
/// one text block per page starting near the top.
fn build_pdf(pages: &[&[&str]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
    ]));
    let resources = Dictionary::from_iter(vec![(
        "Font",
        Object::Dictionary(Dictionary::from_iter(vec![(
            "F1",
            Object::Reference(font_id),
        )])),
    )]);

    let mut page_ids = Vec::new();
    for lines in pages {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(b"F1".to_vec()), Object::Integer(11)],
            ),
            Operation::new("TL", vec![Object::Integer(13)]),
            Operation::new("Td", vec![Object::Integer(72), Object::Integer(700)]),
        ];
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                operations.push(Operation::new("T*", vec![]));
            }
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(
                    line.as_bytes().to_vec(),
                    lopdf::StringFormat::Literal,
                )],
            ));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));

        let page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            ),
            ("Resources", Object::Dictionary(resources.clone())),
            ("Contents", Object::Reference(content_id)),
        ]);
        page_ids.push(doc.add_object(page));
    }

    let pages_dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(page_ids.len() as i64)),
        (
            "Kids",
            Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
        ),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]);
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

#[test]
fn test_extracts_block_text_and_page_number() {
    let bytes = build_pdf(&[&[
        "We may retain personal data indefinitely",
        "unless the customer requests deletion.",
    ]]);

    let extractor = BlockExtractor::new(LopdfBackend::new());
    let doc = extractor.extract(&bytes).unwrap();

    assert_eq!(doc.blocks.len(), 1);
    let block = &doc.blocks[0];
    assert_eq!(block.page_number, 1);
    assert_eq!(block.block_index, 0);
    assert!(block.text.contains("retain personal data"));
    assert!(block.text.contains("requests deletion"));
    assert_eq!(block.line_count, 2);
}

#[test]
fn test_block_indices_increase_across_pages() {
    let bytes = build_pdf(&[
        &["First page paragraph about access control."],
        &["Second page paragraph about encryption at rest."],
    ]);

    let extractor = BlockExtractor::new(LopdfBackend::new());
    let doc = extractor.extract(&bytes).unwrap();

    assert_eq!(doc.blocks.len(), 2);
    assert_eq!(doc.blocks[0].page_number, 1);
    assert_eq!(doc.blocks[1].page_number, 2);
    assert!(doc.blocks[0].block_index < doc.blocks[1].block_index);
}

#[test]
fn test_page_limit_is_enforced() {
    let lines: Vec<&[&str]> = vec![&["A page with a sufficiently long paragraph."]; 5];
    let bytes = build_pdf(&lines);

    let extractor = BlockExtractor::new(LopdfBackend::new()).with_max_pages(3);
    let doc = extractor.extract(&bytes).unwrap();

    assert_eq!(doc.blocks.len(), 3);
    assert!(doc.blocks.iter().all(|b| b.page_number <= 3));
    assert_eq!(doc.page_sizes.len(), 3);
}

#[test]
fn test_short_noise_blocks_are_dropped() {
    let bytes = build_pdf(&[&["ok", "This paragraph is long enough to keep around."]]);

    let extractor = BlockExtractor::new(LopdfBackend::new());
    let doc = extractor.extract(&bytes).unwrap();

    // "ok" merges into the same block as the following line (same text
    // object, small leading), so everything survives as one block.
    assert_eq!(doc.blocks.len(), 1);
    assert!(doc.blocks[0].text.contains("long enough"));
}

#[test]
fn test_page_height_is_reported() {
    let bytes = build_pdf(&[&["Tall enough paragraph for extraction."]]);
    let extractor = BlockExtractor::new(LopdfBackend::new());
    let doc = extractor.extract(&bytes).unwrap();
    assert_eq!(doc.page_height(1), Some(792.0));
}
