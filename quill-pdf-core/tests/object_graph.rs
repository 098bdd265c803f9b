//! Integration tests for the object graph: parsing, resolution, object
//! streams and serialization working together.

use quill_pdf::{Document, Object, ObjectId, PdfType, TypeTag};

#[test]
fn reference_round_trip_for_inserted_objects() {
    let mut doc = Document::new();
    let mut inserted = Vec::new();
    for i in 0..20i64 {
        inserted.push(doc.insert(Object::Integer(i)));
    }

    for (id, handle) in inserted {
        let reference = doc.arena().reference(handle).unwrap();
        assert_eq!(reference, id);
        let ref_handle = doc.arena_mut().alloc(Object::Reference(reference));
        assert_eq!(doc.solve(ref_handle).unwrap(), handle);
    }
}

#[test]
fn load_body_and_resolve_page_tree() {
    let body = b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
                 2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n\
                 3 0 obj\n<< /Type /Page /Parent 2 0 R >>\nendobj\n\
                 trailer\n<< /Size 4 /Root 1 0 R >>";

    let mut doc = Document::new();
    let loaded = doc.load_objects(body).unwrap();
    assert_eq!(loaded.len(), 3);

    let catalog = doc.get_object(ObjectId::new(1, 0)).unwrap();
    assert_eq!(
        doc.arena().get(catalog).as_dict().unwrap().type_tag(),
        Some(TypeTag::Catalog)
    );

    let pages_ref = doc.arena().dict_get(catalog, "Pages").unwrap();
    let pages = doc.solve(pages_ref).unwrap();
    assert_eq!(
        doc.arena().get(pages).as_dict().unwrap().type_tag(),
        Some(TypeTag::Pages)
    );

    // "Who points at the page tree" via the container caches.
    let referrers = doc.xrefs_to(ObjectId::new(2, 0)).unwrap();
    assert_eq!(referrers.len(), 2); // the catalog and the page's /Parent
}

#[test]
fn object_stream_through_document() {
    let mut doc = Document::new();
    let body = b"7 0 obj\n<< /Type /ObjStm /N 2 /First 10 /Length 20 >>\nstream\n\
                 11 0 12 8 (hello) 42\nendstream\nendobj";
    doc.load_objects(body).unwrap();

    let objstm = doc.get_object(ObjectId::new(7, 0)).unwrap();
    assert_eq!(
        doc.arena().get(objstm).as_dict().unwrap().type_tag(),
        Some(TypeTag::ObjectStream)
    );

    doc.load_object_stream(objstm).unwrap();
    let extracted = doc.arena_mut().objstm_extract(objstm, 11).unwrap().unwrap();
    let meta = doc.arena().meta(extracted);
    assert!(meta.indirect);
    assert_eq!(meta.number, 11);
    assert_eq!(meta.parent, Some(objstm));

    // Appending a new object re-numbers and compacts.
    let extra = doc.arena_mut().alloc(Object::Integer(-5));
    let new_id = doc.objstm_insert(objstm, extra).unwrap();
    assert!(new_id.number() > 7);

    doc.arena_mut().objstm_prebuild(objstm).unwrap();
    let n = doc.arena().dict_get(objstm, "N").unwrap();
    assert_eq!(doc.arena().get(n).as_integer(), Some(3));
}

#[test]
fn serialize_and_reparse_document_body() {
    let mut doc = Document::new();
    let body = b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
                 2 0 obj\n<< /Type /Pages /Kids [] /Count 0 /Label (root) >>\nendobj";
    doc.load_objects(body).unwrap();

    let mut serialized = Vec::new();
    let roots: Vec<_> = doc.root_objects().collect();
    for handle in roots {
        let bytes = quill_pdf::writer::to_wire_bytes(doc.arena_mut(), handle).unwrap();
        serialized.extend_from_slice(&bytes);
    }

    let mut reparsed = Document::new();
    reparsed.load_objects(&serialized).unwrap();
    assert_eq!(reparsed.len(), 2);

    let pages = reparsed.get_object(ObjectId::new(2, 0)).unwrap();
    let label = reparsed.arena().dict_get(pages, "Label").unwrap();
    assert_eq!(
        reparsed.arena().get(label).as_string().map(|s| s.as_bytes()),
        Some(&b"root"[..])
    );
}

#[test]
fn export_produces_detached_logical_copy() {
    let mut doc = Document::new();
    let (shared_id, _) = doc.insert(Object::from("shared value"));

    let body = format!(
        "5 0 obj << /Data {} 0 R /List [{} 0 R] >> endobj",
        shared_id.number(),
        shared_id.number()
    );
    doc.load_objects(body.as_bytes()).unwrap();

    let root = doc.get_object(ObjectId::new(5, 0)).unwrap();
    let exported = doc.export(root).unwrap();

    assert!(!doc.arena().meta(exported).indirect);
    let data = doc.arena().dict_get(exported, "Data").unwrap();
    assert_eq!(doc.arena().get(data).kind(), PdfType::String);

    // The inlined copy is shared between both referencing sites.
    let list = doc.arena().dict_get(exported, "List").unwrap();
    let first = match doc.arena().get(list) {
        Object::Array(a) => a.get(0).unwrap(),
        _ => unreachable!(),
    };
    assert_eq!(first, data);
}

#[test]
fn unterminated_object_is_recoverable() {
    let mut doc = Document::new();
    let err = doc
        .load_objects(b"9 0 obj (partial but usable)")
        .unwrap_err();
    let text = err.to_string();
    assert!(text.contains("endobj"), "unexpected error: {text}");
}
