//! End-to-end encryption tests: encrypt a document, serialize it, reparse
//! the bytes, and decrypt with the same password. Plaintext must come back
//! byte-identical for every supported cipher/key-size/revision combination.

use quill_pdf::encryption::{EncryptOptions, EncryptionAlgorithm, Permissions};
use quill_pdf::{Document, Object, ObjectId, Stream};

const STRING_PLAIN: &[u8] = b"string payload \x00\x01\xfe";
const STREAM_PLAIN: &[u8] = b"stream payload, long enough to span multiple AES blocks....";

fn build_document() -> (Document, ObjectId, ObjectId) {
    let mut doc = Document::new();
    doc.set_file_id(b"integration-id16".to_vec());

    let (string_id, _) = doc.insert(Object::from(STRING_PLAIN.to_vec()));

    let stream = doc.arena_mut().alloc(Object::Stream(Stream::new()));
    doc.arena_mut()
        .set_stream_data(stream, STREAM_PLAIN.to_vec())
        .unwrap();
    let stream_id = doc.add_object(stream).unwrap();

    (doc, string_id, stream_id)
}

fn serialize(doc: &mut Document) -> Vec<u8> {
    let mut out = Vec::new();
    let roots: Vec<_> = doc.root_objects().collect();
    for handle in roots {
        let bytes = quill_pdf::writer::to_wire_bytes(doc.arena_mut(), handle).unwrap();
        out.extend_from_slice(&bytes);
    }
    out
}

fn full_cycle(options: EncryptOptions, password: &[u8]) {
    let (mut doc, string_id, stream_id) = build_document();
    doc.encrypt(&options).unwrap();
    let encrypt_id = doc
        .arena()
        .meta(doc.encrypt_dict().unwrap())
        .id();

    // Ship the bytes to a "fresh process": serialize every root object and
    // parse them back into a brand new document.
    let bytes = serialize(&mut doc);
    let mut fresh = Document::new();
    fresh.load_objects(&bytes).unwrap();
    fresh.set_file_id(b"integration-id16".to_vec());
    let encrypt_handle = fresh.get_object(encrypt_id).unwrap();
    fresh.set_encrypt_dict(encrypt_handle);

    // The ciphertext must not leak the plaintext.
    let string = fresh.get_object(string_id).unwrap();
    assert_ne!(
        fresh.arena().get(string).as_string().unwrap().as_bytes(),
        STRING_PLAIN
    );

    fresh.decrypt(password).unwrap();

    let string = fresh.get_object(string_id).unwrap();
    assert_eq!(
        fresh.arena().get(string).as_string().unwrap().as_bytes(),
        STRING_PLAIN
    );

    let stream = fresh.get_object(stream_id).unwrap();
    assert_eq!(fresh.stream_data(stream).unwrap(), STREAM_PLAIN);
}

fn options(cipher: EncryptionAlgorithm, key_size: u32, hardened: bool) -> EncryptOptions {
    EncryptOptions {
        user_password: b"us3r".to_vec(),
        owner_password: b"0wner".to_vec(),
        cipher,
        key_size,
        hardened,
        encrypt_metadata: true,
        permissions: Permissions::all_permissions(),
    }
}

#[test]
fn rc4_key_sizes_user_password() {
    for key_size in (40..=128).step_by(8) {
        full_cycle(options(EncryptionAlgorithm::Rc4, key_size, false), b"us3r");
    }
}

#[test]
fn rc4_owner_password() {
    full_cycle(options(EncryptionAlgorithm::Rc4, 128, false), b"0wner");
}

#[test]
fn aes_128_revision_4() {
    full_cycle(options(EncryptionAlgorithm::Aes, 128, false), b"us3r");
    full_cycle(options(EncryptionAlgorithm::Aes, 128, false), b"0wner");
}

#[test]
fn aes_256_revision_5() {
    full_cycle(options(EncryptionAlgorithm::Aes, 256, false), b"us3r");
    full_cycle(options(EncryptionAlgorithm::Aes, 256, false), b"0wner");
}

#[test]
fn aes_256_revision_6_hardened() {
    full_cycle(options(EncryptionAlgorithm::Aes, 256, true), b"us3r");
    full_cycle(options(EncryptionAlgorithm::Aes, 256, true), b"0wner");
}

#[test]
fn wrong_password_reports_invalid_password() {
    let (mut doc, _, _) = build_document();
    doc.encrypt(&options(EncryptionAlgorithm::Aes, 256, false))
        .unwrap();
    let encrypt_id = doc.arena().meta(doc.encrypt_dict().unwrap()).id();

    let bytes = serialize(&mut doc);
    let mut fresh = Document::new();
    fresh.load_objects(&bytes).unwrap();
    fresh.set_file_id(b"integration-id16".to_vec());
    let encrypt_handle = fresh.get_object(encrypt_id).unwrap();
    fresh.set_encrypt_dict(encrypt_handle);

    match fresh.decrypt(b"guess") {
        Err(quill_pdf::PdfError::EncryptionInvalidPassword) => {}
        other => panic!("expected an invalid-password failure, got {other:?}"),
    }
}

#[test]
fn tampered_aes_ciphertext_fails_padding_check() {
    let (mut doc, string_id, _) = build_document();
    doc.encrypt(&options(EncryptionAlgorithm::Aes, 128, false))
        .unwrap();

    // Corrupt the last ciphertext byte of the encrypted string.
    let string = doc.get_object(string_id).unwrap();
    match doc.arena_mut().get_mut(string) {
        Object::String(s) => {
            let last = s.data.len() - 1;
            s.data[last] ^= 0x01;
        }
        _ => unreachable!(),
    }

    let encrypt_id = doc.arena().meta(doc.encrypt_dict().unwrap()).id();
    let bytes = serialize(&mut doc);
    let mut fresh = Document::new();
    fresh.load_objects(&bytes).unwrap();
    fresh.set_file_id(b"integration-id16".to_vec());
    let encrypt_handle = fresh.get_object(encrypt_id).unwrap();
    fresh.set_encrypt_dict(encrypt_handle);

    match fresh.decrypt(b"us3r") {
        Err(quill_pdf::PdfError::Encryption(message)) => {
            assert!(message.contains("padding"), "unexpected message: {message}");
        }
        other => panic!("expected a padding failure, got {other:?}"),
    }
}
