//! Type guessing and declarative field schemas.
//!
//! Instead of one subclass per PDF dictionary kind, containers carry a
//! [`TypeTag`] and a read-only registry describes, per tag, the
//! characteristic key/value fingerprint used for promotion and the declared
//! fields used for validation and defaults. The registry is built once at
//! first use and never mutated afterwards, so it is safe to share between
//! documents loaded on different threads.

use crate::error::{PdfError, Result};
use crate::objects::{Arena, Dictionary, Handle, Name, Object, ObjectId, PdfType};
use lazy_static::lazy_static;
use std::collections::HashMap;
use tracing::warn;

/// Recognized dictionary and stream specializations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Catalog,
    Pages,
    Page,
    ObjectStream,
    XRefStream,
    Metadata,
    Encryption,
    CryptFilter,
}

impl TypeTag {
    /// The native PDF kind a tagged container must have.
    pub fn native_type(&self) -> PdfType {
        match self {
            TypeTag::Catalog
            | TypeTag::Pages
            | TypeTag::Page
            | TypeTag::Encryption
            | TypeTag::CryptFilter => PdfType::Dictionary,
            TypeTag::ObjectStream | TypeTag::XRefStream | TypeTag::Metadata => PdfType::Stream,
        }
    }
}

/// Static default for a declared field.
#[derive(Debug, Clone, Copy)]
pub enum FieldDefault {
    Name(&'static str),
    Integer(i64),
    Boolean(bool),
}

/// One declared field of a tagged container.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Acceptable native kinds for the value.
    pub kinds: &'static [PdfType],
    /// Specialization expected of a dictionary/stream value, when known.
    /// Used by type propagation: direct values are re-tagged, references
    /// are deferred.
    pub tag_hint: Option<TypeTag>,
    pub required: bool,
    pub default: Option<FieldDefault>,
}

struct Fingerprint {
    tag: TypeTag,
    pairs: &'static [(&'static str, &'static str)],
}

/// Read-only table of fingerprints and field schemas.
pub struct TypeRegistry {
    fingerprints: Vec<Fingerprint>,
    schemas: HashMap<TypeTag, Vec<FieldSpec>>,
}

const D: &[PdfType] = &[PdfType::Dictionary];
const I: &[PdfType] = &[PdfType::Integer];
const N: &[PdfType] = &[PdfType::Name];
const S: &[PdfType] = &[PdfType::String];
const B: &[PdfType] = &[PdfType::Boolean];
const A: &[PdfType] = &[PdfType::Array];
const NA: &[PdfType] = &[PdfType::Name, PdfType::Array];
const DA: &[PdfType] = &[PdfType::Dictionary, PdfType::Array];
const R: &[PdfType] = &[PdfType::Reference];

impl TypeRegistry {
    fn register(
        &mut self,
        tag: TypeTag,
        pairs: &'static [(&'static str, &'static str)],
        fields: Vec<FieldSpec>,
    ) {
        if !pairs.is_empty() {
            self.fingerprints.push(Fingerprint { tag, pairs });
        }
        self.schemas.insert(tag, fields);
    }

    fn builtin() -> Self {
        let mut registry = TypeRegistry {
            fingerprints: Vec::new(),
            schemas: HashMap::new(),
        };

        let field = |name, kinds, tag_hint, required, default| FieldSpec {
            name,
            kinds,
            tag_hint,
            required,
            default,
        };

        registry.register(
            TypeTag::Catalog,
            &[("Type", "Catalog")],
            vec![
                field("Type", N, None, true, Some(FieldDefault::Name("Catalog"))),
                field("Pages", R, Some(TypeTag::Pages), true, None),
                field("Metadata", R, Some(TypeTag::Metadata), false, None),
                field("Version", N, None, false, None),
            ],
        );

        registry.register(
            TypeTag::Pages,
            &[("Type", "Pages")],
            vec![
                field("Type", N, None, true, Some(FieldDefault::Name("Pages"))),
                field("Kids", A, None, true, None),
                field("Count", I, None, true, Some(FieldDefault::Integer(0))),
                field("Parent", R, Some(TypeTag::Pages), false, None),
            ],
        );

        registry.register(
            TypeTag::Page,
            &[("Type", "Page")],
            vec![
                field("Type", N, None, true, Some(FieldDefault::Name("Page"))),
                field("Parent", R, Some(TypeTag::Pages), false, None),
                field("Contents", &[PdfType::Stream, PdfType::Array, PdfType::Reference], None, false, None),
                field("MediaBox", A, None, false, None),
                field("Resources", D, None, false, None),
            ],
        );

        registry.register(
            TypeTag::ObjectStream,
            &[("Type", "ObjStm")],
            vec![
                field("Type", N, None, true, Some(FieldDefault::Name("ObjStm"))),
                field("N", I, None, true, None),
                field("First", I, None, true, None),
                field("Extends", &[PdfType::Stream, PdfType::Reference], None, false, None),
                field("Length", I, None, true, None),
                field("Filter", NA, None, false, None),
                field("DecodeParms", DA, None, false, None),
            ],
        );

        registry.register(
            TypeTag::XRefStream,
            &[("Type", "XRef")],
            vec![
                field("Type", N, None, true, Some(FieldDefault::Name("XRef"))),
                field("Size", I, None, true, None),
                field("W", A, None, true, None),
                field("Index", A, None, false, None),
                field("Length", I, None, true, None),
                field("Filter", NA, None, false, None),
            ],
        );

        registry.register(
            TypeTag::Metadata,
            &[("Type", "Metadata"), ("Subtype", "XML")],
            vec![
                field("Type", N, None, true, Some(FieldDefault::Name("Metadata"))),
                field("Subtype", N, None, true, Some(FieldDefault::Name("XML"))),
                field("Length", I, None, true, None),
            ],
        );

        registry.register(
            TypeTag::Encryption,
            &[],
            vec![
                field("Filter", N, None, true, Some(FieldDefault::Name("Standard"))),
                field("SubFilter", N, None, false, None),
                field("V", I, None, false, Some(FieldDefault::Integer(0))),
                field("Length", I, None, false, Some(FieldDefault::Integer(40))),
                field("CF", D, None, false, None),
                field("StmF", N, None, false, Some(FieldDefault::Name("Identity"))),
                field("StrF", N, None, false, Some(FieldDefault::Name("Identity"))),
                field("R", I, None, true, None),
                field("O", S, None, true, None),
                field("U", S, None, true, None),
                field("OE", S, None, false, None),
                field("UE", S, None, false, None),
                field("Perms", S, None, false, None),
                field("P", I, None, true, Some(FieldDefault::Integer(0))),
                field("EncryptMetadata", B, None, false, Some(FieldDefault::Boolean(true))),
            ],
        );

        registry.register(
            TypeTag::CryptFilter,
            &[],
            vec![
                field("Type", N, None, false, Some(FieldDefault::Name("CryptFilter"))),
                field("CFM", N, None, false, Some(FieldDefault::Name("None"))),
                field("AuthEvent", N, None, false, Some(FieldDefault::Name("DocOpen"))),
                field("Length", I, None, false, None),
            ],
        );

        registry
    }

    /// Most specific registered tag whose fingerprint is a subset of the
    /// dictionary. Fingerprints with more pairs are more derived and win.
    pub fn guess_type(&self, arena: &Arena, dict: &Dictionary, native: PdfType) -> Option<TypeTag> {
        let mut best: Option<(&Fingerprint, usize)> = None;
        for fingerprint in &self.fingerprints {
            if fingerprint.tag.native_type() != native {
                continue;
            }
            let matches = fingerprint.pairs.iter().all(|(key, value)| {
                dict.get(key)
                    .map(|h| arena.get(h).as_name().map(Name::as_str) == Some(*value))
                    .unwrap_or(false)
            });
            if matches {
                let specificity = fingerprint.pairs.len();
                if best.map(|(_, s)| specificity > s).unwrap_or(true) {
                    best = Some((fingerprint, specificity));
                }
            }
        }
        best.map(|(f, _)| f.tag)
    }

    pub fn fields(&self, tag: TypeTag) -> &[FieldSpec] {
        self.schemas.get(&tag).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn field(&self, tag: TypeTag, name: &str) -> Option<&FieldSpec> {
        self.fields(tag).iter().find(|f| f.name == name)
    }
}

lazy_static! {
    /// The process-wide registry. Built on first access, immutable after.
    pub static ref REGISTRY: TypeRegistry = TypeRegistry::builtin();
}

/// A cast postponed because the value was a reference whose target may not
/// be parsed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredCast {
    pub target: ObjectId,
    pub tag: TypeTag,
}

impl Arena {
    /// Re-tag a container as `tag`, keeping numbering, indirection and
    /// caches. Fails when the native kinds differ.
    pub fn cast_to(&mut self, handle: Handle, tag: TypeTag) -> Result<()> {
        let kind = self.get(handle).kind();
        if kind != tag.native_type() {
            return Err(PdfError::TypeMismatch {
                from: kind.to_string(),
                to: format!("{tag:?}"),
            });
        }
        match self.get_mut(handle) {
            Object::Dictionary(dict) => dict.type_tag = Some(tag),
            Object::Stream(stream) => stream.dict.type_tag = Some(tag),
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Check declared field kinds for a tagged container, logging one
    /// warning per mismatch. References are skipped: their targets are
    /// checked where they are defined.
    pub fn type_check(&self, handle: Handle) -> Vec<String> {
        let dict = match self.get(handle).as_dict() {
            Some(d) => d,
            None => return Vec::new(),
        };
        let tag = match dict.type_tag() {
            Some(t) => t,
            None => return Vec::new(),
        };

        let mut complaints = Vec::new();
        for spec in REGISTRY.fields(tag) {
            if let Some(value) = dict.get(spec.name) {
                let kind = self.get(value).kind();
                if kind == PdfType::Reference {
                    continue;
                }
                if !spec.kinds.contains(&kind) {
                    let complaint = format!(
                        "in {tag:?}, field /{} has unexpected type {kind}",
                        spec.name
                    );
                    warn!("{complaint}");
                    complaints.push(complaint);
                }
            }
        }
        complaints
    }

    /// Fill in required fields that carry a static default and are absent.
    pub fn set_required_defaults(&mut self, handle: Handle) -> Result<()> {
        let missing: Vec<FieldSpec> = {
            let dict = match self.get(handle).as_dict() {
                Some(d) => d,
                None => return Ok(()),
            };
            let tag = match dict.type_tag() {
                Some(t) => t,
                None => return Ok(()),
            };
            REGISTRY
                .fields(tag)
                .iter()
                .filter(|spec| {
                    spec.required && spec.default.is_some() && dict.get(spec.name).is_none()
                })
                .copied()
                .collect()
        };

        for spec in missing {
            let Some(default) = spec.default else { continue };
            let value = match default {
                FieldDefault::Name(name) => Object::Name(Name::new(name)),
                FieldDefault::Integer(i) => Object::Integer(i),
                FieldDefault::Boolean(b) => Object::Boolean(b),
            };
            self.dict_set_value(handle, spec.name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::PdfString;

    #[test]
    fn test_guess_catalog() {
        let mut arena = Arena::new();
        let dict = arena.alloc(Object::Dictionary(Dictionary::new()));
        arena
            .dict_set_value(dict, "Type", Object::Name(Name::new("Catalog")))
            .unwrap();
        arena
            .dict_set_value(dict, "Pages", ObjectId::new(3, 0))
            .unwrap();

        let d = arena.get(dict).as_dict().unwrap().clone();
        let tag = REGISTRY.guess_type(&arena, &d, PdfType::Dictionary);
        assert_eq!(tag, Some(TypeTag::Catalog));
    }

    #[test]
    fn test_guess_respects_native_kind() {
        let mut arena = Arena::new();
        let dict = arena.alloc(Object::Dictionary(Dictionary::new()));
        arena
            .dict_set_value(dict, "Type", Object::Name(Name::new("ObjStm")))
            .unwrap();

        let d = arena.get(dict).as_dict().unwrap().clone();
        // ObjStm is a stream fingerprint; a plain dictionary must not match.
        assert_eq!(REGISTRY.guess_type(&arena, &d, PdfType::Dictionary), None);
        assert_eq!(
            REGISTRY.guess_type(&arena, &d, PdfType::Stream),
            Some(TypeTag::ObjectStream)
        );
    }

    #[test]
    fn test_most_specific_fingerprint_wins() {
        // Metadata needs both /Type and /Subtype; with only /Type Metadata
        // there is no single-pair stream fingerprint to fall back to.
        let mut arena = Arena::new();
        let dict = arena.alloc(Object::Dictionary(Dictionary::new()));
        arena
            .dict_set_value(dict, "Type", Object::Name(Name::new("Metadata")))
            .unwrap();
        let d = arena.get(dict).as_dict().unwrap().clone();
        assert_eq!(REGISTRY.guess_type(&arena, &d, PdfType::Stream), None);

        arena
            .dict_set_value(dict, "Subtype", Object::Name(Name::new("XML")))
            .unwrap();
        let d = arena.get(dict).as_dict().unwrap().clone();
        assert_eq!(
            REGISTRY.guess_type(&arena, &d, PdfType::Stream),
            Some(TypeTag::Metadata)
        );
    }

    #[test]
    fn test_cast_to_checks_native_type() {
        let mut arena = Arena::new();
        let dict = arena.alloc(Object::Dictionary(Dictionary::new()));

        assert!(arena.cast_to(dict, TypeTag::Catalog).is_ok());
        assert_eq!(
            arena.get(dict).as_dict().unwrap().type_tag(),
            Some(TypeTag::Catalog)
        );

        // Stream-native tag on a dictionary is an incompatible cast.
        assert!(matches!(
            arena.cast_to(dict, TypeTag::ObjectStream),
            Err(PdfError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_type_check_reports_kind_mismatch() {
        let mut arena = Arena::new();
        let dict = arena.alloc(Object::Dictionary(Dictionary::new()));
        arena.cast_to(dict, TypeTag::Pages).unwrap();
        arena
            .dict_set_value(dict, "Count", PdfString::literal(b"three".to_vec()))
            .unwrap();

        let complaints = arena.type_check(dict);
        assert_eq!(complaints.len(), 1);
        assert!(complaints[0].contains("/Count"));
    }

    #[test]
    fn test_required_defaults_filled() {
        let mut arena = Arena::new();
        let dict = arena.alloc(Object::Dictionary(Dictionary::new()));
        arena.cast_to(dict, TypeTag::Pages).unwrap();
        arena.set_required_defaults(dict).unwrap();

        let type_value = arena.dict_get(dict, "Type").unwrap();
        assert_eq!(
            arena.get(type_value).as_name().map(Name::as_str),
            Some("Pages")
        );
        let count = arena.dict_get(dict, "Count").unwrap();
        assert_eq!(arena.get(count).as_integer(), Some(0));
        // Kids is required but has no static default, so it stays absent.
        assert!(arena.dict_get(dict, "Kids").is_none());
    }
}
