//! The owning layer of an object graph: the object table, numbering,
//! option flags and document-wide policies.
//!
//! File-level structure (cross-reference tables, trailers, incremental
//! updates) belongs to a surrounding loader; this type consumes a body of
//! `N G obj` framed objects and the trailer facts it needs (`/ID`,
//! `/Encrypt`).

use crate::error::{PdfError, Result};
use crate::objects::schema::DeferredCast;
use crate::objects::{Arena, Handle, Object, ObjectId, PdfType, TypeTag};
use crate::parser::{ObjectParser, ParseOptions};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::warn;

/// Document-wide behavior flags.
#[derive(Debug, Clone, Copy)]
pub struct DocumentOptions {
    /// Promote parsed dictionaries/streams to registered specializations.
    pub enable_type_guessing: bool,
    /// Cast schema-typed fields, deferring casts through references.
    pub enable_type_propagation: bool,
    /// Check declared field kinds after loading, logging mismatches.
    pub enable_type_checking: bool,
    /// Resolve dangling references to null instead of failing.
    pub ignore_bad_references: bool,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            enable_type_guessing: true,
            enable_type_propagation: false,
            enable_type_checking: false,
            ignore_bad_references: false,
        }
    }
}

/// One document's object graph and table of indirect objects.
#[derive(Default)]
pub struct Document {
    pub(crate) arena: Arena,
    pub(crate) table: BTreeMap<ObjectId, Handle>,
    max_number: u32,
    pub options: DocumentOptions,
    /// First element of the trailer `/ID`, when known.
    pub(crate) file_id: Option<Vec<u8>>,
    /// The `/Encrypt` dictionary, when the document is encrypted.
    pub(crate) encrypt_dict: Option<Handle>,
    pub(crate) crypt: Option<crate::encryption::EncryptionState>,
    deferred_casts: Vec<DeferredCast>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: DocumentOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Allocate a fresh `(number, 0)` identity.
    pub fn alloc_object_id(&mut self) -> ObjectId {
        self.max_number += 1;
        ObjectId::new(self.max_number, 0)
    }

    /// Register an existing object as indirect, numbering it when needed.
    pub fn add_object(&mut self, handle: Handle) -> Result<ObjectId> {
        let id = match self.arena.meta(handle).number {
            0 => self.alloc_object_id(),
            _ => self.arena.meta(handle).id(),
        };
        self.add_object_with_id(id, handle)?;
        Ok(id)
    }

    pub fn add_object_with_id(&mut self, id: ObjectId, handle: Handle) -> Result<()> {
        self.arena.try_get(handle)?;
        self.arena.set_indirect(handle, true);
        self.arena.set_object_id(handle, id.number(), id.generation());
        self.max_number = self.max_number.max(id.number());
        self.table.insert(id, handle);
        Ok(())
    }

    /// Allocate a value and register it in one step.
    pub fn insert(&mut self, object: Object) -> (ObjectId, Handle) {
        let handle = self.arena.alloc(object);
        let id = self.alloc_object_id();
        self.arena.set_indirect(handle, true);
        self.arena.set_object_id(handle, id.number(), id.generation());
        self.table.insert(id, handle);
        (id, handle)
    }

    pub fn get_object(&self, id: ObjectId) -> Option<Handle> {
        self.table.get(&id).copied()
    }

    /// Remove an object from the table. The slot itself stays allocated;
    /// the object merely becomes unreachable through the document.
    pub fn remove_object(&mut self, id: ObjectId) -> Option<Handle> {
        self.table.remove(&id)
    }

    /// Table-level (root) objects, in id order.
    pub fn root_objects(&self) -> impl Iterator<Item = Handle> + '_ {
        self.table.values().copied()
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, Handle)> + '_ {
        self.table.iter().map(|(id, h)| (*id, *h))
    }

    pub fn set_file_id(&mut self, id: Vec<u8>) {
        self.file_id = Some(id);
    }

    pub fn file_id(&self) -> Option<&[u8]> {
        self.file_id.as_deref()
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypt_dict.is_some()
    }

    pub fn set_encrypt_dict(&mut self, handle: Handle) {
        self.encrypt_dict = Some(handle);
    }

    pub fn encrypt_dict(&self) -> Option<Handle> {
        self.encrypt_dict
    }

    fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            type_guessing: self.options.enable_type_guessing,
            type_propagation: self.options.enable_type_propagation,
        }
    }

    /// Parse a body of `N G obj … endobj` framed objects and register them.
    /// Stops at end of input or a body-end keyword. Grammar errors surface
    /// to the caller; skip-to-next-object recovery is the loader's business.
    pub fn load_objects(&mut self, data: &[u8]) -> Result<Vec<ObjectId>> {
        let mut parser = ObjectParser::with_options(data, self.parse_options());
        let mut loaded = Vec::new();

        while let Some(handle) = parser.parse_indirect_object(&mut self.arena)? {
            let id = self.arena.meta(handle).id();
            self.max_number = self.max_number.max(id.number());
            self.table.insert(id, handle);
            loaded.push(id);
        }

        self.deferred_casts.extend(parser.take_deferred_casts());
        self.apply_deferred_casts();

        if self.options.enable_type_checking {
            for id in &loaded {
                if let Some(handle) = self.get_object(*id) {
                    self.arena.type_check(handle);
                }
            }
        }
        Ok(loaded)
    }

    /// Apply casts that were deferred because the target was a reference.
    /// Targets that never materialized, or whose kind no longer matches,
    /// are dropped with a warning.
    pub fn apply_deferred_casts(&mut self) {
        let pending = std::mem::take(&mut self.deferred_casts);
        for cast in pending {
            match self.get_object(cast.target) {
                Some(handle) if self.arena.get(handle).kind() == cast.tag.native_type() => {
                    // Kind was checked, the cast cannot fail.
                    let _ = self.arena.cast_to(handle, cast.tag);
                }
                Some(_) => warn!(
                    "dropping deferred cast of {} to {:?}: kind mismatch",
                    cast.target, cast.tag
                ),
                None => self.deferred_casts.push(cast),
            }
        }
    }

    pub(crate) fn push_deferred_casts(&mut self, casts: Vec<DeferredCast>) {
        self.deferred_casts.extend(casts);
        self.apply_deferred_casts();
    }

    /// Substitute direct copies for indirect `/Length`, `/Filter` and
    /// `/DecodeParms` entries so the arena-level pipeline can run.
    fn normalize_stream_meta(&mut self, handle: Handle) -> Result<()> {
        for key in ["Length", "Filter", "DecodeParms"] {
            let Some(value) = self.arena.dict_get(handle, key) else {
                continue;
            };
            let Object::Reference(id) = self.arena.get(value) else {
                continue;
            };
            let id = *id;
            let target = self.solve_id(id)?;
            let copy = self.arena.deep_copy(target);
            self.arena.set_indirect(copy, false);
            self.arena.dict_set(handle, key, copy)?;
        }
        Ok(())
    }

    /// Decoded stream body; document-level variant that tolerates indirect
    /// filter specifications.
    pub fn stream_data(&mut self, handle: Handle) -> Result<Vec<u8>> {
        self.normalize_stream_meta(handle)?;
        Ok(self.arena.stream_data(handle)?.to_vec())
    }

    /// Raw stream body; see [`Document::stream_data`].
    pub fn stream_raw_data(&mut self, handle: Handle) -> Result<Vec<u8>> {
        self.normalize_stream_meta(handle)?;
        Ok(self.arena.stream_raw_data(handle)?.to_vec())
    }

    /// Load an object stream with this document's options and apply any
    /// deferred casts its sub-objects produced.
    pub fn load_object_stream(&mut self, handle: Handle) -> Result<()> {
        self.normalize_stream_meta(handle)?;
        let casts = self.arena.objstm_load_with(handle, self.parse_options())?;
        self.push_deferred_casts(casts);
        Ok(())
    }

    /// Exportable copy: a deep clone with every reference resolved and
    /// inlined, detached from the document. References to the catalog or
    /// the page tree root are dropped to bound the recursion.
    pub fn export(&mut self, handle: Handle) -> Result<Handle> {
        let copy = self.arena.deep_copy(handle);
        let mut visited = HashSet::new();
        let mut inlined: HashMap<ObjectId, Handle> = HashMap::new();
        self.inline_references(copy, &mut visited, &mut inlined)?;

        self.arena.set_indirect(copy, false);
        self.arena.meta_mut(copy).parent = None;
        if let Some(dict) = match self.arena.get_mut(copy) {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&mut s.dict),
            _ => None,
        } {
            dict.caches.xrefs.clear();
        }
        Ok(copy)
    }

    fn is_recursion_bound(&self, handle: Handle) -> bool {
        matches!(
            self.arena
                .get(handle)
                .as_dict()
                .and_then(|dict| dict.type_tag()),
            Some(TypeTag::Catalog) | Some(TypeTag::Pages)
        )
    }

    fn inline_target(
        &mut self,
        id: ObjectId,
        inlined: &mut HashMap<ObjectId, Handle>,
    ) -> Result<Option<Handle>> {
        if let Some(&existing) = inlined.get(&id) {
            return Ok(Some(existing));
        }
        let target = match self.get_object(id) {
            Some(target) => target,
            None if self.options.ignore_bad_references => {
                return Ok(Some(self.arena.alloc(Object::Null)))
            }
            None => return Err(PdfError::InvalidReference(id.to_string())),
        };
        if self.is_recursion_bound(target) {
            return Ok(None);
        }
        let copy = self.arena.deep_copy(target);
        self.arena.set_indirect(copy, false);
        inlined.insert(id, copy);
        Ok(Some(copy))
    }

    fn inline_references(
        &mut self,
        handle: Handle,
        visited: &mut HashSet<Handle>,
        inlined: &mut HashMap<ObjectId, Handle>,
    ) -> Result<()> {
        if !visited.insert(handle) {
            return Ok(());
        }

        match self.arena.get(handle).kind() {
            PdfType::Dictionary | PdfType::Stream => {
                let entries: Vec<(crate::objects::Name, Handle)> = self
                    .arena
                    .get(handle)
                    .as_dict()
                    .map(|d| d.iter().map(|(k, v)| (k.clone(), v)).collect())
                    .unwrap_or_default();

                for (key, value) in entries {
                    if let Object::Reference(id) = self.arena.get(value) {
                        let id = *id;
                        match self.inline_target(id, inlined)? {
                            Some(copy) => {
                                self.arena.dict_set(handle, key, copy)?;
                                self.inline_references(copy, visited, inlined)?;
                            }
                            // Catalog/page-tree target: drop the entry.
                            None => {
                                self.arena.dict_remove(handle, &key)?;
                            }
                        }
                    } else {
                        self.inline_references(value, visited, inlined)?;
                    }
                }
            }
            PdfType::Array => {
                let items: Vec<Handle> = match self.arena.get(handle) {
                    Object::Array(a) => a.iter().collect(),
                    _ => Vec::new(),
                };
                for (index, item) in items.into_iter().enumerate() {
                    if let Object::Reference(id) = self.arena.get(item) {
                        let id = *id;
                        match self.inline_target(id, inlined)? {
                            Some(copy) => {
                                self.arena.array_set(handle, index, copy)?;
                                self.inline_references(copy, visited, inlined)?;
                            }
                            None => {
                                let null = self.arena.alloc(Object::Null);
                                self.arena.array_set(handle, index, null)?;
                            }
                        }
                    } else {
                        self.inline_references(item, visited, inlined)?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}
