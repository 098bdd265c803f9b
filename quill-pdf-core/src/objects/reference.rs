//! Reference resolution and back-reference lookup.
//!
//! A reference is a symbolic `(number, generation)` pointer; resolving it is
//! a document operation, since only the document knows the object table and
//! the dangling-reference policy.

use crate::document::Document;
use crate::error::{PdfError, Result};
use crate::objects::{Handle, Object, ObjectId};

impl Document {
    /// Resolve a handle: references are looked up in the object table, any
    /// other object resolves to itself.
    ///
    /// A dangling reference fails with [`PdfError::InvalidReference`], or
    /// resolves to a fresh null object when `ignore_bad_references` is set.
    pub fn solve(&mut self, handle: Handle) -> Result<Handle> {
        match self.arena.try_get(handle)? {
            Object::Reference(id) => {
                let id = *id;
                self.solve_id(id)
            }
            _ => Ok(handle),
        }
    }

    /// Resolve an object identity against the table.
    pub fn solve_id(&mut self, id: ObjectId) -> Result<Handle> {
        match self.get_object(id) {
            Some(target) => Ok(target),
            None if self.options.ignore_bad_references => Ok(self.arena.alloc(Object::Null)),
            None => Err(PdfError::InvalidReference(format!(
                "cannot resolve reference: {id}"
            ))),
        }
    }

    /// Every container that holds a reference to `id` — answered from the
    /// root objects' xref caches, so the cost scales with the number of
    /// table entries, not the graph size. Streams report themselves rather
    /// than their dictionaries.
    ///
    /// Fails when `id` does not name an indirect object of this document.
    pub fn xrefs_to(&self, id: ObjectId) -> Result<Vec<Handle>> {
        if self.get_object(id).is_none() {
            return Err(PdfError::InvalidReference(format!(
                "not an indirect object of this document: {id}"
            )));
        }

        let mut referrers = Vec::new();
        for root in self.root_objects() {
            match self.arena.get(root) {
                Object::Dictionary(dict) => {
                    if let Some(containers) = dict.xref_cache().get(&id) {
                        referrers.extend(containers.iter().copied());
                    }
                }
                Object::Array(array) => {
                    if let Some(containers) = array.caches.xrefs.get(&id) {
                        referrers.extend(containers.iter().copied());
                    }
                }
                Object::Stream(stream) => {
                    // Occurrences below a stream are attributed to the
                    // stream itself.
                    if let Some(containers) = stream.dict.xref_cache().get(&id) {
                        referrers.extend(std::iter::repeat(root).take(containers.len()));
                    }
                }
                _ => {}
            }
        }
        Ok(referrers)
    }
}
