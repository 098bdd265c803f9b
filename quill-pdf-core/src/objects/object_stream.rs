//! Object streams: streams whose decoded body packs multiple indirect
//! objects (PDF 1.5+).
//!
//! The body starts with `N` pairs of `object-number offset` integers; the
//! objects themselves follow back to back, offsets relative to `/First`.
//! Unpacking is lazy: nothing is parsed until the first structural access.

use crate::document::Document;
use crate::error::{PdfError, Result};
use crate::objects::schema::DeferredCast;
use crate::objects::{Arena, Handle, Object, ObjectId};
use crate::parser::lexer::Number;
use crate::parser::{ObjectParser, ParseOptions};
use crate::writer;
use std::collections::BTreeMap;

impl Arena {
    fn objstm_header(&self, handle: Handle) -> Result<(usize, usize)> {
        let dict = &self.stream(handle)?.dict;
        let count = dict
            .get("N")
            .and_then(|h| self.get(h).as_integer())
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| PdfError::MissingKey("N".to_string()))?;
        let first = dict
            .get("First")
            .and_then(|h| self.get(h).as_integer())
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| PdfError::MissingKey("First".to_string()))?;
        Ok((count, first))
    }

    /// Decode and unpack the stream's sub-objects. Idempotent; returns any
    /// type casts the sub-object parser deferred.
    pub fn objstm_load_with(
        &mut self,
        handle: Handle,
        options: ParseOptions,
    ) -> Result<Vec<DeferredCast>> {
        if self.stream(handle)?.packed.is_some() {
            return Ok(Vec::new());
        }

        let (count, first) = self.objstm_header(handle)?;
        let data = self.stream_data(handle)?.to_vec();
        let mut parser = ObjectParser::with_options(&data, options);

        let mut table = Vec::with_capacity(count);
        for _ in 0..count {
            parser.lexer.skip_whitespace();
            let number = match parser.lexer.read_number() {
                Ok(Number::Integer(n)) => u32::try_from(n).ok(),
                _ => None,
            };
            parser.lexer.skip_whitespace();
            let offset = match parser.lexer.read_number() {
                Ok(Number::Integer(n)) => usize::try_from(n).ok(),
                _ => None,
            };
            match (number, offset) {
                (Some(number), Some(offset)) => table.push((number, offset)),
                _ => {
                    return Err(PdfError::InvalidStreamObject(
                        "bad object stream offset table".to_string(),
                    ))
                }
            }
        }

        let mut packed = BTreeMap::new();
        for (number, offset) in table {
            let position = first.checked_add(offset).filter(|p| *p <= data.len());
            let Some(position) = position else {
                return Err(PdfError::InvalidStreamObject(format!(
                    "object {number} offset lies outside the stream body"
                )));
            };
            parser.lexer.seek(position);
            let object = parser.parse_object(self)?;

            self.set_indirect(object, true);
            self.set_object_id(object, number, 0);
            let meta = self.meta_mut(object);
            meta.parent = Some(handle);
            meta.objstm_offset = Some(offset);
            packed.insert(number, object);
        }

        self.stream_mut(handle)?.packed = Some(packed);
        Ok(parser.take_deferred_casts())
    }

    pub fn objstm_load(&mut self, handle: Handle) -> Result<()> {
        self.objstm_load_with(handle, ParseOptions::default())?;
        Ok(())
    }

    /// The packed object with number `number`.
    pub fn objstm_extract(&mut self, handle: Handle, number: u32) -> Result<Option<Handle>> {
        self.objstm_load(handle)?;
        Ok(self
            .stream(handle)?
            .packed
            .as_ref()
            .and_then(|map| map.get(&number).copied()))
    }

    /// The packed object at position `index` in number order.
    pub fn objstm_extract_by_index(
        &mut self,
        handle: Handle,
        index: usize,
    ) -> Result<Option<(u32, Handle)>> {
        self.objstm_load(handle)?;
        Ok(self
            .stream(handle)?
            .packed
            .as_ref()
            .and_then(|map| map.iter().nth(index).map(|(n, h)| (*n, *h))))
    }

    pub fn objstm_contains(&mut self, handle: Handle, number: u32) -> Result<bool> {
        Ok(self.objstm_extract(handle, number)?.is_some())
    }

    /// Position of `number` in the stream's number order.
    pub fn objstm_index_of(&mut self, handle: Handle, number: u32) -> Result<Option<usize>> {
        self.objstm_load(handle)?;
        Ok(self
            .stream(handle)?
            .packed
            .as_ref()
            .and_then(|map| map.keys().position(|n| *n == number)))
    }

    /// All packed objects in number order.
    pub fn objstm_objects(&mut self, handle: Handle) -> Result<Vec<Handle>> {
        self.objstm_load(handle)?;
        Ok(self
            .stream(handle)?
            .packed
            .as_ref()
            .map(|map| map.values().copied().collect())
            .unwrap_or_default())
    }

    pub fn objstm_remove(&mut self, handle: Handle, number: u32) -> Result<Option<Handle>> {
        self.objstm_load(handle)?;
        Ok(self
            .stream_mut(handle)?
            .packed
            .as_mut()
            .and_then(|map| map.remove(&number)))
    }

    /// Flatten in-memory edits back to bytes: re-serialize the held objects
    /// sorted by number and rebuild the offset table, `/N` and `/First`.
    pub fn objstm_prebuild(&mut self, handle: Handle) -> Result<()> {
        self.objstm_load(handle)?;
        let packed = self.stream(handle)?.packed.clone().unwrap_or_default();

        let mut prolog = String::new();
        let mut body = Vec::new();
        let mut offset = 0usize;

        for (number, object) in &packed {
            let mut bytes = Vec::new();
            writer::write_direct(self, *object, &mut bytes)?;
            bytes.push(b' ');

            prolog.push_str(&format!("{number} {offset} "));
            self.meta_mut(*object).objstm_offset = Some(offset);
            offset += bytes.len();
            body.extend_from_slice(&bytes);
        }

        let first = prolog.len();
        let mut data = prolog.into_bytes();
        data.extend_from_slice(&body);

        self.set_stream_data(handle, data)?;
        self.dict_set_value(handle, "N", packed.len() as i64)?;
        self.dict_set_value(handle, "First", first as i64)?;
        Ok(())
    }
}

impl Document {
    /// Append an object to an object stream, numbering it when needed.
    /// Streams and objects with a non-zero generation cannot be packed.
    pub fn objstm_insert(&mut self, stream: Handle, object: Handle) -> Result<ObjectId> {
        if self.arena.meta(object).generation != 0 {
            return Err(PdfError::InvalidObject(
                "cannot store an object with generation > 0 in an object stream".to_string(),
            ));
        }
        if matches!(self.arena.get(object), Object::Stream(_)) {
            return Err(PdfError::InvalidObject(
                "cannot store a stream in an object stream".to_string(),
            ));
        }

        self.arena.objstm_load(stream)?;

        let number = match self.arena.meta(object).number {
            0 => self.alloc_object_id().number(),
            number => number,
        };
        self.arena.set_indirect(object, true);
        self.arena.set_object_id(object, number, 0);
        self.arena.meta_mut(object).parent = Some(stream);

        if let Some(packed) = self.arena.stream_mut(stream)?.packed.as_mut() {
            packed.insert(number, object);
        }
        Ok(ObjectId::new(number, 0))
    }
}
