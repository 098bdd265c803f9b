//! Object grammar parsing: one-character lookahead dispatch, composite
//! assembly into the arena, and `N G obj … endobj` framing.

use super::lexer::{Lexer, Number};
use super::{ParseError, ParseResult};
use crate::error::PdfError;
use crate::objects::schema::{DeferredCast, REGISTRY};
use crate::objects::{Arena, Dictionary, Handle, Name, Object, ObjectId, PdfString, Stream};

/// Parser behavior toggles, mirrored from the owning document's options.
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Promote dictionaries and streams to registered specializations.
    pub type_guessing: bool,
    /// Cast schema-typed fields; casts through references are deferred.
    pub type_propagation: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            type_guessing: true,
            type_propagation: false,
        }
    }
}

/// Recursive-descent parser over an in-memory buffer.
pub struct ObjectParser<'a> {
    pub lexer: Lexer<'a>,
    options: ParseOptions,
    deferred: Vec<DeferredCast>,
}

fn graph_err(position: usize) -> impl FnOnce(PdfError) -> ParseError {
    move |e| ParseError::Syntax {
        position,
        message: e.to_string(),
    }
}

impl<'a> ObjectParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_options(data, ParseOptions::default())
    }

    pub fn with_options(data: &'a [u8], options: ParseOptions) -> Self {
        Self {
            lexer: Lexer::new(data),
            options,
            deferred: Vec::new(),
        }
    }

    /// Casts recorded for reference-valued fields whose targets were not
    /// parsed yet. The document applies them once loading is done.
    pub fn take_deferred_casts(&mut self) -> Vec<DeferredCast> {
        std::mem::take(&mut self.deferred)
    }

    /// Parse one direct object, dispatching on a one-character lookahead.
    pub fn parse_object(&mut self, arena: &mut Arena) -> ParseResult<Handle> {
        self.lexer.skip_whitespace();
        let offset = self.lexer.pos();

        let handle = match self.lexer.peek() {
            None => return Err(ParseError::UnexpectedEof),
            Some(b'/') => {
                let name = self.lexer.read_name()?;
                arena.alloc(Object::Name(Name(String::from_utf8_lossy(&name).into_owned())))
            }
            Some(b'<') => {
                if self.lexer.peek_at(1) == Some(b'<') {
                    self.parse_dictionary_or_stream(arena)?
                } else {
                    let data = self.lexer.read_hex_string()?;
                    arena.alloc(Object::String(PdfString::hexadecimal(data)))
                }
            }
            Some(b'(') => {
                let data = self.lexer.read_literal_string()?;
                arena.alloc(Object::String(PdfString::literal(data)))
            }
            Some(b'[') => self.parse_array(arena)?,
            Some(b'n') => {
                if self.lexer.accept_keyword("null") {
                    arena.alloc(Object::Null)
                } else {
                    return Err(ParseError::UnknownObjectType(offset));
                }
            }
            Some(b't') => {
                if self.lexer.accept_keyword("true") {
                    arena.alloc(Object::Boolean(true))
                } else {
                    return Err(ParseError::UnknownObjectType(offset));
                }
            }
            Some(b'f') => {
                if self.lexer.accept_keyword("false") {
                    arena.alloc(Object::Boolean(false))
                } else {
                    return Err(ParseError::UnknownObjectType(offset));
                }
            }
            Some(b'0'..=b'9' | b'+' | b'-' | b'.') => self.parse_number_or_reference(arena)?,
            Some(_) => return Err(ParseError::UnknownObjectType(offset)),
        };

        arena.meta_mut(handle).file_offset = Some(offset);
        Ok(handle)
    }

    /// `N G R` lookahead: two non-negative integers followed by `R` make a
    /// reference, anything else is a plain number.
    fn parse_number_or_reference(&mut self, arena: &mut Arena) -> ParseResult<Handle> {
        let number = self.lexer.read_number()?;

        if let Number::Integer(n) = number {
            if let Ok(refno) = u32::try_from(n) {
                let checkpoint = self.lexer.pos();
                if let Some(refgen) = self.try_reference_tail() {
                    return Ok(arena.alloc(Object::Reference(ObjectId::new(refno, refgen))));
                }
                self.lexer.seek(checkpoint);
            }
        }

        Ok(match number {
            Number::Integer(i) => arena.alloc(Object::Integer(i)),
            Number::Real(r) => arena.alloc(Object::Real(r)),
        })
    }

    fn try_reference_tail(&mut self) -> Option<u16> {
        self.lexer.skip_whitespace();
        if !matches!(self.lexer.peek(), Some(b'0'..=b'9')) {
            return None;
        }
        let generation = match self.lexer.read_number() {
            Ok(Number::Integer(g)) => u16::try_from(g).ok()?,
            _ => return None,
        };
        self.lexer.skip_whitespace();
        if self.lexer.accept_keyword("R") {
            Some(generation)
        } else {
            None
        }
    }

    fn parse_array(&mut self, arena: &mut Arena) -> ParseResult<Handle> {
        let offset = self.lexer.pos();
        self.lexer.bump(); // consume '['
        let array = arena.alloc(Object::Array(crate::objects::Array::new()));

        loop {
            self.lexer.skip_whitespace();
            match self.lexer.peek() {
                Some(b']') => {
                    self.lexer.bump();
                    break;
                }
                None => {
                    return Err(ParseError::Syntax {
                        position: offset,
                        message: "unterminated array".to_string(),
                    })
                }
                Some(_) => {
                    let item = self.parse_object(arena)?;
                    arena.array_push(array, item).map_err(graph_err(offset))?;
                }
            }
        }
        Ok(array)
    }

    fn parse_dictionary_or_stream(&mut self, arena: &mut Arena) -> ParseResult<Handle> {
        let offset = self.lexer.pos();
        self.lexer.bump();
        self.lexer.bump(); // consume '<<'

        let handle = arena.alloc(Object::Dictionary(Dictionary::new()));

        loop {
            self.lexer.skip_whitespace();
            if self.lexer.accept_keyword(">>") {
                break;
            }
            if self.lexer.peek() != Some(b'/') {
                return Err(ParseError::InvalidDictionary {
                    position: self.lexer.pos(),
                    message: "dictionary keys must be names".to_string(),
                });
            }
            let key = self.lexer.read_name()?;
            let key = Name(String::from_utf8_lossy(&key).into_owned());
            let value = self.parse_object(arena)?;
            arena.dict_set(handle, key, value).map_err(graph_err(offset))?;
        }

        // `<< … >> stream` turns the dictionary into a stream in place, so
        // handles already pointing at it stay valid.
        let checkpoint = self.lexer.pos();
        self.lexer.skip_whitespace();
        if self.lexer.accept_keyword("stream") {
            let raw = self.parse_stream_body(arena, handle)?;
            let dict = match std::mem::replace(arena.get_mut(handle), Object::Null) {
                Object::Dictionary(dict) => dict,
                _ => {
                    return Err(ParseError::InvalidStream {
                        position: offset,
                        message: "stream prologue is not a dictionary".to_string(),
                    })
                }
            };
            *arena.get_mut(handle) = Object::Stream(Stream::with_raw(dict, raw));
        } else {
            self.lexer.seek(checkpoint);
        }

        self.promote(arena, handle)?;
        Ok(handle)
    }

    /// Read the raw body between `stream` and `endstream`. `/Length` drives
    /// the read when it is a direct integer; otherwise (absent or indirect)
    /// the body is scanned up to the `endstream` keyword and the trailing
    /// end-of-line is trimmed.
    fn parse_stream_body(&mut self, arena: &Arena, dict: Handle) -> ParseResult<Vec<u8>> {
        self.lexer.read_stream_eol()?;
        let body_start = self.lexer.pos();

        let length = arena
            .dict_get(dict, "Length")
            .and_then(|h| arena.get(h).as_integer())
            .and_then(|len| usize::try_from(len).ok());

        if let Some(length) = length {
            if let Ok(bytes) = self.lexer.read_exact(length) {
                let raw = bytes.to_vec();
                self.lexer.skip_whitespace();
                if self.lexer.accept_keyword("endstream") {
                    return Ok(raw);
                }
                // /Length lied; fall back to scanning.
                self.lexer.seek(body_start);
            } else {
                self.lexer.seek(body_start);
            }
        }

        let Some(body) = self.lexer.scan_until_keyword("endstream") else {
            return Err(ParseError::InvalidStream {
                position: body_start,
                message: "stream shall end with an 'endstream' statement".to_string(),
            });
        };
        self.lexer.expect_keyword("endstream")?;
        Ok(trim_stream_eol(body).to_vec())
    }

    /// Type guessing and propagation for a finished dictionary or stream.
    fn promote(&mut self, arena: &mut Arena, handle: Handle) -> ParseResult<()> {
        if !self.options.type_guessing {
            return Ok(());
        }
        let kind = arena.get(handle).kind();
        let tag = match arena.get(handle).as_dict() {
            Some(dict) => REGISTRY.guess_type(arena, dict, kind),
            None => None,
        };
        let Some(tag) = tag else { return Ok(()) };

        arena
            .cast_to(handle, tag)
            .map_err(graph_err(self.lexer.pos()))?;

        if !self.options.type_propagation {
            return Ok(());
        }

        let hinted: Vec<(Handle, crate::objects::schema::TypeTag)> = {
            let dict = match arena.get(handle).as_dict() {
                Some(d) => d,
                None => return Ok(()),
            };
            REGISTRY
                .fields(tag)
                .iter()
                .filter_map(|spec| {
                    spec.tag_hint
                        .and_then(|hint| dict.get(spec.name).map(|value| (value, hint)))
                })
                .collect()
        };

        for (value, hint) in hinted {
            match arena.get(value) {
                Object::Reference(id) => {
                    // The target may not be parsed yet; cast it later.
                    self.deferred.push(DeferredCast { target: *id, tag: hint });
                }
                other if other.kind() == hint.native_type() => {
                    arena
                        .cast_to(value, hint)
                        .map_err(graph_err(self.lexer.pos()))?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Parse one `N G obj … endobj` framed object. Returns `Ok(None)` at a
    /// body-end keyword (`xref`, `trailer`, `startxref`) or end of input.
    pub fn parse_indirect_object(&mut self, arena: &mut Arena) -> ParseResult<Option<Handle>> {
        self.lexer.skip_whitespace();
        if self.lexer.at_end()
            || self.lexer.check_keyword("xref")
            || self.lexer.check_keyword("trailer")
            || self.lexer.check_keyword("startxref")
        {
            return Ok(None);
        }

        let offset = self.lexer.pos();
        let number = match self.lexer.read_number() {
            Ok(Number::Integer(n)) => {
                u32::try_from(n).map_err(|_| ParseError::InvalidObjectHeader(offset))?
            }
            _ => return Err(ParseError::InvalidObjectHeader(offset)),
        };
        self.lexer.skip_whitespace();
        let generation = match self.lexer.read_number() {
            Ok(Number::Integer(g)) => {
                u16::try_from(g).map_err(|_| ParseError::InvalidObjectHeader(offset))?
            }
            _ => return Err(ParseError::InvalidObjectHeader(offset)),
        };
        self.lexer.skip_whitespace();
        if !self.lexer.accept_keyword("obj") {
            return Err(ParseError::InvalidObjectHeader(offset));
        }

        let handle = self.parse_object(arena)?;
        arena.set_indirect(handle, true);
        arena.set_object_id(handle, number, generation);
        arena.meta_mut(handle).file_offset = Some(offset);

        self.lexer.skip_whitespace();
        if self.lexer.accept_keyword("endobj") {
            Ok(Some(handle))
        } else {
            Err(ParseError::UnterminatedObject {
                number,
                generation,
                handle,
            })
        }
    }
}

fn trim_stream_eol(body: &[u8]) -> &[u8] {
    if body.ends_with(b"\r\n") {
        &body[..body.len() - 2]
    } else if body.ends_with(b"\n") || body.ends_with(b"\r") {
        &body[..body.len() - 1]
    } else {
        body
    }
}
