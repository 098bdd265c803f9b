//! Wire serialization of the object graph.
//!
//! Direct objects serialize as their body; indirect objects are framed with
//! `N G obj … endobj`. Streams serialize their raw (filtered) bytes, encoding
//! from the decoded cache first when necessary, which is why writing takes
//! the arena mutably.

use crate::error::Result;
use crate::objects::{Arena, Handle, Name, Object, StringFormat};

const EOL: &[u8] = b"\r\n";

/// Serialize an object to its on-disk form.
pub fn to_wire_bytes(arena: &mut Arena, handle: Handle) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_object(arena, handle, &mut out)?;
    Ok(out)
}

/// Length of the serialized form.
pub fn object_size(arena: &mut Arena, handle: Handle) -> Result<usize> {
    Ok(to_wire_bytes(arena, handle)?.len())
}

pub fn write_object(arena: &mut Arena, handle: Handle, out: &mut Vec<u8>) -> Result<()> {
    let meta = arena.meta(handle).clone();
    if meta.indirect {
        out.extend_from_slice(format!("{} {} obj", meta.number, meta.generation).as_bytes());
        out.extend_from_slice(EOL);
        write_direct(arena, handle, out)?;
        out.extend_from_slice(EOL);
        out.extend_from_slice(b"endobj");
        out.extend_from_slice(EOL);
    } else {
        write_direct(arena, handle, out)?;
    }
    Ok(())
}

/// Serialize the object body without indirect framing.
pub fn write_direct(arena: &mut Arena, handle: Handle, out: &mut Vec<u8>) -> Result<()> {
    match arena.try_get(handle)? {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(true) => out.extend_from_slice(b"true"),
        Object::Boolean(false) => out.extend_from_slice(b"false"),
        Object::Integer(value) => out.extend_from_slice(value.to_string().as_bytes()),
        Object::Real(value) => out.extend_from_slice(format_real(*value).as_bytes()),
        Object::Name(name) => write_name(name, out),
        Object::String(string) => match string.format {
            StringFormat::Literal => write_literal_string(&string.data, out),
            StringFormat::Hexadecimal => write_hex_string(&string.data, out),
        },
        Object::Reference(id) => out.extend_from_slice(id.to_string().as_bytes()),
        Object::Array(array) => {
            let items: Vec<Handle> = array.iter().collect();
            out.push(b'[');
            for (index, item) in items.into_iter().enumerate() {
                if index > 0 {
                    out.push(b' ');
                }
                write_direct(arena, item, out)?;
            }
            out.push(b']');
        }
        Object::Dictionary(dict) => {
            let entries: Vec<(Name, Handle)> =
                dict.iter().map(|(k, v)| (k.clone(), v)).collect();
            write_dictionary(arena, &entries, out)?;
        }
        Object::Stream(stream) => {
            let entries: Vec<(Name, Handle)> =
                stream.dict.iter().map(|(k, v)| (k.clone(), v)).collect();
            let raw = arena.stream_raw_data(handle)?.to_vec();
            // stream_raw_data may have updated /Length; re-read the entries.
            let entries = match arena.try_get(handle)? {
                Object::Stream(stream) => stream
                    .dict
                    .iter()
                    .map(|(k, v)| (k.clone(), v))
                    .collect::<Vec<_>>(),
                _ => entries,
            };
            write_dictionary(arena, &entries, out)?;
            out.extend_from_slice(b"stream");
            out.extend_from_slice(EOL);
            out.extend_from_slice(&raw);
            out.extend_from_slice(EOL);
            out.extend_from_slice(b"endstream");
        }
    }
    Ok(())
}

fn write_dictionary(arena: &mut Arena, entries: &[(Name, Handle)], out: &mut Vec<u8>) -> Result<()> {
    out.extend_from_slice(b"<<");
    for (key, value) in entries {
        out.push(b' ');
        write_name(key, out);
        out.push(b' ');
        write_direct(arena, *value, out)?;
    }
    out.extend_from_slice(b" >>");
    Ok(())
}

fn write_name(name: &Name, out: &mut Vec<u8>) {
    out.push(b'/');
    for &byte in name.as_str().as_bytes() {
        let escape = byte == b'#'
            || !(b'!'..=b'~').contains(&byte)
            || crate::parser::lexer::is_delimiter(byte);
        if escape {
            out.push(b'#');
            out.extend_from_slice(format!("{byte:02X}").as_bytes());
        } else {
            out.push(byte);
        }
    }
}

fn write_literal_string(data: &[u8], out: &mut Vec<u8>) {
    out.push(b'(');
    for &byte in data {
        match byte {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(byte);
            }
            b'\r' => out.extend_from_slice(b"\\r"),
            _ => out.push(byte),
        }
    }
    out.push(b')');
}

fn write_hex_string(data: &[u8], out: &mut Vec<u8>) {
    out.push(b'<');
    for byte in data {
        out.extend_from_slice(format!("{byte:02X}").as_bytes());
    }
    out.push(b'>');
}

/// Plain decimal rendering: reals must never serialize in exponent form.
fn format_real(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let mut text = format!("{value:.6}");
    while text.ends_with('0') {
        text.pop();
    }
    if text.ends_with('.') {
        text.pop();
    }
    text
}
