use crate::error::{PdfError, Result};
use crate::objects::{Arena, Dictionary, Handle, Name, Object};
use crate::parser::filters::{self, DecodeParams, Filter};
use std::collections::BTreeMap;

/// Which body representations a stream currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyState {
    Unloaded,
    RawOnly,
    DecodedOnly,
    Both,
}

/// A PDF stream: a dictionary plus a body that exists as raw (filtered)
/// bytes, decoded bytes, or both.
///
/// At most one representation is authoritative at a time; requesting the
/// missing one runs the filter pipeline and caches the result. Setting
/// either representation invalidates the other.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stream {
    pub dict: Dictionary,
    pub(crate) raw: Option<Vec<u8>>,
    pub(crate) decoded: Option<Vec<u8>>,
    /// Unpacked sub-objects, for object streams only.
    pub(crate) packed: Option<BTreeMap<u32, Handle>>,
}

impl Stream {
    /// An empty stream with no filters.
    pub fn new() -> Self {
        Self {
            dict: Dictionary::new(),
            raw: None,
            decoded: Some(Vec::new()),
            packed: None,
        }
    }

    /// A stream parsed from the file: raw bytes only.
    pub fn with_raw(dict: Dictionary, raw: Vec<u8>) -> Self {
        Self {
            dict,
            raw: Some(raw),
            decoded: None,
            packed: None,
        }
    }

    pub fn state(&self) -> BodyState {
        match (&self.raw, &self.decoded) {
            (None, None) => BodyState::Unloaded,
            (Some(_), None) => BodyState::RawOnly,
            (None, Some(_)) => BodyState::DecodedOnly,
            (Some(_), Some(_)) => BodyState::Both,
        }
    }
}

impl Arena {
    pub fn stream(&self, handle: Handle) -> Result<&Stream> {
        match self.try_get(handle)? {
            Object::Stream(stream) => Ok(stream),
            other => Err(PdfError::InvalidStreamObject(format!(
                "expected a stream, found {}",
                other.kind()
            ))),
        }
    }

    pub fn stream_mut(&mut self, handle: Handle) -> Result<&mut Stream> {
        match self.get_mut(handle) {
            Object::Stream(stream) => Ok(stream),
            other => Err(PdfError::InvalidStreamObject(format!(
                "expected a stream, found {}",
                other.kind()
            ))),
        }
    }

    fn decode_params_at(&self, params: Option<Handle>) -> DecodeParams {
        let mut result = DecodeParams::default();
        let Some(handle) = params else {
            return result;
        };
        let Some(dict) = self.get(handle).as_dict() else {
            return result;
        };
        let int = |key: &str, fallback: i64| {
            dict.get(key)
                .and_then(|h| self.get(h).as_integer())
                .unwrap_or(fallback)
        };
        result.predictor = int("Predictor", 1);
        result.colors = int("Colors", 1);
        result.bits_per_component = int("BitsPerComponent", 8);
        result.columns = int("Columns", 1);
        result.early_change = int("EarlyChange", 1);
        result
    }

    /// The stream's filter pipeline, paired with per-filter decode
    /// parameters. `/Filter` may be a single name or an ordered array.
    pub fn stream_filter_chain(&self, handle: Handle) -> Result<Vec<(Filter, DecodeParams)>> {
        let stream = self.stream(handle)?;

        let filter_names: Vec<Name> = match stream.dict.get("Filter").map(|h| self.get(h)) {
            None => return Ok(Vec::new()),
            Some(Object::Name(name)) => vec![name.clone()],
            Some(Object::Array(array)) => {
                let mut names = Vec::with_capacity(array.len());
                for item in array.iter() {
                    match self.get(item) {
                        Object::Name(name) => names.push(name.clone()),
                        other => {
                            return Err(PdfError::InvalidStreamObject(format!(
                                "invalid /Filter entry: {}",
                                other.kind()
                            )))
                        }
                    }
                }
                names
            }
            Some(Object::Reference(_)) => {
                return Err(PdfError::InvalidStreamObject(
                    "indirect /Filter must be resolved by the document".to_string(),
                ))
            }
            Some(other) => {
                return Err(PdfError::InvalidStreamObject(format!(
                    "invalid /Filter type: {}",
                    other.kind()
                )))
            }
        };

        let params_handles: Vec<Option<Handle>> =
            match stream.dict.get("DecodeParms").map(|h| (h, self.get(h))) {
                None => vec![None; filter_names.len()],
                Some((h, Object::Dictionary(_))) => {
                    let mut list = vec![None; filter_names.len()];
                    if !list.is_empty() {
                        list[0] = Some(h);
                    }
                    list
                }
                Some((_, Object::Array(array))) => {
                    let mut list: Vec<Option<Handle>> = array
                        .iter()
                        .map(|item| match self.get(item) {
                            Object::Dictionary(_) => Some(item),
                            _ => None,
                        })
                        .collect();
                    list.resize(filter_names.len(), None);
                    list
                }
                Some(_) => vec![None; filter_names.len()],
            };

        let mut chain = Vec::with_capacity(filter_names.len());
        for (name, params) in filter_names.iter().zip(params_handles) {
            let filter = Filter::from_name(name.as_str())
                .ok_or_else(|| PdfError::UnknownFilter(name.as_str().to_string()))?;
            chain.push((filter, self.decode_params_at(params)));
        }
        Ok(chain)
    }

    /// The decoded (logical) stream body, running the filter pipeline when
    /// only raw bytes are cached. On a filter failure the partial output is
    /// cached and also returned inside the error.
    pub fn stream_data(&mut self, handle: Handle) -> Result<&[u8]> {
        if self.stream(handle)?.decoded.is_some() {
            return Ok(self.stream(handle)?.decoded.as_deref().unwrap_or_default());
        }

        let chain = self.stream_filter_chain(handle)?;
        let Some(mut data) = self.stream(handle)?.raw.clone() else {
            return Err(PdfError::InvalidStreamObject(
                "stream has no body".to_string(),
            ));
        };

        for (filter, params) in chain {
            match filters::decode(filter, &data, &params) {
                Ok(decoded) => data = decoded,
                Err(PdfError::InvalidFilterData { message, partial }) => {
                    // Keep whatever plaintext was recovered before the
                    // failure so forensic callers can still read it.
                    self.stream_mut(handle)?.decoded = Some(partial.clone());
                    return Err(PdfError::InvalidFilterData { message, partial });
                }
                Err(other) => return Err(other),
            }
        }

        let stream = self.stream_mut(handle)?;
        stream.decoded = Some(data);
        Ok(self.stream(handle)?.decoded.as_deref().unwrap_or_default())
    }

    /// The raw (filtered) stream body, running the filter pipeline in
    /// reverse when only decoded bytes are cached. Updates `/Length`.
    pub fn stream_raw_data(&mut self, handle: Handle) -> Result<&[u8]> {
        if self.stream(handle)?.raw.is_some() {
            return Ok(self.stream(handle)?.raw.as_deref().unwrap_or_default());
        }

        let chain = self.stream_filter_chain(handle)?;
        let Some(mut data) = self.stream(handle)?.decoded.clone() else {
            return Err(PdfError::InvalidStreamObject(
                "stream has no body".to_string(),
            ));
        };

        for (filter, params) in chain.into_iter().rev() {
            data = filters::encode(filter, &data, &params)?;
        }

        let length = data.len() as i64;
        self.stream_mut(handle)?.raw = Some(data);
        self.dict_set_value(handle, "Length", length)?;
        Ok(self.stream(handle)?.raw.as_deref().unwrap_or_default())
    }

    /// Replace the decoded body; the raw cache is invalidated.
    pub fn set_stream_data(&mut self, handle: Handle, data: Vec<u8>) -> Result<()> {
        let stream = self.stream_mut(handle)?;
        stream.decoded = Some(data);
        stream.raw = None;
        Ok(())
    }

    /// Replace the raw body; the decoded cache is invalidated.
    pub fn set_stream_raw_data(&mut self, handle: Handle, raw: Vec<u8>) -> Result<()> {
        let stream = self.stream_mut(handle)?;
        stream.raw = Some(raw);
        stream.decoded = None;
        Ok(())
    }

    /// Configure a predictor on the stream's Flate/LZW layer.
    pub fn stream_set_predictor(
        &mut self,
        handle: Handle,
        predictor: i64,
        colors: i64,
        bits_per_component: i64,
        columns: i64,
    ) -> Result<()> {
        let chain = self.stream_filter_chain(handle)?;
        let layer = chain
            .iter()
            .position(|(f, _)| matches!(f, Filter::FlateDecode | Filter::LZWDecode))
            .ok_or_else(|| {
                PdfError::InvalidStreamObject(
                    "predictor functions require a Flate or LZW filter".to_string(),
                )
            })?;

        let params = self.alloc(Object::Dictionary(Dictionary::new()));
        self.dict_set_value(params, "Predictor", predictor)?;
        if colors != 1 {
            self.dict_set_value(params, "Colors", colors)?;
        }
        if bits_per_component != 8 {
            self.dict_set_value(params, "BitsPerComponent", bits_per_component)?;
        }
        if columns != 1 {
            self.dict_set_value(params, "Columns", columns)?;
        }

        if chain.len() == 1 {
            self.dict_set(handle, "DecodeParms", params)?;
            return Ok(());
        }

        // Multi-filter chain: pad a DecodeParms array with nulls up to the
        // predictor layer.
        let array = self.alloc(Object::Array(crate::objects::Array::new()));
        for index in 0..chain.len() {
            let entry = if index == layer {
                params
            } else {
                self.alloc(Object::Null)
            };
            self.array_push(array, entry)?;
        }
        self.dict_set(handle, "DecodeParms", array)?;
        Ok(())
    }
}
