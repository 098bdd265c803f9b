mod arena;
mod array;
mod dictionary;
mod object_stream;
mod primitive;
mod reference;
pub mod schema;
mod stream;

pub use arena::{Arena, Handle, ObjectMeta};
pub use array::Array;
pub use dictionary::{Caches, Dictionary};
pub use primitive::{Name, Object, ObjectId, PdfString, PdfType, StringFormat};
pub use schema::{DeferredCast, TypeTag};
pub use stream::{BodyState, Stream};
