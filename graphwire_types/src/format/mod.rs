//! # Segment stream format
//!
//! An encoded object graph is a flat sequence of segments.
//! Every segment starts with `segment_tag`, which is encoded in `u8`.
//! All multi-byte integers are little-endian. Booleans are one byte, either 0 or 1.
//!
//! Offsets are byte offsets into the object that is the current container,
//! i.e. the object opened by the nearest enclosing `Reference` or `Array`.
//!
//! ```text
//! struct Value {
//!     segment_tag:        u8,
//!     size:               u8,         // 1, 2, 4 or 8
//!     is_float:           bool,
//!     offset:             u32,
//!     value:              [u8; 8],    // The first `size` bytes are significant.
//! }
//!
//! struct Null {
//!     segment_tag:        u8,
//!     offset:             u32,
//! }
//!
//! struct Reference {
//!     segment_tag:        u8,
//!     class_id:           u32,
//!     offset:             u32,
//!     byte_len:           u32,        // Allocation size of the object.
//!     is_managed:         bool,
//!     id:                 u32,
//!     // Followed by child segments of the object's fields, then one Pop.
//!     // An object without declared fields is followed by one Data of its body instead.
//! }
//!
//! struct Array {
//!     segment_tag:        u8,
//!     is_static:          bool,       // Whether the array object itself holds the elements.
//!     offset:             u32,
//!     length:             u32,
//!     align:              u8,         // log2 of the element size.
//!     is_elem_nullable:   bool,
//!     id:                 u32,
//!     class_id:           u32,
//!     // Followed by either one Data (numeric elements), or child segments of the elements, then one Pop.
//! }
//!
//! struct Circular {
//!     segment_tag:        u8,
//!     offset:             u32,
//!     is_managed:         bool,
//!     id:                 u32,        // Must name a previously opened Reference or Array.
//! }
//!
//! struct Data {
//!     segment_tag:        u8,
//!     byte_len:           u32,
//!     bytes:              [u8; byte_len],
//! }
//!
//! struct Pop {
//!     segment_tag:        u8,
//! }
//!
//! struct End {
//!     segment_tag:        u8,
//!     // Nothing may follow.
//! }
//! ```
//!
//! A whole stream is exactly one root `Reference` or `Array` bracket followed by one `End`.

mod error;
mod reader;
mod segment;
mod tag;

pub use error::*;
pub use reader::*;
pub use segment::*;
pub use tag::*;
