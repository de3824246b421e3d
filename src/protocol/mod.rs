//! Wire protocol.
//!
//! # Data Flow
//! ```text
//! Request (sender → receiver):
//!     [ length: u64 big-endian ][ payload: exactly `length` bytes ]
//!
//! Response (receiver → sender):
//!     Raw:            UTF-8 text, terminated by connection close
//!     LengthPrefixed: same frame layout as the request
//! ```
//!
//! # Design Decisions
//! - One request and one response per connection
//! - Receivers read to the declared length, so sender chunking is irrelevant
//! - Raw responses stay the default for wire compatibility with existing senders

pub mod codec;
pub mod response;

pub use codec::{decode, decode_header, encode, read_exact, read_frame, write_frame, FrameError, HEADER_LEN};
pub use response::{write_response, ResponseFraming};
