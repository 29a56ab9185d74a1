//! Wire protocol: framing codec and message model.
//!
//! Payloads are MessagePack with named fields; the struct field names in
//! [`Request`] and [`Response`] are the schema tags and changing them is a
//! breaking protocol change. There is no version negotiation.

pub mod codec;
pub mod error;
pub mod request;
pub mod response;

pub use codec::{decode_payload, encode_frame, FrameDecoder, MAX_FRAME_SIZE};
pub use error::{ProtocolError, RemoteFault};
pub use request::Request;
pub use response::Response;
