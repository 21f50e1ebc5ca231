//! Notification payload codec.
//!
//! - types.rs: reason/medium enums and the payload record
//! - codec.rs: `custom_json` envelope encoding, validation and decoding

pub mod codec;
pub mod types;

pub use codec::{CodecError, OperationContext, PayloadCodec};
pub use types::{Medium, Payload, Reason, PAYLOAD_VERSION};
