//! Protocol module containing wire types and the binary codec.

pub mod codec;
pub mod messages;

pub use codec::{decode_record, decode_request, encode_batch, encode_record, encode_request, encode_void, ProtocolError};
pub use messages::*;
