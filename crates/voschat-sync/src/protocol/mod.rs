//! Wire-level protocol: endpoint constants and the JSON codec.

pub mod codec;
pub mod constants;

pub use codec::{decode, decode_frame, decode_response, encode, encode_text, WireRecord};
pub use constants::*;
