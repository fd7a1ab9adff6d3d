//! Protocol module containing the wire codec and the rendezvous constants.

pub mod codec;
pub mod service;

pub use codec::{decode_token, encode_token, ProtocolError};
pub use service::{MAX_MESSAGE_LEN, SERVICE_NAME, SERVICE_UUID};
