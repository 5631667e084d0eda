mod addr;
mod control;
mod error;
mod frame;
mod payload;
mod render;

pub use addr::OriginAddr;
pub use control::{Command, decode_control};
pub use error::CodecError;
pub use frame::{FRAME_LEN, PublishFrame, decode_publish, encode_publish};
pub use payload::{Payload, PayloadText};
pub use render::render;

/// Maximum length of a session identity, in octets, excluding the
/// control-line delimiter.
pub const IDENTITY_CAP: usize = 10;

/// Maximum length of a topic name, in octets, excluding the NUL
/// terminator reserved in the fixed frame's topic field.
pub const TOPIC_CAP: usize = 49;

pub type Identity = broker_utils::ArrayStr<IDENTITY_CAP>;
pub type Topic = broker_utils::ArrayStr<TOPIC_CAP>;

/// Literal REPLY payload that signals a duplicate identity; the peer
/// that receives it is expected to terminate.
pub const ERR_SAME_ID: &str = "ERRSAMEID";
