use broker_utils::ArrayStr;

use crate::error::CodecError;

pub(crate) const PAYLOAD_LEN: usize = 1500;

/// Maximum length of a STRING/REPLY payload body, excluding its NUL
/// terminator.
pub const PAYLOAD_TEXT_CAP: usize = PAYLOAD_LEN - 1;

pub type PayloadText = ArrayStr<PAYLOAD_TEXT_CAP>;

const TAG_INT: u8 = 0;
const TAG_SHORT_REAL: u8 = 1;
const TAG_FLOAT: u8 = 2;
const TAG_STRING: u8 = 3;
const TAG_REPLY: u8 = 4;

/// A publish frame's typed payload. Replaces the original design's
/// subtype dispatch with a tagged variant plus a renderer per
/// variant (see [`crate::render`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Int { negative: bool, magnitude: u32 },
    ShortReal { value: u16 },
    Float { negative: bool, magnitude: u32, power: u8 },
    String(PayloadText),
    Reply(PayloadText),
}

impl Payload {
    #[must_use]
    pub const fn tag(&self) -> u8 {
        match self {
            Self::Int { .. } => TAG_INT,
            Self::ShortReal { .. } => TAG_SHORT_REAL,
            Self::Float { .. } => TAG_FLOAT,
            Self::String(_) => TAG_STRING,
            Self::Reply(_) => TAG_REPLY,
        }
    }

    pub(crate) fn encode(&self, out: &mut [u8; PAYLOAD_LEN]) {
        out.fill(0);
        match self {
            Self::Int { negative, magnitude } => {
                out[0] = u8::from(*negative);
                out[1..5].copy_from_slice(&magnitude.to_be_bytes());
            }
            Self::ShortReal { value } => {
                out[0..2].copy_from_slice(&value.to_be_bytes());
            }
            Self::Float { negative, magnitude, power } => {
                out[0] = u8::from(*negative);
                out[1..5].copy_from_slice(&magnitude.to_be_bytes());
                out[5] = *power;
            }
            Self::String(text) | Self::Reply(text) => {
                let bytes = text.as_bytes();
                out[..bytes.len()].copy_from_slice(bytes);
                out[bytes.len()] = 0;
            }
        }
    }

    pub(crate) fn decode(tag: u8, bytes: &[u8; PAYLOAD_LEN]) -> Result<Self, CodecError> {
        match tag {
            TAG_INT => {
                let negative = bytes[0] != 0;
                let magnitude = u32::from_be_bytes(bytes[1..5].try_into().unwrap());
                Ok(Self::Int { negative, magnitude })
            }
            TAG_SHORT_REAL => {
                let value = u16::from_be_bytes(bytes[0..2].try_into().unwrap());
                Ok(Self::ShortReal { value })
            }
            TAG_FLOAT => {
                let negative = bytes[0] != 0;
                let magnitude = u32::from_be_bytes(bytes[1..5].try_into().unwrap());
                let power = bytes[5];
                Ok(Self::Float { negative, magnitude, power })
            }
            TAG_STRING => decode_text(bytes).map(Self::String),
            TAG_REPLY => decode_text(bytes).map(Self::Reply),
            _ => Err(CodecError::MalformedFrame("unknown payload_type tag")),
        }
    }
}

fn decode_text(bytes: &[u8; PAYLOAD_LEN]) -> Result<PayloadText, CodecError> {
    let nul_at = bytes
        .iter()
        .position(|&b| b == 0)
        .ok_or(CodecError::MalformedFrame("text payload missing NUL terminator"))?;
    let s = std::str::from_utf8(&bytes[..nul_at])
        .map_err(|_| CodecError::MalformedFrame("text payload not valid ASCII/UTF-8"))?;
    PayloadText::try_from(s).map_err(|_| CodecError::MalformedFrame("text payload too long"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(p: Payload) {
        let mut buf = [0u8; PAYLOAD_LEN];
        p.encode(&mut buf);
        let decoded = Payload::decode(p.tag(), &buf).unwrap();
        assert_eq!(decoded, p);
    }

    #[test]
    fn int_round_trips() {
        round_trip(Payload::Int { negative: false, magnitude: 42 });
        round_trip(Payload::Int { negative: true, magnitude: 7 });
    }

    #[test]
    fn short_real_round_trips() {
        round_trip(Payload::ShortReal { value: 105 });
    }

    #[test]
    fn float_round_trips() {
        round_trip(Payload::Float { negative: true, magnitude: 12345, power: 2 });
    }

    #[test]
    fn string_round_trips() {
        round_trip(Payload::String(PayloadText::from_str_truncate("hello")));
    }

    #[test]
    fn reply_with_err_same_id_round_trips() {
        round_trip(Payload::Reply(PayloadText::from_str_truncate(crate::ERR_SAME_ID)));
    }

    #[test]
    fn decode_rejects_unknown_tag() {
        let buf = [0u8; PAYLOAD_LEN];
        assert!(Payload::decode(9, &buf).is_err());
    }

    #[test]
    fn decode_rejects_missing_nul() {
        let buf = [b'x'; PAYLOAD_LEN];
        assert!(Payload::decode(TAG_STRING, &buf).is_err());
    }
}
