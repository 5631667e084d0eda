use crate::{
    Topic,
    addr::{ORIGIN_ADDR_LEN, OriginAddr},
    error::CodecError,
    payload::{PAYLOAD_LEN, Payload},
};

const TOPIC_FIELD_LEN: usize = 50;
const PAYLOAD_TYPE_LEN: usize = 1;

/// Total wire size of a publish frame: `50 + 1 + 1500 + 16`.
pub const FRAME_LEN: usize =
    TOPIC_FIELD_LEN + PAYLOAD_TYPE_LEN + PAYLOAD_LEN + ORIGIN_ADDR_LEN;

const TOPIC_OFFSET: usize = 0;
const TYPE_OFFSET: usize = TOPIC_OFFSET + TOPIC_FIELD_LEN;
const PAYLOAD_OFFSET: usize = TYPE_OFFSET + PAYLOAD_TYPE_LEN;
const ADDR_OFFSET: usize = PAYLOAD_OFFSET + PAYLOAD_LEN;

/// Immutable record of a single publication: topic, typed payload,
/// and the address it was published from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishFrame {
    pub topic: Topic,
    pub payload: Payload,
    pub origin_addr: OriginAddr,
}

#[must_use]
pub fn encode_publish(frame: &PublishFrame) -> [u8; FRAME_LEN] {
    let mut out = [0u8; FRAME_LEN];

    let topic_bytes = frame.topic.as_bytes();
    out[TOPIC_OFFSET..TOPIC_OFFSET + topic_bytes.len()].copy_from_slice(topic_bytes);
    out[TOPIC_OFFSET + topic_bytes.len()] = 0;

    out[TYPE_OFFSET] = frame.payload.tag();

    let mut payload_bytes = [0u8; PAYLOAD_LEN];
    frame.payload.encode(&mut payload_bytes);
    out[PAYLOAD_OFFSET..PAYLOAD_OFFSET + PAYLOAD_LEN].copy_from_slice(&payload_bytes);

    let mut addr_bytes = [0u8; ORIGIN_ADDR_LEN];
    frame.origin_addr.encode(&mut addr_bytes);
    out[ADDR_OFFSET..ADDR_OFFSET + ORIGIN_ADDR_LEN].copy_from_slice(&addr_bytes);

    out
}

pub fn decode_publish(bytes: &[u8]) -> Result<PublishFrame, CodecError> {
    let bytes: &[u8; FRAME_LEN] = bytes
        .try_into()
        .map_err(|_| CodecError::MalformedFrame("frame length mismatch"))?;

    let topic_field = &bytes[TOPIC_OFFSET..TOPIC_OFFSET + TOPIC_FIELD_LEN];
    let nul_at = topic_field
        .iter()
        .position(|&b| b == 0)
        .ok_or(CodecError::MalformedFrame("topic field missing NUL terminator"))?;
    let topic_str = std::str::from_utf8(&topic_field[..nul_at])
        .map_err(|_| CodecError::MalformedFrame("topic not valid ASCII/UTF-8"))?;
    let topic = Topic::try_from(topic_str)
        .map_err(|_| CodecError::MalformedFrame("topic exceeds capacity"))?;

    let tag = bytes[TYPE_OFFSET];
    let payload_bytes: &[u8; PAYLOAD_LEN] =
        bytes[PAYLOAD_OFFSET..PAYLOAD_OFFSET + PAYLOAD_LEN].try_into().unwrap();
    let payload = Payload::decode(tag, payload_bytes)?;

    let addr_bytes: &[u8; ORIGIN_ADDR_LEN] =
        bytes[ADDR_OFFSET..ADDR_OFFSET + ORIGIN_ADDR_LEN].try_into().unwrap();
    let origin_addr = OriginAddr::decode(addr_bytes);

    Ok(PublishFrame { topic, payload, origin_addr })
}
