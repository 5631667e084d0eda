/// Codec-layer failure. Both variants are data errors the caller
/// recovers from (drop the datagram, ignore the line); neither
/// should ever be escalated to a panic.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("publish frame malformed: {0}")]
    MalformedFrame(&'static str),

    #[error("control line malformed: {0}")]
    MalformedControlLine(&'static str),
}
