use crate::{Identity, Topic, error::CodecError};

/// A parsed control line. The identity announcement is only valid as
/// the first line read from a freshly accepted stream; callers pass
/// `expect_identity` accordingly rather than guessing from shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Identity(Identity),
    Subscribe { topic: Topic, sf: bool },
    Unsubscribe { topic: Topic },
}

/// Parses a single control line, already stripped of its `\r\n`/`\n`
/// delimiter (see the dispatcher's line-buffering in `broker-net`).
pub fn decode_control(line: &str, expect_identity: bool) -> Result<Command, CodecError> {
    if expect_identity {
        return decode_identity(line).map(Command::Identity);
    }

    let mut tokens = line.split_whitespace();
    match tokens.next() {
        Some("subscribe") => {
            let topic = tokens
                .next()
                .ok_or(CodecError::MalformedControlLine("subscribe missing topic"))?;
            let sf_token = tokens
                .next()
                .ok_or(CodecError::MalformedControlLine("subscribe missing sf flag"))?;
            if tokens.next().is_some() {
                return Err(CodecError::MalformedControlLine("subscribe has trailing tokens"));
            }
            let sf = match sf_token {
                "0" => false,
                "1" => true,
                _ => return Err(CodecError::MalformedControlLine("sf flag must be 0 or 1")),
            };
            let topic = Topic::try_from(topic)
                .map_err(|_| CodecError::MalformedControlLine("topic exceeds capacity"))?;
            Ok(Command::Subscribe { topic, sf })
        }
        Some("unsubscribe") => {
            let topic = tokens
                .next()
                .ok_or(CodecError::MalformedControlLine("unsubscribe missing topic"))?;
            if tokens.next().is_some() {
                return Err(CodecError::MalformedControlLine("unsubscribe has trailing tokens"));
            }
            let topic = Topic::try_from(topic)
                .map_err(|_| CodecError::MalformedControlLine("topic exceeds capacity"))?;
            Ok(Command::Unsubscribe { topic })
        }
        Some(_) => Err(CodecError::MalformedControlLine("unrecognized command")),
        None => Err(CodecError::MalformedControlLine("empty line")),
    }
}

fn decode_identity(line: &str) -> Result<Identity, CodecError> {
    if line.is_empty() {
        return Err(CodecError::MalformedControlLine("empty identity"));
    }
    Identity::try_from(line)
        .map_err(|_| CodecError::MalformedControlLine("identity exceeds capacity"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_identity() {
        assert_eq!(
            decode_control("a", true).unwrap(),
            Command::Identity(Identity::from_str_truncate("a"))
        );
    }

    #[test]
    fn parses_subscribe() {
        assert_eq!(
            decode_control("subscribe temp 0", false).unwrap(),
            Command::Subscribe { topic: Topic::from_str_truncate("temp"), sf: false }
        );
    }

    #[test]
    fn parses_unsubscribe() {
        assert_eq!(
            decode_control("unsubscribe t", false).unwrap(),
            Command::Unsubscribe { topic: Topic::from_str_truncate("t") }
        );
    }

    #[test]
    fn rejects_bad_sf_flag() {
        assert!(decode_control("subscribe temp 2", false).is_err());
    }

    #[test]
    fn rejects_unknown_command() {
        assert!(decode_control("frobnicate x", false).is_err());
    }

    #[test]
    fn rejects_trailing_tokens() {
        assert!(decode_control("unsubscribe t extra", false).is_err());
    }
}
