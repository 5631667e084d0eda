use crate::{frame::PublishFrame, payload::Payload};

/// Renders a publish frame the way a subscriber displays it:
/// `<origin> - <topic> - <TYPE> - <value>` for INT/SHORT_REAL/FLOAT/
/// STRING, or the raw REPLY text (which already carries its own
/// trailing newline, per the broker's reply construction).
#[must_use]
pub fn render(frame: &PublishFrame) -> String {
    match &frame.payload {
        Payload::Int { negative, magnitude } => format!(
            "{} - {} - INT - {}",
            frame.origin_addr,
            frame.topic,
            render_int(*negative, *magnitude)
        ),
        Payload::ShortReal { value } => format!(
            "{} - {} - SHORT_REAL - {}",
            frame.origin_addr,
            frame.topic,
            render_short_real(*value)
        ),
        Payload::Float { negative, magnitude, power } => format!(
            "{} - {} - FLOAT - {}",
            frame.origin_addr,
            frame.topic,
            render_float(*negative, *magnitude, *power)
        ),
        Payload::String(text) => {
            format!("{} - {} - STRING - {}", frame.origin_addr, frame.topic, text.as_str())
        }
        Payload::Reply(text) => text.as_str().to_string(),
    }
}

#[must_use]
pub fn render_int(negative: bool, magnitude: u32) -> String {
    if negative { format!("-{magnitude}") } else { magnitude.to_string() }
}

/// Renders a SHORT_REAL as `V/100` with exactly two fractional
/// digits. Zero-pads the magnitude to at least three digits before
/// inserting the decimal point, fixing the distilled source's
/// unchecked `insert(end()-2)` for single-digit values (which left
/// the integer part empty, e.g. `.05` instead of `0.05`).
#[must_use]
pub fn render_short_real(value: u16) -> String {
    let digits = format!("{value:0>3}");
    let split = digits.len() - 2;
    format!("{}.{}", &digits[..split], &digits[split..])
}

/// Renders a FLOAT as `(-1)^sign * magnitude * 10^-power`.
#[must_use]
pub fn render_float(negative: bool, magnitude: u32, power: u8) -> String {
    let digits = magnitude.to_string();
    let power = power as usize;

    let body = if power == 0 {
        format!("{digits}.00")
    } else if power >= digits.len() {
        let pad = power - digits.len();
        format!("0.{}{}", "0".repeat(pad), digits)
    } else {
        let split = digits.len() - power;
        format!("{}.{}", &digits[..split], &digits[split..])
    };

    if negative { format!("-{body}") } else { body }
}
