use crate::session::IoMode;
use core::str::FromStr;
use static_assertions::const_assert;

/// Largest number of bytes a single READ or TRANSACT may return.
pub const MAX_TRANSFER_LEN: usize = 255;

const_assert!(MAX_TRANSFER_LEN < 256);

/// Fixed-capacity buffer holding the bytes returned by one bus read.
pub type ReadBuffer = heapless::Vec<u8, MAX_TRANSFER_LEN>;

/// Convert ASCII hex text into raw bytes.
///
/// Characters are consumed in pairs; an odd-length input is treated as if a
/// trailing `'0'` had been appended. Anything that is not a hex digit decodes
/// to a zero nibble, so this never fails.
pub fn hex_decode(ascii: &str) -> Vec<u8> {
    let digits = ascii.as_bytes();
    digits
        .chunks(2)
        .map(|pair| {
            let high = nibble_from_ascii(pair[0]);
            let low = pair.get(1).copied().map_or(0, nibble_from_ascii);
            (high << 4) | low
        })
        .collect()
}

/// Convert raw bytes into upper-case ASCII hex, two characters per byte.
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        out.push(nibble_to_ascii(byte >> 4));
        out.push(nibble_to_ascii(byte & 0x0F));
    }
    out
}

/// Render bytes read back from a bus according to the output mode.
///
/// HEX renders every byte as ` 0xHH`; ASCII emits each byte as one
/// character. Both end with a newline. Nothing read renders as nothing.
pub fn render_output(bytes: &[u8], mode: IoMode) -> String {
    if bytes.is_empty() {
        return String::new();
    }

    let mut out = match mode {
        IoMode::Hex => {
            let mut rendered = String::with_capacity(bytes.len() * 5 + 1);
            for &byte in bytes {
                rendered.push_str(" 0x");
                rendered.push_str(&hex_encode(&[byte]));
            }
            rendered
        }
        IoMode::Ascii => bytes.iter().map(|&b| char::from(b)).collect(),
    };
    out.push('\n');
    out
}

/// Decode a command payload according to the input mode.
pub fn decode_payload(payload: &str, mode: IoMode) -> Vec<u8> {
    match mode {
        IoMode::Hex => hex_decode(payload),
        IoMode::Ascii => payload.as_bytes().to_vec(),
    }
}

/// Parse the unsigned number a string starts with, ignoring what follows.
///
/// `"42abc"` gives 42 and `" 7"` gives 7. Text that does not start with a
/// digit (after whitespace and an optional `+`), or a number too large for
/// `T`, gives `None`.
pub fn leading_number<T: FromStr>(text: &str) -> Option<T> {
    let text = text.trim_start();
    let text = text.strip_prefix('+').unwrap_or(text);
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    if end == 0 {
        return None;
    }
    text[..end].parse().ok()
}

fn nibble_from_ascii(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'A'..=b'F' => c - b'A' + 10,
        b'a'..=b'f' => c - b'a' + 10,
        _ => 0,
    }
}

fn nibble_to_ascii(nibble: u8) -> char {
    match nibble {
        0..=9 => char::from(b'0' + nibble),
        10..=15 => char::from(b'A' + nibble - 10),
        _ => '.',
    }
}
