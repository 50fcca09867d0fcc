use crate::vm::RuntimeErrorKind;
use std::char::REPLACEMENT_CHARACTER;
use std::io::{self, BufRead};

fn peek_byte<R: BufRead + ?Sized>(input: &mut R) -> io::Result<Option<u8>> {
    loop {
        match input.fill_buf() {
            Ok(buf) => return Ok(buf.first().copied()),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}

fn sequence_width(lead: u8) -> usize {
    match lead {
        0x00..=0x7f => 1,
        0xc2..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf4 => 4,
        _ => 1,
    }
}

/// Reads a single UTF-8 encoded character. Malformed sequences yield U+FFFD.
pub fn read_char<R: BufRead + ?Sized>(input: &mut R) -> Result<char, RuntimeErrorKind> {
    let lead = match peek_byte(input)? {
        Some(lead) => lead,
        None => return Err(RuntimeErrorKind::EndOfInput),
    };
    input.consume(1);

    let width = sequence_width(lead);
    let mut bytes = [lead, 0, 0, 0];
    for slot in bytes.iter_mut().take(width).skip(1) {
        match peek_byte(input)? {
            Some(byte) if byte & 0xc0 == 0x80 => {
                *slot = byte;
                input.consume(1);
            }
            _ => return Ok(REPLACEMENT_CHARACTER),
        }
    }

    Ok(std::str::from_utf8(&bytes[..width])
        .ok()
        .and_then(|text| text.chars().next())
        .unwrap_or(REPLACEMENT_CHARACTER))
}

/// Reads one whitespace delimited token and parses it as a signed decimal integer. Blanks after
/// the token are consumed up to and including the end of its line.
pub fn read_number<R: BufRead + ?Sized>(input: &mut R) -> Result<i64, RuntimeErrorKind> {
    while let Some(byte) = peek_byte(input)? {
        if !byte.is_ascii_whitespace() {
            break;
        }
        input.consume(1);
    }
    let mut token = Vec::new();
    while let Some(byte) = peek_byte(input)? {
        if byte.is_ascii_whitespace() {
            break;
        }
        token.push(byte);
        input.consume(1);
    }
    if token.is_empty() {
        return Err(RuntimeErrorKind::EndOfInput);
    }
    while let Some(b' ' | b'\t' | b'\r') = peek_byte(input)? {
        input.consume(1);
    }
    if peek_byte(input)? == Some(b'\n') {
        input.consume(1);
    }

    let text = String::from_utf8_lossy(&token);
    text.parse::<i64>().map_err(|_| RuntimeErrorKind::MalformedNumber(text.into_owned()))
}
