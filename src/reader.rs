use crate::ir::{LINE_FEED, SPACE, TAB};
use std::io::{self, BufReader, Bytes, Read};

/// Reads the significant characters (space, tab, line feed) out of a byte stream.
///
/// Every other byte is a comment and gets dropped, including bytes in the middle of a token.
/// Multi-byte UTF-8 sequences never contain any of the three significant bytes, so filtering
/// bytes is equivalent to filtering characters.
#[derive(Debug)]
pub struct SignificantReader<R> {
    bytes: Bytes<BufReader<R>>,
    offset: usize,
    position: usize,
}

impl<R: Read> SignificantReader<R> {
    pub fn new(source: R) -> SignificantReader<R> {
        SignificantReader {
            bytes: BufReader::new(source).bytes(),
            offset: 0,
            position: 0,
        }
    }

    /// Returns the next significant character, `None` once the stream is exhausted.
    pub fn next_token(&mut self) -> Option<io::Result<u8>> {
        for byte in &mut self.bytes {
            let byte = match byte {
                Ok(byte) => byte,
                Err(err) => return Some(Err(err)),
            };
            self.offset += 1;
            if matches!(byte, SPACE | TAB | LINE_FEED) {
                self.position += 1;
                return Some(Ok(byte));
            }
        }

        None
    }

    /// Number of raw bytes consumed so far, comments included
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of significant characters returned so far
    pub fn position(&self) -> usize {
        self.position
    }
}

impl<R: Read> Iterator for SignificantReader<R> {
    type Item = io::Result<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}
