//! Whitespace tokenizer working under a bounded buffer.
//!
//! Whitespace is the fixed ASCII set `{' ', '\n', '\r', '\t', '\v', '\f'}`.
//! Every other byte, including non-ASCII and invalid UTF-8, belongs to a
//! token.

use std::io::{self, Read};

use crate::cancel::CancelFlag;
use crate::error::ScanError;

pub const KB: usize = 1 << 10;
pub const MB: usize = 1 << 20;

/// Default cap on a single token.
pub const DEFAULT_MAX_TOKEN_LEN: usize = 10 * KB;

#[inline]
pub const fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\n' | b'\r' | b'\t' | 0x0b | 0x0c)
}

// defines the behavior needed for tokenizing an in-memory corpus
pub trait Tokenizer {
    fn tokenize<'a>(&self, text: &'a [u8]) -> Vec<&'a [u8]>;
}

#[derive(Debug, Clone, Copy)]
pub struct WhitespaceTokenizer {
    pub max_token_len: usize,
}

impl Default for WhitespaceTokenizer {
    fn default() -> Self {
        Self {
            max_token_len: DEFAULT_MAX_TOKEN_LEN,
        }
    }
}

impl WhitespaceTokenizer {
    pub fn new(max_token_len: usize) -> Self {
        Self { max_token_len }
    }

    /// Streams tokens out of `reader`, starting with a `buffer_size` byte
    /// working buffer.
    pub fn scan<R: Read>(&self, reader: R, buffer_size: usize) -> Tokens<R> {
        Tokens::new(reader, buffer_size, self.max_token_len)
    }
}

impl Tokenizer for WhitespaceTokenizer {
    // single pass over a buffer already in memory, oversized tokens dropped
    fn tokenize<'a>(&self, text: &'a [u8]) -> Vec<&'a [u8]> {
        text.split(|&b| is_space(b))
            .filter(|tok| !tok.is_empty() && tok.len() <= self.max_token_len)
            .collect()
    }
}

/// Lazy token stream over a reader.
///
/// The buffer starts at the requested size and only grows while a single
/// token is still being assembled, never past `max_token_len + 1` bytes. A
/// run of non-whitespace longer than `max_token_len` is skipped entirely and
/// reported once as [`ScanError::TokenTooLong`]; scanning then continues. A
/// read failure ([`ScanError::Io`]) or a raised cancel flag
/// ([`ScanError::Cancelled`], checked before every read) ends the stream.
pub struct Tokens<R> {
    reader: R,
    buf: Vec<u8>,
    start: usize,
    end: usize,
    max_token_len: usize,
    eof: bool,
    done: bool,
    cancel: Option<CancelFlag>,
}

impl<R: Read> Tokens<R> {
    pub fn new(reader: R, buffer_size: usize, max_token_len: usize) -> Self {
        Self {
            reader,
            buf: vec![0; buffer_size.max(1)],
            start: 0,
            end: 0,
            max_token_len: max_token_len.max(1),
            eof: false,
            done: false,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Borrowing variant of [`Iterator::next`]; the slice is valid until the
    /// next call.
    pub fn next_token(&mut self) -> Option<Result<&[u8], ScanError>> {
        match self.advance()? {
            Ok((from, to)) => Some(Ok(&self.buf[from..to])),
            Err(e) => Some(Err(e)),
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn buffer_len(&self) -> usize {
        self.buf.len()
    }

    fn advance(&mut self) -> Option<Result<(usize, usize), ScanError>> {
        if self.done {
            return None;
        }

        loop {
            while self.start < self.end && is_space(self.buf[self.start]) {
                self.start += 1;
            }

            if self.start < self.end {
                let from = self.start;
                let boundary = self.buf[from..self.end]
                    .iter()
                    .position(|&b| is_space(b))
                    .map(|i| from + i);

                match boundary {
                    Some(to) => {
                        self.start = to;
                        return Some(self.check(from, to));
                    }
                    None if self.eof => {
                        // trailing token with no whitespace after it
                        self.start = self.end;
                        return Some(self.check(from, self.end));
                    }
                    None if self.end - from > self.max_token_len => {
                        let seen = self.end - from;
                        return Some(self.discard_run(seen).map(|_| (0, 0)));
                    }
                    None => {}
                }
            } else if self.eof {
                self.done = true;
                return None;
            }

            if let Err(e) = self.fill() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }

    fn check(&self, from: usize, to: usize) -> Result<(usize, usize), ScanError> {
        let len = to - from;
        if len > self.max_token_len {
            return Err(ScanError::TokenTooLong {
                len,
                max: self.max_token_len,
            });
        }
        Ok((from, to))
    }

    // Skips the rest of an oversized run whose first `seen` bytes are buffered.
    // Always ends in an error: TokenTooLong, or whatever stopped the refill first.
    fn discard_run(&mut self, mut seen: usize) -> Result<(), ScanError> {
        self.start = self.end;
        loop {
            if let Err(e) = self.fill() {
                self.done = true;
                return Err(e);
            }
            if self.start == self.end && self.eof {
                break;
            }
            match self.buf[self.start..self.end].iter().position(|&b| is_space(b)) {
                Some(i) => {
                    seen += i;
                    self.start += i;
                    break;
                }
                None => {
                    seen += self.end - self.start;
                    self.start = self.end;
                }
            }
        }
        Err(ScanError::TokenTooLong {
            len: seen,
            max: self.max_token_len,
        })
    }

    fn fill(&mut self) -> Result<(), ScanError> {
        if self.eof {
            return Ok(());
        }
        if self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
            return Err(ScanError::Cancelled);
        }

        if self.start > 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }

        // a full buffer here holds one unfinished token no longer than the cap
        if self.end == self.buf.len() {
            let grown = (self.buf.len() * 2)
                .min(self.max_token_len + 1)
                .max(self.buf.len() + 1);
            self.buf.resize(grown, 0);
        }

        loop {
            match self.reader.read(&mut self.buf[self.end..]) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(());
                }
                Ok(n) => {
                    self.end += n;
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ScanError::Io(e)),
            }
        }
    }
}

impl<R: Read> Iterator for Tokens<R> {
    type Item = Result<Vec<u8>, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().map(|res| res.map(<[u8]>::to_vec))
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use std::io::Cursor;

    fn scan_all(input: &[u8], buffer_size: usize, max_token_len: usize) -> Vec<Result<Vec<u8>, String>> {
        Tokens::new(Cursor::new(input.to_vec()), buffer_size, max_token_len)
            .map(|res| res.map_err(|e| e.to_string()))
            .collect()
    }

    fn words(input: &[u8], buffer_size: usize) -> Vec<Vec<u8>> {
        Tokens::new(Cursor::new(input.to_vec()), buffer_size, DEFAULT_MAX_TOKEN_LEN)
            .map(|res| res.unwrap())
            .collect()
    }

    // reader that yields `data` and then fails instead of reporting EOF
    struct BrokenReader {
        data: Cursor<Vec<u8>>,
    }

    impl Read for BrokenReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(io::Error::other("device unplugged")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn splits_on_the_fixed_whitespace_set() {
        let input = b" abc\tdef\nghi\rjkl\x0cmno\x0bpqr\n";
        let expected: Vec<Vec<u8>> = ["abc", "def", "ghi", "jkl", "mno", "pqr"]
            .iter()
            .map(|w| w.as_bytes().to_vec())
            .collect();

        for buffer_size in [1, 2, 3, 7, 64] {
            assert_eq!(words(input, buffer_size), expected, "buffer {}", buffer_size);
        }
    }

    #[test]
    fn matches_a_plain_split() {
        let cases: [&[u8]; 8] = [
            b"",
            b" ",
            b"\n",
            b"a",
            b" a ",
            b"abc def",
            b" abc def ",
            b"  lots   of\r\n\r\nspace\t\t here  ",
        ];
        let tokenizer = WhitespaceTokenizer::default();
        for case in cases {
            let expected: Vec<Vec<u8>> = tokenizer.tokenize(case).into_iter().map(<[u8]>::to_vec).collect();
            assert_eq!(words(case, 4), expected, "case {:?}", String::from_utf8_lossy(case));
        }
    }

    #[test]
    fn keeps_trailing_token_without_whitespace() {
        assert_eq!(words(b"first last", 3), vec![b"first".to_vec(), b"last".to_vec()]);
    }

    #[test]
    fn non_ascii_bytes_are_token_bytes() {
        // U+00A0 and invalid UTF-8 are not whitespace here
        let input = b"caf\xc3\xa9\xc2\xa0bar \xff\xfe";
        assert_eq!(
            words(input, 5),
            vec![b"caf\xc3\xa9\xc2\xa0bar".to_vec(), b"\xff\xfe".to_vec()]
        );
    }

    #[test]
    fn skips_oversized_tokens_and_continues() {
        let long = "x".repeat(40);
        let input = format!("ok {long} fine");

        // small buffer: the run is discarded while streaming
        let got = scan_all(input.as_bytes(), 4, 8);
        assert_eq!(got.len(), 3);
        assert_eq!(got[0], Ok(b"ok".to_vec()));
        assert_eq!(got[1], Err("token of 40 bytes exceeds the 8 byte limit".to_string()));
        assert_eq!(got[2], Ok(b"fine".to_vec()));

        // large buffer: the run fits in memory but is still rejected
        let got = scan_all(input.as_bytes(), 1024, 8);
        assert_eq!(got[1], Err("token of 40 bytes exceeds the 8 byte limit".to_string()));
        assert_eq!(got[2], Ok(b"fine".to_vec()));
    }

    #[test]
    fn oversized_trailing_token_is_reported_once() {
        let got = scan_all(b"a bbbbbbbbbbbb", 2, 4);
        assert_eq!(
            got,
            vec![
                Ok(b"a".to_vec()),
                Err("token of 12 bytes exceeds the 4 byte limit".to_string())
            ]
        );
    }

    #[test]
    fn token_at_the_cap_is_accepted() {
        assert_eq!(words(b"abcd", 1), vec![b"abcd".to_vec()]);
        let got = scan_all(b"abcd abcde", 1, 4);
        assert_eq!(got[0], Ok(b"abcd".to_vec()));
        assert!(got[1].is_err());
    }

    #[test]
    fn buffer_never_grows_past_the_cap() {
        let input = format!("{} {}", "y".repeat(1000), "z".repeat(10));
        let mut tokens = Tokens::new(Cursor::new(input.into_bytes()), 2, 16);
        while tokens.next_token().is_some() {}
        assert!(tokens.buffer_len() <= 17);
    }

    #[test]
    fn read_error_ends_the_stream() {
        let reader = BrokenReader {
            data: Cursor::new(b"one two thr".to_vec()),
        };
        let mut tokens = Tokens::new(reader, 4, 64);

        assert_eq!(tokens.next().unwrap().unwrap(), b"one");
        assert_eq!(tokens.next().unwrap().unwrap(), b"two");
        match tokens.next() {
            Some(Err(ScanError::Io(e))) => assert_eq!(e.to_string(), "device unplugged"),
            other => panic!("expected an io error, got {:?}", other.map(|r| r.map_err(|e| e.to_string()))),
        }
        assert!(tokens.next().is_none());
    }

    // flips the cancel flag once `after` reads have been served
    struct CancellingReader {
        data: Cursor<Vec<u8>>,
        cancel: CancelFlag,
        after: usize,
    }

    impl Read for CancellingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.after == 0 {
                self.cancel.cancel();
            } else {
                self.after -= 1;
            }
            self.data.read(buf)
        }
    }

    #[test]
    fn cancel_interrupts_an_oversized_run() {
        let cancel = CancelFlag::new();
        let reader = CancellingReader {
            data: Cursor::new(format!("ok {} tail", "q".repeat(10_000)).into_bytes()),
            cancel: cancel.clone(),
            after: 3,
        };
        let mut tokens = Tokens::new(reader, 4, 8).with_cancel(cancel);

        assert_eq!(tokens.next().unwrap().unwrap(), b"ok");
        // the run is still being discarded when the flag goes up
        assert!(matches!(tokens.next(), Some(Err(ScanError::Cancelled))));
        assert!(tokens.next().is_none());
        assert!(tokens.get_ref().data.position() < 100);
    }

    #[test]
    fn cancel_interrupts_a_whitespace_run() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let input = format!("{}word", " ".repeat(1000)).into_bytes();
        let mut tokens = Tokens::new(Cursor::new(input), 8, 8).with_cancel(cancel);
        assert!(matches!(tokens.next(), Some(Err(ScanError::Cancelled))));
        assert!(tokens.next().is_none());
    }

    #[test]
    fn borrowed_tokens() {
        let mut tokens = WhitespaceTokenizer::new(16).scan(Cursor::new(b"to be or not to be".to_vec()), 3);
        let mut seen = Vec::new();
        while let Some(tok) = tokens.next_token() {
            seen.push(String::from_utf8(tok.unwrap().to_vec()).unwrap());
        }
        assert_eq!(seen, ["to", "be", "or", "not", "to", "be"]);
    }
}
