//! Content stream tokenizer
//!
//! Splits decoded page content into tokens and groups them into
//! operations (operands followed by an operator). Every token remembers
//! the byte range it came from, so callers can cut regions out of the
//! original bytes without re-serializing anything they did not touch.
//!
//! ```text
//! q 0.7 0.7 -0.7 0.7 100 200 cm BT /F1 40 Tf (CONFIDENTIAL) Tj ET Q
//! ^ ^------------------------^ ^^ ^-------^  ^------------^    ^^ ^
//! q             cm             BT    Tf            Tj          ET Q
//! ```
//!
//! Lexing is total: arbitrary bytes never panic, unterminated strings and
//! dictionaries simply run to the end of the input.

use std::ops::Range;

/// Lexical class of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Integer or real number (`12`, `-3.25`, `.5`)
    Number,
    /// Name literal including its slash (`/F1`)
    Name,
    /// `( ... )` string including its parentheses
    LiteralString,
    /// `< ... >` string including its angle brackets
    HexString,
    ArrayStart,
    ArrayEnd,
    DictStart,
    DictEnd,
    /// Operator or bare keyword (`Tj`, `cm`, `true`, `'`)
    Keyword,
    /// Binary payload between `ID` and `EI` of an inline image
    InlineData,
}

/// A token and the bytes it spans in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    /// Raw bytes of this token
    pub fn bytes<'a>(&self, src: &'a [u8]) -> &'a [u8] {
        &src[self.start..self.end]
    }

    /// Name without its leading slash, or `None` for non-name tokens
    pub fn name<'a>(&self, src: &'a [u8]) -> Option<&'a [u8]> {
        match self.kind {
            TokenKind::Name => Some(&src[self.start + 1..self.end]),
            _ => None,
        }
    }

    /// Decoded string bytes for literal and hex strings
    pub fn string_value(&self, src: &[u8]) -> Option<Vec<u8>> {
        match self.kind {
            TokenKind::LiteralString => Some(decode_literal(self.bytes(src))),
            TokenKind::HexString => Some(decode_hex(self.bytes(src))),
            _ => None,
        }
    }
}

/// One content stream instruction
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Operator keyword, e.g. `"cm"` or `"Tj"`
    pub operator: String,
    /// Operand tokens in source order (array and dictionary brackets included)
    pub operands: Vec<Token>,
    /// Byte offset of the first operand, or of the operator when there are none
    pub start: usize,
    /// Byte offset just past the operator
    pub end: usize,
}

impl Operation {
    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn is(&self, operator: &str) -> bool {
        self.operator == operator
    }
}

/// PDF whitespace: NUL, TAB, LF, FF, CR and SPACE
pub fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\0' | b'\t' | b'\n' | b'\x0c' | b'\r' | b' ')
}

pub fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// Neither whitespace nor a delimiter
pub fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

/// Streaming tokenizer over decoded content bytes
pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    inline_data_pending: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a [u8]) -> Self {
        Self {
            src,
            pos: 0,
            inline_data_pending: false,
        }
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(b) = self.peek(0) {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while let Some(c) = self.peek(0) {
                    if c == b'\n' || c == b'\r' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn token(&mut self, kind: TokenKind, start: usize, end: usize) -> Token {
        self.pos = end;
        Token { kind, start, end }
    }

    /// Literal string with nested parentheses and backslash escapes
    fn literal_string(&mut self, start: usize) -> Token {
        let mut depth = 0usize;
        let mut i = start;
        while i < self.src.len() {
            match self.src[i] {
                b'\\' => {
                    i += 2;
                    continue;
                }
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        i += 1;
                        break;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        let end = i.min(self.src.len());
        self.token(TokenKind::LiteralString, start, end)
    }

    fn hex_string(&mut self, start: usize) -> Token {
        let end = self.src[start..]
            .iter()
            .position(|&b| b == b'>')
            .map(|p| start + p + 1)
            .unwrap_or(self.src.len());
        self.token(TokenKind::HexString, start, end)
    }

    fn regular_run(&mut self, start: usize) -> Token {
        let end = self.src[start..]
            .iter()
            .position(|&b| !is_regular(b))
            .map(|p| start + p)
            .unwrap_or(self.src.len());
        let kind = if crate::transform::parse_number(&self.src[start..end]).is_some() {
            TokenKind::Number
        } else {
            TokenKind::Keyword
        };
        self.token(kind, start, end)
    }

    /// Binary inline image data: after `ID` and one whitespace byte, up to
    /// the first `EI` that stands alone as a keyword.
    fn inline_data(&mut self) -> Option<Token> {
        self.inline_data_pending = false;
        let mut start = self.pos;
        if self.peek(0).is_some_and(is_whitespace) {
            start += 1;
        }
        let src = self.src;
        let mut i = start;
        while i + 1 < src.len() {
            if src[i] == b'E'
                && src[i + 1] == b'I'
                && i > 0
                && is_whitespace(src[i - 1])
                && src.get(i + 2).map_or(true, |&b| !is_regular(b))
            {
                // The whitespace before EI belongs to neither token
                let end = (i - 1).max(start);
                return Some(self.token(TokenKind::InlineData, start, end));
            }
            i += 1;
        }
        if start >= src.len() {
            self.pos = src.len();
            return None;
        }
        Some(self.token(TokenKind::InlineData, start, src.len()))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.inline_data_pending {
            if let Some(token) = self.inline_data() {
                return Some(token);
            }
        }

        self.skip_whitespace_and_comments();
        let start = self.pos;
        let b = self.peek(0)?;

        let token = match b {
            b'(' => self.literal_string(start),
            b'<' if self.peek(1) == Some(b'<') => {
                self.token(TokenKind::DictStart, start, start + 2)
            }
            b'<' => self.hex_string(start),
            b'>' if self.peek(1) == Some(b'>') => self.token(TokenKind::DictEnd, start, start + 2),
            b'[' => self.token(TokenKind::ArrayStart, start, start + 1),
            b']' => self.token(TokenKind::ArrayEnd, start, start + 1),
            b'/' => {
                let end = self.src[start + 1..]
                    .iter()
                    .position(|&c| !is_regular(c))
                    .map(|p| start + 1 + p)
                    .unwrap_or(self.src.len());
                self.token(TokenKind::Name, start, end)
            }
            // Stray delimiters (`)`, `>`, `{`, `}`) become one-byte keywords
            _ if is_delimiter(b) => self.token(TokenKind::Keyword, start, start + 1),
            _ => self.regular_run(start),
        };

        if token.kind == TokenKind::Keyword && token.bytes(self.src) == b"ID" {
            self.inline_data_pending = true;
        }

        Some(token)
    }
}

/// Tokenize a whole content stream
pub fn tokenize(src: &[u8]) -> Vec<Token> {
    Lexer::new(src).collect()
}

/// Keywords that are operands rather than operators
fn is_operand_keyword(bytes: &[u8]) -> bool {
    matches!(bytes, b"true" | b"false" | b"null")
}

/// Group tokens into operations.
///
/// Keywords inside arrays or dictionaries are operands. Trailing operands
/// with no operator are dropped from the result but stay in the source.
pub fn parse_operations(src: &[u8]) -> Vec<Operation> {
    let mut operations = Vec::new();
    let mut operands: Vec<Token> = Vec::new();
    let mut nesting = 0usize;

    for token in Lexer::new(src) {
        match token.kind {
            TokenKind::ArrayStart | TokenKind::DictStart => {
                nesting += 1;
                operands.push(token);
            }
            TokenKind::ArrayEnd | TokenKind::DictEnd => {
                nesting = nesting.saturating_sub(1);
                operands.push(token);
            }
            TokenKind::Keyword if nesting == 0 && !is_operand_keyword(token.bytes(src)) => {
                let start = operands.first().map_or(token.start, |t| t.start);
                operations.push(Operation {
                    operator: String::from_utf8_lossy(token.bytes(src)).into_owned(),
                    operands: std::mem::take(&mut operands),
                    start,
                    end: token.end,
                });
            }
            _ => operands.push(token),
        }
    }

    operations
}

/// Decode a `( ... )` literal string token into its bytes
pub fn decode_literal(raw: &[u8]) -> Vec<u8> {
    let inner = raw.strip_prefix(b"(").unwrap_or(raw);
    let inner = inner.strip_suffix(b")").unwrap_or(inner);

    let mut out = Vec::with_capacity(inner.len());
    let mut i = 0;
    while i < inner.len() {
        let b = inner[i];
        if b != b'\\' {
            out.push(b);
            i += 1;
            continue;
        }

        i += 1;
        let Some(&esc) = inner.get(i) else {
            break;
        };
        match esc {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'0'..=b'7' => {
                let mut value: u32 = 0;
                let mut digits = 0;
                while digits < 3 {
                    match inner.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            i += 1;
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                out.push((value & 0xff) as u8);
                continue;
            }
            // Line continuation
            b'\r' => {
                if inner.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
            }
            b'\n' => {}
            other => out.push(other),
        }
        i += 1;
    }
    out
}

/// Decode a `< ... >` hex string token; an odd final digit is padded with 0
pub fn decode_hex(raw: &[u8]) -> Vec<u8> {
    let digits: Vec<u8> = raw
        .iter()
        .filter_map(|&b| (b as char).to_digit(16).map(|d| d as u8))
        .collect();
    digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}
