//! PDF lexer (tokenizer).
//!
//! Splits a byte buffer into primitive tokens: numbers, names, literal and hex
//! strings, delimiters and keywords. The lexer has no knowledge of objects; the
//! parser assembles tokens into [`Object`](crate::object::Object) values.
//!
//! Two entry points are provided:
//! - [`token`], a nom parser used by the recursive-descent object parser;
//! - [`next_token`], a cursor API that never fails. Bytes that cannot start any
//!   token come back as [`Token::Invalid`] so callers (the xref repair scan in
//!   particular) can decide whether to skip or abort.
//!
//! Whitespace (space, \t, \r, \n, \0, \f) and comments (`%` to end of line) are
//! skipped between tokens.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while},
    character::complete::{char, digit0, digit1, one_of},
    combinator::{map, opt, recognize},
    multi::many0,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

/// Token types recognized by the lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),

    /// Real number (e.g., 3.14, -.5, 4.)
    Real(f64),

    /// Raw literal string content, escapes not yet decoded
    LiteralString(&'a [u8]),

    /// Raw hex string content, whitespace preserved
    HexString(&'a [u8]),

    /// Name with `#XX` escapes decoded
    Name(String),

    /// `true`
    True,

    /// `false`
    False,

    /// `null`
    Null,

    /// `[`
    ArrayStart,

    /// `]`
    ArrayEnd,

    /// `<<`
    DictStart,

    /// `>>`
    DictEnd,

    /// `obj`
    ObjStart,

    /// `endobj`
    ObjEnd,

    /// `stream`
    StreamStart,

    /// `endstream`
    StreamEnd,

    /// `R` (indirect reference marker)
    R,

    /// `xref`
    Xref,

    /// `trailer`
    Trailer,

    /// `startxref`
    StartXref,

    /// A byte that cannot start any token
    Invalid(u8),
}

/// PDF whitespace characters (ISO 32000-1, Table 1).
pub fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// PDF delimiter characters (ISO 32000-1, Table 2).
pub fn is_delimiter(c: u8) -> bool {
    matches!(c, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

/// Regular characters are everything that is neither whitespace nor a delimiter.
fn is_regular(c: u8) -> bool {
    !is_whitespace(c) && !is_delimiter(c)
}

fn fail<T>(input: &[u8], kind: nom::error::ErrorKind) -> IResult<&[u8], T> {
    Err(nom::Err::Error(nom::error::Error::new(input, kind)))
}

fn whitespace(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (rest, ws) = take_while(is_whitespace)(input)?;
    if ws.is_empty() {
        return fail(input, nom::error::ErrorKind::Space);
    }
    Ok((rest, ws))
}

fn comment(input: &[u8]) -> IResult<&[u8], &[u8]> {
    preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n'))(input)
}

/// Skip any run of whitespace and comments. Never fails.
pub fn skip_ws(input: &[u8]) -> IResult<&[u8], ()> {
    let (rest, _) = many0(alt((whitespace, comment)))(input)?;
    Ok((rest, ()))
}

/// Numbers: optional sign, digits, optional fraction. `.5`, `5.` and `-.002` are
/// all legal reals.
fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, text) = recognize(tuple((
        opt(one_of("+-")),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
    )))(input)?;

    // "12abc" is not a number
    if rest.first().is_some_and(|&c| is_regular(c)) {
        return fail(input, nom::error::ErrorKind::Digit);
    }

    let text = std::str::from_utf8(text)
        .map_err(|_| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)))?;

    if text.contains('.') {
        // Rust's parser rejects a trailing '.', so normalize "5." to "5.0"
        let normalized = if text.ends_with('.') {
            format!("{}0", text)
        } else {
            text.to_string()
        };
        match normalized.parse::<f64>() {
            Ok(v) => Ok((rest, Token::Real(v))),
            Err(_) => fail(input, nom::error::ErrorKind::Float),
        }
    } else {
        match text.parse::<i64>() {
            Ok(v) => Ok((rest, Token::Integer(v))),
            // Out-of-range integers degrade to reals rather than failing the file
            Err(_) => match text.parse::<f64>() {
                Ok(v) => Ok((rest, Token::Real(v))),
                Err(_) => fail(input, nom::error::ErrorKind::Digit),
            },
        }
    }
}

/// Literal strings: balanced parentheses with backslash escapes. The returned
/// slice excludes the outer parentheses and keeps escapes verbatim, so binary
/// content passes through untouched.
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (body, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut pos = 0usize;

    while pos < body.len() {
        match body[pos] {
            b'\\' => pos += 2,
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&body[pos + 1..], Token::LiteralString(&body[..pos])));
                }
                pos += 1;
            },
            _ => pos += 1,
        }
    }

    fail(input, nom::error::ErrorKind::Char)
}

fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return fail(input, nom::error::ErrorKind::Tag);
    }
    delimited(
        char('<'),
        map(take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c)), Token::HexString),
        char('>'),
    )(input)
}

/// Decode `#XX` escapes in a name. Malformed escapes are kept literally.
///
/// ```
/// # use pdf_graph::lexer::decode_name_escapes;
/// assert_eq!(decode_name_escapes(b"A#20B"), "A B");
/// assert_eq!(decode_name_escapes(b"A#ZZ"), "A#ZZ");
/// ```
pub fn decode_name_escapes(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' {
            let decoded = raw
                .get(i + 1..i + 3)
                .and_then(|hex| std::str::from_utf8(hex).ok())
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = decoded {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(raw[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(char('/'), map(take_while(is_regular), |raw: &[u8]| Token::Name(decode_name_escapes(raw))))(
        input,
    )
}

/// Match a keyword that must end at a token boundary (`nullx` is not `null`).
fn keyword<'a>(word: &'static [u8], tok: Token<'static>) -> impl Fn(&'a [u8]) -> IResult<&'a [u8], Token<'a>> {
    move |input: &'a [u8]| {
        let (rest, _) = tag(word)(input)?;
        if rest.first().is_some_and(|&c| is_regular(c)) {
            return fail(input, nom::error::ErrorKind::Tag);
        }
        Ok((rest, tok.clone()))
    }
}

fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        keyword(b"false", Token::False),
        keyword(b"true", Token::True),
        keyword(b"null", Token::Null),
        keyword(b"obj", Token::ObjStart),
        keyword(b"endobj", Token::ObjEnd),
        keyword(b"endstream", Token::StreamEnd),
        keyword(b"stream", Token::StreamStart),
        keyword(b"startxref", Token::StartXref),
        keyword(b"xref", Token::Xref),
        keyword(b"trailer", Token::Trailer),
        keyword(b"R", Token::R),
    ))(input)
}

fn parse_delimiter(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        map(tag(b"<<"), |_| Token::DictStart),
        map(tag(b">>"), |_| Token::DictEnd),
        map(tag(b"["), |_| Token::ArrayStart),
        map(tag(b"]"), |_| Token::ArrayEnd),
    ))(input)
}

/// Parse a single token after skipping whitespace and comments.
///
/// # Errors
///
/// Returns a nom error when the input is exhausted or does not start with a valid
/// token. Use [`next_token`] for an infallible variant.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, _) = skip_ws(input)?;
    alt((parse_delimiter, parse_keyword, parse_name, parse_number, parse_literal_string, parse_hex_string))(
        input,
    )
}

/// Parse tokens until the input is exhausted or an invalid byte is met.
pub fn tokens(input: &[u8]) -> IResult<&[u8], Vec<Token<'_>>> {
    many0(token)(input)
}

/// Produce the token starting at (or after whitespace following) `cursor`.
///
/// Returns `None` at end of input. A byte that cannot start a token is returned
/// as [`Token::Invalid`] and the cursor advances past it, so repeated calls
/// always make progress.
pub fn next_token(bytes: &[u8], cursor: usize) -> Option<(Token<'_>, usize)> {
    let input = bytes.get(cursor..)?;
    let (rest, _) = skip_ws(input).ok()?;
    let start = bytes.len() - rest.len();
    let first = *rest.first()?;

    match token(rest) {
        Ok((remaining, tok)) => Some((tok, bytes.len() - remaining.len())),
        Err(_) => Some((Token::Invalid(first), start + 1)),
    }
}

/// Position of the first non-whitespace, non-comment byte at or after `pos`.
pub fn skip_whitespace(bytes: &[u8], pos: usize) -> usize {
    match bytes.get(pos..).map(skip_ws) {
        Some(Ok((rest, _))) => bytes.len() - rest.len(),
        _ => pos.min(bytes.len()),
    }
}
