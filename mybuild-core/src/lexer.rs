//! Lexer for Mybuild files.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::span::Location;

/// Kind of a token produced by the lexer.
///
/// Reserved words get their own kinds; `configuration` and `include` are
/// aliases that lex as `Module` and `Depends` so the same grammar reads
/// both module files and configuration files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    // Special
    Eof,

    // Identifiers and literals
    Ident(String),
    Number(i64),
    Str(String),
    Bool(bool), // true / false

    // Punctuation
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    LBrace,   // {
    RBrace,   // }
    Comma,    // ,
    Dot,      // .
    Equal,    // =
    Colon,    // :
    At,       // @
    Wildcard, // .*

    // Keywords
    Package,
    Import,
    Annotation,
    Interface,
    Extends,
    Feature,
    Module,
    Static,
    Abstract,
    Depends,
    Provides,
    Requires,
    Source,
    Object,
    Option,
    TypeString,
    TypeNumber,
    TypeBoolean,
    DebugPrint,
}

impl TokenKind {
    /// Human readable description used in syntax errors.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Eof => "end of file".to_string(),
            TokenKind::Ident(name) => format!("identifier '{name}'"),
            TokenKind::Number(value) => format!("number {value}"),
            TokenKind::Str(value) => format!("string {value:?}"),
            TokenKind::Bool(value) => format!("'{value}'"),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::LBracket => "'['".to_string(),
            TokenKind::RBracket => "']'".to_string(),
            TokenKind::LBrace => "'{'".to_string(),
            TokenKind::RBrace => "'}'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Dot => "'.'".to_string(),
            TokenKind::Equal => "'='".to_string(),
            TokenKind::Colon => "':'".to_string(),
            TokenKind::At => "'@'".to_string(),
            TokenKind::Wildcard => "'.*'".to_string(),
            keyword => format!("keyword '{}'", keyword_text(keyword)),
        }
    }
}

fn keyword_text(kind: &TokenKind) -> &'static str {
    match kind {
        TokenKind::Package => "package",
        TokenKind::Import => "import",
        TokenKind::Annotation => "annotation",
        TokenKind::Interface => "interface",
        TokenKind::Extends => "extends",
        TokenKind::Feature => "feature",
        TokenKind::Module => "module",
        TokenKind::Static => "static",
        TokenKind::Abstract => "abstract",
        TokenKind::Depends => "depends",
        TokenKind::Provides => "provides",
        TokenKind::Requires => "requires",
        TokenKind::Source => "source",
        TokenKind::Object => "object",
        TokenKind::Option => "option",
        TokenKind::TypeString => "string",
        TokenKind::TypeNumber => "number",
        TokenKind::TypeBoolean => "boolean",
        TokenKind::DebugPrint => "__print__",
        _ => "",
    }
}

/// A single token with its kind, the exact lexeme and its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub location: Location,
}

/// Lex a source string into tokens, terminated by an `Eof` token.
///
/// Fails on the first illegal character, unterminated string or
/// unterminated block comment.
pub fn lex(file: &str, source: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer {
        file: Arc::from(file),
        source,
        chars: source.as_bytes(),
        len: source.len(),
        index: 0,
        line: 1,
        line_start: 0,
    };
    lexer.run()
}

struct Lexer<'src> {
    file: Arc<str>,
    source: &'src str,
    chars: &'src [u8],
    len: usize,
    index: usize,
    line: u32,
    line_start: usize,
}

impl<'src> Lexer<'src> {
    fn run(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.peek_char() {
            if is_whitespace(ch) {
                self.consume_char();
                continue;
            }

            let start = self.location();
            let start_index = self.index;
            let kind = match ch {
                b'/' if self.peek_next() == Some(b'/') => {
                    self.skip_line_comment();
                    continue;
                }
                b'/' if self.peek_next() == Some(b'*') => {
                    self.skip_block_comment(&start)?;
                    continue;
                }
                b'(' => self.single(TokenKind::LParen),
                b')' => self.single(TokenKind::RParen),
                b'[' => self.single(TokenKind::LBracket),
                b']' => self.single(TokenKind::RBracket),
                b'{' => self.single(TokenKind::LBrace),
                b'}' => self.single(TokenKind::RBrace),
                b',' => self.single(TokenKind::Comma),
                b'=' => self.single(TokenKind::Equal),
                b':' => self.single(TokenKind::Colon),
                b'@' => self.single(TokenKind::At),
                b'.' => {
                    self.consume_char();
                    if self.peek_char() == Some(b'*') {
                        self.consume_char();
                        TokenKind::Wildcard
                    } else {
                        TokenKind::Dot
                    }
                }
                b'"' | b'\'' => self.lex_string(&start)?,
                b'0'..=b'9' => self.lex_number(&start)?,
                _ if is_ident_start(ch) => self.lex_ident_or_keyword(),
                _ => return Err(self.unexpected_char(start)),
            };

            tokens.push(Token {
                kind,
                text: self.source[start_index..self.index].to_string(),
                location: start,
            });
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            text: String::new(),
            location: self.location(),
        });
        Ok(tokens)
    }

    fn location(&self) -> Location {
        Location::new(
            self.file.clone(),
            self.line,
            (self.index - self.line_start + 1) as u32,
            self.index as u32,
        )
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.consume_char();
        kind
    }

    fn unexpected_char(&self, location: Location) -> Error {
        let ch = self.source[self.index..].chars().next().unwrap_or('\0');
        Error::Lex {
            location,
            message: format!("illegal character {ch:?}"),
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch == b'\n' {
                break;
            }
            self.consume_char();
        }
    }

    fn skip_block_comment(&mut self, start: &Location) -> Result<()> {
        self.consume_char(); // '/'
        self.consume_char(); // '*'
        while let Some(ch) = self.peek_char() {
            if ch == b'*' && self.peek_next() == Some(b'/') {
                self.consume_char();
                self.consume_char();
                return Ok(());
            }
            self.consume_char();
        }
        Err(Error::Lex {
            location: start.clone(),
            message: "unterminated block comment".to_string(),
        })
    }

    fn lex_string(&mut self, start: &Location) -> Result<TokenKind> {
        let quote = self.chars[self.index];
        let triple = self.chars.get(self.index + 1) == Some(&quote)
            && self.chars.get(self.index + 2) == Some(&quote);
        let delimiter = if triple { 3 } else { 1 };
        for _ in 0..delimiter {
            self.consume_char();
        }

        let content_start = self.index;
        loop {
            let Some(ch) = self.peek_char() else {
                return Err(unterminated_string(start));
            };
            match ch {
                b'\\' => {
                    // Skip over escape sequence: backslash + next char (if any)
                    self.consume_char();
                    if self.peek_char().is_some() {
                        self.consume_char();
                    }
                }
                b'\n' if !triple => return Err(unterminated_string(start)),
                _ if ch == quote && (!triple || self.closes_triple(quote)) => {
                    let content_end = self.index;
                    for _ in 0..delimiter {
                        self.consume_char();
                    }
                    let raw = &self.source[content_start..content_end];
                    return unescape(raw, start).map(TokenKind::Str);
                }
                _ => self.consume_char(),
            }
        }
    }

    fn closes_triple(&self, quote: u8) -> bool {
        self.chars.get(self.index + 1) == Some(&quote)
            && self.chars.get(self.index + 2) == Some(&quote)
    }

    fn lex_number(&mut self, start: &Location) -> Result<TokenKind> {
        let begin = self.index;
        let is_hex = self.chars[begin] == b'0' && matches!(self.peek_next(), Some(b'x' | b'X'));
        if is_hex {
            self.consume_char(); // '0'
            self.consume_char(); // 'x'
            while let Some(ch) = self.peek_char() {
                if ch.is_ascii_hexdigit() {
                    self.consume_char();
                } else {
                    break;
                }
            }
        } else {
            while let Some(ch) = self.peek_char() {
                if ch.is_ascii_digit() {
                    self.consume_char();
                } else {
                    break;
                }
            }
        }

        let text = &self.source[begin..self.index];
        let (digits, radix) = if is_hex {
            (&text[2..], 16)
        } else if text.len() > 1 && text.starts_with('0') {
            (&text[1..], 8)
        } else {
            (text, 10)
        };
        if digits.is_empty() {
            return Err(Error::Lex {
                location: start.clone(),
                message: format!("malformed number literal '{text}'"),
            });
        }
        i64::from_str_radix(digits, radix)
            .map(TokenKind::Number)
            .map_err(|_| Error::Lex {
                location: start.clone(),
                message: format!("invalid number literal '{text}'"),
            })
    }

    fn lex_ident_or_keyword(&mut self) -> TokenKind {
        let begin = self.index;
        while let Some(ch) = self.peek_char() {
            if is_ident_continue(ch) {
                self.consume_char();
            } else {
                break;
            }
        }

        let text = &self.source[begin..self.index];
        match text {
            "true" => TokenKind::Bool(true),
            "false" => TokenKind::Bool(false),
            "package" => TokenKind::Package,
            "import" => TokenKind::Import,
            "annotation" => TokenKind::Annotation,
            "interface" => TokenKind::Interface,
            "extends" => TokenKind::Extends,
            "feature" => TokenKind::Feature,
            "module" | "configuration" => TokenKind::Module,
            "static" => TokenKind::Static,
            "abstract" => TokenKind::Abstract,
            "depends" | "include" => TokenKind::Depends,
            "provides" => TokenKind::Provides,
            "requires" => TokenKind::Requires,
            "source" => TokenKind::Source,
            "object" => TokenKind::Object,
            "option" => TokenKind::Option,
            "string" => TokenKind::TypeString,
            "number" => TokenKind::TypeNumber,
            "boolean" => TokenKind::TypeBoolean,
            "__print__" => TokenKind::DebugPrint,
            _ => TokenKind::Ident(text.to_string()),
        }
    }

    fn peek_char(&self) -> Option<u8> {
        self.chars.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.chars.get(self.index + 1).copied()
    }

    fn consume_char(&mut self) {
        if self.index < self.len {
            if self.chars[self.index] == b'\n' {
                self.line += 1;
                self.line_start = self.index + 1;
            }
            self.index += 1;
        }
    }
}

fn unterminated_string(start: &Location) -> Error {
    Error::Lex {
        location: start.clone(),
        message: "unterminated string literal".to_string(),
    }
}

/// Decode the escape sequences of a string literal body.
fn unescape(raw: &str, start: &Location) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let Some(esc) = chars.next() else {
            out.push('\\');
            break;
        };
        match esc {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            'x' => out.push(hex_escape(&mut chars, 2, start)?),
            'u' => out.push(hex_escape(&mut chars, 4, start)?),
            'U' => out.push(hex_escape(&mut chars, 8, start)?),
            '0'..='7' => {
                let mut code = esc.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(digit) => {
                            code = code * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Ok(out)
}

fn hex_escape(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    width: usize,
    start: &Location,
) -> Result<char> {
    let mut code = 0u32;
    for _ in 0..width {
        let digit = chars.next().and_then(|c| c.to_digit(16)).ok_or_else(|| Error::Lex {
            location: start.clone(),
            message: format!("truncated \\x/\\u escape, expected {width} hex digits"),
        })?;
        code = code * 16 + digit;
    }
    char::from_u32(code).ok_or_else(|| Error::Lex {
        location: start.clone(),
        message: format!("invalid character code {code:#x} in escape"),
    })
}

fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\n' | b'\r')
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex("test", source)
            .expect("lex")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_number_bases() {
        assert_eq!(
            kinds("0x1A 017 0 123"),
            vec![
                TokenKind::Number(26),
                TokenKind::Number(15),
                TokenKind::Number(0),
                TokenKind::Number(123),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn rejects_bad_octal_literal() {
        let err = lex("test", "09").unwrap_err();
        assert!(matches!(err, Error::Lex { .. }));
    }

    #[test]
    fn string_quoting_forms_decode_alike() {
        let source = r#""a\tb" 'a\tb' """a\tb""" '''a\tb''' "a\x09b""#;
        let expected = TokenKind::Str("a\tb".to_string());
        let tokens = kinds(source);
        assert_eq!(tokens.len(), 6);
        assert!(tokens[..5].iter().all(|kind| *kind == expected));
    }

    #[test]
    fn triple_quoted_string_may_contain_quotes_and_newlines() {
        assert_eq!(
            kinds("\"\"\"say \"hi\"\nthere\"\"\"")[0],
            TokenKind::Str("say \"hi\"\nthere".to_string())
        );
    }

    #[test]
    fn newlines_inside_multiline_tokens_advance_line() {
        let tokens = lex("f", "'''a\nb\nc''' x /* one\ntwo */ y\n// c\nz").expect("lex");
        let lines: Vec<u32> = tokens.iter().map(|t| t.location.line).collect();
        assert_eq!(lines, vec![1, 3, 4, 6, 6]);
        assert_eq!(tokens[1].location.column, 6);
    }

    #[test]
    fn keywords_and_aliases() {
        let tokens = lex("t", "configuration include module foo").expect("lex");
        assert_eq!(tokens[0].kind, TokenKind::Module);
        assert_eq!(tokens[0].text, "configuration");
        assert_eq!(tokens[1].kind, TokenKind::Depends);
        assert_eq!(tokens[2].kind, TokenKind::Module);
        assert_eq!(tokens[3].kind, TokenKind::Ident("foo".to_string()));
    }

    #[test]
    fn punctuation_and_wildcard() {
        assert_eq!(
            kinds("@a.*[:]"),
            vec![
                TokenKind::At,
                TokenKind::Ident("a".to_string()),
                TokenKind::Wildcard,
                TokenKind::LBracket,
                TokenKind::Colon,
                TokenKind::RBracket,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn reports_illegal_character_with_location() {
        let err = lex("f", "module\n  #").unwrap_err();
        match err {
            Error::Lex { location, message } => {
                assert_eq!((location.line, location.column), (2, 3));
                assert!(message.contains('#'));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn reports_unterminated_string_and_comment() {
        assert!(matches!(lex("f", "'abc\n'"), Err(Error::Lex { .. })));
        assert!(matches!(lex("f", "\"\"\"abc"), Err(Error::Lex { .. })));
        assert!(matches!(lex("f", "/* open"), Err(Error::Lex { .. })));
    }
}
