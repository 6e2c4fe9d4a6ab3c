//! Zero-copy tokenizer.
//!
//! Single-pass character scan; identifier and literal tokens are slices of
//! the input. Identifiers may contain dots (`x.a` is one token). Strings
//! quote with `'` or `"` and carry no escape sequences; numbers are bare
//! `[-]digits[.digits]` runs. Unknown characters fail with `SyntaxError`
//! carrying the byte position.

use crate::error::Error;
use crate::sql::token::{lookup_keyword, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    /// Byte position of the next unread character.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn next_token(&mut self) -> Result<Token<'a>, Error> {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        let start = self.pos;
        if start >= self.bytes.len() {
            return Ok(Token {
                kind: TokenKind::Eof,
                text: "",
                pos: start,
            });
        }

        let c = self.bytes[start];
        let single = |kind| Token {
            kind,
            text: &self.input[start..start + 1],
            pos: start,
        };
        match c {
            b';' => {
                self.pos += 1;
                Ok(single(TokenKind::Delimiter))
            }
            b',' | b'(' | b')' => {
                self.pos += 1;
                Ok(single(TokenKind::Separator(c as char)))
            }
            b'=' => {
                self.pos += 1;
                Ok(single(TokenKind::Op('=')))
            }
            b'*' => {
                self.pos += 1;
                Ok(single(TokenKind::Star))
            }
            b'\'' | b'"' => self.quoted_literal(c),
            b'-' | b'.' => self.number(start),
            b'0'..=b'9' => self.number(start),
            c if c.is_ascii_alphabetic() || c == b'_' => {
                self.pos += 1;
                while self.pos < self.bytes.len() && is_identifier_char(self.bytes[self.pos]) {
                    self.pos += 1;
                }
                let text = &self.input[start..self.pos];
                let kind = match lookup_keyword(text) {
                    Some(keyword) => TokenKind::Keyword(keyword),
                    None => TokenKind::Identifier,
                };
                Ok(Token {
                    kind,
                    text,
                    pos: start,
                })
            }
            other => Err(Error::Syntax {
                position: start,
                message: format!("unexpected character '{}'", other as char),
            }),
        }
    }

    fn quoted_literal(&mut self, quote: u8) -> Result<Token<'a>, Error> {
        let start = self.pos;
        self.pos += 1;
        let content_start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != quote {
            self.pos += 1;
        }
        if self.pos >= self.bytes.len() {
            return Err(Error::Syntax {
                position: start,
                message: "unterminated string literal".to_string(),
            });
        }
        let text = &self.input[content_start..self.pos];
        self.pos += 1; // closing quote
        Ok(Token {
            kind: TokenKind::Literal,
            text,
            pos: start,
        })
    }

    fn number(&mut self, start: usize) -> Result<Token<'a>, Error> {
        self.pos += 1;
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos].is_ascii_digit() || self.bytes[self.pos] == b'.')
        {
            self.pos += 1;
        }
        Ok(Token {
            kind: TokenKind::Literal,
            text: &self.input[start..self.pos],
            pos: start,
        })
    }

    /// Collects every token up to (and including) end of input.
    pub fn tokenize(mut self) -> Result<Vec<Token<'a>>, Error> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }
}

fn is_identifier_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'.'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::token::Keyword;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn tokenizes_a_select() {
        let kinds = kinds("SELECT a, b FROM t x WHERE x.a = 1;");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Keyword(Keyword::Select),
                TokenKind::Identifier,
                TokenKind::Separator(','),
                TokenKind::Identifier,
                TokenKind::Keyword(Keyword::From),
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Keyword(Keyword::Where),
                TokenKind::Identifier,
                TokenKind::Op('='),
                TokenKind::Literal,
                TokenKind::Delimiter,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn qualified_names_are_single_identifiers() {
        let tokens = Lexer::new("x.a").tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].text, "x.a");
    }

    #[test]
    fn quoted_strings_strip_quotes() {
        let tokens = Lexer::new("'hello world'").tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Literal);
        assert_eq!(tokens[0].text, "hello world");
    }

    #[test]
    fn negative_numbers_are_literals() {
        let tokens = Lexer::new("-12.5").tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Literal);
        assert_eq!(tokens[0].text, "-12.5");
    }

    #[test]
    fn unterminated_string_is_a_syntax_error() {
        assert!(matches!(
            Lexer::new("'oops").tokenize(),
            Err(Error::Syntax { .. })
        ));
    }

    #[test]
    fn unknown_character_reports_position() {
        let err = Lexer::new("select !").tokenize().unwrap_err();
        match err {
            Error::Syntax { position, .. } => assert_eq!(position, 7),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
