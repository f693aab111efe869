//! Lexer
//!
//! This submodule prepares source code for parsing by splitting the text into
//! easy-to-work-with tokens. [Lexer::next_token] is its main interface: it
//! advances a byte cursor with one byte of lookahead and hands out one token
//! per call, yielding end-of-file tokens forever once the input is exhausted.
//!
//! Illegal characters and unterminated strings are not fatal here; they
//! surface as [TokenKind::Illegal] tokens (or a string running to the end of
//! input) and the parser reports them when it meets them.

use crate::token::{lookup_ident, Token, TokenKind};
use crate::Span;

pub struct Lexer<'src> {
    input: &'src [u8],
    /// Position of `ch`
    position: usize,
    /// Next position to read
    read_position: usize,
    /// Byte under examination, 0 at end of input
    ch: u8,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        let mut lexer = Self {
            input: source.as_bytes(),
            position: 0,
            read_position: 0,
            ch: 0,
        };
        lexer.read_char();
        lexer
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();

        let start = self.position;
        let token = match self.ch {
            b'=' => {
                if self.peek_char() == b'=' {
                    self.read_char();
                    Token::new(TokenKind::Eq, "==", Span::new(start, start + 2))
                } else {
                    self.single(TokenKind::Assign)
                }
            }
            b'!' => {
                if self.peek_char() == b'=' {
                    self.read_char();
                    Token::new(TokenKind::NotEq, "!=", Span::new(start, start + 2))
                } else {
                    self.single(TokenKind::Bang)
                }
            }
            b'+' => self.single(TokenKind::Plus),
            b'-' => self.single(TokenKind::Minus),
            b'*' => self.single(TokenKind::Asterisk),
            b'/' => self.single(TokenKind::Slash),
            b'%' => self.single(TokenKind::Percent),
            b'<' => self.single(TokenKind::Lt),
            b'>' => self.single(TokenKind::Gt),
            b',' => self.single(TokenKind::Comma),
            b';' => self.single(TokenKind::Semicolon),
            b':' => self.single(TokenKind::Colon),
            b'.' => self.single(TokenKind::Dot),
            b'(' => self.single(TokenKind::LParen),
            b')' => self.single(TokenKind::RParen),
            b'{' => self.single(TokenKind::LBrace),
            b'}' => self.single(TokenKind::RBrace),
            b'[' => self.single(TokenKind::LBracket),
            b']' => self.single(TokenKind::RBracket),
            b'"' => {
                let literal = self.read_string();
                let token = Token::new(
                    TokenKind::String,
                    literal,
                    Span::new(start, self.read_position.min(self.input.len())),
                );
                self.read_char();
                log::trace!("token {:?} {:?}", token.kind, token.literal);
                return token;
            }
            0 => return Token::eof(self.position),
            ch if is_letter(ch) => {
                let literal = self.read_identifier();
                let token = Token::new(
                    lookup_ident(literal),
                    literal,
                    Span::new(start, self.position),
                );
                log::trace!("token {:?} {:?}", token.kind, token.literal);
                return token;
            }
            ch if ch.is_ascii_digit() => {
                let literal = self.read_number();
                let token = Token::new(TokenKind::Int, literal, Span::new(start, self.position));
                log::trace!("token {:?} {:?}", token.kind, token.literal);
                return token;
            }
            _ => self.single(TokenKind::Illegal),
        };

        self.read_char();
        log::trace!("token {:?} {:?}", token.kind, token.literal);
        token
    }

    fn single(&self, kind: TokenKind) -> Token {
        let literal = (self.ch as char).to_string();
        Token::new(kind, literal, Span::new(self.position, self.position + 1))
    }

    fn read_char(&mut self) {
        self.ch = self.input.get(self.read_position).copied().unwrap_or(0);
        self.position = self.read_position;
        self.read_position += 1;
    }

    fn peek_char(&self) -> u8 {
        self.input.get(self.read_position).copied().unwrap_or(0)
    }

    /// Skip whitespace and `//` line comments, in any interleaving
    fn skip_trivia(&mut self) {
        loop {
            while matches!(self.ch, b' ' | b'\t' | b'\r' | b'\n') {
                self.read_char();
            }
            if self.ch == b'/' && self.peek_char() == b'/' {
                while self.ch != b'\n' && self.ch != 0 {
                    self.read_char();
                }
            } else {
                return;
            }
        }
    }

    fn read_identifier(&mut self) -> &'src str {
        let start = self.position;
        while is_letter(self.ch) || self.ch.is_ascii_digit() {
            self.read_char();
        }
        // Identifiers start at a letter, so the range is valid UTF-8
        std::str::from_utf8(&self.input[start..self.position]).expect("ascii identifier")
    }

    fn read_number(&mut self) -> &'src str {
        let start = self.position;
        while self.ch.is_ascii_digit() {
            self.read_char();
        }
        std::str::from_utf8(&self.input[start..self.position]).expect("ascii number")
    }

    /// Read the content between the opening quote (under the cursor) and the
    /// next quote. A string running into the end of input is accepted as-is.
    fn read_string(&mut self) -> String {
        let start = self.position + 1;
        loop {
            self.read_char();
            if self.ch == b'"' || self.ch == 0 {
                break;
            }
        }
        String::from_utf8_lossy(&self.input[start..self.position]).into_owned()
    }
}

fn is_letter(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(src: &str) -> Vec<(TokenKind, String)> {
        let mut lexer = Lexer::new(src);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push((token.kind, token.literal));
            if done {
                return tokens;
            }
        }
    }

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).into_iter().map(|(kind, _)| kind).collect()
    }

    #[test]
    fn function_declaration() {
        let src = "func main() int {\n\treturn 42\n}";

        assert_eq!(
            tokenize(src),
            vec![
                (TokenKind::Func, String::from("func")),
                (TokenKind::Ident, String::from("main")),
                (TokenKind::LParen, String::from("(")),
                (TokenKind::RParen, String::from(")")),
                (TokenKind::Ident, String::from("int")),
                (TokenKind::LBrace, String::from("{")),
                (TokenKind::Return, String::from("return")),
                (TokenKind::Int, String::from("42")),
                (TokenKind::RBrace, String::from("}")),
                (TokenKind::Eof, String::new()),
            ]
        );
    }

    #[test]
    fn operators_and_delimiters() {
        let src = "= + - ! * / % < > == != , ; : . ( ) { } [ ]";

        assert_eq!(
            kinds(src),
            vec![
                TokenKind::Assign,
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Bang,
                TokenKind::Asterisk,
                TokenKind::Slash,
                TokenKind::Percent,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::Eq,
                TokenKind::NotEq,
                TokenKind::Comma,
                TokenKind::Semicolon,
                TokenKind::Colon,
                TokenKind::Dot,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn two_char_operators_need_no_space() {
        assert_eq!(
            kinds("a==b!=c"),
            vec![
                TokenKind::Ident,
                TokenKind::Eq,
                TokenKind::Ident,
                TokenKind::NotEq,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_are_never_identifiers() {
        let src = "package func const let return if else true false while break continue type";
        let toks = tokenize(src);
        assert!(toks
            .iter()
            .take(toks.len() - 1)
            .all(|(kind, _)| *kind != TokenKind::Ident));
    }

    #[test]
    fn identifiers_keep_their_spelling() {
        assert_eq!(
            tokenize("minhaFuncao _x y2"),
            vec![
                (TokenKind::Ident, String::from("minhaFuncao")),
                (TokenKind::Ident, String::from("_x")),
                (TokenKind::Ident, String::from("y2")),
                (TokenKind::Eof, String::new()),
            ]
        );
    }

    #[test]
    fn string_literal_content_excludes_quotes() {
        assert_eq!(
            tokenize(r#"let s = "hello, world""#),
            vec![
                (TokenKind::Let, String::from("let")),
                (TokenKind::Ident, String::from("s")),
                (TokenKind::Assign, String::from("=")),
                (TokenKind::String, String::from("hello, world")),
                (TokenKind::Eof, String::new()),
            ]
        );
    }

    #[test]
    fn unterminated_string_runs_to_end_of_input() {
        assert_eq!(
            tokenize("\"abc"),
            vec![
                (TokenKind::String, String::from("abc")),
                (TokenKind::Eof, String::new()),
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        let src = "let x = 1; // trailing note\n// full line\nreturn x";

        assert_eq!(
            kinds(src),
            vec![
                TokenKind::Let,
                TokenKind::Ident,
                TokenKind::Assign,
                TokenKind::Int,
                TokenKind::Semicolon,
                TokenKind::Return,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unknown_byte_is_illegal_not_fatal() {
        assert_eq!(
            tokenize("#"),
            vec![
                (TokenKind::Illegal, String::from("#")),
                (TokenKind::Eof, String::new()),
            ]
        );
    }

    #[test]
    fn eof_repeats_forever() {
        let mut lexer = Lexer::new("");
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    }

    #[test]
    fn spans_index_into_the_source() {
        let src = "let abc = 12";
        let mut lexer = Lexer::new(src);

        let let_tok = lexer.next_token();
        assert_eq!(let_tok.span, Span::new(0, 3));

        let ident = lexer.next_token();
        assert_eq!(ident.span, Span::new(4, 7));
        assert_eq!(&src[ident.span.start..ident.span.end], "abc");

        let assign = lexer.next_token();
        assert_eq!(assign.span, Span::new(8, 9));

        let int = lexer.next_token();
        assert_eq!(&src[int.span.start..int.span.end], "12");
    }
}
