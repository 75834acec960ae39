//! Character-level scanner. Yields tokens on demand; does not look ahead
//! past what a single `scan_token` call needs.

use crate::token::{Token, TokenType, KEYWORDS};

pub struct Scanner<'a> {
    source: &'a str,
    start: usize,
    current: usize,
    start_column: u32,
    line: u32,
    column: u32,
}

fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

fn is_alpha(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Scanner {
            source,
            start: 0,
            current: 0,
            start_column: 0,
            line: 1,
            column: 0,
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn peek(&self) -> char {
        self.source[self.current..].chars().next().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        let mut chars = self.source[self.current..].chars();
        chars.next();
        chars.next().unwrap_or('\0')
    }

    fn advance(&mut self) -> char {
        let c = self.peek();
        self.current += c.len_utf8();
        self.column += 1;
        c
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.peek() != expected {
            false
        } else {
            self.advance();
            true
        }
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                ' ' | '\r' | '\t' => {
                    self.advance();
                }
                '\n' => {
                    self.advance();
                    self.line += 1;
                    self.column = 0;
                }
                '/' if self.peek_next() == '/' => {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn make_token(&self, kind: TokenType) -> Token {
        Token {
            kind,
            lexeme: self.source[self.start..self.current].to_string(),
            line: self.line,
            column: self.start_column,
        }
    }

    fn error_token(&self, message: &'static str) -> Token {
        Token {
            kind: TokenType::Error,
            lexeme: message.to_string(),
            line: self.line,
            column: self.start_column,
        }
    }

    fn string(&mut self) -> Token {
        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
                self.column = 0;
            }
            self.advance();
        }
        if self.is_at_end() {
            return self.error_token("Unterminated string.");
        }
        self.advance();
        self.make_token(TokenType::String)
    }

    fn number(&mut self) -> Token {
        while is_digit(self.peek()) {
            self.advance();
        }
        if self.peek() == '.' && is_digit(self.peek_next()) {
            self.advance();
            while is_digit(self.peek()) {
                self.advance();
            }
        }
        self.make_token(TokenType::Number)
    }

    fn identifier_type(&self) -> TokenType {
        let text = &self.source[self.start..self.current];
        KEYWORDS
            .iter()
            .find(|(kw, _)| *kw == text)
            .map(|(_, kind)| *kind)
            .unwrap_or(TokenType::Identifier)
    }

    fn identifier(&mut self) -> Token {
        while is_alpha(self.peek()) || is_digit(self.peek()) {
            self.advance();
        }
        self.make_token(self.identifier_type())
    }

    pub fn scan_token(&mut self) -> Token {
        self.skip_whitespace();
        self.start = self.current;
        self.start_column = self.column;

        if self.is_at_end() {
            return self.make_token(TokenType::Eof);
        }

        let c = self.advance();

        if is_alpha(c) {
            return self.identifier();
        }
        if is_digit(c) {
            return self.number();
        }

        match c {
            '(' => self.make_token(TokenType::OParen),
            ')' => self.make_token(TokenType::CParen),
            '{' => self.make_token(TokenType::OBrace),
            '}' => self.make_token(TokenType::CBrace),
            ';' => self.make_token(TokenType::Semicolon),
            ',' => self.make_token(TokenType::Comma),
            '.' => self.make_token(TokenType::Dot),
            '-' => self.make_token(TokenType::Minus),
            '+' => self.make_token(TokenType::Plus),
            '/' => self.make_token(TokenType::Slash),
            '*' => self.make_token(TokenType::Star),
            '!' => {
                let kind = if self.match_char('=') {
                    TokenType::BangEqual
                } else {
                    TokenType::Bang
                };
                self.make_token(kind)
            }
            '=' => {
                let kind = if self.match_char('=') {
                    TokenType::EqualEqual
                } else {
                    TokenType::Equal
                };
                self.make_token(kind)
            }
            '<' => {
                let kind = if self.match_char('=') {
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                };
                self.make_token(kind)
            }
            '>' => {
                let kind = if self.match_char('=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                };
                self.make_token(kind)
            }
            '"' => self.string(),
            _ => self.error_token("Unexpected character."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenType> {
        let mut scanner = Scanner::new(source);
        let mut out = Vec::new();
        loop {
            let token = scanner.scan_token();
            let done = token.kind == TokenType::Eof;
            out.push(token.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn scans_arithmetic_expression() {
        use TokenType::*;
        assert_eq!(
            kinds("1 + 2 * 3;"),
            vec![Number, Plus, Number, Star, Number, Semicolon, Eof]
        );
    }

    #[test]
    fn scans_two_char_operators() {
        use TokenType::*;
        assert_eq!(
            kinds("a != b == c <= d >= e"),
            vec![
                Identifier, BangEqual, Identifier, EqualEqual, Identifier, LessEqual, Identifier,
                GreaterEqual, Identifier, Eof
            ]
        );
    }

    #[test]
    fn recognizes_keywords() {
        use TokenType::*;
        assert_eq!(kinds("var print nil true false"), vec![Var, Print, Nil, True, False, Eof]);
    }

    #[test]
    fn skips_line_comments() {
        use TokenType::*;
        assert_eq!(kinds("1 // a comment\n+ 2"), vec![Number, Plus, Number, Eof]);
    }

    #[test]
    fn tracks_line_numbers_across_newlines() {
        let mut scanner = Scanner::new("1\n2\n3");
        assert_eq!(scanner.scan_token().line, 1);
        assert_eq!(scanner.scan_token().line, 2);
        assert_eq!(scanner.scan_token().line, 3);
    }

    #[test]
    fn unterminated_string_reports_error_token() {
        let mut scanner = Scanner::new("\"abc");
        let token = scanner.scan_token();
        assert_eq!(token.kind, TokenType::Error);
        assert_eq!(token.lexeme, "Unterminated string.");
    }

    #[test]
    fn unexpected_character_reports_error_token() {
        let mut scanner = Scanner::new("@");
        let token = scanner.scan_token();
        assert_eq!(token.kind, TokenType::Error);
        assert_eq!(token.lexeme, "Unexpected character.");
    }
}
