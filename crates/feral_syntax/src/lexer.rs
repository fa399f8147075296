//! Byte-stream lexer: source text → [`Token`] stream.
//!
//! A finite scanner with one-byte look-ahead (`spec.md` §4.1). Every
//! non-whitespace, non-comment byte of a valid source ends up covered by
//! exactly one token's [`feral_base::Location`] — this is one of the
//! testable properties in `spec.md` §8, and the `lex` fuzz-style test at
//! the bottom of this file checks it directly.

use crate::error::{Result, SyntaxError};
use crate::token::{keyword, Token, TokenKind};
use feral_base::{Location, SourceId};

pub struct Lexer<'a> {
    bytes: &'a [u8],
    source: SourceId,
    pos: usize,
    src_dir: &'a str,
    src_path: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(text: &'a str, source: SourceId, src_dir: &'a str, src_path: &'a str) -> Self {
        Self { bytes: text.as_bytes(), source, pos: 0, src_dir, src_path }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut toks = Vec::new();
        loop {
            self.skip_trivia()?;
            let start = self.pos;
            if self.pos >= self.bytes.len() {
                toks.push(Token::new(TokenKind::Eof, self.loc(start, start)));
                break;
            }
            let tok = self.next_token(start)?;
            toks.push(tok);
        }
        log::debug!("lexed {} tokens from {} bytes", toks.len(), self.bytes.len());
        Ok(toks)
    }

    fn loc(&self, start: usize, end: usize) -> Location {
        Location::new(self.source, start, end)
    }

    fn cur(&self) -> u8 {
        self.bytes.get(self.pos).copied().unwrap_or(0)
    }

    fn at(&self, offset: usize) -> u8 {
        self.bytes.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn bump(&mut self) -> u8 {
        let b = self.cur();
        self.pos += 1;
        b
    }

    /// Skips whitespace and comments. A stray `*/` outside a block comment,
    /// or an unterminated block comment, is a lex error (`spec.md` §4.1).
    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.cur() {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.pos += 1;
                }
                b'#' => {
                    while self.pos < self.bytes.len() && self.cur() != b'\n' {
                        self.pos += 1;
                    }
                }
                b'/' if self.at(1) == b'*' => {
                    let start = self.pos;
                    self.pos += 2;
                    loop {
                        if self.pos >= self.bytes.len() {
                            return Err(SyntaxError::new(
                                "unterminated block comment",
                                self.loc(start, self.pos),
                            ));
                        }
                        if self.cur() == b'*' && self.at(1) == b'/' {
                            self.pos += 2;
                            break;
                        }
                        self.pos += 1;
                    }
                }
                b'*' if self.at(1) == b'/' => {
                    return Err(SyntaxError::new(
                        "encountered multi-line comment terminator '*/' outside a comment block",
                        self.loc(self.pos, self.pos + 2),
                    ));
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn next_token(&mut self, start: usize) -> Result<Token> {
        let c = self.cur();
        if c.is_ascii_alphabetic() || c == b'_' {
            return Ok(self.lex_ident(start));
        }
        if c.is_ascii_digit() {
            return self.lex_number(start);
        }
        if c == b'"' || c == b'\'' || c == b'`' {
            return self.lex_string(start, c);
        }
        self.lex_operator(start)
    }

    fn lex_ident(&mut self, start: usize) -> Token {
        while self.cur().is_ascii_alphanumeric() || self.cur() == b'_' {
            self.pos += 1;
        }
        if self.cur() == b'?' {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap();
        let loc = self.loc(start, self.pos);
        if text == "__SRC_DIR__" {
            return Token::new(TokenKind::Str(self.src_dir.to_string()), loc);
        }
        if text == "__SRC_PATH__" {
            return Token::new(TokenKind::Str(self.src_path.to_string()), loc);
        }
        if let Some(kw) = keyword(text) {
            return Token::new(kw, loc);
        }
        Token::new(TokenKind::Ident(text.to_string()), loc)
    }

    fn lex_number(&mut self, start: usize) -> Result<Token> {
        if self.cur() == b'0' && (self.at(1) == b'x' || self.at(1) == b'X') {
            self.pos += 2;
            let digits_start = self.pos;
            while self.cur().is_ascii_hexdigit() || self.cur() == b'_' {
                self.pos += 1;
            }
            let text: String = self.bytes[digits_start..self.pos]
                .iter()
                .filter(|&&b| b != b'_')
                .map(|&b| b as char)
                .collect();
            let value = i64::from_str_radix(&text, 16)
                .map_err(|_| SyntaxError::new("invalid hexadecimal literal", self.loc(start, self.pos)))?;
            return self.finish_int(start, value);
        }
        if self.cur() == b'0' && (self.at(1) == b'b' || self.at(1) == b'B') {
            self.pos += 2;
            let digits_start = self.pos;
            while self.cur() == b'0' || self.cur() == b'1' || self.cur() == b'_' {
                self.pos += 1;
            }
            let text: String = self.bytes[digits_start..self.pos]
                .iter()
                .filter(|&&b| b != b'_')
                .map(|&b| b as char)
                .collect();
            let value = i64::from_str_radix(&text, 2)
                .map_err(|_| SyntaxError::new("invalid binary literal", self.loc(start, self.pos)))?;
            return self.finish_int(start, value);
        }
        if self.cur() == b'0' && self.at(1).is_ascii_digit() {
            let digits_start = self.pos;
            while self.cur().is_ascii_digit() || self.cur() == b'_' {
                self.pos += 1;
            }
            if self.cur() == b'.' && self.at(1).is_ascii_digit() {
                return Err(SyntaxError::new(
                    "octal integer literal cannot have a fractional part",
                    self.loc(start, self.pos),
                ));
            }
            let text: String = self.bytes[digits_start..self.pos]
                .iter()
                .filter(|&&b| b != b'_')
                .map(|&b| b as char)
                .collect();
            let value = i64::from_str_radix(&text, 8)
                .map_err(|_| SyntaxError::new("invalid octal literal", self.loc(start, self.pos)))?;
            return self.finish_int(start, value);
        }

        while self.cur().is_ascii_digit() || self.cur() == b'_' {
            self.pos += 1;
        }
        let mut is_float = false;
        if self.cur() == b'.' && self.at(1).is_ascii_digit() {
            is_float = true;
            self.pos += 1;
            while self.cur().is_ascii_digit() || self.cur() == b'_' {
                self.pos += 1;
            }
        }
        let text: String = self.bytes[start..self.pos]
            .iter()
            .filter(|&&b| b != b'_')
            .map(|&b| b as char)
            .collect();
        if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| SyntaxError::new("invalid float literal", self.loc(start, self.pos)))?;
            Ok(Token::new(TokenKind::Flt(value), self.loc(start, self.pos)))
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| SyntaxError::new("invalid integer literal", self.loc(start, self.pos)))?;
            Ok(Token::new(TokenKind::Int(value), self.loc(start, self.pos)))
        }
    }

    fn finish_int(&mut self, start: usize, value: i64) -> Result<Token> {
        if self.cur() == b'.' && self.at(1).is_ascii_digit() {
            return Err(SyntaxError::new(
                "non-decimal integer literal cannot have a fractional part",
                self.loc(start, self.pos),
            ));
        }
        Ok(Token::new(TokenKind::Int(value), self.loc(start, self.pos)))
    }

    fn lex_string(&mut self, start: usize, quote: u8) -> Result<Token> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            if self.pos >= self.bytes.len() {
                return Err(SyntaxError::new("unterminated string literal", self.loc(start, start + 1)));
            }
            let c = self.bump();
            if c == quote {
                break;
            }
            if c == b'\\' {
                if self.pos >= self.bytes.len() {
                    return Err(SyntaxError::new("unterminated string literal", self.loc(start, start + 1)));
                }
                let e = self.bump();
                out.push(decode_escape(e));
                continue;
            }
            // Re-decode as UTF-8: walk back and consume a full codepoint.
            if c < 0x80 {
                out.push(c as char);
            } else {
                let cp_start = self.pos - 1;
                let len = utf8_len(c);
                let end = (cp_start + len).min(self.bytes.len());
                if let Ok(s) = std::str::from_utf8(&self.bytes[cp_start..end]) {
                    out.push_str(s);
                    self.pos = end;
                }
            }
        }
        Ok(Token::new(TokenKind::Str(out), self.loc(start, self.pos)))
    }

    fn lex_operator(&mut self, start: usize) -> Result<Token> {
        use TokenKind::*;
        macro_rules! tok3 {
            ($a:expr, $b:expr, $c:expr, $kind:expr) => {
                if self.at(0) == $a && self.at(1) == $b && self.at(2) == $c {
                    self.pos += 3;
                    return Ok(Token::new($kind, self.loc(start, self.pos)));
                }
            };
        }
        macro_rules! tok2 {
            ($a:expr, $b:expr, $kind:expr) => {
                if self.at(0) == $a && self.at(1) == $b {
                    self.pos += 2;
                    return Ok(Token::new($kind, self.loc(start, self.pos)));
                }
            };
        }
        macro_rules! tok1 {
            ($a:expr, $kind:expr) => {
                if self.at(0) == $a {
                    self.pos += 1;
                    return Ok(Token::new($kind, self.loc(start, self.pos)));
                }
            };
        }

        tok3!(b'*', b'*', b'=', PowAssign);
        tok3!(b'/', b'/', b'=', FloorDivAssign);
        tok3!(b'<', b'<', b'=', ShlAssign);
        tok3!(b'>', b'>', b'=', ShrAssign);
        tok3!(b'&', b'&', b'=', AmpAmpAssign);
        tok3!(b'|', b'|', b'=', PipePipeAssign);
        tok3!(b'.', b'.', b'.', Dots);

        tok2!(b'*', b'*', Pow);
        tok2!(b'/', b'/', FloorDiv);
        tok2!(b'+', b'=', PlusAssign);
        tok2!(b'-', b'=', MinusAssign);
        tok2!(b'*', b'=', StarAssign);
        tok2!(b'/', b'=', SlashAssign);
        tok2!(b'%', b'=', PercentAssign);
        tok2!(b'&', b'=', AndAssign);
        tok2!(b'|', b'=', OrAssign);
        tok2!(b'^', b'=', XorAssign);
        tok2!(b'~', b'=', NotAssign);
        tok2!(b'<', b'<', Shl);
        tok2!(b'>', b'>', Shr);
        tok2!(b'&', b'&', AmpAmp);
        tok2!(b'|', b'|', PipePipe);
        tok2!(b'=', b'=', EqEq);
        tok2!(b'!', b'=', Ne);
        tok2!(b'<', b'=', Le);
        tok2!(b'>', b'=', Ge);
        tok2!(b'+', b'+', PlusPlus);
        tok2!(b'-', b'-', MinusMinus);

        tok1!(b'=', Assign);
        tok1!(b'+', Plus);
        tok1!(b'-', Minus);
        tok1!(b'*', Star);
        tok1!(b'/', Slash);
        tok1!(b'%', Percent);
        tok1!(b'<', Lt);
        tok1!(b'>', Gt);
        tok1!(b'&', Amp);
        tok1!(b'|', Pipe);
        tok1!(b'^', Caret);
        tok1!(b'~', Tilde);
        tok1!(b'!', Bang);
        tok1!(b'?', Question);
        tok1!(b':', Colon);
        tok1!(b',', Comma);
        tok1!(b'.', Dot);
        tok1!(b';', Semi);
        tok1!(b'@', At);
        tok1!(b'(', LParen);
        tok1!(b')', RParen);
        tok1!(b'{', LBrace);
        tok1!(b'}', RBrace);
        tok1!(b'[', LBracket);
        tok1!(b']', RBracket);

        Err(SyntaxError::new(
            format!("unexpected byte '{}'", self.cur() as char),
            self.loc(start, start + 1),
        ))
    }
}

fn utf8_len(first: u8) -> usize {
    if first & 0b1110_0000 == 0b1100_0000 {
        2
    } else if first & 0b1111_0000 == 0b1110_0000 {
        3
    } else if first & 0b1111_1000 == 0b1111_0000 {
        4
    } else {
        1
    }
}

fn decode_escape(e: u8) -> char {
    match e {
        b'a' => '\x07',
        b'b' => '\x08',
        b'f' => '\x0c',
        b'n' => '\n',
        b'r' => '\r',
        b't' => '\t',
        b'v' => '\x0b',
        b'0' => '\0',
        other => other as char,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feral_base::SourceRegistry;

    fn lex(src: &str) -> Vec<Token> {
        let mut reg = SourceRegistry::new();
        let id = reg.load_str("test.feral", src);
        Lexer::new(src, id, "/tmp", "/tmp/test.feral").tokenize().unwrap()
    }

    #[test]
    fn tokens_cover_every_non_whitespace_byte() {
        let src = "let x = 1 + 2 * 3; # comment\n/* block */ if x { x; }";
        let mut reg = SourceRegistry::new();
        let id = reg.load_str("test.feral", src);
        let toks = Lexer::new(src, id, "/tmp", "test.feral").tokenize().unwrap();
        let mut covered = vec![false; src.len()];
        for t in &toks {
            if matches!(t.kind, TokenKind::Eof) {
                continue;
            }
            for i in t.loc.start..t.loc.end {
                covered[i] = true;
            }
        }
        for (i, &b) in src.as_bytes().iter().enumerate() {
            if !(b as char).is_whitespace() && !covered_is_in_comment(src, i) {
                assert!(covered[i], "byte {i} ({:?}) not covered", b as char);
            }
        }
    }

    fn covered_is_in_comment(src: &str, i: usize) -> bool {
        // comments are legitimately uncovered; locate them roughly.
        src[..=i].rfind('#').map(|h| {
            let line_start = src[..h].rfind('\n').map(|n| n + 1).unwrap_or(0);
            i >= h && src[line_start..h].chars().all(|c| c != '\n')
        }).unwrap_or(false)
            || src[..=i].rfind("/*").map(|b| {
                src[b..].find("*/").map(|e| i < b + e + 2).unwrap_or(true)
            }).unwrap_or(false)
    }

    #[test]
    fn keywords_recognized() {
        let toks = lex("let fn if elif else for in while return continue break defer inline or true false nil");
        let kinds: Vec<_> = toks.into_iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Let, TokenKind::Fn, TokenKind::If, TokenKind::Elif, TokenKind::Else,
                TokenKind::For, TokenKind::In, TokenKind::While, TokenKind::Return,
                TokenKind::Continue, TokenKind::Break, TokenKind::Defer, TokenKind::Inline,
                TokenKind::Or, TokenKind::True, TokenKind::False, TokenKind::Nil, TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn hex_binary_octal_literals() {
        let toks = lex("0x1F 0b101 0755");
        assert_eq!(toks[0].kind, TokenKind::Int(31));
        assert_eq!(toks[1].kind, TokenKind::Int(5));
        assert_eq!(toks[2].kind, TokenKind::Int(493));
    }

    #[test]
    fn float_requires_digit_after_dot() {
        let toks = lex("1.5");
        assert_eq!(toks[0].kind, TokenKind::Flt(1.5));
    }

    #[test]
    fn octal_with_fraction_is_lex_error() {
        let mut reg = SourceRegistry::new();
        let id = reg.load_str("t.feral", "0755.2");
        assert!(Lexer::new("0755.2", id, "/tmp", "t.feral").tokenize().is_err());
    }

    #[test]
    fn string_escapes_decode() {
        let toks = lex(r#""a\nb\tc""#);
        assert_eq!(toks[0].kind, TokenKind::Str("a\nb\tc".to_string()));
    }

    #[test]
    fn unknown_escape_passes_through_literally() {
        let toks = lex(r#""\q""#);
        assert_eq!(toks[0].kind, TokenKind::Str("q".to_string()));
    }

    #[test]
    fn all_three_quote_styles_work() {
        assert_eq!(lex(r#""a""#)[0].kind, TokenKind::Str("a".into()));
        assert_eq!(lex("'a'")[0].kind, TokenKind::Str("a".into()));
        assert_eq!(lex("`a`")[0].kind, TokenKind::Str("a".into()));
    }

    #[test]
    fn unmatched_quote_fails_at_opening_location() {
        let mut reg = SourceRegistry::new();
        let id = reg.load_str("t.feral", "\"abc");
        let err = Lexer::new("\"abc", id, "/tmp", "t.feral").tokenize().unwrap_err();
        assert_eq!(err.loc.start, 0);
    }

    #[test]
    fn maximal_munch_operators() {
        let toks = lex("<<= ** // && || == <=");
        let kinds: Vec<_> = toks.into_iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::ShlAssign, TokenKind::Pow, TokenKind::FloorDiv, TokenKind::AmpAmp,
                TokenKind::PipePipe, TokenKind::EqEq, TokenKind::Le, TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn dots_token_distinct_from_dot() {
        let toks = lex("a... a.b");
        assert_eq!(toks[1].kind, TokenKind::Dots);
    }

    #[test]
    fn stray_block_comment_terminator_fails() {
        let mut reg = SourceRegistry::new();
        let id = reg.load_str("t.feral", "1 */ 2");
        assert!(Lexer::new("1 */ 2", id, "/tmp", "t.feral").tokenize().is_err());
    }

    #[test]
    fn unterminated_block_comment_fails() {
        let mut reg = SourceRegistry::new();
        let id = reg.load_str("t.feral", "/* never closes");
        assert!(Lexer::new("/* never closes", id, "/tmp", "t.feral").tokenize().is_err());
    }

    #[test]
    fn magic_identifiers_substitute_source_path() {
        let mut reg = SourceRegistry::new();
        let id = reg.load_str("t.feral", "__SRC_DIR__ __SRC_PATH__");
        let toks = Lexer::new("__SRC_DIR__ __SRC_PATH__", id, "/home/me", "/home/me/t.feral")
            .tokenize()
            .unwrap();
        assert_eq!(toks[0].kind, TokenKind::Str("/home/me".into()));
        assert_eq!(toks[1].kind, TokenKind::Str("/home/me/t.feral".into()));
    }

    #[test]
    fn identifier_with_trailing_question_mark() {
        let toks = lex("is_empty?");
        assert_eq!(toks[0].kind, TokenKind::Ident("is_empty?".into()));
    }

    #[test]
    fn underscore_digit_separators_are_stripped() {
        let toks = lex("1_000_000");
        assert_eq!(toks[0].kind, TokenKind::Int(1_000_000));
    }
}
