use amp_ast::Span;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    // Keywords (case-sensitive: `set` is a plain name)
    Set,
    If,
    For,
    Then,
    And,
    Or,
    Else,
    Endif,
    Next,
    Do,
    To,
    Downto,
    Elseif,
    Not,
    Var,

    // Literals
    Name(String),
    Number(i64),
    Str(String),

    // Operators
    Eq,
    EqEq,
    BangEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,

    // Punctuation
    LParen,
    RParen,
    At,
    Comma,
    Percent,
    LBracket,
    RBracket,

    // Block delimiters
    BlockOpen,  // %%[
    BlockClose, // ]%%
    ExprOpen,   // %%=
    ExprClose,  // =%%

    // Comments
    BlockComment(String),

    // Special
    Eof,
    Error(String),
    IllegalChar(char), // skipped during scanning, recoverable
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub text: String,
}

pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
        }
    }

    pub fn tokenize(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let tok = lexer.next_token();
            let is_eof = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        tokens
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.bytes.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == b' ' || ch == b'\t' || ch == b'\r' || ch == b'\n' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn make(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            span: Span::new(start as u32, self.pos as u32),
            text: self.source[start..self.pos].to_string(),
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let start = self.pos;

        let Some(ch) = self.peek() else {
            return Token {
                kind: TokenKind::Eof,
                span: Span::new(start as u32, start as u32),
                text: String::new(),
            };
        };

        match ch {
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.lex_name_or_keyword(start),
            b'0'..=b'9' => self.lex_number(start),
            b'"' => self.lex_string(start),
            b'/' => self.lex_slash(start),
            b'%' => self.lex_percent(start),
            b']' => self.lex_rbracket(start),
            b'=' => self.lex_eq(start),
            _ => self.lex_punct_or_operator(start),
        }
    }

    fn lex_name_or_keyword(&mut self, start: usize) -> Token {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = &self.source[start..self.pos];
        let kind = match text {
            "SET" => TokenKind::Set,
            "IF" => TokenKind::If,
            "FOR" => TokenKind::For,
            "THEN" => TokenKind::Then,
            "AND" => TokenKind::And,
            "OR" => TokenKind::Or,
            "ELSE" => TokenKind::Else,
            "ENDIF" => TokenKind::Endif,
            "NEXT" => TokenKind::Next,
            "DO" => TokenKind::Do,
            "TO" => TokenKind::To,
            "DOWNTO" => TokenKind::Downto,
            "ELSEIF" => TokenKind::Elseif,
            "NOT" => TokenKind::Not,
            "VAR" => TokenKind::Var,
            _ => TokenKind::Name(text.to_string()),
        };
        self.make(kind, start)
    }

    fn lex_number(&mut self, start: usize) -> Token {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = &self.source[start..self.pos];
        match text.parse::<i64>() {
            Ok(value) => self.make(TokenKind::Number(value), start),
            Err(_) => self.make(
                TokenKind::Error("integer literal too large".to_string()),
                start,
            ),
        }
    }

    fn lex_string(&mut self, start: usize) -> Token {
        self.pos += 1; // consume opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    return self.make(
                        TokenKind::Error("unterminated string literal".to_string()),
                        start,
                    );
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.advance() {
                        Some(b'n') => value.push('\n'),
                        Some(b't') => value.push('\t'),
                        Some(b'\\') => value.push('\\'),
                        Some(b'"') => value.push('"'),
                        Some(ch) => {
                            value.push('\\');
                            value.push(ch as char);
                        }
                        None => {}
                    }
                }
                Some(b'"') => {
                    self.pos += 1; // consume closing quote
                    return self.make(TokenKind::Str(value), start);
                }
                Some(ch) if ch.is_ascii() => {
                    value.push(ch as char);
                    self.pos += 1;
                }
                Some(_) => {
                    let ch = self.source[self.pos..].chars().next().unwrap();
                    value.push(ch);
                    self.pos += ch.len_utf8();
                }
            }
        }
    }

    fn lex_slash(&mut self, start: usize) -> Token {
        self.pos += 1; // consume '/'
        if self.peek() == Some(b'*') {
            self.pos += 1;
            loop {
                match self.peek() {
                    None => {
                        return self
                            .make(TokenKind::Error("unterminated comment".to_string()), start);
                    }
                    Some(b'*') if self.peek_at(1) == Some(b'/') => {
                        self.pos += 2;
                        break;
                    }
                    _ => {
                        self.pos += 1;
                    }
                }
            }
            let text = self.source[start..self.pos].to_string();
            return self.make(TokenKind::BlockComment(text), start);
        }
        self.make(TokenKind::Slash, start)
    }

    // Longest match: `%%[` and `%%=` win over a bare `%`.
    fn lex_percent(&mut self, start: usize) -> Token {
        if self.peek_at(1) == Some(b'%') {
            match self.peek_at(2) {
                Some(b'[') => {
                    self.pos += 3;
                    return self.make(TokenKind::BlockOpen, start);
                }
                Some(b'=') => {
                    self.pos += 3;
                    return self.make(TokenKind::ExprOpen, start);
                }
                _ => {}
            }
        }
        self.pos += 1;
        self.make(TokenKind::Percent, start)
    }

    fn lex_rbracket(&mut self, start: usize) -> Token {
        if self.peek_at(1) == Some(b'%') && self.peek_at(2) == Some(b'%') {
            self.pos += 3;
            return self.make(TokenKind::BlockClose, start);
        }
        self.pos += 1;
        self.make(TokenKind::RBracket, start)
    }

    fn lex_eq(&mut self, start: usize) -> Token {
        if self.peek_at(1) == Some(b'=') {
            self.pos += 2;
            return self.make(TokenKind::EqEq, start);
        }
        if self.peek_at(1) == Some(b'%') && self.peek_at(2) == Some(b'%') {
            self.pos += 3;
            return self.make(TokenKind::ExprClose, start);
        }
        self.pos += 1;
        self.make(TokenKind::Eq, start)
    }

    fn lex_punct_or_operator(&mut self, start: usize) -> Token {
        // Handle multi-byte UTF-8 characters that aren't valid tokens
        let ch_char = self.source[self.pos..].chars().next().unwrap();
        if !ch_char.is_ascii() {
            self.pos += ch_char.len_utf8();
            return self.make(TokenKind::IllegalChar(ch_char), start);
        }
        let Some(ch) = self.advance() else {
            return self.make(TokenKind::Eof, start);
        };

        match ch {
            b'(' => self.make(TokenKind::LParen, start),
            b')' => self.make(TokenKind::RParen, start),
            b'@' => self.make(TokenKind::At, start),
            b',' => self.make(TokenKind::Comma, start),
            b'[' => self.make(TokenKind::LBracket, start),
            b'+' => self.make(TokenKind::Plus, start),
            b'-' => self.make(TokenKind::Minus, start),
            b'*' => self.make(TokenKind::Star, start),
            b'<' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    self.make(TokenKind::LtEq, start)
                } else {
                    self.make(TokenKind::Lt, start)
                }
            }
            b'>' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    self.make(TokenKind::GtEq, start)
                } else {
                    self.make(TokenKind::Gt, start)
                }
            }
            b'!' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    self.make(TokenKind::BangEq, start)
                } else {
                    self.make(TokenKind::IllegalChar('!'), start)
                }
            }
            _ => {
                // Error recovery: skip the character, keep scanning
                self.make(TokenKind::IllegalChar(ch as char), start)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::tokenize(src)
            .into_iter()
            .filter(|t| !matches!(t.kind, TokenKind::Eof | TokenKind::BlockComment(_)))
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn keyword_vs_name() {
        assert_eq!(
            kinds("SET @total"),
            vec![
                TokenKind::Set,
                TokenKind::At,
                TokenKind::Name("total".into()),
            ]
        );
    }

    #[test]
    fn keywords_are_case_sensitive() {
        assert_eq!(kinds("set"), vec![TokenKind::Name("set".into())]);
        assert_eq!(kinds("Endif"), vec![TokenKind::Name("Endif".into())]);
    }

    #[test]
    fn name_with_keyword_prefix() {
        assert_eq!(kinds("SETTING"), vec![TokenKind::Name("SETTING".into())]);
    }

    #[test]
    fn all_keywords() {
        assert_eq!(
            kinds("SET IF FOR THEN AND OR ELSE ENDIF NEXT DO TO DOWNTO ELSEIF NOT VAR"),
            vec![
                TokenKind::Set,
                TokenKind::If,
                TokenKind::For,
                TokenKind::Then,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Else,
                TokenKind::Endif,
                TokenKind::Next,
                TokenKind::Do,
                TokenKind::To,
                TokenKind::Downto,
                TokenKind::Elseif,
                TokenKind::Not,
                TokenKind::Var,
            ]
        );
    }

    #[test]
    fn number_literal() {
        assert_eq!(kinds("42"), vec![TokenKind::Number(42)]);
    }

    #[test]
    fn number_too_large() {
        let tokens = kinds("99999999999999999999");
        assert!(matches!(tokens[0], TokenKind::Error(_)));
    }

    #[test]
    fn double_quoted_string() {
        assert_eq!(
            kinds(r#""hello world""#),
            vec![TokenKind::Str("hello world".into())]
        );
    }

    #[test]
    fn escape_sequences() {
        assert_eq!(
            kinds(r#""line1\nline2""#),
            vec![TokenKind::Str("line1\nline2".into())]
        );
        assert_eq!(
            kinds(r#""say \"hi\"""#),
            vec![TokenKind::Str("say \"hi\"".into())]
        );
    }

    #[test]
    fn unknown_escape_passes_through() {
        assert_eq!(kinds(r#""a\qb""#), vec![TokenKind::Str("a\\qb".into())]);
    }

    #[test]
    fn unterminated_string() {
        let tokens = kinds(r#""hello"#);
        assert!(matches!(tokens[0], TokenKind::Error(_)));
    }

    #[test]
    fn string_ends_at_newline() {
        let tokens = kinds("\"hello\nSET");
        assert!(matches!(tokens[0], TokenKind::Error(_)));
        assert_eq!(tokens[1], TokenKind::Set);
    }

    #[test]
    fn block_delimiters() {
        assert_eq!(kinds("%%["), vec![TokenKind::BlockOpen]);
        assert_eq!(kinds("]%%"), vec![TokenKind::BlockClose]);
        assert_eq!(kinds("%%="), vec![TokenKind::ExprOpen]);
        assert_eq!(kinds("=%%"), vec![TokenKind::ExprClose]);
    }

    #[test]
    fn delimiter_longest_match() {
        assert_eq!(
            kinds("% % ["),
            vec![TokenKind::Percent, TokenKind::Percent, TokenKind::LBracket]
        );
        assert_eq!(kinds("= =%%"), vec![TokenKind::Eq, TokenKind::ExprClose]);
        assert_eq!(kinds("] %%"), vec![
            TokenKind::RBracket,
            TokenKind::Percent,
            TokenKind::Percent,
        ]);
    }

    #[test]
    fn all_comparison_ops() {
        assert_eq!(
            kinds("== != < > <= >="),
            vec![
                TokenKind::EqEq,
                TokenKind::BangEq,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::LtEq,
                TokenKind::GtEq,
            ]
        );
    }

    #[test]
    fn arithmetic_ops() {
        assert_eq!(
            kinds("+ - * /"),
            vec![
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
            ]
        );
    }

    #[test]
    fn whitespace_skipped() {
        assert_eq!(
            kinds("SET   @a  =  42"),
            vec![
                TokenKind::Set,
                TokenKind::At,
                TokenKind::Name("a".into()),
                TokenKind::Eq,
                TokenKind::Number(42),
            ]
        );
    }

    #[test]
    fn block_comment() {
        let tokens = Lexer::tokenize("1 /* skip me */ 2");
        let comment = tokens
            .iter()
            .find(|t| matches!(t.kind, TokenKind::BlockComment(_)));
        assert!(comment.is_some());
        assert_eq!(kinds("1 /* skip me */ 2"), vec![
            TokenKind::Number(1),
            TokenKind::Number(2),
        ]);
    }

    #[test]
    fn unterminated_comment() {
        let tokens = kinds("1 /* no end");
        assert!(tokens.iter().any(|t| matches!(t, TokenKind::Error(_))));
    }

    #[test]
    fn error_recovery() {
        let tokens = kinds("@a \u{00a7} @b");
        assert!(tokens
            .iter()
            .any(|t| matches!(t, TokenKind::IllegalChar('\u{00a7}'))));
        assert!(tokens.iter().any(|t| *t == TokenKind::Name("b".into())));
    }

    #[test]
    fn bang_alone_is_illegal() {
        assert_eq!(kinds("!"), vec![TokenKind::IllegalChar('!')]);
    }

    #[test]
    fn full_statement_block() {
        assert_eq!(
            kinds(r#"%%[ SET @a = 1 ]%%"#),
            vec![
                TokenKind::BlockOpen,
                TokenKind::Set,
                TokenKind::At,
                TokenKind::Name("a".into()),
                TokenKind::Eq,
                TokenKind::Number(1),
                TokenKind::BlockClose,
            ]
        );
    }

    #[test]
    fn inline_expr_block() {
        assert_eq!(
            kinds("%%= Concat(@a, \"!\") =%%"),
            vec![
                TokenKind::ExprOpen,
                TokenKind::Name("Concat".into()),
                TokenKind::LParen,
                TokenKind::At,
                TokenKind::Name("a".into()),
                TokenKind::Comma,
                TokenKind::Str("!".into()),
                TokenKind::RParen,
                TokenKind::ExprClose,
            ]
        );
    }

    #[test]
    fn spans_cover_lexemes() {
        let tokens = Lexer::tokenize("SET @ab");
        assert_eq!(tokens[0].span, Span::new(0, 3));
        assert_eq!(tokens[0].text, "SET");
        assert_eq!(tokens[2].span, Span::new(5, 7));
        assert_eq!(tokens[2].text, "ab");
    }
}
