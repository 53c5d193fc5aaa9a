//! Template lexer.
//!
//! Produces a flat token list with positions.  The lexer never fails: bad
//! input becomes [`Token::Unknown`] or [`Token::Unterminated`] and the parser
//! reports it with the token's position.

use super::syntax::Pos;

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals (raw text)
    Number(String),
    Str(String),
    Hex(String),
    Ident(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Bang,
    Tilde,
    Ampersand,
    Pipe,
    And, // &&
    Or,  // ||
    Lt,
    Gt,

    // Assignment
    Assign,     // =
    PlusAssign, // +=

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Colon,
    Dot,

    /// Unrecognised input character.
    Unknown(char),
    /// A string literal or block comment that runs into end of input.
    Unterminated(&'static str),
    Eof,
}

impl Token {
    /// Human-readable form for "expected X, found Y" messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Number(s) | Token::Str(s) | Token::Hex(s) => format!("literal {s}"),
            Token::Ident(s) => format!("'{s}'"),
            Token::Unknown(c) => format!("unexpected character '{c}'"),
            Token::Unterminated(what) => format!("unterminated {what}"),
            Token::Eof => "end of input".to_owned(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Caret => "^",
            Token::Bang => "!",
            Token::Tilde => "~",
            Token::Ampersand => "&",
            Token::Pipe => "|",
            Token::And => "&&",
            Token::Or => "||",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::Assign => "=",
            Token::PlusAssign => "+=",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::Colon => ":",
            Token::Dot => ".",
            _ => "?",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: Pos,
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

pub struct Lexer {
    src: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(src: &str) -> Self {
        Lexer { src: src.chars().collect(), pos: 0, line: 1, column: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.src.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.src.get(self.pos).copied()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Skip whitespace and comments.  Returns `false` on an unterminated
    /// block comment.
    fn skip_trivia(&mut self) -> bool {
        loop {
            match (self.peek(), self.peek2()) {
                (Some(c), _) if c.is_whitespace() => {
                    self.advance();
                }
                (Some('/'), Some('/')) => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.advance();
                    }
                }
                (Some('/'), Some('*')) => {
                    self.advance();
                    self.advance();
                    loop {
                        match self.advance() {
                            None => return false,
                            Some('*') if self.peek() == Some('/') => {
                                self.advance();
                                break;
                            }
                            Some(_) => {}
                        }
                    }
                }
                _ => return true,
            }
        }
    }

    fn read_while(&mut self, s: &mut String, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.peek().filter(|&c| pred(c)) {
            s.push(c);
            self.advance();
        }
    }

    fn read_number(&mut self, first: char) -> Token {
        let mut s = String::from(first);

        // 0x-prefixed hex-looking literal
        if first == '0' && self.peek() == Some('x') {
            s.push('x');
            self.advance();
            self.read_while(&mut s, |c| c.is_ascii_alphanumeric());
            return Token::Hex(s);
        }

        self.read_while(&mut s, |c| c.is_ascii_digit());
        if self.peek() == Some('.') && self.peek2().is_some_and(|c| c.is_ascii_digit()) {
            s.push('.');
            self.advance();
            self.read_while(&mut s, |c| c.is_ascii_digit());
        }
        Token::Number(s)
    }

    /// Keeps the quotes and any backslash escapes verbatim.
    fn read_string(&mut self, quote: char) -> Token {
        let mut s = String::from(quote);
        loop {
            match self.advance() {
                None => return Token::Unterminated("string literal"),
                Some('\\') => {
                    s.push('\\');
                    match self.advance() {
                        Some(c) => s.push(c),
                        None => return Token::Unterminated("string literal"),
                    }
                }
                Some(c) if c == quote => {
                    s.push(c);
                    return Token::Str(s);
                }
                Some(c) => s.push(c),
            }
        }
    }

    fn next_token(&mut self) -> Spanned {
        let clean = self.skip_trivia();
        let pos = Pos::new(self.line, self.column);
        if !clean {
            return Spanned { token: Token::Unterminated("block comment"), pos };
        }
        let Some(ch) = self.advance() else {
            return Spanned { token: Token::Eof, pos };
        };

        let token = match ch {
            '0'..='9' => self.read_number(ch),
            '"' | '\'' => self.read_string(ch),
            '#' => {
                let mut s = String::from('#');
                self.read_while(&mut s, |c| c.is_ascii_alphanumeric());
                Token::Hex(s)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut s = String::from(c);
                self.read_while(&mut s, |c| c.is_ascii_alphanumeric() || c == '_');
                Token::Ident(s)
            }
            '+' => {
                if self.eat('=') {
                    Token::PlusAssign
                } else {
                    Token::Plus
                }
            }
            '&' => {
                if self.eat('&') {
                    Token::And
                } else {
                    Token::Ampersand
                }
            }
            '|' => {
                if self.eat('|') {
                    Token::Or
                } else {
                    Token::Pipe
                }
            }
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '^' => Token::Caret,
            '!' => Token::Bang,
            '~' => Token::Tilde,
            '<' => Token::Lt,
            '>' => Token::Gt,
            '=' => Token::Assign,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            ';' => Token::Semicolon,
            ':' => Token::Colon,
            '.' => Token::Dot,
            other => Token::Unknown(other),
        };
        Spanned { token, pos }
    }

    /// Tokenize the whole input.  The last token is always [`Token::Eof`]
    /// unless lexing stopped at an unterminated construct.
    pub fn tokenize(mut self) -> Vec<Spanned> {
        let mut tokens = Vec::new();
        loop {
            let next = self.next_token();
            let done = matches!(next.token, Token::Eof | Token::Unterminated(_));
            tokens.push(next);
            if done {
                break;
            }
        }
        tokens
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        Lexer::new(src).tokenize().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn literals() {
        assert_eq!(
            tokens(r#"42 3.5 "hi" 'yo' #10 0x1f"#),
            vec![
                Token::Number("42".into()),
                Token::Number("3.5".into()),
                Token::Str("\"hi\"".into()),
                Token::Str("'yo'".into()),
                Token::Hex("#10".into()),
                Token::Hex("0x1f".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn escaped_quote_stays_in_string() {
        assert_eq!(tokens(r#""a\"b""#), vec![Token::Str(r#""a\"b""#.into()), Token::Eof]);
    }

    #[test]
    fn operators() {
        assert_eq!(
            tokens("a += b && c || d & e | f"),
            vec![
                Token::Ident("a".into()),
                Token::PlusAssign,
                Token::Ident("b".into()),
                Token::And,
                Token::Ident("c".into()),
                Token::Or,
                Token::Ident("d".into()),
                Token::Ampersand,
                Token::Ident("e".into()),
                Token::Pipe,
                Token::Ident("f".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            tokens("a // line\n/* block\n */ b"),
            vec![Token::Ident("a".into()), Token::Ident("b".into()), Token::Eof]
        );
    }

    #[test]
    fn positions_track_lines() {
        let toks = Lexer::new("a\n  b").tokenize();
        assert_eq!(toks[0].pos, Pos::new(1, 0));
        assert_eq!(toks[1].pos, Pos::new(2, 2));
    }

    #[test]
    fn unterminated_string() {
        assert_eq!(tokens("\"abc"), vec![Token::Unterminated("string literal")]);
    }

    #[test]
    fn unknown_char() {
        assert_eq!(tokens("@"), vec![Token::Unknown('@'), Token::Eof]);
    }

    #[test]
    fn unicode_in_strings() {
        assert_eq!(tokens("\"héllo ✓\""), vec![Token::Str("\"héllo ✓\"".into()), Token::Eof]);
    }
}
