//! Recursive-descent template parser.
//!
//! Statement keywords are reserved; embed property names (`title`, `author`,
//! `name`, …) are matched contextually so they stay usable as variable names.
//!
//! Expression precedence (low → high):
//!   `||`  `&&`  `|`  `&`  `< >`  `+ -`  `* / %`  unary `- ! ~`  `^` (right)

use std::rc::Rc;

use super::lexer::{Lexer, Spanned, Token};
use super::syntax::*;
use crate::error::{ParseError, SourcePos};

const KEYWORDS: &[&str] = &[
    "const", "function", "return", "if", "else", "for", "foreach", "in", "while", "do", "true",
    "false", "text", "attachment", "embed", "inline",
];

pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// Parse a whole template.  `file` labels positions in error messages.
pub fn parse_template(src: &str, file: Rc<str>) -> Result<Template, ParseError> {
    Parser::new(src, file).parse_template()
}

// ── Parser ────────────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    file: Rc<str>,
}

impl Parser {
    fn new(src: &str, file: Rc<str>) -> Self {
        Parser { tokens: Lexer::new(src).tokenize(), pos: 0, file }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map(|s| &s.token).unwrap_or(&Token::Eof)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).map(|s| &s.token).unwrap_or(&Token::Eof)
    }

    /// Position of the current token (or of the last one at end of input).
    fn here(&self) -> Pos {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|s| s.pos)
            .unwrap_or_default()
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn at_word(&self, word: &str) -> bool {
        matches!(self.peek(), Token::Ident(s) if s == word)
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.at_word(word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    // ── Errors ────────────────────────────────────────────────────────────────

    fn error_at(&self, message: impl Into<String>, pos: Pos) -> ParseError {
        ParseError::new(message, SourcePos::new(self.file.clone(), pos.line, pos.column))
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        self.error_at(format!("expected {expected}, found {}", self.peek().describe()), self.here())
    }

    fn expect(&mut self, expected: &Token) -> Result<Pos, ParseError> {
        let pos = self.here();
        if self.eat(expected) {
            Ok(pos)
        } else {
            Err(self.unexpected(&expected.describe()))
        }
    }

    fn expect_word(&mut self, word: &str) -> Result<Pos, ParseError> {
        let pos = self.here();
        if self.eat_word(word) {
            Ok(pos)
        } else {
            Err(self.unexpected(&format!("'{word}'")))
        }
    }

    /// A non-keyword identifier.
    fn expect_name(&mut self, what: &str) -> Result<(String, Pos), ParseError> {
        let pos = self.here();
        match self.peek() {
            Token::Ident(name) if !is_keyword(name) => {
                let name = name.clone();
                self.pos += 1;
                Ok((name, pos))
            }
            Token::Ident(name) => {
                Err(self.error_at(format!("'{name}' is a reserved keyword"), pos))
            }
            _ => Err(self.unexpected(what)),
        }
    }

    /// Any identifier, keyword or not (embed property names).
    fn expect_property(&mut self) -> Result<(String, Pos), ParseError> {
        let pos = self.here();
        if let Token::Ident(name) = self.peek() {
            let name = name.clone();
            self.pos += 1;
            return Ok((name, pos));
        }
        Err(self.unexpected("property name"))
    }

    /// `, inline` after a field's title and text.
    fn eat_inline_flag(&mut self) -> bool {
        let flagged = matches!(
            (self.peek(), self.peek_at(1)),
            (Token::Comma, Token::Ident(w)) if w == "inline"
        );
        if flagged {
            self.pos += 2;
        }
        flagged
    }

    fn expect_bool(&mut self) -> Result<bool, ParseError> {
        if self.eat_word("true") {
            Ok(true)
        } else if self.eat_word("false") {
            Ok(false)
        } else {
            Err(self.unexpected("'true' or 'false'"))
        }
    }

    // ── Template ──────────────────────────────────────────────────────────────

    fn parse_template(&mut self) -> Result<Template, ParseError> {
        let mut items = Vec::new();
        while self.peek() != &Token::Eof {
            if self.at_word("const") {
                let pos = self.here();
                self.pos += 1;
                let (name, _) = self.expect_name("constant name")?;
                self.expect(&Token::Assign)?;
                let value = self.parse_expr()?;
                self.expect(&Token::Semicolon)?;
                items.push(Item::Const { name, value, pos });
            } else {
                items.push(Item::Stmt(self.parse_stmt()?));
            }
        }
        Ok(Template { items })
    }

    // ── Statements ────────────────────────────────────────────────────────────

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.here();
        let word = match self.peek() {
            Token::LBrace => return self.parse_block(),
            Token::Semicolon => {
                self.pos += 1;
                return Ok(Stmt::new(StmtKind::Empty, pos));
            }
            Token::Ident(word) => word.clone(),
            _ => return self.parse_expr_stmt(),
        };

        let kind = match word.as_str() {
            "const" => {
                return Err(self.error_at("constants may only be declared at the top level", pos))
            }
            "function" => {
                self.pos += 1;
                let (name, name_pos) = self.expect_name("function name")?;
                self.expect(&Token::LParen)?;
                let mut params = Vec::new();
                if self.peek() != &Token::RParen {
                    loop {
                        params.push(self.expect_name("parameter name")?.0);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&Token::RParen)?;
                if self.peek() != &Token::LBrace {
                    return Err(self.unexpected("'{'"));
                }
                let body = Box::new(self.parse_block()?);
                StmtKind::FunctionDecl { name, name_pos, params, body }
            }
            "return" => {
                self.pos += 1;
                let value = self.parse_expr()?;
                self.expect(&Token::Semicolon)?;
                StmtKind::Return(value)
            }
            "if" => {
                self.pos += 1;
                let cond = self.parse_paren_expr()?;
                let then_branch = Box::new(self.parse_stmt()?);
                let else_branch = if self.eat_word("else") {
                    Some(Box::new(self.parse_stmt()?))
                } else {
                    None
                };
                StmtKind::If { cond, then_branch, else_branch }
            }
            "for" => {
                self.pos += 1;
                self.expect(&Token::LParen)?;
                let init = if self.peek() == &Token::Semicolon {
                    None
                } else {
                    Some(Box::new(self.parse_simple()?))
                };
                self.expect(&Token::Semicolon)?;
                let check = if self.peek() == &Token::Semicolon {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&Token::Semicolon)?;
                let step = if self.peek() == &Token::RParen {
                    None
                } else {
                    Some(Box::new(self.parse_simple()?))
                };
                self.expect(&Token::RParen)?;
                let body = Box::new(self.parse_stmt()?);
                StmtKind::For { init, check, step, body }
            }
            "foreach" => {
                self.pos += 1;
                self.expect(&Token::LParen)?;
                let (var, _) = self.expect_name("loop variable")?;
                self.expect_word("in")?;
                let iterable = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                let body = Box::new(self.parse_stmt()?);
                StmtKind::Foreach { var, iterable, body }
            }
            "while" => {
                self.pos += 1;
                let cond = self.parse_paren_expr()?;
                let body = Box::new(self.parse_stmt()?);
                StmtKind::While { cond, body }
            }
            "do" => {
                self.pos += 1;
                let body = Box::new(self.parse_stmt()?);
                self.expect_word("while")?;
                let cond = self.parse_paren_expr()?;
                self.expect(&Token::Semicolon)?;
                StmtKind::DoWhile { body, cond }
            }
            "text" => {
                self.pos += 1;
                let value = self.parse_expr()?;
                self.expect(&Token::Semicolon)?;
                StmtKind::Text(value)
            }
            "attachment" => {
                self.pos += 1;
                let value = self.parse_expr()?;
                self.expect(&Token::Semicolon)?;
                StmtKind::Attachment(value)
            }
            "embed" => {
                self.pos += 1;
                let mut parts = Vec::new();
                if self.eat(&Token::Dot) {
                    parts.push(self.parse_embed_part()?);
                } else {
                    self.expect(&Token::LBrace)?;
                    while self.peek() != &Token::RBrace {
                        if self.peek() == &Token::Eof {
                            return Err(self.unexpected("'}'"));
                        }
                        parts.push(self.parse_embed_part()?);
                    }
                    self.pos += 1;
                }
                StmtKind::Embed(parts)
            }
            _ => return self.parse_expr_stmt(),
        };
        Ok(Stmt::new(kind, pos))
    }

    fn parse_block(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.expect(&Token::LBrace)?;
        let mut body = Vec::new();
        while self.peek() != &Token::RBrace {
            if self.peek() == &Token::Eof {
                return Err(self.unexpected("'}'"));
            }
            body.push(self.parse_stmt()?);
        }
        self.pos += 1;
        Ok(Stmt::new(StmtKind::Block(body), pos))
    }

    fn parse_expr_stmt(&mut self) -> Result<Stmt, ParseError> {
        let stmt = self.parse_simple()?;
        self.expect(&Token::Semicolon)?;
        Ok(stmt)
    }

    /// `name = expr` or a bare expression, without the trailing `;`.
    fn parse_simple(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.here();
        if let (Token::Ident(_), Token::Assign) = (self.peek(), self.peek_at(1)) {
            let (name, _) = self.expect_name("variable name")?;
            self.pos += 1;
            let value = self.parse_expr()?;
            return Ok(Stmt::new(StmtKind::Assign { name, value }, pos));
        }
        let expr = self.parse_expr()?;
        Ok(Stmt::new(StmtKind::Expr(expr), pos))
    }

    fn parse_paren_expr(&mut self) -> Result<Expr, ParseError> {
        self.expect(&Token::LParen)?;
        let expr = self.parse_expr()?;
        self.expect(&Token::RParen)?;
        Ok(expr)
    }

    // ── Embed parts ───────────────────────────────────────────────────────────

    fn parse_mutate(&mut self) -> Result<Mutate, ParseError> {
        match self.peek() {
            Token::Assign => {
                self.pos += 1;
                Ok(Mutate::Replace)
            }
            Token::PlusAssign => {
                self.pos += 1;
                Ok(Mutate::Append)
            }
            _ => Err(self.unexpected("'=' or '+='")),
        }
    }

    fn parse_embed_part(&mut self) -> Result<EmbedPart, ParseError> {
        let (prop, pos) = self.expect_property()?;
        let kind = match prop.as_str() {
            "title" | "description" | "url" | "timestamp" | "color" | "image" => {
                self.expect(&Token::Assign)?;
                let value = self.parse_expr()?;
                match prop.as_str() {
                    "title" => EmbedPartKind::Title(value),
                    "description" => EmbedPartKind::Description(value),
                    "url" => EmbedPartKind::Url(value),
                    "timestamp" => EmbedPartKind::Timestamp(value),
                    "color" => EmbedPartKind::Color(value),
                    _ => EmbedPartKind::Image(value),
                }
            }
            "author" => {
                let (mutate, body) = self.parse_author()?;
                EmbedPartKind::Author { mutate, body }
            }
            "footer" => {
                let (mutate, body) = self.parse_footer()?;
                EmbedPartKind::Footer { mutate, body }
            }
            "field" | "fields" => {
                let (mutate, body) = self.parse_fields()?;
                EmbedPartKind::Fields { mutate, body }
            }
            other => return Err(self.error_at(format!("unknown embed property '{other}'"), pos)),
        };
        self.expect(&Token::Semicolon)?;
        Ok(EmbedPart { kind, pos })
    }

    /// `{ key: …, key: … }` with an optional trailing comma.
    fn parse_object<T>(
        &mut self,
        mut entry: impl FnMut(&mut Self, String, Pos) -> Result<T, ParseError>,
    ) -> Result<Vec<T>, ParseError> {
        self.expect(&Token::LBrace)?;
        let mut entries = Vec::new();
        while self.peek() != &Token::RBrace {
            let (key, pos) = self.expect_property()?;
            self.expect(&Token::Colon)?;
            entries.push(entry(self, key, pos)?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RBrace)?;
        Ok(entries)
    }

    fn parse_author(&mut self) -> Result<(Mutate, AuthorBody), ParseError> {
        fn prop(p: &Parser, key: &str, pos: Pos) -> Result<AuthorProp, ParseError> {
            match key {
                "name" => Ok(AuthorProp::Name),
                "url" => Ok(AuthorProp::Url),
                "icon" => Ok(AuthorProp::Icon),
                other => Err(p.error_at(format!("unknown author property '{other}'"), pos)),
            }
        }

        if self.eat(&Token::Dot) {
            let (key, pos) = self.expect_property()?;
            let which = prop(self, &key, pos)?;
            let mutate = self.parse_mutate()?;
            return Ok((mutate, AuthorBody::Property(which, self.parse_expr()?)));
        }

        let mutate = self.parse_mutate()?;
        if self.peek() == &Token::LBrace {
            let props = self.parse_object(|p, key, pos| {
                let which = prop(p, &key, pos)?;
                Ok((which, p.parse_expr()?))
            })?;
            return Ok((mutate, AuthorBody::Object(props)));
        }

        let name = self.parse_expr()?;
        let url = if self.eat(&Token::Comma) { Some(self.parse_expr()?) } else { None };
        let icon = if url.is_some() && self.eat(&Token::Comma) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok((mutate, AuthorBody::Flow { name, url, icon }))
    }

    fn parse_footer(&mut self) -> Result<(Mutate, FooterBody), ParseError> {
        fn prop(p: &Parser, key: &str, pos: Pos) -> Result<FooterProp, ParseError> {
            match key {
                "text" => Ok(FooterProp::Text),
                "icon" => Ok(FooterProp::Icon),
                other => Err(p.error_at(format!("unknown footer property '{other}'"), pos)),
            }
        }

        if self.eat(&Token::Dot) {
            let (key, pos) = self.expect_property()?;
            let which = prop(self, &key, pos)?;
            let mutate = self.parse_mutate()?;
            return Ok((mutate, FooterBody::Property(which, self.parse_expr()?)));
        }

        let mutate = self.parse_mutate()?;
        if self.peek() == &Token::LBrace {
            let props = self.parse_object(|p, key, pos| {
                let which = prop(p, &key, pos)?;
                Ok((which, p.parse_expr()?))
            })?;
            return Ok((mutate, FooterBody::Object(props)));
        }

        let text = self.parse_expr()?;
        let icon = if self.eat(&Token::Comma) { Some(self.parse_expr()?) } else { None };
        Ok((mutate, FooterBody::Flow { text, icon }))
    }

    fn parse_fields(&mut self) -> Result<(Mutate, FieldsBody), ParseError> {
        if self.eat(&Token::Dot) {
            let (key, pos) = self.expect_property()?;
            let mutate = self.parse_mutate()?;
            let which = match key.as_str() {
                "title" => FieldProp::Title(self.parse_expr()?),
                "text" => FieldProp::Text(self.parse_expr()?),
                "inline" => FieldProp::Inline(self.expect_bool()?),
                other => {
                    return Err(self.error_at(format!("unknown field property '{other}'"), pos))
                }
            };
            return Ok((mutate, FieldsBody::Property(which)));
        }

        let mutate = self.parse_mutate()?;
        if self.eat(&Token::LBracket) {
            let mut parts = Vec::new();
            loop {
                parts.push(self.parse_field_part()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::RBracket)?;
            return Ok((mutate, FieldsBody::List(parts)));
        }
        Ok((mutate, FieldsBody::Part(self.parse_field_part()?)))
    }

    fn parse_field_part(&mut self) -> Result<FieldPart, ParseError> {
        let pos = self.here();
        if self.peek() == &Token::LBrace {
            let props = self.parse_object(|p, key, pos| match key.as_str() {
                "title" => Ok(FieldProp::Title(p.parse_expr()?)),
                "text" => Ok(FieldProp::Text(p.parse_expr()?)),
                "inline" => Ok(FieldProp::Inline(p.expect_bool()?)),
                other => Err(p.error_at(format!("unknown field property '{other}'"), pos)),
            })?;
            return Ok(FieldPart::Object { props, pos });
        }

        // `("t", "v")` is a tuple; `("t" + x), "v"` is a flow form whose
        // first element happens to be parenthesized.
        if self.peek() == &Token::LParen {
            let start = self.pos;
            self.pos += 1;
            let title = self.parse_expr()?;
            if self.eat(&Token::Comma) {
                let text = self.parse_expr()?;
                let inline = self.eat_inline_flag();
                self.expect(&Token::RParen)?;
                return Ok(FieldPart::Flow { title, text, inline, pos });
            }
            self.pos = start;
        }

        let title = self.parse_expr()?;
        self.expect(&Token::Comma)?;
        let text = self.parse_expr()?;
        let inline = self.eat_inline_flag();
        Ok(FieldPart::Flow { title, text, inline, pos })
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        let pos = lhs.pos;
        Expr::new(ExprKind::Binary { op, left: Box::new(lhs), right: Box::new(rhs) }, pos)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = Self::binary(BinaryOp::LogicalOr, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_bitor()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_bitor()?;
            lhs = Self::binary(BinaryOp::LogicalAnd, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_bitor(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_bitand()?;
        while self.eat(&Token::Pipe) {
            let rhs = self.parse_bitand()?;
            lhs = Self::binary(BinaryOp::BitwiseOr, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_bitand(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_relational()?;
        while self.eat(&Token::Ampersand) {
            let rhs = self.parse_relational()?;
            lhs = Self::binary(BinaryOp::BitwiseAnd, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Lt => BinaryOp::LessThan,
                Token::Gt => BinaryOp::GreaterThan,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_additive()?;
            lhs = Self::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Plus,
                Token::Minus => BinaryOp::Minus,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Self::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Multiply,
                Token::Slash => BinaryOp::Divide,
                Token::Percent => BinaryOp::Modulus,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Self::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let pos = self.here();
        let op = match self.peek() {
            Token::Minus => UnaryOp::NumericNegate,
            Token::Bang => UnaryOp::LogicalNegate,
            Token::Tilde => UnaryOp::BitwiseNegate,
            _ => return self.parse_pow(),
        };
        self.pos += 1;
        let operand = Box::new(self.parse_unary()?);
        Ok(Expr::new(ExprKind::Unary { op, operand }, pos))
    }

    fn parse_pow(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_primary()?;
        if self.eat(&Token::Caret) {
            // right-associative; the exponent may carry its own sign
            let exponent = self.parse_unary()?;
            return Ok(Self::binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let pos = self.here();
        let kind = match self.peek().clone() {
            Token::Number(raw) => {
                self.pos += 1;
                ExprKind::Number(raw)
            }
            Token::Str(raw) => {
                self.pos += 1;
                ExprKind::Str(raw)
            }
            Token::Hex(raw) => {
                self.pos += 1;
                ExprKind::Hex(raw)
            }
            Token::Ident(word) if word == "true" || word == "false" => {
                self.pos += 1;
                ExprKind::Bool(word == "true")
            }
            Token::Ident(_) => {
                let (name, _) = self.expect_name("expression")?;
                if self.eat(&Token::LParen) {
                    let args = self.parse_args(&Token::RParen)?;
                    ExprKind::Call { name, args }
                } else {
                    ExprKind::Var(name)
                }
            }
            Token::LBracket => {
                self.pos += 1;
                ExprKind::List(self.parse_args(&Token::RBracket)?)
            }
            Token::LParen => {
                self.pos += 1;
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                return Ok(inner);
            }
            Token::Unknown(_) | Token::Unterminated(_) => {
                return Err(self.error_at(self.peek().describe(), pos));
            }
            _ => return Err(self.unexpected("expression")),
        };
        Ok(Expr::new(kind, pos))
    }

    /// Comma-separated expressions up to (and consuming) `close`.
    fn parse_args(&mut self, close: &Token) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.eat(close) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(close)?;
        Ok(args)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
