//! Syntax tree → component tree.
//!
//! One visit per node, bottom-up.  Only `const` declarations do work at
//! compile time: their initializer runs against the root context and the
//! result lands in the constants table.
//!
//! Every component that can fail at runtime stamps its own source position
//! onto errors raised without one, so the innermost failing node wins.

use std::rc::Rc;

use chrono::{DateTime, Utc};

use super::component::{Component, FunctionComponent};
use super::context::Context;
use super::ops;
use super::syntax::*;
use super::value::{coercion_error, Value};
use crate::error::{CompileError, RuntimeError, SourcePos};
use crate::message::{Author, Embed, Field, Footer};

pub struct Compiler<'r> {
    root: &'r Context<'r>,
    file: Rc<str>,
}

impl<'r> Compiler<'r> {
    /// `root` receives constants declared by the template; `file` labels
    /// source positions.
    pub fn new(root: &'r Context<'r>, file: Rc<str>) -> Self {
        Self { root, file }
    }

    fn pos(&self, pos: Pos) -> SourcePos {
        SourcePos::new(self.file.clone(), pos.line, pos.column)
    }

    pub fn compile(&self, template: &Template) -> Result<Component, CompileError> {
        let mut items = Vec::with_capacity(template.items.len());
        for item in &template.items {
            items.push(self.item(item)?);
        }
        Ok(Component::Document(items))
    }

    fn item(&self, item: &Item) -> Result<Component, CompileError> {
        match item {
            Item::Stmt(stmt) => self.stmt(stmt),
            Item::Const { name, value, pos } => {
                let init = self.expr(value)?;
                let value = init.value(self.root).map_err(|e| {
                    let e = e.at(&self.pos(*pos));
                    CompileError::new(e.message, e.pos)
                })?;
                self.root.set_constant(name, value);
                Ok(Component::NoOp)
            }
        }
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    pub fn expr(&self, expr: &Expr) -> Result<Component, CompileError> {
        let pos = self.pos(expr.pos);
        Ok(match &expr.kind {
            ExprKind::Str(raw) => Component::Constant(Value::from(unquote(raw))),
            ExprKind::Number(raw) => match raw.parse::<f64>() {
                Ok(n) => Component::Constant(Value::Number(n)),
                Err(_) => return Err(CompileError::new(format!("invalid number: {raw}"), pos)),
            },
            ExprKind::Bool(b) => Component::Constant(Value::Bool(*b)),
            ExprKind::Hex(raw) => match parse_hex(raw) {
                Some(n) => Component::Constant(Value::Int(n)),
                None => return Err(CompileError::new(format!("invalid hex number: {raw}"), pos)),
            },
            ExprKind::Var(name) => {
                let name = name.clone();
                computed_at(pos, move |ctx| ctx.read(&name))
            }
            ExprKind::List(items) => {
                let items = self.exprs(items)?;
                computed_at(pos, move |ctx| Ok(Value::List(values(&items, ctx)?)))
            }
            ExprKind::Call { name, args } => {
                let name = name.clone();
                let args = self.exprs(args)?;
                computed_at(pos, move |ctx| {
                    let args = values(&args, ctx)?;
                    ctx.function(&name)?.call(ctx, &args)
                })
            }
            ExprKind::Unary { op, operand } => {
                let op = *op;
                let operand = self.expr(operand)?;
                computed_at(pos, move |ctx| ops::unary(op, &operand.value(ctx)?))
            }
            ExprKind::Binary { op, left, right } => {
                let op = *op;
                let left = self.expr(left)?;
                let right = self.expr(right)?;
                // both sides always run: `&&` and `||` do not short-circuit
                computed_at(pos, move |ctx| {
                    let l = left.value(ctx)?;
                    let r = right.value(ctx)?;
                    ops::binary(op, &l, &r)
                })
            }
        })
    }

    fn exprs(&self, exprs: &[Expr]) -> Result<Vec<Component>, CompileError> {
        exprs.iter().map(|e| self.expr(e)).collect()
    }

    fn opt_expr(&self, expr: Option<&Expr>) -> Result<Option<Component>, CompileError> {
        expr.map(|e| self.expr(e)).transpose()
    }

    // ── Statements ────────────────────────────────────────────────────────────

    pub fn stmt(&self, stmt: &Stmt) -> Result<Component, CompileError> {
        let pos = self.pos(stmt.pos);
        Ok(match &stmt.kind {
            StmtKind::Empty => Component::NoOp,
            // plain blocks share the enclosing scope
            StmtKind::Block(body) => Component::Document(self.stmts(body)?),
            StmtKind::Assign { name, value } => {
                let name = name.clone();
                let value = self.expr(value)?;
                emitting_at(pos, move |ctx| {
                    ctx.set_variable(&name, value.value(ctx)?, false);
                    Ok(())
                })
            }
            StmtKind::Expr(expr) => {
                let expr = self.expr(expr)?;
                emitting_at(pos, move |ctx| expr.value(ctx).map(drop))
            }
            StmtKind::FunctionDecl { name, name_pos, params, body } => {
                if self.root.is_system_function(name) {
                    return Err(CompileError::new(
                        format!("cannot rebind system function '{name}'"),
                        self.pos(*name_pos),
                    ));
                }
                let func = Rc::new(FunctionComponent {
                    name: name.clone(),
                    params: params.clone(),
                    body: self.stmt(body)?,
                    pos: pos.clone(),
                });
                emitting_at(pos, move |ctx| {
                    ctx.set_function(Rc::clone(&func));
                    Ok(())
                })
            }
            StmtKind::Return(value) => {
                let value = self.expr(value)?;
                emitting_at(pos, move |ctx| {
                    ctx.set_return_value(value.value(ctx)?);
                    Ok(())
                })
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                let cond = self.expr(cond)?;
                let then_branch = self.stmt(then_branch)?;
                let else_branch = match else_branch {
                    Some(stmt) => self.stmt(stmt)?,
                    None => Component::NoOp,
                };
                emitting_at(pos, move |ctx| {
                    let scope = ctx.child();
                    if condition(&cond, &scope)? {
                        then_branch.value(&scope)?;
                    } else {
                        else_branch.value(&scope)?;
                    }
                    Ok(())
                })
            }
            StmtKind::For { init, check, step, body } => {
                let init = self.opt_stmt(init.as_deref())?;
                let check = self.opt_expr(check.as_ref())?;
                let step = self.opt_stmt(step.as_deref())?;
                let body = self.stmt(body)?;
                emitting_at(pos, move |ctx| {
                    let scope = ctx.child();
                    init.value(&scope)?;
                    // no check clause: the body never runs
                    let Some(check) = &check else { return Ok(()) };
                    while condition(check, &scope)? {
                        body.value(&scope)?;
                        step.value(&scope)?;
                    }
                    Ok(())
                })
            }
            StmtKind::Foreach { var, iterable, body } => {
                let var = var.clone();
                let iterable = self.expr(iterable)?;
                let body = self.stmt(body)?;
                emitting_at(pos, move |ctx| {
                    let scope = ctx.child();
                    let items = match iterable.value(&scope)? {
                        Value::List(items) => items,
                        Value::Null => {
                            return Err(RuntimeError::internal("foreach target is null"))
                        }
                        other => {
                            return Err(RuntimeError::internal(format!(
                                "value of type {} is not enumerable",
                                other.type_name()
                            )))
                        }
                    };
                    for item in items {
                        scope.set_variable(&var, item, false);
                        body.value(&scope)?;
                    }
                    Ok(())
                })
            }
            StmtKind::While { cond, body } => {
                let cond = self.expr(cond)?;
                let body = self.stmt(body)?;
                emitting_at(pos, move |ctx| {
                    let scope = ctx.child();
                    while condition(&cond, &scope)? {
                        body.value(&scope)?;
                    }
                    Ok(())
                })
            }
            StmtKind::DoWhile { body, cond } => {
                let body = self.stmt(body)?;
                let cond = self.expr(cond)?;
                emitting_at(pos, move |ctx| {
                    let scope = ctx.child();
                    loop {
                        body.value(&scope)?;
                        if !condition(&cond, &scope)? {
                            return Ok(());
                        }
                    }
                })
            }
            StmtKind::Text(value) => {
                let value = self.expr(value)?;
                emitting_at(pos, move |ctx| {
                    if let Some(text) = value.value(ctx)?.to_text() {
                        ctx.message().borrow_mut().content = Some(text);
                    }
                    Ok(())
                })
            }
            StmtKind::Attachment(value) => {
                let value = self.expr(value)?;
                emitting_at(pos, move |ctx| {
                    if let Some(url) = value.value(ctx)?.to_text() {
                        ctx.message().borrow_mut().attach(url);
                    }
                    Ok(())
                })
            }
            StmtKind::Embed(parts) => {
                let mut compiled = Vec::with_capacity(parts.len());
                for part in parts {
                    compiled.push(self.embed_part(part)?);
                }
                Component::Document(compiled)
            }
        })
    }

    fn stmts(&self, stmts: &[Stmt]) -> Result<Vec<Component>, CompileError> {
        stmts.iter().map(|s| self.stmt(s)).collect()
    }

    fn opt_stmt(&self, stmt: Option<&Stmt>) -> Result<Component, CompileError> {
        Ok(match stmt {
            Some(stmt) => self.stmt(stmt)?,
            None => Component::NoOp,
        })
    }

    // ── Embed parts ───────────────────────────────────────────────────────────

    fn embed_part(&self, part: &EmbedPart) -> Result<Component, CompileError> {
        let pos = self.pos(part.pos);
        Ok(match &part.kind {
            EmbedPartKind::Title(value) => {
                embed_text(pos, self.expr(value)?, |embed, text| embed.title = Some(text))
            }
            EmbedPartKind::Description(value) => {
                embed_text(pos, self.expr(value)?, |embed, text| embed.description = Some(text))
            }
            EmbedPartKind::Url(value) => {
                embed_text(pos, self.expr(value)?, |embed, text| embed.url = Some(text))
            }
            EmbedPartKind::Image(value) => {
                embed_text(pos, self.expr(value)?, |embed, url| embed.image().url = url)
            }
            EmbedPartKind::Timestamp(value) => {
                let value = self.expr(value)?;
                emitting_at(pos, move |ctx| {
                    if let Some(t) = to_timestamp(value.value(ctx)?)? {
                        ctx.message().borrow_mut().embed().timestamp = Some(t);
                    }
                    Ok(())
                })
            }
            EmbedPartKind::Color(value) => {
                let value = self.expr(value)?;
                emitting_at(pos, move |ctx| {
                    if let Some(color) = value.value(ctx)?.to_integer()? {
                        ctx.message().borrow_mut().embed().color = Some(color);
                    }
                    Ok(())
                })
            }
            EmbedPartKind::Author { mutate, body } => self.author(pos, *mutate, body)?,
            EmbedPartKind::Footer { mutate, body } => self.footer(pos, *mutate, body)?,
            EmbedPartKind::Fields { mutate, body } => self.fields(pos, *mutate, body)?,
        })
    }

    fn author(
        &self,
        pos: SourcePos,
        mutate: Mutate,
        body: &AuthorBody,
    ) -> Result<Component, CompileError> {
        let props = match body {
            AuthorBody::Flow { name, url, icon } => {
                let name = self.expr(name)?;
                let url = self.opt_expr(url.as_ref())?;
                let icon = self.opt_expr(icon.as_ref())?;
                return Ok(emitting_at(pos, move |ctx| {
                    let author = Author {
                        name: required(&name, ctx, "embed.author.name")?,
                        url: optional(url.as_ref(), ctx)?,
                        icon_url: optional(icon.as_ref(), ctx)?,
                    };
                    ctx.message().borrow_mut().embed().set_author(Some(author));
                    Ok(())
                }));
            }
            AuthorBody::Object(props) => {
                let mut compiled = Vec::with_capacity(props.len());
                for (prop, value) in props {
                    compiled.push((*prop, self.expr(value)?));
                }
                compiled
            }
            AuthorBody::Property(prop, value) => vec![(*prop, self.expr(value)?)],
        };

        Ok(emitting_at(pos, move |ctx| {
            let values = prop_values(&props, ctx)?;
            let mut doc = ctx.message().borrow_mut();
            let embed = doc.embed();
            if mutate == Mutate::Replace {
                embed.set_author(None);
            }
            let author = embed.author();
            for (prop, value) in values {
                match prop {
                    AuthorProp::Name => author.name = value,
                    AuthorProp::Url => author.url = Some(value),
                    AuthorProp::Icon => author.icon_url = Some(value),
                }
            }
            Ok(())
        }))
    }

    fn footer(
        &self,
        pos: SourcePos,
        mutate: Mutate,
        body: &FooterBody,
    ) -> Result<Component, CompileError> {
        let props = match body {
            FooterBody::Flow { text, icon } => {
                let text = self.expr(text)?;
                let icon = self.opt_expr(icon.as_ref())?;
                return Ok(emitting_at(pos, move |ctx| {
                    let footer = Footer {
                        text: required(&text, ctx, "embed.footer.text")?,
                        icon_url: optional(icon.as_ref(), ctx)?,
                    };
                    ctx.message().borrow_mut().embed().set_footer(Some(footer));
                    Ok(())
                }));
            }
            FooterBody::Object(props) => {
                let mut compiled = Vec::with_capacity(props.len());
                for (prop, value) in props {
                    compiled.push((*prop, self.expr(value)?));
                }
                compiled
            }
            FooterBody::Property(prop, value) => vec![(*prop, self.expr(value)?)],
        };

        Ok(emitting_at(pos, move |ctx| {
            let values = prop_values(&props, ctx)?;
            let mut doc = ctx.message().borrow_mut();
            let embed = doc.embed();
            if mutate == Mutate::Replace {
                embed.set_footer(None);
            }
            let footer = embed.footer();
            for (prop, value) in values {
                match prop {
                    FooterProp::Text => footer.text = value,
                    FooterProp::Icon => footer.icon_url = Some(value),
                }
            }
            Ok(())
        }))
    }

    fn fields(
        &self,
        pos: SourcePos,
        mutate: Mutate,
        body: &FieldsBody,
    ) -> Result<Component, CompileError> {
        let replace = mutate == Mutate::Replace;
        let parts = match body {
            FieldsBody::Part(part) => vec![self.field_part(part)?],
            FieldsBody::List(parts) => {
                let mut compiled = Vec::with_capacity(parts.len());
                for part in parts {
                    compiled.push(self.field_part(part)?);
                }
                compiled
            }
            FieldsBody::Property(prop) => {
                let prop = self.field_prop(prop)?;
                return Ok(emitting_at(pos, move |ctx| {
                    let edits = field_edits(std::slice::from_ref(&prop), ctx)?;
                    let mut doc = ctx.message().borrow_mut();
                    let embed = doc.embed();
                    if replace {
                        embed.fields.clear();
                    }
                    apply_field_edits(embed.last_field(), edits);
                    Ok(())
                }));
            }
        };

        Ok(emitting_at(pos, move |ctx| {
            if replace {
                ctx.message().borrow_mut().embed().fields.clear();
            }
            for part in &parts {
                match part {
                    CompiledFieldPart::Flow { title, text, inline, pos } => {
                        let field = Field {
                            title: required(title, ctx, "embed.field.title").map_err(|e| e.at(pos))?,
                            text: required(text, ctx, "embed.field.text").map_err(|e| e.at(pos))?,
                            inline: *inline,
                        };
                        ctx.message().borrow_mut().embed().fields.push(field);
                    }
                    CompiledFieldPart::Object { props, pos } => {
                        let edits = field_edits(props, ctx).map_err(|e| e.at(pos))?;
                        let mut doc = ctx.message().borrow_mut();
                        let embed = doc.embed();
                        embed.fields.push(Field::default());
                        apply_field_edits(embed.last_field(), edits);
                    }
                }
            }
            Ok(())
        }))
    }

    fn field_part(&self, part: &FieldPart) -> Result<CompiledFieldPart, CompileError> {
        Ok(match part {
            FieldPart::Flow { title, text, inline, pos } => CompiledFieldPart::Flow {
                title: self.expr(title)?,
                text: self.expr(text)?,
                inline: *inline,
                pos: self.pos(*pos),
            },
            FieldPart::Object { props, pos } => {
                let mut compiled = Vec::with_capacity(props.len());
                for prop in props {
                    compiled.push(self.field_prop(prop)?);
                }
                CompiledFieldPart::Object { props: compiled, pos: self.pos(*pos) }
            }
        })
    }

    fn field_prop(&self, prop: &FieldProp) -> Result<CompiledFieldProp, CompileError> {
        Ok(match prop {
            FieldProp::Title(value) => CompiledFieldProp::Title(self.expr(value)?),
            FieldProp::Text(value) => CompiledFieldProp::Text(self.expr(value)?),
            FieldProp::Inline(inline) => CompiledFieldProp::Inline(*inline),
        })
    }
}

// ── Runtime helpers ───────────────────────────────────────────────────────────

fn computed_at(
    pos: SourcePos,
    f: impl Fn(&Context<'_>) -> Result<Value, RuntimeError> + 'static,
) -> Component {
    Component::computed(move |ctx| f(ctx).map_err(|e| e.at(&pos)))
}

fn emitting_at(
    pos: SourcePos,
    f: impl Fn(&Context<'_>) -> Result<(), RuntimeError> + 'static,
) -> Component {
    Component::emitting(move |ctx| f(ctx).map_err(|e| e.at(&pos)))
}

fn values(components: &[Component], ctx: &Context<'_>) -> Result<Vec<Value>, RuntimeError> {
    components.iter().map(|c| c.value(ctx)).collect()
}

fn condition(cond: &Component, scope: &Context<'_>) -> Result<bool, RuntimeError> {
    ops::truthy(&cond.value(scope)?)
}

fn required(value: &Component, ctx: &Context<'_>, what: &str) -> Result<String, RuntimeError> {
    value
        .value(ctx)?
        .to_text()
        .ok_or_else(|| RuntimeError::internal(format!("missing {what}")))
}

fn optional(value: Option<&Component>, ctx: &Context<'_>) -> Result<Option<String>, RuntimeError> {
    match value {
        Some(value) => Ok(value.value(ctx)?.to_text()),
        None => Ok(None),
    }
}

/// Evaluate property values, dropping the `Null` ones.
fn prop_values<P: Copy>(
    props: &[(P, Component)],
    ctx: &Context<'_>,
) -> Result<Vec<(P, String)>, RuntimeError> {
    let mut out = Vec::with_capacity(props.len());
    for (prop, value) in props {
        if let Some(text) = value.value(ctx)?.to_text() {
            out.push((*prop, text));
        }
    }
    Ok(out)
}

fn embed_text(pos: SourcePos, value: Component, set: fn(&mut Embed, String)) -> Component {
    emitting_at(pos, move |ctx| {
        if let Some(text) = value.value(ctx)?.to_text() {
            set(ctx.message().borrow_mut().embed(), text);
        }
        Ok(())
    })
}

fn to_timestamp(value: Value) -> Result<Option<DateTime<Utc>>, RuntimeError> {
    match value {
        Value::Null => Ok(None),
        Value::DateTime(t) => Ok(Some(t)),
        Value::Str(s) => match DateTime::parse_from_rfc3339(&s) {
            Ok(t) => Ok(Some(t.with_timezone(&Utc))),
            Err(e) => Err(RuntimeError::internal(format!("invalid timestamp '{s}': {e}"))),
        },
        other => Err(coercion_error(&other, "datetime")),
    }
}

enum CompiledFieldPart {
    Flow { title: Component, text: Component, inline: bool, pos: SourcePos },
    Object { props: Vec<CompiledFieldProp>, pos: SourcePos },
}

enum CompiledFieldProp {
    Title(Component),
    Text(Component),
    Inline(bool),
}

enum FieldEdit {
    Title(String),
    Text(String),
    Inline(bool),
}

fn field_edits(
    props: &[CompiledFieldProp],
    ctx: &Context<'_>,
) -> Result<Vec<FieldEdit>, RuntimeError> {
    let mut edits = Vec::with_capacity(props.len());
    for prop in props {
        let edit = match prop {
            CompiledFieldProp::Title(value) => value.value(ctx)?.to_text().map(FieldEdit::Title),
            CompiledFieldProp::Text(value) => value.value(ctx)?.to_text().map(FieldEdit::Text),
            CompiledFieldProp::Inline(inline) => Some(FieldEdit::Inline(*inline)),
        };
        edits.extend(edit);
    }
    Ok(edits)
}

fn apply_field_edits(field: &mut Field, edits: Vec<FieldEdit>) {
    for edit in edits {
        match edit {
            FieldEdit::Title(title) => field.title = title,
            FieldEdit::Text(text) => field.text = text,
            FieldEdit::Inline(inline) => field.inline = inline,
        }
    }
}

// ── Literals ──────────────────────────────────────────────────────────────────

/// Strip one pair of surrounding quotes.
fn unquote(raw: &str) -> &str {
    let mut chars = raw.chars();
    chars.next();
    chars.next_back();
    chars.as_str()
}

/// Hex-looking literal: the marker (`#` or `x`) must sit at index 0 or 1 and
/// the rest is read as a base-10 `i32`, so `#10` is ten and `#1A` is invalid.
fn parse_hex(raw: &str) -> Option<i64> {
    let marker = raw.find(|c| c == '#' || c == 'x')?;
    if marker > 1 {
        return None;
    }
    raw[marker + 1..].parse::<i32>().ok().map(i64::from)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageDocument;
    use crate::template::parser::parse_template;
    use crate::var::VarStore;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn compile(src: &str) -> Result<(Component, Context<'static>), CompileError> {
        let tree = parse_template(src, "test".into()).unwrap_or_else(|e| panic!("{e}"));
        let root = Context::root(VarStore::new(), Rc::new(fixed_time));
        let component = Compiler::new(&root, "test".into()).compile(&tree)?;
        Ok((component, root))
    }

    fn try_run(src: &str) -> Result<Context<'static>, RuntimeError> {
        let (component, root) = compile(src).unwrap_or_else(|e| panic!("{e}"));
        component.value(&root)?;
        Ok(root)
    }

    fn run(src: &str) -> Context<'static> {
        try_run(src).unwrap_or_else(|e| panic!("{e}"))
    }

    fn doc(src: &str) -> MessageDocument {
        run(src).message().borrow().clone()
    }

    fn read(src: &str, name: &str) -> Value {
        run(src).read(name).unwrap()
    }

    #[test]
    fn unquote_strips_once() {
        assert_eq!(unquote("\"abc\""), "abc");
        assert_eq!(unquote("'\"x\"'"), "\"x\"");
        assert_eq!(unquote("\"\""), "");
    }

    #[test]
    fn hex_quirk() {
        assert_eq!(parse_hex("#10"), Some(10));
        assert_eq!(parse_hex("0x10"), Some(10));
        assert_eq!(parse_hex("#1A"), None);
        assert_eq!(parse_hex("00x1"), None);
        assert_eq!(parse_hex("#99999999999"), None);
    }

    #[test]
    fn hex_literal_errors_are_compile_errors() {
        let err = compile("a = #ff;").unwrap_err();
        assert_eq!(err.message, "invalid hex number: #ff");
        assert_eq!((err.pos.line, err.pos.column), (1, 4));
    }

    #[test]
    fn literals() {
        assert_eq!(read("a = \"s\";", "a"), Value::from("s"));
        assert_eq!(read("a = 2.5;", "a"), Value::Number(2.5));
        assert_eq!(read("a = false;", "a"), Value::Bool(false));
        assert_eq!(read("a = #26;", "a"), Value::Int(26));
        assert_eq!(read("a = [1, \"x\"];", "a"), Value::List(vec![1.0.into(), "x".into()]));
    }

    #[test]
    fn const_is_evaluated_at_compile_time() {
        let (component, root) = compile("const A = 2 * 3; const B = A + 1;").unwrap();
        assert!(matches!(component, Component::Document(ref items) if items.len() == 2));
        assert_eq!(root.constants().get("B"), Some(&Value::Number(7.0)));
    }

    #[test]
    fn failing_const_is_a_compile_error() {
        let err = compile("const A = missing;").unwrap_err();
        assert_eq!(err.message, "variable 'missing' is undefined");
        assert_eq!(err.pos.line, 1);
    }

    #[test]
    fn cannot_rebind_now() {
        let err = compile("function now() { return 1; }").unwrap_err();
        assert_eq!(err.message, "cannot rebind system function 'now'");
        assert_eq!(err.pos.column, 9);
    }

    #[test]
    fn block_shares_scope() {
        assert_eq!(read("a = 1; { a = 2; }", "a"), Value::Number(2.0));
        assert_eq!(read("{ b = 1; }", "b"), Value::Number(1.0));
    }

    #[test]
    fn loop_scope_is_private() {
        let root = run("if (true) { inner = 1; }");
        assert!(root.read("inner").is_err());
    }

    #[test]
    fn foreach_sums() {
        assert_eq!(read("s = 0; foreach (x in [1, 2, 3]) s = s + x;", "s"), Value::Number(6.0));
    }

    #[test]
    fn foreach_rejects_non_lists() {
        let err = try_run("foreach (x in 3) {}").err().unwrap();
        assert_eq!(err.message, "value of type number is not enumerable");
        let err = try_run("foreach (c in \"abc\") {}").err().unwrap();
        assert_eq!(err.message, "value of type string is not enumerable");
    }

    #[test]
    fn foreach_null_target() {
        let tree = parse_template("foreach (x in n) {}", "test".into()).unwrap();
        let mut constants = VarStore::new();
        constants.set("n", Value::Null);
        let root = Context::root(constants, Rc::new(fixed_time));
        let component = Compiler::new(&root, "test".into()).compile(&tree).unwrap();
        let err = component.value(&root).unwrap_err();
        assert_eq!(err.message, "foreach target is null");
    }

    #[test]
    fn for_loop() {
        assert_eq!(
            read("s = \"\"; for (i = 0; i < 3; i = i + 1) s = s + i;", "s"),
            Value::from("012")
        );
    }

    #[test]
    fn for_without_check_skips_body() {
        assert_eq!(read("n = 0; for (;;) n = n + 1;", "n"), Value::Number(0.0));
    }

    #[test]
    fn while_and_do_while() {
        assert_eq!(read("n = 0; while (n < 5) n = n + 1;", "n"), Value::Number(5.0));
        assert_eq!(read("n = 10; do n = n + 1; while (n < 5);", "n"), Value::Number(11.0));
    }

    #[test]
    fn non_bool_condition_fails_with_position() {
        let err = try_run("\nif (1) {}").err().unwrap();
        assert_eq!(err.message, "cannot coerce number to bool");
        assert_eq!(err.pos.line, 2);
    }

    #[test]
    fn null_condition_is_false() {
        let tree = parse_template("r = 1; if (n) r = 2; else r = 3;", "t".into()).unwrap();
        let mut constants = VarStore::new();
        constants.set("n", Value::Null);
        let root = Context::root(constants, Rc::new(fixed_time));
        Compiler::new(&root, "t".into()).compile(&tree).unwrap().value(&root).unwrap();
        assert_eq!(root.read("r").unwrap(), Value::Number(3.0));
    }

    #[test]
    fn return_does_not_stop_execution() {
        let src = "function f(x) { return x; return x * 2; } r = f(3);";
        assert_eq!(read(src, "r"), Value::Number(6.0));
    }

    #[test]
    fn nested_return_reaches_the_caller() {
        let src = "function f(x) { if (x > 1) { return \"big\"; } } r = f(5);";
        assert_eq!(read(src, "r"), Value::from("big"));
    }

    #[test]
    fn functions_are_dynamically_scoped() {
        let src = "function g() { return seen; } function f() { seen = \"f\"; return g(); } r = f();";
        assert_eq!(read(src, "r"), Value::from("f"));
    }

    #[test]
    fn parameters_do_not_leak() {
        let root = run("x = 1; function f(x) { return x; } r = f(9);");
        assert_eq!(root.read("x").unwrap(), Value::Number(1.0));
        assert_eq!(root.read("r").unwrap(), Value::Number(9.0));
    }

    #[test]
    fn logical_operators_evaluate_both_sides() {
        let root = run("function mark() { hit = true; return true; } hit = false; r = false && mark();");
        assert_eq!(root.read("hit").unwrap(), Value::Bool(true));
        assert_eq!(root.read("r").unwrap(), Value::Bool(false));
    }

    #[test]
    fn undefined_function() {
        let err = try_run("text\n  f();").err().unwrap();
        assert_eq!(err.message, "function 'f' is undefined");
        assert_eq!((err.pos.line, err.pos.column), (2, 2));
    }

    #[test]
    fn now_uses_the_clock() {
        assert_eq!(read("t = now();", "t"), Value::DateTime(fixed_time()));
    }

    #[test]
    fn text_and_attachments() {
        let d = doc("text \"a\" + 1; attachment \"u1\"; attachment \"u2\";");
        assert_eq!(d.content.as_deref(), Some("a1"));
        assert_eq!(d.attachments.len(), 2);
        assert_eq!(d.attachments[1].url, "u2");
    }

    #[test]
    fn embed_scalars() {
        let d = doc(
            "embed { title = \"T\"; description = \"D\"; url = \"U\"; color = #255; \
             timestamp = \"2024-05-01T10:00:00Z\"; image = \"I\"; }",
        );
        let e = &d.embeds[0];
        assert_eq!(e.title.as_deref(), Some("T"));
        assert_eq!(e.description.as_deref(), Some("D"));
        assert_eq!(e.url.as_deref(), Some("U"));
        assert_eq!(e.color, Some(255));
        assert_eq!(e.timestamp, Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()));
        assert_eq!(e.peek_image().map(|i| i.url.as_str()), Some("I"));
    }

    #[test]
    fn timestamp_from_now() {
        let d = doc("embed.timestamp = now();");
        assert_eq!(d.embeds[0].timestamp, Some(fixed_time()));
    }

    #[test]
    fn bad_timestamp() {
        let err = try_run("embed.timestamp = 5;").err().unwrap();
        assert_eq!(err.message, "cannot coerce number to datetime");
    }

    #[test]
    fn author_flow_requires_name() {
        let err = try_run("embed.author = a;").err();
        assert_eq!(err.unwrap().message, "variable 'a' is undefined");
        let tree = parse_template("embed.author = n, \"u\";", "t".into()).unwrap();
        let mut constants = VarStore::new();
        constants.set("n", Value::Null);
        let root = Context::root(constants, Rc::new(fixed_time));
        let err = Compiler::new(&root, "t".into())
            .compile(&tree)
            .unwrap()
            .value(&root)
            .unwrap_err();
        assert_eq!(err.message, "missing embed.author.name");
    }

    #[test]
    fn author_replace_and_append() {
        let d = doc("embed.author = \"X\", \"u\"; embed.author.icon += \"i\";");
        let a = d.embeds[0].peek_author().unwrap();
        assert_eq!((a.name.as_str(), a.url.as_deref(), a.icon_url.as_deref()), ("X", Some("u"), Some("i")));

        let d = doc("embed.author = \"X\", \"u\"; embed.author.icon = \"i\";");
        let a = d.embeds[0].peek_author().unwrap();
        assert_eq!((a.name.as_str(), a.url.as_deref(), a.icon_url.as_deref()), ("", None, Some("i")));
    }

    #[test]
    fn author_object_form() {
        let d = doc("embed.author += { name: \"n\", url: \"u\" }; embed.author += { icon: \"i\" };");
        let a = d.embeds[0].peek_author().unwrap();
        assert_eq!(a.name, "n");
        assert_eq!(a.url.as_deref(), Some("u"));
        assert_eq!(a.icon_url.as_deref(), Some("i"));
    }

    #[test]
    fn footer_forms() {
        let d = doc("embed.footer = \"t\", \"i\";");
        let f = d.embeds[0].peek_footer().unwrap();
        assert_eq!((f.text.as_str(), f.icon_url.as_deref()), ("t", Some("i")));
        let d = doc("embed.footer = { text: \"t\" }; embed.footer.icon += \"i\";");
        let f = d.embeds[0].peek_footer().unwrap();
        assert_eq!((f.text.as_str(), f.icon_url.as_deref()), ("t", Some("i")));
    }

    #[test]
    fn field_forms() {
        let d = doc(
            "embed.fields = [(\"a\", \"1\"), { title: \"b\", text: \"2\", inline: true }]; \
             embed.field += \"c\", \"3\", inline; embed.field.text += \"4\";",
        );
        let fields: Vec<_> = d.embeds[0]
            .fields
            .iter()
            .map(|f| (f.title.as_str(), f.text.as_str(), f.inline))
            .collect();
        assert_eq!(fields, vec![("a", "1", false), ("b", "2", true), ("c", "4", true)]);
    }

    #[test]
    fn field_replace_clears() {
        let d = doc("embed.field = \"a\", \"1\"; embed.field = \"b\", \"2\";");
        assert_eq!(d.embeds[0].fields.len(), 1);
        assert_eq!(d.embeds[0].fields[0].title, "b");
    }

    #[test]
    fn field_property_on_empty_list_creates_field() {
        let d = doc("embed.field.inline += true;");
        assert_eq!(d.embeds[0].fields.len(), 1);
        assert!(d.embeds[0].fields[0].inline);
    }

    #[test]
    fn null_writes_are_ignored() {
        let tree = parse_template("text n; attachment n; embed.title = n;", "t".into()).unwrap();
        let mut constants = VarStore::new();
        constants.set("n", Value::Null);
        let root = Context::root(constants, Rc::new(fixed_time));
        Compiler::new(&root, "t".into()).compile(&tree).unwrap().value(&root).unwrap();
        let d = root.message().borrow().clone();
        assert_eq!(d.content, None);
        assert!(d.attachments.is_empty());
        assert!(d.embeds.is_empty());
    }

    #[test]
    fn function_can_write_the_document() {
        let d = doc("function greet(n) { text \"hi \" + n; } greet(\"bob\");");
        assert_eq!(d.content.as_deref(), Some("hi bob"));
    }
}
