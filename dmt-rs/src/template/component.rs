//! Compiled component tree.
//!
//! The compiler turns each syntax node into one [`Component`]; statements and
//! expressions alike become closures over their already-compiled children.
//! Evaluating the root [`Component::Document`] against a fresh root
//! [`Context`] runs the template.

use std::fmt;
use std::rc::Rc;

use super::context::Context;
use super::value::Value;
use crate::error::{RuntimeError, SourcePos};

pub type ComputedFn = dyn Fn(&Context<'_>) -> Result<Value, RuntimeError>;
pub type ComputedWithArgsFn = dyn Fn(&Context<'_>, &[Value]) -> Result<Value, RuntimeError>;
pub type EmittingFn = dyn Fn(&Context<'_>) -> Result<(), RuntimeError>;

#[derive(Clone)]
pub enum Component {
    /// A literal, independent of any context.
    Constant(Value),
    /// Value computed from the context (variable read, operator, call).
    Computed(Rc<ComputedFn>),
    /// Value computed from the context and call arguments (builtin bodies).
    ComputedWithArgs(Rc<ComputedWithArgsFn>),
    /// A statement run for its effect on the context or the document.
    Emitting(Rc<EmittingFn>),
    /// A user-defined or system function.
    Function(Rc<FunctionComponent>),
    /// Children evaluated in order, in the same scope.
    Document(Vec<Component>),
    NoOp,
}

impl Component {
    pub fn computed(f: impl Fn(&Context<'_>) -> Result<Value, RuntimeError> + 'static) -> Self {
        Component::Computed(Rc::new(f))
    }

    pub fn computed_with_args(
        f: impl Fn(&Context<'_>, &[Value]) -> Result<Value, RuntimeError> + 'static,
    ) -> Self {
        Component::ComputedWithArgs(Rc::new(f))
    }

    pub fn emitting(f: impl Fn(&Context<'_>) -> Result<(), RuntimeError> + 'static) -> Self {
        Component::Emitting(Rc::new(f))
    }

    /// Evaluate against `ctx`.  Statements yield `Null`.
    pub fn evaluate(&self, ctx: &Context<'_>, args: &[Value]) -> Result<Value, RuntimeError> {
        match self {
            Component::Constant(value) => Ok(value.clone()),
            Component::Computed(f) => f(ctx),
            Component::ComputedWithArgs(f) => f(ctx, args),
            Component::Emitting(f) => f(ctx).map(|()| Value::Null),
            Component::Function(func) => func.call(ctx, args),
            Component::Document(children) => {
                for child in children {
                    child.evaluate(ctx, &[])?;
                }
                Ok(Value::Null)
            }
            Component::NoOp => Ok(Value::Null),
        }
    }

    /// Shorthand for expression evaluation.
    pub fn value(&self, ctx: &Context<'_>) -> Result<Value, RuntimeError> {
        self.evaluate(ctx, &[])
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Component::Computed(_) => f.write_str("Computed"),
            Component::ComputedWithArgs(_) => f.write_str("ComputedWithArgs"),
            Component::Emitting(_) => f.write_str("Emitting"),
            Component::Function(func) => f.debug_tuple("Function").field(&func.name).finish(),
            Component::Document(children) => f.debug_tuple("Document").field(children).finish(),
            Component::NoOp => f.write_str("NoOp"),
        }
    }
}

// ── Functions ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct FunctionComponent {
    pub name: String,
    pub params: Vec<String>,
    pub body: Component,
    pub pos: SourcePos,
}

impl FunctionComponent {
    /// Invoke with already-evaluated arguments.
    ///
    /// The body runs to completion in a fresh call scope under `caller`; the
    /// result is whatever the call scope's return slot holds afterwards.
    /// Surplus arguments are ignored.
    pub fn call(&self, caller: &Context<'_>, args: &[Value]) -> Result<Value, RuntimeError> {
        if args.len() < self.params.len() {
            return Err(RuntimeError::internal(format!(
                "not enough arguments; expected {}, got {}",
                self.params.len(),
                args.len()
            )));
        }
        let scope = caller.call_scope();
        for (param, arg) in self.params.iter().zip(args) {
            scope.set_variable(param, arg.clone(), true);
        }
        self.body.evaluate(&scope, args)?;
        Ok(scope.return_value())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
