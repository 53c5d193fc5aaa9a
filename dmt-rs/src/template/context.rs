//! Evaluation context: the scope chain.
//!
//! Every scope borrows its parent, so a child can never outlive the scope
//! that created it.  All scopes of one run share the same message document
//! and the same root-level globals (constants, system functions, clock).
//!
//! Lookup walks own map → parent → … → root, then falls back to the globals.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use chrono::{DateTime, Utc};

use super::builtins;
use super::component::FunctionComponent;
use super::value::Value;
use crate::error::RuntimeError;
use crate::message::MessageDocument;
use crate::var::VarStore;

/// Source of the current time for `now()`.
pub type Clock = Rc<dyn Fn() -> DateTime<Utc>>;

/// The wall clock.
pub fn system_clock() -> Clock {
    Rc::new(Utc::now)
}

/// Why a scope was created.  Call scopes (and the root) own the return slot
/// that `return` statements write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Root,
    Block,
    Call,
}

/// Root-level state shared by every scope of one run.
struct Globals {
    constants: RefCell<VarStore>,
    system_functions: HashMap<String, Rc<FunctionComponent>>,
    clock: Clock,
}

pub struct Context<'p> {
    parent: Option<&'p Context<'p>>,
    kind: ScopeKind,
    variables: RefCell<VarStore>,
    functions: RefCell<HashMap<String, Rc<FunctionComponent>>>,
    return_value: RefCell<Value>,
    message: Rc<RefCell<MessageDocument>>,
    globals: Rc<Globals>,
}

impl std::fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").field("kind", &self.kind).finish_non_exhaustive()
    }
}

impl Context<'static> {
    /// A fresh root scope with its own empty message document.
    pub fn root(constants: VarStore, clock: Clock) -> Self {
        Context {
            parent: None,
            kind: ScopeKind::Root,
            variables: RefCell::default(),
            functions: RefCell::default(),
            return_value: RefCell::default(),
            message: Rc::default(),
            globals: Rc::new(Globals {
                constants: RefCell::new(constants),
                system_functions: builtins::system_functions(),
                clock,
            }),
        }
    }
}

impl<'p> Context<'p> {
    fn scope(&self, kind: ScopeKind) -> Context<'_> {
        Context {
            parent: Some(self),
            kind,
            variables: RefCell::default(),
            functions: RefCell::default(),
            return_value: RefCell::default(),
            message: Rc::clone(&self.message),
            globals: Rc::clone(&self.globals),
        }
    }

    /// Child scope for a block, loop or conditional.
    pub fn child(&self) -> Context<'_> {
        self.scope(ScopeKind::Block)
    }

    /// Child scope for a function call.  Calls nest under the caller, not
    /// under the function's definition site.
    pub fn call_scope(&self) -> Context<'_> {
        self.scope(ScopeKind::Call)
    }

    /// Ancestors starting at `self`.
    fn chain(&self) -> Scopes<'_> {
        Scopes { next: Some(self) }
    }

    // ── Variables ─────────────────────────────────────────────────────────────

    pub fn read(&self, name: &str) -> Result<Value, RuntimeError> {
        for scope in self.chain() {
            if let Some(value) = scope.variables.borrow().get(name) {
                return Ok(value.clone());
            }
        }
        self.globals
            .constants
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::internal(format!("variable '{name}' is undefined")))
    }

    /// Assign `name`.
    ///
    /// `local` writes into this scope unconditionally (parameter binding).
    /// Otherwise the search starts at the parent: the nearest ancestor that
    /// already holds `name` is updated, and only when none does is the
    /// binding written here.  A name bound both here and further out is
    /// therefore assigned in the outer scope.
    pub fn set_variable(&self, name: &str, value: Value, local: bool) {
        let target = if local {
            self
        } else {
            self.parent
                .and_then(|parent| {
                    parent.chain().find(|scope| scope.variables.borrow().contains(name))
                })
                .unwrap_or(self)
        };
        target.variables.borrow_mut().set(name, value);
    }

    // ── Constants ─────────────────────────────────────────────────────────────

    pub fn set_constant(&self, name: &str, value: Value) {
        self.globals.constants.borrow_mut().set(name, value);
    }

    /// Copy of the constants table as it stands now.
    pub fn constants(&self) -> VarStore {
        self.globals.constants.borrow().clone()
    }

    // ── Functions ─────────────────────────────────────────────────────────────

    pub fn function(&self, name: &str) -> Result<Rc<FunctionComponent>, RuntimeError> {
        for scope in self.chain() {
            if let Some(func) = scope.functions.borrow().get(name) {
                return Ok(Rc::clone(func));
            }
        }
        self.globals
            .system_functions
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::internal(format!("function '{name}' is undefined")))
    }

    /// Declare a function in this scope.
    pub fn set_function(&self, func: Rc<FunctionComponent>) {
        self.functions.borrow_mut().insert(func.name.clone(), func);
    }

    pub fn is_system_function(&self, name: &str) -> bool {
        self.globals.system_functions.contains_key(name)
    }

    // ── Return slot ───────────────────────────────────────────────────────────

    /// Write the return slot of the nearest enclosing call scope (or the root).
    pub fn set_return_value(&self, value: Value) {
        let owner = self
            .chain()
            .find(|scope| scope.kind != ScopeKind::Block)
            .unwrap_or(self);
        *owner.return_value.borrow_mut() = value;
    }

    /// This scope's own return slot.
    pub fn return_value(&self) -> Value {
        self.return_value.borrow().clone()
    }

    // ── Shared state ──────────────────────────────────────────────────────────

    pub fn message(&self) -> &Rc<RefCell<MessageDocument>> {
        &self.message
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.globals.clock)()
    }
}

/// Walks a scope chain from the innermost scope outward.
struct Scopes<'a> {
    next: Option<&'a Context<'a>>,
}

impl<'a> Iterator for Scopes<'a> {
    type Item = &'a Context<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let scope = self.next?;
        self.next = scope.parent;
        Some(scope)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
