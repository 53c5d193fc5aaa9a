//! dmt: compile message templates into chat-API message documents.
//!
//! ```
//! let doc = dmt::render(r#"text "hi " + 1 + 1;"#).unwrap();
//! assert_eq!(doc.content.as_deref(), Some("hi 11"));
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod message;
pub mod template;
pub mod var;

use std::rc::Rc;

use tracing::{debug, trace};

pub use error::{Error, Result};
pub use message::{MessageDocument, NullPolicy};
pub use var::VarStore;

use template::{parse_template, system_clock, Clock, Compiler, Component, Context};

/// A parsed and compiled template, ready to render any number of times.
#[derive(Debug)]
pub struct Template {
    name: Rc<str>,
    component: Component,
    constants: VarStore,
}

impl Template {
    /// Parse and compile `source`.
    ///
    /// `constants` seeds the root scope (typically a context file); the
    /// template's own `const` declarations are evaluated here and kept for
    /// every later render.
    pub fn compile(source: &str, name: &str, constants: VarStore) -> Result<Self> {
        let name: Rc<str> = Rc::from(name);
        let syntax = parse_template(source, name.clone())?;
        trace!(template = %name, items = syntax.items.len(), "parsed");

        let root = Context::root(constants, system_clock());
        let component = Compiler::new(&root, name.clone()).compile(&syntax)?;
        let constants = root.constants();
        debug!(template = %name, constants = constants.len(), "compiled");

        Ok(Self { name, component, constants })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Constants visible to every render.
    pub fn constants(&self) -> &VarStore {
        &self.constants
    }

    /// Render with the system clock.
    pub fn render(&self) -> Result<MessageDocument> {
        self.render_with_clock(system_clock())
    }

    /// Render against a fresh root scope whose `now()` reads `clock`.
    pub fn render_with_clock(&self, clock: Clock) -> Result<MessageDocument> {
        let root = Context::root(self.constants.clone(), clock);
        self.component.value(&root)?;
        let doc = root.message().borrow().clone();
        debug!(template = %self.name, embeds = doc.embeds.len(), "rendered");
        Ok(doc)
    }
}

/// Compile and render `source` once, without a context.
pub fn render(source: &str) -> Result<MessageDocument> {
    Template::compile(source, "<input>", VarStore::new())?.render()
}
