//! The template language: parse, compile to components, evaluate.
//!
//! ```text
//! source ──parser──▶ syntax::Template ──Compiler──▶ Component ──evaluate(Context)──▶ MessageDocument
//! ```

pub mod builtins;
pub mod compile;
pub mod component;
pub mod context;
pub mod lexer;
pub mod ops;
pub mod parser;
pub mod syntax;
pub mod value;

pub use compile::Compiler;
pub use component::{Component, FunctionComponent};
pub use context::{system_clock, Clock, Context};
pub use parser::parse_template;
pub use value::Value;
