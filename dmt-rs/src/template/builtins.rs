//! System functions available in every template.
//!
//! | Name    | Args | Result                               |
//! |---------|------|--------------------------------------|
//! | `now()` | 0    | current UTC date-time from the clock |

use std::collections::HashMap;
use std::rc::Rc;

use super::component::{Component, FunctionComponent};
use super::value::Value;
use crate::error::SourcePos;

/// Build the fixed system-function table.
pub fn system_functions() -> HashMap<String, Rc<FunctionComponent>> {
    [now()].into_iter().map(|f| (f.name.clone(), Rc::new(f))).collect()
}

fn now() -> FunctionComponent {
    FunctionComponent {
        name: "now".into(),
        params: Vec::new(),
        body: Component::computed_with_args(|ctx, _args| {
            let now = Value::DateTime(ctx.now());
            ctx.set_return_value(now.clone());
            Ok(now)
        }),
        pos: SourcePos::internal(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
