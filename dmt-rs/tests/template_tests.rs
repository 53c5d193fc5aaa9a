//! End-to-end tests through the `Template` facade.

use std::rc::Rc;

use chrono::{DateTime, TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;

use dmt::template::Value;
use dmt::{Error, MessageDocument, NullPolicy, Template, VarStore};

fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap()
}

fn render(src: &str) -> MessageDocument {
    render_with(src, VarStore::new())
}

fn render_with(src: &str, constants: VarStore) -> MessageDocument {
    let template = Template::compile(src, "test.dmt", constants).unwrap_or_else(|e| panic!("{e}"));
    template.render_with_clock(Rc::new(fixed_time)).unwrap_or_else(|e| panic!("{e}"))
}

fn render_err(src: &str) -> Error {
    match Template::compile(src, "test.dmt", VarStore::new()) {
        Ok(template) => template.render().unwrap_err(),
        Err(e) => e,
    }
}

fn content(src: &str) -> Option<String> {
    render(src).content
}

fn json_of(doc: &MessageDocument) -> serde_json::Value {
    serde_json::from_str(&doc.to_json(NullPolicy::Omit, false).unwrap()).unwrap()
}

// ── Literals ──────────────────────────────────────────────────────────────────

#[test]
fn literals_are_pure() {
    let mut a = VarStore::new();
    a.set("x", 1.0);
    let mut b = VarStore::new();
    b.set("y", "unrelated");
    for lit in ["2.5", "\"str\"", "true", "#42"] {
        let src = format!("text {lit};");
        assert_eq!(render_with(&src, a.clone()).content, render_with(&src, b.clone()).content);
    }
}

#[test]
fn hex_remainder_is_read_as_decimal() {
    assert_eq!(content("text #10;").as_deref(), Some("10"));
    assert_eq!(content("text 0x10;").as_deref(), Some("10"));
    let Error::Compile(err) = render_err("text #1A;") else {
        panic!("expected a compile error");
    };
    assert_eq!(err.message, "invalid hex number: #1A");
    assert_eq!((err.pos.line, err.pos.column), (1, 5));
}

// ── Scoping ───────────────────────────────────────────────────────────────────

#[test]
fn assignment_is_visible_in_nested_scopes() {
    let src = "if (true) { x = \"v\"; if (true) { text x; } }";
    assert_eq!(content(src).as_deref(), Some("v"));
}

#[test]
fn assignment_is_invisible_to_sibling_scopes() {
    let Error::Runtime(err) = render_err("if (true) { x = 1; } if (true) { text x; }") else {
        panic!("expected a runtime error");
    };
    assert_eq!(err.message, "variable 'x' is undefined");
}

#[test]
fn assignment_mutates_the_outer_binding() {
    assert_eq!(content("a = 1; { a = 2; } text a;").as_deref(), Some("2"));
    assert_eq!(content("a = 1; if (true) { a = 2; } text a;").as_deref(), Some("2"));
}

#[test]
fn parameter_binding_leaves_outer_name_alone() {
    let src = "a = \"outer\"; function f(a) { return a; } text f(\"inner\") + a;";
    assert_eq!(content(src).as_deref(), Some("innerouter"));
}

#[test]
fn assigning_a_shadowing_parameter_updates_the_caller() {
    let src = "x = 1; function f(x) { x = 5; return x; } r = f(9); text \"\" + r + x;";
    assert_eq!(content(src).as_deref(), Some("95"));
}

#[test]
fn callees_see_caller_bindings() {
    let src = "function show() { return who; } function run() { who = \"caller\"; return show(); } text run();";
    assert_eq!(content(src).as_deref(), Some("caller"));
}

// ── Control flow ──────────────────────────────────────────────────────────────

#[test]
fn foreach_rebinds_the_loop_variable() {
    let src = "sum = 0; foreach (x in [1, 2, 3]) { sum = sum + x; } text \"\" + sum;";
    assert_eq!(content(src).as_deref(), Some("6"));
}

#[test]
fn loop_variable_stays_in_the_loop_scope() {
    let Error::Runtime(err) = render_err("foreach (x in [1]) { } text x;") else {
        panic!("expected a runtime error");
    };
    assert_eq!(err.message, "variable 'x' is undefined");
}

#[test]
fn foreach_over_context_list() {
    let mut constants = VarStore::new();
    constants.set("names", Value::List(vec!["a".into(), "b".into()]));
    let doc = render_with("s = \"\"; foreach (n in names) s = s + n + \";\"; text s;", constants);
    assert_eq!(doc.content.as_deref(), Some("a;b;"));
}

#[test]
fn loop_scope_persists_across_iterations() {
    let src = "r = \"\"; for (i = 0; i < 3; i = i + 1) { if (i > 0) { r = r + prev; } prev = i; } text r;";
    assert_eq!(content(src).as_deref(), Some("01"));
}

// ── Operators ─────────────────────────────────────────────────────────────────

#[test]
fn concatenation_only_from_a_string_left_operand() {
    assert_eq!(content("text \"a\" + 1;").as_deref(), Some("a1"));
    let Error::Runtime(err) = render_err("text 1 + \"a\";") else {
        panic!("expected a runtime error");
    };
    assert_eq!(err.message, "cannot coerce string to number");
    assert_eq!(err.pos.line, 1);
}

#[test]
fn logical_operators_do_not_short_circuit() {
    let src = "calls = 0; function bump() { calls = calls + 1; return true; } \
               r = false && bump(); r = true || bump(); text \"\" + calls;";
    assert_eq!(content(src).as_deref(), Some("2"));
}

#[test]
fn return_does_not_stop_the_body() {
    let src = "function f(x) { return x; return x * 2; } text \"\" + f(3);";
    assert_eq!(content(src).as_deref(), Some("6"));
}

// ── Embeds ────────────────────────────────────────────────────────────────────

// Property statements edit the last field no matter which form created it,
// so a `+=` property right after a flow field lands on that field.
#[test]
fn flow_field_then_appended_property_targets_it() {
    let doc = render("embed.field += \"t\", \"v\"; embed.field.inline += true;");
    let fields = &doc.embeds[0].fields;
    assert_eq!(fields.len(), 1);
    assert_eq!((fields[0].title.as_str(), fields[0].text.as_str(), fields[0].inline), ("t", "v", true));
}

#[test]
fn appended_property_targets_the_latest_flow_field() {
    let doc = render("embed.field += \"a\", \"1\"; embed.field += \"b\", \"2\"; embed.field.inline += true;");
    let fields = &doc.embeds[0].fields;
    assert_eq!(fields.len(), 2);
    assert!(!fields[0].inline);
    assert_eq!((fields[1].title.as_str(), fields[1].inline), ("b", true));
}

#[test]
fn flow_field_then_replacing_property_starts_over() {
    let doc = render("embed.field = \"t\", \"v\"; embed.field.inline = true;");
    let fields = &doc.embeds[0].fields;
    assert_eq!(fields.len(), 1);
    assert_eq!((fields[0].title.as_str(), fields[0].text.as_str(), fields[0].inline), ("", "", true));
}

#[test]
fn object_field_then_property_edits_the_last_field() {
    let doc = render("embed.fields = [(\"a\", \"1\")]; embed.field += { title: \"b\" }; embed.field.text += \"2\";");
    let fields: Vec<_> = doc.embeds[0].fields.iter().map(|f| (f.title.as_str(), f.text.as_str())).collect();
    assert_eq!(fields, vec![("a", "1"), ("b", "2")]);
}

#[test]
fn author_append_versus_replace() {
    let doc = render("embed.author = { name: \"X\" }; embed.author.url += \"Y\";");
    assert_eq!(json_of(&doc)["embeds"][0]["author"], json!({"name": "X", "url": "Y"}));

    let doc = render("embed.author = { name: \"X\" }; embed.author.url = \"Y\";");
    assert_eq!(json_of(&doc)["embeds"][0]["author"], json!({"name": "", "url": "Y"}));
}

#[test]
fn missing_flow_values_are_reported() {
    let mut constants = VarStore::new();
    constants.set("nothing", Value::Null);
    let template = Template::compile("\n\nembed.footer = nothing;", "f.dmt", constants).unwrap();
    let Error::Runtime(err) = template.render().unwrap_err() else {
        panic!("expected a runtime error");
    };
    assert_eq!(err.message, "missing embed.footer.text");
    assert_eq!(err.pos.line, 3);
    assert_eq!(err.to_string(), "missing embed.footer.text @ file f.dmt in line 3:6");
}

#[test]
fn full_document() {
    let src = r#"
        const BRAND = "dmt";
        function badge(n) { return "[" + n + "]"; }

        text "Release " + badge(version);
        attachment "https://example.com/notes.txt";
        embed {
            title = BRAND + " " + version;
            description = "Changes";
            color = #3447003;
            timestamp = now();
            author = BRAND, "https://example.com";
            footer = { text: "built" };
            fields = [("Added", "templates", inline), { title: "Fixed", text: "bugs" }];
        }
    "#;
    let mut constants = VarStore::new();
    constants.set("version", "1.2");
    let doc = render_with(src, constants);
    assert_eq!(
        json_of(&doc),
        json!({
            "content": "Release [1.2]",
            "attachments": [{"url": "https://example.com/notes.txt"}],
            "embeds": [{
                "title": "dmt 1.2",
                "type": "rich",
                "description": "Changes",
                "timestamp": "2024-06-01T12:30:00Z",
                "color": 3447003,
                "author": {"name": "dmt", "url": "https://example.com"},
                "footer": {"text": "built"},
                "fields": [
                    {"name": "Added", "value": "templates", "inline": true},
                    {"name": "Fixed", "value": "bugs", "inline": false}
                ]
            }]
        })
    );
}

// ── Facade ────────────────────────────────────────────────────────────────────

#[test]
fn renders_are_deterministic() {
    let template = Template::compile("n = 0; while (n < 3) n = n + 1; text \"\" + n + now();", "t", VarStore::new()).unwrap();
    let a = template.render_with_clock(Rc::new(fixed_time)).unwrap();
    let b = template.render_with_clock(Rc::new(fixed_time)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn renders_do_not_share_variables() {
    let template = Template::compile("if (true) { } count = 1; text \"\" + count;", "t", VarStore::new()).unwrap();
    assert_eq!(template.render().unwrap().content.as_deref(), Some("1"));
    assert_eq!(template.render().unwrap().content.as_deref(), Some("1"));
}

#[test]
fn template_constants_override_context() {
    let mut constants = VarStore::new();
    constants.set("who", "context");
    constants.set("kept", "yes");
    let template = Template::compile("const who = \"template\"; text who + kept;", "t", constants).unwrap();
    assert_eq!(template.constants().get("who"), Some(&Value::from("template")));
    assert_eq!(template.render().unwrap().content.as_deref(), Some("templateyes"));
}

#[test]
fn parse_errors_carry_positions() {
    let Error::Parse(err) = render_err("text \"a\"\ntext \"b\";") else {
        panic!("expected a parse error");
    };
    assert_eq!(err.message, "expected ';', found 'text'");
    assert_eq!(err.pos.line, 2);
}

#[test]
fn one_shot_render() {
    assert_eq!(dmt::render("text \"hi\";").unwrap().content.as_deref(), Some("hi"));
}
