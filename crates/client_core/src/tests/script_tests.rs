use super::*;
use crate::{error::ExecutionError, modules::BuiltinModules, page::PageHandle};

async fn run(page: &PageHandle, source: &str) -> Result<ScriptValue, ExecutionError> {
    let modules = BuiltinModules::default();
    let program = parse(source)?;
    Interpreter::new(&modules).run(page, &program).await
}

#[test]
fn parses_statements_with_and_without_semicolons() {
    let program = parse("let a = 'x'\nconst b = a; document.title = b\n;;").expect("parse");
    assert_eq!(program.len(), 3);
    assert!(parse("").expect("empty").is_empty());
}

#[test]
fn syntax_errors_carry_position() {
    let err = parse("let x = 'open").expect_err("unterminated");
    assert!(matches!(err, ExecutionError::Syntax { line: 1, column: 9, .. }));

    let err = parse("document.title = 'a' 'b'").expect_err("missing separator");
    assert!(matches!(err, ExecutionError::Syntax { line: 1, .. }));

    let err = parse("if (x) { }").expect_err("unsupported");
    assert!(matches!(err, ExecutionError::Syntax { ref message, .. } if message.contains("if")));
}

#[test]
fn line_continuation_does_not_end_a_statement() {
    let err = parse("document.title = 'a\\\nb' 'c'").expect_err("missing separator");
    assert!(matches!(err, ExecutionError::Syntax { line: 2, .. }));

    let program = parse("document.title = 'a\\\nb'\ndocument.title = 'c'").expect("parse");
    assert_eq!(program.len(), 2);
}

#[test]
fn await_inside_an_expression_is_rejected() {
    let err = parse("foo(await import('./page.mjs'))").expect_err("nested await");
    assert!(matches!(err, ExecutionError::Syntax { .. }));
}

#[tokio::test]
async fn sets_document_title() {
    let page = PageHandle::new();
    run(&page, "document.title = 'x';").await.expect("run");
    assert_eq!(page.title().await, "x");
}

#[tokio::test]
async fn builds_controls_and_attaches_server_listener() {
    let page = PageHandle::new();
    let source = r#"
        'use strict';
        let panel = document.createElement('div');
        panel.id = 'panel';
        document.body.appendChild(panel);
        let ctl01 = document.createElement('button');
        ctl01.id = 'ctl01';
        ctl01.textContent = 'Press';
        panel.appendChild(ctl01);
        let Button = await import('./controls/button.mjs');
        ctl01.addEventListener('click', Button.onClickHandler, { capture: false, passive: true });
    "#;
    run(&page, source).await.expect("run");

    let document = page.lock().await;
    let button = document.element_by_id("ctl01").expect("button");
    assert_eq!(document.tag_name(button).expect("tag"), "BUTTON");
    assert_eq!(document.text_content(button).expect("text"), "Press");
    let listeners = document.listeners(button).expect("listeners");
    assert_eq!(listeners.len(), 1);
    assert_eq!(listeners[0].event_type, "click");
    assert!(!listeners[0].capture);
}

#[tokio::test]
async fn updates_existing_controls_by_id() {
    let page = PageHandle::new();
    run(
        &page,
        "let lbl1 = document.createElement('span'); lbl1.id = 'lbl1'; document.body.appendChild(lbl1);",
    )
    .await
    .expect("create");
    run(
        &page,
        "document.getElementById('lbl1').textContent = 'Clicked 1 times';",
    )
    .await
    .expect("update");

    let document = page.lock().await;
    let label = document.element_by_id("lbl1").expect("label");
    assert_eq!(document.text_content(label).expect("text"), "Clicked 1 times");
}

#[tokio::test]
async fn insert_before_and_remove() {
    let page = PageHandle::new();
    let source = r#"
        let b = document.createElement('span'); b.id = 'b';
        document.body.appendChild(b);
        let a = document.createElement('span'); a.id = 'a';
        document.body.insertBefore(a, b);
        let c = document.createElement('span'); c.id = 'c';
        document.body.insertBefore(c, null);
        b.remove();
    "#;
    run(&page, source).await.expect("run");

    let document = page.lock().await;
    let ids: Vec<&str> = document
        .children(document.body())
        .expect("children")
        .iter()
        .filter_map(|node| document.id(*node))
        .collect();
    assert_eq!(ids, vec!["a", "c"]);
}

#[tokio::test]
async fn page_module_clears_the_body() {
    let page = PageHandle::new();
    let source = r#"
        document.body.appendChild(document.createElement('div'));
        const Page = await import('./page.mjs');
        Page.clearPage();
        document.title = 'fresh';
    "#;
    run(&page, source).await.expect("run");

    let document = page.lock().await;
    assert!(document.children(document.body()).expect("children").is_empty());
    assert_eq!(document.title(), "fresh");
}

#[tokio::test]
async fn clear_page_also_drops_body_text() {
    let page = PageHandle::new();
    let source = r#"
        document.body.textContent = 'stale';
        const Page = await import('./page.mjs');
        Page.clearPage();
        document.title = document.body.textContent;
    "#;
    run(&page, source).await.expect("run");
    assert_eq!(page.title().await, "");
}

#[tokio::test]
async fn large_integers_render_without_saturating() {
    let page = PageHandle::new();
    run(&page, "document.title = 100000000000000000000;")
        .await
        .expect("run");
    assert_eq!(page.title().await, "100000000000000000000");

    let value = run(&page, "return 12.5;").await.expect("run");
    assert_eq!(value.to_string(), "12.5");
    let value = run(&page, "return 9007199254740993;").await.expect("run");
    assert_eq!(value.to_string(), "9007199254740992");
}

#[tokio::test]
async fn attributes_and_class_name() {
    let page = PageHandle::new();
    let value = run(
        &page,
        "let d = document.createElement('div'); d.className = 'card'; d.setAttribute('data-x', 1); return d.getAttribute('class');",
    )
    .await
    .expect("run");
    assert_eq!(value, ScriptValue::String("card".to_string()));
}

#[tokio::test]
async fn return_stops_execution() {
    let page = PageHandle::new();
    let value = run(&page, "document.title = 'a'; return 42; document.title = 'b';")
        .await
        .expect("run");
    assert_eq!(value, ScriptValue::Number(42.0));
    assert_eq!(page.title().await, "a");
}

#[tokio::test]
async fn thrown_values_surface_as_execution_errors() {
    let page = PageHandle::new();
    let err = run(&page, "throw 'boom';").await.expect_err("throw");
    assert_eq!(err, ExecutionError::Thrown("boom".to_string()));
}

#[tokio::test]
async fn statements_before_a_runtime_error_stay_applied() {
    let page = PageHandle::new();
    let err = run(&page, "document.title = 'partial';\nmissing.textContent = 'x';")
        .await
        .expect_err("reference error");
    assert!(matches!(
        err,
        ExecutionError::Runtime { line: 2, ref message } if message.starts_with("ReferenceError")
    ));
    assert_eq!(page.title().await, "partial");
}

#[tokio::test]
async fn binding_rules_follow_lexical_declarations() {
    let page = PageHandle::new();
    let err = run(&page, "let a = 1; let a = 2;").await.expect_err("redeclare");
    assert!(matches!(err, ExecutionError::Runtime { ref message, .. } if message.contains("already been declared")));

    let err = run(&page, "const a = 1; a = 2;").await.expect_err("const");
    assert!(matches!(err, ExecutionError::Runtime { ref message, .. } if message.contains("constant")));

    let value = run(&page, "var a = 1; var a = 'two'; return a;").await.expect("var");
    assert_eq!(value, ScriptValue::String("two".to_string()));

    let err = run(&page, "undeclared = 1;").await.expect_err("undeclared");
    assert!(matches!(err, ExecutionError::Runtime { ref message, .. } if message.starts_with("ReferenceError")));
}

#[tokio::test]
async fn expressions_evaluate_left_to_right() {
    let page = PageHandle::new();
    let err = run(&page, "missing(alsoMissing);").await.expect_err("callee");
    assert!(matches!(err, ExecutionError::Runtime { ref message, .. } if message == "ReferenceError: missing is not defined"));

    let err = run(&page, "missing.textContent = alsoMissing;")
        .await
        .expect_err("target object");
    assert!(matches!(err, ExecutionError::Runtime { ref message, .. } if message == "ReferenceError: missing is not defined"));

    let value = run(&page, "let o = { a: 1 }; o.b = 'x'; return o.b;")
        .await
        .expect("object field");
    assert_eq!(value, ScriptValue::String("x".to_string()));
}

#[tokio::test]
async fn missing_element_is_a_type_error() {
    let page = PageHandle::new();
    let err = run(&page, "document.getElementById('nope').textContent = 'x';")
        .await
        .expect_err("null receiver");
    assert!(matches!(err, ExecutionError::Runtime { ref message, .. } if message.starts_with("TypeError")));
}

#[tokio::test]
async fn unknown_module_fails_to_load() {
    let page = PageHandle::new();
    let err = run(&page, "let M = await import('./missing.mjs');")
        .await
        .expect_err("unknown module");
    assert!(matches!(err, ExecutionError::Module { ref specifier, .. } if specifier == "./missing.mjs"));
}

#[tokio::test]
async fn handlers_cannot_be_called_directly() {
    let page = PageHandle::new();
    let err = run(
        &page,
        "let Button = await import('./controls/button.mjs'); Button.onClickHandler();",
    )
    .await
    .expect_err("direct call");
    assert!(matches!(err, ExecutionError::Runtime { ref message, .. } if message.starts_with("TypeError")));
}

#[tokio::test]
async fn page_lock_is_released_while_awaiting() {
    let page = PageHandle::new();
    let program = parse("await null; document.title = 'after';").expect("parse");
    let modules = BuiltinModules::default();

    let observer = page.clone();
    let watcher = tokio::spawn(async move {
        // Acquires the lock while the script is suspended.
        observer.lock().await.set_title("during");
    });
    Interpreter::new(&modules)
        .run(&page, &program)
        .await
        .expect("run");
    watcher.await.expect("watcher");
    assert_eq!(page.title().await, "after");
}

#[tokio::test]
async fn console_calls_are_accepted() {
    let page = PageHandle::new();
    run(&page, "console.log('hello', 1); console.warn('careful');")
        .await
        .expect("run");
}
