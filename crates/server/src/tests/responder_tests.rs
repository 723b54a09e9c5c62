use super::*;
use client_core::{PageHandle, RenderScriptEngine, ScriptEngine};

fn click(control_id: &str) -> EventDescriptor {
    EventDescriptor::parse(control_id, "Click").expect("descriptor")
}

#[test]
fn creation_script_builds_every_control() {
    let page = CounterPage::new("Counter");
    let script = page.creation_script();
    assert!(script.contains("Page.clearPage();"));
    assert!(script.contains("document.title = 'Counter';"));
    for id in [PANEL, INCREMENT, RESET, LABEL] {
        assert!(script.contains(&format!("{id}.id = '{id}';")), "missing {id}");
    }
    assert!(script.contains("lbl1.textContent = 'Clicked 0 times';"));
}

#[test]
fn increment_and_reset_update_label() {
    let page = CounterPage::new("Counter");
    page.handle_event(&click("btn1")).expect("first");
    let script = page.handle_event(&click("btn1")).expect("second");
    assert_eq!(page.clicks(), 2);
    assert!(script.contains("document.getElementById('lbl1').textContent = 'Clicked 2 times';"));
    assert!(script.contains("document.title = 'Counter (2)';"));

    let script = page.handle_event(&click("btn2")).expect("reset");
    assert_eq!(page.clicks(), 0);
    assert!(script.contains("'Clicked 0 times'"));
}

#[test]
fn unknown_control_is_not_found() {
    let page = CounterPage::new("Counter");
    let err = page.handle_event(&click("ghost")).expect_err("unknown");
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[test]
fn non_click_events_are_rejected() {
    let page = CounterPage::new("Counter");
    let descriptor = EventDescriptor::parse("btn1", "Hover").expect("descriptor");
    let err = page.handle_event(&descriptor).expect_err("unsupported");
    assert_eq!(err.code, ErrorCode::Validation);
    assert_eq!(page.clicks(), 0);
}

#[tokio::test]
async fn scripts_run_on_the_client_engine() {
    let responder = CounterPage::new("T");
    let engine = RenderScriptEngine::default();
    let page = PageHandle::new();

    engine
        .execute(&page, &responder.creation_script())
        .await
        .expect("creation script");
    engine
        .execute(&page, &responder.handle_event(&click("btn1")).expect("click"))
        .await
        .expect("click script");

    let document = page.lock().await;
    assert_eq!(document.title(), "T (1)");
    let label = document.element_by_id(LABEL).expect("label");
    assert_eq!(document.text_content(label).expect("text"), "Clicked 1 times");
    let panel = document.element_by_id(PANEL).expect("panel");
    for id in [INCREMENT, RESET] {
        let button = document.element_by_id(id).expect("button");
        assert_eq!(document.parent(button), Some(panel));
        assert_eq!(document.listeners(button).expect("listeners").len(), 1);
    }
}

#[tokio::test]
async fn creation_script_reinitializes_a_used_page() {
    let responder = CounterPage::new("T");
    let engine = RenderScriptEngine::default();
    let page = PageHandle::new();

    for _ in 0..2 {
        engine
            .execute(&page, &responder.creation_script())
            .await
            .expect("creation script");
    }
    let document = page.lock().await;
    assert_eq!(document.children(document.body()).expect("children").len(), 1);
}
