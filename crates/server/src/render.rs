//! Builder for the scripts the client runs: every statement it emits stays
//! inside the client's render-script dialect.

use std::fmt::Write as _;

use shared::protocol::{BUTTON_MODULE, PAGE_MODULE};

#[derive(Debug, Default)]
pub struct RenderScript {
    body: String,
    button_module_loaded: bool,
}

/// Single-quoted literal; control characters are written as `\uXXXX`.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if ch.is_control() => {
                let _ = write!(out, "\\u{:04x}", u32::from(ch));
            }
            ch => out.push(ch),
        }
    }
    out.push('\'');
    out
}

impl RenderScript {
    pub fn new() -> Self {
        let mut script = Self::default();
        script.line("'use strict';");
        script
    }

    fn line(&mut self, statement: &str) {
        self.body.push_str(statement);
        self.body.push('\n');
    }

    pub fn clear_page(&mut self) -> &mut Self {
        self.line(&format!("const Page = await import({});", quote(PAGE_MODULE)));
        self.line("Page.clearPage();");
        self
    }

    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.line(&format!("document.title = {};", quote(title)));
        self
    }

    /// Declares `id` as a variable holding a new element. Ids double as
    /// variable names, so they must be plain identifiers.
    pub fn create_element(&mut self, tag: &str, id: &str, text: Option<&str>) -> &mut Self {
        self.line(&format!("let {id} = document.createElement({});", quote(tag)));
        self.line(&format!("{id}.id = {};", quote(id)));
        if let Some(text) = text {
            self.line(&format!("{id}.textContent = {};", quote(text)));
        }
        self
    }

    pub fn append_to_body(&mut self, id: &str) -> &mut Self {
        self.line(&format!("document.body.appendChild({id});"));
        self
    }

    pub fn append(&mut self, parent: &str, id: &str) -> &mut Self {
        self.line(&format!("{parent}.appendChild({id});"));
        self
    }

    pub fn on_click(&mut self, id: &str) -> &mut Self {
        if !self.button_module_loaded {
            self.line(&format!("let Button = await import({});", quote(BUTTON_MODULE)));
            self.button_module_loaded = true;
        }
        self.line(&format!(
            "{id}.addEventListener('click', Button.onClickHandler, {{ capture: false, passive: true }});"
        ));
        self
    }

    /// Replaces the text of an element that is already on the page.
    pub fn update_text(&mut self, id: &str, text: &str) -> &mut Self {
        self.line(&format!(
            "document.getElementById({}).textContent = {};",
            quote(id),
            quote(text)
        ));
        self
    }

    pub fn build(&self) -> String {
        self.body.clone()
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
