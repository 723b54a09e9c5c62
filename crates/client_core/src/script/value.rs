use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::{attribution::ServerEventListener, page::NodeId};

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Object(BTreeMap<String, ScriptValue>),
    Document,
    Element(NodeId),
    Console,
    Module(Arc<ModuleNamespace>),
    Function(NativeFunction),
    Pending(PendingValue),
}

#[derive(Debug, Clone, PartialEq)]
pub enum NativeFunction {
    /// Attaches a control to the server round trip; only usable as a listener.
    Listener(ServerEventListener),
    ClearPage,
}

/// A value that only becomes available after the unit of work suspends.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingValue {
    Import(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleNamespace {
    specifier: String,
    exports: BTreeMap<String, ScriptValue>,
}

impl ModuleNamespace {
    pub fn new(specifier: impl Into<String>) -> Self {
        Self {
            specifier: specifier.into(),
            exports: BTreeMap::new(),
        }
    }

    pub fn with_export(mut self, name: impl Into<String>, value: ScriptValue) -> Self {
        self.exports.insert(name.into(), value);
        self
    }

    pub fn specifier(&self) -> &str {
        &self.specifier
    }

    pub fn export(&self, name: &str) -> Option<&ScriptValue> {
        self.exports.get(name)
    }
}

impl ScriptValue {
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(value) => *value,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Function(_) => "function",
            Self::Pending(_) => "promise",
            _ => "object",
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::String(s) => f.write_str(s),
            Self::Object(_) => f.write_str("[object Object]"),
            Self::Document => f.write_str("[object HTMLDocument]"),
            Self::Element(_) => f.write_str("[object HTMLElement]"),
            Self::Console => f.write_str("[object console]"),
            Self::Module(_) => f.write_str("[object Module]"),
            Self::Function(_) => f.write_str("function () { [native code] }"),
            Self::Pending(_) => f.write_str("[object Promise]"),
        }
    }
}
