//! Interpreter for the render-script dialect: the small subset of
//! JavaScript the server emits to create and update controls.

mod interpreter;
mod lexer;
mod parser;
mod value;

pub(crate) use interpreter::Interpreter;
pub use parser::{parse, Program};
pub use value::{ModuleNamespace, NativeFunction, PendingValue, ScriptValue};

#[cfg(test)]
#[path = "../tests/script_tests.rs"]
mod tests;
