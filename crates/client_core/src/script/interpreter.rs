use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use tracing::{debug, error, info, warn};

use crate::{
    error::ExecutionError,
    modules::ModuleLoader,
    page::{Document, DomError, Listener, NodeId, PageHandle},
};

use super::{
    parser::{DeclKind, Expr, Program, Stmt},
    value::{NativeFunction, PendingValue, ScriptValue},
};

struct Binding {
    kind: DeclKind,
    value: ScriptValue,
}

enum Resume {
    Bind { kind: DeclKind, name: String, line: usize },
    Discard,
    Return,
    Throw,
}

/// An assignment target resolved before its right-hand side runs.
enum Place<'e> {
    Binding(&'e str),
    Field(&'e str, &'e str),
    Property(ScriptValue, &'e str),
}

enum Flow {
    Next,
    Return(ScriptValue),
    Suspend(ScriptValue, Resume),
}

/// Runs one executable unit. Statements run under the page lock; the lock is
/// released while an `await` is pending and taken again to resume.
pub(crate) struct Interpreter<'a> {
    modules: &'a dyn ModuleLoader,
    scope: HashMap<String, Binding>,
}

fn runtime(line: usize, message: impl Into<String>) -> ExecutionError {
    ExecutionError::Runtime {
        line,
        message: message.into(),
    }
}

fn dom_error(line: usize, err: DomError) -> ExecutionError {
    runtime(line, err.to_string())
}

fn arg(args: &[ScriptValue], index: usize) -> ScriptValue {
    args.get(index).cloned().unwrap_or(ScriptValue::Undefined)
}

fn expect_element(value: &ScriptValue, line: usize, what: &str) -> Result<NodeId, ExecutionError> {
    match value {
        ScriptValue::Element(node) => Ok(*node),
        other => Err(runtime(
            line,
            format!("TypeError: {what} must be an element, got {}", other.type_name()),
        )),
    }
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(modules: &'a dyn ModuleLoader) -> Self {
        Self {
            modules,
            scope: HashMap::new(),
        }
    }

    pub(crate) async fn run(
        &mut self,
        page: &PageHandle,
        program: &Program,
    ) -> Result<ScriptValue, ExecutionError> {
        let mut document = page.lock().await;
        for stmt in &program.statements {
            match self.exec(&mut document, stmt)? {
                Flow::Next => {}
                Flow::Return(value) => return Ok(value),
                Flow::Suspend(pending, resume) => {
                    drop(document);
                    let resolved = self.resolve(pending).await;
                    document = page.lock().await;
                    let resolved = resolved?;
                    match resume {
                        Resume::Bind { kind, name, line } => {
                            self.declare(kind, name, resolved, line)?;
                        }
                        Resume::Discard => {}
                        Resume::Return => return Ok(resolved),
                        Resume::Throw => return Err(ExecutionError::Thrown(resolved.to_string())),
                    }
                }
            }
        }
        Ok(ScriptValue::Undefined)
    }

    async fn resolve(&self, value: ScriptValue) -> Result<ScriptValue, ExecutionError> {
        match value {
            ScriptValue::Pending(PendingValue::Import(specifier)) => {
                debug!(%specifier, "loading module");
                let namespace = self.modules.load(&specifier).await?;
                Ok(ScriptValue::Module(Arc::new(namespace)))
            }
            other => {
                // Awaiting a plain value still yields to other tasks.
                tokio::task::yield_now().await;
                Ok(other)
            }
        }
    }

    fn exec(&mut self, document: &mut Document, stmt: &Stmt) -> Result<Flow, ExecutionError> {
        match stmt {
            Stmt::Declare {
                kind,
                name,
                init,
                line,
            } => match init {
                Some(Expr::Await(inner)) => {
                    let pending = self.eval(document, inner)?;
                    Ok(Flow::Suspend(
                        pending,
                        Resume::Bind {
                            kind: *kind,
                            name: name.clone(),
                            line: *line,
                        },
                    ))
                }
                Some(expr) => {
                    let value = self.eval(document, expr)?;
                    self.declare(*kind, name.clone(), value, *line)?;
                    Ok(Flow::Next)
                }
                None => {
                    self.declare(*kind, name.clone(), ScriptValue::Undefined, *line)?;
                    Ok(Flow::Next)
                }
            },
            Stmt::Expr(Expr::Await(inner)) => {
                let pending = self.eval(document, inner)?;
                Ok(Flow::Suspend(pending, Resume::Discard))
            }
            Stmt::Expr(expr) => {
                self.eval(document, expr)?;
                Ok(Flow::Next)
            }
            Stmt::Return(Some(Expr::Await(inner))) => {
                let pending = self.eval(document, inner)?;
                Ok(Flow::Suspend(pending, Resume::Return))
            }
            Stmt::Return(Some(expr)) => Ok(Flow::Return(self.eval(document, expr)?)),
            Stmt::Return(None) => Ok(Flow::Return(ScriptValue::Undefined)),
            Stmt::Throw(Expr::Await(inner)) => {
                let pending = self.eval(document, inner)?;
                Ok(Flow::Suspend(pending, Resume::Throw))
            }
            Stmt::Throw(expr) => {
                let value = self.eval(document, expr)?;
                Err(ExecutionError::Thrown(value.to_string()))
            }
        }
    }

    fn declare(
        &mut self,
        kind: DeclKind,
        name: String,
        value: ScriptValue,
        line: usize,
    ) -> Result<(), ExecutionError> {
        if let Some(existing) = self.scope.get(&name) {
            if existing.kind != DeclKind::Var || kind != DeclKind::Var {
                return Err(runtime(
                    line,
                    format!("SyntaxError: Identifier '{name}' has already been declared"),
                ));
            }
        }
        self.scope.insert(name, Binding { kind, value });
        Ok(())
    }

    fn lookup(&self, name: &str, line: usize) -> Result<ScriptValue, ExecutionError> {
        if let Some(binding) = self.scope.get(name) {
            return Ok(binding.value.clone());
        }
        match name {
            "document" => Ok(ScriptValue::Document),
            "console" => Ok(ScriptValue::Console),
            "undefined" => Ok(ScriptValue::Undefined),
            _ => Err(runtime(line, format!("ReferenceError: {name} is not defined"))),
        }
    }

    fn eval(&mut self, document: &mut Document, expr: &Expr) -> Result<ScriptValue, ExecutionError> {
        match expr {
            Expr::Ident { name, line } => self.lookup(name, *line),
            Expr::Str(value) => Ok(ScriptValue::String(value.clone())),
            Expr::Num(value) => Ok(ScriptValue::Number(*value)),
            Expr::Bool(value) => Ok(ScriptValue::Bool(*value)),
            Expr::Null => Ok(ScriptValue::Null),
            Expr::Object(fields) => {
                let mut object = BTreeMap::new();
                for (key, value) in fields {
                    object.insert(key.clone(), self.eval(document, value)?);
                }
                Ok(ScriptValue::Object(object))
            }
            Expr::Member {
                object,
                property,
                line,
            } => {
                let receiver = self.eval(document, object)?;
                get_property(document, &receiver, property, *line)
            }
            Expr::Call { callee, args, line } => {
                let (function, name) = match callee.as_ref() {
                    Expr::Member {
                        object, property, ..
                    } => (self.eval(document, object)?, Some(property.as_str())),
                    _ => (self.eval(document, callee)?, None),
                };
                let mut values = Vec::with_capacity(args.len());
                for value in args {
                    values.push(self.eval(document, value)?);
                }
                match name {
                    Some(name) => call_method(document, &function, name, &values, *line),
                    None => call_value(document, &function, &values, *line),
                }
            }
            Expr::Import { specifier, .. } => {
                let specifier = self.eval(document, specifier)?;
                Ok(ScriptValue::Pending(PendingValue::Import(specifier.to_string())))
            }
            Expr::Assign {
                target,
                value,
                line,
            } => {
                let place = self.place(document, target, *line)?;
                let value = self.eval(document, value)?;
                self.store(document, place, value.clone(), *line)?;
                Ok(value)
            }
            Expr::Await(_) => Err(ExecutionError::Syntax {
                line: 0,
                column: 0,
                message: "await is only supported at the start of a statement".to_string(),
            }),
        }
    }

    fn place<'e>(
        &mut self,
        document: &mut Document,
        target: &'e Expr,
        line: usize,
    ) -> Result<Place<'e>, ExecutionError> {
        match target {
            Expr::Ident { name, .. } => Ok(Place::Binding(name)),
            Expr::Member {
                object, property, ..
            } => {
                if let Expr::Ident { name, .. } = object.as_ref() {
                    if let Some(Binding {
                        value: ScriptValue::Object(_),
                        ..
                    }) = self.scope.get(name)
                    {
                        return Ok(Place::Field(name, property));
                    }
                }
                Ok(Place::Property(self.eval(document, object)?, property))
            }
            _ => Err(runtime(line, "SyntaxError: invalid assignment target")),
        }
    }

    fn store(
        &mut self,
        document: &mut Document,
        place: Place<'_>,
        value: ScriptValue,
        line: usize,
    ) -> Result<(), ExecutionError> {
        match place {
            Place::Binding(name) => match self.scope.get_mut(name) {
                Some(binding) if binding.kind == DeclKind::Const => Err(runtime(
                    line,
                    "TypeError: Assignment to constant variable.",
                )),
                Some(binding) => {
                    binding.value = value;
                    Ok(())
                }
                None => Err(runtime(line, format!("ReferenceError: {name} is not defined"))),
            },
            Place::Field(name, property) => match self.scope.get_mut(name) {
                Some(Binding {
                    value: ScriptValue::Object(fields),
                    ..
                }) => {
                    fields.insert(property.to_string(), value);
                    Ok(())
                }
                // The right-hand side rebound the name to a non-object.
                Some(binding) => {
                    let receiver = binding.value.clone();
                    set_property(document, &receiver, property, value, line)
                }
                None => Err(runtime(line, format!("ReferenceError: {name} is not defined"))),
            },
            Place::Property(receiver, property) => {
                set_property(document, &receiver, property, value, line)
            }
        }
    }
}

fn get_property(
    document: &Document,
    receiver: &ScriptValue,
    property: &str,
    line: usize,
) -> Result<ScriptValue, ExecutionError> {
    match receiver {
        ScriptValue::Undefined | ScriptValue::Null => Err(runtime(
            line,
            format!("TypeError: Cannot read properties of {receiver} (reading '{property}')"),
        )),
        ScriptValue::Document => Ok(match property {
            "title" => ScriptValue::String(document.title().to_string()),
            "body" => ScriptValue::Element(document.body()),
            _ => ScriptValue::Undefined,
        }),
        ScriptValue::Element(node) => {
            let node = *node;
            Ok(match property {
                "id" => ScriptValue::String(document.id(node).unwrap_or_default().to_string()),
                "textContent" => {
                    ScriptValue::String(document.text_content(node).map_err(|e| dom_error(line, e))?)
                }
                "tagName" => {
                    ScriptValue::String(document.tag_name(node).map_err(|e| dom_error(line, e))?)
                }
                "parentNode" => match document.parent(node) {
                    Some(parent) if parent == document.root() => ScriptValue::Document,
                    Some(parent) => ScriptValue::Element(parent),
                    None => ScriptValue::Null,
                },
                "isConnected" => ScriptValue::Bool(document.is_connected(node)),
                _ => ScriptValue::Undefined,
            })
        }
        ScriptValue::Object(fields) => Ok(fields
            .get(property)
            .cloned()
            .unwrap_or(ScriptValue::Undefined)),
        ScriptValue::Module(namespace) => Ok(namespace
            .export(property)
            .cloned()
            .unwrap_or(ScriptValue::Undefined)),
        ScriptValue::String(value) if property == "length" => {
            Ok(ScriptValue::Number(value.encode_utf16().count() as f64))
        }
        _ => Ok(ScriptValue::Undefined),
    }
}

fn set_property(
    document: &mut Document,
    receiver: &ScriptValue,
    property: &str,
    value: ScriptValue,
    line: usize,
) -> Result<(), ExecutionError> {
    match receiver {
        ScriptValue::Undefined | ScriptValue::Null => Err(runtime(
            line,
            format!("TypeError: Cannot set properties of {receiver} (setting '{property}')"),
        )),
        ScriptValue::Document => {
            if property == "title" {
                document.set_title(value.to_string());
            }
            Ok(())
        }
        ScriptValue::Element(node) => {
            let result = match property {
                "id" => document.set_id(*node, value.to_string()),
                "textContent" => {
                    let text = match value {
                        ScriptValue::Null | ScriptValue::Undefined => String::new(),
                        other => other.to_string(),
                    };
                    document.set_text_content(*node, text)
                }
                "className" => document.set_attribute(*node, "class", value.to_string()),
                _ => Ok(()),
            };
            result.map_err(|e| dom_error(line, e))
        }
        _ => Ok(()),
    }
}

fn listener_from_args(args: &[ScriptValue], line: usize) -> Result<Listener, ExecutionError> {
    let event_type = arg(args, 0).to_string();
    let handler = match arg(args, 1) {
        ScriptValue::Function(NativeFunction::Listener(handler)) => handler,
        other => {
            return Err(runtime(
                line,
                format!(
                    "TypeError: only server event handlers can be attached as listeners, got {}",
                    other.type_name()
                ),
            ))
        }
    };
    let capture = match arg(args, 2) {
        ScriptValue::Object(options) => options
            .get("capture")
            .is_some_and(ScriptValue::is_truthy),
        other => other.is_truthy(),
    };
    Ok(Listener {
        event_type,
        handler,
        capture,
    })
}

fn call_method(
    document: &mut Document,
    receiver: &ScriptValue,
    name: &str,
    args: &[ScriptValue],
    line: usize,
) -> Result<ScriptValue, ExecutionError> {
    match (receiver, name) {
        (ScriptValue::Document, "createElement") => {
            Ok(ScriptValue::Element(document.create_element(&arg(args, 0).to_string())))
        }
        (ScriptValue::Document, "getElementById") => Ok(document
            .element_by_id(&arg(args, 0).to_string())
            .map(ScriptValue::Element)
            .unwrap_or(ScriptValue::Null)),
        (ScriptValue::Element(parent), "appendChild") => {
            let child = expect_element(&arg(args, 0), line, "appendChild argument")?;
            document
                .append_child(*parent, child)
                .map_err(|e| dom_error(line, e))?;
            Ok(ScriptValue::Element(child))
        }
        (ScriptValue::Element(parent), "insertBefore") => {
            let child = expect_element(&arg(args, 0), line, "insertBefore argument")?;
            let reference = match arg(args, 1) {
                ScriptValue::Null | ScriptValue::Undefined => None,
                other => Some(expect_element(&other, line, "insertBefore reference")?),
            };
            document
                .insert_before(*parent, child, reference)
                .map_err(|e| dom_error(line, e))?;
            Ok(ScriptValue::Element(child))
        }
        (ScriptValue::Element(node), "remove") => {
            document.remove(*node).map_err(|e| dom_error(line, e))?;
            Ok(ScriptValue::Undefined)
        }
        (ScriptValue::Element(node), "setAttribute") => {
            document
                .set_attribute(*node, &arg(args, 0).to_string(), arg(args, 1).to_string())
                .map_err(|e| dom_error(line, e))?;
            Ok(ScriptValue::Undefined)
        }
        (ScriptValue::Element(node), "getAttribute") => Ok(document
            .attribute(*node, &arg(args, 0).to_string())
            .map(|value| ScriptValue::String(value.to_string()))
            .unwrap_or(ScriptValue::Null)),
        (ScriptValue::Element(node), "addEventListener") => {
            let listener = listener_from_args(args, line)?;
            document
                .add_event_listener(*node, listener)
                .map_err(|e| dom_error(line, e))?;
            Ok(ScriptValue::Undefined)
        }
        (ScriptValue::Element(node), "removeEventListener") => {
            let listener = listener_from_args(args, line)?;
            document
                .remove_event_listener(*node, &listener)
                .map_err(|e| dom_error(line, e))?;
            Ok(ScriptValue::Undefined)
        }
        (ScriptValue::Console, level) => {
            let message = args
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            match level {
                "warn" => warn!(target: "script", "{message}"),
                "error" => error!(target: "script", "{message}"),
                "debug" => debug!(target: "script", "{message}"),
                _ => info!(target: "script", "{message}"),
            }
            Ok(ScriptValue::Undefined)
        }
        (ScriptValue::Undefined | ScriptValue::Null, _) => Err(runtime(
            line,
            format!("TypeError: Cannot read properties of {receiver} (reading '{name}')"),
        )),
        _ => {
            let function = get_property(document, receiver, name, line)?;
            match function {
                ScriptValue::Function(_) => call_value(document, &function, args, line),
                _ => Err(runtime(line, format!("TypeError: {name} is not a function"))),
            }
        }
    }
}

fn call_value(
    document: &mut Document,
    function: &ScriptValue,
    _args: &[ScriptValue],
    line: usize,
) -> Result<ScriptValue, ExecutionError> {
    match function {
        ScriptValue::Function(NativeFunction::ClearPage) => {
            document.clear_body();
            Ok(ScriptValue::Undefined)
        }
        ScriptValue::Function(NativeFunction::Listener(_)) => Err(runtime(
            line,
            "TypeError: event handlers run on dispatch and cannot be called directly",
        )),
        other => Err(runtime(
            line,
            format!("TypeError: {} is not a function", other.type_name()),
        )),
    }
}
