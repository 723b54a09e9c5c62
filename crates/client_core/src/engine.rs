use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    error::ExecutionError,
    modules::{BuiltinModules, ModuleLoader},
    page::PageHandle,
    script::{self, Interpreter, ScriptValue},
};

/// Executes server-produced code against the live page.
#[async_trait]
pub trait ScriptEngine: Send + Sync {
    async fn execute(&self, page: &PageHandle, code: &str) -> Result<ScriptValue, ExecutionError>;
}

/// Runs render scripts with the built-in interpreter. Each call gets a fresh
/// binding scope.
#[derive(Clone)]
pub struct RenderScriptEngine {
    modules: Arc<dyn ModuleLoader>,
}

impl RenderScriptEngine {
    pub fn new(modules: Arc<dyn ModuleLoader>) -> Self {
        Self { modules }
    }
}

impl Default for RenderScriptEngine {
    fn default() -> Self {
        Self::new(Arc::new(BuiltinModules::default()))
    }
}

#[async_trait]
impl ScriptEngine for RenderScriptEngine {
    async fn execute(&self, page: &PageHandle, code: &str) -> Result<ScriptValue, ExecutionError> {
        let program = script::parse(code)?;
        debug!(statements = program.len(), "executing render script");
        Interpreter::new(self.modules.as_ref())
            .run(page, &program)
            .await
    }
}
