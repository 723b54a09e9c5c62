use std::collections::HashMap;

use async_trait::async_trait;
pub use shared::protocol::{BUTTON_MODULE, PAGE_MODULE};

use crate::{
    attribution::ServerEventListener,
    error::ExecutionError,
    script::{ModuleNamespace, NativeFunction, ScriptValue},
};

/// Resolves `import(...)` specifiers found in render scripts.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load(&self, specifier: &str) -> Result<ModuleNamespace, ExecutionError>;
}

/// Modules shipped with the client. Specifiers match with or without a
/// leading `./`.
#[derive(Debug, Clone)]
pub struct BuiltinModules {
    modules: HashMap<String, ModuleNamespace>,
}

fn normalize(specifier: &str) -> &str {
    specifier.trim().trim_start_matches("./")
}

impl BuiltinModules {
    pub fn empty() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }

    pub fn register(&mut self, namespace: ModuleNamespace) {
        self.modules
            .insert(normalize(namespace.specifier()).to_string(), namespace);
    }

    pub fn contains(&self, specifier: &str) -> bool {
        self.modules.contains_key(normalize(specifier))
    }
}

impl Default for BuiltinModules {
    fn default() -> Self {
        let mut modules = Self::empty();
        modules.register(ModuleNamespace::new(BUTTON_MODULE).with_export(
            "onClickHandler",
            ScriptValue::Function(NativeFunction::Listener(ServerEventListener::click())),
        ));
        modules.register(
            ModuleNamespace::new(PAGE_MODULE)
                .with_export("clearPage", ScriptValue::Function(NativeFunction::ClearPage)),
        );
        modules
    }
}

#[async_trait]
impl ModuleLoader for BuiltinModules {
    async fn load(&self, specifier: &str) -> Result<ModuleNamespace, ExecutionError> {
        self.modules
            .get(normalize(specifier))
            .cloned()
            .ok_or_else(|| ExecutionError::Module {
                specifier: specifier.to_string(),
                message: "no such module".to_string(),
            })
    }
}
