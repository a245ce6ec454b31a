//! Module resolution for `import` statements.
//!
//! `import "flow:<name-or-uuid>" as m;` evaluates a sibling pipe's code as
//! a module. Any other path is looked up as `<script_dir>/<path>.rhai` when
//! a script directory is configured.

use super::STUB;
use crate::flow::Registry;
use rhai::module_resolvers::FileModuleResolver;
use rhai::{Engine, EvalAltResult, Module, ModuleResolver, Position, Scope, Shared};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Path prefix selecting a registered pipe.
pub const FLOW_SCHEME: &str = "flow:";

pub struct FlowResolver {
    registry: Arc<Registry>,
    files: Option<FileModuleResolver>,
    /// Pipes whose module is being evaluated, for cycle detection
    loading: Mutex<HashSet<Uuid>>,
}

impl FlowResolver {
    pub(crate) fn new(registry: Arc<Registry>, script_dir: Option<PathBuf>) -> Self {
        Self {
            registry,
            files: script_dir.map(FileModuleResolver::new_with_path),
            loading: Mutex::new(HashSet::new()),
        }
    }

    fn resolve_pipe(
        &self,
        engine: &Engine,
        key: &str,
        path: &str,
        pos: Position,
    ) -> Result<Shared<Module>, Box<EvalAltResult>> {
        let pipe = self
            .registry
            .lookup(key)
            .ok_or_else(|| EvalAltResult::ErrorModuleNotFound(path.to_string(), pos))?;

        let fresh = self
            .loading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pipe.uuid);
        if !fresh {
            return Err(EvalAltResult::ErrorInModule(
                path.to_string(),
                EvalAltResult::ErrorRuntime("cyclic import".into(), pos).into(),
                pos,
            )
            .into());
        }

        let source = pipe.code.get().map(String::as_str).unwrap_or(STUB);
        let result: Result<Module, Box<EvalAltResult>> = engine
            .compile(source)
            .map_err(Into::into)
            .and_then(|ast| Module::eval_ast_as_new(Scope::new(), &ast, engine))
            .map_err(|e| EvalAltResult::ErrorInModule(path.to_string(), e, pos).into());

        self.loading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&pipe.uuid);

        let mut module = result?;
        module.build_index();
        tracing::debug!(pipe = %pipe.label(), "imported pipe module");
        Ok(module.into())
    }
}

impl ModuleResolver for FlowResolver {
    fn resolve(
        &self,
        engine: &Engine,
        source: Option<&str>,
        path: &str,
        pos: Position,
    ) -> Result<Shared<Module>, Box<EvalAltResult>> {
        if let Some(key) = path.strip_prefix(FLOW_SCHEME) {
            return self.resolve_pipe(engine, key, path, pos);
        }
        match &self.files {
            Some(files) => files.resolve(engine, source, path, pos),
            None => Err(EvalAltResult::ErrorModuleNotFound(path.to_string(), pos).into()),
        }
    }
}
