//! Pooled per-pipe interpreters.

use crate::error::{Error, Result, ResultExt};
use crate::scripting::{register_interrupt, HostObject, Interrupt, Program, ENTRYPOINT};
use rhai::{
    CallFnOptions, Dynamic, Engine, EvalAltResult, FnPtr, Module, NativeCallContext, Scope, INT,
};
use std::sync::{Arc, Mutex, PoisonError, TryLockError};

/// Native function behind every script's `next` pointer.
pub(crate) const NEXT_FN: &str = "flow_next";

type Fallible<T> = std::result::Result<T, Box<EvalAltResult>>;

/// A compiled chain and one scope per step.
struct Chain {
    program: Arc<Program>,
    scopes: Vec<Mutex<Scope<'static>>>,
}

impl Chain {
    fn new(program: Arc<Program>) -> Self {
        let scopes = program.steps.iter().map(|_| Mutex::new(Scope::new())).collect();
        Self { program, scopes }
    }

    /// Calls step `index`'s `main`; past the last step this hands `nodes`
    /// straight back.
    fn run(
        &self,
        engine: &Engine,
        index: usize,
        host: &HostObject,
        nodes: Dynamic,
    ) -> Fallible<Dynamic> {
        let Some(step) = self.program.steps.get(index) else {
            return Ok(nodes);
        };
        let mut scope = match self.scopes[index].try_lock() {
            Ok(scope) => scope,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                return Err(Error::Script {
                    pipe: step.label.clone(),
                    message: "re-entrant call".to_string(),
                }
                .into())
            }
        };

        let mut next = FnPtr::new(NEXT_FN)?;
        next.add_curry(Dynamic::from_int((index + 1) as INT));
        next.add_curry(Dynamic::from(host.clone()));
        let args: Vec<Dynamic> = [nodes, Dynamic::from(next)]
            .into_iter()
            .take(step.arity)
            .collect();

        let previous = host.enter(step.uuid, &step.label);
        let mut this = Dynamic::from(host.clone());
        let options = CallFnOptions::new()
            .eval_ast(false)
            .rewind_scope(true)
            .bind_this_ptr(&mut this);
        let result = engine.call_fn_with_options::<Dynamic>(
            options,
            &mut scope,
            &step.ast,
            ENTRYPOINT,
            args,
        );
        host.leave(previous);
        result
    }
}

/// An engine bound to one pipe's program.
pub(crate) struct Interpreter {
    engine: Engine,
    chain: Arc<Chain>,
    interrupt: Arc<Interrupt>,
    label: String,
}

impl Interpreter {
    /// Wires `next` and the interrupt into `engine`, then runs the top
    /// level of every step once. Modules a step imports at the top level
    /// stay reachable from its functions as static modules.
    pub(crate) fn assemble(
        mut engine: Engine,
        program: Arc<Program>,
        label: String,
    ) -> Result<Self> {
        let chain = Arc::new(Chain::new(program));
        let interrupt = Arc::new(Interrupt::default());
        register_interrupt(&mut engine, Arc::clone(&interrupt));

        let runner = Arc::clone(&chain);
        engine.register_fn(
            NEXT_FN,
            move |ctx: NativeCallContext, index: INT, host: HostObject, nodes: Dynamic| {
                let index = usize::try_from(index).unwrap_or(usize::MAX);
                runner.run(ctx.engine(), index, &host, nodes)
            },
        );

        let mut imports = Vec::new();
        for step in &chain.program.steps {
            let module = Module::eval_ast_as_new(Scope::new(), &step.ast, &engine)
                .context(step.label.clone())?;
            imports.extend(
                module
                    .iter_sub_modules()
                    .map(|(alias, m)| (alias.to_string(), m.clone(), step.label.clone())),
            );
        }
        let mut seen = std::collections::HashSet::new();
        for (alias, module, step) in imports {
            if !seen.insert(alias.clone()) {
                tracing::warn!(pipe = %label, step = %step, alias = %alias, "import alias reused");
            }
            engine.register_static_module(alias, module);
        }

        tracing::debug!(pipe = %label, steps = chain.program.len(), "interpreter ready");
        Ok(Self {
            engine,
            chain,
            interrupt,
            label,
        })
    }

    /// Interrupt polled by the running script; raising the current run
    /// terminates the call.
    pub(crate) fn interrupt(&self) -> &Arc<Interrupt> {
        &self.interrupt
    }

    /// Starts a new run; raises left over from earlier runs no longer apply.
    pub(crate) fn begin(&self) -> u64 {
        self.interrupt.begin()
    }

    /// Runs the pipe's own step with `nodes`.
    pub(crate) fn call(&self, host: &HostObject, nodes: Dynamic) -> Result<Dynamic> {
        self.chain
            .run(&self.engine, 0, host, nodes)
            .context(self.label.clone())
    }
}

/// Idle interpreters of one pipe.
#[derive(Default)]
pub(crate) struct Pool {
    idle: Mutex<Vec<Interpreter>>,
}

impl Pool {
    pub(crate) fn take(&self) -> Option<Interpreter> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).pop()
    }

    pub(crate) fn put(&self, interpreter: Interpreter) {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(interpreter);
    }

    pub(crate) fn len(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
