//! Batch partitioning and per-run execution.

use super::pool::Interpreter;
use super::{CancelToken, Flow};
use crate::bridge::{FromScript, IntoScript};
use crate::error::{Error, Result};
use crate::model::{Node, Pipe};
use crate::scripting::HostObject;
use std::ops::Range;
use std::sync::Arc;

/// Contiguous Nodes matched by the same pipe.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Run {
    pipe: usize,
    range: Range<usize>,
}

impl Flow {
    /// Runs every matched run of `nodes` through its pipe.
    ///
    /// Each run's output replaces the run in place, so scripts may drop or
    /// add Nodes. A failed run leaves its Nodes untouched; failures are
    /// collected and returned together once every run was attempted.
    pub fn work(&self, cancel: &CancelToken, nodes: &mut Vec<Node>) -> Result<()> {
        let runs = self.partition(nodes);
        let mut errors = Vec::new();
        let mut shift: isize = 0;

        for run in runs {
            let start = run.range.start.saturating_add_signed(shift);
            let end = run.range.end.saturating_add_signed(shift);
            let label = self.registry.pipes()[run.pipe].label();
            match self.handle(cancel, run.pipe, nodes[start..end].to_vec()) {
                Ok(out) => {
                    shift += out.len() as isize - (end - start) as isize;
                    nodes.splice(start..end, out);
                }
                Err(e) => {
                    tracing::warn!(pipe = %label, error = %e, "pipe run failed");
                    errors.push(e.with_context(format!("pipe {label:?}")));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Aggregate(errors))
        }
    }

    /// [`Flow::work`] on the tokio blocking pool.
    ///
    /// Returns the processed batch. On error the batch is dropped; use
    /// [`Flow::work`] directly to keep the partially processed Nodes.
    /// Dropping the returned future cancels the scripts still running.
    pub async fn work_async(
        self: Arc<Self>,
        cancel: CancelToken,
        nodes: Vec<Node>,
    ) -> Result<Vec<Node>> {
        let cancel = cancel.child();
        let _abandon = cancel.clone().drop_guard();
        tokio::task::spawn_blocking(move || {
            let mut nodes = nodes;
            self.work(&cancel, &mut nodes).map(|()| nodes)
        })
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
    }

    /// Splits `nodes` into maximal runs sharing the first matching pipe.
    fn partition(&self, nodes: &[Node]) -> Vec<Run> {
        let mut runs: Vec<Run> = Vec::new();
        let mut current = None;
        for (i, node) in nodes.iter().enumerate() {
            let matched = self.registry.matching(node);
            match matched {
                Some(pipe) if current == Some(pipe) => {
                    if let Some(run) = runs.last_mut() {
                        run.range.end = i + 1;
                    }
                }
                Some(pipe) => runs.push(Run {
                    pipe,
                    range: i..i + 1,
                }),
                None => {}
            }
            current = matched;
        }
        runs
    }

    /// Runs one batch through the pipe at `index` on a pooled interpreter.
    fn handle(&self, cancel: &CancelToken, index: usize, nodes: Vec<Node>) -> Result<Vec<Node>> {
        let interpreter = match self.pools[index].take() {
            Some(interpreter) => interpreter,
            None => self.spawn(index)?,
        };

        let run = interpreter.begin();
        let interrupt = Arc::clone(interpreter.interrupt());
        let guard = cancel.watch(move || interrupt.raise(run));

        let pipe = &self.registry.pipes()[index];
        let result = self.run(&interpreter, pipe, nodes);

        drop(guard);
        self.pools[index].put(interpreter);
        result
    }

    fn run(&self, interpreter: &Interpreter, pipe: &Pipe, nodes: Vec<Node>) -> Result<Vec<Node>> {
        let host = HostObject::new(pipe, Arc::clone(&self.listeners));
        for plugin in &self.plugins {
            plugin
                .call(self, pipe, &host)
                .map_err(|e| Error::Plugin(format!("{} call: {e:#}", plugin.name())))?;
        }

        let batch = nodes.into_script();
        interpreter.call(&host, batch.clone())?;
        let out = Vec::<Node>::from_script(&batch)?;

        for plugin in &self.plugins {
            plugin
                .quit(self, pipe, &host)
                .map_err(|e| Error::Plugin(format!("{} quit: {e:#}", plugin.name())))?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::When;
    use uuid::Uuid;

    fn flow() -> Flow {
        Flow::new([
            Pipe::new(Uuid::from_u128(1))
                .with_name("cats")
                .with_when(When::kind(["cat"])),
            Pipe::new(Uuid::from_u128(2))
                .with_name("dogs")
                .with_when(When::kind(["dog"])),
        ])
    }

    fn kinds(kinds: &[&str]) -> Vec<Node> {
        kinds.iter().map(|k| Node::new().with_kind(*k)).collect()
    }

    #[test]
    fn test_partition_runs() {
        let flow = flow();
        let cats = flow.registry.position("cats").unwrap();
        let dogs = flow.registry.position("dogs").unwrap();
        let runs = flow.partition(&kinds(&["cat", "cat", "dog", "bird", "cat", "cat"]));
        assert_eq!(
            runs,
            vec![
                Run { pipe: cats, range: 0..2 },
                Run { pipe: dogs, range: 2..3 },
                Run { pipe: cats, range: 4..6 },
            ]
        );
    }

    #[test]
    fn test_unmatched_breaks_run() {
        let flow = flow();
        let runs = flow.partition(&kinds(&["cat", "bird", "cat"]));
        assert_eq!(runs.len(), 2);
    }

    #[test]
    fn test_empty_batch() {
        let flow = flow();
        let mut nodes = Vec::new();
        flow.work(&CancelToken::new(), &mut nodes).unwrap();
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_stub_pipes_leave_nodes_alone() {
        let flow = flow();
        let mut nodes = kinds(&["cat", "dog", "bird"]);
        flow.work(&CancelToken::new(), &mut nodes).unwrap();
        assert_eq!(nodes, kinds(&["cat", "dog", "bird"]));
        assert_eq!(flow.idle_interpreters("cats"), 1);
        assert_eq!(flow.idle_interpreters("dogs"), 1);
    }
}
