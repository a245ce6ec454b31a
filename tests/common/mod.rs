//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use pipeflow::{CancelToken, Flow, Node};

/// Run `nodes` through `flow` with a fresh token, panicking on error
pub fn work(flow: &Flow, mut nodes: Vec<Node>) -> Vec<Node> {
    flow.work(&CancelToken::new(), &mut nodes)
        .expect("flow work failed");
    nodes
}

/// Kind of every Node, `None` where unset or explicitly absent
pub fn kinds(nodes: &[Node]) -> Vec<Option<&str>> {
    nodes.iter().map(|n| n.kind.get().map(String::as_str)).collect()
}
