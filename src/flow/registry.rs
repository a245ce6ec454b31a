//! The ordered pipe stock and its lookup indices.

use crate::model::{Node, Pipe};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

const UUID_WEIGHT: i64 = 1_000_000;
const KIND_WEIGHT: i64 = 100_000;
const HOOK_WEIGHT: i64 = 10_000;
const CATCH_ALL_WEIGHT: i64 = 1_000;

/// Pipes in dispatch order, plus the reachability chain of each.
#[derive(Debug, Default)]
pub struct Registry {
    stock: Vec<Pipe>,
    by_uuid: HashMap<Uuid, usize>,
    by_name: HashMap<String, usize>,
    chains: Vec<Vec<usize>>,
}

impl Registry {
    pub fn new(pipes: impl IntoIterator<Item = Pipe>) -> Self {
        let mut seen = HashSet::new();
        let mut stock: Vec<Pipe> = Vec::new();
        for pipe in pipes {
            if seen.insert(pipe.uuid) {
                stock.push(pipe);
            } else {
                tracing::debug!(pipe = %pipe.label(), "dropping duplicate pipe");
            }
        }

        let scores = priorities(&stock);
        stock.sort_by_key(|pipe| Reverse(scores[&pipe.uuid]));

        let mut by_uuid = HashMap::new();
        let mut by_name = HashMap::new();
        for (i, pipe) in stock.iter().enumerate() {
            by_uuid.insert(pipe.uuid, i);
            if let Some(name) = pipe.name.get() {
                by_name.entry(name.clone()).or_insert(i);
            }
        }

        let chains = (0..stock.len())
            .map(|i| reachable(&stock, &by_uuid, i))
            .collect();

        Self {
            stock,
            by_uuid,
            by_name,
            chains,
        }
    }

    /// Pipes in dispatch order.
    pub fn pipes(&self) -> &[Pipe] {
        &self.stock
    }

    pub fn get(&self, index: usize) -> Option<&Pipe> {
        self.stock.get(index)
    }

    pub fn len(&self) -> usize {
        self.stock.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stock.is_empty()
    }

    /// Position of a pipe given its UUID string or its name.
    pub fn position(&self, key: &str) -> Option<usize> {
        if let Ok(uuid) = Uuid::parse_str(key) {
            if let Some(i) = self.by_uuid.get(&uuid) {
                return Some(*i);
            }
        }
        self.by_name.get(key).copied()
    }

    pub fn lookup(&self, key: &str) -> Option<&Pipe> {
        self.position(key).map(|i| &self.stock[i])
    }

    /// The pipe at `index` followed by every pipe reachable through `next`.
    pub fn chain(&self, index: usize) -> impl Iterator<Item = &Pipe> {
        self.chains
            .get(index)
            .into_iter()
            .flatten()
            .map(|i| &self.stock[*i])
    }

    /// First pipe in dispatch order whose `when` accepts `node`.
    pub fn matching(&self, node: &Node) -> Option<usize> {
        self.stock
            .iter()
            .position(|pipe| pipe.when.get().is_some_and(|when| node.when(when)))
    }
}

/// Dispatch score per pipe: specific predicates first, pipes that others
/// continue into last.
fn priorities(stock: &[Pipe]) -> HashMap<Uuid, i64> {
    let mut scores: HashMap<Uuid, i64> = stock
        .iter()
        .map(|pipe| {
            let mut score = 0;
            if let Some(when) = pipe.when.get() {
                if !when.uuid.is_unset() {
                    score += UUID_WEIGHT;
                }
                if !when.kind.is_unset() {
                    score += KIND_WEIGHT;
                }
                if !when.hook.is_unset() {
                    score += HOOK_WEIGHT;
                }
                if when.is_zero() {
                    score += CATCH_ALL_WEIGHT;
                }
            }
            (pipe.uuid, score)
        })
        .collect();

    for next in stock.iter().filter_map(|pipe| pipe.next.get()) {
        for uuid in next {
            if let Some(score) = scores.get_mut(uuid) {
                *score -= 1;
            }
        }
    }
    scores
}

/// Breadth-first walk over `next`, each pipe visited once.
fn reachable(stock: &[Pipe], by_uuid: &HashMap<Uuid, usize>, start: usize) -> Vec<usize> {
    let mut visited = HashSet::from([stock[start].uuid]);
    let mut order = vec![start];
    let mut cursor = 0;
    while cursor < order.len() {
        if let Some(next) = stock[order[cursor]].next.get() {
            for uuid in next {
                if visited.insert(*uuid) {
                    if let Some(i) = by_uuid.get(uuid) {
                        order.push(*i);
                    }
                }
            }
        }
        cursor += 1;
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Hook, When};

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn names(registry: &Registry) -> Vec<String> {
        registry.pipes().iter().map(Pipe::label).collect()
    }

    #[test]
    fn test_priority_order() {
        let d = Pipe::new(id(4)).with_name("D");
        let c = Pipe::new(id(3)).with_name("C").with_when(When::any());
        let b = Pipe::new(id(2))
            .with_name("B")
            .with_when(When::hook([Hook::new().set("kind", "cat")]));
        let a = Pipe::new(id(1)).with_name("A").with_when(When::uuid([id(9)]));
        let registry = Registry::new([d, c, b, a]);
        assert_eq!(names(&registry), ["A", "B", "C", "D"]);
    }

    #[test]
    fn test_continuations_sink() {
        let first = Pipe::new(id(1))
            .with_name("first")
            .with_when(When::any())
            .with_next([id(2)]);
        let second = Pipe::new(id(2)).with_name("second").with_when(When::any());
        let registry = Registry::new([second, first]);
        assert_eq!(names(&registry), ["first", "second"]);
    }

    #[test]
    fn test_stable_among_equal_scores() {
        let pipes: Vec<Pipe> = (1..=5)
            .map(|n| Pipe::new(id(n)).with_name(n.to_string()).with_when(When::any()))
            .collect();
        let registry = Registry::new(pipes);
        assert_eq!(names(&registry), ["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_dedup_first_wins() {
        let registry = Registry::new([
            Pipe::new(id(1)).with_name("kept"),
            Pipe::new(id(1)).with_name("dropped"),
        ]);
        assert_eq!(names(&registry), ["kept"]);
        assert!(registry.lookup("dropped").is_none());
    }

    #[test]
    fn test_lookup_by_uuid_and_name() {
        let registry = Registry::new([
            Pipe::new(id(1)).with_name("dup"),
            Pipe::new(id(2)).with_name("dup"),
        ]);
        assert_eq!(registry.lookup("dup").unwrap().uuid, id(1));
        assert_eq!(registry.lookup(&id(2).to_string()).unwrap().uuid, id(2));
        assert!(registry.lookup("missing").is_none());
    }

    #[test]
    fn test_chain_is_breadth_first_and_cycle_safe() {
        let registry = Registry::new([
            Pipe::new(id(1)).with_name("f1").with_next([id(2), id(3)]),
            Pipe::new(id(2)).with_name("f2").with_next([id(5), id(1)]),
            Pipe::new(id(3)).with_name("f3").with_next([id(5), id(2)]),
            Pipe::new(id(5)).with_name("f5").with_next([id(1), id(404)]),
        ]);
        let start = registry.position("f1").unwrap();
        let chain: Vec<String> = registry.chain(start).map(Pipe::label).collect();
        assert_eq!(chain, ["f1", "f2", "f3", "f5"]);
    }

    #[test]
    fn test_matching_skips_pipes_without_when() {
        let registry = Registry::new([
            Pipe::new(id(1)).with_name("hidden"),
            Pipe::new(id(2)).with_name("cats").with_when(When::kind(["cat"])),
        ]);
        let cat = Node::new().with_kind("cat");
        let dog = Node::new().with_kind("dog");
        assert_eq!(registry.matching(&cat), registry.position("cats"));
        assert_eq!(registry.matching(&dog), None);
    }
}
