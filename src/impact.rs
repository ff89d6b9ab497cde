//! Breadth-first impact traversal
//!
//! Answers "who is affected by changing this function, transitively, up to
//! depth d" over the resolved call graph. A global visited set keeps each
//! node at its shallowest discovery depth, so cycles (self or mutual
//! recursion) terminate and nothing is reported twice.

use std::collections::{HashSet, VecDeque};
use std::str::FromStr;

use crate::ident::NodeId;
use crate::store::{EdgeDirection, GraphStore};
use crate::{Error, Result};

/// Traversal direction for an impact query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow call edges in reverse: who calls the target
    Upstream,
    /// Follow call edges forward: what the target calls
    Downstream,
    /// Both traversals, merged
    Both,
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "upstream" | "callers" => Ok(Self::Upstream),
            "downstream" | "callees" => Ok(Self::Downstream),
            "both" => Ok(Self::Both),
            other => Err(Error::InvalidArgument(format!(
                "direction must be upstream, downstream or both, got '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Upstream => "upstream",
            Self::Downstream => "downstream",
            Self::Both => "both",
        };
        f.write_str(s)
    }
}

/// One affected function in an impact result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpactEntry {
    pub name: String,
    pub file: String,
    pub line: u32,
    /// Which traversal found this node (never `Both`)
    pub direction: Direction,
    /// Hops from the target; always >= 1
    pub depth: u32,
}

/// Read-only impact queries over a graph store
pub struct ImpactAnalyzer<'a> {
    store: &'a GraphStore,
}

impl<'a> ImpactAnalyzer<'a> {
    pub fn new(store: &'a GraphStore) -> Self {
        Self { store }
    }

    /// Transitive impact of the function `name` in `file`.
    ///
    /// Returns every function reachable within `max_depth` call hops,
    /// ordered by depth ascending, then file path, then function name.
    /// `max_depth` of 0 yields an empty result. An unknown target is an
    /// error, distinct from a target with no edges.
    pub fn impact(
        &self,
        file: &str,
        name: &str,
        direction: Direction,
        max_depth: u32,
    ) -> Result<Vec<ImpactEntry>> {
        let seeds: Vec<NodeId> = self
            .store
            .functions_by_key(file, name)?
            .into_iter()
            .map(|f| f.id)
            .collect();
        if seeds.is_empty() {
            return Err(Error::EntityNotFound { file: file.to_string(), name: name.to_string() });
        }
        if max_depth == 0 {
            return Ok(Vec::new());
        }

        let mut entries = match direction {
            Direction::Upstream => self.traverse(&seeds, Direction::Upstream, max_depth)?,
            Direction::Downstream => self.traverse(&seeds, Direction::Downstream, max_depth)?,
            Direction::Both => {
                let mut merged = self.traverse(&seeds, Direction::Upstream, max_depth)?;
                merged.extend(self.traverse(&seeds, Direction::Downstream, max_depth)?);
                merged
            }
        };
        entries.sort_by(|a, b| {
            a.depth
                .cmp(&b.depth)
                .then_with(|| a.file.cmp(&b.file))
                .then_with(|| a.name.cmp(&b.name))
        });
        tracing::debug!(file, name, %direction, max_depth, results = entries.len(), "impact query");
        Ok(entries)
    }

    /// Single-hop impact of a variable: every function that reads it.
    ///
    /// Definition sites do not count as impact; there is no transitive
    /// expansion from the using functions.
    pub fn variable_impact(&self, file: &str, name: &str, line: u32) -> Result<Vec<ImpactEntry>> {
        let Some(var) = self.store.variable_by_key(file, name, line)? else {
            return Err(Error::EntityNotFound { file: file.to_string(), name: name.to_string() });
        };
        let mut entries: Vec<ImpactEntry> = self
            .store
            .variable_uses(&var.id)?
            .into_iter()
            .map(|n| ImpactEntry {
                name: n.name,
                file: n.file,
                line: n.line,
                direction: Direction::Upstream,
                depth: 1,
            })
            .collect();
        entries.sort_by(|a, b| a.file.cmp(&b.file).then_with(|| a.name.cmp(&b.name)));
        entries.dedup_by(|a, b| a.name == b.name && a.file == b.file);
        Ok(entries)
    }

    /// One BFS pass. Nodes enter the visited set at discovery, so a node
    /// found at depth k is never re-enqueued at a deeper level.
    fn traverse(
        &self,
        seeds: &[NodeId],
        direction: Direction,
        max_depth: u32,
    ) -> Result<Vec<ImpactEntry>> {
        let edge_direction = match direction {
            Direction::Upstream => EdgeDirection::Incoming,
            Direction::Downstream => EdgeDirection::Outgoing,
            Direction::Both => unreachable!("both is split before traversal"),
        };
        let mut visited: HashSet<NodeId> = seeds.iter().cloned().collect();
        let mut queue: VecDeque<(NodeId, u32)> = seeds.iter().map(|s| (s.clone(), 0)).collect();
        let mut entries = Vec::new();

        while let Some((id, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for neighbor in self.store.call_adjacent(&id, edge_direction)? {
                if !visited.insert(neighbor.id.clone()) {
                    continue;
                }
                entries.push(ImpactEntry {
                    name: neighbor.name,
                    file: neighbor.file,
                    line: neighbor.line,
                    direction,
                    depth: depth + 1,
                });
                queue.push_back((neighbor.id, depth + 1));
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact::{CallSite, CallTarget, FactBundle, FunctionRecord, UseContext, VarScope, VariableRecord, VariableUse};

    fn function(file: &str, name: &str, line: u32) -> FunctionRecord {
        FunctionRecord {
            name: name.to_string(),
            file: file.to_string(),
            line_start: line,
            line_end: line + 2,
            is_public: true,
            source: None,
            parent_class: None,
        }
    }

    fn call(caller: &str, caller_line: u32, callee_file: &str, callee: &str, line: u32) -> CallSite {
        CallSite {
            caller_name: caller.to_string(),
            caller_line,
            callee: CallTarget::Resolved {
                file: callee_file.to_string(),
                name: callee.to_string(),
                line: 0,
            },
            call_line: line,
        }
    }

    /// a.py:f (lines 1-3) calls b.py:g (lines 1-3)
    fn two_file_store() -> GraphStore {
        let mut store = GraphStore::open_in_memory().unwrap();
        let mut a = FactBundle::empty("a.py", "python", "ha");
        a.functions.push(function("a.py", "f", 1));
        a.calls.push(call("f", 1, "b.py", "g", 2));
        let mut b = FactBundle::empty("b.py", "python", "hb");
        b.functions.push(function("b.py", "g", 1));
        store.replace_file_subgraph(&a).unwrap();
        store.replace_file_subgraph(&b).unwrap();
        store
    }

    #[test]
    fn test_downstream_single_hop() {
        let store = two_file_store();
        let result = ImpactAnalyzer::new(&store).impact("a.py", "f", Direction::Downstream, 5).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "g");
        assert_eq!(result[0].file, "b.py");
        assert_eq!(result[0].depth, 1);
        assert_eq!(result[0].line, 1);
    }

    #[test]
    fn test_upstream_single_hop() {
        let store = two_file_store();
        let result = ImpactAnalyzer::new(&store).impact("b.py", "g", Direction::Upstream, 5).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "f");
        assert_eq!(result[0].file, "a.py");
        assert_eq!(result[0].depth, 1);
    }

    #[test]
    fn test_cycle_emits_each_node_once() {
        // f calls g, g calls back to f
        let mut store = GraphStore::open_in_memory().unwrap();
        let mut a = FactBundle::empty("a.py", "python", "ha");
        a.functions.push(function("a.py", "f", 1));
        a.calls.push(call("f", 1, "b.py", "g", 2));
        let mut b = FactBundle::empty("b.py", "python", "hb");
        b.functions.push(function("b.py", "g", 1));
        b.calls.push(call("g", 1, "a.py", "f", 2));
        store.replace_file_subgraph(&a).unwrap();
        store.replace_file_subgraph(&b).unwrap();

        let result = ImpactAnalyzer::new(&store).impact("a.py", "f", Direction::Downstream, 5).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "g");
        // f is a seed; the cycle must not re-emit it at depth 2.
    }

    #[test]
    fn test_self_recursion_terminates() {
        let mut store = GraphStore::open_in_memory().unwrap();
        let mut a = FactBundle::empty("a.py", "python", "ha");
        a.functions.push(function("a.py", "f", 1));
        a.calls.push(call("f", 1, "a.py", "f", 2));
        store.replace_file_subgraph(&a).unwrap();

        let result = ImpactAnalyzer::new(&store).impact("a.py", "f", Direction::Downstream, 10).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_depth_bound_is_inclusive() {
        // chain: f -> g -> h
        let mut store = GraphStore::open_in_memory().unwrap();
        let mut a = FactBundle::empty("a.py", "python", "ha");
        a.functions.push(function("a.py", "f", 1));
        a.functions.push(function("a.py", "g", 5));
        a.functions.push(function("a.py", "h", 9));
        a.calls.push(call("f", 1, "a.py", "g", 2));
        a.calls.push(call("g", 5, "a.py", "h", 6));
        store.replace_file_subgraph(&a).unwrap();
        let analyzer = ImpactAnalyzer::new(&store);

        let depth1 = analyzer.impact("a.py", "f", Direction::Downstream, 1).unwrap();
        assert_eq!(depth1.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(), ["g"]);

        let depth2 = analyzer.impact("a.py", "f", Direction::Downstream, 2).unwrap();
        assert_eq!(depth2.iter().map(|e| (e.name.as_str(), e.depth)).collect::<Vec<_>>(), [("g", 1), ("h", 2)]);
    }

    #[test]
    fn test_shallowest_depth_wins() {
        // f -> g, f -> h, g -> h: h is reachable at depths 1 and 2.
        let mut store = GraphStore::open_in_memory().unwrap();
        let mut a = FactBundle::empty("a.py", "python", "ha");
        a.functions.push(function("a.py", "f", 1));
        a.functions.push(function("a.py", "g", 5));
        a.functions.push(function("a.py", "h", 9));
        a.calls.push(call("f", 1, "a.py", "g", 2));
        a.calls.push(call("f", 1, "a.py", "h", 3));
        a.calls.push(call("g", 5, "a.py", "h", 6));
        store.replace_file_subgraph(&a).unwrap();

        let result = ImpactAnalyzer::new(&store).impact("a.py", "f", Direction::Downstream, 5).unwrap();
        let h = result.iter().find(|e| e.name == "h").unwrap();
        assert_eq!(h.depth, 1);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_ordering_depth_then_file_then_name() {
        let mut store = GraphStore::open_in_memory().unwrap();
        let mut a = FactBundle::empty("a.py", "python", "ha");
        a.functions.push(function("a.py", "f", 1));
        a.calls.push(call("f", 1, "z.py", "zeta", 2));
        a.calls.push(call("f", 1, "b.py", "beta", 3));
        a.calls.push(call("f", 1, "b.py", "alpha", 4));
        store.replace_file_subgraph(&a).unwrap();
        let mut b = FactBundle::empty("b.py", "python", "hb");
        b.functions.push(function("b.py", "beta", 1));
        b.functions.push(function("b.py", "alpha", 5));
        store.replace_file_subgraph(&b).unwrap();
        let mut z = FactBundle::empty("z.py", "python", "hz");
        z.functions.push(function("z.py", "zeta", 1));
        store.replace_file_subgraph(&z).unwrap();

        let result = ImpactAnalyzer::new(&store).impact("a.py", "f", Direction::Downstream, 1).unwrap();
        let keys: Vec<(&str, &str)> =
            result.iter().map(|e| (e.file.as_str(), e.name.as_str())).collect();
        assert_eq!(keys, [("b.py", "alpha"), ("b.py", "beta"), ("z.py", "zeta")]);
    }

    #[test]
    fn test_both_merges_directions() {
        // caller -> f -> callee
        let mut store = GraphStore::open_in_memory().unwrap();
        let mut a = FactBundle::empty("a.py", "python", "ha");
        a.functions.push(function("a.py", "caller", 1));
        a.functions.push(function("a.py", "f", 5));
        a.functions.push(function("a.py", "callee", 9));
        a.calls.push(call("caller", 1, "a.py", "f", 2));
        a.calls.push(call("f", 5, "a.py", "callee", 6));
        store.replace_file_subgraph(&a).unwrap();

        let result = ImpactAnalyzer::new(&store).impact("a.py", "f", Direction::Both, 5).unwrap();
        assert_eq!(result.len(), 2);
        let caller = result.iter().find(|e| e.name == "caller").unwrap();
        assert_eq!(caller.direction, Direction::Upstream);
        let callee = result.iter().find(|e| e.name == "callee").unwrap();
        assert_eq!(callee.direction, Direction::Downstream);
    }

    #[test]
    fn test_missing_target_is_an_error() {
        let store = two_file_store();
        let err = ImpactAnalyzer::new(&store).impact("a.py", "nope", Direction::Downstream, 5).unwrap_err();
        match err {
            Error::EntityNotFound { file, name } => {
                assert_eq!(file, "a.py");
                assert_eq!(name, "nope");
            }
            other => panic!("expected EntityNotFound, got {other}"),
        }
    }

    #[test]
    fn test_zero_depth_is_empty_not_error() {
        let store = two_file_store();
        let result = ImpactAnalyzer::new(&store).impact("a.py", "f", Direction::Downstream, 0).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_unresolved_edges_are_not_traversed() {
        let mut store = GraphStore::open_in_memory().unwrap();
        let mut a = FactBundle::empty("a.py", "python", "ha");
        a.functions.push(function("a.py", "f", 1));
        a.calls.push(CallSite {
            caller_name: "f".to_string(),
            caller_line: 1,
            callee: CallTarget::Unresolved { name: "dynamic".to_string() },
            call_line: 2,
        });
        store.replace_file_subgraph(&a).unwrap();

        let result = ImpactAnalyzer::new(&store).impact("a.py", "f", Direction::Downstream, 5).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!("upstream".parse::<Direction>().unwrap(), Direction::Upstream);
        assert_eq!("downstream".parse::<Direction>().unwrap(), Direction::Downstream);
        assert_eq!("both".parse::<Direction>().unwrap(), Direction::Both);
        assert!(matches!("sideways".parse::<Direction>(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_variable_impact_is_use_only_single_hop() {
        let mut store = GraphStore::open_in_memory().unwrap();
        let mut a = FactBundle::empty("a.py", "python", "ha");
        a.functions.push(function("a.py", "reader", 1));
        a.functions.push(function("a.py", "writer", 5));
        a.functions.push(function("a.py", "outer", 9));
        a.variables.push(VariableRecord {
            name: "state".to_string(),
            file: "a.py".to_string(),
            line: 20,
            scope: VarScope::Module,
        });
        a.variable_uses.push(VariableUse {
            function_name: "reader".to_string(),
            function_line: 1,
            variable_name: "state".to_string(),
            variable_line: 20,
            line: 2,
            context: UseContext::Use,
        });
        a.variable_uses.push(VariableUse {
            function_name: "writer".to_string(),
            function_line: 5,
            variable_name: "state".to_string(),
            variable_line: 20,
            line: 6,
            context: UseContext::Define,
        });
        // outer calls reader, but variable impact never follows call edges.
        a.calls.push(call("outer", 9, "a.py", "reader", 10));
        store.replace_file_subgraph(&a).unwrap();

        let result = ImpactAnalyzer::new(&store).variable_impact("a.py", "state", 20).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "reader");
        assert_eq!(result[0].depth, 1);

        let err = ImpactAnalyzer::new(&store).variable_impact("a.py", "missing", 1).unwrap_err();
        assert!(matches!(err, Error::EntityNotFound { .. }));
    }
}
