use crate::types::{ProcessFact, ProcessNode};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Slot {
    name: String,
    pid: u32,
    parent_id: Option<u32>,
    children: Vec<usize>,
}

/// Process forest stored as an arena of nodes addressed by pid.
///
/// Nodes are only ever appended, and a node's children only ever grow.
#[derive(Debug, Clone, Default)]
pub struct ProcessTree {
    slots: Vec<Slot>,
    roots: Vec<usize>,
    by_pid: HashMap<u32, usize>,
}

impl ProcessTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the forest from facts in stream order.
    ///
    /// Parentless facts become roots first. Every other fact is attached under
    /// the node carrying its parent pid; if no such node is in the tree yet it
    /// becomes a root that keeps its unresolved `parent_id`. Attachment is a
    /// single forward pass with no retries.
    pub fn from_facts<I>(facts: I) -> Self
    where
        I: IntoIterator<Item = ProcessFact>,
    {
        let (roots, candidates): (Vec<ProcessFact>, Vec<ProcessFact>) =
            facts.into_iter().partition(|fact| fact.parent.is_none());

        let mut tree = Self::new();
        for fact in roots {
            tree.insert_root(fact.name, fact.pid, None);
        }
        for fact in candidates {
            tree.attach(fact);
        }
        tree
    }

    fn push(&mut self, name: String, pid: u32, parent_id: Option<u32>) -> usize {
        let idx = self.slots.len();
        self.slots.push(Slot {
            name,
            pid,
            parent_id,
            children: Vec::new(),
        });
        // With duplicate pids, the first node inserted stays the lookup target.
        self.by_pid.entry(pid).or_insert(idx);
        idx
    }

    fn insert_root(&mut self, name: String, pid: u32, parent_id: Option<u32>) {
        let idx = self.push(name, pid, parent_id);
        self.roots.push(idx);
    }

    /// Attach a fact under its parent, or as an unresolved root.
    /// Returns whether the parent was found.
    pub fn attach(&mut self, fact: ProcessFact) -> bool {
        let Some(parent_pid) = fact.parent else {
            self.insert_root(fact.name, fact.pid, None);
            return true;
        };

        match self.by_pid.get(&parent_pid).copied() {
            Some(parent_idx) => {
                let idx = self.push(fact.name, fact.pid, Some(parent_pid));
                self.slots[parent_idx].children.push(idx);
                true
            }
            None => {
                self.insert_root(fact.name, fact.pid, Some(parent_pid));
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.by_pid.contains_key(&pid)
    }

    /// Pids of the top-level nodes, in insertion order
    pub fn root_pids(&self) -> Vec<u32> {
        self.roots.iter().map(|&idx| self.slots[idx].pid).collect()
    }

    /// Materialize the nested forest
    pub fn into_forest(self) -> Vec<ProcessNode> {
        self.roots.iter().map(|&idx| self.materialize(idx)).collect()
    }

    fn materialize(&self, idx: usize) -> ProcessNode {
        let slot = &self.slots[idx];
        ProcessNode {
            name: slot.name.clone(),
            pid: slot.pid,
            parent_id: slot.parent_id,
            children: slot
                .children
                .iter()
                .map(|&child| self.materialize(child))
                .collect(),
        }
    }
}

/// Build the process forest from an ordered fact stream
pub fn build_tree<I>(facts: I) -> Vec<ProcessNode>
where
    I: IntoIterator<Item = ProcessFact>,
{
    ProcessTree::from_facts(facts).into_forest()
}
