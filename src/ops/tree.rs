use std::collections::{HashMap, HashSet};

use crate::model::code::compare_codes;
use crate::model::node::{Node, NodeId};

/// Arena index over a flat node list.
///
/// The flat list (with `parent_code` strings) stays the source of truth; the
/// index resolves it once into parent links and code-ordered child lists so
/// traversals cost O(children) instead of rescanning the list.
///
/// Malformed hierarchies never panic or loop:
/// - a `parent_code` that resolves to nothing makes the node an *orphan*
///   (kept in `ordered()`, unreachable from any root, empty breadcrumb);
/// - parent cycles are cut by the ancestor walk's step cap.
///
/// When two nodes share a code, the first one in input order is the one
/// children attach to.
#[derive(Debug)]
pub struct TreeIndex<'a> {
    nodes: &'a [Node],
    by_code: HashMap<&'a str, usize>,
    parent: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
    orphans: Vec<usize>,
    is_orphan: Vec<bool>,
    order: Vec<usize>,
}

impl<'a> TreeIndex<'a> {
    pub fn build(nodes: &'a [Node]) -> Self {
        let mut by_code: HashMap<&'a str, usize> = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            by_code.entry(node.code.as_str()).or_insert(i);
        }

        let mut parent = vec![None; nodes.len()];
        let mut children = vec![Vec::new(); nodes.len()];
        let mut roots = Vec::new();
        let mut orphans = Vec::new();
        let mut is_orphan = vec![false; nodes.len()];

        for (i, node) in nodes.iter().enumerate() {
            match node.parent_code.as_deref() {
                None | Some("") => roots.push(i),
                Some(pc) => match by_code.get(pc) {
                    Some(&p) if p != i => {
                        parent[i] = Some(p);
                        children[p].push(i);
                    }
                    _ => {
                        orphans.push(i);
                        is_orphan[i] = true;
                    }
                },
            }
        }

        let by_code_order = |a: &usize, b: &usize| compare_codes(&nodes[*a].code, &nodes[*b].code);
        for list in &mut children {
            list.sort_by(by_code_order);
        }
        roots.sort_by(by_code_order);
        orphans.sort_by(by_code_order);

        let mut order: Vec<usize> = (0..nodes.len()).collect();
        order.sort_by(by_code_order);

        TreeIndex {
            nodes,
            by_code,
            parent,
            children,
            roots,
            orphans,
            is_orphan,
            order,
        }
    }

    pub fn nodes(&self) -> &'a [Node] {
        self.nodes
    }

    pub fn node(&self, idx: usize) -> &'a Node {
        &self.nodes[idx]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node index in code order (ties keep input order)
    pub fn ordered(&self) -> &[usize] {
        &self.order
    }

    pub fn find_code(&self, code: &str) -> Option<usize> {
        self.by_code.get(code).copied()
    }

    pub fn find_id(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    pub fn parent(&self, idx: usize) -> Option<usize> {
        self.parent[idx]
    }

    /// Direct children in code order
    pub fn children(&self, idx: usize) -> &[usize] {
        &self.children[idx]
    }

    /// Nodes without a `parent_code`
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Nodes whose `parent_code` does not resolve to another node
    pub fn orphans(&self) -> &[usize] {
        &self.orphans
    }

    pub fn is_orphan(&self, idx: usize) -> bool {
        self.is_orphan[idx]
    }

    /// Ancestors of `idx`, nearest first.
    ///
    /// Stops at the first repeated node, so a parent cycle yields a finite
    /// (partial) chain. Cost is bounded by the depth of `idx`.
    pub fn ancestors(&self, idx: usize) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([idx]);
        let mut current = self.parent[idx];
        while let Some(p) = current {
            if !seen.insert(p) {
                break;
            }
            chain.push(p);
            current = self.parent[p];
        }
        chain
    }

    /// Whether `idx` itself lies on a parent cycle.
    ///
    /// A node whose parent chain merely runs into a cycle elsewhere is not
    /// on one.
    pub fn in_cycle(&self, idx: usize) -> bool {
        let mut seen = HashSet::new();
        let mut current = self.parent[idx];
        while let Some(p) = current {
            if p == idx {
                return true;
            }
            if !seen.insert(p) {
                return false;
            }
            current = self.parent[p];
        }
        false
    }

    /// All descendants of `idx` in pre-order (code order within each level).
    ///
    /// Walks the child lists with an explicit stack; a visited set guards
    /// against cycles, so each node is emitted at most once. Cost is bounded
    /// by the size of the subtree.
    pub fn descendants(&self, idx: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut visited = HashSet::from([idx]);
        let mut stack: Vec<usize> = self.children[idx].iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            if !visited.insert(n) {
                continue;
            }
            out.push(n);
            stack.extend(self.children[n].iter().rev().copied());
        }
        out
    }

    /// Task (non-section) descendants of `idx`
    pub fn task_descendants(&self, idx: usize) -> Vec<usize> {
        self.descendants(idx)
            .into_iter()
            .filter(|&d| self.nodes[d].is_task())
            .collect()
    }

    /// Ancestor names from the root down to the direct parent, joined by `sep`.
    /// Orphans and roots get an empty breadcrumb.
    pub fn breadcrumb(&self, idx: usize, sep: &str) -> String {
        let mut names: Vec<&str> = self
            .ancestors(idx)
            .into_iter()
            .map(|a| self.nodes[a].name.as_str())
            .collect();
        names.reverse();
        names.join(sep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Vec<Node> {
        vec![
            Node::task(5, "2.1.3", "Pour", Some("2.1")),
            Node::section(1, "2", "Foundations", None),
            Node::section(2, "2.1", "Slab", Some("2")),
            Node::task(4, "2.1.10", "Cure", Some("2.1")),
            Node::task(6, "2.2", "Backfill", Some("2")),
            Node::section(3, "3", "Frame", None),
            Node::task(7, "3.1", "Columns", Some("3")),
        ]
    }

    fn codes(index: &TreeIndex, idxs: &[usize]) -> Vec<String> {
        idxs.iter().map(|&i| index.node(i).code.clone()).collect()
    }

    #[test]
    fn children_and_order() {
        let nodes = sample();
        let index = TreeIndex::build(&nodes);
        assert_eq!(
            codes(&index, index.ordered()),
            vec!["2", "2.1", "2.1.3", "2.1.10", "2.2", "3", "3.1"]
        );
        let slab = index.find_code("2.1").unwrap();
        assert_eq!(codes(&index, index.children(slab)), vec!["2.1.3", "2.1.10"]);
        assert_eq!(codes(&index, index.roots()), vec!["2", "3"]);
        assert!(index.orphans().is_empty());
    }

    #[test]
    fn ancestors_and_breadcrumb() {
        let nodes = sample();
        let index = TreeIndex::build(&nodes);
        let pour = index.find_code("2.1.3").unwrap();
        assert_eq!(codes(&index, &index.ancestors(pour)), vec!["2.1", "2"]);
        assert_eq!(index.breadcrumb(pour, " / "), "Foundations / Slab");
        let root = index.find_code("2").unwrap();
        assert_eq!(index.breadcrumb(root, " / "), "");
    }

    #[test]
    fn descendants_pre_order() {
        let nodes = sample();
        let index = TreeIndex::build(&nodes);
        let found = index.find_code("2").unwrap();
        assert_eq!(
            codes(&index, &index.descendants(found)),
            vec!["2.1", "2.1.3", "2.1.10", "2.2"]
        );
        assert_eq!(
            codes(&index, &index.task_descendants(found)),
            vec!["2.1.3", "2.1.10", "2.2"]
        );
    }

    #[test]
    fn orphan_is_kept_but_unreachable() {
        let mut nodes = sample();
        nodes.push(Node::task(9, "4.1", "Lost", Some("4")));
        let index = TreeIndex::build(&nodes);
        let lost = index.find_code("4.1").unwrap();
        assert_eq!(index.orphans(), &[lost]);
        assert!(index.is_orphan(lost));
        assert!(index.ordered().contains(&lost));
        assert_eq!(index.breadcrumb(lost, " / "), "");
        for &root in index.roots() {
            assert!(!index.descendants(root).contains(&lost));
        }
    }

    #[test]
    fn cycles_terminate() {
        let nodes = vec![
            Node::section(1, "A", "a", Some("B")),
            Node::section(2, "B", "b", Some("A")),
            Node::task(3, "B.1", "leaf", Some("B")),
        ];
        let index = TreeIndex::build(&nodes);
        let a = index.find_code("A").unwrap();
        let leaf = index.find_code("B.1").unwrap();
        assert_eq!(codes(&index, &index.ancestors(leaf)), vec!["B", "A"]);
        assert!(index.in_cycle(a));
        // Leads into the cycle without being on it
        assert!(!index.in_cycle(leaf));
        assert_eq!(codes(&index, &index.descendants(a)), vec!["B", "B.1"]);
        assert!(index.roots().is_empty());
    }

    #[test]
    fn walks_stay_within_depth_and_subtree() {
        let nodes = sample();
        let index = TreeIndex::build(&nodes);
        let frame = index.find_code("3").unwrap();
        let columns = index.find_code("3.1").unwrap();
        assert_eq!(codes(&index, &index.descendants(frame)), vec!["3.1"]);
        assert_eq!(codes(&index, &index.ancestors(columns)), vec!["3"]);
        assert!(!index.in_cycle(columns));
        assert!(!index.is_orphan(columns));
    }

    #[test]
    fn self_parent_is_orphan() {
        let nodes = vec![Node::section(1, "1", "self", Some("1"))];
        let index = TreeIndex::build(&nodes);
        assert_eq!(index.orphans(), &[0]);
        assert!(index.ancestors(0).is_empty());
    }

    #[test]
    fn duplicate_codes_attach_to_first() {
        let nodes = vec![
            Node::section(1, "1", "first", None),
            Node::section(2, "1", "second", None),
            Node::task(3, "1.1", "leaf", Some("1")),
        ];
        let index = TreeIndex::build(&nodes);
        assert_eq!(index.find_code("1"), Some(0));
        assert_eq!(index.parent(2), Some(0));
        assert_eq!(index.ordered(), &[0, 1, 2]);
    }
}
