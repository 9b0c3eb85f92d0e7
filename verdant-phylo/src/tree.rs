//! Rooted binary phylogenetic tree with node heights.
//!
//! Uses arena-style storage: nodes live in a flat `Vec<Node>` and are
//! referenced by `NodeId` (a `usize` index). Leaves occupy ids `0..L` and
//! internal nodes `L..2L-1`, so a node's kind is fixed for the lifetime of the
//! tree while its parent and children change under topology edits.
//!
//! Every edit ([`Tree::update_weight`], [`Tree::update_edge`],
//! [`Tree::swap_parents`]) is recorded in a journal. [`Tree::accept`] commits
//! the journal and [`Tree::reject`] replays it backwards, restoring heights
//! and edges exactly.

use serde::{Deserialize, Serialize};
use verdant_core::{Result, VerdantError};
use verdant_stats::Rng;

/// Index into the tree's node arena.
pub type NodeId = usize;

/// Index of a parent-to-child edge: `2 * (parent - L) + slot`, where `slot`
/// is 0 for the left child and 1 for the right one.
pub type EdgeIndex = usize;

/// A single node in a phylogenetic tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    id: NodeId,
    height: f64,
    parent: Option<NodeId>,
    children: Option<[NodeId; 2]>,
    label: Option<String>,
}

impl Node {
    /// Index of this node in the arena.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Height (time before present) of the node.
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Parent node (None for root).
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Left and right children (None for leaves).
    pub fn children(&self) -> Option<[NodeId; 2]> {
        self.children
    }

    /// Taxon label; only leaves carry one.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// True if this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// True if this node has no parent.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

#[derive(Debug, Clone, Copy)]
enum Edit {
    Height {
        node: NodeId,
        old: f64,
    },
    Edge {
        parent: NodeId,
        slot: usize,
        old_child: NodeId,
        new_child: NodeId,
        new_child_old_parent: Option<NodeId>,
    },
}

/// A rooted, strictly binary phylogenetic tree stored as an arena of nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
    #[serde(skip)]
    journal: Vec<Edit>,
}

const NEWICK_RESERVED: &[char] = &['(', ')', ',', ':', ';', ' ', '\t', '\n', '\r'];

fn check_taxa(taxa: &[String]) -> Result<()> {
    if taxa.len() < 2 {
        return Err(VerdantError::InvalidInput(format!(
            "a tree needs at least 2 taxa, got {}",
            taxa.len()
        )));
    }
    for name in taxa {
        if name.is_empty() || name.contains(NEWICK_RESERVED) {
            return Err(VerdantError::InvalidInput(format!(
                "invalid taxon label '{name}'"
            )));
        }
    }
    let mut sorted: Vec<&String> = taxa.iter().collect();
    sorted.sort();
    if sorted.windows(2).any(|w| w[0] == w[1]) {
        return Err(VerdantError::InvalidInput("duplicate taxon labels".into()));
    }
    Ok(())
}

impl Tree {
    /// Build a random tree over `taxa`.
    ///
    /// Leaves sit at height 0. Lineages are joined pairwise at random, each
    /// join placed above the previous one after an exponential waiting time
    /// with the coalescent rate `n(n-1)/2`, so internal heights strictly
    /// increase towards the root.
    pub fn random(taxa: Vec<String>, rng: &mut Rng) -> Result<Self> {
        check_taxa(&taxa)?;
        let num_leaves = taxa.len();

        let mut nodes: Vec<Node> = taxa
            .into_iter()
            .enumerate()
            .map(|(id, label)| Node {
                id,
                height: 0.0,
                parent: None,
                children: None,
                label: Some(label),
            })
            .collect();

        let mut active: Vec<NodeId> = (0..num_leaves).collect();
        let mut height = 0.0;
        while active.len() > 1 {
            let n = active.len();
            let rate = (n * (n - 1)) as f64 / 2.0;
            height += -(1.0 - rng.uniform()).ln() / rate;

            let i = rng.int(n);
            let mut j = rng.int(n - 1);
            if j >= i {
                j += 1;
            }
            let (left, right) = (active[i], active[j]);

            let id = nodes.len();
            nodes.push(Node {
                id,
                height,
                parent: None,
                children: Some([left, right]),
                label: None,
            });
            nodes[left].parent = Some(id);
            nodes[right].parent = Some(id);

            active.retain(|&a| a != left && a != right);
            active.push(id);
        }

        let root = nodes.len() - 1;
        let tree = Self {
            nodes,
            root,
            journal: Vec::new(),
        };
        tree.verify()?;
        Ok(tree)
    }

    /// Build a tree from explicit taxa, heights and topology.
    ///
    /// `heights` holds one value per node (leaves first, then internals) and
    /// `children[k]` lists the two children of internal node `L + k`.
    pub fn from_parts(
        taxa: Vec<String>,
        heights: &[f64],
        children: &[(NodeId, NodeId)],
    ) -> Result<Self> {
        check_taxa(&taxa)?;
        let num_leaves = taxa.len();
        let num_nodes = 2 * num_leaves - 1;
        if heights.len() != num_nodes {
            return Err(VerdantError::InvalidInput(format!(
                "expected {} heights, got {}",
                num_nodes,
                heights.len()
            )));
        }
        if children.len() != num_leaves - 1 {
            return Err(VerdantError::InvalidInput(format!(
                "expected {} internal nodes, got {}",
                num_leaves - 1,
                children.len()
            )));
        }

        let mut nodes: Vec<Node> = (0..num_nodes)
            .map(|id| Node {
                id,
                height: heights[id],
                parent: None,
                children: None,
                label: None,
            })
            .collect();
        for (node, label) in nodes.iter_mut().zip(taxa) {
            node.label = Some(label);
        }
        for (k, &(left, right)) in children.iter().enumerate() {
            let id = num_leaves + k;
            for child in [left, right] {
                if child >= num_nodes {
                    return Err(VerdantError::InvalidInput(format!(
                        "child index {child} out of range ({num_nodes})"
                    )));
                }
                if nodes[child].parent.is_some() {
                    return Err(VerdantError::InvalidInput(format!(
                        "node {child} has more than one parent"
                    )));
                }
                nodes[child].parent = Some(id);
            }
            nodes[id].children = Some([left, right]);
        }

        let roots: Vec<NodeId> = nodes
            .iter()
            .filter(|n| n.parent.is_none())
            .map(|n| n.id)
            .collect();
        let &[root] = roots.as_slice() else {
            return Err(VerdantError::InvalidInput(format!(
                "expected exactly one root, found {}",
                roots.len()
            )));
        };

        let tree = Self {
            nodes,
            root,
            journal: Vec::new(),
        };
        tree.verify()?;
        Ok(tree)
    }

    /// Parse a Newick format string into a tree.
    pub fn from_newick(input: &str) -> Result<Self> {
        crate::newick::parse(input)
    }

    /// Serialize the tree to a Newick format string.
    pub fn newick(&self) -> String {
        crate::newick::write(self)
    }

    /// Access a node by id.
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// The root node id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Total number of nodes (`2L - 1`).
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of leaves.
    pub fn num_leaves(&self) -> usize {
        (self.nodes.len() + 1) / 2
    }

    /// Number of internal nodes, the root included.
    pub fn num_internals(&self) -> usize {
        self.nodes.len() - self.num_leaves()
    }

    pub fn is_leaf(&self, node: NodeId) -> bool {
        node < self.num_leaves()
    }

    pub fn is_internal(&self, node: NodeId) -> bool {
        node >= self.num_leaves()
    }

    pub fn is_root(&self, node: NodeId) -> bool {
        node == self.root
    }

    /// All node ids.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> {
        0..self.num_nodes()
    }

    /// All leaf ids.
    pub fn leaves(&self) -> impl Iterator<Item = NodeId> {
        0..self.num_leaves()
    }

    /// All internal node ids, the root included.
    pub fn internals(&self) -> impl Iterator<Item = NodeId> {
        self.num_leaves()..self.num_nodes()
    }

    pub fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].parent
    }

    /// Children of `node`, or `None` for a leaf.
    pub fn children_of(&self, node: NodeId) -> Option<(NodeId, NodeId)> {
        self.nodes[node].children.map(|[l, r]| (l, r))
    }

    /// The other child of `node`'s parent.
    pub fn sibling_of(&self, node: NodeId) -> Option<NodeId> {
        let (left, right) = self.children_of(self.parent_of(node)?)?;
        Some(if left == node { right } else { left })
    }

    /// Node height.
    pub fn weight_of(&self, node: NodeId) -> f64 {
        self.nodes[node].height
    }

    pub fn label_of(&self, node: NodeId) -> Option<&str> {
        self.nodes[node].label()
    }

    /// Sorted list of leaf labels.
    pub fn leaf_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .leaves()
            .filter_map(|id| self.nodes[id].label.clone())
            .collect();
        names.sort();
        names
    }

    /// True if `ancestor` lies on the path from `node` to the root
    /// (a node counts as its own ancestor).
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.nodes[id].parent;
        }
        false
    }

    /// Uniformly random node.
    pub fn random_node(&self, rng: &mut Rng) -> NodeId {
        rng.int(self.num_nodes())
    }

    /// Uniformly random internal node, the root included.
    pub fn random_internal(&self, rng: &mut Rng) -> NodeId {
        self.num_leaves() + rng.int(self.num_internals())
    }

    /// Index of the edge leading into `node`, or `None` for the root.
    pub fn edge_index(&self, node: NodeId) -> Option<EdgeIndex> {
        let parent = self.nodes[node].parent?;
        let [left, _] = self.nodes[parent].children?;
        let slot = usize::from(left != node);
        Some(2 * (parent - self.num_leaves()) + slot)
    }

    /// Parent end of an edge.
    pub fn edge_parent(&self, edge: EdgeIndex) -> NodeId {
        self.num_leaves() + edge / 2
    }

    /// Child end of an edge.
    pub fn edge_child(&self, edge: EdgeIndex) -> Option<NodeId> {
        let [left, right] = self.nodes[self.edge_parent(edge)].children?;
        Some(if edge % 2 == 0 { left } else { right })
    }

    /// Set the height of `node`.
    pub fn update_weight(&mut self, node: NodeId, height: f64) {
        let old = self.nodes[node].height;
        self.journal.push(Edit::Height { node, old });
        self.nodes[node].height = height;
    }

    /// Re-point `edge` at `new_child`.
    ///
    /// The previous child keeps a stale parent pointer until another edit
    /// re-attaches it, so topology moves are composed of several calls and
    /// only the final tree is required to be consistent.
    pub fn update_edge(&mut self, edge: EdgeIndex, new_child: NodeId) -> Result<()> {
        let parent = self.edge_parent(edge);
        if parent >= self.num_nodes() || new_child >= self.num_nodes() {
            return Err(VerdantError::InvalidInput(format!(
                "edge {edge} or node {new_child} out of range"
            )));
        }
        let slot = edge % 2;
        let Some(mut children) = self.nodes[parent].children else {
            return Err(VerdantError::Invariant(format!(
                "internal node {parent} has no children"
            )));
        };
        let old_child = children[slot];
        self.journal.push(Edit::Edge {
            parent,
            slot,
            old_child,
            new_child,
            new_child_old_parent: self.nodes[new_child].parent,
        });
        children[slot] = new_child;
        self.nodes[parent].children = Some(children);
        self.nodes[new_child].parent = Some(parent);
        Ok(())
    }

    /// Exchange the subtrees rooted at `a` and `b`: `a` is attached where `b`
    /// was and vice versa.
    pub fn swap_parents(&mut self, a: NodeId, b: NodeId) -> Result<()> {
        if self.is_ancestor(a, b) || self.is_ancestor(b, a) {
            return Err(VerdantError::InvalidInput(format!(
                "cannot swap related nodes {a} and {b}"
            )));
        }
        let (Some(edge_a), Some(edge_b)) = (self.edge_index(a), self.edge_index(b)) else {
            return Err(VerdantError::InvalidInput(
                "cannot swap the root with another node".into(),
            ));
        };
        self.update_edge(edge_a, b)?;
        self.update_edge(edge_b, a)
    }

    /// True if edits were made since the last [`accept`](Self::accept) or
    /// [`reject`](Self::reject).
    pub fn is_dirty(&self) -> bool {
        !self.journal.is_empty()
    }

    /// Commit all edits made since the last accept/reject.
    pub fn accept(&mut self) {
        self.journal.clear();
    }

    /// Undo all edits made since the last accept/reject.
    pub fn reject(&mut self) {
        while let Some(edit) = self.journal.pop() {
            match edit {
                Edit::Height { node, old } => self.nodes[node].height = old,
                Edit::Edge {
                    parent,
                    slot,
                    old_child,
                    new_child,
                    new_child_old_parent,
                } => {
                    if let Some(children) = self.nodes[parent].children.as_mut() {
                        children[slot] = old_child;
                    }
                    self.nodes[new_child].parent = new_child_old_parent;
                }
            }
        }
    }

    /// Check every structural invariant: one root, parent/child pointers
    /// agree, leaves and internals in their id ranges, the graph is a single
    /// connected tree, heights are finite, non-negative and never exceed the
    /// parent's height.
    pub fn verify(&self) -> Result<()> {
        let num_nodes = self.nodes.len();
        let num_leaves = self.num_leaves();
        let fail = |msg: String| Err(VerdantError::Invariant(msg));

        if num_nodes < 3 || num_nodes % 2 == 0 {
            return fail(format!("{num_nodes} nodes cannot form a binary tree"));
        }
        if self.root >= num_nodes {
            return fail(format!("root {} out of range", self.root));
        }
        if self.nodes[self.root].parent.is_some() {
            return fail(format!("root {} has a parent", self.root));
        }

        for (id, node) in self.nodes.iter().enumerate() {
            if node.id != id {
                return fail(format!("node at slot {id} claims id {}", node.id));
            }
            if !node.height.is_finite() || node.height < 0.0 {
                return fail(format!("node {id} has height {}", node.height));
            }
            match (id < num_leaves, node.children) {
                (true, Some(_)) => return fail(format!("leaf {id} has children")),
                (false, None) => return fail(format!("internal node {id} has no children")),
                (false, Some([l, r])) => {
                    if l == r {
                        return fail(format!("node {id} lists child {l} twice"));
                    }
                    for child in [l, r] {
                        if child >= num_nodes {
                            return fail(format!("node {id} has child {child} out of range"));
                        }
                        if self.nodes[child].parent != Some(id) {
                            return fail(format!(
                                "child {child} of {id} points to parent {:?}",
                                self.nodes[child].parent
                            ));
                        }
                        if self.nodes[child].height > node.height {
                            return fail(format!(
                                "child {child} ({}) is above its parent {id} ({})",
                                self.nodes[child].height, node.height
                            ));
                        }
                    }
                }
                (true, None) => {}
            }
            if id != self.root && node.parent.is_none() {
                return fail(format!("node {id} is a second root"));
            }
        }

        let mut seen = vec![false; num_nodes];
        let mut stack = vec![self.root];
        let mut count = 0;
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id], true) {
                return fail(format!("node {id} reached twice"));
            }
            count += 1;
            if let Some([l, r]) = self.nodes[id].children {
                stack.push(l);
                stack.push(r);
            }
        }
        if count != num_nodes {
            return fail(format!("only {count} of {num_nodes} nodes reachable from the root"));
        }
        Ok(())
    }

    pub(crate) fn from_verified_nodes(nodes: Vec<Node>, root: NodeId) -> Result<Self> {
        let tree = Self {
            nodes,
            root,
            journal: Vec::new(),
        };
        tree.verify()?;
        Ok(tree)
    }

    pub(crate) fn new_node(
        id: NodeId,
        height: f64,
        children: Option<[NodeId; 2]>,
        label: Option<String>,
    ) -> Node {
        Node {
            id,
            height,
            parent: None,
            children,
            label,
        }
    }

    pub(crate) fn link_parents(nodes: &mut [Node]) {
        for id in 0..nodes.len() {
            if let Some([l, r]) = nodes[id].children {
                nodes[l].parent = Some(id);
                nodes[r].parent = Some(id);
            }
        }
    }
}

/// Structural equality: same heights, labels and edges. The journal is ignored.
impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root && self.nodes == other.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taxa(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("t{i}")).collect()
    }

    // ((A:1,B:1):2,(C:2,D:2):1);
    fn sample_tree() -> Tree {
        Tree::from_parts(
            vec!["A".into(), "B".into(), "C".into(), "D".into()],
            &[0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0],
            &[(0, 1), (2, 3), (4, 5)],
        )
        .unwrap()
    }

    #[test]
    fn counts_and_kinds() {
        let tree = sample_tree();
        assert_eq!(tree.num_nodes(), 7);
        assert_eq!(tree.num_leaves(), 4);
        assert_eq!(tree.num_internals(), 3);
        assert_eq!(tree.root(), 6);
        assert!(tree.is_leaf(3));
        assert!(tree.is_internal(4));
        assert_eq!(tree.parent_of(0), Some(4));
        assert_eq!(tree.parent_of(6), None);
        assert_eq!(tree.children_of(6), Some((4, 5)));
        assert_eq!(tree.children_of(2), None);
        assert_eq!(tree.sibling_of(4), Some(5));
        assert_eq!(tree.label_of(2), Some("C"));
    }

    #[test]
    fn random_tree_is_well_formed() {
        let mut rng = Rng::seeded(7);
        for n in 2..20 {
            let tree = Tree::random(taxa(n), &mut rng).unwrap();
            tree.verify().unwrap();
            assert_eq!(tree.num_nodes(), 2 * n - 1);
            assert_eq!(tree.leaf_names().len(), n);
            assert!(tree.leaves().all(|l| tree.weight_of(l) == 0.0));
        }
    }

    #[test]
    fn from_parts_rejects_bad_shapes() {
        let t = || vec!["A".to_string(), "B".to_string(), "C".to_string()];
        assert!(Tree::from_parts(t(), &[0.0; 4], &[(0, 1), (3, 2)]).is_err());
        // two roots
        assert!(Tree::from_parts(t(), &[0.0, 0.0, 0.0, 1.0, 2.0], &[(0, 1), (0, 2)]).is_err());
        // child above parent
        assert!(Tree::from_parts(t(), &[0.0, 0.0, 0.0, 3.0, 2.0], &[(0, 1), (3, 2)]).is_err());
        assert!(Tree::from_parts(vec!["A".into()], &[0.0], &[]).is_err());
        assert!(Tree::from_parts(vec!["A".into(), "A".into()], &[0.0, 0.0, 1.0], &[(0, 1)]).is_err());
    }

    #[test]
    fn edges_round_trip() {
        let tree = sample_tree();
        for node in tree.nodes().filter(|&n| n != tree.root()) {
            let edge = tree.edge_index(node).unwrap();
            assert_eq!(tree.edge_child(edge), Some(node));
            assert_eq!(Some(tree.edge_parent(edge)), tree.parent_of(node));
        }
        assert_eq!(tree.edge_index(tree.root()), None);
    }

    #[test]
    fn swap_parents_and_reject() {
        let mut tree = sample_tree();
        let original = tree.clone();
        tree.swap_parents(1, 2).unwrap();
        tree.verify().unwrap();
        assert_eq!(tree.parent_of(1), Some(5));
        assert_eq!(tree.parent_of(2), Some(4));
        assert!(tree.is_dirty());

        tree.reject();
        assert_eq!(tree, original);
        assert!(!tree.is_dirty());
    }

    #[test]
    fn swap_parents_rejects_related_nodes() {
        let mut tree = sample_tree();
        assert!(tree.swap_parents(4, 0).is_err());
        assert!(tree.swap_parents(6, 0).is_err());
        assert!(!tree.is_dirty());
    }

    #[test]
    fn accept_keeps_edits() {
        let mut tree = sample_tree();
        tree.update_weight(4, 1.5);
        tree.accept();
        tree.reject();
        assert_eq!(tree.weight_of(4), 1.5);
    }

    #[test]
    fn verify_catches_height_violation() {
        let mut tree = sample_tree();
        tree.update_weight(4, 3.5);
        assert!(matches!(tree.verify(), Err(VerdantError::Invariant(_))));
        tree.reject();
        tree.verify().unwrap();
    }

    #[test]
    fn is_ancestor_walks_to_root() {
        let tree = sample_tree();
        assert!(tree.is_ancestor(6, 0));
        assert!(tree.is_ancestor(4, 0));
        assert!(!tree.is_ancestor(5, 0));
        assert!(tree.is_ancestor(3, 3));
    }

    #[test]
    fn random_internal_covers_all_internals() {
        let tree = sample_tree();
        let mut rng = Rng::seeded(5);
        let mut seen = [false; 3];
        for _ in 0..200 {
            let node = tree.random_internal(&mut rng);
            assert!(tree.is_internal(node));
            seen[node - 4] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }
}
