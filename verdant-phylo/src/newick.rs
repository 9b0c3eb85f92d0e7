//! Newick format parser and writer.
//!
//! Supports the standard Newick grammar:
//! ```text
//! tree     = subtree ';'
//! subtree  = '(' children ')' label | label
//! children = subtree (',' subtree)*
//! label    = name? (':' length)?
//! ```
//!
//! Only strictly binary trees with named leaves and a length on every
//! non-root branch can be loaded. Heights are measured back from the deepest
//! leaf, so ultrametric input puts every leaf at height 0.

use crate::tree::{Node, NodeId, Tree};
use verdant_core::{Result, VerdantError};

/// Parse a Newick format string into a `Tree`.
pub fn parse(input: &str) -> Result<Tree> {
    let mut parser = Parser::new(input.as_bytes());
    let (raw, root) = parser.parse_tree()?;
    build(raw, root)
}

/// Serialize a `Tree` to a Newick format string with branch lengths.
pub fn write(tree: &Tree) -> String {
    let mut buf = String::new();
    write_subtree(tree, tree.root(), &mut buf);
    buf.push(';');
    buf
}

enum Visit {
    Open(NodeId),
    Comma,
    Close(NodeId),
}

// Explicit stack: caterpillar trees are as deep as they have leaves.
fn write_subtree(tree: &Tree, root: NodeId, buf: &mut String) {
    let mut stack = vec![Visit::Open(root)];
    while let Some(visit) = stack.pop() {
        match visit {
            Visit::Open(id) => match tree.children_of(id) {
                Some((left, right)) => {
                    buf.push('(');
                    stack.push(Visit::Close(id));
                    stack.push(Visit::Open(right));
                    stack.push(Visit::Comma);
                    stack.push(Visit::Open(left));
                }
                None => write_label(tree, id, buf),
            },
            Visit::Comma => buf.push(','),
            Visit::Close(id) => {
                buf.push(')');
                write_label(tree, id, buf);
            }
        }
    }
}

fn write_label(tree: &Tree, id: NodeId, buf: &mut String) {
    if let Some(name) = tree.label_of(id) {
        buf.push_str(name);
    }
    if let Some(parent) = tree.parent_of(id) {
        let length = tree.weight_of(parent) - tree.weight_of(id);
        buf.push(':');
        buf.push_str(&length.to_string());
    }
}

/// A node as read from the string, before it is checked to be binary.
struct RawNode {
    children: Vec<usize>,
    name: Option<String>,
    length: Option<f64>,
}

fn build(raw: Vec<RawNode>, root: usize) -> Result<Tree> {
    // Parents are allocated before their children, so one forward pass
    // computes every depth.
    let mut depth = vec![0.0f64; raw.len()];
    for (id, node) in raw.iter().enumerate() {
        for &child in &node.children {
            let length = raw[child].length.ok_or_else(|| {
                VerdantError::Parse(format!(
                    "missing branch length below node {id} in Newick string"
                ))
            })?;
            if !(length >= 0.0) || !length.is_finite() {
                return Err(VerdantError::Parse(format!(
                    "invalid branch length {length} in Newick string"
                )));
            }
            depth[child] = depth[id] + length;
        }
    }
    let max_depth = depth.iter().copied().fold(0.0, f64::max);

    let mut leaves = Vec::new();
    let mut internals = Vec::new();
    for (id, node) in raw.iter().enumerate() {
        match node.children.len() {
            0 => leaves.push(id),
            2 => internals.push(id),
            n => {
                return Err(VerdantError::Parse(format!(
                    "node with {n} children; only binary trees are supported"
                )))
            }
        }
    }
    if leaves.len() < 2 {
        return Err(VerdantError::Parse("tree needs at least 2 leaves".into()));
    }
    // Children before parents, root last.
    internals.reverse();

    let mut index = vec![0; raw.len()];
    for (new, &old) in leaves.iter().chain(internals.iter()).enumerate() {
        index[old] = new;
    }

    let mut names: Vec<&str> = Vec::with_capacity(leaves.len());
    let mut nodes: Vec<Node> = Vec::with_capacity(raw.len());
    for &old in leaves.iter().chain(internals.iter()) {
        let node = &raw[old];
        let children = match node.children[..] {
            [l, r] => Some([index[l], index[r]]),
            _ => None,
        };
        let label = if children.is_none() {
            let name = node.name.as_deref().ok_or_else(|| {
                VerdantError::Parse("unnamed leaf in Newick string".into())
            })?;
            names.push(name);
            Some(name.to_string())
        } else {
            None
        };
        let height = (max_depth - depth[old]).max(0.0);
        nodes.push(Tree::new_node(index[old], height, children, label));
    }

    names.sort_unstable();
    if let Some(w) = names.windows(2).find(|w| w[0] == w[1]) {
        return Err(VerdantError::Parse(format!(
            "duplicate leaf name '{}' in Newick string",
            w[0]
        )));
    }

    Tree::link_parents(&mut nodes);
    Tree::from_verified_nodes(nodes, index[root])
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    nodes: Vec<RawNode>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            nodes: Vec::new(),
        }
    }

    fn parse_tree(&mut self) -> Result<(Vec<RawNode>, usize)> {
        self.skip_whitespace();
        let root = self.parse_subtree()?;
        self.skip_whitespace();
        if self.peek() != Some(b';') {
            return Err(VerdantError::Parse(
                "expected ';' at end of Newick string".into(),
            ));
        }
        self.pos += 1;
        Ok((std::mem::take(&mut self.nodes), root))
    }

    /// Reads a subtree without recursing; `open` holds the internal nodes
    /// whose closing ')' has not been reached yet.
    fn parse_subtree(&mut self) -> Result<usize> {
        let root = self.alloc_node();
        let mut open = Vec::new();
        self.descend(root, &mut open)?;

        while let Some(&parent) = open.last() {
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                    let child = self.alloc_node();
                    self.nodes[parent].children.push(child);
                    self.descend(child, &mut open)?;
                }
                Some(b')') => {
                    self.pos += 1;
                    open.pop();
                    self.parse_label(parent)?;
                }
                _ => return Err(VerdantError::Parse("expected ')' in Newick string".into())),
            }
        }
        Ok(root)
    }

    /// Follow opening parentheses down to the first child, then read its label.
    fn descend(&mut self, mut id: usize, open: &mut Vec<usize>) -> Result<()> {
        self.skip_whitespace();
        while self.peek() == Some(b'(') {
            self.pos += 1;
            open.push(id);
            let child = self.alloc_node();
            self.nodes[id].children.push(child);
            id = child;
            self.skip_whitespace();
        }
        self.parse_label(id)
    }

    fn parse_label(&mut self, id: usize) -> Result<()> {
        self.skip_whitespace();
        let name = self.take_while(|b| {
            !matches!(b, b':' | b',' | b')' | b'(' | b';' | b' ' | b'\t' | b'\n' | b'\r')
        });
        if !name.is_empty() {
            self.nodes[id].name = Some(name);
        }
        self.skip_whitespace();
        if self.peek() == Some(b':') {
            self.pos += 1;
            self.skip_whitespace();
            let text = self.take_while(|b| matches!(b, b'0'..=b'9' | b'.' | b'-' | b'+' | b'e' | b'E'));
            if text.is_empty() {
                return Err(VerdantError::Parse("expected number after ':'".into()));
            }
            let length: f64 = text
                .parse()
                .map_err(|_| VerdantError::Parse(format!("invalid branch length: '{text}'")))?;
            self.nodes[id].length = Some(length);
        }
        Ok(())
    }

    fn take_while(&mut self, keep: impl Fn(u8) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&keep) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    fn alloc_node(&mut self) -> usize {
        self.nodes.push(RawNode {
            children: Vec::new(),
            name: None,
            length: None,
        });
        self.nodes.len() - 1
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ultrametric() {
        let tree = parse("((A:1,B:1):2,(C:2,D:2):1);").unwrap();
        assert_eq!(tree.num_nodes(), 7);
        assert_eq!(tree.num_leaves(), 4);
        assert_eq!(tree.leaf_names(), vec!["A", "B", "C", "D"]);
        assert_eq!(tree.weight_of(tree.root()), 3.0);
        assert!(tree.leaves().all(|l| tree.weight_of(l) == 0.0));
        assert_eq!(tree.label_of(0), Some("A"));
    }

    #[test]
    fn parse_non_ultrametric_measures_from_deepest_leaf() {
        let tree = parse("(A:1,B:3);").unwrap();
        let a = tree.leaves().find(|&l| tree.label_of(l) == Some("A")).unwrap();
        assert_eq!(tree.weight_of(a), 2.0);
        assert_eq!(tree.weight_of(tree.root()), 3.0);
    }

    #[test]
    fn parse_whitespace_and_root_length() {
        let tree = parse("  ( A : 0.5 , B : 0.5 ) : 7 ; ").unwrap();
        assert_eq!(tree.num_nodes(), 3);
        assert_eq!(tree.weight_of(tree.root()), 0.5);
    }

    #[test]
    fn parse_errors() {
        assert!(parse("((A:1,B:1):1;").is_err());
        assert!(parse("(A:1,B:1)").is_err());
        assert!(parse("(A:abc,B:1);").is_err());
        assert!(parse("(A,B);").is_err());
        assert!(parse("(A:1,B:1,C:1);").is_err());
        assert!(parse("A:1;").is_err());
        assert!(parse("(A:1,A:1);").is_err());
        assert!(parse("(A:-1,B:1);").is_err());
        assert!(parse("(:1,B:1);").is_err());
    }

    #[test]
    fn deep_nesting_is_an_error_not_a_crash() {
        let err = parse(&"(".repeat(200_000)).unwrap_err();
        assert!(matches!(err, VerdantError::Parse(_)), "{err}");
    }

    #[test]
    fn deep_caterpillar_roundtrip() {
        let n = 100_000;
        let taxa: Vec<String> = (0..n).map(|i| format!("t{i}")).collect();
        let mut heights = vec![0.0; n];
        heights.extend((1..n).map(|k| k as f64));
        let children: Vec<(NodeId, NodeId)> = (0..n - 1)
            .map(|k| if k == 0 { (0, 1) } else { (n + k - 1, k + 1) })
            .collect();
        let tree = Tree::from_parts(taxa, &heights, &children).unwrap();

        let again = parse(&write(&tree)).unwrap();
        assert_eq!(again.num_leaves(), n);
        assert_eq!(again.weight_of(again.root()), (n - 1) as f64);
        assert_eq!(again.leaf_names(), tree.leaf_names());
    }

    #[test]
    fn write_simple() {
        let tree = parse("(A:1,B:1);").unwrap();
        assert_eq!(write(&tree), "(A:1,B:1);");
    }

    #[test]
    fn roundtrip_preserves_heights() {
        let input = "((A:0.5,B:0.5):1.25,(C:1,D:1):0.75);";
        let tree = parse(input).unwrap();
        let again = parse(&write(&tree)).unwrap();
        assert_eq!(tree, again);
    }
}
