//! Breadth-limited directory tree rendering.
//!
//! File paths are folded into a segment trie held in an arena. Rendering copies the
//! trie breadth-first into a second arena under a node budget, visiting siblings
//! round-robin across each level so one wide directory cannot starve its neighbours.
//! Where the budget cut a node's children short, a `[N truncated]` marker records how
//! many were left out.

use std::collections::HashMap;

/// Default node budget for a rendered tree.
pub const DEFAULT_TREE_LIMIT: usize = 50;

/// Paths containing this segment are never shown.
pub const EXCLUDED_SEGMENT: &str = ".trawl";

const ROOT: NodeId = NodeId(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct NodeId(usize);

#[derive(Debug, Clone)]
struct Node {
    segment: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A path-segment trie. Siblings are unique by segment.
#[derive(Debug, Clone)]
pub struct FileTree {
    nodes: Vec<Node>,
}

impl Default for FileTree {
    fn default() -> Self {
        Self {
            nodes: vec![Node {
                segment: String::new(),
                parent: None,
                children: Vec::new(),
            }],
        }
    }
}

impl FileTree {
    /// Build a sorted trie from root-relative file paths.
    ///
    /// Every node's children are ordered leaves first, then directories, each group
    /// by segment name.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::default();
        let mut index: HashMap<(NodeId, String), NodeId> = HashMap::new();

        for path in paths {
            let segments: Vec<&str> = split_segments(path.as_ref()).collect();
            if segments.is_empty() || segments.contains(&EXCLUDED_SEGMENT) {
                continue;
            }
            let mut current = ROOT;
            for segment in segments {
                let key = (current, segment.to_string());
                current = match index.get(&key) {
                    Some(&existing) => existing,
                    None => {
                        let created = tree.push_child(current, segment.to_string());
                        index.insert(key, created);
                        created
                    }
                };
            }
        }

        tree.sort();
        tree
    }

    /// Number of nodes below the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Path segments from the root down to `id`.
    fn path_of(&self, id: NodeId) -> Vec<&str> {
        let mut segments = Vec::new();
        let mut cursor = Some(id);
        while let Some(node_id) = cursor.filter(|&node_id| node_id != ROOT) {
            let node = &self.nodes[node_id.0];
            segments.push(node.segment.as_str());
            cursor = node.parent;
        }
        segments.reverse();
        segments
    }

    /// Root-to-leaf segment lists for every leaf, in render order.
    #[must_use]
    pub fn leaf_paths(&self) -> Vec<Vec<&str>> {
        let mut leaves = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[ROOT.0].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            if node.children.is_empty() {
                leaves.push(self.path_of(id));
            } else {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        leaves
    }

    fn push_child(&mut self, parent: NodeId, segment: String) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            segment,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    fn sort(&mut self) {
        for index in 0..self.nodes.len() {
            let mut children = std::mem::take(&mut self.nodes[index].children);
            children.sort_by(|&a, &b| {
                let (a, b) = (&self.nodes[a.0], &self.nodes[b.0]);
                (!a.children.is_empty())
                    .cmp(&!b.children.is_empty())
                    .then_with(|| a.segment.cmp(&b.segment))
            });
            self.nodes[index].children = children;
        }
    }

    /// Copy at most `limit` nodes into a new tree, breadth-first and round-robin.
    #[must_use]
    pub fn truncate(&self, limit: usize) -> FileTree {
        let mut result = FileTree::default();
        // Source node -> its copy in `result`, once admitted.
        let mut copies: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        copies[ROOT.0] = Some(ROOT);

        let mut processed = 0;
        let mut level = vec![ROOT];
        while !level.is_empty() {
            let next: Vec<NodeId> = level
                .iter()
                .flat_map(|id| self.nodes[id.0].children.iter().copied())
                .collect();
            let widest = level
                .iter()
                .map(|id| self.nodes[id.0].children.len())
                .max()
                .unwrap_or(0);

            'admit: for slot in 0..widest {
                for id in &level {
                    if processed >= limit {
                        break 'admit;
                    }
                    let Some(&child) = self.nodes[id.0].children.get(slot) else {
                        continue;
                    };
                    let Some(parent_copy) = copies[id.0] else {
                        continue;
                    };
                    let segment = self.nodes[child.0].segment.clone();
                    copies[child.0] = Some(result.push_child(parent_copy, segment));
                    processed += 1;
                }
            }

            if processed >= limit {
                for id in level.iter().chain(&next) {
                    let Some(copy) = copies[id.0] else {
                        continue;
                    };
                    let total = self.nodes[id.0].children.len();
                    let kept = result.nodes[copy.0].children.len();
                    if kept != total {
                        result.push_child(copy, format!("[{} truncated]", total - kept));
                    }
                }
                break;
            }
            level = next;
        }

        result
    }

    /// One line per node, depth-first, tab-indented; nodes with children end in `/`.
    #[must_use]
    pub fn render(&self) -> String {
        let mut lines = Vec::with_capacity(self.len());
        let mut stack: Vec<(NodeId, usize)> = self.nodes[ROOT.0]
            .children
            .iter()
            .rev()
            .map(|&id| (id, 0))
            .collect();

        while let Some((id, depth)) = stack.pop() {
            let node = &self.nodes[id.0];
            let suffix = if node.children.is_empty() { "" } else { "/" };
            lines.push(format!("{}{}{suffix}", "\t".repeat(depth), node.segment));
            stack.extend(node.children.iter().rev().map(|&child| (child, depth + 1)));
        }

        lines.join("\n")
    }
}

/// Build, budget and render in one step.
pub fn render_tree<I, S>(paths: I, limit: usize) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    FileTree::from_paths(paths).truncate(limit).render()
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(['/', std::path::MAIN_SEPARATOR])
        .filter(|segment| !segment.is_empty() && *segment != ".")
}
