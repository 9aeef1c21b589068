//! Replaying rules against a page.
//!
//! Every level of a rule except the last keeps *all* matching children, so a
//! rule learned from the first item of a list reaches every item. The last
//! level picks one element per parent by the recorded sibling index, clamped
//! to the number of matches actually present.

use crate::dom::{Document, NodeId};
use crate::merge::MergeTree;
use crate::rule::{Directive, Frame, Rule};

/// Replays rules and merge trees against one document.
pub struct Extractor<'d> {
    doc: &'d Document,
    attr_ratio: f64,
}

impl<'d> Extractor<'d> {
    /// `attr_ratio` below `1.0` allows similar, not identical, class and
    /// style values at every level.
    pub fn new(doc: &'d Document, attr_ratio: f64) -> Self {
        Self { doc, attr_ratio }
    }

    /// Replay a single rule from the document root.
    pub fn apply_rule(&self, rule: &Rule) -> Vec<Option<String>> {
        self.walk(rule.frames(), rule.directive(), vec![self.doc.root()])
    }

    /// Replay a merge tree from the document root.
    pub fn apply_tree(&self, tree: &MergeTree) -> Vec<Option<String>> {
        let mut out = Vec::new();
        self.walk_tree(tree, vec![self.doc.root()], 0, &mut out);
        out
    }

    fn matching_children(&self, parent: NodeId, frame: &Frame) -> Vec<NodeId> {
        self.doc
            .children(parent)
            .filter(|&c| frame.matches(self.doc, c, self.attr_ratio))
            .collect()
    }

    /// Descend one non-terminal level from every parent.
    fn step(&self, parents: &[NodeId], frame: &Frame) -> Vec<NodeId> {
        parents
            .iter()
            .flat_map(|&p| self.matching_children(p, frame))
            .collect()
    }

    /// The terminal element under `parent`, chosen by sibling index.
    fn select(&self, parent: NodeId, frame: &Frame) -> Option<NodeId> {
        let found = self.matching_children(parent, frame);
        let last = found.len().checked_sub(1)?;
        Some(found[frame.index.unwrap_or(0).min(last)])
    }

    fn walk(
        &self,
        frames: &[Frame],
        directive: &Directive,
        mut parents: Vec<NodeId>,
    ) -> Vec<Option<String>> {
        let Some((leaf, path)) = frames.split_last() else {
            return Vec::new();
        };
        for frame in path {
            parents = self.step(&parents, frame);
            if parents.is_empty() {
                return Vec::new();
            }
        }
        parents
            .into_iter()
            .filter_map(|p| self.select(p, leaf))
            .map(|node| directive.extract(self.doc, node))
            .collect()
    }

    /// `consumed` is the number of leading frames of `tree` already matched
    /// by the caller.
    fn walk_tree(
        &self,
        tree: &MergeTree,
        mut parents: Vec<NodeId>,
        consumed: usize,
        out: &mut Vec<Option<String>>,
    ) {
        let (chain, children) = match tree {
            MergeTree::Leaf(rule) => {
                let frames = rule.frames().get(consumed..).unwrap_or_default();
                out.extend(self.walk(frames, rule.directive(), parents));
                return;
            }
            MergeTree::Branch { chain, children } => (chain, children),
        };

        for frame in chain.get(consumed..).unwrap_or_default() {
            parents = self.step(&parents, frame);
            if parents.is_empty() {
                return;
            }
        }
        // A chain shorter than `consumed` means the branch key itself was
        // the matched frame.
        let children_consumed = consumed.saturating_sub(chain.len());

        for parent in parents {
            // Leaves that end at this level select by index relative to the
            // parent, so resolve them before scanning the children.
            let terminal: Vec<Option<NodeId>> = children
                .values()
                .map(|child| match child {
                    MergeTree::Leaf(rule) if rule.len() == children_consumed + 1 => rule
                        .frames()
                        .last()
                        .and_then(|frame| self.select(parent, frame)),
                    _ => None,
                })
                .collect();

            for node in self.doc.children(parent) {
                for (slot, child) in children.values().enumerate() {
                    let Some(frame) = child_frame(child, children_consumed) else {
                        continue;
                    };
                    if !frame.matches(self.doc, node, self.attr_ratio) {
                        continue;
                    }
                    match child {
                        MergeTree::Leaf(rule) if rule.len() == children_consumed + 1 => {
                            if terminal[slot] == Some(node) {
                                out.push(rule.directive().extract(self.doc, node));
                            }
                        }
                        _ => self.walk_tree(child, vec![node], children_consumed + 1, out),
                    }
                }
            }
        }
    }
}

/// The frame a branch child must match next.
fn child_frame(child: &MergeTree, consumed: usize) -> Option<&Frame> {
    match child {
        MergeTree::Leaf(rule) => rule.frames().get(consumed),
        MergeTree::Branch { chain, .. } => chain.get(consumed),
    }
}
