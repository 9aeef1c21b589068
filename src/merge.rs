//! Merging rules into a shared extraction tree.
//!
//! Rules learned from one page usually share most of their path from the
//! root. [`MergeTree`] folds them into a trie keyed by frame identity: the
//! common prefix becomes a linear chain, and wherever rules diverge the tree
//! branches, one child per distinct leading frame. Replaying the tree walks
//! each shared level once instead of once per rule.

use indexmap::IndexMap;

use crate::rule::{Frame, Rule, RuleStore};

/// A merged set of rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeTree {
    /// One rule's remaining frames. The first frame is the next level to
    /// match; when it is the only frame, it is the leaf itself.
    Leaf(Rule),
    /// Frames shared by every rule below, followed by one child per
    /// distinct leading frame. Each child's first frame is its key's frame.
    Branch {
        chain: Vec<Frame>,
        children: IndexMap<String, MergeTree>,
    },
}

impl MergeTree {
    /// Merge every rule in the store. Returns `None` for an empty store.
    pub fn build(store: &RuleStore) -> Option<MergeTree> {
        if store.is_empty() {
            return None;
        }
        Some(merge(store.iter().cloned().collect()))
    }

    /// The first frame this subtree expects to match.
    pub fn leading_frame(&self) -> Option<&Frame> {
        match self {
            MergeTree::Leaf(rule) => rule.frames().first(),
            MergeTree::Branch { chain, .. } => chain.first(),
        }
    }

    /// Number of rules folded into this subtree.
    pub fn leaf_count(&self) -> usize {
        match self {
            MergeTree::Leaf(_) => 1,
            MergeTree::Branch { children, .. } => children.values().map(Self::leaf_count).sum(),
        }
    }
}

/// Grouping key for a rule's next level.
///
/// A frame that is still on the way down is keyed by its own hash. A frame
/// that ends the rule also carries the directive, so rules that stop at the
/// same element but read different values never share a group.
fn leading_key(rule: &Rule) -> String {
    match rule.frames() {
        [_] => format!("leaf:{}", rule.hash()),
        [first, ..] => first.hash(),
        [] => format!("empty:{}", rule.hash()),
    }
}

fn group_by_leading(rules: Vec<Rule>) -> IndexMap<String, Vec<Rule>> {
    let mut groups: IndexMap<String, Vec<Rule>> = IndexMap::new();
    for rule in rules {
        groups.entry(leading_key(&rule)).or_default().push(rule);
    }
    groups
}

fn merge(mut rules: Vec<Rule>) -> MergeTree {
    if rules.len() == 1
        && let Some(rule) = rules.pop()
    {
        return MergeTree::Leaf(rule);
    }

    let mut chain = Vec::new();
    loop {
        let groups = group_by_leading(rules);

        if groups.len() == 1 {
            let group = groups.into_values().next().unwrap_or_default();
            let shared = group.first().and_then(|r| r.frames().first()).cloned();
            // Distinct rules in one group always continue past this frame.
            if let Some(shared) = shared
                && group.len() > 1
                && group.iter().all(|r| r.len() > 1)
            {
                chain.push(shared);
                rules = group.iter().map(|r| r.suffix(1)).collect();
                continue;
            }
            let children = group
                .into_iter()
                .map(|r| (r.hash().to_string(), MergeTree::Leaf(r)))
                .collect();
            return MergeTree::Branch { chain, children };
        }

        let mut children = IndexMap::new();
        for (key, mut group) in groups {
            let child = if group.len() == 1
                && let Some(rule) = group.pop()
            {
                MergeTree::Leaf(rule)
            } else {
                merge(group)
            };
            children.insert(key, child);
        }
        return MergeTree::Branch { chain, children };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{AttrSignature, Directive};

    fn frame(tag: &str, index: Option<usize>) -> Frame {
        Frame {
            tag: tag.to_string(),
            attrs: AttrSignature::default(),
            index,
        }
    }

    fn rule(tags: &[(&str, Option<usize>)], directive: Directive) -> Rule {
        Rule::new(tags.iter().map(|(t, i)| frame(t, *i)).collect(), directive)
    }

    fn href() -> Directive {
        Directive::Attribute {
            name: "href".to_string(),
            absolute_url: false,
        }
    }

    #[test]
    fn test_single_rule_is_leaf() {
        let r = rule(&[("html", None), ("body", None), ("a", None)], href());
        let store: RuleStore = [r.clone()].into_iter().collect();
        assert_eq!(MergeTree::build(&store), Some(MergeTree::Leaf(r)));
        assert_eq!(MergeTree::build(&RuleStore::new()), None);
    }

    #[test]
    fn test_shared_prefix_becomes_chain() {
        let a = rule(
            &[("html", None), ("body", None), ("li", Some(0)), ("a", None)],
            href(),
        );
        let b = rule(
            &[("html", None), ("body", None), ("li", Some(3)), ("a", None)],
            href(),
        );
        let store: RuleStore = [a, b].into_iter().collect();
        let tree = MergeTree::build(&store).unwrap();

        let MergeTree::Branch { chain, children } = &tree else {
            panic!("expected branch, got {tree:?}");
        };
        let tags: Vec<_> = chain.iter().map(|f| f.tag.as_str()).collect();
        assert_eq!(tags, vec!["html", "body"]);
        assert_eq!(children.len(), 2);

        for child in children.values() {
            let MergeTree::Leaf(residual) = child else {
                panic!("expected leaf");
            };
            assert_eq!(residual.len(), 2);
            assert_eq!(residual.frames()[0].tag, "li");
        }
        assert_eq!(tree.leaf_count(), 2);
    }

    #[test]
    fn test_children_partition_rules() {
        let rules = vec![
            rule(&[("html", None), ("body", None), ("div", None), ("a", None)], href()),
            rule(&[("html", None), ("body", None), ("div", None), ("span", None)], Directive::Text),
            rule(&[("html", None), ("body", None), ("ul", None), ("a", None)], href()),
            rule(&[("html", None), ("body", None), ("ul", None), ("b", None)], Directive::Text),
        ];
        let store: RuleStore = rules.into_iter().collect();
        let tree = MergeTree::build(&store).unwrap();

        let MergeTree::Branch { chain, children } = &tree else {
            panic!("expected branch");
        };
        assert_eq!(chain.len(), 2);
        assert_eq!(children.len(), 2);
        assert_eq!(tree.leaf_count(), 4);

        // First-seen order is kept.
        let leading: Vec<_> = children
            .values()
            .map(|c| c.leading_frame().unwrap().tag.as_str())
            .collect();
        assert_eq!(leading, vec!["div", "ul"]);

        for child in children.values() {
            let MergeTree::Branch { chain, children } = child else {
                panic!("expected nested branch");
            };
            assert_eq!(chain.len(), 1);
            assert_eq!(children.len(), 2);
        }
    }

    #[test]
    fn test_same_element_different_directives() {
        let path = [("html", None), ("body", None), ("a", None)];
        let store: RuleStore = [rule(&path, href()), rule(&path, Directive::Text)]
            .into_iter()
            .collect();
        let tree = MergeTree::build(&store).unwrap();

        let MergeTree::Branch { chain, children } = &tree else {
            panic!("expected branch");
        };
        assert_eq!(chain.len(), 2);
        assert_eq!(children.len(), 2);
        for child in children.values() {
            assert!(matches!(child, MergeTree::Leaf(r) if r.len() == 1));
        }
    }

    #[test]
    fn test_terminal_and_deeper_rule_on_same_frame() {
        let store: RuleStore = [
            rule(&[("html", None), ("body", None), ("p", None)], Directive::DirectText),
            rule(&[("html", None), ("body", None), ("p", None), ("a", None)], href()),
        ]
        .into_iter()
        .collect();
        let tree = MergeTree::build(&store).unwrap();

        let MergeTree::Branch { children, .. } = &tree else {
            panic!("expected branch");
        };
        let lens: Vec<_> = children
            .values()
            .map(|c| match c {
                MergeTree::Leaf(r) => r.len(),
                MergeTree::Branch { .. } => 0,
            })
            .collect();
        assert_eq!(lens, vec![1, 2]);
    }
}
