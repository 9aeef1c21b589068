//! Structural rules.
//!
//! A [`Rule`] is the path from the document root down to one element that
//! carried an example value, one [`Frame`] per level, plus a [`Directive`]
//! saying which part of that element holds the value. Rules are identified
//! by a SHA1 hash of their frames and directive, so two examples that
//! resolve to the same structure produce the same rule.

mod store;

use serde::{Deserialize, Serialize};

use crate::dom::{Document, NodeId};
use crate::matcher::matches_with_ratio;

pub use store::RuleStore;

/// Rules deeper than this are never built or imported.
pub const MAX_RULE_DEPTH: usize = 512;

/// The attributes that take part in structural identity.
///
/// Only `class` and `style` are considered; volatile attributes such as
/// `id` or `href` would make every item on a listing page unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttrSignature {
    /// Class tokens in source order.
    #[serde(default)]
    pub class: Vec<String>,
    #[serde(default)]
    pub style: String,
}

impl AttrSignature {
    /// Signature of an element in `doc`. Missing attributes are empty.
    pub fn of(doc: &Document, node: NodeId) -> Self {
        Self {
            class: doc
                .attr(node, "class")
                .map(|c| c.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            style: doc.attr(node, "style").unwrap_or_default().to_string(),
        }
    }

    /// Compare against a live element's signature.
    ///
    /// At `ratio >= 1.0` this is plain equality. Below that, each non-empty
    /// expected value only needs to be similar enough; class lists must
    /// still have the same number of tokens.
    pub fn matches(&self, other: &AttrSignature, ratio: f64) -> bool {
        if ratio >= 1.0 {
            return self == other;
        }
        self.class.len() == other.class.len()
            && self
                .class
                .iter()
                .zip(&other.class)
                .all(|(a, b)| matches_with_ratio(a, b, ratio))
            && matches_with_ratio(&self.style, &other.style, ratio)
    }
}

/// One level of a rule: an element's tag and signature, and its position
/// among identically-signed siblings when that position is ambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frame {
    pub tag: String,
    #[serde(default)]
    pub attrs: AttrSignature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl Frame {
    /// Whether `node` has this frame's tag and (possibly fuzzy) signature.
    /// The sibling index is not part of matching.
    pub fn matches(&self, doc: &Document, node: NodeId, attr_ratio: f64) -> bool {
        doc.tag(node) == Some(self.tag.as_str())
            && self.attrs.matches(&AttrSignature::of(doc, node), attr_ratio)
    }

    /// Content hash of this frame alone.
    pub fn hash(&self) -> String {
        content_hash(self)
    }
}

/// Which part of the matched element holds the value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Directive {
    /// All text under the element.
    Text,
    /// Only text written directly inside the element.
    DirectText,
    /// An attribute value, optionally resolved to an absolute URL.
    Attribute {
        name: String,
        #[serde(default)]
        absolute_url: bool,
    },
}

impl Directive {
    /// Pull the value out of `node`. A missing attribute yields `None`.
    pub fn extract(&self, doc: &Document, node: NodeId) -> Option<String> {
        match self {
            Directive::Text => Some(doc.text(node).to_string()),
            Directive::DirectText => Some(doc.direct_text(node)),
            Directive::Attribute { name, absolute_url } => {
                let value = doc.attr(node, name)?.trim();
                if *absolute_url {
                    Some(doc.resolve_url(value).unwrap_or_else(|| value.to_string()))
                } else {
                    Some(value.to_string())
                }
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RuleData {
    frames: Vec<Frame>,
    directive: Directive,
}

/// A learned root-to-leaf path plus extraction directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RuleData", into = "RuleData")]
pub struct Rule {
    frames: Vec<Frame>,
    directive: Directive,
    hash: String,
    id: String,
}

impl Rule {
    pub fn new(frames: Vec<Frame>, directive: Directive) -> Self {
        let hash = content_hash(&RuleData {
            frames: frames.clone(),
            directive: directive.clone(),
        });
        let id = format!("rule_{}", &hash[..8]);
        Self {
            frames,
            directive,
            hash,
            id,
        }
    }

    /// Build the rule for `leaf` by climbing to the root.
    ///
    /// Each level records the element's tag and signature. When the parent
    /// has several children with the same tag and signature, the element's
    /// 0-based position among them is recorded too.
    pub fn build(doc: &Document, leaf: NodeId, directive: Directive) -> Self {
        let mut frames = Vec::new();
        let mut node = leaf;
        while let Some(parent) = doc.parent(node) {
            let Some(tag) = doc.tag(node) else { break };
            let attrs = AttrSignature::of(doc, node);

            let same: Vec<NodeId> = doc
                .children(parent)
                .filter(|&c| doc.tag(c) == Some(tag) && AttrSignature::of(doc, c) == attrs)
                .collect();
            let index = if same.len() > 1 {
                same.iter().position(|&c| c == node)
            } else {
                None
            };

            frames.push(Frame {
                tag: tag.to_string(),
                attrs,
                index,
            });
            node = parent;
        }
        frames.reverse();
        Rule::new(frames, directive)
    }

    /// The rule with its first `n` frames removed.
    pub fn suffix(&self, n: usize) -> Rule {
        Rule::new(
            self.frames.get(n..).unwrap_or_default().to_vec(),
            self.directive.clone(),
        )
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn directive(&self) -> &Directive {
        &self.directive
    }

    /// Content hash over frames and directive.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Short identifier for logs.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl From<RuleData> for Rule {
    fn from(data: RuleData) -> Self {
        Rule::new(data.frames, data.directive)
    }
}

impl From<Rule> for RuleData {
    fn from(rule: Rule) -> Self {
        RuleData {
            frames: rule.frames,
            directive: rule.directive,
        }
    }
}

/// Hex SHA1 of a value's JSON form.
fn content_hash<T: Serialize>(value: &T) -> String {
    // Frames and directives only contain strings, integers and booleans,
    // which always serialize.
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    sha1_smol::Sha1::from(bytes).digest().to_string()
}
