//! The extraction engine.
//!
//! [`Scraper::build`] scans a page for elements carrying the caller's
//! example values, turns each into a [`Rule`], and replays the resulting
//! rules on the same page. The learned rules stay on the engine, so
//! [`Scraper::apply_to_document`] can pull the corresponding values out of
//! later versions of the page, and [`Scraper::export_rules`] can persist them.

use std::fs;
use std::path::Path;

use indexmap::IndexSet;
use tracing::{debug, info, warn};
use url::Url;

use crate::dom::{Document, NodeId, Order};
use crate::error::Result;
use crate::extract::Extractor;
use crate::fetch::{Fetch, FetchConfig, HttpFetcher, Source};
use crate::matcher::{Example, Matcher};
use crate::merge::MergeTree;
use crate::rule::{Directive, MAX_RULE_DEPTH, Rule, RuleStore};

/// Attributes holding token lists; their values are never extraction targets.
const MULTI_VALUED_ATTRS: &[&str] = &[
    "class",
    "rel",
    "rev",
    "accept-charset",
    "headers",
    "accesskey",
    "dropzone",
];

/// Attributes whose values are also tried as absolute URLs.
const URL_ATTRS: &[&str] = &["href", "src"];

/// Learns extraction rules from examples and replays them.
#[derive(Debug)]
pub struct Scraper<F = HttpFetcher> {
    fetcher: F,
    store: RuleStore,
    tree: Option<MergeTree>,
}

impl Scraper<HttpFetcher> {
    /// Engine fetching URLs over HTTP with the given retry settings.
    pub fn new(config: FetchConfig) -> Result<Self> {
        Ok(Self::with_fetcher(HttpFetcher::new(config)?))
    }
}

impl<F: Fetch> Scraper<F> {
    pub fn with_fetcher(fetcher: F) -> Self {
        Self {
            fetcher,
            store: RuleStore::new(),
            tree: None,
        }
    }

    /// Learn rules from `examples` found in `source` and return what they
    /// extract from that same page, first occurrence order, no duplicates.
    ///
    /// Replaces any previously learned rules. An empty result means nothing
    /// matched; it is not an error.
    pub fn build<I, E>(
        &mut self,
        examples: I,
        source: &Source,
        text_ratio: f64,
    ) -> Result<Vec<Option<String>>>
    where
        I: IntoIterator<Item = E>,
        E: Into<Example>,
    {
        let examples: Vec<Example> = examples.into_iter().map(Into::into).collect();
        let doc = self.load_document(source)?;

        self.set_rules(learn(&doc, &examples, text_ratio));
        let values = self.replay(&doc, 1.0);
        info!(
            base_url = source.base_url(),
            examples = examples.len(),
            rules = self.store.len(),
            values = values.len(),
            "built rules"
        );
        Ok(values)
    }

    /// Replay the learned rules against another page.
    ///
    /// Does not modify the engine. With no rules the result is empty.
    pub fn apply_to_document(&self, source: &Source, attr_ratio: f64) -> Result<Vec<Option<String>>> {
        if self.store.is_empty() {
            debug!(base_url = source.base_url(), "no rules to apply");
            return Ok(Vec::new());
        }
        let doc = self.load_document(source)?;
        let values = self.replay(&doc, attr_ratio);
        debug!(
            base_url = source.base_url(),
            values = values.len(),
            "applied rules"
        );
        Ok(values)
    }

    /// Serialize the learned rules.
    pub fn export_rules(&self) -> Result<String> {
        self.store.dump()
    }

    /// Replace the learned rules with a previously exported blob.
    ///
    /// On error the current rules are left untouched.
    pub fn import_rules(&mut self, blob: &str) -> Result<()> {
        let store = RuleStore::load(blob)?;
        self.set_rules(store);
        Ok(())
    }

    /// Write the exported rules to a file.
    pub fn save_rules(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.export_rules()?)?;
        Ok(())
    }

    /// Import rules from a file written by [`Scraper::save_rules`].
    pub fn load_rules(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let blob = fs::read_to_string(path)?;
        self.import_rules(&blob)
    }

    pub fn rules(&self) -> &RuleStore {
        &self.store
    }

    /// The merged form of the rules, present when there are two or more.
    pub fn merge_tree(&self) -> Option<&MergeTree> {
        self.tree.as_ref()
    }

    fn set_rules(&mut self, store: RuleStore) {
        self.tree = if store.len() > 1 {
            MergeTree::build(&store)
        } else {
            None
        };
        self.store = store;
    }

    fn load_document(&self, source: &Source) -> Result<Document> {
        let html = match source {
            Source::Url(url) => self.fetcher.fetch(url)?,
            Source::Markup { html, .. } => html.clone(),
        };
        let base_url = match Url::parse(source.base_url()) {
            Ok(url) => Some(url),
            Err(e) => {
                debug!(base_url = source.base_url(), error = %e, "ignoring unusable base URL");
                None
            }
        };
        Ok(Document::parse(&html, base_url))
    }

    fn replay(&self, doc: &Document, attr_ratio: f64) -> Vec<Option<String>> {
        let extractor = Extractor::new(doc, attr_ratio);
        let values = match (&self.tree, self.store.iter().next()) {
            (Some(tree), _) => extractor.apply_tree(tree),
            (None, Some(rule)) => extractor.apply_rule(rule),
            (None, None) => Vec::new(),
        };
        unique(values)
    }
}

/// Scan `doc` for every element carrying one of the examples and collect
/// the deduplicated rules leading to them.
///
/// Elements are visited in reverse document order for each example in turn,
/// which fixes the order rules enter the store.
pub fn learn(doc: &Document, examples: &[Example], text_ratio: f64) -> RuleStore {
    let mut store = RuleStore::new();
    let nodes = doc.descendants(doc.root(), Order::Reverse);

    for example in examples {
        if let Example::Text(text) = example
            && text.trim().is_empty()
        {
            debug!("skipping blank example");
            continue;
        }
        let matcher = example.matcher(text_ratio);

        for &node in &nodes {
            let Some(directive) = carried_directive(doc, node, &matcher) else {
                continue;
            };
            let rule = Rule::build(doc, node, directive);
            if rule.len() > MAX_RULE_DEPTH {
                warn!(depth = rule.len(), "skipping rule deeper than limit");
                continue;
            }
            let id = rule.id().to_string();
            if store.insert(rule) {
                debug!(rule = %id, "new rule");
            }
        }
    }
    store
}

/// How `node` carries the example, if it does. Checks full text, then
/// direct text, then each attribute in source order.
fn carried_directive(doc: &Document, node: NodeId, matcher: &Matcher) -> Option<Directive> {
    let text = doc.text(node);
    if matcher.matches(text) {
        // The parent holds exactly the same text: the match belongs to the
        // outermost such element, unless the parent is the top element.
        if let Some(parent) = doc.parent(node)
            && doc.parent(parent).is_some()
            && doc.text(parent) == text
        {
            return None;
        }
        return Some(Directive::Text);
    }

    if matcher.matches(&doc.direct_text(node)) {
        return Some(Directive::DirectText);
    }

    for attr in doc.attrs(node) {
        if MULTI_VALUED_ATTRS.contains(&attr.name.as_str()) {
            continue;
        }
        let value = attr.value.trim();
        if matcher.matches(value) {
            return Some(Directive::Attribute {
                name: attr.name.clone(),
                absolute_url: false,
            });
        }
        if URL_ATTRS.contains(&attr.name.as_str())
            && let Some(full) = doc.resolve_url(value)
            && matcher.matches(&full)
        {
            return Some(Directive::Attribute {
                name: attr.name.clone(),
                absolute_url: true,
            });
        }
    }
    None
}

/// Drop repeated values, keeping the first occurrence of each.
fn unique(values: Vec<Option<String>>) -> Vec<Option<String>> {
    values.into_iter().collect::<IndexSet<_>>().into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    /// Fetcher for tests that must never touch the network.
    struct NoFetch;

    impl Fetch for NoFetch {
        fn fetch(&self, url: &str) -> Result<String> {
            Err(Error::Fetch {
                url: url.to_string(),
                attempts: 1,
                reason: "offline".to_string(),
            })
        }
    }

    fn scraper() -> Scraper<NoFetch> {
        Scraper::with_fetcher(NoFetch)
    }

    fn strings(values: Vec<Option<String>>) -> Vec<String> {
        values.into_iter().map(|v| v.unwrap_or_default()).collect()
    }

    const BASE: &str = "https://news.example/";

    #[test]
    fn test_text_directive() {
        let html = "<div><p><b>Alpha</b> 1h</p><p><b>Beta</b> 2h</p></div>";
        let mut s = scraper();
        let values = s.build(["Alpha"], &Source::markup(html, BASE), 1.0).unwrap();
        assert_eq!(strings(values), vec!["Alpha", "Beta"]);
        assert_eq!(s.rules().len(), 1);
        assert_eq!(
            s.rules().iter().next().unwrap().directive(),
            &Directive::Text
        );
    }

    #[test]
    fn test_outermost_text_holder_wins() {
        // <li> and <b> both have text "Alpha"; the <b> is skipped because
        // its parent's text is identical.
        let html = "<ul><li><b>Alpha</b></li><li>Beta</li></ul>";
        let doc = Document::parse(html, None);
        let store = learn(&doc, &[Example::from("Alpha")], 1.0);
        assert_eq!(store.len(), 1);
        let rule = store.iter().next().unwrap();
        assert_eq!(rule.frames().last().unwrap().tag, "li");
    }

    #[test]
    fn test_direct_text_directive() {
        let html = "<div><p>Posted by <b>admin</b></p><p>Posted by <b>guest</b></p></div>";
        let mut s = scraper();
        let values = s
            .build(["Posted by"], &Source::markup(html, BASE), 1.0)
            .unwrap();
        assert_eq!(strings(values), vec!["Posted by"]);
        assert_eq!(
            s.rules().iter().next().unwrap().directive(),
            &Directive::DirectText
        );
    }

    #[test]
    fn test_relative_href_resolved() {
        let html = r#"<div><a href="/a/1">x</a></div><div><a href="/a/2">y</a></div>"#;
        let mut s = scraper();
        let values = s
            .build(
                ["https://news.example/a/1"],
                &Source::markup(html, BASE),
                1.0,
            )
            .unwrap();
        assert_eq!(
            strings(values),
            vec!["https://news.example/a/1", "https://news.example/a/2"]
        );
    }

    #[test]
    fn test_raw_attribute_value() {
        let html = r#"<div><img data-id="17"></div><div><img data-id="18"></div>"#;
        let mut s = scraper();
        let values = s.build(["17"], &Source::markup(html, BASE), 1.0).unwrap();
        assert_eq!(strings(values), vec!["17", "18"]);
    }

    #[test]
    fn test_class_is_never_a_directive() {
        let html = r#"<span class="promo">x</span>"#;
        let doc = Document::parse(html, None);
        assert!(learn(&doc, &[Example::from("promo")], 1.0).is_empty());
    }

    #[test]
    fn test_pattern_example() {
        let html = r#"<p><a href="/item/1">A</a></p><p><a href="/item/22">B</a></p>"#;
        let mut s = scraper();
        let values = s
            .build(
                [Example::pattern(r"https://news\.example/item/\d").unwrap()],
                &Source::markup(html, BASE),
                1.0,
            )
            .unwrap();
        assert_eq!(
            strings(values),
            vec!["https://news.example/item/1", "https://news.example/item/22"]
        );
    }

    #[test]
    fn test_fuzzy_text_ratio() {
        let html = "<div><p><b>Breaking news today</b> - 3 hours ago</p>\
                    <p><b>Other story</b> - 5 hours ago</p></div>";
        let mut s = scraper();
        let exact = s
            .build(["Breaking news todya"], &Source::markup(html, BASE), 1.0)
            .unwrap();
        assert!(exact.is_empty());

        let fuzzy = s
            .build(["Breaking news todya"], &Source::markup(html, BASE), 0.8)
            .unwrap();
        assert_eq!(strings(fuzzy), vec!["Breaking news today", "Other story"]);
    }

    #[test]
    fn test_blank_examples_are_skipped() {
        let html = "<p></p><p>x</p>";
        let mut s = scraper();
        let values = s.build(["  "], &Source::markup(html, BASE), 1.0).unwrap();
        assert!(values.is_empty());
        assert!(s.rules().is_empty());
    }

    #[test]
    fn test_build_failure_keeps_previous_rules() {
        let html = "<ul><li>a</li><li>b</li></ul>";
        let mut s = scraper();
        s.build(["a"], &Source::markup(html, BASE), 1.0).unwrap();
        let before = s.rules().clone();

        let err = s.build(["a"], &Source::url("https://down.example/"), 1.0);
        assert!(matches!(err, Err(Error::Fetch { .. })));
        assert_eq!(s.rules(), &before);
    }

    #[test]
    fn test_import_error_keeps_previous_rules() {
        let html = "<ul><li>a</li><li>b</li></ul>";
        let mut s = scraper();
        s.build(["a"], &Source::markup(html, BASE), 1.0).unwrap();
        let before = s.rules().clone();

        assert!(s.import_rules("{").is_err());
        assert_eq!(s.rules(), &before);
    }

    #[test]
    fn test_merge_tree_only_for_several_rules() {
        let html = r#"<ul><li><a href="/1">One</a></li><li><a href="/2">Two</a></li></ul>"#;
        let mut s = scraper();
        s.build(["One"], &Source::markup(html, BASE), 1.0).unwrap();
        assert!(s.merge_tree().is_none());

        let values = s
            .build(["One", "https://news.example/2"], &Source::markup(html, BASE), 1.0)
            .unwrap();
        assert!(s.merge_tree().is_some());
        assert_eq!(
            strings(values),
            vec!["One", "https://news.example/1", "https://news.example/2"]
        );
    }

    #[test]
    fn test_apply_without_rules_is_empty() {
        let s = scraper();
        let values = s
            .apply_to_document(&Source::markup("<p>x</p>", BASE), 1.0)
            .unwrap();
        assert!(values.is_empty());
    }

    fn nested(depth: usize) -> String {
        format!(
            "{}<span>one</span><span>two</span>{}",
            "<div>".repeat(depth),
            "</div>".repeat(depth)
        )
    }

    #[test]
    fn test_rules_within_depth_limit_extract() {
        let mut s = scraper();
        let values = s
            .build(["one", "two"], &Source::markup(nested(500), BASE), 1.0)
            .unwrap();
        assert_eq!(strings(values), vec!["one", "two"]);
        assert_eq!(s.rules().len(), 2);
        assert!(s.rules().iter().all(|r| r.len() <= MAX_RULE_DEPTH));
    }

    #[test]
    fn test_rules_past_depth_limit_are_skipped() {
        let mut s = scraper();
        let values = s
            .build(["one", "two"], &Source::markup(nested(600), BASE), 1.0)
            .unwrap();
        assert!(values.is_empty());
        assert!(s.rules().is_empty());
        assert!(s.merge_tree().is_none());
    }

    #[test]
    fn test_unique_keeps_first_occurrence() {
        let values = vec![
            Some("b".to_string()),
            None,
            Some("a".to_string()),
            Some("b".to_string()),
            None,
        ];
        assert_eq!(
            unique(values),
            vec![Some("b".to_string()), None, Some("a".to_string())]
        );
    }
}
