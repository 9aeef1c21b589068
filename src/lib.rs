//! # stackscrape
//!
//! Structural HTML extraction by example.
//!
//! Give the engine a page and a few values you can see on it. It finds the
//! elements carrying those values, records the path from the document root
//! to each one as a [`Rule`], and replays the rules to pull out every
//! structurally similar value: the example titles from the first two items
//! of a listing bring back the titles of all of them.
//!
//! ## Quick Start
//!
//! ```
//! use stackscrape::{Scraper, Source};
//!
//! let page = r#"
//!     <ul>
//!       <li><a href="/p/1">First post</a> <span>Mon</span></li>
//!       <li><a href="/p/2">Second post</a> <span>Tue</span></li>
//!     </ul>"#;
//!
//! let mut scraper = Scraper::new(Default::default()).unwrap();
//! let titles = scraper
//!     .build(["First post"], &Source::markup(page, "https://blog.example/"), 1.0)
//!     .unwrap();
//! assert_eq!(
//!     titles,
//!     vec![Some("First post".to_string()), Some("Second post".to_string())]
//! );
//! ```
//!
//! ## Reusing Rules
//!
//! Learned rules can be exported and applied to later versions of the page:
//!
//! ```
//! use stackscrape::{Scraper, Source};
//!
//! let mut scraper = Scraper::new(Default::default()).unwrap();
//! scraper
//!     .build(
//!         ["https://blog.example/p/1"],
//!         &Source::markup(
//!             r#"<div><a href="/p/1">a</a></div><div><a href="/p/2">b</a></div>"#,
//!             "https://blog.example/",
//!         ),
//!         1.0,
//!     )
//!     .unwrap();
//! let blob = scraper.export_rules().unwrap();
//!
//! let mut fresh = Scraper::new(Default::default()).unwrap();
//! fresh.import_rules(&blob).unwrap();
//! let links = fresh
//!     .apply_to_document(
//!         &Source::markup(r#"<div><a href="/p/9">z</a></div>"#, "https://blog.example/"),
//!         1.0,
//!     )
//!     .unwrap();
//! assert_eq!(links, vec![Some("https://blog.example/p/9".to_string())]);
//! ```

pub mod dom;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod matcher;
pub mod merge;
pub mod rule;
pub mod scraper;
pub(crate) mod util;

pub use dom::{Document, NodeId, Order};
pub use error::{Error, Result};
pub use extract::Extractor;
pub use fetch::{Fetch, FetchConfig, HttpFetcher, Source};
pub use matcher::{Example, Matcher, similarity};
pub use merge::MergeTree;
pub use rule::{AttrSignature, Directive, Frame, MAX_RULE_DEPTH, Rule, RuleStore};
pub use scraper::{Scraper, learn};
