//! String comparison used for text and attribute matching.
//!
//! A [`Matcher`] compares one expected value against candidate strings. It
//! is exact when the ratio is `1.0`, a similarity threshold below that, or a
//! whole-string regular expression when built from [`Example::Pattern`].
//!
//! The similarity score is the Ratcliff/Obershelp ratio: twice the number of
//! characters in matching blocks divided by the total length of both strings.
//! Raising the ratio can only reject more candidates.

use std::collections::HashMap;

use regex::Regex;

use crate::error::Result;
use crate::util::normalize;

/// A value the caller knows appears in the training page.
#[derive(Debug, Clone)]
pub enum Example {
    /// Literal text, compared with the build ratio.
    Text(String),
    /// Regular expression that must match the entire candidate.
    Pattern(Regex),
}

impl Example {
    /// Compile a whole-string pattern example.
    pub fn pattern(pattern: &str) -> Result<Self> {
        let anchored = Regex::new(&format!(r"^(?:{pattern})$"))?;
        Ok(Example::Pattern(anchored))
    }

    /// Build the matcher used while scanning a page.
    pub fn matcher(&self, ratio: f64) -> Matcher {
        match self {
            Example::Text(text) => Matcher::new(normalize(text), ratio),
            Example::Pattern(re) => Matcher::Pattern(re.clone()),
        }
    }
}

impl From<&str> for Example {
    fn from(s: &str) -> Self {
        Example::Text(s.to_string())
    }
}

impl From<String> for Example {
    fn from(s: String) -> Self {
        Example::Text(s)
    }
}

impl From<&String> for Example {
    fn from(s: &String) -> Self {
        Example::Text(s.clone())
    }
}

/// Exact, fuzzy or pattern comparison against one expected value.
#[derive(Debug, Clone)]
pub enum Matcher {
    Exact(String),
    Fuzzy { text: String, ratio: f64 },
    Pattern(Regex),
}

impl Matcher {
    /// `ratio >= 1.0` yields an exact matcher.
    pub fn new(text: impl Into<String>, ratio: f64) -> Self {
        let text = text.into();
        if ratio >= 1.0 {
            Matcher::Exact(text)
        } else {
            Matcher::Fuzzy { text, ratio }
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Matcher::Exact(text) => text == candidate,
            Matcher::Fuzzy { text, ratio } => similarity(text, candidate) >= *ratio,
            Matcher::Pattern(re) => re.is_match(candidate),
        }
    }
}

/// Compare an expected value with a candidate under `ratio`.
///
/// Empty expected values never go fuzzy: they only match empty candidates.
pub fn matches_with_ratio(expected: &str, candidate: &str, ratio: f64) -> bool {
    if ratio >= 1.0 || expected.is_empty() {
        expected == candidate
    } else {
        similarity(expected, candidate) >= ratio
    }
}

/// Ratcliff/Obershelp similarity in `[0, 1]`. Two empty strings score `1.0`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

/// Total size of the matching blocks found by recursively taking the
/// longest common block and repeating on both sides of it.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut positions: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, c) in b.iter().enumerate() {
        positions.entry(*c).or_default().push(j);
    }

    let mut total = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(a, &positions, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        total += k;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            queue.push((i + k, ahi, j + k, bhi));
        }
    }
    total
}

/// Longest block with `a[i..i+k] == b[j..j+k]` inside the given windows.
/// Ties go to the smallest `i`, then the smallest `j`.
fn longest_match(
    a: &[char],
    positions: &HashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let mut best = (alo, blo, 0);
    let mut run_lengths: HashMap<usize, usize> = HashMap::new();
    for (i, c) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next_runs = HashMap::new();
        if let Some(js) = positions.get(c) {
            for &j in js {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = if j > 0 {
                    run_lengths.get(&(j - 1)).copied().unwrap_or(0)
                } else {
                    0
                } + 1;
                next_runs.insert(j, k);
                if k > best.2 {
                    best = (i + 1 - k, j + 1 - k, k);
                }
            }
        }
        run_lengths = next_runs;
    }
    best
}
