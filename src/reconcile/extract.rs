use std::collections::{HashMap, HashSet};

use crate::soap::scanner::{decode_entities, find_all, Span};

const LOCAL_TAGS: [&str; 2] = ["CodPedLab", "CD_PED_LAB"];
const REMOTE_TAG: &str = "CodPedApoio";
const YEAR_TAG: &str = "AnoCodPedApoio";

/// One extracted (local, remote, year?) triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingPair {
    pub local_order_code: String,
    pub remote_order_code: String,
    pub order_year: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Local,
    Remote,
    Year,
}

#[derive(Debug)]
struct Token {
    pos: usize,
    /// Index of the `<` opening the element.
    element_start: usize,
    /// Index just past the element's closing `>`.
    element_end: usize,
    kind: Kind,
    value: String,
}

/// Which code is expected first inside a record.
#[derive(Debug, Clone, Copy)]
enum Order {
    LocalFirst,
    RemoteFirst,
}

/// Outer bounds of the element whose content is `span`.
fn element_bounds(xml: &str, span: Span) -> (usize, usize) {
    let start = xml[..span.start].rfind('<').unwrap_or(span.start);
    let self_closing = span.start == span.end && xml[..span.start].ends_with("/>");
    let end = if self_closing {
        span.end
    } else {
        xml[span.end..]
            .find('>')
            .map_or(xml.len(), |i| span.end + i + 1)
    };
    (start, end)
}

fn tokenize(xml: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut push = |tag: &str, kind: Kind| {
        for span in find_all(xml, tag) {
            let (element_start, element_end) = element_bounds(xml, span);
            tokens.push(Token {
                pos: span.start,
                element_start,
                element_end,
                kind,
                value: decode_entities(xml[span.start..span.end].trim()).trim().to_string(),
            });
        }
    };
    for tag in LOCAL_TAGS {
        push(tag, Kind::Local);
    }
    push(REMOTE_TAG, Kind::Remote);
    push(YEAR_TAG, Kind::Year);

    tokens.sort_by_key(|t| t.pos);
    tokens
}

fn parse_year(raw: &str) -> Option<i32> {
    raw.trim().parse().ok()
}

/// Pair codes assuming `order`. The opener nearest to each closer wins.
///
/// The year is taken from between the two codes, or failing that from a year
/// element that follows the closer with only whitespace in between.
fn pair_up(xml: &str, tokens: &[Token], order: Order) -> Vec<MappingPair> {
    // Any code tag that is not the opener closes the record.
    let opener = match order {
        Order::LocalFirst => Kind::Local,
        Order::RemoteFirst => Kind::Remote,
    };

    let mut pairs = Vec::new();
    let mut open: Option<usize> = None;
    let mut inner_year: Option<&str> = None;

    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            k if k == opener => {
                open = Some(i);
                inner_year = None;
            }
            Kind::Year => {
                if open.is_some() {
                    inner_year = Some(token.value.as_str());
                }
            }
            _ => {
                let Some(open_idx) = open.take() else {
                    continue;
                };
                let first = &tokens[open_idx].value;
                let second = &token.value;
                let trailing_year = tokens
                    .get(i + 1)
                    .filter(|next| next.kind == Kind::Year)
                    .filter(|next| adjacent(xml, token, next))
                    .map(|next| next.value.as_str());
                let year = inner_year.take().or(trailing_year).and_then(parse_year);

                if first.is_empty() || second.is_empty() {
                    continue;
                }
                let (local, remote) = match order {
                    Order::LocalFirst => (first, second),
                    Order::RemoteFirst => (second, first),
                };
                pairs.push(MappingPair {
                    local_order_code: local.clone(),
                    remote_order_code: remote.clone(),
                    order_year: year,
                });
            }
        }
    }
    pairs
}

/// True when only whitespace separates the end of `before` from `after`.
fn adjacent(xml: &str, before: &Token, after: &Token) -> bool {
    after.element_start >= before.element_end
        && xml[before.element_end..after.element_start].trim().is_empty()
}

/// Insertion-ordered map keyed by local code; re-inserting replaces in place.
#[derive(Default)]
struct OrderedPairs {
    pairs: Vec<MappingPair>,
    index: HashMap<String, usize>,
}

impl OrderedPairs {
    fn put(&mut self, pair: MappingPair) {
        match self.index.get(&pair.local_order_code) {
            Some(&i) => self.pairs[i] = pair,
            None => {
                self.index.insert(pair.local_order_code.clone(), self.pairs.len());
                self.pairs.push(pair);
            }
        }
    }
}

/// Extract deduplicated mappings from a period export.
///
/// Both orderings are tried. The one producing more pairs is primary (ties go
/// to local-first) and its pairs are applied in textual order, last wins. The
/// other ordering only contributes local codes the primary never produced.
pub fn extract_mappings(xml: &str) -> Vec<MappingPair> {
    let tokens = tokenize(xml);
    let local_first = pair_up(xml, &tokens, Order::LocalFirst);
    let remote_first = pair_up(xml, &tokens, Order::RemoteFirst);

    let (primary, secondary) = if local_first.len() >= remote_first.len() {
        (local_first, remote_first)
    } else {
        (remote_first, local_first)
    };

    let mut merged = OrderedPairs::default();
    for pair in primary {
        merged.put(pair);
    }
    let primary_codes: HashSet<String> = merged.index.keys().cloned().collect();
    for pair in secondary {
        if !primary_codes.contains(&pair.local_order_code) {
            merged.put(pair);
        }
    }
    merged.pairs
}
