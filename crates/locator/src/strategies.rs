//! Candidate generation
//!
//! Native trees and web DOMs use different priority tables:
//! - Native: exact-id 95, test-marker 95, accessible-label 85, visible-text 80,
//!   anchored structural path 70, full structural path 60, indexed path 40.
//! - Web: xpath-by-id 95, test-marker 95, css-by-id 90, accessible-label 85,
//!   name 75, exact text 75, contained text 75, class 65, nth-child 50,
//!   tag 40, indexed xpath 40.

use resel_core_types::{Platform, SelectorCandidate, SelectorStrategy};
use tracing::debug;

use crate::policy::GeneratorCfg;
use crate::snapshot::{Attr, ElementSnapshot};

/// Base priority of a strategy on a platform, `None` when the platform does
/// not use it.
pub fn base_priority(platform: Platform, strategy: SelectorStrategy) -> Option<u8> {
    use SelectorStrategy::*;
    let priority = if platform.is_native() {
        match strategy {
            ExactId | TestMarker => 95,
            AccessibleLabel => 85,
            VisibleText => 80,
            StructuralPathShort => 70,
            StructuralPath => 60,
            IndexedPath => 40,
            _ => return None,
        }
    } else {
        match strategy {
            XpathById | TestMarker => 95,
            CssById => 90,
            AccessibleLabel => 85,
            NameAttribute | VisibleTextExact | VisibleTextContains => 75,
            ClassAttribute => 65,
            CssNthChild => 50,
            TagOnly | IndexedXpath => 40,
            _ => return None,
        }
    };
    Some(priority)
}

/// Heuristic for text that is likely to change between runs: counters,
/// prices, or very short generated labels.
pub fn looks_dynamic(text: &str) -> bool {
    let mut run = 0usize;
    for ch in text.chars() {
        if ch.is_ascii_digit() {
            run += 1;
            if run >= 2 {
                return true;
            }
        } else {
            run = 0;
        }
    }
    if text.chars().any(|ch| matches!(ch, '$' | '€' | '£' | '¥')) {
        return true;
    }
    text.chars().count() < 3
}

/// Pure, stateless derivation of selector candidates from one snapshot.
#[derive(Clone, Debug, Default)]
pub struct CandidateGenerator {
    cfg: GeneratorCfg,
}

impl CandidateGenerator {
    pub fn new(cfg: GeneratorCfg) -> Self {
        Self { cfg }
    }

    /// Emit every candidate whose underlying attribute is present.
    pub fn generate(&self, snapshot: &ElementSnapshot) -> Vec<SelectorCandidate> {
        let mut out = Vec::new();
        let mut push = |strategy: SelectorStrategy, value: Option<String>| {
            let (Some(value), Some(priority)) = (value, base_priority(snapshot.platform, strategy))
            else {
                return;
            };
            if value.is_empty() {
                return;
            }
            out.push(SelectorCandidate::new(strategy, value, priority));
        };

        if snapshot.platform.is_native() {
            for (strategy, value) in native_values(snapshot) {
                push(strategy, value);
            }
        } else {
            for (strategy, value) in web_values(snapshot) {
                push(strategy, value);
            }
        }

        if let Some(text) = snapshot.attr(Attr::VisibleText) {
            if looks_dynamic(text) {
                debug!(
                    logical_id = %snapshot.logical_id,
                    skip = self.cfg.skip_dynamic_text,
                    "visible text looks dynamic"
                );
                if self.cfg.skip_dynamic_text {
                    out.retain(|candidate| !candidate.strategy.is_text());
                }
            }
        }

        debug!(
            logical_id = %snapshot.logical_id,
            candidates = out.len(),
            "generated selector candidates"
        );
        out
    }
}

fn native_values(snapshot: &ElementSnapshot) -> Vec<(SelectorStrategy, Option<String>)> {
    let own = |attr: Attr| snapshot.attr(attr).map(str::to_string);
    let mut values = vec![
        (SelectorStrategy::ExactId, own(Attr::Identifier)),
        (SelectorStrategy::TestMarker, own(Attr::TestMarker)),
        (SelectorStrategy::AccessibleLabel, own(Attr::AccessibleLabel)),
        (SelectorStrategy::VisibleText, own(Attr::VisibleText)),
    ];
    if snapshot.has_hierarchy() {
        let context = &snapshot.context;
        let short = context.anchored_chain(snapshot.target).and_then(|(anchor, chain)| {
            let anchor_id = context.node(anchor)?.attr(Attr::Identifier)?;
            Some(format!(
                "//*[@id={}]/{}",
                xpath_literal(anchor_id),
                chain.join("/")
            ))
        });
        values.push((SelectorStrategy::StructuralPathShort, short));
        values.push((
            SelectorStrategy::StructuralPath,
            Some(format!("/{}", context.class_chain(snapshot.target).join("/"))),
        ));
        values.push((SelectorStrategy::IndexedPath, Some(indexed_path(snapshot))));
    }
    values
}

fn web_values(snapshot: &ElementSnapshot) -> Vec<(SelectorStrategy, Option<String>)> {
    let tag = snapshot.attr(Attr::DomTag).unwrap_or("*");
    let id = snapshot.attr(Attr::Identifier);
    let mut values = vec![
        (
            SelectorStrategy::XpathById,
            id.map(|id| format!("//*[@id={}]", xpath_literal(id))),
        ),
        (
            SelectorStrategy::TestMarker,
            snapshot
                .attr(Attr::TestMarker)
                .map(|marker| format!("[data-testid={}]", css_string(marker))),
        ),
        (SelectorStrategy::CssById, id.map(css_id)),
        (
            SelectorStrategy::AccessibleLabel,
            snapshot
                .attr(Attr::AccessibleLabel)
                .map(|label| format!("[aria-label={}]", css_string(label))),
        ),
        (
            SelectorStrategy::NameAttribute,
            snapshot
                .attr(Attr::DomName)
                .map(|name| format!("//{tag}[@name={}]", xpath_literal(name))),
        ),
        (
            SelectorStrategy::VisibleTextExact,
            snapshot
                .text_content()
                .map(|text| format!("//{tag}[normalize-space(.)={}]", xpath_literal(text))),
        ),
        (
            SelectorStrategy::VisibleTextContains,
            snapshot
                .text_content()
                .map(|text| format!("//{tag}[contains(., {})]", xpath_literal(text))),
        ),
        (
            SelectorStrategy::ClassAttribute,
            snapshot
                .attr(Attr::DomClass)
                .filter(|classes| classes.split_whitespace().next().is_some())
                .map(|classes| {
                    let joined: Vec<&str> = classes.split_whitespace().collect();
                    format!("{}.{}", tag, joined.join("."))
                }),
        ),
        (
            SelectorStrategy::TagOnly,
            snapshot.attr(Attr::DomTag).map(str::to_string),
        ),
    ];
    if snapshot.has_hierarchy() {
        let nth_child = snapshot.target_node().and_then(|node| {
            let parent = snapshot.context.node(node.parent?)?;
            Some(format!(
                "{} > {}:nth-child({})",
                parent.class(),
                tag,
                node.child_position
            ))
        });
        values.push((SelectorStrategy::CssNthChild, nth_child));
        values.push((SelectorStrategy::IndexedXpath, Some(indexed_path(snapshot))));
    }
    values
}

fn indexed_path(snapshot: &ElementSnapshot) -> String {
    snapshot
        .structural_path
        .iter()
        .map(|segment| format!("/{}[{}]", segment.class, segment.ordinal))
        .collect()
}

/// Quote a value as an XPath 1.0 string literal.
fn xpath_literal(value: &str) -> String {
    if !value.contains('"') {
        format!("\"{value}\"")
    } else if !value.contains('\'') {
        format!("'{value}'")
    } else {
        let parts: Vec<String> = value
            .split('"')
            .map(|part| format!("\"{part}\""))
            .collect();
        format!("concat({})", parts.join(", '\"', "))
    }
}

fn css_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn css_id(id: &str) -> String {
    let simple = id
        .chars()
        .next()
        .map(|first| first.is_ascii_alphabetic() || first == '_')
        .unwrap_or(false)
        && id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    if simple {
        format!("#{id}")
    } else {
        format!("[id={}]", css_string(id))
    }
}
