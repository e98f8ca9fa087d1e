//! Uniqueness validation against the captured tree context
//!
//! A candidate's query is rebuilt from the snapshot that produced it and
//! evaluated over every node of the captured arena. The live tree is never
//! consulted: a stale context still yields the verdict for the evidence that
//! was captured.

use std::collections::BTreeSet;

use resel_core_types::{SelectorCandidate, SelectorStrategy};
use tracing::debug;

use crate::snapshot::{collapse_ws, Attr, ElementSnapshot, NodeDescriptor, TreeContext};

/// Structured form of a candidate value.
#[derive(Debug, Clone, PartialEq)]
enum Query<'a> {
    AttrEquals {
        tag: Option<&'a str>,
        attr: Attr,
        value: &'a str,
    },
    /// `deep` matches against descendant text, as DOM string values do.
    TextEquals {
        tag: Option<&'a str>,
        text: &'a str,
        deep: bool,
    },
    TextContains {
        tag: Option<&'a str>,
        text: &'a str,
        deep: bool,
    },
    Classes {
        tag: Option<&'a str>,
        classes: BTreeSet<&'a str>,
    },
    AnchoredChain {
        anchor_id: &'a str,
        chain: Vec<&'a str>,
    },
    ClassChain(Vec<&'a str>),
    NthChild {
        parent_class: &'a str,
        class: &'a str,
        position: usize,
    },
    Tag(&'a str),
}

impl<'a> Query<'a> {
    fn derive(strategy: SelectorStrategy, snapshot: &'a ElementSnapshot) -> Option<Self> {
        use SelectorStrategy::*;
        let web_tag = snapshot.attr(Attr::DomTag);
        let query = match strategy {
            ExactId | XpathById | CssById => Query::AttrEquals {
                tag: None,
                attr: Attr::Identifier,
                value: snapshot.attr(Attr::Identifier)?,
            },
            TestMarker => Query::AttrEquals {
                tag: None,
                attr: Attr::TestMarker,
                value: snapshot.attr(Attr::TestMarker)?,
            },
            AccessibleLabel => Query::AttrEquals {
                tag: None,
                attr: Attr::AccessibleLabel,
                value: snapshot.attr(Attr::AccessibleLabel)?,
            },
            NameAttribute => Query::AttrEquals {
                tag: web_tag,
                attr: Attr::DomName,
                value: snapshot.attr(Attr::DomName)?,
            },
            VisibleText => Query::TextEquals {
                tag: None,
                text: snapshot.attr(Attr::VisibleText)?,
                deep: false,
            },
            VisibleTextExact => Query::TextEquals {
                tag: web_tag,
                text: snapshot.text_content()?,
                deep: true,
            },
            VisibleTextContains => Query::TextContains {
                tag: web_tag,
                text: snapshot.text_content()?,
                deep: true,
            },
            ClassAttribute => {
                let classes: BTreeSet<&str> = snapshot
                    .attr(Attr::DomClass)?
                    .split_whitespace()
                    .collect();
                if classes.is_empty() {
                    return None;
                }
                Query::Classes {
                    tag: web_tag,
                    classes,
                }
            }
            StructuralPathShort => {
                let (anchor, chain) = snapshot.context.anchored_chain(snapshot.target)?;
                Query::AnchoredChain {
                    anchor_id: snapshot.context.node(anchor)?.attr(Attr::Identifier)?,
                    chain,
                }
            }
            StructuralPath => Query::ClassChain(snapshot.context.class_chain(snapshot.target)),
            CssNthChild => {
                let node = snapshot.target_node()?;
                let parent = snapshot.context.node(node.parent?)?;
                Query::NthChild {
                    parent_class: parent.class(),
                    class: node.class(),
                    position: node.child_position,
                }
            }
            TagOnly => Query::Tag(web_tag?),
            IndexedPath | IndexedXpath => return None,
        };
        Some(query)
    }

    fn matches(&self, context: &TreeContext, index: usize) -> bool {
        let Some(node) = context.node(index) else {
            return false;
        };
        match self {
            Query::AttrEquals { tag, attr, value } => {
                tag_matches(node, *tag) && node.attr(*attr) == Some(*value)
            }
            Query::TextEquals { tag, text, deep } => {
                tag_matches(node, *tag)
                    && node_text(context, index, *deep)
                        .map(|value| collapse_ws(value) == collapse_ws(text))
                        .unwrap_or(false)
            }
            Query::TextContains { tag, text, deep } => {
                tag_matches(node, *tag)
                    && node_text(context, index, *deep)
                        .map(|value| value.contains(*text))
                        .unwrap_or(false)
            }
            Query::Classes { tag, classes } => {
                if !tag_matches(node, *tag) {
                    return false;
                }
                let own: BTreeSet<&str> = node
                    .attr(Attr::DomClass)
                    .map(|value| value.split_whitespace().collect())
                    .unwrap_or_default();
                classes.is_subset(&own)
            }
            Query::AnchoredChain { anchor_id, chain } => {
                let lineage = context.lineage(index);
                if lineage.len() <= chain.len() {
                    return false;
                }
                let split = lineage.len() - chain.len();
                let anchor_ok = context
                    .node(lineage[split - 1])
                    .and_then(|anchor| anchor.attr(Attr::Identifier))
                    == Some(*anchor_id);
                anchor_ok
                    && lineage[split..]
                        .iter()
                        .zip(chain.iter())
                        .all(|(i, class)| {
                            context.node(*i).map(NodeDescriptor::class) == Some(*class)
                        })
            }
            Query::ClassChain(chain) => context.class_chain(index) == *chain,
            Query::NthChild {
                parent_class,
                class,
                position,
            } => {
                node.class() == *class
                    && node.child_position == *position
                    && node
                        .parent
                        .and_then(|p| context.node(p))
                        .map(|parent| parent.class() == *parent_class)
                        .unwrap_or(false)
            }
            Query::Tag(tag) => node.attr(Attr::DomTag) == Some(*tag),
        }
    }
}

fn tag_matches(node: &NodeDescriptor, tag: Option<&str>) -> bool {
    match tag {
        Some(tag) => node.attr(Attr::DomTag) == Some(tag),
        None => true,
    }
}

fn node_text(context: &TreeContext, index: usize, deep: bool) -> Option<&str> {
    if deep {
        context.text_content(index)
    } else {
        context.node(index)?.attr(Attr::VisibleText)
    }
}

/// Decides whether a candidate resolves to exactly one captured element.
#[derive(Clone, Copy, Debug, Default)]
pub struct UniquenessValidator;

impl UniquenessValidator {
    pub fn new() -> Self {
        Self
    }

    /// Number of captured nodes the candidate matches, `None` for strategies
    /// that are unique by construction or carry no query.
    pub fn match_count(
        &self,
        candidate: &SelectorCandidate,
        snapshot: &ElementSnapshot,
    ) -> Option<usize> {
        let query = Query::derive(candidate.strategy, snapshot)?;
        let context = &snapshot.context;
        Some(
            (0..context.len())
                .filter(|index| query.matches(context, *index))
                .count(),
        )
    }

    pub fn is_unique(&self, candidate: &SelectorCandidate, snapshot: &ElementSnapshot) -> bool {
        // ordinals pin the element to one position
        if candidate.strategy.is_indexed() {
            return true;
        }
        let Some(query) = Query::derive(candidate.strategy, snapshot) else {
            return false;
        };
        let context = &snapshot.context;
        if !query.matches(context, snapshot.target) {
            return false;
        }
        let mut matches = 0usize;
        for index in 0..context.len() {
            if query.matches(context, index) {
                matches += 1;
                if matches > 1 {
                    return false;
                }
            }
        }
        matches == 1
    }

    /// Flag every candidate; order is preserved and nothing is dropped.
    pub fn validate(
        &self,
        snapshot: &ElementSnapshot,
        candidates: Vec<SelectorCandidate>,
    ) -> Vec<SelectorCandidate> {
        candidates
            .into_iter()
            .map(|candidate| {
                let unique = self.is_unique(&candidate, snapshot);
                if !unique {
                    debug!(
                        logical_id = %snapshot.logical_id,
                        strategy = candidate.strategy.name(),
                        "candidate is not unique in captured context"
                    );
                }
                candidate.with_unique(unique)
            })
            .collect()
    }

    /// Validate and keep only the unique candidates.
    pub fn unique_only(
        &self,
        snapshot: &ElementSnapshot,
        candidates: Vec<SelectorCandidate>,
    ) -> Vec<SelectorCandidate> {
        self.validate(snapshot, candidates)
            .into_iter()
            .filter(|candidate| candidate.is_unique)
            .collect()
    }
}
