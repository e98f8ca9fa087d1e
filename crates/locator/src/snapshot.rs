//! Snapshot normalisation
//!
//! Platform adapters map raw attribute dictionaries onto one canonical
//! vocabulary ([`Attr`]). The captured tree is kept as an arena of
//! [`NodeDescriptor`]s so uniqueness checks are a pure function of the
//! captured evidence.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use resel_core_types::{LogicalId, Platform};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::LocatorError;
use crate::policy::NormalizerCfg;

/// Canonical attribute names shared by every platform.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Attr {
    Identifier,
    TestMarker,
    AccessibleLabel,
    VisibleText,
    StructuralClass,
    DomTag,
    DomName,
    DomHref,
    DomClass,
    Enabled,
    Checked,
    Clickable,
}

impl Attr {
    /// Free-form values that get truncated to the configured length.
    pub fn is_text_like(&self) -> bool {
        matches!(
            self,
            Attr::AccessibleLabel | Attr::VisibleText | Attr::DomHref | Attr::DomClass
        )
    }

    pub fn is_flag(&self) -> bool {
        matches!(self, Attr::Enabled | Attr::Checked | Attr::Clickable)
    }
}

pub type AttributeMap = BTreeMap<Attr, String>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// One node of a raw capture, parents listed before children.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawNode {
    #[serde(default)]
    pub parent: Option<usize>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub bounds: Option<Bounds>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawTree {
    pub nodes: Vec<RawNode>,
}

/// Raw per-platform element record as delivered by the instrumentation layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawElementRecord {
    #[serde(default)]
    pub logical_id: Option<String>,
    pub platform: Platform,
    pub tree: RawTree,
    pub target: usize,
}

/// Normalised node in the captured tree arena.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeDescriptor {
    pub parent: Option<usize>,
    pub attributes: AttributeMap,
    pub bounds: Bounds,
    /// 1-based position among all siblings.
    pub child_position: usize,
    /// 1-based position among siblings sharing the structural class.
    pub class_ordinal: usize,
    /// Visible text of the node and its descendants in document order,
    /// whitespace collapsed. This is what `normalize-space(.)` sees.
    pub text_content: String,
}

impl NodeDescriptor {
    pub fn attr(&self, attr: Attr) -> Option<&str> {
        self.attributes.get(&attr).map(String::as_str)
    }

    pub fn class(&self) -> &str {
        self.attr(Attr::StructuralClass).unwrap_or("*")
    }

    /// Ordinal used in indexed paths. A `*` step counts every sibling.
    pub fn path_ordinal(&self) -> usize {
        if self.attr(Attr::StructuralClass).is_some() {
            self.class_ordinal
        } else {
            self.child_position
        }
    }
}

/// One step of a structural path, root first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSegment {
    pub class: String,
    pub identifier: Option<String>,
    /// Class ordinal, or the sibling position for a `*` step.
    pub ordinal: usize,
}

/// Captured tree context, immutable once normalised.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TreeContext {
    nodes: Vec<NodeDescriptor>,
}

impl TreeContext {
    pub fn nodes(&self) -> &[NodeDescriptor] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&NodeDescriptor> {
        self.nodes.get(index)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Concatenated descendant text of a node, `None` when it is empty.
    pub fn text_content(&self, index: usize) -> Option<&str> {
        self.nodes
            .get(index)
            .map(|node| node.text_content.as_str())
            .filter(|text| !text.is_empty())
    }

    /// Indices from the root down to `index`, inclusive.
    pub fn lineage(&self, index: usize) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut cursor = Some(index);
        while let Some(current) = cursor {
            chain.push(current);
            cursor = self.nodes.get(current).and_then(|node| node.parent);
        }
        chain.reverse();
        chain
    }

    pub fn path_segments(&self, index: usize) -> Vec<PathSegment> {
        self.lineage(index)
            .into_iter()
            .filter_map(|i| self.nodes.get(i))
            .map(|node| PathSegment {
                class: node.class().to_string(),
                identifier: node.attr(Attr::Identifier).map(str::to_string),
                ordinal: node.path_ordinal(),
            })
            .collect()
    }

    /// Structural classes from the root down to `index`.
    pub fn class_chain(&self, index: usize) -> Vec<&str> {
        self.lineage(index)
            .into_iter()
            .filter_map(|i| self.nodes.get(i))
            .map(NodeDescriptor::class)
            .collect()
    }

    /// Nearest strict ancestor carrying an identifier, with the class chain
    /// below it down to `index`.
    pub fn anchored_chain(&self, index: usize) -> Option<(usize, Vec<&str>)> {
        let lineage = self.lineage(index);
        let (_, ancestors) = lineage.split_last()?;
        let anchor_pos = ancestors.iter().rposition(|i| {
            self.nodes
                .get(*i)
                .and_then(|node| node.attr(Attr::Identifier))
                .is_some()
        })?;
        let chain = lineage[anchor_pos + 1..]
            .iter()
            .filter_map(|i| self.nodes.get(*i))
            .map(NodeDescriptor::class)
            .collect();
        Some((lineage[anchor_pos], chain))
    }
}

/// One element at one observation instant.
#[derive(Clone, Debug)]
pub struct ElementSnapshot {
    pub logical_id: LogicalId,
    pub platform: Platform,
    pub attributes: AttributeMap,
    pub bounds: Bounds,
    pub structural_path: Vec<PathSegment>,
    /// Arena index of the element inside `context`.
    pub target: usize,
    pub context: Arc<TreeContext>,
    pub captured_at: DateTime<Utc>,
}

impl ElementSnapshot {
    pub fn attr(&self, attr: Attr) -> Option<&str> {
        self.attributes.get(&attr).map(String::as_str)
    }

    pub fn flag(&self, attr: Attr) -> Option<bool> {
        self.attr(attr).map(|value| value == "true")
    }

    pub fn target_node(&self) -> Option<&NodeDescriptor> {
        self.context.node(self.target)
    }

    /// String value of the element as a DOM query sees it: its own text
    /// followed by every descendant's.
    pub fn text_content(&self) -> Option<&str> {
        self.context
            .text_content(self.target)
            .or_else(|| self.attr(Attr::VisibleText))
    }

    /// Whether any ancestor was captured along with the element.
    pub fn has_hierarchy(&self) -> bool {
        self.structural_path.len() > 1
    }
}

/// Converts raw records into canonical snapshots.
#[derive(Clone, Debug, Default)]
pub struct SnapshotNormalizer {
    cfg: NormalizerCfg,
}

impl SnapshotNormalizer {
    pub fn new(cfg: NormalizerCfg) -> Self {
        Self { cfg }
    }

    pub fn normalize(&self, raw: RawElementRecord) -> Result<ElementSnapshot, LocatorError> {
        let logical_id = raw
            .logical_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(LogicalId::new)
            .ok_or_else(|| {
                LocatorError::MalformedInput("record carries no logical_id".to_string())
            })?;

        if raw.target >= raw.tree.nodes.len() {
            return Err(LocatorError::MalformedInput(format!(
                "target index {} outside tree of {} nodes for '{}'",
                raw.target,
                raw.tree.nodes.len(),
                logical_id
            )));
        }

        let context = self.build_context(raw.platform, &raw.tree)?;
        let target_node = context
            .node(raw.target)
            .cloned()
            .ok_or_else(|| LocatorError::Internal("target vanished from arena".to_string()))?;
        let structural_path = context.path_segments(raw.target);

        debug!(
            logical_id = %logical_id,
            platform = raw.platform.name(),
            nodes = context.len(),
            depth = structural_path.len(),
            "normalised element snapshot"
        );

        Ok(ElementSnapshot {
            logical_id,
            platform: raw.platform,
            attributes: target_node.attributes,
            bounds: target_node.bounds,
            structural_path,
            target: raw.target,
            context: Arc::new(context),
            captured_at: Utc::now(),
        })
    }

    fn build_context(&self, platform: Platform, tree: &RawTree) -> Result<TreeContext, LocatorError> {
        let mut nodes = Vec::with_capacity(tree.nodes.len());
        let mut child_counts: HashMap<Option<usize>, usize> = HashMap::new();
        let mut class_counts: HashMap<(Option<usize>, String), usize> = HashMap::new();

        for (index, raw) in tree.nodes.iter().enumerate() {
            if let Some(parent) = raw.parent {
                if parent >= index {
                    return Err(LocatorError::MalformedInput(format!(
                        "node {index} references parent {parent} that is not listed before it"
                    )));
                }
            }
            let attributes = self.canonical_attributes(platform, &raw.attributes);
            let class = attributes
                .get(&Attr::StructuralClass)
                .cloned()
                .unwrap_or_else(|| "*".to_string());

            let position = child_counts.entry(raw.parent).or_insert(0);
            *position += 1;
            let child_position = *position;
            let ordinal = class_counts.entry((raw.parent, class)).or_insert(0);
            *ordinal += 1;

            nodes.push(NodeDescriptor {
                parent: raw.parent,
                attributes,
                bounds: raw.bounds.unwrap_or_default(),
                child_position,
                class_ordinal: *ordinal,
                text_content: String::new(),
            });
        }
        fill_text_content(&mut nodes);
        Ok(TreeContext { nodes })
    }

    fn canonical_attributes(
        &self,
        platform: Platform,
        raw: &HashMap<String, String>,
    ) -> AttributeMap {
        let mut map = AttributeMap::new();
        for (key, value) in raw {
            let Some(attr) = canonical_attr(platform, key) else {
                debug!(platform = platform.name(), key = %key, "dropping unmapped attribute");
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let value = if attr.is_flag() {
                normalize_flag(value)
            } else if attr.is_text_like() {
                truncate_chars(value, self.cfg.max_text_len)
            } else {
                value.to_string()
            };
            if attr == Attr::DomTag {
                let tag = value.to_ascii_lowercase();
                map.insert(Attr::StructuralClass, tag.clone());
                map.insert(Attr::DomTag, tag);
                continue;
            }
            map.insert(attr, value);
        }
        map
    }
}

/// Platform adapter tables: raw key to canonical attribute.
fn canonical_attr(platform: Platform, key: &str) -> Option<Attr> {
    let attr = match platform {
        Platform::Android => match key {
            "resource-id" | "resource_id" => Attr::Identifier,
            "test-tag" | "test_tag" => Attr::TestMarker,
            "content-desc" | "content_desc" => Attr::AccessibleLabel,
            "text" => Attr::VisibleText,
            "class" | "class_name" => Attr::StructuralClass,
            "enabled" => Attr::Enabled,
            "checked" => Attr::Checked,
            "clickable" => Attr::Clickable,
            _ => return None,
        },
        Platform::Ios => match key {
            "identifier" | "accessibility-id" | "accessibility_id" => Attr::Identifier,
            "test-id" | "test_id" => Attr::TestMarker,
            "label" => Attr::AccessibleLabel,
            "value" => Attr::VisibleText,
            "type" => Attr::StructuralClass,
            "enabled" => Attr::Enabled,
            "selected" => Attr::Checked,
            "hittable" => Attr::Clickable,
            _ => return None,
        },
        Platform::Web => match key {
            "id" => Attr::Identifier,
            "data-testid" | "data-test-id" => Attr::TestMarker,
            "aria-label" => Attr::AccessibleLabel,
            "text" | "innerText" => Attr::VisibleText,
            "tag" | "tagName" => Attr::DomTag,
            "name" => Attr::DomName,
            "href" => Attr::DomHref,
            "class" | "className" => Attr::DomClass,
            "enabled" => Attr::Enabled,
            "checked" => Attr::Checked,
            _ => return None,
        },
    };
    Some(attr)
}

fn normalize_flag(value: &str) -> String {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => "true".to_string(),
        _ => "false".to_string(),
    }
}

/// Parents precede children, so a reverse sweep sees every child before its
/// parent.
fn fill_text_content(nodes: &mut [NodeDescriptor]) {
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (index, node) in nodes.iter().enumerate() {
        if let Some(parent) = node.parent {
            children[parent].push(index);
        }
    }
    let mut raw: Vec<String> = vec![String::new(); nodes.len()];
    for index in (0..nodes.len()).rev() {
        let mut text = nodes[index]
            .attr(Attr::VisibleText)
            .unwrap_or_default()
            .to_string();
        for child in &children[index] {
            text.push_str(&raw[*child]);
        }
        raw[index] = text;
    }
    for (node, text) in nodes.iter_mut().zip(raw) {
        node.text_content = collapse_ws(&text);
    }
}

pub(crate) fn collapse_ws(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((cut, _)) => value[..cut].to_string(),
        None => value.to_string(),
    }
}
