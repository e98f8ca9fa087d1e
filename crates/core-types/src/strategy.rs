use std::fmt;
use std::str::FromStr;

use crate::ReselError;

/// UI tree family an element was captured from.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Platform {
    /// Native platform A (Android view hierarchy).
    Android,
    /// Native platform B (iOS accessibility hierarchy).
    Ios,
    /// Browser DOM.
    Web,
}

impl Platform {
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
            Platform::Web => "web",
        }
    }

    pub fn is_native(&self) -> bool {
        !matches!(self, Platform::Web)
    }

    pub fn all() -> [Platform; 3] {
        [Platform::Android, Platform::Ios, Platform::Web]
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Platform {
    type Err = ReselError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "android" | "native-a" => Ok(Platform::Android),
            "ios" | "native-b" => Ok(Platform::Ios),
            "web" => Ok(Platform::Web),
            other => Err(ReselError::new(format!("unknown platform '{other}'"))),
        }
    }
}

/// Named technique for locating an element.
///
/// Declaration order doubles as the deterministic tie-breaker when two
/// candidates share a base priority, so new variants must be appended with
/// care.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "kebab-case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum SelectorStrategy {
    ExactId,
    TestMarker,
    AccessibleLabel,
    VisibleText,
    NameAttribute,
    ClassAttribute,
    /// Class chain anchored at the nearest ancestor carrying an identifier.
    StructuralPathShort,
    /// Class chain from the root, without ordinals.
    StructuralPath,
    /// Class chain from the root with sibling ordinals.
    IndexedPath,
    XpathById,
    CssById,
    VisibleTextExact,
    VisibleTextContains,
    CssNthChild,
    TagOnly,
    IndexedXpath,
}

impl SelectorStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            SelectorStrategy::ExactId => "exact-id",
            SelectorStrategy::TestMarker => "test-marker",
            SelectorStrategy::AccessibleLabel => "accessible-label",
            SelectorStrategy::VisibleText => "visible-text",
            SelectorStrategy::NameAttribute => "name-attribute",
            SelectorStrategy::ClassAttribute => "class-attribute",
            SelectorStrategy::StructuralPathShort => "structural-path-short",
            SelectorStrategy::StructuralPath => "structural-path",
            SelectorStrategy::IndexedPath => "indexed-path",
            SelectorStrategy::XpathById => "xpath-by-id",
            SelectorStrategy::CssById => "css-by-id",
            SelectorStrategy::VisibleTextExact => "visible-text-exact",
            SelectorStrategy::VisibleTextContains => "visible-text-contains",
            SelectorStrategy::CssNthChild => "css-nth-child",
            SelectorStrategy::TagOnly => "tag-only",
            SelectorStrategy::IndexedXpath => "indexed-xpath",
        }
    }

    pub fn all() -> &'static [SelectorStrategy] {
        &[
            SelectorStrategy::ExactId,
            SelectorStrategy::TestMarker,
            SelectorStrategy::AccessibleLabel,
            SelectorStrategy::VisibleText,
            SelectorStrategy::NameAttribute,
            SelectorStrategy::ClassAttribute,
            SelectorStrategy::StructuralPathShort,
            SelectorStrategy::StructuralPath,
            SelectorStrategy::IndexedPath,
            SelectorStrategy::XpathById,
            SelectorStrategy::CssById,
            SelectorStrategy::VisibleTextExact,
            SelectorStrategy::VisibleTextContains,
            SelectorStrategy::CssNthChild,
            SelectorStrategy::TagOnly,
            SelectorStrategy::IndexedXpath,
        ]
    }

    /// Strategies whose value encodes sibling ordinals are unique by construction.
    pub fn is_indexed(&self) -> bool {
        matches!(
            self,
            SelectorStrategy::IndexedPath | SelectorStrategy::IndexedXpath
        )
    }

    pub fn is_text(&self) -> bool {
        matches!(
            self,
            SelectorStrategy::VisibleText
                | SelectorStrategy::VisibleTextExact
                | SelectorStrategy::VisibleTextContains
        )
    }

    pub fn is_web_only(&self) -> bool {
        matches!(
            self,
            SelectorStrategy::XpathById
                | SelectorStrategy::CssById
                | SelectorStrategy::VisibleTextExact
                | SelectorStrategy::VisibleTextContains
                | SelectorStrategy::CssNthChild
                | SelectorStrategy::TagOnly
                | SelectorStrategy::IndexedXpath
        )
    }
}

impl fmt::Display for SelectorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SelectorStrategy {
    type Err = ReselError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        SelectorStrategy::all()
            .iter()
            .copied()
            .find(|strategy| strategy.name() == needle)
            .ok_or_else(|| ReselError::new(format!("unknown strategy '{needle}'")))
    }
}
