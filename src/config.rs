//! Build and display configuration.

use crate::column::Encoding;
use crate::error::{FabricError, Result};
use crate::interop::Node;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// Settings for assembling a corpus.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricConfig {
    /// Layout of node feature columns
    pub encoding: Encoding,
    /// Node types to rank most comprehensive, in this order
    pub levels: Option<Vec<String>>,
    /// Placement rules of the form `"smaller < big1, big2"`
    pub level_constraints: Vec<String>,
    /// Defaults for unraveling
    pub unravel: UnravelOptions,
}

impl FabricConfig {
    /// Smallest footprint: every column sparse.
    pub fn compact() -> Self {
        FabricConfig {
            encoding: Encoding::Sparse,
            ..Self::default()
        }
    }

    /// Fastest lookups: every column dense.
    pub fn fast() -> Self {
        FabricConfig {
            encoding: Encoding::Dense,
            ..Self::default()
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| FabricError::Config(e.to_string()))
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| FabricError::Config(e.to_string()))
    }
}

/// Options that shape how an unraveled tree is filtered and annotated.
///
/// None of these change the nesting of the chunks that remain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnravelOptions {
    /// Types left out of the tree entirely
    pub hidden_types: BTreeSet<String>,
    /// Types whose chunks are marked as base units of display
    pub base_types: BTreeSet<String>,
    /// Node to colour name
    pub highlights: BTreeMap<Node, String>,
    /// Right-to-left script: swaps the left and right boundary classes
    pub rtl: bool,
    /// Skip nodes of the focus type that cover the focus node
    pub exclude_covering_same_type: bool,
    /// Per focus type, the only types unraveled inside it
    pub descendant_types: BTreeMap<String, BTreeSet<String>>,
}

impl Default for UnravelOptions {
    fn default() -> Self {
        UnravelOptions {
            hidden_types: BTreeSet::new(),
            base_types: BTreeSet::new(),
            highlights: BTreeMap::new(),
            rtl: false,
            exclude_covering_same_type: true,
            descendant_types: BTreeMap::new(),
        }
    }
}

impl UnravelOptions {
    pub fn hide<S: Into<String>>(mut self, node_type: S) -> Self {
        self.hidden_types.insert(node_type.into());
        self
    }

    pub fn highlight<S: Into<String>>(mut self, node: Node, colour: S) -> Self {
        self.highlights.insert(node, colour.into());
        self
    }

    pub fn base<S: Into<String>>(mut self, node_type: S) -> Self {
        self.base_types.insert(node_type.into());
        self
    }

    /// Restrict what shows up when a node of `node_type` is unraveled.
    pub fn descend<S, I>(mut self, node_type: S, types: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.descendant_types
            .entry(node_type.into())
            .or_default()
            .extend(types.into_iter().map(Into::into));
        self
    }

    pub fn right_to_left(mut self) -> Self {
        self.rtl = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_presets() {
        assert_eq!(FabricConfig::default().encoding, Encoding::Auto);
        assert_eq!(FabricConfig::compact().encoding, Encoding::Sparse);
        assert_eq!(FabricConfig::fast().encoding, Encoding::Dense);
        assert!(UnravelOptions::default().exclude_covering_same_type);
    }

    #[test]
    fn test_partial_json() {
        let cfg = FabricConfig::from_json_str(
            r#"{ "encoding": "sparse", "level_constraints": ["phrase < clause"],
                 "unravel": { "rtl": true, "highlights": { "7": "lightyellow" } } }"#,
        )
        .unwrap();
        assert_eq!(cfg.encoding, Encoding::Sparse);
        assert_eq!(cfg.levels, None);
        assert_eq!(cfg.level_constraints, vec!["phrase < clause".to_string()]);
        assert!(cfg.unravel.rtl);
        assert!(cfg.unravel.exclude_covering_same_type);
        assert_eq!(cfg.unravel.highlights.get(&7).map(String::as_str), Some("lightyellow"));
        assert!(cfg.unravel.descendant_types.is_empty());
    }

    #[test]
    fn test_descendant_types_from_json() {
        let cfg = FabricConfig::from_json_str(
            r#"{ "unravel": { "descendant_types": { "clause": ["phrase", "word"] } } }"#,
        )
        .unwrap();
        let expected = UnravelOptions::default().descend("clause", ["word", "phrase"]);
        assert_eq!(cfg.unravel, expected);
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(
            FabricConfig::from_json_str(r#"{ "encoding": "zipped" }"#),
            Err(FabricError::Config(_))
        ));
    }

    #[test]
    fn test_json_file_round_trip() {
        let cfg = FabricConfig {
            levels: Some(vec!["book".into(), "chapter".into()]),
            unravel: UnravelOptions::default().hide("lex").base("phrase"),
            ..FabricConfig::compact()
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(cfg.to_json().unwrap().as_bytes()).unwrap();
        let loaded = FabricConfig::from_json_file(file.path()).unwrap();
        assert_eq!(loaded, cfg);
    }
}
