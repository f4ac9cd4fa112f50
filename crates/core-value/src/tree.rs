//! The variable tree: named string leaves addressed by bracket and dot paths.
//!
//! Bracket indices and dotted property segments fold into one child map, so
//! `$S[2].PORT.CLASS` traverses children `2 -> PORT -> CLASS`. Reads of unborn
//! paths yield the empty string without creating nodes; writes vivify every
//! intermediate node on the way down.

use std::collections::BTreeMap;

use serde_json::{Map as JsonMap, Value as Json};
use thiserror::Error;

use crate::value::{format_number, Value};

/// Key reserved in the JSON encoding for a node's own leaf value when the
/// node also has children. Path segments are never empty, so it cannot clash.
const OWN_VALUE_KEY: &str = "";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("empty variable name")]
    EmptyBase,
    #[error("unbalanced '[' in variable path {0:?}")]
    UnbalancedBracket(String),
    #[error("empty path segment in {0:?}")]
    EmptySegment(String),
}

/// One path segment after the base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seg {
    /// `[i]` with the index already resolved to its string form.
    Index(String),
    /// `.prop`, stored upper-cased.
    Prop(String),
}

impl Seg {
    pub fn key(&self) -> &str {
        match self {
            Seg::Index(k) | Seg::Prop(k) => k,
        }
    }
}

/// A parsed variable path: upper-cased base identifier plus segments in
/// traversal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarPath {
    pub base: String,
    pub segments: Vec<Seg>,
}

impl VarPath {
    pub fn root(base: &str) -> Self {
        Self {
            base: base.to_ascii_uppercase(),
            segments: Vec::new(),
        }
    }

    /// Parse `name[index].prop...` into a path. `resolve` supplies the string
    /// form of `$var` index expressions; indices that parse as whole numbers
    /// are canonicalized so `[2]`, `[ 2 ]` and `[2.0]` address the same child.
    pub fn parse(raw: &str, resolve: &dyn Fn(&str) -> String) -> Result<Self, PathError> {
        let raw = raw.trim().trim_start_matches('$');
        let bytes = raw.as_bytes();
        let mut i = 0;
        while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
            i += 1;
        }
        if i == 0 {
            return Err(PathError::EmptyBase);
        }
        let mut path = VarPath::root(&raw[..i]);
        while i < bytes.len() {
            match bytes[i] {
                b'[' => {
                    let mut depth = 1;
                    let start = i + 1;
                    let mut j = start;
                    while j < bytes.len() && depth > 0 {
                        match bytes[j] {
                            b'[' => depth += 1,
                            b']' => depth -= 1,
                            _ => {}
                        }
                        j += 1;
                    }
                    if depth != 0 {
                        return Err(PathError::UnbalancedBracket(raw.to_string()));
                    }
                    let inner = raw[start..j - 1].trim();
                    if inner.is_empty() {
                        return Err(PathError::EmptySegment(raw.to_string()));
                    }
                    let resolved = if let Some(var) = inner.strip_prefix('$') {
                        resolve(var)
                    } else {
                        inner.to_string()
                    };
                    path.segments.push(Seg::Index(canonical_index(&resolved)));
                    i = j;
                }
                b'.' => {
                    let start = i + 1;
                    let mut j = start;
                    while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_')
                    {
                        j += 1;
                    }
                    if j == start {
                        return Err(PathError::EmptySegment(raw.to_string()));
                    }
                    path.segments
                        .push(Seg::Prop(raw[start..j].to_ascii_uppercase()));
                    i = j;
                }
                _ => return Err(PathError::EmptySegment(raw.to_string())),
            }
        }
        Ok(path)
    }

    /// Append a bracket index, canonicalizing numeric forms.
    pub fn push_index(&mut self, raw: &str) {
        self.segments.push(Seg::Index(canonical_index(raw)));
    }

    /// Append a dotted property segment (stored upper-cased).
    pub fn push_prop(&mut self, prop: &str) {
        self.segments.push(Seg::Prop(prop.to_ascii_uppercase()));
    }

    /// Full-path name used as the durable-store key, e.g. `S[2].PORT.CLASS`.
    pub fn storage_key(&self) -> String {
        let mut out = self.base.clone();
        for seg in &self.segments {
            match seg {
                Seg::Index(k) => {
                    out.push('[');
                    out.push_str(k);
                    out.push(']');
                }
                Seg::Prop(k) => {
                    out.push('.');
                    out.push_str(k);
                }
            }
        }
        out
    }
}

/// Numeric index canonicalization: whole numbers lose spaces and any
/// fractional-zero suffix so they address a stable child key.
fn canonical_index(s: &str) -> String {
    match s.trim().parse::<f64>() {
        Ok(n) if n.fract() == 0.0 && n.is_finite() => format_number(n),
        _ => s.trim().to_string(),
    }
}

/// One node: a string leaf plus an (often empty) child map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VarNode {
    pub value: String,
    pub children: BTreeMap<String, VarNode>,
}

impl VarNode {
    fn from_value(v: &Value) -> Self {
        let mut node = VarNode::default();
        node.assign(v);
        node
    }

    fn assign(&mut self, v: &Value) {
        match v {
            Value::Str(s) => {
                self.value = s.clone();
            }
            Value::Num(n) => {
                self.value = format_number(*n);
            }
            Value::Array(map) => {
                self.value.clear();
                self.children = map
                    .iter()
                    .map(|(k, v)| (k.clone(), VarNode::from_value(v)))
                    .collect();
            }
        }
    }

    fn to_value(&self) -> Value {
        if self.children.is_empty() {
            Value::Str(self.value.clone())
        } else {
            Value::Array(
                self.children
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
            )
        }
    }

    fn to_json(&self) -> Json {
        if self.children.is_empty() {
            return Json::String(self.value.clone());
        }
        let mut map = JsonMap::new();
        if !self.value.is_empty() {
            map.insert(OWN_VALUE_KEY.to_string(), Json::String(self.value.clone()));
        }
        for (k, v) in &self.children {
            map.insert(k.clone(), v.to_json());
        }
        Json::Object(map)
    }

    fn from_json(json: &Json) -> Self {
        let mut node = VarNode::default();
        match json {
            Json::String(s) => node.value = s.clone(),
            Json::Number(n) => node.value = n.to_string(),
            Json::Object(map) => {
                for (k, v) in map {
                    if k == OWN_VALUE_KEY {
                        if let Json::String(s) = v {
                            node.value = s.clone();
                        }
                    } else {
                        node.children.insert(k.clone(), VarNode::from_json(v));
                    }
                }
            }
            _ => {}
        }
        node
    }
}

/// The per-script variable store.
#[derive(Debug, Clone, Default)]
pub struct VarTree {
    roots: BTreeMap<String, VarNode>,
}

impl VarTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, path: &VarPath) -> Option<&VarNode> {
        let mut node = self.roots.get(&path.base)?;
        for seg in &path.segments {
            node = node.children.get(seg.key())?;
        }
        Some(node)
    }

    fn node_mut_vivify(&mut self, path: &VarPath) -> &mut VarNode {
        let mut node = self.roots.entry(path.base.clone()).or_default();
        for seg in &path.segments {
            node = node.children.entry(seg.key().to_string()).or_default();
        }
        node
    }

    /// Read a path. Unborn paths yield `None`; the caller supplies the
    /// empty-string default after its own fallback chain.
    pub fn read(&self, path: &VarPath) -> Option<Value> {
        self.node(path).map(VarNode::to_value)
    }

    /// Read the node's own string leaf, ignoring children. This is what a
    /// script sees when it names a node that also has indexed children.
    pub fn read_text(&self, path: &VarPath) -> Option<String> {
        self.node(path).map(|n| n.value.clone())
    }

    /// Write a path, creating every intermediate node.
    pub fn write(&mut self, path: &VarPath, value: &Value) {
        self.node_mut_vivify(path).assign(value);
    }

    pub fn exists(&self, path: &VarPath) -> bool {
        self.node(path).is_some()
    }

    /// Remove a node and its whole subtree.
    pub fn delete(&mut self, path: &VarPath) {
        match path.segments.split_last() {
            None => {
                self.roots.remove(&path.base);
            }
            Some((last, parents)) => {
                let parent = VarPath {
                    base: path.base.clone(),
                    segments: parents.to_vec(),
                };
                let Some(mut node) = self.roots.get_mut(&parent.base) else {
                    return;
                };
                for seg in &parent.segments {
                    match node.children.get_mut(seg.key()) {
                        Some(child) => node = child,
                        None => return,
                    }
                }
                node.children.remove(last.key());
            }
        }
    }

    /// Pre-create a 1-based array shape: `dims = [3, 2]` vivifies
    /// `v[1][1] .. v[3][2]`.
    pub fn set_dimensions(&mut self, path: &VarPath, dims: &[usize]) {
        fn fill(node: &mut VarNode, dims: &[usize]) {
            let Some((&first, rest)) = dims.split_first() else {
                return;
            };
            for i in 1..=first {
                let child = node.children.entry(i.to_string()).or_default();
                fill(child, rest);
            }
        }
        fill(self.node_mut_vivify(path), dims);
    }

    pub fn clear(&mut self) {
        self.roots.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn to_json(&self) -> Json {
        Json::Object(
            self.roots
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    pub fn from_json(json: &Json) -> Self {
        let mut tree = VarTree::new();
        if let Json::Object(map) = json {
            for (k, v) in map {
                tree.roots.insert(k.clone(), VarNode::from_json(v));
            }
        }
        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_vars(_: &str) -> String {
        String::new()
    }

    fn p(raw: &str) -> VarPath {
        VarPath::parse(raw, &no_vars).unwrap()
    }

    #[test]
    fn parse_brackets_and_dots_fold_into_one_path() {
        let path = p("$s[2].port.class");
        assert_eq!(path.base, "S");
        assert_eq!(
            path.segments,
            vec![
                Seg::Index("2".into()),
                Seg::Prop("PORT".into()),
                Seg::Prop("CLASS".into()),
            ]
        );
        assert_eq!(path.storage_key(), "S[2].PORT.CLASS");
    }

    #[test]
    fn variable_indices_resolve_through_the_callback() {
        let resolve = |name: &str| {
            assert_eq!(name, "i");
            "7".to_string()
        };
        let path = VarPath::parse("a[$i]", &resolve).unwrap();
        assert_eq!(path.segments, vec![Seg::Index("7".into())]);
    }

    #[test]
    fn numeric_indices_canonicalize() {
        assert_eq!(p("a[2.0]").segments, vec![Seg::Index("2".into())]);
        assert_eq!(p("a[ 2 ]").segments, vec![Seg::Index("2".into())]);
        assert_eq!(p("a[north]").segments, vec![Seg::Index("north".into())]);
    }

    #[test]
    fn unbalanced_bracket_is_an_error() {
        assert!(matches!(
            VarPath::parse("a[1", &no_vars),
            Err(PathError::UnbalancedBracket(_))
        ));
    }

    #[test]
    fn read_of_unborn_path_does_not_vivify() {
        let tree = VarTree::new();
        assert_eq!(tree.read(&p("a[1].b")), None);
        assert!(tree.is_empty());
    }

    #[test]
    fn write_vivifies_and_reads_back() {
        let mut tree = VarTree::new();
        tree.write(&p("s[2].port.class"), &Value::Num(3.0));
        assert_eq!(
            tree.read(&p("S[2].PORT.CLASS")),
            Some(Value::Str("3".into()))
        );
        // The prefix exists as a node now.
        assert!(tree.exists(&p("s[2].port")));
        assert!(tree.exists(&p("s")));
    }

    #[test]
    fn numeric_writes_store_canonical_decimal() {
        let mut tree = VarTree::new();
        tree.write(&p("n"), &Value::Num(5.0));
        assert_eq!(tree.read(&p("n")), Some(Value::Str("5".into())));
        tree.write(&p("n"), &Value::Num(5.25));
        assert_eq!(tree.read(&p("n")), Some(Value::Str("5.25".into())));
    }

    #[test]
    fn delete_removes_subtree() {
        let mut tree = VarTree::new();
        tree.write(&p("a[1].x"), &Value::Str("1".into()));
        tree.write(&p("a[2].x"), &Value::Str("2".into()));
        tree.delete(&p("a[1]"));
        assert_eq!(tree.read(&p("a[1].x")), None);
        assert_eq!(tree.read(&p("a[2].x")), Some(Value::Str("2".into())));
    }

    #[test]
    fn set_dimensions_prefills_one_based() {
        let mut tree = VarTree::new();
        tree.set_dimensions(&p("grid"), &[2, 3]);
        assert!(tree.exists(&p("grid[1][1]")));
        assert!(tree.exists(&p("grid[2][3]")));
        assert!(!tree.exists(&p("grid[0][1]")));
        assert!(!tree.exists(&p("grid[3][1]")));
    }

    #[test]
    fn json_round_trip_preserves_every_path() {
        let mut tree = VarTree::new();
        tree.write(&p("name"), &Value::Str("guest".into()));
        tree.write(&p("s[2].port.class"), &Value::Num(3.0));
        tree.write(&p("s[2].warp[1]"), &Value::Num(101.0));
        // A node that carries both its own value and children.
        tree.write(&p("s[2]"), &Value::Str("sector two".into()));

        let json = tree.to_json();
        let restored = VarTree::from_json(&json);
        for path in ["name", "s[2].port.class", "s[2].warp[1]", "s[2]"] {
            assert_eq!(restored.read(&p(path)), tree.read(&p(path)), "{path}");
        }
    }
}
