//! Key-path algebra.
//!
//! Key paths address values inside nested JSON documents using the
//! `name.sub[3].leaf` syntax. A *template* path may contain `[]`
//! placeholders for array levels that are not bound yet; a *concrete* path
//! has every level resolved to a literal index.
//!
//! Parsing produces a [`KeyPath`] made of [`PathSegment`]s, and that single
//! representation drives value reads/writes as well as schema resolution.

use crate::error::{PathError, Result};
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

/// One array level of a segment: `Some(n)` for `[n]`, `None` for `[]`.
pub type Index = Option<usize>;

/// A property name followed by zero or more array levels.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PathSegment {
    pub name: String,
    pub indices: SmallVec<[Index; 2]>,
}

impl PathSegment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indices: SmallVec::new(),
        }
    }

    pub fn with_index(mut self, index: Index) -> Self {
        self.indices.push(index);
        self
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for index in &self.indices {
            match index {
                Some(i) => write!(f, "[{i}]")?,
                None => f.write_str("[]")?,
            }
        }
        Ok(())
    }
}

/// A parsed dotted/bracketed key path.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct KeyPath {
    segments: Vec<PathSegment>,
}

impl KeyPath {
    /// Parse a key path such as `a.b[2].c` or the template `a.b[].c`.
    pub fn parse(input: &str) -> Result<Self, PathError> {
        let malformed = |reason| PathError::Malformed {
            path: input.to_string(),
            reason,
        };

        if input.is_empty() {
            return Err(malformed("empty path"));
        }

        let mut segments = Vec::new();
        for part in input.split('.') {
            let (name, mut rest) = match part.find('[') {
                Some(pos) => (&part[..pos], &part[pos..]),
                None => (part, ""),
            };
            if name.is_empty() {
                return Err(malformed("empty segment name"));
            }
            if name.contains(']') {
                return Err(malformed("unexpected ']'"));
            }

            let mut segment = PathSegment::new(name);
            while !rest.is_empty() {
                if !rest.starts_with('[') {
                    return Err(malformed("unexpected characters after ']'"));
                }
                let close = rest.find(']').ok_or_else(|| malformed("unclosed '['"))?;
                let inner = &rest[1..close];
                if inner.is_empty() {
                    segment.indices.push(None);
                } else {
                    let index = inner
                        .parse::<usize>()
                        .map_err(|_| malformed("array index is not a non-negative integer"))?;
                    segment.indices.push(Some(index));
                }
                rest = &rest[close + 1..];
            }
            segments.push(segment);
        }

        Ok(Self { segments })
    }

    /// Parse a path that must not contain `[]` placeholders.
    pub fn parse_concrete(input: &str) -> Result<Self, PathError> {
        let path = Self::parse(input)?;
        if !path.is_concrete() {
            return Err(PathError::Unresolved(input.to_string()));
        }
        Ok(path)
    }

    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when every array level carries a literal index.
    pub fn is_concrete(&self) -> bool {
        self.indices().all(|index| index.is_some())
    }

    /// Number of array levels across the whole path.
    pub fn array_depth(&self) -> usize {
        self.indices().count()
    }

    fn indices(&self) -> impl Iterator<Item = &Index> {
        self.segments.iter().flat_map(|s| s.indices.iter())
    }

    /// The concrete indices in order, skipping placeholders.
    pub fn concrete_indices(&self) -> Vec<usize> {
        self.indices().filter_map(|index| *index).collect()
    }

    /// Replace every literal index by a `[]` placeholder.
    pub fn to_template(&self) -> Self {
        let mut out = self.clone();
        for segment in &mut out.segments {
            for index in segment.indices.iter_mut() {
                *index = None;
            }
        }
        out
    }

    /// Bind placeholders left to right; extra placeholders stay `[]`.
    pub fn apply_indices(&self, indices: &[usize]) -> Self {
        let mut out = self.clone();
        let mut next = indices.iter();
        for segment in &mut out.segments {
            for index in segment.indices.iter_mut() {
                if index.is_none() {
                    match next.next() {
                        Some(i) => *index = Some(*i),
                        None => return out,
                    }
                }
            }
        }
        out
    }

    /// The path without its last segment.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// Drop the trailing array level of the last segment, if it has one.
    pub fn without_last_index(&self) -> Option<(Self, Index)> {
        let mut out = self.clone();
        let index = out.segments.last_mut()?.indices.pop()?;
        Some((out, index))
    }

    /// The path of the array owning the `level`-th array step (0-based),
    /// i.e. everything before that step. `None` when the path has fewer
    /// array levels.
    pub fn up_to_level(&self, level: usize) -> Option<Self> {
        let mut seen = 0;
        for (pos, segment) in self.segments.iter().enumerate() {
            if level < seen + segment.indices.len() {
                let mut segments = self.segments[..=pos].to_vec();
                segments[pos].indices.truncate(level - seen);
                return Some(Self { segments });
            }
            seen += segment.indices.len();
        }
        None
    }

    pub fn push(&mut self, segment: PathSegment) {
        self.segments.push(segment);
    }

    pub fn starts_with(&self, prefix: &KeyPath) -> bool {
        if prefix.segments.len() > self.segments.len() {
            return false;
        }
        let split = prefix.segments.len();
        if split == 0 {
            return true;
        }
        if self.segments[..split - 1] != prefix.segments[..split - 1] {
            return false;
        }
        let ours = &self.segments[split - 1];
        let theirs = &prefix.segments[split - 1];
        ours.name == theirs.name
            && ours.indices.len() >= theirs.indices.len()
            && ours.indices[..theirs.indices.len()] == theirs.indices[..]
    }

    /// Re-root this path: strip `from` and put `to` in its place.
    pub fn rebase(&self, from: &KeyPath, to: &KeyPath) -> Result<Self, PathError> {
        if !self.starts_with(from) {
            return Err(PathError::PrefixMismatch {
                path: self.to_string(),
                prefix: from.to_string(),
            });
        }
        let split = from.segments.len();
        if split == 0 {
            let mut out = to.clone();
            out.segments.extend(self.segments.iter().cloned());
            return Ok(out);
        }
        let mut out = to.clone();
        let consumed = from.segments[split - 1].indices.len();
        let tail = &self.segments[split - 1].indices[consumed..];
        match out.segments.last_mut() {
            Some(last) => last.indices.extend(tail.iter().copied()),
            None => {
                return Err(PathError::PrefixMismatch {
                    path: self.to_string(),
                    prefix: from.to_string(),
                })
            }
        }
        out.segments.extend(self.segments[split..].iter().cloned());
        Ok(out)
    }

    /// Rewrite into the schema's own addressing: every property step goes
    /// through `properties`, every array level through `items`.
    pub fn to_schema_path(&self) -> KeyPath {
        let mut out = KeyPath::default();
        for segment in &self.segments {
            out.push(PathSegment::new("properties"));
            out.push(PathSegment::new(segment.name.clone()));
            for _ in &segment.indices {
                out.push(PathSegment::new("items"));
            }
        }
        out
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for KeyPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// How [`read_with`] treats sequences met where a property is expected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadMode {
    /// Plain data lookup.
    Data,
    /// Schema lookup: a non-empty sequence standing where a property is
    /// required falls back to its first element (tuple-style `items`).
    SchemaFallback,
}

/// Read the value at `path`; `None` when any step is missing.
pub fn read<'a>(obj: &'a Value, path: &KeyPath) -> Option<&'a Value> {
    read_with(obj, path, ReadMode::Data)
}

/// Parse `path` and read it from `obj`.
pub fn read_str<'a>(obj: &'a Value, path: &str) -> Result<Option<&'a Value>> {
    let path = KeyPath::parse(path)?;
    Ok(read(obj, &path))
}

pub fn read_with<'a>(obj: &'a Value, path: &KeyPath, mode: ReadMode) -> Option<&'a Value> {
    let mut current = obj;
    for segment in &path.segments {
        if mode == ReadMode::SchemaFallback {
            if let Value::Array(items) = current {
                current = items.first()?;
            }
        }
        current = current.as_object()?.get(&segment.name)?;
        for index in &segment.indices {
            current = current.as_array()?.get((*index)?)?;
        }
    }
    Some(current)
}

/// How many missing slots a single write may fill with `null` before the
/// index it targets.
pub const MAX_INDEX_GAP: usize = 4096;

/// Write `value` at `path`, creating intermediate containers on demand.
///
/// Indices more than [`MAX_INDEX_GAP`] slots past the end of an existing
/// (or new) array are rejected.
pub fn write(obj: &mut Value, path: &KeyPath, value: Value) -> Result<()> {
    if !path.is_concrete() {
        return Err(PathError::Unresolved(path.to_string()).into());
    }
    if path.is_empty() {
        *obj = value;
        return Ok(());
    }

    let mut current = obj;
    let last = path.segments.len() - 1;
    let mut value = Some(value);
    for (pos, segment) in path.segments.iter().enumerate() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            unreachable!("container was just created")
        };
        current = map.entry(segment.name.clone()).or_insert(Value::Null);

        for index in segment.indices.iter().flatten() {
            if !current.is_array() {
                *current = Value::Array(Vec::new());
            }
            let Value::Array(items) = current else {
                unreachable!("container was just created")
            };
            if items.len() <= *index {
                let gap = *index - items.len();
                let len = index.checked_add(1).filter(|_| gap <= MAX_INDEX_GAP).ok_or_else(|| {
                    PathError::Malformed {
                        path: path.to_string(),
                        reason: "array index lies too far beyond the end of the array",
                    }
                })?;
                items.resize(len, Value::Null);
            }
            current = &mut items[*index];
        }

        if pos == last {
            if let Some(value) = value.take() {
                *current = value;
            }
        }
    }
    Ok(())
}

/// Replace each `[]` in `template` with the next entry of `indices`.
/// Placeholders beyond the supplied indices are left untouched.
pub fn apply_array_path(template: &str, indices: &[usize]) -> String {
    let mut out = String::with_capacity(template.len() + indices.len() * 2);
    let mut next = indices.iter();
    let mut rest = template;
    while let Some(pos) = rest.find("[]") {
        out.push_str(&rest[..pos]);
        match next.next() {
            Some(i) => {
                out.push('[');
                out.push_str(&i.to_string());
                out.push(']');
            }
            None => out.push_str("[]"),
        }
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}

/// Turn a concrete key back into its template by blanking every `[N]`.
pub fn template_of(concrete: &str) -> String {
    let mut out = String::with_capacity(concrete.len());
    let mut chars = concrete.char_indices().peekable();
    while let Some((pos, c)) = chars.next() {
        if c == '[' {
            let rest = &concrete[pos + 1..];
            let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
            if digits > 0 && rest[digits..].starts_with(']') {
                out.push_str("[]");
                for _ in 0..=digits {
                    chars.next();
                }
                continue;
            }
        }
        out.push(c);
    }
    out
}
