//! Radix tree insertion and lookup

use crate::error::InsertError;
use crate::node::{regex_end_and_values, Node, NodeKind, WildcardSlot};
use crate::pattern::{find_wild_segment, segment_end_index, WildKind};
use crate::Params;

/// Result of matching a path against the tree.
#[derive(Debug)]
pub struct Lookup<'t, T> {
    /// The matched value, if a real endpoint was hit
    pub value: Option<&'t T>,
    /// Captured path parameters
    pub params: Params,
    /// The path missed, but toggling its trailing slash would hit
    pub tsr: bool,
}

impl<'t, T> Lookup<'t, T> {
    fn none() -> Self {
        Lookup {
            value: None,
            params: Params::new(),
            tsr: false,
        }
    }

    fn tsr() -> Self {
        Lookup {
            value: None,
            params: Params::new(),
            tsr: true,
        }
    }

    fn found(value: &'t T, params: Params) -> Self {
        Lookup {
            value: Some(value),
            params,
            tsr: false,
        }
    }
}

/// Radix tree mapping route patterns to values.
///
/// Patterns are inserted in compiled form (typed constraints already
/// rewritten to regexes, optionals already expanded); lookup walks edges
/// byte-wise, binding parameter segments and falling back to catch-alls.
///
/// Building is single-threaded; once built, lookups are read-only and safe
/// to run from any number of threads.
#[derive(Debug)]
pub struct Tree<T> {
    pub(crate) root: Node<T>,
    mutable: bool,
}

impl<T> Default for Tree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Tree<T> {
    /// Create an empty tree
    pub fn new() -> Self {
        Tree {
            root: Node::new_root(),
            mutable: false,
        }
    }

    /// When enabled, re-inserting an existing pattern replaces its value
    /// instead of failing
    pub fn set_mutable(&mut self, mutable: bool) {
        self.mutable = mutable;
    }

    /// Insert a value for the given compiled pattern.
    ///
    /// Conflicting or malformed patterns are rejected; the errors spell out
    /// the offending segment.
    pub fn insert(&mut self, path: &str, value: T) -> Result<(), InsertError> {
        if !path.starts_with('/') {
            return Err(InsertError::MissingLeadingSlash(path.to_owned()));
        }

        let full = path;
        let mut remaining = path;

        let i = longest_common_prefix(path, &self.root.fragment);
        if i > 0 {
            if self.root.fragment.len() > i {
                self.root.split(i);
            }
            remaining = &path[i..];
        }

        self.root.add(remaining, full, value, self.mutable)?;

        // The very first insert leaves an empty root edge; collapse it so the
        // root carries the common prefix
        if self.root.fragment.is_empty() && self.root.children.len() == 1 {
            self.root = self.root.children.pop().expect("one child");
            self.root.kind = NodeKind::Root;
        }

        self.root.sort_recursive();
        Ok(())
    }

    /// Match a request path.
    ///
    /// Returns the stored value and captured parameters on a hit; on a miss,
    /// `tsr` reports whether the path with its trailing slash toggled would
    /// have hit.
    pub fn get<'t>(&'t self, path: &str) -> Lookup<'t, T> {
        let root = &self.root;

        if path.len() > root.fragment.len() {
            if !path.as_bytes().starts_with(root.fragment.as_bytes()) {
                return Lookup::none();
            }
            return root.get_from_child(&path[root.fragment.len()..]);
        }

        if path == root.fragment {
            if root.tsr {
                return Lookup::tsr();
            }
            if let Some(value) = &root.value {
                return Lookup::found(value, Params::new());
            }
            if let Some(wildcard) = &root.wildcard {
                let mut params = Params::new();
                params.push(wildcard.key.clone(), String::new());
                return Lookup::found(&wildcard.value, params);
            }
        }

        Lookup::none()
    }
}

pub(crate) fn longest_common_prefix(a: &str, b: &str) -> usize {
    let mut i = a
        .bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .count();
    // Never split a multi-byte character; the first i bytes agree, so the
    // boundary holds for both strings
    while i > 0 && !a.is_char_boundary(i) {
        i -= 1;
    }
    i
}

impl<T> Node<T> {
    /// Install a value on this node, synthesising the trailing-slash
    /// placeholder that lets lookup detect the slash-toggled sibling.
    fn set_value(&mut self, value: T, full: &str, mutable: bool) -> Result<(), InsertError> {
        if self.value.is_some() || self.tsr {
            if mutable && !self.tsr {
                self.value = Some(value);
                return Ok(());
            }
            return Err(InsertError::AlreadyRegistered(full.to_owned()));
        }

        self.value = Some(value);

        let mut found_tsr = false;
        for child in &mut self.children {
            if child.fragment == "/" {
                if child.value.is_none() {
                    child.tsr = true;
                }
                found_tsr = true;
                break;
            }
        }

        if self.fragment != "/" && !found_tsr {
            if self.fragment.ends_with('/') {
                self.split(self.fragment.len() - 1);
                self.tsr = true;
            } else {
                let mut placeholder = Node::new_static("/");
                placeholder.tsr = true;
                self.children.push(placeholder);
            }
        }

        Ok(())
    }

    /// Merge `path` into this node's subtree, descending along existing
    /// edges and splitting them at the longest common prefix.
    fn add(&mut self, path: &str, full: &str, value: T, mutable: bool) -> Result<(), InsertError> {
        if path.is_empty() {
            return self.set_value(value, full, mutable);
        }

        for idx in 0..self.children.len() {
            let i = longest_common_prefix(path, &self.children[idx].fragment);
            if i == 0 {
                continue;
            }

            match self.children[idx].kind {
                NodeKind::Static => {
                    if self.children[idx].fragment.len() > i {
                        self.children[idx].split(i);
                    }
                    if path.len() > i {
                        return self.children[idx].add(&path[i..], full, value, mutable);
                    }
                }
                NodeKind::Param => {
                    // A shared '{' byte: the path starts a token here
                    let wild = find_wild_segment(path, full)?.ok_or_else(|| {
                        InsertError::from(crate::error::PatternError::UnterminatedParam(
                            full.to_owned(),
                        ))
                    })?;

                    if wild.kind == WildKind::CatchAll {
                        // Catch-alls live in the wildcard slot, beside any
                        // parameter child
                        return self.insert(path, full, value, mutable);
                    }
                    if self.children[idx].fragment != wild.raw {
                        return Err(InsertError::WildPathConflict {
                            segment: wild.raw,
                            path: full.to_owned(),
                            existing: self.children[idx].fragment.clone(),
                        });
                    }
                    if path.len() == wild.end {
                        return self.children[idx].set_value(value, full, mutable);
                    }
                    return self.children[idx].add(&path[wild.end..], full, value, mutable);
                }
                NodeKind::Root => unreachable!("invalid node type"),
            }

            // The child's fragment consumed the entire remaining path
            if path == "/" {
                self.children[idx].set_value(value, full, mutable)?;
                self.tsr = true;
                return Ok(());
            }
            return self.children[idx].set_value(value, full, mutable);
        }

        self.insert(path, full, value, mutable)
    }

    /// Grow a fresh branch for `path` under this node.
    fn insert(
        &mut self,
        path: &str,
        full: &str,
        value: T,
        mutable: bool,
    ) -> Result<(), InsertError> {
        let Some(wild) = find_wild_segment(path, full)? else {
            // Purely static branch
            let mut child = Node::new_static(path);
            child.value = Some(value);
            self.attach_with_tsr(child);
            return Ok(());
        };

        if wild.start > 0 {
            // Static prefix up to the token, then recurse at the token
            let child = Node::new_static(&path[..wild.start]);
            self.children.push(child);
            let last = self.children.len() - 1;
            return self.children[last].insert(&path[wild.start..], full, value, mutable);
        }

        match wild.kind {
            WildKind::Param => {
                let mut child = Node {
                    kind: NodeKind::Param,
                    fragment: wild.raw,
                    tsr: false,
                    value: None,
                    children: Vec::new(),
                    wildcard: None,
                    param_keys: wild.keys,
                    segment_regex: wild.regex,
                };

                let rest = &path[wild.end..];
                if rest.is_empty() {
                    child.value = Some(value);
                    self.attach_with_tsr(child);
                    return Ok(());
                }
                self.children.push(child);
                let last = self.children.len() - 1;
                self.children[last].insert(rest, full, value, mutable)
            }
            WildKind::CatchAll => {
                let rest = &path[wild.end..];
                if !(rest.is_empty() || rest == "/") {
                    return Err(InsertError::WildcardNotAtEnd(full.to_owned()));
                }
                if !self.fragment.ends_with('/') {
                    return Err(InsertError::WildcardWithoutSlash(full.to_owned()));
                }

                // Peel a longer slash-terminated edge so the catch-all hangs
                // off the bare "/" and the bare path gets a TSR mark
                let node = if self.fragment != "/" {
                    self.split(self.fragment.len() - 1);
                    self.tsr = true;
                    &mut self.children[0]
                } else {
                    &mut *self
                };

                if let Some(existing) = &mut node.wildcard {
                    if existing.fragment == wild.raw {
                        if mutable {
                            existing.value = value;
                            return Ok(());
                        }
                        return Err(InsertError::WildcardAlreadyRegistered(full.to_owned()));
                    }
                    return Err(InsertError::WildcardConflict {
                        segment: wild.raw,
                        path: full.to_owned(),
                        existing: existing.fragment.clone(),
                    });
                }

                node.wildcard = Some(Box::new(WildcardSlot {
                    fragment: wild.raw,
                    key: wild.keys.into_iter().next().expect("catch-all has a key"),
                    value,
                }));
                Ok(())
            }
        }
    }

    /// Attach a finished child and synthesise its trailing-slash structure.
    fn attach_with_tsr(&mut self, mut child: Node<T>) {
        if child.fragment == "/" {
            self.children.push(child);
            self.tsr = true;
        } else if child.fragment.ends_with('/') {
            child.split(child.fragment.len() - 1);
            child.tsr = true;
            self.children.push(child);
        } else {
            let mut placeholder = Node::new_static("/");
            placeholder.tsr = true;
            child.children.push(placeholder);
            self.children.push(child);
        }
    }

    fn get_from_child<'t>(&'t self, path: &str) -> Lookup<'t, T> {
        debug_assert!(!path.is_empty());

        for child in &self.children {
            match child.kind {
                NodeKind::Static => {
                    let fragment = child.fragment.as_bytes();
                    if path.as_bytes().first() != fragment.first() {
                        continue;
                    }

                    if path.len() > child.fragment.len() {
                        if &path.as_bytes()[..fragment.len()] != fragment {
                            continue;
                        }
                        let result = child.get_from_child(&path[child.fragment.len()..]);
                        if result.value.is_some() || result.tsr {
                            return result;
                        }
                    } else if path == child.fragment {
                        if child.tsr {
                            return Lookup::tsr();
                        }
                        if let Some(value) = &child.value {
                            return Lookup::found(value, Params::new());
                        }
                        if let Some(wildcard) = &child.wildcard {
                            let mut params = Params::new();
                            params.push(wildcard.key.clone(), String::new());
                            return Lookup::found(&wildcard.value, params);
                        }
                        return Lookup::none();
                    }
                }
                NodeKind::Param => {
                    let mut end = segment_end_index(path, false);
                    let mut values: Vec<String>;
                    if let Some(regex) = &child.segment_regex {
                        match regex_end_and_values(regex, &path[..end]) {
                            Some((regex_end, regex_values)) => {
                                end = regex_end;
                                values = regex_values;
                            }
                            // Constraint rejected this segment; try the next
                            // sibling
                            None => continue,
                        }
                    } else {
                        values = vec![path[..end].to_owned()];
                    }

                    if path.len() > end {
                        let mut result = child.get_from_child(&path[end..]);
                        if result.value.is_some() {
                            for (key, value) in child.param_keys.iter().zip(values.drain(..)) {
                                result.params.push(key.clone(), value);
                            }
                            return result;
                        }
                        if result.tsr {
                            return Lookup::tsr();
                        }
                    } else if path.len() == end {
                        if let Some(value) = &child.value {
                            let mut params = Params::new();
                            for (key, captured) in child.param_keys.iter().zip(values.drain(..)) {
                                params.push(key.clone(), captured);
                            }
                            return Lookup::found(value, params);
                        }
                        if child.tsr {
                            return Lookup::tsr();
                        }
                        // Try another child
                        continue;
                    }
                }
                NodeKind::Root => unreachable!("invalid node type"),
            }
        }

        if let Some(wildcard) = &self.wildcard {
            let mut params = Params::new();
            params.push(wildcard.key.clone(), path.to_owned());
            return Lookup::found(&wildcard.value, params);
        }

        Lookup::none()
    }
}
