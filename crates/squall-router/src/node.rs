//! Radix tree node

use regex::Regex;

/// Node kinds, in match priority order: static edges are tried before
/// parameter edges; the catch-all slot always comes last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum NodeKind {
    Root,
    Static,
    Param,
}

/// The catch-all slot of a node. Unlike children it has no subtree: nothing
/// can descend past a catch-all.
#[derive(Debug)]
pub(crate) struct WildcardSlot<T> {
    /// Pattern text of the catch-all token, e.g. `{filepath:*}`
    pub fragment: String,
    /// Capture key the remaining path is bound to
    pub key: String,
    pub value: T,
}

#[derive(Debug)]
pub(crate) struct Node<T> {
    pub kind: NodeKind,
    /// Edge label: literal bytes for static nodes, the token text for
    /// parameter nodes
    pub fragment: String,
    /// Marks a structural placeholder: the path reaching here differs from a
    /// real endpoint only by a trailing slash
    pub tsr: bool,
    pub value: Option<T>,
    pub children: Vec<Node<T>>,
    pub wildcard: Option<Box<WildcardSlot<T>>>,
    /// Capture keys of a parameter node, in order; non-empty iff the node is
    /// a parameter
    pub param_keys: Vec<String>,
    /// Compiled constraint spanning the whole segment, if any
    pub segment_regex: Option<Regex>,
}

impl<T> Node<T> {
    pub fn new_static(fragment: &str) -> Self {
        Node {
            kind: NodeKind::Static,
            fragment: fragment.to_owned(),
            tsr: false,
            value: None,
            children: Vec::new(),
            wildcard: None,
            param_keys: Vec::new(),
            segment_regex: None,
        }
    }

    pub fn new_root() -> Self {
        Node {
            kind: NodeKind::Root,
            ..Node::new_static("")
        }
    }

    /// Split the edge at byte index `i`: this node keeps `fragment[..i]` and
    /// everything else (value, subtree, wildcard, parameter metadata, TSR
    /// mark) moves into a single new static child holding the tail.
    pub fn split(&mut self, i: usize) {
        let tail = Node {
            kind: NodeKind::Static,
            fragment: self.fragment.split_off(i),
            tsr: std::mem::replace(&mut self.tsr, false),
            value: self.value.take(),
            children: std::mem::take(&mut self.children),
            wildcard: self.wildcard.take(),
            param_keys: std::mem::take(&mut self.param_keys),
            segment_regex: self.segment_regex.take(),
        };
        self.children.push(tail);
    }

    /// Re-establish match priority: static children before parameter
    /// children, and within a kind the node with the larger subtree first.
    pub fn sort_recursive(&mut self) {
        for child in &mut self.children {
            child.sort_recursive();
        }
        self.children.sort_by(|a, b| {
            a.kind
                .cmp(&b.kind)
                .then_with(|| b.children.len().cmp(&a.children.len()))
        });
    }
}

/// Run a segment regex against a path segment. The match must be anchored at
/// the segment start; its end becomes the new path cursor. Returns the match
/// end and one owned value per capture group.
pub(crate) fn regex_end_and_values(regex: &Regex, segment: &str) -> Option<(usize, Vec<String>)> {
    let caps = regex.captures(segment)?;
    let whole = caps.get(0).expect("capture group 0 always participates");
    if whole.start() != 0 {
        return None;
    }
    let values = caps
        .iter()
        .skip(1)
        .map(|group| group.map_or_else(String::new, |m| m.as_str().to_owned()))
        .collect();
    Some((whole.end(), values))
}

/// Like [`regex_end_and_values`] but without extracting captures; used by
/// case-insensitive recovery where parameter values are echoed verbatim.
pub(crate) fn regex_end(regex: &Regex, segment: &str) -> Option<usize> {
    let m = regex.find(segment)?;
    if m.start() != 0 {
        return None;
    }
    Some(m.end())
}
