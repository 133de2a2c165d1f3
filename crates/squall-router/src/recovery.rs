//! Case-insensitive path recovery
//!
//! Mirrors the lookup walk, but compares static edges under ASCII case
//! folding and rebuilds the canonically-cased path as it goes. Parameter
//! captures are data, not structure: their bytes are echoed verbatim.

use crate::node::{regex_end, Node, NodeKind};
use crate::pattern::segment_end_index;
use crate::tree::Tree;

impl<T> Tree<T> {
    /// Find the canonically-cased path that a mis-cased `path` would match.
    ///
    /// With `fix_trailing_slash`, a path that only differs by its trailing
    /// slash is corrected as well; without it such a result is a miss.
    pub fn find_case_insensitive(&self, path: &str, fix_trailing_slash: bool) -> Option<String> {
        let mut fixed = String::with_capacity(path.len() + 1);
        let (found, tsr) = self.root.find_case_insensitive(path, &mut fixed);
        if !found || (tsr && !fix_trailing_slash) {
            return None;
        }
        Some(fixed)
    }
}

impl<T> Node<T> {
    fn find_case_insensitive(&self, path: &str, fixed: &mut String) -> (bool, bool) {
        if path.len() > self.fragment.len() {
            let head = &path.as_bytes()[..self.fragment.len()];
            if !head.eq_ignore_ascii_case(self.fragment.as_bytes()) {
                return (false, false);
            }

            fixed.push_str(&self.fragment);
            let (found, tsr) =
                self.find_case_insensitive_child(&path[self.fragment.len()..], fixed);
            if found {
                return (found, tsr);
            }
            fixed.truncate(fixed.len() - self.fragment.len());
        } else if path.eq_ignore_ascii_case(&self.fragment) {
            fixed.push_str(&self.fragment);

            if self.tsr {
                if self.fragment == "/" {
                    // The endpoint lives one level up, without the slash
                    fixed.truncate(fixed.len() - 1);
                } else {
                    fixed.push('/');
                }
                return (true, true);
            }
            if self.value.is_some() {
                return (true, false);
            }
            fixed.truncate(fixed.len() - self.fragment.len());
        }

        (false, false)
    }

    fn find_case_insensitive_child(&self, path: &str, fixed: &mut String) -> (bool, bool) {
        for child in &self.children {
            match child.kind {
                NodeKind::Static => {
                    let (found, tsr) = child.find_case_insensitive(path, fixed);
                    if found {
                        return (found, tsr);
                    }
                }
                NodeKind::Param => {
                    let mut end = segment_end_index(path, false);
                    if let Some(regex) = &child.segment_regex {
                        match regex_end(regex, &path[..end]) {
                            Some(regex_end) => end = regex_end,
                            None => continue,
                        }
                    }

                    fixed.push_str(&path[..end]);

                    if path.len() > end {
                        let (found, tsr) =
                            child.find_case_insensitive_child(&path[end..], fixed);
                        if found {
                            return (found, tsr);
                        }
                    } else if path.len() == end {
                        if child.tsr {
                            fixed.push('/');
                            return (true, true);
                        }
                        if child.value.is_some() {
                            return (true, false);
                        }
                    }

                    fixed.truncate(fixed.len() - end);
                }
                NodeKind::Root => unreachable!("invalid node type"),
            }
        }

        if self.wildcard.is_some() {
            fixed.push_str(path);
            return (true, false);
        }

        (false, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_static() {
        let mut tree = Tree::new();
        tree.insert("/Contact", 1).unwrap();

        assert_eq!(
            tree.find_case_insensitive("/contact", true).as_deref(),
            Some("/Contact")
        );
        assert_eq!(
            tree.find_case_insensitive("/CONTACT", true).as_deref(),
            Some("/Contact")
        );
        assert!(tree.find_case_insensitive("/missing", true).is_none());
    }

    #[test]
    fn test_case_insensitive_with_tsr() {
        let mut tree = Tree::new();
        tree.insert("/About/", 1).unwrap();

        // The recovered path keeps the registered trailing slash
        assert_eq!(
            tree.find_case_insensitive("/about", true).as_deref(),
            Some("/About/")
        );
        // Without trailing-slash fixing the TSR result is demoted to a miss
        assert!(tree.find_case_insensitive("/about", false).is_none());
        assert_eq!(
            tree.find_case_insensitive("/about/", true).as_deref(),
            Some("/About/")
        );
    }

    #[test]
    fn test_case_insensitive_drops_trailing_slash() {
        let mut tree = Tree::new();
        tree.insert("/Docs", 1).unwrap();

        assert_eq!(
            tree.find_case_insensitive("/docs/", true).as_deref(),
            Some("/Docs")
        );
        assert!(tree.find_case_insensitive("/docs/", false).is_none());
    }

    #[test]
    fn test_case_insensitive_params_verbatim() {
        let mut tree = Tree::new();
        tree.insert("/Users/{name}/Profile", 1).unwrap();

        // Static fragments are corrected, the captured segment is not
        assert_eq!(
            tree.find_case_insensitive("/users/MixedCase/profile", true)
                .as_deref(),
            Some("/Users/MixedCase/Profile")
        );
    }

    #[test]
    fn test_case_insensitive_typed_param() {
        let mut tree = Tree::new();
        tree.insert("/Product/{pid:[0-9]+}", 1).unwrap();

        assert_eq!(
            tree.find_case_insensitive("/product/42", true).as_deref(),
            Some("/Product/42")
        );
        assert!(tree.find_case_insensitive("/product/abc", true).is_none());
    }

    #[test]
    fn test_case_insensitive_backtracks() {
        let mut tree = Tree::new();
        tree.insert("/search", 1).unwrap();
        tree.insert("/support", 2).unwrap();

        assert_eq!(
            tree.find_case_insensitive("/SUPPORT", true).as_deref(),
            Some("/support")
        );
        assert_eq!(
            tree.find_case_insensitive("/Search", true).as_deref(),
            Some("/search")
        );
    }

    #[test]
    fn test_case_insensitive_idempotent() {
        let mut tree = Tree::new();
        tree.insert("/MixedCase/Path", 1).unwrap();

        let first = tree.find_case_insensitive("/mixedcase/path", true).unwrap();
        let second = tree.find_case_insensitive(&first, true).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_case_insensitive_wildcard_tail() {
        let mut tree = Tree::new();
        tree.insert("/Assets/{filepath:*}", 1).unwrap();

        assert_eq!(
            tree.find_case_insensitive("/assets/css/Main.css", true)
                .as_deref(),
            Some("/Assets/css/Main.css")
        );
    }
}
