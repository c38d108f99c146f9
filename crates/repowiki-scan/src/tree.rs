//! File tree assembly and renderings
//!
//! `compact(build(scan(root)))` is a pure function of the root contents and
//! the ignore rules — every rendering here is deterministic.

use serde::Serialize;

use crate::scanner::{PathInfo, PathKind};

#[derive(Clone, Debug, Serialize)]
pub struct FileTree {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PathKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileTree>,
}

impl FileTree {
    /// Deterministic nesting by path segments. Input order (depth-first,
    /// lexical) is preserved; intermediate directories are synthesized when
    /// a path arrives before its parent.
    pub fn build(paths: &[PathInfo]) -> FileTree {
        let mut root = FileTree {
            name: String::new(),
            kind: PathKind::Dir,
            children: Vec::new(),
        };
        for info in paths {
            let segments: Vec<&str> = info.path.split('/').filter(|s| !s.is_empty()).collect();
            if segments.is_empty() {
                continue;
            }
            root.insert(&segments, info.kind);
        }
        root
    }

    fn insert(&mut self, segments: &[&str], kind: PathKind) {
        let (head, rest) = match segments.split_first() {
            Some(split) => split,
            None => return,
        };
        let pos = match self.children.iter().position(|c| c.name == *head) {
            Some(pos) => pos,
            None => {
                self.children.push(FileTree {
                    name: (*head).to_string(),
                    kind: if rest.is_empty() { kind } else { PathKind::Dir },
                    children: Vec::new(),
                });
                self.children.len() - 1
            }
        };
        if rest.is_empty() {
            self.children[pos].kind = kind;
        } else {
            self.children[pos].kind = PathKind::Dir;
            self.children[pos].insert(rest, kind);
        }
    }

    /// One line per path with a short inline kind hint: `/D` for
    /// directories, `/F` for files.
    pub fn compact(&self) -> String {
        let mut out = String::new();
        self.walk(&mut |path, kind| {
            let hint = match kind {
                PathKind::Dir => "/D",
                PathKind::File => "/F",
            };
            out.push_str(path);
            out.push_str(hint);
            out.push('\n');
        });
        out
    }

    /// Newline-separated relative paths.
    pub fn to_pathlist(&self) -> String {
        let mut out = String::new();
        self.walk(&mut |path, _| {
            out.push_str(path);
            out.push('\n');
        });
        out
    }

    /// Structured JSON form of the nested tree.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.children).unwrap_or_default()
    }

    fn walk(&self, f: &mut impl FnMut(&str, PathKind)) {
        fn inner(node: &FileTree, prefix: &str, f: &mut impl FnMut(&str, PathKind)) {
            for child in &node.children {
                let path = if prefix.is_empty() {
                    child.name.clone()
                } else {
                    format!("{}/{}", prefix, child.name)
                };
                f(&path, child.kind);
                inner(child, &path, f);
            }
        }
        inner(self, "", f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(path: &str, kind: PathKind) -> PathInfo {
        PathInfo {
            path: path.to_string(),
            kind,
        }
    }

    #[test]
    fn build_nests_by_segments() {
        let tree = FileTree::build(&[
            info("src", PathKind::Dir),
            info("src/lib.rs", PathKind::File),
            info("src/util", PathKind::Dir),
            info("src/util/io.rs", PathKind::File),
        ]);
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].name, "src");
        assert_eq!(tree.children[0].children.len(), 2);
    }

    #[test]
    fn compact_marks_kinds() {
        let tree = FileTree::build(&[
            info("src", PathKind::Dir),
            info("src/lib.rs", PathKind::File),
        ]);
        assert_eq!(tree.compact(), "src/D\nsrc/lib.rs/F\n");
    }

    #[test]
    fn pathlist_is_plain_paths() {
        let tree = FileTree::build(&[
            info("a", PathKind::Dir),
            info("a/b.txt", PathKind::File),
        ]);
        assert_eq!(tree.to_pathlist(), "a\na/b.txt\n");
    }

    #[test]
    fn synthesized_parent_becomes_dir() {
        // File arrives without its parent having been listed.
        let tree = FileTree::build(&[info("deep/nested/file.rs", PathKind::File)]);
        assert_eq!(tree.children[0].kind, PathKind::Dir);
        assert_eq!(tree.children[0].children[0].kind, PathKind::Dir);
        assert_eq!(
            tree.children[0].children[0].children[0].kind,
            PathKind::File
        );
    }

    #[test]
    fn json_rendering_is_structured() {
        let tree = FileTree::build(&[info("x.rs", PathKind::File)]);
        let json = tree.to_json();
        assert!(json.contains("\"name\": \"x.rs\""));
        assert!(json.contains("\"type\": \"file\""));
    }
}
