//! Visualization helpers — ASCII tree and Graphviz dot renderings

use crate::analyzer::DependencyTreeNode;

/// Draw the tree with box-drawing connectors.
pub fn render_tree(root: &DependencyTreeNode) -> String {
    let mut out = String::new();
    out.push_str(&root.name);
    if root.is_cyclic {
        out.push_str(" (cycle)");
    }
    out.push('\n');
    render_children(&root.children, "", &mut out);
    out
}

fn render_children(children: &[DependencyTreeNode], prefix: &str, out: &mut String) {
    for (i, child) in children.iter().enumerate() {
        let last = i + 1 == children.len();
        out.push_str(prefix);
        out.push_str(if last { "└── " } else { "├── " });
        out.push_str(&child.name);
        if child.is_cyclic {
            out.push_str(" (cycle)");
        }
        out.push('\n');
        let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
        render_children(&child.children, &child_prefix, out);
    }
}

/// Graphviz digraph of the file edges.
pub fn render_dot(root: &DependencyTreeNode) -> String {
    let mut out = String::from("digraph dependencies {\n");
    let mut edges = Vec::new();
    collect_edges(root, &mut edges);
    edges.sort();
    edges.dedup();
    for (from, to, cyclic) in edges {
        if cyclic {
            out.push_str(&format!(
                "    \"{}\" -> \"{}\" [style=dashed, color=red];\n",
                from, to
            ));
        } else {
            out.push_str(&format!("    \"{}\" -> \"{}\";\n", from, to));
        }
    }
    out.push_str("}\n");
    out
}

fn collect_edges(node: &DependencyTreeNode, edges: &mut Vec<(String, String, bool)>) {
    for child in &node.children {
        edges.push((node.name.clone(), child.name.clone(), child.is_cyclic));
        collect_edges(child, edges);
    }
}
