use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::abook::loader::model::AttributeRecord;

/// Name given to the synthetic root of every hierarchy.
pub const ROOT_NAME: &str = "Organization";
/// Organization value used for branch affiliates, which are left out of the
/// organizational view.
pub const BRANCH_SENTINEL: &str = "filial";

/// A node in the organization → department → unit hierarchy.
///
/// Children are keyed by name, so sibling names are unique and iteration
/// order is stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrgNode {
    pub name: String,
    pub children: BTreeMap<String, OrgNode>,
}

impl OrgNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: BTreeMap::new(),
        }
    }

    /// Returns the child called `name`, creating it when absent.
    pub fn child_mut(&mut self, name: &str) -> &mut OrgNode {
        self.children
            .entry(name.to_string())
            .or_insert_with(|| OrgNode::new(name))
    }

    pub fn child(&self, name: &str) -> Option<&OrgNode> {
        self.children.get(name)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of nodes below this one.
    pub fn count(&self) -> usize {
        self.children
            .values()
            .map(|child| 1 + child.count())
            .sum()
    }

    /// Visits every node below this one, parents before children, passing
    /// the chain of ancestor names (excluding `self`) and the node itself.
    pub fn walk<'a, F>(&'a self, visit: &mut F)
    where
        F: FnMut(&[&'a str], &'a OrgNode),
    {
        let mut path = Vec::new();
        self.walk_inner(&mut path, visit);
    }

    fn walk_inner<'a, F>(&'a self, path: &mut Vec<&'a str>, visit: &mut F)
    where
        F: FnMut(&[&'a str], &'a OrgNode),
    {
        for child in self.children.values() {
            visit(path, child);
            path.push(&child.name);
            child.walk_inner(path, visit);
            path.pop();
        }
    }

    /// Renders an indented outline, two spaces per level.
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.name);
        self.walk(&mut |ancestors, node| {
            let indent = "  ".repeat(ancestors.len() + 1);
            let _ = writeln!(out, "{indent}{}", node.name);
        });
        out
    }
}

/// Groups records into organization → department → unit.
///
/// Records whose organization is empty or the branch sentinel are skipped;
/// they still take part in the directory load.
pub fn build_hierarchy(records: &[AttributeRecord]) -> OrgNode {
    let mut root = OrgNode::new(ROOT_NAME);

    for record in records {
        let organization = record.organization.as_str();
        if organization.is_empty() || organization == BRANCH_SENTINEL {
            continue;
        }

        let (org_name, dept_name) = match organization.split_once(',') {
            Some((org, dept)) => (org.trim(), dept.trim()),
            None => (organization.trim(), ""),
        };
        let unit = record.organizational_unit.as_str();

        let org_node = root.child_mut(org_name);
        let parent = if dept_name.is_empty() {
            org_node
        } else {
            org_node.child_mut(dept_name)
        };
        if !unit.is_empty() {
            parent.child_mut(unit);
        }
    }

    root
}
