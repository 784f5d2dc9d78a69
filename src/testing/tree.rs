// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! ExUnit test tree.
//!
//! Nodes live in an arena indexed by [`NodeId`]. Run metadata is kept in a
//! side table keyed by node identity so the tree itself stays a plain
//! display structure.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Test module as reported by `getExUnitTestsInFile`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleEntry {
    pub module: String,
    pub line: u32,
    #[serde(default)]
    pub describes: Vec<DescribeEntry>,
}

/// A `describe` block. `describe: null` groups the module's top-level tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeEntry {
    pub describe: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub tests: Vec<TestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestEntry {
    pub name: String,
    pub line: u32,
    #[serde(rename = "type", default = "default_test_type")]
    pub kind: String,
}

fn default_test_type() -> String {
    "test".to_string()
}

/// Arena index of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Workspace,
    File,
    Module,
    Describe,
    Test,
    Doctest,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Workspace => "workspace",
            Self::File => "file",
            Self::Module => "module",
            Self::Describe => "describe",
            Self::Test => "test",
            Self::Doctest => "doctest",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone)]
pub struct TestNode {
    pub kind: NodeKind,
    pub label: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// What a runner needs to execute a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestMeta {
    pub project_dir: PathBuf,
    /// Test file; `None` for workspace nodes.
    pub file: Option<PathBuf>,
    /// 1-based line of the test or doctest.
    pub line: Option<u32>,
    pub describe: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TestTree {
    nodes: Vec<TestNode>,
    meta: HashMap<NodeId, TestMeta>,
    roots: Vec<NodeId>,
}

impl TestTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, kind: NodeKind, label: String, parent: Option<NodeId>, meta: TestMeta) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(TestNode {
            kind,
            label,
            parent,
            children: Vec::new(),
        });
        match parent {
            Some(parent) => self.nodes[parent.0].children.push(id),
            None => self.roots.push(id),
        }
        self.meta.insert(id, meta);
        id
    }

    /// Root node for a project directory.
    pub fn add_workspace(&mut self, label: impl Into<String>, project_dir: &Path) -> NodeId {
        self.push(
            NodeKind::Workspace,
            label.into(),
            None,
            TestMeta {
                project_dir: project_dir.to_path_buf(),
                file: None,
                line: None,
                describe: None,
            },
        )
    }

    /// File node under `workspace`, populated from the server response.
    pub fn add_file(&mut self, workspace: NodeId, file: &Path, modules: &[ModuleEntry]) -> NodeId {
        let project_dir = self
            .meta
            .get(&workspace)
            .map(|m| m.project_dir.clone())
            .unwrap_or_default();
        let label = file
            .strip_prefix(&project_dir)
            .unwrap_or(file)
            .display()
            .to_string();
        let file_meta = TestMeta {
            project_dir,
            file: Some(file.to_path_buf()),
            line: None,
            describe: None,
        };
        let file_id = self.push(NodeKind::File, label, Some(workspace), file_meta.clone());

        for module in modules {
            let module_id = self.push(
                NodeKind::Module,
                module.module.clone(),
                Some(file_id),
                file_meta.clone(),
            );
            for group in &module.describes {
                let parent = match &group.describe {
                    Some(name) => self.push(
                        NodeKind::Describe,
                        name.clone(),
                        Some(module_id),
                        TestMeta {
                            describe: Some(name.clone()),
                            ..file_meta.clone()
                        },
                    ),
                    None => module_id,
                };
                for test in &group.tests {
                    let kind = if test.kind == "doctest" {
                        NodeKind::Doctest
                    } else {
                        NodeKind::Test
                    };
                    self.push(
                        kind,
                        test.name.clone(),
                        Some(parent),
                        TestMeta {
                            line: Some(test.line),
                            describe: group.describe.clone(),
                            ..file_meta.clone()
                        },
                    );
                }
            }
        }
        file_id
    }

    pub fn node(&self, id: NodeId) -> Option<&TestNode> {
        self.nodes.get(id.0)
    }

    pub fn meta(&self, id: NodeId) -> Option<&TestMeta> {
        self.meta.get(&id)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of test and doctest leaves.
    pub fn test_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Test | NodeKind::Doctest))
            .count()
    }

    /// First node with this kind and label, in insertion order.
    pub fn find(&self, kind: NodeKind, label: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.kind == kind && n.label == label)
            .map(NodeId)
    }

    /// Depth-first walk from the roots, yielding each node with its depth.
    pub fn walk(&self) -> Vec<(NodeId, usize)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(NodeId, usize)> = self.roots.iter().rev().map(|id| (*id, 0)).collect();
        while let Some((id, depth)) = stack.pop() {
            out.push((id, depth));
            for child in self.children(id).iter().rev() {
                stack.push((*child, depth + 1));
            }
        }
        out
    }
}
