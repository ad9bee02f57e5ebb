//! Testable properties of the indexing core.

use std::collections::BTreeSet;
use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use codegraph::config::Settings;
use codegraph::graph::{EdgeKind, GraphBackend, MemoryBackend, NodeKey, NodeLabel};
use codegraph::index::{IndexPipeline, JobManager};

fn pipeline_with_backend() -> (IndexPipeline, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let pipeline = IndexPipeline::new(
        Arc::new(Settings::default()),
        backend.clone() as Arc<dyn GraphBackend>,
        Arc::new(JobManager::new()),
    );
    (pipeline, backend)
}

fn write_fixture(dir: &TempDir) {
    fs::create_dir_all(dir.path().join("pkg")).unwrap();
    fs::write(
        dir.path().join("main.py"),
        "import pkg.util\n\nclass App:\n    def run(self):\n        helper()\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("pkg/util.py"),
        "LIMIT = 3\n\ndef helper():\n    return LIMIT\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("style.css"),
        "a { color: red; }\n#x a { color: blue; }\n",
    )
    .unwrap();
}

/// Structural view of the graph, ignoring volatile timestamp properties.
fn shape(backend: &MemoryBackend) -> (BTreeSet<String>, BTreeSet<String>) {
    let mut nodes = BTreeSet::new();
    for label in [
        NodeLabel::Repository,
        NodeLabel::Directory,
        NodeLabel::File,
        NodeLabel::Function,
        NodeLabel::Class,
        NodeLabel::Variable,
        NodeLabel::Module,
        NodeLabel::Parameter,
        NodeLabel::Macro,
        NodeLabel::Rule,
        NodeLabel::Selector,
        NodeLabel::Property,
        NodeLabel::MediaQuery,
    ] {
        for key in backend.nodes_with_label(label) {
            nodes.insert(format!("{key:?}"));
        }
    }
    let mut edges = BTreeSet::new();
    for kind in [
        EdgeKind::Contains,
        EdgeKind::Calls,
        EdgeKind::Inherits,
        EdgeKind::Implements,
        EdgeKind::Imports,
        EdgeKind::HasParameter,
        EdgeKind::HasSelector,
        EdgeKind::HasProperty,
        EdgeKind::OverriddenBy,
    ] {
        for (from, to, _) in backend.edges_of_kind(kind) {
            edges.insert(format!("{from:?} -{kind:?}-> {to:?}"));
        }
    }
    (nodes, edges)
}

#[tokio::test]
async fn p1_indexing_unchanged_repo_twice_is_byte_identical() {
    let dir = TempDir::new().unwrap();
    write_fixture(&dir);

    let (pipeline, backend) = pipeline_with_backend();
    pipeline
        .index_path(dir.path(), false, None, false)
        .await
        .unwrap();
    let first = backend.snapshot();

    let report = pipeline
        .index_path(dir.path(), false, None, false)
        .await
        .unwrap();
    assert_eq!(report.indexed_files, 0);
    assert_eq!(backend.snapshot(), first);
}

#[tokio::test]
async fn p2_incremental_equals_full_reindex() {
    let before = "def foo():\n    helper()\n";
    let after = "def foo():\n    helper()\n\ndef extra():\n    pass\n";

    // Incremental path: index, edit, deliver the update.
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.py"), before).unwrap();
    fs::write(dir.path().join("b.py"), "def helper(): pass\n").unwrap();
    let (pipeline, incremental_backend) = pipeline_with_backend();
    pipeline
        .index_path(dir.path(), false, None, false)
        .await
        .unwrap();
    fs::write(dir.path().join("a.py"), after).unwrap();
    pipeline
        .update_file(dir.path(), &dir.path().join("a.py"))
        .await
        .unwrap();

    // Full path: a fresh backend over the final state of the same tree.
    let (full_pipeline, full_backend) = pipeline_with_backend();
    full_pipeline
        .index_path(dir.path(), false, None, false)
        .await
        .unwrap();

    assert_eq!(shape(&incremental_backend), shape(&full_backend));
}

#[tokio::test]
async fn p3_containment_closure() {
    let dir = TempDir::new().unwrap();
    write_fixture(&dir);

    let (pipeline, backend) = pipeline_with_backend();
    pipeline
        .index_path(dir.path(), false, None, false)
        .await
        .unwrap();

    let contains = backend.edges_of_kind(EdgeKind::Contains);
    let parent_of = |node: &NodeKey| -> Vec<NodeKey> {
        contains
            .iter()
            .filter(|(_, to, _)| to == node)
            .map(|(from, _, _)| from.clone())
            .collect()
    };

    for label in [NodeLabel::Function, NodeLabel::Class, NodeLabel::Variable] {
        for node in backend.nodes_with_label(label) {
            let entity_file = node.file_path().unwrap().to_string();

            // Walk CONTAINS upward to a File, then on to the Repository.
            let mut current = node.clone();
            let mut reached_file = None;
            let mut hops = 0;
            while reached_file.is_none() {
                let parents = parent_of(&current);
                assert_eq!(
                    parents.len(),
                    1,
                    "{current:?} must have exactly one CONTAINS parent"
                );
                current = parents[0].clone();
                if let NodeKey::File { path } = &current {
                    reached_file = Some(path.clone());
                }
                hops += 1;
                assert!(hops < 32, "containment chain did not terminate");
            }
            assert_eq!(reached_file.unwrap(), entity_file);

            // The file chains on up to the Repository.
            while !matches!(current, NodeKey::Repository { .. }) {
                let parents = parent_of(&current);
                assert_eq!(parents.len(), 1);
                current = parents[0].clone();
                hops += 1;
                assert!(hops < 64);
            }
        }
    }
}

#[tokio::test]
async fn p4_no_duplicate_identities_after_repeated_runs() {
    let dir = TempDir::new().unwrap();
    write_fixture(&dir);

    let (pipeline, backend) = pipeline_with_backend();
    for _ in 0..3 {
        pipeline
            .index_path(dir.path(), false, None, true)
            .await
            .unwrap();
    }

    // Force-runs rewrite every file; identity keys must still be unique,
    // which the structural key map guarantees and the counts confirm.
    let functions = backend.nodes_with_label(NodeLabel::Function);
    let distinct: BTreeSet<String> = functions.iter().map(|k| format!("{k:?}")).collect();
    assert_eq!(functions.len(), distinct.len());
    assert_eq!(
        backend
            .nodes_with_label(NodeLabel::Repository)
            .len(),
        1
    );
}

#[tokio::test]
async fn p5_identical_content_has_identical_hashes() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("one.py"), "def same(): pass\n").unwrap();
    fs::write(dir.path().join("two.py"), "def same(): pass\n").unwrap();

    let (pipeline, backend) = pipeline_with_backend();
    pipeline
        .index_path(dir.path(), false, None, false)
        .await
        .unwrap();

    let hashes: Vec<String> = backend
        .nodes_with_label(NodeLabel::File)
        .iter()
        .map(|key| {
            backend
                .node_props(key)
                .unwrap()
                .get("content_hash")
                .unwrap()
                .as_str()
                .unwrap()
                .to_string()
        })
        .collect();
    assert_eq!(hashes.len(), 2);
    assert_eq!(hashes[0], hashes[1]);
}

#[tokio::test]
async fn p6_resolution_is_deterministic_across_runs() {
    let dir = TempDir::new().unwrap();
    // Two definitions of the same symbol; no import disambiguates.
    fs::write(dir.path().join("caller.py"), "def go():\n    dup()\n").unwrap();
    fs::write(dir.path().join("first.py"), "def dup(): pass\n").unwrap();
    fs::write(dir.path().join("second.py"), "def dup(): pass\n").unwrap();

    let mut shapes = Vec::new();
    for _ in 0..3 {
        let (pipeline, backend) = pipeline_with_backend();
        pipeline
            .index_path(dir.path(), false, None, false)
            .await
            .unwrap();
        let calls: BTreeSet<String> = backend
            .edges_of_kind(EdgeKind::Calls)
            .iter()
            .map(|(from, to, _)| format!("{from:?} -> {to:?}"))
            .collect();
        shapes.push(calls);
    }
    assert_eq!(shapes[0], shapes[1]);
    assert_eq!(shapes[1], shapes[2]);

    // Sorted enumeration puts first.py before second.py.
    let target = shapes[0].iter().next().unwrap();
    assert!(target.contains("first.py"), "resolved to {target}");
}

#[tokio::test]
async fn p7_css_specificity_correctness() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("s.css"),
        "a {color:red}\n#x a {color:blue}\n",
    )
    .unwrap();

    let (pipeline, backend) = pipeline_with_backend();
    pipeline
        .index_path(dir.path(), false, None, false)
        .await
        .unwrap();

    let overridden = backend.edges_of_kind(EdgeKind::OverriddenBy);
    assert_eq!(overridden.len(), 1);
    let (from, to, props) = &overridden[0];
    assert!(matches!(from, NodeKey::Entity { name, .. } if name == "a"));
    assert!(matches!(to, NodeKey::Entity { name, .. } if name == "#x a"));
    assert_eq!(props.get("specificity_diff").unwrap().as_i64(), Some(100));
}

/// Resolving `super()` through the MRO is not implemented; the call falls
/// back to the caller's own file.
#[tokio::test]
#[ignore = "super() is not resolved through the MRO yet"]
async fn python_super_resolves_to_base_method() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("animals.py"),
        "class Animal:\n    def speak(self):\n        pass\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("dog.py"),
        "from animals import Animal\n\nclass Dog(Animal):\n    def speak(self):\n        super().speak()\n",
    )
    .unwrap();

    let (pipeline, backend) = pipeline_with_backend();
    pipeline
        .index_path(dir.path(), false, None, false)
        .await
        .unwrap();

    let calls = backend.edges_of_kind(EdgeKind::Calls);
    assert!(calls.iter().any(|(_, to, _)| {
        matches!(to, NodeKey::Entity { name, file_path, .. }
            if name == "speak" && file_path.ends_with("animals.py"))
    }));
}
