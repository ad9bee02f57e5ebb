//! End-to-end scenarios against the embedded backend.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use codegraph::config::Settings;
use codegraph::graph::{
    EdgeKind, GraphBackend, MemoryBackend, NodeKey, NodeLabel, Value,
};
use codegraph::index::{IndexPipeline, JobManager, JobStatus};

fn pipeline_with_backend() -> (IndexPipeline, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let pipeline = IndexPipeline::new(
        Arc::new(Settings::default()),
        backend.clone() as Arc<dyn GraphBackend>,
        Arc::new(JobManager::new()),
    );
    (pipeline, backend)
}

fn canonical(path: &Path) -> String {
    path.canonicalize().unwrap().to_string_lossy().into_owned()
}

fn function_node(backend: &MemoryBackend, name: &str, file: &str) -> Option<NodeKey> {
    backend
        .nodes_with_label(NodeLabel::Function)
        .into_iter()
        .find(|k| matches!(k, NodeKey::Entity { name: n, file_path, .. }
            if n == name && file_path == file))
}

#[tokio::test]
async fn s1_python_call_across_files() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.py"), "def foo(): helper()\n").unwrap();
    fs::write(dir.path().join("b.py"), "def helper(): pass\n").unwrap();

    let (pipeline, backend) = pipeline_with_backend();
    pipeline
        .index_path(dir.path(), false, None, false)
        .await
        .unwrap();

    let a = canonical(&dir.path().join("a.py"));
    let b = canonical(&dir.path().join("b.py"));

    let foo = function_node(&backend, "foo", &a).expect("foo@a.py exists");
    let helper = function_node(&backend, "helper", &b).expect("helper@b.py exists");
    assert!(matches!(&foo, NodeKey::Entity { line_number: 1, .. }));
    assert!(matches!(&helper, NodeKey::Entity { line_number: 1, .. }));

    let calls = backend.edges_of_kind(EdgeKind::Calls);
    let edge = calls
        .iter()
        .find(|(from, to, _)| *from == foo && *to == helper)
        .expect("CALLS foo -> helper");
    assert_eq!(edge.2.get("line_number").unwrap().as_i64(), Some(1));
}

#[tokio::test]
async fn s2_java_inheritance_and_implementation() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("Animal.java"), "class Animal {}\n").unwrap();
    fs::write(
        dir.path().join("Dog.java"),
        "class Dog extends Animal implements Runnable {}\n",
    )
    .unwrap();

    let (pipeline, backend) = pipeline_with_backend();
    pipeline
        .index_path(dir.path(), false, None, false)
        .await
        .unwrap();

    let animal_file = canonical(&dir.path().join("Animal.java"));
    let dog_file = canonical(&dir.path().join("Dog.java"));

    let inherits = backend.edges_of_kind(EdgeKind::Inherits);
    assert!(
        inherits.iter().any(|(from, to, _)| {
            matches!(from, NodeKey::Entity { name, file_path, .. }
                if name == "Dog" && file_path == &dog_file)
                && matches!(to, NodeKey::Entity { name, file_path, .. }
                    if name == "Animal" && file_path == &animal_file)
        }),
        "INHERITS Dog -> Animal"
    );

    let implements = backend.edges_of_kind(EdgeKind::Implements);
    assert!(
        implements.iter().any(|(from, to, _)| {
            matches!(from, NodeKey::Entity { name, .. } if name == "Dog")
                && matches!(to, NodeKey::Module { name } if name == "Runnable")
        }),
        "IMPLEMENTS Dog -> Runnable"
    );
}

#[tokio::test]
async fn s3_c_include_distinction() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("main.c"),
        "#include <stdio.h>\n#include \"util.h\"\nint main(void) { return 0; }\n",
    )
    .unwrap();

    let (pipeline, backend) = pipeline_with_backend();
    pipeline
        .index_path(dir.path(), false, None, false)
        .await
        .unwrap();

    let stdio = backend
        .node_props(&NodeKey::Module {
            name: "stdio.h".to_string(),
        })
        .expect("stdio.h module");
    assert_eq!(stdio.get("is_system").unwrap().as_bool(), Some(true));

    let util = backend
        .node_props(&NodeKey::Module {
            name: "util.h".to_string(),
        })
        .expect("util.h module");
    assert_eq!(util.get("is_system").unwrap().as_bool(), Some(false));

    let main_file = canonical(&dir.path().join("main.c"));
    let imports = backend.edges_of_kind(EdgeKind::Imports);
    for module in ["stdio.h", "util.h"] {
        assert!(
            imports.iter().any(|(from, to, _)| {
                matches!(from, NodeKey::File { path } if path == &main_file)
                    && matches!(to, NodeKey::Module { name } if name == module)
            }),
            "IMPORTS main.c -> {module}"
        );
    }
}

#[tokio::test]
async fn s4_css_cascade() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("s.css"),
        "p { color: red; }\n#id p { color: blue; }\n",
    )
    .unwrap();

    let (pipeline, backend) = pipeline_with_backend();
    pipeline
        .index_path(dir.path(), false, None, false)
        .await
        .unwrap();

    let rules = backend.nodes_with_label(NodeLabel::Rule);
    assert_eq!(rules.len(), 2);

    let overridden = backend.edges_of_kind(EdgeKind::OverriddenBy);
    assert_eq!(overridden.len(), 1);
    let (from, to, props) = &overridden[0];
    assert!(matches!(from, NodeKey::Entity { name, line_number: 1, .. } if name == "p"));
    assert!(matches!(to, NodeKey::Entity { name, line_number: 2, .. } if name == "#id p"));
    assert_eq!(props.get("specificity_diff").unwrap().as_i64(), Some(100));
}

#[tokio::test]
async fn s5_incremental_modify() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("a.py");
    fs::write(&file, "def foo(): pass\n").unwrap();

    let (pipeline, backend) = pipeline_with_backend();
    pipeline
        .index_path(dir.path(), false, None, false)
        .await
        .unwrap();
    assert_eq!(backend.nodes_with_label(NodeLabel::Function).len(), 1);

    // Rewrite and deliver a modify event. The size differs, so triage
    // detects the change even on filesystems with coarse mtime resolution.
    fs::write(&file, "def foo(): pass\ndef bar(): pass\n").unwrap();
    pipeline.update_file(dir.path(), &file).await.unwrap();

    let file_path = canonical(&file);
    let functions = backend.nodes_with_label(NodeLabel::Function);
    let mut names: Vec<String> = functions
        .iter()
        .filter_map(|k| match k {
            NodeKey::Entity { name, file_path: f, .. } if f == &file_path => {
                Some(name.clone())
            }
            _ => None,
        })
        .collect();
    names.sort();
    assert_eq!(names, vec!["bar", "foo"]);
    assert_eq!(functions.len(), 2, "no stale nodes survive");
}

#[tokio::test]
async fn s6_delete_file_cascade() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a.py");
    let b = dir.path().join("b.py");
    fs::write(&a, "def foo(): pass\nclass Left: pass\n").unwrap();
    fs::write(&b, "def bar(): pass\n").unwrap();

    let (pipeline, backend) = pipeline_with_backend();
    pipeline
        .index_path(dir.path(), false, None, false)
        .await
        .unwrap();

    let a_path = canonical(&a);
    let b_path = canonical(&b);
    let repo_key = NodeKey::Repository {
        path: canonical(dir.path()),
    };
    assert!(backend.node_props(&repo_key).is_some());

    fs::remove_file(&a).unwrap();
    pipeline.remove_file(Path::new(&a_path)).await.unwrap();

    // Everything from a.py is gone.
    for label in [NodeLabel::Function, NodeLabel::Class, NodeLabel::Variable] {
        assert!(
            backend
                .nodes_with_label(label)
                .iter()
                .all(|k| k.file_path() != Some(a_path.as_str())),
            "stale {label:?} node for deleted file"
        );
    }
    assert!(
        backend
            .node_props(&NodeKey::File {
                path: a_path.clone()
            })
            .is_none()
    );

    // b.py is untouched, and the repository survives.
    assert!(function_node(&backend, "bar", &b_path).is_some());
    assert!(backend.node_props(&repo_key).is_some());
}

#[tokio::test]
async fn job_tracks_progress_and_completion() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.py"), "def foo(): pass\n").unwrap();
    fs::write(dir.path().join("b.py"), "def bar(): pass\n").unwrap();

    let (pipeline, _) = pipeline_with_backend();
    let jobs = pipeline.jobs().clone();
    let job_id = jobs.create_job();
    assert_eq!(jobs.get(&job_id).unwrap().status, JobStatus::Pending);

    pipeline
        .index_path(dir.path(), false, Some(&job_id), false)
        .await
        .unwrap();

    let job = jobs.get(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.total_files, 2);
    assert_eq!(job.processed_files, 2);
    assert!((job.progress() - 100.0).abs() < f64::EPSILON);
    assert!(job.errors.is_empty());
}

#[tokio::test]
async fn parse_failure_never_aborts_the_batch() {
    let dir = TempDir::new().unwrap();
    // tree-sitter recovers from almost anything, so even mangled input
    // yields an IR; the healthy neighbor must be indexed either way.
    fs::write(dir.path().join("broken.py"), "def (((\n").unwrap();
    fs::write(dir.path().join("fine.py"), "def ok(): pass\n").unwrap();

    let (pipeline, backend) = pipeline_with_backend();
    let report = pipeline
        .index_path(dir.path(), false, None, false)
        .await
        .unwrap();
    assert_eq!(report.total_files, 2);

    let fine = canonical(&dir.path().join("fine.py"));
    assert!(function_node(&backend, "ok", &fine).is_some());
}

#[tokio::test]
async fn file_node_carries_metadata_props() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("a.py");
    fs::write(&file, "def foo(): pass\n").unwrap();

    let (pipeline, backend) = pipeline_with_backend();
    pipeline
        .index_path(dir.path(), false, None, false)
        .await
        .unwrap();

    let props = backend
        .node_props(&NodeKey::File {
            path: canonical(&file),
        })
        .unwrap();
    assert_eq!(props.get("language").unwrap().as_str(), Some("python"));
    assert_eq!(props.get("name").unwrap().as_str(), Some("a.py"));
    assert_eq!(props.get("content_hash").unwrap().as_str().unwrap().len(), 64);
    assert_eq!(props.get("size").unwrap().as_i64(), Some(16));
    assert!(props.get("last_indexed").unwrap().as_f64().unwrap() > 0.0);
    assert_eq!(
        props.get("parser_version").unwrap().as_str(),
        Some(codegraph::PARSER_VERSION)
    );
    assert_eq!(props.get("is_dependency").unwrap(), &Value::Bool(false));
}
