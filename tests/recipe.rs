use buildctx::{recipe::DEFAULT_DOCKERFILE, BuildContext, CancellationToken, ContextError, EntrySummary, Recipe};
use std::fs;

fn summary(path: &str, size: u64) -> EntrySummary {
    EntrySummary {
        path: path.to_string(),
        size,
    }
}

fn project_tree() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("app.py"), "print('hi')\n").unwrap();
    fs::create_dir(dir.path().join("static")).unwrap();
    fs::write(dir.path().join("static").join("index.html"), "<html></html>").unwrap();
    dir
}

#[test]
fn recipe_default_dockerfile() {
    let tree = project_tree();
    let context = BuildContext::new();
    Recipe::new(tree.path()).build(&context).unwrap();
    assert_eq!(
        context.entries().unwrap(),
        vec![
            summary("/app.py", 12),
            summary("/static/index.html", 13),
            summary("/Dockerfile", DEFAULT_DOCKERFILE.len() as u64),
        ]
    );
}

#[test]
fn recipe_custom_dockerfile_and_mount() {
    let tree = project_tree();
    let dockerfile_dir = tempfile::tempdir().unwrap();
    let dockerfile = dockerfile_dir.path().join("Dockerfile.dev");
    fs::write(&dockerfile, "FROM python:3\n").unwrap();

    let context = BuildContext::new();
    Recipe::new(tree.path())
        .dockerfile_from_path(&dockerfile)
        .unwrap()
        .mount_point("/app")
        .no_recurse()
        .build(&context)
        .unwrap();
    assert_eq!(
        context.entries().unwrap(),
        vec![summary("/app/app.py", 12), summary("/Dockerfile", 14)]
    );
}

#[test]
fn recipe_missing_dockerfile() {
    let tree = project_tree();
    let missing = tree.path().join("nope");
    match Recipe::new(tree.path()).dockerfile_from_path(&missing) {
        Err(ContextError::NotFound(path)) => assert_eq!(path, missing),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn recipe_missing_root_leaves_context_usable() {
    let tree = project_tree();
    let context = BuildContext::new();
    let result = Recipe::new(tree.path().join("gone")).build(&context);
    assert!(matches!(result, Err(ContextError::NotFound(_))));
    Recipe::new(tree.path())
        .dockerfile(b"FROM scratch".to_vec())
        .build(&context)
        .unwrap();
    assert_eq!(context.entries().unwrap().len(), 3);
}

#[tokio::test]
async fn recipe_build_async_matches_blocking() {
    let tree = project_tree();
    let recipe = Recipe::new(tree.path()).mount_point("/srv");

    let context = BuildContext::new();
    recipe
        .build_async(&context, &CancellationToken::new())
        .await
        .unwrap();
    let root = tree.path().to_path_buf();
    let entries = tokio::task::spawn_blocking(move || {
        let blocking = BuildContext::new();
        Recipe::new(root).mount_point("/srv").build(&blocking).unwrap();
        (context.entries().unwrap(), blocking.entries().unwrap())
    })
    .await
    .unwrap();
    assert_eq!(entries.0, entries.1);
    assert_eq!(entries.0[0], summary("/srv/app.py", 12));
}

#[tokio::test]
async fn recipe_build_async_cancelled() {
    let tree = project_tree();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let context = BuildContext::new();
    let result = Recipe::new(tree.path()).build_async(&context, &cancel).await;
    assert!(matches!(result, Err(ContextError::Cancelled)));
    assert!(!context.is_disposed());
}

#[test]
fn recipe_empty_mount_point_is_relative() {
    let tree = project_tree();
    let context = BuildContext::new();
    Recipe::new(tree.path())
        .mount_point("")
        .dockerfile(b"FROM scratch".to_vec())
        .build(&context)
        .unwrap();
    assert_eq!(
        context.entries().unwrap(),
        vec![
            summary("app.py", 12),
            summary("static/index.html", 13),
            summary("/Dockerfile", 12),
        ]
    );
}
