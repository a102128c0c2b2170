use modload::{Definer, Exports, Loader, LoaderError, Status, Transport};
use modload_transport::*;
use serde_json::{Value, json};
use std::future::Future;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, body: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

async fn local<F: Future>(future: F) -> F::Output {
    tokio::task::LocalSet::new().run_until(future).await
}

fn value(exports: &Exports) -> &Value {
    exports.downcast_ref::<Value>().expect("manifest modules export JSON")
}

#[tokio::test]
async fn test_builder_requires_existing_directory() {
    let temp = TempDir::new().unwrap();

    let err = FsTransport::builder().root(temp.path().join("missing")).build().await.unwrap_err();
    assert!(matches!(err, TransportError::Io { .. }), "got {err}");

    write(temp.path(), "file.json", "{}");
    let err = FsTransport::builder().root(temp.path().join("file.json")).build().await.unwrap_err();
    assert!(matches!(err, TransportError::PathTraversal { .. }), "got {err}");
}

#[tokio::test]
async fn test_locate_maps_and_sandboxes() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "vendor/jquery-3.mod", "{}");
    write(temp.path(), "app/main.mod", "{}");

    let transport = FsTransport::builder()
        .root(temp.path())
        .extension(".mod")
        .path("jquery", "vendor/jquery-3")
        .build()
        .await
        .unwrap();

    assert_eq!(transport.extension(), "mod");
    assert!(transport.locate("app/main").await.unwrap().ends_with("app/main.mod"));
    assert!(transport.locate("jquery").await.unwrap().ends_with("vendor/jquery-3.mod"));
    assert!(transport.locate("app/main.mod").await.unwrap().ends_with("app/main.mod"));
    assert!(matches!(transport.locate("ghost").await, Err(TransportError::NotFound { .. })));
    assert!(matches!(transport.locate("../etc/passwd").await, Err(TransportError::PathTraversal { .. })));
    assert!(matches!(transport.locate("app/../../x").await, Err(TransportError::PathTraversal { .. })));
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_escape_blocked() {
    let outside = TempDir::new().unwrap();
    let temp = TempDir::new().unwrap();
    write(outside.path(), "secret.json", r#"{ "value": "leak" }"#);
    std::os::unix::fs::symlink(outside.path().join("secret.json"), temp.path().join("secret.json")).unwrap();

    let transport = FsTransport::builder().root(temp.path()).build().await.unwrap();

    let err = transport.locate("secret").await.unwrap_err();
    assert!(matches!(err, TransportError::PathTraversal { .. }), "got {err}");
}

#[tokio::test]
async fn test_loads_a_module_tree() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "main.json", r#"{ "deps": ["lib/math", "lib/log"], "params": 1, "value": "app" }"#);
    write(temp.path(), "lib/math.json", r#"{ "value": { "pi": 3 } }"#);
    write(temp.path(), "lib/log.json", r#"{ "deps": ["lib/math"] }"#);

    let transport = FsTransport::builder().root(temp.path()).build().await.unwrap();

    local(async {
        let loader = Loader::new(transport);
        let main = loader.settle(loader.bootstrap("main").unwrap()).await.unwrap();

        assert_eq!(
            value(&main),
            &json!({ "id": "main", "value": "app", "deps": { "lib/math": { "id": "lib/math", "value": { "pi": 3 }, "deps": {} } } })
        );
        assert_eq!(loader.status("lib/log"), Status::Executed, "undeclared parameters still load");
        assert_eq!(value(&loader.exports("lib/log").unwrap())["deps"]["lib/math"]["value"]["pi"], 3);
    })
    .await;
}

#[tokio::test]
async fn test_bundle_defines_siblings() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "bundle.json",
        r#"[{ "id": "helper", "value": 1 }, { "deps": ["helper"], "value": 2 }]"#,
    );

    let transport = FsTransport::builder().root(temp.path()).build().await.unwrap();

    local(async {
        let loader = Loader::new(transport);
        let bundle = loader.settle(loader.import(["bundle"])).await.unwrap();
        let helper = loader.settle(loader.import(["helper"])).await.unwrap();

        assert_eq!(value(&bundle[0])["deps"]["helper"]["value"], 1);
        assert_eq!(value(&helper[0])["id"], "helper");
        assert!(loader.failures().is_empty(), "helper must come from the bundle, not its own file");
    })
    .await;
}

#[tokio::test]
async fn test_malformed_manifest_is_a_fetch_failure() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "broken.json", "{ deps: ");
    write(temp.path(), "fine.json", r#"{ "value": true }"#);

    let transport = FsTransport::builder().root(temp.path()).build().await.unwrap();

    local(async {
        let loader = Loader::new(transport);
        let broken = loader.import(["broken"]);
        let fine = loader.import(["fine"]);

        let err = loader.settle(broken).await.unwrap_err();
        assert!(matches!(err, LoaderError::FetchFailed { .. }), "got {err}");
        assert!(loader.failures()[0].reason.contains("Malformed manifest"), "{:?}", loader.failures());
        assert_eq!(loader.status("broken"), Status::Error);

        let fine = loader.settle(fine).await.unwrap();
        assert_eq!(value(&fine[0])["value"], true);
    })
    .await;
}

#[tokio::test]
async fn test_fetch_without_loader_reports_define_error() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "orphan.json", "{}");

    let transport = FsTransport::builder().root(temp.path()).build().await.unwrap();

    local(async {
        let loader = Loader::new(transport.clone());
        let definer: Definer = loader.definer();
        drop(loader);

        let err = transport.fetch(&"orphan".into(), definer).await.unwrap_err();
        assert!(matches!(err, TransportError::Define { .. }), "got {err}");
    })
    .await;
}
