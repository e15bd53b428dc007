use cascade_protocol::metadata::DerivativeKind;
use cascade_protocol::store::CodeStore;
use cascade_protocol::{FunctionId, FunctionMetadata, SemVer};
use cascade_store::InMemoryStore;
use std::collections::HashMap;

fn metadata(id: &str, version: &str) -> FunctionMetadata {
    FunctionMetadata {
        id: FunctionId::new(id).unwrap(),
        version: SemVer::parse(version).unwrap(),
        r#type: None,
        name: id.to_string(),
        description: Some("a test function".into()),
        language: Some("javascript".into()),
        entry_point: Some("index.handler".into()),
        dependencies: HashMap::new(),
        input_schema: None,
        output_schema: None,
        tags: vec![],
        permissions: vec![],
        system_prompt: None,
        user_prompt: None,
        goal: None,
        created_at: 1000,
        updated_at: 1000,
    }
}

#[tokio::test]
async fn put_then_get_metadata_round_trips() {
    let store = InMemoryStore::new();
    store.put_metadata(metadata("sum", "1.0.0")).await.unwrap();
    let got = store
        .get_metadata(&FunctionId::new("sum").unwrap(), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(got.name, "sum");
}

#[tokio::test]
async fn put_metadata_preserves_created_at_across_versions() {
    let store = InMemoryStore::new();
    let id = FunctionId::new("sum").unwrap();
    store.put_metadata(metadata("sum", "1.0.0")).await.unwrap();

    let mut v2 = metadata("sum", "2.0.0");
    v2.created_at = 9999; // should be ignored in favor of v1's createdAt
    store.put_metadata(v2).await.unwrap();

    let got = store.get_metadata(&id, None).await.unwrap().unwrap();
    assert_eq!(got.created_at, 1000);
}

#[tokio::test]
async fn list_metadata_rebuilds_manifest_when_absent() {
    let store = InMemoryStore::new();
    store.put_metadata(metadata("a", "1.0.0")).await.unwrap();
    store.put_metadata(metadata("b", "1.0.0")).await.unwrap();

    let page = store.list_metadata(None, 10).await.unwrap();
    assert_eq!(page.items.len(), 2);
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn list_metadata_paginates() {
    let store = InMemoryStore::new();
    for i in 0..5 {
        store
            .put_metadata(metadata(&format!("fn-{i}"), "1.0.0"))
            .await
            .unwrap();
    }
    let page1 = store.list_metadata(None, 2).await.unwrap();
    assert_eq!(page1.items.len(), 2);
    assert!(page1.next_cursor.is_some());

    let page2 = store
        .list_metadata(page1.next_cursor.as_deref(), 2)
        .await
        .unwrap();
    assert_eq!(page2.items.len(), 2);
}

#[tokio::test]
async fn delete_metadata_removes_all_traces() {
    let store = InMemoryStore::new();
    let id = FunctionId::new("sum").unwrap();
    store.put_metadata(metadata("sum", "1.0.0")).await.unwrap();
    store.delete_metadata(&id).await.unwrap();

    assert!(store.get_metadata(&id, None).await.unwrap().is_none());
    let history = store.deployment_history(&id).await.unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn rollback_repoints_latest_and_records_synthetic_deployment() {
    let store = InMemoryStore::new();
    let id = FunctionId::new("sum").unwrap();
    store.put_metadata(metadata("sum", "1.0.0")).await.unwrap();
    store.put_metadata(metadata("sum", "2.0.0")).await.unwrap();

    store
        .rollback(&id, &SemVer::parse("1.0.0").unwrap())
        .await
        .unwrap();

    let latest = store.get_metadata(&id, None).await.unwrap().unwrap();
    assert_eq!(latest.version.to_string(), "1.0.0");

    let history = store.deployment_history(&id).await.unwrap();
    assert!(history.last().unwrap().is_rollback);
}

#[tokio::test]
async fn code_round_trips_through_compression_path() {
    let store = InMemoryStore::new();
    let id = FunctionId::new("sum").unwrap();
    let version = SemVer::parse("1.0.0").unwrap();
    let code = "function handler(input) { return input.a + input.b; }\n".repeat(50);

    store
        .put_code(&id, &code, &version, DerivativeKind::Source)
        .await
        .unwrap();
    let got = store
        .get_code(&id, Some(&version), DerivativeKind::Source)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(got, code);
}

#[tokio::test]
async fn get_with_fallback_uses_first_available_version() {
    let store = InMemoryStore::new();
    let id = FunctionId::new("sum").unwrap();
    let v1 = SemVer::parse("1.0.0").unwrap();
    let v2 = SemVer::parse("2.0.0").unwrap();

    store
        .put_code(&id, "old code", &v1, DerivativeKind::Source)
        .await
        .unwrap();

    let result = store
        .get_with_fallback(&id, &v2, &[v1.clone()])
        .await
        .unwrap()
        .unwrap();
    assert!(result.used_fallback);
    assert_eq!(result.served_version, v1);
    assert_eq!(result.code, "old code");
}

#[tokio::test]
async fn get_with_fallback_returns_none_when_nothing_available() {
    let store = InMemoryStore::new();
    let id = FunctionId::new("missing").unwrap();
    let v1 = SemVer::parse("1.0.0").unwrap();

    let result = store.get_with_fallback(&id, &v1, &[]).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn list_versions_sorted_is_semver_ordered() {
    let store = InMemoryStore::new();
    let id = FunctionId::new("sum").unwrap();
    for v in ["1.10.0", "1.2.0", "2.0.0"] {
        store.put_metadata(metadata("sum", v)).await.unwrap();
    }
    let sorted = store.list_versions_sorted(&id).await.unwrap();
    let strs: Vec<String> = sorted.iter().map(|v| v.to_string()).collect();
    assert_eq!(strs, vec!["1.2.0", "1.10.0", "2.0.0"]);
}

#[tokio::test]
async fn large_object_round_trips_across_chunk_boundary() {
    let store = InMemoryStore::new();
    let id = FunctionId::new("big").unwrap();
    let version = SemVer::parse("1.0.0").unwrap();
    // Smaller than a real 25 MiB chunk but exercises the same chunking path.
    let payload = vec![7u8; 4096];

    store
        .put_large(&id, &payload, &version, DerivativeKind::Wasm)
        .await
        .unwrap();
    let got = store
        .get_large(&id, Some(&version), DerivativeKind::Wasm)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(got, payload);
}

#[tokio::test]
async fn delete_large_removes_object() {
    let store = InMemoryStore::new();
    let id = FunctionId::new("big").unwrap();
    let version = SemVer::parse("1.0.0").unwrap();
    store
        .put_large(&id, &[1, 2, 3], &version, DerivativeKind::Wasm)
        .await
        .unwrap();
    store
        .delete_large(&id, &version, DerivativeKind::Wasm)
        .await
        .unwrap();
    assert!(store
        .get_large(&id, Some(&version), DerivativeKind::Wasm)
        .await
        .unwrap()
        .is_none());
}
