//! Tests for repowiki-core: status machine, classification parsing, the
//! memory store, and the lease discipline

use chrono::{Duration, Utc};
use repowiki_core::store::{DocStore, StoreError};
use repowiki_core::types::*;
use repowiki_core::MemoryStore;
use uuid::Uuid;

fn repo(kind: RepoKind) -> Repository {
    Repository::new("https://example.test/acme/widget.git", kind, Some("main".into()))
}

// ===========================================================================
// Status machine
// ===========================================================================

#[test]
fn permitted_status_edges() {
    use RepoStatus::*;
    assert!(Pending.can_transition_to(Processing));
    assert!(Processing.can_transition_to(Completed));
    assert!(Processing.can_transition_to(Failed));
    assert!(Completed.can_transition_to(Processing));

    assert!(!Pending.can_transition_to(Completed));
    assert!(!Failed.can_transition_to(Completed));
    assert!(!Completed.can_transition_to(Failed));
}

// ===========================================================================
// Classification
// ===========================================================================

#[test]
fn classification_parse_is_case_insensitive() {
    for token in ["Applications", "applications", "APPLICATIONS"] {
        assert_eq!(
            Classification::parse(token),
            Some(Classification::Applications)
        );
    }
    assert_eq!(Classification::parse("CLITools"), Some(Classification::CLITools));
    assert_eq!(Classification::parse("clitools"), Some(Classification::CLITools));
    assert_eq!(Classification::parse("not-a-category"), None);
    assert_eq!(Classification::parse(""), None);
}

#[test]
fn classification_round_trips_through_display() {
    for c in Classification::ALL {
        assert_eq!(Classification::parse(c.as_str()), Some(c));
    }
}

// ===========================================================================
// Mind map URL resolution
// ===========================================================================

#[test]
fn mind_map_urls_resolve_for_known_hosts() {
    let mut node = MindMapNode::new("Engine");
    node.url = Some("src/engine.rs".to_string());
    node.resolve_urls("https://github.com/acme/widget.git", "main");
    assert_eq!(
        node.url.as_deref(),
        Some("https://github.com/acme/widget/tree/main/src/engine.rs")
    );
}

#[test]
fn mind_map_urls_untouched_for_unknown_hosts() {
    let mut node = MindMapNode::new("Engine");
    node.url = Some("src/engine.rs".to_string());
    node.resolve_urls("https://git.internal.example/acme/widget", "dev");
    assert_eq!(node.url.as_deref(), Some("src/engine.rs"));
}

#[test]
fn mind_map_resolution_recurses() {
    let mut root = MindMapNode::new("root");
    let mut child = MindMapNode::new("child");
    child.url = Some("a/b.rs".to_string());
    root.children.push(child);
    root.resolve_urls("https://gitee.com/acme/widget", "main");
    assert!(root.children[0].url.as_deref().unwrap().starts_with("https://gitee.com/"));
}

// ===========================================================================
// Lease discipline
// ===========================================================================

#[tokio::test]
async fn lease_prefers_interrupted_work() {
    let store = MemoryStore::new();
    let mut processing = repo(RepoKind::Git);
    processing.status = RepoStatus::Processing;
    let processing_id = processing.id;
    let pending = repo(RepoKind::Git);

    store.insert_repository(pending).await.unwrap();
    store.insert_repository(processing).await.unwrap();

    let claimed = store
        .lease_repository("w1", Duration::seconds(60))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.id, processing_id);
    assert_eq!(claimed.status, RepoStatus::Processing);
    assert_eq!(claimed.owner.as_deref(), Some("w1"));
}

#[tokio::test]
async fn lease_is_exclusive_until_deadline() {
    let store = MemoryStore::new();
    store.insert_repository(repo(RepoKind::Git)).await.unwrap();

    let first = store
        .lease_repository("w1", Duration::seconds(60))
        .await
        .unwrap();
    assert!(first.is_some());

    // Second worker finds nothing while the lease is live.
    let second = store
        .lease_repository("w2", Duration::seconds(60))
        .await
        .unwrap();
    assert!(second.is_none());
}

#[tokio::test]
async fn expired_lease_can_be_reclaimed() {
    let store = MemoryStore::new();
    store.insert_repository(repo(RepoKind::Git)).await.unwrap();

    store
        .lease_repository("w1", Duration::seconds(-1))
        .await
        .unwrap()
        .unwrap();
    let reclaimed = store
        .lease_repository("w2", Duration::seconds(60))
        .await
        .unwrap();
    assert!(reclaimed.is_some());
    assert_eq!(reclaimed.unwrap().owner.as_deref(), Some("w2"));
}

#[tokio::test]
async fn update_without_lease_fails_precondition() {
    let store = MemoryStore::new();
    let r = repo(RepoKind::Git);
    store.insert_repository(r.clone()).await.unwrap();

    let leased = store
        .lease_repository("w1", Duration::seconds(60))
        .await
        .unwrap()
        .unwrap();

    let err = store.update_repository(&leased, "w2").await.unwrap_err();
    assert!(matches!(err, StoreError::PreconditionFailed(_)));

    let err = store
        .release_repository(leased.id, "w2", RepoStatus::Failed, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::PreconditionFailed(_)));
}

#[tokio::test]
async fn release_clears_lease_and_sets_status() {
    let store = MemoryStore::new();
    store.insert_repository(repo(RepoKind::Git)).await.unwrap();
    let leased = store
        .lease_repository("w1", Duration::seconds(60))
        .await
        .unwrap()
        .unwrap();

    store
        .release_repository(leased.id, "w1", RepoStatus::Completed, None)
        .await
        .unwrap();
    let stored = store.get_repository(leased.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RepoStatus::Completed);
    assert!(stored.owner.is_none());
    assert!(stored.lease_deadline.is_none());
}

#[tokio::test]
async fn update_preserves_lease_fields() {
    let store = MemoryStore::new();
    store.insert_repository(repo(RepoKind::Git)).await.unwrap();
    let mut leased = store
        .lease_repository("w1", Duration::seconds(60))
        .await
        .unwrap()
        .unwrap();

    leased.readme = Some("readme text".into());
    leased.owner = None; // a buggy caller clearing lease fields is ignored
    store.update_repository(&leased, "w1").await.unwrap();

    let stored = store.get_repository(leased.id).await.unwrap().unwrap();
    assert_eq!(stored.readme.as_deref(), Some("readme text"));
    assert_eq!(stored.owner.as_deref(), Some("w1"));
}

// ===========================================================================
// Stale-repository lease (incremental updater)
// ===========================================================================

#[tokio::test]
async fn stale_lease_requires_completed_and_old_document() {
    let store = MemoryStore::new();
    let mut done = repo(RepoKind::Git);
    done.status = RepoStatus::Completed;
    let done_id = done.id;
    store.insert_repository(done).await.unwrap();

    let mut doc = DocumentRecord::new(done_id, "/tmp/wt");
    doc.last_update = Utc::now() - Duration::days(30);
    store.upsert_document(doc).await.unwrap();

    // Fresh documents are not stale.
    let none = store
        .lease_stale_repository("u1", Duration::seconds(60), Utc::now() - Duration::days(60))
        .await
        .unwrap();
    assert!(none.is_none());

    let claimed = store
        .lease_stale_repository("u1", Duration::seconds(60), Utc::now() - Duration::days(7))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.id, done_id);
    // Completed → Processing is the incremental re-entry edge.
    assert_eq!(claimed.status, RepoStatus::Processing);
}

// ===========================================================================
// Artifact ownership operations
// ===========================================================================

#[tokio::test]
async fn overview_replacement_deletes_prior_row() {
    let store = MemoryStore::new();
    let doc_id = Uuid::new_v4();
    store.replace_overview(doc_id, "v1").await.unwrap();
    let first = store.get_overview(doc_id).await.unwrap().unwrap();
    store.replace_overview(doc_id, "v2").await.unwrap();
    let second = store.get_overview(doc_id).await.unwrap().unwrap();
    assert_eq!(second.content, "v2");
    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn catalogue_replacement_drops_old_nodes_and_items() {
    let store = MemoryStore::new();
    let repo_id = Uuid::new_v4();

    let old = CatalogueNode {
        id: Uuid::new_v4(),
        repository_id: repo_id,
        parent_id: None,
        title: "old".into(),
        name: "Old".into(),
        url: "old".into(),
        description: String::new(),
        prompt: String::new(),
        order_index: 0,
        is_completed: true,
        is_deleted: false,
        created_at: Utc::now(),
    };
    let old_id = old.id;
    store.replace_catalogue(repo_id, vec![old]).await.unwrap();
    store
        .upsert_file_item(FileItem {
            id: Uuid::new_v4(),
            catalogue_id: old_id,
            title: "Old".into(),
            content: "text".into(),
            source_files: vec![],
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    let new = CatalogueNode {
        id: Uuid::new_v4(),
        repository_id: repo_id,
        parent_id: None,
        title: "new".into(),
        name: "New".into(),
        url: "new".into(),
        description: String::new(),
        prompt: String::new(),
        order_index: 0,
        is_completed: false,
        is_deleted: false,
        created_at: Utc::now(),
    };
    store.replace_catalogue(repo_id, vec![new]).await.unwrap();

    let nodes = store.list_catalogue(repo_id).await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].title, "new");
    // The orphaned file item went with its leaf.
    assert!(store.get_file_item(old_id).await.unwrap().is_none());
}

#[tokio::test]
async fn soft_deleted_nodes_are_invisible() {
    let store = MemoryStore::new();
    let repo_id = Uuid::new_v4();
    let mut node = CatalogueNode {
        id: Uuid::new_v4(),
        repository_id: repo_id,
        parent_id: None,
        title: "t".into(),
        name: "T".into(),
        url: "t".into(),
        description: String::new(),
        prompt: String::new(),
        order_index: 0,
        is_completed: false,
        is_deleted: false,
        created_at: Utc::now(),
    };
    store.replace_catalogue(repo_id, vec![node.clone()]).await.unwrap();
    assert_eq!(store.list_catalogue(repo_id).await.unwrap().len(), 1);

    node.is_deleted = true;
    store.update_catalogue_node(&node).await.unwrap();
    assert!(store.list_catalogue(repo_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn commit_records_sort_by_creation() {
    let store = MemoryStore::new();
    let repo_id = Uuid::new_v4();
    let base = Utc::now();
    let records: Vec<CommitRecord> = (0..3)
        .map(|i| CommitRecord {
            id: Uuid::new_v4(),
            repository_id: repo_id,
            title: format!("commit {}", i),
            description: String::new(),
            commit_date: base + Duration::minutes(i),
            created_at: base + Duration::seconds(i),
        })
        .collect();
    store
        .replace_commit_records(repo_id, records)
        .await
        .unwrap();

    let listed = store.list_commit_records(repo_id).await.unwrap();
    assert_eq!(listed.len(), 3);
    // Dates are non-decreasing in created_at order.
    assert!(listed.windows(2).all(|w| w[0].commit_date <= w[1].commit_date));
}

#[tokio::test]
async fn document_upsert_is_one_row_per_repository() {
    let store = MemoryStore::new();
    let repo_id = Uuid::new_v4();
    let first = store
        .upsert_document(DocumentRecord::new(repo_id, "/a"))
        .await
        .unwrap();
    let second = store
        .upsert_document(DocumentRecord::new(repo_id, "/b"))
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.git_path, "/b");
}
