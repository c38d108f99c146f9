//! End-to-end pipeline tests: scripted provider + fake git + memory store

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use repowiki_core::config::Config;
use repowiki_core::git::{
    CloneOutcome, CommitInfo, DiffEntry, GitClient, GitResult, PullOutcome,
};
use repowiki_core::store::DocStore;
use repowiki_core::types::*;
use repowiki_core::MemoryStore;
use repowiki_kernel::Kernel;
use repowiki_llm::testing::ScriptedProvider;
use repowiki_pipeline::worker::KernelFactory;
use repowiki_pipeline::{stages, StageContext, Updater, Worker};
use repowiki_tools::ToolOptions;

// ===========================================================================
// Fakes
// ===========================================================================

#[derive(Default)]
struct FakeGit {
    /// Files written into the working tree on clone.
    files: Vec<(String, String)>,
    log: Vec<CommitInfo>,
    pull: Mutex<Option<PullOutcome>>,
    diffs: HashMap<(String, String), Vec<DiffEntry>>,
    clone_calls: AtomicUsize,
}

#[async_trait::async_trait]
impl GitClient for FakeGit {
    async fn clone_repository(
        &self,
        address: &str,
        _user: Option<&str>,
        _password: Option<&str>,
        branch: Option<&str>,
        target_dir: &str,
    ) -> GitResult<CloneOutcome> {
        self.clone_calls.fetch_add(1, Ordering::SeqCst);
        for (rel, content) in &self.files {
            let path = Path::new(target_dir).join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        let name = address
            .trim_end_matches(".git")
            .rsplit('/')
            .next()
            .unwrap_or("repo")
            .to_string();
        Ok(CloneOutcome {
            local_path: target_dir.to_string(),
            repository_name: name,
            branch_name: branch.unwrap_or("main").to_string(),
            organization: "org".to_string(),
            version: "v0".to_string(),
        })
    }

    async fn pull(
        &self,
        _local_path: &str,
        since: Option<&str>,
        _user: Option<&str>,
        _password: Option<&str>,
    ) -> GitResult<PullOutcome> {
        Ok(self.pull.lock().unwrap().take().unwrap_or(PullOutcome {
            commits: Vec::new(),
            head_version: since.unwrap_or("v0").to_string(),
        }))
    }

    async fn diff(&self, _local_path: &str, from: &str, to: &str) -> GitResult<Vec<DiffEntry>> {
        Ok(self
            .diffs
            .get(&(from.to_string(), to.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn log(&self, _local_path: &str, limit: usize) -> GitResult<Vec<CommitInfo>> {
        Ok(self.log.iter().take(limit).cloned().collect())
    }
}

fn commit(id: &str, message: &str, date: DateTime<Utc>) -> CommitInfo {
    CommitInfo {
        id: id.to_string(),
        message: message.to_string(),
        author: "dev".to_string(),
        date,
    }
}

fn scripted_factory(provider: Arc<ScriptedProvider>) -> KernelFactory {
    Arc::new(move |working_path, _config| {
        Ok(Kernel::with_provider(
            provider.clone(),
            working_path,
            "test-model",
            &ToolOptions::default(),
            None,
        ))
    })
}

fn test_config(clone_root: &Path) -> Config {
    let mut config = Config::default();
    config.worker.clone_root = clone_root.to_string_lossy().to_string();
    config.worker.poll_interval_secs = 0;
    config
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn node(repo_id: Uuid, title: &str, completed: bool) -> CatalogueNode {
    CatalogueNode {
        id: Uuid::new_v4(),
        repository_id: repo_id,
        parent_id: None,
        title: title.to_string(),
        name: title.to_string(),
        url: title.to_string(),
        description: String::new(),
        prompt: format!("Document {}.", title),
        order_index: 0,
        is_completed: completed,
        is_deleted: false,
        created_at: Utc::now(),
    }
}

const OUTLINE_REPLY: &str = "<documentation_structure>{\"items\":[{\"title\":\"guide\",\"name\":\"Guide\",\"prompt\":\"Explain the guide.\",\"children\":[]}]}</documentation_structure>";

// ===========================================================================
// Scenario: fresh git repository without a README
// ===========================================================================

#[tokio::test]
async fn fresh_git_repository_completes_end_to_end() {
    let clone_root = tempfile::tempdir().unwrap();
    let store: Arc<dyn DocStore> = Arc::new(MemoryStore::new());
    let base = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
    let git = Arc::new(FakeGit {
        files: vec![
            ("src/app.js".to_string(), "function main() {}\n".to_string()),
            ("package.json".to_string(), "{}".to_string()),
        ],
        log: vec![
            commit("c2", "feat: second\n\nbody", base + Duration::hours(1)),
            commit("c1", "feat: first", base),
        ],
        ..Default::default()
    });

    let provider = Arc::new(ScriptedProvider::new());
    provider.push_text("<readme>Generated readme</readme>");
    provider.push_text("<classify>classifyName:Libraries</classify>");
    provider.push_text("# Core\n## App:src/app.js\n");
    provider.push_text("<project_analysis>notes</project_analysis><blog>Overview body</blog>");
    provider.push_text(OUTLINE_REPLY);
    provider.push_text("<blog>Guide content</blog>");

    let config = Arc::new(test_config(clone_root.path()));
    let repo = Repository::new(
        "https://example.test/org/widget.git",
        RepoKind::Git,
        Some("main".to_string()),
    );
    let id = repo.id;
    store.insert_repository(repo).await.unwrap();

    let worker = Worker::new(store.clone(), git.clone(), config)
        .with_kernel_factory(scripted_factory(provider.clone()));
    assert!(worker.step(&CancellationToken::new()).await.unwrap());

    let done = store.get_repository(id).await.unwrap().unwrap();
    assert_eq!(done.status, RepoStatus::Completed);
    assert!(done.error.is_none());
    assert_eq!(done.readme.as_deref(), Some("Generated readme"));
    assert_eq!(done.classification, Some(Classification::Libraries));
    assert_eq!(done.name.as_deref(), Some("widget"));
    assert_eq!(done.version.as_deref(), Some("v0"));
    assert!(done
        .optimized_directory_structure
        .as_deref()
        .unwrap()
        .contains("src/app.js/F"));

    // Mind map persisted and non-empty.
    let map = store.get_mind_map(id).await.unwrap().unwrap();
    assert_eq!(map.root.children[0].title, "Core");
    assert_eq!(
        map.root.children[0].children[0].url.as_deref(),
        Some("src/app.js")
    );

    // Overview stripped of analysis and wrapper.
    let document = store.get_document(id).await.unwrap().unwrap();
    assert_eq!(document.status, RepoStatus::Completed);
    let overview = store.get_overview(document.id).await.unwrap().unwrap();
    assert_eq!(overview.content, "Overview body");

    // Catalogue exists and every leaf has generated content.
    let nodes = store.list_catalogue(id).await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert!(nodes[0].is_completed);
    let item = store.get_file_item(nodes[0].id).await.unwrap().unwrap();
    assert_eq!(item.content, "Guide content");

    // Update log regenerated, dates non-decreasing in stored order.
    let records = store.list_commit_records(id).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].title, "feat: first");
    assert_eq!(records[1].title, "feat: second");
    assert_eq!(records[1].description, "body");
    assert!(records[0].commit_date <= records[1].commit_date);

    assert_eq!(provider.remaining(), 0);
}

// ===========================================================================
// Scenario: small repository with the smart filter disabled
// ===========================================================================

#[tokio::test]
async fn small_repository_stores_raw_compact_manifest() {
    let working = tempfile::tempdir().unwrap();
    write(working.path(), "README.md", "# Widget\nA thing.");
    write(working.path(), "src/lib.rs", "pub fn f() {}\n");

    let store: Arc<dyn DocStore> = Arc::new(MemoryStore::new());
    let git = Arc::new(FakeGit::default());
    let provider = Arc::new(ScriptedProvider::new());
    provider.push_text("<classify>classifyName:Libraries</classify>");
    provider.push_text("# Core\n");
    provider.push_text("<blog>Overview</blog>");
    provider.push_text(OUTLINE_REPLY);
    provider.push_text("<blog>Guide</blog>");

    let mut config = test_config(working.path());
    config.document.enable_smart_filter = false;
    let repo = Repository::new(
        working.path().to_string_lossy().to_string(),
        RepoKind::File,
        None,
    );
    let id = repo.id;
    store.insert_repository(repo).await.unwrap();

    let worker = Worker::new(store.clone(), git.clone(), Arc::new(config))
        .with_kernel_factory(scripted_factory(provider.clone()));
    worker.step(&CancellationToken::new()).await.unwrap();

    let done = store.get_repository(id).await.unwrap().unwrap();
    assert_eq!(done.status, RepoStatus::Completed);

    // Byte-equal to the direct compact rendering.
    let paths = repowiki_scan::scan(working.path()).unwrap();
    let expected = repowiki_scan::FileTree::build(&paths).compact();
    assert_eq!(done.optimized_directory_structure.as_deref(), Some(expected.as_str()));

    // README came from the working tree, re-synced into the row.
    assert_eq!(done.readme.as_deref(), Some("# Widget\nA thing."));

    // No directory-simplifier call was issued.
    for request in provider.requests() {
        let text = serde_json::to_string(&request.messages).unwrap();
        assert!(!text.contains("response_file"));
    }

    // File kind never clones and never writes commit records.
    assert_eq!(git.clone_calls.load(Ordering::SeqCst), 0);
    assert!(store.list_commit_records(id).await.unwrap().is_empty());
}

// ===========================================================================
// Scenario: large repository, filter enabled, two transient failures
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn smart_filter_retries_twice_then_succeeds() {
    let working = tempfile::tempdir().unwrap();
    // Exactly the threshold: the strict `< 800` cutoff must still filter.
    for i in 0..800 {
        write(
            working.path(),
            &format!("src/m{:03}.rs", i),
            "pub fn f() {}\n",
        );
    }

    let store = MemoryStore::new();
    let mut seed = Repository::new(
        working.path().to_string_lossy().to_string(),
        RepoKind::File,
        None,
    );
    seed.readme = Some("readme".to_string());
    seed.local_path = Some(working.path().to_string_lossy().to_string());
    store.insert_repository(seed).await.unwrap();
    let mut repo = store
        .lease_repository("w1", Duration::seconds(600))
        .await
        .unwrap()
        .unwrap();
    let document = store
        .upsert_document(DocumentRecord::new(repo.id, "wt"))
        .await
        .unwrap();

    let provider = Arc::new(ScriptedProvider::new());
    provider.push_fail("connection reset");
    provider.push_fail("connection reset again");
    provider.push_text("<response_file>src/m000.rs/F</response_file>");

    let kernel = Kernel::with_provider(
        provider.clone(),
        working.path(),
        "test-model",
        &ToolOptions::default(),
        None,
    );
    let git = FakeGit::default();
    let config = test_config(working.path());

    let mut ctx = StageContext {
        repo: &mut repo,
        document: &document,
        kernel: &kernel,
        store: &store,
        git: &git,
        config: &config,
        owner: "w1",
        cancel: CancellationToken::new(),
    };
    stages::catalogue::run(&mut ctx).await.unwrap();

    assert_eq!(provider.call_count(), 3);
    assert_eq!(
        repo.optimized_directory_structure.as_deref(),
        Some("src/m000.rs/F")
    );
    let stored = store.get_repository(repo.id).await.unwrap().unwrap();
    assert_eq!(
        stored.optimized_directory_structure.as_deref(),
        Some("src/m000.rs/F")
    );
}

// ===========================================================================
// Scenario: resume with stage 7 partially complete
// ===========================================================================

#[tokio::test]
async fn resume_regenerates_only_incomplete_leaves() {
    let clone_root = tempfile::tempdir().unwrap();
    let store: Arc<dyn DocStore> = Arc::new(MemoryStore::new());
    let base = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
    let git = Arc::new(FakeGit {
        files: vec![("src/app.js".to_string(), "function main() {}\n".to_string())],
        log: vec![commit("c1", "feat: first", base)],
        ..Default::default()
    });

    let mut repo = Repository::new(
        "https://example.test/org/widget.git",
        RepoKind::Git,
        Some("main".to_string()),
    );
    repo.readme = Some("existing readme".to_string());
    repo.optimized_directory_structure = Some("src/app.js/F\n".to_string());
    repo.classification = Some(Classification::Libraries);
    repo.status = RepoStatus::Processing; // interrupted run
    let id = repo.id;
    store.insert_repository(repo).await.unwrap();

    let mut nodes = Vec::new();
    for (i, title) in ["a", "b", "c", "d", "e"].iter().enumerate() {
        let mut n = node(id, title, i < 3);
        n.order_index = i;
        nodes.push(n);
    }
    store.replace_catalogue(id, nodes).await.unwrap();

    let provider = Arc::new(ScriptedProvider::new());
    provider.push_text("# Map\n"); // stage 4
    provider.push_text("<blog>Overview</blog>"); // stage 5
    provider.push_text("<blog>doc for d</blog>"); // stage 7, leaf d
    provider.push_text("<blog>doc for e</blog>"); // stage 7, leaf e

    let config = Arc::new(test_config(clone_root.path()));
    let worker = Worker::new(store.clone(), git.clone(), config)
        .with_kernel_factory(scripted_factory(provider.clone()));
    worker.step(&CancellationToken::new()).await.unwrap();

    let done = store.get_repository(id).await.unwrap().unwrap();
    assert_eq!(done.status, RepoStatus::Completed, "{:?}", done.error);

    // Exactly two document-generation calls: the incomplete leaves.
    let doc_calls = provider
        .requests()
        .iter()
        .filter(|r| {
            serde_json::to_string(&r.messages)
                .unwrap()
                .contains("Write one documentation page")
        })
        .count();
    assert_eq!(doc_calls, 2);
    assert_eq!(provider.call_count(), 4);
    assert_eq!(provider.remaining(), 0);

    // The previously completed leaves kept their state; the catalogue was
    // not regenerated.
    let nodes = store.list_catalogue(id).await.unwrap();
    assert_eq!(nodes.len(), 5);
    assert!(nodes.iter().all(|n| n.is_completed));

    // Stage 8 ran afterwards.
    assert_eq!(store.list_commit_records(id).await.unwrap().len(), 1);
}

// ===========================================================================
// Scenario: incremental update touching one catalogue node
// ===========================================================================

#[tokio::test]
async fn incremental_update_refreshes_only_affected_leaves() {
    let working = tempfile::tempdir().unwrap();
    write(working.path(), "src/app.js", "function main() {}\n");

    let store: Arc<dyn DocStore> = Arc::new(MemoryStore::new());
    let base = Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap();

    let mut repo = Repository::new(
        "https://example.test/org/widget.git",
        RepoKind::Git,
        Some("main".to_string()),
    );
    repo.status = RepoStatus::Completed;
    repo.version = Some("v0".to_string());
    repo.local_path = Some(working.path().to_string_lossy().to_string());
    repo.optimized_directory_structure = Some("src/app.js/F\n".to_string());
    let id = repo.id;
    store.insert_repository(repo).await.unwrap();

    let mut doc = DocumentRecord::new(id, working.path().to_string_lossy().to_string());
    doc.last_update = Utc::now() - Duration::days(30);
    doc.status = RepoStatus::Completed;
    store.upsert_document(doc).await.unwrap();

    let cat1 = node(id, "engine", true);
    let cat2 = node(id, "cli", true);
    let cat1_id = cat1.id;
    let cat2_id = cat2.id;
    store
        .replace_catalogue(id, vec![cat1, cat2])
        .await
        .unwrap();
    for (cat, text) in [(cat1_id, "old engine doc"), (cat2_id, "old cli doc")] {
        store
            .upsert_file_item(FileItem {
                id: Uuid::new_v4(),
                catalogue_id: cat,
                title: "t".into(),
                content: text.into(),
                source_files: vec![],
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    let mut diffs = HashMap::new();
    diffs.insert(
        ("v0".to_string(), "c1".to_string()),
        vec![DiffEntry {
            status: "M".to_string(),
            path: "src/app.js".to_string(),
        }],
    );
    diffs.insert(
        ("c1".to_string(), "c2".to_string()),
        vec![DiffEntry {
            status: "A".to_string(),
            path: "src/extra.js".to_string(),
        }],
    );
    let git = Arc::new(FakeGit {
        pull: Mutex::new(Some(PullOutcome {
            commits: vec![
                commit("c1", "fix: engine tweak", base),
                commit("c2", "feat: more engine", base + Duration::hours(2)),
            ],
            head_version: "v_head".to_string(),
        })),
        diffs,
        ..Default::default()
    });

    let provider = Arc::new(ScriptedProvider::new());
    provider.push_text(&format!(
        "```json\n{{\"update\": [\"{}\"], \"add\": [], \"delete\": []}}\n```",
        cat1_id
    ));
    provider.push_text("<blog>refreshed engine doc</blog>");

    let config = Arc::new(test_config(working.path()));
    let updater = Updater::new(store.clone(), git, config)
        .with_kernel_factory(scripted_factory(provider.clone()));
    assert!(updater.step(&CancellationToken::new()).await.unwrap());

    let done = store.get_repository(id).await.unwrap().unwrap();
    assert_eq!(done.status, RepoStatus::Completed, "{:?}", done.error);
    assert_eq!(done.version.as_deref(), Some("v_head"));

    // Only the touched leaf regenerated.
    let engine = store.get_file_item(cat1_id).await.unwrap().unwrap();
    assert_eq!(engine.content, "refreshed engine doc");
    let cli = store.get_file_item(cat2_id).await.unwrap().unwrap();
    assert_eq!(cli.content, "old cli doc");
    let nodes = store.list_catalogue(id).await.unwrap();
    assert!(nodes.iter().all(|n| n.is_completed));

    // The update log was replaced with the two pulled commits, in date
    // order, and the reconciliation prompt saw the diff summary.
    let records = store.list_commit_records(id).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].title, "fix: engine tweak");
    assert!(records[0].commit_date <= records[1].commit_date);

    let first_request = serde_json::to_string(&provider.requests()[0].messages).unwrap();
    assert!(first_request.contains("<commit>"));
    assert!(first_request.contains("M: src/app.js"));

    let document = store.get_document(id).await.unwrap().unwrap();
    assert!(document.last_update > Utc::now() - Duration::minutes(5));
}

// ===========================================================================
// Scenario: unsupported repository kind
// ===========================================================================

#[tokio::test]
async fn unknown_kind_fails_with_fixed_message() {
    let clone_root = tempfile::tempdir().unwrap();
    let store: Arc<dyn DocStore> = Arc::new(MemoryStore::new());
    let git = Arc::new(FakeGit::default());
    let provider = Arc::new(ScriptedProvider::new());

    let repo = Repository::new("wat://thing", RepoKind::Unknown, None);
    let id = repo.id;
    store.insert_repository(repo).await.unwrap();

    let worker = Worker::new(store.clone(), git, Arc::new(test_config(clone_root.path())))
        .with_kernel_factory(scripted_factory(provider.clone()));
    worker.step(&CancellationToken::new()).await.unwrap();

    let failed = store.get_repository(id).await.unwrap().unwrap();
    assert_eq!(failed.status, RepoStatus::Failed);
    assert_eq!(failed.error.as_deref(), Some("unsupported repository type"));
    assert_eq!(provider.call_count(), 0);
}

// ===========================================================================
// Idempotent re-run after completion
// ===========================================================================

#[tokio::test]
async fn rerun_preserves_cached_stage_outputs() {
    let working = tempfile::tempdir().unwrap();
    write(working.path(), "README.md", "# W");
    write(working.path(), "src/lib.rs", "pub fn f() {}\n");

    let store: Arc<dyn DocStore> = Arc::new(MemoryStore::new());
    let git = Arc::new(FakeGit::default());
    let provider = Arc::new(ScriptedProvider::new());
    provider.push_text("<classify>classifyName:Libraries</classify>");
    provider.push_text("# Map\n");
    provider.push_text("<blog>Overview v1</blog>");
    provider.push_text(OUTLINE_REPLY);
    provider.push_text("<blog>Guide v1</blog>");

    let repo = Repository::new(
        working.path().to_string_lossy().to_string(),
        RepoKind::File,
        None,
    );
    let id = repo.id;
    store.insert_repository(repo).await.unwrap();

    let config = Arc::new(test_config(working.path()));
    let worker = Worker::new(store.clone(), git.clone(), config.clone())
        .with_kernel_factory(scripted_factory(provider.clone()));
    worker.step(&CancellationToken::new()).await.unwrap();

    let first = store.get_repository(id).await.unwrap().unwrap();
    assert_eq!(first.status, RepoStatus::Completed);
    let manifest_v1 = first.optimized_directory_structure.clone();
    let document = store.get_document(id).await.unwrap().unwrap();

    // Second run: only the always-regenerated stages need LLM replies.
    provider.push_text("# Map again\n");
    provider.push_text("<blog>Overview v2</blog>");

    // Claim the completed row through the incremental re-entry edge.
    let mut stale_doc = document.clone();
    stale_doc.last_update = Utc::now() - Duration::days(365);
    store.upsert_document(stale_doc).await.unwrap();
    let mut leased = store
        .lease_stale_repository("rerun", Duration::seconds(600), Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(leased.id, id);

    let kernel = Kernel::with_provider(
        provider.clone(),
        working.path(),
        "test-model",
        &ToolOptions::default(),
        None,
    );
    let mut ctx = StageContext {
        repo: &mut leased,
        document: &document,
        kernel: &kernel,
        store: store.as_ref(),
        git: git.as_ref(),
        config: &config,
        owner: "rerun",
        cancel: CancellationToken::new(),
    };
    repowiki_pipeline::Orchestrator::run(&mut ctx).await.unwrap();

    // Cached outputs unchanged; regenerated artifacts replaced; the
    // catalogue survived with no extra doc-generation calls.
    let after = store.get_repository(id).await.unwrap().unwrap();
    assert_eq!(after.readme, first.readme);
    assert_eq!(after.optimized_directory_structure, manifest_v1);
    assert_eq!(after.classification, first.classification);
    let overview = store.get_overview(document.id).await.unwrap().unwrap();
    assert_eq!(overview.content, "Overview v2");
    assert_eq!(store.list_catalogue(id).await.unwrap().len(), 1);
    assert_eq!(provider.remaining(), 0);
}
