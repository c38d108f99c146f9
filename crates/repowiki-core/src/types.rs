//! Domain entities: repositories, documents, catalogues, and generated artifacts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the source is materialized into a working tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoKind {
    /// Cloned from a remote over the git transport.
    Git,
    /// A plain directory already on local disk.
    File,
    /// Anything else — the worker marks these Failed without processing.
    #[serde(other)]
    Unknown,
}

/// Repository lifecycle status.
///
/// Permitted edges: Pending→Processing, Processing→Completed,
/// Processing→Failed, Completed→Processing (incremental re-entry).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepoStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RepoStatus {
    pub fn can_transition_to(self, next: RepoStatus) -> bool {
        matches!(
            (self, next),
            (RepoStatus::Pending, RepoStatus::Processing)
                | (RepoStatus::Processing, RepoStatus::Completed)
                | (RepoStatus::Processing, RepoStatus::Failed)
                | (RepoStatus::Completed, RepoStatus::Processing)
        )
    }
}

/// The seven canonical documentation classifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    Applications,
    Frameworks,
    Libraries,
    DevelopmentTools,
    CLITools,
    DevOpsConfiguration,
    Documentation,
}

impl Classification {
    pub const ALL: [Classification; 7] = [
        Classification::Applications,
        Classification::Frameworks,
        Classification::Libraries,
        Classification::DevelopmentTools,
        Classification::CLITools,
        Classification::DevOpsConfiguration,
        Classification::Documentation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Applications => "Applications",
            Classification::Frameworks => "Frameworks",
            Classification::Libraries => "Libraries",
            Classification::DevelopmentTools => "DevelopmentTools",
            Classification::CLITools => "CLITools",
            Classification::DevOpsConfiguration => "DevOpsConfiguration",
            Classification::Documentation => "Documentation",
        }
    }

    /// Case-insensitive parse. Unknown tokens yield None and the caller
    /// falls back to the base prompt variant.
    pub fn parse(token: &str) -> Option<Classification> {
        let token = token.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(token))
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A repository work item in the persistent queue.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Repository {
    pub id: Uuid,
    /// Remote address for git kind, local directory for file kind.
    pub address: String,
    pub branch: Option<String>,
    pub user_name: Option<String>,
    pub password: Option<String>,
    pub kind: RepoKind,
    pub status: RepoStatus,
    pub error: Option<String>,

    /// Resolved after clone.
    pub organization: Option<String>,
    pub name: Option<String>,
    pub resolved_branch: Option<String>,
    /// Head commit hash of the last processed checkout.
    pub version: Option<String>,
    pub local_path: Option<String>,

    /// Cached stage outputs — non-empty means the stage already ran.
    pub readme: Option<String>,
    pub optimized_directory_structure: Option<String>,
    pub classification: Option<Classification>,

    /// Lease coordination across workers.
    pub owner: Option<String>,
    pub lease_deadline: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Repository {
    pub fn new(address: impl Into<String>, kind: RepoKind, branch: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            address: address.into(),
            branch,
            user_name: None,
            password: None,
            kind,
            status: RepoStatus::Pending,
            error: None,
            organization: None,
            name: None,
            resolved_branch: None,
            version: None,
            local_path: None,
            readme: None,
            optimized_directory_structure: None,
            classification: None,
            owner: None,
            lease_deadline: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The single document row owned by a repository.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub repository_id: Uuid,
    pub git_path: String,
    pub last_update: DateTime<Utc>,
    pub status: RepoStatus,
}

impl DocumentRecord {
    pub fn new(repository_id: Uuid, git_path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            repository_id,
            git_path: git_path.into(),
            last_update: Utc::now(),
            status: RepoStatus::Processing,
        }
    }
}

/// One node of the repository's documentation catalogue forest.
///
/// A node with children is a folder, otherwise a leaf. Leaves are the unit
/// of per-document generation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogueNode {
    pub id: Uuid,
    pub repository_id: Uuid,
    pub parent_id: Option<Uuid>,
    /// Stable identifier slug.
    pub title: String,
    /// Display name.
    pub name: String,
    /// Url slug, unique within the repository.
    pub url: String,
    pub description: String,
    /// Per-node generation hint passed to the docs prompt.
    pub prompt: String,
    pub order_index: usize,
    pub is_completed: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// Generated markdown for one completed catalogue leaf.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileItem {
    pub id: Uuid,
    pub catalogue_id: Uuid,
    pub title: String,
    pub content: String,
    /// Source files the generation read, recorded by the tool access log.
    pub source_files: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Project overview markdown, one per document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OverviewRecord {
    pub id: Uuid,
    pub document_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// One node of the mind map: a title plus an optional repository-relative
/// path, resolved to a web URL at read time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MindMapNode {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MindMapNode>,
}

impl MindMapNode {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: None,
            children: Vec::new(),
        }
    }

    /// Rewrite relative node urls against the remote web host. Only hosts
    /// with a known tree-browsing layout get links.
    pub fn resolve_urls(&mut self, remote: &str, branch: &str) {
        let remote = remote.trim_end_matches(".git").trim_end_matches('/');
        let linkable = remote.contains("github.com") || remote.contains("gitee.com");
        if let Some(url) = &self.url {
            if linkable && !url.starts_with("http") {
                self.url = Some(format!(
                    "{}/tree/{}/{}",
                    remote,
                    branch,
                    url.trim_start_matches('/')
                ));
            }
        }
        for child in &mut self.children {
            child.resolve_urls(remote, branch);
        }
    }
}

/// Persisted mind map, at most one per repository.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MindMapRecord {
    pub id: Uuid,
    pub repository_id: Uuid,
    pub root: MindMapNode,
    pub created_at: DateTime<Utc>,
}

/// One entry of the repository's update log, regenerated wholesale.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommitRecord {
    pub id: Uuid,
    pub repository_id: Uuid,
    pub title: String,
    pub description: String,
    pub commit_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
