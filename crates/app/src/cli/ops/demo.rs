use std::sync::Arc;

use chrono::{Duration, Utc};
use clap::Args;
use serde_json::{json, Map};

use common::agent::PrivateAgent;
use common::backend::memory::MemoryBackend;
use common::backend::{Audience, BackendError};
use common::feed::{CompositeCursor, FeedError, FeedSource, FetchParams, Visibility};
use common::item::ItemMetadata;
use common::posts::NewPost;
use common::profile::{PrivateProfile, ProfileError, ProfileView};
use common::session::SessionError;
use common::testkit::{memory_agent_with_config, public_item, VecFeedSource};
use common::types::Did;

use crate::state::{AppState, StateError};

const OWNER: &str = "did:example:owner";
const FOLLOWER: &str = "did:example:follower";
const STRANGER: &str = "did:example:stranger";
const PUBLIC_ITEMS: usize = 5;

/// Run the pipeline end to end against an in-memory backend
#[derive(Args, Debug, Clone)]
pub struct Demo {
    /// Number of private posts the owner writes
    #[arg(long, default_value_t = 3)]
    pub posts: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    #[error("demo failed: {0}")]
    State(#[from] StateError),
    #[error("demo failed: {0}")]
    Backend(#[from] BackendError),
    #[error("demo failed: {0}")]
    Session(#[from] SessionError),
    #[error("demo failed: {0}")]
    Profile(#[from] ProfileError),
    #[error("demo failed: {0}")]
    Feed(#[from] FeedError),
}

#[derive(Debug, Default)]
struct FeedSummary {
    pages: usize,
    private: usize,
    public: usize,
    cursor: String,
}

/// Page through `agent`'s merged feed until both sides are exhausted
async fn read_merged_feed(
    agent: &PrivateAgent,
    public: Arc<VecFeedSource>,
) -> Result<FeedSummary, DemoError> {
    let feed = agent.merged_feed(Audience::Author(Did::from(OWNER)), public);
    let limit = agent.config().page_limit;

    let mut summary = FeedSummary::default();
    let mut cursor = None;
    loop {
        let page = feed
            .fetch(FetchParams {
                cursor: cursor.clone(),
                limit,
            })
            .await?;
        summary.pages += 1;
        for item in &page.items {
            match item.visibility {
                Visibility::Private => summary.private += 1,
                Visibility::Public => summary.public += 1,
            }
        }
        let next = CompositeCursor::parse(page.cursor.as_deref());
        summary.cursor = next.to_string();
        if next.is_exhausted() {
            break;
        }
        cursor = page.cursor;
    }
    Ok(summary)
}

fn describe_profile(view: &ProfileView) -> String {
    let editable = if view.can_edit() { "editable" } else { "read-only" };
    match view {
        ProfileView::Absent => format!("absent ({})", editable),
        ProfileView::Loaded(record) => format!(
            "{} ({})",
            record
                .profile
                .display_name
                .as_deref()
                .unwrap_or("<no name>"),
            editable
        ),
        ProfileView::Unavailable(code) => format!("unavailable: {:?} ({})", code, editable),
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Demo {
    type Error = DemoError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let config = AppState::load_config(ctx.config_path.clone())?;
        let backend = MemoryBackend::new();
        let owner = memory_agent_with_config(&backend, OWNER, config.clone());
        let follower = memory_agent_with_config(&backend, FOLLOWER, config.clone());
        let stranger = memory_agent_with_config(&backend, STRANGER, config);

        for agent in [&owner, &follower, &stranger] {
            agent.key_store().get_or_create_key_pair(agent.did()).await?;
        }
        backend.set_trusted_users(owner.did(), vec![Did::from(FOLLOWER)]);

        let now = Utc::now();
        let posts = (0..self.posts)
            .map(|i| {
                let mut body = Map::new();
                body.insert("text".to_string(), json!(format!("private post {}", i)));
                NewPost {
                    body,
                    metadata: ItemMetadata::new(owner.did().clone(), now),
                }
            })
            .collect();
        let ids = owner.posts().create_posts(posts).await?;
        tracing::info!("owner wrote {} private posts", ids.len());

        owner
            .profiles()
            .put_profile(&PrivateProfile {
                display_name: Some("Owner (close friends)".to_string()),
                ..Default::default()
            })
            .await?;

        let public = Arc::new(VecFeedSource::new(
            (0..PUBLIC_ITEMS)
                .map(|i| {
                    public_item(
                        &format!("{}/public/{}", OWNER, i),
                        OWNER,
                        &format!("public post {}", i),
                        now - Duration::minutes(i as i64),
                    )
                })
                .collect(),
        ));

        let mut lines = vec![format!(
            "Owner {} wrote {} private posts shared with {}",
            OWNER,
            ids.len(),
            FOLLOWER
        )];
        for viewer in [&owner, &follower, &stranger] {
            let summary = read_merged_feed(viewer, public.clone()).await?;
            let profile = viewer.profiles().load_for_view(owner.did()).await;
            lines.push(format!(
                "{}: {} private + {} public items over {} pages, final cursor {}, profile {}",
                viewer.did(),
                summary.private,
                summary.public,
                summary.pages,
                summary.cursor,
                describe_profile(&profile)
            ));
        }
        lines.push(format!(
            "public source served {} pages",
            public.fetch_count()
        ));

        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::op::{Op, OpContext};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_demo_runs_without_state_directory() {
        let temp = TempDir::new().unwrap();
        let ctx = OpContext::new(Some(temp.path().join("missing")));

        let output = Demo { posts: 4 }.execute(&ctx).await.unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(lines[1].starts_with(&format!("{}: 4 private + 5 public", OWNER)));
        assert!(lines[2].starts_with(&format!("{}: 4 private + 5 public", FOLLOWER)));
        assert!(lines[3].starts_with(&format!("{}: 0 private + 5 public", STRANGER)));
        assert!(lines[1..4]
            .iter()
            .all(|line| line.contains("final cursor undefined|undefined")));
        assert!(lines[3].contains("unavailable"));
        assert!(lines[3].contains("read-only"));
    }
}
