//! # Agent
//!
//! Wires the pipeline for one signed-in account: key store, session manager,
//! private post and profile writers, and feed composition.
//!
//! [`PrivateAgent::merged_feed`] is where the degrade-vs-propagate policy is
//! chosen: the private side is wrapped in [`BestEffort`] with the configured
//! deadline, so slow or failing private fetches fall back to public-only pages.

use std::sync::Arc;

use crate::backend::{
    Audience, ContentService, KeyService, SessionService, TrustedRecipientResolver,
};
use crate::config::PipelineConfig;
use crate::feed::{BestEffort, FeedMerger, FeedSource, PrivateFeedSource};
use crate::keystore::KeyStore;
use crate::posts::PrivatePosts;
use crate::profile::PrivateProfiles;
use crate::session::{SessionManager, TrustedCircleCache};
use crate::types::Did;

/// The backend services one account talks to, plus the shared trusted-circle cache
#[derive(Debug, Clone)]
pub struct Services {
    pub keys: Arc<dyn KeyService>,
    pub sessions: Arc<dyn SessionService>,
    pub content: Arc<dyn ContentService>,
    pub resolver: Arc<dyn TrustedRecipientResolver>,
    pub trusted_cache: Arc<dyn TrustedCircleCache>,
}

#[derive(Debug, Clone)]
pub struct PrivateAgent {
    config: PipelineConfig,
    content: Arc<dyn ContentService>,
    sessions: SessionManager,
    posts: PrivatePosts,
    profiles: PrivateProfiles,
}

impl PrivateAgent {
    pub fn new(did: Did, services: Services, config: PipelineConfig) -> Self {
        let key_store = KeyStore::new(services.keys, config.key_batch_size);
        let sessions = SessionManager::new(
            did,
            key_store,
            services.sessions,
            services.resolver,
            services.trusted_cache,
        );
        let posts = PrivatePosts::new(sessions.clone(), services.content.clone());
        let profiles = PrivateProfiles::new(sessions.clone(), services.content.clone());
        Self {
            config,
            content: services.content,
            sessions,
            posts,
            profiles,
        }
    }

    pub fn did(&self) -> &Did {
        self.sessions.did()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn key_store(&self) -> &KeyStore {
        self.sessions.key_store()
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn posts(&self) -> &PrivatePosts {
        &self.posts
    }

    pub fn profiles(&self) -> &PrivateProfiles {
        &self.profiles
    }

    pub fn private_feed(&self, audience: Audience) -> PrivateFeedSource {
        PrivateFeedSource::new(self.content.clone(), self.key_store().clone(), audience)
    }

    /// Private items merged ahead of `public`, with the private side best-effort
    pub fn merged_feed<Q: FeedSource>(
        &self,
        audience: Audience,
        public: Q,
    ) -> FeedMerger<BestEffort<PrivateFeedSource>, Q> {
        let private = BestEffort::new(
            self.private_feed(audience),
            self.config.private_fetch_timeout(),
        );
        FeedMerger::new(private, public)
    }
}
