//! Client core for the grant matcher.
//!
//! - [`ApiClient`]: uniform response contract over the vote/subscription
//!   service (404 reads as absent, other failures are errors)
//! - [`IdentityResolver`]: the persisted "current researcher"
//! - [`VoteStore`]: optimistic per-grant vote controls with rollback
//! - [`SubscriptionManager`]: email update subscription
//! - [`AppContext`]: owns all of the above
//!
//! Requests go through a [`ggm_offline::Fetch`] transport, so the client can
//! run directly on the network or behind a [`ggm_offline::CacheRouter`].
//!
//! # Example
//!
//! ```no_run
//! use ggm_client::{AppContext, ClientConfig, ToggleOutcome, VoteAction};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let ctx = AppContext::from_config(ClientConfig::from_env()).await?;
//! ctx.select_identity("A. Researcher").await?;
//!
//! ctx.votes().mount(42u64).await;
//! match ctx.votes().toggle(42u64, VoteAction::Positive).await {
//!     Ok(ToggleOutcome::Applied(snapshot)) => println!("now {}", snapshot.state),
//!     Ok(_) => {}
//!     Err(e) => eprintln!("{}", e.user_message()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod storage;
pub mod subscription;
pub mod types;
pub mod vote;

pub use client::{ApiClient, ApiPath};
pub use config::ClientConfig;
pub use context::AppContext;
pub use error::{ClientError, ClientResult};
pub use identity::{IdentityResolver, IDENTITY_KEY};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use subscription::SubscriptionManager;
pub use types::{
    GrantId, RequestOutcome, ResearcherRequest, SubscriptionStatus, VoteAction, VoteRecord,
};
pub use vote::{
    Clock, ManualClock, ObserverId, SystemClock, ToggleOutcome, VoteBackend, VoteSnapshot,
    VoteState, VoteStore, VoteTally,
};
