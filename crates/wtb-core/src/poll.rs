//! Poll cycle orchestration: worklist -> per-uid updates -> dispatch -> commit.
//!
//! One cycle is triggered from the outside (a fixed-interval timer); the
//! poller never self-schedules beyond `run_interval`. Watermarks are
//! committed once, after all per-uid work and dispatch, so a crash mid-cycle
//! re-delivers at most one cycle's worth of posts (at-least-once delivery).

use std::{sync::Arc, time::Duration};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    domain::Uid,
    formatting::compose_update_message,
    ports::{GroupMessenger, WeiboFeed},
    registry::{FollowRegistry, PollEntry},
    update, Result,
};

pub struct Poller {
    registry: FollowRegistry,
    feed: Arc<dyn WeiboFeed>,
    messenger: Arc<dyn GroupMessenger>,
}

impl Poller {
    pub fn new(
        registry: FollowRegistry,
        feed: Arc<dyn WeiboFeed>,
        messenger: Arc<dyn GroupMessenger>,
    ) -> Self {
        Self {
            registry,
            feed,
            messenger,
        }
    }

    /// Runs one full poll cycle.
    ///
    /// Per-uid fetches have no data dependency on each other and run
    /// concurrently. A uid whose fetch fails (or whose task dies) keeps its
    /// pre-cycle entry, so its watermark is unchanged and no message goes
    /// out for it; everything else proceeds normally.
    pub async fn run_cycle(&self) -> Result<()> {
        let worklist = self.registry.build_worklist().await;
        if worklist.is_empty() {
            debug!("no followed accounts, skipping cycle");
            return Ok(());
        }

        let mut results = worklist.clone();

        let mut tasks = JoinSet::new();
        for (uid, entry) in worklist {
            let feed = Arc::clone(&self.feed);
            tasks.spawn(async move {
                let mut entry = entry;
                let pre = entry.last_seen;
                if let Err(e) = update::check_user_updates(feed.as_ref(), &uid, &mut entry).await {
                    warn!(uid = %uid, nickname = %entry.nickname, error = %e, "update failed, no change this cycle");
                }
                (uid, pre, entry)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let Ok((uid, pre, entry)) = joined else {
                // Task died; `results` still holds the pre-cycle entry, so
                // this uid is simply re-polled from its old watermark.
                continue;
            };

            info!(uid = %uid, nickname = %entry.nickname, pre, now = entry.last_seen, "polled");
            if entry.last_seen != pre {
                self.dispatch(&uid, &entry).await;
            }
            results.insert(uid, entry);
        }

        self.registry.commit(&results).await
    }

    /// Sends the per-user message to every subscribed group. Each send is
    /// isolated: a failing group is logged and the rest still get theirs.
    async fn dispatch(&self, uid: &Uid, entry: &PollEntry) {
        let message = compose_update_message(&entry.nickname, &entry.text);
        for group in &entry.groups {
            if let Err(e) = self.messenger.send_to_group(group, &message).await {
                warn!(uid = %uid, group = %group, error = %e, "group send failed");
            }
        }
    }

    /// Fixed-interval poll loop. The first cycle runs one full interval
    /// after startup, not immediately.
    pub async fn run_interval(self: Arc<Self>, every: Duration, cancel: CancellationToken) {
        let mut tick = tokio::time::interval(every);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tick.tick().await; // the first tick completes immediately

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        error!(error = %e, "poll cycle failed to commit");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use crate::{
        domain::{GroupId, Person, Post},
        ports::{FeedTab, UserProfile, UserSummary},
        Error,
    };

    fn tmp_dir(prefix: &str) -> std::path::PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let pid = std::process::id();
        let dir = std::path::PathBuf::from(format!("/tmp/wtb-poll-{prefix}-{pid}-{ts}"));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn post(id: i64) -> Post {
        Post {
            id,
            created_at: format!("day-{id}"),
            text: format!("post {id}"),
            url: format!("https://example.com/{id}"),
            is_top: false,
        }
    }

    fn person(uid: &str, nickname: &str) -> Person {
        Person {
            uid: Uid(uid.to_string()),
            nickname: nickname.to_string(),
        }
    }

    /// Feed with fixed page-0 content per uid; a uid mapped to an error
    /// fails its profile fetch.
    struct ScriptedFeed {
        pages: std::collections::HashMap<String, Vec<Post>>,
        failing: Vec<String>,
    }

    #[async_trait]
    impl WeiboFeed for ScriptedFeed {
        async fn fetch_profile(&self, uid: &Uid) -> crate::Result<UserProfile> {
            if self.failing.contains(&uid.0) {
                return Err(Error::Upstream("scripted failure".to_string()));
            }
            Ok(UserProfile {
                uid: uid.clone(),
                nickname: "someone".to_string(),
                tabs: vec![FeedTab {
                    key: "weibo".to_string(),
                    container_id: "c".to_string(),
                }],
            })
        }

        async fn fetch_page(
            &self,
            uid: &Uid,
            _container_id: &str,
            page: u32,
        ) -> crate::Result<Vec<Post>> {
            if page == 0 {
                Ok(self.pages.get(&uid.0).cloned().unwrap_or_default())
            } else {
                Ok(Vec::new())
            }
        }

        async fn search_by_nickname(&self, _nickname: &str) -> crate::Result<Option<UserSummary>> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<(GroupId, String)>>,
    }

    #[async_trait]
    impl GroupMessenger for RecordingMessenger {
        async fn send_to_group(&self, group: &GroupId, text: &str) -> crate::Result<()> {
            self.sent.lock().await.push((group.clone(), text.to_string()));
            Ok(())
        }
    }

    async fn registry_with(follows: &[(&str, Person)]) -> FollowRegistry {
        let registry = FollowRegistry::open(&tmp_dir("cycle")).unwrap();
        for (group, p) in follows {
            registry
                .add_follow(&GroupId(group.to_string()), p.clone())
                .await
                .unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn new_posts_fan_out_to_every_subscribed_group() {
        let p = person("7", "seven");
        let registry = registry_with(&[("a", p.clone()), ("b", p.clone())]).await;

        // prime the watermark so the next cycle is incremental
        let mut primed = registry.build_worklist().await;
        primed.get_mut(&p.uid).unwrap().last_seen = 10;
        registry.commit(&primed).await.unwrap();

        let feed = ScriptedFeed {
            pages: [("7".to_string(), vec![post(12), post(11), post(10)])]
                .into_iter()
                .collect(),
            failing: Vec::new(),
        };
        let messenger = Arc::new(RecordingMessenger::default());
        let poller = Poller::new(registry.clone(), Arc::new(feed), messenger.clone());

        poller.run_cycle().await.unwrap();

        let sent = messenger.sent.lock().await;
        assert_eq!(sent.len(), 2);
        let mut groups: Vec<String> = sent.iter().map(|(g, _)| g.0.clone()).collect();
        groups.sort();
        assert_eq!(groups, vec!["a".to_string(), "b".to_string()]);
        // both groups get the same two posts
        assert_eq!(sent[0].1, sent[1].1);
        assert!(sent[0].1.contains("post 12"));
        assert!(sent[0].1.contains("post 11"));
        assert!(!sent[0].1.contains("post 10"));

        let worklist = registry.build_worklist().await;
        assert_eq!(worklist[&p.uid].last_seen, 12);
    }

    #[tokio::test]
    async fn quiet_uid_sends_nothing_and_keeps_watermark() {
        let p = person("7", "seven");
        let registry = registry_with(&[("a", p.clone())]).await;

        let mut primed = registry.build_worklist().await;
        primed.get_mut(&p.uid).unwrap().last_seen = 12;
        registry.commit(&primed).await.unwrap();

        let feed = ScriptedFeed {
            pages: [("7".to_string(), vec![post(12), post(11)])]
                .into_iter()
                .collect(),
            failing: Vec::new(),
        };
        let messenger = Arc::new(RecordingMessenger::default());
        let poller = Poller::new(registry.clone(), Arc::new(feed), messenger.clone());

        poller.run_cycle().await.unwrap();

        assert!(messenger.sent.lock().await.is_empty());
        assert_eq!(registry.build_worklist().await[&p.uid].last_seen, 12);
    }

    #[tokio::test]
    async fn one_failing_uid_does_not_block_the_others() {
        let failing = person("bad", "broken");
        let healthy = person("7", "seven");
        let registry =
            registry_with(&[("a", failing.clone()), ("a", healthy.clone())]).await;

        let mut primed = registry.build_worklist().await;
        primed.get_mut(&failing.uid).unwrap().last_seen = 50;
        primed.get_mut(&healthy.uid).unwrap().last_seen = 10;
        registry.commit(&primed).await.unwrap();

        let feed = ScriptedFeed {
            pages: [("7".to_string(), vec![post(11), post(10)])]
                .into_iter()
                .collect(),
            failing: vec!["bad".to_string()],
        };
        let messenger = Arc::new(RecordingMessenger::default());
        let poller = Poller::new(registry.clone(), Arc::new(feed), messenger.clone());

        poller.run_cycle().await.unwrap();

        let sent = messenger.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("post 11"));

        let worklist = registry.build_worklist().await;
        assert_eq!(worklist[&healthy.uid].last_seen, 11);
        assert_eq!(worklist[&failing.uid].last_seen, 50);
    }

    #[tokio::test]
    async fn cold_start_delivers_and_advances_watermark() {
        let p = person("7", "seven");
        let registry = registry_with(&[("a", p.clone())]).await;

        let feed = ScriptedFeed {
            pages: [("7".to_string(), vec![post(3), post(2), post(1)])]
                .into_iter()
                .collect(),
            failing: Vec::new(),
        };
        let messenger = Arc::new(RecordingMessenger::default());
        let poller = Poller::new(registry.clone(), Arc::new(feed), messenger.clone());

        poller.run_cycle().await.unwrap();

        let sent = messenger.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.starts_with("seven\n"));
        assert_eq!(registry.build_worklist().await[&p.uid].last_seen, 3);
    }

    #[tokio::test]
    async fn empty_worklist_is_a_noop() {
        let registry = FollowRegistry::open(&tmp_dir("empty")).unwrap();
        let feed = ScriptedFeed {
            pages: Default::default(),
            failing: Vec::new(),
        };
        let messenger = Arc::new(RecordingMessenger::default());
        let poller = Poller::new(registry, Arc::new(feed), messenger.clone());

        poller.run_cycle().await.unwrap();
        assert!(messenger.sent.lock().await.is_empty());
    }
}
