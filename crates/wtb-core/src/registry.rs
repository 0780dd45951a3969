//! The follow registry: one consistent in-memory view over the two stores.
//!
//! Constructed once at startup and passed into every command handler and the
//! poller. All mutation goes through one async mutex, so file writes are
//! serialized even though command handling and polling run concurrently.

use std::{collections::HashMap, path::Path, sync::Arc};

use tokio::sync::Mutex;

use crate::{
    domain::{GroupId, Person, Post, Uid},
    storage::{SubscriptionStore, WatermarkStore, FOLLOW_FILE, RECORD_FILE},
    Result,
};

/// Per-uid unit of work for one poll cycle.
///
/// Built by [`FollowRegistry::build_worklist`], filled in by the update
/// engine, folded back into the watermark store by [`FollowRegistry::commit`].
#[derive(Clone, Debug)]
pub struct PollEntry {
    pub nickname: String,
    /// Highest post id already delivered for this uid (0 = never polled).
    pub last_seen: i64,
    pub posts: Vec<Post>,
    pub text: Vec<String>,
    pub groups: Vec<GroupId>,
}

#[derive(Clone)]
pub struct FollowRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

struct RegistryInner {
    subs: SubscriptionStore,
    marks: WatermarkStore,
}

impl FollowRegistry {
    /// Opens `follow.json` and `record.json` under `data_dir`, creating them
    /// as empty stores if absent.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let subs = SubscriptionStore::open(data_dir.join(FOLLOW_FILE))?;
        let marks = WatermarkStore::open(data_dir.join(RECORD_FILE))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(RegistryInner { subs, marks })),
        })
    }

    /// Appends `person` to the group's list and persists. Duplicate uids are
    /// not rejected.
    pub async fn add_follow(&self, group: &GroupId, person: Person) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.subs.add(group, person)
    }

    /// Removes the first exact match of `person`. A missing person or group
    /// is a no-op, not an error.
    pub async fn remove_follow(&self, group: &GroupId, person: &Person) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.subs.remove(group, person)?;
        Ok(())
    }

    pub async fn list_follows(&self, group: &GroupId) -> Vec<Person> {
        self.inner.lock().await.subs.list(group)
    }

    pub async fn find_by_uid(&self, group: &GroupId, uid: &Uid) -> Option<Person> {
        self.inner.lock().await.subs.find_by_uid(group, uid)
    }

    pub async fn find_by_nickname(&self, group: &GroupId, nickname: &str) -> Option<Person> {
        self.inner.lock().await.subs.find_by_nickname(group, nickname)
    }

    /// Joins the subscription store (grouped by uid) with the watermark
    /// store: a uid followed by N groups appears once, with all N groups
    /// recorded and `last_seen` seeded from its watermark.
    pub async fn build_worklist(&self) -> HashMap<Uid, PollEntry> {
        let inner = self.inner.lock().await;

        let mut worklist: HashMap<Uid, PollEntry> = HashMap::new();
        for (group, persons) in inner.subs.iter_groups() {
            for person in persons {
                let entry = worklist
                    .entry(person.uid.clone())
                    .or_insert_with(|| PollEntry {
                        nickname: person.nickname.clone(),
                        last_seen: 0,
                        posts: Vec::new(),
                        text: Vec::new(),
                        groups: Vec::new(),
                    });
                if !entry.groups.contains(group) {
                    entry.groups.push(group.clone());
                }
            }
        }

        for (uid, entry) in worklist.iter_mut() {
            entry.last_seen = inner.marks.get(uid);
        }
        worklist
    }

    /// Folds a finished worklist back into the watermark store, in one save:
    /// watermarks for uids no longer followed by any group are pruned, every
    /// remaining uid's watermark is set to its entry's `last_seen`.
    ///
    /// Watermarks never move backwards here: a stale entry can only keep the
    /// stored value, not lower it.
    pub async fn commit(&self, worklist: &HashMap<Uid, PollEntry>) -> Result<()> {
        let mut inner = self.inner.lock().await;

        for uid in inner.marks.uids() {
            if !worklist.contains_key(&uid) {
                inner.marks.remove(&uid);
            }
        }
        for (uid, entry) in worklist {
            let stored = inner.marks.get(uid);
            inner.marks.set(uid.clone(), entry.last_seen.max(stored));
        }
        inner.marks.save()
    }
}
