//! JSON-object persistence for the two durable stores.
//!
//! `follow.json` maps group id -> followed people, `record.json` maps uid ->
//! highest delivered post id. A missing file is created as `{}`. An
//! unparsable file is logged and reset to `{}` rather than repaired, so a
//! corrupt store loses prior state but never takes the bot down.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};

use crate::{
    domain::{GroupId, Person, Uid},
    Result,
};

pub const FOLLOW_FILE: &str = "follow.json";
pub const RECORD_FILE: &str = "record.json";

fn load_or_reset<T>(path: &Path) -> Result<T>
where
    T: Default + Serialize + DeserializeOwned,
{
    if !path.exists() {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let empty = T::default();
        write_json(path, &empty)?;
        return Ok(empty);
    }

    let raw = fs::read_to_string(path)?;
    match serde_json::from_str(&raw) {
        Ok(v) => Ok(v),
        Err(e) => {
            tracing::error!(file = %path.display(), error = %e, "store file is not valid json, resetting");
            let empty = T::default();
            write_json(path, &empty)?;
            Ok(empty)
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    fs::write(path, raw)?;
    Ok(())
}

/// Durable mapping of group -> followed people.
#[derive(Debug)]
pub struct SubscriptionStore {
    path: PathBuf,
    groups: HashMap<GroupId, Vec<Person>>,
}

impl SubscriptionStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let groups = load_or_reset(&path)?;
        Ok(Self { path, groups })
    }

    pub fn add(&mut self, group: &GroupId, person: Person) -> Result<()> {
        self.groups.entry(group.clone()).or_default().push(person);
        self.save()
    }

    /// Removes the first exact match. Returns whether anything was removed;
    /// only persists when it was.
    pub fn remove(&mut self, group: &GroupId, person: &Person) -> Result<bool> {
        let Some(list) = self.groups.get_mut(group) else {
            return Ok(false);
        };
        let Some(idx) = list.iter().position(|p| p == person) else {
            return Ok(false);
        };
        list.remove(idx);
        self.save()?;
        Ok(true)
    }

    /// Defensive copy; empty for an unknown group.
    pub fn list(&self, group: &GroupId) -> Vec<Person> {
        self.groups.get(group).cloned().unwrap_or_default()
    }

    pub fn find_by_uid(&self, group: &GroupId, uid: &Uid) -> Option<Person> {
        self.groups
            .get(group)?
            .iter()
            .find(|p| &p.uid == uid)
            .cloned()
    }

    pub fn find_by_nickname(&self, group: &GroupId, nickname: &str) -> Option<Person> {
        self.groups
            .get(group)?
            .iter()
            .find(|p| p.nickname == nickname)
            .cloned()
    }

    pub fn iter_groups(&self) -> impl Iterator<Item = (&GroupId, &[Person])> {
        self.groups.iter().map(|(g, list)| (g, list.as_slice()))
    }

    fn save(&self) -> Result<()> {
        write_json(&self.path, &self.groups)
    }
}

/// Durable mapping of uid -> last delivered post id (0 = never polled).
#[derive(Debug)]
pub struct WatermarkStore {
    path: PathBuf,
    marks: HashMap<Uid, i64>,
}

impl WatermarkStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let marks = load_or_reset(&path)?;
        Ok(Self { path, marks })
    }

    pub fn get(&self, uid: &Uid) -> i64 {
        self.marks.get(uid).copied().unwrap_or(0)
    }

    pub fn set(&mut self, uid: Uid, post_id: i64) {
        self.marks.insert(uid, post_id);
    }

    pub fn remove(&mut self, uid: &Uid) {
        self.marks.remove(uid);
    }

    pub fn uids(&self) -> Vec<Uid> {
        self.marks.keys().cloned().collect()
    }

    /// Mutations via `set`/`remove` are in-memory only until saved; the
    /// registry saves exactly once per commit.
    pub fn save(&self) -> Result<()> {
        write_json(&self.path, &self.marks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_path(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/wtb-store-{prefix}-{pid}-{ts}.json"))
    }

    fn person(uid: &str, nickname: &str) -> Person {
        Person {
            uid: Uid(uid.to_string()),
            nickname: nickname.to_string(),
        }
    }

    #[test]
    fn missing_file_starts_empty_and_creates_it() {
        let path = tmp_path("missing");
        let store = SubscriptionStore::open(&path).unwrap();
        assert!(store.list(&GroupId("1".to_string())).is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn corrupt_file_is_reset_to_empty() {
        let path = tmp_path("corrupt");
        fs::write(&path, "not json {{{").unwrap();
        let store = WatermarkStore::open(&path).unwrap();
        assert_eq!(store.get(&Uid("42".to_string())), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn subscription_round_trip_survives_reopen() {
        let path = tmp_path("subs");
        let group = GroupId("100".to_string());
        {
            let mut store = SubscriptionStore::open(&path).unwrap();
            store.add(&group, person("7", "seven")).unwrap();
        }
        let store = SubscriptionStore::open(&path).unwrap();
        assert_eq!(store.list(&group), vec![person("7", "seven")]);
    }

    #[test]
    fn remove_is_noop_for_absent_person_or_group() {
        let path = tmp_path("remove");
        let group = GroupId("100".to_string());
        let mut store = SubscriptionStore::open(&path).unwrap();
        assert!(!store.remove(&group, &person("7", "seven")).unwrap());

        store.add(&group, person("7", "seven")).unwrap();
        assert!(!store.remove(&group, &person("7", "other-name")).unwrap());
        assert!(store.remove(&group, &person("7", "seven")).unwrap());
        assert!(store.list(&group).is_empty());
    }

    #[test]
    fn watermarks_persist_only_on_save() {
        let path = tmp_path("marks");
        let uid = Uid("9".to_string());
        {
            let mut store = WatermarkStore::open(&path).unwrap();
            store.set(uid.clone(), 123);
        }
        // set() without save() is not durable
        let store = WatermarkStore::open(&path).unwrap();
        assert_eq!(store.get(&uid), 0);

        {
            let mut store = WatermarkStore::open(&path).unwrap();
            store.set(uid.clone(), 123);
            store.save().unwrap();
        }
        let store = WatermarkStore::open(&path).unwrap();
        assert_eq!(store.get(&uid), 123);
    }
}
