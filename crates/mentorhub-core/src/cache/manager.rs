use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::models::{Invitation, PhaseTemplate, StudentsResponse};

/// Default staleness window for cached queries.
/// Matches how long the dashboard trusts list data before refetching.
const CACHE_STALE_MINUTES: i64 = 20;

/// Students and invitations change as people accept invitations, so they
/// are trusted for less time.
const ROSTER_STALE_MINUTES: i64 = 5;

/// Key families using [`ROSTER_STALE_MINUTES`]
const ROSTER_KEY_FAMILIES: [&str; 2] = ["students", "invitations"];

/// Separator between key segments in cache file names
const KEY_SEPARATOR: &str = "__";

fn default_stale_minutes() -> i64 {
    CACHE_STALE_MINUTES
}

/// Staleness window in minutes for a query key, chosen by its first segment.
pub fn stale_minutes_for(key: &str) -> i64 {
    let family = key.split('/').next().unwrap_or_default();
    if ROSTER_KEY_FAMILIES.contains(&family) {
        ROSTER_STALE_MINUTES
    } else {
        CACHE_STALE_MINUTES
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
    /// Set from the key on load; not persisted.
    #[serde(skip, default = "default_stale_minutes")]
    pub stale_minutes: i64,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
            stale_minutes: CACHE_STALE_MINUTES,
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", minutes / 60)
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }

    pub fn is_stale(&self) -> bool {
        self.age_minutes() >= self.stale_minutes
    }
}

pub fn students_key(tenant_id: &str, page: u32, limit: u32) -> String {
    format!("students/{}/{}/{}", tenant_id, page, limit)
}

pub fn invitations_key(tenant_id: &str) -> String {
    format!("invitations/{}", tenant_id)
}

pub fn phase_templates_key(tenant_id: &str, active_only: bool) -> String {
    format!("phase-templates/{}/{}", tenant_id, active_only)
}

/// Turn a query key into a file stem. Path separators and anything outside
/// `[A-Za-z0-9._-]` are not allowed through.
fn file_stem(key: &str) -> String {
    key.split('/')
        .map(|segment| {
            segment
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                        c
                    } else {
                        '_'
                    }
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}

pub struct QueryCache {
    cache_dir: PathBuf,
}

impl QueryCache {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", file_stem(key)))
    }

    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<CachedData<T>>> {
        let path = self.cache_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", key))?;

        let mut cached: CachedData<T> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", key))?;
        cached.stale_minutes = stale_minutes_for(key);

        Ok(Some(cached))
    }

    /// Cached value if present and not stale.
    pub fn load_fresh<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        Ok(self
            .load::<T>(key)?
            .filter(|cached| !cached.is_stale())
            .map(|cached| cached.data))
    }

    pub fn save<T: Serialize>(&self, key: &str, data: &T) -> Result<()> {
        let cached = CachedData::new(data);
        let path = self.cache_path(key);
        let contents = serde_json::to_string_pretty(&cached)?;
        std::fs::write(&path, contents)?;
        debug!(key, "Cached query");
        Ok(())
    }

    /// Remove every entry whose key is `prefix` or lies under it.
    /// Returns the number of entries removed.
    pub fn invalidate(&self, prefix: &str) -> Result<usize> {
        let stem = file_stem(prefix.trim_end_matches('/'));
        let nested = format!("{}{}", stem, KEY_SEPARATOR);
        let mut removed = 0;

        for entry in std::fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if name == stem || name.starts_with(&nested) {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }

        debug!(prefix, removed, "Invalidated cached queries");
        Ok(removed)
    }

    /// Drop students and invitations for every tenant, as after an
    /// invitation is accepted.
    pub fn invalidate_roster(&self) -> Result<usize> {
        let mut removed = 0;
        for family in ROSTER_KEY_FAMILIES {
            removed += self.invalidate(family)?;
        }
        Ok(removed)
    }

    /// Remove every cached query.
    pub fn clear(&self) -> Result<()> {
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    // ===== Students =====

    pub fn load_students(
        &self,
        tenant_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<Option<CachedData<StudentsResponse>>> {
        self.load(&students_key(tenant_id, page, limit))
    }

    pub fn save_students(
        &self,
        tenant_id: &str,
        page: u32,
        limit: u32,
        students: &StudentsResponse,
    ) -> Result<()> {
        self.save(&students_key(tenant_id, page, limit), students)
    }

    // ===== Invitations =====

    pub fn load_invitations(&self, tenant_id: &str) -> Result<Option<CachedData<Vec<Invitation>>>> {
        self.load(&invitations_key(tenant_id))
    }

    pub fn save_invitations(&self, tenant_id: &str, invitations: &[Invitation]) -> Result<()> {
        self.save(&invitations_key(tenant_id), &invitations)
    }

    // ===== Phase templates =====

    pub fn load_phase_templates(
        &self,
        tenant_id: &str,
        active_only: bool,
    ) -> Result<Option<CachedData<Vec<PhaseTemplate>>>> {
        self.load(&phase_templates_key(tenant_id, active_only))
    }

    pub fn save_phase_templates(
        &self,
        tenant_id: &str,
        active_only: bool,
        templates: &[PhaseTemplate],
    ) -> Result<()> {
        self.save(&phase_templates_key(tenant_id, active_only), &templates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn cache() -> (tempfile::TempDir, QueryCache) {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = QueryCache::new(dir.path().to_path_buf()).expect("cache");
        (dir, cache)
    }

    #[test]
    fn test_cached_data_age_display_just_now() {
        let cached = CachedData::new(vec![1, 2, 3]);
        assert_eq!(cached.age_display(), "just now");
    }

    #[test]
    fn test_cached_data_is_stale() {
        let fresh = CachedData::new(vec![1]);
        assert!(!fresh.is_stale());

        let mut old = CachedData::new(vec![1]);
        old.cached_at = Utc::now() - Duration::minutes(21);
        assert!(old.is_stale());
        assert_eq!(old.age_display(), "21m ago");
    }

    #[test]
    fn test_stale_window_per_key_family() {
        assert_eq!(stale_minutes_for(&students_key("t1", 1, 10)), 5);
        assert_eq!(stale_minutes_for(&invitations_key("t1")), 5);
        assert_eq!(stale_minutes_for(&phase_templates_key("t1", true)), 20);
        assert_eq!(stale_minutes_for("other"), 20);
    }

    #[test]
    fn test_roster_queries_go_stale_sooner() {
        let (_dir, cache) = cache();
        let six_minutes_ago = Utc::now() - Duration::minutes(6);
        for key in [invitations_key("t1"), phase_templates_key("t1", false)] {
            let mut entry = CachedData::new(vec![1]);
            entry.cached_at = six_minutes_ago;
            std::fs::write(
                cache.cache_path(&key),
                serde_json::to_string(&entry).expect("serialize"),
            )
            .expect("write");
        }

        let invitations: Option<Vec<i32>> =
            cache.load_fresh(&invitations_key("t1")).expect("load");
        assert!(invitations.is_none());

        let templates: Option<Vec<i32>> =
            cache.load_fresh(&phase_templates_key("t1", false)).expect("load");
        assert_eq!(templates, Some(vec![1]));
    }

    #[test]
    fn test_invalidate_roster_across_tenants() {
        let (_dir, cache) = cache();
        cache.save(&students_key("t1", 1, 10), &1).expect("save");
        cache.save(&students_key("t2", 1, 10), &2).expect("save");
        cache.save(&invitations_key("t1"), &3).expect("save");
        cache.save(&phase_templates_key("t1", true), &4).expect("save");

        assert_eq!(cache.invalidate_roster().expect("invalidate"), 3);
        assert!(cache.load::<i32>(&students_key("t2", 1, 10)).expect("load").is_none());
        assert!(cache
            .load::<i32>(&phase_templates_key("t1", true))
            .expect("load")
            .is_some());
    }

    #[test]
    fn test_file_stem_is_flat() {
        assert_eq!(file_stem("students/t1/1/10"), "students__t1__1__10");
        assert_eq!(file_stem("invitations/../etc"), "invitations__..__etc");
        assert!(!file_stem("a/b\\c").contains('/'));
    }

    #[test]
    fn test_save_and_load_fresh() {
        let (_dir, cache) = cache();
        cache.save("invitations/t1", &vec!["a".to_string()]).expect("save");

        let loaded: Option<Vec<String>> = cache.load_fresh("invitations/t1").expect("load");
        assert_eq!(loaded, Some(vec!["a".to_string()]));

        let missing: Option<Vec<String>> = cache.load_fresh("invitations/t2").expect("load");
        assert!(missing.is_none());
    }

    #[test]
    fn test_invalidate_prefix_respects_segments() {
        let (_dir, cache) = cache();
        cache.save(&students_key("t1", 1, 10), &1).expect("save");
        cache.save(&students_key("t1", 2, 10), &2).expect("save");
        cache.save(&students_key("t10", 1, 10), &3).expect("save");
        cache.save(&invitations_key("t1"), &4).expect("save");

        assert_eq!(cache.invalidate("students/t1").expect("invalidate"), 2);

        assert!(cache.load::<i32>(&students_key("t1", 1, 10)).expect("load").is_none());
        assert!(cache.load::<i32>(&students_key("t10", 1, 10)).expect("load").is_some());
        assert!(cache.load::<i32>(&invitations_key("t1")).expect("load").is_some());

        cache.clear().expect("clear");
        assert!(cache.load::<i32>(&invitations_key("t1")).expect("load").is_none());
    }
}
