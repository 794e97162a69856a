//! Course identifier resolution.
//!
//! Canvas endpoints want numeric course IDs while people (and agents) talk
//! about course codes like `CS_101`. The resolver maps one to the other,
//! memoizing the enrolled-course listing for the life of the process.

use crate::client::{LmsApi, Query};
use crate::error::{LecternError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// A course the user is enrolled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: u64,
    #[serde(default)]
    pub course_code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Course {
    /// Human-facing label: the course code, falling back to the name, then the ID.
    pub fn label(&self) -> String {
        self.course_code
            .clone()
            .or_else(|| self.name.clone())
            .unwrap_or_else(|| self.id.to_string())
    }
}

#[derive(Debug, Default)]
struct CourseCache {
    by_code: HashMap<String, u64>,
    by_id: HashMap<u64, String>,
    courses: Vec<Course>,
}

/// Maps course codes to numeric course IDs with a single-flight refresh.
pub struct CourseResolver {
    api: Arc<dyn LmsApi>,
    cache: RwLock<CourseCache>,
    /// Held for the duration of a listing call; concurrent misses queue here.
    refresh: Mutex<()>,
    /// Incremented after every completed listing, successful or not.
    generation: AtomicU64,
    /// Failure of the most recent listing, replayed to callers that queued behind it.
    last_failure: StdMutex<Option<LecternError>>,
}

impl CourseResolver {
    pub fn new(api: Arc<dyn LmsApi>) -> Self {
        Self {
            api,
            cache: RwLock::new(CourseCache::default()),
            refresh: Mutex::new(()),
            generation: AtomicU64::new(0),
            last_failure: StdMutex::new(None),
        }
    }

    /// Resolve a course code or numeric ID to the numeric ID.
    ///
    /// Numeric identifiers are returned without touching the network. A code
    /// missing from the cache triggers at most one listing per cache
    /// generation, shared by every caller that missed concurrently. When that
    /// listing fails, every caller that was waiting on it gets the same failure.
    #[instrument(skip(self))]
    pub async fn resolve(&self, identifier: &str) -> Result<u64> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(LecternError::InvalidInput(
                "course identifier is empty".to_string(),
            ));
        }
        if let Ok(id) = identifier.parse::<u64>() {
            return Ok(id);
        }

        let seen_generation = self.generation.load(Ordering::Acquire);
        if let Some(id) = self.cached(identifier) {
            return Ok(id);
        }

        let _guard = self.refresh.lock().await;

        if let Some(id) = self.cached(identifier) {
            return Ok(id);
        }

        // A listing completed while we queued and the code is still unknown.
        if self.generation.load(Ordering::Acquire) != seen_generation {
            return Err(match self.failure() {
                Some(err) => err,
                None => unknown_course(identifier),
            });
        }

        self.refresh_locked().await?;
        self.cached(identifier)
            .ok_or_else(|| unknown_course(identifier))
    }

    /// Course code for a numeric ID, if it has been seen in a listing.
    pub fn course_code(&self, id: u64) -> Option<String> {
        self.read_cache().by_id.get(&id).cloned()
    }

    /// Display label for a course: its code when known, else what the caller passed.
    pub fn display(&self, id: u64, fallback: &str) -> String {
        self.course_code(id).unwrap_or_else(|| fallback.to_string())
    }

    /// Courses from the most recent listing.
    pub fn courses(&self) -> Vec<Course> {
        self.read_cache().courses.clone()
    }

    /// Re-list enrolled courses and rebuild the cache.
    pub async fn refresh(&self) -> Result<Vec<Course>> {
        let _guard = self.refresh.lock().await;
        self.refresh_locked().await?;
        Ok(self.courses())
    }

    async fn refresh_locked(&self) -> Result<()> {
        let listing = self
            .api
            .list("/courses", &Query::new().with("include[]", "term"))
            .await;
        let records = match listing {
            Ok(records) => records,
            Err(err) => {
                warn!(error = %err, "Course listing failed");
                *self.lock_failure() = Some(err.replay());
                self.generation.fetch_add(1, Ordering::Release);
                return Err(err);
            }
        };
        let courses = parse_courses(records);

        let mut cache = CourseCache::default();
        for course in &courses {
            if let Some(code) = &course.course_code {
                cache.by_code.insert(code.clone(), course.id);
                cache.by_id.insert(course.id, code.clone());
            }
        }
        cache.courses = courses;

        info!(courses = cache.courses.len(), "Course cache populated");
        *self.write_cache() = cache;
        *self.lock_failure() = None;
        self.generation.fetch_add(1, Ordering::Release);
        Ok(())
    }

    fn cached(&self, code: &str) -> Option<u64> {
        let id = self.read_cache().by_code.get(code).copied();
        if let Some(id) = id {
            debug!(code, id, "Course cache hit");
        }
        id
    }

    fn failure(&self) -> Option<LecternError> {
        self.lock_failure().as_ref().map(LecternError::replay)
    }

    fn lock_failure(&self) -> std::sync::MutexGuard<'_, Option<LecternError>> {
        self.last_failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, CourseCache> {
        self.cache.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_cache(&self) -> std::sync::RwLockWriteGuard<'_, CourseCache> {
        self.cache.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn parse_courses(records: Vec<Value>) -> Vec<Course> {
    // Restricted or deleted enrollments come back without an ID; skip them.
    records
        .into_iter()
        .filter_map(|record| serde_json::from_value::<Course>(record).ok())
        .collect()
}

fn unknown_course(code: &str) -> LecternError {
    LecternError::NotFound(format!("no enrolled course with code '{}'", code))
}
