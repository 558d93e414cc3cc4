//! Credential Pair persistence.
//!
//! Both tokens live in cookies named [`ACCESS_TOKEN_COOKIE`] and
//! [`REFRESH_TOKEN_COOKIE`], scoped to `/` with a 30 day max age. Two
//! backends read the same cookies from different execution contexts:
//!
//! - [`CookieJar`]: the profile-wide jar on disk (browser context). Every tab
//!   of a profile points at the same file, so a refresh in one tab is seen by
//!   the next request of any other tab.
//! - [`RequestCookies`]: the cookies of a single incoming request (server
//!   context). Writes are queued as `Set-Cookie` header values for the
//!   outgoing response.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const ACCESS_TOKEN_COOKIE: &str = "uvs.token";
pub const REFRESH_TOKEN_COOKIE: &str = "uvs.refreshToken";

/// Cookie lifetime: 30 days.
pub const COOKIE_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 30;

/// Cookies are visible to the whole application.
pub const COOKIE_PATH: &str = "/";

/// Jar file name in the profile directory
const COOKIE_JAR_FILE: &str = "cookies.json";

/// Access and refresh token from the same issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

/// Whatever token cookies are currently readable. Either may be missing when
/// the cookies came from an incoming request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredCredentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl StoredCredentials {
    pub fn pair(self) -> Option<CredentialPair> {
        match (self.access_token, self.refresh_token) {
            (Some(access_token), Some(refresh_token)) => Some(CredentialPair {
                access_token,
                refresh_token,
            }),
            _ => None,
        }
    }
}

/// Read access to the persisted tokens of one execution context.
pub trait CredentialReader: Send + Sync {
    /// Read both cookies in a single pass.
    fn read(&self) -> StoredCredentials;

    fn access_token(&self) -> Option<String> {
        self.read().access_token
    }

    fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token
    }
}

/// Read/write access. Implementations must replace both cookies in one write.
pub trait CredentialStore: CredentialReader {
    fn store(&self, pair: &CredentialPair) -> Result<()>;

    /// Remove both cookies. Clearing an empty store is not an error.
    fn clear(&self) -> Result<()>;
}

/// Format a `Set-Cookie` value for one of the token cookies.
pub fn set_cookie_header(name: &str, value: &str) -> String {
    format!(
        "{}={}; Max-Age={}; Path={}",
        name, value, COOKIE_MAX_AGE_SECS, COOKIE_PATH
    )
}

/// Format a `Set-Cookie` value that deletes a cookie.
pub fn expire_cookie_header(name: &str) -> String {
    format!("{}=; Max-Age=0; Path={}", name, COOKIE_PATH)
}

/// Parse a `Cookie` request header into name/value pairs.
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|part| {
            let (name, value) = part.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

// ============================================================================
// Profile cookie jar (browser context)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredCookie {
    value: String,
    path: String,
    expires_at: DateTime<Utc>,
}

impl StoredCookie {
    fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
            path: COOKIE_PATH.to_string(),
            expires_at: Utc::now() + Duration::seconds(COOKIE_MAX_AGE_SECS),
        }
    }

    fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct JarFile {
    #[serde(default)]
    cookies: HashMap<String, StoredCookie>,
}

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Cookie jar shared by every tab of a profile, persisted as JSON.
pub struct CookieJar {
    profile_dir: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl CookieJar {
    pub fn new(profile_dir: PathBuf) -> Self {
        Self {
            profile_dir,
            write_lock: Mutex::new(()),
        }
    }

    fn jar_path(&self) -> PathBuf {
        self.profile_dir.join(COOKIE_JAR_FILE)
    }

    fn load(&self) -> Result<JarFile> {
        let path = self.jar_path();
        if !path.exists() {
            return Ok(JarFile::default());
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read cookie jar")?;
        serde_json::from_str(&contents).context("Failed to parse cookie jar")
    }

    /// Write via a temp file and rename so readers never see half a jar.
    fn save(&self, jar: &JarFile) -> Result<()> {
        std::fs::create_dir_all(&self.profile_dir)
            .context("Failed to create profile directory")?;
        let path = self.jar_path();
        // Unique per write: several jars may share one profile directory
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("{}.{}.tmp", std::process::id(), seq));
        let contents = serde_json::to_string_pretty(jar)?;
        std::fs::write(&tmp, contents).context("Failed to write cookie jar")?;
        std::fs::rename(&tmp, &path).context("Failed to replace cookie jar")?;
        Ok(())
    }

    fn modify(&self, f: impl FnOnce(&mut JarFile)) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("Cookie jar lock poisoned"))?;
        let mut jar = match self.load() {
            Ok(jar) => jar,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable cookie jar");
                JarFile::default()
            }
        };
        f(&mut jar);
        jar.cookies.retain(|_, c| !c.is_expired());
        self.save(&jar)
    }
}

impl CredentialReader for CookieJar {
    fn read(&self) -> StoredCredentials {
        let jar = match self.load() {
            Ok(jar) => jar,
            Err(e) => {
                warn!(error = %e, "Cookie jar unreadable, treating as empty");
                return StoredCredentials::default();
            }
        };
        let get = |name: &str| {
            jar.cookies
                .get(name)
                .filter(|c| !c.is_expired())
                .map(|c| c.value.clone())
        };
        StoredCredentials {
            access_token: get(ACCESS_TOKEN_COOKIE),
            refresh_token: get(REFRESH_TOKEN_COOKIE),
        }
    }
}

impl CredentialStore for CookieJar {
    fn store(&self, pair: &CredentialPair) -> Result<()> {
        self.modify(|jar| {
            jar.cookies.insert(
                ACCESS_TOKEN_COOKIE.to_string(),
                StoredCookie::new(&pair.access_token),
            );
            jar.cookies.insert(
                REFRESH_TOKEN_COOKIE.to_string(),
                StoredCookie::new(&pair.refresh_token),
            );
        })?;
        debug!("Stored credential pair in cookie jar");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.modify(|jar| {
            jar.cookies.remove(ACCESS_TOKEN_COOKIE);
            jar.cookies.remove(REFRESH_TOKEN_COOKIE);
        })
    }
}

// ============================================================================
// Request-scoped cookies (server context)
// ============================================================================

#[derive(Debug, Default)]
struct RequestCookieState {
    cookies: HashMap<String, String>,
    set_cookie: Vec<String>,
}

/// Cookies of one incoming request. Mutations are recorded as `Set-Cookie`
/// values so the caller can attach them to its response.
#[derive(Debug, Default)]
pub struct RequestCookies {
    state: Mutex<RequestCookieState>,
}

impl RequestCookies {
    pub fn from_header(cookie_header: &str) -> Self {
        Self {
            state: Mutex::new(RequestCookieState {
                cookies: parse_cookie_header(cookie_header),
                set_cookie: Vec::new(),
            }),
        }
    }

    /// `Set-Cookie` values produced so far, in write order.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.set_cookie.clone())
            .unwrap_or_default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut RequestCookieState) -> T) -> Result<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("Request cookie lock poisoned"))?;
        Ok(f(&mut state))
    }
}

impl CredentialReader for RequestCookies {
    fn read(&self) -> StoredCredentials {
        self.with_state(|s| StoredCredentials {
            access_token: s.cookies.get(ACCESS_TOKEN_COOKIE).cloned(),
            refresh_token: s.cookies.get(REFRESH_TOKEN_COOKIE).cloned(),
        })
        .unwrap_or_default()
    }
}

impl CredentialStore for RequestCookies {
    fn store(&self, pair: &CredentialPair) -> Result<()> {
        self.with_state(|s| {
            s.cookies
                .insert(ACCESS_TOKEN_COOKIE.to_string(), pair.access_token.clone());
            s.cookies
                .insert(REFRESH_TOKEN_COOKIE.to_string(), pair.refresh_token.clone());
            s.set_cookie
                .push(set_cookie_header(ACCESS_TOKEN_COOKIE, &pair.access_token));
            s.set_cookie
                .push(set_cookie_header(REFRESH_TOKEN_COOKIE, &pair.refresh_token));
        })
    }

    fn clear(&self) -> Result<()> {
        self.with_state(|s| {
            s.cookies.remove(ACCESS_TOKEN_COOKIE);
            s.cookies.remove(REFRESH_TOKEN_COOKIE);
            s.set_cookie.push(expire_cookie_header(ACCESS_TOKEN_COOKIE));
            s.set_cookie.push(expire_cookie_header(REFRESH_TOKEN_COOKIE));
        })
    }
}
