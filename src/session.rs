//! Per-visitor editor state, keyed by a random id carried in a cookie.

use crate::config::AppConfig;
use crate::editor::EditorSession;
use crate::style::{OutputFormat, RenderStyle};

use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use base64::{URL_SAFE_NO_PAD, encode_config};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use time::{Duration, OffsetDateTime};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

pub const SESSION_COOKIE_NAME: &str = "latexpad_session";

#[derive(Debug, Clone)]
pub struct Session {
    pub editor: EditorSession,
    pub style: RenderStyle,
    pub format: OutputFormat,
}

impl Session {
    fn new(config: &AppConfig) -> Self {
        Self {
            editor: EditorSession::new(config.initial_formula.clone()),
            style: config.style.clone(),
            format: config.format,
        }
    }
}

/// Result of running a closure against a session.
#[derive(Debug)]
pub struct SessionAccess<R> {
    pub id: String,
    /// The request carried no usable id and a new session was started.
    pub created: bool,
    pub value: R,
}

struct Entry {
    last_seen: OffsetDateTime,
    session: Arc<Mutex<Session>>,
}

/// Sessions keyed by id. The map lock covers lookup, creation and pruning
/// only; each session has its own lock, taken after the map lock is released.
#[derive(Clone)]
pub struct SessionStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    ttl: Duration,
    defaults: Arc<AppConfig>,
}

impl SessionStore {
    pub fn new(defaults: AppConfig) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl: defaults.session_ttl,
            defaults: Arc::new(defaults),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `f` against the session named by `id`, starting a fresh one when
    /// the id is missing, unknown or expired. Only this session is locked
    /// while `f` runs.
    pub fn with_session<R>(
        &self,
        id: Option<&str>,
        f: impl FnOnce(&mut Session) -> R,
    ) -> SessionAccess<R> {
        self.with_session_at(id, OffsetDateTime::now_utc(), f)
    }

    pub(crate) fn with_session_at<R>(
        &self,
        id: Option<&str>,
        now: OffsetDateTime,
        f: impl FnOnce(&mut Session) -> R,
    ) -> SessionAccess<R> {
        let (id, created, session) = self.checkout(id, now);
        let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
        let value = f(&mut *session);
        SessionAccess { id, created, value }
    }

    /// Runs `f` against an existing live session without creating one.
    pub fn read<R>(&self, id: Option<&str>, f: impl FnOnce(&Session) -> R) -> Option<R> {
        let now = OffsetDateTime::now_utc();
        let session = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            prune(&mut entries, now, self.ttl);
            let entry = entries.get_mut(id?)?;
            entry.last_seen = now;
            Arc::clone(&entry.session)
        };
        let session = session.lock().unwrap_or_else(PoisonError::into_inner);
        Some(f(&*session))
    }

    /// Finds or creates the entry for `id` and returns its session handle.
    fn checkout(
        &self,
        id: Option<&str>,
        now: OffsetDateTime,
    ) -> (String, bool, Arc<Mutex<Session>>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        prune(&mut entries, now, self.ttl);

        let known = id.filter(|id| entries.contains_key(*id)).map(str::to_string);
        let created = known.is_none();
        let id = known.unwrap_or_else(generate_session_id);
        if created {
            tracing::debug!(active = entries.len() + 1, "started session");
        }

        let entry = entries.entry(id.clone()).or_insert_with(|| Entry {
            last_seen: now,
            session: Arc::new(Mutex::new(Session::new(&self.defaults))),
        });
        entry.last_seen = now;
        (id, created, Arc::clone(&entry.session))
    }
}

fn prune(entries: &mut HashMap<String, Entry>, now: OffsetDateTime, ttl: Duration) {
    let before = entries.len();
    entries.retain(|_, entry| now - entry.last_seen <= ttl);
    let pruned = before - entries.len();
    if pruned > 0 {
        tracing::debug!(pruned, active = entries.len(), "pruned idle sessions");
    }
}

pub fn generate_session_id() -> String {
    let mut rng = OsRng;
    generate_session_id_with_rng(&mut rng)
}

pub(crate) fn generate_session_id_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> String {
    let mut bytes = [0u8; 32];
    rng.fill_bytes(&mut bytes);
    encode_config(bytes, URL_SAFE_NO_PAD)
}

pub fn session_cookie(id: &str, ttl: Duration) -> String {
    let max_age = ttl.whole_seconds().max(0);
    format!("{SESSION_COOKIE_NAME}={id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}")
}

pub fn session_id_from_headers(headers: &HeaderMap) -> Option<&str> {
    for header in headers.get_all(COOKIE).iter() {
        if let Ok(raw) = header.to_str()
            && let Some(value) = cookie_from_header(raw, SESSION_COOKIE_NAME)
        {
            return Some(value);
        }
    }
    None
}

fn cookie_from_header<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    for part in header.split(';') {
        let trimmed = part.trim();
        if let Some((cookie_name, cookie_value)) = trimmed.split_once('=')
            && cookie_name == name
            && !cookie_value.is_empty()
        {
            return Some(cookie_value);
        }
    }
    None
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration as StdDuration;

    struct ZeroRng;

    impl RngCore for ZeroRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            for value in dest.iter_mut() {
                *value = 0;
            }
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    impl CryptoRng for ZeroRng {}

    fn store() -> SessionStore {
        SessionStore::new(AppConfig {
            initial_formula: "x".to_string(),
            session_ttl: Duration::minutes(10),
            ..AppConfig::default()
        })
    }

    #[test]
    fn generate_session_id_with_rng__should_match_fixture() {
        // Given
        let mut rng = ZeroRng;

        // When
        let id = generate_session_id_with_rng(&mut rng);

        // Then
        assert_eq!(id, "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");
    }

    #[test]
    fn with_session__should_create_session_from_defaults() {
        // Given
        let store = store();

        // When
        let access = store.with_session(None, |session| session.editor.formula().to_string());

        // Then
        assert!(access.created);
        assert_eq!(access.value, "x");
        assert_eq!(access.id.len(), 43);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn with_session__should_reuse_known_id() {
        // Given
        let store = store();
        let first = store.with_session(None, |session| session.editor.insert("+1", false));

        // When
        let second = store.with_session(Some(&first.id), |session| {
            session.editor.formula().to_string()
        });

        // Then
        assert!(!second.created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.value, "x+1");
    }

    #[test]
    fn with_session__should_not_adopt_unknown_ids() {
        // Given
        let store = store();

        // When
        let access = store.with_session(Some("forged"), |_| ());

        // Then
        assert!(access.created);
        assert_ne!(access.id, "forged");
    }

    #[test]
    fn with_session_at__should_prune_idle_sessions() {
        // Given
        let store = store();
        let start = OffsetDateTime::UNIX_EPOCH;
        let first = store.with_session_at(None, start, |session| {
            session.editor.insert("y", false)
        });

        // When
        let later = start + Duration::minutes(11);
        let second = store.with_session_at(Some(&first.id), later, |session| {
            session.editor.formula().to_string()
        });

        // Then
        assert!(second.created);
        assert_eq!(second.value, "x");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn with_session_at__should_keep_sessions_touched_within_ttl() {
        let store = store();
        let start = OffsetDateTime::UNIX_EPOCH;
        let first = store.with_session_at(None, start, |_| ());

        store.with_session_at(Some(&first.id), start + Duration::minutes(8), |_| ());
        let third = store.with_session_at(Some(&first.id), start + Duration::minutes(16), |_| ());

        assert!(!third.created);
    }

    #[test]
    fn with_session__should_not_block_other_sessions() {
        // Given
        let store = store();
        let busy = store.with_session(None, |_| ()).id;
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let holder = {
            let store = store.clone();
            thread::spawn(move || {
                store.with_session(Some(&busy), |_| {
                    entered_tx.send(()).expect("signal entered");
                    release_rx.recv_timeout(StdDuration::from_secs(5)).ok();
                });
            })
        };
        entered_rx
            .recv_timeout(StdDuration::from_secs(5))
            .expect("holder entered its session");

        // When
        let (done_tx, done_rx) = mpsc::channel();
        {
            let store = store.clone();
            thread::spawn(move || {
                let access = store.with_session(None, |session| session.editor.formula().to_string());
                done_tx.send(access.value).expect("signal done");
            });
        }
        let other = done_rx.recv_timeout(StdDuration::from_secs(2));

        // Then
        release_tx.send(()).expect("release holder");
        holder.join().expect("holder thread");
        assert_eq!(other.expect("other session was not blocked"), "x");
    }

    #[test]
    fn read__should_not_create_sessions() {
        let store = store();

        assert!(store.read(None, |_| ()).is_none());
        assert!(store.read(Some("missing"), |_| ()).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn session_cookie__should_be_http_only() {
        // When
        let cookie = session_cookie("abc", Duration::hours(1));

        // Then
        assert_eq!(
            cookie,
            "latexpad_session=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age=3600"
        );
    }

    #[test]
    fn session_id_from_headers__should_find_cookie_among_others() {
        // Given
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(
            COOKIE,
            HeaderValue::from_static("a=1; latexpad_session=token123; b=2"),
        );

        // When
        let id = session_id_from_headers(&headers);

        // Then
        assert_eq!(id, Some("token123"));
    }

    #[test]
    fn session_id_from_headers__should_ignore_empty_values() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("latexpad_session="));

        assert_eq!(session_id_from_headers(&headers), None);
    }
}
