//! Player identity
//!
//! A player is known by a display name and a server-assigned id. Both are
//! persisted in the host's [`IdentityStore`] so a returning player keeps
//! them. Values the server assigns are only adopted when the client has none
//! of its own; a name the player types is validated before it replaces the
//! stored one.

use rustrict::CensorStr;
use serde::Serialize;
use thiserror::Error;
use web_time::Duration;

use crate::{
    constants::identity::{ID_KEY, IDENTITY_TTL_DAYS, MAX_NAME_LENGTH, NAME_KEY},
    tunnel::IdentityStore,
};

/// How long persisted identity values stay valid
pub const TTL: Duration = Duration::from_secs(IDENTITY_TTL_DAYS * 24 * 60 * 60);

/// Errors that can occur when the player chooses a name
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The name is empty or contains only whitespace
    #[error("name cannot be empty")]
    Empty,
    /// The name exceeds the maximum allowed length
    #[error("name is too long")]
    TooLong,
    /// The name contains inappropriate content
    #[error("name is inappropriate")]
    Inappropriate,
}

/// Checks a player chosen name, returning it trimmed
///
/// # Errors
///
/// * `Error::Empty` - Name is empty after trimming whitespace
/// * `Error::TooLong` - Name exceeds 30 characters
/// * `Error::Inappropriate` - Name contains inappropriate content
pub fn validate_name(name: &str) -> Result<&str, Error> {
    let name = rustrict::trim_whitespace(name);
    if name.is_empty() {
        return Err(Error::Empty);
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(Error::TooLong);
    }
    if name.is_inappropriate() {
        return Err(Error::Inappropriate);
    }
    Ok(name)
}

/// Name and id of the local player
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    name: Option<String>,
    uid: Option<String>,
}

impl Identity {
    /// Reads the persisted identity
    pub fn load<S: IdentityStore>(store: &S) -> Self {
        Self {
            name: store.get(NAME_KEY).filter(|name| !name.is_empty()),
            uid: store.get(ID_KEY).filter(|uid| !uid.is_empty()),
        }
    }

    /// Adopts server-assigned values for whatever is still unset
    ///
    /// Adopted values are persisted. Returns `true` if anything changed.
    pub fn adopt<S: IdentityStore>(&mut self, name: Option<&str>, uid: Option<&str>, store: &S) -> bool {
        let name = Self::fill(&mut self.name, name, NAME_KEY, store);
        let uid = Self::fill(&mut self.uid, uid, ID_KEY, store);
        name || uid
    }

    fn fill<S: IdentityStore>(slot: &mut Option<String>, value: Option<&str>, key: &str, store: &S) -> bool {
        match (slot.as_ref(), value) {
            (None, Some(value)) if !value.is_empty() => {
                store.set(key, value, TTL);
                *slot = Some(value.to_owned());
                true
            }
            _ => false,
        }
    }

    /// Replaces the name with one the player chose
    ///
    /// # Errors
    ///
    /// See [`validate_name`]; on error the identity is unchanged.
    pub fn choose_name<S: IdentityStore>(&mut self, name: &str, store: &S) -> Result<String, Error> {
        let name = validate_name(name)?.to_owned();
        store.set(NAME_KEY, &name, TTL);
        self.name = Some(name.clone());
        Ok(name)
    }

    /// Display name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Server-assigned id
    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    #[derive(Default, Clone)]
    struct MockStore {
        values: Arc<Mutex<HashMap<String, (String, Duration)>>>,
    }

    impl IdentityStore for MockStore {
        fn get(&self, key: &str) -> Option<String> {
            self.values.lock().unwrap().get(key).map(|(v, _)| v.clone())
        }

        fn set(&self, key: &str, value: &str, ttl: Duration) {
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), (value.to_string(), ttl));
        }
    }

    #[test]
    fn test_load_from_store() {
        let store = MockStore::default();
        store.set(NAME_KEY, "Ada", TTL);
        store.set(ID_KEY, "", TTL);

        let identity = Identity::load(&store);
        assert_eq!(identity.name(), Some("Ada"));
        assert_eq!(identity.uid(), None);
    }

    #[test]
    fn test_adopt_fills_unset_and_persists() {
        let store = MockStore::default();
        let mut identity = Identity::default();

        assert!(identity.adopt(Some("Guest 4"), Some("p4"), &store));
        assert_eq!(identity.name(), Some("Guest 4"));
        assert_eq!(store.get(ID_KEY).as_deref(), Some("p4"));

        let ttl = store.values.lock().unwrap()[ID_KEY].1;
        assert_eq!(ttl, Duration::from_secs(10 * 86400));
    }

    #[test]
    fn test_adopt_never_overwrites() {
        let store = MockStore::default();
        store.set(NAME_KEY, "Ada", TTL);
        store.set(ID_KEY, "p1", TTL);
        let mut identity = Identity::load(&store);

        assert!(!identity.adopt(Some("Guest 9"), Some("p9"), &store));
        assert_eq!(identity.name(), Some("Ada"));
        assert_eq!(store.get(ID_KEY).as_deref(), Some("p1"));
    }

    #[test]
    fn test_choose_name_trims_and_persists() {
        let store = MockStore::default();
        let mut identity = Identity::default();

        assert_eq!(identity.choose_name("  Ada  ", &store), Ok("Ada".to_string()));
        assert_eq!(store.get(NAME_KEY).as_deref(), Some("Ada"));
    }

    #[test]
    fn test_choose_name_rejections() {
        let store = MockStore::default();
        let mut identity = Identity::default();

        assert_eq!(identity.choose_name("   ", &store), Err(Error::Empty));
        assert_eq!(identity.choose_name(&"a".repeat(31), &store), Err(Error::TooLong));
        assert_eq!(identity.choose_name("fuck", &store), Err(Error::Inappropriate));
        assert_eq!(identity.name(), None);
        assert!(store.get(NAME_KEY).is_none());
    }

    #[test]
    fn test_max_length_name_allowed() {
        assert!(validate_name(&"a".repeat(30)).is_ok());
    }
}
