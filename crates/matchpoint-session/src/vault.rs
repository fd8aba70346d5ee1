//! The token vault: sole reader and writer of persisted auth state.
//!
//! Three keys, two stores:
//!
//! | key            | where                                            |
//! |----------------|--------------------------------------------------|
//! | `accessToken`  | secure store if "remember me", else session store |
//! | `refreshToken` | same store as `accessToken`                       |
//! | `user`         | session store (JSON `UserRecord`)                 |
//!
//! Nothing outside this module touches those keys.

use matchpoint_protocol::{Codec, JsonCodec, TokenPair, UserRecord};

use crate::{KeyValueStore, SessionError, StoreError};

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_KEY: &str = "user";

/// Which backing store a token pair was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Secure,
    Session,
}

/// Persists tokens and the user record across a secure store `P` and a
/// session-only store `S`.
#[derive(Debug)]
pub struct TokenVault<P, S> {
    secure: P,
    session: S,
    codec: JsonCodec,
}

impl<P: KeyValueStore, S: KeyValueStore> TokenVault<P, S> {
    pub fn new(secure: P, session: S) -> Self {
        Self {
            secure,
            session,
            codec: JsonCodec,
        }
    }

    pub fn secure_store(&self) -> &P {
        &self.secure
    }

    pub fn session_store(&self) -> &S {
        &self.session
    }

    /// Writes a token pair to the store chosen by `remember_me` and removes
    /// token keys from the other store, so a later restore can't pick up a
    /// stale pair.
    ///
    /// # Errors
    /// Returns [`SessionError::Storage`] if either store fails.
    pub async fn save_tokens(
        &self,
        tokens: &TokenPair,
        remember_me: bool,
    ) -> Result<(), SessionError> {
        if remember_me {
            write_pair(&self.secure, tokens).await?;
            remove_pair(&self.session).await?;
        } else {
            write_pair(&self.session, tokens).await?;
            remove_pair(&self.secure).await?;
        }
        Ok(())
    }

    /// Replaces the token pair after a refresh, in whichever store held
    /// the previous one (session store if none did).
    ///
    /// A refresh response without a refresh token keeps the stored one.
    ///
    /// # Errors
    /// Returns [`SessionError::Storage`] if the store fails.
    pub async fn replace_tokens(&self, tokens: &TokenPair) -> Result<(), SessionError> {
        match self.find_tokens().await? {
            Some((Slot::Secure, _)) => update_pair(&self.secure, tokens).await?,
            _ => update_pair(&self.session, tokens).await?,
        }
        Ok(())
    }

    /// Reads the persisted token pair: secure store first, then the
    /// session store.
    ///
    /// # Errors
    /// Returns [`SessionError::Storage`] if a store fails.
    pub async fn load_tokens(&self) -> Result<Option<TokenPair>, SessionError> {
        Ok(self.find_tokens().await?.map(|(_, tokens)| tokens))
    }

    async fn find_tokens(&self) -> Result<Option<(Slot, TokenPair)>, StoreError> {
        if let Some(tokens) = read_pair(&self.secure).await? {
            return Ok(Some((Slot::Secure, tokens)));
        }
        Ok(read_pair(&self.session).await?.map(|t| (Slot::Session, t)))
    }

    /// Caches the user record in the session store.
    ///
    /// # Errors
    /// Returns [`SessionError::Storage`] or, if the record can't be
    /// encoded, [`SessionError::UnexpectedResponse`].
    pub async fn save_user(&self, user: &UserRecord) -> Result<(), SessionError> {
        let encoded = self.codec.encode(user)?;
        self.session.set(USER_KEY, &encoded).await?;
        Ok(())
    }

    /// Reads the cached user record from the session store.
    ///
    /// # Errors
    /// Returns [`SessionError::Storage`] if the store fails, or
    /// [`SessionError::UnexpectedResponse`] if the stored record is corrupt.
    pub async fn load_user(&self) -> Result<Option<UserRecord>, SessionError> {
        match self.session.get(USER_KEY).await? {
            Some(raw) => Ok(Some(self.codec.decode(&raw)?)),
            None => Ok(None),
        }
    }

    /// Removes the token keys from both stores, leaving the user record.
    ///
    /// # Errors
    /// Returns the first [`SessionError::Storage`] encountered; every key is
    /// still attempted.
    pub async fn clear_tokens(&self) -> Result<(), SessionError> {
        let results = [
            remove_pair(&self.secure).await,
            remove_pair(&self.session).await,
        ];
        first_error(results)
    }

    /// Removes every auth key from both stores.
    ///
    /// # Errors
    /// Returns the first [`SessionError::Storage`] encountered; every key is
    /// still attempted.
    pub async fn clear(&self) -> Result<(), SessionError> {
        let results = [
            remove_pair(&self.secure).await,
            remove_pair(&self.session).await,
            self.secure.remove(USER_KEY).await,
            self.session.remove(USER_KEY).await,
        ];
        first_error(results)
    }
}

async fn read_pair<K: KeyValueStore>(store: &K) -> Result<Option<TokenPair>, StoreError> {
    let Some(access_token) = store.get(ACCESS_TOKEN_KEY).await? else {
        return Ok(None);
    };
    if access_token.is_empty() {
        return Ok(None);
    }
    let refresh_token = store.get(REFRESH_TOKEN_KEY).await?;
    Ok(Some(TokenPair::new(access_token, refresh_token)))
}

async fn write_pair<K: KeyValueStore>(store: &K, tokens: &TokenPair) -> Result<(), StoreError> {
    store.set(ACCESS_TOKEN_KEY, &tokens.access_token).await?;
    match &tokens.refresh_token {
        Some(refresh) => store.set(REFRESH_TOKEN_KEY, refresh).await,
        None => store.remove(REFRESH_TOKEN_KEY).await,
    }
}

async fn update_pair<K: KeyValueStore>(store: &K, tokens: &TokenPair) -> Result<(), StoreError> {
    store.set(ACCESS_TOKEN_KEY, &tokens.access_token).await?;
    if let Some(refresh) = &tokens.refresh_token {
        store.set(REFRESH_TOKEN_KEY, refresh).await?;
    }
    Ok(())
}

async fn remove_pair<K: KeyValueStore>(store: &K) -> Result<(), StoreError> {
    let access = store.remove(ACCESS_TOKEN_KEY).await;
    let refresh = store.remove(REFRESH_TOKEN_KEY).await;
    access.and(refresh)
}

fn first_error<const N: usize>(results: [Result<(), StoreError>; N]) -> Result<(), SessionError> {
    results
        .into_iter()
        .find_map(Result::err)
        .map_or(Ok(()), |e| Err(e.into()))
}
