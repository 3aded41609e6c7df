//! Access/refresh token holder with a single in-flight refresh.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::ClientError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Exchanges a refresh token for a new token pair.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ClientError>;
}

/// Called once with the new access token, or `None` if the refresh failed.
pub type RefreshSubscriber = Box<dyn FnOnce(Option<&str>) + Send>;

#[derive(Default)]
struct SessionState {
    tokens: Option<TokenPair>,
    refreshing: bool,
    subscribers: Vec<RefreshSubscriber>,
}

/// Shared token store. Clone the surrounding `Arc` to share it.
///
/// At most one refresh runs at a time; concurrent callers of [`Session::refresh`]
/// wait for the pending one and receive its outcome.
pub struct Session {
    state: Mutex<SessionState>,
    refresher: Arc<dyn TokenRefresher>,
}

impl Session {
    pub fn new(refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            state: Mutex::new(SessionState::default()),
            refresher,
        }
    }

    pub fn with_tokens(refresher: Arc<dyn TokenRefresher>, tokens: TokenPair) -> Self {
        let session = Self::new(refresher);
        session.set_tokens(tokens);
        session
    }

    /// Current access token.
    pub fn token(&self) -> Option<String> {
        self.lock()
            .tokens
            .as_ref()
            .map(|tokens| tokens.access_token.clone())
    }

    pub fn set_tokens(&self, tokens: TokenPair) {
        self.lock().tokens = Some(tokens);
    }

    pub fn clear(&self) {
        self.lock().tokens = None;
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    /// Queue `subscriber` for the outcome of the next refresh to complete.
    pub fn on_refreshed(&self, subscriber: impl FnOnce(Option<&str>) + Send + 'static) {
        self.lock().subscribers.push(Box::new(subscriber));
    }

    /// Obtain a new access token, joining a refresh already in flight.
    ///
    /// A failed refresh clears the stored tokens.
    pub async fn refresh(&self) -> Result<String, ClientError> {
        let start = {
            let mut state = self.lock();
            if state.refreshing {
                let (tx, rx) = oneshot::channel();
                state.subscribers.push(Box::new(move |token: Option<&str>| {
                    let _ = tx.send(token.map(str::to_string));
                }));
                RefreshStart::Join(rx)
            } else {
                let Some(tokens) = state.tokens.as_ref() else {
                    return Err(ClientError::NoSession);
                };
                let refresh_token = tokens.refresh_token.clone();
                state.refreshing = true;
                RefreshStart::Lead(refresh_token)
            }
        };

        let refresh_token = match start {
            RefreshStart::Lead(refresh_token) => refresh_token,
            RefreshStart::Join(rx) => {
                tracing::debug!("Waiting for pending token refresh");
                return rx.await.ok().flatten().ok_or_else(|| {
                    ClientError::RefreshFailed("pending refresh did not succeed".to_string())
                });
            }
        };

        let mut pending = PendingRefresh {
            session: self,
            finished: false,
        };
        let outcome = self.refresher.refresh(&refresh_token).await;
        pending.finish(outcome.as_ref().ok().cloned());

        match outcome {
            Ok(tokens) => {
                tracing::debug!("Session token refreshed");
                Ok(tokens.access_token)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Session token refresh failed");
                Err(err)
            }
        }
    }

    fn complete_refresh(&self, tokens: Option<TokenPair>) {
        let subscribers = {
            let mut state = self.lock();
            state.refreshing = false;
            state.tokens = tokens.clone();
            std::mem::take(&mut state.subscribers)
        };
        let access_token = tokens.as_ref().map(|tokens| tokens.access_token.as_str());
        for subscriber in subscribers {
            subscriber(access_token);
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

enum RefreshStart {
    Lead(String),
    Join(oneshot::Receiver<Option<String>>),
}

/// Releases the pending flag even if the refresh future is dropped.
struct PendingRefresh<'a> {
    session: &'a Session,
    finished: bool,
}

impl PendingRefresh<'_> {
    fn finish(&mut self, tokens: Option<TokenPair>) {
        self.finished = true;
        self.session.complete_refresh(tokens);
    }
}

impl Drop for PendingRefresh<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let mut state = self.session.lock();
            state.refreshing = false;
            let subscribers = std::mem::take(&mut state.subscribers);
            drop(state);
            for subscriber in subscribers {
                subscriber(None);
            }
        }
    }
}
