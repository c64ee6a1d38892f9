use std::future::Future;
use std::time::Duration;

use tokio::sync::{oneshot, watch, Mutex};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::{
    client::SubscriptionClient,
    error::Error,
    models::{
        ChallengeRequest, ChallengeResponse, Credentials, Subscription, SubscriptionRequest,
        SubscriptionState,
    },
    token::VerifyToken,
    validator,
};

/// Orchestrates the subscription lifecycle for one set of credentials:
/// query existing subscriptions, create one if absent, await the provider's
/// challenge against the callback endpoint, and transition to Active.
///
/// The provider is the source of truth for uniqueness. Nothing here caches
/// list results as a substitute for querying, which keeps concurrent
/// `ensure` calls from different process instances correct.
pub struct SubscriptionManager {
    client: SubscriptionClient,
    credentials: Credentials,
    callback_url: String,
    verify_timeout: Duration,
    inner: Mutex<Inner>,
}

struct Inner {
    state: SubscriptionState,
    subscription: Option<Subscription>,
    pending: Option<PendingHandshake>,
    // Broadcasts state transitions so concurrent `ensure` callers can wait
    // on an in-flight handshake instead of starting a second one.
    state_tx: watch::Sender<SubscriptionState>,
}

impl Inner {
    fn set_state(&mut self, next: SubscriptionState) {
        self.state = next;
        self.state_tx.send_replace(next);
    }
}

/// Handshake in flight: the token we sent with `create` and the channel that
/// wakes the waiting `ensure` once the provider's challenge matches. The
/// whole entry is dropped on a successful match, which is what makes the
/// token single-use.
struct PendingHandshake {
    token: VerifyToken,
    verified_tx: Option<oneshot::Sender<()>>,
}

impl PendingHandshake {
    // A handshake whose owner has gone away (cancelled, timed out) keeps
    // answering late challenges but must not block a new attempt.
    fn has_live_waiter(&self) -> bool {
        self.verified_tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

impl SubscriptionManager {
    pub fn new(
        client: SubscriptionClient,
        credentials: Credentials,
        callback_url: impl Into<String>,
        verify_timeout: Duration,
    ) -> Self {
        let (state_tx, _) = watch::channel(SubscriptionState::Unsubscribed);
        Self {
            client,
            credentials,
            callback_url: callback_url.into(),
            verify_timeout,
            inner: Mutex::new(Inner {
                state: SubscriptionState::Unsubscribed,
                subscription: None,
                pending: None,
                state_tx,
            }),
        }
    }

    pub async fn state(&self) -> SubscriptionState {
        self.inner.lock().await.state
    }

    /// Converge on exactly one active subscription for these credentials.
    /// Idempotent and safe to call on every process start; repeated calls
    /// after success are no-ops that return the existing subscription.
    pub async fn ensure(&self) -> Result<Subscription, Error> {
        self.ensure_with_cancel(std::future::pending::<()>()).await
    }

    /// Like [`ensure`](Self::ensure), but aborts the verification wait when
    /// `cancel` resolves. The provider-side subscription is left intact and
    /// the pending handshake stays registered, so a challenge that arrives
    /// after cancellation can still complete asynchronously.
    pub async fn ensure_with_cancel<F>(&self, cancel: F) -> Result<Subscription, Error>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(cancel);

        loop {
            // Fast path, and the single-flight check: if another caller on
            // this manager already owns an in-flight handshake, follow its
            // outcome instead of registering a second token and orphaning
            // the one the provider is about to challenge with.
            let follow = {
                let inner = self.inner.lock().await;
                if inner.state == SubscriptionState::Active {
                    if let Some(sub) = inner.subscription.clone() {
                        return Ok(sub);
                    }
                }
                match inner.pending.as_ref() {
                    Some(pending) if pending.has_live_waiter() => {
                        Some(inner.state_tx.subscribe())
                    }
                    _ => None,
                }
            };

            if let Some(mut state_rx) = follow {
                loop {
                    tokio::select! {
                        changed = state_rx.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                        _ = &mut cancel => return Err(Error::Cancelled),
                    }
                    let state = *state_rx.borrow_and_update();
                    match state {
                        SubscriptionState::Active => {
                            let inner = self.inner.lock().await;
                            match inner.subscription.clone() {
                                Some(sub) => return Ok(sub),
                                None => break,
                            }
                        }
                        SubscriptionState::PendingVerification => continue,
                        SubscriptionState::Unsubscribed | SubscriptionState::Failed => break,
                    }
                }
                // The handshake settled without activating; take a turn.
                continue;
            }

            if let Some(existing) = self.adopt_existing().await? {
                return Ok(existing);
            }

            let token = VerifyToken::generate();
            let (verified_tx, verified_rx) = oneshot::channel();
            {
                let mut inner = self.inner.lock().await;
                // Lost the registration race while listing; follow instead.
                if inner.pending.as_ref().is_some_and(|p| p.has_live_waiter()) {
                    continue;
                }
                inner.set_state(SubscriptionState::PendingVerification);
                inner.pending = Some(PendingHandshake {
                    token: token.clone(),
                    verified_tx: Some(verified_tx),
                });
            }

            // The handshake must be registered before the POST goes out: the
            // provider may issue the challenge GET while `create` is still in
            // flight.
            let request =
                SubscriptionRequest::new(&self.credentials, &self.callback_url, token.as_str());
            let created = match self.client.create(&request).await {
                Ok(subscription) => subscription,
                Err(Error::Conflict) => {
                    // Another instance won the race. The provider is the
                    // authority on uniqueness, so adopt whatever it holds.
                    warn!("provider reports an existing subscription, adopting it");
                    return match self.adopt_existing().await {
                        Ok(Some(existing)) => Ok(existing),
                        Ok(None) => {
                            self.mark_failed(&token).await;
                            Err(Error::Conflict)
                        }
                        Err(err) => {
                            self.mark_failed(&token).await;
                            Err(err)
                        }
                    };
                }
                Err(err) => {
                    self.mark_failed(&token).await;
                    return Err(err);
                }
            };
            info!(id = ?created.id, "subscription created, awaiting verification");

            tokio::select! {
                result = timeout(self.verify_timeout, verified_rx) => match result {
                    Ok(Ok(())) => {}
                    // Elapsed, or the pending entry was dropped without firing.
                    _ => {
                        self.mark_failed(&token).await;
                        return Err(Error::Timeout);
                    }
                },
                _ = &mut cancel => {
                    return Err(Error::Cancelled);
                }
            }

            let mut inner = self.inner.lock().await;
            inner.set_state(SubscriptionState::Active);
            inner.subscription = Some(created.clone());
            info!(id = ?created.id, "subscription active");
            return Ok(created);
        }
    }

    /// Validate an inbound challenge request against the pending token and
    /// build the echo body. Consumes the token on success: a second request
    /// is rejected even if it carries the same token. No I/O happens here,
    /// which keeps the response well inside the provider's 2-second window.
    pub async fn handle_challenge(&self, query: &str) -> Result<ChallengeResponse, Error> {
        let request = ChallengeRequest::from_query(query)?;
        let mut inner = self.inner.lock().await;
        let pending = inner.pending.as_mut().ok_or(Error::TokenMismatch)?;
        let response = validator::validate(&request, pending.token.as_str())?;
        if let Some(tx) = pending.verified_tx.take() {
            let _ = tx.send(());
        }
        inner.pending = None;
        info!("challenge verified");
        Ok(response)
    }

    /// Delete the active subscription at the provider and return to
    /// Unsubscribed. A later `ensure` starts a fresh cycle.
    pub async fn teardown(&self) -> Result<(), Error> {
        let subscription = {
            let inner = self.inner.lock().await;
            inner.subscription.clone()
        };
        if let Some(id) = subscription.and_then(|sub| sub.id) {
            self.client.delete(&self.credentials, id).await?;
            info!(id, "subscription deleted");
        }
        let mut inner = self.inner.lock().await;
        inner.set_state(SubscriptionState::Unsubscribed);
        inner.subscription = None;
        inner.pending = None;
        Ok(())
    }

    async fn adopt_existing(&self) -> Result<Option<Subscription>, Error> {
        let subscriptions = self.client.list(&self.credentials).await?;
        let Some(existing) = subscriptions.into_iter().next() else {
            return Ok(None);
        };
        if existing.callback_url != self.callback_url {
            warn!(
                theirs = %existing.callback_url,
                ours = %self.callback_url,
                "existing subscription points at a different callback URL"
            );
        }
        let mut inner = self.inner.lock().await;
        inner.set_state(SubscriptionState::Active);
        inner.subscription = Some(existing.clone());
        inner.pending = None;
        info!(id = ?existing.id, "adopted existing subscription");
        Ok(Some(existing))
    }

    // Only tears down the handshake this attempt registered; a handshake
    // consumed or replaced in the meantime belongs to someone else.
    async fn mark_failed(&self, token: &VerifyToken) {
        let mut inner = self.inner.lock().await;
        if inner.pending.as_ref().is_some_and(|p| p.token == *token) {
            inner.pending = None;
        }
        inner.set_state(SubscriptionState::Failed);
    }
}
