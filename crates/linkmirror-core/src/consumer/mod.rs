//! Live stream consumer
//!
//! The LiveConsumer is responsible for:
//! - Resolving the tracked handle to a numeric identity (once)
//! - Holding the filtered live connection open, reconnecting with backoff
//! - Classifying each post from the tracked account
//! - Mirroring posts whose links were not seen before
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ StreamSource │─── raw lines ───┐
//! └──────────────┘                 │
//!                                  ▼
//!                         ┌──────────────┐
//!                         │ LiveConsumer │
//!                         └──────────────┘
//!                                  │
//!         ┌────────────────────────┼────────────────────────┐
//!         │                        │                        │
//!         ▼                        ▼                        ▼
//! ┌─────────────┐         ┌──────────────┐         ┌─────────────┐
//! │ Classifier  │         │ MirrorAction │         │   Events    │
//! │ (registry)  │         │ (re-share)   │         │  (notify)   │
//! └─────────────┘         └──────────────┘         └─────────────┘
//! ```
//!
//! ## State Machine
//!
//! ```text
//! CONNECTING -> STREAMING -> (per line: PARSE -> FILTER -> CLASSIFY -> MIRROR | SKIP) -> STREAMING
//! STREAMING  -> BACKOFF -> CONNECTING          (stream error or server close)
//! BACKOFF    -> FAILED                          (max_reconnects consecutive failures)
//! any        -> STOPPED                         (shutdown signal)
//! ```
//!
//! Lines are handled one at a time: a post is fully classified, and
//! mirrored if eligible, before the next line is read. Only the read, the
//! connect and the backoff sleep are raced against shutdown.

mod message;

pub use message::StreamMessage;

use crate::classifier::Classifier;
use crate::config::StreamConfig;
use crate::error::{Error, Result};
use crate::traits::{IdentityResolver, IncomingPost, MirrorAction, MirrorOutcome, StreamSource};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, trace, warn};

/// Events emitted by the LiveConsumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerEvent {
    /// Consumer started
    Started { handle: String },

    /// Live connection opened
    Connected { user_id: u64 },

    /// Post was passed to the mirror action
    PostMirrored { post_id: String, dry_run: bool },

    /// Post referenced an already-seen link
    DuplicateSkipped { post_id: String },

    /// Post came from another account
    IgnoredAuthor { post_id: String, author: String },

    /// Line could not be parsed as a post
    MalformedMessage { reason: String },

    /// Live connection lost
    Disconnected { reason: String, attempt: usize },

    /// Consumer stopped
    Stopped { reason: String },
}

/// Live stream consumer
///
/// ## Lifecycle
///
/// 1. Create with [`LiveConsumer::new()`]
/// 2. Start with [`LiveConsumer::listen()`] or [`LiveConsumer::listen_until()`]
/// 3. Runs until the shutdown signal, or until a fatal error
///
/// ## Errors
///
/// Stream disconnects are retried with exponential backoff up to
/// `max_reconnects` consecutive times. Everything else (registry failure,
/// mirror failure, unknown account) ends `listen` with an error.
pub struct LiveConsumer {
    handle: String,
    resolver: Arc<dyn IdentityResolver>,
    source: Arc<dyn StreamSource>,
    classifier: Arc<Classifier>,
    mirror: Arc<dyn MirrorAction>,
    stream: StreamConfig,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ConsumerEvent>,
}

impl LiveConsumer {
    /// Create a new consumer
    ///
    /// # Returns
    ///
    /// A tuple of (consumer, event_receiver) where event_receiver yields consumer events
    pub fn new(
        handle: impl Into<String>,
        resolver: Arc<dyn IdentityResolver>,
        source: Arc<dyn StreamSource>,
        classifier: Arc<Classifier>,
        mirror: Arc<dyn MirrorAction>,
        stream: StreamConfig,
    ) -> Result<(Self, mpsc::Receiver<ConsumerEvent>)> {
        stream.validate()?;

        let (tx, rx) = mpsc::channel(stream.event_channel_capacity);

        let consumer = Self {
            handle: handle.into(),
            resolver,
            source,
            classifier,
            mirror,
            stream,
            event_tx: tx,
        };

        Ok((consumer, rx))
    }

    /// Run until Ctrl-C
    pub async fn listen(&self) -> Result<()> {
        self.listen_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` completes
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: Fatal error
    pub async fn listen_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        self.emit_event(ConsumerEvent::Started {
            handle: self.handle.clone(),
        });

        let user_id = self
            .resolver
            .resolve(&self.handle)
            .await?
            .ok_or_else(|| Error::not_found(format!("Account not found: {}", self.handle)))?;
        info!(handle = %self.handle, user_id, "Resolved tracked account");

        tokio::pin!(shutdown);
        let mut failures = 0usize;

        'connection: loop {
            let opened = tokio::select! {
                _ = &mut shutdown => break 'connection,
                opened = self.source.open(user_id) => opened,
            };

            let reason = match opened {
                Ok(mut lines) => {
                    info!(user_id, "Live stream connected");
                    self.emit_event(ConsumerEvent::Connected { user_id });

                    loop {
                        let next = tokio::select! {
                            _ = &mut shutdown => break 'connection,
                            next = lines.next() => next,
                        };

                        match next {
                            Some(Ok(line)) => {
                                failures = 0;
                                self.handle_line(&line).await?;
                            }
                            Some(Err(e)) if e.is_stream_disconnect() => break e.to_string(),
                            Some(Err(e)) => return Err(e),
                            None => break "stream closed by server".to_string(),
                        }
                    }
                }
                Err(e) if e.is_stream_disconnect() => e.to_string(),
                Err(e) => return Err(e),
            };

            failures += 1;
            self.emit_event(ConsumerEvent::Disconnected {
                reason: reason.clone(),
                attempt: failures,
            });

            if failures > self.stream.max_reconnects {
                return Err(Error::stream(format!(
                    "Giving up after {} consecutive failed connections: {}",
                    failures, reason
                )));
            }

            let delay = self.stream.backoff_for(failures);
            warn!(
                attempt = failures,
                delay_secs = delay.as_secs(),
                "Live stream lost ({}), reconnecting",
                reason
            );

            tokio::select! {
                _ = &mut shutdown => break 'connection,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("Shutdown signal received");
        self.emit_event(ConsumerEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });

        self.classifier.registry().flush().await?;
        info!("Registry flushed, consumer stopped");

        Ok(())
    }

    /// Handle one raw line from the connection
    async fn handle_line(&self, line: &str) -> Result<()> {
        match StreamMessage::parse(line) {
            StreamMessage::KeepAlive => {
                trace!("Keep-alive");
                Ok(())
            }
            StreamMessage::Control { kind } => {
                debug!(kind = %kind, "Stream control message");
                Ok(())
            }
            StreamMessage::Malformed { raw, reason } => {
                error!(raw = %raw, "Failed to parse stream message: {}", reason);
                self.emit_event(ConsumerEvent::MalformedMessage { reason });
                Ok(())
            }
            StreamMessage::Post(post) => self.handle_post(&post).await,
        }
    }

    /// Filter, classify and mirror one post
    async fn handle_post(&self, post: &IncomingPost) -> Result<()> {
        if post.author.handle != self.handle {
            debug!(
                post_id = %post.id_str,
                author = %post.author.handle,
                "Ignoring post from another account"
            );
            self.emit_event(ConsumerEvent::IgnoredAuthor {
                post_id: post.id_str.clone(),
                author: post.author.handle.clone(),
            });
            return Ok(());
        }

        if self.classifier.classify(post).await? {
            info!(post_id = %post.id_str, "Not mirrored: duplicate");
            self.emit_event(ConsumerEvent::DuplicateSkipped {
                post_id: post.id_str.clone(),
            });
            return Ok(());
        }

        info!(post_id = %post.id_str, text = %post.text, "Mirroring post");
        let outcome = self.mirror.mirror(&post.id_str).await.inspect_err(|e| {
            error!(
                post_id = %post.id_str,
                provider = self.mirror.provider_name(),
                "Mirror action failed: {}",
                e
            )
        })?;

        let dry_run = matches!(outcome, MirrorOutcome::DryRun { .. });
        self.emit_event(ConsumerEvent::PostMirrored {
            post_id: post.id_str.clone(),
            dry_run,
        });

        Ok(())
    }

    /// Emit a consumer event
    fn emit_event(&self, event: ConsumerEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
