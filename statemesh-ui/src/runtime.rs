//! The command-executing runtime.
//!
//! Owns the single inbound queue and the model. Many tasks write into
//! the queue (bridge tasks, command completions, user input); exactly
//! one consumer runs `update`, strictly sequentially. Suspension points
//! exist only inside commands — the loop itself never suspends
//! mid-update.

use statemesh_channel::{encode_payload, Channel, Subject};
use statemesh_sync::{EntityEvent, QueryConfig, QueryEngine};
use statemesh_types::{ComponentRecord, Timestamp};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use crate::command::Command;
use crate::message::Message;
use crate::model::{ConnectionStatus, Model};
use crate::update::update;
use crate::view::{view, ViewModel};

/// Tuning for the runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Bound on each publish command. Commands complete or time out;
    /// they are never cancelled mid-flight.
    pub command_timeout: Duration,
    /// Query round-trip settings.
    pub query: QueryConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(5),
            query: QueryConfig::default(),
        }
    }
}

/// The update loop and its command executor.
pub struct Runtime {
    model: Model,
    inbox_tx: mpsc::UnboundedSender<Message>,
    inbox_rx: mpsc::UnboundedReceiver<Message>,
    channel: Arc<dyn Channel>,
    queries: QueryEngine,
    config: RuntimeConfig,
    renderer: Option<Box<dyn FnMut(&ViewModel) + Send>>,
}

impl Runtime {
    /// Creates a runtime over a channel.
    pub fn new(channel: Arc<dyn Channel>, model: Model, config: RuntimeConfig) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let queries = QueryEngine::new(channel.clone(), config.query.clone());
        Self {
            model,
            inbox_tx,
            inbox_rx,
            channel,
            queries,
            config,
            renderer: None,
        }
    }

    /// Installs a render callback, invoked with the fresh view after
    /// every applied message.
    #[must_use]
    pub fn with_renderer(mut self, renderer: impl FnMut(&ViewModel) + Send + 'static) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    /// The inbound queue's writer side — hand it to bridges and UI
    /// input sources.
    #[must_use]
    pub fn inbox(&self) -> mpsc::UnboundedSender<Message> {
        self.inbox_tx.clone()
    }

    /// The current model.
    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Runs the loop until the terminal disconnected state. Returns
    /// the final model.
    pub async fn run(mut self) -> Model {
        while let Some(message) = self.inbox_rx.recv().await {
            let commands = update(&mut self.model, message);
            for command in commands {
                self.dispatch(command);
            }
            if let Some(renderer) = &mut self.renderer {
                renderer(&view(&self.model));
            }
            if self.model.connection == ConnectionStatus::Disconnected {
                debug!("terminal disconnect; update loop ending");
                break;
            }
        }
        self.model
    }

    /// Executes one command as a detached task whose result re-enters
    /// the queue.
    fn dispatch(&self, command: Command) {
        let inbox = self.inbox_tx.clone();
        match command {
            Command::PublishUpdate {
                entity_id,
                type_tag,
                data,
                version,
            } => {
                // Stamp wall-clock time here, at the I/O boundary.
                let event = EntityEvent::Component(ComponentRecord {
                    entity_id,
                    type_tag,
                    data,
                    version,
                    timestamp: Timestamp::now(),
                });
                self.spawn_publish(event);
            }

            Command::PublishDetach {
                entity_id,
                type_tag,
            } => {
                let event = EntityEvent::Detached {
                    entity_id,
                    type_tag,
                    timestamp: Timestamp::now(),
                };
                self.spawn_publish(event);
            }

            Command::Query { tags } => {
                let queries = self.queries.clone();
                tokio::spawn(async move {
                    let outcome = queries.query(&tags).await;
                    let _ = inbox.send(Message::QueryResult { tags, outcome });
                });
            }

            Command::Timer { delay, message } => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = inbox.send(*message);
                });
            }
        }
    }

    fn spawn_publish(&self, event: EntityEvent) {
        let inbox = self.inbox_tx.clone();
        let channel = self.channel.clone();
        let timeout = self.config.command_timeout;
        tokio::spawn(async move {
            let subject = Subject::entity(&event.entity_id());
            let payload = match encode_payload(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    let _ = inbox.send(Message::PublishFailed {
                        subject,
                        detail: e.to_string(),
                    });
                    return;
                }
            };
            let result = tokio::time::timeout(timeout, channel.publish(&subject, payload)).await;
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    let _ = inbox.send(Message::PublishFailed {
                        subject,
                        detail: e.to_string(),
                    });
                }
                Err(_) => {
                    let _ = inbox.send(Message::PublishFailed {
                        subject,
                        detail: "publish timed out".to_string(),
                    });
                }
            }
        });
    }
}
