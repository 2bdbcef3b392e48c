use std::sync::Arc;
use std::time::Duration;

use critterkeep_common::{
    config_error, AccessPolicy, ConfigAccessPolicy, CritterError, JwtVerifier,
};
use critterkeep_config::AppConfig;
use critterkeep_db::{
    DbClient, PushSubscriptionRepository, SqlPushSubscriptionRepository,
    SqlTaskRepository, TaskRepository,
};
use critterkeep_push::{
    NotificationDispatcher, NotificationSender, PushState, PushTransport, WebPushClient,
};
use critterkeep_tasks::TaskState;
use tokio::task::JoinHandle;
use tracing::info;

/// Everything the server shares across routes.
///
/// The notification worker drains the dispatcher queue until every
/// `TaskState` clone (and with it the dispatcher) is dropped.
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbClient,
    pub tasks: Arc<TaskState>,
    pub push: Arc<PushState>,
    notification_worker: Option<JoinHandle<()>>,
}

impl AppState {
    /// Build the state from configuration alone.
    pub async fn new(config: Arc<AppConfig>) -> Result<Self, CritterError> {
        AppStateBuilder::new(config).build().await
    }

    /// Hand over the background worker so the caller can wait for it to drain.
    pub fn take_notification_worker(&mut self) -> Option<JoinHandle<()>> {
        self.notification_worker.take()
    }
}

/// Builder for [`AppState`]; tests use it to inject an in-memory database
/// and a fake push transport.
pub struct AppStateBuilder {
    config: Arc<AppConfig>,
    db: Option<DbClient>,
    transport: Option<Arc<dyn PushTransport>>,
}

impl AppStateBuilder {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            db: None,
            transport: None,
        }
    }

    pub fn with_db(mut self, db: DbClient) -> Self {
        self.db = Some(db);
        self
    }

    /// Replace the Web Push client. Only used when push is enabled.
    pub fn with_push_transport(mut self, transport: Arc<dyn PushTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub async fn build(self) -> Result<AppState, CritterError> {
        let config = self.config;

        let db = match self.db {
            Some(db) => db,
            None => DbClient::from_app_config(&config).await?,
        };

        let tasks_repo = SqlTaskRepository::new(db.clone());
        tasks_repo.init_schema().await?;
        let subscriptions = SqlPushSubscriptionRepository::new(db.clone());
        subscriptions.init_schema().await?;

        let auth = config
            .auth
            .as_ref()
            .ok_or_else(|| config_error("missing [auth] configuration"))?;
        let verifier = Arc::new(JwtVerifier::new(&auth.jwt_secret));
        let policy: Arc<dyn AccessPolicy> = Arc::new(ConfigAccessPolicy::from_config(auth));

        let mut sender = None;
        let mut dispatcher = None;
        let mut notification_worker = None;
        let mut vapid_public_key = None;

        if let Some(push_config) = config.push_enabled() {
            let transport = match self.transport {
                Some(transport) => transport,
                None => {
                    let client = WebPushClient::from_config(push_config)?;
                    vapid_public_key = Some(client.public_key().to_string());
                    Arc::new(client) as Arc<dyn PushTransport>
                }
            };
            if vapid_public_key.is_none() {
                vapid_public_key = Some(push_config.vapid_public_key.clone());
            }

            let push_sender = NotificationSender::new(
                transport,
                subscriptions.clone(),
                Duration::from_secs(push_config.request_timeout_secs),
            );
            let (queue, worker) =
                NotificationDispatcher::spawn(push_sender.clone(), push_config.queue_depth);

            info!(
                queue_depth = push_config.queue_depth,
                "Push notifications enabled"
            );
            sender = Some(push_sender);
            dispatcher = Some(queue);
            notification_worker = Some(worker);
        } else {
            info!("Push notifications disabled; task resets will not notify");
        }

        let tasks = Arc::new(TaskState {
            tasks: tasks_repo,
            dispatcher,
            policy,
            verifier: verifier.clone(),
        });
        let push = Arc::new(PushState {
            sender,
            subscriptions,
            verifier,
            vapid_public_key,
        });

        Ok(AppState {
            config,
            db,
            tasks,
            push,
            notification_worker,
        })
    }
}
