use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use tokio::sync::{broadcast, Mutex, RwLock};

use backplane_core::connection::{
    BackplaneConnection, ConnectionError, ConnectionEvent, MessageHandler, Result,
};
use backplane_core::options::{ConnectionOptions, DEFAULT_CONNECT_TIMEOUT};
use backplane_core::script::ScriptReply;

use super::super::gate::CommandGate;
use super::super::monitor::LinkMonitor;
use super::error::{map_redis_error, map_script_error, map_subscribe_error, server_message};
use super::reply::to_script_reply;
use super::subscription::Subscription;
use crate::config::ConnectionSettings;

/// Redis backplane connection.
///
/// Until [`connect`](BackplaneConnection::connect) succeeds, and again after
/// [`close`](BackplaneConnection::close), every operation except `close`
/// fails with `ConnectionError::NotStarted`.
pub struct RedisConnection {
    settings: ConnectionSettings,
    session: RwLock<Option<Arc<Session>>>,
    events: broadcast::Sender<ConnectionEvent>,
    monitor: Arc<LinkMonitor>,
}

/// Live state between a connect and a close.
struct Session {
    client: redis::Client,
    options: ConnectionOptions,
    /// Command connections keyed by logical database.
    commands: Mutex<HashMap<u32, ConnectionManager>>,
    subscriptions: Mutex<HashMap<String, Subscription>>,
    gate: CommandGate,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.gate.abort();
        for (_, subscription) in self.subscriptions.get_mut().drain() {
            subscription.abort();
        }
    }
}

impl RedisConnection {
    pub fn new(settings: ConnectionSettings) -> Self {
        let (events, _) = broadcast::channel(settings.event_capacity.max(1));
        let monitor = Arc::new(LinkMonitor::new(events.clone()));
        Self {
            settings,
            session: RwLock::new(None),
            events,
            monitor,
        }
    }

    /// Returns true while a session is open.
    pub async fn is_connected(&self) -> bool {
        self.session.read().await.is_some()
    }

    async fn current(&self) -> Result<Arc<Session>> {
        self.session
            .read()
            .await
            .clone()
            .ok_or(ConnectionError::NotStarted)
    }

    /// Opens the command connection for the default database, retrying as
    /// configured by `connectRetry`. Each attempt is bounded by `connectTimeout`.
    async fn open_manager(
        &self,
        client: &redis::Client,
        options: &ConnectionOptions,
    ) -> Result<ConnectionManager> {
        let attempts = options.connect_retry.saturating_add(1);
        let timeout = connect_timeout(options);
        let mut last_error = ConnectionError::ConnectionFailed("no attempt made".to_string());

        for attempt in 1..=attempts {
            let result = match open_once(client.clone(), timeout).await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(_) => Err(timed_out(timeout)),
            };

            match result {
                Ok(manager) => return Ok(manager),
                Err(reason) => {
                    tracing::warn!(attempt, attempts, error = %reason, "Redis connect attempt failed");
                    last_error = ConnectionError::ConnectionFailed(reason);
                }
            }
        }

        Err(last_error)
    }

    /// Returns the command connection for `database`, opening it on first use.
    async fn command_connection(
        &self,
        session: &Session,
        database: u32,
    ) -> Result<ConnectionManager> {
        if let Some(conn) = session.commands.lock().await.get(&database) {
            return Ok(conn.clone());
        }

        let mut info = session.client.get_connection_info().clone();
        info.redis.db = i64::from(database);
        let client = redis::Client::open(info).map_err(map_redis_error)?;

        let timeout = connect_timeout(&session.options);
        let conn = match open_once(client, timeout).await {
            Ok(result) => result.map_err(|e| self.observe_error(e, map_redis_error))?,
            Err(_) => {
                let err = ConnectionError::ConnectionFailed(timed_out(timeout));
                self.monitor.report_failure(err.clone());
                return Err(err);
            }
        };

        tracing::debug!(database, "Opened command connection");
        let mut commands = session.commands.lock().await;
        Ok(commands.entry(database).or_insert(conn).clone())
    }

    /// Reports `err` to the link monitor and maps it.
    fn observe_error(
        &self,
        err: redis::RedisError,
        map: fn(redis::RedisError) -> ConnectionError,
    ) -> ConnectionError {
        if let Some(message) = server_message(&err) {
            self.monitor.report_error_message(message);
        }

        let mapped = map(err);
        if mapped.is_connection_level() {
            self.monitor.report_failure(mapped.clone());
        }
        mapped
    }
}

/// Makes one connect attempt. The manager's own initial retries are turned off
/// so `connectRetry` is the only retry loop.
async fn open_once(
    client: redis::Client,
    timeout: Duration,
) -> std::result::Result<redis::RedisResult<ConnectionManager>, tokio::time::error::Elapsed> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(0)
        .set_connection_timeout(timeout);
    tokio::time::timeout(timeout, ConnectionManager::new_with_config(client, config)).await
}

fn connect_timeout(options: &ConnectionOptions) -> Duration {
    options.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT)
}

fn timed_out(timeout: Duration) -> String {
    format!("connect timed out after {}ms", timeout.as_millis())
}

impl Default for RedisConnection {
    fn default() -> Self {
        Self::new(ConnectionSettings::default())
    }
}

#[async_trait]
impl BackplaneConnection for RedisConnection {
    async fn connect(&self, connection_string: &str) -> Result<()> {
        let options = ConnectionOptions::parse(connection_string)?;
        for key in &options.ignored {
            tracing::debug!(option = %key, "Ignoring unsupported connection option");
        }

        let client = redis::Client::open(options.to_redis_url())
            .map_err(|e| ConnectionError::ConnectionFailed(e.to_string()))?;
        let mut manager = self.open_manager(&client, &options).await?;

        if let Some(name) = &options.client_name {
            let _: () = redis::cmd("CLIENT")
                .arg("SETNAME")
                .arg(name)
                .query_async(&mut manager)
                .await
                .map_err(map_redis_error)?;
        }

        let mut commands = HashMap::new();
        commands.insert(options.default_database, manager);

        tracing::info!(
            endpoint = ?options.endpoints.first(),
            database = options.default_database,
            "Connected to redis"
        );

        let session = Arc::new(Session {
            client,
            options,
            commands: Mutex::new(commands),
            subscriptions: Mutex::new(HashMap::new()),
            gate: CommandGate::new(),
        });

        // Replacing a live session drops it, which aborts its subscriptions.
        let previous = self.session.write().await.replace(session);
        if previous.is_some() {
            tracing::debug!("Replaced existing redis session");
        }
        self.monitor.report_success();

        Ok(())
    }

    async fn subscribe(&self, channel_key: &str, on_message: MessageHandler) -> Result<()> {
        let session = self.current().await?;

        let mut pubsub = session
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| self.observe_error(e, map_subscribe_error))?;

        pubsub
            .subscribe(channel_key)
            .await
            .map_err(|e| self.observe_error(e, map_subscribe_error))?;

        let subscription = Subscription::spawn(
            session.client.clone(),
            channel_key.to_string(),
            on_message,
            Arc::clone(&self.monitor),
            self.settings.reconnect_delay,
            pubsub,
        );

        let replaced = session
            .subscriptions
            .lock()
            .await
            .insert(channel_key.to_string(), subscription);

        if let Some(old) = replaced {
            old.stop().await;
        }

        tracing::debug!(channel = %channel_key, "Subscribed to channel");
        Ok(())
    }

    async fn script_evaluate(
        &self,
        database: u32,
        script: &str,
        key: &str,
        argument: &[u8],
    ) -> Result<ScriptReply> {
        let session = self.current().await?;

        session
            .gate
            .run(async {
                let mut conn = self.command_connection(&session, database).await?;

                let script = redis::Script::new(script);
                let mut invocation = script.prepare_invoke();
                invocation.key(key).arg(argument);

                let value: redis::Value = invocation
                    .invoke_async(&mut conn)
                    .await
                    .map_err(|e| self.observe_error(e, map_script_error))?;

                self.monitor.report_success();
                Ok(to_script_reply(value))
            })
            .await
    }

    async fn close(&self, key: &str, allow_pending_commands_to_complete: bool) -> Result<()> {
        let Some(session) = self.session.write().await.take() else {
            return Ok(());
        };

        let subscription = session.subscriptions.lock().await.remove(key);
        if let Some(subscription) = subscription {
            subscription.stop().await;
        }

        if allow_pending_commands_to_complete {
            tracing::debug!(in_flight = session.gate.in_flight(), "Draining in-flight commands");
            session.gate.drain().await;
        } else {
            session.gate.abort();
        }

        for (_, subscription) in session.subscriptions.lock().await.drain() {
            subscription.abort();
        }
        session.commands.lock().await.clear();

        tracing::info!(
            channel = %key,
            drained = allow_pending_commands_to_complete,
            endpoint = ?session.options.endpoints.first(),
            "Closed redis connection"
        );

        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::OnceLock;

    use backplane_core::connection::STREAM_INDEX;
    use backplane_core::message::RedisMessage;
    use backplane_core::script::{publish, PUBLISH_SCRIPT};
    use tokio::sync::{mpsc, RwLockReadGuard, RwLockWriteGuard};
    use uuid::Uuid;

    /// Helper to get Redis URL from environment.
    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
    }

    /// Tests that disconnect server clients hold this exclusively.
    fn server_lock() -> &'static tokio::sync::RwLock<()> {
        static LOCK: OnceLock<tokio::sync::RwLock<()>> = OnceLock::new();
        LOCK.get_or_init(|| tokio::sync::RwLock::new(()))
    }

    /// Skip test if Redis not available.
    async fn get_test_connection() -> Option<(RwLockReadGuard<'static, ()>, RedisConnection)> {
        let shared = server_lock().read().await;
        Some((shared, open_test_connection().await?))
    }

    async fn get_exclusive_test_connection(
    ) -> Option<(RwLockWriteGuard<'static, ()>, RedisConnection)> {
        let exclusive = server_lock().write().await;
        Some((exclusive, open_test_connection().await?))
    }

    async fn open_test_connection() -> Option<RedisConnection> {
        let client = redis::Client::open(redis_url()).ok()?;
        tokio::time::timeout(
            Duration::from_secs(1),
            client.get_multiplexed_async_connection(),
        )
        .await
        .ok()?
        .ok()?;

        let connection = RedisConnection::new(ConnectionSettings {
            event_capacity: 16,
            reconnect_delay: Duration::from_millis(100),
        });
        connection.connect(&redis_url()).await.ok()?;
        Some(connection)
    }

    /// Generate a unique test key to avoid conflicts.
    fn test_key(suffix: &str) -> String {
        format!("test:backplane:{}:{}", Uuid::new_v4(), suffix)
    }

    /// Disconnects every server client of `client_type` except the caller.
    async fn kill_clients(client_type: &str) -> redis::RedisResult<i64> {
        let client = redis::Client::open(redis_url())?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("CLIENT")
            .arg("KILL")
            .arg("TYPE")
            .arg(client_type)
            .query_async(&mut conn)
            .await
    }

    async fn next_event(events: &mut broadcast::Receiver<ConnectionEvent>) -> ConnectionEvent {
        tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap()
    }

    fn channel_handler() -> (MessageHandler, mpsc::UnboundedReceiver<(usize, RedisMessage)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler: MessageHandler = Arc::new(move |index: usize, message: RedisMessage| {
            let _ = tx.send((index, message));
        });
        (handler, rx)
    }

    #[tokio::test]
    async fn test_operations_before_connect_fail() {
        let connection = RedisConnection::default();
        let (handler, _rx) = channel_handler();

        assert_eq!(
            connection.subscribe("channel", handler).await,
            Err(ConnectionError::NotStarted)
        );
        assert_eq!(
            connection
                .script_evaluate(0, PUBLISH_SCRIPT, "key", b"arg")
                .await,
            Err(ConnectionError::NotStarted)
        );
        assert!(!connection.is_connected().await);
    }

    #[tokio::test]
    async fn test_close_before_connect_is_noop() {
        let connection = RedisConnection::default();
        assert_eq!(connection.close("channel", true).await, Ok(()));
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_connection_string() {
        let connection = RedisConnection::default();
        let result = connection.connect("password=only").await;
        assert!(matches!(
            result,
            Err(ConnectionError::InvalidConnectionString(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_refused_propagates_error() {
        let connection = RedisConnection::default();
        let result = connection
            .connect("127.0.0.1:1,connectRetry=0,connectTimeout=500")
            .await;
        assert!(matches!(result, Err(ConnectionError::ConnectionFailed(_))));
        assert!(!connection.is_connected().await);
    }

    #[tokio::test]
    async fn test_connect_refused_fails_without_hidden_retries() {
        let connection = RedisConnection::default();
        let started = std::time::Instant::now();

        let result = connection.connect("127.0.0.1:1").await;

        assert!(matches!(result, Err(ConnectionError::ConnectionFailed(_))));
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "refused connect took {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn test_redis_publish_and_receive() {
        let Some((_shared, connection)) = get_test_connection().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let key = test_key("publish");
        let (handler, mut rx) = channel_handler();
        connection.subscribe(&key, handler).await.unwrap();

        let first = publish(&connection, 0, &key, b"hello").await.unwrap();
        let second = publish(&connection, 0, &key, b"world").await.unwrap();
        assert_eq!(second, first + 1);

        let timeout = Duration::from_secs(2);
        let (index, message) = tokio::time::timeout(timeout, rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(index, STREAM_INDEX);
        assert_eq!(message, RedisMessage::new(first, b"hello".to_vec()));

        let (_, message) = tokio::time::timeout(timeout, rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.id, second);

        // Clean up the sequence counter
        connection
            .script_evaluate(0, "return redis.call('DEL', KEYS[1])", &key, b"")
            .await
            .unwrap();
        connection.close(&key, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_redis_skips_undecodable_payloads() {
        let Some((_shared, connection)) = get_test_connection().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let key = test_key("garbage");
        let (handler, mut rx) = channel_handler();
        connection.subscribe(&key, handler).await.unwrap();

        connection
            .script_evaluate(0, "return redis.call('PUBLISH', KEYS[1], ARGV[1])", &key, b"garbage")
            .await
            .unwrap();
        let id = publish(&connection, 0, &key, b"ok").await.unwrap();

        let (_, message) = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.id, id);

        connection
            .script_evaluate(0, "return redis.call('DEL', KEYS[1])", &key, b"")
            .await
            .unwrap();
        connection.close(&key, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_redis_script_error_propagates() {
        let Some((_shared, connection)) = get_test_connection().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let mut events = connection.events();
        let key = test_key("script_error");
        let result = connection
            .script_evaluate(0, "return redis.call('NOSUCHCOMMAND')", &key, b"")
            .await;

        assert!(matches!(result, Err(ConnectionError::ScriptFailed(_))));
        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, ConnectionEvent::ErrorMessage(_)));

        connection.close(&key, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_redis_script_uses_requested_database() {
        let Some((_shared, connection)) = get_test_connection().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let key = test_key("database");
        let reply = connection
            .script_evaluate(1, "redis.call('SET', KEYS[1], ARGV[1]) return redis.call('GET', KEYS[1])", &key, b"v")
            .await
            .unwrap();
        assert_eq!(reply, ScriptReply::Data(b"v".to_vec()));

        let missing = connection
            .script_evaluate(0, "return redis.call('GET', KEYS[1])", &key, b"")
            .await
            .unwrap();
        assert_eq!(missing, ScriptReply::Nil);

        connection
            .script_evaluate(1, "return redis.call('DEL', KEYS[1])", &key, b"")
            .await
            .unwrap();
        connection.close(&key, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_redis_close_unsubscribes_and_resets() {
        let Some((_shared, connection)) = get_test_connection().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let key = test_key("close");
        let (handler, mut rx) = channel_handler();
        connection.subscribe(&key, handler).await.unwrap();

        connection.close(&key, false).await.unwrap();
        assert!(!connection.is_connected().await);

        // The handler was dropped with the subscription task
        let received = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
        assert!(matches!(received, Ok(None)));

        assert_eq!(
            connection.script_evaluate(0, PUBLISH_SCRIPT, &key, b"x").await,
            Err(ConnectionError::NotStarted)
        );
    }

    #[tokio::test]
    async fn test_redis_subscription_recovers_after_disconnect() {
        let Some((_exclusive, connection)) = get_exclusive_test_connection().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let key = test_key("resubscribe");
        let (handler, mut rx) = channel_handler();
        connection.subscribe(&key, handler).await.unwrap();
        let mut events = connection.events();

        assert!(kill_clients("pubsub").await.unwrap() >= 1);

        assert!(matches!(
            next_event(&mut events).await,
            ConnectionEvent::ConnectionFailed(_)
        ));
        assert!(matches!(
            next_event(&mut events).await,
            ConnectionEvent::ConnectionRestored(_)
        ));

        let id = publish(&connection, 0, &key, b"after").await.unwrap();
        let (_, message) = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message, RedisMessage::new(id, b"after".to_vec()));

        connection
            .script_evaluate(0, "return redis.call('DEL', KEYS[1])", &key, b"")
            .await
            .unwrap();
        connection.close(&key, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_redis_dropped_command_link_raises_events() {
        let Some((_exclusive, connection)) = get_exclusive_test_connection().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let key = test_key("dropped");
        let mut events = connection.events();
        connection
            .script_evaluate(0, "return 1", &key, b"")
            .await
            .unwrap();

        assert!(kill_clients("normal").await.unwrap() >= 1);
        tokio::time::sleep(Duration::from_millis(100)).await;

        let failed = connection.script_evaluate(0, "return 1", &key, b"").await;
        assert!(matches!(failed, Err(ConnectionError::ConnectionFailed(_))));
        assert!(matches!(
            next_event(&mut events).await,
            ConnectionEvent::ConnectionFailed(_)
        ));

        // The manager reconnects in the background
        let mut recovered = false;
        for _ in 0..20 {
            if connection.script_evaluate(0, "return 1", &key, b"").await.is_ok() {
                recovered = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(recovered);
        assert!(matches!(
            next_event(&mut events).await,
            ConnectionEvent::ConnectionRestored(_)
        ));

        connection.close(&key, true).await.unwrap();
    }
}
