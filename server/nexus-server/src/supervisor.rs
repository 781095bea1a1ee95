//! Builds `ServerState`/`ListenerState` from a loaded [`Config`], binds one
//! socket per enabled system, and spawns every listener and sweeper task
//! under a shared [`CancellationToken`] (§5).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use sqlx::postgres::PgPoolOptions;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use nexus_core::acl::AclSet;
use nexus_core::bridge::{BridgeTimerRegistry, Rule, RuleSet};
use nexus_core::config::Config;
use nexus_core::dynamic_bridge::DynamicBridgeTable;
use nexus_core::events::EventHub;
use nexus_core::ids::SystemName;
use nexus_core::persist::{InMemoryTransmissionStore, SqlxTransmissionStore, TransmissionStore};
use nexus_core::publisher::{EventPublisher, LoggingPublisher, NoopPublisher};
use nexus_core::radioid::NoopRadioIdLookup;
use nexus_core::registry::{NoopHooks, PeerRegistry, RegistryHooks};
use nexus_core::stream_tracker::StreamTracker;
use nexus_core::transmission::TransmissionLogger;
use nexus_metrics::{
    MetricsConfig, MetricsServer, PrometheusAclMetrics, PrometheusPeerMetrics, PrometheusRouterMetrics,
    PrometheusTransmissionMetrics,
};

use crate::state::{ListenerState, ServerState};
use crate::{listener, sweepers};

/// Everything the supervisor spawned, so `main` can wait on it and shut down
/// cleanly.
pub struct Supervisor {
    pub state: Arc<ServerState>,
    tasks: Vec<JoinHandle<()>>,
    token: CancellationToken,
}

impl Supervisor {
    /// A clone of the shutdown token, so a caller can trigger shutdown (e.g.
    /// on `ctrl_c`) while concurrently awaiting [`Supervisor::run_until_shutdown`].
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Builds server state from `config`, binds every enabled system's
    /// socket, and spawns the listener and sweeper tasks. Does not block.
    pub async fn start(config: &Config, database_url: Option<&str>) -> Result<Self> {
        let token = CancellationToken::new();

        let transmission_store: Arc<dyn TransmissionStore> = match database_url {
            Some(url) => {
                let pool = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connecting to transmission database")?;
                let store = SqlxTransmissionStore::new(pool);
                store.run_migrations().await.context("running transmission store migrations")?;
                info!("using postgres transmission store");
                Arc::new(store)
            }
            None => {
                warn!("no --database-url provided, transmission records are in-memory only");
                Arc::new(InMemoryTransmissionStore::new())
            }
        };

        let namespace = "dmr_nexus";
        let (router_metrics, peer_metrics, transmission_metrics, acl_metrics): (
            Arc<dyn nexus_core::metrics_hooks::RouterMetrics>,
            Arc<dyn nexus_core::metrics_hooks::PeerMetrics>,
            Arc<dyn nexus_core::metrics_hooks::TransmissionMetrics>,
            Arc<dyn nexus_core::metrics_hooks::AclMetrics>,
        ) = if config.metrics.enabled {
            (
                Arc::new(PrometheusRouterMetrics::new(namespace)),
                Arc::new(PrometheusPeerMetrics::new(namespace)),
                Arc::new(PrometheusTransmissionMetrics::new(namespace)),
                Arc::new(PrometheusAclMetrics::new(namespace)),
            )
        } else {
            (
                Arc::new(nexus_core::metrics_hooks::NoopRouterMetrics),
                Arc::new(nexus_core::metrics_hooks::NoopPeerMetrics),
                Arc::new(nexus_core::metrics_hooks::NoopTransmissionMetrics),
                Arc::new(nexus_core::metrics_hooks::NoopAclMetrics),
            )
        };

        if config.metrics.enabled && config.metrics.prometheus.enabled {
            let metrics_cfg = MetricsConfig {
                listen: format!("0.0.0.0:{}", config.metrics.prometheus.port),
                path: config.metrics.prometheus.path.clone(),
                namespace: "dmr_nexus",
            };
            let server = MetricsServer::install(metrics_cfg).context("installing prometheus recorder")?;
            tokio::spawn(async move {
                if let Err(e) = server.serve().await {
                    warn!(error = %e, "metrics server exited");
                }
            });
        }

        let publisher: Arc<dyn EventPublisher> = if config.mqtt.enabled {
            Arc::new(LoggingPublisher::new(config.mqtt.topic_prefix.clone()))
        } else {
            Arc::new(NoopPublisher)
        };

        let events = Arc::new(EventHub::new());
        let hooks: Arc<dyn RegistryHooks> =
            Arc::new(nexus_core::events::HookChain::new(vec![events.clone() as Arc<dyn RegistryHooks>, Arc::new(NoopHooks)]));

        let rule_sets: Vec<RuleSet> = config
            .bridges
            .iter()
            .map(|(name, rules)| {
                let rules: Vec<Rule> = rules.iter().map(Rule::from).collect();
                RuleSet::new(name.clone(), rules)
            })
            .collect();

        let mut listener_sockets = HashMap::new();
        let mut listeners = Vec::new();

        for (name, system_cfg) in &config.systems {
            if !system_cfg.enabled {
                info!(system = %name, "system disabled, skipping");
                continue;
            }
            let addr: SocketAddr = format!("{}:{}", system_cfg.ip, system_cfg.port)
                .parse()
                .with_context(|| format!("invalid bind address for system `{name}`"))?;
            let socket = Arc::new(UdpSocket::bind(addr).await.with_context(|| format!("binding system `{name}` to {addr}"))?);
            let acl = AclSet::from_config(&system_cfg.acl_config()).with_context(|| format!("system `{name}` ACL"))?;

            let system_name = SystemName::new(name);
            listener_sockets.insert(system_name.clone(), socket.clone());
            listeners.push(Arc::new(ListenerState {
                name: system_name,
                passphrase: system_cfg.passphrase.clone(),
                repeat: system_cfg.repeat,
                acl,
                socket,
            }));
        }

        if listeners.is_empty() {
            anyhow::bail!("no enabled systems to listen on");
        }

        let state = Arc::new(ServerState {
            registry: PeerRegistry::new(),
            tracker: Mutex::new(StreamTracker::new()),
            rule_sets: RwLock::new(rule_sets),
            bridge_timers: Mutex::new(BridgeTimerRegistry::new()),
            dynamic_bridges: Mutex::new(DynamicBridgeTable::new()),
            transmission_logger: Mutex::new(TransmissionLogger::new()),
            transmission_store,
            radioid: Arc::new(NoopRadioIdLookup),
            publisher,
            hooks,
            events,
            router_metrics,
            peer_metrics,
            transmission_metrics,
            acl_metrics,
            peer_system: RwLock::new(HashMap::new()),
            listener_sockets: RwLock::new(listener_sockets),
            ping_time_s: config.global.ping_time_s,
            max_missed: config.global.max_missed,
        });

        let mut tasks = Vec::new();
        for listener in listeners {
            let state = state.clone();
            let token = token.clone();
            tasks.push(tokio::spawn(async move { listener::run(state, listener, token).await }));
        }

        tasks.push(tokio::spawn(sweepers::keepalive_sweeper(state.clone(), token.clone())));
        tasks.push(tokio::spawn(sweepers::stream_sweeper(state.clone(), token.clone())));
        tasks.push(tokio::spawn(sweepers::transmission_sweeper(state.clone(), token.clone())));
        tasks.push(tokio::spawn(sweepers::dynamic_bridge_sweeper(state.clone(), token.clone())));
        tasks.push(tokio::spawn(sweepers::bridge_timer_sweeper(state.clone(), token.clone())));

        Ok(Supervisor { state, tasks, token })
    }

    /// Runs until `token` is cancelled (via [`Supervisor::shutdown`]) or any
    /// spawned listener/sweeper task exits early — a panic or an
    /// unreachable `JoinError` counts as a fatal runtime failure. Returns
    /// `Ok(())` for a clean, requested shutdown and `Err` otherwise so
    /// `main` can map it to exit code 2.
    pub async fn run_until_shutdown(mut self) -> Result<()> {
        let outcome = {
            let mut tasks: tokio::task::JoinSet<Result<()>> = tokio::task::JoinSet::new();
            for task in self.tasks.drain(..) {
                tasks.spawn(async move {
                    task.await.map_err(|e| anyhow::anyhow!("task failed: {e}"))
                });
            }

            tokio::select! {
                _ = self.token.cancelled() => {
                    while tasks.join_next().await.is_some() {}
                    Ok(())
                }
                Some(result) = tasks.join_next() => {
                    tasks.shutdown().await;
                    match result {
                        Ok(Ok(())) => Err(anyhow::anyhow!("a server task exited unexpectedly")),
                        Ok(Err(e)) => Err(e),
                        Err(e) => Err(anyhow::anyhow!("task join failed: {e}")),
                    }
                }
            }
        };

        self.flush().await;
        outcome
    }

    /// Flushes any in-flight transmissions still held by the logger.
    async fn flush(&self) {
        for tx in self.state.transmission_logger.lock().flush_all() {
            if let Err(e) = self.state.transmission_store.create(&tx).await {
                warn!(error = %e, "failed to persist transmission during shutdown flush");
            }
        }
    }
}
