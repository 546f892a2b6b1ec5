//! Builds and spawns the bridge's actors on a [Runtime] (§5): the
//! coordinator, the Matrix sync loop, the mesh ingest loop, and the
//! lifecycle sweep's ticker, each wired to the collaborators resolved from
//! [crate::config::BridgeConfig].
use crate::config::BridgeConfig;
use crate::config::SWEEP_INTERVAL;
use bridge_actors::signal_channel;
use bridge_actors::CombinedReceiver;
use bridge_actors::NullSender;
use bridge_actors::Runtime;
use bridge_core_ext::BridgeActor;
use bridge_core_ext::BridgeInput;
use bridge_core_ext::MeshSink;
use bridge_core_ext::PersistenceStore;
use bridge_core_ext::Tick;
use clock::WallClock;
use matrix_ext::MatrixCollaborator;
use matrix_ext::MatrixSyncActor;
use mesh_ext::LanRadio;
use mesh_ext::MeshIngestActor;
use mesh_ext::MeshError;
use mesh_ext::MqttGateway;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::info;
use tracing::warn;

pub async fn start(config: BridgeConfig) -> anyhow::Result<Runtime> {
    let pool = bridge_store::connect(&format!("sqlite://{}", config.node_db_path)).await?;
    let persistence = Arc::new(bridge_store::SqlitePersistenceStore::new(pool.clone()));
    let names = Arc::new(bridge_store::SqliteNameDirectory::load(pool).await?);
    let rehydrated = persistence.load_all_message_states().await?;
    info!(target: "bridge_mapper", count = rehydrated.len(), "rehydrated message states");

    let room_id = matrix_sdk::ruma::OwnedRoomId::try_from(config.matrix.room_id.as_str())
        .map_err(|error| anyhow::anyhow!("invalid MATRIX_ROOM: {error}"))?;
    let matrix = Arc::new(
        MatrixCollaborator::login(&config.matrix.homeserver, config.matrix.credentials, room_id).await?,
    );
    let own_user_id = matrix
        .own_user_id()
        .ok_or_else(|| anyhow::anyhow!("matrix login succeeded but the client has no user id"))?;

    let (observation_tx, observation_rx) = tokio::sync::mpsc::unbounded_channel();
    let clock = Arc::new(WallClock);

    let mut receive_loops: Vec<Pin<Box<dyn Future<Output = Result<(), MeshError>> + Send>>> = Vec::new();
    let mut mesh_sink: Option<Arc<dyn MeshSink>> = None;

    if let Some(lan_config) = config.lan {
        let (lan, receive_loop) = LanRadio::connect(lan_config, clock.clone(), observation_tx.clone()).await?;
        mesh_sink = Some(Arc::new(lan));
        receive_loops.push(Box::pin(receive_loop));
    }

    if let Some(mqtt_config) = config.mqtt {
        let (mqtt, receive_loop) = MqttGateway::connect(mqtt_config, clock.clone(), observation_tx.clone());
        crate::health::spawn_heartbeat(mqtt.client(), clock.clone());
        if mesh_sink.is_none() {
            mesh_sink = Some(Arc::new(mqtt));
        } else {
            warn!(target: "bridge_mapper", "both MQTT and a local radio are configured; outbound sends use the local radio");
        }
        receive_loops.push(Box::pin(receive_loop));
    }
    drop(observation_tx);

    let mesh_sink = mesh_sink.expect("BridgeConfig::from_env already validated a mesh transport is present");

    let mut runtime = Runtime::new();

    let (bridge_input_tx, bridge_input_rx) = tokio::sync::mpsc::channel(64);
    let (bridge_signal_tx, bridge_signal_rx) = signal_channel();
    let bridge_messages = bridge_actors::SimpleMessageBox::new(
        "bridge",
        CombinedReceiver::new(bridge_input_rx, bridge_signal_rx),
        Box::new(NullSender),
    );
    let bridge_actor = BridgeActor::new(
        bridge_messages,
        config.core,
        rehydrated,
        mesh_sink,
        matrix.clone(),
        names,
        persistence,
        clock,
    );
    runtime.spawn(bridge_actor, Box::new(bridge_signal_tx));

    let (matrix_signal_tx, matrix_signal_rx) = signal_channel();
    let (_matrix_input_tx, matrix_input_rx) = tokio::sync::mpsc::channel(1);
    let matrix_messages = CombinedReceiver::new(matrix_input_rx, matrix_signal_rx);
    let matrix_actor = MatrixSyncActor::new(
        "matrix-sync",
        matrix_messages,
        Box::new(NullSender),
        matrix,
        Box::new(bridge_input_tx.clone()),
        own_user_id,
    );
    runtime.spawn(matrix_actor, Box::new(matrix_signal_tx));

    let (mesh_signal_tx, mesh_signal_rx) = signal_channel();
    let (_mesh_input_tx, mesh_input_rx) = tokio::sync::mpsc::channel(1);
    let mesh_messages = CombinedReceiver::new(mesh_input_rx, mesh_signal_rx);
    let mesh_actor = MeshIngestActor::new(
        "mesh-ingest",
        mesh_messages,
        Box::new(NullSender),
        observation_rx,
        Box::new(bridge_input_tx.clone()),
        receive_loops,
    );
    runtime.spawn(mesh_actor, Box::new(mesh_signal_tx));

    spawn_ticker(bridge_input_tx);

    Ok(runtime)
}

/// Sends a [Tick] on [SWEEP_INTERVAL] so the bridge coordinator runs its
/// eviction sweep (§4.6). Not itself an actor: it has nothing to receive,
/// so a bare spawned task is simpler than a message box with an empty
/// input type.
fn spawn_ticker(bridge_input: tokio::sync::mpsc::Sender<BridgeInput>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            if bridge_input.send(Tick.into()).await.is_err() {
                return;
            }
        }
    });
}
