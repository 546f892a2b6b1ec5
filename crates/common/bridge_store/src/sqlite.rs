//! SQLite-backed [PersistenceStore] (§6 persistence contract): one row per
//! [MessageState], re-hydrated whole at startup so the in-memory
//! [bridge_core_ext::MessageStore] can be rebuilt without replaying history.
use crate::codec;
use crate::error::StoreError;
use async_trait::async_trait;
use bridge_core_ext::BridgeError;
use bridge_core_ext::NodeId;
use bridge_core_ext::PacketId;
use bridge_core_ext::PersistenceStore;
use bridge_core_ext::MessageState;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::Row;
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::debug;

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS message_states (
        packet_id INTEGER PRIMARY KEY,
        matrix_event_id TEXT,
        sender_node INTEGER NOT NULL,
        channel_index INTEGER NOT NULL,
        original_text TEXT NOT NULL,
        reception_list TEXT NOT NULL,
        is_matrix_origin INTEGER NOT NULL,
        matrix_origin_event_id TEXT,
        parent_packet_id INTEGER,
        replies TEXT NOT NULL,
        reactions TEXT NOT NULL,
        created_at TEXT NOT NULL,
        last_update_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS node_names (
        node_id INTEGER PRIMARY KEY,
        short_name TEXT NOT NULL,
        long_name TEXT NOT NULL
    )"#,
];

/// Opens (creating if absent) the SQLite database at `database_url` and
/// applies the schema. `database_url` is a sqlx connection string, e.g.
/// `sqlite://path/to/bridge.db`.
pub async fn connect(database_url: &str) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;
    for statement in SCHEMA {
        sqlx::query(statement).execute(&pool).await?;
    }
    Ok(pool)
}

pub struct SqlitePersistenceStore {
    pool: SqlitePool,
}

impl SqlitePersistenceStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqlitePersistenceStore { pool }
    }

    fn decode_row(row: sqlx::sqlite::SqliteRow) -> Result<MessageState, StoreError> {
        let packet_id = PacketId(row.try_get::<i64, _>("packet_id")? as u32);
        let reception_list: String = row.try_get("reception_list")?;
        let replies: String = row.try_get("replies")?;
        let reactions: String = row.try_get("reactions")?;
        let created_at: String = row.try_get("created_at")?;
        let last_update_at: String = row.try_get("last_update_at")?;

        Ok(MessageState {
            packet_id,
            matrix_event_id: row.try_get("matrix_event_id")?,
            sender_node: NodeId(row.try_get::<i64, _>("sender_node")? as u32),
            channel_index: row.try_get::<i64, _>("channel_index")? as u32,
            original_text: row.try_get("original_text")?,
            reception_list: codec::decode_reception_list(&reception_list)?,
            is_matrix_origin: row.try_get::<i64, _>("is_matrix_origin")? != 0,
            matrix_origin_event_id: row.try_get("matrix_origin_event_id")?,
            parent_packet_id: row
                .try_get::<Option<i64>, _>("parent_packet_id")?
                .map(|id| PacketId(id as u32)),
            replies: codec::decode_replies(&replies)?,
            reactions: codec::decode_reactions(&reactions)?,
            created_at: codec::decode_timestamp(&created_at)?,
            last_update_at: codec::decode_timestamp(&last_update_at)?,
        })
    }
}

#[async_trait]
impl PersistenceStore for SqlitePersistenceStore {
    async fn save_message_state(&self, state: &MessageState) -> Result<(), BridgeError> {
        self.save(state).await.map_err(BridgeError::from)
    }

    async fn load_all_message_states(&self) -> Result<Vec<MessageState>, BridgeError> {
        self.load_all().await.map_err(BridgeError::from)
    }

    async fn delete_message_state(&self, packet_id: PacketId) -> Result<(), BridgeError> {
        self.delete(packet_id).await.map_err(BridgeError::from)
    }
}

impl SqlitePersistenceStore {
    async fn save(&self, state: &MessageState) -> Result<(), StoreError> {
        let reception_list = codec::encode_reception_list(&state.reception_list)?;
        let replies = codec::encode_replies(&state.replies);
        let reactions = codec::encode_reactions(&state.reactions)?;

        sqlx::query(
            r#"INSERT INTO message_states (
                packet_id, matrix_event_id, sender_node, channel_index, original_text,
                reception_list, is_matrix_origin, matrix_origin_event_id, parent_packet_id,
                replies, reactions, created_at, last_update_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(packet_id) DO UPDATE SET
                matrix_event_id = excluded.matrix_event_id,
                sender_node = excluded.sender_node,
                channel_index = excluded.channel_index,
                original_text = excluded.original_text,
                reception_list = excluded.reception_list,
                is_matrix_origin = excluded.is_matrix_origin,
                matrix_origin_event_id = excluded.matrix_origin_event_id,
                parent_packet_id = excluded.parent_packet_id,
                replies = excluded.replies,
                reactions = excluded.reactions,
                last_update_at = excluded.last_update_at"#,
        )
        .bind(state.packet_id.0 as i64)
        .bind(&state.matrix_event_id)
        .bind(state.sender_node.0 as i64)
        .bind(state.channel_index as i64)
        .bind(&state.original_text)
        .bind(reception_list)
        .bind(state.is_matrix_origin as i64)
        .bind(&state.matrix_origin_event_id)
        .bind(state.parent_packet_id.map(|id| id.0 as i64))
        .bind(replies)
        .bind(reactions)
        .bind(codec::encode_timestamp(state.created_at))
        .bind(codec::encode_timestamp(state.last_update_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<MessageState>, StoreError> {
        let rows = sqlx::query("SELECT * FROM message_states").fetch_all(&self.pool).await?;
        debug!(target: "bridge_store", count = rows.len(), "rehydrating message states");
        rows.into_iter().map(Self::decode_row).collect()
    }

    async fn delete(&self, packet_id: PacketId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM message_states WHERE packet_id = ?")
            .bind(packet_id.0 as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clock::WallClock;
    use clock::Clock;

    async fn memory_store() -> SqlitePersistenceStore {
        let pool = connect("sqlite::memory:").await.unwrap();
        SqlitePersistenceStore::new(pool)
    }

    #[tokio::test]
    async fn save_then_load_round_trips_a_message_state() {
        let store = memory_store().await;
        let now = WallClock.now();
        let mut state = MessageState::new(PacketId(1), NodeId(2), 0, "hello".to_string(), now);
        state.matrix_event_id = Some("$abc:example.org".to_string());

        store.save_message_state(&state).await.unwrap();
        let loaded = store.load_all_message_states().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].packet_id, PacketId(1));
        assert_eq!(loaded[0].matrix_event_id.as_deref(), Some("$abc:example.org"));
    }

    #[tokio::test]
    async fn save_twice_upserts_rather_than_duplicating() {
        let store = memory_store().await;
        let now = WallClock.now();
        let mut state = MessageState::new(PacketId(1), NodeId(2), 0, "hello".to_string(), now);
        store.save_message_state(&state).await.unwrap();
        state.original_text = "hello again".to_string();
        store.save_message_state(&state).await.unwrap();

        let loaded = store.load_all_message_states().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].original_text, "hello again");
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let store = memory_store().await;
        let now = WallClock.now();
        let state = MessageState::new(PacketId(1), NodeId(2), 0, "hello".to_string(), now);
        store.save_message_state(&state).await.unwrap();
        store.delete_message_state(PacketId(1)).await.unwrap();
        let loaded = store.load_all_message_states().await.unwrap();
        assert!(loaded.is_empty());
    }
}
