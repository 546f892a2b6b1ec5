//! NODEINFO-derived name directory (§6, out of scope per §1: no discovery,
//! just recording what NODEINFO broadcasts say). [NameDirectory] is a plain
//! synchronous trait — rendering happens inline while a `MessageState` is
//! held — so lookups hit an in-memory cache and writes persist in the
//! background rather than blocking the caller on a database round trip.
use bridge_core_ext::NameDirectory;
use bridge_core_ext::NodeId;
use sqlx::Row;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::warn;

#[derive(Debug, Clone)]
struct NodeNames {
    short_name: String,
    long_name: String,
}

pub struct SqliteNameDirectory {
    pool: SqlitePool,
    cache: RwLock<HashMap<NodeId, NodeNames>>,
}

impl SqliteNameDirectory {
    /// Loads the current contents of the `node_names` table into memory.
    pub async fn load(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        let rows = sqlx::query("SELECT node_id, short_name, long_name FROM node_names")
            .fetch_all(&pool)
            .await?;
        let mut cache = HashMap::with_capacity(rows.len());
        for row in rows {
            let node_id: i64 = row.try_get("node_id")?;
            cache.insert(
                NodeId(node_id as u32),
                NodeNames {
                    short_name: row.try_get("short_name")?,
                    long_name: row.try_get("long_name")?,
                },
            );
        }
        Ok(SqliteNameDirectory {
            pool,
            cache: RwLock::new(cache),
        })
    }
}

impl NameDirectory for SqliteNameDirectory {
    fn node_display_name(&self, node: NodeId) -> Option<String> {
        let cache = self.cache.read().expect("name directory cache poisoned");
        cache.get(&node).map(|names| {
            if names.long_name.is_empty() {
                names.short_name.clone()
            } else {
                names.long_name.clone()
            }
        })
    }

    fn record_node_info(&self, node: NodeId, short_name: &str, long_name: &str) {
        let names = NodeNames {
            short_name: short_name.to_string(),
            long_name: long_name.to_string(),
        };
        {
            let mut cache = self.cache.write().expect("name directory cache poisoned");
            cache.insert(node, names.clone());
        }

        let pool = self.pool.clone();
        tokio::spawn(async move {
            let result = sqlx::query(
                r#"INSERT INTO node_names (node_id, short_name, long_name) VALUES (?, ?, ?)
                ON CONFLICT(node_id) DO UPDATE SET short_name = excluded.short_name, long_name = excluded.long_name"#,
            )
            .bind(node.0 as i64)
            .bind(&names.short_name)
            .bind(&names.long_name)
            .execute(&pool)
            .await;
            if let Err(error) = result {
                warn!(target: "bridge_store", %error, %node, "failed to persist node info");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::connect;

    #[tokio::test]
    async fn unknown_node_has_no_display_name() {
        let pool = connect("sqlite::memory:").await.unwrap();
        let directory = SqliteNameDirectory::load(pool).await.unwrap();
        assert_eq!(directory.node_display_name(NodeId(1)), None);
    }

    #[tokio::test]
    async fn recorded_node_info_prefers_long_name() {
        let pool = connect("sqlite::memory:").await.unwrap();
        let directory = SqliteNameDirectory::load(pool).await.unwrap();
        directory.record_node_info(NodeId(1), "AB", "Able Baker");
        assert_eq!(directory.node_display_name(NodeId(1)), Some("Able Baker".to_string()));
    }

    #[tokio::test]
    async fn falls_back_to_short_name_when_long_name_is_blank() {
        let pool = connect("sqlite::memory:").await.unwrap();
        let directory = SqliteNameDirectory::load(pool).await.unwrap();
        directory.record_node_info(NodeId(1), "AB", "");
        assert_eq!(directory.node_display_name(NodeId(1)), Some("AB".to_string()));
    }

    #[tokio::test]
    async fn record_persists_across_a_fresh_load_from_the_same_pool() {
        let pool = connect("sqlite::memory:").await.unwrap();
        let directory = SqliteNameDirectory::load(pool.clone()).await.unwrap();
        directory.record_node_info(NodeId(7), "XY", "Xray Yankee");

        // The write is backgrounded; give the spawned task a tick to land
        // before reloading from the same pool.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let reloaded = SqliteNameDirectory::load(pool).await.unwrap();
        assert_eq!(reloaded.node_display_name(NodeId(7)), Some("Xray Yankee".to_string()));
    }
}
