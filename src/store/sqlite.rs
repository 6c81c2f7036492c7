//! SQLite backend.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::debug;

use super::tree::{self, NodeLink};
use super::user::username_taken;
use super::{FileStore, NewNode, NewUser, Node, NodeUpdate, SearchFilter, User, UserStore};
use crate::db::Database;
use crate::{CloudboxError, Result};

/// Columns of a node without its payload.
const METADATA_COLUMNS: &str =
    "id, name, path, size, mime_type, x'' AS content, parent_id, is_folder, created_at, owner_id";

/// Columns of a node including its payload.
const FULL_COLUMNS: &str =
    "id, name, path, size, mime_type, content, parent_id, is_folder, created_at, owner_id";

#[derive(Debug, sqlx::FromRow)]
struct NodeRow {
    id: i64,
    name: String,
    path: String,
    size: i64,
    mime_type: String,
    content: Vec<u8>,
    parent_id: Option<i64>,
    is_folder: bool,
    created_at: i64,
    owner_id: Option<i64>,
}

impl From<NodeRow> for Node {
    fn from(row: NodeRow) -> Self {
        Node {
            id: row.id,
            name: row.name,
            path: row.path,
            size: row.size.max(0) as u64,
            mime_type: row.mime_type,
            content: row.content,
            parent_id: row.parent_id,
            is_folder: row.is_folder,
            created_at: from_millis(row.created_at),
            owner_id: row.owner_id,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password: String,
    created_at: i64,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            password: row.password,
            created_at: from_millis(row.created_at),
        }
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Current time at the millisecond precision the table stores.
fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Store keeping metadata and payloads in one SQLite database.
///
/// Every mutation runs in a transaction, including recursive deletes.
#[derive(Debug)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    /// Open the database file at `path`, applying migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_database(Database::open(path).await?))
    }

    /// A private in-memory database.
    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self::from_database(Database::open_in_memory().await?))
    }

    pub fn from_database(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

async fn fetch_node(conn: &mut SqliteConnection, id: i64, columns: &str) -> Result<Option<Node>> {
    let sql = format!("SELECT {columns} FROM nodes WHERE id = ?");
    let row = sqlx::query_as::<_, NodeRow>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(Node::from))
}

/// `id` and all of its ancestors, following `parent_id` upwards.
async fn fetch_ancestry(conn: &mut SqliteConnection, id: i64) -> Result<HashMap<i64, NodeLink>> {
    let rows: Vec<(i64, Option<i64>, bool)> = sqlx::query_as(
        "WITH RECURSIVE chain(id, parent_id, is_folder) AS (
             SELECT id, parent_id, is_folder FROM nodes WHERE id = ?
             UNION
             SELECT n.id, n.parent_id, n.is_folder FROM nodes n JOIN chain c ON n.id = c.parent_id
         )
         SELECT id, parent_id, is_folder FROM chain",
    )
    .bind(id)
    .fetch_all(conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, parent_id, is_folder)| {
            (
                id,
                NodeLink {
                    parent_id,
                    is_folder,
                },
            )
        })
        .collect())
}

/// `(id, parent_id)` of `root` and every node beneath it.
async fn fetch_subtree(conn: &mut SqliteConnection, root: i64) -> Result<Vec<(i64, Option<i64>)>> {
    let rows = sqlx::query_as(
        "WITH RECURSIVE subtree(id) AS (
             SELECT id FROM nodes WHERE id = ?
             UNION
             SELECT n.id FROM nodes n JOIN subtree s ON n.parent_id = s.id
         )
         SELECT n.id, n.parent_id FROM nodes n JOIN subtree s ON n.id = s.id ORDER BY n.id",
    )
    .bind(root)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

impl FileStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn list(&self, parent_id: Option<i64>) -> Result<Vec<Node>> {
        let sql = format!("SELECT {METADATA_COLUMNS} FROM nodes WHERE parent_id IS ? ORDER BY id");
        let rows = sqlx::query_as::<_, NodeRow>(&sql)
            .bind(parent_id)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(Node::from).collect())
    }

    async fn get(&self, id: i64) -> Result<Node> {
        let mut conn = self.db.pool().acquire().await?;
        fetch_node(&mut conn, id, FULL_COLUMNS)
            .await?
            .ok_or_else(|| CloudboxError::NotFound(format!("file {id}")))
    }

    async fn metadata(&self, id: i64) -> Result<Node> {
        let mut conn = self.db.pool().acquire().await?;
        fetch_node(&mut conn, id, METADATA_COLUMNS)
            .await?
            .ok_or_else(|| CloudboxError::NotFound(format!("file {id}")))
    }

    async fn create(&self, new_node: NewNode) -> Result<Node> {
        new_node.validate()?;

        let mut tx = self.db.pool().begin().await?;
        if let Some(parent_id) = new_node.parent_id {
            let ancestry = fetch_ancestry(&mut tx, parent_id).await?;
            tree::ensure_parent_folder(Some(parent_id), |id| ancestry.get(&id).copied())?;
        }

        let mut node = new_node.into_node(0, now_millis());
        let result = sqlx::query(
            "INSERT INTO nodes (name, path, size, mime_type, content, parent_id, is_folder, created_at, owner_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&node.name)
        .bind(&node.path)
        .bind(node.size as i64)
        .bind(&node.mime_type)
        .bind(&node.content)
        .bind(node.parent_id)
        .bind(node.is_folder)
        .bind(node.created_at.timestamp_millis())
        .bind(node.owner_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        node.id = result.last_insert_rowid();
        debug!(id = node.id, name = %node.name, is_folder = node.is_folder, "created node");
        Ok(node)
    }

    async fn update(&self, id: i64, update: NodeUpdate) -> Result<Node> {
        let mut tx = self.db.pool().begin().await?;
        let mut node = fetch_node(&mut tx, id, METADATA_COLUMNS)
            .await?
            .ok_or_else(|| CloudboxError::NotFound(format!("file {id}")))?;

        update.validate_for(&node)?;
        if let Some(Some(new_parent)) = update.parent_id {
            let ancestry = fetch_ancestry(&mut tx, new_parent).await?;
            let link_of = |nid: i64| ancestry.get(&nid).copied();
            tree::ensure_parent_folder(Some(new_parent), link_of)?;
            tree::ensure_no_cycle(id, Some(new_parent), link_of)?;
        }

        if update.is_empty() {
            let node = fetch_node(&mut tx, id, FULL_COLUMNS).await?;
            tx.commit().await?;
            return node.ok_or_else(|| CloudboxError::NotFound(format!("file {id}")));
        }

        let set_name = update.name.is_some();
        let set_path = update.path.is_some();
        let set_mime = update.mime_type.is_some();
        let set_content = update.content.is_some();
        let set_parent = update.parent_id.is_some();
        update.apply_to(&mut node);

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE nodes SET ");
        let mut separated = query.separated(", ");
        if set_name {
            separated.push("name = ");
            separated.push_bind_unseparated(&node.name);
        }
        if set_path {
            separated.push("path = ");
            separated.push_bind_unseparated(&node.path);
        }
        if set_mime {
            separated.push("mime_type = ");
            separated.push_bind_unseparated(&node.mime_type);
        }
        if set_content {
            separated.push("content = ");
            separated.push_bind_unseparated(&node.content);
            separated.push("size = ");
            separated.push_bind_unseparated(node.size as i64);
        }
        if set_parent {
            separated.push("parent_id = ");
            separated.push_bind_unseparated(node.parent_id);
        }
        query.push(" WHERE id = ");
        query.push_bind(id);
        query.build().execute(&mut *tx).await?;

        let updated = fetch_node(&mut tx, id, FULL_COLUMNS).await?;
        tx.commit().await?;
        updated.ok_or_else(|| CloudboxError::NotFound(format!("file {id}")))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;
        let rows = fetch_subtree(&mut tx, id).await?;
        if rows.is_empty() {
            return Ok(());
        }

        let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
        for (nid, parent_id) in &rows {
            if let Some(parent) = parent_id {
                children.entry(*parent).or_default().push(*nid);
            }
        }
        let order = tree::post_order(id, |nid| children.get(&nid).cloned().unwrap_or_default());

        for nid in &order {
            sqlx::query("DELETE FROM nodes WHERE id = ?")
                .bind(nid)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!(id, removed = order.len(), "deleted subtree");
        Ok(())
    }

    async fn total_size(&self) -> Result<u64> {
        let total: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(size), 0) FROM nodes WHERE is_folder = 0")
                .fetch_one(self.db.pool())
                .await?;
        Ok(total.max(0) as u64)
    }

    async fn search(&self, filter: &SearchFilter) -> Result<Vec<Node>> {
        // Sizes are stored as INTEGER, so no row can reach a lower bound past i64::MAX.
        let min_size = match filter.min_size.map(i64::try_from) {
            Some(Err(_)) => return Ok(Vec::new()),
            Some(Ok(min)) => Some(min),
            None => None,
        };

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {METADATA_COLUMNS} FROM nodes WHERE is_folder = 0"));

        if let Some(ref prefix) = filter.mime_prefix {
            query.push(" AND instr(mime_type, ");
            query.push_bind(prefix);
            query.push(") = 1");
        }
        if let Some(min) = min_size {
            query.push(" AND size >= ");
            query.push_bind(min);
        }
        if let Some(max) = filter.max_size {
            query.push(" AND size <= ");
            query.push_bind(i64::try_from(max).unwrap_or(i64::MAX));
        }
        if let Some(start) = filter.start_date {
            query.push(" AND created_at >= ");
            query.push_bind(start.timestamp_millis());
        }
        if let Some(end) = filter.end_date {
            query.push(" AND created_at <= ");
            query.push_bind(end.timestamp_millis());
        }
        query.push(" ORDER BY id");

        let rows = query
            .build_query_as::<NodeRow>()
            .fetch_all(self.db.pool())
            .await?;

        // SQLite's LOWER() folds ASCII only, so the name test runs here.
        Ok(rows
            .into_iter()
            .map(Node::from)
            .filter(|n| filter.matches_name(&n.name))
            .collect())
    }

    async fn close(&self) -> Result<()> {
        self.db.close().await;
        debug!("sqlite store closed");
        Ok(())
    }
}

impl UserStore for SqliteStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let created_at = now_millis();
        let result = sqlx::query("INSERT INTO users (username, password, created_at) VALUES (?, ?, ?)")
            .bind(&new_user.username)
            .bind(&new_user.password)
            .bind(created_at.timestamp_millis())
            .execute(self.db.pool())
            .await;

        match result {
            Ok(done) => Ok(new_user.into_user(done.last_insert_rowid(), created_at)),
            Err(e) if is_unique_violation(&e) => Err(username_taken(&new_user.username)),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(row.map(User::from))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password, created_at FROM users WHERE username = ? COLLATE NOCASE",
        )
        .bind(username)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(row.map(User::from))
    }
}
