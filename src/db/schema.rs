//! Database schema and migrations for the SQLite backend.

/// Database migrations.
///
/// Each entry is applied once, in order, and recorded in `schema_version`.
/// Timestamps are stored as milliseconds since the Unix epoch.
pub const MIGRATIONS: &[&str] = &[
    // v1: accounts
    r#"
CREATE TABLE users (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    username    TEXT NOT NULL,
    password    TEXT NOT NULL,           -- Argon2id PHC string
    created_at  INTEGER NOT NULL
);

CREATE UNIQUE INDEX idx_users_username_nocase ON users(username COLLATE NOCASE);
"#,
    // v2: the file/folder tree
    r#"
CREATE TABLE nodes (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    path        TEXT NOT NULL,
    size        INTEGER NOT NULL DEFAULT 0,
    mime_type   TEXT NOT NULL,
    content     BLOB NOT NULL DEFAULT x'',
    parent_id   INTEGER REFERENCES nodes(id),   -- NULL = root
    is_folder   INTEGER NOT NULL DEFAULT 0,
    created_at  INTEGER NOT NULL,
    owner_id    INTEGER
);

CREATE INDEX idx_nodes_parent_id ON nodes(parent_id);
CREATE INDEX idx_nodes_created_at ON nodes(created_at);
"#,
];
