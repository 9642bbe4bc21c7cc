pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

CREATE TABLE IF NOT EXISTS chats (
    pk_id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    id TEXT NOT NULL,
    name TEXT,
    display_name TEXT,
    unread_count INTEGER,
    unread_mention_count INTEGER,
    conversation_timestamp INTEGER,
    last_message_recv_timestamp INTEGER,
    archived INTEGER,
    pinned INTEGER,
    mute_end_time INTEGER,
    read_only INTEGER,
    marked_as_unread INTEGER,
    ephemeral_expiration INTEGER,
    tc_token BLOB,
    disappearing_mode TEXT,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    UNIQUE(session_id, id),
    FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_chats_session ON chats(session_id);

CREATE TABLE IF NOT EXISTS contacts (
    pk_id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    id TEXT NOT NULL,
    lid TEXT,
    name TEXT,
    notify TEXT,
    verified_name TEXT,
    img_url TEXT,
    status TEXT,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    UNIQUE(session_id, id),
    FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_contacts_session ON contacts(session_id);
CREATE INDEX IF NOT EXISTS idx_contacts_lid ON contacts(lid);

CREATE TABLE IF NOT EXISTS group_metadata (
    pk_id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    id TEXT NOT NULL,
    owner TEXT,
    subject TEXT,
    subject_owner TEXT,
    subject_time INTEGER,
    creation INTEGER,
    description TEXT,
    desc_owner TEXT,
    desc_id TEXT,
    is_restricted INTEGER,
    is_announce INTEGER,
    size INTEGER,
    ephemeral_duration INTEGER,
    participants TEXT,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    UNIQUE(session_id, id),
    FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_group_metadata_session ON group_metadata(session_id);

CREATE TABLE IF NOT EXISTS blocklist (
    pk_id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    id TEXT NOT NULL,
    UNIQUE(session_id, id),
    FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_blocklist_session ON blocklist(session_id);
"#;
