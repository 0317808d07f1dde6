//! Database schema definitions

use rusqlite::Connection;
use tracing::info;

use crate::accessor::AccessorError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), AccessorError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!(target: "accessor", version = SCHEMA_VERSION, "schema_created");
        conn.execute_batch(ENDORSEMENT_SCHEMA)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version > SCHEMA_VERSION {
        return Err(AccessorError::Corrupt(format!(
            "database schema v{current_version} is newer than supported v{SCHEMA_VERSION}"
        )));
    } else {
        info!(target: "accessor", version = current_version, "schema_up_to_date");
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32, AccessorError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;

    let version: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), AccessorError> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
    Ok(())
}

const ENDORSEMENT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL,
    veto_status TEXT NOT NULL DEFAULT 'ok'
        CHECK (veto_status IN ('ok', 'no-endorse', 'no-upload', 'no-replace')),
    flag_proxy INTEGER NOT NULL DEFAULT 0,
    flag_suspect INTEGER NOT NULL DEFAULT 0,
    is_admin INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS endorsement_domains (
    name TEXT PRIMARY KEY,
    endorse_all TEXT NOT NULL DEFAULT 'n',
    mods_endorse_all TEXT NOT NULL DEFAULT 'n',
    endorse_email TEXT NOT NULL DEFAULT 'y',
    papers_to_endorse INTEGER NOT NULL DEFAULT 4
);

CREATE TABLE IF NOT EXISTS categories (
    archive TEXT NOT NULL,
    subject_class TEXT NOT NULL DEFAULT '',
    definitive INTEGER NOT NULL DEFAULT 0,
    category_name TEXT NOT NULL DEFAULT '',
    endorsement_domain TEXT REFERENCES endorsement_domains(name),
    PRIMARY KEY (archive, subject_class)
);

CREATE TABLE IF NOT EXISTS questionable_categories (
    archive TEXT NOT NULL,
    subject_class TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (archive, subject_class)
);

-- subject_class '' registers an archive-wide moderator
CREATE TABLE IF NOT EXISTS moderators (
    user_id INTEGER NOT NULL REFERENCES users(id),
    archive TEXT NOT NULL,
    subject_class TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (user_id, archive, subject_class)
);

CREATE TABLE IF NOT EXISTS papers (
    document_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL REFERENCES users(id),
    domain TEXT NOT NULL,
    title TEXT NOT NULL,
    dated INTEGER NOT NULL,
    flag_author INTEGER NOT NULL DEFAULT 0,
    valid INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (document_id, user_id)
);
CREATE INDEX IF NOT EXISTS idx_papers_owner ON papers(user_id, domain);

CREATE TABLE IF NOT EXISTS email_patterns (
    pattern TEXT NOT NULL,
    list TEXT NOT NULL CHECK (list IN ('black', 'white')),
    PRIMARY KEY (pattern, list)
);

CREATE TABLE IF NOT EXISTS endorsement_requests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    endorsee_id INTEGER NOT NULL REFERENCES users(id),
    archive TEXT NOT NULL,
    subject_class TEXT NOT NULL DEFAULT '',
    secret TEXT NOT NULL,
    point_value INTEGER NOT NULL DEFAULT 0,
    flag_valid INTEGER NOT NULL DEFAULT 1,
    issued_when INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS endorsements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    endorser_id INTEGER REFERENCES users(id),
    endorsee_id INTEGER NOT NULL REFERENCES users(id),
    archive TEXT NOT NULL,
    subject_class TEXT NOT NULL DEFAULT '',
    flag_valid INTEGER NOT NULL DEFAULT 1,
    type TEXT NOT NULL CHECK (type IN ('user', 'admin', 'auto')),
    point_value INTEGER NOT NULL DEFAULT 0,
    issued_when INTEGER NOT NULL,
    request_id INTEGER REFERENCES endorsement_requests(id)
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_endorsements_auto
    ON endorsements(endorsee_id, archive, subject_class) WHERE endorser_id IS NULL;
CREATE UNIQUE INDEX IF NOT EXISTS idx_endorsements_user
    ON endorsements(endorser_id, endorsee_id, archive, subject_class) WHERE endorser_id IS NOT NULL;

CREATE TABLE IF NOT EXISTS audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    action TEXT NOT NULL,
    user_id INTEGER,
    affected_user INTEGER NOT NULL,
    data TEXT NOT NULL DEFAULT '',
    comment TEXT NOT NULL DEFAULT '',
    session_id INTEGER,
    remote_addr TEXT NOT NULL DEFAULT '',
    remote_host TEXT NOT NULL DEFAULT '',
    tracking_cookie TEXT NOT NULL DEFAULT '',
    issued_when INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS admin_audit (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    action TEXT NOT NULL,
    user_id INTEGER,
    affected_user INTEGER NOT NULL,
    data TEXT NOT NULL DEFAULT '',
    comment TEXT NOT NULL DEFAULT '',
    session_id INTEGER,
    remote_addr TEXT NOT NULL DEFAULT '',
    remote_host TEXT NOT NULL DEFAULT '',
    tracking_cookie TEXT NOT NULL DEFAULT '',
    issued_when INTEGER NOT NULL
);
"#;
