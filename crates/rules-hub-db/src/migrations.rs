use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id               TEXT PRIMARY KEY,
                email            TEXT NOT NULL UNIQUE,
                password         TEXT,
                role             TEXT NOT NULL DEFAULT 'user',
                invite_token     TEXT UNIQUE,
                created_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                last_sign_in_at  TEXT
            );

            CREATE TABLE user_profiles (
                user_id       TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                username      TEXT NOT NULL UNIQUE,
                display_name  TEXT,
                bio           TEXT,
                website       TEXT,
                github        TEXT,
                twitter       TEXT,
                is_public     INTEGER NOT NULL DEFAULT 1,
                created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE rules (
                id            TEXT PRIMARY KEY,
                name          TEXT NOT NULL,
                description   TEXT NOT NULL DEFAULT '',
                pattern       TEXT NOT NULL,
                rule_content  TEXT NOT NULL,
                tags          TEXT NOT NULL DEFAULT '[]',
                category      TEXT,
                framework     TEXT,
                downloads     INTEGER NOT NULL DEFAULT 0,
                likes         INTEGER NOT NULL DEFAULT 0,
                created_by    TEXT REFERENCES users(id) ON DELETE SET NULL,
                created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_rules_created_by ON rules(created_by);
            CREATE INDEX idx_rules_created_at ON rules(created_at);

            CREATE TABLE rule_likes (
                rule_id     TEXT NOT NULL REFERENCES rules(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (rule_id, user_id)
            );

            CREATE TABLE rule_downloads (
                id          TEXT PRIMARY KEY,
                rule_id     TEXT NOT NULL REFERENCES rules(id) ON DELETE CASCADE,
                user_agent  TEXT,
                ip_address  TEXT,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE user_follows (
                follower_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                following_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (follower_id, following_id),
                CHECK (follower_id <> following_id)
            );

            CREATE INDEX idx_follows_following ON user_follows(following_id);

            CREATE TABLE notifications (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                type        TEXT NOT NULL,
                title       TEXT NOT NULL,
                message     TEXT NOT NULL,
                data        TEXT NOT NULL DEFAULT '{}',
                read        INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_notifications_user
                ON notifications(user_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
