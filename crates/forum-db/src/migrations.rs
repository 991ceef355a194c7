use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub const LATEST_VERSION: i64 = 2;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (forum schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                email           TEXT NOT NULL UNIQUE COLLATE NOCASE,
                username        TEXT NOT NULL,
                password        TEXT NOT NULL,
                avatar_url      TEXT,
                role            TEXT NOT NULL DEFAULT 'user',
                total_points    INTEGER NOT NULL DEFAULT 0,
                level           INTEGER NOT NULL DEFAULT 1,
                last_login_date TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE admins (
                id              TEXT PRIMARY KEY,
                email           TEXT NOT NULL UNIQUE COLLATE NOCASE,
                username        TEXT,
                password_hash   TEXT NOT NULL,
                is_active       INTEGER NOT NULL DEFAULT 1,
                last_login_at   TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE posts (
                id              TEXT PRIMARY KEY,
                title           TEXT NOT NULL,
                category        TEXT,
                summary         TEXT,
                cover_image_url TEXT,
                author_id       TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                tags            TEXT,
                view_count      INTEGER NOT NULL DEFAULT 0,
                upvote_count    INTEGER NOT NULL DEFAULT 0,
                downvote_count  INTEGER NOT NULL DEFAULT 0,
                is_closed       INTEGER NOT NULL DEFAULT 0,
                is_pinned       INTEGER NOT NULL DEFAULT 0,
                pinned_at       TEXT,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_posts_created ON posts(created_at);
            CREATE INDEX idx_posts_author ON posts(author_id, created_at);

            CREATE TABLE post_replies (
                id              TEXT PRIMARY KEY,
                post_id         TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                parent_reply_id TEXT REFERENCES post_replies(id) ON DELETE CASCADE,
                author_id       TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                content         TEXT NOT NULL,
                upvote_count    INTEGER NOT NULL DEFAULT 0,
                downvote_count  INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_replies_post ON post_replies(post_id, created_at);

            CREATE TABLE post_votes (
                id          TEXT PRIMARY KEY,
                post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                vote_type   TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                UNIQUE(post_id, user_id)
            );

            CREATE TABLE reply_votes (
                id          TEXT PRIMARY KEY,
                reply_id    TEXT NOT NULL REFERENCES post_replies(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                vote_type   TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                UNIQUE(reply_id, user_id)
            );

            CREATE TABLE reports (
                id          TEXT PRIMARY KEY,
                post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                reply_id    TEXT REFERENCES post_replies(id) ON DELETE CASCADE,
                reporter_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                reason      TEXT NOT NULL,
                description TEXT,
                status      TEXT NOT NULL DEFAULT 'pending',
                reviewed_by TEXT,
                reviewed_at TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE point_records (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                points      INTEGER NOT NULL,
                reason      TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_point_records_user ON point_records(user_id, created_at);

            CREATE TABLE line_applications (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                message     TEXT NOT NULL,
                status      TEXT NOT NULL DEFAULT 'pending',
                created_at  TEXT NOT NULL
            );

            CREATE TABLE line_groups (
                id              TEXT PRIMARY KEY,
                name            TEXT NOT NULL,
                description     TEXT,
                qr_code_url     TEXT NOT NULL,
                manager_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                is_active       INTEGER NOT NULL DEFAULT 1,
                is_private      INTEGER NOT NULL DEFAULT 0,
                admin_approved  INTEGER NOT NULL DEFAULT 0,
                member_count    INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL,
                updated_at      TEXT
            );

            CREATE TABLE line_group_applications (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                group_id    TEXT NOT NULL REFERENCES line_groups(id) ON DELETE CASCADE,
                message     TEXT,
                status      TEXT NOT NULL DEFAULT 'pending',
                reviewed_by TEXT,
                reviewed_at TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE line_group_reports (
                id          TEXT PRIMARY KEY,
                group_id    TEXT NOT NULL REFERENCES line_groups(id) ON DELETE CASCADE,
                reporter_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                reason      TEXT NOT NULL,
                description TEXT,
                status      TEXT NOT NULL DEFAULT 'pending',
                reviewed_by TEXT,
                reviewed_at TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE line_group_creation_requests (
                id               TEXT PRIMARY KEY,
                requester_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name             TEXT NOT NULL,
                description      TEXT,
                qr_code_url      TEXT NOT NULL,
                is_private       INTEGER NOT NULL DEFAULT 0,
                status           TEXT NOT NULL DEFAULT 'pending',
                reviewed_by      TEXT,
                reviewed_at      TEXT,
                rejection_reason TEXT,
                created_at       TEXT NOT NULL,
                updated_at       TEXT
            );

            CREATE TABLE announcements (
                id          TEXT PRIMARY KEY,
                title       TEXT NOT NULL,
                content     TEXT NOT NULL,
                created_by  TEXT NOT NULL,
                is_active   INTEGER NOT NULL DEFAULT 1,
                priority    INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL,
                updated_at  TEXT
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (uploads)");
        conn.execute_batch(
            "
            CREATE TABLE uploads (
                id              TEXT PRIMARY KEY,
                owner_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                content_type    TEXT NOT NULL,
                size            INTEGER NOT NULL,
                created_at      TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
