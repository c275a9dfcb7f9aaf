use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params_from_iter};

use super::OptionalExt;
use crate::Database;
use crate::models::{RuleFields, RuleFilter, RuleRow, RuleSort};

const RULE_SELECT: &str = "
    SELECT r.id, r.name, r.description, r.pattern, r.rule_content, r.tags, r.category,
           r.framework, r.downloads, r.likes, r.created_by, p.username, r.created_at,
           r.updated_at
    FROM rules r
    LEFT JOIN user_profiles p ON p.user_id = r.created_by";

impl Database {
    // -- Rules --

    pub fn insert_rule(&self, id: &str, created_by: &str, fields: &RuleFields) -> Result<()> {
        let tags = serde_json::to_string(&fields.tags)?;
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO rules
                     (id, name, description, pattern, rule_content, tags, category, framework, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    id,
                    fields.name,
                    fields.description,
                    fields.pattern,
                    fields.rule_content,
                    tags,
                    fields.category,
                    fields.framework,
                    created_by,
                ],
            )?;
            Ok(())
        })
    }

    /// Fetch a rule visible to the public. Orphaned rules are treated as absent.
    pub fn get_public_rule(&self, id: &str) -> Result<Option<RuleRow>> {
        self.with_conn(|conn| {
            let sql = format!("{RULE_SELECT} WHERE r.id = ?1 AND r.created_by IS NOT NULL");
            let row = conn.query_row(&sql, [id], map_rule).optional()?;
            Ok(row)
        })
    }

    /// Ownership guard: the rule only comes back when `owner` created it.
    pub fn get_rule_owned(&self, id: &str, owner: &str) -> Result<Option<RuleRow>> {
        self.with_conn(|conn| {
            let sql = format!("{RULE_SELECT} WHERE r.id = ?1 AND r.created_by = ?2");
            let row = conn.query_row(&sql, [id, owner], map_rule).optional()?;
            Ok(row)
        })
    }

    /// Returns the page selected by `filter` and the total match count.
    pub fn list_public_rules(&self, filter: &RuleFilter) -> Result<(Vec<RuleRow>, i64)> {
        self.with_conn(|conn| query_public_rules(conn, filter))
    }

    /// Overwrite the content columns of an owned rule. Returns rows changed.
    pub fn update_rule(&self, id: &str, owner: &str, fields: &RuleFields) -> Result<usize> {
        let tags = serde_json::to_string(&fields.tags)?;
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE rules
                 SET name = ?3, description = ?4, pattern = ?5, rule_content = ?6, tags = ?7,
                     category = ?8, framework = ?9,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND created_by = ?2",
                rusqlite::params![
                    id,
                    owner,
                    fields.name,
                    fields.description,
                    fields.pattern,
                    fields.rule_content,
                    tags,
                    fields.category,
                    fields.framework,
                ],
            )?;
            Ok(updated)
        })
    }

    pub fn delete_rule_owned(&self, id: &str, owner: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute("DELETE FROM rules WHERE id = ?1 AND created_by = ?2", [id, owner])?)
        })
    }

    pub fn delete_orphaned_rules(&self) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute("DELETE FROM rules WHERE created_by IS NULL", [])?)
        })
    }

    /// Append a download record and bump the counter.
    /// Returns the new count and the rule content, or `None` if the rule is not public.
    pub fn record_download(
        &self,
        download_id: &str,
        rule_id: &str,
        user_agent: Option<&str>,
        ip_address: Option<&str>,
    ) -> Result<Option<(i64, String)>> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            let updated = tx.execute(
                "UPDATE rules SET downloads = downloads + 1
                 WHERE id = ?1 AND created_by IS NOT NULL",
                [rule_id],
            )?;
            if updated == 0 {
                return Ok(None);
            }

            tx.execute(
                "INSERT INTO rule_downloads (id, rule_id, user_agent, ip_address) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![download_id, rule_id, user_agent, ip_address],
            )?;

            let result: (i64, String) = tx.query_row(
                "SELECT downloads, rule_content FROM rules WHERE id = ?1",
                [rule_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            tx.commit()?;
            Ok(Some(result))
        })
    }

    /// Toggle a like: removes if it exists, inserts if not.
    /// Returns (liked, likes), or `None` if the rule is not public.
    pub fn toggle_like(&self, rule_id: &str, user_id: &str) -> Result<Option<(bool, i64)>> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;

            let public: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM rules WHERE id = ?1 AND created_by IS NOT NULL)",
                [rule_id],
                |row| row.get(0),
            )?;
            if !public {
                return Ok(None);
            }

            let removed = tx.execute(
                "DELETE FROM rule_likes WHERE rule_id = ?1 AND user_id = ?2",
                [rule_id, user_id],
            )?;
            let liked = if removed > 0 {
                tx.execute("UPDATE rules SET likes = MAX(likes - 1, 0) WHERE id = ?1", [rule_id])?;
                false
            } else {
                tx.execute(
                    "INSERT INTO rule_likes (rule_id, user_id) VALUES (?1, ?2)",
                    [rule_id, user_id],
                )?;
                tx.execute("UPDATE rules SET likes = likes + 1 WHERE id = ?1", [rule_id])?;
                true
            };

            let likes: i64 =
                tx.query_row("SELECT likes FROM rules WHERE id = ?1", [rule_id], |row| row.get(0))?;
            tx.commit()?;
            Ok(Some((liked, likes)))
        })
    }

    pub fn download_count(&self, rule_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM rule_downloads WHERE rule_id = ?1",
                [rule_id],
                |row| row.get(0),
            )?)
        })
    }
}

fn query_public_rules(conn: &Connection, filter: &RuleFilter) -> Result<(Vec<RuleRow>, i64)> {
    let mut clauses = vec!["r.created_by IS NOT NULL".to_string()];
    let mut params: Vec<Value> = Vec::new();

    if let Some(search) = filter.search.as_deref() {
        let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
        clauses.push(
            "(LOWER(r.name) LIKE ? ESCAPE '\\' OR LOWER(r.description) LIKE ? ESCAPE '\\')"
                .to_string(),
        );
        params.push(Value::Text(pattern.clone()));
        params.push(Value::Text(pattern));
    }
    if let Some(category) = filter.category.as_deref() {
        clauses.push("r.category = ?".to_string());
        params.push(Value::Text(category.to_string()));
    }
    if let Some(framework) = filter.framework.as_deref() {
        clauses.push("r.framework = ?".to_string());
        params.push(Value::Text(framework.to_string()));
    }
    if let Some(tag) = filter.tag.as_deref() {
        clauses.push(
            "EXISTS (SELECT 1 FROM json_each(r.tags) WHERE json_each.value = ?)".to_string(),
        );
        params.push(Value::Text(tag.to_string()));
    }
    if let Some(created_by) = filter.created_by.as_deref() {
        clauses.push("r.created_by = ?".to_string());
        params.push(Value::Text(created_by.to_string()));
    }
    if let Some(follower) = filter.followed_by.as_deref() {
        clauses.push(
            "r.created_by IN (SELECT following_id FROM user_follows WHERE follower_id = ?)".to_string(),
        );
        params.push(Value::Text(follower.to_string()));
    }

    let where_sql = clauses.join(" AND ");

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM rules r WHERE {where_sql}"),
        params_from_iter(params.iter()),
        |row| row.get(0),
    )?;

    let order_sql = match filter.sort {
        RuleSort::Newest => "r.created_at DESC, r.rowid DESC",
        RuleSort::Downloads => "r.downloads DESC, r.created_at DESC, r.rowid DESC",
        RuleSort::Likes => "r.likes DESC, r.created_at DESC, r.rowid DESC",
        RuleSort::Name => "r.name COLLATE NOCASE ASC, r.rowid ASC",
    };

    params.push(Value::Integer(i64::from(filter.limit)));
    params.push(Value::Integer(i64::from(filter.offset)));

    let sql = format!("{RULE_SELECT} WHERE {where_sql} ORDER BY {order_sql} LIMIT ? OFFSET ?");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(params.iter()), map_rule)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok((rows, total))
}

fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn map_rule(row: &Row<'_>) -> rusqlite::Result<RuleRow> {
    Ok(RuleRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        pattern: row.get(3)?,
        rule_content: row.get(4)?,
        tags: row.get(5)?,
        category: row.get(6)?,
        framework: row.get(7)?,
        downloads: row.get(8)?,
        likes: row.get(9)?,
        created_by: row.get(10)?,
        author_username: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

#[cfg(test)]
mod tests {
    use super::escape_like;
    use crate::models::{RuleFilter, RuleSort};
    use crate::queries::testing::{db, fields, seed_user};

    fn filter() -> RuleFilter {
        RuleFilter {
            limit: 20,
            ..Default::default()
        }
    }

    #[test]
    fn owner_guard_hides_rule_from_other_users() {
        let db = db();
        seed_user(&db, "alice");
        seed_user(&db, "bob");
        db.insert_rule("r1", "alice", &fields("tabs")).unwrap();

        assert!(db.get_rule_owned("r1", "alice").unwrap().is_some());
        assert!(db.get_rule_owned("r1", "bob").unwrap().is_none());
        assert_eq!(db.update_rule("r1", "bob", &fields("hijack")).unwrap(), 0);
        assert_eq!(db.delete_rule_owned("r1", "bob").unwrap(), 0);
        let public = db.get_public_rule("r1").unwrap().unwrap();
        assert_eq!(public.name, "tabs");
        assert_eq!(public.created_by, "alice");
    }

    #[test]
    fn deleted_owner_leaves_orphan_hidden() {
        let db = db();
        seed_user(&db, "alice");
        db.insert_rule("r1", "alice", &fields("tabs")).unwrap();
        db.delete_user("alice").unwrap();

        assert!(db.get_public_rule("r1").unwrap().is_none());
        let (rows, total) = db.list_public_rules(&filter()).unwrap();
        assert!(rows.is_empty());
        assert_eq!(total, 0);
        assert!(db.record_download("d1", "r1", None, None).unwrap().is_none());

        assert_eq!(db.delete_orphaned_rules().unwrap(), 1);
    }

    #[test]
    fn list_filters_by_tag_and_search() {
        let db = db();
        seed_user(&db, "alice");
        let mut react = fields("React hooks");
        react.tags = vec!["react".into(), "typescript".into()];
        react.framework = Some("react".into());
        db.insert_rule("r1", "alice", &react).unwrap();
        db.insert_rule("r2", "alice", &fields("Rust errors")).unwrap();

        let (rows, _) = db
            .list_public_rules(&RuleFilter { tag: Some("typescript".into()), ..filter() })
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "r1");

        let (rows, total) = db
            .list_public_rules(&RuleFilter { search: Some("ERRORS".into()), ..filter() })
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].id, "r2");

        let (rows, _) = db
            .list_public_rules(&RuleFilter { framework: Some("react".into()), ..filter() })
            .unwrap();
        assert_eq!(rows[0].author_username.as_deref(), Some("alice"));
    }

    #[test]
    fn list_pages_and_sorts() {
        let db = db();
        seed_user(&db, "alice");
        for (id, name) in [("r1", "bravo"), ("r2", "alpha"), ("r3", "charlie")] {
            db.insert_rule(id, "alice", &fields(name)).unwrap();
        }
        db.record_download("d1", "r3", Some("curl"), Some("10.0.0.1")).unwrap();

        let (rows, total) = db
            .list_public_rules(&RuleFilter { sort: RuleSort::Name, limit: 2, ..filter() })
            .unwrap();
        assert_eq!(total, 3);
        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "bravo"]);

        let (rows, _) = db
            .list_public_rules(&RuleFilter { sort: RuleSort::Downloads, ..filter() })
            .unwrap();
        assert_eq!(rows[0].id, "r3");

        let (rows, _) = db
            .list_public_rules(&RuleFilter { sort: RuleSort::Name, offset: 2, ..filter() })
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "charlie");
    }

    #[test]
    fn download_appends_record_and_counts() {
        let db = db();
        seed_user(&db, "alice");
        db.insert_rule("r1", "alice", &fields("tabs")).unwrap();

        let (count, content) = db.record_download("d1", "r1", Some("curl"), None).unwrap().unwrap();
        assert_eq!(count, 1);
        assert_eq!(content, "Always tabs.");
        db.record_download("d2", "r1", None, None).unwrap();
        assert_eq!(db.download_count("r1").unwrap(), 2);
    }

    #[test]
    fn toggle_like_round_trips_counter() {
        let db = db();
        seed_user(&db, "alice");
        seed_user(&db, "bob");
        db.insert_rule("r1", "alice", &fields("tabs")).unwrap();

        assert_eq!(db.toggle_like("r1", "bob").unwrap(), Some((true, 1)));
        assert_eq!(db.toggle_like("r1", "alice").unwrap(), Some((true, 2)));
        assert_eq!(db.toggle_like("r1", "bob").unwrap(), Some((false, 1)));
        assert_eq!(db.toggle_like("missing", "bob").unwrap(), None);
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
