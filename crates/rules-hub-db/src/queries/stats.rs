use anyhow::Result;

use crate::Database;
use crate::models::StatsRow;

impl Database {
    /// Site-wide aggregates. Orphaned rules are not counted.
    pub fn stats(&self) -> Result<StatsRow> {
        self.with_conn(|conn| {
            let totals: (i64, i64, i64, i64) = conn.query_row(
                "SELECT
                     (SELECT COUNT(*) FROM rules WHERE created_by IS NOT NULL),
                     (SELECT COUNT(*) FROM users),
                     (SELECT COALESCE(SUM(downloads), 0) FROM rules WHERE created_by IS NOT NULL),
                     (SELECT COALESCE(SUM(likes), 0) FROM rules WHERE created_by IS NOT NULL)",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;
            let (total_rules, total_users, total_downloads, total_likes) = totals;

            let mut stmt = conn.prepare(
                "SELECT category, COUNT(*) AS n
                 FROM rules
                 WHERE created_by IS NOT NULL AND category IS NOT NULL AND category <> ''
                 GROUP BY category
                 ORDER BY n DESC, category ASC",
            )?;
            let categories: Vec<(String, i64)> = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(StatsRow {
                total_rules,
                total_users,
                total_downloads,
                total_likes,
                categories,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::queries::testing::{db, fields, seed_user};

    #[test]
    fn stats_skip_orphans() {
        let db = db();
        seed_user(&db, "alice");
        seed_user(&db, "bob");
        db.insert_rule("r1", "alice", &fields("one")).unwrap();
        db.insert_rule("r2", "bob", &fields("two")).unwrap();
        let mut frontend = fields("three");
        frontend.category = Some("frontend".into());
        db.insert_rule("r3", "bob", &frontend).unwrap();
        db.record_download("d1", "r1", None, None).unwrap();
        db.record_download("d2", "r2", None, None).unwrap();

        db.delete_user("alice").unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.total_rules, 2);
        assert_eq!(stats.total_users, 1);
        assert_eq!(stats.total_downloads, 1);
        assert_eq!(
            stats.categories,
            vec![("backend".to_string(), 1), ("frontend".to_string(), 1)]
        );
    }
}
