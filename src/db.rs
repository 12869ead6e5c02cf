use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};

use crate::feed::ParsedTrend;
use crate::generator::GeneratedArticle;
use crate::slug::{numbered, slugify};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Trend {
    pub id: i64,
    pub title: String,
    pub approx_traffic: String,
    pub publication_date: DateTime<Utc>,
    pub news_items: String,
    pub hash: String,
    pub stored_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Checkpoint {
    pub id: i64,
    pub last_checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Article {
    pub id: i64,
    pub trend_id: Option<i64>,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub summary: String,
    pub meta_description: String,
    pub keywords: String,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trends (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                approx_traffic TEXT NOT NULL DEFAULT 'N/A',
                publication_date TEXT NOT NULL,
                news_items TEXT NOT NULL DEFAULT '',
                hash TEXT NOT NULL UNIQUE,
                stored_image_url TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_trends_publication_date
            ON trends(publication_date DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trend_update_checks (
                id INTEGER PRIMARY KEY,
                last_checked_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY,
                trend_id INTEGER REFERENCES trends(id) ON DELETE SET NULL,
                title TEXT NOT NULL,
                slug TEXT NOT NULL,
                content TEXT NOT NULL,
                summary TEXT NOT NULL DEFAULT '',
                meta_description TEXT NOT NULL DEFAULT '',
                keywords TEXT NOT NULL DEFAULT '',
                published INTEGER NOT NULL DEFAULT 0,
                published_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Slugs only need to be unique among published articles
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_articles_published_slug
            ON articles(slug) WHERE published = 1
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS article_categories (
                article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
                category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                PRIMARY KEY (article_id, category_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // Trends

    pub async fn find_trend_by_hash(&self, hash: &str) -> anyhow::Result<Option<Trend>> {
        let trend = sqlx::query_as::<_, Trend>("SELECT * FROM trends WHERE hash = ?")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(trend)
    }

    pub async fn insert_trend(&self, parsed: &ParsedTrend) -> anyhow::Result<Trend> {
        let now = Utc::now();
        let trend = sqlx::query_as::<_, Trend>(
            r#"
            INSERT INTO trends (
                title, approx_traffic, publication_date, news_items, hash,
                stored_image_url, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&parsed.title)
        .bind(&parsed.approx_traffic)
        .bind(parsed.publication_date)
        .bind(&parsed.news_items)
        .bind(&parsed.hash)
        .bind(&parsed.picture)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(trend)
    }

    /// Refresh the mutable fields of a re-sighted trend. The hash never
    /// changes; the stored image is only replaced when a new one was found.
    pub async fn update_trend(&self, id: i64, parsed: &ParsedTrend) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE trends
            SET title = ?,
                approx_traffic = ?,
                publication_date = ?,
                news_items = ?,
                stored_image_url = COALESCE(?, stored_image_url),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&parsed.title)
        .bind(&parsed.approx_traffic)
        .bind(parsed.publication_date)
        .bind(&parsed.news_items)
        .bind(&parsed.picture)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_trend(&self, id: i64) -> anyhow::Result<Option<Trend>> {
        let trend = sqlx::query_as::<_, Trend>("SELECT * FROM trends WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(trend)
    }

    pub async fn list_trends(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<Trend>> {
        let trends = sqlx::query_as::<_, Trend>(
            r#"
            SELECT * FROM trends
            ORDER BY publication_date DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(trends)
    }

    pub async fn count_trends(&self) -> anyhow::Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM trends")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    /// Returns false when no trend had this id.
    pub async fn delete_trend(&self, id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM trends WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // Ingestion checkpoint

    pub async fn get_checkpoint(&self) -> anyhow::Result<Option<Checkpoint>> {
        let checkpoint = sqlx::query_as::<_, Checkpoint>(
            "SELECT * FROM trend_update_checks ORDER BY id LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(checkpoint)
    }

    /// Record a completed ingestion run, reusing the existing row if any.
    pub async fn save_checkpoint(&self, checked_at: DateTime<Utc>) -> anyhow::Result<()> {
        match self.get_checkpoint().await? {
            Some(checkpoint) => {
                sqlx::query("UPDATE trend_update_checks SET last_checked_at = ? WHERE id = ?")
                    .bind(checked_at)
                    .bind(checkpoint.id)
                    .execute(&self.pool)
                    .await?;
            }
            None => {
                sqlx::query("INSERT INTO trend_update_checks (last_checked_at) VALUES (?)")
                    .bind(checked_at)
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }

    // Articles

    pub async fn insert_article(
        &self,
        trend_id: Option<i64>,
        generated: &GeneratedArticle,
    ) -> anyhow::Result<Article> {
        let now = Utc::now();
        let article = sqlx::query_as::<_, Article>(
            r#"
            INSERT INTO articles (
                trend_id, title, slug, content, summary, meta_description,
                keywords, published, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
            RETURNING *
            "#,
        )
        .bind(trend_id)
        .bind(&generated.title)
        .bind(slugify(&generated.title))
        .bind(&generated.content)
        .bind(&generated.summary)
        .bind(&generated.meta_description)
        .bind(generated.keywords.join(", "))
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(article)
    }

    pub async fn get_article(&self, id: i64) -> anyhow::Result<Option<Article>> {
        let article = sqlx::query_as::<_, Article>("SELECT * FROM articles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(article)
    }

    pub async fn get_published_article_by_slug(
        &self,
        slug: &str,
    ) -> anyhow::Result<Option<Article>> {
        let article = sqlx::query_as::<_, Article>(
            "SELECT * FROM articles WHERE slug = ? AND published = 1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(article)
    }

    /// All articles, drafts included, newest first.
    pub async fn list_articles(&self) -> anyhow::Result<Vec<Article>> {
        let articles =
            sqlx::query_as::<_, Article>("SELECT * FROM articles ORDER BY created_at DESC, id DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(articles)
    }

    pub async fn list_published_articles(
        &self,
        category_slug: Option<&str>,
    ) -> anyhow::Result<Vec<Article>> {
        let articles = match category_slug {
            Some(slug) => {
                sqlx::query_as::<_, Article>(
                    r#"
                    SELECT a.* FROM articles a
                    JOIN article_categories ac ON ac.article_id = a.id
                    JOIN categories c ON c.id = ac.category_id
                    WHERE a.published = 1 AND c.slug = ?
                    ORDER BY a.published_at DESC, a.id DESC
                    "#,
                )
                .bind(slug)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Article>(
                    r#"
                    SELECT * FROM articles
                    WHERE published = 1
                    ORDER BY published_at DESC, id DESC
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(articles)
    }

    /// Publish an article, suffixing its slug when another published article
    /// already uses it. Returns None when the article does not exist.
    pub async fn publish_article(&self, id: i64) -> anyhow::Result<Option<Article>> {
        let mut tx = self.pool.begin().await?;

        let Some(article) = sqlx::query_as::<_, Article>("SELECT * FROM articles WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let base = slugify(&article.slug);
        let mut attempt = 1;
        let slug = loop {
            let candidate = numbered(&base, attempt);
            let taken: (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM articles WHERE published = 1 AND slug = ? AND id != ?",
            )
            .bind(&candidate)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
            if taken.0 == 0 {
                break candidate;
            }
            attempt += 1;
        };

        let now = Utc::now();
        let published = sqlx::query_as::<_, Article>(
            r#"
            UPDATE articles
            SET published = 1,
                slug = ?,
                published_at = COALESCE(published_at, ?),
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&slug)
        .bind(now)
        .bind(now)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(published))
    }

    pub async fn unpublish_article(&self, id: i64) -> anyhow::Result<Option<Article>> {
        let article = sqlx::query_as::<_, Article>(
            r#"
            UPDATE articles
            SET published = 0, published_at = NULL, updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(article)
    }

    pub async fn delete_article(&self, id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // Categories

    pub async fn create_category(&self, name: &str) -> anyhow::Result<Category> {
        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, slug, created_at) VALUES (?, ?, ?) RETURNING *",
        )
        .bind(name)
        .bind(slugify(name))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(category)
    }

    pub async fn get_category_by_slug(&self, slug: &str) -> anyhow::Result<Option<Category>> {
        let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    pub async fn list_categories(&self) -> anyhow::Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    pub async fn delete_category(&self, id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the category set of an article.
    pub async fn set_article_categories(
        &self,
        article_id: i64,
        category_ids: &[i64],
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM article_categories WHERE article_id = ?")
            .bind(article_id)
            .execute(&mut *tx)
            .await?;

        let now = Utc::now();
        for category_id in category_ids {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO article_categories (article_id, category_id, created_at)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(article_id)
            .bind(category_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn categories_for_article(&self, article_id: i64) -> anyhow::Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            r#"
            SELECT c.* FROM categories c
            JOIN article_categories ac ON ac.category_id = c.id
            WHERE ac.article_id = ?
            ORDER BY c.name
            "#,
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn create_test_db() -> Database {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.initialize().await.unwrap();
        db
    }

    fn parsed_trend(title: &str, hash: &str) -> ParsedTrend {
        ParsedTrend {
            title: title.to_string(),
            approx_traffic: "200+".to_string(),
            publication_date: Utc::now(),
            picture: Some("https://img.example.com/a.jpg".to_string()),
            news_items: "- **A**: [Link](http://x)".to_string(),
            hash: hash.to_string(),
        }
    }

    fn generated(title: &str) -> GeneratedArticle {
        GeneratedArticle {
            title: title.to_string(),
            content: "Body".to_string(),
            summary: "Summary".to_string(),
            meta_description: "Meta".to_string(),
            keywords: vec!["one".to_string(), "two".to_string()],
        }
    }

    mod initialization_tests {
        use super::*;

        #[tokio::test]
        async fn test_database_initialization() {
            let db = create_test_db().await;
            assert_eq!(db.count_trends().await.unwrap(), 0);
            assert!(db.get_checkpoint().await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_double_initialization_is_safe() {
            let db = create_test_db().await;
            let result = db.initialize().await;
            assert!(result.is_ok());
        }
    }

    mod trend_tests {
        use super::*;

        #[tokio::test]
        async fn test_insert_and_find_by_hash() {
            let db = create_test_db().await;
            let inserted = db.insert_trend(&parsed_trend("eclipse", "h1")).await.unwrap();

            let found = db.find_trend_by_hash("h1").await.unwrap().unwrap();
            assert_eq!(found.id, inserted.id);
            assert_eq!(found.title, "eclipse");
            assert_eq!(found.approx_traffic, "200+");
            assert_eq!(
                found.stored_image_url.as_deref(),
                Some("https://img.example.com/a.jpg")
            );
        }

        #[tokio::test]
        async fn test_find_missing_hash_is_none() {
            let db = create_test_db().await;
            assert!(db.find_trend_by_hash("nope").await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_duplicate_hash_is_rejected() {
            let db = create_test_db().await;
            db.insert_trend(&parsed_trend("a", "same")).await.unwrap();
            assert!(db.insert_trend(&parsed_trend("b", "same")).await.is_err());
        }

        #[tokio::test]
        async fn test_update_keeps_hash_and_image_when_none_found() {
            let db = create_test_db().await;
            let inserted = db.insert_trend(&parsed_trend("eclipse", "h1")).await.unwrap();

            let mut changed = parsed_trend("eclipse (updated)", "other-hash");
            changed.approx_traffic = "1000+".to_string();
            changed.picture = None;
            db.update_trend(inserted.id, &changed).await.unwrap();

            let trend = db.get_trend(inserted.id).await.unwrap().unwrap();
            assert_eq!(trend.title, "eclipse (updated)");
            assert_eq!(trend.approx_traffic, "1000+");
            assert_eq!(trend.hash, "h1");
            assert_eq!(
                trend.stored_image_url.as_deref(),
                Some("https://img.example.com/a.jpg")
            );
        }

        #[tokio::test]
        async fn test_update_replaces_image_when_found() {
            let db = create_test_db().await;
            let inserted = db.insert_trend(&parsed_trend("eclipse", "h1")).await.unwrap();

            let mut changed = parsed_trend("eclipse", "h1");
            changed.picture = Some("https://img.example.com/new.jpg".to_string());
            db.update_trend(inserted.id, &changed).await.unwrap();

            let trend = db.get_trend(inserted.id).await.unwrap().unwrap();
            assert_eq!(
                trend.stored_image_url.as_deref(),
                Some("https://img.example.com/new.jpg")
            );
        }

        #[tokio::test]
        async fn test_list_trends_newest_first() {
            let db = create_test_db().await;
            for i in 1..=3 {
                let mut parsed = parsed_trend(&format!("trend {}", i), &format!("h{}", i));
                parsed.publication_date = Utc::now() - Duration::hours(3 - i);
                db.insert_trend(&parsed).await.unwrap();
            }

            let trends = db.list_trends(10, 0).await.unwrap();
            assert_eq!(trends.len(), 3);
            assert_eq!(trends[0].title, "trend 3");
            assert_eq!(trends[2].title, "trend 1");

            let page = db.list_trends(2, 2).await.unwrap();
            assert_eq!(page.len(), 1);
        }

        #[tokio::test]
        async fn test_delete_trend() {
            let db = create_test_db().await;
            let trend = db.insert_trend(&parsed_trend("a", "h1")).await.unwrap();

            assert!(db.delete_trend(trend.id).await.unwrap());
            assert!(!db.delete_trend(trend.id).await.unwrap());
            assert_eq!(db.count_trends().await.unwrap(), 0);
        }

        #[tokio::test]
        async fn test_delete_trend_detaches_articles() {
            let db = create_test_db().await;
            let trend = db.insert_trend(&parsed_trend("a", "h1")).await.unwrap();
            let article = db
                .insert_article(Some(trend.id), &generated("Post"))
                .await
                .unwrap();

            db.delete_trend(trend.id).await.unwrap();

            let article = db.get_article(article.id).await.unwrap().unwrap();
            assert!(article.trend_id.is_none());
        }
    }

    mod checkpoint_tests {
        use super::*;

        async fn checkpoint_rows(db: &Database) -> i64 {
            let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM trend_update_checks")
                .fetch_one(&db.pool)
                .await
                .unwrap();
            count.0
        }

        #[tokio::test]
        async fn test_first_save_creates_row() {
            let db = create_test_db().await;
            let now = Utc::now();

            db.save_checkpoint(now).await.unwrap();

            let checkpoint = db.get_checkpoint().await.unwrap().unwrap();
            assert_eq!(checkpoint.last_checked_at.timestamp(), now.timestamp());
            assert_eq!(checkpoint_rows(&db).await, 1);
        }

        #[tokio::test]
        async fn test_later_saves_update_in_place() {
            let db = create_test_db().await;
            let earlier = Utc::now() - Duration::hours(2);
            let later = Utc::now();

            db.save_checkpoint(earlier).await.unwrap();
            let first_id = db.get_checkpoint().await.unwrap().unwrap().id;
            db.save_checkpoint(later).await.unwrap();

            let checkpoint = db.get_checkpoint().await.unwrap().unwrap();
            assert_eq!(checkpoint.id, first_id);
            assert_eq!(checkpoint.last_checked_at.timestamp(), later.timestamp());
            assert_eq!(checkpoint_rows(&db).await, 1);
        }
    }

    mod article_tests {
        use super::*;

        #[tokio::test]
        async fn test_insert_article_as_draft() {
            let db = create_test_db().await;
            let article = db.insert_article(None, &generated("Hello World")).await.unwrap();

            assert_eq!(article.slug, "hello-world");
            assert_eq!(article.keywords, "one, two");
            assert!(!article.published);
            assert!(article.published_at.is_none());
            assert!(db.list_published_articles(None).await.unwrap().is_empty());
            assert_eq!(db.list_articles().await.unwrap().len(), 1);
        }

        #[tokio::test]
        async fn test_publish_article() {
            let db = create_test_db().await;
            let article = db.insert_article(None, &generated("Hello World")).await.unwrap();

            let published = db.publish_article(article.id).await.unwrap().unwrap();
            assert!(published.published);
            assert!(published.published_at.is_some());

            let found = db
                .get_published_article_by_slug("hello-world")
                .await
                .unwrap();
            assert_eq!(found.unwrap().id, article.id);
        }

        #[tokio::test]
        async fn test_publish_deduplicates_slug() {
            let db = create_test_db().await;
            let first = db.insert_article(None, &generated("Same Title")).await.unwrap();
            let second = db.insert_article(None, &generated("Same Title")).await.unwrap();
            let third = db.insert_article(None, &generated("Same Title")).await.unwrap();

            db.publish_article(first.id).await.unwrap();
            let second = db.publish_article(second.id).await.unwrap().unwrap();
            let third = db.publish_article(third.id).await.unwrap().unwrap();

            assert_eq!(second.slug, "same-title-2");
            assert_eq!(third.slug, "same-title-3");
        }

        #[tokio::test]
        async fn test_republish_keeps_slug() {
            let db = create_test_db().await;
            let article = db.insert_article(None, &generated("Post")).await.unwrap();

            db.publish_article(article.id).await.unwrap();
            let again = db.publish_article(article.id).await.unwrap().unwrap();
            assert_eq!(again.slug, "post");
        }

        #[tokio::test]
        async fn test_publish_missing_article() {
            let db = create_test_db().await;
            assert!(db.publish_article(42).await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_unpublish_article() {
            let db = create_test_db().await;
            let article = db.insert_article(None, &generated("Post")).await.unwrap();
            db.publish_article(article.id).await.unwrap();

            let draft = db.unpublish_article(article.id).await.unwrap().unwrap();
            assert!(!draft.published);
            assert!(db
                .get_published_article_by_slug("post")
                .await
                .unwrap()
                .is_none());
        }

        #[tokio::test]
        async fn test_delete_article() {
            let db = create_test_db().await;
            let article = db.insert_article(None, &generated("Post")).await.unwrap();

            assert!(db.delete_article(article.id).await.unwrap());
            assert!(db.get_article(article.id).await.unwrap().is_none());
        }
    }

    mod category_tests {
        use super::*;

        #[tokio::test]
        async fn test_create_and_list_categories() {
            let db = create_test_db().await;
            db.create_category("Space News").await.unwrap();
            db.create_category("Arts").await.unwrap();

            let categories = db.list_categories().await.unwrap();
            assert_eq!(categories.len(), 2);
            assert_eq!(categories[0].name, "Arts");
            assert_eq!(categories[1].slug, "space-news");
        }

        #[tokio::test]
        async fn test_duplicate_category_slug_fails() {
            let db = create_test_db().await;
            db.create_category("Space").await.unwrap();
            assert!(db.create_category("space").await.is_err());
        }

        #[tokio::test]
        async fn test_non_latin_categories_are_distinct() {
            let db = create_test_db().await;
            let japan = db.create_category("日本").await.unwrap();
            let ukraine = db.create_category("Україна").await.unwrap();

            assert_eq!(japan.slug, "日本");
            assert_eq!(ukraine.slug, "україна");
            assert_eq!(
                db.get_category_by_slug("україна").await.unwrap().unwrap().id,
                ukraine.id
            );
        }

        #[tokio::test]
        async fn test_set_article_categories_replaces_links() {
            let db = create_test_db().await;
            let article = db.insert_article(None, &generated("Post")).await.unwrap();
            let space = db.create_category("Space").await.unwrap();
            let sport = db.create_category("Sport").await.unwrap();

            db.set_article_categories(article.id, &[space.id, sport.id])
                .await
                .unwrap();
            assert_eq!(db.categories_for_article(article.id).await.unwrap().len(), 2);

            db.set_article_categories(article.id, &[sport.id]).await.unwrap();
            let categories = db.categories_for_article(article.id).await.unwrap();
            assert_eq!(categories.len(), 1);
            assert_eq!(categories[0].name, "Sport");
        }

        #[tokio::test]
        async fn test_published_articles_by_category() {
            let db = create_test_db().await;
            let tagged = db.insert_article(None, &generated("Tagged")).await.unwrap();
            let other = db.insert_article(None, &generated("Other")).await.unwrap();
            let space = db.create_category("Space").await.unwrap();

            db.set_article_categories(tagged.id, &[space.id]).await.unwrap();
            db.publish_article(tagged.id).await.unwrap();
            db.publish_article(other.id).await.unwrap();

            let in_space = db.list_published_articles(Some("space")).await.unwrap();
            assert_eq!(in_space.len(), 1);
            assert_eq!(in_space[0].title, "Tagged");
            assert_eq!(db.list_published_articles(None).await.unwrap().len(), 2);
        }

        #[tokio::test]
        async fn test_delete_category_removes_links() {
            let db = create_test_db().await;
            let article = db.insert_article(None, &generated("Post")).await.unwrap();
            let space = db.create_category("Space").await.unwrap();
            db.set_article_categories(article.id, &[space.id]).await.unwrap();

            assert!(db.delete_category(space.id).await.unwrap());
            assert!(db.categories_for_article(article.id).await.unwrap().is_empty());
        }
    }
}
