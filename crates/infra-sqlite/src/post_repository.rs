// SQLite PostRepository Implementation

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::connection::SqlitePool;
use crate::executor::Executor;
use crate::store::StoreContext;
use crate::transaction::SqliteTransactionCoordinator;
use blogstore_core::application::transactional;
use blogstore_core::domain::{
    NewPost, Page, Pagination, Post, PostFilter, PostId, PostOrder, PostPatch,
};
use blogstore_core::error::{AppError, Result};
use blogstore_core::mapper::{row_to_record, Row, SqlValue};
use blogstore_core::port::PostRepository;
use blogstore_core::statement::{placeholders, ParamType, Params, Statement};

const POST_COLUMNS: &str = r#"
    SELECT p.id, p.title, p.text, p.likes_count, p.version, p.created_at, p.updated_at,
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments_count
    FROM posts p
"#;

/// Fixed post statements, prepared once per store
pub(crate) struct PostStatements {
    select_by_id: Statement,
    exists: Statement,
    insert: Statement,
    update: Statement,
    update_versioned: Statement,
    delete: Statement,
    add_like: Statement,
    clear_tags: Statement,
    ensure_tag: Statement,
    link_tag: Statement,
    tags_of_post: Statement,
}

impl PostStatements {
    pub(crate) fn prepare() -> Result<Self> {
        use ParamType as P;

        Ok(Self {
            select_by_id: Statement::new(format!("{} WHERE p.id = ?", POST_COLUMNS), &[P::INTEGER])?,
            exists: Statement::new("SELECT COUNT(*) FROM posts WHERE id = ?", &[P::INTEGER])?,
            insert: Statement::new(
                r#"
                INSERT INTO posts (title, title_search, text, likes_count, version, created_at, updated_at)
                VALUES (?, ?, ?, 0, 1, ?, ?)
                "#,
                &[P::TEXT, P::TEXT, P::TEXT, P::TIMESTAMP, P::TIMESTAMP],
            )?,
            update: Statement::new(
                r#"
                UPDATE posts SET title = ?, title_search = ?, text = ?, version = version + 1,
                    updated_at = ?
                WHERE id = ?
                "#,
                &[P::TEXT, P::TEXT, P::TEXT, P::TIMESTAMP, P::INTEGER],
            )?,
            update_versioned: Statement::new(
                r#"
                UPDATE posts SET title = ?, title_search = ?, text = ?, version = version + 1,
                    updated_at = ?
                WHERE id = ? AND version = ?
                "#,
                &[P::TEXT, P::TEXT, P::TEXT, P::TIMESTAMP, P::INTEGER, P::INTEGER],
            )?,
            delete: Statement::new("DELETE FROM posts WHERE id = ?", &[P::INTEGER])?,
            add_like: Statement::new(
                "UPDATE posts SET likes_count = likes_count + 1 WHERE id = ?",
                &[P::INTEGER],
            )?,
            clear_tags: Statement::new("DELETE FROM post_tags WHERE post_id = ?", &[P::INTEGER])?,
            ensure_tag: Statement::new(
                "INSERT INTO tags (name) VALUES (?) ON CONFLICT(name) DO NOTHING",
                &[P::TEXT],
            )?,
            link_tag: Statement::new(
                "INSERT OR IGNORE INTO post_tags (post_id, tag_id) SELECT ?, id FROM tags WHERE name = ?",
                &[P::INTEGER, P::TEXT],
            )?,
            tags_of_post: Statement::new(
                r#"
                SELECT t.name FROM post_tags pt JOIN tags t ON t.id = pt.tag_id
                WHERE pt.post_id = ? ORDER BY t.name
                "#,
                &[P::INTEGER],
            )?,
        })
    }
}

// Operations shared by the pooled repository and units of work

pub(crate) async fn find_by_id(exec: &mut Executor<'_>, ctx: &StoreContext, id: PostId) -> Result<Post> {
    let stmts = &ctx.posts;
    let row = exec
        .fetch_optional(&stmts.select_by_id, &Params::new().with(id))
        .await?
        .ok_or_else(|| not_found(id))?;
    let post: Post = row_to_record(&row)?;

    let tag_rows = exec
        .fetch_all(&stmts.tags_of_post, &Params::new().with(id))
        .await?;
    let tags = tag_rows.iter().filter_map(tag_name).collect();
    Ok(post.with_tags(tags))
}

pub(crate) async fn find_all(
    exec: &mut Executor<'_>,
    filter: &PostFilter,
    pagination: Pagination,
) -> Result<Page<Post>> {
    pagination.validate()?;
    let listing = Listing::build(filter)?;

    let total = exec.fetch_i64(&listing.count, &listing.params).await?;
    if total == 0 {
        return Ok(Page::empty(pagination));
    }

    let mut page_params = listing.params.clone();
    page_params.push(pagination.limit());
    page_params.push(pagination.offset());

    let rows = exec.fetch_all(&listing.page, &page_params).await?;
    let posts = rows
        .iter()
        .map(row_to_record::<Post>)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let posts = attach_tags(exec, posts).await?;

    Ok(Page::new(posts, pagination, total))
}

pub(crate) async fn insert(exec: &mut Executor<'_>, ctx: &StoreContext, post: &NewPost) -> Result<Post> {
    let now = ctx.clock.now();
    let done = exec
        .execute(
            &ctx.posts.insert,
            &Params::new()
                .with(post.title.as_str())
                .with(search_key(&post.title))
                .with(post.text.as_str())
                .with(now)
                .with(now),
        )
        .await?;
    let id = done.last_insert_id;

    replace_tags(exec, ctx, id, &post.tags).await?;
    debug!(post_id = id, "post inserted");
    find_by_id(exec, ctx, id).await
}

pub(crate) async fn update(
    exec: &mut Executor<'_>,
    ctx: &StoreContext,
    id: PostId,
    patch: &PostPatch,
) -> Result<Post> {
    let stmts = &ctx.posts;
    let mut params = Params::new()
        .with(patch.title.as_str())
        .with(search_key(&patch.title))
        .with(patch.text.as_str())
        .with(ctx.clock.now())
        .with(id);

    let stmt = match patch.expected_version {
        Some(version) => {
            params.push(version);
            &stmts.update_versioned
        }
        None => &stmts.update,
    };

    let done = exec.execute(stmt, &params).await?;
    if done.rows_affected == 0 {
        let exists = exec.fetch_i64(&stmts.exists, &Params::new().with(id)).await? > 0;
        return Err(if exists {
            AppError::OptimisticConflict(format!(
                "post {} was modified concurrently (expected version {})",
                id,
                patch.expected_version.unwrap_or_default()
            ))
        } else {
            not_found(id)
        });
    }

    replace_tags(exec, ctx, id, &patch.tags).await?;
    find_by_id(exec, ctx, id).await
}

pub(crate) async fn delete(exec: &mut Executor<'_>, ctx: &StoreContext, id: PostId) -> Result<()> {
    let done = exec
        .execute(&ctx.posts.delete, &Params::new().with(id))
        .await?;
    if done.rows_affected == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

pub(crate) async fn add_like(exec: &mut Executor<'_>, ctx: &StoreContext, id: PostId) -> Result<Post> {
    let done = exec
        .execute(&ctx.posts.add_like, &Params::new().with(id))
        .await?;
    if done.rows_affected == 0 {
        return Err(not_found(id));
    }
    find_by_id(exec, ctx, id).await
}

async fn replace_tags(
    exec: &mut Executor<'_>,
    ctx: &StoreContext,
    id: PostId,
    tags: &[String],
) -> Result<()> {
    let stmts = &ctx.posts;
    exec.execute(&stmts.clear_tags, &Params::new().with(id))
        .await?;

    for tag in blogstore_core::domain::normalize_tags(tags) {
        exec.execute(&stmts.ensure_tag, &Params::new().with(tag.as_str()))
            .await?;
        exec.execute(&stmts.link_tag, &Params::new().with(id).with(tag))
            .await?;
    }
    Ok(())
}

/// One query for the tags of a whole page
async fn attach_tags(exec: &mut Executor<'_>, posts: Vec<Post>) -> Result<Vec<Post>> {
    if posts.is_empty() {
        return Ok(posts);
    }

    let stmt = Statement::new(
        format!(
            "SELECT pt.post_id, t.name FROM post_tags pt JOIN tags t ON t.id = pt.tag_id \
             WHERE pt.post_id IN ({})",
            placeholders(posts.len())
        ),
        &vec![ParamType::INTEGER; posts.len()],
    )?;
    let params: Params = posts.iter().map(|p| SqlValue::Integer(p.id)).collect();

    let mut by_post: HashMap<PostId, Vec<String>> = HashMap::new();
    for row in exec.fetch_all(&stmt, &params).await? {
        if let (Some(SqlValue::Integer(post_id)), Some(name)) = (row.value(0), tag_name_at(&row, 1)) {
            by_post.entry(*post_id).or_default().push(name);
        }
    }

    Ok(posts
        .into_iter()
        .map(|post| {
            let tags = by_post.remove(&post.id).unwrap_or_default();
            post.with_tags(tags)
        })
        .collect())
}

fn tag_name(row: &Row) -> Option<String> {
    tag_name_at(row, 0)
}

fn tag_name_at(row: &Row, index: usize) -> Option<String> {
    match row.value(index) {
        Some(SqlValue::Text(name)) => Some(name.clone()),
        _ => None,
    }
}

fn not_found(id: PostId) -> AppError {
    AppError::NotFound(format!("post {}", id))
}

/// Count and page statements for one filter
///
/// SQL text is assembled from fixed fragments only; search terms are bound.
struct Listing {
    count: Statement,
    page: Statement,
    params: Params,
}

impl Listing {
    fn build(filter: &PostFilter) -> Result<Self> {
        let mut clauses = Vec::new();
        let mut types = Vec::new();
        let mut params = Params::new();

        if let Some(query) = filter.title_query.as_deref() {
            clauses.push("p.title_search LIKE ? ESCAPE '\\'".to_string());
            types.push(ParamType::TEXT);
            params.push(like_pattern(query));
        }

        if !filter.tags.is_empty() {
            clauses.push(format!(
                "p.id IN (SELECT pt.post_id FROM post_tags pt JOIN tags t ON t.id = pt.tag_id \
                 WHERE t.name IN ({}) GROUP BY pt.post_id HAVING COUNT(DISTINCT t.name) = ?)",
                placeholders(filter.tags.len())
            ));
            for tag in &filter.tags {
                types.push(ParamType::TEXT);
                params.push(tag.as_str());
            }
            types.push(ParamType::INTEGER);
            params.push(filter.tags.len() as i64);
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let count = Statement::new(format!("SELECT COUNT(*) FROM posts p{}", where_sql), &types)?;

        let mut page_types = types;
        page_types.extend([ParamType::INTEGER, ParamType::INTEGER]);
        let page = Statement::new(
            format!(
                "{}{} ORDER BY {} LIMIT ? OFFSET ?",
                POST_COLUMNS,
                where_sql,
                order_by(filter.order)
            ),
            &page_types,
        )?;

        Ok(Self {
            count,
            page,
            params,
        })
    }
}

fn order_by(order: PostOrder) -> &'static str {
    match order {
        PostOrder::Newest => "p.created_at DESC, p.id DESC",
        PostOrder::Oldest => "p.created_at ASC, p.id ASC",
        PostOrder::Title => "p.title COLLATE NOCASE ASC, p.id ASC",
        PostOrder::MostLiked => "p.likes_count DESC, p.id DESC",
    }
}

/// Case-folded title stored alongside it; SQLite's own LOWER only folds ASCII
fn search_key(title: &str) -> String {
    title.to_lowercase()
}

/// `%query%` over the search key, with LIKE wildcards in the query escaped
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for ch in search_key(query).chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Post repository over the shared pool
///
/// Reads and single-statement writes use one pooled connection; writes that
/// touch several tables run in their own unit of work.
#[derive(Clone)]
pub struct SqlitePostRepository {
    pool: SqlitePool,
    ctx: Arc<StoreContext>,
    coordinator: SqliteTransactionCoordinator,
}

impl SqlitePostRepository {
    pub(crate) fn new(
        pool: SqlitePool,
        ctx: Arc<StoreContext>,
        coordinator: SqliteTransactionCoordinator,
    ) -> Self {
        Self {
            pool,
            ctx,
            coordinator,
        }
    }
}

#[async_trait]
impl PostRepository for SqlitePostRepository {
    async fn find_by_id(&self, id: PostId) -> Result<Post> {
        let mut conn = self.pool.acquire().await?;
        let mut exec = Executor::new(&mut conn, self.ctx.statement_timeout);
        find_by_id(&mut exec, &self.ctx, id).await
    }

    async fn find_all(&self, filter: &PostFilter, pagination: Pagination) -> Result<Page<Post>> {
        let mut conn = self.pool.acquire().await?;
        let mut exec = Executor::new(&mut conn, self.ctx.statement_timeout);
        find_all(&mut exec, filter, pagination).await
    }

    async fn insert(&self, post: &NewPost) -> Result<Post> {
        let post = post.clone();
        transactional(&self.coordinator, move |unit| {
            Box::pin(async move { unit.posts().insert(&post).await })
        })
        .await
    }

    async fn update(&self, id: PostId, patch: &PostPatch) -> Result<Post> {
        let patch = patch.clone();
        transactional(&self.coordinator, move |unit| {
            Box::pin(async move { unit.posts().update(id, &patch).await })
        })
        .await
    }

    async fn delete(&self, id: PostId) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        let mut exec = Executor::new(&mut conn, self.ctx.statement_timeout);
        delete(&mut exec, &self.ctx, id).await?;
        debug!(post_id = id, "post deleted");
        Ok(())
    }

    async fn add_like(&self, id: PostId) -> Result<Post> {
        let mut conn = self.pool.acquire().await?;
        let mut exec = Executor::new(&mut conn, self.ctx.statement_timeout);
        add_like(&mut exec, &self.ctx, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Rust"), "%rust%");
        assert_eq!(like_pattern("100%_done\\"), "%100\\%\\_done\\\\%");
    }

    #[test]
    fn test_search_key_folds_unicode() {
        assert_eq!(search_key("Über RUST"), "über rust");
        assert_eq!(like_pattern("ÜBER"), "%über%");
    }

    #[test]
    fn test_listing_placeholders_match() {
        let filter = PostFilter::parse("hello world #a #b #c");
        let listing = Listing::build(&filter).unwrap();
        // title + 3 tags + tag count
        assert_eq!(listing.params.len(), 5);
        assert_eq!(listing.count.param_types().len(), 5);
        assert_eq!(listing.page.param_types().len(), 7);
    }

    #[test]
    fn test_unfiltered_listing() {
        let listing = Listing::build(&PostFilter::all()).unwrap();
        assert!(listing.params.is_empty());
        assert!(!listing.count.sql().contains("WHERE"));
        assert!(listing.page.sql().contains("ORDER BY p.created_at DESC, p.id DESC"));
    }

    #[test]
    fn test_fixed_statements_prepare() {
        assert!(PostStatements::prepare().is_ok());
    }
}
