//! Knowledge-base indexing and retrieval.
//!
//! The two search modes are intentionally asymmetric: semantic search ranks
//! the full active set before applying exact-match filters, lexical search
//! filters before ranking. Result sets for the same query and filters are
//! therefore not guaranteed to agree between modes.

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use diesel::dsl::count_star;
use diesel::pg::Pg;
use diesel::sql_types::Bool;
use diesel::{prelude::*, PgConnection};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::domain::{access, similarity};
use crate::embeddings::EmbeddingError;
use crate::error::{AppError, AppResult};
use crate::models::{Document, KnowledgeBaseEntry, NewKnowledgeBaseEntry};
use crate::response::{self, ApiResponse};
use crate::routes::documents::{paginate, pagination};
use crate::schema::{documents, knowledge_base_entries};
use crate::state::AppState;

const MIN_QUERY_LEN: usize = 2;
const DEFAULT_SEARCH_LIMIT: i64 = 20;

type EntryPredicate = Box<dyn BoxableExpression<knowledge_base_entries::table, Pg, SqlType = Bool>>;

#[derive(Deserialize)]
pub struct IndexRequest {
    pub document_id: Uuid,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub language: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub department: Option<String>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

#[derive(Deserialize)]
pub struct EntryListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
    pub department: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateEntryRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub keywords: Option<Vec<String>>,
    pub language: Option<String>,
}

/// Embeddings never leave the server; responses carry everything else.
#[derive(Serialize)]
pub struct EntryResponse {
    pub id: Uuid,
    pub document_id: Uuid,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub keywords: Vec<String>,
    pub category: String,
    pub department: String,
    pub language: String,
    pub search_count: i32,
    pub last_accessed: Option<String>,
    pub created_by: Uuid,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

impl EntryResponse {
    fn from_entry(entry: KnowledgeBaseEntry, similarity: Option<f64>) -> Self {
        Self {
            id: entry.id,
            document_id: entry.document_id,
            title: entry.title,
            content: entry.content,
            summary: entry.summary,
            tags: entry.tags,
            keywords: entry.keywords,
            category: entry.category,
            department: entry.department,
            language: entry.language,
            search_count: entry.search_count,
            last_accessed: entry.last_accessed.map(|at| at.and_utc().to_rfc3339()),
            created_by: entry.created_by,
            created_at: entry.created_at.and_utc().to_rfc3339(),
            updated_at: entry.updated_at.and_utc().to_rfc3339(),
            similarity,
        }
    }
}

fn map_embedding_error(err: EmbeddingError) -> AppError {
    match err {
        EmbeddingError::Unavailable => AppError::dependency_unavailable(
            "embedding provider unavailable; use text search instead",
        ),
        other => AppError::internal(other),
    }
}

fn require_query(raw: Option<&str>) -> AppResult<String> {
    let query = raw.map(str::trim).unwrap_or_default();
    if query.len() < MIN_QUERY_LEN {
        return Err(AppError::bad_request(
            "search query is required and must be at least 2 characters",
        ));
    }
    Ok(query.to_string())
}

/// Department pin for reads: department users only ever see their own
/// department, admins may narrow by parameter.
fn effective_department(user: &CurrentUser, requested: Option<&str>) -> Option<String> {
    if user.is_admin() {
        requested.map(str::to_string)
    } else {
        user.department().map(str::to_string)
    }
}

fn active_entries() -> EntryPredicate {
    Box::new(knowledge_base_entries::is_active.eq(true))
}

fn entry_predicate(
    department: &Option<String>,
    category: &Option<String>,
    tag: &Option<String>,
    search: Option<&str>,
) -> EntryPredicate {
    let mut predicate = active_entries();

    if let Some(department) = department {
        predicate =
            Box::new(predicate.and(knowledge_base_entries::department.eq(department.clone())));
    }
    if let Some(category) = category {
        predicate = Box::new(predicate.and(knowledge_base_entries::category.eq(category.clone())));
    }
    if let Some(tag) = tag {
        predicate =
            Box::new(predicate.and(knowledge_base_entries::tags.contains(vec![tag.clone()])));
    }
    if let Some(term) = search {
        let pattern = format!("%{term}%");
        predicate = Box::new(
            predicate.and(
                knowledge_base_entries::title
                    .ilike(pattern.clone())
                    .or(knowledge_base_entries::content.ilike(pattern.clone()))
                    .or(knowledge_base_entries::summary
                        .ilike(pattern)
                        .assume_not_null())
                    .or(knowledge_base_entries::tags.contains(vec![term.to_string()]))
                    .or(knowledge_base_entries::keywords.contains(vec![term.to_string()])),
            ),
        );
    }

    predicate
}

pub async fn index_document(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<IndexRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Value>>)> {
    let mut problems: Vec<(&str, &str)> = Vec::new();
    if payload.title.trim().is_empty() {
        problems.push(("title", "is required"));
    }
    if payload.content.trim().is_empty() {
        problems.push(("content", "is required"));
    }
    if payload.category.trim().is_empty() {
        problems.push(("category", "is required"));
    }
    if !problems.is_empty() {
        return Err(AppError::validation("invalid index payload", problems));
    }

    let mut conn = state.db()?;
    let document: Document = documents::table
        .find(payload.document_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("document not found"))?;

    if !access::can_act(&user.actor(), &document.department) {
        return Err(AppError::forbidden(
            "access denied: you can only index documents from your department",
        ));
    }
    drop(conn);

    let embeddings = state
        .embedder
        .embed(&payload.content)
        .await
        .map_err(map_embedding_error)?;

    let new_entry = NewKnowledgeBaseEntry {
        id: Uuid::new_v4(),
        document_id: document.id,
        title: payload.title.trim().to_string(),
        content: payload.content,
        summary: payload.summary,
        embeddings,
        tags: payload.tags,
        keywords: payload.keywords,
        category: payload.category.trim().to_string(),
        department: document.department.clone(),
        language: payload.language.unwrap_or_else(|| "en".to_string()),
        created_by: user.id,
    };

    let mut conn = state.db()?;
    diesel::insert_into(knowledge_base_entries::table)
        .values(&new_entry)
        .execute(&mut conn)?;

    let entry: KnowledgeBaseEntry = knowledge_base_entries::table
        .find(new_entry.id)
        .first(&mut conn)?;
    info!(entry_id = %entry.id, document_id = %document.id, "document indexed");

    Ok(response::created(
        "document indexed successfully",
        json!({
            "knowledge_base_id": entry.id,
            "document_id": entry.document_id,
            "title": entry.title,
            "category": entry.category,
        }),
    ))
}

fn touch_entries(conn: &mut PgConnection, ids: &[Uuid]) -> AppResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let now = Utc::now().naive_utc();
    diesel::update(knowledge_base_entries::table.filter(knowledge_base_entries::id.eq_any(ids)))
        .set((
            knowledge_base_entries::search_count.eq(knowledge_base_entries::search_count + 1),
            knowledge_base_entries::last_accessed.eq(Some(now)),
        ))
        .execute(conn)?;
    Ok(())
}

pub async fn semantic_search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<Value>>> {
    let query = require_query(params.q.as_deref())?;
    let department = effective_department(&user, params.department.as_deref());

    let query_embedding = state
        .embedder
        .embed(&query)
        .await
        .map_err(map_embedding_error)?;

    let mut conn = state.db()?;
    let candidates: Vec<KnowledgeBaseEntry> = knowledge_base_entries::table
        .filter(knowledge_base_entries::is_active.eq(true))
        .load(&mut conn)?;

    // Rank the whole active set first; exact-match filters narrow the ranked
    // list afterwards (the documented mode asymmetry).
    let ranked = similarity::rank_by_similarity(
        candidates,
        &query_embedding,
        state.config.similarity_threshold,
        |entry| &entry.embeddings,
    );

    let filtered: Vec<(KnowledgeBaseEntry, f64)> = ranked
        .into_iter()
        .filter(|(entry, _)| {
            department
                .as_deref()
                .map(|dept| entry.department == dept)
                .unwrap_or(true)
                && params
                    .category
                    .as_deref()
                    .map(|category| entry.category == category)
                    .unwrap_or(true)
                && params
                    .tag
                    .as_deref()
                    .map(|tag| entry.tags.iter().any(|t| t == tag))
                    .unwrap_or(true)
        })
        .collect();

    let total_results = filtered.len();
    let skip = params.skip.unwrap_or(0).max(0) as usize;
    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, 100) as usize;
    let page: Vec<(KnowledgeBaseEntry, f64)> =
        filtered.into_iter().skip(skip).take(limit).collect();

    let ids: Vec<Uuid> = page.iter().map(|(entry, _)| entry.id).collect();
    touch_entries(&mut conn, &ids)?;

    let results: Vec<EntryResponse> = page
        .into_iter()
        .map(|(entry, score)| EntryResponse::from_entry(entry, Some(score)))
        .collect();

    Ok(response::ok(
        "semantic search completed successfully",
        json!({
            "query": query,
            "results": results,
            "total_results": total_results,
            "pagination": {
                "limit": limit,
                "skip": skip,
                "has_more": skip + limit < total_results,
            },
        }),
    ))
}

pub async fn text_search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<Value>>> {
    let query = require_query(params.q.as_deref())?;
    let department = effective_department(&user, params.department.as_deref());

    let skip = params.skip.unwrap_or(0).max(0);
    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, 100);

    let mut conn = state.db()?;
    // Lexical mode filters before pagination; no ranking pass.
    let entries: Vec<KnowledgeBaseEntry> = knowledge_base_entries::table
        .filter(entry_predicate(
            &department,
            &params.category,
            &params.tag,
            Some(&query),
        ))
        .order(knowledge_base_entries::created_at.desc())
        .offset(skip)
        .limit(limit)
        .load(&mut conn)?;

    let ids: Vec<Uuid> = entries.iter().map(|entry| entry.id).collect();
    touch_entries(&mut conn, &ids)?;

    let total_results = entries.len();
    let results: Vec<EntryResponse> = entries
        .into_iter()
        .map(|entry| EntryResponse::from_entry(entry, None))
        .collect();

    Ok(response::ok(
        "text search completed successfully",
        json!({
            "query": query,
            "results": results,
            "total_results": total_results,
            "pagination": { "limit": limit, "skip": skip },
        }),
    ))
}

pub async fn list_entries(
    State(state): State<AppState>,
    Query(params): Query<EntryListQuery>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<Value>>> {
    let department = effective_department(&user, params.department.as_deref());
    let (page, limit, offset) = paginate(params.page, params.limit);
    let search = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let predicate = || entry_predicate(&department, &params.category, &params.tag, search);

    let mut conn = state.db()?;
    let total_count: i64 = knowledge_base_entries::table
        .filter(predicate())
        .count()
        .get_result(&mut conn)?;
    let entries: Vec<KnowledgeBaseEntry> = knowledge_base_entries::table
        .filter(predicate())
        .order(knowledge_base_entries::created_at.desc())
        .limit(limit)
        .offset(offset)
        .load(&mut conn)?;
    let category_counts: Vec<(String, i64)> = knowledge_base_entries::table
        .filter(predicate())
        .group_by(knowledge_base_entries::category)
        .select((knowledge_base_entries::category, count_star()))
        .load(&mut conn)?;

    let entries: Vec<EntryResponse> = entries
        .into_iter()
        .map(|entry| EntryResponse::from_entry(entry, None))
        .collect();
    let category_counts: Vec<Value> = category_counts
        .into_iter()
        .map(|(category, count)| json!({ "category": category, "count": count }))
        .collect();

    Ok(response::ok(
        "knowledge base entries retrieved successfully",
        json!({
            "entries": entries,
            "pagination": pagination(page, limit, total_count),
            "category_counts": category_counts,
        }),
    ))
}

fn load_entry(conn: &mut PgConnection, entry_id: Uuid) -> AppResult<KnowledgeBaseEntry> {
    let entry: KnowledgeBaseEntry = knowledge_base_entries::table
        .find(entry_id)
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("knowledge base entry not found"))?;
    if !entry.is_active {
        return Err(AppError::not_found("knowledge base entry not found"));
    }
    Ok(entry)
}

fn ensure_entry_access(
    user: &CurrentUser,
    entry: &KnowledgeBaseEntry,
    action: &str,
) -> AppResult<()> {
    if access::can_act(&user.actor(), &entry.department) {
        Ok(())
    } else {
        Err(AppError::forbidden(format!(
            "access denied: you can only {action} knowledge base entries from your department"
        )))
    }
}

pub async fn get_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<Value>>> {
    let mut conn = state.db()?;
    let entry = load_entry(&mut conn, entry_id)?;
    ensure_entry_access(&user, &entry, "view")?;

    // Reads are observable: the access counter moves on every fetch.
    touch_entries(&mut conn, &[entry.id])?;
    let entry: KnowledgeBaseEntry = knowledge_base_entries::table
        .find(entry_id)
        .first(&mut conn)?;

    Ok(response::ok(
        "knowledge base entry retrieved successfully",
        json!({ "entry": EntryResponse::from_entry(entry, None) }),
    ))
}

pub async fn update_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
    user: CurrentUser,
    Json(payload): Json<UpdateEntryRequest>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let mut conn = state.db()?;
    let entry = load_entry(&mut conn, entry_id)?;
    ensure_entry_access(&user, &entry, "modify")?;

    // A content edit invalidates the stored vector; re-embed before writing.
    let new_embeddings = match payload.content.as_deref() {
        Some(content) if content != entry.content => {
            drop(conn);
            let embeddings = state
                .embedder
                .embed(content)
                .await
                .map_err(map_embedding_error)?;
            conn = state.db()?;
            Some(embeddings)
        }
        _ => None,
    };

    let now = Utc::now().naive_utc();
    if let Some(title) = payload
        .title
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        diesel::update(knowledge_base_entries::table.find(entry.id))
            .set(knowledge_base_entries::title.eq(title))
            .execute(&mut conn)?;
    }
    if let Some(content) = &payload.content {
        diesel::update(knowledge_base_entries::table.find(entry.id))
            .set(knowledge_base_entries::content.eq(content))
            .execute(&mut conn)?;
    }
    if let Some(embeddings) = new_embeddings {
        diesel::update(knowledge_base_entries::table.find(entry.id))
            .set(knowledge_base_entries::embeddings.eq(embeddings))
            .execute(&mut conn)?;
    }
    if let Some(summary) = &payload.summary {
        diesel::update(knowledge_base_entries::table.find(entry.id))
            .set(knowledge_base_entries::summary.eq(Some(summary.clone())))
            .execute(&mut conn)?;
    }
    if let Some(category) = payload
        .category
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        diesel::update(knowledge_base_entries::table.find(entry.id))
            .set(knowledge_base_entries::category.eq(category))
            .execute(&mut conn)?;
    }
    if let Some(tags) = &payload.tags {
        diesel::update(knowledge_base_entries::table.find(entry.id))
            .set(knowledge_base_entries::tags.eq(tags.clone()))
            .execute(&mut conn)?;
    }
    if let Some(keywords) = &payload.keywords {
        diesel::update(knowledge_base_entries::table.find(entry.id))
            .set(knowledge_base_entries::keywords.eq(keywords.clone()))
            .execute(&mut conn)?;
    }
    if let Some(language) = &payload.language {
        diesel::update(knowledge_base_entries::table.find(entry.id))
            .set(knowledge_base_entries::language.eq(language.clone()))
            .execute(&mut conn)?;
    }
    diesel::update(knowledge_base_entries::table.find(entry.id))
        .set((
            knowledge_base_entries::updated_by.eq(Some(user.id)),
            knowledge_base_entries::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

    let updated: KnowledgeBaseEntry = knowledge_base_entries::table
        .find(entry.id)
        .first(&mut conn)?;
    Ok(response::ok(
        "knowledge base entry updated successfully",
        json!({ "entry": EntryResponse::from_entry(updated, None) }),
    ))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<()>>> {
    let mut conn = state.db()?;
    let entry = load_entry(&mut conn, entry_id)?;
    ensure_entry_access(&user, &entry, "delete")?;

    diesel::update(knowledge_base_entries::table.find(entry.id))
        .set((
            knowledge_base_entries::is_active.eq(false),
            knowledge_base_entries::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)?;

    Ok(response::ok_empty("knowledge base entry deleted successfully"))
}

pub async fn entry_stats(
    State(state): State<AppState>,
    Query(params): Query<EntryListQuery>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<Value>>> {
    let department = effective_department(&user, params.department.as_deref());
    let scope = || entry_predicate(&department, &None, &None, None);

    let mut conn = state.db()?;
    let total_entries: i64 = knowledge_base_entries::table
        .filter(scope())
        .count()
        .get_result(&mut conn)?;
    let category_counts: Vec<(String, i64)> = knowledge_base_entries::table
        .filter(scope())
        .group_by(knowledge_base_entries::category)
        .select((knowledge_base_entries::category, count_star()))
        .load(&mut conn)?;

    let department_counts: Option<Vec<Value>> = if user.is_admin() {
        let counts: Vec<(String, i64)> = knowledge_base_entries::table
            .filter(knowledge_base_entries::is_active.eq(true))
            .group_by(knowledge_base_entries::department)
            .select((knowledge_base_entries::department, count_star()))
            .load(&mut conn)?;
        Some(
            counts
                .into_iter()
                .map(|(department, count)| json!({ "department": department, "count": count }))
                .collect(),
        )
    } else {
        None
    };

    let top_searched: Vec<KnowledgeBaseEntry> = knowledge_base_entries::table
        .filter(scope())
        .order(knowledge_base_entries::search_count.desc())
        .limit(10)
        .load(&mut conn)?;
    let recent: Vec<KnowledgeBaseEntry> = knowledge_base_entries::table
        .filter(scope())
        .order(knowledge_base_entries::created_at.desc())
        .limit(10)
        .load(&mut conn)?;

    let summarize = |entries: Vec<KnowledgeBaseEntry>| -> Vec<Value> {
        entries
            .into_iter()
            .map(|entry| {
                json!({
                    "id": entry.id,
                    "title": entry.title,
                    "category": entry.category,
                    "search_count": entry.search_count,
                    "created_at": entry.created_at.and_utc().to_rfc3339(),
                })
            })
            .collect()
    };

    Ok(response::ok(
        "knowledge base statistics retrieved successfully",
        json!({
            "total_entries": total_entries,
            "entries_by_category": category_counts
                .into_iter()
                .map(|(category, count)| json!({ "category": category, "count": count }))
                .collect::<Vec<Value>>(),
            "entries_by_department": department_counts,
            "top_searched": summarize(top_searched),
            "recent_entries": summarize(recent),
        }),
    ))
}
