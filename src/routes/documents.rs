use std::time::Duration;

use axum::extract::{Json, Multipart, Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use diesel::dsl::count_star;
use diesel::{prelude::*, PgConnection};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::domain::access::{self, Actor, DocumentPredicate};
use crate::domain::{AccessLevel, ComplianceStatus, DocumentPriority, DocumentStatus};
use crate::error::{AppError, AppResult};
use crate::models::{Document, DocumentVersion, NewDocument, NewDocumentVersion, User};
use crate::notify::{self, TEMPLATE_DOCUMENT_STATUS};
use crate::response::{self, ApiResponse};
use crate::schema::{compliance_tasks, document_versions, documents, users};
use crate::state::AppState;

const PRESIGNED_URL_EXPIRY_SECONDS: u64 = 300;
const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "text/plain",
    "image/jpeg",
    "image/png",
    "image/gif",
];

#[derive(Deserialize)]
pub struct DocumentListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub review_comments: Option<String>,
}

#[derive(Deserialize)]
pub struct DeleteDocumentQuery {
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub language: Option<String>,
    pub priority: String,
    pub department: String,
    pub status: String,
    pub access: String,
    pub allowed_departments: Vec<String>,
    pub tags: Vec<String>,
    pub current_version: i32,
    pub uploaded_by: Uuid,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<String>,
    pub review_comments: Option<String>,
    pub is_archived: bool,
    pub created_at: String,
    pub updated_at: String,
    pub download_path: String,
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        let download_path = format!("/documents/{}/download", doc.id);
        Self {
            id: doc.id,
            title: doc.title,
            description: doc.description,
            category: doc.category,
            language: doc.language,
            priority: doc.priority,
            department: doc.department,
            status: doc.status,
            access: doc.access,
            allowed_departments: doc.allowed_departments,
            tags: doc.tags,
            current_version: doc.current_version,
            uploaded_by: doc.uploaded_by,
            reviewed_by: doc.reviewed_by,
            reviewed_at: doc.reviewed_at.map(|at| at.and_utc().to_rfc3339()),
            review_comments: doc.review_comments,
            is_archived: doc.is_archived,
            created_at: doc.created_at.and_utc().to_rfc3339(),
            updated_at: doc.updated_at.and_utc().to_rfc3339(),
            download_path,
        }
    }
}

#[derive(Serialize)]
pub struct VersionResponse {
    pub id: Uuid,
    pub version_number: i32,
    pub size_bytes: i64,
    pub checksum: String,
    pub uploaded_by: Uuid,
    pub change_description: Option<String>,
    pub created_at: String,
}

impl From<DocumentVersion> for VersionResponse {
    fn from(version: DocumentVersion) -> Self {
        Self {
            id: version.id,
            version_number: version.version_number,
            size_bytes: version.size_bytes,
            checksum: version.checksum,
            uploaded_by: version.uploaded_by,
            change_description: version.change_description,
            created_at: version.created_at.and_utc().to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_count: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

pub fn paginate(page: Option<i64>, limit: Option<i64>) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1) * limit;
    (page, limit, offset)
}

pub fn pagination(page: i64, limit: i64, total_count: i64) -> Pagination {
    let total_pages = (total_count + limit - 1) / limit;
    Pagination {
        current_page: page,
        total_pages,
        total_count,
        has_next: page * limit < total_count,
        has_prev: page > 1,
    }
}

/// Visibility disjunction plus conjunctive search/status narrowing. Search
/// never widens the visible set.
fn listing_predicate(
    actor: &Actor,
    search: Option<&str>,
    status: Option<&str>,
) -> DocumentPredicate {
    let mut predicate = access::visibility_predicate(actor);

    if let Some(term) = search {
        let pattern = format!("%{term}%");
        predicate = Box::new(
            predicate.and(
                documents::title
                    .ilike(pattern.clone())
                    .or(documents::description.ilike(pattern))
                    .or(documents::tags.contains(vec![term.to_string()])),
            ),
        );
    }

    if let Some(status) = status {
        predicate = Box::new(predicate.and(documents::status.eq(status.to_string())));
    }

    predicate
}

pub async fn list_documents(
    State(state): State<AppState>,
    Query(params): Query<DocumentListQuery>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<Value>>> {
    let mut conn = state.db()?;
    let actor = user.actor();

    let search = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let status = match params.status.as_deref() {
        Some(value) => Some(
            DocumentStatus::parse(value)
                .ok_or_else(|| AppError::bad_request("unknown document status"))?
                .as_str(),
        ),
        None => None,
    };
    let (page, limit, offset) = paginate(params.page, params.limit);

    let total_count: i64 = documents::table
        .filter(documents::is_archived.eq(false))
        .filter(listing_predicate(&actor, search, status))
        .count()
        .get_result(&mut conn)?;

    let mut query = documents::table
        .filter(documents::is_archived.eq(false))
        .filter(listing_predicate(&actor, search, status))
        .into_boxed();
    query = match params.sort_order.as_deref() {
        Some("asc") => query.order(documents::created_at.asc()),
        _ => query.order(documents::created_at.desc()),
    };
    let docs: Vec<Document> = query.limit(limit).offset(offset).load(&mut conn)?;

    let status_counts: Vec<(String, i64)> = documents::table
        .filter(documents::is_archived.eq(false))
        .filter(listing_predicate(&actor, search, status))
        .group_by(documents::status)
        .select((documents::status, count_star()))
        .load(&mut conn)?;

    let documents: Vec<DocumentResponse> = docs.into_iter().map(DocumentResponse::from).collect();
    let status_counts: Vec<Value> = status_counts
        .into_iter()
        .map(|(status, count)| json!({ "status": status, "count": count }))
        .collect();

    Ok(response::ok(
        "documents retrieved successfully",
        json!({
            "documents": documents,
            "pagination": pagination(page, limit, total_count),
            "status_counts": status_counts,
        }),
    ))
}

struct UploadFields {
    bytes: Option<Vec<u8>>,
    original_name: Option<String>,
    content_type: Option<String>,
    title: Option<String>,
    description: Option<String>,
    category: Option<String>,
    language: Option<String>,
    priority: Option<String>,
    access: Option<String>,
    tags: Vec<String>,
    allowed_departments: Vec<String>,
    change_description: Option<String>,
}

async fn collect_upload_fields(multipart: &mut Multipart) -> AppResult<UploadFields> {
    let mut fields = UploadFields {
        bytes: None,
        original_name: None,
        content_type: None,
        title: None,
        description: None,
        category: None,
        language: None,
        priority: None,
        access: None,
        tags: Vec::new(),
        allowed_departments: Vec::new(),
        change_description: None,
    };

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                fields.original_name = field.file_name().map(|n| n.to_string());
                fields.content_type = field.content_type().map(|mime| mime.to_string());
                let data = field.bytes().await.map_err(|err| {
                    error!(error = %err, "failed to read file bytes");
                    AppError::bad_request(format!("failed to read file bytes: {err}"))
                })?;
                fields.bytes = Some(data.to_vec());
            }
            Some(other) => {
                let key = other.to_string();
                let value = field.text().await.map_err(|err| {
                    AppError::bad_request(format!("invalid field '{key}': {err}"))
                })?;
                let value = value.trim().to_string();
                if value.is_empty() {
                    continue;
                }
                match key.as_str() {
                    "title" => fields.title = Some(value),
                    "description" => fields.description = Some(value),
                    "category" => fields.category = Some(value),
                    "language" => fields.language = Some(value),
                    "priority" => fields.priority = Some(value),
                    "access" => fields.access = Some(value),
                    "change_description" => fields.change_description = Some(value),
                    "tags" => {
                        fields.tags = split_csv(&value);
                    }
                    "allowed_departments" => {
                        fields.allowed_departments = split_csv(&value);
                    }
                    _ => {}
                }
            }
            None => {}
        }
    }

    Ok(fields)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn resolve_content_type(declared: Option<String>, original_name: &str) -> AppResult<String> {
    let content_type = declared.unwrap_or_else(|| {
        mime_guess::from_path(original_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    });

    if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(AppError::bad_request(
            "invalid file type; only documents, images, and text files are allowed",
        ));
    }

    Ok(content_type)
}

/// The departments a cross-department document defaults to when the uploader
/// names none: every other department currently present among active users.
fn other_active_departments(
    conn: &mut PgConnection,
    own_department: &str,
) -> AppResult<Vec<String>> {
    let departments: Vec<Option<String>> = users::table
        .filter(users::is_active.eq(true))
        .select(users::department)
        .distinct()
        .load(conn)?;

    Ok(departments
        .into_iter()
        .flatten()
        .filter(|dept| dept != own_department)
        .collect())
}

pub async fn upload_document(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<Value>>)> {
    let fields = collect_upload_fields(&mut multipart).await?;

    let bytes = fields
        .bytes
        .ok_or_else(|| AppError::bad_request("no file uploaded"))?;
    if bytes.is_empty() {
        return Err(AppError::bad_request("file must not be empty"));
    }
    if bytes.len() > state.config.max_upload_bytes {
        return Err(AppError::bad_request("file exceeds the maximum upload size"));
    }
    let original_name = fields
        .original_name
        .ok_or_else(|| AppError::bad_request("filename is required"))?;
    let content_type = resolve_content_type(fields.content_type, &original_name)?;

    let mut problems: Vec<(&str, &str)> = Vec::new();
    if fields.title.is_none() {
        problems.push(("title", "is required"));
    }
    if fields.description.is_none() {
        problems.push(("description", "is required"));
    }
    if fields.category.is_none() {
        problems.push(("category", "is required"));
    }
    if !problems.is_empty() {
        return Err(AppError::validation("invalid document payload", problems));
    }

    let priority = match fields.priority.as_deref() {
        Some(value) => DocumentPriority::parse(value)
            .ok_or_else(|| AppError::bad_request("unknown document priority"))?,
        None => DocumentPriority::Medium,
    };
    let requested_access = match fields.access.as_deref() {
        Some(value) => AccessLevel::parse(value)
            .ok_or_else(|| AppError::bad_request("unknown access level"))?,
        None => AccessLevel::SelfOnly,
    };

    // The owning department always comes from the uploader, never the
    // request body.
    let department = user
        .department()
        .ok_or_else(|| AppError::bad_request("uploader has no department"))?
        .to_string();

    let mut conn = state.db()?;
    let allowed_departments = match requested_access {
        AccessLevel::SelfOnly => Vec::new(),
        AccessLevel::Department => vec![department.clone()],
        AccessLevel::CrossDepartment => {
            if fields.allowed_departments.is_empty() {
                other_active_departments(&mut conn, &department)?
            } else {
                fields.allowed_departments
            }
        }
    };

    let doc_id = Uuid::new_v4();
    let version_id = Uuid::new_v4();
    let checksum = hex::encode(Sha256::digest(&bytes));
    let size_bytes = bytes.len() as i64;
    let s3_key = format!("documents/{doc_id}/v1/{version_id}");
    let content_disposition = inline_content_disposition(&original_name);

    // Persist the payload first; a failed metadata write below still leaves
    // us able to clean the object up.
    state
        .storage
        .put_object(
            &s3_key,
            bytes,
            Some(content_type.clone()),
            content_disposition,
        )
        .await
        .map_err(|err| {
            error!(error = %err, key = %s3_key, "failed to store document payload");
            AppError::internal(format!("failed to store document: {err}"))
        })?;

    let insert_result = conn.transaction::<Document, diesel::result::Error, _>(|conn| {
        let new_document = NewDocument {
            id: doc_id,
            title: fields.title.clone().unwrap_or_default(),
            description: fields.description.clone().unwrap_or_default(),
            category: fields.category.clone().unwrap_or_default(),
            language: fields.language.clone(),
            priority: priority.as_str().to_string(),
            department: department.clone(),
            status: DocumentStatus::initial().as_str().to_string(),
            access: requested_access.as_str().to_string(),
            allowed_departments: allowed_departments.clone(),
            tags: fields.tags.clone(),
            current_version: 1,
            uploaded_by: user.id,
        };
        diesel::insert_into(documents::table)
            .values(&new_document)
            .execute(conn)?;

        let new_version = NewDocumentVersion {
            id: version_id,
            document_id: doc_id,
            version_number: 1,
            s3_key: s3_key.clone(),
            size_bytes,
            checksum: checksum.clone(),
            uploaded_by: user.id,
            change_description: None,
        };
        diesel::insert_into(document_versions::table)
            .values(&new_version)
            .execute(conn)?;

        documents::table.find(doc_id).first(conn)
    });

    let document = match insert_result {
        Ok(document) => document,
        Err(err) => {
            // Compensating cleanup: no orphan objects after a failed
            // metadata write.
            if let Err(cleanup_err) = state.storage.delete_object(&s3_key).await {
                warn!(key = %s3_key, error = %cleanup_err, "failed to clean up stored object");
            }
            return Err(err.into());
        }
    };

    info!(document_id = %doc_id, department = %department, "document uploaded");

    Ok(response::created(
        "document uploaded successfully",
        json!({ "document": DocumentResponse::from(document) }),
    ))
}

fn load_document(conn: &mut PgConnection, document_id: Uuid) -> AppResult<Document> {
    let document: Document = documents::table
        .find(document_id)
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("document not found"))?;
    if document.is_archived {
        return Err(AppError::not_found("document not found"));
    }
    Ok(document)
}

fn ensure_point_access(user: &CurrentUser, document: &Document, action: &str) -> AppResult<()> {
    if access::can_act(&user.actor(), &document.department) {
        Ok(())
    } else {
        Err(AppError::forbidden(format!(
            "access denied: you can only {action} documents from your department"
        )))
    }
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<Value>>> {
    let mut conn = state.db()?;
    let document = load_document(&mut conn, document_id)?;
    ensure_point_access(&user, &document, "view")?;

    let versions: Vec<DocumentVersion> = document_versions::table
        .filter(document_versions::document_id.eq(document_id))
        .order(document_versions::version_number.asc())
        .load(&mut conn)?;
    let versions: Vec<VersionResponse> = versions.into_iter().map(VersionResponse::from).collect();

    Ok(response::ok(
        "document retrieved successfully",
        json!({
            "document": DocumentResponse::from(document),
            "versions": versions,
        }),
    ))
}

pub async fn update_document_status(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    user: CurrentUser,
    Json(payload): Json<UpdateStatusRequest>,
) -> AppResult<Json<ApiResponse<Value>>> {
    if !user.is_admin() {
        return Err(AppError::forbidden("only admins can review documents"));
    }

    let new_status = DocumentStatus::parse(&payload.status)
        .ok_or_else(|| AppError::bad_request("unknown document status"))?;

    let mut conn = state.db()?;
    let document = load_document(&mut conn, document_id)?;
    let now = Utc::now().naive_utc();

    diesel::update(documents::table.find(document.id))
        .set((
            documents::status.eq(new_status.as_str()),
            documents::reviewed_by.eq(Some(user.id)),
            documents::reviewed_at.eq(Some(now)),
            documents::review_comments.eq(payload.review_comments.clone()),
            documents::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

    // Approval mechanically resolves the document's open compliance tasks.
    // Not rolled back if a later step fails; see DESIGN.md on write ordering.
    if new_status == DocumentStatus::Approved {
        let resolved = diesel::update(
            compliance_tasks::table
                .filter(compliance_tasks::document_id.eq(document.id))
                .filter(compliance_tasks::is_active.eq(true))
                .filter(compliance_tasks::status.ne(ComplianceStatus::Resolved.as_str())),
        )
        .set((
            compliance_tasks::status.eq(ComplianceStatus::Resolved.as_str()),
            compliance_tasks::resolved_at.eq(Some(now)),
            compliance_tasks::resolved_by.eq(Some(user.id)),
            compliance_tasks::resolution_notes.eq(Some("Document approved".to_string())),
            compliance_tasks::updated_at.eq(now),
        ))
        .execute(&mut conn)?;
        info!(document_id = %document.id, resolved, "approval resolved open compliance tasks");
    }

    let updated: Document = documents::table.find(document.id).first(&mut conn)?;

    let uploader: Option<User> = users::table
        .find(updated.uploaded_by)
        .first(&mut conn)
        .optional()?;
    drop(conn);

    if let Some(uploader) = uploader {
        notify::send_best_effort(
            state.notifier.as_ref(),
            &uploader.email,
            TEMPLATE_DOCUMENT_STATUS,
            json!({
                "document_id": updated.id,
                "title": updated.title,
                "status": updated.status,
                "review_comments": updated.review_comments,
            }),
        )
        .await;
    }

    Ok(response::ok(
        "document status updated successfully",
        json!({ "document": DocumentResponse::from(updated) }),
    ))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Query(params): Query<DeleteDocumentQuery>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<()>>> {
    if !user.is_admin() {
        return Err(AppError::forbidden("only admins can delete documents"));
    }

    let mut conn = state.db()?;
    let document = load_document(&mut conn, document_id)?;
    let now = Utc::now().naive_utc();
    let reason = params
        .reason
        .unwrap_or_else(|| "Deleted by admin".to_string());

    diesel::update(documents::table.find(document.id))
        .set((
            documents::is_archived.eq(true),
            documents::archive_reason.eq(Some(reason)),
            documents::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

    diesel::update(compliance_tasks::table.filter(compliance_tasks::document_id.eq(document.id)))
        .set((
            compliance_tasks::is_active.eq(false),
            compliance_tasks::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

    info!(document_id = %document.id, "document archived");
    Ok(response::ok_empty("document deleted successfully"))
}

pub async fn list_versions(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<Value>>> {
    let mut conn = state.db()?;
    let document = load_document(&mut conn, document_id)?;
    ensure_point_access(&user, &document, "view")?;

    let versions: Vec<DocumentVersion> = document_versions::table
        .filter(document_versions::document_id.eq(document_id))
        .order(document_versions::version_number.asc())
        .load(&mut conn)?;
    let versions: Vec<VersionResponse> = versions.into_iter().map(VersionResponse::from).collect();

    Ok(response::ok(
        "document versions retrieved successfully",
        json!({
            "document_id": document.id,
            "title": document.title,
            "versions": versions,
        }),
    ))
}

pub async fn add_version(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<Value>>> {
    let fields = collect_upload_fields(&mut multipart).await?;

    let bytes = fields
        .bytes
        .ok_or_else(|| AppError::bad_request("no file uploaded"))?;
    if bytes.is_empty() {
        return Err(AppError::bad_request("file must not be empty"));
    }
    if bytes.len() > state.config.max_upload_bytes {
        return Err(AppError::bad_request("file exceeds the maximum upload size"));
    }
    let original_name = fields
        .original_name
        .ok_or_else(|| AppError::bad_request("filename is required"))?;
    let content_type = resolve_content_type(fields.content_type, &original_name)?;

    let mut conn = state.db()?;
    let document = load_document(&mut conn, document_id)?;
    ensure_point_access(&user, &document, "modify")?;

    let version_id = Uuid::new_v4();
    let version_number = crate::domain::document::next_version(document.current_version);
    let checksum = hex::encode(Sha256::digest(&bytes));
    let size_bytes = bytes.len() as i64;
    let s3_key = format!("documents/{document_id}/v{version_number}/{version_id}");
    let content_disposition = inline_content_disposition(&original_name);

    state
        .storage
        .put_object(&s3_key, bytes, Some(content_type), content_disposition)
        .await
        .map_err(|err| {
            error!(error = %err, key = %s3_key, "failed to store document payload");
            AppError::internal(format!("failed to store document: {err}"))
        })?;

    // Version append and review reset are one transaction: a new version is
    // never visible with stale review state.
    let now = Utc::now().naive_utc();
    let append_result = conn.transaction::<(), diesel::result::Error, _>(|conn| {
        let new_version = NewDocumentVersion {
            id: version_id,
            document_id,
            version_number,
            s3_key: s3_key.clone(),
            size_bytes,
            checksum: checksum.clone(),
            uploaded_by: user.id,
            change_description: fields.change_description.clone(),
        };
        diesel::insert_into(document_versions::table)
            .values(&new_version)
            .execute(conn)?;

        diesel::update(documents::table.find(document_id))
            .set((
                documents::current_version.eq(version_number),
                documents::status.eq(DocumentStatus::initial().as_str()),
                documents::reviewed_by.eq(None::<Uuid>),
                documents::reviewed_at.eq(None::<chrono::NaiveDateTime>),
                documents::review_comments.eq(None::<String>),
                documents::updated_at.eq(now),
            ))
            .execute(conn)?;

        Ok(())
    });

    if let Err(err) = append_result {
        if let Err(cleanup_err) = state.storage.delete_object(&s3_key).await {
            warn!(key = %s3_key, error = %cleanup_err, "failed to clean up stored object");
        }
        return Err(err.into());
    }

    let total_versions: i64 = document_versions::table
        .filter(document_versions::document_id.eq(document_id))
        .count()
        .get_result(&mut conn)?;

    info!(document_id = %document_id, version = version_number, "new document version added");

    Ok(response::ok(
        "new version added successfully",
        json!({
            "document_id": document_id,
            "current_version": version_number,
            "total_versions": total_versions,
        }),
    ))
}

pub async fn download_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<Value>>> {
    let mut conn = state.db()?;
    let document = load_document(&mut conn, document_id)?;
    ensure_point_access(&user, &document, "view")?;

    let version: DocumentVersion = document_versions::table
        .filter(document_versions::document_id.eq(document_id))
        .filter(document_versions::version_number.eq(document.current_version))
        .first(&mut conn)?;
    drop(conn);

    let presigned_url = state
        .storage
        .presign_get_object(
            &version.s3_key,
            Duration::from_secs(PRESIGNED_URL_EXPIRY_SECONDS),
        )
        .await
        .map_err(|err| AppError::internal(format!("failed to generate download URL: {err}")))?;

    Ok(response::ok(
        "download link generated",
        json!({
            "url": presigned_url,
            "expires_in": PRESIGNED_URL_EXPIRY_SECONDS,
            "filename": document.title,
            "size_bytes": version.size_bytes,
        }),
    ))
}

/// Documents other departments have shared with this admin's department.
pub async fn shared_documents(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<Value>>> {
    if !user.is_admin() {
        return Err(AppError::forbidden("admins only"));
    }
    let department = user
        .department()
        .ok_or_else(|| AppError::bad_request("admin has no department"))?
        .to_string();

    let mut conn = state.db()?;
    let docs: Vec<Document> = documents::table
        .filter(documents::is_archived.eq(false))
        .filter(documents::allowed_departments.contains(vec![department]))
        .order(documents::created_at.desc())
        .load(&mut conn)?;

    let documents: Vec<DocumentResponse> = docs.into_iter().map(DocumentResponse::from).collect();
    Ok(response::ok(
        "shared documents retrieved successfully",
        json!({ "documents": documents }),
    ))
}

fn inline_content_disposition(filename: &str) -> Option<String> {
    if filename.is_empty() {
        return None;
    }

    let sanitized: String = filename
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            _ => ch,
        })
        .collect();

    let encoded =
        percent_encoding::utf8_percent_encode(&sanitized, percent_encoding::NON_ALPHANUMERIC);
    Some(format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_windows() {
        let (page, limit, offset) = paginate(Some(3), Some(10));
        assert_eq!((page, limit, offset), (3, 10, 20));

        let (page, limit, offset) = paginate(None, None);
        assert_eq!((page, limit, offset), (1, DEFAULT_PAGE_SIZE, 0));

        let (_, limit, _) = paginate(Some(1), Some(10_000));
        assert_eq!(limit, MAX_PAGE_SIZE);
    }

    #[test]
    fn pagination_flags() {
        let p = pagination(1, 20, 45);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next);
        assert!(!p.has_prev);

        let p = pagination(3, 20, 45);
        assert!(!p.has_next);
        assert!(p.has_prev);
    }

    #[test]
    fn content_type_falls_back_to_extension() {
        let resolved = resolve_content_type(None, "report.pdf").unwrap();
        assert_eq!(resolved, "application/pdf");
        assert!(resolve_content_type(None, "payload.bin").is_err());
        assert!(resolve_content_type(Some("application/zip".into()), "a.zip").is_err());
    }

    #[test]
    fn content_disposition_sanitizes_quotes() {
        let value = inline_content_disposition("we\"ird.pdf").unwrap();
        assert!(value.starts_with("inline; filename=\"we_ird.pdf\""));
        assert_eq!(inline_content_disposition(""), None);
    }

    #[test]
    fn csv_fields_are_trimmed() {
        assert_eq!(split_csv("a, b ,,c"), vec!["a", "b", "c"]);
        assert!(split_csv(" , ").is_empty());
    }
}
