use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub department: Option<String>,
    pub is_active: bool,
    pub last_login: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub department: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = documents)]
pub struct Document {
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
    pub reviewed_at: Option<NaiveDateTime>,
    pub review_comments: Option<String>,
    pub is_archived: bool,
    pub archive_reason: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = documents)]
pub struct NewDocument {
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
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = document_versions)]
#[diesel(belongs_to(Document))]
pub struct DocumentVersion {
    pub id: Uuid,
    pub document_id: Uuid,
    pub version_number: i32,
    pub s3_key: String,
    pub size_bytes: i64,
    pub checksum: String,
    pub uploaded_by: Uuid,
    pub change_description: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = document_versions)]
pub struct NewDocumentVersion {
    pub id: Uuid,
    pub document_id: Uuid,
    pub version_number: i32,
    pub s3_key: String,
    pub size_bytes: i64,
    pub checksum: String,
    pub uploaded_by: Uuid,
    pub change_description: Option<String>,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Queryable, Associations)]
#[diesel(table_name = document_allowed_users)]
#[diesel(belongs_to(Document))]
#[diesel(primary_key(document_id, user_id))]
pub struct DocumentAllowedUser {
    pub document_id: Uuid,
    pub user_id: Uuid,
    pub assigned_at: NaiveDateTime,
    pub assigned_by: Option<Uuid>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = document_allowed_users)]
pub struct NewDocumentAllowedUser {
    pub document_id: Uuid,
    pub user_id: Uuid,
    pub assigned_by: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = compliance_tasks)]
#[diesel(belongs_to(Document))]
pub struct ComplianceTask {
    pub id: Uuid,
    pub document_id: Uuid,
    pub department: String,
    pub due_date: NaiveDateTime,
    pub status: String,
    pub priority: String,
    pub compliance_type: String,
    pub description: String,
    pub assigned_to: Uuid,
    pub reminders: bool,
    pub reminder_sent: bool,
    pub last_reminder_sent: Option<NaiveDateTime>,
    pub resolution_notes: Option<String>,
    pub resolved_at: Option<NaiveDateTime>,
    pub resolved_by: Option<Uuid>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = compliance_tasks)]
pub struct NewComplianceTask {
    pub id: Uuid,
    pub document_id: Uuid,
    pub department: String,
    pub due_date: NaiveDateTime,
    pub status: String,
    pub priority: String,
    pub compliance_type: String,
    pub description: String,
    pub assigned_to: Uuid,
    pub reminders: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = knowledge_base_entries)]
#[diesel(belongs_to(Document))]
pub struct KnowledgeBaseEntry {
    pub id: Uuid,
    pub document_id: Uuid,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub embeddings: Vec<f64>,
    pub tags: Vec<String>,
    pub keywords: Vec<String>,
    pub category: String,
    pub department: String,
    pub language: String,
    pub is_active: bool,
    pub search_count: i32,
    pub last_accessed: Option<NaiveDateTime>,
    pub created_by: Uuid,
    pub updated_by: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = knowledge_base_entries)]
pub struct NewKnowledgeBaseEntry {
    pub id: Uuid,
    pub document_id: Uuid,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub embeddings: Vec<f64>,
    pub tags: Vec<String>,
    pub keywords: Vec<String>,
    pub category: String,
    pub department: String,
    pub language: String,
    pub created_by: Uuid,
}
