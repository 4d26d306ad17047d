//! Access-control evaluator.
//!
//! Two deliberately different rules coexist (see DESIGN.md):
//! - listing visibility: the four-rule disjunction in [`can_view`] /
//!   [`visibility_predicate`];
//! - point access (fetch/mutate a single resource): the coarser department
//!   check in [`can_act`], which does not consult `access`, `allowed_users`
//!   or `allowed_departments`.

use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_types::Bool;
use uuid::Uuid;

use crate::domain::document::AccessLevel;
use crate::models::Document;
use crate::schema::{document_allowed_users, documents};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    DepartmentUser,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::DepartmentUser => "department_user",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Role::Admin),
            "department_user" => Some(Role::DepartmentUser),
            _ => None,
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// The authenticated principal as the evaluator sees it.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
    pub department: Option<String>,
}

impl Actor {
    pub fn department(&self) -> Option<&str> {
        self.department.as_deref()
    }
}

/// Point check over a loaded document: may the actor view it in a listing?
///
/// `allowed_users` is the document's explicit grant set (meaningful for
/// `access = self` only).
pub fn can_view(actor: &Actor, document: &Document, allowed_users: &[Uuid]) -> bool {
    let Some(access) = AccessLevel::parse(&document.access) else {
        return false;
    };

    match access {
        AccessLevel::SelfOnly => {
            document.uploaded_by == actor.id || allowed_users.contains(&actor.id)
        }
        AccessLevel::Department => actor.department() == Some(document.department.as_str()),
        AccessLevel::CrossDepartment => {
            actor.role.is_admin()
                && actor
                    .department()
                    .map(|dept| document.allowed_departments.iter().any(|d| d == dept))
                    .unwrap_or(false)
        }
    }
}

/// Point-access rule for single-resource operations: admins act anywhere,
/// department users only inside their own department.
pub fn can_act(actor: &Actor, department: &str) -> bool {
    actor.role.is_admin() || actor.department() == Some(department)
}

pub type DocumentPredicate = Box<dyn BoxableExpression<documents::table, Pg, SqlType = Bool>>;

/// The listing visibility disjunction as a boxed SQL predicate, so handlers
/// can conjoin search/status filters without widening the visible set.
pub fn visibility_predicate(actor: &Actor) -> DocumentPredicate {
    let grants = document_allowed_users::table
        .filter(document_allowed_users::user_id.eq(actor.id))
        .select(document_allowed_users::document_id);

    let mut predicate: DocumentPredicate = Box::new(
        documents::access
            .eq(AccessLevel::SelfOnly.as_str())
            .and(documents::uploaded_by.eq(actor.id))
            .or(documents::access
                .eq(AccessLevel::SelfOnly.as_str())
                .and(documents::id.eq_any(grants))),
    );

    if let Some(department) = actor.department() {
        let department = department.to_string();
        predicate = Box::new(
            predicate.or(documents::access
                .eq(AccessLevel::Department.as_str())
                .and(documents::department.eq(department.clone()))),
        );

        if actor.role.is_admin() {
            predicate = Box::new(
                predicate.or(documents::access
                    .eq(AccessLevel::CrossDepartment.as_str())
                    .and(documents::allowed_departments.contains(vec![department]))),
            );
        }
    }

    predicate
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn actor(role: Role, department: Option<&str>) -> Actor {
        Actor {
            id: Uuid::new_v4(),
            role,
            department: department.map(|d| d.to_string()),
        }
    }

    fn document(access: AccessLevel, department: &str, uploaded_by: Uuid) -> Document {
        let now = Utc::now().naive_utc();
        Document {
            id: Uuid::new_v4(),
            title: "Q3 audit".into(),
            description: "quarterly audit pack".into(),
            category: "Audit".into(),
            language: None,
            priority: "Medium".into(),
            department: department.to_string(),
            status: "Pending Review".into(),
            access: access.as_str().to_string(),
            allowed_departments: Vec::new(),
            tags: Vec::new(),
            current_version: 1,
            uploaded_by,
            reviewed_by: None,
            reviewed_at: None,
            review_comments: None,
            is_archived: false,
            archive_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn uploader_sees_own_self_document() {
        let alice = actor(Role::DepartmentUser, Some("Finance"));
        let doc = document(AccessLevel::SelfOnly, "Finance", alice.id);
        assert!(can_view(&alice, &doc, &[]));
    }

    #[test]
    fn explicit_grant_extends_self_visibility() {
        let alice = actor(Role::DepartmentUser, Some("Finance"));
        let bob = actor(Role::DepartmentUser, Some("Finance"));
        let doc = document(AccessLevel::SelfOnly, "Finance", alice.id);
        assert!(!can_view(&bob, &doc, &[]));
        assert!(can_view(&bob, &doc, &[bob.id]));
    }

    #[test]
    fn department_access_is_scoped_to_the_owning_department() {
        let alice = actor(Role::DepartmentUser, Some("Finance"));
        let bob = actor(Role::DepartmentUser, Some("Finance"));
        let carl = actor(Role::DepartmentUser, Some("HR"));
        let doc = document(AccessLevel::Department, "Finance", alice.id);
        assert!(can_view(&bob, &doc, &[]));
        assert!(!can_view(&carl, &doc, &[]));
    }

    #[test]
    fn cross_department_is_admin_only() {
        let uploader = actor(Role::DepartmentUser, Some("Safety"));
        let mut doc = document(AccessLevel::CrossDepartment, "Safety", uploader.id);
        doc.allowed_departments = vec!["Engineering".into()];

        let eng_admin = actor(Role::Admin, Some("Engineering"));
        let eng_user = actor(Role::DepartmentUser, Some("Engineering"));
        let hr_admin = actor(Role::Admin, Some("HR"));

        assert!(can_view(&eng_admin, &doc, &[]));
        assert!(!can_view(&eng_user, &doc, &[]));
        assert!(!can_view(&hr_admin, &doc, &[]));
    }

    #[test]
    fn unknown_access_value_is_never_visible() {
        let alice = actor(Role::Admin, Some("Finance"));
        let mut doc = document(AccessLevel::Department, "Finance", alice.id);
        doc.access = "everyone".into();
        assert!(!can_view(&alice, &doc, &[]));
    }

    #[test]
    fn point_access_ignores_access_level() {
        let eng_user = actor(Role::DepartmentUser, Some("Engineering"));
        let admin = actor(Role::Admin, Some("HR"));
        assert!(can_act(&eng_user, "Engineering"));
        assert!(!can_act(&eng_user, "Safety"));
        assert!(can_act(&admin, "Safety"));
    }
}
