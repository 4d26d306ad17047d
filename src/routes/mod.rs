use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod auth;
pub mod compliance;
pub mod dashboard;
pub mod documents;
pub mod employees;
pub mod health;
pub mod knowledge_base;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route(
            "/profile",
            get(auth::get_profile).put(auth::update_profile),
        )
        .route("/change-password", put(auth::change_password));

    let documents_routes = Router::new()
        .route(
            "/",
            get(documents::list_documents).post(documents::upload_document),
        )
        .route("/shared", get(documents::shared_documents))
        .route(
            "/:id",
            get(documents::get_document)
                .put(documents::update_document_status)
                .delete(documents::delete_document),
        )
        .route(
            "/:id/versions",
            get(documents::list_versions).post(documents::add_version),
        )
        .route("/:id/download", get(documents::download_document));

    let compliance_routes = Router::new()
        .route(
            "/",
            get(compliance::list_tasks).post(compliance::create_task),
        )
        .route("/overdue", get(compliance::overdue_tasks))
        .route("/due-soon", get(compliance::due_soon_tasks))
        .route("/stats", get(compliance::task_stats))
        .route(
            "/:id",
            get(compliance::get_task)
                .put(compliance::update_task_status)
                .patch(compliance::update_task)
                .delete(compliance::delete_task),
        );

    let dashboard_routes = Router::new()
        .route("/", get(dashboard::dashboard_stats))
        .route("/department/:department", get(dashboard::department_stats));

    let knowledge_base_routes = Router::new()
        .route("/", get(knowledge_base::list_entries))
        .route("/index", post(knowledge_base::index_document))
        .route("/search/semantic", get(knowledge_base::semantic_search))
        .route("/search/text", get(knowledge_base::text_search))
        .route("/stats", get(knowledge_base::entry_stats))
        .route(
            "/:id",
            get(knowledge_base::get_entry)
                .put(knowledge_base::update_entry)
                .delete(knowledge_base::delete_entry),
        );

    let employees_routes = Router::new()
        .route("/invite", post(employees::invite_employee))
        .route(
            "/department-employees",
            get(employees::department_employees),
        )
        .route(
            "/assign-document/:id",
            post(employees::assign_users_to_document),
        );

    // Uploads carry multipart overhead beyond the raw file size.
    let body_limit = state.config.max_upload_bytes + 1024 * 1024;

    Router::new()
        .nest("/auth", auth_routes)
        .nest("/documents", documents_routes)
        .nest("/compliance", compliance_routes)
        .nest("/dashboard", dashboard_routes)
        .nest("/knowledge-base", knowledge_base_routes)
        .nest("/employees", employees_routes)
        .route("/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(body_limit))
}
