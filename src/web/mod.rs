use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::{
    response::Redirect,
    routing::get,
    Router,
};
use dashmap::DashMap;
use sqlx::SqlitePool;
use tera::Tera;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::store::logs::JobEntry;
use crate::web::error::AppError;

pub mod error;
pub mod routes;

/// Upper bound on cached job listings; the oldest age out beyond this.
pub const MAX_CACHED_JOB_LISTS: usize = 64;

/// Job list computed by `/display_jobs`, addressed by later requests as
/// (token, index). Keyed per listing so concurrent users never see each
/// other's selections.
#[derive(Debug, Clone)]
pub struct CachedJobList {
    pub machine: String,
    pub jobs: Vec<JobEntry>,
}

pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: SqlitePool,
    pub templates: Tera,
    pub job_lists: DashMap<Uuid, CachedJobList>,
    recent_tokens: Mutex<VecDeque<Uuid>>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, db: SqlitePool, templates: Tera) -> Self {
        AppState {
            config,
            db,
            templates,
            job_lists: DashMap::new(),
            recent_tokens: Mutex::new(VecDeque::new()),
        }
    }

    /// Store a freshly computed job list and hand back its token. Listings
    /// beyond `MAX_CACHED_JOB_LISTS` evict the oldest one.
    pub fn cache_job_list(&self, machine: String, jobs: Vec<JobEntry>) -> Uuid {
        let token = Uuid::new_v4();
        self.job_lists.insert(token, CachedJobList { machine, jobs });
        let mut recent = self.recent_tokens.lock().expect("job list queue poisoned");
        recent.push_back(token);
        while recent.len() > MAX_CACHED_JOB_LISTS {
            if let Some(stale) = recent.pop_front() {
                self.job_lists.remove(&stale);
            }
        }
        token
    }

    /// Resolve a (token, index) pair to a cached job entry.
    pub fn job_entry(&self, token: Uuid, index: usize) -> Result<JobEntry, AppError> {
        let list = self.job_lists.get(&token).ok_or(AppError::JobListExpired)?;
        list.jobs
            .get(index)
            .cloned()
            .ok_or_else(|| AppError::InvalidInput(format!("job index {index} out of range")))
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    // Subdirectory deployments register every route under the configured
    // prefix. The canonical index is "{prefix}/" (trailing slash) so the
    // pages' relative links resolve below the prefix; the bare prefix
    // redirects there.
    let prefix = match state.config.url_prefix.as_deref() {
        Some(p) if !p.is_empty() && p != "/" => p.trim_end_matches('/').to_string(),
        _ => String::new(),
    };

    // Form-based handlers read the query string on GET and the body on
    // POST, so one handler covers both methods.
    let mut router = Router::new()
        .route(
            &format!("{prefix}/"),
            get(routes::machine_routes::index_handler),
        )
        .route(
            &format!("{prefix}/display_jobs"),
            get(routes::machine_routes::display_jobs_handler)
                .post(routes::machine_routes::display_jobs_handler),
        )
        .route(
            &format!("{prefix}/download_file"),
            get(routes::machine_routes::download_file_handler)
                .post(routes::machine_routes::download_file_handler),
        )
        .route(
            &format!("{prefix}/static_plot"),
            get(routes::plot_routes::static_plot_handler)
                .post(routes::plot_routes::static_plot_handler),
        )
        .route(
            &format!("{prefix}/show_plot"),
            get(routes::plot_routes::show_plot_handler)
                .post(routes::plot_routes::show_plot_handler),
        )
        .route(
            &format!("{prefix}/recipe_plots"),
            get(routes::plot_routes::recipe_plots_form)
                .post(routes::plot_routes::recipe_plots_handler),
        )
        .route(
            &format!("{prefix}/recipe_frequency"),
            get(routes::plot_routes::recipe_frequency_form)
                .post(routes::plot_routes::recipe_frequency_handler),
        );

    if !prefix.is_empty() {
        let target = format!("{prefix}/");
        router = router.route(
            prefix.as_str(),
            get(move || {
                let target = target.clone();
                async move { Redirect::temporary(&target) }
            }),
        );
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn job_list_cache_evicts_oldest_beyond_cap() {
        let state = AppState::new(
            Arc::new(AppConfig::default()),
            SqlitePoolOptions::new().connect_lazy(":memory:").unwrap(),
            Tera::default(),
        );
        let first = state.cache_job_list("orion_logs".to_string(), Vec::new());
        for _ in 0..MAX_CACHED_JOB_LISTS {
            state.cache_job_list("orion_logs".to_string(), Vec::new());
        }
        assert_eq!(state.job_lists.len(), MAX_CACHED_JOB_LISTS);
        assert!(state.job_lists.get(&first).is_none());
        // Tokens still in the window keep resolving.
        let fresh = state.cache_job_list("orion_logs".to_string(), Vec::new());
        assert!(state.job_lists.get(&fresh).is_some());
    }
}
