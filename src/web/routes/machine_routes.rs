use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::header,
    response::{Html, IntoResponse},
    Form,
};
use serde::Deserialize;
use tracing::info;

use crate::store::{logs, MACHINE_PROFILES};
use crate::web::{error::AppError, AppState};

use super::{parse_index, parse_token, require};

/// Landing page: file-backed machines and SQL-backed tables to pick from.
pub async fn index_handler(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let machine_names: Vec<&String> = state.config.log_paths.keys().collect();
    let table_names: Vec<&str> = MACHINE_PROFILES.iter().map(|p| p.table).collect();

    let mut ctx = tera::Context::new();
    ctx.insert("machine_names", &machine_names);
    ctx.insert("table_names", &table_names);
    Ok(Html(state.templates.render("index.html", &ctx)?))
}

#[derive(Deserialize)]
pub struct DisplayJobsRequest {
    machine_name: Option<String>,
}

/// Build the job list for one machine's log tree and cache it under a fresh
/// token; the page addresses entries as (token, index) from here on.
pub async fn display_jobs_handler(
    State(state): State<Arc<AppState>>,
    Form(payload): Form<DisplayJobsRequest>,
) -> Result<Html<String>, AppError> {
    let machine_name = require(payload.machine_name, "machine_name")?;
    let root = state
        .config
        .log_paths
        .get(&machine_name)
        .ok_or_else(|| AppError::UnknownMachine(machine_name.clone()))?;

    let jobs = logs::build_job_list(root)?;
    info!(machine = %machine_name, jobs = jobs.len(), "built job list");
    let token = state.cache_job_list(machine_name.clone(), jobs.clone());

    let mut ctx = tera::Context::new();
    ctx.insert("machine_name", &machine_name);
    ctx.insert("token", &token.to_string());
    ctx.insert("logs", &jobs);
    Ok(Html(state.templates.render("display_jobs.html", &ctx)?))
}

#[derive(Deserialize)]
pub struct DownloadParams {
    token: Option<String>,
    index: Option<String>,
}

/// Stream one cached job's datalog back as an attachment.
pub async fn download_file_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DownloadParams>,
) -> Result<impl IntoResponse, AppError> {
    let token = parse_token(&require(params.token, "token")?)?;
    let index = parse_index(&require(params.index, "index")?)?;
    let entry = state.job_entry(token, index)?;

    let bytes = tokio::fs::read(&entry.path).await?;
    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", entry.file_name),
        ),
    ];
    Ok((headers, bytes))
}
