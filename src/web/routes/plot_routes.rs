use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::header,
    response::{Html, IntoResponse},
    Form,
};
use serde::Deserialize;
use tracing::debug;

use crate::plot::{aggregate, render};
use crate::store::{logs, profile_for_table, sql, SampleTable, MACHINE_PROFILES};
use crate::web::{error::AppError, AppState};

use super::{parse_index, parse_token, require};

#[derive(Deserialize)]
pub struct StaticPlotParams {
    // File variant: a cached job addressed by (token, index).
    token: Option<String>,
    index: Option<String>,
    // SQL variant: a machine table filtered by recipe substring.
    table_name: Option<String>,
    recipe: Option<String>,
    x_scale: Option<f64>,
}

/// Render the selected samples as a static PNG.
pub async fn static_plot_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StaticPlotParams>,
) -> Result<impl IntoResponse, AppError> {
    let table = load_samples(&state, &params).await?;
    let chart = aggregate::aggregate(&table, params.x_scale.unwrap_or(1.0));
    debug!(subplots = chart.subplots.len(), "rendering static plot");
    let png = render::render_png(&chart, render::DEFAULT_SIZE)?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

/// Both adapters produce the same tabular shape; the request decides which
/// one runs.
async fn load_samples(
    state: &AppState,
    params: &StaticPlotParams,
) -> Result<SampleTable, AppError> {
    if let Some(table_name) = &params.table_name {
        let profile = profile_for_table(table_name)
            .ok_or_else(|| AppError::UnknownTable(table_name.clone()))?;
        let recipe = require(params.recipe.clone(), "recipe")?;
        Ok(sql::fetch_samples(&state.db, profile, &recipe).await?)
    } else {
        let token = parse_token(&require(params.token.clone(), "token")?)?;
        let index = parse_index(&require(params.index.clone(), "index")?)?;
        let entry = state.job_entry(token, index)?;
        Ok(logs::read_log(&entry.path)?)
    }
}

#[derive(Deserialize)]
pub struct ShowPlotRequest {
    machine_name: Option<String>,
    token: Option<String>,
    index: Option<String>,
}

/// Page for one job: its recipe steps with the static chart embedded.
pub async fn show_plot_handler(
    State(state): State<Arc<AppState>>,
    Form(payload): Form<ShowPlotRequest>,
) -> Result<Html<String>, AppError> {
    let machine_name = require(payload.machine_name, "machine_name")?;
    let token_raw = require(payload.token, "token")?;
    let token = parse_token(&token_raw)?;
    let index = parse_index(&require(payload.index, "index")?)?;
    let entry = state.job_entry(token, index)?;

    let mut ctx = tera::Context::new();
    ctx.insert("machine_name", &machine_name);
    ctx.insert("job", &entry.job);
    ctx.insert("recipes", &entry.recipe);
    ctx.insert("token", &token_raw);
    ctx.insert("index", &index);
    Ok(Html(state.templates.render("show_plots.html", &ctx)?))
}

#[derive(Deserialize)]
pub struct RecipePlotsRequest {
    table_name: Option<String>,
    recipe: Option<String>,
    x_scale: Option<f64>,
}

/// Selection form for the interactive chart.
pub async fn recipe_plots_form(
    State(state): State<Arc<AppState>>,
) -> Result<Html<String>, AppError> {
    let mut ctx = tera::Context::new();
    ctx.insert("table_names", &table_names());
    Ok(Html(state.templates.render("recipe_plots.html", &ctx)?))
}

/// Interactive variant: the chart goes into the page as an inline SVG
/// fragment rather than a linked image.
pub async fn recipe_plots_handler(
    State(state): State<Arc<AppState>>,
    Form(payload): Form<RecipePlotsRequest>,
) -> Result<Html<String>, AppError> {
    let table_name = require(payload.table_name, "table_name")?;
    let profile = profile_for_table(&table_name)
        .ok_or_else(|| AppError::UnknownTable(table_name.clone()))?;
    let recipe = require(payload.recipe, "recipe")?;

    let table = sql::fetch_samples(&state.db, profile, &recipe).await?;
    let chart = aggregate::aggregate(&table, payload.x_scale.unwrap_or(1.0));
    let chart_svg = render::render_svg(&chart, render::DEFAULT_SIZE)?;

    let mut ctx = tera::Context::new();
    ctx.insert("table_names", &table_names());
    ctx.insert("table_name", &table_name);
    ctx.insert("recipe", &recipe);
    ctx.insert("chart_svg", &chart_svg);
    Ok(Html(state.templates.render("recipe_plots.html", &ctx)?))
}

#[derive(Deserialize)]
pub struct RecipeFrequencyRequest {
    table_name: Option<String>,
}

pub async fn recipe_frequency_form(
    State(state): State<Arc<AppState>>,
) -> Result<Html<String>, AppError> {
    let mut ctx = tera::Context::new();
    ctx.insert("table_names", &table_names());
    Ok(Html(state.templates.render("recipe_frequency.html", &ctx)?))
}

/// How often each recipe has been run, counted over distinct
/// (recipe, job, layer) tuples with an open shutter.
pub async fn recipe_frequency_handler(
    State(state): State<Arc<AppState>>,
    Form(payload): Form<RecipeFrequencyRequest>,
) -> Result<Html<String>, AppError> {
    let table_name = require(payload.table_name, "table_name")?;
    let profile = profile_for_table(&table_name)
        .ok_or_else(|| AppError::UnknownTable(table_name.clone()))?;
    let frequency = sql::recipe_frequency(&state.db, profile).await?;

    let mut ctx = tera::Context::new();
    ctx.insert("table_names", &table_names());
    ctx.insert("table_name", &table_name);
    ctx.insert("columns", &frequency.columns);
    ctx.insert("rows", &frequency.rows);
    Ok(Html(state.templates.render("recipe_frequency.html", &ctx)?))
}

fn table_names() -> Vec<&'static str> {
    MACHINE_PROFILES.iter().map(|p| p.table).collect()
}
