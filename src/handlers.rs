use crate::errors::AppError;
use crate::models::DashboardView;
use crate::refresh::refresh_from_user;
use crate::state::AppState;
use crate::ui::render_dashboard;
use axum::{extract::State, response::Html, Json};

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let view = state.view().await;
    Html(render_dashboard(&view))
}

pub async fn get_view(State(state): State<AppState>) -> Json<DashboardView> {
    Json(state.view().await)
}

pub async fn refresh(State(state): State<AppState>) -> Result<Json<DashboardView>, AppError> {
    refresh_from_user(&state).await?;
    Ok(Json(state.view().await))
}
