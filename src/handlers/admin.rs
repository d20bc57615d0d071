use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Form, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{AuthRouterExt, AuthUser, STAFF_ROLE};
use crate::errors::{ApiError, ServiceError};
use crate::handlers::common::{flash, map_service_error, see_other, success_response};
use crate::i18n::Language;
use crate::services::dashboard::DashboardSummary;
use crate::services::orders::{status_choices, OrderWithItems, StatusChoice};
use crate::session::{messages::FlashMessage, Session};
use crate::AppState;

/// Staff dashboard routes; every route requires a staff bearer token.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin-dashboard", get(dashboard))
        .route("/admin-dashboard/order/:id", get(order_detail))
        .route("/admin-dashboard/order/:id/update", post(update_order_status))
        .with_role(STAFF_ROLE)
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
struct DashboardView {
    #[serde(flatten)]
    summary: DashboardSummary,
    messages: Vec<FlashMessage>,
}

#[derive(Debug, Serialize)]
struct OrderDetailView {
    #[serde(flatten)]
    order: OrderWithItems,
    status_choices: Vec<StatusChoice>,
}

async fn dashboard(
    State(state): State<AppState>,
    lang: Language,
    session: Session,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .services
        .dashboard
        .summary(lang)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(DashboardView {
        summary,
        messages: flash(&session).await?,
    }))
}

async fn order_detail(
    State(state): State<AppState>,
    lang: Language,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .get_order(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(OrderDetailView {
        order,
        status_choices: status_choices(lang),
    }))
}

/// Change an order's status. Unknown statuses only queue an error message;
/// both outcomes land back on the dashboard.
async fn update_order_status(
    State(state): State<AppState>,
    lang: Language,
    session: Session,
    user: AuthUser,
    Path(id): Path<i32>,
    Form(form): Form<StatusForm>,
) -> Result<impl IntoResponse, ApiError> {
    match state
        .services
        .orders
        .update_status(&session, id, form.status.as_deref(), lang)
        .await
    {
        Ok(order) => {
            info!(order_id = order.id, staff = %user.username, "Staff changed order status");
        }
        Err(ServiceError::InvalidStatus(_)) => {}
        Err(e) => return Err(map_service_error(e)),
    }

    Ok(see_other("/admin-dashboard"))
}
