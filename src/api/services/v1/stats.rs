use actix_web::{HttpResponse, web};

use crate::services::{Actor, AppServices};

use super::helpers::api_result;

/// GET /stats，仪表盘计数
pub async fn get_stats(services: web::Data<AppServices>, actor: Actor) -> HttpResponse {
    api_result(services.stats.dashboard(&actor.agency_id).await)
}
