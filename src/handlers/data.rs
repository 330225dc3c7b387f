use crate::models::*;
use crate::services::DataService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/participants",
    tag = "data",
    responses(
        (status = 200, description = "本地镜像中的参与者列表", body = [Participant])
    )
)]
/// 参与者列表（读本地镜像，不触网）
pub async fn get_participants(service: web::Data<DataService>) -> Result<HttpResponse> {
    match service.snapshot() {
        Ok(snap) => {
            Ok(HttpResponse::Ok().json(json!({ "success": true, "data": snap.participants })))
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/prizes",
    tag = "data",
    responses(
        (status = 200, description = "本地镜像中的奖项列表", body = [Prize])
    )
)]
/// 奖项列表（读本地镜像）
pub async fn get_prizes(service: web::Data<DataService>) -> Result<HttpResponse> {
    match service.snapshot() {
        Ok(snap) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": snap.prizes }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/winners",
    tag = "data",
    responses(
        (status = 200, description = "本地镜像中的中奖记录", body = [WinnerRecord])
    )
)]
/// 中奖记录列表（读本地镜像）
pub async fn get_winners(service: web::Data<DataService>) -> Result<HttpResponse> {
    match service.snapshot() {
        Ok(snap) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": snap.winners }))),
        Err(e) => Ok(e.error_response()),
    }
}

/// 路由配置
pub fn data_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/participants", web::get().to(get_participants))
        .route("/prizes", web::get().to(get_prizes))
        .route("/winners", web::get().to(get_winners));
}
