use crate::models::*;
use crate::services::{CheckInService, QueueService};
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/check-in",
    tag = "check_in",
    request_body = CheckInRequest,
    responses(
        (status = 200, description = "报到成功（synced 标记是否已同步远端）", body = CheckInResponse),
        (status = 400, description = "工号为空"),
        (status = 404, description = "找不到该工号的参与者")
    )
)]
/// 参与者报到:
/// 1. 按工号查找参与者
/// 2. 已报到则直接返回，不重复记录
/// 3. 本地状态先提交，再尝试即时上传远端
/// 4. 上传失败转入待上传队列，报到仍视为成功
pub async fn check_in(
    service: web::Data<CheckInService>,
    body: web::Json<CheckInRequest>,
) -> Result<HttpResponse> {
    match service.check_in(&body.participant_id).await {
        Ok(result) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": result }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/check-in/pending",
    tag = "check_in",
    responses(
        (status = 200, description = "待上传报到记录列表", body = [PendingCheckIn])
    )
)]
/// 查看待上传的报到记录
pub async fn pending_check_ins(queue: web::Data<QueueService>) -> Result<HttpResponse> {
    match queue.pending_check_ins() {
        Ok(list) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": list }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/check-in/flush",
    tag = "check_in",
    responses(
        (status = 200, description = "冲刷结果（成功的移出队列，失败的保留）", body = FlushSummary)
    )
)]
/// 手动上传待上传的报到记录
pub async fn flush_check_ins(queue: web::Data<QueueService>) -> Result<HttpResponse> {
    match queue.flush_check_ins().await {
        Ok(summary) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": summary }))),
        Err(e) => Ok(e.error_response()),
    }
}

/// 路由配置
pub fn check_in_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/check-in")
            .route("", web::post().to(check_in))
            .route("/pending", web::get().to(pending_check_ins))
            .route("/flush", web::post().to(flush_check_ins)),
    );
}
