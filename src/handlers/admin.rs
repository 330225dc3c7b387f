use crate::error::AppError;
use crate::models::*;
use crate::services::{DataService, QueueService};
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/admin/load",
    tag = "admin",
    responses(
        (status = 200, description = "三张表全部载入成功", body = LoadSummary),
        (status = 502, description = "远端拉取失败，本地数据保持不变")
    )
)]
/// 「载入所有资料」：并发拉取参与者 / 奖项 / 中奖记录并替换本地镜像
pub async fn load_all(service: web::Data<DataService>) -> Result<HttpResponse> {
    match service.load_all().await {
        Ok(summary) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": summary }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/overview",
    tag = "admin",
    responses(
        (status = 200, description = "管理面板总览", body = OverviewResponse)
    )
)]
/// 总览：人数、报到数、各奖项剩余名额与待上传队列深度
pub async fn overview(service: web::Data<DataService>) -> Result<HttpResponse> {
    match service.overview() {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/refresh",
    tag = "admin",
    responses(
        (status = 200, description = "已吸收外部写入后的总览", body = OverviewResponse)
    )
)]
/// 重载其它进程对本地目录的写入后返回总览
pub async fn refresh_local(service: web::Data<DataService>) -> Result<HttpResponse> {
    match service.refresh_local() {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/winners/pending",
    tag = "admin",
    responses(
        (status = 200, description = "待上传中奖记录列表", body = [WinnerRecord])
    )
)]
/// 查看待上传的中奖记录
pub async fn pending_winners(queue: web::Data<QueueService>) -> Result<HttpResponse> {
    match queue.pending_winners() {
        Ok(list) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": list }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/winners/flush",
    tag = "admin",
    responses(
        (status = 200, description = "冲刷结果（批次失败时自动回退逐笔上传）", body = FlushSummary)
    )
)]
/// 上传待上传的中奖记录（中奖记录永远不自动冲刷，只能由此显式触发）
pub async fn flush_winners(queue: web::Data<QueueService>) -> Result<HttpResponse> {
    match queue.flush_winners().await {
        Ok(summary) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": summary }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/winners/clear-pending",
    tag = "admin",
    request_body = ClearPendingRequest,
    responses(
        (status = 200, description = "已丢弃的记录数"),
        (status = 400, description = "未确认（confirm 必须为 true）")
    )
)]
/// 丢弃全部待上传中奖记录。不可逆，必须显式确认
pub async fn clear_pending_winners(
    queue: web::Data<QueueService>,
    body: web::Json<ClearPendingRequest>,
) -> Result<HttpResponse> {
    if !body.confirm {
        let e = AppError::ValidationError("清除待上传记录不可逆，confirm 必须为 true".to_string());
        return Ok(e.error_response());
    }
    match queue.clear_pending_winners() {
        Ok(discarded) => {
            Ok(HttpResponse::Ok().json(json!({ "success": true, "data": { "discarded": discarded } })))
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/participants/import",
    tag = "admin",
    request_body = ImportParticipantsRequest,
    responses(
        (status = 200, description = "导入成功并完成整体重载", body = LoadSummary),
        (status = 502, description = "远端导入失败")
    )
)]
/// 名单导入：透传远端成功后整体重载本地镜像
pub async fn import_participants(
    service: web::Data<DataService>,
    body: web::Json<ImportParticipantsRequest>,
) -> Result<HttpResponse> {
    match service.import_participants(&body.participants).await {
        Ok(summary) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": summary }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/prizes/update",
    tag = "admin",
    request_body = UpdatePrizeRequest,
    responses(
        (status = 200, description = "更新成功并完成整体重载", body = LoadSummary),
        (status = 502, description = "远端更新失败")
    )
)]
/// 奖项字段更新：透传远端成功后整体重载本地镜像
pub async fn update_prize(
    service: web::Data<DataService>,
    body: web::Json<UpdatePrizeRequest>,
) -> Result<HttpResponse> {
    match service.update_prize(&body.prize_id, &body.updates).await {
        Ok(summary) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": summary }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/winners/export",
    tag = "admin",
    responses(
        (status = 200, description = "远端导出的中奖名单"),
        (status = 502, description = "远端导出失败")
    )
)]
/// 导出中奖名单（由远端生成）
pub async fn export_winners(service: web::Data<DataService>) -> Result<HttpResponse> {
    match service.export_winners().await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

/// 路由配置
pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/load", web::post().to(load_all))
            .route("/overview", web::get().to(overview))
            .route("/refresh", web::post().to(refresh_local))
            .route("/winners/pending", web::get().to(pending_winners))
            .route("/winners/flush", web::post().to(flush_winners))
            .route("/winners/clear-pending", web::post().to(clear_pending_winners))
            .route("/winners/export", web::get().to(export_winners))
            .route("/participants/import", web::post().to(import_participants))
            .route("/prizes/update", web::post().to(update_prize)),
    );
}
