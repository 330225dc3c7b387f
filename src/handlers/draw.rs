use crate::models::*;
use crate::services::DrawService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/draw/state",
    tag = "draw",
    responses(
        (status = 200, description = "当前抽奖会话状态", body = DrawStateResponse)
    )
)]
/// 获取抽奖会话状态（当前奖项、剩余名额、上一次结果）
pub async fn get_state(service: web::Data<DrawService>) -> Result<HttpResponse> {
    match service.state() {
        Ok(state) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": state }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/draw/select",
    tag = "draw",
    request_body = SelectPrizeRequest,
    responses(
        (status = 200, description = "切换成功", body = DrawStateResponse),
        (status = 404, description = "找不到该奖项")
    )
)]
/// 选定当前奖项；batch 奖项的抽取人数默认设为剩余名额
pub async fn select_prize(
    service: web::Data<DrawService>,
    body: web::Json<SelectPrizeRequest>,
) -> Result<HttpResponse> {
    match service.select_prize(&body.prize_id) {
        Ok(state) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": state }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/draw/next",
    tag = "draw",
    responses(
        (status = 200, description = "切换到下一个奖项", body = DrawStateResponse)
    )
)]
/// 按 order 升序循环切换到下一个奖项
pub async fn next_prize(service: web::Data<DrawService>) -> Result<HttpResponse> {
    match service.next_prize() {
        Ok(state) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": state }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/draw/previous",
    tag = "draw",
    responses(
        (status = 200, description = "切换到上一个奖项", body = DrawStateResponse)
    )
)]
/// 切换到上一个奖项
pub async fn previous_prize(service: web::Data<DrawService>) -> Result<HttpResponse> {
    match service.previous_prize() {
        Ok(state) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": state }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/draw/run",
    tag = "draw",
    request_body = DrawRequest,
    responses(
        (status = 200, description = "抽奖完成", body = DrawResult),
        (status = 400, description = "奖项已抽完或尚未选择奖项"),
        (status = 409, description = "没有可抽选的参与者")
    )
)]
/// 执行一次抽奖:
/// 1. 名额检查（已抽完直接拒绝，不触发随机决策）
/// 2. 资格过滤 + 排除集（已中奖者全局排除）
/// 3. CSPRNG 抽选，batch 人数钳到剩余名额
/// 4. 本地提交中奖记录并加入待上传队列
pub async fn run_draw(
    service: web::Data<DrawService>,
    body: web::Json<DrawRequest>,
) -> Result<HttpResponse> {
    match service.draw(body.batch_count) {
        Ok(result) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": result }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/draw/probability-test",
    tag = "draw",
    request_body = ProbabilityTestRequest,
    responses(
        (status = 200, description = "模拟统计结果", body = ProbabilityTestResponse),
        (status = 400, description = "参数超出范围"),
        (status = 409, description = "没有已报到的参与者")
    )
)]
/// 机率测试：对已报到人群做大量独立模拟，统计每人命中频率（只读）
pub async fn probability_test(
    service: web::Data<DrawService>,
    body: web::Json<ProbabilityTestRequest>,
) -> Result<HttpResponse> {
    match service.probability_test(&body) {
        Ok(result) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": result }))),
        Err(e) => Ok(e.error_response()),
    }
}

/// 路由配置
pub fn draw_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/draw")
            .route("/state", web::get().to(get_state))
            .route("/select", web::post().to(select_prize))
            .route("/next", web::post().to(next_prize))
            .route("/previous", web::post().to(previous_prize))
            .route("/run", web::post().to(run_draw))
            .route("/probability-test", web::post().to(probability_test)),
    );
}
