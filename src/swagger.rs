use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::models::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::check_in::check_in,
        handlers::check_in::pending_check_ins,
        handlers::check_in::flush_check_ins,
        handlers::data::get_participants,
        handlers::data::get_prizes,
        handlers::data::get_winners,
        handlers::draw::get_state,
        handlers::draw::select_prize,
        handlers::draw::next_prize,
        handlers::draw::previous_prize,
        handlers::draw::run_draw,
        handlers::draw::probability_test,
        handlers::admin::load_all,
        handlers::admin::overview,
        handlers::admin::refresh_local,
        handlers::admin::pending_winners,
        handlers::admin::flush_winners,
        handlers::admin::clear_pending_winners,
        handlers::admin::import_participants,
        handlers::admin::update_prize,
        handlers::admin::export_winners,
    ),
    components(
        schemas(
            Participant,
            Prize,
            PrizeMode,
            WinnerRecord,
            PendingCheckIn,
            CheckInRequest,
            CheckInResponse,
            SelectPrizeRequest,
            DrawRequest,
            DrawResult,
            DrawStateResponse,
            FlushSummary,
            ClearPendingRequest,
            PrizeRemaining,
            OverviewResponse,
            LoadSummary,
            ProbabilityTestRequest,
            ProbabilityEntry,
            ProbabilityTestResponse,
            ImportParticipantsRequest,
            UpdatePrizeRequest,
            ApiError,
        )
    ),
    tags(
        (name = "check_in", description = "参与者报到"),
        (name = "data", description = "本地镜像读取"),
        (name = "draw", description = "抽奖会话"),
        (name = "admin", description = "资料管理与待上传队列")
    ),
    info(
        title = "Lottery Backend API",
        version = "1.0.0",
        description = "活动报到与抽奖系统后端 API"
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
