use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use lottery_backend::{
    config::Config,
    external::SheetsAPI,
    handlers,
    middlewares::create_cors,
    services::*,
    storage::LocalStore,
    swagger::swagger_config,
    tasks,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml().expect("Failed to load configuration file");

    // 打开本地状态存储（崩溃后重启从这里恢复已提交状态）
    let store = Arc::new(
        LocalStore::open(&config.storage.dir).expect("Failed to open local state directory"),
    );

    // 远端试算表 RPC 客户端
    let sheets =
        Arc::new(SheetsAPI::new(config.remote.clone()).expect("Failed to build remote API client"));

    // 创建服务
    let queue_service = QueueService::new(store.clone(), sheets.clone());
    let check_in_service = CheckInService::new(store.clone(), sheets.clone(), queue_service.clone());
    let draw_service = DrawService::new(store.clone(), queue_service.clone(), config.draw.admin.clone());
    let data_service = DataService::new(store.clone(), sheets.clone(), queue_service.clone());

    // 启动后台定时任务（只重试报到记录，中奖记录须操作员显式上传）
    tasks::spawn_all(queue_service.clone());

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors())
            .app_data(web::Data::new(queue_service.clone()))
            .app_data(web::Data::new(check_in_service.clone()))
            .app_data(web::Data::new(draw_service.clone()))
            .app_data(web::Data::new(data_service.clone()))
            .configure(swagger_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::check_in_config)
                    .configure(handlers::data_config)
                    .configure(handlers::draw_config)
                    .configure(handlers::admin_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
