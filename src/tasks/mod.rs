use std::time::Duration;

use crate::services::QueueService;

/// 待上传报到记录的定时重试间隔
const CHECK_IN_FLUSH_INTERVAL: Duration = Duration::from_secs(300);

/// 启动后台定时任务。
/// 只重试报到记录：中奖记录的上传永远由操作员显式触发，
/// 后台任务绝不自动冲刷中奖队列。
pub fn spawn_all(queue: QueueService) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(CHECK_IN_FLUSH_INTERVAL).await;

            match queue.pending_check_ins() {
                Ok(pending) if pending.is_empty() => continue,
                Ok(pending) => {
                    log::info!("Retrying {} pending check-in(s)", pending.len());
                }
                Err(e) => {
                    log::error!("Failed to read pending check-ins: {e}");
                    continue;
                }
            }

            match queue.flush_check_ins().await {
                Ok(summary) if summary.failed > 0 => {
                    log::warn!(
                        "Check-in retry: {} uploaded, {} still pending",
                        summary.uploaded,
                        summary.failed
                    );
                }
                Ok(summary) => {
                    log::info!("Check-in retry: {} uploaded", summary.uploaded);
                }
                Err(e) => log::error!("Check-in retry failed: {e}"),
            }
        }
    });
}
