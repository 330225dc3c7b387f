use chrono::Utc;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::external::SheetsAPI;
use crate::models::{CheckInResponse, CheckInStatus, ParticipantPatch};
use crate::services::QueueService;
use crate::storage::LocalStore;

/// 报到流程：本地先提交，远端尽力而为。
/// 本地状态更新落盘后才尝试上传；上传失败只会让记录进入待上传队列，
/// 绝不回滚已提交的本地报到状态。
#[derive(Clone)]
pub struct CheckInService {
    store: Arc<LocalStore>,
    sheets: Arc<SheetsAPI>,
    queue: QueueService,
}

impl CheckInService {
    pub fn new(store: Arc<LocalStore>, sheets: Arc<SheetsAPI>, queue: QueueService) -> Self {
        Self {
            store,
            sheets,
            queue,
        }
    }

    pub async fn check_in(&self, participant_id: &str) -> AppResult<CheckInResponse> {
        let participant_id = participant_id.trim();
        if participant_id.is_empty() {
            return Err(AppError::ValidationError("请输入工号".to_string()));
        }

        let snapshot = self.store.snapshot()?;
        let participant = snapshot
            .participants
            .iter()
            .find(|p| p.id == participant_id)
            .ok_or_else(|| AppError::NotFound(format!("找不到工号「{participant_id}」的参与者")))?;

        // 已报到过：直接返回，不重复上传
        if participant.checked_in == CheckInStatus::CheckedIn {
            return Ok(CheckInResponse {
                name: participant.name.clone(),
                message: "您已经报到过了".to_string(),
                already_checked_in: true,
                synced: true,
            });
        }

        let name = participant.name.clone();
        let now = Utc::now();

        // 本地先提交（落盘即生效）
        self.store.update_participant(
            participant_id,
            &ParticipantPatch {
                checked_in: Some(CheckInStatus::CheckedIn),
                checked_date: Some(now.to_rfc3339()),
            },
        )?;

        // 尝试即时上传；失败则转入待上传队列
        match self.sheets.check_in(participant_id).await {
            Ok(remote) => {
                self.queue.remove_check_in(participant_id)?;
                Ok(CheckInResponse {
                    // 以试算表行为准：名单维护在远端，本地镜像可能落后
                    name: remote.name,
                    message: remote
                        .message
                        .unwrap_or_else(|| "报到成功（已同步）".to_string()),
                    already_checked_in: remote.already_checked_in,
                    synced: true,
                })
            }
            Err(e) => {
                log::warn!("即时上传报到失败，加入待上传队列 ({participant_id}): {e}");
                self.queue.enqueue_check_in(participant_id, now)?;
                Ok(CheckInResponse {
                    name,
                    message: "报到成功（待上传）".to_string(),
                    already_checked_in: false,
                    synced: false,
                })
            }
        }
    }
}
