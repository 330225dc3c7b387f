use std::sync::Arc;

use crate::error::AppResult;
use crate::external::SheetsAPI;
use crate::models::{LoadSummary, OverviewResponse, Participant, PrizeRemaining};
use crate::services::QueueService;
use crate::storage::{LocalStore, StoreSnapshot};
use crate::utils::eligibility;

/// 资料管理：全量载入、总览、名单导入与奖项维护的远端透传。
/// 写类操作（导入 / 更新奖项）一律透传远端后整体重载，
/// 本地镜像不做细粒度合并，远端试算表是唯一权威来源。
#[derive(Clone)]
pub struct DataService {
    store: Arc<LocalStore>,
    sheets: Arc<SheetsAPI>,
    queue: QueueService,
}

impl DataService {
    pub fn new(store: Arc<LocalStore>, sheets: Arc<SheetsAPI>, queue: QueueService) -> Self {
        Self {
            store,
            sheets,
            queue,
        }
    }

    /// 「载入所有资料」：并发拉取三张表，全部成功才替换本地镜像。
    /// 任何一张表失败则本地数据保持不变。
    pub async fn load_all(&self) -> AppResult<LoadSummary> {
        let (participants, prizes, winners) = tokio::try_join!(
            self.sheets.get_participants(),
            self.sheets.get_prizes(),
            self.sheets.get_winners(),
        )?;

        let summary = LoadSummary {
            participants: participants.len(),
            prizes: prizes.len(),
            winners: winners.len(),
        };
        self.store.replace_all(participants, prizes, winners)?;

        log::info!(
            "Data loaded: {} participants, {} prizes, {} winners",
            summary.participants,
            summary.prizes,
            summary.winners
        );
        Ok(summary)
    }

    pub fn snapshot(&self) -> AppResult<StoreSnapshot> {
        self.store.snapshot()
    }

    /// 管理面板总览：人数、报到数、各奖项名额与待上传队列深度
    pub fn overview(&self) -> AppResult<OverviewResponse> {
        let snapshot = self.store.snapshot()?;
        let prize_remaining = snapshot
            .prizes
            .iter()
            .map(|p| PrizeRemaining {
                prize_id: p.prize_id.clone(),
                prize_title: p.prize_title.clone(),
                quantity: p.quantity,
                remaining: eligibility::remaining(p, &snapshot.winners),
            })
            .collect();

        Ok(OverviewResponse {
            participants: snapshot.participants.len(),
            checked_in: snapshot
                .participants
                .iter()
                .filter(|p| p.checked_in.is_draw_eligible())
                .count(),
            prizes: snapshot.prizes.len(),
            winners: snapshot.winners.len(),
            pending_check_ins: self.queue.pending_check_ins()?.len(),
            pending_winners: self.queue.pending_winners()?.len(),
            data_loaded: snapshot.data_loaded,
            data_loaded_at: snapshot.data_loaded_at,
            prize_remaining,
        })
    }

    /// 吸收其它进程对本地目录的写入后返回最新总览
    pub fn refresh_local(&self) -> AppResult<OverviewResponse> {
        self.store.sync_external_changes()?;
        self.overview()
    }

    /// 名单导入：透传远端成功后整体重载
    pub async fn import_participants(&self, participants: &[Participant]) -> AppResult<LoadSummary> {
        self.sheets.import_participants(participants).await?;
        self.load_all().await
    }

    /// 奖项字段更新：透传远端成功后整体重载
    pub async fn update_prize(
        &self,
        prize_id: &str,
        updates: &serde_json::Value,
    ) -> AppResult<LoadSummary> {
        self.sheets.update_prize(prize_id, updates).await?;
        self.load_all().await
    }

    pub async fn export_winners(&self) -> AppResult<serde_json::Value> {
        self.sheets.export_winners().await
    }
}
