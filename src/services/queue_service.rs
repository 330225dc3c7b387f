use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::AppResult;
use crate::external::SheetsAPI;
use crate::models::{FlushSummary, PendingCheckIn, WinnerRecord};
use crate::storage::LocalStore;

/// 待上传队列：本地已提交、远端尚未确认的报到与中奖记录。
///
/// 至少一次投递语义：条目只有在远端确认后才移出队列，失败保留待重试。
/// 中奖记录永远不由定时器自动冲刷，必须操作员显式触发；
/// 报到记录在产生时即时尝试上传，失败才落入队列，之后可手动或定时重试。
#[derive(Clone)]
pub struct QueueService {
    store: Arc<LocalStore>,
    sheets: Arc<SheetsAPI>,
}

impl QueueService {
    pub fn new(store: Arc<LocalStore>, sheets: Arc<SheetsAPI>) -> Self {
        Self { store, sheets }
    }

    pub fn pending_check_ins(&self) -> AppResult<Vec<PendingCheckIn>> {
        self.store.pending_check_ins()
    }

    pub fn pending_winners(&self) -> AppResult<Vec<WinnerRecord>> {
        self.store.pending_winners()
    }

    /// 入队报到（按工号去重）
    pub fn enqueue_check_in(&self, participant_id: &str, timestamp: DateTime<Utc>) -> AppResult<bool> {
        self.store.enqueue_check_in(participant_id, timestamp)
    }

    /// 即时上传成功后移除可能残留的同笔队列项
    pub fn remove_check_in(&self, participant_id: &str) -> AppResult<()> {
        self.store.remove_check_ins(&[participant_id.to_string()])
    }

    /// 入队中奖记录（按自然键去重）
    pub fn enqueue_winners(&self, records: &[WinnerRecord]) -> AppResult<usize> {
        self.store.enqueue_winners(records)
    }

    /// 逐笔上传待上传报到记录；成功的移出队列，失败的保留
    pub async fn flush_check_ins(&self) -> AppResult<FlushSummary> {
        let pending = self.store.pending_check_ins()?;
        if pending.is_empty() {
            return Ok(FlushSummary {
                uploaded: 0,
                failed: 0,
                message: "没有待上传的报到记录".to_string(),
            });
        }

        let mut uploaded: Vec<String> = Vec::new();
        let mut failed = 0usize;
        for item in &pending {
            match self.sheets.check_in(&item.participant_id).await {
                Ok(_) => uploaded.push(item.participant_id.clone()),
                Err(e) => {
                    log::error!("上传报到记录失败 ({}): {e}", item.participant_id);
                    failed += 1;
                }
            }
        }
        self.store.remove_check_ins(&uploaded)?;

        Ok(summary(uploaded.len(), failed, "报到记录"))
    }

    /// 上传待上传中奖记录：优先整批上传，失败回退到逐笔上传。
    /// 成功上传的记录同时做一次幂等的 won 状态回填。
    pub async fn flush_winners(&self) -> AppResult<FlushSummary> {
        let pending = self.store.pending_winners()?;
        if pending.is_empty() {
            return Ok(FlushSummary {
                uploaded: 0,
                failed: 0,
                message: "没有待上传的中奖记录".to_string(),
            });
        }

        match self.sheets.append_winners(&pending).await {
            Ok(()) => {
                // 只移除本次读到的那批，冲刷期间新产生的条目不受影响
                self.store.remove_winners(&pending)?;
                self.store.apply_winners(&pending)?;
                return Ok(summary(pending.len(), 0, "中奖记录"));
            }
            Err(e) => {
                log::warn!("批次上传中奖记录失败，改为逐笔上传: {e}");
            }
        }

        let mut uploaded: Vec<WinnerRecord> = Vec::new();
        let mut failed = 0usize;
        for record in &pending {
            match self.sheets.append_winner(record).await {
                Ok(()) => uploaded.push(record.clone()),
                Err(e) => {
                    log::error!(
                        "上传中奖记录失败 ({} / {}): {e}",
                        record.prize_id,
                        record.participant_id
                    );
                    failed += 1;
                }
            }
        }
        if !uploaded.is_empty() {
            self.store.remove_winners(&uploaded)?;
            self.store.apply_winners(&uploaded)?;
        }

        Ok(summary(uploaded.len(), failed, "中奖记录"))
    }

    /// 丢弃全部待上传中奖记录。不可逆：被丢弃的条目此后无法再上传，
    /// 已上传到远端的数据不受影响。调用方必须先取得操作员确认。
    pub fn clear_pending_winners(&self) -> AppResult<usize> {
        let discarded = self.store.clear_pending_winners()?;
        log::info!("已清除待上传中奖记录: {discarded} 笔");
        Ok(discarded)
    }
}

fn summary(uploaded: usize, failed: usize, what: &str) -> FlushSummary {
    let message = if failed == 0 {
        format!("成功上传 {uploaded} 条{what}")
    } else {
        format!("成功上传 {uploaded} 条，失败 {failed} 条")
    };
    FlushSummary {
        uploaded,
        failed,
        message,
    }
}
