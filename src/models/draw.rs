use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{Participant, Prize, WinnerRecord};

/// 报到请求
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckInRequest {
    /// 工号
    pub participant_id: String,
}

/// 报到结果
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckInResponse {
    pub name: String,
    pub message: String,
    /// 此前已报到过（不重复上传）
    pub already_checked_in: bool,
    /// 是否已即时同步到远端（false = 已进入待上传队列）
    pub synced: bool,
}

/// 切换当前奖项
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SelectPrizeRequest {
    pub prize_id: String,
}

/// 执行抽奖
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct DrawRequest {
    /// batch 模式的抽取人数（缺省使用会话中的值）
    #[serde(default)]
    pub batch_count: Option<u32>,
}

/// 一次抽奖的结果
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DrawResult {
    pub prize_id: String,
    pub prize_title: String,
    pub prize_name: String,
    pub winners: Vec<WinnerRecord>,
    /// 本奖项抽完后的剩余名额（null = 不限量）
    pub remaining: Option<u32>,
}

/// 抽奖会话状态
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DrawStateResponse {
    pub current_prize: Option<Prize>,
    /// 当前奖项剩余名额（null = 不限量或未选择奖项）
    pub remaining: Option<u32>,
    pub unlimited: bool,
    pub is_drawing: bool,
    pub can_draw: bool,
    pub batch_count: u32,
    pub last_result: Option<DrawResult>,
}

/// 待上传队列冲刷结果
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FlushSummary {
    pub uploaded: usize,
    pub failed: usize,
    pub message: String,
}

/// 清空待上传中奖记录（不可逆，须显式确认）
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ClearPendingRequest {
    /// 必须为 true；被丢弃的记录此后无法再上传
    pub confirm: bool,
}

/// 单个奖项的名额使用情况
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PrizeRemaining {
    pub prize_id: String,
    pub prize_title: String,
    pub quantity: u32,
    /// null = 不限量
    pub remaining: Option<u32>,
}

/// 管理面板总览
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OverviewResponse {
    pub participants: usize,
    pub checked_in: usize,
    pub prizes: usize,
    pub winners: usize,
    pub pending_check_ins: usize,
    pub pending_winners: usize,
    pub data_loaded: bool,
    pub data_loaded_at: Option<DateTime<Utc>>,
    pub prize_remaining: Vec<PrizeRemaining>,
}

/// 全量载入结果
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoadSummary {
    pub participants: usize,
    pub prizes: usize,
    pub winners: usize,
}

/// 机率测试请求（允许重复模式只在此工具中使用）
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProbabilityTestRequest {
    /// 模拟抽奖轮数
    pub trials: u32,
    /// 每轮抽取人数
    #[serde(default = "default_test_count")]
    pub count: u32,
    #[serde(default)]
    pub allow_repeat: bool,
}

fn default_test_count() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProbabilityEntry {
    pub id: String,
    pub name: String,
    pub hits: u64,
    /// hits / 总抽取次数
    pub frequency: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProbabilityTestResponse {
    pub trials: u32,
    pub pool_size: usize,
    pub entries: Vec<ProbabilityEntry>,
}

/// 名单导入（透传远端后整体重载）
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ImportParticipantsRequest {
    pub participants: Vec<Participant>,
}

/// 奖项更新透传
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdatePrizeRequest {
    pub prize_id: String,
    /// 透传到远端的字段集合
    #[schema(value_type = Object)]
    pub updates: serde_json::Value,
}
