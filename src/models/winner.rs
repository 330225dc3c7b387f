use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common::loose;
use super::{Participant, Prize};

/// 中奖记录（追加写入，不做原地修改）。
/// 奖项与参与者字段是抽奖当下的快照：之后改名、改奖项都不影响历史。
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WinnerRecord {
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(deserialize_with = "loose::string_id")]
    pub prize_id: String,
    #[serde(default)]
    pub prize_title: String,
    #[serde(default)]
    pub prize_name: String,
    #[serde(deserialize_with = "loose::string_id")]
    pub participant_id: String,
    #[serde(default)]
    pub participant_name: String,
    #[serde(default, deserialize_with = "loose::opt_string")]
    pub participant_company: String,
    #[serde(default)]
    pub admin: String,
    #[serde(default, deserialize_with = "loose::boolish")]
    pub claimed: bool,
}

/// 自然键的时间邻近窗口（毫秒）：同一奖项同一人一秒内视为同一笔
const NATURAL_KEY_WINDOW_MS: i64 = 1000;

impl WinnerRecord {
    pub fn from_draw(prize: &Prize, participant: &Participant, admin: &str) -> Self {
        WinnerRecord {
            timestamp: Utc::now(),
            prize_id: prize.prize_id.clone(),
            prize_title: prize.prize_title.clone(),
            prize_name: prize.prize_name.clone(),
            participant_id: participant.id.clone(),
            participant_name: participant.name.clone(),
            participant_company: participant.company.clone(),
            admin: admin.to_string(),
            claimed: false,
        }
    }

    /// 自然键比较：奖项 + 参与者 + 时间邻近，用于去重与幂等合并
    pub fn same_natural_key(&self, other: &WinnerRecord) -> bool {
        self.prize_id == other.prize_id
            && self.participant_id == other.participant_id
            && (self.timestamp - other.timestamp)
                .num_milliseconds()
                .abs()
                < NATURAL_KEY_WINDOW_MS
    }
}

/// 待上传的报到记录（自然键：工号）
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PendingCheckIn {
    pub participant_id: String,
    pub timestamp: DateTime<Utc>,
}
