use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

use super::common::loose;

/// 报到状态。
/// 1 / 2 / 9 均具备抽奖资格，只有 0（未报到）不可参与抽奖。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckInStatus {
    /// 0 = 未报到
    #[default]
    NotCheckedIn,
    /// 1 = 已报到
    CheckedIn,
    /// 2 = 公差无法到场（可抽）
    BusinessTrip,
    /// 9 = 因公未到（可抽）
    OfficialAbsence,
}

impl CheckInStatus {
    pub fn code(self) -> u8 {
        match self {
            CheckInStatus::NotCheckedIn => 0,
            CheckInStatus::CheckedIn => 1,
            CheckInStatus::BusinessTrip => 2,
            CheckInStatus::OfficialAbsence => 9,
        }
    }

    /// 未知状态码归一为未报到
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => CheckInStatus::CheckedIn,
            2 => CheckInStatus::BusinessTrip,
            9 => CheckInStatus::OfficialAbsence,
            _ => CheckInStatus::NotCheckedIn,
        }
    }

    pub fn is_draw_eligible(self) -> bool {
        !matches!(self, CheckInStatus::NotCheckedIn)
    }
}

impl Serialize for CheckInStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for CheckInStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(CheckInStatus::from_code(loose::int(deserializer)?))
    }
}

/// 参与者（来自名单导入，活动期间不会删除）。
/// `won` 是派生字段：等价于「存在指向该参与者的中奖记录」，
/// 只允许本地存储的 `apply_winners` / `replace_all` 重算，其它路径不得自行推断。
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Participant {
    /// 工号（可能带前导零，永远保持字符串）
    #[serde(deserialize_with = "loose::string_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub department: String,
    /// 所属公司；空字符串表示未填
    #[serde(default, deserialize_with = "loose::opt_string")]
    pub company: String,
    #[serde(default)]
    #[schema(value_type = u8)]
    pub checked_in: CheckInStatus,
    /// 报到时间（ISO 字符串，报到流程写入）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_date: Option<String>,
    #[serde(default, deserialize_with = "loose::boolish")]
    pub won: bool,
}

/// 参与者部分更新（报到流程使用），未提供的字段保持原值
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ParticipantPatch {
    #[serde(default)]
    #[schema(value_type = Option<u8>)]
    pub checked_in: Option<CheckInStatus>,
    #[serde(default)]
    pub checked_date: Option<String>,
}
