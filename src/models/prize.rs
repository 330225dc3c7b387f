use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common::loose;

/// 抽奖模式：single 每次一名，batch 一次抽多名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PrizeMode {
    #[default]
    Single,
    Batch,
}

impl<'de> serde::Deserialize<'de> for PrizeMode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // 未知或留空的模式归一为 single
        let s: Option<String> = Option::deserialize(deserializer)?;
        Ok(match s.as_deref().map(str::trim) {
            Some(m) if m.eq_ignore_ascii_case("batch") => PrizeMode::Batch,
            _ => PrizeMode::Single,
        })
    }
}

/// 奖项配置（由管理后台维护，抽奖核心只读）。
/// - quantity = 0 为「不限量」哨兵值
/// - company = "ALL" 表示不限公司，否则按公司名大小写不敏感精确匹配
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Prize {
    #[serde(deserialize_with = "loose::string_id")]
    pub prize_id: String,
    #[serde(default)]
    pub prize_title: String,
    #[serde(default)]
    pub prize_name: String,
    /// 名额（0 = 不限量）
    #[serde(default, deserialize_with = "loose::uint")]
    pub quantity: u32,
    /// 抽奖顺序（升序）
    #[serde(default, deserialize_with = "loose::int")]
    pub order: i64,
    #[serde(default)]
    pub mode: PrizeMode,
    /// 参与公司限制（"ALL" = 不限）
    #[serde(default = "default_company", deserialize_with = "de_company")]
    pub company: String,
}

fn default_company() -> String {
    "ALL".to_string()
}

fn de_company<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    // 表格留空视同不限公司
    let s = loose::opt_string(deserializer)?;
    if s.trim().is_empty() {
        Ok(default_company())
    } else {
        Ok(s)
    }
}

impl Prize {
    pub fn is_unlimited(&self) -> bool {
        self.quantity == 0
    }

    pub fn is_batch(&self) -> bool {
        self.mode == PrizeMode::Batch
    }

    pub fn restricts_company(&self) -> bool {
        !self.company.trim().eq_ignore_ascii_case("ALL")
    }
}
