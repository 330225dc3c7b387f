use std::collections::HashSet;

use crate::models::{Participant, Prize, WinnerRecord};

/// 抽奖资格过滤。
///
/// 资格 = 报到状态 (1/2/9 可抽) + 奖项公司限制；
/// 排除集 = 本奖项已中奖者 ∪ 全局 won 标记者。
/// 注意不对称性：排除是跨奖项全局的（中过任何奖就不再中），
/// 而名额统计是按奖项各自计算的。这是沿用的既有业务行为。

/// 计算某个奖项的候选池：已报到（含 2/9 特殊状态）且公司匹配。
/// `prize.company == "ALL"` 不限公司，否则大小写不敏感精确匹配。
pub fn eligible_pool(prize: &Prize, participants: &[Participant]) -> Vec<Participant> {
    participants
        .iter()
        .filter(|p| p.checked_in.is_draw_eligible())
        .filter(|p| {
            !prize.restricts_company() || p.company.trim().eq_ignore_ascii_case(prize.company.trim())
        })
        .cloned()
        .collect()
}

/// 不重复模式的排除集：
/// (a) 本奖项已有中奖记录的参与者
/// (b) 所有 won == true 的参与者（其它奖项的中奖者也排除）
/// 只取 (a) 会漏排：won 可能是别的奖项抽中后置位的。
pub fn excluded_ids(
    prize: &Prize,
    winners: &[WinnerRecord],
    participants: &[Participant],
) -> HashSet<String> {
    let mut excluded: HashSet<String> = winners
        .iter()
        .filter(|w| w.prize_id == prize.prize_id)
        .map(|w| w.participant_id.clone())
        .collect();
    excluded.extend(
        participants
            .iter()
            .filter(|p| p.won)
            .map(|p| p.id.clone()),
    );
    excluded
}

/// 奖项剩余名额；`None` 表示不限量（quantity = 0 哨兵值）
pub fn remaining(prize: &Prize, winners: &[WinnerRecord]) -> Option<u32> {
    if prize.is_unlimited() {
        return None;
    }
    let used = winners
        .iter()
        .filter(|w| w.prize_id == prize.prize_id)
        .count() as u32;
    Some(prize.quantity.saturating_sub(used))
}
