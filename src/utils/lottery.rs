use rand::Rng;
use rand::rngs::OsRng;
use std::collections::HashSet;

use crate::models::Participant;

/// 公平抽选核心。
///
/// 所有随机决策都走操作系统 CSPRNG（`OsRng`），这是公平性与可审计性要求：
/// 抽奖结果必须经得起「被操纵」的质疑，不是性能取舍。
///
/// 本模块只负责按排除集过滤与随机抽取；报到状态 / 公司限制等资格过滤
/// 由 `utils::eligibility` 在调用前完成。

/// Fisher-Yates 洗牌（不修改输入）
pub fn secure_shuffle(pool: &[Participant]) -> Vec<Participant> {
    let mut shuffled: Vec<Participant> = pool.to_vec();
    let len = shuffled.len();
    if len < 2 {
        return shuffled;
    }
    for i in (1..len).rev() {
        let j = OsRng.gen_range(0..=i);
        shuffled.swap(i, j);
    }
    shuffled
}

/// 从候选池中抽取 `count` 名（排除 `excluded` 中的 ID）。
///
/// - `count == 1`：对过滤后的 L 名候选做一次均匀索引，每人概率恰为 1/L
/// - `count > 1` 且不允许重复：每次从「当前剩余」候选中均匀抽一名并移除，
///   直到抽满或池子耗尽（等价于无放回均匀抽样；同一 ID 绝不出现两次；
///   池子不足时返回不足额的结果而不报错）
/// - `count > 1` 且允许重复：每次抽取都对完整候选池重新洗牌后均匀取一名，
///   各次抽取相互独立，同一人可以被抽中多次
/// - 过滤后为空时返回空列表，由调用方作为「没有可抽选的参与者」处理
pub fn select(
    pool: &[Participant],
    excluded: &HashSet<String>,
    count: usize,
    allow_repeat: bool,
) -> Vec<Participant> {
    let candidates: Vec<&Participant> = pool
        .iter()
        .filter(|p| !excluded.contains(&p.id))
        .collect();

    if candidates.is_empty() || count == 0 {
        return Vec::new();
    }

    if count == 1 {
        let index = OsRng.gen_range(0..candidates.len());
        return vec![candidates[index].clone()];
    }

    if allow_repeat {
        let owned: Vec<Participant> = candidates.into_iter().cloned().collect();
        let mut selected = Vec::with_capacity(count);
        for _ in 0..count {
            // 每次抽取前重新洗牌再取随机索引，保证各次抽取独立均匀
            let shuffled = secure_shuffle(&owned);
            let index = OsRng.gen_range(0..shuffled.len());
            selected.push(shuffled[index].clone());
        }
        return selected;
    }

    // 无放回：从剩余候选中逐个抽出
    let mut available: Vec<&Participant> = candidates;
    let mut selected = Vec::with_capacity(count.min(available.len()));
    while selected.len() < count && !available.is_empty() {
        let index = OsRng.gen_range(0..available.len());
        selected.push(available.swap_remove(index).clone());
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CheckInStatus;
    use std::collections::HashMap;

    fn participant(id: &str) -> Participant {
        Participant {
            id: id.to_string(),
            name: format!("P-{id}"),
            department: String::new(),
            company: String::new(),
            checked_in: CheckInStatus::CheckedIn,
            checked_date: None,
            won: false,
        }
    }

    fn pool(n: usize) -> Vec<Participant> {
        (0..n).map(|i| participant(&format!("{i:03}"))).collect()
    }

    #[test]
    fn test_empty_pool_returns_empty() {
        let excluded = HashSet::new();
        assert!(select(&[], &excluded, 1, false).is_empty());
    }

    #[test]
    fn test_fully_excluded_pool_returns_empty() {
        let pool = pool(3);
        let excluded: HashSet<String> = pool.iter().map(|p| p.id.clone()).collect();
        assert!(select(&pool, &excluded, 1, false).is_empty());
    }

    #[test]
    fn test_excluded_never_selected() {
        let pool = pool(5);
        let excluded: HashSet<String> = ["002".to_string()].into_iter().collect();
        for _ in 0..200 {
            let selected = select(&pool, &excluded, 3, false);
            assert!(selected.iter().all(|p| p.id != "002"));
        }
    }

    #[test]
    fn test_no_repeat_exhaustive() {
        // count = 池大小：每人恰好出现一次
        let pool = pool(7);
        let selected = select(&pool, &HashSet::new(), 7, false);
        assert_eq!(selected.len(), 7);
        let ids: HashSet<String> = selected.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids.len(), 7);
    }

    #[test]
    fn test_no_repeat_count_exceeds_pool() {
        let pool = pool(4);
        let selected = select(&pool, &HashSet::new(), 10, false);
        assert_eq!(selected.len(), 4);
        let ids: HashSet<String> = selected.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_no_repeat_never_duplicates() {
        let pool = pool(10);
        for _ in 0..100 {
            let selected = select(&pool, &HashSet::new(), 6, false);
            let ids: HashSet<String> = selected.iter().map(|p| p.id.clone()).collect();
            assert_eq!(ids.len(), selected.len());
        }
    }

    #[test]
    fn test_inputs_not_mutated() {
        let pool = pool(5);
        let before: Vec<String> = pool.iter().map(|p| p.id.clone()).collect();
        let excluded: HashSet<String> = ["001".to_string()].into_iter().collect();
        let _ = select(&pool, &excluded, 3, false);
        let after: Vec<String> = pool.iter().map(|p| p.id.clone()).collect();
        assert_eq!(before, after);
        assert_eq!(excluded.len(), 1);
    }

    #[test]
    fn test_single_draw_uniformity() {
        // 100,000 次单抽，5 人池：每人经验频率应收敛到 1/5
        let pool = pool(5);
        let excluded = HashSet::new();
        let trials = 100_000u32;
        let mut hits: HashMap<String, u32> = HashMap::new();
        for _ in 0..trials {
            let selected = select(&pool, &excluded, 1, false);
            *hits.entry(selected[0].id.clone()).or_insert(0) += 1;
        }
        assert_eq!(hits.len(), 5);
        for (_, count) in hits {
            let freq = count as f64 / trials as f64;
            // 期望 0.2，标准差约 0.0013，0.01 的容差非常宽松
            assert!((freq - 0.2).abs() < 0.01, "frequency {freq} out of tolerance");
        }
    }

    #[test]
    fn test_allow_repeat_independence() {
        // 3 人池抽 1000 次：每人都应出现过，且必然有人出现多次
        let pool = pool(3);
        let selected = select(&pool, &HashSet::new(), 1000, true);
        assert_eq!(selected.len(), 1000);
        let mut hits: HashMap<String, u32> = HashMap::new();
        for p in &selected {
            *hits.entry(p.id.clone()).or_insert(0) += 1;
        }
        assert_eq!(hits.len(), 3, "every member should appear at least once");
        assert!(hits.values().any(|&c| c > 1), "repeats must be possible");
    }

    #[test]
    fn test_shuffle_preserves_members() {
        let pool = pool(8);
        let shuffled = secure_shuffle(&pool);
        assert_eq!(shuffled.len(), 8);
        let before: HashSet<String> = pool.iter().map(|p| p.id.clone()).collect();
        let after: HashSet<String> = shuffled.iter().map(|p| p.id.clone()).collect();
        assert_eq!(before, after);
    }
}
