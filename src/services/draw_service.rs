use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{AppError, AppResult};
use crate::models::{
    DrawResult, DrawStateResponse, Participant, Prize, ProbabilityEntry, ProbabilityTestRequest,
    ProbabilityTestResponse, WinnerRecord,
};
use crate::services::QueueService;
use crate::storage::{LocalStore, StoreSnapshot};
use crate::utils::{eligibility, lottery};

/// 抽奖会话控制器。
///
/// 一次抽奖 = 资格过滤 → 排除集 → 随机抽选 → 本地提交 → 入队待上传。
/// 本地提交（apply_winners + enqueue）先于任何展示完成，远端持久化
/// 完全异步，不阻塞抽奖流程。会话互斥锁保证同一时间只有一次抽选在执行。
#[derive(Default)]
struct DrawSession {
    current_prize_id: Option<String>,
    batch_count: u32,
    drawing: bool,
    last_result: Option<DrawResult>,
}

#[derive(Clone)]
pub struct DrawService {
    store: Arc<LocalStore>,
    queue: QueueService,
    admin: String,
    session: Arc<Mutex<DrawSession>>,
}

impl DrawService {
    pub fn new(store: Arc<LocalStore>, queue: QueueService, admin: String) -> Self {
        Self {
            store,
            queue,
            admin,
            session: Arc::new(Mutex::new(DrawSession {
                batch_count: 1,
                ..Default::default()
            })),
        }
    }

    /// 当前会话状态（供大屏与操作台轮询）
    pub fn state(&self) -> AppResult<DrawStateResponse> {
        let snapshot = self.store.snapshot()?;
        let session = self.lock_session();
        Ok(self.build_state(&snapshot, &session))
    }

    /// 选定奖项；batch 模式默认把抽取人数设为剩余名额（与前端行为一致）
    pub fn select_prize(&self, prize_id: &str) -> AppResult<DrawStateResponse> {
        let snapshot = self.store.snapshot()?;
        let prize = snapshot
            .prizes
            .iter()
            .find(|p| p.prize_id == prize_id)
            .ok_or_else(|| AppError::NotFound(format!("找不到奖项「{prize_id}」")))?
            .clone();

        let mut session = self.lock_session();
        session.current_prize_id = Some(prize.prize_id.clone());
        session.batch_count = default_batch_count(&prize, &snapshot.winners);
        session.last_result = None;
        Ok(self.build_state(&snapshot, &session))
    }

    /// 下一个奖项（按 order 升序循环）；只清除展示结果，不动抽奖状态
    pub fn next_prize(&self) -> AppResult<DrawStateResponse> {
        self.navigate(1)
    }

    /// 上一个奖项
    pub fn previous_prize(&self) -> AppResult<DrawStateResponse> {
        self.navigate(-1)
    }

    /// 执行一次抽奖（重抽也走同一条路径：上一轮中奖者已进排除集，
    /// 追加独立抽选，不会使先前的记录失效）。
    pub fn draw(&self, batch_count_override: Option<u32>) -> AppResult<DrawResult> {
        // 先锁会话再取快照：剩余名额与排除集必须在锁内读取，
        // 并发请求不得基于同一份快照各自提交
        let mut session = self.lock_session();
        let snapshot = self.store.snapshot()?;

        if session.drawing {
            return Err(AppError::ValidationError("抽奖进行中".to_string()));
        }
        if let Some(count) = batch_count_override {
            session.batch_count = count;
        }

        let prize = self
            .current_prize(&snapshot, &session)
            .ok_or_else(|| AppError::ValidationError("尚未选择奖项".to_string()))?;

        // 名额检查先于抽选：已抽完时不会触发任何随机决策
        let remaining = eligibility::remaining(&prize, &snapshot.winners);
        if remaining == Some(0) {
            return Err(AppError::ValidationError("本奖项已抽完".to_string()));
        }

        let count = if prize.is_batch() {
            if session.batch_count == 0 {
                return Err(AppError::ValidationError("抽取人数必须大于 0".to_string()));
            }
            // 上限钳到剩余名额，单次操作不可能超发
            match remaining {
                Some(r) => session.batch_count.min(r) as usize,
                None => session.batch_count as usize,
            }
        } else {
            1
        };

        session.drawing = true;
        let outcome = self.run_draw(&snapshot, &prize, count, remaining);
        session.drawing = false;

        let result = outcome?;
        session.last_result = Some(result.clone());
        Ok(result)
    }

    /// 机率测试工具：对当前可抽池做大量独立模拟，统计每人命中频率。
    /// 只读操作；这是允许重复模式唯一的使用场景，且忽略 won 状态
    /// （每轮模拟彼此独立，正式抽奖不走这里）。
    pub fn probability_test(
        &self,
        req: &ProbabilityTestRequest,
    ) -> AppResult<ProbabilityTestResponse> {
        if req.trials == 0 || req.trials > 1_000_000 {
            return Err(AppError::ValidationError(
                "模拟轮数必须在 1 到 1,000,000 之间".to_string(),
            ));
        }
        if req.count == 0 {
            return Err(AppError::ValidationError("抽取人数必须大于 0".to_string()));
        }

        let snapshot = self.store.snapshot()?;
        let pool: Vec<Participant> = snapshot
            .participants
            .iter()
            .filter(|p| p.checked_in.is_draw_eligible())
            .cloned()
            .collect();
        if pool.is_empty() {
            return Err(AppError::NoEligibleParticipants);
        }

        let excluded = HashSet::new();
        let mut hits: HashMap<String, u64> = HashMap::new();
        let mut total_picks = 0u64;
        for _ in 0..req.trials {
            let selected = lottery::select(&pool, &excluded, req.count as usize, req.allow_repeat);
            total_picks += selected.len() as u64;
            for p in selected {
                *hits.entry(p.id).or_insert(0) += 1;
            }
        }

        let mut entries: Vec<ProbabilityEntry> = pool
            .iter()
            .map(|p| {
                let count = hits.get(&p.id).copied().unwrap_or(0);
                ProbabilityEntry {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    hits: count,
                    frequency: if total_picks == 0 {
                        0.0
                    } else {
                        count as f64 / total_picks as f64
                    },
                }
            })
            .collect();
        entries.sort_by(|a, b| b.hits.cmp(&a.hits));

        Ok(ProbabilityTestResponse {
            trials: req.trials,
            pool_size: pool.len(),
            entries,
        })
    }

    // -----------------------------
    // 内部辅助方法
    // -----------------------------

    fn lock_session(&self) -> MutexGuard<'_, DrawSession> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn run_draw(
        &self,
        snapshot: &StoreSnapshot,
        prize: &Prize,
        count: usize,
        remaining_before: Option<u32>,
    ) -> AppResult<DrawResult> {
        let pool = eligibility::eligible_pool(prize, &snapshot.participants);
        let excluded = eligibility::excluded_ids(prize, &snapshot.winners, &snapshot.participants);

        let selected = lottery::select(&pool, &excluded, count, false);
        if selected.is_empty() {
            return Err(AppError::NoEligibleParticipants);
        }

        let records: Vec<WinnerRecord> = selected
            .iter()
            .map(|p| WinnerRecord::from_draw(prize, p, &self.admin))
            .collect();

        // 本地提交是抽奖的生效点；之后入队等待远端确认
        self.store.apply_winners(&records)?;
        self.queue.enqueue_winners(&records)?;

        log::info!(
            "Draw committed: prize {} x{}, winners: {:?}",
            prize.prize_id,
            records.len(),
            records
                .iter()
                .map(|w| w.participant_id.as_str())
                .collect::<Vec<_>>()
        );

        Ok(DrawResult {
            prize_id: prize.prize_id.clone(),
            prize_title: prize.prize_title.clone(),
            prize_name: prize.prize_name.clone(),
            remaining: remaining_before.map(|r| r.saturating_sub(records.len() as u32)),
            winners: records,
        })
    }

    fn navigate(&self, step: i64) -> AppResult<DrawStateResponse> {
        let snapshot = self.store.snapshot()?;
        let prizes = sorted_prizes(&snapshot);
        let mut session = self.lock_session();

        if prizes.is_empty() {
            session.current_prize_id = None;
            session.last_result = None;
            return Ok(self.build_state(&snapshot, &session));
        }

        let current_index = session
            .current_prize_id
            .as_ref()
            .and_then(|id| prizes.iter().position(|p| &p.prize_id == id));
        let next_index = match current_index {
            Some(i) => (i as i64 + step).rem_euclid(prizes.len() as i64) as usize,
            // 尚未选择时：next 从第一个开始，previous 从最后一个开始
            None if step > 0 => 0,
            None => prizes.len() - 1,
        };

        let prize = &prizes[next_index];
        session.current_prize_id = Some(prize.prize_id.clone());
        session.batch_count = default_batch_count(prize, &snapshot.winners);
        session.last_result = None;
        Ok(self.build_state(&snapshot, &session))
    }

    fn current_prize(&self, snapshot: &StoreSnapshot, session: &DrawSession) -> Option<Prize> {
        let id = session.current_prize_id.as_ref()?;
        snapshot.prizes.iter().find(|p| &p.prize_id == id).cloned()
    }

    fn build_state(&self, snapshot: &StoreSnapshot, session: &DrawSession) -> DrawStateResponse {
        let current_prize = self.current_prize(snapshot, session);
        let (remaining, unlimited) = match &current_prize {
            Some(p) => {
                let r = eligibility::remaining(p, &snapshot.winners);
                (r, p.is_unlimited())
            }
            None => (None, false),
        };
        let can_draw = match &current_prize {
            Some(p) => {
                (unlimited || remaining.is_some_and(|r| r > 0))
                    && !session.drawing
                    && (!p.is_batch() || session.batch_count > 0)
            }
            None => false,
        };
        DrawStateResponse {
            current_prize,
            remaining,
            unlimited,
            is_drawing: session.drawing,
            can_draw,
            batch_count: session.batch_count,
            last_result: session.last_result.clone(),
        }
    }
}

fn sorted_prizes(snapshot: &StoreSnapshot) -> Vec<Prize> {
    let mut prizes = snapshot.prizes.clone();
    prizes.sort_by_key(|p| p.order);
    prizes
}

fn default_batch_count(prize: &Prize, winners: &[WinnerRecord]) -> u32 {
    if !prize.is_batch() {
        return 1;
    }
    match eligibility::remaining(prize, winners) {
        Some(0) | None => 1,
        Some(r) => r,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteConfig;
    use crate::external::SheetsAPI;
    use crate::models::{CheckInStatus, PrizeMode};
    use tempfile::TempDir;

    fn participant(id: &str, checked_in: i64) -> Participant {
        Participant {
            id: id.to_string(),
            name: format!("P-{id}"),
            department: String::new(),
            company: String::new(),
            checked_in: CheckInStatus::from_code(checked_in),
            checked_date: None,
            won: false,
        }
    }

    fn prize(prize_id: &str, quantity: u32, mode: PrizeMode, order: i64) -> Prize {
        Prize {
            prize_id: prize_id.to_string(),
            prize_title: format!("{prize_id}-title"),
            prize_name: format!("{prize_id}-name"),
            quantity,
            order,
            mode,
            company: "ALL".to_string(),
        }
    }

    /// 远端不可达的服务编排；抽奖路径不触网，只有 flush 会失败
    fn service(dir: &TempDir) -> (DrawService, Arc<LocalStore>) {
        let store = Arc::new(LocalStore::open(dir.path()).unwrap());
        let sheets = Arc::new(
            SheetsAPI::new(RemoteConfig {
                base_url: "http://127.0.0.1:9/unreachable".to_string(),
                timeout_secs: 1,
                max_retries: 0,
            })
            .unwrap(),
        );
        let queue = QueueService::new(store.clone(), sheets);
        (
            DrawService::new(store.clone(), queue, "system".to_string()),
            store,
        )
    }

    fn load(store: &LocalStore, participants: Vec<Participant>, prizes: Vec<Prize>) {
        store.replace_all(participants, prizes, vec![]).unwrap();
    }

    #[test]
    fn test_end_to_end_single_prize() {
        // 10 人已报到，一个 quantity=1 的 single 奖项
        let dir = TempDir::new().unwrap();
        let (svc, store) = service(&dir);
        load(
            &store,
            (0..10).map(|i| participant(&format!("{i:03}"), 1)).collect(),
            vec![prize("G1", 1, PrizeMode::Single, 1)],
        );
        svc.select_prize("G1").unwrap();

        let result = svc.draw(None).unwrap();
        assert_eq!(result.winners.len(), 1);
        assert_eq!(result.remaining, Some(0));

        let snap = store.snapshot().unwrap();
        assert_eq!(snap.winners.len(), 1);
        let winner_id = &snap.winners[0].participant_id;
        let winner = snap.participants.iter().find(|p| &p.id == winner_id).unwrap();
        assert!(winner.won);

        // 中奖记录同时进入待上传队列
        assert_eq!(store.pending_winners().unwrap().len(), 1);

        // 名额用尽：第二次抽奖在触发抽选之前就被挡下
        let state = svc.state().unwrap();
        assert!(!state.can_draw);
        assert!(matches!(
            svc.draw(None),
            Err(AppError::ValidationError(_))
        ));
        assert_eq!(store.snapshot().unwrap().winners.len(), 1);
    }

    #[test]
    fn test_quantity_cap_three_singles() {
        let dir = TempDir::new().unwrap();
        let (svc, store) = service(&dir);
        load(
            &store,
            (0..10).map(|i| participant(&format!("{i:03}"), 1)).collect(),
            vec![prize("G1", 3, PrizeMode::Single, 1)],
        );
        svc.select_prize("G1").unwrap();

        for expected_remaining in [2u32, 1, 0] {
            let result = svc.draw(None).unwrap();
            assert_eq!(result.remaining, Some(expected_remaining));
        }
        assert!(svc.draw(None).is_err());

        // 全程无重复中奖者
        let snap = store.snapshot().unwrap();
        let ids: HashSet<String> = snap.winners.iter().map(|w| w.participant_id.clone()).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_batch_draw_distinct_winners() {
        let dir = TempDir::new().unwrap();
        let (svc, store) = service(&dir);
        load(
            &store,
            (0..10).map(|i| participant(&format!("{i:03}"), 1)).collect(),
            vec![prize("G1", 5, PrizeMode::Batch, 1)],
        );
        // batch 模式默认抽取人数 = 剩余名额
        let state = svc.select_prize("G1").unwrap();
        assert_eq!(state.batch_count, 5);

        let result = svc.draw(None).unwrap();
        assert_eq!(result.winners.len(), 5);
        let ids: HashSet<String> = result.winners.iter().map(|w| w.participant_id.clone()).collect();
        assert_eq!(ids.len(), 5);
        assert_eq!(result.remaining, Some(0));
    }

    #[test]
    fn test_batch_count_capped_at_remaining() {
        let dir = TempDir::new().unwrap();
        let (svc, store) = service(&dir);
        load(
            &store,
            (0..10).map(|i| participant(&format!("{i:03}"), 1)).collect(),
            vec![prize("G1", 2, PrizeMode::Batch, 1)],
        );
        svc.select_prize("G1").unwrap();

        // 请求 5 名，名额只剩 2：钳到 2，不超发
        let result = svc.draw(Some(5)).unwrap();
        assert_eq!(result.winners.len(), 2);
        assert_eq!(result.remaining, Some(0));
    }

    #[test]
    fn test_no_eligible_participants_is_non_fatal() {
        let dir = TempDir::new().unwrap();
        let (svc, store) = service(&dir);
        load(
            &store,
            (0..5).map(|i| participant(&format!("{i:03}"), 0)).collect(),
            vec![prize("G1", 1, PrizeMode::Single, 1)],
        );
        svc.select_prize("G1").unwrap();

        assert!(matches!(svc.draw(None), Err(AppError::NoEligibleParticipants)));
        // 不产生任何中奖记录，会话仍可继续
        assert!(store.snapshot().unwrap().winners.is_empty());
        assert!(svc.state().unwrap().can_draw);
    }

    #[test]
    fn test_won_participant_never_redrawn() {
        // P3 已因其它奖项中奖：即使本奖项没有记录也绝不再中
        let dir = TempDir::new().unwrap();
        let (svc, store) = service(&dir);
        let participants: Vec<Participant> =
            (1..=5).map(|i| participant(&format!("P{i}"), 1)).collect();
        store
            .replace_all(
                participants,
                vec![
                    prize("G1", 0, PrizeMode::Single, 1),
                    prize("OTHER", 1, PrizeMode::Single, 2),
                ],
                vec![WinnerRecord {
                    timestamp: chrono::Utc::now(),
                    prize_id: "OTHER".to_string(),
                    prize_title: String::new(),
                    prize_name: String::new(),
                    participant_id: "P3".to_string(),
                    participant_name: String::new(),
                    participant_company: String::new(),
                    admin: "system".to_string(),
                    claimed: false,
                }],
            )
            .unwrap();
        svc.select_prize("G1").unwrap();

        for _ in 0..50 {
            if let Ok(result) = svc.draw(None) {
                assert!(result.winners.iter().all(|w| w.participant_id != "P3"));
            } else {
                break; // 池子耗尽
            }
        }
    }

    #[test]
    fn test_unlimited_prize_draws_until_pool_exhausted() {
        let dir = TempDir::new().unwrap();
        let (svc, store) = service(&dir);
        load(
            &store,
            (0..4).map(|i| participant(&format!("{i:03}"), 1)).collect(),
            vec![prize("G1", 0, PrizeMode::Single, 1)],
        );
        svc.select_prize("G1").unwrap();

        // 不限量：每次 remaining 都是 null，抽到池子耗尽为止
        for _ in 0..4 {
            let result = svc.draw(None).unwrap();
            assert_eq!(result.remaining, None);
        }
        assert!(matches!(svc.draw(None), Err(AppError::NoEligibleParticipants)));
        // 不限量奖项永远不会因名额被挡
        assert!(svc.state().unwrap().can_draw);
    }

    #[test]
    fn test_company_restricted_prize() {
        let dir = TempDir::new().unwrap();
        let (svc, store) = service(&dir);
        let mut participants: Vec<Participant> =
            (0..6).map(|i| participant(&format!("{i:03}"), 1)).collect();
        for p in participants.iter_mut().take(2) {
            p.company = "tw".to_string();
        }
        let mut restricted = prize("G1", 2, PrizeMode::Batch, 1);
        restricted.company = "TW".to_string();
        load(&store, participants, vec![restricted]);
        svc.select_prize("G1").unwrap();

        let result = svc.draw(Some(2)).unwrap();
        let ids: HashSet<String> = result.winners.iter().map(|w| w.participant_id.clone()).collect();
        assert_eq!(ids, ["000".to_string(), "001".to_string()].into_iter().collect());
    }

    #[test]
    fn test_prize_navigation_cycles_by_order() {
        let dir = TempDir::new().unwrap();
        let (svc, store) = service(&dir);
        load(
            &store,
            vec![participant("001", 1)],
            vec![
                prize("B", 1, PrizeMode::Single, 2),
                prize("A", 1, PrizeMode::Single, 1),
                prize("C", 1, PrizeMode::Single, 3),
            ],
        );

        let state = svc.next_prize().unwrap();
        assert_eq!(state.current_prize.unwrap().prize_id, "A");
        let state = svc.next_prize().unwrap();
        assert_eq!(state.current_prize.unwrap().prize_id, "B");
        let state = svc.next_prize().unwrap();
        assert_eq!(state.current_prize.unwrap().prize_id, "C");
        // 循环回到开头
        let state = svc.next_prize().unwrap();
        assert_eq!(state.current_prize.unwrap().prize_id, "A");
        let state = svc.previous_prize().unwrap();
        assert_eq!(state.current_prize.unwrap().prize_id, "C");
    }

    #[test]
    fn test_navigation_clears_last_result() {
        let dir = TempDir::new().unwrap();
        let (svc, store) = service(&dir);
        load(
            &store,
            (0..5).map(|i| participant(&format!("{i:03}"), 1)).collect(),
            vec![
                prize("A", 1, PrizeMode::Single, 1),
                prize("B", 1, PrizeMode::Single, 2),
            ],
        );
        svc.select_prize("A").unwrap();
        svc.draw(None).unwrap();
        assert!(svc.state().unwrap().last_result.is_some());

        let state = svc.next_prize().unwrap();
        assert!(state.last_result.is_none());
        // 导航不影响已产生的中奖记录
        assert_eq!(store.snapshot().unwrap().winners.len(), 1);
    }

    #[test]
    fn test_concurrent_draws_never_exceed_quantity() {
        use std::sync::Barrier;
        use std::thread;

        // 8 个线程同一瞬间对 quantity=1 的奖项抽奖：最多产生一笔记录
        for _ in 0..50 {
            let dir = TempDir::new().unwrap();
            let (svc, store) = service(&dir);
            load(
                &store,
                (0..10).map(|i| participant(&format!("{i:03}"), 1)).collect(),
                vec![prize("G1", 1, PrizeMode::Single, 1)],
            );
            svc.select_prize("G1").unwrap();

            let barrier = Arc::new(Barrier::new(8));
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let svc = svc.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        svc.draw(None).is_ok()
                    })
                })
                .collect();
            let successes = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count();

            assert_eq!(successes, 1);
            assert_eq!(store.snapshot().unwrap().winners.len(), 1);
        }
    }

    #[test]
    fn test_probability_test_counts_every_pick() {
        let dir = TempDir::new().unwrap();
        let (svc, store) = service(&dir);
        load(
            &store,
            (0..3).map(|i| participant(&format!("{i:03}"), 1)).collect(),
            vec![],
        );

        let resp = svc
            .probability_test(&ProbabilityTestRequest {
                trials: 300,
                count: 1,
                allow_repeat: true,
            })
            .unwrap();
        assert_eq!(resp.pool_size, 3);
        let total: u64 = resp.entries.iter().map(|e| e.hits).sum();
        assert_eq!(total, 300);
        // 300 轮后每人都应出现过
        assert!(resp.entries.iter().all(|e| e.hits > 0));
    }
}
