use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use crate::error::{AppError, AppResult};
use crate::models::{Participant, ParticipantPatch, PendingCheckIn, Prize, WinnerRecord};

/// 本地状态存储：participants / prizes / winners 与待上传队列的本地镜像。
///
/// 每个键一个 JSON 文件，任何变更在返回前同步落盘（临时文件 + rename），
/// 落盘完成才算提交；进程崩溃最多丢失进行中的那一笔，已提交状态不丢。
/// 多进程共用同一目录时，通过文件修改时间戳检测外部变更并重载
/// （浏览器多分页 storage 事件的对应物）。
const PARTICIPANTS_FILE: &str = "participants.json";
const PRIZES_FILE: &str = "prizes.json";
const WINNERS_FILE: &str = "winners.json";
const META_FILE: &str = "meta.json";
const PENDING_CHECKINS_FILE: &str = "pending_checkins.json";
const PENDING_WINNERS_FILE: &str = "pending_winners.json";

const ALL_FILES: [&str; 6] = [
    PARTICIPANTS_FILE,
    PRIZES_FILE,
    WINNERS_FILE,
    META_FILE,
    PENDING_CHECKINS_FILE,
    PENDING_WINNERS_FILE,
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreMeta {
    data_loaded: bool,
    data_loaded_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct StoreInner {
    participants: Vec<Participant>,
    prizes: Vec<Prize>,
    winners: Vec<WinnerRecord>,
    meta: StoreMeta,
    pending_check_ins: Vec<PendingCheckIn>,
    pending_winners: Vec<WinnerRecord>,
    /// 每个文件最近一次本进程读/写时的磁盘 mtime
    stamps: [Option<SystemTime>; ALL_FILES.len()],
}

/// 读取侧的一致性快照：winners 与 won 标记永远同时可见
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub participants: Vec<Participant>,
    pub prizes: Vec<Prize>,
    pub winners: Vec<WinnerRecord>,
    pub data_loaded: bool,
    pub data_loaded_at: Option<DateTime<Utc>>,
}

pub struct LocalStore {
    dir: PathBuf,
    inner: Mutex<StoreInner>,
}

impl LocalStore {
    /// 打开（或初始化）存储目录并载入现有数据。
    /// won 标记在载入时按 winners 重算一遍，不信任文件里的旧值。
    pub fn open(dir: impl AsRef<Path>) -> AppResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut inner = StoreInner::default();
        let store = LocalStore {
            dir,
            inner: Mutex::new(StoreInner::default()),
        };

        inner.participants = store.read_file(PARTICIPANTS_FILE)?.unwrap_or_default();
        inner.prizes = store.read_file(PRIZES_FILE)?.unwrap_or_default();
        inner.winners = store.read_file(WINNERS_FILE)?.unwrap_or_default();
        inner.meta = store.read_file(META_FILE)?.unwrap_or_default();
        inner.pending_check_ins = store.read_file(PENDING_CHECKINS_FILE)?.unwrap_or_default();
        inner.pending_winners = store.read_file(PENDING_WINNERS_FILE)?.unwrap_or_default();

        derive_won(&mut inner.participants, &inner.winners);
        for (i, name) in ALL_FILES.iter().enumerate() {
            inner.stamps[i] = store.mtime(name);
        }

        *store.lock() = inner;
        Ok(store)
    }

    /// 全量刷新（「载入所有资料」后调用）。
    /// won 标记从 winners 列表整体重算，不保留任何旧值。
    pub fn replace_all(
        &self,
        mut participants: Vec<Participant>,
        prizes: Vec<Prize>,
        winners: Vec<WinnerRecord>,
    ) -> AppResult<()> {
        derive_won(&mut participants, &winners);
        let mut inner = self.lock();
        inner.participants = participants;
        inner.prizes = prizes;
        inner.winners = winners;
        inner.meta = StoreMeta {
            data_loaded: true,
            data_loaded_at: Some(Utc::now()),
        };
        self.persist(&mut inner, PARTICIPANTS_FILE)?;
        self.persist(&mut inner, PRIZES_FILE)?;
        self.persist(&mut inner, WINNERS_FILE)?;
        self.persist(&mut inner, META_FILE)?;
        Ok(())
    }

    /// 追加中奖记录并同步翻转相关参与者的 won 标记。
    /// 按自然键去重，重复应用同一批记录不会产生第二份；
    /// 在同一把锁内完成，读取方不会看到「有记录没标记」的中间态。
    /// 返回实际新增的记录数。
    pub fn apply_winners(&self, new_winners: &[WinnerRecord]) -> AppResult<usize> {
        let mut inner = self.lock();
        let mut appended = 0usize;
        for record in new_winners {
            let exists = inner
                .winners
                .iter()
                .any(|w| w.same_natural_key(record));
            if exists {
                continue;
            }
            inner.winners.push(record.clone());
            appended += 1;
        }

        let winner_ids: HashSet<&str> = new_winners
            .iter()
            .map(|w| w.participant_id.as_str())
            .collect();
        for p in inner.participants.iter_mut() {
            if winner_ids.contains(p.id.as_str()) {
                p.won = true;
            }
        }

        // 先写参与者再写中奖记录：中途崩溃时重启会按 winners 重算 won，
        // 两种写入顺序都能自愈，这里保持与读取侧一致的顺序
        self.persist(&mut inner, PARTICIPANTS_FILE)?;
        self.persist(&mut inner, WINNERS_FILE)?;
        Ok(appended)
    }

    /// 部分更新参与者（报到流程），其余字段保持不变
    pub fn update_participant(
        &self,
        participant_id: &str,
        patch: &ParticipantPatch,
    ) -> AppResult<Participant> {
        let mut inner = self.lock();
        let participant = inner
            .participants
            .iter_mut()
            .find(|p| p.id == participant_id)
            .ok_or_else(|| AppError::NotFound(format!("找不到工号「{participant_id}」的参与者")))?;

        if let Some(status) = patch.checked_in {
            participant.checked_in = status;
        }
        if let Some(date) = &patch.checked_date {
            participant.checked_date = Some(date.clone());
        }
        let updated = participant.clone();
        self.persist(&mut inner, PARTICIPANTS_FILE)?;
        Ok(updated)
    }

    /// 一致性读取快照；先吸收外部进程的文件变更
    pub fn snapshot(&self) -> AppResult<StoreSnapshot> {
        let mut inner = self.lock();
        self.absorb_external_changes(&mut inner)?;
        Ok(StoreSnapshot {
            participants: inner.participants.clone(),
            prizes: inner.prizes.clone(),
            winners: inner.winners.clone(),
            data_loaded: inner.meta.data_loaded,
            data_loaded_at: inner.meta.data_loaded_at,
        })
    }

    /// 显式吸收外部变更（对应前端 focus / storage 事件触发的重载）
    pub fn sync_external_changes(&self) -> AppResult<()> {
        let mut inner = self.lock();
        self.absorb_external_changes(&mut inner)
    }

    // -----------------------------
    // 待上传队列
    // -----------------------------

    pub fn pending_check_ins(&self) -> AppResult<Vec<PendingCheckIn>> {
        let mut inner = self.lock();
        self.absorb_external_changes(&mut inner)?;
        Ok(inner.pending_check_ins.clone())
    }

    pub fn pending_winners(&self) -> AppResult<Vec<WinnerRecord>> {
        let mut inner = self.lock();
        self.absorb_external_changes(&mut inner)?;
        Ok(inner.pending_winners.clone())
    }

    /// 入队待上传报到；按工号去重，返回是否实际新增
    pub fn enqueue_check_in(&self, participant_id: &str, timestamp: DateTime<Utc>) -> AppResult<bool> {
        let mut inner = self.lock();
        if inner
            .pending_check_ins
            .iter()
            .any(|c| c.participant_id == participant_id)
        {
            return Ok(false);
        }
        inner.pending_check_ins.push(PendingCheckIn {
            participant_id: participant_id.to_string(),
            timestamp,
        });
        self.persist(&mut inner, PENDING_CHECKINS_FILE)?;
        Ok(true)
    }

    /// 移除已成功上传的报到记录
    pub fn remove_check_ins(&self, participant_ids: &[String]) -> AppResult<()> {
        let mut inner = self.lock();
        let before = inner.pending_check_ins.len();
        inner
            .pending_check_ins
            .retain(|c| !participant_ids.contains(&c.participant_id));
        if inner.pending_check_ins.len() != before {
            self.persist(&mut inner, PENDING_CHECKINS_FILE)?;
        }
        Ok(())
    }

    /// 入队待上传中奖记录；按自然键去重，返回实际新增数
    pub fn enqueue_winners(&self, records: &[WinnerRecord]) -> AppResult<usize> {
        let mut inner = self.lock();
        let mut added = 0usize;
        for record in records {
            let exists = inner
                .pending_winners
                .iter()
                .any(|w| w.same_natural_key(record));
            if !exists {
                inner.pending_winners.push(record.clone());
                added += 1;
            }
        }
        if added > 0 {
            self.persist(&mut inner, PENDING_WINNERS_FILE)?;
        }
        Ok(added)
    }

    /// 按自然键移除已成功上传的中奖记录
    pub fn remove_winners(&self, records: &[WinnerRecord]) -> AppResult<()> {
        let mut inner = self.lock();
        let before = inner.pending_winners.len();
        inner
            .pending_winners
            .retain(|w| !records.iter().any(|r| r.same_natural_key(w)));
        if inner.pending_winners.len() != before {
            self.persist(&mut inner, PENDING_WINNERS_FILE)?;
        }
        Ok(())
    }

    /// 丢弃全部待上传中奖记录（不可逆），返回丢弃数量
    pub fn clear_pending_winners(&self) -> AppResult<usize> {
        let mut inner = self.lock();
        let discarded = inner.pending_winners.len();
        inner.pending_winners.clear();
        self.persist(&mut inner, PENDING_WINNERS_FILE)?;
        Ok(discarded)
    }

    // -----------------------------
    // 内部辅助方法
    // -----------------------------

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        // Mutex 中毒只会发生在持锁线程 panic，此处选择继续使用内部数据
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn mtime(&self, name: &str) -> Option<SystemTime> {
        fs::metadata(self.path(name)).and_then(|m| m.modified()).ok()
    }

    fn read_file<T: DeserializeOwned>(&self, name: &str) -> AppResult<Option<T>> {
        let path = self.path(name);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        let value = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::StorageError(format!("解析 {name} 失败: {e}")))?;
        Ok(Some(value))
    }

    /// 同步落盘：写临时文件后 rename，避免半截文件
    fn persist(&self, inner: &mut StoreInner, name: &str) -> AppResult<()> {
        let index = file_index(name);
        let bytes = match name {
            PARTICIPANTS_FILE => serde_json::to_vec(&inner.participants)?,
            PRIZES_FILE => serde_json::to_vec(&inner.prizes)?,
            WINNERS_FILE => serde_json::to_vec(&inner.winners)?,
            META_FILE => serde_json::to_vec(&inner.meta)?,
            PENDING_CHECKINS_FILE => serde_json::to_vec(&inner.pending_check_ins)?,
            PENDING_WINNERS_FILE => serde_json::to_vec(&inner.pending_winners)?,
            _ => return Err(AppError::InternalError(format!("unknown store file {name}"))),
        };
        let path = self.path(name);
        let tmp = self.path(&format!("{name}.tmp"));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        inner.stamps[index] = self.mtime(name);
        Ok(())
    }

    /// 对比磁盘 mtime，重载被其它进程改过的文件
    fn absorb_external_changes(&self, inner: &mut StoreInner) -> AppResult<()> {
        let mut main_data_changed = false;
        for (index, name) in ALL_FILES.iter().enumerate() {
            let disk = self.mtime(name);
            if disk == inner.stamps[index] {
                continue;
            }
            match *name {
                PARTICIPANTS_FILE => {
                    inner.participants = self.read_file(name)?.unwrap_or_default();
                    main_data_changed = true;
                }
                PRIZES_FILE => inner.prizes = self.read_file(name)?.unwrap_or_default(),
                WINNERS_FILE => {
                    inner.winners = self.read_file(name)?.unwrap_or_default();
                    main_data_changed = true;
                }
                META_FILE => inner.meta = self.read_file(name)?.unwrap_or_default(),
                PENDING_CHECKINS_FILE => {
                    inner.pending_check_ins = self.read_file(name)?.unwrap_or_default()
                }
                PENDING_WINNERS_FILE => {
                    inner.pending_winners = self.read_file(name)?.unwrap_or_default()
                }
                _ => {}
            }
            inner.stamps[index] = disk;
            log::debug!("Reloaded {name} after external change");
        }
        if main_data_changed {
            // 外部写入方的 won 标记不可信，重算一遍
            let winners = std::mem::take(&mut inner.winners);
            derive_won(&mut inner.participants, &winners);
            inner.winners = winners;
        }
        Ok(())
    }
}

fn file_index(name: &str) -> usize {
    ALL_FILES.iter().position(|f| *f == name).unwrap_or(0)
}

/// 按中奖记录整体重算 won 标记（唯一允许推导 won 的地方）
fn derive_won(participants: &mut [Participant], winners: &[WinnerRecord]) {
    let winner_ids: HashSet<&str> = winners.iter().map(|w| w.participant_id.as_str()).collect();
    for p in participants.iter_mut() {
        p.won = winner_ids.contains(p.id.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CheckInStatus, PrizeMode};
    use tempfile::TempDir;

    fn participant(id: &str) -> Participant {
        Participant {
            id: id.to_string(),
            name: format!("P-{id}"),
            department: "RD".to_string(),
            company: String::new(),
            checked_in: CheckInStatus::CheckedIn,
            checked_date: None,
            won: false,
        }
    }

    fn prize(prize_id: &str, quantity: u32) -> Prize {
        Prize {
            prize_id: prize_id.to_string(),
            prize_title: "特奖".to_string(),
            prize_name: "奖品".to_string(),
            quantity,
            order: 1,
            mode: PrizeMode::Single,
            company: "ALL".to_string(),
        }
    }

    fn winner(prize_id: &str, participant_id: &str) -> WinnerRecord {
        WinnerRecord {
            timestamp: Utc::now(),
            prize_id: prize_id.to_string(),
            prize_title: String::new(),
            prize_name: String::new(),
            participant_id: participant_id.to_string(),
            participant_name: String::new(),
            participant_company: String::new(),
            admin: "system".to_string(),
            claimed: false,
        }
    }

    #[test]
    fn test_replace_all_derives_won() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();

        let mut stale = participant("001");
        stale.won = true; // 来源里的旧标记不可信
        store
            .replace_all(
                vec![stale, participant("002")],
                vec![prize("G1", 1)],
                vec![winner("G1", "002")],
            )
            .unwrap();

        let snap = store.snapshot().unwrap();
        assert!(!snap.participants[0].won);
        assert!(snap.participants[1].won);
        assert!(snap.data_loaded);
        assert!(snap.data_loaded_at.is_some());
    }

    #[test]
    fn test_apply_winners_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        store
            .replace_all(vec![participant("001")], vec![prize("G1", 1)], vec![])
            .unwrap();

        let w = winner("G1", "001");
        assert_eq!(store.apply_winners(&[w.clone()]).unwrap(), 1);
        // 重复应用同一笔：不产生第二份，结果不变
        assert_eq!(store.apply_winners(&[w]).unwrap(), 0);

        let snap = store.snapshot().unwrap();
        assert_eq!(snap.winners.len(), 1);
        assert!(snap.participants[0].won);
    }

    #[test]
    fn test_update_participant_preserves_fields() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        store
            .replace_all(vec![participant("001")], vec![], vec![])
            .unwrap();

        let patch = ParticipantPatch {
            checked_in: Some(CheckInStatus::CheckedIn),
            checked_date: Some("2025-11-01T09:00:00Z".to_string()),
        };
        let updated = store.update_participant("001", &patch).unwrap();
        assert_eq!(updated.name, "P-001");
        assert_eq!(updated.department, "RD");
        assert_eq!(updated.checked_in, CheckInStatus::CheckedIn);
        assert!(updated.checked_date.is_some());

        assert!(store.update_participant("999", &patch).is_err());
    }

    #[test]
    fn test_durability_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = LocalStore::open(dir.path()).unwrap();
            store
                .replace_all(
                    vec![participant("001")],
                    vec![prize("G1", 1)],
                    vec![winner("G1", "001")],
                )
                .unwrap();
            store.enqueue_check_in("00042", Utc::now()).unwrap();
        }
        // 重新打开：已提交状态全部可见，won 重算正确
        let store = LocalStore::open(dir.path()).unwrap();
        let snap = store.snapshot().unwrap();
        assert_eq!(snap.participants.len(), 1);
        assert!(snap.participants[0].won);
        assert_eq!(snap.winners.len(), 1);
        assert_eq!(store.pending_check_ins().unwrap().len(), 1);
    }

    #[test]
    fn test_pending_check_in_dedup() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        assert!(store.enqueue_check_in("00042", Utc::now()).unwrap());
        assert!(!store.enqueue_check_in("00042", Utc::now()).unwrap());
        assert_eq!(store.pending_check_ins().unwrap().len(), 1);

        store.remove_check_ins(&["00042".to_string()]).unwrap();
        assert!(store.pending_check_ins().unwrap().is_empty());
    }

    #[test]
    fn test_pending_winners_dedup_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let w = winner("G1", "001");
        assert_eq!(store.enqueue_winners(&[w.clone()]).unwrap(), 1);
        assert_eq!(store.enqueue_winners(&[w.clone()]).unwrap(), 0);

        let other = winner("G1", "002");
        assert_eq!(store.enqueue_winners(&[other.clone()]).unwrap(), 1);
        assert_eq!(store.pending_winners().unwrap().len(), 2);

        store.remove_winners(&[w]).unwrap();
        assert_eq!(store.pending_winners().unwrap().len(), 1);

        assert_eq!(store.clear_pending_winners().unwrap(), 1);
        assert!(store.pending_winners().unwrap().is_empty());
    }

    #[test]
    fn test_external_change_detection() {
        let dir = TempDir::new().unwrap();
        let store_a = LocalStore::open(dir.path()).unwrap();
        store_a
            .replace_all(vec![participant("001")], vec![], vec![])
            .unwrap();

        // 模拟另一个进程写同一目录
        let store_b = LocalStore::open(dir.path()).unwrap();
        store_b
            .replace_all(
                vec![participant("001"), participant("002")],
                vec![],
                vec![],
            )
            .unwrap();

        // A 在下一次读取时吸收 B 的写入
        let snap = store_a.snapshot().unwrap();
        assert_eq!(snap.participants.len(), 2);
    }
}
