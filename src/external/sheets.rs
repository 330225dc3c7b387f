use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::config::RemoteConfig;
use crate::error::{AppError, AppResult};
use crate::models::{Participant, Prize, WinnerRecord};

/// 试算表后端 (Apps Script Web App) 的 RPC 客户端。
///
/// 协议：单一 POST 端点，表单字段 `action` 选择操作，其余字段为参数；
/// 对象 / 数组参数序列化为 JSON 文本。超时按失败处理；
/// 网络类失败做有限次退避重试，应用层拒绝（error 字段）立即返回不重试。
pub struct SheetsAPI {
    client: Client,
    config: RemoteConfig,
}

/// 报到的远端回应
#[derive(Debug, Clone)]
pub struct RemoteCheckIn {
    pub name: String,
    pub already_checked_in: bool,
    pub message: Option<String>,
}

impl SheetsAPI {
    pub fn new(config: RemoteConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(SheetsAPI { client, config })
    }

    async fn call(&self, action: &str, params: Vec<(&str, String)>) -> AppResult<Value> {
        let mut form: Vec<(&str, String)> = vec![("action", action.to_string())];
        form.extend(params);

        let mut attempt = 0u32;
        loop {
            log::debug!(
                "[API] call {action}, attempt {}/{}",
                attempt + 1,
                self.config.max_retries + 1
            );

            let result = self
                .client
                .post(&self.config.base_url)
                .form(&form)
                .send()
                .await;

            let response = match result {
                Ok(r) => r,
                Err(e) if attempt < self.config.max_retries && is_transient(&e) => {
                    // 线性退避：1s, 2s, ...
                    let backoff = Duration::from_secs((attempt + 1) as u64);
                    log::warn!("[API] {action} request failed, retrying in {backoff:?}: {e}");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();
            let text = response.text().await?;
            if !status.is_success() {
                return Err(AppError::ExternalApiError(format!(
                    "HTTP {status}: {}",
                    truncate(&text, 300)
                )));
            }
            if text.trim().is_empty() {
                return Err(AppError::ExternalApiError(
                    "远端返回空回应，请检查 Web App 部署".to_string(),
                ));
            }

            let value: Value = serde_json::from_str(&text).map_err(|e| {
                AppError::ExternalApiError(format!(
                    "无法解析 JSON 回应: {e}; 内容: {}",
                    truncate(&text, 300)
                ))
            })?;

            // 应用层拒绝：不重试，直接上抛
            if let Some(err) = value.get("error").and_then(|v| v.as_str()) {
                return Err(AppError::ExternalApiError(err.to_string()));
            }
            if value.get("success").and_then(|v| v.as_bool()) == Some(false) {
                let message = value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("remote operation failed");
                return Err(AppError::ExternalApiError(message.to_string()));
            }

            return Ok(value);
        }
    }

    fn list_from<T: serde::de::DeserializeOwned>(value: Value) -> AppResult<Vec<T>> {
        // {data: [...]}；缺失 data 视为空表
        match value.get("data") {
            Some(data) => Ok(serde_json::from_value(data.clone())?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn get_participants(&self) -> AppResult<Vec<Participant>> {
        let value = self.call("getParticipants", vec![]).await?;
        Self::list_from(value)
    }

    pub async fn get_prizes(&self) -> AppResult<Vec<Prize>> {
        let value = self.call("getPrizes", vec![]).await?;
        Self::list_from(value)
    }

    pub async fn get_winners(&self) -> AppResult<Vec<WinnerRecord>> {
        let value = self.call("getWinners", vec![]).await?;
        Self::list_from(value)
    }

    pub async fn check_in(&self, participant_id: &str) -> AppResult<RemoteCheckIn> {
        let value = self
            .call("checkIn", vec![("participantId", participant_id.to_string())])
            .await?;

        // 报到回应必须带 success 与 name（表格行完整性检查）
        if value.get("success").and_then(|v| v.as_bool()) != Some(true) {
            let message = value
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("报到失败");
            return Err(AppError::ExternalApiError(message.to_string()));
        }
        let name = value
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                AppError::ExternalApiError("报到回应中缺少姓名资讯，请检查试算表资料".to_string())
            })?
            .to_string();

        Ok(RemoteCheckIn {
            name,
            already_checked_in: value
                .get("alreadyCheckedIn")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            message: value
                .get("message")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
        })
    }

    pub async fn append_winner(&self, record: &WinnerRecord) -> AppResult<()> {
        let params = vec![
            ("timestamp", record.timestamp.to_rfc3339()),
            ("prize_id", record.prize_id.clone()),
            ("prize_title", record.prize_title.clone()),
            ("prize_name", record.prize_name.clone()),
            ("participant_id", record.participant_id.clone()),
            ("participant_name", record.participant_name.clone()),
            ("participant_company", record.participant_company.clone()),
            ("admin", record.admin.clone()),
            ("claimed", record.claimed.to_string()),
        ];
        self.call("appendWinner", params).await?;
        Ok(())
    }

    pub async fn append_winners(&self, records: &[WinnerRecord]) -> AppResult<()> {
        let winners = serde_json::to_string(records)?;
        self.call("appendWinners", vec![("winners", winners)]).await?;
        Ok(())
    }

    pub async fn import_participants(&self, participants: &[Participant]) -> AppResult<()> {
        let payload = serde_json::to_string(participants)?;
        self.call("importParticipants", vec![("participants", payload)])
            .await?;
        Ok(())
    }

    pub async fn update_prize(&self, prize_id: &str, updates: &Value) -> AppResult<()> {
        let params = vec![
            ("prizeId", prize_id.to_string()),
            ("updates", serde_json::to_string(updates)?),
        ];
        self.call("updatePrize", params).await?;
        Ok(())
    }

    /// 重抽场景的远端移除接口；核心路径不使用（中奖记录追加不改）
    pub async fn remove_winner(&self, winner_id: &str, timestamp: &str) -> AppResult<()> {
        let params = vec![
            ("winnerId", winner_id.to_string()),
            ("timestamp", timestamp.to_string()),
        ];
        self.call("removeWinner", params).await?;
        Ok(())
    }

    pub async fn export_winners(&self) -> AppResult<Value> {
        self.call("exportWinners", vec![]).await
    }
}

/// 超时与连接类错误可重试；状态码错误与解码错误不重试
fn is_transient(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
