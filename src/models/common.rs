use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
        }
    }

    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message),
            error: None,
        }
    }

    pub fn error(code: String, message: String) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            message: None,
            error: Some(ApiError { code, message }),
        }
    }
}

/// 试算表行的宽松反序列化辅助。
/// 远端数据来自松散类型的表格行：ID 可能是数字（带前导零时是字符串）、
/// 布尔可能是 "TRUE" 字符串、数量可能是数字字符串。统一在边界归一化，
/// 进入核心后全部是明确类型。ID 永远保持字符串，绝不做数值转换。
pub(crate) mod loose {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StrOrNum {
        S(String),
        I(i64),
        F(f64),
    }

    impl StrOrNum {
        fn into_string(self) -> String {
            match self {
                StrOrNum::S(s) => s,
                StrOrNum::I(i) => i.to_string(),
                StrOrNum::F(f) => f.to_string(),
            }
        }
    }

    /// 字符串或数字 -> String（保留前导零，数字仅做文本化）
    pub fn string_id<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(StrOrNum::deserialize(deserializer)?.into_string())
    }

    /// 可空的字符串或数字 -> String（缺失/null 归一为空字符串）
    pub fn opt_string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v: Option<StrOrNum> = Option::deserialize(deserializer)?;
        Ok(v.map(StrOrNum::into_string).unwrap_or_default())
    }

    /// 数字或数字字符串 -> i64
    pub fn int<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v: Option<StrOrNum> = Option::deserialize(deserializer)?;
        Ok(match v {
            Some(StrOrNum::I(i)) => i,
            Some(StrOrNum::F(f)) => f as i64,
            Some(StrOrNum::S(s)) => s.trim().parse().unwrap_or(0),
            None => 0,
        })
    }

    /// 数字或数字字符串 -> u32（负数与无法解析归一为 0）
    pub fn uint<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(int(deserializer)?.max(0) as u32)
    }

    /// bool / "TRUE" / "true" / "1" -> bool
    pub fn boolish<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Boolish {
            B(bool),
            S(String),
            I(i64),
        }

        let v: Option<Boolish> = Option::deserialize(deserializer)?;
        Ok(match v {
            Some(Boolish::B(b)) => b,
            Some(Boolish::S(s)) => {
                let s = s.trim();
                s.eq_ignore_ascii_case("true") || s == "1"
            }
            Some(Boolish::I(i)) => i != 0,
            None => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_skips_null_fields() {
        let body = serde_json::to_value(ApiResponse::success(42)).unwrap();
        assert_eq!(body, serde_json::json!({ "success": true, "data": 42 }));
    }

    #[test]
    fn test_error_envelope_shape() {
        let body = serde_json::to_value(ApiResponse::<()>::error(
            "NOT_FOUND".to_string(),
            "找不到".to_string(),
        ))
        .unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
}
