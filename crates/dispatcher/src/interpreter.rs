use rpcbus_core::{BusError, BusResult};
use rpcbus_domain::Response;

/// 应答分类结果
///
/// 传输层错误不经过解释器：它们在 `dispatch` 处就以 `Err` 形式
/// 原样返回给调用方。
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    /// 状态码 <= 299
    Success {
        data_type: String,
        data: Option<serde_json::Value>,
    },
    /// 期待应答的调用合法地没有返回任何应答体（合成404）
    NotFound,
    /// 状态码 > 299，保留原始状态码与应答体
    RemoteError {
        status_code: u16,
        data: Option<serde_json::Value>,
    },
}

/// 解释一次同步调用的结果
pub fn interpret(response: Option<Response>) -> ResponseOutcome {
    match response {
        None => ResponseOutcome::NotFound,
        Some(res) if res.is_success() => ResponseOutcome::Success {
            data_type: res.data_type,
            data: res.data,
        },
        Some(res) => ResponseOutcome::RemoteError {
            status_code: res.status_code,
            data: res.data,
        },
    }
}

impl ResponseOutcome {
    /// 转换为结果：成功取出应答体，其余映射为类型化错误
    pub fn into_result(self) -> BusResult<Option<serde_json::Value>> {
        match self {
            ResponseOutcome::Success { data, .. } => Ok(data),
            ResponseOutcome::NotFound => Err(BusError::NotFound),
            ResponseOutcome::RemoteError { status_code, .. } => {
                Err(BusError::Remote { status_code })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_codes() {
        for code in [200u16, 201, 299] {
            let outcome = interpret(Some(Response {
                status_code: code,
                data_type: "application/json".to_string(),
                data: Some(json!({"id": "x"})),
            }));
            match outcome {
                ResponseOutcome::Success { data, .. } => {
                    assert_eq!(data.unwrap()["id"], "x", "status {code}");
                }
                other => panic!("status {code} misclassified: {other:?}"),
            }
        }
    }

    #[test]
    fn test_remote_error_codes_preserved() {
        for code in [300u16, 404, 500] {
            let outcome = interpret(Some(Response::error(code)));
            assert_eq!(
                outcome,
                ResponseOutcome::RemoteError {
                    status_code: code,
                    data: None
                }
            );
        }
    }

    #[test]
    fn test_no_response_is_not_found() {
        assert_eq!(interpret(None), ResponseOutcome::NotFound);
    }

    #[test]
    fn test_into_result_mapping() {
        let data = interpret(Some(Response::ok(Some(json!(1)))))
            .into_result()
            .unwrap();
        assert_eq!(data, Some(json!(1)));

        let err = interpret(Some(Response::error(503))).into_result().unwrap_err();
        assert!(matches!(err, BusError::Remote { status_code: 503 }));

        let err = interpret(None).into_result().unwrap_err();
        assert!(matches!(err, BusError::NotFound));
    }
}
