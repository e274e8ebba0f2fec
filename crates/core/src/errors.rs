use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("消息队列错误: {0}")]
    MessageQueue(String),
    #[error("请求超时: target={target}, uri={uri}")]
    Timeout { target: String, uri: String },
    #[error("请求已取消: target={target}, uri={uri}")]
    Cancelled { target: String, uri: String },
    #[error("重复的关联ID: {0}")]
    DuplicateCorrelationId(String),
    #[error("远端错误: 状态码 {status_code}")]
    Remote { status_code: u16 },
    #[error("资源未找到")]
    NotFound,
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type BusResult<T> = Result<T, BusError>;

impl BusError {
    pub fn message_queue<S: Into<String>>(msg: S) -> Self {
        Self::MessageQueue(msg.into())
    }
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        Self::Serialization(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn timeout(target: impl Into<String>, uri: impl Into<String>) -> Self {
        Self::Timeout {
            target: target.into(),
            uri: uri.into(),
        }
    }
    pub fn cancelled(target: impl Into<String>, uri: impl Into<String>) -> Self {
        Self::Cancelled {
            target: target.into(),
            uri: uri.into(),
        }
    }

    /// 调用方可以用新的关联ID重试的错误
    pub fn is_retryable(&self) -> bool {
        matches!(self, BusError::Timeout { .. } | BusError::MessageQueue(_))
    }

    /// 是否属于传输层故障（而非远端业务结果）
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            BusError::Timeout { .. } | BusError::Cancelled { .. } | BusError::MessageQueue(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BusError::timeout("bin-manager.call-manager.request", "/v1/calls");
        let msg = err.to_string();
        assert!(msg.contains("bin-manager.call-manager.request"));
        assert!(msg.contains("/v1/calls"));

        let err = BusError::Remote { status_code: 500 };
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(BusError::timeout("t", "u").is_retryable());
        assert!(BusError::message_queue("unreachable").is_retryable());
        assert!(!BusError::cancelled("t", "u").is_retryable());
        assert!(!BusError::Remote { status_code: 404 }.is_retryable());
        assert!(!BusError::NotFound.is_retryable());
    }

    #[test]
    fn test_transport_classification() {
        assert!(BusError::timeout("t", "u").is_transport());
        assert!(BusError::cancelled("t", "u").is_transport());
        assert!(BusError::message_queue("x").is_transport());
        assert!(!BusError::Remote { status_code: 300 }.is_transport());
        assert!(!BusError::NotFound.is_transport());
    }
}
