use std::fmt;

use serde::{Deserialize, Serialize};

/// 内容类型标记
pub const CONTENT_TYPE_NONE: &str = "";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// 请求方法，按HTTP语义命名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestMethod {
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "POST")]
    Post,
    #[serde(rename = "PUT")]
    Put,
    #[serde(rename = "DELETE")]
    Delete,
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post => "POST",
            RequestMethod::Put => "PUT",
            RequestMethod::Delete => "DELETE",
        };
        write!(f, "{s}")
    }
}

/// 发往目标路由键的请求信封
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub uri: String,
    pub method: RequestMethod,
    pub data_type: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// 未完成请求内唯一，由分发器生成
    pub correlation_id: String,
    /// 进程级应答队列名
    pub reply_to: String,
}

impl Request {
    pub fn new(
        uri: impl Into<String>,
        method: RequestMethod,
        data_type: impl Into<String>,
        data: Option<serde_json::Value>,
        correlation_id: impl Into<String>,
        reply_to: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            method,
            data_type: data_type.into(),
            data,
            correlation_id: correlation_id.into(),
            reply_to: reply_to.into(),
        }
    }

    /// 指标用资源标签：去掉查询串后的URI路径
    pub fn resource(&self) -> &str {
        match self.uri.split_once('?') {
            Some((path, _)) => path,
            None => &self.uri,
        }
    }
}

/// 应答信封
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub status_code: u16,
    pub data_type: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl Response {
    pub fn ok(data: Option<serde_json::Value>) -> Self {
        Self {
            status_code: 200,
            data_type: CONTENT_TYPE_JSON.to_string(),
            data,
        }
    }

    pub fn error(status_code: u16) -> Self {
        Self {
            status_code,
            data_type: CONTENT_TYPE_NONE.to_string(),
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code <= 299
    }
}

/// 应答队列上投递的消息：应答本体加上用于匹配等待方的关联ID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub correlation_id: String,
    pub response: Response,
}

/// 目标路由键约定：`<namespace>.<service>.request`
pub fn request_target(namespace: &str, service: &str) -> String {
    format!("{namespace}.{service}.request")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let req = Request::new(
            "/v1/calls?page_size=10",
            RequestMethod::Post,
            CONTENT_TYPE_JSON,
            Some(json!({"id": "x"})),
            "corr-1",
            "call-manager.reply.host.abcd1234",
        );

        let wire = serde_json::to_value(&req).unwrap();
        assert_eq!(wire["uri"], "/v1/calls?page_size=10");
        assert_eq!(wire["method"], "POST");
        assert_eq!(wire["data_type"], "application/json");
        assert_eq!(wire["data"]["id"], "x");
        assert_eq!(wire["correlation_id"], "corr-1");
        assert_eq!(wire["reply_to"], "call-manager.reply.host.abcd1234");
    }

    #[test]
    fn test_response_wire_shape() {
        let wire = serde_json::json!({
            "status_code": 200,
            "data_type": "application/json",
            "data": {"id": "x"}
        });
        let res: Response = serde_json::from_value(wire).unwrap();
        assert_eq!(res.status_code, 200);
        assert!(res.is_success());

        // data缺失时反序列化为None
        let wire = serde_json::json!({"status_code": 404, "data_type": ""});
        let res: Response = serde_json::from_value(wire).unwrap();
        assert!(res.data.is_none());
        assert!(!res.is_success());
    }

    #[test]
    fn test_resource_strips_query() {
        let req = Request::new(
            "/v1/calls/uuid-1?deep=true",
            RequestMethod::Get,
            CONTENT_TYPE_NONE,
            None,
            "c",
            "r",
        );
        assert_eq!(req.resource(), "/v1/calls/uuid-1");

        let req = Request::new("/v1/calls", RequestMethod::Get, "", None, "c", "r");
        assert_eq!(req.resource(), "/v1/calls");
    }

    #[test]
    fn test_request_target_convention() {
        assert_eq!(
            request_target("bin-manager", "call-manager"),
            "bin-manager.call-manager.request"
        );
    }

    #[test]
    fn test_method_display() {
        assert_eq!(RequestMethod::Get.to_string(), "GET");
        assert_eq!(RequestMethod::Delete.to_string(), "DELETE");
    }
}
