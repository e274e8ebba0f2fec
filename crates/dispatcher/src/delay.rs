use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use rpcbus_core::BusResult;
use rpcbus_domain::{MessageBroker, Request};

use crate::metrics::{self, DispatchOutcome, DELAY_TARGET_LABEL};

/// 延迟调度器
///
/// 把请求连同延迟一并交给总线的延迟发布原语，提交被接受即返回。
/// 不登记PendingCall、不等待远端效果：此系统中的延迟调用一律是
/// 发后即忘（挂断定时、健康检查重试、外呼排期等）。
pub struct DelayScheduler {
    broker: Arc<dyn MessageBroker>,
}

impl DelayScheduler {
    pub fn new(broker: Arc<dyn MessageBroker>) -> Self {
        Self { broker }
    }

    /// 调度一次延迟投递
    ///
    /// 提交失败（总线不可达、主题非法）同步返回给原调用方。
    pub async fn schedule_delayed(
        &self,
        target: &str,
        request: &Request,
        delay_ms: u64,
    ) -> BusResult<()> {
        let start = Instant::now();
        let result = self.broker.publish_with_delay(target, request, delay_ms).await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let outcome = match &result {
            Ok(()) => DispatchOutcome::Success,
            Err(_) => DispatchOutcome::Rejected,
        };
        metrics::record_request_process_time(
            DELAY_TARGET_LABEL,
            request.resource(),
            &request.method.to_string(),
            outcome,
            elapsed_ms,
        );

        debug!(
            target_queue = target,
            uri = %request.uri,
            delay_ms,
            ok = result.is_ok(),
            "延迟请求已提交"
        );
        result
    }
}
