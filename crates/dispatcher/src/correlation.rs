use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use tokio::sync::oneshot;
use tracing::debug;

use rpcbus_core::{BusError, BusResult};
use rpcbus_domain::Response;

/// 单个未完成调用的登记项
///
/// oneshot通道即规格要求的"单写单读"结果槽：首个写入者获胜，
/// 之后的resolve对同一ID是空操作。
struct PendingCall {
    deadline: Instant,
    result_tx: oneshot::Sender<Response>,
}

/// 关联登记表
///
/// 分发器进程内唯一的共享可变结构。register/resolve/remove/expire
/// 都在同一把锁下完成，锁内不做任何等待，争用上限取决于同时
/// 未完成的调用数。
#[derive(Default)]
pub struct CorrelationRegistry {
    pending: Mutex<HashMap<String, PendingCall>>,
}

impl CorrelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个等待应答的调用，返回结果槽的接收端
    ///
    /// 关联ID已存在时返回 `DuplicateCorrelationId`。ID由调用方
    /// 用进程内不重复的生成器产生，正常情况下不会触发。
    pub fn register(
        &self,
        correlation_id: &str,
        deadline: Instant,
    ) -> BusResult<oneshot::Receiver<Response>> {
        let (result_tx, result_rx) = oneshot::channel();

        let mut pending = self
            .pending
            .lock()
            .map_err(|e| BusError::Internal(format!("关联登记表锁中毒: {e}")))?;

        if pending.contains_key(correlation_id) {
            return Err(BusError::DuplicateCorrelationId(correlation_id.to_string()));
        }

        pending.insert(
            correlation_id.to_string(),
            PendingCall {
                deadline,
                result_tx,
            },
        );
        Ok(result_rx)
    }

    /// 用应答完成一个登记项，首次调用获胜
    ///
    /// 返回 `false` 表示该ID已完成、已过期或等待方已离开，
    /// 应答被丢弃（总线重复投递、迟到应答都走这条路径）。
    pub fn resolve(&self, correlation_id: &str, response: Response) -> bool {
        let entry = match self.pending.lock() {
            Ok(mut pending) => pending.remove(correlation_id),
            Err(_) => return false,
        };

        match entry {
            Some(call) => call.result_tx.send(response).is_ok(),
            None => false,
        }
    }

    /// 注销一个登记项（调用方取消时使用）
    ///
    /// 移除后迟到的应答无法再投递到已复用的结果槽。
    pub fn remove(&self, correlation_id: &str) -> bool {
        match self.pending.lock() {
            Ok(mut pending) => pending.remove(correlation_id).is_some(),
            Err(_) => false,
        }
    }

    /// 清扫所有截止时间已过的登记项，返回被清扫的关联ID
    ///
    /// 移除时丢弃发送端，等待方的接收端随即报错并映射为超时。
    pub fn expire(&self, now: Instant) -> Vec<String> {
        let mut expired = Vec::new();

        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|correlation_id, call| {
                if call.deadline <= now {
                    expired.push(correlation_id.clone());
                    false
                } else {
                    true
                }
            });
        }

        if !expired.is_empty() {
            debug!("清扫过期登记项: {:?}", expired);
        }
        expired
    }

    /// 当前未完成的调用数
    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }
}
