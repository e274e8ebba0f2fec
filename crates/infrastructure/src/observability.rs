use std::net::SocketAddr;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use rpcbus_core::{BusError, BusResult};

/// 安装Prometheus导出器并启动HTTP抓取端点
///
/// 需要在Tokio运行时内调用。
pub fn init_metrics_exporter(listen_addr: SocketAddr) -> BusResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(listen_addr)
        .install()
        .map_err(|e| BusError::config_error(format!("安装Prometheus导出器失败: {e}")))
}

/// 只安装记录器，由调用方自行暴露 `handle.render()`
pub fn init_metrics_recorder() -> BusResult<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| BusError::config_error(format!("安装指标记录器失败: {e}")))
}
