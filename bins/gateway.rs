use std::process::ExitCode;

use dotenvy::dotenv;
use tracing::{error, info};
use uuid::Uuid;

fn init_logging() {
    // 加载 .env（允许使用 RUST_LOG / LOG_FORMAT 配置日志）
    dotenv().ok();
    common::utils::logging::init_logging_from_env("info,gateway::proxy=debug");
    info!(service = "gateway", event = "logger_init", "tracing subscriber initialized");
}

fn main() -> ExitCode {
    init_logging();

    // 生成服务实例上下文（不含敏感信息）
    let service_id = Uuid::new_v4();
    let pid = std::process::id();
    let version = env!("CARGO_PKG_VERSION");

    // Panic 钩子：捕获异常并输出错误日志
    std::panic::set_hook(Box::new(move |info| {
        error!(service = "gateway", event = "panic", %service_id, pid, message = %info, "unhandled panic occurred");
    }));

    let cfg = match configs::AppConfig::load_for(configs::Section::Gateway) {
        Ok(cfg) => cfg.gateway,
        Err(e) => {
            error!(service = "gateway", event = "config_invalid", error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(service = "gateway", event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    info!(
        service = "gateway",
        event = "start",
        %service_id,
        pid,
        version,
        port = cfg.port,
        api1 = %cfg.api1.target,
        api2 = %cfg.api2.target,
        "gateway service starting"
    );

    rt.block_on(async move {
        tokio::select! {
            res = gateway::run(cfg) => match res {
                Ok(()) => {
                    info!(service = "gateway", event = "stop", %service_id, pid, "gateway stopped normally");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!(service = "gateway", event = "run_failed", error = %e, "gateway::run returned error");
                    ExitCode::FAILURE
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!(service = "gateway", event = "shutdown_signal", %service_id, pid, "received Ctrl+C, shutting down");
                ExitCode::SUCCESS
            }
        }
    })
}
