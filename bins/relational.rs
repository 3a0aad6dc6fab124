use std::process::ExitCode;

use dotenvy::dotenv;
use tracing::{error, info};
use uuid::Uuid;

const SERVICE: &str = "api-1";

fn init_logging() {
    // 提前加载 .env，使得 RUST_LOG 等环境变量生效
    dotenv().ok();
    common::utils::logging::init_logging_from_env("info,tower_http=info");
    info!(service = SERVICE, event = "logger_init", "tracing subscriber initialized");
}

fn main() -> ExitCode {
    init_logging();

    let service_id = Uuid::new_v4();
    let pid = std::process::id();
    let version = env!("CARGO_PKG_VERSION");

    std::panic::set_hook(Box::new(move |info| {
        error!(service = SERVICE, event = "panic", %service_id, pid, message = %info, "unhandled panic occurred");
    }));

    let cfg = match configs::AppConfig::load_for(configs::Section::Relational) {
        Ok(cfg) => cfg.relational,
        Err(e) => {
            error!(service = SERVICE, event = "config_invalid", error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(service = SERVICE, event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    info!(
        service = SERVICE,
        event = "start",
        %service_id,
        pid,
        version,
        port = cfg.port,
        "relational backend starting"
    );

    // 监听 Ctrl+C；服务本身不做优雅停机
    rt.block_on(async move {
        tokio::select! {
            res = server::run_relational(cfg) => match res {
                Ok(()) => {
                    info!(service = SERVICE, event = "stop", %service_id, pid, "relational backend stopped normally");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!(service = SERVICE, event = "run_failed", error = %e, "relational backend returned error");
                    ExitCode::FAILURE
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!(service = SERVICE, event = "shutdown_signal", %service_id, pid, "received Ctrl+C, shutting down");
                ExitCode::SUCCESS
            }
        }
    })
}
