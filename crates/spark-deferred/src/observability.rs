//! 结算生命周期的结构化日志。
//!
//! ## 设计目标（Why）
//! - 延迟原语是其他异步代码的地基，排障时最常问的是“这个原语何时、以何种结果结算，是否有人在等它”；
//! - 字段键集中在 [`keys`]，日志消费者据此过滤，不解析消息正文。
//!
//! ## 契约说明（What）
//! - 跃迁：TRACE，受 [`DeferredSettings::trace_settlements`] 控制；
//! - 重复结算被忽略：DEBUG；
//! - 拒绝时没有任何已登记延续：级别由 [`DeferredSettings::unobserved_rejection`] 决定；
//!   构造函数返回句柄之前发生的拒绝（`Deferred::reject`、执行器返回 `Err`）不记录，
//!   那时调用方还不可能登记延续；
//! - [`install_subscriber`] 仅供宿主或测试入口调用，库内部从不安装订阅者。

use tracing::dispatcher;
use tracing_subscriber::EnvFilter;

use crate::{
    error::ObservabilityError,
    settings::{DeferredSettings, LogLevel},
    state::DeferredState,
};

/// 日志字段键。
pub mod keys {
    /// 原语的进程内唯一编号。
    pub const FIELD_ID: &str = "deferred.id";
    /// 结算后的状态，取值见 [`DeferredState::as_str`](crate::DeferredState::as_str)。
    pub const FIELD_STATE: &str = "deferred.state";
    /// 结算时被冲刷的延续数量。
    pub const FIELD_REACTIONS: &str = "deferred.reactions";
}

pub(crate) fn settled(settings: &DeferredSettings, id: u64, to: DeferredState, reactions: usize) {
    if !settings.trace_settlements() {
        return;
    }
    tracing::trace!(
        deferred.id = id,
        deferred.state = %to,
        deferred.reactions = reactions,
        "deferred settled"
    );
}

pub(crate) fn ignored(id: u64, current: DeferredState) {
    tracing::debug!(
        deferred.id = id,
        deferred.state = %current,
        "settlement ignored: deferred is already settled or following another thenable"
    );
}

pub(crate) fn unobserved_rejection(settings: &DeferredSettings, id: u64) {
    let state = DeferredState::Rejected;
    match settings.unobserved_rejection() {
        LogLevel::Off => {}
        LogLevel::Error => tracing::error!(
            deferred.id = id,
            deferred.state = %state,
            "deferred rejected with no registered continuation"
        ),
        LogLevel::Warn => tracing::warn!(
            deferred.id = id,
            deferred.state = %state,
            "deferred rejected with no registered continuation"
        ),
        LogLevel::Info => tracing::info!(
            deferred.id = id,
            deferred.state = %state,
            "deferred rejected with no registered continuation"
        ),
        LogLevel::Debug => tracing::debug!(
            deferred.id = id,
            deferred.state = %state,
            "deferred rejected with no registered continuation"
        ),
        LogLevel::Trace => tracing::trace!(
            deferred.id = id,
            deferred.state = %state,
            "deferred rejected with no registered continuation"
        ),
    }
}

/// 安装 `fmt + EnvFilter` 全局订阅者。
///
/// # 教案式说明
/// - **意图（Why）**：给宿主与演示程序一个零样板的日志入口，做法与 `spark-otel::install` 相同：
///   先检查外部是否已设置订阅者，再组装过滤器并注册；
/// - **逻辑（How）**：优先读取 `RUST_LOG`，缺失或非法时回落到 `settings.log_filter()`；
/// - **契约（What）**：重复调用或外部已设置时返回 [`ObservabilityError::SubscriberAlreadySet`]。
pub fn install_subscriber(settings: &DeferredSettings) -> Result<(), ObservabilityError> {
    if dispatcher::has_been_set() {
        return Err(ObservabilityError::SubscriberAlreadySet);
    }

    let filter = build_env_filter(settings)?;
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn build_env_filter(settings: &DeferredSettings) -> Result<EnvFilter, ObservabilityError> {
    EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(settings.log_filter()).map_err(|source| {
            ObservabilityError::InvalidFilter {
                filter: settings.log_filter().into(),
                source,
            }
        })
    })
}
