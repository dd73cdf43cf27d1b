//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 提供开箱即用的拒绝原因 [`Rejection`]：稳定错误码 + 人类可读消息，与 `spark-core` 的
//!   `CoreError` 命名约定（`<域>.<语义>`）保持一致；
//! - 集中声明本 crate 自身可能返回的错误：配置解析失败 [`SettingsError`] 与日志订阅安装失败
//!   [`ObservabilityError`]。
//!
//! ## 设计要求（What）
//! - 所有错误类型派生 `thiserror::Error`；
//! - 拒绝原因会被复制给每一个登记的延续，因此 [`Rejection`] 必须廉价可克隆。

use alloc::borrow::Cow;
use core::time::Duration;

use thiserror::Error;

/// 稳定错误码常量。
pub mod codes {
    /// 调用方显式拒绝。
    pub const REJECTED: &str = "deferred.rejected";
    /// 延续同步失败。
    pub const HANDLER_FAILED: &str = "deferred.handler_failed";
    /// 与外部计时原语竞速时超时。
    pub const TIMED_OUT: &str = "deferred.timed_out";
}

/// 默认的拒绝原因类型。
///
/// # 教案式说明
/// - **意图 (Why)**：延迟原语对原因类型完全泛型，但绝大多数调用方只需要“码 + 消息”；
///   预置类型避免每个调用点重复声明错误枚举。
/// - **契约 (What)**：`code` 为 `'static` 稳定字符串，`message` 面向排障人员；
///   `Clone` 成本为一次 `Cow` 克隆，借用静态文案时零分配。
/// - **风险 (Trade-offs)**：不携带 `source` 链；需要完整错误链时请以自定义类型作为原因。
#[derive(Clone, Debug, PartialEq, Eq, Hash, Error)]
#[error("[{code}] {message}")]
pub struct Rejection {
    code: &'static str,
    message: Cow<'static, str>,
}

impl Rejection {
    /// 以错误码与消息构造拒绝原因。
    pub fn new(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// 构造通用的显式拒绝。
    pub fn rejected(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(codes::REJECTED, message)
    }

    /// 构造超时拒绝，`after` 写入消息便于排障。
    pub fn timed_out(after: Duration) -> Self {
        Self::new(
            codes::TIMED_OUT,
            alloc::format!("settlement did not happen within {after:?}"),
        )
    }

    /// 把任意错误折叠为拒绝原因，仅保留其 `Display` 文本。
    pub fn from_error(code: &'static str, error: &dyn core::error::Error) -> Self {
        Self::new(code, alloc::format!("{error}"))
    }

    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// 描述信息。
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// 配置解析与安装错误。
#[derive(Debug, Error)]
pub enum SettingsError {
    /// TOML 文本无法解析为设置结构。
    #[error("failed to parse deferred settings: {0}")]
    Parse(#[from] toml::de::Error),
    /// `log_filter` 为空字符串。
    #[error("`log_filter` must not be empty")]
    EmptyLogFilter,
    /// 进程级设置已安装，禁止覆盖。
    #[error("deferred settings are already installed")]
    AlreadyInstalled,
}

/// 日志订阅者安装错误。
///
/// - **意图 (Why)**：与 `spark-otel::install` 的失败路径对齐：外部已设置订阅者、过滤表达式非法、
///   全局注册失败三类。
#[derive(Debug, Error)]
pub enum ObservabilityError {
    /// 进程内已存在全局 `tracing` 订阅者。
    #[error("a global tracing subscriber is already set")]
    SubscriberAlreadySet,
    /// 过滤表达式无法解析。
    #[error("invalid log filter `{filter}`: {source}")]
    InvalidFilter {
        filter: alloc::string::String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    /// 注册全局订阅者失败。
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::dispatcher::SetGlobalDefaultError),
}
