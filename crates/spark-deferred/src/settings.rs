//! 进程级诊断设置。
//!
//! ## 设计目的（Why）
//! - 结算核心本身没有可调的语义参数；可调的只有诊断输出：是否记录每次跃迁、无人观察的拒绝以何种级别输出、
//!   默认日志过滤表达式；
//! - 与 `spark-otel` 的 `INSTALL_STATE` 一致，设置通过 `OnceLock` 一次性安装，读路径无锁。
//!
//! ## 契约说明（What）
//! - [`install`] 首次调用生效，之后返回 [`SettingsError::AlreadyInstalled`]；
//! - [`current`] 返回已安装的设置，未安装时返回 [`DeferredSettings::DEFAULT`]；
//! - TOML 形态由 [`DeferredSettings::from_toml_str`] 解析，未知字段视为错误。

use alloc::borrow::Cow;
use std::sync::OnceLock;

use serde::Deserialize;

use crate::error::SettingsError;

static INSTALLED: OnceLock<DeferredSettings> = OnceLock::new();
static DEFAULTS: DeferredSettings = DeferredSettings::DEFAULT;

/// 诊断事件的输出级别，`Off` 表示完全不输出。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// 延迟原语的诊断设置。
///
/// ### 契约说明（What）
/// - `trace_settlements`：是否在 TRACE 级别记录每一次状态跃迁，默认开启；
/// - `unobserved_rejection`：句柄交还调用方之后发生的拒绝若没有任何已登记延续，以该级别记录一次，默认 `debug`；
///   这只是诊断信号，不改变结算语义；
/// - `log_filter`：[`install_subscriber`](crate::observability::install_subscriber) 在
///   `RUST_LOG` 缺失时使用的过滤表达式，默认 `info`。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeferredSettings {
    trace_settlements: bool,
    unobserved_rejection: LogLevel,
    log_filter: Cow<'static, str>,
}

impl DeferredSettings {
    /// 默认设置常量。
    pub const DEFAULT: Self = Self {
        trace_settlements: true,
        unobserved_rejection: LogLevel::Debug,
        log_filter: Cow::Borrowed("info"),
    };

    /// 从 TOML 文本解析并校验设置。
    pub fn from_toml_str(text: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// 开关每次跃迁的 TRACE 记录。
    pub fn with_trace_settlements(mut self, enabled: bool) -> Self {
        self.trace_settlements = enabled;
        self
    }

    /// 设置无人观察拒绝的记录级别。
    pub fn with_unobserved_rejection(mut self, level: LogLevel) -> Self {
        self.unobserved_rejection = level;
        self
    }

    /// 设置默认日志过滤表达式。
    pub fn with_log_filter(mut self, filter: impl Into<Cow<'static, str>>) -> Self {
        self.log_filter = filter.into();
        self
    }

    pub fn trace_settlements(&self) -> bool {
        self.trace_settlements
    }

    pub fn unobserved_rejection(&self) -> LogLevel {
        self.unobserved_rejection
    }

    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// 校验字段间约束。
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.log_filter.trim().is_empty() {
            return Err(SettingsError::EmptyLogFilter);
        }
        Ok(())
    }
}

impl Default for DeferredSettings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// 安装进程级设置，首次调用生效。
pub fn install(settings: DeferredSettings) -> Result<(), SettingsError> {
    settings.validate()?;
    INSTALLED
        .set(settings)
        .map_err(|_| SettingsError::AlreadyInstalled)
}

/// 当前生效的设置。
pub fn current() -> &'static DeferredSettings {
    INSTALLED.get().unwrap_or(&DEFAULTS)
}
