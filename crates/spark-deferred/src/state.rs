//! 结算状态的权威定义。
//!
//! ## 设计目标（Why）
//! - 以封闭的标签变体表达 `Pending → Resolved | Rejected` 的单向格，取代“全局冻结符号表”式的状态枚举；
//! - 为调用方提供可复制、可比较的状态投影 [`DeferredState`]，内部则由 [`Slot`] 同时承载状态与结算值，
//!   保证“状态”与“值”不可能出现不一致的组合。
//!
//! ## 契约说明（What）
//! - 状态至多跃迁一次，之后的任何结算尝试均为 [`StateAdvance::Noop`]；
//! - 结算值一经写入即不可变，读取时按值克隆，避免把内部借用泄露给回调。

use core::fmt;

/// 延迟原语对外可见的状态投影。
///
/// # 契约说明（What）
/// - `Pending`：尚未结算，可继续登记延续；
/// - `Resolved` / `Rejected`：终态，永不回退。
///
/// # 观测标签
/// - `Display` 输出小写名称（`pending`/`resolved`/`rejected`），与日志字段 `deferred.state` 对齐。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeferredState {
    /// 尚未结算。
    Pending,
    /// 以成功值结算。
    Resolved,
    /// 以拒绝原因结算。
    Rejected,
}

impl DeferredState {
    /// 是否已经进入终态。
    pub const fn is_settled(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// 稳定的小写名称，供日志与指标使用。
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for DeferredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 结算尝试的结果，描述本次调用是否真正推动了状态。
///
/// # 设计目标（Why）
/// - 重复结算在契约上是静默的空操作而非错误，但测试与诊断仍需要知道“这次调用是否生效”；
/// - 与框架其余状态机保持同一返回形态：`Noop` 携带当前状态，`Transition` 携带起止状态。
///
/// # 风险提示（Trade-offs）
/// - 返回值并未标注 `#[must_use]`，忽略它是合法且常见的用法。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateAdvance<S>
where
    S: Copy + Eq,
{
    /// 状态未变化：重复结算、已锁定跟随其他原语，或跟随的原语仍未结算。
    Noop { state: S },
    /// 状态发生跃迁。
    Transition { from: S, to: S },
}

impl<S> StateAdvance<S>
where
    S: Copy + Eq,
{
    /// 本次调用是否发生了跃迁。
    pub fn is_transition(&self) -> bool {
        matches!(self, Self::Transition { .. })
    }

    /// 调用完成后的状态。
    pub fn current(&self) -> S {
        match self {
            Self::Noop { state } => *state,
            Self::Transition { to, .. } => *to,
        }
    }
}

/// 内部存储槽：状态与结算值合为一体的标签变体。
pub(crate) enum Slot<T, E> {
    Pending,
    Resolved(T),
    Rejected(E),
}

impl<T, E> Slot<T, E> {
    pub(crate) fn state(&self) -> DeferredState {
        match self {
            Self::Pending => DeferredState::Pending,
            Self::Resolved(_) => DeferredState::Resolved,
            Self::Rejected(_) => DeferredState::Rejected,
        }
    }

    /// 以结算结果填充槽位；调用方负责先确认槽位仍为 `Pending`。
    pub(crate) fn fill(&mut self, settled: Result<T, E>) {
        *self = match settled {
            Ok(value) => Self::Resolved(value),
            Err(reason) => Self::Rejected(reason),
        };
    }
}

impl<T: Clone, E: Clone> Slot<T, E> {
    /// 克隆出已结算的结果；`Pending` 时返回 `None`。
    pub(crate) fn snapshot(&self) -> Option<Result<T, E>> {
        match self {
            Self::Pending => None,
            Self::Resolved(value) => Some(Ok(value.clone())),
            Self::Rejected(reason) => Some(Err(reason.clone())),
        }
    }
}
