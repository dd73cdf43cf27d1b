//! 延续（continuation）的返回形态与 Thenable 能力契约。
//!
//! ## 设计目标（Why）
//! - 延续可以返回普通值、同步失败，或者另一个尚未结算的原语；三者必须被显式区分，
//!   否则后继原语会出现“原语套原语”的嵌套结果；
//! - “是否可链式订阅”以能力（trait）而非具体类型判断，外部基于回调的实现只要实现
//!   [`Thenable`] 即可与 [`Deferred`](crate::Deferred) 互操作。
//!
//! ## 契约说明（What）
//! - [`Outcome::Value`] 立即以值结算后继；
//! - [`Outcome::Fail`] 立即以原因拒绝后继，对应同步抛错；
//! - [`Outcome::Adopt`] 让后继跟随被采纳对象的最终结算（扁平化）。

use alloc::boxed::Box;
use core::fmt;

/// 成功回调的装箱形态。
pub type OnResolved<T> = Box<dyn FnOnce(T)>;

/// 失败回调的装箱形态。
pub type OnRejected<E> = Box<dyn FnOnce(E)>;

/// 可订阅结算结果的能力。
///
/// # 契约说明（What）
/// - `on_settle` 接收两个延续，实现方必须在结算时**至多调用其中一个、至多一次**；
/// - 调用可以同步发生（对象已结算）也可以延后发生（由外部调度器驱动）；
/// - 若实现方违约多次回调，接收方的一次性守卫会吞掉后续调用，但这属于实现缺陷。
///
/// # 设计取舍（Trade-offs）
/// - 以 `self: Box<Self>` 消费订阅者，避免要求实现方可克隆，同时保证对象安全。
pub trait Thenable<T, E> {
    /// 登记成功与失败两个延续。
    fn on_settle(self: Box<Self>, on_resolved: OnResolved<T>, on_rejected: OnRejected<E>);
}

/// 延续执行后的结果。
pub enum Outcome<T, E> {
    /// 普通值：后继立即以该值结算。
    Value(T),
    /// 失败：后继立即以该原因拒绝。
    Fail(E),
    /// 采纳另一个可订阅对象，后继的结算取决于它。
    Adopt(Box<dyn Thenable<T, E>>),
}

impl<T, E> Outcome<T, E> {
    /// 采纳任意 [`Thenable`] 实现。
    pub fn adopt(thenable: impl Thenable<T, E> + 'static) -> Self {
        Self::Adopt(Box::new(thenable))
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Value(value),
            Err(reason) => Self::Fail(reason),
        }
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Outcome<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Fail(reason) => f.debug_tuple("Fail").field(reason).finish(),
            Self::Adopt(_) => f.write_str("Adopt(..)"),
        }
    }
}
