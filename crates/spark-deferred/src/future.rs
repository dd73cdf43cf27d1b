//! 与 `async`/`await` 的桥接。
//!
//! ## 设计目标（Why）
//! - 原语本身不拥有事件循环；需要在 `async` 代码中等待结算时，通过 [`IntoFuture`] 把句柄交给宿主执行器；
//! - 结算核心在跃迁时唤醒所有已登记的 [`Waker`]，因此桥接层不需要额外的延续或共享状态。
//!
//! ## 契约说明（What）
//! - [`DeferredFuture`] 的输出为 `Result<T, E>`，与 [`Deferred::peek`] 的结果一致；
//! - 同一原语可被多次 `await`（每次 `into_future` 克隆句柄），结果均为结算值的克隆；
//! - 句柄为 `!Send`，只能交给单线程执行器（如 `futures::executor::LocalPool`）。

use core::{
    future::{Future, IntoFuture},
    pin::Pin,
    task::{Context, Poll},
};

use crate::deferred::Deferred;

/// 等待某个原语结算的 `Future`。
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct DeferredFuture<T, E> {
    deferred: Deferred<T, E>,
}

impl<T, E> DeferredFuture<T, E> {
    /// 被等待的原语句柄。
    pub fn deferred(&self) -> &Deferred<T, E> {
        &self.deferred
    }
}

impl<T, E> Future for DeferredFuture<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(settled) = self.deferred.peek() {
            return Poll::Ready(settled);
        }
        self.deferred.register_waker(cx.waker());
        Poll::Pending
    }
}

impl<T, E> IntoFuture for Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    type Output = Result<T, E>;
    type IntoFuture = DeferredFuture<T, E>;

    fn into_future(self) -> Self::IntoFuture {
        DeferredFuture { deferred: self }
    }
}
