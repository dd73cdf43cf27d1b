//! 线程内的延续冲刷队列。
//!
//! ## 设计目标（Why）
//! - 结算会触发后继结算，后继又触发它的后继；若在跃迁内直接调用延续，链有多长调用栈就有多深，
//!   几千级的链即可耗尽线程栈；
//! - 改为把延续排入线程内队列，由最外层的跃迁循环执行，调用栈深度与链长无关。
//!
//! ## 契约说明（What）
//! - [`run`] 返回前，本次以及执行期间新排入的全部任务都已执行完毕，对调用方仍是同步语义；
//! - 嵌套调用（在任务内部再次结算）只排队不执行，由外层循环按 FIFO 顺序接着执行；
//! - 任务 panic 时重置冲刷标记，剩余任务保留在队列中，由下一次结算继续执行。

use alloc::{boxed::Box, collections::VecDeque};
use core::cell::RefCell;

/// 一条待执行的延续，已绑定其结算结果。
pub(crate) type Job = Box<dyn FnOnce()>;

struct Flush {
    draining: bool,
    jobs: VecDeque<Job>,
}

thread_local! {
    static FLUSH: RefCell<Flush> = const {
        RefCell::new(Flush {
            draining: false,
            jobs: VecDeque::new(),
        })
    };
}

/// 排入任务；若当前线程没有正在进行的冲刷，则就地执行直到队列清空。
pub(crate) fn run(jobs: impl IntoIterator<Item = Job>) {
    let outermost = FLUSH.with(|flush| {
        let mut flush = flush.borrow_mut();
        flush.jobs.extend(jobs);
        !core::mem::replace(&mut flush.draining, true)
    });
    if !outermost {
        return;
    }

    let _guard = DrainGuard;
    while let Some(job) = FLUSH.with(|flush| flush.borrow_mut().jobs.pop_front()) {
        job();
    }
}

/// 冲刷结束（含 panic 展开）时清除标记。
struct DrainGuard;

impl Drop for DrainGuard {
    fn drop(&mut self) {
        let _ = FLUSH.try_with(|flush| flush.borrow_mut().draining = false);
    }
}
