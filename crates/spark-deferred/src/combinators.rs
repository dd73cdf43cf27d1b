//! 工厂与聚合组合子。
//!
//! ## 设计目标（Why）
//! - 组合子只依赖链式引擎的公开语义：每个输入先被包装为原语，再登记一次延续，不触碰其他原语的内部状态；
//! - 输入元素可以是原语、普通值或任意 [`Thenable`](crate::Thenable)，统一以 `Into<Outcome>` 表达，
//!   普通值写作 `Outcome::Value(v)` 或 `Ok(v)`。
//!
//! ## 顺序规则（What）
//! - `all`/`all_settled`/`any` 的结果向量按**输入位置**排列，与完成先后无关；
//! - `race` 与 `all` 的短路由一次性守卫保证：后到的结算对聚合原语是空操作。

use alloc::{boxed::Box, rc::Rc, vec::Vec};
use core::cell::RefCell;

use crate::{
    deferred::Deferred,
    outcome::Outcome,
};

/// 按输入位置收集结果，`remaining` 归零时交出完整向量。
struct Gather<V> {
    slots: Vec<Option<V>>,
    remaining: usize,
}

impl<V> Gather<V> {
    fn new(len: usize) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            slots: (0..len).map(|_| None).collect(),
            remaining: len,
        }))
    }

    /// 写入第 `index` 个结果；全部到齐时返回按位置排列的向量。
    fn fill(&mut self, index: usize, value: V) -> Option<Vec<V>> {
        if self.slots[index].replace(value).is_none() {
            self.remaining -= 1;
        }
        if self.remaining > 0 {
            return None;
        }
        Some(core::mem::take(&mut self.slots).into_iter().flatten().collect())
    }
}

fn contenders<T, E, I>(items: I) -> Vec<Deferred<T, E>>
where
    T: Clone + 'static,
    E: Clone + 'static,
    I: IntoIterator,
    I::Item: Into<Outcome<T, E>>,
{
    items
        .into_iter()
        .map(Deferred::adopt)
        .collect()
}

impl<T, E> Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// 返回已以 `value` 成功结算的原语。
    pub fn resolve(value: T) -> Self {
        Self::construct(|resolver| {
            resolver.resolve(value);
        })
    }

    /// 返回已以 `reason` 拒绝的原语。
    pub fn reject(reason: E) -> Self {
        Self::construct(|resolver| {
            resolver.reject(reason);
        })
    }

    /// 返回由任意 [`Outcome`] 驱动的原语；传入可订阅对象时跟随它的最终结算。
    pub fn adopt(outcome: impl Into<Outcome<T, E>>) -> Self {
        Self::construct(|resolver| {
            resolver.settle(outcome.into());
        })
    }

    /// 先结算者胜出，无论成功还是失败。
    ///
    /// # 契约说明（What）
    /// - 普通值被包装为已成功的原语，因此位于首个已结算元素之前的未结算元素不会影响结果；
    /// - 空输入返回永不结算的原语；
    /// - 其余元素之后的结算被静默忽略。
    pub fn race<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Outcome<T, E>>,
    {
        Self::construct(|resolver| {
            for contender in contenders(items) {
                let resolver = resolver.clone();
                contender.register(Box::new(move |settled| {
                    resolver.settle(settled.into());
                }));
            }
        })
    }

    /// 全部成功后按输入位置给出结果向量；任一失败立即以该原因拒绝。
    ///
    /// # 教案式说明
    /// - **契约 (What)**：空输入立即以空向量成功；首个拒绝胜出，之后到达的成功结果被丢弃；
    /// - **执行 (How)**：每个元素登记一个延续，成功时把值写入自己的位置并递减计数，计数归零即结算聚合原语；
    ///   已结算的元素在登记时同步回调，因此计数在循环期间就可能归零。
    pub fn all<I>(items: I) -> Deferred<Vec<T>, E>
    where
        I: IntoIterator,
        I::Item: Into<Outcome<T, E>>,
    {
        let contenders = contenders(items);
        Deferred::<Vec<T>, E>::construct(|resolver| {
            if contenders.is_empty() {
                resolver.resolve(Vec::new());
                return;
            }

            let gather = Gather::new(contenders.len());
            for (index, contender) in contenders.iter().enumerate() {
                let resolver = resolver.clone();
                let gather = Rc::clone(&gather);
                contender.register(Box::new(move |settled| match settled {
                    Ok(value) => {
                        let complete = gather.borrow_mut().fill(index, value);
                        if let Some(values) = complete {
                            resolver.resolve(values);
                        }
                    }
                    Err(reason) => {
                        resolver.reject(reason);
                    }
                }));
            }
        })
    }

    /// 等待全部元素结算，按输入位置给出每个元素的结果；聚合原语从不拒绝。
    pub fn all_settled<I>(items: I) -> Deferred<Vec<Result<T, E>>, E>
    where
        I: IntoIterator,
        I::Item: Into<Outcome<T, E>>,
    {
        let contenders = contenders(items);
        Deferred::<Vec<Result<T, E>>, E>::construct(|resolver| {
            if contenders.is_empty() {
                resolver.resolve(Vec::new());
                return;
            }

            let gather = Gather::new(contenders.len());
            for (index, contender) in contenders.iter().enumerate() {
                let resolver = resolver.clone();
                let gather = Rc::clone(&gather);
                contender.register(Box::new(move |settled| {
                    let complete = gather.borrow_mut().fill(index, settled);
                    if let Some(results) = complete {
                        resolver.resolve(results);
                    }
                }));
            }
        })
    }

    /// 首个成功者胜出；全部失败时以按输入位置排列的原因向量拒绝，空输入立即拒绝。
    pub fn any<I>(items: I) -> Deferred<T, Vec<E>>
    where
        I: IntoIterator,
        I::Item: Into<Outcome<T, E>>,
    {
        let contenders = contenders(items);
        Deferred::<T, Vec<E>>::construct(|resolver| {
            if contenders.is_empty() {
                resolver.reject(Vec::new());
                return;
            }

            let gather = Gather::new(contenders.len());
            for (index, contender) in contenders.iter().enumerate() {
                let resolver = resolver.clone();
                let gather = Rc::clone(&gather);
                contender.register(Box::new(move |settled| match settled {
                    Ok(value) => {
                        resolver.resolve(value);
                    }
                    Err(reason) => {
                        let complete = gather.borrow_mut().fill(index, reason);
                        if let Some(reasons) = complete {
                            resolver.reject(reasons);
                        }
                    }
                }));
            }
        })
    }
}
