//! 结算核心与链式引擎。
//!
//! ## 设计目标（Why）
//! - 一个延迟原语只会结算一次；结算调用返回前冲刷所有已登记的延续，已结算后登记的延续在登记调用内立即执行；
//! - 延续经线程内队列（`flush`）执行而非在跃迁内直接调用，长链的结算不会随链长加深调用栈；
//! - 每次链式调用都创建独立的后继原语，并由源原语的延续闭包独占持有后继的 [`Resolver`]，
//!   因而不存在后继之间的共享或环形引用。
//!
//! ## 并发模型（What）
//! - 单线程协作式：句柄基于 `Rc<RefCell<_>>`，天然 `!Send`；
//! - `RefCell` 的借用从不跨越用户回调，回调内对同一原语再次结算或登记都是安全的，
//!   一次性守卫依赖状态检查而不是锁。
//!
//! ## 扁平化（How）
//! - 延续返回 [`Outcome::Adopt`] 时，后继进入“跟随”模式：外部结算调用被忽略，
//!   直到被采纳对象回调成功或失败为止。

use alloc::{boxed::Box, rc::Rc, vec::Vec};
use core::{
    cell::RefCell,
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    task::Waker,
};

use crate::{
    error::Rejection,
    flush::{self, Job},
    observability,
    outcome::{OnRejected, OnResolved, Outcome, Thenable},
    settings,
    state::{DeferredState, Slot, StateAdvance},
};

/// 已登记的延续：接收一份结算结果的克隆。
type Reaction<T, E> = Box<dyn FnOnce(Result<T, E>)>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// 结算单元：原语的全部可变状态。
struct Cell<T, E> {
    id: u64,
    slot: Slot<T, E>,
    following: bool,
    /// 句柄尚未交还调用方：此时的拒绝不可能已有人登记延续。
    constructing: bool,
    reactions: Vec<Reaction<T, E>>,
    wakers: Vec<Waker>,
}

impl<T, E> Cell<T, E> {
    fn new() -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            slot: Slot::Pending,
            following: false,
            constructing: false,
            reactions: Vec::new(),
            wakers: Vec::new(),
        }
    }
}

type Shared<T, E> = Rc<RefCell<Cell<T, E>>>;

/// 结算来源：调用方直接结算，或被采纳对象回调。
#[derive(Clone, Copy, PartialEq, Eq)]
enum Origin {
    Caller,
    Adopted,
}

/// 延迟计算原语的句柄。
///
/// # 契约维度速览
/// - **状态**：`Pending → Resolved | Rejected`，至多一次，永不回退；
/// - **克隆**：`Clone` 只复制句柄，不创建新原语；
/// - **延续**：`then`/`then_or_else`/`catch`/`finally`/`chain` 每次调用返回一个新的后继；
///   同一原语上的延续按登记顺序执行，每个恰好执行一次；
/// - **值传递**：每个延续拿到结算值的一份克隆，因此要求 `T: Clone`、`E: Clone`；
/// - **线程**：`!Send`，结算必须由同一线程上的外部调度者（定时器、I/O 回调）触发。
///
/// # 示例
/// ```rust
/// use spark_deferred::{Deferred, Rejection};
///
/// let (source, resolver) = Deferred::<u32, Rejection>::pending();
/// let doubled = source.then(|value| Ok(value * 2));
/// resolver.resolve(21);
/// assert_eq!(doubled.peek(), Some(Ok(42)));
/// ```
pub struct Deferred<T, E = Rejection> {
    cell: Shared<T, E>,
}

/// 绑定到某个原语的结算入口，即执行器收到的 `resolve`/`reject`。
///
/// - 可克隆、`'static`，适合交给定时器或 I/O 回调延后调用；
/// - 结算调用永不报错，重复调用返回 [`StateAdvance::Noop`]。
pub struct Resolver<T, E = Rejection> {
    cell: Shared<T, E>,
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<T, E> Deferred<T, E> {
    /// 进程内唯一编号，与日志字段 `deferred.id` 一致。
    pub fn id(&self) -> u64 {
        self.cell.borrow().id
    }

    /// 当前状态。
    pub fn state(&self) -> DeferredState {
        self.cell.borrow().slot.state()
    }

    /// 是否已结算。
    pub fn is_settled(&self) -> bool {
        self.state().is_settled()
    }

    /// 两个句柄是否指向同一个原语。
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    /// 当前待执行的延续数量，结算后恒为 0。
    pub fn pending_reactions(&self) -> usize {
        self.cell.borrow().reactions.len()
    }

    pub(crate) fn register_waker(&self, waker: &Waker) {
        let mut cell = self.cell.borrow_mut();
        if cell.wakers.iter().any(|known| known.will_wake(waker)) {
            return;
        }
        cell.wakers.push(waker.clone());
    }
}

impl<T, E> Resolver<T, E> {
    /// 目标原语的当前状态。
    pub fn state(&self) -> DeferredState {
        self.cell.borrow().slot.state()
    }
}

impl<T, E> Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// 创建原语并同步执行一次执行器。
    ///
    /// # 教案式说明
    /// - **契约 (What)**：`executor` 在本函数返回前被调用且仅调用一次，收到绑定到本原语的 [`Resolver`]；
    ///   执行器返回 `Err(reason)` 视为同步失败，等价于立即 `reject(reason)`；若执行器在失败前已经结算，
    ///   则该失败被一次性守卫忽略；
    /// - **执行 (How)**：先创建未结算的单元，再把 `Resolver` 的克隆交给执行器，原语本身从不把失败泄露给调用方。
    pub fn new<F>(executor: F) -> Self
    where
        F: FnOnce(Resolver<T, E>) -> Result<(), E>,
    {
        Self::construct(|resolver| {
            if let Err(reason) = executor(resolver.clone()) {
                resolver.reject(reason);
            }
        })
    }

    /// 创建未结算的原语，并返回其结算入口；等价于省略执行器后保留绑定的回调。
    pub fn pending() -> (Self, Resolver<T, E>) {
        let cell = Rc::new(RefCell::new(Cell::new()));
        (
            Self {
                cell: Rc::clone(&cell),
            },
            Resolver { cell },
        )
    }

    /// 在句柄交还调用方之前运行 `body`。
    ///
    /// 期间发生的拒绝不计为“无人观察”：调用方此时还拿不到句柄，不可能已登记延续。
    pub(crate) fn construct(body: impl FnOnce(&Resolver<T, E>)) -> Self {
        let (deferred, resolver) = Self::pending();
        deferred.cell.borrow_mut().constructing = true;
        body(&resolver);
        deferred.cell.borrow_mut().constructing = false;
        deferred
    }

    /// 读取结算结果的克隆；未结算时返回 `None`。
    pub fn peek(&self) -> Option<Result<T, E>> {
        self.cell.borrow().slot.snapshot()
    }

    /// 登记成功延续；拒绝原样透传给后继。
    ///
    /// # 契约说明（What）
    /// - 延续返回值经 `Into<Outcome>` 转换：`Ok(v)` 以值结算后继，`Err(e)` 视为同步抛错并拒绝后继，
    ///   返回另一个原语则让后继跟随它（扁平化）；
    /// - 源原语已成功结算时，延续在本调用内立即执行；已拒绝时，后继在本调用内立即被拒绝。
    pub fn then<U, F, R>(&self, on_success: F) -> Deferred<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> R + 'static,
        R: Into<Outcome<U, E>>,
    {
        Deferred::<U, E>::construct(|resolver| {
            let resolver = resolver.clone();
            self.register(Box::new(move |settled| match settled {
                Ok(value) => propagate(&resolver, on_success(value).into()),
                Err(reason) => propagate(&resolver, Outcome::Fail(reason)),
            }));
        })
    }

    /// 在**同一个**源原语上同时登记成功与失败延续，二者共享本次调用的后继。
    ///
    /// - `on_error` 只处理源原语的拒绝；`on_success` 自身的失败不会被同一次调用的 `on_error` 捕获，
    ///   而是拒绝后继，交由更下游的 `catch` 处理。
    pub fn then_or_else<U, F, G, R, S>(&self, on_success: F, on_error: G) -> Deferred<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> R + 'static,
        G: FnOnce(E) -> S + 'static,
        R: Into<Outcome<U, E>>,
        S: Into<Outcome<U, E>>,
    {
        Deferred::<U, E>::construct(|resolver| {
            let resolver = resolver.clone();
            self.register(Box::new(move |settled| {
                let outcome: Outcome<U, E> = match settled {
                    Ok(value) => on_success(value).into(),
                    Err(reason) => on_error(reason).into(),
                };
                propagate(&resolver, outcome);
            }));
        })
    }

    /// 登记失败延续；成功值原样透传给后继。
    ///
    /// 延续返回 `Ok(v)` 即视为恢复，后继以 `v` 成功结算，其后的链条回到成功路径。
    pub fn catch<F, R>(&self, on_error: F) -> Self
    where
        F: FnOnce(E) -> R + 'static,
        R: Into<Outcome<T, E>>,
    {
        Self::construct(|resolver| {
            let resolver = resolver.clone();
            self.register(Box::new(move |settled| match settled {
                Ok(value) => propagate(&resolver, Outcome::Value(value)),
                Err(reason) => propagate(&resolver, on_error(reason).into()),
            }));
        })
    }

    /// 登记无论成败都会执行的延续。
    ///
    /// # 契约说明（What）
    /// - 延续不接收任何参数，后继默认镜像源原语的结果；
    /// - 延续返回 `Err(e)`，或采纳的原语最终拒绝，则后继以该新原因拒绝（对应 finally 块内抛错覆盖原结果）；
    /// - 采纳的原语成功时，后继在它结算之后再镜像源原语的结果。
    pub fn finally<F, R>(&self, on_finally: F) -> Self
    where
        F: FnOnce() -> R + 'static,
        R: Into<Outcome<(), E>>,
    {
        Self::construct(|resolver| {
            let resolver = resolver.clone();
            self.register(Box::new(move |settled| {
                let cleanup: Outcome<(), E> = on_finally().into();
                match cleanup {
                    Outcome::Value(()) => propagate(&resolver, settled.into()),
                    Outcome::Fail(reason) => propagate(&resolver, Outcome::Fail(reason)),
                    Outcome::Adopt(thenable) => {
                        let barrier = Deferred::<(), E>::adopt(Outcome::Adopt(thenable));
                        barrier.register(Box::new(move |gate| match gate {
                            Ok(()) => propagate(&resolver, settled.into()),
                            Err(reason) => propagate(&resolver, Outcome::Fail(reason)),
                        }));
                    }
                }
            }));
        })
    }

    /// 不登记任何延续，返回一个镜像源原语结果的后继。
    pub fn chain(&self) -> Self {
        Self::construct(|resolver| {
            let resolver = resolver.clone();
            self.register(Box::new(move |settled| propagate(&resolver, settled.into())));
        })
    }

    /// 登记一个原始延续：未结算时排队，已结算时立即以结果克隆执行。
    pub(crate) fn register(&self, reaction: Reaction<T, E>) {
        let settled = {
            let mut cell = self.cell.borrow_mut();
            match cell.slot.snapshot() {
                Some(settled) => settled,
                None => {
                    cell.reactions.push(reaction);
                    return;
                }
            }
        };
        reaction(settled);
    }
}

impl<T, E> Resolver<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// 以值结算。已结算或正在跟随其他原语时为空操作。
    pub fn resolve(&self, value: T) -> StateAdvance<DeferredState> {
        self.transition(Ok(value), Origin::Caller)
    }

    /// 以原因拒绝。已结算或正在跟随其他原语时为空操作。
    pub fn reject(&self, reason: E) -> StateAdvance<DeferredState> {
        self.transition(Err(reason), Origin::Caller)
    }

    /// 按 [`Outcome`] 结算；`Adopt` 会锁定本原语并跟随被采纳对象。
    ///
    /// # 契约说明（What）
    /// - 被采纳对象同步结算时，返回 `Transition`；仍未结算时返回 `Noop { Pending }`，
    ///   此后外部的 `resolve`/`reject` 均被忽略，直到被采纳对象回调。
    pub fn settle(&self, outcome: Outcome<T, E>) -> StateAdvance<DeferredState> {
        match outcome {
            Outcome::Value(value) => self.resolve(value),
            Outcome::Fail(reason) => self.reject(reason),
            Outcome::Adopt(thenable) => self.follow(thenable),
        }
    }

    fn follow(&self, thenable: Box<dyn Thenable<T, E>>) -> StateAdvance<DeferredState> {
        {
            let mut cell = self.cell.borrow_mut();
            let current = cell.slot.state();
            if current.is_settled() || cell.following {
                observability::ignored(cell.id, current);
                return StateAdvance::Noop { state: current };
            }
            cell.following = true;
        }

        let on_resolved = self.clone();
        let on_rejected = self.clone();
        thenable.on_settle(
            Box::new(move |value| {
                on_resolved.transition(Ok(value), Origin::Adopted);
            }),
            Box::new(move |reason| {
                on_rejected.transition(Err(reason), Origin::Adopted);
            }),
        );

        match self.state() {
            DeferredState::Pending => StateAdvance::Noop {
                state: DeferredState::Pending,
            },
            to => StateAdvance::Transition {
                from: DeferredState::Pending,
                to,
            },
        }
    }

    /// 唯一的写入点：检查、写入、取出延续均在一次借用内完成，排入冲刷队列前释放借用。
    fn transition(&self, settled: Result<T, E>, origin: Origin) -> StateAdvance<DeferredState> {
        let (id, to, constructing, reactions, wakers) = {
            let mut cell = self.cell.borrow_mut();
            let current = cell.slot.state();
            if current.is_settled() || (cell.following && origin == Origin::Caller) {
                observability::ignored(cell.id, current);
                return StateAdvance::Noop { state: current };
            }
            cell.slot.fill(settled.clone());
            cell.following = false;
            (
                cell.id,
                cell.slot.state(),
                cell.constructing,
                core::mem::take(&mut cell.reactions),
                core::mem::take(&mut cell.wakers),
            )
        };

        let settings = settings::current();
        observability::settled(settings, id, to, reactions.len());
        if to == DeferredState::Rejected && reactions.is_empty() && !constructing {
            observability::unobserved_rejection(settings, id);
        }

        for waker in wakers {
            waker.wake();
        }
        flush::run(reactions.into_iter().map(|reaction| {
            let settled = settled.clone();
            Box::new(move || reaction(settled)) as Job
        }));

        StateAdvance::Transition {
            from: DeferredState::Pending,
            to,
        }
    }
}

/// 把延续的结果写入后继；后继的 `Resolver` 由延续闭包独占，返回值无需观察。
fn propagate<T, E>(resolver: &Resolver<T, E>, outcome: Outcome<T, E>)
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    resolver.settle(outcome);
}

impl<T, E> Thenable<T, E> for Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    fn on_settle(self: Box<Self>, on_resolved: OnResolved<T>, on_rejected: OnRejected<E>) {
        self.register(Box::new(move |settled| match settled {
            Ok(value) => on_resolved(value),
            Err(reason) => on_rejected(reason),
        }));
    }
}

impl<T, E> From<Deferred<T, E>> for Outcome<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    fn from(deferred: Deferred<T, E>) -> Self {
        Outcome::Adopt(Box::new(deferred))
    }
}

impl<T, E> Default for Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// 永不结算的原语，等价于以空执行器构造。
    fn default() -> Self {
        Self::pending().0
    }
}

impl<T, E> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = self.cell.borrow();
        f.debug_struct("Deferred")
            .field("id", &cell.id)
            .field("state", &cell.slot.state())
            .field("reactions", &cell.reactions.len())
            .finish()
    }
}

impl<T, E> fmt::Debug for Resolver<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = self.cell.borrow();
        f.debug_struct("Resolver")
            .field("id", &cell.id)
            .field("state", &cell.slot.state())
            .finish()
    }
}
