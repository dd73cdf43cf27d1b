#![deny(unsafe_code)]

//! # spark-deferred
//!
//! ## 定位与职责（Why）
//! - 提供单线程、回调驱动的延迟计算原语 [`Deferred`]：一个最终以值成功或以原因拒绝、且只结算一次的占位对象；
//! - 在其上构建链式延续（`then`/`catch`/`finally`），并支持扁平化：延续返回另一个原语时，
//!   后继跟随它的最终结果，而不是得到“原语套原语”；
//! - 提供聚合组合子 `resolve`/`reject`/`race`/`all`（以及 `all_settled`/`any`），
//!   让多个相互独立的异步操作以确定的顺序规则汇合。
//!
//! ## 架构嵌入（Where）
//! - `state` 定义状态格与 [`StateAdvance`] 返回形态；
//! - `outcome` 定义延续的返回形态与 [`Thenable`] 能力契约；
//! - `deferred` 承载结算核心与链式引擎；
//! - `combinators` 是构建在链式引擎之上的工厂与聚合函数；
//! - `future` 把原语桥接到 `async`/`await`；
//! - `error`、`settings`、`observability` 分别负责错误类型、进程级设置与结构化日志。
//!
//! ## 执行模型（What）
//! - 原语不拥有调度器：结算由外部回调（定时器、I/O 完成）触发，结算调用返回前冲刷已登记的延续；
//!   冲刷经线程内队列迭代进行，链的长度不影响调用栈深度；
//! - 延续以 `Result` 表达同步失败，返回 `Err` 即拒绝后继；panic 不会被捕获。
//!
//! ## 风险提示（Trade-offs）
//! - 句柄基于 `Rc<RefCell<_>>`，不可跨线程；跨线程场景应改用通道或运行时自带的 `Future`。

extern crate alloc;

/// 工厂与聚合组合子。
pub mod combinators;

/// 结算核心与链式引擎。
pub mod deferred;

/// 错误类型与稳定错误码。
pub mod error;

mod flush;

/// `IntoFuture` 桥接。
pub mod future;

/// 结构化日志与订阅者安装。
pub mod observability;

/// 延续返回形态与 Thenable 契约。
pub mod outcome;

/// 进程级诊断设置。
pub mod settings;

/// 状态格定义。
pub mod state;

pub use deferred::{Deferred, Resolver};
pub use error::{ObservabilityError, Rejection, SettingsError, codes};
pub use future::DeferredFuture;
pub use observability::install_subscriber;
pub use outcome::{OnRejected, OnResolved, Outcome, Thenable};
pub use settings::{DeferredSettings, LogLevel};
pub use state::{DeferredState, StateAdvance};
