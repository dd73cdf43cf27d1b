//! 延迟原语契约测试入口。
//!
//! # 模块目的（Why）
//! - 以虚拟定时器扮演外部调度者，按真实使用方式（执行器里登记定时回调）验证结算、链式与组合子契约；
//! - 各子模块按契约维度划分，便于 `cargo test --test contracts <维度>` 过滤。
//!
//! # 结构概览（What）
//! - `settlement`：执行器、一次性结算、延续登记时机；
//! - `chaining`：值传递、扁平化、错误传播与恢复、`finally`；
//! - `combinators`：`race`/`all`/`all_settled`/`any` 的顺序与短路规则；
//! - `async_bridge`：`await` 原语；
//! - `logging`：结构化日志字段；
//! - `properties`：基于 proptest 的性质验证。


mod settlement;
