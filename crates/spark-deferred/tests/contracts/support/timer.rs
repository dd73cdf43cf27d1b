use std::{cell::RefCell, collections::BTreeMap, rc::Rc, time::Duration};

type Callback = Box<dyn FnOnce()>;

#[derive(Default)]
struct Queue {
    now: Duration,
    seq: u64,
    entries: BTreeMap<(Duration, u64), Callback>,
}

/// 确定性虚拟定时器，模拟宿主的 `setTimeout`。
///
/// # 设计背景（Why）
/// - 契约测试需要精确控制“哪个原语先结算”，以验证竞速、聚合与扁平化的顺序规则；
/// - 真实定时器会引入抖动，无法保证重放一致。
///
/// # 实现逻辑（How）
/// - 条目按 `(到期时间, 登记序号)` 排序存放，同一时刻到期的回调按登记顺序执行；
/// - 执行回调前释放内部借用，回调内可以继续 `set_timeout`。
///
/// # 输入/输出契约（What）
/// - `advance(delta)` 返回推进后的当前时间；时间只会前进；
/// - `run_until_idle()` 持续推进直到队列为空，返回执行的回调数量。
#[derive(Clone, Default)]
pub(crate) struct VirtualTimer {
    queue: Rc<RefCell<Queue>>,
}

impl VirtualTimer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 当前虚拟时间。
    pub(crate) fn now(&self) -> Duration {
        self.queue.borrow().now
    }

    /// 尚未执行的回调数量。
    pub(crate) fn pending(&self) -> usize {
        self.queue.borrow().entries.len()
    }

    /// 登记在 `delay` 之后执行的回调。
    pub(crate) fn set_timeout(&self, delay: Duration, callback: impl FnOnce() + 'static) {
        let mut queue = self.queue.borrow_mut();
        let due = queue.now.saturating_add(delay);
        let seq = queue.seq;
        queue.seq += 1;
        queue.entries.insert((due, seq), Box::new(callback));
    }

    /// 推进 `delta`，执行期间到期的全部回调。
    pub(crate) fn advance(&self, delta: Duration) -> Duration {
        let target = self.now().saturating_add(delta);
        while let Some(callback) = self.pop_due(target) {
            callback();
        }
        self.queue.borrow_mut().now = target;
        target
    }

    /// 执行全部回调，包括执行期间新登记的回调。
    pub(crate) fn run_until_idle(&self) -> usize {
        let mut fired = 0;
        while let Some(callback) = self.pop_due(Duration::MAX) {
            callback();
            fired += 1;
        }
        fired
    }

    fn pop_due(&self, target: Duration) -> Option<Callback> {
        let mut queue = self.queue.borrow_mut();
        let (&(due, seq), _) = queue.entries.first_key_value()?;
        if due > target {
            return None;
        }
        queue.now = due;
        queue.entries.remove(&(due, seq))
    }
}

#[test]
fn timer_fires_in_due_then_registration_order() {
    let timer = VirtualTimer::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    for (delay, label) in [(20, "b"), (10, "a"), (20, "c")] {
        let order = Rc::clone(&order);
        timer.set_timeout(Duration::from_millis(delay), move || {
            order.borrow_mut().push(label);
        });
    }

    assert_eq!(timer.advance(Duration::from_millis(15)), Duration::from_millis(15));
    assert_eq!(*order.borrow(), vec!["a"]);
    assert_eq!(timer.run_until_idle(), 2);
    assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    assert_eq!(timer.pending(), 0);
}
