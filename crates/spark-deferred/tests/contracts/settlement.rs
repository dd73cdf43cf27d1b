//! 结算核心契约：执行器同步执行、首次结算生效、延续按登记时机执行。

use spark_deferred::{Deferred, DeferredState, Rejection, StateAdvance};

use crate::support::{VirtualTimer, Witness, later, ms};

#[test]
fn executor_is_called_instantly() {
    let witness = Witness::new();
    let recorder = witness.clone();
    let _deferred: Deferred<()> = Deferred::new(move |_| {
        recorder.record("foo");
        Ok(())
    });
    assert_eq!(witness.last(), Some("foo"));
}

#[test]
fn success_handler_runs_on_resolve() {
    let timer = VirtualTimer::new();
    let witness = Witness::new();
    let recorder = witness.clone();
    let _observer = later(&timer, ms(10), "foo").then(move |value| {
        recorder.record(value);
        Ok(())
    });

    timer.advance(ms(9));
    assert_eq!(witness.calls(), 0, "到期前延续不得执行");
    timer.advance(ms(1));
    assert_eq!(witness.last(), Some("foo"));
}

#[test]
fn multiple_success_handlers_each_run_once() {
    let timer = VirtualTimer::new();
    let deferred = later(&timer, ms(10), "foo");
    let first = Witness::new();
    let second = Witness::new();

    let recorder = first.clone();
    let _a = deferred.then(move |value| {
        recorder.record(value);
        Ok(())
    });
    let recorder = second.clone();
    let _b = deferred.then(move |value| {
        recorder.record(value);
        Ok(())
    });

    timer.run_until_idle();
    assert_eq!((first.calls(), first.last()), (1, Some("foo")));
    assert_eq!((second.calls(), second.last()), (1, Some("foo")));
}

#[test]
fn handlers_attached_after_resolution_still_run() {
    let timer = VirtualTimer::new();
    let deferred = later(&timer, ms(10), "foo");
    let witness = Witness::new();

    let handle = deferred.clone();
    let recorder = witness.clone();
    let scheduler = timer.clone();
    let _outer = deferred.then(move |_| {
        scheduler.set_timeout(ms(10), move || {
            let _late = handle.then(move |value| {
                recorder.record(value);
                Ok(())
            });
        });
        Ok(())
    });

    timer.advance(ms(10));
    assert_eq!(witness.calls(), 0);
    timer.advance(ms(10));
    assert_eq!(witness.last(), Some("foo"));
}

#[test]
fn second_resolve_does_nothing() {
    let timer = VirtualTimer::new();
    let advances = Witness::new();
    let recorder = advances.clone();
    let scheduler = timer.clone();
    let deferred: Deferred<&str> = Deferred::new(move |resolver| {
        scheduler.set_timeout(ms(100), move || {
            let first = resolver.resolve("foo");
            let second = resolver.resolve("bar");
            recorder.record((first, second));
        });
        Ok(())
    });
    let witness = Witness::new();
    let recorder = witness.clone();
    let _observer = deferred.then(move |value| {
        recorder.record(value);
        Ok(())
    });

    timer.run_until_idle();
    assert_eq!(witness.calls(), 1);
    assert_eq!(witness.last(), Some("foo"));
    assert_eq!(
        advances.last(),
        Some((
            StateAdvance::Transition {
                from: DeferredState::Pending,
                to: DeferredState::Resolved,
            },
            StateAdvance::Noop {
                state: DeferredState::Resolved,
            },
        ))
    );
}

#[test]
fn reject_after_resolve_is_ignored() {
    let (deferred, resolver) = Deferred::<u8>::pending();
    resolver.resolve(1);
    let advance = resolver.reject(Rejection::rejected("too late"));
    assert_eq!(advance.current(), DeferredState::Resolved);
    assert_eq!(deferred.peek(), Some(Ok(1)));
    assert_eq!(resolver.state(), DeferredState::Resolved);
}

#[test]
fn error_handler_runs_on_rejection() {
    let timer = VirtualTimer::new();
    let scheduler = timer.clone();
    let deferred: Deferred<()> = Deferred::new(move |resolver| {
        scheduler.set_timeout(ms(100), move || {
            resolver.reject(Rejection::rejected("Something went wrong"));
        });
        Ok(())
    });
    let witness = Witness::new();
    let recorder = witness.clone();
    let _handled = deferred.catch(move |reason| {
        recorder.record(reason);
        Ok(())
    });

    timer.run_until_idle();
    assert_eq!(witness.last(), Some(Rejection::rejected("Something went wrong")));
    assert_eq!(deferred.state(), DeferredState::Rejected);
}

#[test]
fn executor_failure_rejects_synchronously() {
    let deferred: Deferred<u8> = Deferred::new(|_| Err(Rejection::rejected("thrown")));
    assert_eq!(deferred.state(), DeferredState::Rejected);
    assert_eq!(deferred.peek(), Some(Err(Rejection::rejected("thrown"))));
}

#[test]
fn pending_reactions_are_flushed_on_settlement() {
    let timer = VirtualTimer::new();
    let deferred = later(&timer, ms(5), 1u8);
    let _a = deferred.chain();
    let _b = deferred.finally(|| Ok(()));
    assert_eq!(deferred.pending_reactions(), 2);

    timer.run_until_idle();
    assert_eq!(deferred.pending_reactions(), 0);
    assert!(deferred.is_settled());
}

#[test]
fn default_deferred_never_settles() {
    let deferred = Deferred::<u8>::default();
    let mirror = deferred.chain();
    assert_eq!(mirror.state(), DeferredState::Pending);
    assert_eq!(deferred.peek(), None);
}

#[test]
fn timer_driven_settlement_flushes_long_chains() {
    const DEPTH: u64 = 10_000;
    let timer = VirtualTimer::new();
    let head = later(&timer, ms(5), 0u64);
    let mut tail = head.chain();
    for _ in 0..DEPTH {
        tail = tail.then(|value| Ok(value + 1));
    }
    assert_eq!(tail.state(), DeferredState::Pending);

    timer.run_until_idle();
    assert_eq!(tail.peek(), Some(Ok(DEPTH)));
}
