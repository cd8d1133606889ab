//! 订阅基数在真实线程竞争下的行为。

use std::{
    sync::{Arc, Barrier},
    thread,
};

use spark_concurrent::{
    SingleSource, SubscribeError, TestSingle, TestSingleSubscriber,
    function::{ConcurrentSubscribers, NonResubscribeable, SequentialSubscribers},
};

const RACERS: usize = 8;

/// 让 `RACERS` 个线程在同一屏障后同时订阅，返回各自的订阅者探针。
fn race(single: &Arc<TestSingle<u32>>) -> Vec<Arc<TestSingleSubscriber<u32>>> {
    let barrier = Arc::new(Barrier::new(RACERS));
    let handles: Vec<_> = (0..RACERS)
        .map(|_| {
            let single = Arc::clone(single);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let recorder = Arc::new(TestSingleSubscriber::new());
                barrier.wait();
                single.subscribe(Box::new(Arc::clone(&recorder)));
                recorder
            })
        })
        .collect();
    handles
        .into_iter()
        .map(|handle| handle.join().expect("subscriber thread must not panic"))
        .collect()
}

fn rejected(recorders: &[Arc<TestSingleSubscriber<u32>>]) -> usize {
    recorders.iter().filter(|recorder| recorder.error().is_some()).count()
}

#[test]
fn sequential_race_has_exactly_one_winner() {
    for _ in 0..50 {
        let policy = SequentialSubscribers::new();
        let single = Arc::new(
            TestSingle::builder()
                .sequential_subscribers_with(policy.clone())
                .build(),
        );
        let recorders = race(&single);
        assert_eq!(rejected(&recorders), RACERS - 1);
        assert!(policy.is_active());
        assert_eq!(policy.subscription_count(), 1);
        assert!(recorders.iter().all(|recorder| recorder.on_subscribe_count() == 1));
    }
}

#[test]
fn sequential_rejections_are_reported_together() {
    let single = Arc::new(TestSingle::<u32>::new());
    let recorders = race(&single);
    assert_eq!(rejected(&recorders), RACERS - 1);

    let violations = single.violations();
    assert_eq!(violations.len(), RACERS - 1, "每个被拒绝的订阅都必须被记录");
    for violation in &violations {
        assert!(violation.to_string().starts_with("duplicate subscriber"));
    }
}

#[test]
fn concurrent_race_accepts_everyone() {
    let policy = ConcurrentSubscribers::new();
    let single = Arc::new(
        TestSingle::builder()
            .concurrent_subscribers_with(policy.clone())
            .build(),
    );
    let recorders = race(&single);

    assert_eq!(rejected(&recorders), 0);
    assert_eq!(policy.subscription_count(), RACERS);
    assert!(single.violations().is_empty());
    assert!(recorders.iter().all(|recorder| recorder.subscription_received()));
}

#[test]
fn non_resubscribeable_race_has_exactly_one_winner_forever() {
    let policy = NonResubscribeable::new();
    let single = Arc::new(
        TestSingle::builder()
            .single_subscriber_with(policy.clone())
            .build(),
    );
    let recorders = race(&single);
    assert_eq!(rejected(&recorders), RACERS - 1);
    assert!(policy.is_used());

    let late = Arc::new(TestSingleSubscriber::<u32>::new());
    single.subscribe(Box::new(Arc::clone(&late)));
    let error = late.error().expect("late subscriber rejected");
    assert_eq!(
        error.to_string(),
        SubscribeError::Resubscribed.to_string()
    );
}
