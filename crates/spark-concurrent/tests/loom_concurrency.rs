#![cfg(any(loom, spark_loom))]

use loom::{model, sync::Arc, thread};
use spark_concurrent::{
    SubscribeError,
    function::{NonResubscribeable, SequentialSubscribers, SubscriberFunction},
    test_util::TestSingleSubscriber,
};

fn claim<F>(function: &F) -> Result<(), SubscribeError>
where
    F: SubscriberFunction<u8>,
{
    function
        .apply(Box::new(TestSingleSubscriber::<u8>::new()))
        .map(drop)
}

#[test]
fn sequential_claim_has_single_winner_under_all_interleavings() {
    //
    // 教案级说明：两个线程同时订阅顺序策略的源。
    // - **Why**：若声明不是一次原子的比较交换，某种交错下两个线程都会看到 `Idle` 并同时成为活跃订阅者；
    // - **What**：任意交错下恰好一个线程成功，另一个收到 `AlreadySubscribed`。
    model(|| {
        let function = Arc::new(SequentialSubscribers::<u8>::new());
        let racer = {
            let function = Arc::clone(&function);
            thread::spawn(move || claim(&*function).is_ok())
        };
        let local = claim(&*function).is_ok();
        let remote = racer.join().expect("racer must not panic");

        assert!(local ^ remote, "恰好一个订阅者胜出");
        assert!(function.is_active());
    });
}

#[test]
fn non_resubscribeable_claim_has_single_winner_under_all_interleavings() {
    model(|| {
        let function = Arc::new(NonResubscribeable::<u8>::new());
        let racer = {
            let function = Arc::clone(&function);
            thread::spawn(move || claim(&*function))
        };
        let local = claim(&*function);
        let remote = racer.join().expect("racer must not panic");

        let winners = [&local, &remote].iter().filter(|outcome| outcome.is_ok()).count();
        assert_eq!(winners, 1);
        let loser = if local.is_err() { local } else { remote };
        assert_eq!(loser, Err(SubscribeError::Resubscribed));
    });
}
