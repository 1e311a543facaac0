use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use super::*;

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn fires_once_after_delay() {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let task = schedule_after(Duration::from_millis(250), async move {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    tokio::time::advance(Duration::from_millis(249)).await;
    settle().await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    tokio::time::advance(Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(task.is_finished());
}

#[tokio::test(start_paused = true)]
async fn cancelled_task_never_fires() {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let task = schedule_after(Duration::from_millis(100), async move {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    task.cancel();
    tokio::time::advance(Duration::from_secs(1)).await;
    settle().await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn dropping_handle_cancels() {
    let fired = Arc::new(AtomicUsize::new(0));
    {
        let counter = Arc::clone(&fired);
        let _task = schedule_after(Duration::from_millis(100), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    }

    tokio::time::advance(Duration::from_secs(1)).await;
    settle().await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}
