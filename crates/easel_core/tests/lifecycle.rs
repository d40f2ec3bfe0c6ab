//! Registration and disposal behaviour of the context proxy

use easel_core::{
    BatchedContextProxy, ChannelError, ContextDescriptor, ContextHandle, Lifecycle, ProxyError,
    RecordingChannel, RemoteAction,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn setup() -> (Arc<RecordingChannel>, Arc<BatchedContextProxy>) {
    let channel = Arc::new(RecordingChannel::new());
    let proxy = BatchedContextProxy::new(
        ContextHandle::new("canvas"),
        ContextDescriptor::new("Canvas2d"),
        channel.clone(),
    );
    (channel, Arc::new(proxy))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_registration_happens_once_for_concurrent_callers() {
    let (channel, proxy) = setup();
    let hold = channel.hold(RemoteAction::Add).unwrap();

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let proxy = proxy.clone();
            tokio::spawn(async move { proxy.ensure_initialized().await })
        })
        .collect();
    channel.wait_for(RemoteAction::Add, 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(proxy.lifecycle(), Lifecycle::Initializing);

    hold.release();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(channel.count(RemoteAction::Add), 1);
    assert_eq!(proxy.lifecycle(), Lifecycle::Ready);
}

#[tokio::test]
async fn test_first_operation_registers() {
    let (channel, proxy) = setup();

    proxy.enqueue("save", true, vec![]).await.unwrap();
    proxy.enqueue("restore", true, vec![]).await.unwrap();

    let actions: Vec<RemoteAction> = channel.calls().iter().map(|c| c.action()).collect();
    assert_eq!(
        actions,
        vec![RemoteAction::Add, RemoteAction::CallBatch, RemoteAction::CallBatch]
    );
    assert!(channel.is_registered(proxy.handle()));
}

#[tokio::test]
async fn test_failed_registration_is_surfaced_and_retryable() {
    let (channel, proxy) = setup();
    channel.fail_next(RemoteAction::Add, ChannelError::Transport("host not ready".into()));

    let first = proxy.enqueue("save", true, vec![]).await;

    match first {
        Err(ProxyError::RegistrationFailed { context, source }) => {
            assert_eq!(context, "Canvas2d");
            assert_eq!(source, ChannelError::Transport("host not ready".into()));
        }
        other => panic!("expected registration failure, got {other:?}"),
    }
    assert_eq!(proxy.lifecycle(), Lifecycle::Uninitialized);
    assert_eq!(channel.count(RemoteAction::Add), 1);
    assert_eq!(channel.count(RemoteAction::CallBatch), 0);

    proxy.enqueue("save", true, vec![]).await.unwrap();
    assert_eq!(channel.count(RemoteAction::Add), 2);
    assert_eq!(proxy.lifecycle(), Lifecycle::Ready);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_waiter_registers_itself_after_failed_attempt() {
    let (channel, proxy) = setup();
    channel.fail_next(RemoteAction::Add, ChannelError::Remote("rejected".into()));
    let hold = channel.hold(RemoteAction::Add).unwrap();

    let failing = {
        let proxy = proxy.clone();
        tokio::spawn(async move { proxy.ensure_initialized().await })
    };
    channel.wait_for(RemoteAction::Add, 1).await;
    let waiting = {
        let proxy = proxy.clone();
        tokio::spawn(async move { proxy.ensure_initialized().await })
    };

    hold.release();

    assert!(matches!(
        failing.await.unwrap(),
        Err(ProxyError::RegistrationFailed { .. })
    ));
    waiting.await.unwrap().unwrap();
    assert_eq!(channel.count(RemoteAction::Add), 2);
    assert_eq!(proxy.lifecycle(), Lifecycle::Ready);
}

#[tokio::test]
async fn test_disposed_proxy_rejects_every_operation() {
    let (channel, proxy) = setup();
    proxy.enqueue("save", true, vec![]).await.unwrap();

    proxy.dispose();
    channel.wait_for(RemoteAction::Remove, 1).await;
    let calls_before = channel.calls().len();

    assert!(matches!(
        proxy.enqueue("restore", true, vec![]).await,
        Err(ProxyError::AlreadyDisposed)
    ));
    assert!(matches!(
        proxy.invoke_with_result::<Value>("measureText", vec![json!("x")]).await,
        Err(ProxyError::AlreadyDisposed)
    ));
    assert!(matches!(
        proxy.get_property::<Value>("fillStyle").await,
        Err(ProxyError::AlreadyDisposed)
    ));
    assert!(matches!(proxy.begin_batch().await, Err(ProxyError::AlreadyDisposed)));
    assert!(matches!(proxy.end_batch().await, Err(ProxyError::AlreadyDisposed)));
    assert!(matches!(proxy.flush().await, Err(ProxyError::AlreadyDisposed)));
    assert!(matches!(proxy.resize_query().await, Err(ProxyError::AlreadyDisposed)));

    proxy.dispose();
    proxy.dispose_async().await;
    tokio::task::yield_now().await;

    assert_eq!(channel.calls().len(), calls_before);
    assert_eq!(channel.count(RemoteAction::Remove), 1);
    assert!(!channel.is_registered(proxy.handle()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dispose_during_registration_deregisters_once() {
    let (channel, proxy) = setup();
    let hold = channel.hold(RemoteAction::Add).unwrap();

    let registering = {
        let proxy = proxy.clone();
        tokio::spawn(async move { proxy.ensure_initialized().await })
    };
    channel.wait_for(RemoteAction::Add, 1).await;

    proxy.dispose();
    assert_eq!(proxy.lifecycle(), Lifecycle::Disposed);
    assert_eq!(channel.count(RemoteAction::Remove), 0);

    hold.release();
    assert!(matches!(
        registering.await.unwrap(),
        Err(ProxyError::AlreadyDisposed)
    ));
    channel.wait_for(RemoteAction::Remove, 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(channel.count(RemoteAction::Remove), 1);
    assert!(!channel.is_registered(proxy.handle()));
}

#[tokio::test]
async fn test_cancelled_registration_after_dispose_still_deregisters() {
    let (channel, proxy) = setup();
    let hold = channel.hold(RemoteAction::Add).unwrap();

    let registering = {
        let proxy = proxy.clone();
        tokio::spawn(async move { proxy.ensure_initialized().await })
    };
    channel.wait_for(RemoteAction::Add, 1).await;

    proxy.dispose();
    registering.abort();
    assert!(registering.await.unwrap_err().is_cancelled());

    channel.wait_for(RemoteAction::Remove, 1).await;
    hold.release();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(channel.count(RemoteAction::Add), 1);
    assert_eq!(channel.count(RemoteAction::Remove), 1);
}

#[tokio::test]
async fn test_cancelled_registration_without_dispose_allows_retry() {
    let (channel, proxy) = setup();
    let hold = channel.hold(RemoteAction::Add).unwrap();

    let registering = {
        let proxy = proxy.clone();
        tokio::spawn(async move { proxy.ensure_initialized().await })
    };
    channel.wait_for(RemoteAction::Add, 1).await;
    registering.abort();
    assert!(registering.await.unwrap_err().is_cancelled());

    assert_eq!(proxy.lifecycle(), Lifecycle::Uninitialized);
    assert_eq!(channel.count(RemoteAction::Remove), 0);

    hold.release();
    proxy.ensure_initialized().await.unwrap();
    assert_eq!(proxy.lifecycle(), Lifecycle::Ready);
}

#[tokio::test]
async fn test_deregistration_failure_is_swallowed() {
    let (channel, proxy) = setup();
    proxy.ensure_initialized().await.unwrap();
    channel.fail_next(RemoteAction::Remove, ChannelError::Closed);

    proxy.dispose_async().await;

    assert_eq!(proxy.lifecycle(), Lifecycle::Disposed);
    assert_eq!(channel.count(RemoteAction::Remove), 1);
}

#[tokio::test]
async fn test_drop_deregisters() {
    let channel = Arc::new(RecordingChannel::new());
    let handle = ContextHandle::new("transient");
    {
        let proxy = BatchedContextProxy::new(
            handle.clone(),
            ContextDescriptor::new("Canvas2d"),
            channel.clone(),
        );
        proxy.ensure_initialized().await.unwrap();
        assert!(channel.is_registered(&handle));
    }

    channel.wait_for(RemoteAction::Remove, 1).await;
    tokio::task::yield_now().await;
    assert!(!channel.is_registered(&handle));
}

#[tokio::test]
async fn test_read_back_failure_propagates_without_retry() {
    let (channel, proxy) = setup();
    channel.fail_next(RemoteAction::GetProperty, ChannelError::Remote("no such property".into()));

    let result = proxy.get_property::<String>("fillStyle").await;

    match result {
        Err(ProxyError::ReadBackFailed { operation, source }) => {
            assert_eq!(operation, "fillStyle");
            assert_eq!(source, ChannelError::Remote("no such property".into()));
        }
        other => panic!("expected read-back failure, got {other:?}"),
    }
    assert_eq!(channel.count(RemoteAction::GetProperty), 1);
}
