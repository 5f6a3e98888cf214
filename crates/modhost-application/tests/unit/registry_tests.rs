//! Singleton registry tests

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use modhost_application::ServiceDescriptor;
use modhost_application::ServiceCatalog;
use modhost_application::ServiceRegistry;
use modhost_application::services::{ErasedService, ViewTable};
use modhost_domain::{Error, ErrorKind, ModuleId};

use crate::support::{CountingGreeter, FrenchGreeter, Greeter, module_with};

fn counting_catalog(constructions: &Arc<AtomicUsize>) -> ServiceCatalog {
    let counter = Arc::clone(constructions);
    ServiceCatalog::new().with(
        ServiceDescriptor::<CountingGreeter>::new()
            .with_default(move || {
                let id = counter.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                Ok(CountingGreeter { id })
            })
            .provides::<dyn Greeter>(|s| s),
    )
}

// ============================================================================
// Single construction
// ============================================================================

/// N concurrent first requests share one construction and one instance
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_construct_once() {
    let constructions = Arc::new(AtomicUsize::new(0));
    let module = module_with(counting_catalog(&constructions));

    let requests: Vec<_> = (0..32)
        .map(|_| {
            let module = module.clone();
            tokio::spawn(async move { module.service::<dyn Greeter>().await })
        })
        .collect();

    let mut instances = Vec::new();
    for request in requests {
        instances.push(request.await.expect("join").expect("service"));
    }

    assert_eq!(constructions.load(Ordering::SeqCst), 1);
    let first = &instances[0];
    assert!(instances.iter().all(|instance| Arc::ptr_eq(instance, first)));
    assert_eq!(first.greet(), "hello #0");
}

/// A failed construction is replayed to every requester, never retried
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_construction_replayed() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let module = module_with(ServiceCatalog::new().with(
        ServiceDescriptor::<CountingGreeter>::new()
            .with_default(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                anyhow::bail!("warehouse offline")
            })
            .provides::<dyn Greeter>(|s| s),
    ));

    let requests: Vec<_> = (0..16)
        .map(|_| {
            let module = module.clone();
            tokio::spawn(async move { module.service::<dyn Greeter>().await })
        })
        .collect();

    for request in requests {
        let err = request.await.expect("join").err().expect("construction must fail");
        assert_eq!(err.kind(), ErrorKind::Construction);
        assert!(err.to_string().contains("warehouse offline"));
    }

    let later = module.service::<dyn Greeter>().await.err().expect("cached failure");
    assert_eq!(later.kind(), ErrorKind::Construction);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

async fn blow_up() -> anyhow::Result<FrenchGreeter> {
    panic!("factory blew up")
}

/// A panicking factory is recorded as a construction failure and replayed
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_factory_replayed_as_failure() {
    let module = module_with(ServiceCatalog::new());

    let first = module
        .get_or_create::<FrenchGreeter, _, _>(blow_up)
        .await
        .err()
        .expect("panic reported as failure");
    assert_eq!(first.kind(), ErrorKind::Construction);
    assert!(first.to_string().contains("factory blew up"));

    let replayed = module
        .get_or_create::<FrenchGreeter, _, _>(|| async { Ok::<_, anyhow::Error>(FrenchGreeter) })
        .await
        .err()
        .expect("cached failure");
    assert_eq!(replayed.kind(), ErrorKind::Construction);
    assert!(replayed.to_string().contains("factory blew up"));
    assert_eq!(module.coordinator().active_tasks(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unresolvable_capability_is_not_found() {
    let module = module_with(ServiceCatalog::new());
    let err = module.service::<dyn Greeter>().await.err().expect("no provider");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ============================================================================
// Assignable lookup
// ============================================================================

/// An entry registered under the concrete type answers capability requests
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_existing_concrete_entry_serves_capability() {
    let constructions = Arc::new(AtomicUsize::new(0));
    let module = module_with(counting_catalog(&constructions));

    let concrete = module
        .get_or_create::<CountingGreeter, _, _>(|| async {
            Ok::<_, anyhow::Error>(CountingGreeter { id: 7 })
        })
        .await
        .expect("explicit construction");
    let viewed = module.service::<dyn Greeter>().await.expect("assignable lookup");

    assert_eq!(viewed.greet(), "hello #7");
    assert_eq!(
        Arc::as_ptr(&concrete).cast::<()>(),
        Arc::as_ptr(&viewed).cast::<()>()
    );
    assert_eq!(constructions.load(Ordering::SeqCst), 0);
    assert_eq!(module.registry().len(), 1);
}

#[tokio::test]
async fn test_registry_exact_key_and_views() {
    let registry = ServiceRegistry::new(ModuleId::new("registry"));
    let mut views = ViewTable::for_concrete::<CountingGreeter>();
    views.insert::<CountingGreeter, dyn Greeter>(|s| s);

    let first = registry
        .get_or_create::<CountingGreeter, _, _>(views, || async {
            Ok::<ErasedService, Error>(Arc::new(CountingGreeter { id: 1 }))
        })
        .await
        .expect("install");
    assert!(registry.contains::<dyn Greeter>());

    let second = registry
        .get_or_create::<dyn Greeter, _, _>(ViewTable::default(), || async {
            Err::<ErasedService, _>(Error::internal("second construction"))
        })
        .await
        .expect("reused entry");
    assert_eq!(second.greet(), first.greet());
    assert_eq!(registry.len(), 1);

    assert_eq!(registry.clear(), 1);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_several_assignable_entries_are_ambiguous() {
    let registry = ServiceRegistry::new(ModuleId::new("registry"));
    let mut counting = ViewTable::for_concrete::<CountingGreeter>();
    counting.insert::<CountingGreeter, dyn Greeter>(|s| s);
    let mut french = ViewTable::for_concrete::<FrenchGreeter>();
    french.insert::<FrenchGreeter, dyn Greeter>(|s| s);

    registry
        .get_or_create::<CountingGreeter, _, _>(counting, || async {
            Ok::<ErasedService, Error>(Arc::new(CountingGreeter { id: 1 }))
        })
        .await
        .expect("install counting");
    registry
        .get_or_create::<FrenchGreeter, _, _>(french, || async {
            Ok::<ErasedService, Error>(Arc::new(FrenchGreeter))
        })
        .await
        .expect("install french");

    let err = registry
        .get_or_create::<dyn Greeter, _, _>(ViewTable::default(), || async {
            Err::<ErasedService, _>(Error::internal("never constructed"))
        })
        .await
        .err()
        .expect("two entries provide the capability");
    assert_eq!(err.kind(), ErrorKind::Ambiguous);
    match err {
        Error::Ambiguous { candidates, .. } => assert_eq!(candidates.len(), 2),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(registry.len(), 2);
}

// ============================================================================
// Blocking access
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_lookup_from_synchronous_code() {
    let constructions = Arc::new(AtomicUsize::new(0));
    let module = module_with(counting_catalog(&constructions));

    let from_thread = {
        let module = module.clone();
        tokio::task::spawn_blocking(move || module.service_blocking::<dyn Greeter>())
            .await
            .expect("join")
            .expect("blocking lookup")
    };
    let from_async = module.service::<dyn Greeter>().await.expect("lookup");

    assert!(Arc::ptr_eq(&from_thread, &from_async));
    assert_eq!(constructions.load(Ordering::SeqCst), 1);
}
