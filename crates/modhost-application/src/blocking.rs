//! Bridge from synchronous call sites into the module runtime
//!
//! The future runs as its own task on the module's runtime; only the calling
//! thread waits. On a multi-thread worker the wait is wrapped in
//! `block_in_place` so the worker's other tasks move elsewhere.

use std::future::Future;
use tokio::runtime::{Handle, RuntimeFlavor};

use modhost_domain::{Error, Result};

pub(crate) fn block_on<F>(handle: &Handle, future: F) -> Result<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let on_worker = match Handle::try_current() {
        Ok(current) if current.runtime_flavor() == RuntimeFlavor::CurrentThread => {
            return Err(Error::invalid_state(
                "blocking call from a current-thread runtime would deadlock",
            ));
        }
        Ok(_) => true,
        Err(_) => false,
    };

    let task = handle.spawn(future);
    let joined = if on_worker {
        tokio::task::block_in_place(|| futures::executor::block_on(task))
    } else {
        futures::executor::block_on(task)
    };
    joined.map_err(|e| Error::internal(format!("blocking bridge task failed: {e}")))
}
