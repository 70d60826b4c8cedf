//! Scripted fetch sources.
//!
//! A [`GatedSource`] answers every request through a response function and
//! records the request. Gated sources additionally hold each response until
//! the test releases it, which lets a test decide the order in which
//! overlapping fetches complete.

use explorer_state_core::{FetchError, FetchFuture, PageInfo};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

type Respond<Req, T> = Box<dyn Fn(&Req) -> Result<T, FetchError> + Send + Sync>;

struct Inner<Req, T> {
    respond: Respond<Req, T>,
    gated: bool,
    calls: Mutex<Vec<Req>>,
    gates: Mutex<Vec<watch::Sender<bool>>>,
    call_count: watch::Sender<usize>,
}

/// Fetch source with recorded requests and optionally gated responses.
///
/// # Example
///
/// ```ignore
/// let source = GatedSource::new(|height: &u64| Ok(format!("block-{height}")));
/// let info = DataSet::new("info", source.fetcher());
///
/// // issue two fetches, then answer the second one first
/// source.wait_for_calls(2).await;
/// source.release(1);
/// source.release(0);
/// ```
pub struct GatedSource<Req, T> {
    inner: Arc<Inner<Req, T>>,
}

impl<Req, T> Clone for GatedSource<Req, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<Req, T> GatedSource<Req, T>
where
    Req: Clone + Send + Sync + 'static,
    T: Send + 'static,
{
    /// A source whose responses wait for [`GatedSource::release`].
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&Req) -> Result<T, FetchError> + Send + Sync + 'static,
    {
        Self::build(respond, true)
    }

    /// A source that answers immediately.
    pub fn ready<F>(respond: F) -> Self
    where
        F: Fn(&Req) -> Result<T, FetchError> + Send + Sync + 'static,
    {
        Self::build(respond, false)
    }

    fn build<F>(respond: F, gated: bool) -> Self
    where
        F: Fn(&Req) -> Result<T, FetchError> + Send + Sync + 'static,
    {
        let (call_count, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                respond: Box::new(respond),
                gated,
                calls: Mutex::new(Vec::new()),
                gates: Mutex::new(Vec::new()),
                call_count,
            }),
        }
    }

    /// A single-record fetcher backed by this source.
    pub fn fetcher(&self) -> impl Fn(Req) -> FetchFuture<T> + Send + Sync + 'static {
        let source = self.clone();
        move |request| source.call(request)
    }

    /// A page fetcher backed by this source. `to_request` turns the page
    /// arguments into the request the response function sees.
    pub fn page_fetcher<F, C, M>(
        &self,
        to_request: M,
    ) -> impl Fn(PageInfo, F, C) -> FetchFuture<T> + Send + Sync + 'static
    where
        M: Fn(PageInfo, F, C) -> Req + Send + Sync + 'static,
    {
        let source = self.clone();
        move |page, filter, context| source.call(to_request(page, filter, context))
    }

    /// Issue one request. Lets a source trait implementation route a method
    /// through this source.
    pub fn call(&self, request: Req) -> FetchFuture<T> {
        let index = {
            let mut calls = lock(&self.inner.calls);
            calls.push(request.clone());
            calls.len() - 1
        };
        let gate = self.inner.gated.then(|| self.gate(index).subscribe());
        self.inner.call_count.send_modify(|count| *count += 1);

        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            if let Some(mut gate) = gate {
                let _ = gate.wait_for(|open| *open).await;
            }
            (inner.respond)(&request)
        })
    }

    fn gate(&self, index: usize) -> watch::Sender<bool> {
        let mut gates = lock(&self.inner.gates);
        while gates.len() <= index {
            gates.push(watch::channel(false).0);
        }
        gates[index].clone()
    }

    /// Let the response of the `index`-th call (0-based) complete. May be
    /// called before that call arrives.
    pub fn release(&self, index: usize) {
        self.gate(index).send_replace(true);
    }

    /// Let every response issued so far complete.
    pub fn release_all(&self) {
        for index in 0..self.call_count() {
            self.release(index);
        }
    }

    /// Wait until at least `count` calls have been issued.
    pub async fn wait_for_calls(&self, count: usize) {
        let mut calls = self.inner.call_count.subscribe();
        let _ = calls.wait_for(|issued| *issued >= count).await;
    }

    /// Number of calls issued so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.inner.call_count.borrow()
    }

    /// Requests in the order they were issued.
    #[must_use]
    pub fn calls(&self) -> Vec<Req> {
        lock(&self.inner.calls).clone()
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
