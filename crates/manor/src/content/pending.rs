use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};
use std::thread;

use crossbeam_channel::{Receiver, TryRecvError};
use tracing::warn;

use super::bundle::AssetPackage;
use super::provisioner::ProvisionError;

type LoadResult = Result<AssetPackage, ProvisionError>;

/// An in-flight bundle load. Resolves once the worker has read and decoded the bundle.
pub struct PendingBundle {
    origin: String,
    state: PendingState,
}

enum PendingState {
    Ready(Option<LoadResult>),
    Worker {
        receiver: Receiver<LoadResult>,
        waker: Arc<Mutex<Option<Waker>>>,
    },
}

impl PendingBundle {
    pub(crate) fn ready(origin: String, result: LoadResult) -> Self {
        Self {
            origin,
            state: PendingState::Ready(Some(result)),
        }
    }

    pub(crate) fn spawn<F>(origin: String, job: F) -> Self
    where
        F: FnOnce() -> LoadResult + Send + 'static,
    {
        let (sender, receiver) = crossbeam_channel::bounded::<LoadResult>(1);
        let waker = Arc::new(Mutex::new(None::<Waker>));
        let worker_waker = Arc::clone(&waker);

        // The job is moved into the closure; keep a way to run it inline if the thread
        // cannot be created.
        let job_slot = Arc::new(Mutex::new(Some(job)));
        let worker_job = Arc::clone(&job_slot);
        let spawned = thread::Builder::new()
            .name("manor-bundle-load".to_string())
            .spawn(move || {
                let job = worker_job.lock().ok().and_then(|mut slot| slot.take());
                if let Some(job) = job {
                    let _ = sender.send(job());
                }
                if let Ok(mut slot) = worker_waker.lock() {
                    if let Some(waker) = slot.take() {
                        waker.wake();
                    }
                }
            });

        match spawned {
            Ok(_) => Self {
                origin,
                state: PendingState::Worker { receiver, waker },
            },
            Err(error) => {
                warn!(
                    origin = %origin,
                    error = %error,
                    "bundle_load_thread_unavailable_loading_inline"
                );
                let job = job_slot.lock().ok().and_then(|mut slot| slot.take());
                let result = match job {
                    Some(job) => job(),
                    None => Err(ProvisionError::WorkerLost {
                        origin: origin.clone(),
                    }),
                };
                Self::ready(origin, result)
            }
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

impl Future for PendingBundle {
    type Output = LoadResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            PendingState::Ready(result) => Poll::Ready(result.take().unwrap_or_else(|| {
                Err(ProvisionError::WorkerLost {
                    origin: this.origin.clone(),
                })
            })),
            PendingState::Worker { receiver, waker } => {
                if let Ok(mut slot) = waker.lock() {
                    *slot = Some(cx.waker().clone());
                }
                match receiver.try_recv() {
                    Ok(result) => Poll::Ready(result),
                    Err(TryRecvError::Empty) => Poll::Pending,
                    Err(TryRecvError::Disconnected) => Poll::Ready(Err(ProvisionError::WorkerLost {
                        origin: this.origin.clone(),
                    })),
                }
            }
        }
    }
}

impl fmt::Debug for PendingBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            PendingState::Ready(Some(_)) => "ready",
            PendingState::Ready(None) => "consumed",
            PendingState::Worker { .. } => "loading",
        };
        f.debug_struct("PendingBundle")
            .field("origin", &self.origin)
            .field("state", &state)
            .finish()
    }
}
