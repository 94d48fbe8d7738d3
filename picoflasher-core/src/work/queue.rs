use core::cell::RefCell;
use core::future::poll_fn;
use core::task::Poll;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::waitqueue::WakerRegistration;
use heapless::Deque;

use crate::work::item::WorkItem;

/// Depth of each direction of the work channel
pub const WORK_QUEUE_DEPTH: usize = 8;

struct QueueState<T, const N: usize> {
    items: Deque<T, N>,
    /// Waiting for space
    producer: WakerRegistration,
    /// Waiting for an item
    consumer: WakerRegistration,
}

/// Bounded FIFO shared between one producer and one consumer.
///
/// Blocking variants park the task on a waker instead of spinning. `peek_blocking` lets the
/// consumer act on an item before removing it.
pub struct WorkQueue<M: RawMutex, T, const N: usize> {
    state: Mutex<M, RefCell<QueueState<T, N>>>,
}

impl<M: RawMutex, T, const N: usize> Default for WorkQueue<M, T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex, T, const N: usize> WorkQueue<M, T, N> {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(QueueState {
                items: Deque::new(),
                producer: WakerRegistration::new(),
                consumer: WakerRegistration::new(),
            })),
        }
    }

    /// Enqueue without waiting. Returns false when the queue is full.
    pub fn submit(&self, item: T) -> bool {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            match state.items.push_back(item) {
                Ok(()) => {
                    state.consumer.wake();
                    true
                }
                Err(_) => false,
            }
        })
    }

    /// Enqueue, waiting for space
    pub async fn submit_blocking(&self, item: T) {
        let mut pending = Some(item);
        poll_fn(|cx| {
            self.state.lock(|state| {
                let mut state = state.borrow_mut();
                let Some(item) = pending.take() else {
                    return Poll::Ready(());
                };
                match state.items.push_back(item) {
                    Ok(()) => {
                        state.consumer.wake();
                        Poll::Ready(())
                    }
                    Err(item) => {
                        pending = Some(item);
                        state.producer.register(cx.waker());
                        Poll::Pending
                    }
                }
            })
        })
        .await
    }

    /// Dequeue without waiting
    pub fn try_take(&self) -> Option<T> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            let item = state.items.pop_front();
            if item.is_some() {
                state.producer.wake();
            }
            item
        })
    }

    /// Dequeue, waiting for an item
    pub async fn take_blocking(&self) -> T {
        poll_fn(|cx| {
            self.state.lock(|state| {
                let mut state = state.borrow_mut();
                match state.items.pop_front() {
                    Some(item) => {
                        state.producer.wake();
                        Poll::Ready(item)
                    }
                    None => {
                        state.consumer.register(cx.waker());
                        Poll::Pending
                    }
                }
            })
        })
        .await
    }

    pub fn len(&self) -> usize {
        self.state.lock(|state| state.borrow().items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock(|state| state.borrow().items.is_empty())
    }

    pub fn is_full(&self) -> bool {
        self.state.lock(|state| state.borrow().items.is_full())
    }

    pub fn capacity(&self) -> usize {
        N
    }
}

impl<M: RawMutex, T: Clone, const N: usize> WorkQueue<M, T, N> {
    /// Copy of the head item, waiting for one. The item stays queued.
    pub async fn peek_blocking(&self) -> T {
        poll_fn(|cx| {
            self.state.lock(|state| {
                let mut state = state.borrow_mut();
                match state.items.front().cloned() {
                    Some(item) => Poll::Ready(item),
                    None => {
                        state.consumer.register(cx.waker());
                        Poll::Pending
                    }
                }
            })
        })
        .await
    }
}

/// Request and response queues between the host dispatcher and the storage worker
pub struct WorkChannel<M: RawMutex> {
    /// dispatcher -> worker
    pub requests: WorkQueue<M, WorkItem, WORK_QUEUE_DEPTH>,
    /// worker -> dispatcher
    pub responses: WorkQueue<M, WorkItem, WORK_QUEUE_DEPTH>,
}

impl<M: RawMutex> Default for WorkChannel<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex> WorkChannel<M> {
    pub const fn new() -> Self {
        Self {
            requests: WorkQueue::new(),
            responses: WorkQueue::new(),
        }
    }
}
