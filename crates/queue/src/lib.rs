//! Redis-backed task queue client for SteadyDancer generation work.
//!
//! The API process talks to the queue exclusively through the
//! [`client::TaskQueue`] trait so tests can substitute a scripted fake.
//! [`redis_queue::RedisTaskQueue`] is the production implementation; it
//! also carries the worker-facing half of the protocol (dequeue, started
//! marker, result storage, revocation check).

pub mod client;
pub mod messages;
pub mod redis_queue;

pub use client::{QueueError, TaskQueue};
pub use messages::{TaskRequest, TaskState, TaskStatus};
pub use redis_queue::RedisTaskQueue;
