//! A cooperative actor and publish/subscribe framework for
//! network-connected microcontrollers.
//!
//! A node is a set of independently scheduled items (sensors, actuators,
//! node-level services) attached to a single [`hub::Hub`]. The hub owns the
//! connectivity state machine, the live item collection and the global set
//! of subscribed topics. Configuration, telemetry and commands all travel
//! over the same publish/subscribe transport.
//!
//! This crate provides APIs to:
//!
//! - Schedule items cooperatively through per-item interval timers,
//!   without threads or an operating system.
//! - Create items by name through a closed [`registry::TypeRegistry`]
//!   populated at boot, so that a provisioning message can build the item
//!   set of a node at runtime.
//! - Subscribe and unsubscribe topics with reference counting, so that a
//!   topic shared by several items stays subscribed until the last of them
//!   lets it go.
//! - Configure items idempotently: a configuration message identical to the
//!   last applied one is skipped.
//! - Recover from link and session loss without blocking the scheduler.
//!
//! The network link, the transport client, the time source and persistent
//! storage are external collaborators described by the traits in
//! [`platform`].
//!
//! This crate is `no_std` and requires an allocator.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![no_std]

extern crate alloc;

/// Per-item update gating and cycle counting.
pub mod actor;
/// The context handed to items while the hub drives them.
pub mod bus;
/// Item controllers and their configuration lifecycle.
pub mod controller;
/// Error management.
pub mod error;
/// The central node controller.
pub mod hub;
/// Items, topic lists and the command tree walker.
pub mod item;
/// Built-in items.
#[cfg(feature = "items")]
pub mod items;
/// Inbound message representation.
pub mod message;
/// External collaborators of a node.
pub mod platform;
/// Item type registry.
pub mod registry;
/// Stateful sensor building blocks.
pub mod sensors;
/// Interval timers over a wrapping millisecond clock.
pub mod timer;

#[cfg(test)]
pub(crate) mod testing;
