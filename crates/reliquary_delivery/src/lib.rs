//! Delivery planning and execution for Reliquary.
//!
//! Finished byte-sets are packed greedily onto a size-limited channel and the
//! rest overflow to an unlimited channel. Each item is then delivered through
//! an explicit cascade of attempts: an item planned for the limited channel
//! falls back to the unlimited channel before it is reported as failed.
//!
//! # Example
//!
//! ```rust
//! use bytes::Bytes;
//! use reliquary_core::{ChannelKind, ContentHasher, MediaKind, PutMetadata};
//! use reliquary_delivery::{DeliveryItem, DestinationPlanner};
//!
//! let item = |size: usize| {
//!     let bytes = Bytes::from(vec![0u8; size]);
//!     let hash = ContentHasher::hash(&bytes);
//!     DeliveryItem::new(bytes, hash, MediaKind::Gif, "gif", PutMetadata::default())
//! };
//!
//! let planner = DestinationPlanner::new(10);
//! let plan = planner.plan(vec![item(4), item(4), item(4)]);
//! let channels: Vec<_> = plan.entries().iter().map(|e| e.channel).collect();
//! assert_eq!(
//!     channels,
//!     vec![ChannelKind::Limited, ChannelKind::Limited, ChannelKind::Unlimited]
//! );
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cascade;
mod channels;
mod executor;
mod plan;

pub use cascade::{cascade_for, first_success};
pub use channels::{DiscordWebhookChannel, FileSystemColdStore};
pub use executor::{DeliveryExecutor, ItemDelivery, UndeliveredItem};
pub use plan::{DeliveryItem, DeliveryPlan, DestinationPlanner, PlannedDelivery};
