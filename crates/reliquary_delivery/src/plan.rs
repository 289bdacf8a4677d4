//! Greedy destination planning.

use bytes::Bytes;
use derive_getters::Getters;
use reliquary_core::{ChannelKind, ContentHash, MediaKind, PutMetadata};
use tracing::{debug, instrument};

/// One finished byte-set waiting for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryItem {
    /// Final bytes
    pub bytes: Bytes,
    /// Hash of `bytes`
    pub content_hash: ContentHash,
    /// Kind of media
    pub kind: MediaKind,
    /// File extension without the dot
    pub extension: String,
    /// Passed through to the unlimited channel
    pub metadata: PutMetadata,
}

impl DeliveryItem {
    /// Create an item.
    pub fn new(
        bytes: Bytes,
        content_hash: ContentHash,
        kind: MediaKind,
        extension: impl Into<String>,
        metadata: PutMetadata,
    ) -> Self {
        Self {
            bytes,
            content_hash,
            kind,
            extension: extension.into(),
            metadata,
        }
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Name suggested to channels that want one.
    pub fn suggested_name(&self) -> String {
        format!("{}.{}", self.content_hash, self.extension)
    }
}

/// An item and the channel it is planned for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDelivery {
    /// The byte-set
    pub item: DeliveryItem,
    /// First channel to try
    pub channel: ChannelKind,
}

/// Ordered delivery assignments for one request.
///
/// Entries keep the order of the items handed to the planner. The bytes
/// assigned to the limited channel always total strictly less than `budget`.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct DeliveryPlan {
    /// Assignments in source order
    entries: Vec<PlannedDelivery>,
    /// Limited-channel budget the plan was packed against
    budget: u64,
}

impl DeliveryPlan {
    /// Bytes assigned to the limited channel.
    pub fn limited_bytes(&self) -> u64 {
        self.entries
            .iter()
            .filter(|e| e.channel == ChannelKind::Limited)
            .map(|e| e.item.size())
            .sum()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True for a plan with nothing to deliver.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the plan, yielding its entries in order.
    pub fn into_entries(self) -> Vec<PlannedDelivery> {
        self.entries
    }
}

/// Decides which channel each byte-set goes to.
///
/// 1. A lone item that does not fit under the budget goes straight to the
///    unlimited channel.
/// 2. If everything together is under the budget, everything goes to the
///    limited channel.
/// 3. Otherwise items are taken in order while the running total stays under
///    the budget; the first item that would reach it, and every item after it,
///    overflows to the unlimited channel.
///
/// This is first-fit in request order, never reordered for a tighter pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestinationPlanner {
    budget: u64,
}

impl DestinationPlanner {
    /// Planner for a limited channel with `budget` bytes.
    pub fn new(budget: u64) -> Self {
        Self { budget }
    }

    /// The limited-channel budget.
    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// Assign every item a channel.
    #[instrument(skip(self, items), fields(items = items.len(), budget = self.budget))]
    pub fn plan(&self, items: Vec<DeliveryItem>) -> DeliveryPlan {
        let total: u64 = items.iter().map(DeliveryItem::size).sum();

        let channels: Vec<ChannelKind> = if items.len() == 1 && total >= self.budget {
            vec![ChannelKind::Unlimited]
        } else if total < self.budget {
            vec![ChannelKind::Limited; items.len()]
        } else {
            let mut running = 0u64;
            let mut overflowed = false;
            items
                .iter()
                .map(|item| {
                    if !overflowed && running + item.size() < self.budget {
                        running += item.size();
                        ChannelKind::Limited
                    } else {
                        overflowed = true;
                        ChannelKind::Unlimited
                    }
                })
                .collect()
        };

        let entries: Vec<PlannedDelivery> = items
            .into_iter()
            .zip(channels)
            .map(|(item, channel)| PlannedDelivery { item, channel })
            .collect();

        let plan = DeliveryPlan {
            entries,
            budget: self.budget,
        };
        debug!(
            total,
            limited_bytes = plan.limited_bytes(),
            "Planned delivery"
        );
        plan
    }
}
