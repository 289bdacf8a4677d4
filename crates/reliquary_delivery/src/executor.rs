//! Plan execution.

use crate::{DeliveryItem, DeliveryPlan, DestinationPlanner, PlannedDelivery, cascade_for, first_success};
use futures::future::join_all;
use reliquary_core::{ChannelKind, DeliveredLocation};
use reliquary_error::{DeliveryError, DeliveryErrorKind};
use reliquary_interface::{LimitedChannel, UnlimitedChannel};
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// An item every attempt failed for. The bytes are handed back intact.
#[derive(Debug, Clone)]
pub struct UndeliveredItem {
    /// The item, bytes included
    pub item: DeliveryItem,
    /// Channel the item was planned for
    pub planned: ChannelKind,
    /// Aggregate failure across the cascade
    pub error: DeliveryError,
}

/// Outcome for one plan entry.
pub type ItemDelivery = Result<DeliveredLocation, UndeliveredItem>;

/// Sends planned items through their channel cascades.
#[derive(Clone)]
pub struct DeliveryExecutor {
    limited: Arc<dyn LimitedChannel>,
    unlimited: Arc<dyn UnlimitedChannel>,
}

impl std::fmt::Debug for DeliveryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryExecutor")
            .field("limited_budget", &self.limited.budget_bytes())
            .finish_non_exhaustive()
    }
}

impl DeliveryExecutor {
    /// Executor over the two channels.
    pub fn new(limited: Arc<dyn LimitedChannel>, unlimited: Arc<dyn UnlimitedChannel>) -> Self {
        Self { limited, unlimited }
    }

    /// A planner packing against this executor's limited channel.
    pub fn planner(&self) -> DestinationPlanner {
        DestinationPlanner::new(self.limited.budget_bytes())
    }

    /// Deliver every entry of `plan`.
    ///
    /// Entries are delivered concurrently and independently: one item's
    /// fallback or failure never holds back its siblings. Results come back in
    /// plan order.
    #[instrument(skip(self, plan), fields(items = plan.len(), limited_bytes = plan.limited_bytes()))]
    pub async fn execute(&self, plan: DeliveryPlan) -> Vec<ItemDelivery> {
        let results = join_all(plan.into_entries().into_iter().map(|entry| self.deliver(entry))).await;
        let failed = results.iter().filter(|r| r.is_err()).count();
        debug!(delivered = results.len() - failed, failed, "Executed delivery plan");
        results
    }

    async fn deliver(&self, entry: PlannedDelivery) -> ItemDelivery {
        let PlannedDelivery { item, channel } = entry;
        let outcome = first_success(cascade_for(channel), |attempt| self.send_via(attempt, &item)).await;

        match outcome {
            Ok((used, location)) => {
                debug!(hash = %item.content_hash.short(), planned = %channel, used = %used, "Delivered item");
                Ok(DeliveredLocation {
                    location,
                    channel: used,
                    content_hash: item.content_hash.clone(),
                    kind: item.kind,
                    extension: item.extension.clone(),
                    size_bytes: item.size(),
                })
            }
            Err(error) => {
                error!(hash = %item.content_hash.short(), error = %error.kind, "Item undeliverable on every channel");
                Err(UndeliveredItem {
                    item,
                    planned: channel,
                    error,
                })
            }
        }
    }

    async fn send_via(&self, channel: ChannelKind, item: &DeliveryItem) -> Result<String, DeliveryError> {
        let location = match channel {
            ChannelKind::Limited => {
                let budget = self.limited.budget_bytes();
                if item.size() >= budget {
                    return Err(DeliveryError::new(DeliveryErrorKind::OverBudget {
                        size: item.size(),
                        budget,
                    }));
                }
                self.limited.send(&item.bytes, &item.suggested_name()).await?
            }
            ChannelKind::Unlimited => {
                self.unlimited
                    .send(&item.bytes, &item.content_hash, &item.extension, &item.metadata)
                    .await?
            }
        };

        if location.trim().is_empty() {
            return Err(DeliveryError::new(DeliveryErrorKind::MissingLocation(
                channel.to_string(),
            )));
        }
        Ok(location)
    }
}
