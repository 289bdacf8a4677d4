//! First-success delivery cascade.

use reliquary_core::ChannelKind;
use reliquary_error::{DeliveryError, DeliveryErrorKind};
use std::future::Future;
use tracing::warn;

/// Ordered attempts for an item planned onto `planned`.
///
/// A limited-channel item falls back to the unlimited channel; an unlimited
/// item has nowhere further to go.
pub fn cascade_for(planned: ChannelKind) -> Vec<ChannelKind> {
    match planned {
        ChannelKind::Limited => vec![ChannelKind::Limited, ChannelKind::Unlimited],
        ChannelKind::Unlimited => vec![ChannelKind::Unlimited],
    }
}

/// Try each channel in order and return the first success.
///
/// Attempts run one at a time; a later attempt starts only after the earlier
/// one failed. When every attempt fails the error lists each failure in
/// order.
///
/// # Example
///
/// ```rust
/// use reliquary_core::ChannelKind;
/// use reliquary_delivery::{cascade_for, first_success};
/// use reliquary_error::DeliveryError;
///
/// # async fn example() {
/// let (channel, location) = first_success(cascade_for(ChannelKind::Limited), |channel| async move {
///     match channel {
///         ChannelKind::Limited => Err(DeliveryError::send_failed("limited", "503")),
///         ChannelKind::Unlimited => Ok("https://cdn.example.com/a.gif".to_string()),
///     }
/// })
/// .await
/// .unwrap();
/// assert_eq!(channel, ChannelKind::Unlimited);
/// # }
/// ```
pub async fn first_success<T, F, Fut>(
    attempts: impl IntoIterator<Item = ChannelKind>,
    mut attempt: F,
) -> Result<(ChannelKind, T), DeliveryError>
where
    F: FnMut(ChannelKind) -> Fut,
    Fut: Future<Output = Result<T, DeliveryError>>,
{
    let mut failures = Vec::new();
    for channel in attempts {
        match attempt(channel).await {
            Ok(value) => return Ok((channel, value)),
            Err(e) => {
                warn!(channel = %channel, error = %e.kind, "Delivery attempt failed");
                failures.push(format!("{}: {}", channel, e.kind));
            }
        }
    }

    let detail = if failures.is_empty() {
        "no delivery attempts".to_string()
    } else {
        failures.join("; ")
    };
    Err(DeliveryError::new(DeliveryErrorKind::Exhausted(detail)))
}
