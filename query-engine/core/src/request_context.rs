use chrono::{DateTime, DurationRound, FixedOffset, TimeDelta, Utc};

tokio::task_local! {
    static REQUEST_NOW: DateTime<FixedOffset>;
}

/// The `now()` of the operation being executed. Every `@default(now())`,
/// `@updatedAt` and policy `now()` of one operation, nested writes included,
/// sees the same timestamp.
///
/// Outside of an operation this is the current time.
pub fn request_now() -> DateTime<FixedOffset> {
    REQUEST_NOW.try_with(|now| *now).unwrap_or_else(|_| truncated_now())
}

// Databases keep milliseconds; a more precise value would not read back equal.
fn truncated_now() -> DateTime<FixedOffset> {
    let now = Utc::now();
    now.duration_trunc(TimeDelta::milliseconds(1)).unwrap_or(now).fixed_offset()
}

/// Runs `fut` with a fixed `now()`, unless an outer operation already set one.
pub(crate) async fn with_request_now<F, R>(fut: F) -> R
where
    F: std::future::Future<Output = R>,
{
    if REQUEST_NOW.try_with(|_| ()).is_ok() {
        fut.await
    } else {
        REQUEST_NOW.scope(truncated_now(), fut).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn now_is_stable_within_a_request() {
        let (first, second) = with_request_now(async {
            let first = request_now();
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            (first, request_now())
        })
        .await;

        assert_eq!(first, second);
        assert_eq!(0, first.timestamp_subsec_nanos() % 1_000_000);
    }
}
