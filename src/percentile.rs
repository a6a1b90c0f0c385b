//! Percentile ranking of a finish time against every recorded time for the
//! same distance: "faster than N% of recorded times".
//!
//! The population is read through [`ReferenceTimeSource`], so the ranking
//! can run against the backend or against fixture data.

use crate::backend::BackendError;
use crate::models::Distance;
use crate::time_codec::{self, Duration};
use std::future::Future;
use std::sync::Arc;

/// Provider of the reference population for a distance
pub trait ReferenceTimeSource {
    /// Recorded finish times for `distance`, fastest first
    fn reference_times(
        &self,
        distance: Distance,
    ) -> impl Future<Output = Result<Vec<Duration>, BackendError>> + Send;
}

impl<T: ReferenceTimeSource + Send + Sync> ReferenceTimeSource for Arc<T> {
    fn reference_times(
        &self,
        distance: Distance,
    ) -> impl Future<Output = Result<Vec<Duration>, BackendError>> + Send {
        (**self).reference_times(distance)
    }
}

/// Rank `subject` within an ascending population.
///
/// The rank is the index of the first reference time the subject is at
/// least as fast as, so a tie counts in the subject's favour. Returns `None`
/// for an empty population.
pub fn percentile_rank(subject: &Duration, sorted_reference: &[Duration]) -> Option<u8> {
    if sorted_reference.is_empty() {
        return None;
    }

    let subject_seconds = subject.total_seconds();
    let rank = sorted_reference
        .iter()
        .position(|reference| subject_seconds <= reference.total_seconds())
        .unwrap_or(sorted_reference.len());

    let normalized = (rank as f64 / sorted_reference.len() as f64 * 100.0).round();
    Some((100.0 - normalized).clamp(0.0, 100.0) as u8)
}

#[derive(Debug, Clone)]
pub struct PercentileEngine<S> {
    source: S,
}

impl<S: ReferenceTimeSource> PercentileEngine<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Percentile of an interval string for `distance`.
    ///
    /// `None` when the time is unset, nobody has recorded the distance, or
    /// the population could not be fetched. Fetch errors are logged only.
    pub async fn percentile(&self, distance: Distance, time: Option<&str>) -> Option<u8> {
        let subject = time_codec::parse_duration(time)?;
        self.percentile_of(distance, &subject).await
    }

    pub async fn percentile_of(&self, distance: Distance, subject: &Duration) -> Option<u8> {
        let mut population = match self.source.reference_times(distance).await {
            Ok(times) => times,
            Err(e) => {
                tracing::warn!(%distance, error = %e, "failed to fetch reference times");
                return None;
            }
        };

        population.sort_unstable_by_key(Duration::total_seconds);
        let percentile = percentile_rank(subject, &population);

        tracing::debug!(
            %distance,
            subject = %subject,
            population = population.len(),
            ?percentile,
            "computed percentile"
        );
        percentile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        times: Vec<&'static str>,
        calls: AtomicUsize,
    }

    impl Fixture {
        fn new(times: Vec<&'static str>) -> Self {
            Self {
                times,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ReferenceTimeSource for Fixture {
        async fn reference_times(&self, distance: Distance) -> Result<Vec<Duration>, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if distance != Distance::FiveK {
                return Ok(Vec::new());
            }
            Ok(self
                .times
                .iter()
                .filter_map(|t| time_codec::parse_duration(Some(*t)))
                .collect())
        }
    }

    struct Unreachable;

    impl ReferenceTimeSource for Unreachable {
        async fn reference_times(&self, _: Distance) -> Result<Vec<Duration>, BackendError> {
            Err(BackendError::Status {
                status: StatusCode::UNAUTHORIZED,
                body: "JWT expired".to_string(),
            })
        }
    }

    fn five_k() -> PercentileEngine<Fixture> {
        PercentileEngine::new(Fixture::new(vec!["00:20:00", "00:22:00", "00:25:00"]))
    }

    #[test]
    fn test_percentile_scenarios() {
        let engine = five_k();
        let pct = |time: &str| tokio_test::block_on(engine.percentile(Distance::FiveK, Some(time)));

        // Tie with the second time stops the scan at index 1
        assert_eq!(pct("00:22:00"), Some(67));
        // Slower than everyone
        assert_eq!(pct("00:30:00"), Some(0));
        // Faster than everyone
        assert_eq!(pct("00:10:00"), Some(100));
        // Between the second and third
        assert_eq!(pct("00:23:30"), Some(33));
    }

    #[test]
    fn test_empty_population_is_absent() {
        let engine = five_k();
        let result = tokio_test::block_on(engine.percentile(Distance::Marathon, Some("03:30:00")));
        assert_eq!(result, None);
    }

    #[test]
    fn test_unset_time_skips_fetch() {
        let engine = five_k();
        assert_eq!(tokio_test::block_on(engine.percentile(Distance::FiveK, None)), None);
        assert_eq!(tokio_test::block_on(engine.percentile(Distance::FiveK, Some(""))), None);
        assert_eq!(engine.source.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fetch_failure_is_absent() {
        let engine = PercentileEngine::new(Unreachable);
        let result = tokio_test::block_on(engine.percentile(Distance::FiveK, Some("00:21:00")));
        assert_eq!(result, None);
    }

    #[test]
    fn test_unsorted_population_is_ranked_ascending() {
        let engine = PercentileEngine::new(Fixture::new(vec!["00:25:00", "00:20:00", "00:22:00"]));
        let result = tokio_test::block_on(engine.percentile(Distance::FiveK, Some("00:22:00")));
        assert_eq!(result, Some(67));
    }

    #[test]
    fn test_arc_source() {
        let engine = PercentileEngine::new(Arc::new(Fixture::new(vec!["00:20:00"])));
        let result = tokio_test::block_on(engine.percentile(Distance::FiveK, Some("00:20:00")));
        assert_eq!(result, Some(100));
    }

    #[test]
    fn test_percentile_rank() {
        let population: Vec<Duration> = (1..=4).map(|m| Duration::new(0, m * 10, 0)).collect();

        assert_eq!(percentile_rank(&Duration::new(0, 5, 0), &population), Some(100));
        assert_eq!(percentile_rank(&Duration::new(0, 25, 0), &population), Some(50));
        assert_eq!(percentile_rank(&Duration::new(1, 0, 0), &population), Some(0));
        assert_eq!(percentile_rank(&Duration::new(0, 5, 0), &[]), None);
    }
}
