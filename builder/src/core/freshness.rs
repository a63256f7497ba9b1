//! Decide whether build outputs are older than the sources they come from.

use std::time::SystemTime;

/// Outcome of comparing source and output timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale(StaleReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// The bundle file or the compiled module does not exist.
    MissingOutput,
    /// None of the watched paths exist, so there is nothing to compare against.
    NoSources,
    /// At least one watched file changed after the outputs were written.
    SourcesNewer,
}

impl Freshness {
    pub fn is_fresh(self) -> bool {
        matches!(self, Freshness::Fresh)
    }
}

/// Compare the newest watched source mtime against the output mtime.
///
/// `output` is the oldest of the required outputs, `None` if any is missing.
/// Equal timestamps count as fresh.
pub fn assess(newest_source: Option<SystemTime>, output: Option<SystemTime>) -> Freshness {
    match (newest_source, output) {
        (_, None) => Freshness::Stale(StaleReason::MissingOutput),
        (None, Some(_)) => Freshness::Stale(StaleReason::NoSources),
        (Some(source), Some(output)) if source > output => {
            Freshness::Stale(StaleReason::SourcesNewer)
        }
        (Some(_), Some(_)) => Freshness::Fresh,
    }
}

/// Oldest mtime across required outputs, `None` if any of them is missing.
pub fn oldest_output(outputs: &[Option<SystemTime>]) -> Option<SystemTime> {
    outputs
        .iter()
        .try_fold(None, |oldest: Option<SystemTime>, output| {
            let output = (*output)?;
            Some(Some(oldest.map_or(output, |current| current.min(output))))
        })
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn missing_output_is_stale_even_without_sources() {
        assert_eq!(
            assess(None, None),
            Freshness::Stale(StaleReason::MissingOutput)
        );
        assert_eq!(
            assess(Some(at(1)), None),
            Freshness::Stale(StaleReason::MissingOutput)
        );
    }

    #[test]
    fn no_sources_forces_rebuild() {
        assert_eq!(
            assess(None, Some(at(10))),
            Freshness::Stale(StaleReason::NoSources)
        );
    }

    #[test]
    fn newer_source_is_stale() {
        assert_eq!(
            assess(Some(at(11)), Some(at(10))),
            Freshness::Stale(StaleReason::SourcesNewer)
        );
    }

    #[test]
    fn older_or_equal_source_is_fresh() {
        assert!(assess(Some(at(9)), Some(at(10))).is_fresh());
        assert!(assess(Some(at(10)), Some(at(10))).is_fresh());
    }

    #[test]
    fn oldest_output_requires_every_output() {
        assert_eq!(oldest_output(&[Some(at(5)), Some(at(3))]), Some(at(3)));
        assert_eq!(oldest_output(&[Some(at(5)), None]), None);
        assert_eq!(oldest_output(&[]), None);
    }
}
