//! Types for configuring how eagerly a queue reclaims its retired nodes.

use cfg_if::cfg_if;

include!(concat!(env!("OUT_DIR"), "/build_constants.rs"));

cfg_if! {
    if #[cfg(feature = "maximum-reclamation-freq")] {
        const DEFAULT_SCAN_THRESHOLD: u32 = 1;
    } else if #[cfg(feature = "reduced-reclamation-freq")] {
        const DEFAULT_SCAN_THRESHOLD: u32 = BUILD_SCAN_THRESHOLD * 4;
    } else {
        const DEFAULT_SCAN_THRESHOLD: u32 = BUILD_SCAN_THRESHOLD;
    }
}

const DEFAULT_MIN_REQUIRED_RECORDS: u32 = 0;

////////////////////////////////////////////////////////////////////////////////////////////////////
// Config
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Runtime parameters of a queue's node reclamation.
///
/// A configuration can be set once for all queues through the global
/// [`CONFIG`][crate::CONFIG] cell or passed to individual queues with
/// [`Queue::with_config`][crate::Queue::with_config].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Config {
    min_required_records: u32,
    scan_threshold: u32,
}

/********** impl Default **************************************************************************/

impl Default for Config {
    #[inline]
    fn default() -> Self {
        ConfigBuilder::new().build()
    }
}

/********** impl inherent *************************************************************************/

impl Config {
    /// Creates a new [`Config`] with the given parameters.
    ///
    /// # Panics
    ///
    /// This function panics, if `scan_threshold` is 0.
    #[inline]
    pub fn with_params(min_required_records: u32, scan_threshold: u32) -> Self {
        assert!(scan_threshold > 0, "scan threshold must be greater than 0");
        Self { min_required_records, scan_threshold }
    }

    /// Returns the minimum amount of retired nodes that is required, before
    /// an attempt at reclaiming them is initiated.
    #[inline]
    pub fn min_required_records(&self) -> u32 {
        self.min_required_records
    }

    /// Returns the scan threshold.
    ///
    /// Every retired node counts towards this threshold.
    /// Once it is reached, an attempt is made to reclaim nodes.
    #[inline]
    pub fn scan_threshold(&self) -> u32 {
        self.scan_threshold
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// ConfigBuilder
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A builder type for gradually initializing a [`Config`].
#[derive(Copy, Clone, Debug, Default)]
pub struct ConfigBuilder {
    min_required_records: Option<u32>,
    scan_threshold: Option<u32>,
}

impl ConfigBuilder {
    /// Creates a new [`ConfigBuilder`] with default values.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minimum amount of nodes that must have been retired and not
    /// yet reclaimed, before a scan is started.
    #[inline]
    pub fn min_required_records(mut self, min_required_records: u32) -> Self {
        self.min_required_records = Some(min_required_records);
        self
    }

    /// Sets the scan threshold.
    #[inline]
    pub fn scan_threshold(mut self, scan_threshold: u32) -> Self {
        self.scan_threshold = Some(scan_threshold);
        self
    }

    /// Consumes the [`ConfigBuilder`] and returns an initialized [`Config`].
    ///
    /// Unspecified parameters are initialized with their default values.
    ///
    /// # Panics
    ///
    /// Panics, if the scan threshold was set to 0.
    #[inline]
    pub fn build(self) -> Config {
        Config::with_params(
            self.min_required_records.unwrap_or(DEFAULT_MIN_REQUIRED_RECORDS),
            self.scan_threshold.unwrap_or(DEFAULT_SCAN_THRESHOLD),
        )
    }
}
