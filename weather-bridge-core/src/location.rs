//! Location acquisition.
//!
//! A [`LocationSource`] is the raw sensor. [`Geolocation`] sits on top of it and
//! applies [`LocationOptions`]: a cached fix is reused while it is young enough,
//! otherwise a fresh fix is requested and bounded by the timeout.

use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::model::Position;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location request timed out")]
    Timeout,

    #[error("location unavailable: {0}")]
    Unavailable(String),
}

/// How long to wait for a fix and how old a cached fix may be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationOptions {
    pub timeout: Duration,
    pub maximum_age: Duration,
}

impl LocationOptions {
    pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;
    pub const DEFAULT_MAXIMUM_AGE_MS: u64 = 60_000;

    pub fn from_millis(timeout_ms: u64, maximum_age_ms: u64) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            maximum_age: Duration::from_millis(maximum_age_ms),
        }
    }
}

impl Default for LocationOptions {
    fn default() -> Self {
        Self::from_millis(Self::DEFAULT_TIMEOUT_MS, Self::DEFAULT_MAXIMUM_AGE_MS)
    }
}

/// The platform sensor: produces a fresh fix or fails.
#[async_trait]
pub trait LocationSource: Send + Sync + Debug {
    async fn acquire(&self) -> Result<Position, LocationError>;
}

/// What the bridge asks for the current position.
#[async_trait]
pub trait LocationProvider: Send + Sync + Debug {
    async fn current_position(&self, options: &LocationOptions) -> Result<Position, LocationError>;
}

/// A source that always reports the same coordinates, stamped at acquisition time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl StaticLocation {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, LocationError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(LocationError::Unavailable(format!(
                "invalid coordinates ({latitude}, {longitude})"
            )));
        }
        Ok(Self { latitude, longitude })
    }
}

#[async_trait]
impl LocationSource for StaticLocation {
    async fn acquire(&self) -> Result<Position, LocationError> {
        Ok(Position::new(self.latitude, self.longitude))
    }
}

/// Applies [`LocationOptions`] on top of a [`LocationSource`].
#[derive(Debug)]
pub struct Geolocation<S> {
    source: S,
    last_fix: Mutex<Option<Position>>,
}

impl<S: LocationSource> Geolocation<S> {
    pub fn new(source: S) -> Self {
        Self { source, last_fix: Mutex::new(None) }
    }

    fn is_fresh(fix: &Position, maximum_age: Duration) -> bool {
        let age = Utc::now().signed_duration_since(fix.timestamp);
        match age.to_std() {
            Ok(age) => age <= maximum_age,
            // Timestamp in the future: treat as just taken.
            Err(_) => true,
        }
    }
}

#[async_trait]
impl<S: LocationSource> LocationProvider for Geolocation<S> {
    async fn current_position(&self, options: &LocationOptions) -> Result<Position, LocationError> {
        let mut last_fix = self.last_fix.lock().await;

        if let Some(fix) = (*last_fix).filter(|fix| Self::is_fresh(fix, options.maximum_age)) {
            debug!(latitude = fix.latitude, longitude = fix.longitude, "reusing cached fix");
            return Ok(fix);
        }

        let fix = tokio::time::timeout(options.timeout, self.source.acquire())
            .await
            .map_err(|_| LocationError::Timeout)??;

        *last_fix = Some(fix);
        Ok(fix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    #[derive(Debug, Default)]
    struct CountingSource {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LocationSource for CountingSource {
        async fn acquire(&self) -> Result<Position, LocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Position::new(51.5, -0.12))
        }
    }

    #[derive(Debug)]
    struct StaleSource;

    #[async_trait]
    impl LocationSource for StaleSource {
        async fn acquire(&self) -> Result<Position, LocationError> {
            Ok(Position::new(1.0, 2.0).with_timestamp(Utc::now() - chrono::Duration::minutes(5)))
        }
    }

    #[derive(Debug)]
    struct HangingSource;

    #[async_trait]
    impl LocationSource for HangingSource {
        async fn acquire(&self) -> Result<Position, LocationError> {
            std::future::pending().await
        }
    }

    #[derive(Debug)]
    struct DeniedSource;

    #[async_trait]
    impl LocationSource for DeniedSource {
        async fn acquire(&self) -> Result<Position, LocationError> {
            Err(LocationError::PermissionDenied)
        }
    }

    #[test]
    fn default_options() {
        let opts = LocationOptions::default();
        assert_eq!(opts.timeout, Duration::from_millis(15_000));
        assert_eq!(opts.maximum_age, Duration::from_millis(60_000));
    }

    #[test]
    fn static_location_rejects_out_of_range() {
        assert!(StaticLocation::new(91.0, 0.0).is_err());
        assert!(StaticLocation::new(0.0, -181.0).is_err());
        assert!(StaticLocation::new(-33.87, 151.21).is_ok());
    }

    #[tokio::test]
    async fn cached_fix_is_reused_within_maximum_age() {
        let calls = Arc::new(AtomicUsize::new(0));
        let geo = Geolocation::new(CountingSource { calls: calls.clone() });
        let opts = LocationOptions::default();

        let first = geo.current_position(&opts).await.unwrap();
        let second = geo.current_position(&opts).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_maximum_age_always_acquires() {
        let calls = Arc::new(AtomicUsize::new(0));
        let geo = Geolocation::new(CountingSource { calls: calls.clone() });
        let opts = LocationOptions { maximum_age: Duration::ZERO, ..Default::default() };

        geo.current_position(&opts).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        geo.current_position(&opts).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stale_fix_is_not_reused() {
        let geo = Geolocation::new(StaleSource);
        let opts = LocationOptions::default();

        geo.current_position(&opts).await.unwrap();
        let cached = (*geo.last_fix.lock().await).expect("fix stored");
        assert!(!Geolocation::<StaleSource>::is_fresh(&cached, opts.maximum_age));
    }

    #[tokio::test]
    async fn hanging_source_times_out() {
        let geo = Geolocation::new(HangingSource);
        let opts = LocationOptions::from_millis(20, 0);

        let err = geo.current_position(&opts).await.unwrap_err();
        assert_eq!(err, LocationError::Timeout);
    }

    #[tokio::test]
    async fn source_error_is_propagated_and_not_cached() {
        let geo = Geolocation::new(DeniedSource);

        let err = geo.current_position(&LocationOptions::default()).await.unwrap_err();
        assert_eq!(err, LocationError::PermissionDenied);
        assert!(geo.last_fix.lock().await.is_none());
    }
}
