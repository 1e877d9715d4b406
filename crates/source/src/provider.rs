use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Samples for an explicit date range.
/// `labels` and `values` are aligned and always the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeSamples {
    pub labels: Vec<Option<String>>,
    pub values: Vec<f64>,
}

impl RangeSamples {
    /// Build from two aligned vectors. Extra entries on the longer side are dropped.
    pub fn new(mut labels: Vec<Option<String>>, mut values: Vec<f64>) -> Self {
        let len = labels.len().min(values.len());
        labels.truncate(len);
        values.truncate(len);
        Self { labels, values }
    }

    /// Build from `(label, value)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let (labels, values) = pairs
            .into_iter()
            .map(|(label, value)| (Some(label.into()), value))
            .unzip();
        Self { labels, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Error type for sample source operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("request timed out")]
    Timeout,
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("upstream returned {status}: {body}")]
    BadStatus { status: u16, body: String },
    #[error("invalid response body: {0}")]
    Decode(String),
}

/// Boxed future returned by [`SampleSource`] methods.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Trait for particulate-matter sample providers.
///
/// Implementations return samples in chronological order with
/// non-numeric readings already removed.
pub trait SampleSource: Send + Sync {
    fn name(&self) -> &str;

    /// Most recent samples covering the last `window_minutes` minutes.
    fn fetch_recent(&self, window_minutes: u32) -> SourceFuture<'_, Vec<f64>>;

    /// Samples and aligned timestamp labels for `[start, end]`.
    fn fetch_range<'a>(&'a self, start: &'a str, end: &'a str) -> SourceFuture<'a, RangeSamples>;
}

/// Mock source for testing — returns fixed samples or a fixed failure.
#[derive(Debug)]
pub struct MockSource {
    recent: Mutex<Result<Vec<f64>, SourceError>>,
    range: Mutex<Result<RangeSamples, SourceError>>,
    recent_calls: AtomicUsize,
    range_calls: AtomicUsize,
}

impl MockSource {
    /// A source with no data for either query.
    pub fn empty() -> Self {
        Self {
            recent: Mutex::new(Ok(Vec::new())),
            range: Mutex::new(Ok(RangeSamples::default())),
            recent_calls: AtomicUsize::new(0),
            range_calls: AtomicUsize::new(0),
        }
    }

    /// A source whose recent window returns `values`.
    pub fn with_recent(values: Vec<f64>) -> Self {
        let source = Self::empty();
        source.set_recent(Ok(values));
        source
    }

    /// A source whose range query returns `samples`.
    pub fn with_range(samples: RangeSamples) -> Self {
        let source = Self::empty();
        source.set_range(Ok(samples));
        source
    }

    /// A source where every call fails with `err`.
    pub fn failing(err: SourceError) -> Self {
        let source = Self::empty();
        source.set_recent(Err(err.clone()));
        source.set_range(Err(err));
        source
    }

    /// Replace what the next recent-window fetches return.
    pub fn set_recent(&self, result: Result<Vec<f64>, SourceError>) {
        if let Ok(mut slot) = self.recent.lock() {
            *slot = result;
        }
    }

    /// Replace what the next range fetches return.
    pub fn set_range(&self, result: Result<RangeSamples, SourceError>) {
        if let Ok(mut slot) = self.range.lock() {
            *slot = result;
        }
    }

    pub fn recent_calls(&self) -> usize {
        self.recent_calls.load(Ordering::SeqCst)
    }

    pub fn range_calls(&self) -> usize {
        self.range_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::empty()
    }
}

impl SampleSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch_recent(&self, _window_minutes: u32) -> SourceFuture<'_, Vec<f64>> {
        self.recent_calls.fetch_add(1, Ordering::SeqCst);
        let result = match self.recent.lock() {
            Ok(slot) => slot.clone(),
            Err(_) => Err(SourceError::RequestFailed("mock poisoned".into())),
        };
        Box::pin(async move { result })
    }

    fn fetch_range<'a>(&'a self, _start: &'a str, _end: &'a str) -> SourceFuture<'a, RangeSamples> {
        self.range_calls.fetch_add(1, Ordering::SeqCst);
        let result = match self.range.lock() {
            Ok(slot) => slot.clone(),
            Err(_) => Err(SourceError::RequestFailed("mock poisoned".into())),
        };
        Box::pin(async move { result })
    }
}
