use prometheus::{Counter, Histogram, HistogramOpts, Opts, Registry};
use std::sync::Arc;

/// Prometheus metrics for the search service
#[derive(Clone)]
pub struct SearchMetrics {
    pub documents_indexed: Counter,
    pub index_errors: Counter,
    pub searches_total: Counter,
    pub search_errors: Counter,
    pub compactions_total: Counter,

    pub index_latency: Histogram,
    pub search_latency: Histogram,

    registry: Arc<Registry>,
}

impl SearchMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let documents_indexed = Counter::with_opts(Opts::new(
            "maildex_documents_indexed_total",
            "Total number of documents indexed",
        ))?;
        registry.register(Box::new(documents_indexed.clone()))?;

        let index_errors = Counter::with_opts(Opts::new(
            "maildex_index_errors_total",
            "Total number of failed ingest requests",
        ))?;
        registry.register(Box::new(index_errors.clone()))?;

        let searches_total = Counter::with_opts(Opts::new(
            "maildex_searches_total",
            "Total number of searches",
        ))?;
        registry.register(Box::new(searches_total.clone()))?;

        let search_errors = Counter::with_opts(Opts::new(
            "maildex_search_errors_total",
            "Total number of failed searches",
        ))?;
        registry.register(Box::new(search_errors.clone()))?;

        let compactions_total = Counter::with_opts(Opts::new(
            "maildex_compactions_total",
            "Total number of compaction requests",
        ))?;
        registry.register(Box::new(compactions_total.clone()))?;

        let index_latency = Histogram::with_opts(
            HistogramOpts::new("maildex_index_latency_seconds", "Ingest request latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;
        registry.register(Box::new(index_latency.clone()))?;

        let search_latency = Histogram::with_opts(
            HistogramOpts::new("maildex_search_latency_seconds", "Search request latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;
        registry.register(Box::new(search_latency.clone()))?;

        Ok(Self {
            documents_indexed,
            index_errors,
            searches_total,
            search_errors,
            compactions_total,
            index_latency,
            search_latency,
            registry: Arc::new(registry),
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Record a completed ingest request
    pub fn record_index(&self, docs: usize, duration_secs: f64) {
        self.documents_indexed.inc_by(docs as f64);
        self.index_latency.observe(duration_secs);
    }

    /// Record a completed search request
    pub fn record_search(&self, duration_secs: f64) {
        self.searches_total.inc();
        self.search_latency.observe(duration_secs);
    }
}

impl Default for SearchMetrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
