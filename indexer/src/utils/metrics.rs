use once_cell::sync::Lazy;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};

/// Instruments are no-ops until the embedding process installs a meter provider.
pub static INDEXER_METRICS: Lazy<IndexerMetrics> = Lazy::new(IndexerMetrics::register);

pub struct IndexerMetrics {
    pub blocks_written: Counter<u64>,
    pub transactions_written: Counter<u64>,
    pub messages_written: Counter<u64>,
    pub addresses_inserted: Counter<u64>,
    pub dropped_items: Counter<u64>,
    pub rpc_errors: Counter<u64>,
    pub failed_chunks: Counter<u64>,
    pub chunk_duration: Histogram<f64>,
    pub live_height_lag: Gauge<u64>,
}

impl IndexerMetrics {
    pub fn register() -> Self {
        let meter: Meter = global::meter("crates.indexer.opentelemetry");

        let blocks_written = meter
            .u64_counter("blocks_written")
            .with_description("Block rows written to storage")
            .with_unit("blocks")
            .build();

        let transactions_written = meter
            .u64_counter("transactions_written")
            .with_description("Transaction rows written to storage")
            .with_unit("transactions")
            .build();

        let messages_written = meter
            .u64_counter("messages_written")
            .with_description("Message rows written to storage, all message tables combined")
            .with_unit("messages")
            .build();

        let addresses_inserted = meter
            .u64_counter("addresses_inserted")
            .with_description("New addresses assigned a surrogate id")
            .with_unit("addresses")
            .build();

        let dropped_items = meter
            .u64_counter("dropped_items")
            .with_description("Items dropped because their fetch or transform failed")
            .with_unit("items")
            .build();

        let rpc_errors = meter
            .u64_counter("rpc_errors")
            .with_description("Failed RPC fetches after retries")
            .with_unit("requests")
            .build();

        let failed_chunks = meter
            .u64_counter("failed_chunks")
            .with_description("Chunks aborted by a persistence error")
            .with_unit("chunks")
            .build();

        let chunk_duration = meter
            .f64_histogram("chunk_duration")
            .with_description("Time taken to fetch, transform and persist one chunk")
            .with_unit("s")
            .build();

        let live_height_lag = meter
            .u64_gauge("live_height_lag")
            .with_description("Blocks between the chain head and the last indexed height")
            .with_unit("blocks")
            .build();

        Self {
            blocks_written,
            transactions_written,
            messages_written,
            addresses_inserted,
            dropped_items,
            rpc_errors,
            failed_chunks,
            chunk_duration,
            live_height_lag,
        }
    }
}
