use crate::config::FjallConfig;
use crate::handler::FjallHandler;
use fjall::compaction::Strategy;
use fjall::CompressionType;
use simple_dba::errors::DbaResult;
use simple_dba::store::{DbaHandler, DbaModule};

/// Module registering the fjall handler as `fjall` and `lmdb`.
///
/// # Examples
///
/// ```rust,ignore
/// use simple_dba::Dba;
/// use simple_dba_fjall_adapter::FjallModule;
///
/// let mut dba = Dba::builder()
///     .path("/var/www/storage")
///     .store_name("lmdb_store")
///     .handler("lmdb")
///     .load_module(FjallModule::with_config().production_preset().build())
///     .build()?;
/// dba.open("c")?;
/// ```
///
/// # Configuration Presets
///
/// - `production_preset()` - Balanced configuration for production use
/// - `high_throughput_preset()` - Optimized for high-write workloads
/// - `low_memory_preset()` - Optimized for low-memory environments
pub struct FjallModule {
    store_config: FjallConfig,
}

impl FjallModule {
    /// Creates a builder for configuring a fjall module.
    #[inline]
    pub fn with_config() -> FjallModuleBuilder {
        FjallModuleBuilder::new()
    }

    pub fn config(&self) -> &FjallConfig {
        &self.store_config
    }
}

impl Default for FjallModule {
    fn default() -> Self {
        FjallModuleBuilder::new().build()
    }
}

impl DbaModule for FjallModule {
    fn handlers(&self) -> DbaResult<Vec<DbaHandler>> {
        let handler = FjallHandler::new(self.store_config.clone());
        Ok(vec![DbaHandler::new(handler)])
    }
}

/// Fluent builder for `FjallModule`, with presets for common workloads.
pub struct FjallModuleBuilder {
    store_config: FjallConfig,
}

impl Default for FjallModuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FjallModuleBuilder {
    #[inline]
    pub fn new() -> FjallModuleBuilder {
        FjallModuleBuilder {
            store_config: FjallConfig::new(),
        }
    }

    /// Balanced settings for production use:
    /// - 256 MB block cache, 64 MB blob cache
    /// - 128 MB write buffer, 32 MB memtable
    /// - all CPU cores for flushing, half of them for compaction
    /// - bloom filter with 10 bits per key
    /// - fsync every 100ms
    /// - LZ4 compression
    #[inline]
    pub fn production_preset(self) -> Self {
        let cpus = std::thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(4);

        self.block_cache_capacity(256 * 1024 * 1024)
            .blob_cache_capacity(64 * 1024 * 1024)
            .max_write_buffer_size(128 * 1024 * 1024)
            .max_memtable_size(32 * 1024 * 1024)
            .flush_workers(cpus)
            .compaction_workers((cpus / 2).max(1))
            .bloom_filter_bits(10)
            .fsync_frequency(100)
            .compression_type(CompressionType::Lz4)
    }

    /// Larger buffers and deferred durability for bulk writes. The journal is
    /// only persisted by `sync` and on close, and values are stored apart from
    /// keys so `optimize` can collect blob garbage.
    #[inline]
    pub fn high_throughput_preset(self) -> Self {
        let cpus = std::thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(4);

        self.block_cache_capacity(512 * 1024 * 1024)
            .blob_cache_capacity(128 * 1024 * 1024)
            .max_write_buffer_size(256 * 1024 * 1024)
            .max_memtable_size(64 * 1024 * 1024)
            .flush_workers(cpus)
            .compaction_workers(cpus)
            .manual_journal_persist(true)
            .kv_separated(true)
            .bloom_filter_bits(0)
    }

    /// Minimal memory use at the cost of some performance.
    #[inline]
    pub fn low_memory_preset(self) -> Self {
        self.block_cache_capacity(16 * 1024 * 1024)
            .blob_cache_capacity(8 * 1024 * 1024)
            .max_write_buffer_size(32 * 1024 * 1024)
            .max_memtable_size(8 * 1024 * 1024)
            .flush_workers(1)
            .compaction_workers(1)
            .bloom_filter_bits(10)
    }

    #[inline]
    pub fn manual_journal_persist(self, manual_journal_persist: bool) -> Self {
        self.store_config.set_manual_journal_persist(manual_journal_persist);
        self
    }

    #[inline]
    pub fn flush_workers(self, flush_workers_count: usize) -> Self {
        self.store_config.set_flush_workers(flush_workers_count);
        self
    }

    #[inline]
    pub fn compaction_workers(self, compaction_workers_count: usize) -> Self {
        self.store_config.set_compaction_workers(compaction_workers_count);
        self
    }

    #[inline]
    pub fn block_cache_capacity(self, block_cache_capacity: u64) -> Self {
        self.store_config.set_block_cache_capacity(block_cache_capacity);
        self
    }

    #[inline]
    pub fn blob_cache_capacity(self, blob_cache_capacity: u64) -> Self {
        self.store_config.set_blob_cache_capacity(blob_cache_capacity);
        self
    }

    #[inline]
    pub fn max_journaling_size(self, max_journaling_size: u64) -> Self {
        self.store_config.set_max_journaling_size(max_journaling_size);
        self
    }

    #[inline]
    pub fn max_write_buffer_size(self, max_write_buffer_size: u64) -> Self {
        self.store_config.set_max_write_buffer_size(max_write_buffer_size);
        self
    }

    #[inline]
    pub fn fsync_frequency(self, fsync_frequency: u16) -> Self {
        self.store_config.set_fsync_frequency(fsync_frequency);
        self
    }

    #[inline]
    pub fn commit_before_close(self, commit_before_close: bool) -> Self {
        self.store_config.set_commit_before_close(commit_before_close);
        self
    }

    #[inline]
    pub fn bloom_filter_bits(self, bloom_filter_bits: u8) -> Self {
        self.store_config.set_bloom_filter_bits(bloom_filter_bits as i8);
        self
    }

    #[inline]
    pub fn compression_type(self, compression_type: CompressionType) -> Self {
        self.store_config.set_compression_type(compression_type);
        self
    }

    #[inline]
    pub fn compaction_strategy(self, compaction_strategy: Strategy) -> Self {
        self.store_config.set_compaction_strategy(compaction_strategy);
        self
    }

    #[inline]
    pub fn max_memtable_size(self, max_memtable_size: u32) -> Self {
        self.store_config.set_max_memtable_size(max_memtable_size);
        self
    }

    #[inline]
    pub fn block_size(self, block_size: u32) -> Self {
        self.store_config.set_block_size(block_size);
        self
    }

    #[inline]
    pub fn kv_separated(self, kv_separated: bool) -> Self {
        self.store_config.set_kv_separated(kv_separated);
        self
    }

    #[inline]
    pub fn space_amp_factor(self, space_amp_factor: f32) -> Self {
        self.store_config.set_space_amp_factor(space_amp_factor);
        self
    }

    #[inline]
    pub fn staleness_threshold(self, staleness_threshold: f32) -> Self {
        self.store_config.set_staleness_threshold(staleness_threshold);
        self
    }

    #[inline]
    pub fn build(self) -> FjallModule {
        FjallModule {
            store_config: self.store_config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_dba::store::DbaHandlers;

    #[test]
    fn test_module_registers_fjall_and_lmdb() {
        let registry = DbaHandlers::new();
        FjallModule::default().load(&registry).unwrap();

        assert_eq!(registry.names(), vec!["fjall", "lmdb"]);
        let fjall = registry.find("fjall").unwrap();
        let lmdb = registry.find("lmdb").unwrap();
        assert_eq!(lmdb.name(), "fjall");
        assert!(std::sync::Arc::ptr_eq(&*fjall, &*lmdb));
    }

    #[test]
    fn test_builder_sets_every_field() {
        let module = FjallModuleBuilder::new()
            .manual_journal_persist(true)
            .flush_workers(4)
            .compaction_workers(2)
            .block_cache_capacity(1024)
            .blob_cache_capacity(2048)
            .max_journaling_size(4096)
            .max_write_buffer_size(8192)
            .fsync_frequency(10)
            .commit_before_close(false)
            .bloom_filter_bits(8)
            .compression_type(CompressionType::None)
            .compaction_strategy(Strategy::default())
            .max_memtable_size(16384)
            .block_size(32768)
            .kv_separated(true)
            .space_amp_factor(2.0)
            .staleness_threshold(0.5)
            .build();

        let config = module.config();
        assert!(config.manual_journal_persist());
        assert_eq!(config.flush_workers(), 4);
        assert_eq!(config.compaction_workers(), 2);
        assert_eq!(config.block_cache_capacity(), 1024);
        assert_eq!(config.blob_cache_capacity(), 2048);
        assert_eq!(config.max_journaling_size(), 4096);
        assert_eq!(config.max_write_buffer_size(), 8192);
        assert_eq!(config.fsync_frequency(), 10);
        assert!(!config.commit_before_close());
        assert_eq!(config.bloom_filter_bits(), 8);
        assert_eq!(config.compression_type(), CompressionType::None);
        assert_eq!(config.max_memtable_size(), 16384);
        assert_eq!(config.block_size(), 32768);
        assert!(config.kv_separated());
        assert_eq!(config.space_amp_factor(), 2.0);
        assert_eq!(config.staleness_threshold(), 0.5);
    }

    #[test]
    fn test_presets() {
        let module = FjallModule::with_config().production_preset().build();
        assert_eq!(module.config().block_cache_capacity(), 256 * 1024 * 1024);
        assert_eq!(module.config().fsync_frequency(), 100);

        let module = FjallModule::with_config().high_throughput_preset().build();
        assert!(module.config().manual_journal_persist());
        assert!(module.config().kv_separated());
        assert_eq!(module.config().bloom_filter_bits(), 0);

        let module = FjallModule::with_config().low_memory_preset().build();
        assert_eq!(module.config().flush_workers(), 1);
        assert_eq!(module.config().max_memtable_size(), 8 * 1024 * 1024);
    }
}
