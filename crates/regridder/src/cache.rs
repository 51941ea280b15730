//! LRU cache of regrid operators backed by persisted weights files.
//!
//! Lookups go memory first, then the weights directory, then generation.
//! Generated weights are written next to any existing files so later runs
//! (and other processes) can reuse them.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bench_common::GridDescriptor;
use lru::LruCache;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::RegridderConfig;
use crate::error::{RegridError, Result};
use crate::generate::{ConservativeGenerator, WeightGenerator};
use crate::operator::{self, RegridOperator};
use crate::weights::WeightsFile;

/// Cache key: (source grid, target grid, weights directory).
pub type OperatorKey = (GridDescriptor, GridDescriptor, Option<PathBuf>);

/// Regridder cache statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegridCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub disk_loads: u64,
    pub generated: u64,
    pub entries: usize,
}

impl RegridCacheStats {
    /// Calculate the cache hit rate (0.0 - 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Memoizes regrid operators per grid pair and weights directory.
pub struct RegridderCache {
    cache: LruCache<OperatorKey, Arc<RegridOperator>>,
    generator: Box<dyn WeightGenerator>,
    persist_weights: bool,
    hits: AtomicU64,
    misses: AtomicU64,
    disk_loads: AtomicU64,
    generated: AtomicU64,
}

impl RegridderCache {
    /// Create a cache using the built-in conservative weight generator.
    pub fn new(config: &RegridderConfig) -> Result<Self> {
        let generator = ConservativeGenerator::new(config.samples_per_cell);
        Self::with_generator(config, Box::new(generator))
    }

    /// Create a cache with a custom weight generator.
    pub fn with_generator(
        config: &RegridderConfig,
        generator: Box<dyn WeightGenerator>,
    ) -> Result<Self> {
        config.validate().map_err(RegridError::Config)?;
        let capacity = NonZeroUsize::new(config.cache_capacity)
            .ok_or_else(|| RegridError::Config("cache_capacity must be > 0".to_string()))?;

        Ok(Self {
            cache: LruCache::new(capacity),
            generator,
            persist_weights: config.persist_weights,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            disk_loads: AtomicU64::new(0),
            generated: AtomicU64::new(0),
        })
    }

    /// Fail fast on grid pairs no operator can serve.
    ///
    /// Targets must be lat-lon; a grid onto itself is always allowed for
    /// lat-lon grids.
    pub fn check_direction(source: &GridDescriptor, target: &GridDescriptor) -> Result<()> {
        if target.is_latlon() {
            Ok(())
        } else {
            Err(RegridError::unsupported(source.label(), target.label()))
        }
    }

    /// Get the operator for a grid pair, loading or generating it on a miss.
    ///
    /// With `weights_dir` set, weights are read from and written to
    /// `conservative_{src}_{dst}.wts` in that directory. Files whose header
    /// does not match the requested pair, or that fail to decode, are
    /// regenerated and replaced.
    pub fn get(
        &mut self,
        source: &GridDescriptor,
        target: &GridDescriptor,
        weights_dir: Option<&Path>,
    ) -> Result<Arc<RegridOperator>> {
        Self::check_direction(source, target)?;

        let key: OperatorKey = (*source, *target, weights_dir.map(Path::to_path_buf));
        if let Some(op) = self.cache.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(op));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let op = if source == target {
            operator::identity(*source)?
        } else {
            RegridOperator::from_weights(self.load_or_generate(source, target, weights_dir)?)?
        };

        let op = Arc::new(op);
        self.cache.put(key, Arc::clone(&op));
        Ok(op)
    }

    fn load_or_generate(
        &self,
        source: &GridDescriptor,
        target: &GridDescriptor,
        weights_dir: Option<&Path>,
    ) -> Result<WeightsFile> {
        let mut stale = false;

        if let Some(dir) = weights_dir {
            let path = WeightsFile::path_in(dir, source, target);
            match File::open(&path) {
                Ok(file) => match WeightsFile::load(BufReader::new(file)) {
                    Ok(weights) if weights.matches(source, target) => {
                        self.disk_loads.fetch_add(1, Ordering::Relaxed);
                        debug!(path = %path.display(), "Loaded regridding weights");
                        return Ok(weights);
                    }
                    Ok(weights) => {
                        warn!(
                            path = %path.display(),
                            found = %format!("{} -> {}", weights.source, weights.target),
                            "Weights file does not match grid pair, regenerating"
                        );
                        stale = true;
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Unreadable weights file, regenerating");
                        stale = true;
                    }
                },
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        info!(source = %source, target = %target, "Generating conservative regridding weights");
        let faces = self.generator.generate(source, target)?;
        self.generated.fetch_add(1, Ordering::Relaxed);
        let weights = WeightsFile {
            source: *source,
            target: *target,
            faces,
        };

        if let (Some(dir), true) = (weights_dir, self.persist_weights) {
            if let Err(e) = persist(&weights, dir, stale) {
                warn!(dir = %dir.display(), error = %e, "Failed to persist regridding weights");
            }
        }

        Ok(weights)
    }

    /// Get cache statistics.
    pub fn stats(&self) -> RegridCacheStats {
        RegridCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            disk_loads: self.disk_loads.load(Ordering::Relaxed),
            generated: self.generated.load(Ordering::Relaxed),
            entries: self.cache.len(),
        }
    }

    /// Get the number of operators in the cache.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Drop all in-memory operators. Files on disk are kept.
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

/// Write weights atomically into `dir`.
///
/// A fresh file is only created if no other writer got there first; a stale
/// file is replaced.
fn persist(weights: &WeightsFile, dir: &Path, replace: bool) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = WeightsFile::path_in(dir, &weights.source, &weights.target);

    let mut tmp = NamedTempFile::new_in(dir)?;
    weights.save(BufWriter::new(tmp.as_file_mut()))?;

    let persisted = if replace {
        tmp.persist(&path)
    } else {
        tmp.persist_noclobber(&path)
    };

    match persisted {
        Ok(_) => {
            info!(path = %path.display(), "Wrote regridding weights");
            Ok(())
        }
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
            debug!(path = %path.display(), "Weights file written concurrently, keeping existing");
            Ok(())
        }
        Err(e) => Err(e.error.into()),
    }
}
