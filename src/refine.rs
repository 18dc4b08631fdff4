//! Phase reclassification
//!
//! Re-clusters every window's signature vector and writes the trace back out
//! with the new phase ids. Data files are immutable, so refined windows always
//! go to fresh writers; predictions made against the old classification are
//! cleared.
//!
//! Clustering is pluggable through [`PhaseClassifier`]; [`KMeansClassifier`]
//! uses aprender's KMeans.

use crate::config::RefineSettings;
use crate::profile::Profile;
use crate::store::{StoreError, WindowReader, WindowWriter};
use crate::window::PhaseId;
use aprender::cluster::KMeans;
use aprender::primitives::Matrix;
use aprender::traits::UnsupervisedEstimator;
use anyhow::Context;
use std::collections::HashSet;
use std::fs;
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors for reclassification
#[derive(Error, Debug)]
pub enum RefineError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Clustering failed: {0}")]
    Clustering(String),

    #[error("Classifier returned {actual} assignments for {expected} windows")]
    AssignmentCount { expected: usize, actual: usize },

    #[error("Got {readers} readers but {writers} writers")]
    WriterCount { readers: usize, writers: usize },
}

pub type Result<T> = std::result::Result<T, RefineError>;

/// Clustering routine used to reclassify windows
pub trait PhaseClassifier {
    /// Assign each signature to one of `k` phases
    ///
    /// Must return exactly one phase id per signature, in input order.
    fn classify(&mut self, signatures: &[Vec<f64>], k: usize) -> Result<Vec<PhaseId>>;
}

/// KMeans over raw signature vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KMeansClassifier {
    max_iterations: usize,
    seed: Option<u64>,
}

impl Default for KMeansClassifier {
    fn default() -> Self {
        Self {
            max_iterations: RefineSettings::default().max_iterations,
            seed: None,
        }
    }
}

impl KMeansClassifier {
    pub fn from_settings(settings: &RefineSettings) -> Self {
        Self {
            max_iterations: settings.max_iterations,
            ..Self::default()
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Fix the seed used for centroid initialization
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }
}

impl PhaseClassifier for KMeansClassifier {
    fn classify(&mut self, signatures: &[Vec<f64>], k: usize) -> Result<Vec<PhaseId>> {
        let n_samples = signatures.len();
        let n_features = signatures.first().map_or(0, Vec::len);

        if let Some(bad) = signatures.iter().find(|s| s.len() != n_features) {
            return Err(RefineError::Clustering(format!(
                "signature length {} differs from {}",
                bad.len(),
                n_features
            )));
        }

        // Need at least 2 clusters and 2 samples for KMeans to mean anything
        let k = k.min(n_samples);
        if k < 2 || n_features == 0 {
            return Ok(vec![0; n_samples]);
        }

        let data: Vec<f32> = signatures.iter().flatten().map(|&x| x as f32).collect();
        let features = Matrix::from_vec(n_samples, n_features, data)
            .map_err(|e| RefineError::Clustering(e.to_string()))?;

        let mut kmeans = KMeans::new(k).with_max_iter(self.max_iterations);
        if let Some(seed) = self.seed {
            kmeans = kmeans.with_random_state(seed);
        }
        kmeans
            .fit(&features)
            .map_err(|e| RefineError::Clustering(e.to_string()))?;

        let labels = kmeans.predict(&features);
        Ok(labels.into_iter().map(|label| label as PhaseId).collect())
    }
}

/// Outcome of a refine pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefineSummary {
    pub clusters: usize,
    pub windows: usize,
}

/// Drives a [`PhaseClassifier`] over one or more traces
#[derive(Debug, Clone)]
pub struct Refiner<C: PhaseClassifier> {
    classifier: C,
    clusters: Option<usize>,
}

impl Refiner<KMeansClassifier> {
    pub fn kmeans() -> Self {
        Self::new(KMeansClassifier::default())
    }
}

impl<C: PhaseClassifier> Refiner<C> {
    pub fn new(classifier: C) -> Self {
        Self {
            classifier,
            clusters: None,
        }
    }

    /// Fix the number of phases instead of reusing the current count
    pub fn with_clusters(mut self, clusters: usize) -> Self {
        self.clusters = Some(clusters);
        self
    }

    pub fn from_settings(classifier: C, settings: &RefineSettings) -> Self {
        Self {
            classifier,
            clusters: settings.clusters,
        }
    }

    /// Reclassify every window of `readers[i]` into `writers[i]`
    ///
    /// All traces are clustered together so phase ids agree across them.
    pub fn refine<R, W>(
        &mut self,
        readers: &mut [WindowReader<R>],
        writers: &mut [WindowWriter<W>],
    ) -> Result<RefineSummary>
    where
        R: Read + Seek,
        W: Write,
    {
        if readers.len() != writers.len() {
            return Err(RefineError::WriterCount {
                readers: readers.len(),
                writers: writers.len(),
            });
        }

        let clusters = match self.clusters {
            Some(k) => k,
            None => count_phases(readers)?,
        };

        let signatures = gather_signatures(readers)?;
        if signatures.is_empty() {
            return Ok(RefineSummary {
                clusters,
                windows: 0,
            });
        }

        tracing::debug!(
            windows = signatures.len(),
            clusters,
            "reclassifying window signatures"
        );
        let assignments = self.classifier.classify(&signatures, clusters)?;
        if assignments.len() != signatures.len() {
            return Err(RefineError::AssignmentCount {
                expected: signatures.len(),
                actual: assignments.len(),
            });
        }

        let mut phases = assignments.into_iter();
        for (reader, writer) in readers.iter_mut().zip(writers.iter_mut()) {
            reader.rewind()?;
            while let Some(mut window) = reader.next_window()? {
                // Lengths were checked above and the readers are unchanged
                let Some(phase) = phases.next() else { break };
                window.phase.phase = phase;
                window.phase.prediction = None;
                writer.write(&window)?;
            }
            writer.flush()?;
        }

        Ok(RefineSummary {
            clusters,
            windows: signatures.len(),
        })
    }
}

/// Refine every thread of `profile`, replacing each data file
///
/// Windows go to a sibling file named with `settings.temp_suffix`, which is
/// moved into place once all threads are written: over the original data
/// file, or to `<output><tid>` when `settings.output` is set, in which case
/// the thread's `data_file` is updated. On failure every temp file created so
/// far is removed and the original data files are left as they were.
pub fn refine_profile<C: PhaseClassifier>(
    profile: &mut Profile,
    settings: &RefineSettings,
    classifier: C,
) -> anyhow::Result<RefineSummary> {
    let mut temps = Vec::with_capacity(profile.threads.len());

    let summary = match write_refined(profile, settings, classifier, &mut temps) {
        Ok(summary) => summary,
        Err(e) => {
            discard(&temps);
            return Err(e);
        }
    };

    for (i, (thread, temp)) in profile.threads.iter_mut().zip(&temps).enumerate() {
        let dest = match &settings.output {
            Some(output) => thread.output_path(output),
            None => thread.data_file.clone(),
        };

        if let Err(e) = move_file(temp, &dest) {
            discard(&temps[i..]);
            return Err(e);
        }
        thread.data_file = dest;
    }

    tracing::debug!(
        threads = profile.threads.len(),
        windows = summary.windows,
        "refined profile"
    );
    Ok(summary)
}

/// Load a profile manifest, refine it, and save the result
///
/// The manifest is written to `settings.output` if set, otherwise back to
/// `path`.
pub fn refine_manifest<C: PhaseClassifier>(
    path: impl AsRef<Path>,
    settings: &RefineSettings,
    classifier: C,
) -> anyhow::Result<RefineSummary> {
    let path = path.as_ref();
    let mut profile = Profile::from_toml(path)?;
    let summary = refine_profile(&mut profile, settings, classifier)?;

    profile.save_toml(settings.output.as_deref().unwrap_or(path))?;
    Ok(summary)
}

/// Open readers and temp writers for every thread and run the refine pass
///
/// Each temp path is pushed to `temps` as soon as its file exists.
fn write_refined<C: PhaseClassifier>(
    profile: &Profile,
    settings: &RefineSettings,
    classifier: C,
    temps: &mut Vec<PathBuf>,
) -> anyhow::Result<RefineSummary> {
    let mut readers = Vec::with_capacity(profile.threads.len());
    let mut writers = Vec::with_capacity(profile.threads.len());

    for thread in &profile.threads {
        readers.push(thread.open_reader().with_context(|| {
            format!("Failed to open data file: {}", thread.data_file.display())
        })?);

        let temp = thread.refined_path(&settings.temp_suffix);
        let writer = WindowWriter::create(&temp, thread.uuid)
            .with_context(|| format!("Failed to create {}", temp.display()))?;
        temps.push(temp);
        writers.push(writer);
    }

    let summary = Refiner::from_settings(classifier, settings).refine(&mut readers, &mut writers)?;

    for writer in writers {
        writer.into_inner()?;
    }
    Ok(summary)
}

/// Rename `from` to `to`, copying when they sit on different filesystems
fn move_file(from: &Path, to: &Path) -> anyhow::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }

    fs::copy(from, to)
        .with_context(|| format!("Failed to move {} to {}", from.display(), to.display()))?;
    fs::remove_file(from).with_context(|| format!("Failed to remove {}", from.display()))
}

fn discard(temps: &[PathBuf]) {
    for temp in temps {
        match fs::remove_file(temp) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %temp.display(), error = %e, "failed to remove temp file"),
        }
    }
}

fn count_phases<R: Read + Seek>(readers: &mut [WindowReader<R>]) -> Result<usize> {
    let mut phases = HashSet::new();
    for reader in readers.iter_mut() {
        reader.rewind()?;
        while let Some(window) = reader.next_window()? {
            phases.insert(window.phase_id());
        }
        reader.rewind()?;
    }
    Ok(phases.len())
}

fn gather_signatures<R: Read + Seek>(readers: &mut [WindowReader<R>]) -> Result<Vec<Vec<f64>>> {
    let mut signatures = Vec::new();
    for reader in readers.iter_mut() {
        reader.rewind()?;
        while let Some(window) = reader.next_window()? {
            signatures.push(window.phase.signature);
        }
        reader.rewind()?;
    }
    Ok(signatures)
}
