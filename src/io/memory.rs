//! In-process container backend with SWMR publication semantics.
//!
//! A [`MemoryStore`] holds the hierarchical image (groups, datasets, attributes,
//! links) behind a `parking_lot::RwLock`. Writers mutate a working image; `flush`
//! copies every dataset touched since the previous flush into the *published* map and
//! bumps a generation counter with `Release` ordering. [`MemorySwmrReader`] only ever
//! looks at the published map and keeps its own snapshot per dataset until the caller
//! asks for a `refresh`, which gives the same visibility rules HDF5 SWMR readers get:
//!
//! - nothing written after the last flush is visible,
//! - a reader's view of an extent only changes on refresh,
//! - published extents never shrink because datasets only grow.
//!
//! The store is shared through `Arc`, so several [`MemoryIo`] sessions (one writer,
//! any number of read-only sessions) and readers can observe the same image from
//! different threads. Images can be saved to and loaded from JSON files.

use super::swmr::SwmrReader;
use super::{
    normalize_path, parent_path, path_name, AttributeValue, BaseIo, DataValues, DatasetConfig,
    DatasetHandle, DataType, FileMode, StorageObjectType,
};
use crate::error::{NwbError, NwbResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DatasetNode {
    dtype: DataType,
    shape: Vec<usize>,
    chunking: Vec<usize>,
    values: DataValues,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum NodeKind {
    Group,
    Dataset(DatasetNode),
    Link { target: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Node {
    kind: NodeKind,
    #[serde(default)]
    attributes: BTreeMap<String, AttributeValue>,
}

impl Node {
    fn group() -> Self {
        Self {
            kind: NodeKind::Group,
            attributes: BTreeMap::new(),
        }
    }
}

/// The persisted part of a store.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Image {
    nodes: BTreeMap<String, Node>,
    /// Datasets modified since the last flush.
    #[serde(skip)]
    dirty: BTreeSet<String>,
}

impl Default for Image {
    fn default() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::group());
        Self {
            nodes,
            dirty: BTreeSet::new(),
        }
    }
}

impl Image {
    /// Follows a link stored at `path`, if any.
    fn resolve<'a>(&'a self, path: &str) -> Option<(&'a str, &'a Node)> {
        let (key, node) = self.nodes.get_key_value(path)?;
        match &node.kind {
            NodeKind::Link { target } => self
                .nodes
                .get_key_value(target.as_str())
                .map(|(k, n)| (k.as_str(), n)),
            _ => Some((key.as_str(), node)),
        }
    }

    fn resolve_mut(&mut self, path: &str) -> Option<&mut Node> {
        let target = match &self.nodes.get(path)?.kind {
            NodeKind::Link { target } => target.clone(),
            _ => path.to_string(),
        };
        self.nodes.get_mut(&target)
    }

    fn dataset(&self, path: &str) -> NwbResult<&DatasetNode> {
        match self.resolve(path) {
            Some((_, Node { kind: NodeKind::Dataset(ds), .. })) => Ok(ds),
            Some(_) => Err(NwbError::backend(path, "object is not a dataset")),
            None => Err(NwbError::backend(path, "dataset does not exist")),
        }
    }

    fn dataset_mut(&mut self, path: &str) -> NwbResult<&mut DatasetNode> {
        match self.nodes.get_mut(path) {
            Some(Node {
                kind: NodeKind::Dataset(ds),
                ..
            }) => Ok(ds),
            Some(_) => Err(NwbError::backend(path, "object is not a dataset")),
            None => Err(NwbError::backend(path, "dataset does not exist")),
        }
    }

    fn kind_of(&self, path: &str) -> StorageObjectType {
        match self.resolve(path) {
            Some((_, node)) => match node.kind {
                NodeKind::Group => StorageObjectType::Group,
                NodeKind::Dataset(_) => StorageObjectType::Dataset,
                NodeKind::Link { .. } => StorageObjectType::Undefined,
            },
            None => StorageObjectType::Undefined,
        }
    }

    /// Creates every missing group on the way to `path` (exclusive).
    fn ensure_parents(&mut self, path: &str) -> NwbResult<()> {
        let parent = parent_path(path);
        let mut current = String::new();
        for part in parent.split('/').filter(|p| !p.is_empty()) {
            current.push('/');
            current.push_str(part);
            match self.resolve(&current).map(|(_, n)| &n.kind) {
                Some(NodeKind::Group) => {}
                Some(_) => {
                    return Err(NwbError::backend(
                        path,
                        format!("intermediate object '{}' is not a group", current),
                    ))
                }
                None => {
                    self.nodes.insert(current.clone(), Node::group());
                }
            }
        }
        Ok(())
    }

    fn insert_new(&mut self, path: &str, node: Node) -> NwbResult<()> {
        if path == "/" || self.nodes.contains_key(path) {
            return Err(NwbError::backend(path, "object already exists"));
        }
        self.ensure_parents(path)?;
        self.nodes.insert(path.to_string(), node);
        Ok(())
    }
}

/// A dataset as seen by SWMR readers after a flush.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedDataset {
    /// Shape at publication time.
    pub shape: Vec<usize>,
    /// Flattened values at publication time.
    pub values: DataValues,
    /// Store generation that published this snapshot.
    pub generation: u64,
}

/// Shared in-memory image.
#[derive(Debug)]
pub struct MemoryStore {
    image: RwLock<Image>,
    published: RwLock<HashMap<String, Arc<PublishedDataset>>>,
    /// Incremented once per flush. Release on publish, Acquire on observe.
    generation: AtomicU64,
    swmr_mode: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::from_image(Image::default())
    }
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn from_image(image: Image) -> Self {
        Self {
            image: RwLock::new(image),
            published: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            swmr_mode: AtomicBool::new(false),
        }
    }

    /// Number of completed flushes.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Whether a writer session is currently in SWMR mode.
    pub fn is_swmr(&self) -> bool {
        self.swmr_mode.load(Ordering::Acquire)
    }

    /// The last published snapshot of the dataset at `path`.
    pub fn published(&self, path: &str) -> Option<Arc<PublishedDataset>> {
        self.published.read().get(&normalize_path(path)).cloned()
    }

    fn reset(&self) {
        let mut image = self.image.write();
        *image = Image::default();
        self.published.write().clear();
        self.swmr_mode.store(false, Ordering::Release);
    }

    /// Copies every dirty dataset into the published map.
    fn publish(&self) -> u64 {
        let mut image = self.image.write();
        let dirty = std::mem::take(&mut image.dirty);
        let generation = self.generation.load(Ordering::Relaxed) + 1;
        {
            let mut published = self.published.write();
            for path in &dirty {
                if let Some(Node {
                    kind: NodeKind::Dataset(ds),
                    ..
                }) = image.nodes.get(path)
                {
                    published.insert(
                        path.clone(),
                        Arc::new(PublishedDataset {
                            shape: ds.shape.clone(),
                            values: ds.values.clone(),
                            generation,
                        }),
                    );
                }
            }
        }
        self.generation.store(generation, Ordering::Release);
        trace!(generation, datasets = dirty.len(), "Published flush");
        generation
    }

    fn mark_all_dirty(&self) {
        let mut image = self.image.write();
        let datasets: Vec<String> = image
            .nodes
            .iter()
            .filter(|(_, n)| matches!(n.kind, NodeKind::Dataset(_)))
            .map(|(k, _)| k.clone())
            .collect();
        image.dirty.extend(datasets);
    }

    /// Writes the current working image to a JSON file.
    pub fn save(&self, path: &Path) -> NwbResult<()> {
        let image = self.image.read();
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &*image)?;
        debug!(path = %path.display(), objects = image.nodes.len(), "Saved memory image");
        Ok(())
    }

    /// Restores an image written by [`MemoryStore::save`]; every dataset is published.
    pub fn load(path: &Path) -> NwbResult<Arc<Self>> {
        let reader = BufReader::new(File::open(path)?);
        let image: Image = serde_json::from_reader(reader)?;
        let store = Self::from_image(image);
        store.mark_all_dirty();
        store.publish();
        debug!(path = %path.display(), "Loaded memory image");
        Ok(Arc::new(store))
    }
}

#[derive(Debug, Clone, Copy)]
struct Session {
    open: bool,
    mode: FileMode,
}

/// [`BaseIo`] over a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryIo {
    name: String,
    store: Arc<MemoryStore>,
    session: RwLock<Session>,
}

impl MemoryIo {
    /// New session over a fresh, empty store.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_store(name, MemoryStore::new())
    }

    /// New session over an existing store, e.g. to reopen a finished recording.
    pub fn with_store(name: impl Into<String>, store: Arc<MemoryStore>) -> Self {
        Self {
            name: name.into(),
            store,
            session: RwLock::new(Session {
                open: false,
                mode: FileMode::ReadOnly,
            }),
        }
    }

    pub fn store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.store)
    }

    /// A reader that observes this session's flushes.
    pub fn swmr_reader(&self) -> MemorySwmrReader {
        MemorySwmrReader::new(self.store())
    }

    fn ensure_writable(&self, path: &str) -> NwbResult<()> {
        let session = *self.session.read();
        if !session.open {
            return Err(NwbError::invalid_state(path, "the I/O session is not open"));
        }
        if session.mode == FileMode::ReadOnly {
            return Err(NwbError::invalid_state(path, "the I/O session is read-only"));
        }
        Ok(())
    }

    fn ensure_structure_mutable(&self, path: &str) -> NwbResult<()> {
        self.ensure_writable(path)?;
        if self.store.is_swmr() {
            return Err(NwbError::invalid_state(
                path,
                "object structure is frozen while recording in SWMR mode",
            ));
        }
        Ok(())
    }
}

impl BaseIo for MemoryIo {
    fn file_name(&self) -> &str {
        &self.name
    }

    fn open(&self, mode: FileMode) -> NwbResult<()> {
        let mut session = self.session.write();
        if session.open {
            debug!(file = %self.name, "Session already open");
            return Ok(());
        }
        if mode == FileMode::Overwrite {
            self.store.reset();
        }
        *session = Session { open: true, mode };
        debug!(file = %self.name, ?mode, "Opened memory session");
        Ok(())
    }

    fn close(&self) -> NwbResult<()> {
        let session = *self.session.read();
        if !session.open {
            return Ok(());
        }
        if session.mode != FileMode::ReadOnly {
            self.store.publish();
            self.store.swmr_mode.store(false, Ordering::Release);
        }
        self.session.write().open = false;
        debug!(file = %self.name, "Closed memory session");
        Ok(())
    }

    fn flush(&self) -> NwbResult<()> {
        let session = *self.session.read();
        if session.open && session.mode != FileMode::ReadOnly {
            self.store.publish();
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.session.read().open
    }

    fn create_group(&self, path: &str) -> NwbResult<()> {
        let path = normalize_path(path);
        self.ensure_structure_mutable(&path)?;
        self.store.image.write().insert_new(&path, Node::group())?;
        debug!(path = %path, "Created group");
        Ok(())
    }

    fn create_attribute(&self, value: AttributeValue, path: &str, name: &str) -> NwbResult<()> {
        let path = normalize_path(path);
        self.ensure_structure_mutable(&path)?;
        let mut image = self.store.image.write();
        let node = image
            .resolve_mut(&path)
            .ok_or_else(|| NwbError::backend(&path, "object does not exist"))?;
        node.attributes.insert(name.to_string(), value);
        trace!(path = %path, attribute = name, "Wrote attribute");
        Ok(())
    }

    fn create_link(&self, path: &str, target: &str) -> NwbResult<()> {
        let path = normalize_path(path);
        self.ensure_structure_mutable(&path)?;
        let target = normalize_path(target);
        self.store.image.write().insert_new(
            &path,
            Node {
                kind: NodeKind::Link { target: target.clone() },
                attributes: BTreeMap::new(),
            },
        )?;
        debug!(path = %path, target = %target, "Created link");
        Ok(())
    }

    fn create_array_dataset(&self, config: &DatasetConfig, path: &str) -> NwbResult<DatasetHandle> {
        let path = normalize_path(path);
        config.validate(&path)?;
        self.ensure_structure_mutable(&path)?;
        let mut values = DataValues::empty(config.dtype());
        values.resize(config.shape().iter().product());
        let node = Node {
            kind: NodeKind::Dataset(DatasetNode {
                dtype: config.dtype(),
                shape: config.shape().to_vec(),
                chunking: config.chunking().to_vec(),
                values,
            }),
            attributes: BTreeMap::new(),
        };
        let mut image = self.store.image.write();
        image.insert_new(&path, node)?;
        image.dirty.insert(path.clone());
        debug!(path = %path, dtype = %config.dtype(), shape = ?config.shape(), "Created dataset");
        Ok(DatasetHandle::new(path, config.dtype(), config.shape()))
    }

    fn dataset_handle(&self, path: &str) -> NwbResult<DatasetHandle> {
        let path = normalize_path(path);
        let image = self.store.image.read();
        let (resolved, _) = image
            .resolve(&path)
            .ok_or_else(|| NwbError::backend(&path, "dataset does not exist"))?;
        let ds = image.dataset(resolved)?;
        Ok(DatasetHandle::new(resolved, ds.dtype, &ds.shape))
    }

    fn extend_dataset(&self, handle: &DatasetHandle, new_shape: &[usize]) -> NwbResult<()> {
        let path = handle.path();
        self.ensure_writable(path)?;
        let mut image = self.store.image.write();
        let ds = image.dataset_mut(path)?;
        if new_shape.len() != ds.shape.len() {
            return Err(NwbError::backend(
                path,
                format!("cannot change rank from {} to {}", ds.shape.len(), new_shape.len()),
            ));
        }
        if new_shape.iter().zip(&ds.shape).any(|(new, old)| new < old) {
            return Err(NwbError::backend(
                path,
                format!("datasets only grow: {:?} -> {:?}", ds.shape, new_shape),
            ));
        }
        if new_shape[1..] != ds.shape[1..] && ds.shape[0] > 0 {
            return Err(NwbError::backend(
                path,
                "only the first axis of a populated dataset can be extended",
            ));
        }
        ds.values.resize(new_shape.iter().product());
        ds.shape = new_shape.to_vec();
        image.dirty.insert(path.to_string());
        trace!(path, shape = ?new_shape, "Extended dataset");
        Ok(())
    }

    fn write_block(
        &self,
        handle: &DatasetHandle,
        offset: usize,
        values: &DataValues,
    ) -> NwbResult<()> {
        let path = handle.path();
        self.ensure_writable(path)?;
        let mut image = self.store.image.write();
        let ds = image.dataset_mut(path)?;
        if !values.matches(ds.dtype) {
            return Err(NwbError::TypeMismatch {
                path: path.to_string(),
                expected: ds.dtype.to_string(),
                actual: values.dtype().to_string(),
            });
        }
        let row_width = ds.shape.iter().skip(1).product::<usize>().max(1);
        if values.len() % row_width != 0 {
            return Err(NwbError::backend(
                path,
                format!(
                    "block of {} elements is not a whole number of {}-element rows",
                    values.len(),
                    row_width
                ),
            ));
        }
        let rows = values.len() / row_width;
        if offset + rows > ds.shape[0] {
            return Err(NwbError::backend(
                path,
                format!(
                    "rows {}..{} lie beyond the current extent of {}",
                    offset,
                    offset + rows,
                    ds.shape[0]
                ),
            ));
        }
        ds.values
            .overwrite(offset * row_width, values)
            .map_err(|message| NwbError::backend(path, message))?;
        image.dirty.insert(path.to_string());
        trace!(path, offset, rows, "Wrote block");
        Ok(())
    }

    fn write_region(
        &self,
        handle: &DatasetHandle,
        offset: &[usize],
        shape: &[usize],
        values: &DataValues,
    ) -> NwbResult<()> {
        let path = handle.path();
        self.ensure_writable(path)?;
        let mut image = self.store.image.write();
        let ds = image.dataset_mut(path)?;
        if !values.matches(ds.dtype) {
            return Err(NwbError::TypeMismatch {
                path: path.to_string(),
                expected: ds.dtype.to_string(),
                actual: values.dtype().to_string(),
            });
        }
        let rank = ds.shape.len();
        if offset.len() != rank || shape.len() != rank {
            return Err(NwbError::backend(
                path,
                format!("region of rank {}/{} on a rank {} dataset", offset.len(), shape.len(), rank),
            ));
        }
        if shape.iter().product::<usize>() != values.len() {
            return Err(NwbError::backend(
                path,
                format!("{} elements do not fill a {:?} region", values.len(), shape),
            ));
        }
        if offset.iter().zip(shape).zip(&ds.shape).any(|((o, n), dim)| o + n > *dim) {
            return Err(NwbError::backend(
                path,
                format!("region {:?}+{:?} lies beyond the current extent {:?}", offset, shape, ds.shape),
            ));
        }
        if values.is_empty() {
            return Ok(());
        }

        // Copy contiguous runs along the last axis
        let mut strides = vec![1usize; rank];
        for axis in (0..rank - 1).rev() {
            strides[axis] = strides[axis + 1] * ds.shape[axis + 1];
        }
        let run = shape[rank - 1];
        for r in 0..values.len() / run {
            let mut rem = r;
            let mut flat = offset[rank - 1];
            for axis in (0..rank - 1).rev() {
                flat += (offset[axis] + rem % shape[axis]) * strides[axis];
                rem /= shape[axis];
            }
            ds.values
                .overwrite(flat, &values.slice(r * run, (r + 1) * run))
                .map_err(|message| NwbError::backend(path, message))?;
        }
        image.dirty.insert(path.to_string());
        trace!(path, ?offset, ?shape, "Wrote region");
        Ok(())
    }

    fn read_dataset(&self, path: &str) -> NwbResult<DataValues> {
        let path = normalize_path(path);
        Ok(self.store.image.read().dataset(&path)?.values.clone())
    }

    fn read_attribute(&self, path: &str, name: &str) -> NwbResult<AttributeValue> {
        let path = normalize_path(path);
        let image = self.store.image.read();
        let (_, node) = image
            .resolve(&path)
            .ok_or_else(|| NwbError::backend(&path, "object does not exist"))?;
        node.attributes
            .get(name)
            .cloned()
            .ok_or_else(|| NwbError::backend(&path, format!("attribute '{}' does not exist", name)))
    }

    fn dataset_extent(&self, path: &str) -> NwbResult<Vec<usize>> {
        let path = normalize_path(path);
        Ok(self.store.image.read().dataset(&path)?.shape.clone())
    }

    fn object_exists(&self, path: &str) -> bool {
        self.store.image.read().nodes.contains_key(&normalize_path(path))
    }

    fn attribute_exists(&self, path: &str, name: &str) -> bool {
        let path = normalize_path(path);
        self.store
            .image
            .read()
            .resolve(&path)
            .is_some_and(|(_, node)| node.attributes.contains_key(name))
    }

    fn storage_object_type(&self, path: &str) -> StorageObjectType {
        self.store.image.read().kind_of(&normalize_path(path))
    }

    fn storage_objects(&self, path: &str) -> NwbResult<Vec<(String, StorageObjectType)>> {
        let path = normalize_path(path);
        let image = self.store.image.read();
        let group = match image.resolve(&path) {
            Some((resolved, Node { kind: NodeKind::Group, .. })) => resolved.to_string(),
            Some(_) => return Err(NwbError::backend(&path, "object is not a group")),
            None => return Err(NwbError::backend(&path, "group does not exist")),
        };
        Ok(image
            .nodes
            .keys()
            .filter(|key| key.as_str() != "/" && parent_path(key) == group)
            .map(|key| (path_name(key).to_string(), image.kind_of(key)))
            .collect())
    }

    fn start_recording(&self) -> NwbResult<()> {
        self.ensure_writable("/")?;
        self.store.publish();
        self.store.swmr_mode.store(true, Ordering::Release);
        info!(file = %self.name, "Started SWMR recording");
        Ok(())
    }

    fn stop_recording(&self) -> NwbResult<()> {
        if self.store.is_swmr() {
            self.close()?;
            info!(file = %self.name, "Stopped SWMR recording");
        } else {
            self.flush()?;
        }
        Ok(())
    }

    fn can_modify_objects(&self) -> bool {
        let session = *self.session.read();
        session.open && session.mode != FileMode::ReadOnly && !self.store.is_swmr()
    }
}

/// SWMR reader over a [`MemoryStore`].
///
/// Keeps one snapshot per opened dataset; only [`SwmrReader::refresh`] replaces it.
#[derive(Debug)]
pub struct MemorySwmrReader {
    store: Arc<MemoryStore>,
    cache: HashMap<String, Arc<PublishedDataset>>,
}

impl MemorySwmrReader {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            cache: HashMap::new(),
        }
    }

    fn snapshot(&self, path: &str) -> NwbResult<&PublishedDataset> {
        self.cache
            .get(&normalize_path(path))
            .map(Arc::as_ref)
            .ok_or_else(|| NwbError::invalid_state(path, "dataset has not been opened by this reader"))
    }
}

impl SwmrReader for MemorySwmrReader {
    fn open_dataset(&mut self, path: &str) -> NwbResult<()> {
        let key = normalize_path(path);
        if self.cache.contains_key(&key) {
            return Ok(());
        }
        self.refresh(&key)
    }

    fn refresh(&mut self, path: &str) -> NwbResult<()> {
        let key = normalize_path(path);
        let snapshot = self
            .store
            .published(&key)
            .ok_or_else(|| NwbError::backend(&key, "dataset has not been published by a flush"))?;
        trace!(path = %key, generation = snapshot.generation, "Refreshed dataset");
        self.cache.insert(key, snapshot);
        Ok(())
    }

    fn extent(&self, path: &str) -> NwbResult<Vec<usize>> {
        Ok(self.snapshot(path)?.shape.clone())
    }

    fn read(&self, path: &str) -> NwbResult<DataValues> {
        Ok(self.snapshot(path)?.values.clone())
    }
}
