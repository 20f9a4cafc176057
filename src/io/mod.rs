//! The I/O boundary between the entity layer and a hierarchical container backend.
//!
//! Entities never talk to a file format directly. They describe what they need
//! (groups, typed datasets, attributes) through [`BaseIo`], and a backend turns those
//! calls into storage. Two backends ship with the crate:
//!
//! - [`memory::MemoryIo`]: thread-safe in-process image with SWMR publication
//!   semantics; used by the test-suite and for tooling.
//! - `hdf5::Hdf5Io` (feature `storage_hdf5`): HDF5 files with native SWMR mode.
//!
//! Every call is synchronous and either succeeds or returns a backend failure that the
//! entity layer propagates unchanged.

pub mod memory;
pub mod swmr;
#[cfg(feature = "storage_hdf5")]
pub mod hdf5;

use crate::error::{NwbError, NwbResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Attribute holding the schema namespace of a typed object.
pub const NAMESPACE_ATTR: &str = "namespace";
/// Attribute holding the schema type name of a typed object.
pub const TYPE_NAME_ATTR: &str = "neurodata_type";
/// Attribute holding the random object identifier.
pub const OBJECT_ID_ATTR: &str = "object_id";
/// Free-text description attribute.
pub const DESCRIPTION_ATTR: &str = "description";

/// Element type of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    /// Fixed-length string with the given maximum byte length.
    FixedStr(usize),
    /// Variable-length UTF-8 string.
    VarStr,
    /// Reference to another object, stored as its absolute path.
    Reference,
}

impl DataType {
    /// True for `I8`..`I64`.
    pub fn is_signed_integer(&self) -> bool {
        matches!(self, DataType::I8 | DataType::I16 | DataType::I32 | DataType::I64)
    }

    /// True for fixed and variable length strings.
    pub fn is_string(&self) -> bool {
        matches!(self, DataType::FixedStr(_) | DataType::VarStr)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::FixedStr(len) => write!(f, "str[{}]", len),
            DataType::VarStr => write!(f, "vlen_str"),
            DataType::Reference => write!(f, "object_ref"),
            other => write!(f, "{}", format!("{:?}", other).to_lowercase()),
        }
    }
}

/// A typed, flattened (row-major) block of dataset values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "snake_case")]
pub enum DataValues {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Str(Vec<String>),
    Reference(Vec<String>),
}

/// Runs `$body` with `$v` bound to the inner vector of any variant.
macro_rules! with_values {
    ($value:expr, $v:ident => $body:expr) => {
        match $value {
            DataValues::U8($v) => $body,
            DataValues::U16($v) => $body,
            DataValues::U32($v) => $body,
            DataValues::U64($v) => $body,
            DataValues::I8($v) => $body,
            DataValues::I16($v) => $body,
            DataValues::I32($v) => $body,
            DataValues::I64($v) => $body,
            DataValues::F32($v) => $body,
            DataValues::F64($v) => $body,
            DataValues::Str($v) => $body,
            DataValues::Reference($v) => $body,
        }
    };
}

/// Like `with_values!` but rewraps the result in the same variant.
macro_rules! map_values {
    ($value:expr, $v:ident => $body:expr) => {
        match $value {
            DataValues::U8($v) => DataValues::U8($body),
            DataValues::U16($v) => DataValues::U16($body),
            DataValues::U32($v) => DataValues::U32($body),
            DataValues::U64($v) => DataValues::U64($body),
            DataValues::I8($v) => DataValues::I8($body),
            DataValues::I16($v) => DataValues::I16($body),
            DataValues::I32($v) => DataValues::I32($body),
            DataValues::I64($v) => DataValues::I64($body),
            DataValues::F32($v) => DataValues::F32($body),
            DataValues::F64($v) => DataValues::F64($body),
            DataValues::Str($v) => DataValues::Str($body),
            DataValues::Reference($v) => DataValues::Reference($body),
        }
    };
}

impl DataValues {
    /// Number of elements.
    pub fn len(&self) -> usize {
        with_values!(self, v => v.len())
    }

    /// True when there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The natural element type of these values.
    pub fn dtype(&self) -> DataType {
        match self {
            DataValues::U8(_) => DataType::U8,
            DataValues::U16(_) => DataType::U16,
            DataValues::U32(_) => DataType::U32,
            DataValues::U64(_) => DataType::U64,
            DataValues::I8(_) => DataType::I8,
            DataValues::I16(_) => DataType::I16,
            DataValues::I32(_) => DataType::I32,
            DataValues::I64(_) => DataType::I64,
            DataValues::F32(_) => DataType::F32,
            DataValues::F64(_) => DataType::F64,
            DataValues::Str(_) => DataType::VarStr,
            DataValues::Reference(_) => DataType::Reference,
        }
    }

    /// Whether these values can be stored in a dataset of element type `dtype`.
    pub fn matches(&self, dtype: DataType) -> bool {
        match (self, dtype) {
            (DataValues::Str(values), DataType::FixedStr(max)) => {
                values.iter().all(|s| s.len() <= max)
            }
            (DataValues::Str(_), DataType::VarStr) => true,
            _ => self.dtype() == dtype,
        }
    }

    /// An empty vector of the variant used to hold `dtype`.
    pub fn empty(dtype: DataType) -> Self {
        match dtype {
            DataType::U8 => DataValues::U8(Vec::new()),
            DataType::U16 => DataValues::U16(Vec::new()),
            DataType::U32 => DataValues::U32(Vec::new()),
            DataType::U64 => DataValues::U64(Vec::new()),
            DataType::I8 => DataValues::I8(Vec::new()),
            DataType::I16 => DataValues::I16(Vec::new()),
            DataType::I32 => DataValues::I32(Vec::new()),
            DataType::I64 => DataValues::I64(Vec::new()),
            DataType::F32 => DataValues::F32(Vec::new()),
            DataType::F64 => DataValues::F64(Vec::new()),
            DataType::FixedStr(_) | DataType::VarStr => DataValues::Str(Vec::new()),
            DataType::Reference => DataValues::Reference(Vec::new()),
        }
    }

    /// Grows or truncates to `len` elements, padding with zeros or empty strings.
    pub fn resize(&mut self, len: usize) {
        with_values!(self, v => v.resize(len, Default::default()))
    }

    /// Copy of the elements in `start..end`.
    pub fn slice(&self, start: usize, end: usize) -> DataValues {
        map_values!(self, v => v[start.min(v.len())..end.min(v.len())].to_vec())
    }

    /// Overwrites elements starting at `offset` with `block`.
    ///
    /// Both sides must be the same variant and the block must fit.
    pub fn overwrite(&mut self, offset: usize, block: &DataValues) -> Result<(), String> {
        let capacity = self.len();
        if offset + block.len() > capacity {
            return Err(format!(
                "block of {} elements at offset {} exceeds {} allocated elements",
                block.len(),
                offset,
                capacity
            ));
        }
        macro_rules! copy {
            ($($variant:ident),*) => {
                match (self, block) {
                    $((DataValues::$variant(dst), DataValues::$variant(src)) => {
                        dst[offset..offset + src.len()].clone_from_slice(src);
                        Ok(())
                    })*
                    (dst, src) => Err(format!(
                        "cannot write {} values into a {} buffer",
                        src.dtype(),
                        dst.dtype()
                    )),
                }
            };
        }
        copy!(U8, U16, U32, U64, I8, I16, I32, I64, F32, F64, Str, Reference)
    }

    /// Every `width`-th element starting at `first`: one column of a row-major block.
    pub fn strided(&self, first: usize, width: usize) -> DataValues {
        map_values!(self, v => v.iter().skip(first).step_by(width.max(1)).cloned().collect())
    }

    /// String view of `Str` and `Reference` values.
    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            DataValues::Str(v) | DataValues::Reference(v) => Some(v),
            _ => None,
        }
    }

    /// Widened copy of any signed or unsigned integer variant.
    pub fn to_i64_vec(&self) -> Option<Vec<i64>> {
        match self {
            DataValues::I8(v) => Some(v.iter().map(|&x| i64::from(x)).collect()),
            DataValues::I16(v) => Some(v.iter().map(|&x| i64::from(x)).collect()),
            DataValues::I32(v) => Some(v.iter().map(|&x| i64::from(x)).collect()),
            DataValues::I64(v) => Some(v.clone()),
            DataValues::U8(v) => Some(v.iter().map(|&x| i64::from(x)).collect()),
            DataValues::U16(v) => Some(v.iter().map(|&x| i64::from(x)).collect()),
            DataValues::U32(v) => Some(v.iter().map(|&x| i64::from(x)).collect()),
            DataValues::U64(v) => v.iter().map(|&x| i64::try_from(x).ok()).collect(),
            _ => None,
        }
    }

    /// Converts to the variant used for `dtype`, if the values fit.
    ///
    /// Used when writing row identifiers, which are supplied as `i64` but may be
    /// stored in a narrower signed integer dataset.
    pub fn cast_integers(values: &[i64], dtype: DataType) -> Option<DataValues> {
        fn narrow<T: TryFrom<i64>>(values: &[i64]) -> Option<Vec<T>> {
            values.iter().map(|&x| T::try_from(x).ok()).collect()
        }
        match dtype {
            DataType::I8 => narrow(values).map(DataValues::I8),
            DataType::I16 => narrow(values).map(DataValues::I16),
            DataType::I32 => narrow(values).map(DataValues::I32),
            DataType::I64 => Some(DataValues::I64(values.to_vec())),
            _ => None,
        }
    }
}

macro_rules! impl_from_vec {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<Vec<$ty>> for DataValues {
            fn from(values: Vec<$ty>) -> Self {
                DataValues::$variant(values)
            }
        })*
    };
}

impl_from_vec!(
    u8 => U8, u16 => U16, u32 => U32, u64 => U64,
    i8 => I8, i16 => I16, i32 => I32, i64 => I64,
    f32 => F32, f64 => F64, String => Str,
);

impl From<Vec<&str>> for DataValues {
    fn from(values: Vec<&str>) -> Self {
        DataValues::Str(values.into_iter().map(str::to_owned).collect())
    }
}

/// Scalar or string value of an attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Str(String),
    StrList(Vec<String>),
    I32(i32),
    I64(i64),
    U64(u64),
    F64(f64),
    /// Path of the referenced object.
    Reference(String),
}

impl AttributeValue {
    /// The string payload of `Str` and `Reference` attributes.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Str(s) | AttributeValue::Reference(s) => Some(s),
            _ => None,
        }
    }

    /// The list payload of `StrList` attributes.
    pub fn as_str_list(&self) -> Option<&[String]> {
        match self {
            AttributeValue::StrList(list) => Some(list),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Str(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Str(value)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(value: Vec<String>) -> Self {
        AttributeValue::StrList(value)
    }
}

/// What kind of object lives at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StorageObjectType {
    Group,
    Dataset,
    Attribute,
    Undefined,
}

/// How a backend session opens its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    /// Truncate any existing content.
    Overwrite,
    /// Keep existing content and allow writes.
    ReadWrite,
    /// Keep existing content, reject writes.
    ReadOnly,
}

/// Element type, initial shape, and chunking of a new dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetConfig {
    dtype: DataType,
    shape: Vec<usize>,
    chunking: Vec<usize>,
}

impl DatasetConfig {
    pub fn new(dtype: DataType, shape: Vec<usize>, chunking: Vec<usize>) -> Self {
        Self {
            dtype,
            shape,
            chunking,
        }
    }

    /// One-dimensional dataset with `len` elements, chunked by `chunk`.
    pub fn vector(dtype: DataType, len: usize, chunk: usize) -> Self {
        Self::new(dtype, vec![len], vec![chunk.max(1)])
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn chunking(&self) -> &[usize] {
        &self.chunking
    }

    /// Checks rank and chunk sizes before anything is created.
    pub fn validate(&self, path: &str) -> NwbResult<()> {
        if self.shape.is_empty() {
            return Err(NwbError::Configuration(format!(
                "dataset '{}' needs at least one dimension",
                path
            )));
        }
        if self.chunking.len() != self.shape.len() {
            return Err(NwbError::Configuration(format!(
                "dataset '{}' has rank {} but chunking of rank {}",
                path,
                self.shape.len(),
                self.chunking.len()
            )));
        }
        if self.chunking.iter().any(|&c| c == 0) {
            return Err(NwbError::Configuration(format!(
                "dataset '{}' has a zero chunk dimension",
                path
            )));
        }
        Ok(())
    }
}

/// Opaque handle to a dataset allocated by a backend.
///
/// Carries just enough to address the dataset again: its path, element type, and the
/// number of elements per row along the first axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetHandle {
    path: String,
    dtype: DataType,
    row_width: usize,
}

impl DatasetHandle {
    /// Called by backends when a dataset is created or reopened.
    pub fn new(path: impl Into<String>, dtype: DataType, shape: &[usize]) -> Self {
        Self {
            path: path.into(),
            dtype,
            row_width: shape.iter().skip(1).product::<usize>().max(1),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Elements per row along axis 0.
    pub fn row_width(&self) -> usize {
        self.row_width
    }
}

/// Traversal policy for [`crate::registry::find_owned_types`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Do not descend below an object that carries a type.
    StopOnType,
    /// Descend into typed objects as well.
    ContinueOnType,
}

/// Backend contract consumed by the entity layer.
///
/// All methods take `&self`; backends use interior locking so one session can be
/// borrowed by every entity of a file at the same time. Writes on a single session
/// are not reentrant and callers must not mutate the same path from two threads.
pub trait BaseIo: Send + Sync {
    /// Name of the file (or in-memory image) behind this session.
    fn file_name(&self) -> &str;

    fn open(&self, mode: FileMode) -> NwbResult<()>;

    fn close(&self) -> NwbResult<()>;

    /// Publish every completed write to SWMR readers.
    fn flush(&self) -> NwbResult<()>;

    fn is_open(&self) -> bool;

    fn create_group(&self, path: &str) -> NwbResult<()>;

    /// Write (or overwrite) attribute `name` on the object at `path`.
    fn create_attribute(&self, value: AttributeValue, path: &str, name: &str) -> NwbResult<()>;

    /// Create a soft link at `path` pointing to `target`.
    fn create_link(&self, path: &str, target: &str) -> NwbResult<()>;

    fn create_array_dataset(&self, config: &DatasetConfig, path: &str) -> NwbResult<DatasetHandle>;

    /// Reopen an existing dataset.
    fn dataset_handle(&self, path: &str) -> NwbResult<DatasetHandle>;

    /// Grow a dataset to `new_shape`. Datasets never shrink.
    fn extend_dataset(&self, handle: &DatasetHandle, new_shape: &[usize]) -> NwbResult<()>;

    /// Write whole rows starting at row `offset` of axis 0.
    fn write_block(&self, handle: &DatasetHandle, offset: usize, values: &DataValues)
        -> NwbResult<()>;

    /// Write a hyperslab of `shape` elements starting at `offset`.
    ///
    /// `offset` and `shape` have the dataset's rank and `values` is row-major. The
    /// region must lie within the current extent.
    fn write_region(
        &self,
        handle: &DatasetHandle,
        offset: &[usize],
        shape: &[usize],
        values: &DataValues,
    ) -> NwbResult<()>;

    fn read_dataset(&self, path: &str) -> NwbResult<DataValues>;

    fn read_attribute(&self, path: &str, name: &str) -> NwbResult<AttributeValue>;

    /// Current shape of the dataset as seen by this session.
    fn dataset_extent(&self, path: &str) -> NwbResult<Vec<usize>>;

    fn object_exists(&self, path: &str) -> bool;

    fn attribute_exists(&self, path: &str, name: &str) -> bool;

    fn storage_object_type(&self, path: &str) -> StorageObjectType;

    /// Direct children of the group at `path` with their kinds.
    fn storage_objects(&self, path: &str) -> NwbResult<Vec<(String, StorageObjectType)>>;

    /// Enter SWMR write mode. Object structure is frozen from here on.
    fn start_recording(&self) -> NwbResult<()>;

    fn stop_recording(&self) -> NwbResult<()>;

    /// False while in SWMR mode or read-only.
    fn can_modify_objects(&self) -> bool;

    /// Dataset of object references, written in one go.
    fn create_reference_dataset(&self, path: &str, references: &[String]) -> NwbResult<DatasetHandle> {
        let config = DatasetConfig::vector(DataType::Reference, references.len(), references.len());
        let handle = self.create_array_dataset(&config, path)?;
        if !references.is_empty() {
            self.write_block(&handle, 0, &DataValues::Reference(references.to_vec()))?;
        }
        Ok(handle)
    }

    /// Schema self-description shared by every typed object.
    ///
    /// Writes `namespace`, `neurodata_type`, a fresh `object_id`, and `description`
    /// when one is given.
    fn create_common_nwb_attributes(
        &self,
        path: &str,
        namespace: &str,
        type_name: &str,
        description: Option<&str>,
    ) -> NwbResult<()> {
        self.create_attribute(namespace.into(), path, NAMESPACE_ATTR)?;
        self.create_attribute(type_name.into(), path, TYPE_NAME_ATTR)?;
        self.create_attribute(
            uuid::Uuid::new_v4().to_string().into(),
            path,
            OBJECT_ID_ATTR,
        )?;
        if let Some(description) = description.filter(|d| !d.is_empty()) {
            self.create_attribute(description.into(), path, DESCRIPTION_ATTR)?;
        }
        Ok(())
    }
}

/// Which backend a recording session should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Memory,
    Hdf5,
}

/// Creates an unopened backend session for `path`.
///
/// Returns `FeatureNotEnabled` when the requested backend was not compiled in.
pub fn create_io(kind: BackendKind, path: &Path) -> NwbResult<Box<dyn BaseIo>> {
    match kind {
        BackendKind::Memory => Ok(Box::new(memory::MemoryIo::new(path.to_string_lossy()))),
        #[cfg(feature = "storage_hdf5")]
        BackendKind::Hdf5 => Ok(Box::new(hdf5::Hdf5Io::new(path))),
        #[cfg(not(feature = "storage_hdf5"))]
        BackendKind::Hdf5 => Err(NwbError::FeatureNotEnabled("storage_hdf5".to_string())),
    }
}

/// Joins `base` and `child` with exactly one '/' between them.
pub fn merge_paths(base: &str, child: &str) -> String {
    let base = base.trim_end_matches('/');
    let child = child.trim_start_matches('/');
    match (base.is_empty(), child.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{}", child),
        (false, true) => base.to_string(),
        (false, false) => format!("{}/{}", base, child),
    }
}

/// Normalizes a path to its absolute form without a trailing '/'.
pub fn normalize_path(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    format!("/{}", parts.join("/"))
}

/// Last component of `path`.
pub fn path_name(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

/// Parent of `path`, `/` for top-level objects.
pub fn parent_path(path: &str) -> String {
    let normalized = normalize_path(path);
    match normalized.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => normalized[..idx].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_paths_handles_slashes() {
        assert_eq!(merge_paths("/table/", "/col"), "/table/col");
        assert_eq!(merge_paths("/table", "col"), "/table/col");
        assert_eq!(merge_paths("", "col"), "/col");
        assert_eq!(merge_paths("/", ""), "/");
    }

    #[test]
    fn path_helpers() {
        assert_eq!(normalize_path("general//devices/"), "/general/devices");
        assert_eq!(path_name("/general/devices/array"), "array");
        assert_eq!(parent_path("/general/devices/array"), "/general/devices");
        assert_eq!(parent_path("/general"), "/");
    }

    #[test]
    fn values_match_their_dtype() {
        let names: DataValues = vec!["g0", "g1"].into();
        assert!(names.matches(DataType::VarStr));
        assert!(names.matches(DataType::FixedStr(2)));
        assert!(!names.matches(DataType::FixedStr(1)));
        assert!(!names.matches(DataType::I32));

        let ids: DataValues = vec![1i32, 2, 3].into();
        assert_eq!(ids.dtype(), DataType::I32);
        assert_eq!(ids.to_i64_vec(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn overwrite_rejects_overflow_and_mismatch() {
        let mut buffer = DataValues::empty(DataType::F64);
        buffer.resize(4);
        assert!(buffer.overwrite(2, &vec![1.0f64, 2.0].into()).is_ok());
        assert_eq!(buffer, DataValues::F64(vec![0.0, 0.0, 1.0, 2.0]));
        assert!(buffer.overwrite(3, &vec![1.0f64, 2.0].into()).is_err());
        assert!(buffer.overwrite(0, &vec![1i32].into()).is_err());
    }

    #[test]
    fn strided_picks_one_column() {
        let frames: DataValues = vec![1i16, 2, 3, 4, 5, 6].into();
        assert_eq!(frames.strided(1, 3), DataValues::I16(vec![2, 5]));
        assert_eq!(frames.strided(0, 1), frames);
    }

    #[test]
    fn integer_casts_respect_range() {
        assert_eq!(
            DataValues::cast_integers(&[1, 2], DataType::I32),
            Some(DataValues::I32(vec![1, 2]))
        );
        assert_eq!(DataValues::cast_integers(&[300], DataType::I8), None);
        assert_eq!(DataValues::cast_integers(&[1], DataType::F32), None);
    }

    #[test]
    fn dataset_config_validation() {
        assert!(DatasetConfig::vector(DataType::I32, 0, 16).validate("/id").is_ok());
        assert!(DatasetConfig::new(DataType::I32, vec![], vec![])
            .validate("/id")
            .is_err());
        assert!(DatasetConfig::new(DataType::I32, vec![4, 2], vec![4])
            .validate("/id")
            .is_err());
        assert!(DatasetConfig::new(DataType::I32, vec![4], vec![0])
            .validate("/id")
            .is_err());
    }

    #[test]
    fn handle_row_width() {
        let handle = DatasetHandle::new("/data", DataType::I16, &[0, 32]);
        assert_eq!(handle.row_width(), 32);
        let scalar_rows = DatasetHandle::new("/id", DataType::I32, &[0]);
        assert_eq!(scalar_rows.row_width(), 1);
    }

    #[test]
    fn hdf5_backend_requires_feature() {
        let result = create_io(BackendKind::Hdf5, Path::new("x.h5"));
        #[cfg(not(feature = "storage_hdf5"))]
        assert!(matches!(result, Err(NwbError::FeatureNotEnabled(_))));
        #[cfg(feature = "storage_hdf5")]
        assert!(result.is_ok());
    }
}
