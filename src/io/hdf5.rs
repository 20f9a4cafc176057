//! HDF5 container backend (feature `storage_hdf5`).
//!
//! Groups, datasets, and attributes map one to one onto HDF5 objects. Datasets are
//! created chunked with unlimited dimensions so they can be extended while recording,
//! and [`BaseIo::start_recording`] switches the file into HDF5's native SWMR write
//! mode. Readers in other processes use [`Hdf5SwmrReader`], which opens the file with
//! `H5F_ACC_SWMR_READ` and calls `H5Drefresh` before every extent query.
//!
//! Storage conventions:
//! - strings (fixed or variable) are stored as variable-length UTF-8,
//! - object references are stored as the referenced object's absolute path,
//! - block writes are limited to one-dimensional datasets.

use super::swmr::SwmrReader;
use super::{
    normalize_path, path_name, AttributeValue, BaseIo, DataType, DataValues, DatasetConfig,
    DatasetHandle, FileMode, StorageObjectType,
};
use crate::error::{NwbError, NwbResult};
use hdf5::types::{FloatSize, IntSize, TypeDescriptor, VarLenUnicode};
use hdf5::{Extent, File, Location};
use hdf5_sys::h5::hsize_t;
use hdf5_sys::h5d::{H5Dclose, H5Dget_space, H5Dget_type, H5Dopen2, H5Dread, H5Drefresh};
use hdf5_sys::h5f::{H5Fclose, H5Fopen, H5Fstart_swmr_write, H5F_ACC_RDONLY, H5F_ACC_SWMR_READ};
use hdf5_sys::h5i::hid_t;
use hdf5_sys::h5p::H5P_DEFAULT;
use hdf5_sys::h5s::{H5Sclose, H5Sget_simple_extent_dims, H5Sget_simple_extent_ndims, H5S_ALL};
use hdf5_sys::h5t::{
    H5T_class_t, H5T_direction_t, H5T_sign_t, H5Tclose, H5Tget_class, H5Tget_native_type,
    H5Tget_sign, H5Tget_size,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::ffi::CString;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

/// Binds `$T` to the Rust element type of a numeric `DataType`, or evaluates
/// `$strings` for string-like types.
macro_rules! with_numeric_type {
    ($dtype:expr, $T:ident => $body:expr, strings => $strings:expr) => {
        match $dtype {
            DataType::U8 => {
                type $T = u8;
                $body
            }
            DataType::U16 => {
                type $T = u16;
                $body
            }
            DataType::U32 => {
                type $T = u32;
                $body
            }
            DataType::U64 => {
                type $T = u64;
                $body
            }
            DataType::I8 => {
                type $T = i8;
                $body
            }
            DataType::I16 => {
                type $T = i16;
                $body
            }
            DataType::I32 => {
                type $T = i32;
                $body
            }
            DataType::I64 => {
                type $T = i64;
                $body
            }
            DataType::F32 => {
                type $T = f32;
                $body
            }
            DataType::F64 => {
                type $T = f64;
                $body
            }
            DataType::FixedStr(_) | DataType::VarStr | DataType::Reference => $strings,
        }
    };
}

fn to_vlu(path: &str, values: &[String]) -> NwbResult<Vec<VarLenUnicode>> {
    values
        .iter()
        .map(|s| {
            s.parse::<VarLenUnicode>()
                .map_err(|e| NwbError::backend(path, format!("invalid string '{}': {}", s, e)))
        })
        .collect()
}

fn data_type_of(descriptor: &TypeDescriptor) -> Option<DataType> {
    match descriptor {
        TypeDescriptor::Integer(IntSize::U1) => Some(DataType::I8),
        TypeDescriptor::Integer(IntSize::U2) => Some(DataType::I16),
        TypeDescriptor::Integer(IntSize::U4) => Some(DataType::I32),
        TypeDescriptor::Integer(IntSize::U8) => Some(DataType::I64),
        TypeDescriptor::Unsigned(IntSize::U1) => Some(DataType::U8),
        TypeDescriptor::Unsigned(IntSize::U2) => Some(DataType::U16),
        TypeDescriptor::Unsigned(IntSize::U4) => Some(DataType::U32),
        TypeDescriptor::Unsigned(IntSize::U8) => Some(DataType::U64),
        TypeDescriptor::Float(FloatSize::U4) => Some(DataType::F32),
        TypeDescriptor::Float(FloatSize::U8) => Some(DataType::F64),
        TypeDescriptor::VarLenUnicode => Some(DataType::VarStr),
        _ => None,
    }
}

struct OpenFile {
    file: File,
    mode: FileMode,
    swmr: bool,
}

/// [`BaseIo`] over an HDF5 file.
pub struct Hdf5Io {
    path: PathBuf,
    name: String,
    state: RwLock<Option<OpenFile>>,
}

impl std::fmt::Debug for Hdf5Io {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hdf5Io")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Hdf5Io {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            name: path.to_string_lossy().into_owned(),
            state: RwLock::new(None),
        }
    }

    fn with_file<R>(&self, path: &str, f: impl FnOnce(&File) -> NwbResult<R>) -> NwbResult<R> {
        let state = self.state.read();
        let open = state
            .as_ref()
            .ok_or_else(|| NwbError::invalid_state(path, "the HDF5 file is not open"))?;
        f(&open.file)
    }

    fn with_writable<R>(
        &self,
        path: &str,
        structural: bool,
        f: impl FnOnce(&File) -> NwbResult<R>,
    ) -> NwbResult<R> {
        let state = self.state.read();
        let open = state
            .as_ref()
            .ok_or_else(|| NwbError::invalid_state(path, "the HDF5 file is not open"))?;
        if open.mode == FileMode::ReadOnly {
            return Err(NwbError::invalid_state(path, "the HDF5 file is read-only"));
        }
        if structural && open.swmr {
            return Err(NwbError::invalid_state(
                path,
                "object structure is frozen while recording in SWMR mode",
            ));
        }
        f(&open.file)
    }

    fn with_location<R>(
        file: &File,
        path: &str,
        f: impl FnOnce(&Location) -> NwbResult<R>,
    ) -> NwbResult<R> {
        if path == "/" {
            return f(file);
        }
        if let Ok(group) = file.group(path) {
            return f(&group);
        }
        match file.dataset(path) {
            Ok(dataset) => f(&dataset),
            Err(_) => Err(NwbError::backend(path, "object does not exist")),
        }
    }

    fn kind_in(file: &File, path: &str) -> StorageObjectType {
        if path == "/" || file.group(path).is_ok() {
            StorageObjectType::Group
        } else if file.dataset(path).is_ok() {
            StorageObjectType::Dataset
        } else {
            StorageObjectType::Undefined
        }
    }
}

impl BaseIo for Hdf5Io {
    fn file_name(&self) -> &str {
        &self.name
    }

    fn open(&self, mode: FileMode) -> NwbResult<()> {
        let mut state = self.state.write();
        if state.is_some() {
            return Ok(());
        }
        let builder = || File::with_options().with_fapl(|p| p.libver_latest());
        let file = match mode {
            FileMode::Overwrite => builder().create(&self.path)?,
            FileMode::ReadWrite => builder().open_rw(&self.path)?,
            FileMode::ReadOnly => builder().open(&self.path)?,
        };
        *state = Some(OpenFile {
            file,
            mode,
            swmr: false,
        });
        debug!(file = %self.name, ?mode, "Opened HDF5 file");
        Ok(())
    }

    fn close(&self) -> NwbResult<()> {
        if let Some(open) = self.state.write().take() {
            if open.mode != FileMode::ReadOnly {
                open.file.flush()?;
            }
            debug!(file = %self.name, "Closed HDF5 file");
        }
        Ok(())
    }

    fn flush(&self) -> NwbResult<()> {
        if let Some(open) = self.state.read().as_ref() {
            if open.mode != FileMode::ReadOnly {
                open.file.flush()?;
                trace!(file = %self.name, "Flushed HDF5 file");
            }
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.read().is_some()
    }

    fn create_group(&self, path: &str) -> NwbResult<()> {
        let path = normalize_path(path);
        self.with_writable(&path, true, |file| {
            file.create_group(&path)?;
            debug!(path = %path, "Created group");
            Ok(())
        })
    }

    fn create_attribute(&self, value: AttributeValue, path: &str, name: &str) -> NwbResult<()> {
        let path = normalize_path(path);
        self.with_writable(&path, true, |file| {
            Self::with_location(file, &path, |loc| {
                if loc.attr_names()?.iter().any(|n| n == name) {
                    loc.delete_attr(name)?;
                }
                match &value {
                    AttributeValue::Str(s) | AttributeValue::Reference(s) => {
                        let vlu = to_vlu(&path, std::slice::from_ref(s))?;
                        loc.new_attr::<VarLenUnicode>()
                            .create(name)?
                            .write_scalar(&vlu[0])?;
                    }
                    AttributeValue::StrList(list) => {
                        let vlu = to_vlu(&path, list)?;
                        loc.new_attr_builder().with_data(vlu.as_slice()).create(name)?;
                    }
                    AttributeValue::I32(v) => loc.new_attr::<i32>().create(name)?.write_scalar(v)?,
                    AttributeValue::I64(v) => loc.new_attr::<i64>().create(name)?.write_scalar(v)?,
                    AttributeValue::U64(v) => loc.new_attr::<u64>().create(name)?.write_scalar(v)?,
                    AttributeValue::F64(v) => loc.new_attr::<f64>().create(name)?.write_scalar(v)?,
                }
                trace!(path = %path, attribute = name, "Wrote attribute");
                Ok(())
            })
        })
    }

    fn create_link(&self, path: &str, target: &str) -> NwbResult<()> {
        let path = normalize_path(path);
        let target = normalize_path(target);
        self.with_writable(&path, true, |file| {
            file.link_soft(&target, &path)?;
            debug!(path = %path, target = %target, "Created link");
            Ok(())
        })
    }

    fn create_array_dataset(&self, config: &DatasetConfig, path: &str) -> NwbResult<DatasetHandle> {
        let path = normalize_path(path);
        config.validate(&path)?;
        self.with_writable(&path, true, |file| {
            let extents: Vec<Extent> = config.shape().iter().map(|&d| Extent::resizable(d)).collect();
            let chunk = config.chunking().to_vec();
            with_numeric_type!(config.dtype(), T => {
                file.new_dataset::<T>().chunk(chunk).shape(extents).create(path.as_str())?;
            }, strings => {
                file.new_dataset::<VarLenUnicode>().chunk(chunk).shape(extents).create(path.as_str())?;
            });
            debug!(path = %path, dtype = %config.dtype(), shape = ?config.shape(), "Created dataset");
            Ok(DatasetHandle::new(path.clone(), config.dtype(), config.shape()))
        })
    }

    fn dataset_handle(&self, path: &str) -> NwbResult<DatasetHandle> {
        let path = normalize_path(path);
        self.with_file(&path, |file| {
            let dataset = file.dataset(&path)?;
            let dtype = data_type_of(&dataset.dtype()?.to_descriptor()?).ok_or_else(|| {
                NwbError::backend(&path, "dataset has an unsupported element type")
            })?;
            Ok(DatasetHandle::new(path.clone(), dtype, &dataset.shape()))
        })
    }

    fn extend_dataset(&self, handle: &DatasetHandle, new_shape: &[usize]) -> NwbResult<()> {
        let path = handle.path();
        self.with_writable(path, false, |file| {
            let dataset = file.dataset(path)?;
            let current = dataset.shape();
            if new_shape.len() != current.len() || new_shape.iter().zip(&current).any(|(n, o)| n < o)
            {
                return Err(NwbError::backend(
                    path,
                    format!("datasets only grow: {:?} -> {:?}", current, new_shape),
                ));
            }
            dataset.resize(new_shape.to_vec())?;
            trace!(path, shape = ?new_shape, "Extended dataset");
            Ok(())
        })
    }

    fn write_block(
        &self,
        handle: &DatasetHandle,
        offset: usize,
        values: &DataValues,
    ) -> NwbResult<()> {
        let path = handle.path();
        if !values.matches(handle.dtype()) {
            return Err(NwbError::TypeMismatch {
                path: path.to_string(),
                expected: handle.dtype().to_string(),
                actual: values.dtype().to_string(),
            });
        }
        self.with_writable(path, false, |file| {
            let dataset = file.dataset(path)?;
            if dataset.ndim() != 1 {
                return Err(NwbError::backend(
                    path,
                    "block writes are limited to one-dimensional datasets",
                ));
            }
            let end = offset + values.len();
            if end > dataset.shape()[0] {
                return Err(NwbError::backend(
                    path,
                    format!("rows {}..{} lie beyond the current extent", offset, end),
                ));
            }
            macro_rules! write_slice {
                ($v:expr) => {
                    dataset.write_slice(&$v[..], offset..end)?
                };
            }
            match values {
                DataValues::U8(v) => write_slice!(v),
                DataValues::U16(v) => write_slice!(v),
                DataValues::U32(v) => write_slice!(v),
                DataValues::U64(v) => write_slice!(v),
                DataValues::I8(v) => write_slice!(v),
                DataValues::I16(v) => write_slice!(v),
                DataValues::I32(v) => write_slice!(v),
                DataValues::I64(v) => write_slice!(v),
                DataValues::F32(v) => write_slice!(v),
                DataValues::F64(v) => write_slice!(v),
                DataValues::Str(v) | DataValues::Reference(v) => {
                    let vlu = to_vlu(path, v)?;
                    write_slice!(vlu)
                }
            }
            trace!(path, offset, rows = values.len(), "Wrote block");
            Ok(())
        })
    }

    fn write_region(
        &self,
        handle: &DatasetHandle,
        offset: &[usize],
        shape: &[usize],
        values: &DataValues,
    ) -> NwbResult<()> {
        let path = handle.path();
        if !values.matches(handle.dtype()) {
            return Err(NwbError::TypeMismatch {
                path: path.to_string(),
                expected: handle.dtype().to_string(),
                actual: values.dtype().to_string(),
            });
        }
        if shape.iter().product::<usize>() != values.len() {
            return Err(NwbError::backend(
                path,
                format!("{} elements do not fill a {:?} region", values.len(), shape),
            ));
        }
        self.with_writable(path, false, |file| {
            let dataset = file.dataset(path)?;
            let extent = dataset.shape();
            if offset.len() != extent.len() || shape.len() != extent.len() {
                return Err(NwbError::backend(path, "region rank differs from the dataset rank"));
            }
            if offset.iter().zip(shape).zip(&extent).any(|((o, n), dim)| o + n > *dim) {
                return Err(NwbError::backend(
                    path,
                    format!("region {:?}+{:?} lies beyond the current extent {:?}", offset, shape, extent),
                ));
            }
            macro_rules! write_selection {
                ($block:expr, $selection:expr) => {
                    match &$block {
                        DataValues::U8(v) => dataset.write_slice(&v[..], $selection)?,
                        DataValues::U16(v) => dataset.write_slice(&v[..], $selection)?,
                        DataValues::U32(v) => dataset.write_slice(&v[..], $selection)?,
                        DataValues::U64(v) => dataset.write_slice(&v[..], $selection)?,
                        DataValues::I8(v) => dataset.write_slice(&v[..], $selection)?,
                        DataValues::I16(v) => dataset.write_slice(&v[..], $selection)?,
                        DataValues::I32(v) => dataset.write_slice(&v[..], $selection)?,
                        DataValues::I64(v) => dataset.write_slice(&v[..], $selection)?,
                        DataValues::F32(v) => dataset.write_slice(&v[..], $selection)?,
                        DataValues::F64(v) => dataset.write_slice(&v[..], $selection)?,
                        DataValues::Str(v) | DataValues::Reference(v) => {
                            let vlu = to_vlu(path, v)?;
                            dataset.write_slice(&vlu[..], $selection)?
                        }
                    }
                };
            }
            match (offset, shape) {
                ([start], [len]) => write_selection!(values, *start..start + len),
                // One column at a time keeps every write a one-dimensional slice
                ([row, col], [rows, cols]) => {
                    for j in 0..*cols {
                        let column = values.strided(j, *cols);
                        write_selection!(column, (*row..row + rows, col + j));
                    }
                }
                _ => {
                    return Err(NwbError::backend(
                        path,
                        "region writes are limited to one- and two-dimensional datasets",
                    ))
                }
            }
            trace!(path, ?offset, ?shape, "Wrote region");
            Ok(())
        })
    }

    fn read_dataset(&self, path: &str) -> NwbResult<DataValues> {
        let path = normalize_path(path);
        self.with_file(&path, |file| {
            let dataset = file.dataset(&path)?;
            let dtype = data_type_of(&dataset.dtype()?.to_descriptor()?).ok_or_else(|| {
                NwbError::backend(&path, "dataset has an unsupported element type")
            })?;
            let values = with_numeric_type!(dtype, T => {
                DataValues::from(dataset.read_raw::<T>()?)
            }, strings => {
                DataValues::Str(
                    dataset
                        .read_raw::<VarLenUnicode>()?
                        .iter()
                        .map(|s| s.as_str().to_owned())
                        .collect(),
                )
            });
            Ok(values)
        })
    }

    fn read_attribute(&self, path: &str, name: &str) -> NwbResult<AttributeValue> {
        let path = normalize_path(path);
        self.with_file(&path, |file| {
            Self::with_location(file, &path, |loc| {
                let attr = loc.attr(name)?;
                let value = match attr.dtype()?.to_descriptor()? {
                    TypeDescriptor::VarLenUnicode if attr.is_scalar() => {
                        AttributeValue::Str(attr.read_scalar::<VarLenUnicode>()?.as_str().to_owned())
                    }
                    TypeDescriptor::VarLenUnicode => AttributeValue::StrList(
                        attr.read_raw::<VarLenUnicode>()?
                            .iter()
                            .map(|s| s.as_str().to_owned())
                            .collect(),
                    ),
                    TypeDescriptor::Integer(IntSize::U4) => {
                        AttributeValue::I32(attr.read_scalar::<i32>()?)
                    }
                    TypeDescriptor::Integer(_) => AttributeValue::I64(attr.read_scalar::<i64>()?),
                    TypeDescriptor::Unsigned(_) => AttributeValue::U64(attr.read_scalar::<u64>()?),
                    TypeDescriptor::Float(_) => AttributeValue::F64(attr.read_scalar::<f64>()?),
                    other => {
                        return Err(NwbError::backend(
                            &path,
                            format!("attribute '{}' has unsupported type {:?}", name, other),
                        ))
                    }
                };
                Ok(value)
            })
        })
    }

    fn dataset_extent(&self, path: &str) -> NwbResult<Vec<usize>> {
        let path = normalize_path(path);
        self.with_file(&path, |file| Ok(file.dataset(&path)?.shape()))
    }

    fn object_exists(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.with_file(&path, |file| {
            let mut current = String::new();
            for part in path.split('/').filter(|p| !p.is_empty()) {
                current.push('/');
                current.push_str(part);
                if !file.link_exists(&current) {
                    return Ok(false);
                }
            }
            Ok(true)
        })
        .unwrap_or(false)
    }

    fn attribute_exists(&self, path: &str, name: &str) -> bool {
        let path = normalize_path(path);
        self.with_file(&path, |file| {
            Self::with_location(file, &path, |loc| {
                Ok(loc.attr_names()?.iter().any(|n| n == name))
            })
        })
        .unwrap_or(false)
    }

    fn storage_object_type(&self, path: &str) -> StorageObjectType {
        let path = normalize_path(path);
        self.with_file(&path, |file| Ok(Self::kind_in(file, &path)))
            .unwrap_or(StorageObjectType::Undefined)
    }

    fn storage_objects(&self, path: &str) -> NwbResult<Vec<(String, StorageObjectType)>> {
        let path = normalize_path(path);
        self.with_file(&path, |file| {
            let group = if path == "/" {
                file.group("/")?
            } else {
                file.group(&path)?
            };
            Ok(group
                .member_names()?
                .into_iter()
                .map(|member| {
                    let child = super::merge_paths(&path, &member);
                    let kind = Self::kind_in(file, &child);
                    (path_name(&child).to_string(), kind)
                })
                .collect())
        })
    }

    fn start_recording(&self) -> NwbResult<()> {
        let mut state = self.state.write();
        let open = state
            .as_mut()
            .ok_or_else(|| NwbError::invalid_state("/", "the HDF5 file is not open"))?;
        if open.mode == FileMode::ReadOnly {
            return Err(NwbError::invalid_state("/", "the HDF5 file is read-only"));
        }
        if open.swmr {
            return Ok(());
        }
        open.file.flush()?;
        // SAFETY: the id belongs to a file object kept alive by `open` for the whole call.
        let status = unsafe { H5Fstart_swmr_write(open.file.id()) };
        if status < 0 {
            return Err(NwbError::backend(&self.name, "H5Fstart_swmr_write failed"));
        }
        open.swmr = true;
        info!(file = %self.name, "Started SWMR recording");
        Ok(())
    }

    fn stop_recording(&self) -> NwbResult<()> {
        let swmr = self.state.read().as_ref().is_some_and(|open| open.swmr);
        if swmr {
            self.close()?;
            info!(file = %self.name, "Stopped SWMR recording");
            Ok(())
        } else {
            self.flush()
        }
    }

    fn can_modify_objects(&self) -> bool {
        self.state
            .read()
            .as_ref()
            .is_some_and(|open| open.mode != FileMode::ReadOnly && !open.swmr)
    }
}

struct ReaderDataset {
    id: hid_t,
    extent: Vec<usize>,
}

/// SWMR reader over an HDF5 file written by another process.
pub struct Hdf5SwmrReader {
    path: PathBuf,
    file_id: hid_t,
    datasets: HashMap<String, ReaderDataset>,
}

// SAFETY: the raw identifiers are owned exclusively by this reader and only used
// through `&mut self` or `&self` methods that do not share them.
unsafe impl Send for Hdf5SwmrReader {}

impl Hdf5SwmrReader {
    /// Opens `path` read-only with SWMR read access.
    pub fn open(path: &Path) -> NwbResult<Self> {
        let display = path.to_string_lossy().into_owned();
        let c_path = CString::new(display.as_bytes())
            .map_err(|_| NwbError::backend(&display, "path contains a NUL byte"))?;
        // SAFETY: c_path outlives the call and is NUL-terminated.
        let file_id = unsafe { H5Fopen(c_path.as_ptr(), H5F_ACC_RDONLY | H5F_ACC_SWMR_READ, H5P_DEFAULT) };
        if file_id < 0 {
            return Err(NwbError::backend(&display, "H5Fopen with SWMR read access failed"));
        }
        debug!(file = %display, "Opened SWMR reader");
        Ok(Self {
            path: path.to_path_buf(),
            file_id,
            datasets: HashMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn current_extent(id: hid_t, path: &str) -> NwbResult<Vec<usize>> {
        // SAFETY: `id` is an open dataset; the dataspace is closed before returning.
        unsafe {
            let space = H5Dget_space(id);
            if space < 0 {
                return Err(NwbError::backend(path, "H5Dget_space failed"));
            }
            let rank = H5Sget_simple_extent_ndims(space);
            if rank < 0 {
                H5Sclose(space);
                return Err(NwbError::backend(path, "H5Sget_simple_extent_ndims failed"));
            }
            let mut dims: Vec<hsize_t> = vec![0; rank as usize];
            let status = H5Sget_simple_extent_dims(space, dims.as_mut_ptr(), std::ptr::null_mut());
            H5Sclose(space);
            if status < 0 {
                return Err(NwbError::backend(path, "H5Sget_simple_extent_dims failed"));
            }
            Ok(dims.into_iter().map(|d| d as usize).collect())
        }
    }

    fn entry(&self, path: &str) -> NwbResult<&ReaderDataset> {
        self.datasets
            .get(&normalize_path(path))
            .ok_or_else(|| NwbError::invalid_state(path, "dataset has not been opened by this reader"))
    }
}

impl SwmrReader for Hdf5SwmrReader {
    fn open_dataset(&mut self, path: &str) -> NwbResult<()> {
        let key = normalize_path(path);
        if self.datasets.contains_key(&key) {
            return Ok(());
        }
        let c_name = CString::new(key.as_bytes())
            .map_err(|_| NwbError::backend(&key, "path contains a NUL byte"))?;
        // SAFETY: file_id is open for the lifetime of self; c_name outlives the call.
        let id = unsafe { H5Dopen2(self.file_id, c_name.as_ptr(), H5P_DEFAULT) };
        if id < 0 {
            return Err(NwbError::backend(&key, "H5Dopen2 failed"));
        }
        let extent = Self::current_extent(id, &key)?;
        self.datasets.insert(key, ReaderDataset { id, extent });
        Ok(())
    }

    fn refresh(&mut self, path: &str) -> NwbResult<()> {
        let key = normalize_path(path);
        let dataset = self
            .datasets
            .get_mut(&key)
            .ok_or_else(|| NwbError::invalid_state(&key, "dataset has not been opened by this reader"))?;
        // SAFETY: dataset.id is an open dataset identifier owned by this reader.
        if unsafe { H5Drefresh(dataset.id) } < 0 {
            return Err(NwbError::backend(&key, "H5Drefresh failed"));
        }
        dataset.extent = Self::current_extent(dataset.id, &key)?;
        trace!(path = %key, extent = ?dataset.extent, "Refreshed dataset");
        Ok(())
    }

    fn extent(&self, path: &str) -> NwbResult<Vec<usize>> {
        Ok(self.entry(path)?.extent.clone())
    }

    fn read(&self, path: &str) -> NwbResult<DataValues> {
        let entry = self.entry(path)?;
        let count: usize = entry.extent.iter().product();

        // SAFETY: every type id opened here is closed before returning; the buffer
        // holds `count` elements of the native type selected below and the read uses
        // the dataset's current dataspace, which matches the cached extent until the
        // next refresh.
        unsafe {
            let file_type = H5Dget_type(entry.id);
            if file_type < 0 {
                return Err(NwbError::backend(path, "H5Dget_type failed"));
            }
            let native = H5Tget_native_type(file_type, H5T_direction_t::H5T_DIR_DEFAULT);
            H5Tclose(file_type);
            if native < 0 {
                return Err(NwbError::backend(path, "H5Tget_native_type failed"));
            }
            let class = H5Tget_class(native);
            let size = H5Tget_size(native);
            let signed = H5Tget_sign(native) == H5T_sign_t::H5T_SGN_2;
            let dtype = match (class, size, signed) {
                (H5T_class_t::H5T_INTEGER, 1, true) => Some(DataType::I8),
                (H5T_class_t::H5T_INTEGER, 2, true) => Some(DataType::I16),
                (H5T_class_t::H5T_INTEGER, 4, true) => Some(DataType::I32),
                (H5T_class_t::H5T_INTEGER, 8, true) => Some(DataType::I64),
                (H5T_class_t::H5T_INTEGER, 1, false) => Some(DataType::U8),
                (H5T_class_t::H5T_INTEGER, 2, false) => Some(DataType::U16),
                (H5T_class_t::H5T_INTEGER, 4, false) => Some(DataType::U32),
                (H5T_class_t::H5T_INTEGER, 8, false) => Some(DataType::U64),
                (H5T_class_t::H5T_FLOAT, 4, _) => Some(DataType::F32),
                (H5T_class_t::H5T_FLOAT, 8, _) => Some(DataType::F64),
                _ => None,
            };
            let result = match dtype {
                Some(dtype) => with_numeric_type!(dtype, T => {
                    let mut buffer: Vec<T> = vec![T::default(); count];
                    let status = H5Dread(
                        entry.id,
                        native,
                        H5S_ALL,
                        H5S_ALL,
                        H5P_DEFAULT,
                        buffer.as_mut_ptr().cast(),
                    );
                    if status < 0 {
                        Err(NwbError::backend(path, "H5Dread failed"))
                    } else {
                        Ok(DataValues::from(buffer))
                    }
                }, strings => Err(NwbError::backend(path, "unreachable element type"))),
                None => Err(NwbError::backend(
                    path,
                    "SWMR reads are limited to numeric datasets",
                )),
            };
            H5Tclose(native);
            result
        }
    }
}

impl Drop for Hdf5SwmrReader {
    fn drop(&mut self) {
        // SAFETY: each id was opened by this reader and is closed exactly once.
        unsafe {
            for dataset in self.datasets.values() {
                H5Dclose(dataset.id);
            }
            H5Fclose(self.file_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn hdf5_round_trip_and_swmr_append() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("session.nwb");
        let io = Hdf5Io::new(&file);
        io.open(FileMode::Overwrite).unwrap();

        io.create_group("/acquisition").unwrap();
        io.create_attribute("core".into(), "/acquisition", "namespace").unwrap();
        assert_eq!(
            io.read_attribute("/acquisition", "namespace").unwrap(),
            AttributeValue::Str("core".into())
        );

        let handle = io
            .create_array_dataset(
                &DatasetConfig::vector(DataType::I32, 0, 64),
                "/acquisition/samples",
            )
            .unwrap();
        io.start_recording().unwrap();
        assert!(io.create_group("/late").is_err());

        io.extend_dataset(&handle, &[3]).unwrap();
        io.write_block(&handle, 0, &vec![1i32, 2, 3].into()).unwrap();
        io.flush().unwrap();

        let mut reader = Hdf5SwmrReader::open(&file).unwrap();
        reader.open_dataset("/acquisition/samples").unwrap();
        assert_eq!(reader.refresh_extent("/acquisition/samples").unwrap(), vec![3]);
        assert_eq!(
            reader.read("/acquisition/samples").unwrap(),
            DataValues::I32(vec![1, 2, 3])
        );

        io.stop_recording().unwrap();
        assert!(!io.is_open());
    }
}
