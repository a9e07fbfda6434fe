use std::fmt;

use half::f16;
use ndarray::{ArrayView, ArrayViewD, Dimension, IxDyn};
use num_traits::NumCast;
use thiserror::Error;

use crate::{ArrayElement, DataType, device::Device};

#[derive(Error, Debug)]
pub enum ArrayError {
    #[error("Invalid data type, expected {expected:?}, actual {actual:?}")]
    InvalidDataType {
        expected: DataType,
        actual: DataType,
    },
    #[error(
        "Buffer of {actual} bytes does not fit an array of shape {shape:?} \
        and data type {data_type:?} ({expected} bytes)"
    )]
    InvalidBufferLength {
        shape: Box<[usize]>,
        data_type: DataType,
        expected: usize,
        actual: usize,
    },
    #[error("Shape mismatch in \"{label}\": expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        label: String,
        expected: Box<[usize]>,
        actual: Box<[usize]>,
    },
    #[error("Cannot combine arrays of data types {expected:?} and {actual:?}")]
    DataTypeMismatch {
        expected: DataType,
        actual: DataType,
    },
    #[error("Array \"{0}\" is a scalar and has no leading axis")]
    Scalar(String),
    #[error("Need at least one array to combine")]
    NothingToCombine,
    #[error("Index {index} is out of range for \"{label}\" with {len} rows")]
    IndexOutOfRange {
        label: String,
        index: usize,
        len: usize,
    },
    #[error("Value of {from:?} array \"{label}\" cannot be represented as {to:?}")]
    CastFailed {
        label: String,
        from: DataType,
        to: DataType,
    },
}

/// Number of bytes required to store an array with a given shape and DataType.
pub fn array_size_in_bytes(
    shape: &[usize],
    data_type: DataType,
) -> usize {
    shape.iter().product::<usize>() * data_type.size_in_bytes()
}

/// Dense row-major n-dimensional array tagged with the device it lives on.
///
/// The storage is kept 8-byte aligned so that every [`ArrayElement`] can be
/// viewed in place.
#[derive(Clone)]
pub struct Array {
    shape: Box<[usize]>,
    data_type: DataType,
    label: String,
    device: Device,
    words: Box<[u64]>,
    size: usize,
}

impl Array {
    pub fn zeros(
        shape: &[usize],
        data_type: DataType,
        label: impl Into<String>,
    ) -> Self {
        let size = array_size_in_bytes(shape, data_type);
        Self {
            shape: shape.into(),
            data_type,
            label: label.into(),
            device: Device::Cpu,
            words: vec![0u64; size.div_ceil(size_of::<u64>())].into(),
            size,
        }
    }

    /// Empty one-dimensional array, shape `(0,)`.
    pub fn empty(
        data_type: DataType,
        label: impl Into<String>,
    ) -> Self {
        Self::zeros(&[0], data_type, label)
    }

    pub fn from_bytes(
        shape: &[usize],
        data_type: DataType,
        bytes: &[u8],
        label: impl Into<String>,
    ) -> Result<Self, ArrayError> {
        let mut array = Self::zeros(shape, data_type, label);
        if array.size != bytes.len() {
            return Err(ArrayError::InvalidBufferLength {
                shape: shape.into(),
                data_type,
                expected: array.size,
                actual: bytes.len(),
            });
        }
        array.buffer_mut().copy_from_slice(bytes);
        Ok(array)
    }

    pub fn from_vec<T: ArrayElement>(
        shape: &[usize],
        data: Vec<T>,
        label: impl Into<String>,
    ) -> Result<Self, ArrayError> {
        Self::from_bytes(shape, T::data_type(), bytemuck::cast_slice(&data), label)
    }

    /// Allocate a new array and populate it with the data copied from the given view.
    pub fn from_view<T: ArrayElement, D: Dimension>(
        view: ArrayView<T, D>,
        label: impl Into<String>,
    ) -> Self {
        let mut result = Self::zeros(view.shape(), T::data_type(), label);
        let buffer: &mut [T] = bytemuck::cast_slice_mut(result.buffer_mut());
        if let Some(slice) = view.as_slice() {
            buffer.copy_from_slice(slice);
        } else {
            for (dst, src) in buffer.iter_mut().zip(view.iter()) {
                *dst = *src;
            }
        }
        result
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Size of the leading axis, zero for scalars.
    pub fn len(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.num_elements() == 0
    }

    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn with_label(
        mut self,
        label: impl Into<String>,
    ) -> Self {
        self.label = label.into();
        self
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn size_in_bytes(&self) -> usize {
        self.size
    }

    pub fn buffer(&self) -> &[u8] {
        &bytemuck::cast_slice(&self.words)[..self.size]
    }

    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut(&mut self.words)[..self.size]
    }

    /// Returns a typed slice referring to the underlying buffer.
    /// Returns an error if the requested type does not match the array's data type.
    pub fn as_slice<T: ArrayElement>(&self) -> Result<&[T], ArrayError> {
        self.check_data_type::<T>()?;
        Ok(bytemuck::cast_slice(self.buffer()))
    }

    pub fn as_view<T: ArrayElement>(
        &self
    ) -> Result<ArrayViewD<'_, T>, ArrayError> {
        let slice = self.as_slice()?;
        ArrayView::from_shape(IxDyn(&self.shape), slice).map_err(|_| ArrayError::ShapeMismatch {
            label: self.label.clone(),
            expected: self.shape.clone().into(),
            actual: Box::new([slice.len()]),
        })
    }

    /// Copies the elements into a flat vector, converting them to `T`.
    pub fn to_vec<T: ArrayElement>(&self) -> Result<Vec<T>, ArrayError> {
        match self.data_type {
            DataType::F16 => self.cast_elements::<f16, T>(),
            DataType::F32 => self.cast_elements::<f32, T>(),
            DataType::F64 => self.cast_elements::<f64, T>(),
            DataType::I8 => self.cast_elements::<i8, T>(),
            DataType::U8 => self.cast_elements::<u8, T>(),
            DataType::I16 => self.cast_elements::<i16, T>(),
            DataType::U16 => self.cast_elements::<u16, T>(),
            DataType::I32 => self.cast_elements::<i32, T>(),
            DataType::U32 => self.cast_elements::<u32, T>(),
            DataType::I64 => self.cast_elements::<i64, T>(),
            DataType::U64 => self.cast_elements::<u64, T>(),
        }
    }

    pub fn cast<T: ArrayElement>(&self) -> Result<Array, ArrayError> {
        let mut result = Array::from_vec(&self.shape, self.to_vec::<T>()?, self.label.clone())?;
        result.device = self.device;
        Ok(result)
    }

    /// Splits a two-dimensional array into its rows, converting elements to `T`.
    /// The empty array of shape `(0,)` has no rows.
    pub fn to_rows<T: ArrayElement>(&self) -> Result<Vec<Vec<T>>, ArrayError> {
        match *self.shape {
            [0] => Ok(Vec::new()),
            [rows, columns] => {
                let values = self.to_vec::<T>()?;
                if columns == 0 {
                    return Ok(vec![Vec::new(); rows]);
                }
                Ok(values.chunks(columns).map(<[T]>::to_vec).collect())
            },
            _ => Err(ArrayError::ShapeMismatch {
                label: self.label.clone(),
                expected: Box::new([self.len(), 0]),
                actual: self.shape.clone(),
            }),
        }
    }

    /// Copy of the `index`-th slice along the leading axis.
    pub fn row(
        &self,
        index: usize,
    ) -> Result<Array, ArrayError> {
        if self.shape.is_empty() {
            return Err(ArrayError::Scalar(self.label.clone()));
        }
        if index >= self.shape[0] {
            return Err(ArrayError::IndexOutOfRange {
                label: self.label.clone(),
                index,
                len: self.shape[0],
            });
        }
        let row_size = array_size_in_bytes(&self.shape[1..], self.data_type);
        let bytes = &self.buffer()[index * row_size..(index + 1) * row_size];
        let mut result = Array::from_bytes(&self.shape[1..], self.data_type, bytes, self.label.clone())?;
        result.device = self.device;
        Ok(result)
    }

    /// Copy of the array placed on `device`.
    pub fn to_device(
        &self,
        device: Device,
    ) -> Array {
        let mut result = self.clone();
        result.device = device;
        result
    }

    pub fn to_host(&self) -> Array {
        self.to_device(Device::Cpu)
    }

    /// Same elements under a new shape with the same number of elements.
    pub fn reshape(
        &self,
        shape: &[usize],
    ) -> Result<Array, ArrayError> {
        if shape.iter().product::<usize>() != self.num_elements() {
            return Err(ArrayError::ShapeMismatch {
                label: self.label.clone(),
                expected: shape.into(),
                actual: self.shape.clone().into(),
            });
        }
        let mut result = self.clone();
        result.shape = shape.into();
        Ok(result)
    }

    /// Joins arrays along the leading axis. Trailing dimensions and data types must agree.
    pub fn concatenate(
        arrays: &[Array],
        label: impl Into<String>,
    ) -> Result<Array, ArrayError> {
        let label = label.into();
        let first = arrays.first().ok_or(ArrayError::NothingToCombine)?;
        if first.shape.is_empty() {
            return Err(ArrayError::Scalar(first.label.clone()));
        }

        let mut rows = 0;
        for array in arrays {
            if array.data_type != first.data_type {
                return Err(ArrayError::DataTypeMismatch {
                    expected: first.data_type,
                    actual: array.data_type,
                });
            }
            if array.shape.is_empty() || array.shape[1..] != first.shape[1..] {
                return Err(ArrayError::ShapeMismatch {
                    label,
                    expected: first.shape.clone(),
                    actual: array.shape.clone(),
                });
            }
            rows += array.shape[0];
        }

        let mut shape = first.shape.to_vec();
        shape[0] = rows;
        Self::join(arrays.iter(), &shape, first, label)
    }

    /// Joins arrays of identical shape along a new leading axis.
    pub fn stack<'a>(
        arrays: impl IntoIterator<Item = &'a Array>,
        label: impl Into<String>,
    ) -> Result<Array, ArrayError> {
        let label = label.into();
        let arrays: Vec<&Array> = arrays.into_iter().collect();
        let first = *arrays.first().ok_or(ArrayError::NothingToCombine)?;
        for array in &arrays {
            if array.data_type != first.data_type {
                return Err(ArrayError::DataTypeMismatch {
                    expected: first.data_type,
                    actual: array.data_type,
                });
            }
            if array.shape != first.shape {
                return Err(ArrayError::ShapeMismatch {
                    label,
                    expected: first.shape.clone(),
                    actual: array.shape.clone(),
                });
            }
        }

        let shape: Vec<usize> =
            std::iter::once(arrays.len()).chain(first.shape.iter().copied()).collect();
        Self::join(arrays.into_iter(), &shape, first, label)
    }

    fn join<'a>(
        arrays: impl Iterator<Item = &'a Array>,
        shape: &[usize],
        first: &Array,
        label: String,
    ) -> Result<Array, ArrayError> {
        let mut bytes = Vec::with_capacity(array_size_in_bytes(shape, first.data_type));
        for array in arrays {
            bytes.extend_from_slice(array.buffer());
        }
        let mut result = Array::from_bytes(shape, first.data_type, &bytes, label)?;
        result.device = first.device;
        Ok(result)
    }

    fn check_data_type<T: ArrayElement>(&self) -> Result<(), ArrayError> {
        if T::data_type() != self.data_type {
            return Err(ArrayError::InvalidDataType {
                expected: T::data_type(),
                actual: self.data_type,
            });
        }
        Ok(())
    }

    fn cast_elements<S: ArrayElement, T: ArrayElement>(
        &self
    ) -> Result<Vec<T>, ArrayError> {
        let source: &[S] = bytemuck::cast_slice(self.buffer());
        source
            .iter()
            .map(|&value| {
                <T as NumCast>::from(value).ok_or_else(|| ArrayError::CastFailed {
                    label: self.label.clone(),
                    from: self.data_type,
                    to: T::data_type(),
                })
            })
            .collect()
    }
}

impl PartialEq for Array {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.shape == other.shape
            && self.data_type == other.data_type
            && self.buffer() == other.buffer()
    }
}

impl fmt::Debug for Array {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Array")
            .field("label", &self.label)
            .field("shape", &self.shape)
            .field("data_type", &self.data_type)
            .field("device", &self.device)
            .finish()
    }
}
