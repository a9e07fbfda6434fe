//! Reader and writer for the NumPy `.npy` format.
//!
//! Only C-ordered little-endian arrays are supported. Besides the numeric
//! [`DataType`]s, fixed-width unicode (`<U`) and byte (`|S`) string arrays can
//! be read, which is how trial tiers are stored.

use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::{Array, DataType, array::ArrayError};

const MAGIC: &[u8] = b"\x93NUMPY";
const HEADER_ALIGNMENT: usize = 64;

#[derive(Debug, Error)]
pub enum NpyError {
    #[error("Failed to access \"{path}\"")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("The file does not start with the NumPy magic string.")]
    InvalidMagic,
    #[error("Unsupported format version {0}.{1}.")]
    UnsupportedVersion(u8, u8),
    #[error("The header is truncated or its length is invalid.")]
    InvalidHeaderLength,
    #[error("Couldn't parse the header: {0}")]
    InvalidHeader(String),
    #[error("Unsupported dtype \"{0}\".")]
    UnsupportedDtype(String),
    #[error("Fortran-ordered arrays are not supported.")]
    FortranOrder,
    #[error("Expected a numeric array, found strings of dtype \"{0}\".")]
    NotNumeric(String),
    #[error("Expected a string array, found {0:?}.")]
    NotStrings(DataType),
    #[error("String element {0} is not valid text.")]
    InvalidText(usize),
    #[error(transparent)]
    Array(#[from] ArrayError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpyHeader {
    pub descr: String,
    pub fortran_order: bool,
    pub shape: Vec<usize>,
}

#[derive(Debug)]
pub enum NpyData {
    Numeric(Array),
    Strings {
        descr: String,
        shape: Vec<usize>,
        values: Vec<String>,
    },
}

enum StringKind {
    Unicode(usize),
    Bytes(usize),
}

impl StringKind {
    fn parse(descr: &str) -> Option<Self> {
        let mut chars = descr.chars();
        let order = chars.next()?;
        let kind = chars.next()?;
        let width: usize = chars.as_str().parse().ok()?;
        match (order, kind) {
            ('<' | '=' | '|', 'U') => Some(StringKind::Unicode(width)),
            ('<' | '=' | '|', 'S') => Some(StringKind::Bytes(width)),
            _ => None,
        }
    }

    fn element_size(&self) -> usize {
        match self {
            StringKind::Unicode(width) => width * 4,
            StringKind::Bytes(width) => *width,
        }
    }
}

pub fn read(path: &Path) -> Result<NpyData, NpyError> {
    let bytes = fs::read(path).map_err(|source| NpyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let label = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    parse(&bytes, label)
}

pub fn read_array(path: &Path) -> Result<Array, NpyError> {
    match read(path)? {
        NpyData::Numeric(array) => Ok(array),
        NpyData::Strings {
            descr,
            ..
        } => Err(NpyError::NotNumeric(descr)),
    }
}

pub fn read_strings(path: &Path) -> Result<Vec<String>, NpyError> {
    match read(path)? {
        NpyData::Strings {
            values,
            ..
        } => Ok(values),
        NpyData::Numeric(array) => Err(NpyError::NotStrings(array.data_type())),
    }
}

pub fn parse(
    bytes: &[u8],
    label: impl Into<String>,
) -> Result<NpyData, NpyError> {
    let (header, data) = parse_header(bytes)?;
    if header.fortran_order {
        return Err(NpyError::FortranOrder);
    }

    if let Some(data_type) = DataType::from_npy_descr(&header.descr) {
        let array = Array::from_bytes(&header.shape, data_type, data, label)?;
        return Ok(NpyData::Numeric(array));
    }

    let kind = StringKind::parse(&header.descr)
        .ok_or_else(|| NpyError::UnsupportedDtype(header.descr.clone()))?;
    let count: usize = header.shape.iter().product();
    let element_size = kind.element_size();
    if data.len() != count * element_size {
        return Err(NpyError::InvalidHeaderLength);
    }

    let mut values = Vec::with_capacity(count);
    for index in 0..count {
        let element = &data[index * element_size..(index + 1) * element_size];
        values.push(decode_string(&kind, element, index)?);
    }
    Ok(NpyData::Strings {
        descr: header.descr,
        shape: header.shape,
        values,
    })
}

fn decode_string(
    kind: &StringKind,
    element: &[u8],
    index: usize,
) -> Result<String, NpyError> {
    match kind {
        StringKind::Unicode(_) => element
            .chunks_exact(4)
            .map(|code| u32::from_le_bytes([code[0], code[1], code[2], code[3]]))
            .take_while(|&code| code != 0)
            .map(|code| char::from_u32(code).ok_or(NpyError::InvalidText(index)))
            .collect(),
        StringKind::Bytes(_) => {
            let end = element.iter().position(|&byte| byte == 0).unwrap_or(element.len());
            String::from_utf8(element[..end].to_vec())
                .map_err(|_| NpyError::InvalidText(index))
        },
    }
}

pub fn parse_header(bytes: &[u8]) -> Result<(NpyHeader, &[u8]), NpyError> {
    if bytes.len() < MAGIC.len() + 2 || &bytes[..MAGIC.len()] != MAGIC {
        return Err(NpyError::InvalidMagic);
    }
    let (major, minor) = (bytes[6], bytes[7]);
    let (length_size, header_start) = match major {
        1 => (2, 10),
        2 | 3 => (4, 12),
        _ => return Err(NpyError::UnsupportedVersion(major, minor)),
    };
    if bytes.len() < header_start {
        return Err(NpyError::InvalidHeaderLength);
    }
    let header_length = bytes[8..8 + length_size]
        .iter()
        .rev()
        .fold(0usize, |acc, &byte| (acc << 8) | byte as usize);
    let data_start = header_start
        .checked_add(header_length)
        .filter(|&end| end <= bytes.len())
        .ok_or(NpyError::InvalidHeaderLength)?;

    let text = std::str::from_utf8(&bytes[header_start..data_start])
        .map_err(|_| NpyError::InvalidHeader(String::from("not valid text")))?;
    let header = NpyHeader {
        descr: parse_quoted(dict_value(text, "descr")?)?,
        fortran_order: parse_bool(dict_value(text, "fortran_order")?)?,
        shape: parse_shape(dict_value(text, "shape")?)?,
    };
    Ok((header, &bytes[data_start..]))
}

fn dict_value<'a>(
    text: &'a str,
    key: &str,
) -> Result<&'a str, NpyError> {
    let missing = || NpyError::InvalidHeader(format!("missing key \"{key}\""));
    let position = [format!("'{key}'"), format!("\"{key}\"")]
        .iter()
        .find_map(|quoted| text.find(quoted.as_str()).map(|at| at + quoted.len()))
        .ok_or_else(missing)?;
    let rest = text[position..].trim_start();
    rest.strip_prefix(':').map(str::trim_start).ok_or_else(missing)
}

fn parse_quoted(value: &str) -> Result<String, NpyError> {
    let quote = value
        .chars()
        .next()
        .filter(|&c| c == '\'' || c == '"')
        .ok_or_else(|| NpyError::InvalidHeader(String::from("descr is not a string")))?;
    let rest = &value[1..];
    let end = rest
        .find(quote)
        .ok_or_else(|| NpyError::InvalidHeader(String::from("unterminated descr")))?;
    Ok(rest[..end].to_string())
}

fn parse_bool(value: &str) -> Result<bool, NpyError> {
    if value.starts_with("True") {
        Ok(true)
    } else if value.starts_with("False") {
        Ok(false)
    } else {
        Err(NpyError::InvalidHeader(String::from("fortran_order is not a bool")))
    }
}

fn parse_shape(value: &str) -> Result<Vec<usize>, NpyError> {
    let invalid = || NpyError::InvalidHeader(String::from("shape is not a tuple"));
    let inner = value.strip_prefix('(').ok_or_else(invalid)?;
    let end = inner.find(')').ok_or_else(invalid)?;
    inner[..end]
        .split(',')
        .map(str::trim)
        .filter(|dim| !dim.is_empty())
        .map(|dim| dim.trim_end_matches('L').parse().map_err(|_| invalid()))
        .collect()
}

fn format_shape(shape: &[usize]) -> String {
    match shape {
        [] => String::from("()"),
        [dim] => format!("({dim},)"),
        dims => format!(
            "({})",
            dims.iter().map(usize::to_string).collect::<Vec<_>>().join(", ")
        ),
    }
}

fn encode(
    descr: &str,
    shape: &[usize],
    data: &[u8],
) -> Vec<u8> {
    let mut header = format!(
        "{{'descr': '{descr}', 'fortran_order': False, 'shape': {}, }}",
        format_shape(shape)
    );
    let prefix = MAGIC.len() + 4;
    let unpadded = prefix + header.len() + 1;
    let padding = (HEADER_ALIGNMENT - unpadded % HEADER_ALIGNMENT) % HEADER_ALIGNMENT;
    header.extend(std::iter::repeat_n(' ', padding));
    header.push('\n');

    let mut bytes = Vec::with_capacity(prefix + header.len() + data.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&[1, 0]);
    bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
    bytes.extend_from_slice(header.as_bytes());
    bytes.extend_from_slice(data);
    bytes
}

fn write_bytes(
    path: &Path,
    bytes: &[u8],
) -> Result<(), NpyError> {
    fs::write(path, bytes).map_err(|source| NpyError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn to_bytes(array: &Array) -> Vec<u8> {
    encode(array.data_type().npy_descr(), array.shape(), array.buffer())
}

pub fn write_array(
    path: &Path,
    array: &Array,
) -> Result<(), NpyError> {
    write_bytes(path, &to_bytes(array))
}

/// Writes a one-dimensional `<U` array.
pub fn write_strings<S: AsRef<str>>(
    path: &Path,
    values: &[S],
) -> Result<(), NpyError> {
    let width = values
        .iter()
        .map(|value| value.as_ref().chars().count())
        .max()
        .unwrap_or(0)
        .max(1);
    let mut data = Vec::with_capacity(values.len() * width * 4);
    for value in values {
        let mut written = 0;
        for c in value.as_ref().chars() {
            data.extend_from_slice(&(c as u32).to_le_bytes());
            written += 1;
        }
        data.extend(std::iter::repeat_n(0u8, (width - written) * 4));
    }
    write_bytes(path, &encode(&format!("<U{width}"), &[values.len()], &data))
}
