use bytemuck::Pod;
use half::f16;
use num_traits::NumCast;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Hash)]
pub enum DataType {
    // Floating point
    F16,
    F32,
    F64,
    // Integers
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
}

impl DataType {
    pub fn size_in_bits(&self) -> usize {
        match self {
            DataType::F16 => 16,
            DataType::F32 => 32,
            DataType::F64 => 64,
            DataType::I8 => 8,
            DataType::U8 => 8,
            DataType::I16 => 16,
            DataType::U16 => 16,
            DataType::I32 => 32,
            DataType::U32 => 32,
            DataType::I64 => 64,
            DataType::U64 => 64,
        }
    }

    pub fn size_in_bytes(&self) -> usize {
        self.size_in_bits() / 8
    }

    /// NumPy type descriptor of the little-endian layout, e.g. `<f4`.
    pub fn npy_descr(&self) -> &'static str {
        match self {
            DataType::F16 => "<f2",
            DataType::F32 => "<f4",
            DataType::F64 => "<f8",
            DataType::I8 => "|i1",
            DataType::U8 => "|u1",
            DataType::I16 => "<i2",
            DataType::U16 => "<u2",
            DataType::I32 => "<i4",
            DataType::U32 => "<u4",
            DataType::I64 => "<i8",
            DataType::U64 => "<u8",
        }
    }

    /// Inverse of [`DataType::npy_descr`]. Native (`=`) and byte-order-free
    /// (`|`) prefixes are accepted for single byte types; big-endian is not.
    pub fn from_npy_descr(descr: &str) -> Option<Self> {
        let mut chars = descr.chars();
        let order = chars.next()?;
        let code = chars.as_str();
        if !matches!(order, '<' | '=' | '|') {
            return None;
        }
        let data_type = match code {
            "f2" => DataType::F16,
            "f4" => DataType::F32,
            "f8" => DataType::F64,
            "i1" => DataType::I8,
            "u1" => DataType::U8,
            "i2" => DataType::I16,
            "u2" => DataType::U16,
            "i4" => DataType::I32,
            "u4" => DataType::U32,
            "i8" => DataType::I64,
            "u8" => DataType::U64,
            _ => return None,
        };
        if order == '|' && data_type.size_in_bytes() != 1 {
            return None;
        }
        Some(data_type)
    }
}

pub trait ArrayElement: NumCast + Pod {
    fn data_type() -> DataType;
}

macro_rules! impl_array_element {
    ($($type:ty => $variant:ident),+ $(,)?) => {
        $(
            impl ArrayElement for $type {
                fn data_type() -> DataType {
                    DataType::$variant
                }
            }
        )+
    };
}

impl_array_element! {
    f16 => F16,
    f32 => F32,
    f64 => F64,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_npy_descr_mapping() {
        for data_type in [
            DataType::F16,
            DataType::F32,
            DataType::F64,
            DataType::I8,
            DataType::U8,
            DataType::I32,
            DataType::I64,
            DataType::U64,
        ] {
            assert_eq!(
                DataType::from_npy_descr(data_type.npy_descr()),
                Some(data_type)
            );
        }
        assert_eq!(DataType::from_npy_descr("=f4"), Some(DataType::F32));
        assert_eq!(DataType::from_npy_descr(">f4"), None);
        assert_eq!(DataType::from_npy_descr("|f4"), None);
        assert_eq!(DataType::from_npy_descr("<c8"), None);
        assert_eq!(DataType::from_npy_descr("éf4"), None);
        assert_eq!(DataType::from_npy_descr(""), None);
    }
}
