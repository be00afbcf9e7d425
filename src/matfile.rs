//! Reader for MATLAB level-4 matrix files.
//!
//! PhysiCell stores voxel, microenvironment and cell payloads as level-4
//! `.mat` files: a sequence of matrices, each a 20-byte header
//! (`MOPT`, rows, columns, imaginary flag, name length), the NUL-terminated
//! name, then the real part in column-major order (and the imaginary part
//! when flagged, which this reader skips).

use thiserror::Error;

const HEADER_LEN: usize = 20;

/// Decoding failures for level-4 files.
#[derive(Debug, Error, PartialEq)]
pub enum MatError {
    #[error("level 5 MAT files are not supported")]
    Level5,
    #[error("unrecognised matrix type word {0:#x}")]
    BadType(u32),
    #[error("unsupported {what} code {code} in type word")]
    Unsupported { what: &'static str, code: i32 },
    #[error("negative {field} ({value}) in header of matrix #{index}")]
    NegativeHeaderField {
        index: usize,
        field: &'static str,
        value: i32,
    },
    #[error("matrix #{index} needs {needed} bytes at offset {offset}, file has {len}")]
    Truncated {
        index: usize,
        offset: usize,
        needed: usize,
        len: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

#[derive(Debug, Clone, Copy)]
enum Precision {
    F64,
    F32,
    I32,
    I16,
    U16,
    U8,
}

impl Precision {
    fn from_code(code: i32) -> Result<Self, MatError> {
        Ok(match code {
            0 => Precision::F64,
            1 => Precision::F32,
            2 => Precision::I32,
            3 => Precision::I16,
            4 => Precision::U16,
            5 => Precision::U8,
            _ => return Err(MatError::Unsupported { what: "precision", code }),
        })
    }

    fn width(self) -> usize {
        match self {
            Precision::F64 => 8,
            Precision::F32 | Precision::I32 => 4,
            Precision::I16 | Precision::U16 => 2,
            Precision::U8 => 1,
        }
    }

    fn decode(self, b: &[u8], order: ByteOrder) -> f64 {
        macro_rules! num {
            ($t:ty, $n:expr) => {{
                let mut raw = [0u8; $n];
                raw.copy_from_slice(&b[..$n]);
                match order {
                    ByteOrder::Little => <$t>::from_le_bytes(raw) as f64,
                    ByteOrder::Big => <$t>::from_be_bytes(raw) as f64,
                }
            }};
        }
        match self {
            Precision::F64 => num!(f64, 8),
            Precision::F32 => num!(f32, 4),
            Precision::I32 => num!(i32, 4),
            Precision::I16 => num!(i16, 2),
            Precision::U16 => num!(u16, 2),
            Precision::U8 => b[0] as f64,
        }
    }
}

/// A dense real matrix, stored column-major like the file.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    name: String,
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Builds a matrix from column-major data. Panics if the length is wrong.
    pub fn from_column_major(name: &str, rows: usize, cols: usize, data: Vec<f64>) -> Self {
        assert_eq!(data.len(), rows * cols, "matrix data length");
        Matrix { name: name.to_string(), rows, cols, data }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Element at `(row, col)`, or `None` outside the matrix.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            Some(self.data[col * self.rows + row])
        } else {
            None
        }
    }

    /// One column as a contiguous slice.
    pub fn column(&self, col: usize) -> Option<&[f64]> {
        if col < self.cols {
            Some(&self.data[col * self.rows..(col + 1) * self.rows])
        } else {
            None
        }
    }

    /// One row, gathered across all columns.
    pub fn row(&self, row: usize) -> Option<Vec<f64>> {
        if row >= self.rows {
            return None;
        }
        Some((0..self.cols).map(|c| self.data[c * self.rows + row]).collect())
    }
}

/// All matrices of one file, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatFile {
    matrices: Vec<Matrix>,
}

impl MatFile {
    /// Decodes a whole level-4 file.
    pub fn parse(bytes: &[u8]) -> Result<Self, MatError> {
        if bytes.starts_with(b"MATLAB") {
            return Err(MatError::Level5);
        }

        let mut matrices = Vec::new();
        let mut offset = 0;
        while offset < bytes.len() {
            let (matrix, next) = read_matrix(bytes, offset, matrices.len())?;
            matrices.push(matrix);
            offset = next;
        }
        Ok(MatFile { matrices })
    }

    /// First matrix named `name`.
    pub fn get(&self, name: &str) -> Option<&Matrix> {
        self.matrices.iter().find(|m| m.name == name)
    }

    /// Moves the matrix named `name` out of the file.
    pub fn take(&mut self, name: &str) -> Option<Matrix> {
        let idx = self.matrices.iter().position(|m| m.name == name)?;
        Some(self.matrices.swap_remove(idx))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.matrices.iter().map(|m| m.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }
}

fn byte_order(word: [u8; 4]) -> Result<ByteOrder, MatError> {
    let le = i32::from_le_bytes(word);
    if (0..5000).contains(&le) && le / 1000 == 0 {
        return Ok(ByteOrder::Little);
    }
    let be = i32::from_be_bytes(word);
    if (0..5000).contains(&be) && be / 1000 == 1 {
        return Ok(ByteOrder::Big);
    }
    Err(MatError::BadType(u32::from_le_bytes(word)))
}

fn read_matrix(bytes: &[u8], offset: usize, index: usize) -> Result<(Matrix, usize), MatError> {
    let need = |at: usize, n: usize| -> Result<(), MatError> {
        match at.checked_add(n) {
            Some(end) if end <= bytes.len() => Ok(()),
            _ => Err(MatError::Truncated { index, offset: at, needed: n, len: bytes.len() }),
        }
    };

    need(offset, HEADER_LEN)?;
    let word = |i: usize| -> [u8; 4] {
        let at = offset + 4 * i;
        [bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]
    };

    let order = byte_order(word(0))?;
    let int = |i: usize| match order {
        ByteOrder::Little => i32::from_le_bytes(word(i)),
        ByteOrder::Big => i32::from_be_bytes(word(i)),
    };

    let mopt = int(0);
    let reserved = (mopt / 100) % 10;
    if reserved != 0 {
        return Err(MatError::Unsupported { what: "reserved", code: reserved });
    }
    let precision = Precision::from_code((mopt / 10) % 10)?;
    let kind = mopt % 10;
    // 0 numeric, 1 text (stored as numbers); 2 sparse is not a dense matrix
    if kind > 1 {
        return Err(MatError::Unsupported { what: "matrix type", code: kind });
    }

    let header_field = |i: usize, field: &'static str| -> Result<usize, MatError> {
        let value = int(i);
        usize::try_from(value).map_err(|_| MatError::NegativeHeaderField { index, field, value })
    };
    let rows = header_field(1, "rows")?;
    let cols = header_field(2, "columns")?;
    let imaginary = int(3) != 0;
    let name_len = header_field(4, "name length")?;

    let mut at = offset + HEADER_LEN;
    need(at, name_len)?;
    let raw_name = &bytes[at..at + name_len];
    let name_end = raw_name.iter().position(|&b| b == 0).unwrap_or(raw_name.len());
    let name = String::from_utf8_lossy(&raw_name[..name_end]).into_owned();
    at += name_len;

    let width = precision.width();
    let count = rows.checked_mul(cols);
    let part_len = count.and_then(|c| c.checked_mul(width));
    let part_len = match part_len {
        Some(n) => n,
        None => {
            return Err(MatError::Truncated { index, offset: at, needed: usize::MAX, len: bytes.len() })
        }
    };
    let total = if imaginary { part_len.saturating_mul(2) } else { part_len };
    need(at, total)?;

    let data = bytes[at..at + part_len]
        .chunks_exact(width)
        .map(|b| precision.decode(b, order))
        .collect();
    at += total;

    Ok((Matrix { name, rows, cols, data }, at))
}
