//! Engine memory layouts.
//!
//! Results read from the engine use flat buffers when `cols == 1` and row
//! pointer tables (`[row][col]`) otherwise. Values lowered into the engine are
//! `malloc`ed so the engine can free them with its own allocator.

use std::ffi::{CStr, c_char, c_uint, c_ulong, c_void};
use std::{mem, ptr, slice};

use panmat_core::{
    Allocation, AllocationKind, AllocationRecorder, EngineMatrix, EngineValue, Error, Orientation,
};

use crate::ffi::{RAW_COMPLEX, RAW_REAL, RAW_SCALAR, RawArray, RecordAllocationFn};

/// Output slots of `PanMatlabGet`.
#[derive(Debug)]
pub struct RawResult {
    pub real: *mut f64,
    pub imag: *mut f64,
    pub strings: *mut c_char,
    pub rows: i32,
    pub cols: i32,
}

impl Default for RawResult {
    fn default() -> Self {
        Self {
            real: ptr::null_mut(),
            imag: ptr::null_mut(),
            strings: ptr::null_mut(),
            rows: 0,
            cols: 0,
        }
    }
}

unsafe fn flat(data: *const f64, len: usize) -> Vec<f64> {
    if len == 0 {
        return Vec::new();
    }
    unsafe { slice::from_raw_parts(data, len) }.to_vec()
}

unsafe fn row_table(table: *const *const f64, rows: usize, cols: usize) -> Vec<Vec<f64>> {
    (0..rows)
        .map(|i| unsafe { flat(*table.add(i), cols) })
        .collect()
}

unsafe fn owned_str(text: *const c_char) -> String {
    if text.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned()
}

/// Copy an engine result into an owned value; `None` when every slot is empty.
///
/// # Safety
///
/// Non-null slots must point to engine data laid out for `rows x cols`.
pub unsafe fn value_from_raw(raw: &RawResult) -> Result<Option<EngineValue>, Error> {
    let rows = usize::try_from(raw.rows).unwrap_or(0);
    let cols = usize::try_from(raw.cols).unwrap_or(0);

    let value = unsafe {
        if !raw.imag.is_null() && !raw.real.is_null() {
            if cols == 1 {
                EngineValue::complex_vector(flat(raw.real, rows), flat(raw.imag, rows))?
            } else {
                let re = row_table(raw.real as *const *const f64, rows, cols);
                let im = row_table(raw.imag as *const *const f64, rows, cols);
                EngineValue::complex_matrix(
                    EngineMatrix::from_lines(re, Orientation::Rows)?,
                    EngineMatrix::from_lines(im, Orientation::Rows)?,
                )?
            }
        } else if !raw.real.is_null() {
            if cols == 1 {
                EngineValue::RealVector(flat(raw.real, rows))
            } else {
                let lines = row_table(raw.real as *const *const f64, rows, cols);
                EngineValue::RealMatrix(EngineMatrix::from_lines(lines, Orientation::Rows)?)
            }
        } else if !raw.strings.is_null() {
            if cols == 1 {
                let table = raw.strings as *const *const c_char;
                EngineValue::StringVector((0..rows).map(|i| owned_str(*table.add(i))).collect())
            } else {
                let table = raw.strings as *const *const *const c_char;
                let lines = (0..rows)
                    .map(|i| {
                        let row = *table.add(i);
                        (0..cols).map(|j| owned_str(*row.add(j))).collect()
                    })
                    .collect();
                EngineValue::StringMatrix(EngineMatrix::from_lines(lines, Orientation::Rows)?)
            }
        } else {
            return Ok(None);
        }
    };
    Ok(Some(value))
}

/// Engine allocation list the lowered blocks are handed to.
#[derive(Debug, Clone, Copy)]
pub struct AllocationTracker {
    pub record: RecordAllocationFn,
    pub memory: *mut c_void,
}

/// Blocks allocated for one lowering; freed on drop unless handed over.
///
/// `allocations` describes the blocks in marshaling order: a line table is
/// listed before its lines.
#[derive(Default)]
struct Blocks {
    blocks: Vec<*mut c_void>,
    allocations: Vec<Allocation>,
}

impl Blocks {
    fn copy<T: Copy>(&mut self, kind: AllocationKind, items: &[T]) -> Result<*mut T, Error> {
        let bytes = mem::size_of_val(items).max(mem::size_of::<T>());
        // SAFETY: plain allocation, checked for NULL below.
        let block = unsafe { libc::malloc(bytes) };
        if block.is_null() {
            return Err(Error::AllocationFailure(format!("{} bytes", bytes)));
        }
        self.blocks.push(block);
        self.allocations.push(Allocation {
            kind,
            len: items.len(),
        });
        let typed = block as *mut T;
        // SAFETY: `block` holds at least `items.len()` elements of `T`.
        unsafe { ptr::copy_nonoverlapping(items.as_ptr(), typed, items.len()) };
        Ok(typed)
    }

    fn table(&mut self, matrix: &EngineMatrix<f64>) -> Result<*mut c_void, Error> {
        let first = self.allocations.len();
        let lines = matrix
            .lines()
            .iter()
            .map(|line| self.copy(AllocationKind::Line, line))
            .collect::<Result<Vec<*mut f64>, Error>>()?;
        let table = self.copy(AllocationKind::LineTable, &lines)?;
        if let Some(entry) = self.allocations.pop() {
            self.allocations.insert(first, entry);
        }
        Ok(table as *mut c_void)
    }

    fn hand_over(mut self) -> (Vec<*mut c_void>, Vec<Allocation>) {
        (mem::take(&mut self.blocks), mem::take(&mut self.allocations))
    }
}

impl Drop for Blocks {
    fn drop(&mut self) {
        for &block in &self.blocks {
            // SAFETY: every block came from `libc::malloc` and was not handed over.
            unsafe { libc::free(block) };
        }
    }
}

/// Lower an engine value into `malloc`ed engine memory.
///
/// With a tracker every block is recorded in the engine allocation list;
/// without one the engine owns the blocks outright. `recorder` receives one
/// entry per block handed over. Nothing leaks on failure.
pub fn lower(
    value: &EngineValue,
    tracker: Option<AllocationTracker>,
    recorder: Option<&mut dyn AllocationRecorder>,
) -> Result<RawArray, Error> {
    let mut blocks = Blocks::default();
    let mut raw = RawArray::default();

    match value {
        EngineValue::RealScalar(v) => {
            raw.type_code = RAW_SCALAR;
            raw.elements = 1;
            raw.scalar = *v;
        }
        EngineValue::RealVector(v) => {
            raw.type_code = RAW_REAL;
            raw.ndims = 1;
            raw.dims = [v.len() as c_ulong, 1];
            raw.elements = v.len() as c_uint;
            raw.real = blocks.copy(AllocationKind::Buffer, v)? as *mut c_void;
        }
        EngineValue::RealMatrix(m) => {
            raw.type_code = RAW_REAL;
            raw.ndims = 2;
            raw.dims = [m.rows() as c_ulong, m.cols() as c_ulong];
            raw.elements = m.len() as c_uint;
            raw.real = blocks.table(m)?;
        }
        EngineValue::ComplexMatrix { re, im } => {
            raw.type_code = RAW_COMPLEX;
            raw.ndims = 2;
            raw.dims = [re.rows() as c_ulong, re.cols() as c_ulong];
            raw.elements = re.len() as c_uint;
            raw.real = blocks.table(re)?;
            raw.imag = blocks.table(im)?;
        }
        other => {
            return Err(Error::UnsupportedType(format!(
                "{} values can not be handed to the simulator",
                other.type_name()
            )));
        }
    }

    let (handed, allocations) = blocks.hand_over();
    if let Some(tracker) = tracker {
        for block in handed {
            // SAFETY: the engine takes ownership of the block.
            unsafe { (tracker.record)(tracker.memory, block) };
        }
    }
    if let Some(recorder) = recorder {
        for allocation in allocations {
            recorder.record(allocation);
        }
    }
    Ok(raw)
}
