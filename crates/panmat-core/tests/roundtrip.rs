//! Integration tests for host/engine marshaling.

use panmat_core::{
    AllocationKind, AllocationLog, EngineValue, Error, HostArray, HostValue, to_engine, to_host,
};

fn pseudo_random(n: usize, seed: u64) -> Vec<f64> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 11) as f64 / (1u64 << 53) as f64 - 0.5
        })
        .collect()
}

#[test]
fn test_real_matrices_round_trip() {
    for (rows, cols) in [(2, 2), (3, 5), (7, 2), (1, 4), (4, 9)] {
        let data = pseudo_random(rows * cols, (rows * 31 + cols) as u64);
        let host = HostValue::Numeric(HostArray::matrix(rows, cols, data.clone()).unwrap());

        let engine = to_engine(host.clone(), None).unwrap();
        assert_eq!(engine.rows(), rows);
        assert_eq!(engine.cols(), cols);

        let back = to_host(&engine).unwrap();
        assert_eq!(back, host, "{}x{} did not round trip", rows, cols);
    }
}

#[test]
fn test_single_column_goes_through_vector_path() {
    let data = pseudo_random(6, 3);
    let engine = EngineValue::RealVector(data.clone());
    let host = to_host(&engine).unwrap();
    let array = host.as_array().unwrap();
    assert_eq!(array.shape(), &[6, 1]);
    assert_eq!(array.real_part(), data.as_slice());

    // The host-to-engine direction rejects n x 1 input.
    assert!(matches!(
        to_engine(host, None),
        Err(Error::UnsupportedType(_))
    ));
}

#[test]
fn test_complex_matrix_round_trip() {
    let (rows, cols) = (3, 4);
    let re = pseudo_random(rows * cols, 11);
    let im = pseudo_random(rows * cols, 12);
    let host = HostValue::Numeric(
        HostArray::from_complex(vec![rows, cols], re.clone(), im.clone()).unwrap(),
    );

    let mut log = AllocationLog::new();
    let engine = to_engine(host.clone(), Some(&mut log)).unwrap();
    assert!(engine.is_complex());
    // One table plus one line per column, for each part.
    assert_eq!(log.count(AllocationKind::LineTable), 2);
    assert_eq!(log.count(AllocationKind::Line), 2 * cols);

    for i in 0..rows {
        for j in 0..cols {
            let z = engine.complex_at(i, j).unwrap();
            assert_eq!(z.re, re[i + j * rows]);
            assert_eq!(z.im, im[i + j * rows]);
        }
    }

    assert_eq!(to_host(&engine).unwrap(), host);
}

#[test]
fn test_scalar_becomes_one_by_one() {
    let engine = to_engine(HostValue::from(3.25), None).unwrap();
    assert_eq!(engine, EngineValue::RealScalar(3.25));
    let host = to_host(&engine).unwrap();
    assert_eq!(host.as_array().unwrap().shape(), &[1, 1]);
}
