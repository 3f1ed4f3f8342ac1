use ndarray::{s, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Axis, ShapeBuilder};

use crate::prelude::{RadarError, RadarResult};

/// Wraps a row-major buffer with a leading dimension `lda >= cols`.
pub fn raw_view<T>(data: &[T], rows: usize, cols: usize, lda: usize) -> RadarResult<ArrayView2<'_, T>> {
    check_raw(data.len(), rows, cols, lda)?;
    ArrayView2::from_shape((rows, cols).strides((lda, 1)), data)
        .map_err(|e| RadarError::ArgumentInvalid(e.to_string()))
}

pub fn raw_view_mut<T>(
    data: &mut [T],
    rows: usize,
    cols: usize,
    lda: usize,
) -> RadarResult<ArrayViewMut2<'_, T>> {
    check_raw(data.len(), rows, cols, lda)?;
    ArrayViewMut2::from_shape((rows, cols).strides((lda, 1)), data)
        .map_err(|e| RadarError::ArgumentInvalid(e.to_string()))
}

fn check_raw(len: usize, rows: usize, cols: usize, lda: usize) -> RadarResult<()> {
    if cols > lda {
        return Err(RadarError::ArgumentInvalid(format!(
            "lda {} smaller than cols {}",
            lda, cols
        )));
    }
    let needed = if rows == 0 { 0 } else { (rows - 1) * lda + cols };
    if needed > len {
        return Err(RadarError::ArgumentOutOfBounds(format!(
            "buffer of {} elements cannot hold {}x{} with lda {}",
            len, rows, cols, lda
        )));
    }
    Ok(())
}

fn check_window(
    shape: (usize, usize),
    row_offset: usize,
    col_offset: usize,
    rows: usize,
    cols: usize,
) -> RadarResult<()> {
    if row_offset + rows > shape.0 || col_offset + cols > shape.1 {
        return Err(RadarError::ArgumentOutOfBounds(format!(
            "sub view {}+{} x {}+{} exceeds {:?}",
            row_offset, rows, col_offset, cols, shape
        )));
    }
    Ok(())
}

/// Rectangular window into a matrix.
pub fn sub_view<'a, T>(
    matrix: ArrayView2<'a, T>,
    row_offset: usize,
    col_offset: usize,
    rows: usize,
    cols: usize,
) -> RadarResult<ArrayView2<'a, T>> {
    check_window(matrix.dim(), row_offset, col_offset, rows, cols)?;
    Ok(matrix.slice_move(s![
        row_offset..row_offset + rows,
        col_offset..col_offset + cols
    ]))
}

pub fn sub_view_mut<'a, T>(
    matrix: ArrayViewMut2<'a, T>,
    row_offset: usize,
    col_offset: usize,
    rows: usize,
    cols: usize,
) -> RadarResult<ArrayViewMut2<'a, T>> {
    check_window(matrix.dim(), row_offset, col_offset, rows, cols)?;
    Ok(matrix.slice_move(s![
        row_offset..row_offset + rows,
        col_offset..col_offset + cols
    ]))
}

/// Row `index` as a vector whose stride is the matrix column stride.
pub fn row_view<T>(matrix: ArrayView2<'_, T>, index: usize) -> RadarResult<ArrayView1<'_, T>> {
    check_index("row", index, matrix.nrows())?;
    Ok(matrix.index_axis_move(Axis(0), index))
}

pub fn row_view_mut<T>(matrix: ArrayViewMut2<'_, T>, index: usize) -> RadarResult<ArrayViewMut1<'_, T>> {
    check_index("row", index, matrix.nrows())?;
    Ok(matrix.index_axis_move(Axis(0), index))
}

/// Column `index` as a vector whose stride is the matrix row stride.
pub fn col_view<T>(matrix: ArrayView2<'_, T>, index: usize) -> RadarResult<ArrayView1<'_, T>> {
    check_index("column", index, matrix.ncols())?;
    Ok(matrix.index_axis_move(Axis(1), index))
}

pub fn col_view_mut<T>(matrix: ArrayViewMut2<'_, T>, index: usize) -> RadarResult<ArrayViewMut1<'_, T>> {
    check_index("column", index, matrix.ncols())?;
    Ok(matrix.index_axis_move(Axis(1), index))
}

/// Matrix view of a cube along `axis` (0 = row, 1 = column, 2 = slice).
pub fn cube_view<T>(
    cube: ndarray::ArrayView3<'_, T>,
    axis: usize,
    index: usize,
) -> RadarResult<ArrayView2<'_, T>> {
    if axis > 2 {
        return Err(RadarError::ArgumentInvalid(format!("cube axis {}", axis)));
    }
    check_index("cube", index, cube.len_of(Axis(axis)))?;
    Ok(cube.index_axis_move(Axis(axis), index))
}

pub fn cube_view_mut<T>(
    cube: ndarray::ArrayViewMut3<'_, T>,
    axis: usize,
    index: usize,
) -> RadarResult<ArrayViewMut2<'_, T>> {
    if axis > 2 {
        return Err(RadarError::ArgumentInvalid(format!("cube axis {}", axis)));
    }
    check_index("cube", index, cube.len_of(Axis(axis)))?;
    Ok(cube.index_axis_move(Axis(axis), index))
}

fn check_index(what: &str, index: usize, len: usize) -> RadarResult<()> {
    if index >= len {
        Err(RadarError::IndexOutOfBounds(format!(
            "{} index {} >= {}",
            what, index, len
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::MatrixR;
    use ndarray::Array3;

    #[test]
    fn row_view_writes_are_visible_in_parent() {
        let mut matrix = MatrixR::zeros((3, 4));
        {
            let mut row = row_view_mut(matrix.view_mut(), 1).unwrap();
            row[2] = 7.5;
        }
        assert_eq!(matrix[[1, 2]], 7.5);

        matrix[[2, 3]] = -1.0;
        let row = row_view(matrix.view(), 2).unwrap();
        assert_eq!(row[3], -1.0);
        assert_eq!(row.strides(), &[1]);
    }

    #[test]
    fn column_view_uses_row_stride() {
        let mut matrix = MatrixR::zeros((3, 4));
        {
            let mut col = col_view_mut(matrix.view_mut(), 3).unwrap();
            col[1] = 2.0;
        }
        assert_eq!(matrix[[1, 3]], 2.0);
        assert_eq!(col_view(matrix.view(), 0).unwrap().strides(), &[4]);
    }

    #[test]
    fn dropping_a_view_keeps_parent_storage() {
        let matrix = MatrixR::from_elem((2, 2), 3.0);
        {
            let view = sub_view(matrix.view(), 0, 0, 1, 2).unwrap();
            assert_eq!(view.sum(), 6.0);
        }
        assert_eq!(matrix.sum(), 12.0);
    }

    #[test]
    fn raw_view_honours_leading_dimension() {
        let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let view = raw_view(&data, 3, 2, 4).unwrap();
        assert_eq!(view[[1, 0]], 4.0);
        assert_eq!(view[[2, 1]], 9.0);
        assert!(raw_view(&data, 4, 2, 4).is_err());
        assert!(raw_view(&data, 2, 5, 4).is_err());
    }

    #[test]
    fn sub_view_mut_aliases_parent() {
        let mut matrix = MatrixR::zeros((4, 4));
        {
            let mut window = sub_view_mut(matrix.view_mut(), 1, 2, 2, 2).unwrap();
            window.fill(1.0);
        }
        assert_eq!(matrix.sum(), 4.0);
        assert_eq!(matrix[[2, 3]], 1.0);
        assert!(sub_view(matrix.view(), 3, 3, 2, 1).is_err());
    }

    #[test]
    fn cube_slices_are_matrices() {
        let mut cube = Array3::<f32>::zeros((2, 3, 4));
        {
            let mut slice = cube_view_mut(cube.view_mut(), 2, 1).unwrap();
            slice[[1, 2]] = 5.0;
        }
        assert_eq!(cube[[1, 2, 1]], 5.0);
        let row = cube_view(cube.view(), 0, 1).unwrap();
        assert_eq!(row.dim(), (3, 4));
        assert!(cube_view(cube.view(), 1, 3).is_err());
    }
}
