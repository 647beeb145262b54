use nalgebra::DMatrix;

/// Concatenates matrices with the same row count side by side.
pub fn hstack(parts: &[&DMatrix<f64>]) -> DMatrix<f64> {
    let rows = parts.first().map_or(0, |m| m.nrows());
    let cols = parts.iter().map(|m| m.ncols()).sum();
    let mut out = DMatrix::zeros(rows, cols);
    let mut offset = 0;
    for part in parts {
        debug_assert_eq!(part.nrows(), rows, "hstack row count mismatch");
        out.view_mut((0, offset), (rows, part.ncols())).copy_from(*part);
        offset += part.ncols();
    }
    out
}

/// Builds a matrix whose row `k` is row `indices[k]` of `source`.
pub fn gather_rows(source: &DMatrix<f64>, indices: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(indices.len(), source.ncols(), |row, col| {
        source[(indices[row], col)]
    })
}

/// Repeats a single-row matrix `count` times.
pub fn broadcast_row(row: &DMatrix<f64>, count: usize) -> DMatrix<f64> {
    debug_assert_eq!(row.nrows(), 1, "broadcast_row expects a single row");
    DMatrix::from_fn(count, row.ncols(), |_, col| row[(0, col)])
}

/// Averages the rows of `values` grouped by `index` into `num_groups` rows.
///
/// Groups that receive no rows are zero.
pub fn scatter_mean(values: &DMatrix<f64>, index: &[usize], num_groups: usize) -> DMatrix<f64> {
    let mut sums = DMatrix::zeros(num_groups, values.ncols());
    let mut counts = vec![0usize; num_groups];
    for (row, &group) in index.iter().enumerate() {
        let mut target = sums.row_mut(group);
        target += values.row(row);
        counts[group] += 1;
    }
    for (group, &count) in counts.iter().enumerate() {
        if count > 0 {
            sums.row_mut(group).scale_mut(1.0 / count as f64);
        }
    }
    sums
}

/// Mean over all rows as a single-row matrix; zero when there are no rows.
pub fn mean_rows(values: &DMatrix<f64>) -> DMatrix<f64> {
    if values.nrows() == 0 {
        return DMatrix::zeros(1, values.ncols());
    }
    DMatrix::from_fn(1, values.ncols(), |_, col| values.column(col).mean())
}

/// Numerically stable softmax of a slice.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|x| (x - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}
