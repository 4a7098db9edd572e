//! Error metrics shared by training evaluation and monitoring. Both return `None` for
//! empty input and for slices of different lengths.

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    let n = actual.len();
    if n == 0 || predicted.len() != n {
        return None;
    }
    let total: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum();
    Some(total / n as f64)
}

pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    let n = actual.len();
    if n == 0 || predicted.len() != n {
        return None;
    }
    let total: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    Some((total / n as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let actual = [1.0, 2.0, 3.0, 4.0];
        let predicted = [2.0, 2.0, 1.0, 4.0];
        assert_eq!(mean_absolute_error(&actual, &predicted), Some(0.75));
        assert_eq!(
            root_mean_squared_error(&actual, &predicted),
            Some((5.0f64 / 4.0).sqrt())
        );
    }

    #[test]
    fn test_empty() {
        assert_eq!(mean_absolute_error(&[], &[]), None);
        assert_eq!(root_mean_squared_error(&[1.0], &[]), None);
    }

    #[test]
    fn test_length_mismatch() {
        assert_eq!(mean_absolute_error(&[1.0, 2.0], &[1.0]), None);
        assert_eq!(root_mean_squared_error(&[1.0], &[1.0, 5.0]), None);
    }
}
