/// Arithmetic mean of the finite values, `None` when there are none
pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_skips_non_finite() {
        assert_eq!(mean(vec![1.0, 2.0, f64::NAN, 3.0]), Some(2.0));
        assert_eq!(mean(Vec::<f64>::new()), None);
    }
}
