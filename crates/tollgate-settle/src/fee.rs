/// Settlement fee for a transaction of `size_bytes`, at `fee_rate_per_kb`
/// base units per 1000 bytes. Rounds up so the paid rate never undercuts
/// the configured rate.
pub fn fee_for_size(size_bytes: usize, fee_rate_per_kb: u64) -> u64 {
    let size = size_bytes as u64;
    (size * fee_rate_per_kb).div_ceil(1_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_up_to_the_rate() {
        assert_eq!(fee_for_size(1_000, 1_000), 1_000);
        assert_eq!(fee_for_size(1_001, 1_000), 1_002);
        assert_eq!(fee_for_size(1, 1_000), 1);
        assert_eq!(fee_for_size(999, 1_000), 999);
    }

    #[test]
    fn zero_rate_means_zero_fee() {
        assert_eq!(fee_for_size(4_096, 0), 0);
    }
}
