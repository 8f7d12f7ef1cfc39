// =============================================================================
// Options-flow overlay -- synthetic put/call volume split
// =============================================================================
//
// Put and call volume are two independent draws of 30-50% of the candle's
// volume. They are not reconciled with each other or with `volume`; the
// overlay stands in for a real options-flow feed until one exists.
// =============================================================================

use rand::Rng;

/// Lower bound of the sampled share.
const SHARE_FLOOR: f64 = 0.3;
/// Width of the sampled share band.
const SHARE_SPREAD: f64 = 0.2;

/// `floor(volume * (0.3 + U * 0.2))` for one uniform draw `U` in `[0, 1)`.
pub fn sample_share<R: Rng + ?Sized>(volume: u64, rng: &mut R) -> u64 {
    let u: f64 = rng.gen();
    (volume as f64 * (SHARE_FLOOR + u * SHARE_SPREAD)).floor() as u64
}

/// Independent `(put_volume, call_volume)` samples for `volume`.
pub fn split_volume<R: Rng + ?Sized>(volume: u64, rng: &mut R) -> (u64, u64) {
    let put = sample_share(volume, rng);
    let call = sample_share(volume, rng);
    (put, call)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn zero_draw_gives_thirty_percent() {
        let mut rng = StepRng::new(0, 0);
        assert_eq!(split_volume(1_000, &mut rng), (300, 300));
    }

    #[test]
    fn shares_stay_in_band() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let (put, call) = split_volume(1_000, &mut rng);
            assert!((300..500).contains(&put), "put {put}");
            assert!((300..500).contains(&call), "call {call}");
        }
    }

    #[test]
    fn zero_volume_splits_to_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(split_volume(0, &mut rng), (0, 0));
    }
}
