//! Conversion between interleaved frames and channel-major blocks.
//!
//! For `frames` frames of `channels` channels, sample `(frame, channel)` sits at
//! `frame * channels + channel` when interleaved and at
//! `frame + frames * channel` when channel-major.

/// Splits interleaved `src` into channel-major `dst`.
///
/// # Panics
///
/// Panics if either buffer holds fewer than `frames * channels` samples.
pub fn deinterleave(src: &[f32], dst: &mut [f32], frames: usize, channels: usize) {
    let len = frames * channels;
    let (src, dst) = (&src[..len], &mut dst[..len]);
    for (frame, samples) in src.chunks_exact(channels).enumerate() {
        for (channel, &sample) in samples.iter().enumerate() {
            dst[frame + frames * channel] = sample;
        }
    }
}

/// Merges channel-major `src` into interleaved `dst`.
///
/// # Panics
///
/// Panics if either buffer holds fewer than `frames * channels` samples.
pub fn interleave(src: &[f32], dst: &mut [f32], frames: usize, channels: usize) {
    let len = frames * channels;
    let (src, dst) = (&src[..len], &mut dst[..len]);
    for (frame, samples) in dst.chunks_exact_mut(channels).enumerate() {
        for (channel, sample) in samples.iter_mut().enumerate() {
            *sample = src[frame + frames * channel];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn stereo_layouts() {
        let interleaved = [0.0, 10.0, 1.0, 11.0, 2.0, 12.0];
        let mut planar = [0.0f32; 6];
        deinterleave(&interleaved, &mut planar, 3, 2);
        assert_eq!(planar, [0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);

        let mut back = [0.0f32; 6];
        interleave(&planar, &mut back, 3, 2);
        assert_eq!(back, interleaved);
    }

    #[test]
    fn only_the_block_prefix_is_touched() {
        let interleaved = [1.0, 2.0, 3.0, 4.0, 99.0];
        let mut planar = [-1.0f32; 5];
        deinterleave(&interleaved, &mut planar, 2, 2);
        assert_eq!(planar, [1.0, 3.0, 2.0, 4.0, -1.0]);
    }

    proptest! {
        #[test]
        fn round_trip_is_identity(
            (frames, channels, samples) in (1usize..64, 1usize..=16)
                .prop_flat_map(|(frames, channels)| {
                    let samples = prop::collection::vec(any::<f32>(), frames * channels);
                    (Just(frames), Just(channels), samples)
                })
        ) {
            let mut planar = vec![0.0f32; samples.len()];
            let mut back = vec![0.0f32; samples.len()];
            deinterleave(&samples, &mut planar, frames, channels);
            interleave(&planar, &mut back, frames, channels);
            let bits = |values: &[f32]| values.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
            prop_assert_eq!(bits(&back), bits(&samples));
        }
    }
}
