//! Property tests: round-trip across chunk boundaries and truncate
//! idempotence for arbitrary chunk sizes and write splits.

use proptest::prelude::*;

use rill_core::{ChannelIdx, FrameCount, FrameIdx, Interleaved, SampleFormat};
use rill_engine::{EngineConfig, RealtimeReader, StorageEngine};
use rill_test_utils::{deinterleave, ramp, ramp_from};

fn engine(frames_per_chunk: u32) -> StorageEngine {
    StorageEngine::new(EngineConfig {
        frames_per_chunk,
        prewarm_chunks: 0,
        max_chunks: 4096,
        max_handles: 2,
        canary: Some(-1.0),
        ..EngineConfig::default()
    })
    .unwrap()
}

fn channel(reader: &RealtimeReader, h: rill_core::BufferHandle, ch: u32) -> Vec<f32> {
    let view = reader.read_for_realtime(h).unwrap();
    let mut out = vec![0.0; view.frames().as_usize()];
    view.read(ChannelIdx(ch), FrameIdx(0), &mut out);
    out
}

proptest! {
    #[test]
    fn appends_round_trip(
        fpc in 1u32..17,
        channels in 1u32..4,
        parts in prop::collection::vec(0usize..50, 1..8),
    ) {
        let e = engine(fpc);
        let format = SampleFormat::new(channels, 48_000).unwrap();
        let h = e.allocate_handle(format).unwrap();
        let mut reader = e.realtime_reader().unwrap();

        let mut written = 0;
        for len in &parts {
            let block = ramp_from(written, *len, channels as usize);
            e.append(h, Interleaved::new(format, &block)).unwrap();
            written += len;
            // Interleave reclamation with the writes.
            reader.checkpoint();
            e.maintain();
        }

        reader.checkpoint();
        let expected = ramp(written, channels as usize);
        for ch in 0..channels {
            prop_assert_eq!(
                channel(&reader, h, ch),
                deinterleave(&expected, channels as usize, ch as usize)
            );
        }
        let view = reader.read_for_realtime(h).unwrap();
        prop_assert_eq!(view.frames(), FrameCount(written as u64));
        prop_assert_eq!(view.chunk_count(), written.div_ceil(fpc as usize));
    }

    #[test]
    fn truncate_twice_same_result(
        fpc in 1u32..9,
        len in 0usize..60,
        cut_ratio in 0.0f64..=1.0,
    ) {
        let e = engine(fpc);
        let h = e.allocate_handle(SampleFormat::mono(1)).unwrap();
        let mut reader = e.realtime_reader().unwrap();
        e.append(h, Interleaved::mono(1, &ramp(len, 1))).unwrap();
        let cut = (len as f64 * cut_ratio) as u64;

        prop_assert_eq!(e.truncate(h, FrameCount(cut)), Ok(FrameCount(cut)));
        reader.checkpoint();
        let once = channel(&reader, h, 0);
        e.maintain();

        prop_assert_eq!(e.truncate(h, FrameCount(cut)), Ok(FrameCount(cut)));
        reader.checkpoint();
        let twice = channel(&reader, h, 0);
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(once, ramp(cut as usize, 1));
    }

    #[test]
    fn pool_balances_after_flush(
        fpc in 1u32..9,
        ops in prop::collection::vec((0u8..3, 0usize..30), 1..20),
    ) {
        let e = engine(fpc);
        let h = e.allocate_handle(SampleFormat::mono(1)).unwrap();
        let mut reader = e.realtime_reader().unwrap();
        reader.checkpoint();
        for (kind, n) in ops {
            let block = ramp(n, 1);
            match kind {
                0 => { e.append(h, Interleaved::mono(1, &block)).unwrap(); }
                1 => { e.replace(h, Interleaved::mono(1, &block)).unwrap(); }
                _ => {
                    let cur = e.frames(h).unwrap().0;
                    e.truncate(h, FrameCount(cur.min(n as u64))).unwrap();
                }
            }
        }
        e.flush(&mut reader);
        let live = e.frames(h).unwrap().as_usize().div_ceil(fpc as usize);
        let stats = e.stats();
        prop_assert_eq!(stats.retired_pending, 0);
        prop_assert_eq!(stats.chunks_in_use, live);
    }
}
