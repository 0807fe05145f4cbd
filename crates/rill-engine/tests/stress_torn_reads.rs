//! Stress test: concurrent writers never expose a torn descriptor.
//!
//! One writer thread cycles replace / append / truncate on a few handles and
//! calls `maintain()` after every write. The reader thread checkpoints,
//! copies each buffer out, and checks that every sample carries the stamp
//! of a single generation at its own frame index. Recycled chunks are
//! filled with a canary, so any read of a chunk reclaimed too early shows
//! up as a stamp mismatch.
//!
//! The writer and reader coordinate over crossbeam channels.

use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, TryRecvError};

use rill_core::{BufferHandle, ChannelIdx, FrameCount, FrameIdx, Interleaved, SampleFormat};
use rill_engine::{EngineConfig, MaintainerConfig, StorageEngine};
use rill_test_utils::{check_stamped, stamped};

const HANDLES: usize = 3;
const GENERATIONS: u32 = 600;
const MAX_FRAMES: usize = 96;

fn engine() -> StorageEngine {
    StorageEngine::new(EngineConfig {
        frames_per_chunk: 8,
        prewarm_chunks: 32,
        max_chunks: 4096,
        max_handles: HANDLES as u32,
        canary: Some(-1.0),
        ..EngineConfig::default()
    })
    .unwrap()
}

/// Length schedule for one generation: initial replace, appended tail,
/// truncation point. All three stay within `MAX_FRAMES`.
fn lengths(g: u32, h: usize) -> (usize, usize, usize) {
    let base = ((g as usize * 7 + h * 13) % 40) + 1;
    let extra = (g as usize * 5 + h * 3) % 41;
    let cut = (base + extra) * ((g as usize % 3) + 1) / 4;
    (base, extra, cut)
}

fn write_generation(engine: &StorageEngine, handle: BufferHandle, g: u32, h: usize) {
    let (base, extra, cut) = lengths(g, h);
    let head = stamped(g, 0, base);
    let tail = stamped(g, base, extra);
    retry(|| engine.replace(handle, Interleaved::mono(48_000, &head)));
    engine.maintain();
    retry(|| engine.append(handle, Interleaved::mono(48_000, &tail)));
    engine.maintain();
    retry(|| engine.truncate(handle, FrameCount(cut as u64)));
    engine.maintain();
}

fn retry<T>(mut op: impl FnMut() -> Result<T, rill_core::StoreError>) -> T {
    loop {
        match op() {
            Ok(v) => return v,
            Err(e) if e.is_retryable() => thread::yield_now(),
            Err(e) => panic!("writer failed: {e}"),
        }
    }
}

#[test]
fn reader_never_observes_torn_or_recycled_data() {
    let engine = engine();
    let handles: Vec<BufferHandle> = (0..HANDLES)
        .map(|_| engine.allocate_handle(SampleFormat::mono(48_000)).unwrap())
        .collect();

    let (stop_tx, stop_rx) = bounded::<()>(1);
    let (ready_tx, ready_rx) = bounded::<()>(1);

    let mut reader = engine.realtime_reader().unwrap();
    let reader_handles = handles.clone();
    let reader_thread = thread::Builder::new()
        .name("stress-reader".into())
        .spawn(move || {
            let mut scratch = vec![0.0f32; MAX_FRAMES * 2];
            let mut reads = 0u64;
            let mut blocks = 0u64;
            let _ = ready_tx.send(());
            loop {
                match stop_rx.try_recv() {
                    Err(TryRecvError::Empty) => {}
                    _ => break,
                }
                reader.checkpoint();
                blocks += 1;
                for &h in &reader_handles {
                    let Some(view) = reader.read_for_realtime(h) else {
                        continue;
                    };
                    let frames = view.frames().as_usize();
                    assert!(frames <= MAX_FRAMES, "frames {frames} out of range");
                    let out = &mut scratch[..frames];
                    let copied = view.read(ChannelIdx(0), FrameIdx(0), out);
                    assert_eq!(copied.as_usize(), frames);
                    if let Err(mismatch) = check_stamped(out) {
                        panic!("{h} v{} torn: {mismatch}", view.version());
                    }
                    reads += 1;
                }
                // Occasionally stop holding anything, like a paused stream.
                if blocks % 97 == 0 {
                    reader.park();
                }
            }
            (reads, blocks)
        })
        .unwrap();

    ready_rx.recv().unwrap();
    let writer_engine = engine.clone();
    let writer_handles = handles.clone();
    let writer_thread = thread::Builder::new()
        .name("stress-writer".into())
        .spawn(move || {
            for g in 0..GENERATIONS {
                for (i, &h) in writer_handles.iter().enumerate() {
                    write_generation(&writer_engine, h, g, i);
                }
            }
        })
        .unwrap();

    // A second maintenance source racing the writer's own passes.
    let maintainer = engine
        .spawn_maintainer(MaintainerConfig {
            interval: Duration::from_micros(200),
        })
        .unwrap();

    writer_thread.join().unwrap();
    stop_tx.send(()).unwrap();
    let (reads, blocks) = reader_thread.join().unwrap();
    maintainer.stop();

    assert!(blocks > 0);
    assert!(reads > 0, "reader never saw a buffer");

    // With the reader gone, everything retired is reclaimable.
    let report = engine.maintain();
    assert_eq!(report.still_pending, 0);
    let stats = engine.stats();
    let live: usize = handles
        .iter()
        .map(|&h| {
            engine
                .frames(h)
                .unwrap()
                .as_usize()
                .div_ceil(engine.frames_per_chunk())
        })
        .sum();
    assert_eq!(stats.chunks_in_use, live);
}

#[test]
fn concurrent_writers_on_one_handle_conflict_or_succeed() {
    const WORKERS: u32 = 4;
    const ROUNDS: u32 = 200;

    let engine = engine();
    let h = engine.allocate_handle(SampleFormat::mono(1)).unwrap();
    let created = engine.stats().global_epoch;
    let (go_tx, go_rx) = bounded::<()>(0);

    let workers: Vec<_> = (0..WORKERS)
        .map(|w| {
            let engine = engine.clone();
            let go_rx = go_rx.clone();
            thread::spawn(move || {
                let _ = go_rx.recv();
                let (mut ok, mut conflicts) = (0u64, 0u64);
                for g in 0..ROUNDS {
                    let block = stamped(w * ROUNDS + g, 0, 16);
                    match engine.replace(h, Interleaved::mono(1, &block)) {
                        Ok(n) => {
                            assert_eq!(n, FrameCount(16));
                            ok += 1;
                        }
                        Err(e) if e.is_retryable() => conflicts += 1,
                        Err(e) => panic!("unexpected {e}"),
                    }
                    engine.maintain();
                }
                (ok, conflicts)
            })
        })
        .collect();
    for _ in 0..workers.len() {
        go_tx.send(()).unwrap();
    }
    let (ok, conflicts) = workers
        .into_iter()
        .map(|w| w.join().unwrap())
        .fold((0, 0), |(a, b), (ok, c)| (a + ok, b + c));

    assert_eq!(ok + conflicts, u64::from(WORKERS * ROUNDS));
    assert!(ok > 0, "no replace ever succeeded");

    let mut reader = engine.realtime_reader().unwrap();
    reader.checkpoint();
    let view = reader.read_for_realtime(h).unwrap();
    // Version 1 is the empty buffer from allocation; each success adds one.
    assert_eq!(view.version(), 1 + ok);
    let mut out = vec![0.0; 16];
    view.read(ChannelIdx(0), FrameIdx(0), &mut out);
    assert!(check_stamped(&out).unwrap().is_some());
    // Every successful replace retired exactly one older version.
    assert!(engine.stats().global_epoch.0 >= created.0 + ok);
}

#[test]
fn observers_never_make_a_single_writer_fail() {
    const CYCLES: usize = 5_000;

    let engine = StorageEngine::new(EngineConfig {
        frames_per_chunk: 4,
        prewarm_chunks: 8,
        max_chunks: 64,
        max_handles: 1,
        ..EngineConfig::default()
    })
    .unwrap();
    let (stop_tx, stop_rx) = bounded::<()>(0);

    let observers: Vec<_> = (0..3)
        .map(|_| {
            let engine = engine.clone();
            let stop_rx = stop_rx.clone();
            thread::spawn(move || {
                let mut polls = 0u64;
                while let Err(TryRecvError::Empty) = stop_rx.try_recv() {
                    let _ = engine.state(BufferHandle(0));
                    let _ = engine.frames(BufferHandle(0));
                    let _ = engine.stats();
                    polls += 1;
                }
                polls
            })
        })
        .collect();

    // No reader is claimed, so every maintain reclaims the free at once and
    // the single slot is always available to the next allocation.
    let block = stamped(0, 0, 6);
    for _ in 0..CYCLES {
        let h = engine.allocate_handle(SampleFormat::mono(1)).unwrap();
        engine.append(h, Interleaved::mono(1, &block)).unwrap();
        engine.truncate(h, FrameCount(3)).unwrap();
        engine.free(h).unwrap();
        assert_eq!(engine.maintain().handles_released, 1);
    }

    drop(stop_tx);
    let polls: u64 = observers.into_iter().map(|o| o.join().unwrap()).sum();
    assert!(polls > 0);
    assert_eq!(engine.stats().chunks_in_use, 0);
}
