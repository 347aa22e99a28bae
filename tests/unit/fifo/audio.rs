use super::*;

fn ramp(frames: usize, channels: usize, start: f32) -> Vec<f32> {
    (0..frames * channels).map(|i| start + i as f32).collect()
}

#[test]
fn round_trip_preserves_order() {
    let mut fifo = AudioFifo::new(2, 8);
    let input = ramp(8, 2, 0.0);
    fifo.push(&input).unwrap();
    let mut out = vec![0.0; 16];
    assert_eq!(fifo.pop(&mut out), 8);
    assert_eq!(out, input);
}

#[test]
fn overflow_rejects_whole_push() {
    let mut fifo = AudioFifo::new(1, 4);
    fifo.push(&[1.0, 2.0, 3.0]).unwrap();
    let err = fifo.push(&[4.0, 5.0]).unwrap_err();
    match err {
        MontageError::Overflow { requested, free } => {
            assert_eq!(requested, 2);
            assert_eq!(free, 1);
        }
        other => panic!("unexpected error {other:?}"),
    }
    // Nothing from the rejected push landed in the fifo.
    assert_eq!(fifo.available(), 3);
}

#[test]
fn pop_returns_fewer_when_starved() {
    let mut fifo = AudioFifo::new(1, 4);
    fifo.push(&[1.0, 2.0]).unwrap();
    let mut out = [9.0; 4];
    assert_eq!(fifo.pop(&mut out), 2);
    assert_eq!(out, [1.0, 2.0, 9.0, 9.0]);
    assert_eq!(fifo.pop(&mut out), 0);
}

#[test]
fn pop_block_zero_fills_and_reports_underrun() {
    let (mut w, mut r) = AudioFifo::new(1, 4).split();
    w.push(&[0.5]).unwrap();
    let mut block = AudioBlock::from_interleaved(1, vec![7.0; 3]).unwrap();
    let err = r.pop_block(&mut block).unwrap_err();
    assert!(err.is_fifo_condition());
    assert_eq!(block.samples(), &[0.5, 0.0, 0.0]);
}

#[test]
fn positions_survive_wraparound() {
    let mut fifo = AudioFifo::new(2, 3);
    let mut out = vec![0.0; 4];
    for round in 0..10 {
        fifo.push(&ramp(2, 2, round as f32)).unwrap();
        assert_eq!(fifo.pop(&mut out), 2);
    }
    assert_eq!(fifo.write_position(), 20);
    assert_eq!(fifo.read_position(), 20);
}

#[test]
fn skip_discards_and_advances_position() {
    let mut fifo = AudioFifo::new(1, 8);
    fifo.push(&[1.0, 2.0, 3.0, 4.0]).unwrap();
    assert_eq!(fifo.skip(3), 3);
    assert_eq!(fifo.skip(5), 1);
    assert_eq!(fifo.read_position(), 4);
    assert_eq!(fifo.available(), 0);
}

#[test]
fn set_size_resets_content_and_counters() {
    let mut fifo = AudioFifo::new(1, 4);
    fifo.push(&[1.0, 2.0]).unwrap();
    fifo.set_size(2, 16);
    assert_eq!(fifo.channels(), 2);
    assert_eq!(fifo.capacity(), 16);
    assert_eq!(fifo.available(), 0);
    assert_eq!(fifo.write_position(), 0);
}

#[test]
fn join_rejects_foreign_halves() {
    let (w1, _r1) = AudioFifo::new(1, 4).split();
    let (_w2, r2) = AudioFifo::new(1, 4).split();
    assert!(AudioFifo::join(w1, r2).is_err());
}

#[test]
fn halves_work_across_threads() {
    let (mut w, mut r) = AudioFifo::new(1, 64).split();
    let producer = std::thread::spawn(move || {
        let mut next = 0.0f32;
        while next < 1000.0 {
            if w.push(&[next]).is_ok() {
                next += 1.0;
            } else {
                std::thread::yield_now();
            }
        }
    });

    let mut expected = 0.0f32;
    let mut buf = [0.0f32; 16];
    while expected < 1000.0 {
        let n = r.pop(&mut buf);
        for s in &buf[..n] {
            assert_eq!(*s, expected);
            expected += 1.0;
        }
        if n == 0 {
            std::thread::yield_now();
        }
    }
    producer.join().unwrap();
}
