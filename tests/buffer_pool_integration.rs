//! Buffer pool behaviour across handles and threads

mod common;

use operator_flow::graph::{ImageFrame, Value};
use operator_flow::pool::{BufferPool, BufferShape, ReturnOutcome};
use proptest::prelude::*;
use std::thread;

#[test]
fn test_capacity_two_discards_third_return() {
    let pool = BufferPool::new(8);
    let shape = BufferShape::rgb8(640, 480);
    pool.set_shape_capacity(shape, 2);

    let buffers: Vec<_> = (0..3).map(|_| pool.rent(shape).into_inner()).collect();
    let outcomes: Vec<_> = buffers
        .into_iter()
        .map(|buffer| {
            let outcome = pool.return_buffer(buffer);
            assert!(pool.idle_count(shape) <= 2);
            outcome
        })
        .collect();

    assert_eq!(
        outcomes,
        [
            ReturnOutcome::Retained,
            ReturnOutcome::Retained,
            ReturnOutcome::Discarded
        ]
    );

    let stats = pool.statistics();
    assert_eq!(stats.rent_count, 3);
    assert_eq!(stats.create_count, 3);
    assert_eq!(stats.return_count, 3);
    assert_eq!(stats.discard_count, 1);
    assert_eq!(stats.idle_count, 2);
}

#[test]
fn test_frame_handles_share_one_buffer() {
    let pool = BufferPool::new(4);
    let shape = BufferShape::gray8(16, 16);

    let frame = ImageFrame::from_pooled(pool.rent(shape));
    let value = Value::Image(frame.clone());
    let copy = value.clone();
    assert_eq!(frame.handle_count(), 3);

    drop(value);
    drop(frame);
    assert_eq!(pool.idle_count(shape), 0);

    drop(copy);
    assert_eq!(pool.idle_count(shape), 1);
}

#[test]
fn test_concurrent_rent_and_return() {
    let pool = BufferPool::new(4);
    let shapes = [BufferShape::gray8(32, 32), BufferShape::rgb8(32, 32)];

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let pool = pool.clone();
            let shape = shapes[i % shapes.len()];
            thread::spawn(move || {
                for _ in 0..200 {
                    let mut buffer = pool.rent(shape);
                    assert!(buffer.as_slice().iter().all(|&b| b == 0));
                    buffer.as_mut_slice()[0] = 0xFF;
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let stats = pool.statistics();
    assert_eq!(stats.rent_count, 1600);
    assert!(stats.create_count <= stats.rent_count);
    assert_eq!(stats.return_count, 1600);
    for shape in shapes {
        assert!(pool.idle_count(shape) <= 4);
    }
    assert_eq!(stats.distinct_shapes, 2);
}

#[derive(Debug, Clone)]
enum PoolOp {
    Rent(usize),
    Return(usize),
}

fn pool_ops() -> impl Strategy<Value = Vec<PoolOp>> {
    prop::collection::vec(
        prop_oneof![
            (0usize..3).prop_map(PoolOp::Rent),
            (0usize..16).prop_map(PoolOp::Return),
        ],
        0..64,
    )
}

proptest! {
    #[test]
    fn test_clear_empties_every_shape(ops in pool_ops(), capacity in 0usize..4) {
        let pool = BufferPool::new(capacity);
        let shapes = [
            BufferShape::gray8(4, 4),
            BufferShape::gray8(8, 8),
            BufferShape::rgb8(4, 4),
        ];
        let mut checked_out = Vec::new();

        for op in ops {
            match op {
                PoolOp::Rent(i) => checked_out.push(pool.rent(shapes[i])),
                PoolOp::Return(i) if !checked_out.is_empty() => {
                    let buffer = checked_out.swap_remove(i % checked_out.len());
                    pool.return_buffer(buffer.into_inner());
                }
                PoolOp::Return(_) => {}
            }
            let stats = pool.statistics();
            prop_assert!(stats.create_count <= stats.rent_count);
            for shape in shapes {
                prop_assert!(pool.idle_count(shape) <= capacity);
            }
        }

        checked_out.clear();
        pool.clear();
        for shape in shapes {
            prop_assert_eq!(pool.idle_count(shape), 0);
        }
        prop_assert_eq!(pool.statistics().idle_count, 0);
    }
}
