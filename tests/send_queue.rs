use comque::protocol::{COMPACT_HEADER_SIZE, EXTENDED_HEADER_SIZE};
use comque::transport::COMBUF_CAPACITY;
use comque::{
    BufferMemoryManager, BufferPool, CollectingSink, DbrType, Error, FixedBuffer, Payload,
    PayloadRequest, PoolConfig, RequestCode, RequestHeader, SendQueue,
};
use proptest::prelude::*;

type Queue = SendQueue<BufferPool, CollectingSink>;

fn queue() -> Queue {
    SendQueue::new(BufferPool::default(), CollectingSink::new())
}

fn drain(queue: &mut Queue) -> Vec<FixedBuffer> {
    std::iter::from_fn(|| queue.pop_next_com_buf_to_send()).collect()
}

fn concat(buffers: &[FixedBuffer]) -> Vec<u8> {
    buffers
        .iter()
        .flat_map(|buffer| buffer.as_slice().iter().copied())
        .collect()
}

#[test]
fn version_and_create_channel_stream() {
    let mut queue = queue();

    queue.begin_msg();
    queue
        .insert_request_header(
            &RequestHeader {
                request: RequestCode::Version.as_u16(),
                payload_size: 0,
                data_type: 0,
                element_count: u32::from(comque::PROTOCOL_MINOR_VERSION),
                channel_id: 0,
                request_dependent: 0,
            },
            false,
        )
        .unwrap();
    queue.commit_msg();

    queue.begin_msg();
    queue
        .insert_request_with_payload(
            &PayloadRequest {
                request: RequestCode::CreateChannel.as_u16(),
                data_type: u32::from(DbrType::STRING.code()),
                element_count: 1,
                channel_id: 7,
                request_dependent: u32::from(comque::PROTOCOL_MINOR_VERSION),
                payload: Payload::String(b"ring:current"),
            },
            false,
        )
        .unwrap();
    queue.commit_msg();

    let bytes = concat(&drain(&mut queue));
    assert_eq!(bytes.len(), COMPACT_HEADER_SIZE * 2 + 16);
    assert_eq!(
        &bytes[..16],
        &[0, 0, 0, 0, 0, 0, 0, 13, 0, 0, 0, 0, 0, 0, 0, 0]
    );
    assert_eq!(
        &bytes[16..32],
        &[0, 18, 0, 16, 0, 0, 0, 1, 0, 0, 0, 7, 0, 0, 0, 13]
    );
    assert_eq!(&bytes[32..], b"ring:current\0\0\0\0");
}

#[test]
fn oversized_request_can_be_retried_with_extended_header() {
    let mut queue = queue();
    let samples: Vec<f32> = (0..40_000).map(|i| i as f32).collect();
    let request = PayloadRequest {
        request: RequestCode::Write.as_u16(),
        data_type: u32::from(DbrType::FLOAT.code()),
        element_count: 40_000,
        channel_id: 11,
        request_dependent: 2,
        payload: Payload::Float(&samples),
    };

    queue.begin_msg();
    let err = queue
        .insert_request_with_payload(&request, false)
        .unwrap_err();
    assert!(matches!(err, Error::OutOfBounds { .. }));
    assert_eq!(queue.occupied_bytes(), 0);

    queue.insert_request_with_payload(&request, true).unwrap();
    queue.commit_msg();
    assert_eq!(queue.occupied_bytes(), EXTENDED_HEADER_SIZE + 160_000);

    let buffers = drain(&mut queue);
    assert_eq!(
        buffers.len(),
        (EXTENDED_HEADER_SIZE + 160_000).div_ceil(COMBUF_CAPACITY)
    );
    let bytes = concat(&buffers);
    let decoded: Vec<f32> = bytes[EXTENDED_HEADER_SIZE..]
        .chunks_exact(4)
        .map(|chunk| f32::from_be_bytes(chunk.try_into().unwrap()))
        .collect();
    assert_eq!(decoded, samples);
}

#[test]
fn string_arrays_use_full_slots() {
    let mut queue = queue();
    let mut slots = vec![0u8; 2 * 40];
    slots[..3].copy_from_slice(b"one");
    slots[40..43].copy_from_slice(b"two");

    queue.begin_msg();
    queue
        .insert_request_with_payload(
            &PayloadRequest {
                request: RequestCode::Write.as_u16(),
                data_type: u32::from(DbrType::STRING.code()),
                element_count: 2,
                channel_id: 1,
                request_dependent: 0,
                payload: Payload::String(&slots),
            },
            false,
        )
        .unwrap();
    queue.commit_msg();

    let bytes = concat(&drain(&mut queue));
    assert_eq!(&bytes[2..4], &[0, 80]);
    assert_eq!(&bytes[16..], slots.as_slice());
}

/// Memory manager that refuses every allocation.
struct Exhausted;

impl BufferMemoryManager for Exhausted {
    fn allocate(&mut self) -> comque::Result<FixedBuffer> {
        Err(Error::AllocationFailed {
            outstanding: 0,
            limit: 0,
        })
    }

    fn release(&mut self, _buffer: FixedBuffer) {}
}

#[test]
fn allocation_failure_propagates() {
    let mut queue = SendQueue::new(Exhausted, CollectingSink::new());
    queue.begin_msg();
    assert!(matches!(
        queue.push_u16(1),
        Err(Error::AllocationFailed { .. })
    ));
    assert_eq!(queue.occupied_bytes(), 0);
    assert!(queue.pop_next_com_buf_to_send().is_none());
}

#[test]
fn borrowed_collaborators_outlive_queue() {
    let mut pool = BufferPool::new(PoolConfig::default());
    let mut sink = CollectingSink::new();
    {
        let mut queue = SendQueue::new(&mut pool, &mut sink);
        queue.begin_msg();
        queue.push_u32(0xCAFE_F00D).unwrap();
        queue.commit_msg();
        queue.flush();

        queue.begin_msg();
        queue.push_u32(1).unwrap();
        queue.commit_msg();
    }
    assert_eq!(sink.bytes(), [0xCA, 0xFE, 0xF0, 0x0D]);
    // Drained buffer left with the sink; the unflushed one came back on drop.
    assert_eq!(pool.outstanding(), 1);
    assert_eq!(pool.pooled(), 1);
}

/// Memory manager that reuses released buffers without emptying them.
#[derive(Default)]
struct FreeList {
    free: Vec<FixedBuffer>,
    handed_out: usize,
}

impl BufferMemoryManager for FreeList {
    fn allocate(&mut self) -> comque::Result<FixedBuffer> {
        self.handed_out += 1;
        Ok(self.free.pop().unwrap_or_default())
    }

    fn release(&mut self, buffer: FixedBuffer) {
        self.free.push(buffer);
    }
}

#[test]
fn custom_manager_may_hand_back_dirty_buffers() {
    let mut queue = SendQueue::new(FreeList::default(), CollectingSink::new());
    queue.begin_msg();
    queue.push_u32(0xDEAD_BEEF).unwrap();
    queue.commit_msg();
    queue.clear();
    assert_eq!(queue.memory_manager().free.len(), 1);

    queue.begin_msg();
    queue.push_u16(0x0102).unwrap();
    queue.commit_msg();
    assert_eq!(queue.occupied_bytes(), 2);

    let buffer = queue.pop_next_com_buf_to_send().unwrap();
    assert_eq!(buffer.as_slice(), [0x01, 0x02]);
    assert_eq!(queue.occupied_bytes(), 0);
    assert!(queue.pop_next_com_buf_to_send().is_none());
    assert_eq!(queue.memory_manager().handed_out, 2);
}

#[test]
fn bounded_pool_survives_repeated_flushes() {
    let pool = BufferPool::new(PoolConfig {
        max_pooled: 2,
        max_outstanding: Some(2),
    });
    let mut queue = SendQueue::new(pool, CollectingSink::new());
    let mut wire = Vec::new();

    for round in 0..6u32 {
        queue.begin_msg();
        queue.push_u32(round).unwrap();
        queue.commit_msg();
        assert_eq!(queue.flush(), 4);

        for buffer in queue.sink_mut().take() {
            wire.extend_from_slice(buffer.as_slice());
            queue.recycle(buffer);
        }
        assert_eq!(queue.memory_manager().outstanding(), 0);
    }
    assert_eq!(wire.len(), 24);
    assert_eq!(&wire[20..], &[0, 0, 0, 5]);
    assert_eq!(queue.stats().buffers_recycled, 6);

    // Without recycling, the ceiling is reached after two flushes.
    for _ in 0..2 {
        queue.begin_msg();
        queue.push_u32(7).unwrap();
        queue.commit_msg();
        queue.flush();
    }
    assert!(matches!(
        queue.push_u32(8),
        Err(Error::AllocationFailed {
            outstanding: 2,
            limit: 2
        })
    ));
}

#[derive(Debug, Clone)]
enum Op {
    U16(u16),
    U32(u32),
    Bytes(Vec<u8>),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<u16>().prop_map(Op::U16),
        any::<u32>().prop_map(Op::U32),
        prop::collection::vec(any::<u8>(), 0..40_000).prop_map(Op::Bytes),
    ]
}

fn apply(queue: &mut Queue, op: &Op, expected: &mut Vec<u8>) {
    match op {
        Op::U16(value) => {
            queue.push_u16(*value).unwrap();
            expected.extend_from_slice(&value.to_be_bytes());
        }
        Op::U32(value) => {
            queue.push_u32(*value).unwrap();
            expected.extend_from_slice(&value.to_be_bytes());
        }
        Op::Bytes(bytes) => {
            queue.push_string(bytes).unwrap();
            expected.extend_from_slice(bytes);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: rolling back an open message restores the pending count
    #[test]
    fn prop_rollback_restores_pending(
        committed in prop::collection::vec(op_strategy(), 0..4),
        rolled_back in prop::collection::vec(op_strategy(), 0..4),
    ) {
        let mut queue = queue();
        let mut expected = Vec::new();
        queue.begin_msg();
        for op in &committed {
            apply(&mut queue, op, &mut expected);
        }
        queue.commit_msg();
        let before = queue.occupied_bytes();

        queue.begin_msg();
        let mut discarded = Vec::new();
        for op in &rolled_back {
            apply(&mut queue, op, &mut discarded);
        }
        queue.begin_msg();

        prop_assert_eq!(queue.occupied_bytes(), before);
        let buffers = drain(&mut queue);
        prop_assert_eq!(concat(&buffers), expected);
    }

    /// Property: chunked pushes into an empty chain use the minimum buffers
    #[test]
    fn prop_chunking_preserves_order(values in prop::collection::vec(any::<i32>(), 0..20_000)) {
        let mut queue = queue();
        queue.begin_msg();
        queue.push_dbr_type(DbrType::LONG, Payload::Long(&values), values.len() as u32).unwrap();
        queue.commit_msg();

        let buffers = drain(&mut queue);
        prop_assert_eq!(buffers.len(), (values.len() * 4).div_ceil(COMBUF_CAPACITY));
        let decoded: Vec<i32> = concat(&buffers)
            .chunks_exact(4)
            .map(|chunk| i32::from_be_bytes(chunk.try_into().unwrap()))
            .collect();
        prop_assert_eq!(decoded, values);
    }

    /// Property: draining yields every committed byte and nothing in flight
    #[test]
    fn prop_drain_matches_committed_stream(
        messages in prop::collection::vec(prop::collection::vec(op_strategy(), 1..3), 1..5),
        open in prop::collection::vec(op_strategy(), 0..3),
    ) {
        let mut queue = queue();
        let mut expected = Vec::new();
        for message in &messages {
            queue.begin_msg();
            for op in message {
                apply(&mut queue, op, &mut expected);
            }
            queue.commit_msg();
        }
        queue.begin_msg();
        let mut in_flight = Vec::new();
        for op in &open {
            apply(&mut queue, op, &mut in_flight);
        }

        let buffers = drain(&mut queue);
        prop_assert!(buffers.iter().all(|buffer| !buffer.is_empty()));
        prop_assert_eq!(concat(&buffers), expected);
        prop_assert_eq!(queue.occupied_bytes(), 0);
    }
}
