use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Custom epoch: 2024-01-01T00:00:00Z in milliseconds since Unix epoch.
const TALENTS_EPOCH_MS: u64 = 1_704_067_200_000;

const SEQUENCE_BITS: u64 = 16;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1; // 65535

struct State {
    last_ms: u64,
    sequence: u64,
}

/// Time-ordered 64-bit chat message ID generator.
///
/// Layout (MSB → LSB):
/// - Bits 63-16: Timestamp (48 bits), ms since Trade Talents epoch
/// - Bits 15-0:  Sequence (16 bits), per-ms counter, max 65536/ms
///
/// The relay runs as a single process and message ids only have to be unique
/// within it, so no worker bits are reserved. Ids sort by creation time.
pub struct MessageIdGenerator {
    state: Mutex<State>,
}

impl MessageIdGenerator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                last_ms: 0,
                sequence: 0,
            }),
        }
    }

    pub fn generate(&self) -> u64 {
        let mut state = self.state.lock().unwrap();

        let mut now_ms = current_ms();

        if now_ms < state.last_ms {
            panic!(
                "Clock moved backwards: last_ms={}, now_ms={}",
                state.last_ms, now_ms
            );
        }

        if now_ms == state.last_ms {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                // Sequence exhausted for this millisecond; spin-wait.
                while now_ms == state.last_ms {
                    now_ms = current_ms();
                }
            }
        } else {
            state.sequence = 0;
        }

        state.last_ms = now_ms;

        ((now_ms - TALENTS_EPOCH_MS) << SEQUENCE_BITS) | state.sequence
    }
}

fn current_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before Unix epoch")
        .as_millis() as u64
}

/// Extract the creation timestamp (ms since Unix epoch) from a message ID.
pub fn message_timestamp_ms(id: u64) -> u64 {
    (id >> SEQUENCE_BITS) + TALENTS_EPOCH_MS
}
