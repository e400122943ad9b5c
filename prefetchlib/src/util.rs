use crate::cache::Operation;
use crate::trace::MemoryAccess;

/// A stream walking through memory with a fixed stride, every `write_every`th access a write
///
/// `write_every` of 0 gives a read-only stream
pub fn strided_trace(start: u32, stride: u32, count: usize, write_every: usize) -> Vec<MemoryAccess> {
    (0..count)
        .map(|i| {
            let address = start.wrapping_add(stride.wrapping_mul(i as u32));
            if write_every != 0 && i % write_every == write_every - 1 {
                MemoryAccess::write(address)
            } else {
                MemoryAccess::read(address)
            }
        })
        .collect()
}

/// Uniformly random references within `[0, span)`, reproducible for a given seed
pub fn random_trace(seed: u64, span: u32, count: usize) -> Vec<MemoryAccess> {
    let mut rng = fastrand::Rng::with_seed(seed);
    (0..count)
        .map(|_| {
            let address = rng.u32(0..span);
            if rng.bool() {
                MemoryAccess::write(address)
            } else {
                MemoryAccess::read(address)
            }
        })
        .collect()
}

/// Renders references in the trace file format
pub fn to_trace_text(accesses: &[MemoryAccess]) -> String {
    accesses
        .iter()
        .map(|access| {
            let op = match access.operation {
                Operation::Read => 'R',
                Operation::Write => 'W',
            };
            format!("{op} {:#010x}\n", access.address)
        })
        .collect()
}
