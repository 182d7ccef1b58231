pub mod chunk_queue;
pub mod handoff;
