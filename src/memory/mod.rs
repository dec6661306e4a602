//! # Scratch Memory
//!
//! The record codec performs no heap allocation on its hot path. Offsets arrays
//! live on the stack for the common field count; anything larger comes from a
//! caller-supplied [`ScratchArena`], whose lifetime the caller controls.
//!
//! ```text
//! +---------------------------+      +-------------------------------+
//! | RecOffsets (stack)        |      | ScratchArena (caller-owned)   |
//! |  inline: [u32; 100]       | ---> |  spilled offsets (> 100 flds) |
//! |  spill: Option<&mut [u32]>|      |  record copies                |
//! +---------------------------+      +-------------------------------+
//! ```

mod arena;

pub use arena::ScratchArena;
