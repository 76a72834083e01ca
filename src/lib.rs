//! Streaming QPSK receiver for audio-delivered firmware images.
//!
//! A host plays an encoded audio stream into a device's line input; this
//! crate turns the sampled audio back into validated, page-sized memory
//! images. The receiving side is split in two:
//!
//! - [`demod`] — the signal-processing chain: DC blocking, automatic gain,
//!   carrier recovery with a software PLL, carrier-rejection filtering and
//!   symbol-timing alignment, producing hard-decided two-bit symbols.
//! - [`decoder`] — the framing layer: marker synchronization, CRC-checked
//!   packets (optionally Hamming-protected) and fixed-size block assembly.
//!
//! Audio samples enter through a lock-free [`fifo`], so the producer may
//! run in an interrupt or DMA callback while [`Decoder::receive`] drains
//! from the main loop:
//!
//! ```
//! use audioboot::{Config, Decoder, Event};
//!
//! let config = Config::default();
//! let (mut decoder, mut sink) = Decoder::<8>::new(config).unwrap();
//!
//! // Producer side, possibly on another thread:
//! sink.push_slice(&[0.0; 64]);
//!
//! // Consumer side:
//! match decoder.receive(None) {
//!     Event::BlockComplete => { /* write decoder.block_data() to flash */ }
//!     Event::Error => { /* inspect decoder.error() */ }
//!     _ => {}
//! }
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod crc;
pub mod decoder;
pub mod demod;
pub mod fifo;
pub mod hamming;
pub mod packet;
pub mod simulation;

pub use decoder::{Config, ConfigError, DecodeError, Decoder, Event, SampleSink};
