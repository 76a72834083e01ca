//! Framing: markers, packets, blocks, and the session state machine.
//!
//! The decoder drains audio samples from the shared FIFO through the
//! demodulator and feeds the recovered symbols to a small state machine:
//! sixteen symbols of marker decide between a data block and the end of
//! transmission, packets are CRC-checked as they complete, and validated
//! payloads accumulate until a whole block is ready for the caller.
//!
//! Everything here runs in the consumer context. The producer context
//! only touches the [`SampleSink`]: the sample FIFO plus two atomic flags
//! (abort, overflow). Every error is terminal for the session; after one,
//! [`Decoder::receive`] keeps returning [`Event::Error`] until
//! [`Decoder::reset`].

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};

use snafu::Snafu;
use tracing::{debug, warn};

use crate::demod::Demodulator;
use crate::fifo::{Consumer, Producer, RingBuffer};
use crate::hamming;
use crate::packet::{Block, Packet};

/// Symbols in a sync marker.
const MARKER_LENGTH: u32 = 16;

/// Marker announcing a data block.
pub const BLOCK_MARKER: u32 = 0xCCCC_CCCC;

/// Marker announcing the end of the transmission.
pub const END_MARKER: u32 = 0xF0F0_F0F0;

/// Why a session died.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
pub enum DecodeError {
    /// Sixteen sync symbols did not form a known marker, or the carrier
    /// disappeared mid-session.
    #[snafu(display("sync marker not recognized or carrier lost"))]
    Sync,

    /// A packet failed its CRC check after error correction.
    #[snafu(display("packet rejected by CRC check"))]
    Crc,

    /// The producer pushed into a full sample FIFO.
    #[snafu(display("sample fifo overflowed"))]
    Overflow,

    /// The caller raised the abort flag.
    #[snafu(display("decoding aborted"))]
    Abort,

    /// The sample budget passed to `receive` ran out.
    #[snafu(display("sample budget exhausted without progress"))]
    Timeout,

    /// The caller reported a failed external write of a finished block.
    #[snafu(display("block rejected by the external writer"))]
    PageWrite,
}

/// Rejected receiver configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
pub enum ConfigError {
    #[snafu(display("symbol rate must evenly divide the sample rate"))]
    RateRatio,

    #[snafu(display("sample rate over symbol rate must equal the compiled-in ratio"))]
    SamplesPerSymbol,

    #[snafu(display("packet size must be a positive multiple of four bytes"))]
    PacketSize,

    #[snafu(display("packet too large to protect with a 16-bit parity word"))]
    EccBudget,

    #[snafu(display("block size must be a whole number of packets"))]
    BlockSize,

    #[snafu(display("fifo capacity must be a power of two"))]
    FifoCapacity,
}

/// What a call to [`Decoder::receive`] produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The FIFO ran dry with nothing to report.
    None,
    /// A packet validated; the current block is still filling.
    PacketComplete,
    /// A block finished; read it with [`Decoder::block_data`] before the
    /// next `receive`.
    BlockComplete,
    /// The end marker arrived: the session is complete.
    End,
    /// The session died; see [`Decoder::error`].
    Error,
}

/// Receiver parameters, fixed for the lifetime of a [`Decoder`].
#[derive(Debug, Clone)]
pub struct Config {
    pub sample_rate: u32,
    pub symbol_rate: u32,
    /// Payload bytes per packet; must be a multiple of 4.
    pub packet_size: usize,
    /// Bytes per block; must be a multiple of `packet_size`.
    pub block_size: usize,
    /// Sample FIFO capacity; must be a power of two.
    pub fifo_capacity: usize,
    /// Seed chained into every packet CRC.
    pub crc_seed: u32,
    /// Whether packets carry the 16-bit Hamming parity word.
    pub ecc: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sample_rate: 48_000,
            symbol_rate: 6_000,
            packet_size: 256,
            block_size: 2048,
            fifo_capacity: 1024,
            crc_seed: 0,
            ecc: false,
        }
    }
}

struct Flags {
    abort: AtomicBool,
    overflow: AtomicBool,
}

/// Producer-side handle: the only part of the receiver the capture
/// context touches. Push never blocks; a full FIFO raises the overflow
/// flag, which the decoder turns into a terminal error.
pub struct SampleSink {
    samples: Producer<f32>,
    flags: Arc<Flags>,
}

impl SampleSink {
    pub fn push(&mut self, sample: f32) -> bool {
        if self.samples.push(sample) {
            true
        } else {
            self.flags.overflow.store(true, Ordering::Release);
            false
        }
    }

    /// Pushes all of `samples` or, when the FIFO cannot take them all,
    /// nothing — in which case the overflow flag is raised.
    pub fn push_slice(&mut self, samples: &[f32]) -> bool {
        if self.samples.push_slice(samples) {
            true
        } else {
            self.flags.overflow.store(true, Ordering::Release);
            false
        }
    }

    pub fn is_full(&self) -> bool {
        self.samples.is_full()
    }

    /// Asks the decoder to stop; it will fail with
    /// [`DecodeError::Abort`] on its next drain.
    pub fn abort(&self) {
        self.flags.abort.store(true, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Sync,
    Decode,
    Write,
    End,
    Error,
}

/// Consumer-side receiver at `M` samples per symbol.
pub struct Decoder<const M: usize> {
    samples: Consumer<f32>,
    flags: Arc<Flags>,
    demodulator: Demodulator<M>,
    state: State,
    error: Option<DecodeError>,
    sync_code: u32,
    sync_count: u32,
    packet: Packet,
    block: Block,
}

impl<const M: usize> Decoder<M> {
    /// Validates `config` and builds the decoder together with its
    /// producer-side [`SampleSink`].
    pub fn new(config: Config) -> Result<(Self, SampleSink), ConfigError> {
        if config.symbol_rate == 0 || config.sample_rate % config.symbol_rate != 0 {
            return Err(ConfigError::RateRatio);
        }
        if (config.sample_rate / config.symbol_rate) as usize != M {
            return Err(ConfigError::SamplesPerSymbol);
        }
        if config.packet_size == 0 || config.packet_size % 4 != 0 {
            return Err(ConfigError::PacketSize);
        }
        if config.ecc && (config.packet_size + 4) * 8 > hamming::MAX_DATA_BITS {
            return Err(ConfigError::EccBudget);
        }
        if config.block_size == 0 || config.block_size % config.packet_size != 0 {
            return Err(ConfigError::BlockSize);
        }
        if !config.fifo_capacity.is_power_of_two() {
            return Err(ConfigError::FifoCapacity);
        }

        let (producer, consumer) = RingBuffer::new(config.fifo_capacity);
        let flags = Arc::new(Flags {
            abort: AtomicBool::new(false),
            overflow: AtomicBool::new(false),
        });

        let decoder = Decoder {
            samples: consumer,
            flags: flags.clone(),
            demodulator: Demodulator::new(config.sample_rate),
            state: State::Sync,
            error: None,
            sync_code: 0,
            sync_count: 0,
            packet: Packet::new(config.packet_size, config.crc_seed, config.ecc),
            block: Block::new(config.block_size),
        };

        Ok((decoder, SampleSink { samples: producer, flags }))
    }

    /// Clears all session state for a fresh transmission. The sensed gain
    /// and level are rediscovered from scratch.
    pub fn reset(&mut self) {
        self.demodulator.sync_carrier(true);
        self.enter_sync();
        self.samples.flush();
        self.packet.reset();
        self.block.clear();
        self.flags.abort.store(false, Ordering::Release);
        self.flags.overflow.store(false, Ordering::Release);
        self.error = None;
    }

    /// Consumer-side abort, equivalent to [`SampleSink::abort`].
    pub fn abort(&mut self) {
        self.flags.abort.store(true, Ordering::Release);
    }

    /// The error that ended the session, if one has.
    pub fn error(&self) -> Option<DecodeError> {
        self.error
    }

    /// The finished block after [`Event::BlockComplete`].
    pub fn block_data(&self) -> &[u8] {
        self.block.data()
    }

    /// Records that the external write of the finished block failed.
    /// Call instead of the next `receive`; the session becomes terminal
    /// with [`DecodeError::PageWrite`].
    pub fn page_write_failed(&mut self) {
        self.fail(DecodeError::PageWrite);
    }

    /// Current input level as seen by the demodulator.
    pub fn signal_power(&self) -> f32 {
        self.demodulator.signal_power()
    }

    /// CRC computed over the most recent packet's payload. Together with
    /// [`Self::expected_crc`] this is the post-mortem for a
    /// [`DecodeError::Crc`] session.
    pub fn calculated_crc(&self) -> u32 {
        self.packet.calculated_crc()
    }

    /// CRC the most recent packet claimed for itself.
    pub fn expected_crc(&self) -> u32 {
        self.packet.expected_crc()
    }

    /// Drains the sample FIFO until something worth reporting happens or
    /// the FIFO runs dry. `timeout`, when given, bounds the number of
    /// samples drained by this call.
    ///
    /// After [`Event::BlockComplete`] the finished block stays readable
    /// until the next call, which discards it and starts hunting for the
    /// next marker.
    pub fn receive(&mut self, timeout: Option<usize>) -> Event {
        if self.state == State::Write {
            // The caller is done with the block: move past it. The carrier
            // resync deliberately keeps the sensed gain, and the FIFO is
            // flushed because everything buffered during the caller's
            // write belongs to the dead time between blocks.
            self.block.clear();
            self.demodulator.sync_carrier(false);
            self.samples.flush();
            self.packet.reset();
            self.enter_sync();
        }

        let mut elapsed = 0usize;

        loop {
            match self.state {
                State::End => return Event::End,
                State::Error => return Event::Error,
                _ => {}
            }

            if self.flags.abort.load(Ordering::Relaxed) {
                self.fail(DecodeError::Abort);
                return Event::Error;
            }
            if self.flags.overflow.load(Ordering::Relaxed) {
                self.fail(DecodeError::Overflow);
                return Event::Error;
            }

            while let Some(symbol) = self.demodulator.pop_symbol() {
                match self.state {
                    State::Sync => {
                        self.sync(symbol);
                        match self.state {
                            State::End => return Event::End,
                            State::Error => return Event::Error,
                            _ => {}
                        }
                    }
                    State::Decode => {
                        if let Some(event) = self.decode(symbol) {
                            return event;
                        }
                    }
                    _ => {}
                }
            }

            match self.samples.pop() {
                Some(sample) => {
                    self.demodulator.process(sample);
                    if self.demodulator.carrier_lost() {
                        self.fail(DecodeError::Sync);
                        return Event::Error;
                    }

                    elapsed += 1;
                    if let Some(budget) = timeout {
                        if elapsed >= budget {
                            self.fail(DecodeError::Timeout);
                            return Event::Error;
                        }
                    }
                }
                None => return Event::None,
            }
        }
    }

    fn enter_sync(&mut self) {
        self.state = State::Sync;
        self.sync_code = 0;
        self.sync_count = 0;
    }

    fn sync(&mut self, symbol: u8) {
        self.sync_code = (self.sync_code << 2) | u32::from(symbol);
        self.sync_count += 1;

        if self.sync_count < MARKER_LENGTH {
            return;
        }

        match self.sync_code {
            BLOCK_MARKER => {
                debug!("block marker");
                self.packet.reset();
                self.state = State::Decode;
            }
            END_MARKER => {
                debug!("end marker");
                self.state = State::End;
            }
            code => {
                warn!(code, "unrecognized sync marker");
                self.fail(DecodeError::Sync);
            }
        }
    }

    fn decode(&mut self, symbol: u8) -> Option<Event> {
        self.packet.write_symbol(symbol);

        if !self.packet.is_complete() {
            return None;
        }

        if !self.packet.validate() {
            self.fail(DecodeError::Crc);
            return Some(Event::Error);
        }

        self.block.append(self.packet.payload());
        self.packet.reset();

        if self.block.is_complete() {
            debug!("block complete");
            self.state = State::Write;
            Some(Event::BlockComplete)
        } else {
            Some(Event::PacketComplete)
        }
    }

    fn fail(&mut self, kind: DecodeError) {
        warn!(%kind, "session failed");
        self.state = State::Error;
        self.error = Some(kind);
    }
}
