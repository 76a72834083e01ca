//! End-to-end decoding of conforming transmissions.


use audioboot::simulation::{noise, Modulator};
use audioboot::{Config, Decoder, Event};
use test_utils::{drive, init_test_tracing, test_pattern};

fn config() -> Config {
    Config::default()
}

#[test]
fn decodes_a_clean_block() {
    init_test_tracing();

    let data = test_pattern(2048);
    let signal = Modulator::new(&config()).encode(&data);

    let (mut decoder, mut sink) = Decoder::<8>::new(config()).unwrap();
    let (events, blocks) = drive(&mut decoder, &mut sink, &signal);

    // Seven packets fill the block; the eighth completes it.
    let packets = events
        .iter()
        .filter(|&&e| e == Event::PacketComplete)
        .count();
    assert_eq!(packets, 7);
    assert_eq!(
        events.iter().filter(|&&e| e == Event::BlockComplete).count(),
        1
    );
    assert_eq!(events.last(), Some(&Event::End));
    assert_eq!(decoder.error(), None);

    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0], data);
}

#[test]
fn decodes_through_20_db_of_noise() {
    init_test_tracing();

    let data = test_pattern(2048);
    let clean = Modulator::new(&config()).encode(&data);
    let signal = noise::awgn(&clean, 20.0, 0xA0D10);

    let (mut decoder, mut sink) = Decoder::<8>::new(config()).unwrap();
    let (events, blocks) = drive(&mut decoder, &mut sink, &signal);

    assert_eq!(events.last(), Some(&Event::End));
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0], data);
}

#[test]
fn decodes_a_multi_block_transmission() {
    init_test_tracing();

    let data = test_pattern(3 * 2048);
    let signal = Modulator::new(&config()).encode(&data);

    let (mut decoder, mut sink) = Decoder::<8>::new(config()).unwrap();
    let (events, blocks) = drive(&mut decoder, &mut sink, &signal);

    assert_eq!(events.last(), Some(&Event::End));
    assert_eq!(blocks.len(), 3);
    for (index, block) in blocks.iter().enumerate() {
        assert_eq!(block, &data[index * 2048..(index + 1) * 2048], "block {index}");
    }
}

#[test]
fn decodes_with_a_nonzero_crc_seed() {
    init_test_tracing();

    let seeded = Config {
        crc_seed: 0xBAD5EED5,
        ..config()
    };
    let data = test_pattern(2048);
    let signal = Modulator::new(&seeded).encode(&data);

    let (mut decoder, mut sink) = Decoder::<8>::new(seeded).unwrap();
    let (events, blocks) = drive(&mut decoder, &mut sink, &signal);

    assert_eq!(events.last(), Some(&Event::End));
    assert_eq!(blocks[0], data);
}

#[test]
fn a_seed_mismatch_rejects_every_packet() {
    init_test_tracing();

    let data = test_pattern(2048);
    let signal = Modulator::new(&config()).encode(&data);

    let wrong_seed = Config {
        crc_seed: 1,
        ..config()
    };
    let (mut decoder, mut sink) = Decoder::<8>::new(wrong_seed).unwrap();
    let (events, _) = drive(&mut decoder, &mut sink, &signal);

    assert_eq!(events.last(), Some(&Event::Error));
    assert_eq!(decoder.error(), Some(audioboot::DecodeError::Crc));
}

#[test]
fn error_correction_recovers_a_flipped_data_bit() {
    init_test_tracing();

    let protected = Config {
        ecc: true,
        ..config()
    };
    let data = test_pattern(2048);

    let mut modulator = Modulator::new(&protected);
    modulator.write_carrier(6000);

    modulator.write_alignment();
    modulator.write_marker(audioboot::decoder::BLOCK_MARKER);

    // First packet goes out with one bit of its first byte flipped.
    let mut framed = modulator.frame_packet(&data[..256]);
    framed[0] ^= 0x01;
    modulator.write_bytes(&framed);

    for packet in data[256..].chunks(256) {
        modulator.write_packet(packet);
    }

    modulator.write_carrier(1500);
    modulator.write_end();
    modulator.write_carrier(16);
    let signal = modulator.finish();

    let (mut decoder, mut sink) = Decoder::<8>::new(protected).unwrap();
    let (events, blocks) = drive(&mut decoder, &mut sink, &signal);

    assert_eq!(events.last(), Some(&Event::End));
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0], data, "corrupted bit was not repaired");
}

#[test]
fn without_error_correction_a_flipped_bit_is_fatal() {
    init_test_tracing();

    let data = test_pattern(2048);

    let mut modulator = Modulator::new(&config());
    modulator.write_carrier(6000);
    modulator.write_alignment();
    modulator.write_marker(audioboot::decoder::BLOCK_MARKER);

    let mut framed = modulator.frame_packet(&data[..256]);
    framed[0] ^= 0x01;
    modulator.write_bytes(&framed);

    for packet in data[256..].chunks(256) {
        modulator.write_packet(packet);
    }
    modulator.write_carrier(16);
    let signal = modulator.finish();

    let (mut decoder, mut sink) = Decoder::<8>::new(config()).unwrap();
    let (events, _) = drive(&mut decoder, &mut sink, &signal);

    assert_eq!(events.last(), Some(&Event::Error));
    assert_eq!(decoder.error(), Some(audioboot::DecodeError::Crc));
    assert_ne!(decoder.calculated_crc(), decoder.expected_crc());
}

#[test]
fn a_flipped_parity_bit_is_harmless() {
    init_test_tracing();

    let protected = Config {
        ecc: true,
        ..config()
    };
    let data = test_pattern(2048);

    let mut modulator = Modulator::new(&protected);
    modulator.write_carrier(6000);
    modulator.write_alignment();
    modulator.write_marker(audioboot::decoder::BLOCK_MARKER);

    // The parity word is the last two bytes of the framed packet; flip a
    // bit of it. Nothing downstream depends on the word itself, so the
    // packet must still validate.
    let mut framed = modulator.frame_packet(&data[..256]);
    let last = framed.len() - 1;
    framed[last] ^= 0x08;
    modulator.write_bytes(&framed);

    for packet in data[256..].chunks(256) {
        modulator.write_packet(packet);
    }

    modulator.write_carrier(1500);
    modulator.write_end();
    modulator.write_carrier(16);
    let signal = modulator.finish();

    let (mut decoder, mut sink) = Decoder::<8>::new(protected).unwrap();
    let (events, blocks) = drive(&mut decoder, &mut sink, &signal);

    assert_eq!(events.last(), Some(&Event::End));
    assert_eq!(blocks[0], data);
}

#[test]
fn error_correction_composes_with_multiple_blocks() {
    init_test_tracing();

    let protected = Config {
        ecc: true,
        ..config()
    };
    let data = test_pattern(2 * 2048);
    let signal = Modulator::new(&protected).encode(&data);

    let (mut decoder, mut sink) = Decoder::<8>::new(protected).unwrap();
    let (events, blocks) = drive(&mut decoder, &mut sink, &signal);

    assert_eq!(events.last(), Some(&Event::End));
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0], data[..2048]);
    assert_eq!(blocks[1], data[2048..]);
}

#[test]
fn a_slice_pushing_producer_decodes_identically() {
    init_test_tracing();

    let data = test_pattern(2048);
    let signal = Modulator::new(&config()).encode(&data);

    let (mut decoder, mut sink) = Decoder::<8>::new(config()).unwrap();

    // DMA-style producer: whole half-buffers, handed over only once the
    // consumer has drained the queue dry.
    let mut blocks = Vec::new();
    let mut chunks = signal.chunks(512);
    loop {
        match decoder.receive(None) {
            Event::None => match chunks.next() {
                Some(chunk) => assert!(sink.push_slice(chunk)),
                None => break,
            },
            Event::BlockComplete => blocks.push(decoder.block_data().to_vec()),
            Event::End => break,
            Event::Error => panic!("decode failed: {:?}", decoder.error()),
            Event::PacketComplete => {}
        }
    }

    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0], data);
}
