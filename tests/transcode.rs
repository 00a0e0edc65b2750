//! End-to-end pipeline tests: encode, mux, demux, decode.

use std::sync::Arc;

use avsafe::engine::sim::SimEngine;
use avsafe::{
    CodecId, Decoder, Dictionary, Encoder, Engine, Frame, LifecycleState, MediaKind, PixelFormat,
    Properties, Rational,
};

fn init() -> Arc<dyn Engine> {
    let _ = env_logger::builder().is_test(true).try_init();
    Arc::new(SimEngine::new())
}

const WIDTH: u32 = 16;
const HEIGHT: u32 = 8;
const RATE: i64 = 25;

fn gray_props() -> Properties {
    Properties::video(WIDTH, HEIGHT, PixelFormat::Gray8, Rational::new(RATE, 1))
}

/// A gray frame whose luma value encodes its index
fn synthetic_frame(index: i64) -> Frame {
    let mut builder = avsafe::FrameBuilder::video(WIDTH, HEIGHT, PixelFormat::Gray8).unwrap();
    builder.fill_plane(0, (index % 256) as u8).unwrap();
    let mut frame = Frame::new(MediaKind::Video).unwrap();
    frame
        .adopt_storage_video(WIDTH, HEIGHT, PixelFormat::Gray8, builder.publish())
        .unwrap();
    frame.set_time_base(Rational::new(1, RATE));
    frame.set_pts(Some(index));
    frame.set_duration(Some(1));
    frame
}

fn open_encoder(engine: &Arc<dyn Engine>, options: Dictionary) -> Encoder {
    let mut enc = Encoder::new(engine.clone(), CodecId::GrayVideo).unwrap();
    enc.set_properties(gray_props()).unwrap();
    enc.open(options).unwrap();
    enc
}

fn open_decoder(engine: &Arc<dyn Engine>) -> Decoder {
    let mut dec = Decoder::new(engine.clone(), CodecId::GrayVideo).unwrap();
    dec.set_properties(gray_props()).unwrap();
    dec.open(Dictionary::new()).unwrap();
    dec
}

/// Push one frame through an encoder, draining as needed, collecting output
fn pump_encoder(enc: &mut Encoder, frame: &Frame, out: &mut Vec<avsafe::Packet>) {
    loop {
        if enc.feed(frame).unwrap() {
            break;
        }
        // full: make room and retry
        let pkt = enc.produce().unwrap().expect("full encoder has output");
        out.push(pkt);
    }
    while let Some(pkt) = enc.produce().unwrap() {
        out.push(pkt);
    }
}

#[test]
fn five_seconds_of_video_survive_a_transcode() {
    let engine = init();
    let total = 5 * RATE;

    let mut enc = open_encoder(&engine, Dictionary::new());
    let mut packets = Vec::new();
    for i in 0..total {
        pump_encoder(&mut enc, &synthetic_frame(i), &mut packets);
    }
    enc.signal_end_of_input().unwrap();
    while let Some(pkt) = enc.produce().unwrap() {
        packets.push(pkt);
    }
    assert_eq!(packets.len(), total as usize);

    let mut dec = open_decoder(&engine);
    let mut frames = Vec::new();
    for pkt in &packets {
        assert!(dec.feed(pkt).unwrap());
        while let Some(frame) = dec.produce().unwrap() {
            frames.push(frame);
        }
    }
    dec.signal_end_of_input().unwrap();
    while let Some(frame) = dec.produce().unwrap() {
        frames.push(frame);
    }

    assert_eq!(frames.len(), total as usize);
    let props = dec.properties().unwrap();
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame.pts(), Some(i as i64));
        assert_eq!(frame.width(), props.width);
        assert_eq!(frame.height(), props.height);
        assert_eq!(frame.pixel_format(), props.pixel_format);
        let luma = frame.data().unwrap().row(0, 0).unwrap()[0];
        assert_eq!(luma, (i % 256) as u8);
    }
}

#[test]
fn encoder_lookahead_releases_everything_on_drain() {
    let engine = init();
    let mut options = Dictionary::new();
    options.set("delay", "2");
    let mut enc = open_encoder(&engine, options);

    let mut packets = Vec::new();
    for i in 0..6 {
        assert!(enc.feed(&synthetic_frame(i)).unwrap());
        while let Some(pkt) = enc.produce().unwrap() {
            packets.push(pkt);
        }
    }
    // two frames held back in the lookahead window
    assert_eq!(packets.len(), 4);
    enc.signal_end_of_input().unwrap();
    while let Some(pkt) = enc.produce().unwrap() {
        packets.push(pkt);
    }
    assert_eq!(packets.len(), 6);
}

#[test]
fn round_trip_preserves_essential_properties() {
    let engine = init();

    let mut enc = open_encoder(&engine, Dictionary::new());
    let mut packets = Vec::new();
    pump_encoder(&mut enc, &synthetic_frame(0), &mut packets);

    let mut dec = open_decoder(&engine);
    dec.feed(&packets[0]).unwrap();
    let frame = dec.produce().unwrap().expect("one frame");

    let enc_props = enc.properties().unwrap().essential();
    let dec_props = dec.properties().unwrap().essential();
    assert_eq!(enc_props, dec_props);
    assert_eq!(frame.pixel_format(), dec_props.pixel_format);
}

#[test]
fn remux_through_a_store() {
    let engine = init();

    let mut enc = open_encoder(&engine, Dictionary::new());
    let mut packets = Vec::new();
    for i in 0..10 {
        pump_encoder(&mut enc, &synthetic_frame(i), &mut packets);
    }

    let mut muxer = avsafe::Muxer::new().unwrap();
    let stream = muxer
        .add_stream(
            CodecId::GrayVideo,
            enc.properties().unwrap(),
            Dictionary::new(),
        )
        .unwrap();
    muxer.write_header(Dictionary::new()).unwrap();
    for mut pkt in packets {
        pkt.set_stream_index(stream);
        muxer.write_packet(pkt).unwrap();
    }
    let store = muxer.finish().unwrap();
    assert_eq!(store.packet_count(), 10);

    let mut demuxer = avsafe::Demuxer::from_store(store).unwrap();
    let descriptor = demuxer.best_stream(MediaKind::Video).unwrap().clone();
    assert_eq!(descriptor.codec_id, CodecId::GrayVideo);
    // stream carries only the essential subset
    assert_eq!(descriptor.properties.bit_rate, 0);

    let mut dec = Decoder::from_stream(engine.clone(), &descriptor).unwrap();
    assert_eq!(dec.state(), LifecycleState::Ready);
    let mut decoded = 0;
    while let Some(pkt) = demuxer.read_packet().unwrap() {
        assert!(dec.feed(&pkt).unwrap());
        while let Some(frame) = dec.produce().unwrap() {
            assert_eq!(frame.width(), WIDTH);
            decoded += 1;
        }
    }
    dec.signal_end_of_input().unwrap();
    while dec.produce().unwrap().is_some() {
        decoded += 1;
    }
    assert_eq!(decoded, 10);
}

#[test]
fn moved_out_objects_are_destroyed_shells() {
    let engine = init();

    let mut frame = synthetic_frame(0);
    let owned_frame = frame.take();
    assert_eq!(frame.state(), LifecycleState::Destroyed);
    assert!(frame.data().is_none());
    assert_eq!(owned_frame.state(), LifecycleState::Ready);

    let mut enc = open_encoder(&engine, Dictionary::new());
    let mut moved = enc.take();
    assert_eq!(enc.state(), LifecycleState::Destroyed);
    // the moved-out encoder keeps working
    assert!(moved.feed(&owned_frame).unwrap());
    assert!(moved.produce().unwrap().is_some());
}

#[test]
fn backpressure_is_control_flow_not_errors() {
    let engine = init();
    let mut options = Dictionary::new();
    options.set("queue", "2");
    let mut enc = open_encoder(&engine, options);

    let frame = synthetic_frame(0);
    assert!(enc.feed(&frame).unwrap());
    assert!(enc.feed(&frame).unwrap());
    // queue of two is full: rejection, not an error, and stays full
    assert!(!enc.feed(&frame).unwrap());
    assert!(enc.is_full());
    assert!(!enc.feed(&frame).unwrap());
    assert!(enc.is_full());

    assert!(enc.produce().unwrap().is_some());
    assert!(!enc.is_full());
    assert!(enc.feed(&frame).unwrap());
}
