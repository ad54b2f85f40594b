mod common;

use audioblock_engine::clock::ManualClock;
use audioblock_engine::work::RX_RATE_LABEL;
use audioblock_engine::{
    AudioCapture, BlockConfig, ChannelLayout, Direction, Label, ReportPolicy, SampleType,
    TransferError, WorkError, WorkInfo, WorkOutcome,
};
use common::{Call, FakeBackend, ms, xrun};

const WAIT: std::time::Duration = std::time::Duration::from_millis(20);

fn source(fake: &FakeBackend, cfg: BlockConfig) -> (AudioCapture<ManualClock>, ManualClock) {
    let clock = ManualClock::new();
    let mut source = AudioCapture::with_clock(fake.shared(), &cfg, clock.clone()).unwrap();
    source.block_mut().set_report_policy(ReportPolicy::Disabled);
    source.activate().unwrap();
    fake.clear_calls();
    (source, clock)
}

fn ports(count: usize, bytes: usize) -> Vec<Vec<u8>> {
    vec![vec![0u8; bytes]; count]
}

fn step(source: &mut AudioCapture<ManualClock>, elements: usize) -> WorkOutcome {
    let bytes = elements.max(1) * source.block().port_element_bytes();
    let mut bufs = ports(source.block().port_count(), bytes);
    let mut views: Vec<&mut [u8]> = bufs.iter_mut().map(|b| b.as_mut_slice()).collect();
    source
        .work(&WorkInfo::new(elements, WAIT), &mut views)
        .unwrap()
}

fn rx_rate(port: usize, value: f64) -> Label {
    Label {
        port,
        id: RX_RATE_LABEL,
        value,
        index: 0,
    }
}

#[test]
fn rx_rate_label_once_per_activation() {
    let fake = FakeBackend::new();
    let cfg = BlockConfig {
        sample_rate: 48_000.0,
        channel_mode: ChannelLayout::PerChannel,
        ..BlockConfig::default()
    };
    let (mut source, _clock) = source(&fake, cfg);
    fake.queue_available(&[256, 128]);

    let first = step(&mut source, 1024);
    assert_eq!(first.frames, 256);
    assert!(!first.yielded);
    assert_eq!(first.labels, vec![rx_rate(0, 48_000.0)]);

    let second = step(&mut source, 1024);
    assert_eq!(second.frames, 128);
    assert!(second.labels.is_empty());

    source.deactivate();
    source.activate().unwrap();
    fake.queue_available(&[64]);
    let third = step(&mut source, 1024);
    assert_eq!(third.labels, vec![rx_rate(0, 48_000.0)]);
}

#[test]
fn label_carries_the_negotiated_rate_on_every_port() {
    let fake = FakeBackend::new();
    fake.state().negotiated_rate = Some(44_056.0);
    let cfg = BlockConfig {
        channels: 2,
        channel_mode: ChannelLayout::PerChannel,
        ..BlockConfig::default()
    };
    let (mut source, _clock) = source(&fake, cfg);
    fake.queue_available(&[32]);
    let out = step(&mut source, 32);
    assert_eq!(out.labels, vec![rx_rate(0, 44_056.0), rx_rate(1, 44_056.0)]);
}

#[test]
fn empty_device_is_probed_with_the_blocking_quantum() {
    let fake = FakeBackend::new();
    let (mut source, _clock) = source(&fake, BlockConfig::default());
    fake.queue_available(&[0, 0]);

    assert_eq!(step(&mut source, 1024).frames, 256);
    assert_eq!(step(&mut source, 100).frames, 100);
    assert_eq!(fake.transfer_calls(), vec![Call::Read(256), Call::Read(100)]);
}

#[test]
fn transfer_is_clamped_to_output_capacity() {
    let fake = FakeBackend::new();
    let (mut source, _clock) = source(&fake, BlockConfig::default());
    fake.queue_available(&[4096]);
    assert_eq!(step(&mut source, 512).frames, 512);
    assert_eq!(fake.transfer_calls(), vec![Call::Read(512)]);
}

#[test]
fn zero_output_capacity_makes_no_device_call() {
    let fake = FakeBackend::new();
    let (mut source, _clock) = source(&fake, BlockConfig::default());
    fake.queue_available(&[512]);

    let out = step(&mut source, 0);
    assert_eq!(out, WorkOutcome::idle());
    assert!(fake.calls().is_empty());
}

#[test]
fn inactive_source_does_nothing() {
    let fake = FakeBackend::new();
    let (mut source, _clock) = source(&fake, BlockConfig::default());
    source.deactivate();
    fake.clear_calls();

    assert_eq!(step(&mut source, 64), WorkOutcome::idle());
    assert!(fake.calls().is_empty());
}

#[test]
fn overrun_suppresses_transfers_for_the_backoff_time() {
    let fake = FakeBackend::new();
    let cfg = BlockConfig {
        backoff_ms: 100,
        ..BlockConfig::default()
    };
    let (mut source, clock) = source(&fake, cfg);
    fake.state().idle_available = 64;

    clock.set(ms(10));
    fake.queue_transfer(xrun(Direction::Capture, 64));
    let out = step(&mut source, 64);
    assert!(out.yielded);
    assert_eq!(out.frames, 0);
    // The first transfer still announces the rate.
    assert_eq!(out.labels.len(), 1);

    fake.clear_calls();
    clock.set(ms(50));
    let out = step(&mut source, 64);
    assert_eq!(out, WorkOutcome::yielded());
    assert!(fake.calls().is_empty());

    clock.set(ms(110));
    let out = step(&mut source, 64);
    assert_eq!(out.frames, 64);
    assert!(!out.yielded);

    let stats = source.block().stats();
    assert_eq!(stats.xruns, 1);
    assert_eq!(stats.transfers, 2);
    assert_eq!(stats.suppressed, 2);
    assert_eq!(stats.frames, 64);
}

#[test]
fn zero_backoff_never_suppresses() {
    let fake = FakeBackend::new();
    let (mut source, clock) = source(&fake, BlockConfig::default());
    fake.state().idle_available = 32;

    for i in 0..3 {
        clock.set(ms(i));
        fake.queue_transfer(xrun(Direction::Capture, 32));
        let out = step(&mut source, 32);
        assert_eq!(out.frames, 32);
        assert!(!out.yielded);
    }
    assert_eq!(source.block().stats().xruns, 3);
    assert_eq!(source.block().stats().suppressed, 0);
}

#[test]
fn backoff_change_applies_on_the_next_step() {
    let fake = FakeBackend::new();
    let (mut source, clock) = source(&fake, BlockConfig::default());
    fake.state().idle_available = 16;

    source.block_mut().set_backoff_time(30);
    clock.set(ms(5));
    fake.queue_transfer(xrun(Direction::Capture, 16));
    assert!(step(&mut source, 16).yielded);

    clock.set(ms(34));
    assert!(step(&mut source, 16).yielded);
    clock.set(ms(35));
    assert_eq!(step(&mut source, 16).frames, 16);
}

#[test]
fn per_channel_ports_follow_channel_order() {
    let fake = FakeBackend::new();
    let cfg = BlockConfig {
        channels: 3,
        dtype: SampleType::Int16,
        channel_mode: ChannelLayout::PerChannel,
        ..BlockConfig::default()
    };
    let (mut source, _clock) = source(&fake, cfg);
    fake.queue_available(&[8]);

    let mut bufs = ports(3, 16);
    let mut views: Vec<&mut [u8]> = bufs.iter_mut().map(|b| b.as_mut_slice()).collect();
    let out = source
        .work(&WorkInfo::new(8, WAIT), &mut views)
        .unwrap();
    assert_eq!(out.frames, 8);
    for (port, buf) in bufs.iter().enumerate() {
        assert!(buf.iter().all(|&b| b == port as u8 + 1), "port {port}");
    }
}

#[test]
fn interleaved_read_fills_only_the_transferred_frames() {
    let fake = FakeBackend::new();
    let cfg = BlockConfig {
        channels: 2,
        ..BlockConfig::default()
    };
    let (mut source, _clock) = source(&fake, cfg);
    fake.queue_available(&[4]);

    let mut buf = vec![0u8; 10 * 8];
    let mut views = vec![buf.as_mut_slice()];
    let out = source
        .work(&WorkInfo::new(10, WAIT), &mut views)
        .unwrap();
    assert_eq!(out.frames, 4);
    assert!(buf[..32].iter().all(|&b| b == 0xAA));
    assert!(buf[32..].iter().all(|&b| b == 0));
}

#[test]
fn unexpected_error_is_reported_and_the_stream_continues() {
    let fake = FakeBackend::new();
    let (mut source, _clock) = source(&fake, BlockConfig::default());
    fake.state().idle_available = 16;
    fake.queue_transfer(Err(TransferError::Io {
        code: -5,
        message: "input/output error".to_string(),
    }));

    // Nothing arrived, so nothing is produced.
    let out = step(&mut source, 16);
    assert_eq!(out.frames, 0);
    assert!(out.labels.is_empty());
    assert_eq!(source.block().stats().io_errors, 1);

    let out = step(&mut source, 16);
    assert_eq!(out.frames, 16);
    assert_eq!(out.labels.len(), 1);
}

#[test]
fn failed_availability_query_ends_the_step() {
    let fake = FakeBackend::new();
    let (mut source, _clock) = source(&fake, BlockConfig::default());
    fake.queue_available(&[-32]);

    let mut buf = vec![0u8; 64];
    let mut views = vec![buf.as_mut_slice()];
    let err = source
        .work(&WorkInfo::new(16, WAIT), &mut views)
        .unwrap_err();
    match err {
        WorkError::DeviceQuery { op, message } => {
            assert_eq!(op, "read available");
            assert_eq!(message, "fake error -32");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn miswired_ports_are_rejected() {
    let fake = FakeBackend::new();
    let cfg = BlockConfig {
        channels: 2,
        channel_mode: ChannelLayout::PerChannel,
        ..BlockConfig::default()
    };
    let (mut source, _clock) = source(&fake, cfg);
    fake.state().idle_available = 16;

    let mut buf = vec![0u8; 64];
    let mut views = vec![buf.as_mut_slice()];
    let err = source
        .work(&WorkInfo::new(16, WAIT), &mut views)
        .unwrap_err();
    assert!(matches!(err, WorkError::PortCount { expected: 2, got: 1 }));
}

#[test]
fn short_read_produces_only_what_arrived() {
    let fake = FakeBackend::new();
    let (mut source, _clock) = source(&fake, BlockConfig::default());
    fake.queue_available(&[64]);
    fake.queue_transfer(Ok(40));

    let out = step(&mut source, 64);
    assert_eq!(out.frames, 40);
    assert!(!out.yielded);
    assert_eq!(fake.transfer_calls(), vec![Call::Read(64)]);
    assert_eq!(source.block().stats().frames, 40);
}

#[test]
fn overrun_counts_the_frames_that_still_moved() {
    let fake = FakeBackend::new();
    let (mut source, _clock) = source(&fake, BlockConfig::default());
    fake.queue_available(&[32]);
    fake.queue_transfer(xrun(Direction::Capture, 12));

    let out = step(&mut source, 32);
    assert_eq!(out.frames, 12);
    assert_eq!(source.block().stats().xruns, 1);
}

#[test]
fn new_rate_on_a_running_source_is_announced() {
    let fake = FakeBackend::new();
    let (mut source, _clock) = source(&fake, BlockConfig::default());
    fake.state().idle_available = 16;
    assert_eq!(step(&mut source, 16).labels, vec![rx_rate(0, 44_100.0)]);
    assert!(step(&mut source, 16).labels.is_empty());

    source.setup_stream(96_000.0).unwrap();
    assert!(source.block().is_active());
    assert_eq!(step(&mut source, 16).labels, vec![rx_rate(0, 96_000.0)]);
    assert!(step(&mut source, 16).labels.is_empty());
}

#[test]
fn moving_a_running_source_to_another_device_is_announced() {
    let fake = FakeBackend::new();
    let (mut source, _clock) = source(&fake, BlockConfig::default());
    fake.state().idle_available = 16;
    step(&mut source, 16);

    source
        .setup_device(&"hw:1".parse().unwrap())
        .unwrap();
    assert_eq!(step(&mut source, 16).labels.len(), 1);
}

#[test]
fn reopening_a_stopped_source_waits_for_activation_to_label() {
    let fake = FakeBackend::new();
    let (mut source, _clock) = source(&fake, BlockConfig::default());
    fake.state().idle_available = 16;
    step(&mut source, 16);
    source.deactivate();

    source.setup_stream(48_000.0).unwrap();
    assert_eq!(step(&mut source, 16), WorkOutcome::idle());
    source.activate().unwrap();
    assert_eq!(step(&mut source, 16).labels, vec![rx_rate(0, 48_000.0)]);
}

#[test]
fn failed_reopen_surfaces_on_the_next_step() {
    let fake = FakeBackend::new();
    let (mut source, _clock) = source(&fake, BlockConfig::default());
    fake.state().open_failure = Some("gone".to_string());
    assert!(source.setup_stream(48_000.0).is_err());
    assert!(!source.block().is_active());

    let mut buf = vec![0u8; 64];
    let mut views = vec![buf.as_mut_slice()];
    let err = source
        .work(&WorkInfo::new(16, WAIT), &mut views)
        .unwrap_err();
    assert!(matches!(err, WorkError::NoStream("AudioSource")));
}
