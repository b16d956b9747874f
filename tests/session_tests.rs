//! End-to-end session tests against the scripted mock transport.

use std::time::Duration;

use etiqueta::protocol::bitmap::{self, build_job, JobSettings, LabelImage};
use etiqueta::protocol::response::{status_frame, TimeoutSetting};
use etiqueta::session::{PollPolicy, PrintSession, SessionState};
use etiqueta::transport::MockTransport;
use etiqueta::{EtiquetaError, LinkConfig};
use pretty_assertions::assert_eq;
use rand::Rng;

/// Status frame body captured from a real printer with a 14×40 roll loaded
const ROLL: [u8; 13] = [0x0c, 0x01, 0x12, 0x03, 0x00, 0x03, 0x01, 0x12, 0x12, 0x15, 0x28, 0x0f, 0x0e];

fn session(mock: MockTransport) -> PrintSession<MockTransport> {
    let link = LinkConfig {
        read_timeout_ms: 50,
        ..LinkConfig::default()
    };
    let mut session = PrintSession::new(mock, &link);
    session.set_poll_policy(PollPolicy::new(10, Duration::ZERO));
    session
}

fn random_image(rng: &mut impl Rng, density: f64) -> LabelImage {
    let pixels = (0..284 * 96).map(|_| rng.random_bool(density)).collect();
    LabelImage::from_pixels(284, 96, pixels).unwrap()
}

// ============================================================================
// FULL FLOW
// ============================================================================

#[test]
fn test_query_then_print_then_liveness_check() {
    let mut mock = MockTransport::new();
    mock.reply_to(b"BATTERY?", b"BATTERY \x67\x00\r\n")
        .reply_to(b"\x1b!o", &status_frame(0x20, &ROLL))
        .reply_to(b"\x1b!o", &status_frame(0x20, &ROLL))
        .reply_to(b"\x1b!o", &status_frame(0x00, &ROLL))
        .reply_to(b"\x1b!?", &[0x00]);

    let mut session = session(mock);
    assert_eq!(session.battery().unwrap().percent, 67);

    let job = build_job(&LabelImage::blank(), &JobSettings::default()).unwrap();
    let receipt = session.submit(&job).unwrap();
    assert_eq!(receipt.attempts, 3);
    assert_eq!(session.state(), SessionState::Idle);

    assert!(session.ready().unwrap());

    let mock = session.into_transport();
    assert_eq!(mock.unused_replies(), 0);

    let expected = {
        let mut bytes = b"BATTERY?\r\n".to_vec();
        for _ in 0..3 {
            bytes.extend_from_slice(b"\x1b!o\r\n");
        }
        bytes.extend(job.to_bytes().unwrap());
        bytes.extend_from_slice(b"\x1b!?\r\n");
        bytes
    };
    assert_eq!(mock.written(), expected);
}

#[test]
fn test_ready_on_third_poll_uses_exactly_three_attempts() {
    let mut mock = MockTransport::new();
    mock.reply_to(b"\x1b!o", &status_frame(0x01, &ROLL))
        .reply_to(b"\x1b!o", &status_frame(0x04, &ROLL))
        .reply_to(b"\x1b!o", &status_frame(0x00, &ROLL))
        .reply_to(b"\x1b!o", &status_frame(0x00, &ROLL));

    let mut session = session(mock);
    let job = build_job(&LabelImage::blank(), &JobSettings::default()).unwrap();
    let receipt = session.submit(&job).unwrap();
    assert_eq!(receipt.attempts, 3);

    let mock = session.into_transport();
    let polls = mock
        .writes()
        .iter()
        .filter(|w| w.starts_with(b"\x1b!o"))
        .count();
    assert_eq!(polls, 3);
    assert_eq!(mock.unused_replies(), 1);
}

#[test]
fn test_printer_stays_busy_then_recovers() {
    let mut mock = MockTransport::new();
    for _ in 0..3 {
        mock.reply_to(b"\x1b!o", &status_frame(0x20, &ROLL));
    }
    mock.reply_to(b"\x1b!o", &status_frame(0x00, &ROLL));

    let mut session = session(mock);
    session.set_poll_policy(PollPolicy::new(3, Duration::ZERO));
    let job = build_job(&LabelImage::blank(), &JobSettings::default()).unwrap();

    let err = session.submit(&job).unwrap_err();
    assert!(matches!(err, EtiquetaError::ReadyTimeout { attempts: 3, .. }));
    assert_eq!(session.state(), SessionState::Idle);

    // Same session, next try succeeds on the first poll
    let receipt = session.submit(&job).unwrap();
    assert_eq!(receipt.attempts, 1);
}

#[test]
fn test_settings_are_read_back_from_config() {
    let mut mock = MockTransport::new();
    mock.reply_to(b"CONFIG?", b"CONFIG \x00\xcb\x00\x00\x03\x04\x02\x04\x02\x01\r\n")
        .reply_to(b"CONFIG?", b"CONFIG \x00\xcb\x00\x00\x03\x04\x02\x04\x02\x00\r\n");

    let mut session = session(mock);
    session.set_timeout(TimeoutSetting::Minutes30).unwrap();
    let config = session.config().unwrap();
    assert_eq!(config.timeout, TimeoutSetting::Minutes30);

    session.set_beep(false).unwrap();
    assert!(!session.config().unwrap().beep_enabled);

    let mock = session.into_transport();
    assert_eq!(
        mock.written(),
        b"TIMEOUT \x02\r\nCONFIG?\r\nBEEP \x00\r\nCONFIG?\r\n".to_vec()
    );
}

#[test]
fn test_battery_charging_reads_ninety_nine() {
    let mut mock = MockTransport::new();
    mock.reply_to(b"BATTERY?", b"BATTERY \x99\x01\r\n");

    let mut session = session(mock);
    let battery = session.battery().unwrap();
    assert_eq!(battery.percent, 99);
    assert!(battery.charging);
}

// ============================================================================
// FAILURE MODES
// ============================================================================

#[test]
fn test_unterminated_reply_faults_without_hanging() {
    let mut mock = MockTransport::new();
    let mut garbage = b"BATTERY ".to_vec();
    garbage.extend(std::iter::repeat_n(b'x', 1024));
    mock.reply_to(b"BATTERY?", &garbage);

    let mut session = session(mock);
    let err = session.battery().unwrap_err();
    assert!(matches!(err, EtiquetaError::Framing { .. }));
    assert_eq!(session.state(), SessionState::Faulted);

    // The decoder gave up at the line bound rather than draining everything
    let mock = session.into_transport();
    assert!(mock.unread() > 0);
}

#[test]
fn test_faulted_session_refuses_everything_without_io() {
    let mut mock = MockTransport::new();
    mock.disconnect();

    let mut session = session(mock);
    assert!(matches!(session.config(), Err(EtiquetaError::Transport(_))));
    assert_eq!(session.state(), SessionState::Faulted);

    let job = build_job(&LabelImage::blank(), &JobSettings::default()).unwrap();
    let before = session.engine().transport().io_count();

    assert!(matches!(session.battery(), Err(EtiquetaError::Faulted)));
    assert!(matches!(session.config(), Err(EtiquetaError::Faulted)));
    assert!(matches!(session.ready(), Err(EtiquetaError::Faulted)));
    assert!(matches!(session.status(), Err(EtiquetaError::Faulted)));
    assert!(matches!(session.self_test(), Err(EtiquetaError::Faulted)));
    assert!(matches!(session.submit(&job), Err(EtiquetaError::Faulted)));

    assert_eq!(session.engine().transport().io_count(), before);
}

#[test]
fn test_unknown_status_is_never_ready() {
    let mut mock = MockTransport::new();
    mock.reply_to(b"\x1b!o", &status_frame(0x02, &ROLL));

    let mut session = session(mock);
    let job = build_job(&LabelImage::blank(), &JobSettings::default()).unwrap();
    let err = session.submit(&job).unwrap_err();
    assert!(matches!(err, EtiquetaError::UnknownStatus(0x02)));

    // Nothing past the poll was written
    let mock = session.into_transport();
    assert_eq!(mock.writes().len(), 1);
}

#[test]
fn test_wrong_sized_image_fails_before_any_io() {
    let mock = MockTransport::new();
    let session = session(mock);

    for (w, h) in [(96, 284), (283, 96), (284, 97), (0, 0)] {
        let err = build_job(&LabelImage::new(w, h), &JobSettings::default()).unwrap_err();
        assert!(matches!(err, EtiquetaError::ImageSize { .. }), "{}x{}", w, h);
    }
    assert_eq!(session.engine().transport().io_count(), 0);
}

#[test]
fn test_zero_copies_rejected() {
    let settings = JobSettings {
        copies: 0,
        ..JobSettings::default()
    };
    let err = build_job(&LabelImage::blank(), &settings).unwrap_err();
    assert!(matches!(err, EtiquetaError::InvalidArgument(_)));
}

// ============================================================================
// BITMAP PROPERTIES
// ============================================================================

#[test]
fn test_random_images_round_trip() {
    let mut rng = rand::rng();
    for density in [0.0, 0.05, 0.5, 0.95, 1.0] {
        let image = random_image(&mut rng, density);
        let packed = bitmap::pack(&image).unwrap();
        assert_eq!(packed.data.len(), 3408);
        assert_eq!(bitmap::unpack(&packed, 284, 96).unwrap(), image);
    }
}

#[test]
fn test_job_order_is_fixed_for_any_settings() {
    let mut rng = rand::rng();
    for _ in 0..20 {
        let settings = JobSettings {
            copies: rng.random_range(1..=99),
            density: rng.random_range(0..=15),
            label_mm: (rng.random_range(5.0..50.0), rng.random_range(10.0..100.0)),
            gap_mm: (rng.random_range(0.0..10.0), 0.0),
            ..JobSettings::default()
        };
        let job = build_job(&random_image(&mut rng, 0.3), &settings).unwrap();
        assert_eq!(
            job.names(),
            ["SIZE", "GAP", "DIRECTION", "DENSITY", "CLS", "BITMAP", "PRINT"]
        );
        let bytes = job.to_bytes().unwrap();
        let print = format!("PRINT {}\r\n", settings.copies);
        assert!(bytes.ends_with(print.as_bytes()));
    }
}
