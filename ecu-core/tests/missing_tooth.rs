use core::ops::Range;

use ecu_core::Micros;
use ecu_core::config::{FilterLevel, TriggerConfig};
use ecu_core::decoders::{SyncStatus, TriggerDecoder};

/// 3000 RPM.
const REVOLUTION: Micros = 20_000;
const START: Micros = 5_000;

/// Time at which 36-1 wheel position `position` (0-based) passes in `revolution`.
fn tooth_time(revolution: u32, position: u32) -> Micros {
    START + revolution * REVOLUTION + position * REVOLUTION / 36
}

fn angle_error(actual: i16, expected: i32, cycle: i32) -> i32 {
    let diff = (i32::from(actual) - expected).rem_euclid(cycle);
    diff.min(cycle - diff)
}

fn feed(decoder: &mut TriggerDecoder, revolution: u32, positions: Range<u32>) {
    for position in positions {
        decoder.primary_edge(tooth_time(revolution, position));
        decoder.rpm();
    }
}

#[test]
fn tracks_crank_angle_at_3000_rpm() {
    let mut decoder = TriggerDecoder::new(TriggerConfig::default()).unwrap();
    feed(&mut decoder, 0, 0..35);
    assert_eq!(decoder.sync_status(), SyncStatus::None);

    for revolution in 1..4 {
        for position in 0..35 {
            let now = tooth_time(revolution, position);
            let report = decoder.primary_edge(now);
            decoder.rpm();
            assert!(report.accepted);
            assert_eq!(decoder.sync_status(), SyncStatus::Full);
            assert_eq!(u32::from(decoder.tooth()), position + 1);

            let expected = i32::try_from(position * 10).unwrap();
            assert!(angle_error(decoder.crank_angle(now), expected, 360) <= 10);
        }
    }

    assert_eq!(decoder.rpm(), 3_000);
    assert_eq!(decoder.revolution_time(), REVOLUTION);
    assert_eq!(decoder.sync_loss_count(), 0);
}

#[test]
fn interpolates_between_teeth_once_speed_is_known() {
    let mut decoder = TriggerDecoder::new(TriggerConfig::default()).unwrap();
    for revolution in 0..3 {
        feed(&mut decoder, revolution, 0..35);
    }
    decoder.primary_edge(tooth_time(3, 0));
    assert_eq!(decoder.rpm(), 3_000);

    // Half way to tooth 2.
    let now = tooth_time(3, 0) + REVOLUTION / 72;
    assert!(angle_error(decoder.crank_angle(now), 5, 360) <= 1);

    // Inside the missing-tooth gap after tooth 35.
    feed(&mut decoder, 3, 1..35);
    let now = tooth_time(3, 34) + REVOLUTION / 36;
    assert!(angle_error(decoder.crank_angle(now), 350, 360) <= 1);
}

#[test]
fn extra_tooth_without_gap_drops_sync_once_and_recovers() {
    let mut decoder = TriggerDecoder::new(TriggerConfig::default()).unwrap();
    feed(&mut decoder, 0, 0..35);
    // The missing position shows up as a real tooth.
    feed(&mut decoder, 1, 0..36);
    assert!(!decoder.has_sync());
    assert_eq!(decoder.sync_loss_count(), 1);

    feed(&mut decoder, 2, 0..35);
    assert!(!decoder.has_sync());
    decoder.primary_edge(tooth_time(3, 0));
    assert_eq!(decoder.sync_status(), SyncStatus::Full);
    assert_eq!(decoder.tooth(), 1);
    assert_eq!(decoder.sync_loss_count(), 1);
}

#[test]
fn noise_edges_are_filtered() {
    let config = TriggerConfig::default().with_filter(FilterLevel::Medium);
    let mut decoder = TriggerDecoder::new(config).unwrap();
    feed(&mut decoder, 0, 0..35);
    feed(&mut decoder, 1, 0..11);
    assert_eq!(decoder.tooth(), 11);

    let report = decoder.primary_edge(tooth_time(1, 10) + 100);
    assert!(!report.accepted);
    assert_eq!(decoder.tooth(), 11);

    let report = decoder.primary_edge(tooth_time(1, 11));
    assert!(report.accepted);
    assert_eq!(decoder.tooth(), 12);
    assert_eq!(decoder.sync_loss_count(), 0);
}

#[test]
fn sixty_minus_two_syncs_on_double_gap() {
    let mut decoder = TriggerDecoder::new(TriggerConfig::missing_tooth(60, 2, 0)).unwrap();
    // 1000 RPM: 1000 us per tooth position.
    let mut now = 1_000;
    for _ in 0..58 {
        decoder.primary_edge(now);
        now += 1_000;
    }
    assert!(!decoder.has_sync());

    now += 2_000;
    decoder.primary_edge(now);
    assert_eq!(decoder.sync_status(), SyncStatus::Full);
    for tooth in 2..=58 {
        now += 1_000;
        decoder.primary_edge(now);
        assert_eq!(decoder.tooth(), tooth);
    }
    assert_eq!(decoder.crank_angle(now), 57 * 6);
    assert_eq!(decoder.sync_loss_count(), 0);
}

#[test]
fn sequential_waits_for_cam_before_full_sync() {
    let config = TriggerConfig::default().with_sequential(true);
    let mut decoder = TriggerDecoder::new(config).unwrap();
    feed(&mut decoder, 0, 0..35);
    decoder.primary_edge(tooth_time(1, 0));
    assert_eq!(decoder.sync_status(), SyncStatus::Half);

    feed(&mut decoder, 1, 1..21);
    decoder.secondary_edge(tooth_time(1, 20) + 200);
    feed(&mut decoder, 1, 21..35);

    let first = tooth_time(2, 0);
    decoder.primary_edge(first);
    assert_eq!(decoder.sync_status(), SyncStatus::Full);
    assert_eq!(decoder.crank_angle(first), 0);

    feed(&mut decoder, 2, 1..35);
    let second = tooth_time(3, 0);
    decoder.primary_edge(second);
    assert_eq!(decoder.sync_status(), SyncStatus::Full);
    assert!(decoder.revolution_one());
    assert_eq!(decoder.crank_angle(second), 360);
}

#[test]
fn cam_edges_capture_vvt_angles_against_the_reference() {
    let mut config = TriggerConfig::default();
    config.cam_reference_angle = 90;
    let mut decoder = TriggerDecoder::new(config).unwrap();
    feed(&mut decoder, 0, 0..35);
    feed(&mut decoder, 1, 0..21);
    assert_eq!(decoder.sync_status(), SyncStatus::Full);

    // Cam edge at 200 degrees, 110 past the reference.
    decoder.secondary_edge(tooth_time(1, 20));
    feed(&mut decoder, 1, 21..35);
    feed(&mut decoder, 2, 0..4);
    // Second cam at 30 degrees sits 60 before the reference.
    decoder.tertiary_edge(tooth_time(2, 3));

    let (vvt1, vvt2) = decoder.vvt_angles();
    assert!(angle_error(vvt1, 110, 720) <= 1, "vvt1 {vvt1}");
    assert!((-61..=-59).contains(&vvt2), "vvt2 {vvt2}");
}

#[test]
fn cam_edges_before_sync_leave_vvt_untouched() {
    let mut decoder = TriggerDecoder::new(TriggerConfig::default()).unwrap();
    feed(&mut decoder, 0, 0..10);
    decoder.secondary_edge(tooth_time(0, 9) + 100);
    decoder.tertiary_edge(tooth_time(0, 9) + 200);
    assert_eq!(decoder.vvt_angles(), (0, 0));
}
