use ecu_core::Micros;
use ecu_core::config::TriggerConfig;
use ecu_core::decoders::{SharedDecoder, SyncStatus, TriggerDecoder, TriggerPattern};

/// 20 us per crank degree, i.e. 8333 RPM.
const MICROS_PER_DEGREE: u32 = 20;
const RPM: u16 = 8_333;

fn at(angle: u32) -> Micros {
    angle * MICROS_PER_DEGREE
}

fn angle_error(actual: i16, expected: u32) -> u32 {
    let diff = (i64::from(actual) - i64::from(expected)).rem_euclid(360);
    u32::try_from(diff.min(360 - diff)).unwrap()
}

fn decoder(pattern: TriggerPattern, teeth: u16) -> TriggerDecoder {
    TriggerDecoder::new(TriggerConfig::for_pattern(pattern, teeth, 0)).unwrap()
}

/// Feeds crank-degree positions as primary edges, checking tooth and angle
/// once sync is held.
fn feed_checked(decoder: &mut TriggerDecoder, edges: &[(u32, u16)]) {
    for &(angle, tooth) in edges {
        let now = at(angle);
        decoder.primary_edge(now);
        decoder.rpm();
        assert!(decoder.has_sync(), "lost sync at {angle} deg");
        assert_eq!(decoder.tooth(), tooth, "tooth at {angle} deg");
        assert_eq!(angle_error(decoder.crank_angle(now), angle), 0, "angle at {angle} deg");
    }
}

#[test]
fn dual_wheel_follows_the_cam_reference() {
    let mut decoder = decoder(TriggerPattern::DualWheel, 12);
    decoder.primary_edge(at(330));
    decoder.secondary_edge(at(345));
    assert_eq!(decoder.sync_status(), SyncStatus::Full);

    let edges: Vec<(u32, u16)> = (0..36u16)
        .map(|index| (360 + u32::from(index) * 30, index % 12 + 1))
        .collect();
    feed_checked(&mut decoder, &edges);

    assert_eq!(decoder.rpm(), RPM);
    assert_eq!(decoder.revolution_time(), 7_200);
    // Half way between tooth 12 and tooth 1.
    let now = at(360 + 35 * 30 + 15);
    assert_eq!(decoder.crank_angle(now), 345);
    assert_eq!(decoder.sync_loss_count(), 0);
}

#[test]
fn audi_reports_positions_every_eight_degrees() {
    let mut decoder = decoder(TriggerPattern::Audi135, 135);
    decoder.secondary_edge(500);

    // Raw teeth every 200 us; three per 8 degree position.
    let start: Micros = 1_000;
    for raw in 0..(135 * 2 + 1) {
        let now = start + raw * 200;
        decoder.primary_edge(now);
        if raw % 3 == 0 {
            let position = (raw / 3) % 45 + 1;
            assert_eq!(u32::from(decoder.tooth()), position);
            assert_eq!(decoder.crank_angle(now), i16::try_from((position - 1) * 8).unwrap());
        }
        decoder.rpm();
    }

    assert_eq!(decoder.revolution_time(), 27_000);
    assert_eq!(decoder.rpm(), 2_222);
    assert_eq!(decoder.sync_loss_count(), 0);
}

#[test]
fn distributor_counts_cylinders_over_the_cycle() {
    let mut decoder = decoder(TriggerPattern::BasicDistributor, 4);
    // 100 us per degree: one tooth every 180 crank degrees.
    let mut expected = [1u16, 2, 3, 4].into_iter().cycle();
    for index in 0..9u32 {
        let now = 10_000 + index * 18_000;
        decoder.primary_edge(now);
        decoder.rpm();
        let tooth = expected.next().unwrap();
        assert_eq!(decoder.tooth(), tooth);
        assert_eq!(decoder.crank_angle(now), if tooth % 2 == 1 { 0 } else { 180 });
    }

    assert_eq!(decoder.rpm(), 1_667);
    let last = decoder.last_tooth_time();
    assert_eq!(decoder.crank_angle(last + 9_000), 90);
}

#[test]
fn daihatsu_uses_tooth_table_angles() {
    let mut decoder = decoder(TriggerPattern::Daihatsu, 5);
    for angle in [360, 540, 720] {
        decoder.primary_edge(at(angle));
    }
    assert!(!decoder.has_sync());

    let edges = [
        (750, 2),
        (900, 3),
        (1_080, 4),
        (1_260, 5),
        (1_440, 1),
        (1_470, 2),
        (1_620, 3),
        (1_800, 4),
        (1_980, 5),
        (2_160, 1),
    ];
    feed_checked(&mut decoder, &edges);
    assert_eq!(decoder.rpm(), RPM);
    assert_eq!(decoder.sync_loss_count(), 0);
}

#[test]
fn gm7x_notch_holds_sync_across_revolutions() {
    let mut decoder = decoder(TriggerPattern::Gm7x, 7);
    for angle in [282, 342, 402, 462] {
        decoder.primary_edge(at(angle));
    }
    assert!(!decoder.has_sync());

    let edges = [
        (472, 3),
        (522, 4),
        (582, 5),
        (642, 6),
        (702, 7),
        (762, 1),
        (822, 2),
        (832, 3),
        (882, 4),
        (942, 5),
        (1_002, 6),
        (1_062, 7),
        (1_122, 1),
    ];
    feed_checked(&mut decoder, &edges);
    assert_eq!(decoder.rpm(), RPM);
    assert_eq!(decoder.start_revolutions(), 2);
    assert_eq!(decoder.sync_loss_count(), 0);
}

#[test]
fn honda_sync_tooth_is_skipped_in_the_count() {
    let mut decoder = decoder(TriggerPattern::HondaD17, 13);
    for angle in [270, 300, 330] {
        decoder.primary_edge(at(angle));
    }
    decoder.primary_edge(at(335));
    assert!(decoder.has_sync());
    assert_eq!(decoder.tooth(), 0);

    for revolution in 1..3u32 {
        for tooth in 1..=12u16 {
            let angle = revolution * 360 + (u32::from(tooth) - 1) * 30;
            decoder.primary_edge(at(angle));
            decoder.rpm();
            assert_eq!(decoder.tooth(), tooth);
        }
        decoder.primary_edge(at(revolution * 360 + 335));
        assert_eq!(decoder.tooth(), 0);
    }

    for tooth in 1..=12u32 {
        decoder.primary_edge(at(3 * 360 + (tooth - 1) * 30));
    }
    assert_eq!(decoder.rpm(), RPM);
    // Between the sync tooth and tooth 1 the angle keeps running from tooth 12.
    let sync_tooth = at(3 * 360 + 335);
    decoder.primary_edge(sync_tooth);
    assert_eq!(angle_error(decoder.crank_angle(sync_tooth), 335), 0);
    assert_eq!(decoder.sync_loss_count(), 0);
}

#[test]
fn miata_syncs_on_the_double_cam_tooth() {
    let mut decoder = decoder(TriggerPattern::Miata9905, 8);
    decoder.primary_edge(at(280));
    decoder.primary_edge(at(350));
    decoder.secondary_edge(at(370));
    decoder.secondary_edge(at(380));

    feed_checked(&mut decoder, &[(460, 6), (530, 7), (640, 8), (710, 1), (820, 2)]);
    feed_checked(&mut decoder, &[(890, 3), (1_000, 4), (1_070, 5)]);
    decoder.secondary_edge(at(1_090));
    decoder.secondary_edge(at(1_100));
    feed_checked(&mut decoder, &[(1_180, 6), (1_250, 7), (1_360, 8), (1_430, 1)]);

    assert_eq!(decoder.rpm(), RPM);
    assert_eq!(decoder.sync_loss_count(), 0);
}

#[test]
fn thirty_six_minus_two_minus_one_finds_both_gaps() {
    let mut decoder = decoder(TriggerPattern::ThirtySixMinusTwoMinusOne, 36);
    let present = |position: &u16| !matches!(position, 18 | 35 | 36);

    for position in (1..=36u16).filter(present) {
        decoder.primary_edge(at((u32::from(position) - 1) * 10));
    }
    assert!(!decoder.has_sync());

    let mut edges = Vec::new();
    for revolution in 1..4u32 {
        for position in (1..=36u16).filter(present) {
            edges.push((revolution * 360 + (u32::from(position) - 1) * 10, position));
        }
    }
    feed_checked(&mut decoder, &edges);
    assert_eq!(decoder.rpm(), RPM);
    assert_eq!(decoder.sync_loss_count(), 0);
}

#[test]
fn shared_decoder_matches_direct_use() {
    let config = TriggerConfig::default();
    let shared = SharedDecoder::new(TriggerDecoder::new(config).unwrap());
    let mut direct = TriggerDecoder::new(config).unwrap();

    for revolution in 0..3u32 {
        for position in 0..35u32 {
            let now = 1_000 + revolution * 36_000 + position * 1_000;
            shared.primary_edge(now);
            direct.primary_edge(now);
            assert_eq!(shared.rpm(), direct.rpm());
        }
    }

    let now = 1_000 + 2 * 36_000 + 34 * 1_000 + 500;
    assert_eq!(shared.sync_status(), SyncStatus::Full);
    assert_eq!(shared.crank_angle(now), direct.crank_angle(now));
    assert_eq!(shared.snapshot(), direct.snapshot());
    assert_eq!(shared.with(|decoder| decoder.tooth()), 35);
}
