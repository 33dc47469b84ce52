use ecu_core::timing::{
    RevolutionTiming, revolution_time_from_rpm, revolution_time_from_tooth_gap,
    rpm_from_revolution_time,
};

const SPEEDS: [u16; 10] = [50, 100, 250, 800, 1_000, 3_000, 6_000, 9_000, 12_000, 18_000];

#[test]
fn angle_round_trip_within_one_degree_across_speed_range() {
    for rpm in SPEEDS {
        let timing = RevolutionTiming::with_revolution_time(revolution_time_from_rpm(rpm));
        for angle in [1u16, 10, 45, 90, 180, 270, 359, 719] {
            let back = timing.time_to_angle(timing.angle_to_time(angle));
            let error = back.abs_diff(u32::from(angle));
            assert!(error <= 1, "{rpm} rpm: {angle} deg came back as {back}");
        }
    }
}

#[test]
fn time_round_trip_within_half_a_degree() {
    for rpm in SPEEDS {
        let timing = RevolutionTiming::with_revolution_time(revolution_time_from_rpm(rpm));
        let half_degree = timing.angle_to_time(1) / 2 + 1;
        for duration in [500u32, 1_000, 2_500, 3_333] {
            if duration >= timing.revolution_time() {
                continue;
            }
            let angle = u16::try_from(timing.time_to_angle(duration)).unwrap();
            let back = timing.angle_to_time(angle);
            assert!(
                back.abs_diff(duration) <= half_degree,
                "{rpm} rpm: {duration} us came back as {back}"
            );
        }
    }
}

#[test]
fn rpm_from_constant_tooth_stream() {
    // 36 teeth per revolution; the tooth period sets the revolution time.
    for rpm in SPEEDS {
        let revolution = revolution_time_from_rpm(rpm);
        let tooth_gap = revolution / 36;
        let estimated = rpm_from_revolution_time(revolution_time_from_tooth_gap(tooth_gap, 36), 18_000);
        let expected = (60_000_000 / (tooth_gap * 36)).min(18_000);
        assert!(
            u32::from(estimated).abs_diff(expected) <= 1,
            "{rpm} rpm estimated as {estimated}"
        );
    }
}

#[test]
fn rpm_clamps_to_configured_maximum() {
    assert_eq!(rpm_from_revolution_time(100, 18_000), 18_000);
    assert_eq!(rpm_from_revolution_time(20_000, 2_500), 2_500);
    assert_eq!(rpm_from_revolution_time(0, 18_000), 0);
}
